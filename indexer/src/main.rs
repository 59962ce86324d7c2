use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use search_core::{DocId, SearchService};
use serde::Deserialize;
use thiserror::Error;
use tracing_subscriber::{fmt, EnvFilter};
use walkdir::WalkDir;

use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct InputDoc {
    #[serde(rename = "docId")]
    doc_id: DocId,
    text: String,
}

/// Failures of the document source, before anything reaches the index.
#[derive(Debug, Error)]
enum DocSourceError {
    #[error("failed to read document source {path}: {source}")]
    Unreadable {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed document source {path}: {detail}")]
    Malformed { path: PathBuf, detail: String },
}

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build a persistent BM25 index from a document source", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index from a JSON document file or a directory of .txt files
    Build {
        /// Input path (JSON array file or directory)
        #[arg(long)]
        input: String,
        /// Output index directory
        #[arg(long)]
        output: String,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, output } => build_index(Path::new(&input), Path::new(&output)),
    }
}

fn build_index(input: &Path, output: &Path) -> Result<()> {
    let docs = read_source(input)?;
    let service = SearchService::new();
    for (doc_id, text) in &docs {
        service.add_document(*doc_id, text);
    }
    tracing::info!(num_docs = docs.len(), "ingested documents");

    service
        .save(output)
        .with_context(|| format!("failed to save index to {}", output.display()))?;
    tracing::info!(output = %output.display(), "index build complete");
    Ok(())
}

/// Resolve the caller-supplied source into `(docId, text)` pairs in the
/// order they will be indexed.
fn read_source(input: &Path) -> Result<Vec<(DocId, String)>, DocSourceError> {
    if input.is_dir() {
        read_text_dir(input)
    } else {
        read_json_file(input)
    }
}

/// A JSON array of `{"docId":…,"text":…}` objects.
fn read_json_file(path: &Path) -> Result<Vec<(DocId, String)>, DocSourceError> {
    let contents = fs::read_to_string(path).map_err(|source| DocSourceError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;
    let docs: Vec<InputDoc> =
        serde_json::from_str(&contents).map_err(|e| DocSourceError::Malformed {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
    docs.into_iter()
        .map(|d| {
            if d.doc_id < 0 {
                Err(DocSourceError::Malformed {
                    path: path.to_path_buf(),
                    detail: format!("negative docId {}", d.doc_id),
                })
            } else {
                Ok((d.doc_id, d.text))
            }
        })
        .collect()
}

/// Every `.txt` file under `dir`, paths sorted byte-lexicographically,
/// docIds assigned contiguously starting at 1.
fn read_text_dir(dir: &Path) -> Result<Vec<(DocId, String)>, DocSourceError> {
    let mut files: Vec<PathBuf> = Vec::new();
    for entry in WalkDir::new(dir).into_iter().filter_map(|e| e.ok()) {
        let p = entry.path();
        if p.is_file() && p.extension().and_then(|s| s.to_str()) == Some("txt") {
            files.push(p.to_path_buf());
        }
    }
    files.sort();

    let mut docs = Vec::with_capacity(files.len());
    for (i, p) in files.iter().enumerate() {
        let text = fs::read_to_string(p).map_err(|source| DocSourceError::Unreadable {
            path: p.clone(),
            source,
        })?;
        docs.push((i as DocId + 1, text));
    }
    Ok(docs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn json_array_source_preserves_ids_and_order() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(
            f,
            r#"[{{"docId":5,"text":"first"}},{{"docId":2,"text":"second"}}]"#
        )
        .unwrap();
        let docs = read_json_file(f.path()).unwrap();
        assert_eq!(
            docs,
            vec![(5, "first".to_string()), (2, "second".to_string())]
        );
    }

    #[test]
    fn negative_doc_ids_are_rejected() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, r#"[{{"docId":-3,"text":"bad"}}]"#).unwrap();
        let err = read_json_file(f.path()).unwrap_err();
        assert!(matches!(err, DocSourceError::Malformed { .. }));
        assert!(err.to_string().contains("-3"));
    }

    #[test]
    fn garbage_json_is_malformed_not_a_panic() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, "[[[").unwrap();
        assert!(matches!(
            read_json_file(f.path()),
            Err(DocSourceError::Malformed { .. })
        ));
    }

    #[test]
    fn text_dir_assigns_contiguous_ids_in_path_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("b.txt"), "second doc").unwrap();
        fs::write(dir.path().join("a.txt"), "first doc").unwrap();
        fs::write(dir.path().join("sub/c.txt"), "third doc").unwrap();
        fs::write(dir.path().join("notes.md"), "ignored").unwrap();

        let docs = read_text_dir(dir.path()).unwrap();
        let ids: Vec<DocId> = docs.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(docs[0].1, "first doc");
        assert_eq!(docs[1].1, "second doc");
        assert_eq!(docs[2].1, "third doc");
    }

    #[test]
    fn missing_source_is_unreadable() {
        let err = read_json_file(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, DocSourceError::Unreadable { .. }));
    }
}
