//! On-disk index format and the atomic three-file commit.
//!
//! An index directory holds exactly three files:
//!
//! ```text
//! <index_dir>/index_meta.json   # {"schema_version":1,"N":…,"avgdl":…}
//! <index_dir>/docs.jsonl        # {"docId":…,"text":…} per line, docId asc
//! <index_dir>/postings.bin      # little-endian binary postings
//! ```
//!
//! Every file is committed independently via write-temp-then-rename, so a
//! crash mid-save leaves the previously committed file intact. The loader
//! validates the whole directory into fresh buffers; callers swap those in
//! under their own lock.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{IndexError, Result, SCHEMA_VERSION};
use crate::index::InvertedIndex;
use crate::tokenizer::tokenize;
use crate::DocId;

pub const META_FILE: &str = "index_meta.json";
pub const DOCS_FILE: &str = "docs.jsonl";
pub const POSTINGS_FILE: &str = "postings.bin";

/// Paths of the three files that make up an index directory.
pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }
    pub fn meta(&self) -> PathBuf {
        self.root.join(META_FILE)
    }
    pub fn docs(&self) -> PathBuf {
        self.root.join(DOCS_FILE)
    }
    pub fn postings(&self) -> PathBuf {
        self.root.join(POSTINGS_FILE)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IndexMeta {
    pub schema_version: i64,
    #[serde(rename = "N")]
    pub n_docs: u32,
    pub avgdl: f64,
}

#[derive(Debug, Deserialize)]
struct DocRecord {
    #[serde(rename = "docId")]
    doc_id: DocId,
    text: String,
}

#[derive(Serialize)]
struct DocRecordRef<'a> {
    #[serde(rename = "docId")]
    doc_id: DocId,
    text: &'a str,
}

/// A fully validated index image, ready to be swapped into a service.
pub struct LoadedIndex {
    pub idx: InvertedIndex,
    pub doc_text: HashMap<DocId, String>,
    pub doc_len: HashMap<DocId, usize>,
    pub n_docs: u32,
    pub avgdl: f64,
}

/// Write `bytes` to `path` through a `.tmp` sibling and rename into place.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = tmp_path(path);
    {
        let mut f = File::create(&tmp)?;
        f.write_all(bytes)?;
        f.flush()?;
    }
    if let Err(rename_err) = fs::rename(&tmp, path) {
        // Some platforms refuse to rename onto an existing target.
        if path.exists() {
            fs::remove_file(path)?;
            fs::rename(&tmp, path)?;
        } else {
            return Err(rename_err.into());
        }
    }
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(".tmp");
    PathBuf::from(os)
}

/// Snapshot `idx` plus the document table into `dir`, one atomic commit per
/// file.
pub fn save_index(
    dir: &Path,
    idx: &InvertedIndex,
    doc_text: &HashMap<DocId, String>,
    meta: &IndexMeta,
) -> Result<()> {
    fs::create_dir_all(dir)?;
    let paths = IndexPaths::new(dir);

    let meta_json = serde_json::to_string(meta).map_err(std::io::Error::other)?;
    write_atomic(&paths.meta(), meta_json.as_bytes())?;

    // docs.jsonl in ascending docId order, one compact object per line.
    let mut ids: Vec<DocId> = doc_text.keys().copied().collect();
    ids.sort_unstable();
    let mut docs_buf = Vec::new();
    for id in ids {
        let rec = DocRecordRef {
            doc_id: id,
            text: &doc_text[&id],
        };
        serde_json::to_writer(&mut docs_buf, &rec).map_err(std::io::Error::other)?;
        docs_buf.push(b'\n');
    }
    write_atomic(&paths.docs(), &docs_buf)?;

    write_atomic(&paths.postings(), &encode_postings(idx))?;
    Ok(())
}

/// Read and validate a committed index directory into fresh buffers.
///
/// Does not touch any live service state; callers swap the result in under
/// their own writer lock. Document lengths are recomputed through the
/// tokeniser instead of being trusted from disk.
pub fn load_index(dir: &Path) -> Result<LoadedIndex> {
    let paths = IndexPaths::new(dir);
    for path in [paths.meta(), paths.docs(), paths.postings()] {
        if !path.is_file() {
            return Err(IndexError::IndexFileMissing(path));
        }
    }

    let meta_text = fs::read_to_string(paths.meta())?;
    let meta_value: serde_json::Value =
        serde_json::from_str(&meta_text).map_err(|e| corrupt(META_FILE, e))?;
    // Gate on the version before insisting on this version's field set.
    let version = meta_value
        .get("schema_version")
        .and_then(serde_json::Value::as_i64)
        .ok_or_else(|| corrupt(META_FILE, "missing schema_version"))?;
    if version != SCHEMA_VERSION {
        return Err(IndexError::UnsupportedSchema(version));
    }
    let meta: IndexMeta = serde_json::from_value(meta_value).map_err(|e| corrupt(META_FILE, e))?;

    let mut doc_text: HashMap<DocId, String> = HashMap::new();
    let mut doc_len: HashMap<DocId, usize> = HashMap::new();
    let docs_file = File::open(paths.docs())?;
    for (lineno, line) in BufReader::new(docs_file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let rec: DocRecord = serde_json::from_str(&line)
            .map_err(|e| corrupt(DOCS_FILE, format!("line {}: {e}", lineno + 1)))?;
        if rec.doc_id < 0 {
            return Err(corrupt(
                DOCS_FILE,
                format!("line {}: negative docId {}", lineno + 1, rec.doc_id),
            ));
        }
        let len = tokenize(&rec.text).len();
        if doc_text.insert(rec.doc_id, rec.text).is_some() {
            return Err(corrupt(
                DOCS_FILE,
                format!("line {}: duplicate docId {}", lineno + 1, rec.doc_id),
            ));
        }
        doc_len.insert(rec.doc_id, len);
    }

    let postings_bytes = fs::read(paths.postings())?;
    let terms = decode_postings(&postings_bytes)?;

    // Cross-file consistency: every posting must point at a known document
    // and the declared document count must match. A half-committed
    // directory fails here.
    for (term, map) in &terms {
        for doc_id in map.keys() {
            if !doc_text.contains_key(doc_id) {
                return Err(corrupt(
                    POSTINGS_FILE,
                    format!("term {term:?} references unknown docId {doc_id}"),
                ));
            }
        }
    }
    if meta.n_docs as usize != doc_text.len() {
        return Err(corrupt(
            META_FILE,
            format!("N={} but docs.jsonl has {} records", meta.n_docs, doc_text.len()),
        ));
    }

    Ok(LoadedIndex {
        idx: InvertedIndex::from_terms(terms),
        doc_text,
        doc_len,
        n_docs: meta.n_docs,
        avgdl: meta.avgdl,
    })
}

/// Serialise the postings into the binary layout.
///
/// Terms are written in ascending byte-lexicographic order and each posting
/// list in ascending docId order, so two indexes with equal logical content
/// produce byte-identical files.
pub fn encode_postings(idx: &InvertedIndex) -> Vec<u8> {
    let mut terms: Vec<&String> = idx.terms().keys().collect();
    terms.sort_unstable();

    let mut buf = Vec::new();
    buf.extend_from_slice(&(terms.len() as u64).to_le_bytes());
    for term in terms {
        let postings = idx.postings(term);
        buf.extend_from_slice(&(term.len() as u32).to_le_bytes());
        buf.extend_from_slice(term.as_bytes());
        buf.extend_from_slice(&(postings.len() as u32).to_le_bytes());
        for (doc_id, tf) in postings {
            buf.extend_from_slice(&doc_id.to_le_bytes());
            buf.extend_from_slice(&tf.to_le_bytes());
        }
    }
    buf
}

/// Parse the binary postings layout, rejecting truncated or inconsistent
/// input.
pub fn decode_postings(bytes: &[u8]) -> Result<HashMap<String, HashMap<DocId, i32>>> {
    let mut r = ByteReader { buf: bytes, pos: 0 };
    let term_count = r.read_u64()?;
    let mut terms: HashMap<String, HashMap<DocId, i32>> = HashMap::new();
    for _ in 0..term_count {
        let term_len = r.read_u32()? as usize;
        let term_bytes = r.read_bytes(term_len)?;
        let term = std::str::from_utf8(term_bytes)
            .map_err(|_| corrupt(POSTINGS_FILE, "term is not valid UTF-8"))?
            .to_owned();

        let posting_count = r.read_u32()? as usize;
        if posting_count.checked_mul(8).is_none_or(|n| n > r.remaining()) {
            return Err(corrupt(
                POSTINGS_FILE,
                format!("term {term:?} declares {posting_count} postings beyond end of file"),
            ));
        }
        let mut map: HashMap<DocId, i32> = HashMap::with_capacity(posting_count);
        for _ in 0..posting_count {
            let doc_id = r.read_i32()?;
            let tf = r.read_i32()?;
            if tf < 1 {
                return Err(corrupt(
                    POSTINGS_FILE,
                    format!("term {term:?} docId {doc_id} has tf {tf}"),
                ));
            }
            if map.insert(doc_id, tf).is_some() {
                return Err(corrupt(
                    POSTINGS_FILE,
                    format!("term {term:?} repeats docId {doc_id}"),
                ));
            }
        }
        if terms.insert(term, map).is_some() {
            return Err(corrupt(POSTINGS_FILE, "duplicate term entry"));
        }
    }
    if r.remaining() != 0 {
        return Err(corrupt(
            POSTINGS_FILE,
            format!("{} trailing bytes after last term", r.remaining()),
        ));
    }
    Ok(terms)
}

fn corrupt(file: &str, detail: impl ToString) -> IndexError {
    IndexError::CorruptIndex {
        file: file.to_string(),
        detail: detail.to_string(),
    }
}

struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        if n > self.remaining() {
            return Err(corrupt(
                POSTINGS_FILE,
                format!("truncated: need {n} bytes at offset {}, have {}", self.pos, self.remaining()),
            ));
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn read_u32(&mut self) -> Result<u32> {
        let b = self.read_bytes(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn read_i32(&mut self) -> Result<i32> {
        let b = self.read_bytes(4)?;
        Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn read_u64(&mut self) -> Result<u64> {
        let b = self.read_bytes(8)?;
        Ok(u64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
    }
}
