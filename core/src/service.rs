//! The search service: boolean candidate generation, BM25 ranking, snippet
//! enrichment, persistence, and the reader/writer discipline over the
//! in-memory index.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::path::Path;

use parking_lot::RwLock;

use crate::error::Result;
use crate::index::InvertedIndex;
use crate::persist::{self, IndexMeta, LoadedIndex};
use crate::query::{parse_query, ParsedQuery};
use crate::snippet::make_snippet;
use crate::tokenizer::tokenize;
use crate::{DocId, SCHEMA_VERSION};

const K1: f64 = 1.2;
const B: f64 = 0.75;

/// One ranked search result with its extract.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub doc_id: DocId,
    pub score: f64,
    pub snippet: String,
}

#[derive(Default)]
struct State {
    idx: InvertedIndex,
    doc_text: HashMap<DocId, String>,
    doc_len: HashMap<DocId, usize>,
    n_docs: u32,
    avgdl: f64,
}

/// Read-mostly search engine over an in-memory inverted index.
///
/// All state sits behind one reader/writer lock: any number of `search*`
/// calls run concurrently under shared access, `add_document` takes the
/// lock exclusively, `save` reads under shared access, and `load` builds
/// the replacement image entirely outside the lock and swaps it in under a
/// short exclusive section, so concurrent readers see either the old state
/// or the new one, never a mixture.
#[derive(Default)]
pub struct SearchService {
    state: RwLock<State>,
}

impl SearchService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index `text` under `doc_id` and refresh the corpus statistics.
    ///
    /// Each docId is expected to be added at most once per index lifetime;
    /// re-adding an id overwrites the stored text and length but postings
    /// keep accumulating, which skews the corpus statistics.
    pub fn add_document(&self, doc_id: DocId, text: &str) {
        let len = tokenize(text).len();
        let mut st = self.state.write();
        st.idx.add_document(doc_id, text);
        st.doc_text.insert(doc_id, text.to_owned());
        st.doc_len.insert(doc_id, len);
        st.n_docs = st.doc_len.len() as u32;
        let total: usize = st.doc_len.values().sum();
        st.avgdl = if st.n_docs > 0 {
            total as f64 / st.n_docs as f64
        } else {
            0.0
        };
    }

    /// Ranked docIds for `query`: score descending, docId ascending on ties.
    pub fn search(&self, query: &str) -> Vec<DocId> {
        let pq = parse_query(query);
        let st = self.state.read();
        ranked(&st, &pq).into_iter().map(|(id, _)| id).collect()
    }

    /// Same order as [`SearchService::search`], carrying the BM25 score.
    pub fn search_scored(&self, query: &str) -> Vec<(DocId, f64)> {
        let pq = parse_query(query);
        let st = self.state.read();
        ranked(&st, &pq)
    }

    /// Same order as [`SearchService::search`], each hit enriched with a
    /// contextual extract of the stored text.
    pub fn search_with_snippets(&self, query: &str) -> Vec<SearchHit> {
        let pq = parse_query(query);
        let st = self.state.read();
        ranked(&st, &pq)
            .into_iter()
            .map(|(doc_id, score)| {
                let text = st.doc_text.get(&doc_id).map(String::as_str).unwrap_or("");
                SearchHit {
                    doc_id,
                    score,
                    snippet: make_snippet(text, &pq.positives),
                }
            })
            .collect()
    }

    /// Snapshot the current state into `dir`, one atomic commit per file.
    /// Only reads the state, so shared access suffices.
    pub fn save(&self, dir: &Path) -> Result<()> {
        let st = self.state.read();
        let meta = IndexMeta {
            schema_version: SCHEMA_VERSION,
            n_docs: st.n_docs,
            avgdl: st.avgdl,
        };
        persist::save_index(dir, &st.idx, &st.doc_text, &meta)
    }

    /// Double-buffered reload: parse and validate `dir` into fresh buffers
    /// without holding the lock, then swap them in. On error the live state
    /// is untouched.
    pub fn load(&self, dir: &Path) -> Result<()> {
        let LoadedIndex {
            idx,
            doc_text,
            doc_len,
            n_docs,
            avgdl,
        } = persist::load_index(dir)?;
        let mut st = self.state.write();
        *st = State {
            idx,
            doc_text,
            doc_len,
            n_docs,
            avgdl,
        };
        Ok(())
    }
}

fn ranked(st: &State, pq: &ParsedQuery) -> Vec<(DocId, f64)> {
    // Candidate generation: fold the sorted posting lists with AND or OR.
    let mut candidates: Vec<DocId> = Vec::new();
    let mut first = true;
    for term in &pq.positives {
        let docs = st.idx.search(term);
        if first {
            candidates = docs;
            first = false;
        } else if pq.is_or {
            candidates = union_sorted(&candidates, &docs);
        } else {
            candidates = intersect_sorted(&candidates, &docs);
        }
    }
    // A query with no positive terms matches nothing.
    if first {
        return Vec::new();
    }

    let mut excluded: HashSet<DocId> = HashSet::new();
    for term in &pq.negatives {
        excluded.extend(st.idx.search(term));
    }

    let mut scored: Vec<(DocId, f64)> = Vec::with_capacity(candidates.len());
    for doc_id in candidates {
        if excluded.contains(&doc_id) {
            continue;
        }
        let Some(&dl) = st.doc_len.get(&doc_id) else {
            continue;
        };
        scored.push((doc_id, bm25(st, pq, doc_id, dl)));
    }

    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    scored
}

fn bm25(st: &State, pq: &ParsedQuery, doc_id: DocId, dl: usize) -> f64 {
    let n = f64::from(st.n_docs);
    let denom_norm = if st.avgdl > 0.0 {
        1.0 - B + B * (dl as f64 / st.avgdl)
    } else {
        1.0
    };
    let mut score = 0.0;
    for term in &pq.positives {
        let df = st.idx.df(term);
        if df == 0 {
            continue;
        }
        let Some(tf) = st.idx.postings_map(term).and_then(|m| m.get(&doc_id)) else {
            continue;
        };
        let df = df as f64;
        let tf = f64::from(*tf);
        let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();
        score += idf * (tf * (K1 + 1.0)) / (tf + K1 * denom_norm);
    }
    score
}

/// Two-pointer intersection of sorted, duplicate-free docId lists.
fn intersect_sorted(a: &[DocId], b: &[DocId]) -> Vec<DocId> {
    let mut out = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            Ordering::Less => i += 1,
            Ordering::Greater => j += 1,
            Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    out
}

/// Two-pointer union of sorted, duplicate-free docId lists.
fn union_sorted(a: &[DocId], b: &[DocId]) -> Vec<DocId> {
    let mut out = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    let push = |out: &mut Vec<DocId>, v: DocId| {
        if out.last() != Some(&v) {
            out.push(v);
        }
    };
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            Ordering::Less => {
                push(&mut out, a[i]);
                i += 1;
            }
            Ordering::Greater => {
                push(&mut out, b[j]);
                j += 1;
            }
            Ordering::Equal => {
                push(&mut out, a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    for &v in &a[i..] {
        push(&mut out, v);
    }
    for &v in &b[j..] {
        push(&mut out, v);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intersect_keeps_common_ids() {
        assert_eq!(intersect_sorted(&[1, 2, 3, 5], &[2, 3, 4]), vec![2, 3]);
        assert!(intersect_sorted(&[1, 2], &[]).is_empty());
        assert!(intersect_sorted(&[], &[1, 2]).is_empty());
    }

    #[test]
    fn union_merges_without_duplicates() {
        assert_eq!(union_sorted(&[1, 3, 5], &[2, 3, 6]), vec![1, 2, 3, 5, 6]);
        assert_eq!(union_sorted(&[], &[4, 7]), vec![4, 7]);
        assert_eq!(union_sorted(&[4, 7], &[]), vec![4, 7]);
    }
}
