use std::collections::HashMap;

use crate::tokenizer::tokenize;
use crate::DocId;

/// Term -> { docId -> term frequency }.
///
/// Postings are kept unordered in memory for O(1) scoring lookups; the
/// accessors that promise order sort on the way out, and the serialiser in
/// [`crate::persist`] sorts terms and postings so equal logical content
/// always produces byte-identical files.
#[derive(Debug, Clone, Default)]
pub struct InvertedIndex {
    terms: HashMap<String, HashMap<DocId, i32>>,
}

impl InvertedIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tokenise `text` and bump the `(term, docId)` cell for every
    /// occurrence.
    pub fn add_document(&mut self, doc_id: DocId, text: &str) {
        for token in tokenize(text) {
            *self
                .terms
                .entry(token)
                .or_default()
                .entry(doc_id)
                .or_insert(0) += 1;
        }
    }

    /// Postings for `term`, sorted by ascending docId. Empty for unknown
    /// terms.
    pub fn postings(&self, term: &str) -> Vec<(DocId, i32)> {
        let Some(map) = self.terms.get(term) else {
            return Vec::new();
        };
        let mut out: Vec<(DocId, i32)> = map.iter().map(|(&d, &tf)| (d, tf)).collect();
        out.sort_unstable_by_key(|&(d, _)| d);
        out
    }

    /// O(1) handle to the tf map for `term`. The borrow is only valid until
    /// the next mutation or replacement of the index.
    pub fn postings_map(&self, term: &str) -> Option<&HashMap<DocId, i32>> {
        self.terms.get(term)
    }

    /// Document frequency: how many documents contain `term`.
    pub fn df(&self, term: &str) -> usize {
        self.terms.get(term).map_or(0, HashMap::len)
    }

    /// DocIds containing `term`, sorted ascending.
    pub fn search(&self, term: &str) -> Vec<DocId> {
        let Some(map) = self.terms.get(term) else {
            return Vec::new();
        };
        let mut out: Vec<DocId> = map.keys().copied().collect();
        out.sort_unstable();
        out
    }

    pub fn term_count(&self) -> usize {
        self.terms.len()
    }

    pub(crate) fn terms(&self) -> &HashMap<String, HashMap<DocId, i32>> {
        &self.terms
    }

    pub(crate) fn from_terms(terms: HashMap<String, HashMap<DocId, i32>>) -> Self {
        Self { terms }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_repeated_tokens() {
        let mut idx = InvertedIndex::new();
        idx.add_document(7, "apple banana apple");
        assert_eq!(idx.postings("apple"), vec![(7, 2)]);
        assert_eq!(idx.postings("banana"), vec![(7, 1)]);
        assert_eq!(idx.term_count(), 2);
    }

    #[test]
    fn postings_and_search_are_sorted_by_doc_id() {
        let mut idx = InvertedIndex::new();
        for id in [42, 3, 17] {
            idx.add_document(id, "cherry");
        }
        assert_eq!(idx.search("cherry"), vec![3, 17, 42]);
        assert_eq!(idx.postings("cherry"), vec![(3, 1), (17, 1), (42, 1)]);
    }

    #[test]
    fn unknown_term_is_absent_everywhere() {
        let mut idx = InvertedIndex::new();
        idx.add_document(1, "hello");
        assert_eq!(idx.df("nope"), 0);
        assert!(idx.postings("nope").is_empty());
        assert!(idx.postings_map("nope").is_none());
        assert!(idx.search("nope").is_empty());
    }

    #[test]
    fn df_counts_documents_not_occurrences() {
        let mut idx = InvertedIndex::new();
        idx.add_document(1, "apple apple apple");
        idx.add_document(2, "apple");
        assert_eq!(idx.df("apple"), 2);
    }
}
