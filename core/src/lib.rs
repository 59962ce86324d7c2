//! Single-node BM25 full-text search core.
//!
//! An offline builder fills a [`SearchService`] through
//! [`SearchService::add_document`] and snapshots it to a three-file index
//! directory; an online server loads that directory and answers ranked
//! queries with boolean operators, NOT-exclusion and contextual snippets.

pub mod error;
pub mod index;
pub mod persist;
pub mod query;
pub mod service;
pub mod snippet;
pub mod tokenizer;

/// Document identifier. Signed 32-bit to match the on-disk posting width.
pub type DocId = i32;

pub use error::{IndexError, SCHEMA_VERSION};
pub use index::InvertedIndex;
pub use query::{parse_query, ParsedQuery};
pub use service::{SearchHit, SearchService};
pub use tokenizer::tokenize;
