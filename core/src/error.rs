use std::path::PathBuf;

use thiserror::Error;

/// On-disk schema version understood by this build.
pub const SCHEMA_VERSION: i64 = 1;

/// Failures surfaced by the persistence layer.
///
/// Loading is transactional: any of these leaves a live service untouched.
#[derive(Debug, Error)]
pub enum IndexError {
    /// One of the three required index files is absent.
    #[error("index file missing: {0}")]
    IndexFileMissing(PathBuf),

    /// The metadata declares a schema this build does not understand.
    #[error("unsupported schema_version {0}, expected {SCHEMA_VERSION}")]
    UnsupportedSchema(i64),

    /// A file exists but its contents are not a valid index.
    #[error("corrupt index: {file}: {detail}")]
    CorruptIndex { file: String, detail: String },

    /// An underlying filesystem operation failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, IndexError>;
