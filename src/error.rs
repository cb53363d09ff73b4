//! Error types for the pagelens library.

use thiserror::Error;

/// Top-level error type for pagelens operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Index building errors.
    #[error("index error: {0}")]
    Index(#[from] IndexError),

    /// Search errors.
    #[error("search error: {0}")]
    Search(#[from] SearchError),

    /// I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that abort an index build.
///
/// Per-document problems (bad JSON, empty token streams, duplicates,
/// transient read failures) never surface here; they are confined to the
/// offending document and logged as a [`SkipReason`]. Only build-global
/// failures unwind, and they leave a clean slate behind.
#[derive(Error, Debug)]
pub enum IndexError {
    /// No documents survived ingestion.
    #[error("no documents to index")]
    EmptyIndex,

    /// Write failure during flush, merge, or split. Typically disk-full.
    #[error("fatal I/O failure writing {path}: {source}")]
    IoFatal {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// An intermediate partition could not be parsed back during merge.
    #[error("corrupt partition {path}: {reason}")]
    CorruptPartition { path: String, reason: String },

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Errors that occur during search operations.
#[derive(Error, Debug)]
pub enum SearchError {
    /// The on-disk index is absent or fails the readiness check.
    #[error("index not ready: {0}")]
    NotReady(String),

    /// A persisted table could not be parsed at load time. Prompts a
    /// forced rebuild.
    #[error("corrupt index: {0}")]
    CorruptIndex(String),

    /// Deserialization error when loading index data.
    #[error("deserialization error: {0}")]
    Deserialization(String),
}

/// Why a document was dropped during ingestion.
///
/// These are outcomes, not errors: the build continues, the document is
/// skipped with a warning, and no doc_id is consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Bad JSON, or missing `url`/`content` fields.
    InputMalformed,
    /// The token stream came out empty.
    Tokenization,
    /// Exact or near duplicate of an already-accepted document.
    Duplicate,
    /// Read failure that persisted through one retry.
    IoTransient,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SkipReason::InputMalformed => "malformed input",
            SkipReason::Tokenization => "empty token stream",
            SkipReason::Duplicate => "duplicate content",
            SkipReason::IoTransient => "unreadable after retry",
        };
        f.write_str(s)
    }
}

/// Result type for pagelens operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::from(IndexError::EmptyIndex);
        assert!(err.to_string().contains("no documents"));

        let err = Error::from(SearchError::CorruptIndex("bad header".to_string()));
        assert!(err.to_string().contains("bad header"));
    }

    #[test]
    fn test_skip_reason_display() {
        assert_eq!(SkipReason::Duplicate.to_string(), "duplicate content");
        assert_eq!(SkipReason::IoTransient.to_string(), "unreadable after retry");
    }
}
