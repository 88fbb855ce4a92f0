//! Error types for the PDF engine.
//!
//! Four failure classes, kept deliberately distinct so callers can message
//! users accurately: corrupted input, valid-but-unsupported PDF features,
//! I/O failures, and caller-side API misuse.

/// Result type alias for PDF engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur during PDF parsing, modification and writing.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Structural or syntax violation at a known byte offset.
    ///
    /// Always fatal to the current parse; never retried.
    #[error("corrupted data at byte {offset}: {reason}")]
    Corrupted {
        /// Byte offset where the violation was detected
        offset: usize,
        /// What was violated
        reason: String,
    },

    /// Structural violation with no meaningful byte offset (e.g. a bad
    /// filter name inside an already-materialized object).
    #[error("corrupted data: {0}")]
    Malformed(String),

    /// Valid PDF feature this engine does not support (cross-reference
    /// streams, object streams, encryption, TIFF/16-bit predictors,
    /// external file filters).
    #[error("not implemented: {0}")]
    NotImplemented(String),

    /// File open/read/write failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// API misuse by the caller (wrong object ownership, serializing a
    /// reference into an unattached factory's numbering space).
    #[error("logic error: {0}")]
    Logic(String),
}

impl Error {
    /// Build a [`Error::Corrupted`] from an offset and a reason.
    pub fn corrupted(offset: usize, reason: impl Into<String>) -> Self {
        Error::Corrupted {
            offset,
            reason: reason.into(),
        }
    }
}
