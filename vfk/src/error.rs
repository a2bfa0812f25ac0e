//! Error types for the vfk crate

use thiserror::Error;

/// Errors that can occur while reading a VFK extract head
#[derive(Debug, Error)]
pub enum VfkError {
    /// I/O error while reading the extract (also covers non-UTF-8 content,
    /// which the buffered line reader reports as invalid data)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A header line required for identity extraction is absent
    #[error("Missing header line: {0}")]
    MissingLine(&'static str),

    /// A header line is present but does not have the expected shape
    #[error("Malformed header line {line}: {reason}")]
    MalformedLine { line: &'static str, reason: String },
}

impl VfkError {
    /// Creates a malformed-line error with context
    pub fn malformed(line: &'static str, reason: impl Into<String>) -> Self {
        Self::MalformedLine {
            line,
            reason: reason.into(),
        }
    }
}
