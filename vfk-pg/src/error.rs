//! Domain error taxonomy
//!
//! Validation and lookup failures are structured results for the caller.
//! Integrity violations abort the one operation they occur in and are
//! logged at high severity; they are scoped to a single zoning and never
//! take the whole process down.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The extract head failed validation; problems are reported verbatim.
    /// Nothing in the store was mutated.
    #[error("invalid VFK extract: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// The Conversion Service reported failure or timed out. The staging
    /// schema is retained for inspection and retry.
    #[error("conversion failed: {0}")]
    ConversionFailure(String),

    /// No active schema exists for the requested zoning.
    #[error("no imported data for zoning {0}")]
    ZoningNotFound(i32),

    /// A key that must be unique resolved to more than one title deed row.
    /// Never resolved by picking one candidate.
    #[error("multiple title deeds for zoning {zoning_code} number {number} ({count} rows)")]
    MultipleTitleDeeds {
        zoning_code: i32,
        number: i32,
        count: usize,
    },

    /// Store state violates an invariant: a schema name that does not match
    /// the naming convention, or a query row whose shape does not match the
    /// expected projection.
    #[error("data integrity violation: {0}")]
    DataIntegrity(String),

    /// Error reading or decoding the extract file
    #[error(transparent)]
    Vfk(#[from] vfk::VfkError),

    #[error("database error: {0}")]
    Db(#[from] tokio_postgres::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),
}

impl Error {
    /// Creates a data-integrity error with context
    pub fn integrity(reason: impl Into<String>) -> Self {
        Self::DataIntegrity(reason.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_reports_problems_verbatim() {
        let err = Error::Validation(vec![
            "Missing VFK version line".to_string(),
            "VFK file encoding is not UTF-8".to_string(),
        ]);
        let msg = err.to_string();
        assert!(msg.contains("Missing VFK version line"));
        assert!(msg.contains("VFK file encoding is not UTF-8"));
    }

    #[test]
    fn test_multiple_title_deeds_message() {
        let err = Error::MultipleTitleDeeds {
            zoning_code: 612065,
            number: 51,
            count: 2,
        };
        assert_eq!(
            err.to_string(),
            "multiple title deeds for zoning 612065 number 51 (2 rows)"
        );
    }
}
