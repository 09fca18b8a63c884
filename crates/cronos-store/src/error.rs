//! Storage errors.

use std::path::PathBuf;

use thiserror::Error;

/// Persistence failures.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A document exists but could not be parsed.
    #[error("Corrupt document at {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corrupt_display() {
        let err = StoreError::Corrupt {
            path: PathBuf::from("/tmp/jobs.json"),
            reason: "expected value".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("/tmp/jobs.json"));
        assert!(msg.contains("expected value"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: StoreError = io_err.into();
        assert!(err.to_string().contains("file not found"));
    }
}
