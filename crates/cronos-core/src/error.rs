//! Core model errors.

use thiserror::Error;

/// Errors raised while constructing or parsing model values.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A schedule component is outside its allowed range.
    #[error("Invalid schedule: {field} must be in {min}..={max}, got {value}")]
    InvalidSchedule {
        field: &'static str,
        value: u32,
        min: u32,
        max: u32,
    },

    /// Text that does not name a known agent model.
    #[error("Unknown agent model: {0}")]
    UnknownModel(String),

    /// Identifier text that is not a UUID.
    #[error("Invalid identifier: {0}")]
    InvalidId(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_schedule_display() {
        let err = CoreError::InvalidSchedule {
            field: "hour",
            value: 24,
            min: 0,
            max: 23,
        };
        let msg = err.to_string();
        assert!(msg.contains("hour"));
        assert!(msg.contains("0..=23"));
        assert!(msg.contains("24"));
    }

    #[test]
    fn test_unknown_model_display() {
        let err = CoreError::UnknownModel("gpt".to_string());
        assert!(err.to_string().contains("gpt"));
    }
}
