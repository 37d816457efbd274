//! Error Handling Module
//!
//! Defines the error types used across the crate.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

/// Main error type for the fine-tuning pipeline
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid configuration, reported before any compute resource is allocated
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error reading or parsing a dataset file
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// Error in the tokenizer collaborator
    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    /// Error loading or persisting model parameters
    #[error("Model error: {0}")]
    Model(String),

    /// Error during a training round
    #[error("Training error: {0}")]
    Training(String),

    /// IO error (results file or checkpoint storage)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Dataset("missing column".to_string());
        assert_eq!(format!("{}", err), "Dataset error: missing column");
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
