//! Error types for the retrieval engine.

use thiserror::Error;

/// Result type alias using RagError.
pub type Result<T> = std::result::Result<T, RagError>;

/// Errors that can occur in the retrieval engine.
#[derive(Error, Debug)]
pub enum RagError {
    /// Invalid argument provided (bad k, bad alpha, empty query set).
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// Vector length differs from the configured embedding dimension.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Generation collaborator failed or returned degenerate output.
    #[error("Generation error: {message}")]
    Generation { message: String },

    /// A sub-query of a multi-query retrieval failed.
    #[error(
        "Retrieval failed for sub-query {query_index} ({query:?}), {failed} sub-query(s) failed: {source}"
    )]
    AggregateRetrieval {
        query_index: usize,
        query: String,
        failed: usize,
        #[source]
        source: Box<RagError>,
    },

    /// A scored chunk id does not resolve to a chunk in the corpus.
    #[error("Data consistency error: chunk {chunk_id} is not in the corpus")]
    DataConsistency { chunk_id: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Internal error (unexpected).
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Coarse error classification used by callers to decide on retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    Generation,
    AggregateRetrieval,
    DataConsistency,
    Config,
    Internal,
}

impl RagError {
    /// Create an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a generation error.
    pub fn generation(message: impl Into<String>) -> Self {
        Self::Generation {
            message: message.into(),
        }
    }

    /// Create a data consistency error for a dangling chunk id.
    pub fn data_consistency(chunk_id: impl Into<String>) -> Self {
        Self::DataConsistency {
            chunk_id: chunk_id.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the error kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument { .. } | Self::DimensionMismatch { .. } => {
                ErrorKind::InvalidArgument
            }
            Self::Generation { .. } => ErrorKind::Generation,
            Self::AggregateRetrieval { .. } => ErrorKind::AggregateRetrieval,
            Self::DataConsistency { .. } => ErrorKind::DataConsistency,
            Self::Config { .. } => ErrorKind::Config,
            Self::Io(_) | Self::Serialization(_) | Self::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// Whether a caller may retry the failed operation (with backoff).
    ///
    /// Only generation failures are transient. An aggregate failure is
    /// retryable exactly when the sub-query failure it wraps is.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Generation { .. } => true,
            Self::AggregateRetrieval { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    /// Get the error code for service responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidArgument { .. } => "INVALID_ARGUMENT",
            Self::DimensionMismatch { .. } => "DIMENSION_MISMATCH",
            Self::Generation { .. } => "GENERATION_ERROR",
            Self::AggregateRetrieval { .. } => "AGGREGATE_RETRIEVAL_ERROR",
            Self::DataConsistency { .. } => "DATA_CONSISTENCY_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Config { .. } => "CONFIG_ERROR",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RagError::DimensionMismatch {
            expected: 384,
            actual: 3,
        };
        assert!(err.to_string().contains("384"));
        assert!(err.to_string().contains('3'));

        let err = RagError::data_consistency("chunk-7");
        assert!(err.to_string().contains("chunk-7"));
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            RagError::invalid_argument("k must be >= 1").error_code(),
            "INVALID_ARGUMENT"
        );
        assert_eq!(RagError::generation("empty").error_code(), "GENERATION_ERROR");
        assert_eq!(
            RagError::data_consistency("x").error_code(),
            "DATA_CONSISTENCY_ERROR"
        );
    }

    #[test]
    fn test_kinds_and_retry() {
        let mismatch = RagError::DimensionMismatch {
            expected: 4,
            actual: 2,
        };
        assert_eq!(mismatch.kind(), ErrorKind::InvalidArgument);
        assert!(!mismatch.is_retryable());

        assert!(RagError::generation("timeout").is_retryable());
        assert!(!RagError::data_consistency("x").is_retryable());

        let aggregate = RagError::AggregateRetrieval {
            query_index: 2,
            query: "sublease income".to_string(),
            failed: 1,
            source: Box::new(RagError::generation("connection reset")),
        };
        assert_eq!(aggregate.kind(), ErrorKind::AggregateRetrieval);
        assert!(aggregate.is_retryable());
        assert!(aggregate.to_string().contains("sublease income"));
    }
}
