//! Error types for the `vecstore` crate.

use thiserror::Error;

/// Errors that can occur in vector store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A configuration problem: incompatible engine version, unusable
    /// dataset options, or a deprecated parameter shape.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An argument violated the adapter's calling contract, such as
    /// supplying both a query and an embedding, or neither.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The requested operation is not supported on this code path.
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// An error surfaced from the vector engine backend.
    #[error("Vector engine error ({backend}): {message}")]
    Engine {
        /// The engine backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// An error surfaced from the embedding provider.
    #[error("Embedding error ({provider}): {message}")]
    Embedding {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },
}

/// A convenience result type for vector store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
