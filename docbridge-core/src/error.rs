//! Error types and result types for document access operations.
//!
//! Every fallible operation in the workspace returns [`DocumentStoreResult<T>`].
//! The variants form a closed taxonomy: the store backends classify their native
//! failures into [`DocumentStoreError::Transient`] (retried by the
//! [`ResilientExecutor`](crate::retry::ResilientExecutor)) or
//! [`DocumentStoreError::StoreOperation`] (surfaced immediately), and keep the
//! native error as the source so callers never lose the cause.

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Boxed error used to carry a backend's native failure as a source.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Represents all possible errors that can occur when talking to a document store.
#[derive(Error, Debug)]
pub enum DocumentStoreError {
    /// Required configuration is missing, empty or malformed.
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// The initial connection to the store could not be established.
    #[error("Connection error: {0}")]
    Connection(#[source] BoxError),
    /// The document type has no registered collection. Carries the type name.
    #[error("No collection mapping registered for type {0}")]
    MappingNotFound(String),
    /// A failure the backend classified as likely to succeed on retry.
    #[error("Transient store error: {0}")]
    Transient(#[source] BoxError),
    /// Any other failure reported by the store (validation rejection,
    /// duplicate key, command error).
    #[error("Store operation failed: {0}")]
    StoreOperation(#[source] BoxError),
    /// Serialization/deserialization error when converting between document formats.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// The document does not serialize to a BSON object.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// The operation was cancelled through its cancellation token.
    #[error("Operation cancelled")]
    Cancelled,
}

/// A specialized `Result` type for document store operations.
pub type DocumentStoreResult<T> = Result<T, DocumentStoreError>;

impl DocumentStoreError {
    /// Wraps a backend failure that should be retried.
    pub fn transient(err: impl Into<BoxError>) -> Self {
        DocumentStoreError::Transient(err.into())
    }

    /// Wraps a backend failure that must be surfaced as-is.
    pub fn store_operation(err: impl Into<BoxError>) -> Self {
        DocumentStoreError::StoreOperation(err.into())
    }

    /// Wraps a failure to establish the initial connection.
    pub fn connection(err: impl Into<BoxError>) -> Self {
        DocumentStoreError::Connection(err.into())
    }

    /// Returns `true` when the executor is allowed to retry this failure.
    pub fn is_transient(&self) -> bool {
        matches!(self, DocumentStoreError::Transient(_))
    }
}

impl From<BsonError> for DocumentStoreError {
    fn from(err: BsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for DocumentStoreError {
    fn from(err: SerdeJsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}
