//! Storage driver boundary for the document access layer.
//!
//! The [`StoreBackend`] trait is the only seam between the typed client and a
//! concrete store. Filters and documents cross it in the store's native BSON
//! representation and are never translated by the core.
//!
//! # Error classification
//!
//! Implementations own the retry predicate: every native failure must be mapped
//! into either [`DocumentStoreError::Transient`](crate::error::DocumentStoreError::Transient)
//! (connectivity blips the executor may retry) or
//! [`DocumentStoreError::StoreOperation`](crate::error::DocumentStoreError::StoreOperation)
//! (everything else).
//!
//! # Cancellation
//!
//! Methods are cancelled by dropping the returned future. The
//! [`ResilientExecutor`](crate::retry::ResilientExecutor) does this whenever its
//! cancellation token fires, so implementations must not rely on running to completion.
//!
//! # Example
//!
//! ```ignore
//! use docbridge::backend::StoreBackend;
//! use bson::doc;
//!
//! let backend = MyBackendImpl::new();
//!
//! backend.insert_many("users", vec![doc! { "_id": "u1", "name": "Alice" }]).await?;
//! let found = backend.find("users", doc! { "name": "Alice" }, None).await?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use async_trait::async_trait;
use bson::Document;
use std::{fmt::Debug, sync::Arc};

use crate::error::DocumentStoreResult;

/// What the store does with a write that violates the collection validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationAction {
    /// Reject the write.
    Error,
    /// Accept the write and log the violation.
    Warn,
}

impl ValidationAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationAction::Error => "error",
            ValidationAction::Warn => "warn",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "error" => Some(ValidationAction::Error),
            "warn" => Some(ValidationAction::Warn),
            _ => None,
        }
    }
}

/// Which writes the store checks against the collection validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationLevel {
    /// No validation.
    Off,
    /// Inserts, and updates to documents that were already valid.
    Moderate,
    /// All inserts and updates.
    Strict,
}

impl ValidationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationLevel::Off => "off",
            ValidationLevel::Moderate => "moderate",
            ValidationLevel::Strict => "strict",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "off" => Some(ValidationLevel::Off),
            "moderate" => Some(ValidationLevel::Moderate),
            "strict" => Some(ValidationLevel::Strict),
            _ => None,
        }
    }
}

/// Validator settings attached to a collection.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionValidation {
    /// The full validator expression, e.g. `{ "$jsonSchema": { ... } }`.
    pub validator: Document,
    pub action: ValidationAction,
    pub level: ValidationLevel,
}

/// Abstract interface for document store drivers.
///
/// All implementations must be thread-safe and support concurrent access from
/// multiple async tasks.
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Returns the documents of `collection` matching the native `filter`,
    /// in store order, optionally capped at `limit`.
    ///
    /// A missing collection yields an empty result.
    async fn find(
        &self,
        collection: &str,
        filter: Document,
        limit: Option<i64>,
    ) -> DocumentStoreResult<Vec<Document>>;

    /// Inserts documents in one request. Each document carries its `_id`.
    ///
    /// A missing collection is created implicitly. Duplicate `_id` values are
    /// reported as a store operation error.
    async fn insert_many(&self, collection: &str, documents: Vec<Document>) -> DocumentStoreResult<()>;

    /// Replaces the document whose `_id` equals `id`. Matching nothing is not an error.
    async fn replace_one(&self, collection: &str, id: &str, document: Document) -> DocumentStoreResult<()>;

    /// Replaces every `(id, document)` pair in a single bulk request.
    async fn bulk_replace(
        &self,
        collection: &str,
        documents: Vec<(String, Document)>,
    ) -> DocumentStoreResult<()>;

    /// Deletes every document matching `filter` and returns how many were removed.
    async fn delete_many(&self, collection: &str, filter: Document) -> DocumentStoreResult<u64>;

    /// Counts the documents matching `filter`.
    async fn count(&self, collection: &str, filter: Document) -> DocumentStoreResult<u64>;

    /// Creates an ascending index on `field`, optionally unique.
    async fn create_index(&self, collection: &str, field: &str, unique: bool) -> DocumentStoreResult<()>;

    /// Lists the names of all collections in the database.
    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>>;

    /// Creates a collection, optionally with a validator attached.
    ///
    /// Creating a collection that already exists is a store operation error.
    async fn create_collection(
        &self,
        name: &str,
        validation: Option<CollectionValidation>,
    ) -> DocumentStoreResult<()>;

    /// Runs a database command such as `collMod` and returns the reply.
    async fn run_command(&self, command: Document) -> DocumentStoreResult<Document>;

    /// Releases the backend's resources.
    ///
    /// The default implementation is a no-op.
    async fn shutdown(self) -> DocumentStoreResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

#[async_trait]
impl<B> StoreBackend for Arc<B>
where
    B: StoreBackend + ?Sized,
{
    async fn find(
        &self,
        collection: &str,
        filter: Document,
        limit: Option<i64>,
    ) -> DocumentStoreResult<Vec<Document>> {
        (**self).find(collection, filter, limit).await
    }

    async fn insert_many(&self, collection: &str, documents: Vec<Document>) -> DocumentStoreResult<()> {
        (**self).insert_many(collection, documents).await
    }

    async fn replace_one(&self, collection: &str, id: &str, document: Document) -> DocumentStoreResult<()> {
        (**self).replace_one(collection, id, document).await
    }

    async fn bulk_replace(
        &self,
        collection: &str,
        documents: Vec<(String, Document)>,
    ) -> DocumentStoreResult<()> {
        (**self).bulk_replace(collection, documents).await
    }

    async fn delete_many(&self, collection: &str, filter: Document) -> DocumentStoreResult<u64> {
        (**self).delete_many(collection, filter).await
    }

    async fn count(&self, collection: &str, filter: Document) -> DocumentStoreResult<u64> {
        (**self).count(collection, filter).await
    }

    async fn create_index(&self, collection: &str, field: &str, unique: bool) -> DocumentStoreResult<()> {
        (**self).create_index(collection, field, unique).await
    }

    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        (**self).list_collections().await
    }

    async fn create_collection(
        &self,
        name: &str,
        validation: Option<CollectionValidation>,
    ) -> DocumentStoreResult<()> {
        (**self).create_collection(name, validation).await
    }

    async fn run_command(&self, command: Document) -> DocumentStoreResult<Document> {
        (**self).run_command(command).await
    }
}

/// Factory trait for creating backend instances.
#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> DocumentStoreResult<Self::Backend>;
}
