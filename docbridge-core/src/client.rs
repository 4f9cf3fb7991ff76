//! Typed document access.
//!
//! [`DocumentClient`] is the request-time entry point. Every operation:
//!
//! 1. resolves the document type's collection through the [`TypeRegistry`].
//!    An unregistered type fails with
//!    [`DocumentStoreError::MappingNotFound`] before any store call is made.
//! 2. runs the store call through the [`ResilientExecutor`], which retries
//!    transient failures with exponential backoff.
//!
//! Batched writes (`create_many`, `update_many`, `delete_many`) are a single
//! store request, and therefore a single retry unit.
//!
//! # Example
//!
//! ```ignore
//! use docbridge::{prelude::*, memory::InMemoryStore};
//!
//! let (client, _report) = DocumentClient::builder(InMemoryStore::new()).build().await?;
//! client.register::<User>("users").await;
//!
//! let mut user = User { name: "Ann".into(), ..Default::default() };
//! client.create(&mut user).await?;
//!
//! let found: Option<User> = client.get(user.id()).await?;
//! client.delete::<User>(user.id()).await?;
//! ```

use bson::{Bson, Document as BsonDocument, doc};
use std::{collections::BTreeMap, sync::Arc};
use tokio_util::sync::CancellationToken;

use crate::{
    backend::StoreBackend,
    document::{Document, DocumentExt, ID_FIELD},
    error::{DocumentStoreError, DocumentStoreResult},
    registry::{RegistrationReport, TypeRegistry},
    retry::{ResilientExecutor, RetryPolicy},
    schema::{SchemaSynthesizer, TypeCatalog},
};

/// Typed CRUD, query and index operations over a [`StoreBackend`].
///
/// Cloning is cheap: clones share the backend, the registry and the retry policy.
#[derive(Debug)]
pub struct DocumentClient<B> {
    backend: Arc<B>,
    registry: Arc<TypeRegistry>,
    executor: ResilientExecutor,
}

impl<B> Clone for DocumentClient<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            registry: Arc::clone(&self.registry),
            executor: self.executor.clone(),
        }
    }
}

impl<B: StoreBackend> DocumentClient<B> {
    /// Creates a client with an empty registry and the default retry policy.
    pub fn new(backend: B) -> Self {
        Self::from_parts(Arc::new(backend), Arc::new(TypeRegistry::new()), RetryPolicy::default())
    }

    pub fn from_parts(backend: Arc<B>, registry: Arc<TypeRegistry>, policy: RetryPolicy) -> Self {
        Self {
            backend,
            registry,
            executor: ResilientExecutor::new(policy),
        }
    }

    pub fn builder(backend: B) -> DocumentClientBuilder<B> {
        DocumentClientBuilder::new(backend)
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        self.executor.policy()
    }

    /// Returns a client whose operations abort as soon as `token` is cancelled.
    pub fn with_cancellation(&self, token: CancellationToken) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            registry: Arc::clone(&self.registry),
            executor: self.executor.with_cancellation(token),
        }
    }

    /// Maps `D` to `collection`. Returns `false` if `D` was already mapped.
    pub async fn register<D: Document>(&self, collection: impl Into<String>) -> bool {
        self.registry.register::<D>(collection).await
    }

    /// Returns a schema synthesizer sharing this client's backend and registry.
    pub fn schema(&self) -> SchemaSynthesizer<B> {
        SchemaSynthesizer::new(Arc::clone(&self.backend), Arc::clone(&self.registry))
    }

    /// Fetches the document with identifier `id`, or `None` if there is none.
    pub async fn get<D: Document>(&self, id: &str) -> DocumentStoreResult<Option<D>> {
        self.find_one(doc! { ID_FIELD: id }).await
    }

    /// Returns every document of the collection, in store order.
    pub async fn get_all<D: Document>(&self) -> DocumentStoreResult<Vec<D>> {
        self.find(BsonDocument::new()).await
    }

    /// Returns the documents matching a native store filter.
    pub async fn find<D: Document>(&self, filter: BsonDocument) -> DocumentStoreResult<Vec<D>> {
        let collection = self.registry.resolve::<D>().await?;

        self.executor
            .execute("find", || self.backend.find(&collection, filter.clone(), None))
            .await?
            .into_iter()
            .map(D::from_stored)
            .collect()
    }

    /// Returns the first document matching a native store filter.
    pub async fn find_one<D: Document>(&self, filter: BsonDocument) -> DocumentStoreResult<Option<D>> {
        let collection = self.registry.resolve::<D>().await?;

        self.executor
            .execute("find_one", || self.backend.find(&collection, filter.clone(), Some(1)))
            .await?
            .into_iter()
            .next()
            .map(D::from_stored)
            .transpose()
    }

    /// Inserts `document`, assigning a new identifier first if it has none.
    ///
    /// The assigned identifier is visible through `document` afterwards.
    /// Duplicate identifiers surface as [`DocumentStoreError::StoreOperation`].
    pub async fn create<D: Document>(&self, document: &mut D) -> DocumentStoreResult<()> {
        let collection = self.registry.resolve::<D>().await?;
        document.ensure_id();
        let stored = document.to_stored()?;

        self.executor
            .execute("create", || self.backend.insert_many(&collection, vec![stored.clone()]))
            .await
    }

    /// Inserts all `documents` in one bulk request, assigning missing identifiers first.
    pub async fn create_many<D: Document>(&self, documents: &mut [D]) -> DocumentStoreResult<()> {
        let collection = self.registry.resolve::<D>().await?;
        if documents.is_empty() {
            return Ok(());
        }

        let stored = documents
            .iter_mut()
            .map(|document| {
                document.ensure_id();
                document.to_stored()
            })
            .collect::<DocumentStoreResult<Vec<_>>>()?;

        self.executor
            .execute("create_many", || self.backend.insert_many(&collection, stored.clone()))
            .await
    }

    /// Replaces the stored document `id` with `document`, after setting its identifier to `id`.
    pub async fn update<D: Document>(&self, id: &str, mut document: D) -> DocumentStoreResult<()> {
        let collection = self.registry.resolve::<D>().await?;
        document.set_id(id.to_string());
        let stored = document.to_stored()?;

        self.executor
            .execute("update", || self.backend.replace_one(&collection, id, stored.clone()))
            .await
    }

    /// Replaces every document by its own identifier in one bulk request.
    pub async fn update_many<D: Document>(&self, documents: Vec<D>) -> DocumentStoreResult<()> {
        let collection = self.registry.resolve::<D>().await?;
        if documents.is_empty() {
            return Ok(());
        }

        let replacements = documents
            .iter()
            .map(|document| {
                if document.id().is_empty() {
                    return Err(DocumentStoreError::InvalidDocument(
                        "cannot replace a document without an identifier".into(),
                    ));
                }
                Ok((document.id().to_string(), document.to_stored()?))
            })
            .collect::<DocumentStoreResult<Vec<_>>>()?;

        self.executor
            .execute("update_many", || self.backend.bulk_replace(&collection, replacements.clone()))
            .await
    }

    /// Deletes the document `id`. Deleting a missing document is not an error.
    pub async fn delete<D: Document>(&self, id: &str) -> DocumentStoreResult<()> {
        let collection = self.registry.resolve::<D>().await?;

        self.executor
            .execute("delete", || self.backend.delete_many(&collection, doc! { ID_FIELD: id }))
            .await?;

        Ok(())
    }

    /// Deletes every document whose identifier is in `ids`, in one request.
    pub async fn delete_many<D: Document>(
        &self,
        ids: impl IntoIterator<Item = impl Into<String>>,
    ) -> DocumentStoreResult<()> {
        let collection = self.registry.resolve::<D>().await?;
        let ids = ids.into_iter().map(|id| Bson::String(id.into())).collect::<Vec<_>>();
        if ids.is_empty() {
            return Ok(());
        }

        let filter = doc! { ID_FIELD: { "$in": ids } };

        self.executor
            .execute("delete_many", || self.backend.delete_many(&collection, filter.clone()))
            .await?;

        Ok(())
    }

    /// Counts documents matching `filter`, or all documents when `filter` is `None`.
    pub async fn count<D: Document>(&self, filter: Option<BsonDocument>) -> DocumentStoreResult<u64> {
        let collection = self.registry.resolve::<D>().await?;
        let filter = filter.unwrap_or_default();

        self.executor
            .execute("count", || self.backend.count(&collection, filter.clone()))
            .await
    }

    /// Creates an ascending index on `field`, optionally enforcing uniqueness.
    pub async fn create_index<D: Document>(&self, field: &str, unique: bool) -> DocumentStoreResult<()> {
        let collection = self.registry.resolve::<D>().await?;

        self.executor
            .execute("create_index", || self.backend.create_index(&collection, field, unique))
            .await
    }

    /// Shuts the backend down if this is the last handle to it.
    pub async fn shutdown(self) -> DocumentStoreResult<()> {
        match Arc::try_unwrap(self.backend) {
            Ok(backend) => backend.shutdown().await,
            Err(_) => Ok(()),
        }
    }
}

/// Builder for [`DocumentClient`] that seeds the registry from configuration.
pub struct DocumentClientBuilder<B> {
    backend: B,
    policy: RetryPolicy,
    collections: BTreeMap<String, String>,
    catalog: TypeCatalog,
    registry: Option<Arc<TypeRegistry>>,
}

impl<B: StoreBackend> DocumentClientBuilder<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            policy: RetryPolicy::default(),
            collections: BTreeMap::new(),
            catalog: TypeCatalog::new(),
            registry: None,
        }
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Configured `collection -> type name` entries, matched against the catalog at build time.
    pub fn collections(mut self, collections: BTreeMap<String, String>) -> Self {
        self.collections = collections;
        self
    }

    pub fn catalog(mut self, catalog: TypeCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Shares an existing registry instead of creating a new one.
    pub fn registry(mut self, registry: Arc<TypeRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Builds the client and reports which configured collections were registered.
    pub async fn build(self) -> DocumentStoreResult<(DocumentClient<B>, RegistrationReport)> {
        let registry = self.registry.unwrap_or_default();
        let report = registry
            .register_from_config(&self.collections, &self.catalog)
            .await;

        Ok((
            DocumentClient::from_parts(Arc::new(self.backend), registry, self.policy),
            report,
        ))
    }
}
