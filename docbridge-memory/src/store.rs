//! In-memory storage implementation for document stores.
//!
//! Collections hold their documents in insertion order, together with the
//! validator and indexes attached to them. All state sits behind one
//! async-aware read-write lock, so every write operation is atomic.

use async_trait::async_trait;
use bson::{Bson, Document, doc};
use mea::rwlock::RwLock;
use std::{collections::HashMap, sync::Arc};
use tracing::debug;

use docbridge_core::{
    backend::{CollectionValidation, StoreBackend, StoreBackendBuilder, ValidationAction, ValidationLevel},
    document::ID_FIELD,
    error::{DocumentStoreError, DocumentStoreResult},
};

use crate::{evaluator, validation};

#[derive(Debug, Clone, PartialEq)]
struct IndexSpec {
    field: String,
    unique: bool,
}

#[derive(Debug, Default)]
struct MemoryCollection {
    documents: Vec<Document>,
    validation: Option<CollectionValidation>,
    indexes: Vec<IndexSpec>,
}

impl MemoryCollection {
    fn position(&self, id: &Bson) -> Option<usize> {
        self.documents.iter().position(|d| d.get(ID_FIELD) == Some(id))
    }

    fn unique_fields(&self) -> impl Iterator<Item = &str> {
        std::iter::once(ID_FIELD).chain(
            self.indexes
                .iter()
                .filter(|index| index.unique)
                .map(|index| index.field.as_str()),
        )
    }

    /// Rejects `document` if it collides with a stored document other than
    /// the one at `skip` on `_id` or on any unique index.
    fn check_unique(&self, collection: &str, document: &Document, skip: Option<usize>) -> DocumentStoreResult<()> {
        for field in self.unique_fields() {
            let value = unique_key(document, field);
            let collides = self
                .documents
                .iter()
                .enumerate()
                .any(|(i, stored)| Some(i) != skip && unique_key(stored, field) == value);

            if collides {
                return Err(duplicate_key(collection, field, &value));
            }
        }

        Ok(())
    }
}

type StoreMap = HashMap<String, MemoryCollection>;

/// Thread-safe in-memory document storage backend.
///
/// Filters use the MongoDB query format (see [`evaluator`](crate::evaluator)),
/// validators are enforced on writes, and unique indexes reject duplicate
/// values, so code tested against this store behaves the same against MongoDB.
///
/// `InMemoryStore` is cloneable. Clones share the same underlying data.
///
/// # Example
///
/// ```ignore
/// use docbridge_memory::InMemoryStore;
/// use docbridge::backend::StoreBackend;
/// use bson::doc;
///
/// let store = InMemoryStore::new();
/// store.insert_many("users", vec![doc! { "_id": "u1", "name": "Alice" }]).await?;
///
/// let found = store.find("users", doc! { "name": "Alice" }, None).await?;
/// assert_eq!(found.len(), 1);
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    store: Arc<RwLock<StoreMap>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }

    /// Returns the validation settings attached to `collection`, if any.
    pub async fn validation(&self, collection: &str) -> Option<CollectionValidation> {
        self.store
            .read()
            .await
            .get(collection)
            .and_then(|c| c.validation.clone())
    }
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn find(&self, collection: &str, filter: Document, limit: Option<i64>) -> DocumentStoreResult<Vec<Document>> {
        let store = self.store.read().await;
        let Some(collection) = store.get(collection) else {
            return Ok(vec![]);
        };

        // A zero or negative limit means no limit.
        let limit = limit
            .filter(|limit| *limit > 0)
            .map_or(usize::MAX, |limit| limit as usize);

        Ok(evaluator::filter_documents(&collection.documents, &filter)?
            .into_iter()
            .take(limit)
            .cloned()
            .collect())
    }

    async fn insert_many(&self, collection: &str, documents: Vec<Document>) -> DocumentStoreResult<()> {
        let mut store = self.store.write().await;
        let target = store.entry(collection.to_string()).or_default();
        let accepted = target.documents.len();

        for document in documents {
            if !document.contains_key(ID_FIELD) {
                rollback(target, accepted);
                return Err(DocumentStoreError::InvalidDocument(format!(
                    "document inserted into {collection} has no {ID_FIELD}"
                )));
            }

            let checked = validation::check_write(collection, target.validation.as_ref(), &document, None)
                .and_then(|()| target.check_unique(collection, &document, None));

            if let Err(err) = checked {
                rollback(target, accepted);
                return Err(err);
            }

            target.documents.push(document);
        }

        debug!(collection, inserted = target.documents.len() - accepted, "inserted documents");
        Ok(())
    }

    async fn replace_one(&self, collection: &str, id: &str, document: Document) -> DocumentStoreResult<()> {
        let mut store = self.store.write().await;
        let Some(target) = store.get_mut(collection) else {
            return Ok(());
        };

        replace(collection, target, id, document)
    }

    async fn bulk_replace(&self, collection: &str, documents: Vec<(String, Document)>) -> DocumentStoreResult<()> {
        let mut store = self.store.write().await;
        let Some(target) = store.get_mut(collection) else {
            return Ok(());
        };

        // Ordered semantics: stop at the first failure, keeping earlier replacements.
        for (id, document) in documents {
            replace(collection, target, &id, document)?;
        }

        Ok(())
    }

    async fn delete_many(&self, collection: &str, filter: Document) -> DocumentStoreResult<u64> {
        let mut store = self.store.write().await;
        let Some(target) = store.get_mut(collection) else {
            return Ok(0);
        };

        let mut keep = Vec::with_capacity(target.documents.len());
        for document in &target.documents {
            keep.push(!evaluator::matches(document, &filter)?);
        }

        let before = target.documents.len();
        let mut flags = keep.into_iter();
        target.documents.retain(|_| flags.next().unwrap_or(true));

        Ok((before - target.documents.len()) as u64)
    }

    async fn count(&self, collection: &str, filter: Document) -> DocumentStoreResult<u64> {
        let store = self.store.read().await;
        let Some(collection) = store.get(collection) else {
            return Ok(0);
        };

        Ok(evaluator::filter_documents(&collection.documents, &filter)?.len() as u64)
    }

    async fn create_index(&self, collection: &str, field: &str, unique: bool) -> DocumentStoreResult<()> {
        let mut store = self.store.write().await;
        let target = store.entry(collection.to_string()).or_default();

        if let Some(existing) = target.indexes.iter().find(|index| index.field == field) {
            if existing.unique != unique {
                return Err(DocumentStoreError::store_operation(format!(
                    "index on {collection}.{field} already exists with different options"
                )));
            }
            return Ok(());
        }

        if unique {
            for (i, document) in target.documents.iter().enumerate() {
                let value = unique_key(document, field);
                if target.documents[..i].iter().any(|d| unique_key(d, field) == value) {
                    return Err(duplicate_key(collection, field, &value));
                }
            }
        }

        target.indexes.push(IndexSpec {
            field: field.to_string(),
            unique,
        });
        debug!(collection, field, unique, "created index");

        Ok(())
    }

    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        let mut names = self.store.read().await.keys().cloned().collect::<Vec<_>>();
        names.sort();

        Ok(names)
    }

    async fn create_collection(&self, name: &str, validation: Option<CollectionValidation>) -> DocumentStoreResult<()> {
        let mut store = self.store.write().await;

        if store.contains_key(name) {
            return Err(DocumentStoreError::store_operation(format!(
                "Collection {name} already exists"
            )));
        }

        store.insert(
            name.to_string(),
            MemoryCollection {
                validation,
                ..MemoryCollection::default()
            },
        );

        Ok(())
    }

    async fn run_command(&self, command: Document) -> DocumentStoreResult<Document> {
        let Some((name, argument)) = command.iter().next() else {
            return Err(DocumentStoreError::store_operation("empty command document"));
        };

        match name.as_str() {
            "ping" => Ok(doc! { "ok": 1.0 }),
            "collMod" => {
                let collection = argument
                    .as_str()
                    .ok_or_else(|| DocumentStoreError::store_operation("collMod requires a collection name"))?;

                let mut store = self.store.write().await;
                let target = store.get_mut(collection).ok_or_else(|| {
                    DocumentStoreError::store_operation(format!("ns does not exist: {collection}"))
                })?;

                target.validation = Some(modified_validation(target.validation.take(), &command)?);
                Ok(doc! { "ok": 1.0 })
            }
            other => Err(DocumentStoreError::store_operation(format!(
                "no such command: '{other}'"
            ))),
        }
    }
}

fn replace(collection: &str, target: &mut MemoryCollection, id: &str, mut document: Document) -> DocumentStoreResult<()> {
    let key = Bson::String(id.to_string());
    let Some(position) = target.position(&key) else {
        return Ok(());
    };

    document.insert(ID_FIELD, key);
    validation::check_write(
        collection,
        target.validation.as_ref(),
        &document,
        Some(&target.documents[position]),
    )?;
    target.check_unique(collection, &document, Some(position))?;

    target.documents[position] = document;
    Ok(())
}

/// Applies `collMod` validator options on top of the current settings.
fn modified_validation(
    current: Option<CollectionValidation>,
    command: &Document,
) -> DocumentStoreResult<CollectionValidation> {
    let mut validation = current.unwrap_or(CollectionValidation {
        validator: Document::new(),
        action: ValidationAction::Error,
        level: ValidationLevel::Strict,
    });

    if let Ok(validator) = command.get_document("validator") {
        validation.validator = validator.clone();
    }
    if let Ok(level) = command.get_str("validationLevel") {
        validation.level = ValidationLevel::parse(level)
            .ok_or_else(|| DocumentStoreError::store_operation(format!("invalid validationLevel: {level}")))?;
    }
    if let Ok(action) = command.get_str("validationAction") {
        validation.action = ValidationAction::parse(action)
            .ok_or_else(|| DocumentStoreError::store_operation(format!("invalid validationAction: {action}")))?;
    }

    Ok(validation)
}

fn rollback(collection: &mut MemoryCollection, len: usize) {
    collection.documents.truncate(len);
}

/// Missing fields index as `null`, like MongoDB unique indexes.
fn unique_key(document: &Document, field: &str) -> Bson {
    evaluator::lookup(document, field).cloned().unwrap_or(Bson::Null)
}

fn duplicate_key(collection: &str, field: &str, value: &Bson) -> DocumentStoreError {
    DocumentStoreError::store_operation(format!(
        "E11000 duplicate key error collection: {collection} index: {field} dup key: {value}"
    ))
}

/// Builder for constructing [`InMemoryStore`] instances.
#[derive(Default)]
pub struct InMemoryStoreBuilder {
    collections: Vec<(String, Option<CollectionValidation>)>,
}

impl InMemoryStoreBuilder {
    /// Pre-creates `name`, optionally with a validator attached.
    pub fn collection(mut self, name: impl Into<String>, validation: Option<CollectionValidation>) -> Self {
        self.collections.push((name.into(), validation));
        self
    }
}

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        let store = InMemoryStore::new();

        for (name, validation) in self.collections {
            store.create_collection(&name, validation).await?;
        }

        Ok(store)
    }
}
