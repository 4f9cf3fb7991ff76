#![allow(dead_code)]

use async_trait::async_trait;
use docbridge::{
    backend::{CollectionValidation, StoreBackend},
    bson::Document as BsonDocument,
    memory::InMemoryStore,
    prelude::*,
};
use serde::{Deserialize, Serialize};
use std::sync::{
    Mutex,
    atomic::{AtomicU32, Ordering},
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, DocumentSchema)]
pub struct User {
    pub id: String,
    #[schema(required, max_length = 50)]
    pub name: String,
    #[schema(range(min = 0, max = 150))]
    pub age: i32,
    pub email: Option<String>,
}

impl Document for User {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}

impl User {
    pub fn named(name: &str, age: i32) -> Self {
        User {
            name: name.to_string(),
            age,
            ..User::default()
        }
    }
}

/// A document type that is never registered.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: String,
    pub message: String,
}

impl Document for AuditEntry {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}

/// A document type whose identifier is the stored primary key itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
}

impl Document for Ticket {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}

/// Wraps an [`InMemoryStore`], recording every call and failing the first
/// `transient_failures` data calls with a transient error.
#[derive(Debug, Default)]
pub struct ScriptedStore {
    inner: InMemoryStore,
    calls: Mutex<Vec<&'static str>>,
    transient_failures: AtomicU32,
}

impl ScriptedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(times: u32) -> Self {
        Self {
            transient_failures: AtomicU32::new(times),
            ..Self::default()
        }
    }

    /// Fails the next `times` calls, whatever failures were left before.
    pub fn fail_next(&self, times: u32) {
        self.transient_failures.store(times, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count_of(&self, name: &str) -> usize {
        self.calls().iter().filter(|call| **call == name).count()
    }

    fn record(&self, name: &'static str) -> DocumentStoreResult<()> {
        self.calls.lock().unwrap().push(name);

        let remaining = self.transient_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.transient_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(DocumentStoreError::transient("connection reset by peer"));
        }
        Ok(())
    }
}

#[async_trait]
impl StoreBackend for ScriptedStore {
    async fn find(&self, collection: &str, filter: BsonDocument, limit: Option<i64>) -> DocumentStoreResult<Vec<BsonDocument>> {
        self.record("find")?;
        self.inner.find(collection, filter, limit).await
    }

    async fn insert_many(&self, collection: &str, documents: Vec<BsonDocument>) -> DocumentStoreResult<()> {
        self.record("insert_many")?;
        self.inner.insert_many(collection, documents).await
    }

    async fn replace_one(&self, collection: &str, id: &str, document: BsonDocument) -> DocumentStoreResult<()> {
        self.record("replace_one")?;
        self.inner.replace_one(collection, id, document).await
    }

    async fn bulk_replace(&self, collection: &str, documents: Vec<(String, BsonDocument)>) -> DocumentStoreResult<()> {
        self.record("bulk_replace")?;
        self.inner.bulk_replace(collection, documents).await
    }

    async fn delete_many(&self, collection: &str, filter: BsonDocument) -> DocumentStoreResult<u64> {
        self.record("delete_many")?;
        self.inner.delete_many(collection, filter).await
    }

    async fn count(&self, collection: &str, filter: BsonDocument) -> DocumentStoreResult<u64> {
        self.record("count")?;
        self.inner.count(collection, filter).await
    }

    async fn create_index(&self, collection: &str, field: &str, unique: bool) -> DocumentStoreResult<()> {
        self.record("create_index")?;
        self.inner.create_index(collection, field, unique).await
    }

    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        self.record("list_collections")?;
        self.inner.list_collections().await
    }

    async fn create_collection(&self, name: &str, validation: Option<CollectionValidation>) -> DocumentStoreResult<()> {
        self.record("create_collection")?;
        self.inner.create_collection(name, validation).await
    }

    async fn run_command(&self, command: BsonDocument) -> DocumentStoreResult<BsonDocument> {
        self.record("run_command")?;
        self.inner.run_command(command).await
    }
}
