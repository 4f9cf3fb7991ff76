use async_trait::async_trait;
use bson::{Document, doc};
use futures::TryStreamExt;
use mongodb::{
    Client, Collection as MongoCollection, Database, IndexModel,
    error::{ErrorKind, RETRYABLE_WRITE_ERROR, TRANSIENT_TRANSACTION_ERROR},
    options::{
        self, ClientOptions, CreateCollectionOptions, FindOptions, IndexOptions, ReplaceOneModel,
    },
};
use tracing::{debug, info};

use docbridge_core::{
    backend::{CollectionValidation, StoreBackend, StoreBackendBuilder, ValidationAction, ValidationLevel},
    config::ClientConfig,
    document::ID_FIELD,
    error::{DocumentStoreError, DocumentStoreResult},
};

/// Maps a driver error onto the retry taxonomy.
///
/// Network failures, server selection timeouts, cleared pools and errors the
/// server labelled as retryable are transient. Everything else, including
/// validation rejections and duplicate keys, is a store operation error.
pub fn classify(err: mongodb::error::Error) -> DocumentStoreError {
    if is_transient(&err) {
        DocumentStoreError::transient(err)
    } else {
        DocumentStoreError::store_operation(err)
    }
}

fn is_transient(err: &mongodb::error::Error) -> bool {
    if err.contains_label(RETRYABLE_WRITE_ERROR) || err.contains_label(TRANSIENT_TRANSACTION_ERROR) {
        return true;
    }

    matches!(
        *err.kind,
        ErrorKind::Io(_)
            | ErrorKind::ServerSelection { .. }
            | ErrorKind::ConnectionPoolCleared { .. }
            | ErrorKind::DnsResolve { .. }
    )
}

/// A [`StoreBackend`] over one MongoDB database.
#[derive(Debug)]
pub struct MongoDbStore {
    client: Client,
    database: String,
}

impl MongoDbStore {
    pub fn new(client: Client, database: String) -> Self {
        Self { client, database }
    }

    pub fn builder(dsn: &str, database: &str) -> MongoDbStoreBuilder {
        MongoDbStoreBuilder::new(dsn, database)
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    fn database(&self) -> Database {
        self.client.database(&self.database)
    }

    fn get_collection(&self, collection_name: &str) -> MongoCollection<Document> {
        self.database().collection(collection_name)
    }
}

#[async_trait]
impl StoreBackend for MongoDbStore {
    async fn find(&self, collection: &str, filter: Document, limit: Option<i64>) -> DocumentStoreResult<Vec<Document>> {
        let mut options = FindOptions::default();
        options.limit = limit;

        self.get_collection(collection)
            .find(filter)
            .with_options(options)
            .await
            .map_err(classify)?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(classify)
    }

    async fn insert_many(&self, collection: &str, documents: Vec<Document>) -> DocumentStoreResult<()> {
        self.get_collection(collection)
            .insert_many(documents)
            .await
            .map_err(classify)?;

        Ok(())
    }

    async fn replace_one(&self, collection: &str, id: &str, document: Document) -> DocumentStoreResult<()> {
        self.get_collection(collection)
            .replace_one(doc! { ID_FIELD: id }, document)
            .await
            .map_err(classify)?;

        Ok(())
    }

    async fn bulk_replace(&self, collection: &str, documents: Vec<(String, Document)>) -> DocumentStoreResult<()> {
        let namespace = self.get_collection(collection).namespace();
        let models = documents
            .into_iter()
            .map(|(id, document)| {
                ReplaceOneModel::builder()
                    .namespace(namespace.clone())
                    .filter(doc! { ID_FIELD: id })
                    .replacement(document)
                    .build()
            })
            .collect::<Vec<_>>();

        self.client
            .bulk_write(models)
            .await
            .map_err(classify)?;

        Ok(())
    }

    async fn delete_many(&self, collection: &str, filter: Document) -> DocumentStoreResult<u64> {
        Ok(self
            .get_collection(collection)
            .delete_many(filter)
            .await
            .map_err(classify)?
            .deleted_count)
    }

    async fn count(&self, collection: &str, filter: Document) -> DocumentStoreResult<u64> {
        self.get_collection(collection)
            .count_documents(filter)
            .await
            .map_err(classify)
    }

    async fn create_index(&self, collection: &str, field: &str, unique: bool) -> DocumentStoreResult<()> {
        self.get_collection(collection)
            .create_index(
                IndexModel::builder()
                    .keys(doc! { field: 1 })
                    .options(IndexOptions::builder().unique(unique).build())
                    .build(),
            )
            .await
            .map_err(classify)?;

        debug!(collection, field, unique, "created index");
        Ok(())
    }

    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        self.database()
            .list_collection_names()
            .await
            .map_err(classify)
    }

    async fn create_collection(&self, name: &str, validation: Option<CollectionValidation>) -> DocumentStoreResult<()> {
        let options = match validation {
            Some(validation) => CreateCollectionOptions::builder()
                .validator(validation.validator)
                .validation_action(driver_action(validation.action))
                .validation_level(driver_level(validation.level))
                .build(),
            None => CreateCollectionOptions::default(),
        };

        self.database()
            .create_collection(name)
            .with_options(options)
            .await
            .map_err(classify)
    }

    async fn run_command(&self, command: Document) -> DocumentStoreResult<Document> {
        self.database()
            .run_command(command)
            .await
            .map_err(classify)
    }

    async fn shutdown(self) -> DocumentStoreResult<()> {
        self.client.shutdown().await;

        Ok(())
    }
}

fn driver_action(action: ValidationAction) -> options::ValidationAction {
    match action {
        ValidationAction::Error => options::ValidationAction::Error,
        ValidationAction::Warn => options::ValidationAction::Warn,
    }
}

fn driver_level(level: ValidationLevel) -> options::ValidationLevel {
    match level {
        ValidationLevel::Off => options::ValidationLevel::Off,
        ValidationLevel::Moderate => options::ValidationLevel::Moderate,
        ValidationLevel::Strict => options::ValidationLevel::Strict,
    }
}

/// Connects to MongoDB and verifies the connection with a `ping`.
pub struct MongoDbStoreBuilder {
    dsn: String,
    database: String,
}

impl MongoDbStoreBuilder {
    pub fn new(dsn: &str, database: &str) -> Self {
        Self {
            dsn: dsn.to_string(),
            database: database.to_string(),
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(&config.connection_string, &config.database_name)
    }
}

#[async_trait]
impl StoreBackendBuilder for MongoDbStoreBuilder {
    type Backend = MongoDbStore;

    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        ClientConfig::new(self.dsn.as_str(), self.database.as_str()).validate()?;

        let options = ClientOptions::parse(&self.dsn)
            .await
            .map_err(DocumentStoreError::connection)?;
        let client = Client::with_options(options).map_err(DocumentStoreError::connection)?;

        client
            .database(&self.database)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(DocumentStoreError::connection)?;

        info!(database = %self.database, "connected to MongoDB");
        Ok(MongoDbStore::new(client, self.database))
    }
}
