//! Main docbridge crate: a typed, resilient document-access layer.
//!
//! This crate is the primary entry point for users of docbridge. It re-exports
//! the core types from the sub-crates and provides access to the storage
//! backends.
//!
//! # Features
//!
//! - **Typed documents** - Serde types with a string identifier, assigned on creation
//! - **Type registry** - Each document type maps to one collection, first registration wins
//! - **Resilient execution** - Transient store failures are retried with exponential backoff
//! - **Schema synthesis** - `$jsonSchema` validators generated from your types and applied to the store
//!
//! # Quick Start
//!
//! ```ignore
//! use docbridge::{prelude::*, memory::InMemoryStore};
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Default, Serialize, Deserialize, DocumentSchema)]
//! pub struct User {
//!     pub id: String,
//!     #[schema(required, max_length = 50)]
//!     pub name: String,
//!     #[schema(range(min = 0, max = 150))]
//!     pub age: i32,
//! }
//!
//! impl Document for User {
//!     fn id(&self) -> &str { &self.id }
//!     fn set_id(&mut self, id: String) { self.id = id; }
//! }
//!
//! #[tokio::main]
//! async fn main() -> DocumentStoreResult<()> {
//!     let client = DocumentClient::new(InMemoryStore::new());
//!
//!     // Creates the "users" collection with a validator and registers User -> "users".
//!     client.schema().synthesize_for_type::<User>().await?;
//!
//!     let mut user = User { name: "Ann".into(), age: 34, ..Default::default() };
//!     client.create(&mut user).await?;
//!
//!     let adults: Vec<User> = client.find(doc! { "age": { "$gte": 18 } }).await?;
//!     println!("{adults:?}");
//!
//!     client.shutdown().await
//! }
//! ```
//!
//! # Configuration
//!
//! Collections can also be mapped from configuration. Entries are matched to
//! the types in a [`TypeCatalog`](schema::TypeCatalog) by case-insensitive
//! type name; entries that match nothing are reported, not fatal.
//!
//! ```ignore
//! let config = ClientConfig::from_json_str(r#"{
//!     "connection_string": "mongodb://localhost:27017",
//!     "database_name": "app",
//!     "collections": { "people": "User" }
//! }"#)?;
//!
//! let (client, report) = docbridge::mongodb::connect(&config, TypeCatalog::new().with::<User>()).await?;
//! assert!(report.unmatched.is_empty());
//! ```
//!
//! # Cancellation
//!
//! ```ignore
//! let token = CancellationToken::new();
//! let scoped = client.with_cancellation(token.clone());
//!
//! token.cancel();
//! assert!(matches!(scoped.get::<User>("u1").await, Err(DocumentStoreError::Cancelled)));
//! ```
//!
//! # Backends
//!
//! - [`memory`] - In-process storage with MongoDB filter and validator semantics
//! - [`mongodb`] - MongoDB backend (requires the `mongodb` feature)

pub mod prelude;

pub use docbridge_core::{backend, client, config, document, error, registry, retry, schema};
pub use docbridge_macros::{DocumentSchema, SchemaType};

// Re-export BSON types for convenience
pub use bson;
pub use tokio_util::sync::CancellationToken;

/// In-memory storage backend implementations.
pub mod memory {
    pub use docbridge_memory::{InMemoryStore, InMemoryStoreBuilder};
}

/// MongoDB storage backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use docbridge_mongodb::{MongoDbStore, MongoDbStoreBuilder, classify, connect};
}
