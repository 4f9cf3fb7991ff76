//! A typed, resilient document-access layer for schemaless document stores.
//!
//! This crate is the core of the docbridge project and provides:
//!
//! - **Document traits** ([`document`]) - String-identified documents and their stored form
//! - **Store driver boundary** ([`backend`]) - The trait concrete stores implement
//! - **Type registry** ([`registry`]) - Document type to collection mapping, first write wins
//! - **Resilient execution** ([`retry`]) - Bounded exponential backoff with cancellation
//! - **Document client** ([`client`]) - Typed CRUD, query and index operations
//! - **Schema synthesis** ([`schema`]) - `$jsonSchema` validators generated from type metadata
//! - **Configuration** ([`config`]) - Connection settings and static collection mapping
//! - **Error handling** ([`error`]) - The error taxonomy shared by every crate
//!
//! # Example
//!
//! ```ignore
//! use docbridge::{prelude::*, memory::InMemoryStore};
//!
//! #[derive(Debug, Clone, Default, Serialize, Deserialize, DocumentSchema)]
//! pub struct User {
//!     pub id: String,
//!     #[schema(required, max_length = 50)]
//!     pub name: String,
//! }
//!
//! impl Document for User {
//!     fn id(&self) -> &str { &self.id }
//!     fn set_id(&mut self, id: String) { self.id = id; }
//! }
//!
//! let client = DocumentClient::new(InMemoryStore::new());
//! client.schema().synthesize_for_type::<User>().await?;
//!
//! let mut user = User { name: "Ann".into(), ..Default::default() };
//! client.create(&mut user).await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as docbridge_core;

pub mod backend;
pub mod client;
pub mod config;
pub mod document;
pub mod error;
pub mod registry;
pub mod retry;
pub mod schema;
