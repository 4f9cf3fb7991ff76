//! In-memory document storage backend for docbridge.
//!
//! This crate provides a thread-safe, in-memory implementation of the
//! `StoreBackend` trait that behaves like a MongoDB database where it matters to
//! the document client and the schema synthesizer:
//!
//! - **Native filters** - MongoDB query documents, evaluated in process
//! - **Validators** - `$jsonSchema` validators enforced with the configured action and level
//! - **Indexes** - Unique indexes reject duplicate values, as does `_id`
//! - **Commands** - `ping` and `collMod`
//!
//! It is intended for development and tests.
//!
//! # Quick Start
//!
//! ```ignore
//! use docbridge::{prelude::*, memory::InMemoryStore};
//!
//! let backend = InMemoryStore::builder().build().await?;
//! let client = DocumentClient::new(backend);
//! client.register::<User>("users").await;
//!
//! let mut user = User { name: "Alice".into(), ..Default::default() };
//! client.create(&mut user).await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as docbridge_memory;

pub(crate) mod evaluator;
pub mod store;
pub(crate) mod validation;

pub use store::{InMemoryStore, InMemoryStoreBuilder};
