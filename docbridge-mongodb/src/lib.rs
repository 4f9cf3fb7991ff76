//! MongoDB backend implementation for docbridge.
//!
//! This crate provides a MongoDB-based implementation of the `StoreBackend`
//! trait. Filters are passed to the server untouched, validators are attached
//! with `create` and `collMod`, and driver errors are classified into transient
//! and permanent failures for the retry policy.
//!
//! To use this backend, include the `mongodb` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! docbridge = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! Multi-document replacement (`update_many`) uses the client-level bulk write
//! command, which needs MongoDB 8.0 or later.
//!
//! # Example
//!
//! ```ignore
//! use docbridge::{config::ClientConfig, mongodb};
//!
//! let config = ClientConfig::from_json_str(&std::fs::read_to_string("docbridge.json")?)?;
//! let (client, report) = mongodb::connect(&config, TypeCatalog::new().with::<User>()).await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as docbridge_mongodb;

pub mod store;

pub use store::{MongoDbStore, MongoDbStoreBuilder, classify};

use tracing::warn;

use docbridge_core::{
    backend::StoreBackendBuilder,
    client::DocumentClient,
    config::ClientConfig,
    error::DocumentStoreResult,
    registry::RegistrationReport,
    schema::TypeCatalog,
};

/// Connects to the configured database and builds a client whose registry is
/// seeded from `config.collections`.
///
/// Configured collections that match no catalog type are logged and reported.
pub async fn connect(
    config: &ClientConfig,
    catalog: TypeCatalog,
) -> DocumentStoreResult<(DocumentClient<MongoDbStore>, RegistrationReport)> {
    config.validate()?;

    let backend = MongoDbStoreBuilder::from_config(config).build().await?;
    let (client, report) = DocumentClient::builder(backend)
        .retry_policy(config.retry_policy())
        .collections(config.collections.clone())
        .catalog(catalog)
        .build()
        .await?;

    for (collection, type_name) in &report.unmatched {
        warn!(%collection, %type_name, "configured collection matches no known document type");
    }

    Ok((client, report))
}
