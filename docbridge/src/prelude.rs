//! Convenient re-exports of commonly used types from docbridge.
//!
//! ```ignore
//! use docbridge::prelude::*;
//! ```

pub use bson::doc;
pub use docbridge_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    client::{DocumentClient, DocumentClientBuilder},
    config::ClientConfig,
    document::{Document, DocumentExt},
    error::{DocumentStoreError, DocumentStoreResult},
    registry::{RegistrationReport, TypeRegistry},
    retry::{ResilientExecutor, RetryPolicy},
    schema::{DocumentSchema, SchemaSynthesizer, SchemaType, SynthesisReport, TypeCatalog},
};
pub use docbridge_macros::{DocumentSchema, SchemaType};
pub use tokio_util::sync::CancellationToken;
