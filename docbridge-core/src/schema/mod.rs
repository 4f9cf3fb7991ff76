//! Server-side validation schemas synthesized from type metadata.
//!
//! The pipeline has three stages:
//!
//! 1. [`descriptor`] - field descriptors and constraints, produced by
//!    `#[derive(DocumentSchema)]` / `#[derive(SchemaType)]` or by hand
//! 2. [`validator`] - a typed builder for the `$jsonSchema` document
//! 3. [`synth`] - walks descriptors into validators and reconciles them with
//!    the store (create the collection, or `collMod` an existing one)
//!
//! # Example
//!
//! ```ignore
//! use docbridge::prelude::*;
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
//! let report = client.schema().synthesize_for_type::<User>().await?;
//! assert_eq!(report.collection, "users");
//! ```

pub mod descriptor;
pub mod synth;
pub mod validator;

pub use descriptor::{
    Constraint, DocumentSchema, FieldDescriptor, FieldKind, FieldType, SchemaType, TypeCatalog, TypeDescriptor,
};
pub use synth::{
    ReconcileAction, SchemaPlan, SchemaSynthesizer, SkippedField, SynthesisReport, build_validator,
    collection_name_for,
};
pub use validator::{PropertySchema, ValidatorDocument};
