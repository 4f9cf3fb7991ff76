//! Core traits for document representation and serialization.
//!
//! A [`Document`] is any serde type carrying a string identifier. The client
//! assigns a fresh identifier on creation when the field is empty, and stores
//! the identifier a second time under `_id` so the store can key on it.

use bson::{Bson, Document as BsonDocument, de::deserialize_from_bson, ser::serialize_to_bson};
use serde::{Deserialize, Serialize};

use crate::error::{DocumentStoreError, DocumentStoreResult};

/// Name of the primary key field in stored documents.
pub const ID_FIELD: &str = "_id";

/// Core trait that all documents persisted through the client must implement.
///
/// # Example
///
/// ```ignore
/// use docbridge::document::Document;
/// use serde::{Serialize, Deserialize};
///
/// #[derive(Debug, Clone, Default, Serialize, Deserialize)]
/// pub struct User {
///     pub id: String,
///     pub name: String,
/// }
///
/// impl Document for User {
///     fn id(&self) -> &str { &self.id }
///     fn set_id(&mut self, id: String) { self.id = id; }
/// }
/// ```
pub trait Document: Serialize + for<'de> Deserialize<'de> + Send + Sync + 'static {
    /// Returns this document's identifier. An empty string means "not yet assigned".
    fn id(&self) -> &str;

    /// Overwrites this document's identifier.
    fn set_id(&mut self, id: String);
}

/// Generates a new globally unique document identifier.
pub fn new_document_id() -> String {
    bson::Uuid::new().to_string()
}

/// Serialization helpers available on every [`Document`].
pub trait DocumentExt: Document {
    /// Assigns a new identifier if the current one is empty. Returns the identifier.
    fn ensure_id(&mut self) -> &str;

    /// Converts this document into its stored form, with `_id` set to the identifier.
    fn to_stored(&self) -> DocumentStoreResult<BsonDocument>;

    /// Restores a document from its stored form.
    ///
    /// `_id` is kept: types that rename their identifier to `_id` read it back,
    /// others ignore it as an unknown field.
    fn from_stored(document: BsonDocument) -> DocumentStoreResult<Self>
    where
        Self: Sized;
}

impl<D: Document> DocumentExt for D {
    fn ensure_id(&mut self) -> &str {
        if self.id().is_empty() {
            self.set_id(new_document_id());
        }

        self.id()
    }

    fn to_stored(&self) -> DocumentStoreResult<BsonDocument> {
        match serialize_to_bson(self)? {
            Bson::Document(mut document) => {
                document.insert(ID_FIELD, self.id());
                Ok(document)
            }
            other => Err(DocumentStoreError::InvalidDocument(format!(
                "expected a document, found {:?}",
                other.element_type()
            ))),
        }
    }

    fn from_stored(document: BsonDocument) -> DocumentStoreResult<Self> {
        Ok(deserialize_from_bson(Bson::Document(document))?)
    }
}
