//! Type-to-collection registry consulted by every client operation.
//!
//! Registration is first-write-wins: once a type is mapped, later attempts for
//! the same type are ignored. Concurrent registrations are serialized by an
//! async read-write lock, and the insert happens under the write guard, so
//! exactly one contender wins.

use mea::rwlock::RwLock;
use std::{
    any::{TypeId, type_name},
    collections::{BTreeMap, HashMap},
};
use tracing::debug;

use crate::{
    error::{DocumentStoreError, DocumentStoreResult},
    schema::{TypeCatalog, TypeDescriptor},
};

#[derive(Debug, Clone)]
struct MappingEntry {
    type_name: String,
    collection: String,
}

/// Thread-safe map from document type to collection name.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    mappings: RwLock<HashMap<TypeId, MappingEntry>>,
}

/// Outcome of populating the registry from configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegistrationReport {
    /// `(type name, collection)` pairs that were newly registered.
    pub registered: Vec<(String, String)>,
    /// `(collection, type name)` entries that matched a type already mapped elsewhere.
    pub ignored: Vec<(String, String)>,
    /// `(collection, type name)` entries with no matching type in the catalog.
    pub unmatched: Vec<(String, String)>,
}

impl RegistrationReport {
    pub fn is_clean(&self) -> bool {
        self.ignored.is_empty() && self.unmatched.is_empty()
    }
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps `D` to `collection`. Returns `false` if `D` was already mapped.
    pub async fn register<D: 'static>(&self, collection: impl Into<String>) -> bool {
        self.insert(TypeId::of::<D>(), short_type_name::<D>(), collection.into())
            .await
    }

    /// Maps the type described by `descriptor` to `collection`.
    pub async fn register_descriptor(
        &self,
        descriptor: &TypeDescriptor,
        collection: impl Into<String>,
    ) -> bool {
        self.insert(descriptor.type_id, descriptor.name.to_string(), collection.into())
            .await
    }

    /// Returns the collection mapped to `D`.
    ///
    /// # Errors
    ///
    /// [`DocumentStoreError::MappingNotFound`] if `D` was never registered.
    pub async fn resolve<D: 'static>(&self) -> DocumentStoreResult<String> {
        self.mappings
            .read()
            .await
            .get(&TypeId::of::<D>())
            .map(|entry| entry.collection.clone())
            .ok_or_else(|| DocumentStoreError::MappingNotFound(short_type_name::<D>()))
    }

    /// Collection mapped to the type with `type_id`, if any.
    pub async fn collection_of(&self, type_id: TypeId) -> Option<String> {
        self.mappings
            .read()
            .await
            .get(&type_id)
            .map(|entry| entry.collection.clone())
    }

    pub async fn contains<D: 'static>(&self) -> bool {
        self.mappings.read().await.contains_key(&TypeId::of::<D>())
    }

    pub async fn len(&self) -> usize {
        self.mappings.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.mappings.read().await.is_empty()
    }

    /// Returns every `(type name, collection)` mapping, sorted by type name.
    pub async fn snapshot(&self) -> Vec<(String, String)> {
        let mut entries = self
            .mappings
            .read()
            .await
            .values()
            .map(|entry| (entry.type_name.clone(), entry.collection.clone()))
            .collect::<Vec<_>>();

        entries.sort();
        entries
    }

    /// Registers every `collection -> type name` entry of `collections` whose
    /// type name matches a catalog entry (case-insensitive simple name).
    ///
    /// Entries that match nothing are returned in
    /// [`RegistrationReport::unmatched`] rather than dropped.
    pub async fn register_from_config(
        &self,
        collections: &BTreeMap<String, String>,
        catalog: &TypeCatalog,
    ) -> RegistrationReport {
        let mut report = RegistrationReport::default();

        for (collection, type_name) in collections {
            match catalog.find_by_name(type_name) {
                Some(descriptor) => {
                    if self.register_descriptor(descriptor, collection.clone()).await {
                        report.registered.push((descriptor.name.to_string(), collection.clone()));
                    } else {
                        report.ignored.push((collection.clone(), type_name.clone()));
                    }
                }
                None => {
                    debug!(collection = %collection, type_name = %type_name, "no catalog type matches configured collection");
                    report.unmatched.push((collection.clone(), type_name.clone()));
                }
            }
        }

        report
    }

    async fn insert(&self, type_id: TypeId, type_name: String, collection: String) -> bool {
        let mut mappings = self.mappings.write().await;

        if let Some(existing) = mappings.get(&type_id) {
            debug!(
                type_name = %type_name,
                collection = %existing.collection,
                ignored = %collection,
                "type already registered",
            );
            return false;
        }

        debug!(type_name = %type_name, collection = %collection, "registered document type");
        mappings.insert(type_id, MappingEntry { type_name, collection });

        true
    }
}

/// Unqualified type name, e.g. `User` for `my_app::model::User`.
pub(crate) fn short_type_name<T: ?Sized>() -> String {
    let full = type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);

    base.rsplit("::").next().unwrap_or(base).to_string()
}
