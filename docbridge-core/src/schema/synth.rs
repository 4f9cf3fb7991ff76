//! Validator synthesis and reconciliation against the live store.

use bson::{Bson, doc};
use inflector::Inflector;
use std::sync::Arc;
use tracing::{info, warn};

use crate::{
    backend::{CollectionValidation, StoreBackend, ValidationAction, ValidationLevel},
    error::DocumentStoreResult,
    registry::TypeRegistry,
    schema::{
        descriptor::{Constraint, DocumentSchema, FieldDescriptor, FieldKind, FieldType, TypeCatalog, TypeDescriptor},
        validator::{PropertySchema, ValidatorDocument},
    },
};

/// Validation action attached to synthesized collections: reject violations.
pub const VALIDATION_ACTION: ValidationAction = ValidationAction::Error;
/// Validation level attached to synthesized collections: check every write.
pub const VALIDATION_LEVEL: ValidationLevel = ValidationLevel::Strict;

/// A field left out of the validator because its type has no schema form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedField {
    /// Dotted path of the field; array elements are written as `field[]`.
    pub path: String,
    pub reason: String,
}

/// Everything synthesis decides for a type before talking to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaPlan {
    pub type_name: &'static str,
    pub collection: String,
    pub validator: ValidatorDocument,
    pub skipped: Vec<SkippedField>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileAction {
    /// The collection did not exist and was created with the validator.
    Created,
    /// The collection existed and its validator was replaced.
    Modified,
}

/// Result of synthesizing and applying the validator for one type.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisReport {
    pub type_name: &'static str,
    pub collection: String,
    pub action: ReconcileAction,
    pub skipped: Vec<SkippedField>,
    /// Collection the registry maps the type to after synthesis. Differs from
    /// `collection` when the type was already registered elsewhere.
    pub mapped_collection: String,
}

impl SynthesisReport {
    /// Whether client operations for the type target the validated collection.
    pub fn is_mapped_here(&self) -> bool {
        self.mapped_collection == self.collection
    }
}

/// Collection name for a type: the explicit override, else the lower-cased,
/// pluralized type name (`User` -> `users`, `Person` -> `people`).
pub fn collection_name_for(descriptor: &TypeDescriptor) -> String {
    match descriptor.collection {
        Some(name) => name.to_string(),
        None => descriptor.name.to_lowercase().to_plural(),
    }
}

/// Builds the validator for a type. Pure: no store access.
pub fn build_validator(descriptor: &TypeDescriptor) -> SchemaPlan {
    let mut skipped = Vec::new();
    let validator = object_schema(&descriptor.fields, "", &mut skipped);

    SchemaPlan {
        type_name: descriptor.name,
        collection: collection_name_for(descriptor),
        validator,
        skipped,
    }
}

fn object_schema(fields: &[FieldDescriptor], prefix: &str, skipped: &mut Vec<SkippedField>) -> ValidatorDocument {
    let mut validator = ValidatorDocument::new();

    for field in fields {
        let path = if prefix.is_empty() {
            field.name.clone()
        } else {
            format!("{prefix}.{}", field.name)
        };

        let Some(schema) = property_schema(&field.field_type, &field.constraints, &path, skipped) else {
            continue;
        };

        validator = validator.property(field.name.clone(), schema);
        if field.is_required() {
            validator = validator.require(field.name.clone());
        }
    }

    validator
}

fn property_schema(
    field_type: &FieldType,
    constraints: &[Constraint],
    path: &str,
    skipped: &mut Vec<SkippedField>,
) -> Option<PropertySchema> {
    let schema = match &field_type.kind {
        FieldKind::String => {
            let mut schema = PropertySchema::typed("string");

            for constraint in constraints {
                match constraint {
                    Constraint::MinLength(min) => schema.min_length = Some(*min),
                    Constraint::MaxLength(max) => schema.max_length = Some(*max),
                    Constraint::Pattern(pattern) => schema.pattern = Some(pattern.clone()),
                    Constraint::Enumeration(values) => {
                        schema.enumeration = Some(values.iter().map(|v| Bson::from(v.as_str())).collect())
                    }
                    _ => {}
                }
            }
            schema
        }
        FieldKind::Int => ranged("int", constraints),
        FieldKind::Long => ranged("long", constraints),
        FieldKind::Double => ranged("double", constraints),
        FieldKind::Decimal => PropertySchema::typed("decimal"),
        FieldKind::Bool => PropertySchema::typed("bool"),
        FieldKind::Timestamp => PropertySchema::typed("date"),
        FieldKind::ObjectId => PropertySchema::typed("objectId"),
        FieldKind::Uuid => PropertySchema::typed("binData"),
        FieldKind::Enumeration(members) => {
            PropertySchema::enumeration(members.iter().map(|m| Bson::from(m.as_str())).collect())
        }
        FieldKind::Array(element) => PropertySchema {
            items: property_schema(element, &[], &format!("{path}[]"), skipped).map(Box::new),
            ..PropertySchema::typed("array")
        },
        FieldKind::Object(fields) => PropertySchema {
            object: Some(object_schema(fields, path, skipped)),
            ..PropertySchema::typed("object")
        },
        FieldKind::Unsupported(description) => {
            warn!(field = %path, kind = %description, "field type has no schema form, omitting it from the validator");
            skipped.push(SkippedField {
                path: path.to_string(),
                reason: format!("unsupported type: {description}"),
            });
            return None;
        }
    };

    Some(if field_type.nullable { schema.allow_null() } else { schema })
}

fn ranged(bson_type: &'static str, constraints: &[Constraint]) -> PropertySchema {
    let mut schema = PropertySchema::typed(bson_type);

    for constraint in constraints {
        if let Constraint::Range { min, max } = constraint {
            schema.minimum = *min;
            schema.maximum = *max;
        }
    }
    schema
}

/// Generates validators from type descriptors and applies them to the store.
///
/// Store failures propagate unchanged and are never retried here. Synthesis
/// runs at setup time, so the caller decides whether to run it again.
#[derive(Debug)]
pub struct SchemaSynthesizer<B> {
    backend: Arc<B>,
    registry: Arc<TypeRegistry>,
}

impl<B> Clone for SchemaSynthesizer<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<B: StoreBackend> SchemaSynthesizer<B> {
    pub fn new(backend: Arc<B>, registry: Arc<TypeRegistry>) -> Self {
        Self { backend, registry }
    }

    pub async fn synthesize_for_type<D: DocumentSchema>(&self) -> DocumentStoreResult<SynthesisReport> {
        self.synthesize_descriptor(&D::descriptor()).await
    }

    /// Synthesizes every type in `catalog`, in catalog order, stopping at the first failure.
    pub async fn synthesize_catalog(&self, catalog: &TypeCatalog) -> DocumentStoreResult<Vec<SynthesisReport>> {
        let mut reports = Vec::with_capacity(catalog.len());

        for descriptor in catalog.iter() {
            reports.push(self.synthesize_descriptor(descriptor).await?);
        }

        Ok(reports)
    }

    /// Builds the validator for `descriptor`, applies it, then registers the type.
    pub async fn synthesize_descriptor(&self, descriptor: &TypeDescriptor) -> DocumentStoreResult<SynthesisReport> {
        let plan = build_validator(descriptor);
        let action = self.reconcile(&plan.collection, &plan.validator).await?;

        self.registry
            .register_descriptor(descriptor, plan.collection.clone())
            .await;
        let mapped_collection = self
            .registry
            .collection_of(descriptor.type_id)
            .await
            .unwrap_or_else(|| plan.collection.clone());

        if mapped_collection != plan.collection {
            warn!(
                type_name = plan.type_name,
                validated = %plan.collection,
                mapped = %mapped_collection,
                "type is registered to a different collection than the one carrying its validator",
            );
        }

        Ok(SynthesisReport {
            type_name: plan.type_name,
            collection: plan.collection,
            action,
            skipped: plan.skipped,
            mapped_collection,
        })
    }

    /// Creates `collection` with `validator` attached, or replaces the
    /// validator of the existing collection.
    pub async fn reconcile(&self, collection: &str, validator: &ValidatorDocument) -> DocumentStoreResult<ReconcileAction> {
        let exists = self
            .backend
            .list_collections()
            .await?
            .iter()
            .any(|name| name == collection);

        if exists {
            self.backend
                .run_command(doc! {
                    "collMod": collection,
                    "validator": validator.to_validator(),
                    "validationLevel": VALIDATION_LEVEL.as_str(),
                    "validationAction": VALIDATION_ACTION.as_str(),
                })
                .await?;

            info!(collection, "replaced collection validator");
            Ok(ReconcileAction::Modified)
        } else {
            self.backend
                .create_collection(
                    collection,
                    Some(CollectionValidation {
                        validator: validator.to_validator(),
                        action: VALIDATION_ACTION,
                        level: VALIDATION_LEVEL,
                    }),
                )
                .await?;

            info!(collection, "created collection with validator");
            Ok(ReconcileAction::Created)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::any::TypeId;

    fn descriptor(name: &'static str, collection: Option<&'static str>, fields: Vec<FieldDescriptor>) -> TypeDescriptor {
        TypeDescriptor {
            type_id: TypeId::of::<()>(),
            name,
            collection,
            fields,
        }
    }

    #[test]
    fn name_and_age_example() {
        let plan = build_validator(&descriptor(
            "Person",
            None,
            vec![
                FieldDescriptor::new("name", FieldType::new(FieldKind::String))
                    .with_constraint(Constraint::Required)
                    .with_constraint(Constraint::MaxLength(50)),
                FieldDescriptor::new("age", FieldType::new(FieldKind::Int))
                    .with_constraint(Constraint::Range { min: Some(0), max: Some(150) }),
            ],
        ));

        assert_eq!(plan.validator.required(), ["name".to_string()]);
        assert_eq!(
            plan.validator.to_document(),
            doc! {
                "bsonType": "object",
                "required": ["name"],
                "properties": {
                    "name": { "bsonType": "string", "maxLength": 50 },
                    "age": { "bsonType": "int", "minimum": 0, "maximum": 150 },
                },
            }
        );
        assert!(plan.skipped.is_empty());
    }

    #[test]
    fn collection_name_is_override_or_plural() {
        assert_eq!(collection_name_for(&descriptor("User", None, vec![])), "users");
        assert_eq!(collection_name_for(&descriptor("Category", None, vec![])), "categories");
        assert_eq!(collection_name_for(&descriptor("User", Some("accounts"), vec![])), "accounts");
    }

    #[test]
    fn fixed_tags_ignore_inapplicable_constraints() {
        let plan = build_validator(&descriptor(
            "Reading",
            None,
            vec![
                FieldDescriptor::new("total", FieldType::new(FieldKind::Long))
                    .with_constraint(Constraint::Range { min: Some(0), max: None }),
                FieldDescriptor::new("ratio", FieldType::new(FieldKind::Double)),
                FieldDescriptor::new("price", FieldType::new(FieldKind::Decimal)),
                FieldDescriptor::new("active", FieldType::new(FieldKind::Bool)),
                FieldDescriptor::new("taken_at", FieldType::new(FieldKind::Timestamp)),
                FieldDescriptor::new("ref_id", FieldType::new(FieldKind::ObjectId)),
                FieldDescriptor::new("token", FieldType::new(FieldKind::Uuid)),
            ],
        ));

        assert_eq!(
            plan.validator.to_document().get_document("properties").unwrap(),
            &doc! {
                "total": { "bsonType": "long" },
                "ratio": { "bsonType": "double" },
                "price": { "bsonType": "decimal" },
                "active": { "bsonType": "bool" },
                "taken_at": { "bsonType": "date" },
                "ref_id": { "bsonType": "objectId" },
                "token": { "bsonType": "binData" },
            }
        );
    }

    #[test]
    fn enumerations_patterns_and_nullability() {
        let plan = build_validator(&descriptor(
            "Account",
            None,
            vec![
                FieldDescriptor::new("status", FieldType::enumeration(["Active", "Suspended"])),
                FieldDescriptor::new("email", FieldType::new(FieldKind::String).nullable())
                    .with_constraint(Constraint::Pattern("^.+@.+$".into())),
                FieldDescriptor::new("tier", FieldType::new(FieldKind::String))
                    .with_constraint(Constraint::Enumeration(vec!["free".into(), "pro".into()])),
            ],
        ));

        let properties = plan.validator.to_document().get_document("properties").unwrap().clone();
        assert_eq!(properties.get_document("status").unwrap(), &doc! { "enum": ["Active", "Suspended"] });
        assert_eq!(
            properties.get_document("email").unwrap(),
            &doc! { "bsonType": ["string", "null"], "pattern": "^.+@.+$" }
        );
        assert_eq!(
            properties.get_document("tier").unwrap(),
            &doc! { "bsonType": "string", "enum": ["free", "pro"] }
        );
        assert!(plan.validator.required().is_empty());
    }

    #[test]
    fn arrays_recurse_into_full_element_schema() {
        let line = vec![
            FieldDescriptor::new("sku", FieldType::new(FieldKind::String)).with_constraint(Constraint::Required),
            FieldDescriptor::new("quantity", FieldType::new(FieldKind::Int))
                .with_constraint(Constraint::Range { min: Some(1), max: None }),
        ];
        let plan = build_validator(&descriptor(
            "Order",
            None,
            vec![FieldDescriptor::new("lines", FieldType::array(FieldType::object(line)))],
        ));

        assert_eq!(
            plan.validator.to_document().get_document("properties").unwrap().get_document("lines").unwrap(),
            &doc! {
                "bsonType": "array",
                "items": {
                    "bsonType": "object",
                    "required": ["sku"],
                    "properties": {
                        "sku": { "bsonType": "string" },
                        "quantity": { "bsonType": "int", "minimum": 1 },
                    },
                },
            }
        );
    }

    #[test]
    fn optional_embedded_objects_accept_null() {
        let address = vec![
            FieldDescriptor::new("city", FieldType::new(FieldKind::String)).with_constraint(Constraint::Required),
        ];
        let plan = build_validator(&descriptor(
            "Customer",
            None,
            vec![
                FieldDescriptor::new("address", FieldType::object(address.clone()).nullable()),
                FieldDescriptor::new("billing", FieldType::object(address)),
            ],
        ));

        let properties = plan.validator.to_document().get_document("properties").unwrap().clone();
        assert_eq!(
            properties.get_document("address").unwrap(),
            &doc! {
                "bsonType": ["object", "null"],
                "required": ["city"],
                "properties": { "city": { "bsonType": "string" } },
            }
        );
        assert_eq!(properties.get_document("billing").unwrap().get_str("bsonType").unwrap(), "object");
    }

    #[test]
    fn unsupported_fields_are_omitted_and_reported() {
        let plan = build_validator(&descriptor(
            "Profile",
            None,
            vec![
                FieldDescriptor::new("attributes", FieldType::unsupported("map"))
                    .with_constraint(Constraint::Required),
                FieldDescriptor::new("history", FieldType::array(FieldType::unsupported("map"))),
                FieldDescriptor::new("nickname", FieldType::new(FieldKind::String)),
            ],
        ));

        let properties = plan.validator.to_document().get_document("properties").unwrap().clone();
        assert!(properties.get("attributes").is_none());
        assert!(plan.validator.required().is_empty());
        assert_eq!(properties.get_document("history").unwrap(), &doc! { "bsonType": "array" });
        assert_eq!(
            plan.skipped.iter().map(|s| s.path.as_str()).collect::<Vec<_>>(),
            vec!["attributes", "history[]"],
        );
    }
}
