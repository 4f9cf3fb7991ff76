//! Collection validator enforcement.
//!
//! Validators are either `{ "$jsonSchema": { ... } }` documents, checked with
//! the `$jsonSchema` keyword subset the schema synthesizer emits, or plain
//! query documents, checked with the filter [`evaluator`](crate::evaluator).
//!
//! Supported `$jsonSchema` keywords: `bsonType`, `required`, `properties`,
//! `minLength`, `maxLength`, `pattern`, `minimum`, `maximum`, `enum`, `items`.

use bson::{Bson, Document};
use regex::Regex;
use tracing::warn;

use docbridge_core::{
    backend::{CollectionValidation, ValidationAction, ValidationLevel},
    error::{DocumentStoreError, DocumentStoreResult},
};

use crate::evaluator;

/// Checks a write against the collection's validation settings.
///
/// `previous` is the stored document an update replaces, `None` for inserts.
/// With [`ValidationLevel::Moderate`], updates to documents that were already
/// invalid are not checked.
pub(crate) fn check_write(
    collection: &str,
    validation: Option<&CollectionValidation>,
    document: &Document,
    previous: Option<&Document>,
) -> DocumentStoreResult<()> {
    let Some(validation) = validation else {
        return Ok(());
    };

    match validation.level {
        ValidationLevel::Off => return Ok(()),
        ValidationLevel::Moderate => {
            if let Some(previous) = previous
                && validate(&validation.validator, previous).is_err()
            {
                return Ok(());
            }
        }
        ValidationLevel::Strict => {}
    }

    let Err(reason) = validate(&validation.validator, document) else {
        return Ok(());
    };

    match validation.action {
        ValidationAction::Error => Err(DocumentStoreError::store_operation(format!(
            "Document failed validation in {collection}: {reason}"
        ))),
        ValidationAction::Warn => {
            warn!(collection, %reason, "document failed validation, accepted with warning");
            Ok(())
        }
    }
}

/// Validates `document` against a validator expression.
///
/// Returns a description of the first violation found.
pub(crate) fn validate(validator: &Document, document: &Document) -> Result<(), String> {
    match validator.get_document("$jsonSchema") {
        Ok(schema) => validate_object(schema, document, ""),
        Err(_) => match evaluator::matches(document, validator) {
            Ok(true) => Ok(()),
            Ok(false) => Err("document does not match the validator expression".into()),
            Err(err) => Err(err.to_string()),
        },
    }
}

fn validate_object(schema: &Document, document: &Document, path: &str) -> Result<(), String> {
    if let Ok(required) = schema.get_array("required") {
        for name in required.iter().filter_map(Bson::as_str) {
            if !document.contains_key(name) {
                return Err(format!("missing required field {}", join(path, name)));
            }
        }
    }

    if let Ok(properties) = schema.get_document("properties") {
        for (name, property) in properties {
            let (Some(value), Some(property)) = (document.get(name), property.as_document()) else {
                continue;
            };
            validate_value(property, value, &join(path, name))?;
        }
    }

    Ok(())
}

fn validate_value(schema: &Document, value: &Bson, path: &str) -> Result<(), String> {
    if let Some(types) = schema.get("bsonType") {
        let accepted = match types {
            Bson::String(alias) => type_matches(alias, value),
            Bson::Array(aliases) => aliases
                .iter()
                .filter_map(Bson::as_str)
                .any(|alias| type_matches(alias, value)),
            _ => true,
        };
        if !accepted {
            return Err(format!("{path} has the wrong type ({:?})", value.element_type()));
        }
    }

    if let Ok(options) = schema.get_array("enum")
        && !options.iter().any(|option| option == value)
    {
        return Err(format!("{path} is not one of the allowed values"));
    }

    match value {
        Bson::String(s) => {
            let length = s.chars().count() as f64;
            if let Some(min) = number(schema, "minLength")
                && length < min
            {
                return Err(format!("{path} is shorter than {min}"));
            }
            if let Some(max) = number(schema, "maxLength")
                && length > max
            {
                return Err(format!("{path} is longer than {max}"));
            }
            if let Ok(pattern) = schema.get_str("pattern") {
                let regex = Regex::new(pattern).map_err(|e| format!("invalid pattern for {path}: {e}"))?;
                if !regex.is_match(s) {
                    return Err(format!("{path} does not match pattern {pattern}"));
                }
            }
        }
        Bson::Array(items) => {
            if let Ok(item_schema) = schema.get_document("items") {
                for (index, item) in items.iter().enumerate() {
                    validate_value(item_schema, item, &format!("{path}[{index}]"))?;
                }
            }
        }
        Bson::Document(inner) => validate_object(schema, inner, path)?,
        _ => {}
    }

    if let Some(value) = as_f64(value) {
        if let Some(min) = number(schema, "minimum")
            && value < min
        {
            return Err(format!("{path} is less than {min}"));
        }
        if let Some(max) = number(schema, "maximum")
            && value > max
        {
            return Err(format!("{path} is greater than {max}"));
        }
    }

    Ok(())
}

fn type_matches(alias: &str, value: &Bson) -> bool {
    match (alias, value) {
        ("string", Bson::String(_))
        | ("int", Bson::Int32(_))
        | ("long", Bson::Int64(_))
        | ("double", Bson::Double(_))
        | ("decimal", Bson::Decimal128(_))
        | ("bool", Bson::Boolean(_))
        | ("date", Bson::DateTime(_))
        | ("objectId", Bson::ObjectId(_))
        | ("binData", Bson::Binary(_))
        | ("array", Bson::Array(_))
        | ("object", Bson::Document(_))
        | ("null", Bson::Null) => true,
        ("number", Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_)) => true,
        _ => false,
    }
}

fn number(schema: &Document, key: &str) -> Option<f64> {
    schema.get(key).and_then(as_f64)
}

fn as_f64(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(n) => Some(*n as f64),
        Bson::Int64(n) => Some(*n as f64),
        Bson::Double(n) => Some(*n),
        _ => None,
    }
}

fn join(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{path}.{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn user_validator() -> Document {
        doc! {
            "$jsonSchema": {
                "bsonType": "object",
                "required": ["name"],
                "properties": {
                    "name": { "bsonType": "string", "maxLength": 5 },
                    "age": { "bsonType": "int", "minimum": 0, "maximum": 150 },
                    "email": { "bsonType": ["string", "null"], "pattern": "^[^@]+@[^@]+$" },
                    "role": { "bsonType": "string", "enum": ["admin", "member"] },
                    "tags": { "bsonType": "array", "items": { "bsonType": "string", "minLength": 2 } },
                    "address": {
                        "bsonType": "object",
                        "required": ["city"],
                        "properties": { "city": { "bsonType": "string" } },
                    },
                },
            }
        }
    }

    fn strict(validator: Document) -> CollectionValidation {
        CollectionValidation {
            validator,
            action: ValidationAction::Error,
            level: ValidationLevel::Strict,
        }
    }

    #[test]
    fn accepts_conforming_documents() {
        let document = doc! {
            "_id": "u1",
            "name": "Ann",
            "age": 34,
            "email": Bson::Null,
            "role": "admin",
            "tags": ["ops"],
            "address": { "city": "Oslo" },
        };

        assert_eq!(validate(&user_validator(), &document), Ok(()));
    }

    #[test]
    fn reports_each_kind_of_violation() {
        let validator = user_validator();
        let cases = [
            doc! { "age": 3 },
            doc! { "name": 7 },
            doc! { "name": "Annabel" },
            doc! { "name": "Ann", "age": 200 },
            doc! { "name": "Ann", "email": "nope" },
            doc! { "name": "Ann", "role": "owner" },
            doc! { "name": "Ann", "tags": ["ok", "x"] },
            doc! { "name": "Ann", "address": {} },
        ];

        for document in cases {
            assert!(validate(&validator, &document).is_err(), "{document} should be rejected");
        }
    }

    #[test]
    fn query_expression_validators_use_the_filter_evaluator() {
        let validator = doc! { "age": { "$gte": 18 } };

        assert!(validate(&validator, &doc! { "age": 20 }).is_ok());
        assert!(validate(&validator, &doc! { "age": 10 }).is_err());
    }

    #[test]
    fn action_and_level_control_enforcement() {
        let invalid = doc! { "age": 3 };

        assert!(matches!(
            check_write("users", Some(&strict(user_validator())), &invalid, None),
            Err(DocumentStoreError::StoreOperation(_))
        ));

        let warn = CollectionValidation {
            action: ValidationAction::Warn,
            ..strict(user_validator())
        };
        assert!(check_write("users", Some(&warn), &invalid, None).is_ok());

        let off = CollectionValidation {
            level: ValidationLevel::Off,
            ..strict(user_validator())
        };
        assert!(check_write("users", Some(&off), &invalid, None).is_ok());
        assert!(check_write("users", None, &invalid, None).is_ok());
    }

    #[test]
    fn moderate_level_skips_updates_to_invalid_documents() {
        let moderate = CollectionValidation {
            level: ValidationLevel::Moderate,
            ..strict(user_validator())
        };
        let invalid = doc! { "age": 3 };

        assert!(check_write("users", Some(&moderate), &invalid, Some(&doc! { "age": 1 })).is_ok());
        assert!(check_write("users", Some(&moderate), &invalid, Some(&doc! { "name": "Ann" })).is_err());
        assert!(check_write("users", Some(&moderate), &invalid, None).is_err());
    }
}
