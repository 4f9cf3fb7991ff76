//! Typed builder for `$jsonSchema` validator documents.
//!
//! The rendered shape is fixed by the store's validation convention:
//! `{ bsonType: "object", required: [...], properties: { ... } }`, with keys in
//! exactly that order and `required`/`properties` in field declaration order.

use bson::{Bson, Document, doc};

/// Schema of a single property.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertySchema {
    /// BSON type aliases. Rendered as a string when there is one, as an array otherwise.
    pub bson_types: Vec<&'static str>,
    pub min_length: Option<u32>,
    pub max_length: Option<u32>,
    pub pattern: Option<String>,
    pub minimum: Option<i64>,
    pub maximum: Option<i64>,
    pub enumeration: Option<Vec<Bson>>,
    pub items: Option<Box<PropertySchema>>,
    pub object: Option<ValidatorDocument>,
}

impl PropertySchema {
    pub fn typed(bson_type: &'static str) -> Self {
        Self {
            bson_types: vec![bson_type],
            ..Self::default()
        }
    }

    pub fn enumeration(values: Vec<Bson>) -> Self {
        Self {
            enumeration: Some(values),
            ..Self::default()
        }
    }

    /// Lets the property be `null` as well as its declared type.
    pub fn allow_null(mut self) -> Self {
        if !self.bson_types.is_empty() && !self.bson_types.contains(&"null") {
            self.bson_types.push("null");
        }
        if let Some(values) = self.enumeration.as_mut() {
            if !values.contains(&Bson::Null) {
                values.push(Bson::Null);
            }
        }
        self
    }

    pub fn to_document(&self) -> Document {
        let mut document = match &self.object {
            Some(object) => object.to_document(),
            None => Document::new(),
        };

        // Overwrites the nested "object" tag in place when types are declared.
        match self.bson_types.as_slice() {
            [] => {}
            [single] => {
                document.insert("bsonType", *single);
            }
            types => {
                document.insert(
                    "bsonType",
                    types.iter().map(|t| Bson::from(*t)).collect::<Vec<_>>(),
                );
            }
        }

        if let Some(min) = self.min_length {
            document.insert("minLength", int_bson(min as i64));
        }
        if let Some(max) = self.max_length {
            document.insert("maxLength", int_bson(max as i64));
        }
        if let Some(pattern) = &self.pattern {
            document.insert("pattern", pattern.as_str());
        }
        if let Some(min) = self.minimum {
            document.insert("minimum", int_bson(min));
        }
        if let Some(max) = self.maximum {
            document.insert("maximum", int_bson(max));
        }
        if let Some(values) = &self.enumeration {
            document.insert("enum", values.clone());
        }
        if let Some(items) = &self.items {
            document.insert("items", items.to_document());
        }

        document
    }
}

/// An object schema: required field names plus per-field schemas.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidatorDocument {
    required: Vec<String>,
    properties: Vec<(String, PropertySchema)>,
}

impl ValidatorDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) a property, keeping the position of its first insertion.
    pub fn property(mut self, name: impl Into<String>, schema: PropertySchema) -> Self {
        let name = name.into();

        match self.properties.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = schema,
            None => self.properties.push((name, schema)),
        }
        self
    }

    pub fn require(mut self, name: impl Into<String>) -> Self {
        let name = name.into();

        if !self.required.contains(&name) {
            self.required.push(name);
        }
        self
    }

    pub fn required(&self) -> &[String] {
        &self.required
    }

    pub fn properties(&self) -> impl Iterator<Item = (&str, &PropertySchema)> {
        self.properties.iter().map(|(n, s)| (n.as_str(), s))
    }

    pub fn get(&self, name: &str) -> Option<&PropertySchema> {
        self.properties.iter().find(|(n, _)| n == name).map(|(_, s)| s)
    }

    /// Renders `{bsonType, required, properties}`. `required` is left out when
    /// empty, since the server rejects an empty `required` array.
    pub fn to_document(&self) -> Document {
        let mut document = doc! { "bsonType": "object" };

        if !self.required.is_empty() {
            document.insert("required", self.required.clone());
        }
        document.insert(
            "properties",
            self.properties
                .iter()
                .map(|(name, schema)| (name.clone(), Bson::Document(schema.to_document())))
                .collect::<Document>(),
        );

        document
    }

    /// Wraps the schema as a collection validator expression.
    pub fn to_validator(&self) -> Document {
        doc! { "$jsonSchema": self.to_document() }
    }
}

fn int_bson(value: i64) -> Bson {
    match i32::try_from(value) {
        Ok(small) => Bson::Int32(small),
        Err(_) => Bson::Int64(value),
    }
}
