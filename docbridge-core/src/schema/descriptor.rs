//! Type descriptors: the metadata the schema synthesizer walks.
//!
//! Descriptors are normally produced by `#[derive(DocumentSchema)]` and
//! `#[derive(SchemaType)]`, but every type here can be built by hand.

use std::{
    any::TypeId,
    collections::{BTreeMap, HashMap},
};

use crate::document::Document;

/// Semantic kind of a field, independent of nullability.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    String,
    /// 32-bit integer.
    Int,
    /// 64-bit integer.
    Long,
    Double,
    Decimal,
    Bool,
    Timestamp,
    ObjectId,
    Uuid,
    /// Closed set of named members.
    Enumeration(Vec<String>),
    /// Sequence of elements of the inner type.
    Array(Box<FieldType>),
    /// Embedded document with its own fields.
    Object(Vec<FieldDescriptor>),
    /// A type with no schema representation. Carries a short description.
    Unsupported(String),
}

/// A field's kind together with whether it may be null.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldType {
    pub kind: FieldKind,
    pub nullable: bool,
}

impl FieldType {
    pub fn new(kind: FieldKind) -> Self {
        Self { kind, nullable: false }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn enumeration<I, S>(members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(FieldKind::Enumeration(members.into_iter().map(Into::into).collect()))
    }

    pub fn array(element: FieldType) -> Self {
        Self::new(FieldKind::Array(Box::new(element)))
    }

    pub fn object(fields: Vec<FieldDescriptor>) -> Self {
        Self::new(FieldKind::Object(fields))
    }

    pub fn unsupported(description: impl Into<String>) -> Self {
        Self::new(FieldKind::Unsupported(description.into()))
    }
}

/// A declarative validation constraint attached to a field.
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    Required,
    MinLength(u32),
    MaxLength(u32),
    Pattern(String),
    Range { min: Option<i64>, max: Option<i64> },
    Enumeration(Vec<String>),
}

/// One field of a document type.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    /// Serialized field name.
    pub name: String,
    pub field_type: FieldType,
    pub constraints: Vec<Constraint>,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            constraints: Vec::new(),
        }
    }

    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn is_required(&self) -> bool {
        self.constraints.iter().any(|c| matches!(c, Constraint::Required))
    }
}

/// Maps a Rust type to the [`FieldType`] its serialized form has.
///
/// Implemented here for primitives and common containers. Derive it with
/// `#[derive(SchemaType)]` for unit-only enums (enumerations) and structs
/// with named fields (embedded objects).
pub trait SchemaType {
    fn field_type() -> FieldType;
}

macro_rules! impl_schema_type {
    ($kind:expr => $($ty:ty),+ $(,)?) => {
        $(
            impl SchemaType for $ty {
                fn field_type() -> FieldType {
                    FieldType::new($kind)
                }
            }
        )+
    };
}

impl_schema_type!(FieldKind::String => String, char);
impl_schema_type!(FieldKind::Int => i8, i16, i32, u8, u16);
impl_schema_type!(FieldKind::Long => i64, u32, u64, isize, usize);
impl_schema_type!(FieldKind::Double => f32, f64);
impl_schema_type!(FieldKind::Decimal => bson::Decimal128);
impl_schema_type!(FieldKind::Bool => bool);
impl_schema_type!(FieldKind::Timestamp => bson::DateTime);
impl_schema_type!(FieldKind::ObjectId => bson::oid::ObjectId);
impl_schema_type!(FieldKind::Uuid => bson::Uuid);

// serde writes chrono timestamps as RFC 3339 strings, not BSON dates.
impl<Tz: chrono::TimeZone> SchemaType for chrono::DateTime<Tz> {
    fn field_type() -> FieldType {
        FieldType::new(FieldKind::String)
    }
}

impl<T: SchemaType> SchemaType for Option<T> {
    fn field_type() -> FieldType {
        T::field_type().nullable()
    }
}

impl<T: SchemaType> SchemaType for Vec<T> {
    fn field_type() -> FieldType {
        FieldType::array(T::field_type())
    }
}

impl<T: SchemaType> SchemaType for Box<T> {
    fn field_type() -> FieldType {
        T::field_type()
    }
}

impl<K, V> SchemaType for HashMap<K, V> {
    fn field_type() -> FieldType {
        FieldType::unsupported("map")
    }
}

impl<K, V> SchemaType for BTreeMap<K, V> {
    fn field_type() -> FieldType {
        FieldType::unsupported("map")
    }
}

impl SchemaType for bson::Document {
    fn field_type() -> FieldType {
        FieldType::unsupported("raw document")
    }
}

/// Type-level metadata for a document type: its name, optional collection
/// override and fields.
///
/// Usually derived with `#[derive(DocumentSchema)]`.
pub trait DocumentSchema: Document {
    /// Simple (unqualified) type name, e.g. `"User"`.
    fn type_name() -> &'static str;

    /// Explicit collection name, overriding the pluralized type name.
    fn collection_override() -> Option<&'static str> {
        None
    }

    /// Field descriptors in declaration order.
    fn fields() -> Vec<FieldDescriptor>;

    fn descriptor() -> TypeDescriptor
    where
        Self: Sized,
    {
        TypeDescriptor {
            type_id: TypeId::of::<Self>(),
            name: Self::type_name(),
            collection: Self::collection_override(),
            fields: Self::fields(),
        }
    }
}

/// Runtime descriptor of a document type.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDescriptor {
    pub type_id: TypeId,
    pub name: &'static str,
    pub collection: Option<&'static str>,
    pub fields: Vec<FieldDescriptor>,
}

impl TypeDescriptor {
    pub fn of<D: DocumentSchema>() -> Self {
        D::descriptor()
    }
}

/// An explicit, application-supplied list of document types.
///
/// # Example
///
/// ```ignore
/// let catalog = TypeCatalog::new().with::<User>().with::<Order>();
/// ```
#[derive(Debug, Clone, Default)]
pub struct TypeCatalog {
    descriptors: Vec<TypeDescriptor>,
}

impl TypeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `D` to the catalog. Adding the same type twice keeps the first entry.
    pub fn with<D: DocumentSchema>(mut self) -> Self {
        self.add(D::descriptor());
        self
    }

    pub fn add(&mut self, descriptor: TypeDescriptor) {
        if !self.descriptors.iter().any(|d| d.type_id == descriptor.type_id) {
            self.descriptors.push(descriptor);
        }
    }

    /// Finds a descriptor by case-insensitive simple name.
    pub fn find_by_name(&self, name: &str) -> Option<&TypeDescriptor> {
        self.descriptors.iter().find(|d| d.name.eq_ignore_ascii_case(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = &TypeDescriptor> {
        self.descriptors.iter()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}
