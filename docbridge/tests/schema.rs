mod common;

use common::{ScriptedStore, User};
use docbridge::{
    bson::{Bson, doc},
    memory::InMemoryStore,
    prelude::*,
    schema::{Constraint, FieldKind, FieldType, ReconcileAction, build_validator},
};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, sync::Arc};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, SchemaType)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Active,
    Suspended,
    #[serde(rename = "gone")]
    Deleted,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, SchemaType)]
pub struct LineItem {
    #[schema(required, min_length = 3)]
    pub sku: String,
    #[schema(range(min = 1))]
    pub quantity: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, DocumentSchema)]
#[schema(collection = "purchase_orders")]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    #[schema(required, pattern = "^ORD-[0-9]+$")]
    pub order_number: String,
    pub status: Status,
    pub items: Vec<LineItem>,
    pub total_cents: i64,
    #[serde(rename = "note")]
    #[schema(one_of("gift", "rush"))]
    pub remark: Option<String>,
    #[serde(skip)]
    pub cached_total: Option<i64>,
    pub metadata: HashMap<String, String>,
}

impl Document for Order {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, DocumentSchema)]
pub struct Person {
    pub id: String,
    pub name: String,
}

impl Document for Person {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, SchemaType)]
pub struct Address {
    #[schema(required)]
    pub city: String,
    pub postcode: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, DocumentSchema)]
pub struct Customer {
    pub id: String,
    #[schema(required)]
    pub name: String,
    pub address: Option<Address>,
}

impl Document for Customer {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}

fn order(number: &str) -> Order {
    Order {
        order_number: number.to_string(),
        items: vec![LineItem { sku: "ABC-1".into(), quantity: 2 }],
        total_cents: 1999,
        ..Order::default()
    }
}

#[test]
fn derive_describes_serialized_fields() {
    let fields = Order::fields();
    let names = fields.iter().map(|f| f.name.as_str()).collect::<Vec<_>>();

    assert_eq!(Order::type_name(), "Order");
    assert_eq!(Order::collection_override(), Some("purchase_orders"));
    assert_eq!(names, vec!["id", "orderNumber", "status", "items", "totalCents", "note", "metadata"]);

    assert_eq!(fields[2].field_type, FieldType::enumeration(["active", "suspended", "gone"]));
    assert_eq!(fields[4].field_type.kind, FieldKind::Long);
    assert!(fields[5].field_type.nullable);
    assert_eq!(
        fields[5].constraints,
        vec![Constraint::Enumeration(vec!["gift".into(), "rush".into()])]
    );
    assert!(fields[1].is_required());
}

#[test]
fn name_and_age_validator_shape() {
    let plan = build_validator(&User::descriptor());
    let schema = plan.validator.to_document();

    assert_eq!(plan.collection, "users");
    assert_eq!(schema.get_array("required").unwrap(), &vec![Bson::from("name")]);

    let properties = schema.get_document("properties").unwrap();
    assert_eq!(
        properties.get_document("name").unwrap(),
        &doc! { "bsonType": "string", "maxLength": 50 }
    );
    assert_eq!(
        properties.get_document("age").unwrap(),
        &doc! { "bsonType": "int", "minimum": 0, "maximum": 150 }
    );
    assert_eq!(
        properties.get_document("email").unwrap(),
        &doc! { "bsonType": ["string", "null"] }
    );
}

#[test]
fn nested_items_enums_and_skipped_fields() {
    let plan = build_validator(&Order::descriptor());
    let properties = plan.validator.to_document().get_document("properties").unwrap().clone();

    assert_eq!(
        properties.get_document("items").unwrap(),
        &doc! {
            "bsonType": "array",
            "items": {
                "bsonType": "object",
                "required": ["sku"],
                "properties": {
                    "sku": { "bsonType": "string", "minLength": 3 },
                    "quantity": { "bsonType": "int", "minimum": 1 },
                },
            },
        }
    );
    assert_eq!(
        properties.get_document("status").unwrap(),
        &doc! { "enum": ["active", "suspended", "gone"] }
    );
    assert!(!properties.contains_key("metadata"));
    assert_eq!(plan.skipped.len(), 1);
    assert_eq!(plan.skipped[0].path, "metadata");
}

#[test]
fn collection_names_are_pluralized() {
    assert_eq!(build_validator(&Person::descriptor()).collection, "people");
    assert_eq!(build_validator(&Order::descriptor()).collection, "purchase_orders");
}

#[tokio::test]
async fn synthesis_creates_then_modifies() {
    let store = Arc::new(ScriptedStore::new());
    let client = DocumentClient::from_parts(store.clone(), Default::default(), RetryPolicy::default());

    let first = client.schema().synthesize_for_type::<User>().await.unwrap();
    let second = client.schema().synthesize_for_type::<User>().await.unwrap();

    assert_eq!(first.action, ReconcileAction::Created);
    assert_eq!(second.action, ReconcileAction::Modified);
    assert!(first.is_mapped_here() && second.is_mapped_here());
    assert_eq!(store.count_of("create_collection"), 1);
    assert_eq!(store.count_of("run_command"), 1);
    assert_eq!(client.registry().resolve::<User>().await.unwrap(), "users");
}

#[tokio::test]
async fn synthesized_validators_reject_invalid_writes() {
    let store = Arc::new(ScriptedStore::new());
    let client = DocumentClient::from_parts(store.clone(), Default::default(), RetryPolicy::default());
    client.schema().synthesize_for_type::<User>().await.unwrap();

    client.create(&mut User::named("Ann", 34)).await.unwrap();

    let too_old = client.create(&mut User::named("Methuselah", 969)).await;
    assert!(matches!(too_old, Err(DocumentStoreError::StoreOperation(_))));

    let too_long = client.create(&mut User::named(&"x".repeat(51), 20)).await;
    assert!(matches!(too_long, Err(DocumentStoreError::StoreOperation(_))));

    // Rejections are not transient, so each was attempted once.
    assert_eq!(store.count_of("insert_many"), 3);
    assert_eq!(client.count::<User>(None).await.unwrap(), 1);
}

#[tokio::test]
async fn synthesis_registers_every_catalog_type() {
    let client = DocumentClient::new(InMemoryStore::new());
    let catalog = TypeCatalog::new().with::<User>().with::<Order>().with::<Person>();

    let reports = client.schema().synthesize_catalog(&catalog).await.unwrap();
    let collections = reports.iter().map(|r| r.collection.as_str()).collect::<Vec<_>>();

    assert_eq!(collections, vec!["users", "purchase_orders", "people"]);
    assert_eq!(client.backend().list_collections().await.unwrap(), vec!["people", "purchase_orders", "users"]);

    let mut order = order("ORD-42");
    client.create(&mut order).await.unwrap();
    assert_eq!(client.get::<Order>(&order.id).await.unwrap(), Some(order));

    assert!(client.create(&mut self::order("42")).await.is_err());
}

#[tokio::test]
async fn optional_embedded_objects_may_be_absent() {
    let client = DocumentClient::new(InMemoryStore::new());
    let report = client.schema().synthesize_for_type::<Customer>().await.unwrap();
    assert_eq!(report.collection, "customers");

    let properties = build_validator(&Customer::descriptor())
        .validator
        .to_document()
        .get_document("properties")
        .unwrap()
        .clone();
    assert_eq!(
        properties.get_document("address").unwrap().get_array("bsonType").unwrap(),
        &vec![Bson::from("object"), Bson::from("null")]
    );

    let mut homeless = Customer { name: "Ann".into(), ..Customer::default() };
    client.create(&mut homeless).await.unwrap();

    let mut housed = Customer {
        name: "Bob".into(),
        address: Some(Address { city: "Oslo".into(), postcode: None }),
        ..Customer::default()
    };
    client.create(&mut housed).await.unwrap();

    assert_eq!(client.get::<Customer>(&homeless.id).await.unwrap(), Some(homeless));
    assert_eq!(client.get::<Customer>(&housed.id).await.unwrap(), Some(housed));

    let wrong_shape = doc! { "_id": "c3", "id": "c3", "name": "Cid", "address": 7 };
    assert!(matches!(
        client.backend().insert_many("customers", vec![wrong_shape]).await,
        Err(DocumentStoreError::StoreOperation(_))
    ));
}

#[tokio::test]
async fn synthesis_reports_types_mapped_elsewhere() {
    let client = DocumentClient::new(InMemoryStore::new());
    client.register::<User>("members").await;

    let report = client.schema().synthesize_for_type::<User>().await.unwrap();

    assert_eq!(report.collection, "users");
    assert_eq!(report.mapped_collection, "members");
    assert!(!report.is_mapped_here());
    assert_eq!(client.registry().resolve::<User>().await.unwrap(), "members");
}

#[tokio::test]
async fn store_failures_during_synthesis_propagate_without_retry() {
    let store = Arc::new(ScriptedStore::failing(1));
    let client = DocumentClient::from_parts(store.clone(), Default::default(), RetryPolicy::default());

    let result = client.schema().synthesize_for_type::<User>().await;

    assert!(matches!(result, Err(DocumentStoreError::Transient(_))));
    assert_eq!(store.calls(), vec!["list_collections"]);
    assert!(!client.registry().contains::<User>().await);
}
