use schemock::adapters::result_cache::ResultCache;
use schemock::adapters::value_generator::{CircularPolicy, GeneratorTuning, ValueGenerator};
use schemock::domain::{GenerateOptions, MockError};
use serde_json::{json, Value};
use std::sync::Arc;

fn order_schema() -> Value {
    json!({
        "title": "Order",
        "type": "object",
        "required": ["id", "customer", "items", "status", "createdAt"],
        "properties": {
            "id": {"type": "string", "format": "uuid"},
            "customer": {"$ref": "#/definitions/Customer"},
            "items": {
                "type": "array",
                "minItems": 1,
                "maxItems": 4,
                "items": {"$ref": "#/definitions/LineItem"}
            },
            "status": {"enum": ["pending", "paid", "shipped"]},
            "createdAt": {"type": "string", "format": "date-time"},
            "note": {"type": "string", "maxLength": 12}
        },
        "definitions": {
            "Customer": {
                "allOf": [
                    {"$ref": "#/definitions/Contact"},
                    {
                        "type": "object",
                        "required": ["age"],
                        "properties": {"age": {"type": "integer"}}
                    }
                ]
            },
            "Contact": {
                "type": "object",
                "required": ["email", "firstName"],
                "properties": {
                    "email": {"type": "string"},
                    "firstName": {"type": "string"}
                }
            },
            "LineItem": {
                "type": "object",
                "required": ["sku", "quantity", "price"],
                "properties": {
                    "sku": {"type": "string", "pattern": "^[A-Z]{3}-[0-9]{4}$"},
                    "quantity": {"type": "integer", "minimum": 1},
                    "price": {"type": "number", "exclusiveMinimum": 0}
                }
            }
        }
    })
}

#[test]
fn test_realistic_document() {
    let generator = ValueGenerator::seeded(2024);
    let order = generator.generate(&order_schema(), &GenerateOptions::default()).unwrap();

    assert_eq!(order["id"].as_str().unwrap().len(), 36);
    assert!(order["customer"]["email"].as_str().unwrap().contains('@'));
    let age = order["customer"]["age"].as_i64().unwrap();
    assert!((18..=80).contains(&age));

    let items = order["items"].as_array().unwrap();
    assert!((1..=4).contains(&items.len()));
    for item in items {
        let sku = item["sku"].as_str().unwrap();
        assert_eq!(sku.len(), 8);
        assert_eq!(&sku[3..4], "-");
        assert!(item["quantity"].as_i64().unwrap() >= 1);
        assert!(item["price"].as_f64().unwrap() > 0.0);
    }

    let status = order["status"].as_str().unwrap();
    assert!(["pending", "paid", "shipped"].contains(&status));
    assert!(chrono::DateTime::parse_from_rfc3339(order["createdAt"].as_str().unwrap()).is_ok());
    if let Some(note) = order.get("note") {
        assert!(note.as_str().unwrap().chars().count() <= 12);
    }
}

#[test]
fn test_same_seed_same_output() {
    let options = GenerateOptions::uncached();
    let a = ValueGenerator::seeded(99).generate(&order_schema(), &options).unwrap();
    let b = ValueGenerator::seeded(99).generate(&order_schema(), &options).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_reset_replays_sequence() {
    let generator = ValueGenerator::seeded(5);
    let options = GenerateOptions::uncached();
    let first = generator.generate(&order_schema(), &options).unwrap();
    generator.reset_random();
    let replay = generator.generate(&order_schema(), &options).unwrap();
    assert_eq!(first, replay);
}

#[test]
fn test_strict_generates_required_only() {
    let generator = ValueGenerator::seeded(1);
    let order = generator
        .generate(&order_schema(), &GenerateOptions::uncached().strict(true))
        .unwrap();
    assert!(order.get("note").is_none());
    assert_eq!(order.as_object().unwrap().len(), 5);
}

#[test]
fn test_cache_returns_identical_value() {
    let cache = Arc::new(ResultCache::new(8));
    let generator = ValueGenerator::seeded(3).with_cache(cache.clone());
    let options = GenerateOptions::default();

    let first = generator.generate(&order_schema(), &options).unwrap();
    let second = generator.generate(&order_schema(), &options).unwrap();
    assert_eq!(first, second);

    let stats = cache.stats();
    assert_eq!(stats.size, 1);
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
}

#[test]
fn test_linked_list_terminates() {
    let schema = json!({
        "type": "object",
        "required": ["value", "next"],
        "properties": {
            "value": {"type": "integer"},
            "next": {"$ref": "#"}
        }
    });
    let generator = ValueGenerator::seeded(8);
    let value = generator.generate(&schema, &GenerateOptions::uncached()).unwrap();
    assert!(value["value"].is_i64());
    assert_eq!(value["next"]["next"], json!({}));

    let strict = ValueGenerator::seeded(8).with_tuning(GeneratorTuning {
        circular_policy: CircularPolicy::Error,
        ..Default::default()
    });
    let err = strict.generate(&schema, &GenerateOptions::uncached()).unwrap_err();
    assert!(matches!(err, MockError::CircularRef(_)));
}

#[test]
fn test_unresolvable_ref_fails() {
    let schema = json!({
        "type": "object",
        "required": ["owner"],
        "properties": {"owner": {"$ref": "#/definitions/Missing"}}
    });
    let err = ValueGenerator::seeded(1)
        .generate(&schema, &GenerateOptions::uncached())
        .unwrap_err();
    assert_eq!(err.kind(), "schema_ref");
}
