//! Tests for decoding malformed and partial trees.
//!
//! Decoding never fails as a whole: every problem is isolated to one member,
//! which keeps its previous value.
#![allow(missing_docs)]

use confstore::prelude::*;
use serde_json::json;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn tree(json: serde_json::Value) -> Value {
    Value::try_from(json).unwrap()
}

#[derive(Debug, Clone, PartialEq, Schema)]
struct Limits {
    max: i64,
    ratio: f64,
    label: String,
    note: Option<String>,
    #[confstore(non_null)]
    code: Option<String>,
    big: u64,
    initial: char,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max: 10,
            ratio: 1.5,
            label: "default".into(),
            note: Some("note".into()),
            code: Some("A1".into()),
            big: 0,
            initial: 'x',
        }
    }
}

// ============================================================================
// Missing keys and nulls
// ============================================================================

#[test]
fn test_missing_keys_keep_values() {
    init_tracing();
    let store = LimitsStore::create(None);
    store.deserialize(&tree(json!({ "max": 5 })));

    let expected = Limits {
        max: 5,
        ..Limits::default()
    };
    assert_eq!(store.snapshot(), expected);
}

#[test]
fn test_empty_map_changes_nothing() {
    init_tracing();
    let store = LimitsStore::create(None);
    store.deserialize(&Value::map());
    assert_eq!(store.snapshot(), Limits::default());
}

#[test]
fn test_null_clears_option() {
    let store = LimitsStore::create(None);
    store.deserialize(&tree(json!({ "note": null })));
    assert_eq!(store.note(), None);
}

#[test]
fn test_non_null_option_rejects_null() {
    init_tracing();
    let store = LimitsStore::create(None);
    store.deserialize(&tree(json!({ "code": null })));
    assert_eq!(store.code(), Some("A1".to_string()));

    store.deserialize(&tree(json!({ "code": "B2" })));
    assert_eq!(store.code(), Some("B2".to_string()));
}

#[test]
fn test_null_for_plain_member_is_rejected() {
    init_tracing();
    let store = LimitsStore::create(None);
    store.deserialize(&tree(json!({ "max": null, "label": null })));
    assert_eq!(store.max(), 10);
    assert_eq!(store.label(), "default");
}

// ============================================================================
// Numeric coercion
// ============================================================================

#[test]
fn test_integral_float_decodes_into_integer() {
    let store = LimitsStore::create(None);
    store.deserialize(&tree(json!({ "max": 4.0 })));
    assert_eq!(store.max(), 4);
}

#[test]
fn test_integer_decodes_into_float() {
    let store = LimitsStore::create(None);
    store.deserialize(&tree(json!({ "ratio": 2 })));
    assert_eq!(store.ratio(), 2.0);
}

#[test]
fn test_fractional_float_is_rejected_for_integer() {
    init_tracing();
    let store = LimitsStore::create(None);
    store.deserialize(&tree(json!({ "max": 4.5 })));
    assert_eq!(store.max(), 10);
}

#[test]
fn test_out_of_range_integer_is_rejected() {
    init_tracing();
    let store = LimitsStore::create(None);
    store.deserialize(&tree(json!({ "big": -1 })));
    assert_eq!(store.big(), 0);
}

#[test]
fn test_large_unsigned_round_trips_through_float() {
    let store = LimitsStore::create(None);
    store.set_big(u64::MAX);
    let map = store.serialize();
    assert!(matches!(map.get("big"), Some(Value::Float(_))));

    let other = LimitsStore::create(None);
    other.deserialize(&Value::Map(map));
    assert_eq!(other.big(), u64::MAX);
}

// ============================================================================
// Type mismatches
// ============================================================================

#[test]
fn test_mismatch_is_isolated_to_one_member() {
    init_tracing();
    let store = LimitsStore::create(None);
    store.deserialize(&tree(json!({
        "max": "many",
        "ratio": true,
        "label": "ok",
        "initial": "yes"
    })));
    assert_eq!(store.max(), 10);
    assert_eq!(store.ratio(), 1.5);
    assert_eq!(store.label(), "ok");
    assert_eq!(store.initial(), 'y');
}

#[test]
fn test_non_map_tree_is_ignored() {
    init_tracing();
    let store = LimitsStore::create(None);
    let signal = store.read_signal();
    store.deserialize(&Value::Integer(1));
    store.deserialize(&tree(json!(["max", 1])));
    assert_eq!(store.snapshot(), Limits::default());
    assert!(!signal.is_set());
}

#[test]
fn test_unknown_keys_are_ignored() {
    let store = LimitsStore::create(None);
    store.deserialize(&tree(json!({ "max": 3, "unknown": { "deep": [1, 2] } })));
    assert_eq!(store.max(), 3);
    assert!(store.serialize().get("unknown").is_none());
}

#[test]
fn test_deserialize_signals_once() {
    let store = LimitsStore::create(None);
    let signal = store.read_signal();
    store.deserialize(&tree(json!({ "max": 1, "ratio": 0.5, "label": "x" })));
    assert!(signal.try_take());
    assert!(!signal.try_take());
}
