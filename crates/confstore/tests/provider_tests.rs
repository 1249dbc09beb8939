//! Tests for reloading from and persisting to providers.
#![allow(missing_docs)]

use confstore::prelude::*;
use rust_decimal::Decimal;
use serde_json::json;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn tree(json: serde_json::Value) -> Value {
    Value::try_from(json).unwrap()
}

static RELOADS: AtomicUsize = AtomicUsize::new(0);

#[derive(Debug, Clone, Default, PartialEq, Schema)]
#[confstore(hooks)]
struct Server {
    host: String,
    port: u16,
    #[confstore(rename = "Tls")]
    tls: bool,
}

impl StoreHooks for Server {
    fn on_reload(store: &ServerStore) {
        if store.host() == "reload-probe" {
            RELOADS.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Schema)]
struct Ledger {
    amount: Decimal,
    rate: f64,
    #[confstore(nested)]
    primary: Server,
}

/// Persists trees as JSON text.
#[derive(Default)]
struct JsonTextProvider {
    text: Mutex<Option<String>>,
}

impl ConfigProvider for JsonTextProvider {
    fn load(&self) -> Option<Value> {
        let text = self.text.lock().unwrap().clone()?;
        match serde_json::from_str::<Value>(&text) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(error = %err, "stored text is not a tree");
                None
            }
        }
    }

    fn store(&self, value: Value) {
        match serde_json::to_string(&value) {
            Ok(text) => *self.text.lock().unwrap() = Some(text),
            Err(err) => tracing::warn!(error = %err, "tree not stored"),
        }
    }
}

// ============================================================================
// write_to
// ============================================================================

#[test]
fn test_write_to_stores_serialized_tree() {
    let store = ServerStore::create(None);
    store.set_host("example.org".into());
    store.set_port(443);

    let provider = MemoryProvider::new();
    store.write_to(&provider);

    assert_eq!(provider.store_count(), 1);
    assert_eq!(
        provider.value(),
        Some(tree(json!({ "host": "example.org", "port": 443, "Tls": false })))
    );
}

// ============================================================================
// read_from
// ============================================================================

#[test]
fn test_read_from_applies_tree_and_signals_once() {
    init_tracing();
    let store = ServerStore::create(None);
    let signal = store.read_signal();
    let provider =
        MemoryProvider::with_value(tree(json!({ "host": "a", "port": 80, "Tls": true })));

    store.read_from(&provider);

    assert_eq!(
        store.snapshot(),
        Server {
            host: "a".into(),
            port: 80,
            tls: true,
        }
    );
    assert!(signal.try_take());
    assert!(!signal.try_take());
    assert_eq!(provider.store_count(), 0);
}

#[test]
fn test_read_from_empty_provider_keeps_values() {
    init_tracing();
    let store = ServerStore::create(None);
    store.set_port(8080);
    let signal = store.read_signal();
    signal.try_take();

    store.read_from(&MemoryProvider::new());

    assert_eq!(store.port(), 8080);
    assert!(signal.try_take());
}

#[test]
fn test_on_reload_runs_for_loaded_and_absent_trees() {
    let store = ServerStore::create(None);
    let provider = MemoryProvider::with_value(tree(json!({ "host": "reload-probe" })));

    store.read_from(&provider);
    assert_eq!(RELOADS.load(Ordering::SeqCst), 1);

    provider.set_value(None);
    store.read_from(&provider);
    assert_eq!(RELOADS.load(Ordering::SeqCst), 2);
}

#[test]
fn test_round_trip_through_text_provider() {
    let provider = JsonTextProvider::default();
    let source = ServerStore::create(None);
    source.set_host("db.internal".into());
    source.set_tls(true);
    source.write_to(&provider);

    let target = ServerStore::create(None);
    target.read_from(&provider);
    assert_eq!(target.snapshot(), source.snapshot());
}

#[test]
fn test_exact_numbers_survive_text_provider() {
    init_tracing();
    let provider = JsonTextProvider::default();
    let source = LedgerStore::create(None);
    source.set_amount(Decimal::from_str("12345678901234567.89").unwrap());
    source.set_rate(0.1 + 0.2);
    source.write_to(&provider);

    let text = provider.text.lock().unwrap().clone().unwrap();
    assert!(text.contains(r#""amount":12345678901234567.89"#));
    assert!(text.contains(r#""rate":0.30000000000000004"#));

    let target = LedgerStore::create(None);
    target.read_from(&provider);
    assert_eq!(target.snapshot(), source.snapshot());
}

// ============================================================================
// Nested stores
// ============================================================================

#[test]
fn test_nested_store_writes_the_root_tree() {
    let ledger = LedgerStore::create(None);
    ledger.set_rate(0.5);
    let primary = ledger.primary();
    primary.set_port(5432);

    let provider = MemoryProvider::new();
    primary.write_to(&provider);

    assert_eq!(provider.store_count(), 1);
    assert_eq!(provider.value(), Some(Value::Map(ledger.serialize())));
}

#[test]
fn test_nested_store_reloads_the_root() {
    init_tracing();
    let ledger = LedgerStore::create(None);
    let primary = ledger.primary();
    let signal = ledger.read_signal();
    let provider = MemoryProvider::with_value(tree(json!({
        "amount": 2,
        "rate": 0.75,
        "primary": { "host": "db", "port": 1, "Tls": true }
    })));

    primary.read_from(&provider);

    assert_eq!(ledger.rate(), 0.75);
    assert_eq!(ledger.amount(), Decimal::from(2));
    assert_eq!(primary.host(), "db");
    assert!(primary.same_store(&ledger.primary()));
    assert!(signal.try_take());
    assert!(!signal.try_take());
}

#[test]
fn test_stores_are_usable_as_trait_objects() {
    let store = ServerStore::create(None);
    let stores: Vec<Box<dyn ConfigStore>> = vec![Box::new(store.clone())];
    let provider = MemoryProvider::with_value(tree(json!({ "port": 1 })));

    for entry in &stores {
        entry.read_from(&provider);
        entry.write_to(&provider);
        assert!(!entry.write_lock().is_write_locked());
    }
    assert_eq!(store.port(), 1);
    assert_eq!(provider.store_count(), 1);
}
