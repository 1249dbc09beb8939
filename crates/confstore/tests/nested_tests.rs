//! Tests for nested stores: shared locking, identity and optional children.
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
struct Window {
    width: u32,
    height: u32,
}

impl Default for Window {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Schema)]
struct Layout {
    #[confstore(nested)]
    main: Window,
    #[confstore(nested)]
    popup: Option<Window>,
}

#[derive(Debug, Clone, Default, PartialEq, Schema)]
struct Workspace {
    title: String,
    #[confstore(nested)]
    layout: Layout,
}

// ============================================================================
// Graph structure
// ============================================================================

#[test]
fn test_children_share_the_root_lock() {
    let store = WorkspaceStore::create(None);
    let layout = store.layout();
    let main = layout.main();

    assert!(store.link().is_root());
    assert_eq!(main.link().depth(), 2);
    assert!(main.link().root().ptr_eq(store.link()));
    assert!(main.link().parent().unwrap().ptr_eq(layout.link()));
    assert!(main.write_lock().ptr_eq(&store.write_lock()));
}

#[test]
fn test_separate_roots_do_not_share_locks() {
    let a = WorkspaceStore::create(None);
    let b = WorkspaceStore::create(None);
    assert!(!a.write_lock().ptr_eq(&b.write_lock()));
}

#[test]
fn test_child_write_signals_root() {
    let store = WorkspaceStore::create(None);
    let signal = store.read_signal();
    store.layout().main().set_width(1024);
    assert!(signal.try_take());
    assert_eq!(store.snapshot().layout.main.width, 1024);
}

// ============================================================================
// Identity across reloads
// ============================================================================

#[test]
fn test_deserialize_reuses_child_stores() {
    init_tracing();
    let store = WorkspaceStore::create(None);
    let layout = store.layout();
    let main = layout.main();

    store.deserialize(&tree(json!({
        "title": "docs",
        "layout": {
            "main": { "width": 1280, "height": 720 },
            "popup": null
        }
    })));

    assert!(store.layout().same_store(&layout));
    assert!(store.layout().main().same_store(&main));
    assert_eq!(main.width(), 1280);
    assert_eq!(main.height(), 720);
    assert_eq!(store.title(), "docs");
}

#[test]
fn test_null_for_required_child_is_rejected() {
    init_tracing();
    let store = LayoutStore::create(None);
    store.main().set_width(1);
    store.deserialize(&tree(json!({ "main": null, "popup": null })));
    assert_eq!(store.main().width(), 1);
}

#[test]
fn test_non_map_child_node_is_rejected() {
    init_tracing();
    let store = LayoutStore::create(None);
    store.deserialize(&tree(json!({ "main": 5, "popup": null })));
    assert_eq!(store.main().snapshot(), Window::default());
}

#[test]
fn test_copy_from_reuses_child_stores() {
    let store = LayoutStore::create(None);
    let main = store.main();
    store.copy_from(
        &Layout {
            main: Window {
                width: 10,
                height: 20,
            },
            popup: None,
        },
        true,
    );
    assert!(store.main().same_store(&main));
    assert_eq!(main.height(), 20);
}

// ============================================================================
// Optional children
// ============================================================================

#[test]
fn test_missing_optional_child_is_built_from_default() {
    init_tracing();
    let store = LayoutStore::create(None);
    assert!(store.popup().is_none());

    store.deserialize(&tree(json!({
        "main": { "width": 800, "height": 600 },
        "popup": { "width": 320 }
    })));

    let popup = store.popup().unwrap();
    assert_eq!(popup.width(), 320);
    assert_eq!(popup.height(), 600);
    assert!(popup.link().parent().unwrap().ptr_eq(store.link()));
}

#[test]
fn test_existing_optional_child_is_updated_in_place() {
    let store = LayoutStore::create(None);
    store.set_popup(Some(Window {
        width: 1,
        height: 2,
    }));
    let popup = store.popup().unwrap();

    store.deserialize(&tree(json!({
        "main": { "width": 800, "height": 600 },
        "popup": { "width": 3, "height": 4 }
    })));
    assert!(store.popup().unwrap().same_store(&popup));
    assert_eq!(popup.snapshot(), Window { width: 3, height: 4 });
}

#[test]
fn test_null_clears_optional_child() {
    let store = LayoutStore::create(None);
    store.set_popup(Some(Window::default()));
    assert!(store.popup().is_some());

    store.deserialize(&tree(json!({
        "main": { "width": 800, "height": 600 },
        "popup": null
    })));
    assert!(store.popup().is_none());
    assert_eq!(store.serialize().get("popup"), Some(&Value::Null));
}

#[test]
fn test_optional_child_setter() {
    let store = LayoutStore::create(None);
    store.set_popup(Some(Window {
        width: 5,
        height: 6,
    }));
    let popup = store.popup().unwrap();
    assert!(popup.write_lock().ptr_eq(&store.write_lock()));

    store.set_popup(Some(Window {
        width: 7,
        height: 8,
    }));
    assert!(store.popup().unwrap().same_store(&popup));
    assert_eq!(popup.width(), 7);

    store.set_popup(None);
    assert!(store.popup().is_none());
    assert_eq!(store.snapshot().popup, None);
}
