//! Schema-driven configuration stores.
//!
//! `confstore` turns a plain struct into a thread-safe configuration store
//! that can be serialized to, and reloaded from, a generic value tree.
//!
//! # Core Concepts
//!
//! - **Value**: the tree used as the serialization boundary (map, list,
//!   text, boolean, integer, decimal float, null)
//! - **Schema**: trait implemented by `#[derive(Schema)]` for a config struct
//! - **MemberDescriptor**: per-member metadata, computed once per schema
//! - **Store**: generated handle with locked getters and transactional setters
//! - **ChangeTransaction**: scoped batch of writes producing one notification
//! - **ConfigProvider**: loads and persists trees; encoding is its business
//!
//! # Reload and persist
//!
//! ```text
//! read_from(provider):  load -> decode -> assign in one transaction -> on_reload
//! write_to(provider):   serialize -> store
//! ```
//!
//! A malformed tree never fails a reload. Missing keys, disallowed nulls and
//! type mismatches are logged through `tracing` and the affected member keeps
//! its previous value.
//!
//! # Example
//!
//! ```ignore
//! use confstore::prelude::*;
//!
//! #[derive(Debug, Clone, Default, Schema)]
//! struct Audio {
//!     volume: f64,
//!     muted: bool,
//! }
//!
//! #[derive(Debug, Clone, Default, Schema)]
//! struct Settings {
//!     #[confstore(rename = "PlayerName")]
//!     name: Option<String>,
//!     #[confstore(nested)]
//!     audio: Audio,
//!     #[confstore(ignore)]
//!     session_hits: u32,
//! }
//!
//! let store = SettingsStore::create(None);
//! {
//!     let _tx = store.change_transaction()?;
//!     store.set_name(Some("ada".into()));
//!     store.audio().set_volume(0.5);
//! } // one change notification here
//!
//! let provider = MemoryProvider::new();
//! store.write_to(&provider);
//! store.read_from(&provider);
//! ```

extern crate self as confstore;

mod cache;
pub mod converters;
mod convert;
pub mod drivers;
mod error;
mod graph;
mod lock;
mod map;
mod provider;
mod schema;
mod signal;
mod store;
mod transaction;
mod value;

// Value tree
pub use map::Map;
pub use value::{Value, ValueKind};

// Schemas and conversion
pub use cache::SingleCreationCache;
pub use convert::Convertible;
pub use converters::{AnyConverter, ValueConverter};
pub use drivers::Decoded;
pub use error::{ConvertError, StoreError, StoreResult};
pub use schema::{describe, ConverterInfo, ConverterKind, MemberDescriptor, Schema, StoreHooks};

// Stores and concurrency
pub use graph::{SharedState, StoreGraph, StoreId, StoreLink};
pub use lock::{ReadGuard, StoreLock, WriteGuard};
pub use provider::{ConfigProvider, MemoryProvider};
pub use signal::ChangeSignal;
pub use store::{ConfigStore, GeneratedStore, ObserverId, PropertyObservers, StoreCore};
pub use transaction::ChangeTransaction;

// Re-export derive macro when feature is enabled
#[cfg(feature = "derive")]
pub use confstore_derive::Schema;

/// Traits and types needed to declare and use stores.
pub mod prelude {
    pub use crate::converters::{
        CaseInsensitiveTextConverter, ListConverter, MapConverter, NullableConverter,
        NumericConverter, TextConverter, TextVariants, Untyped,
    };
    pub use crate::{
        ConfigProvider, ConfigStore, ConvertError, Convertible, GeneratedStore, Map,
        MemoryProvider, Schema, StoreHooks, Value, ValueConverter,
    };
}
