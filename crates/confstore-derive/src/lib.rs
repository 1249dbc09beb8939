//! Derive macro for the confstore `Schema` trait.
//!
//! This crate provides the `#[derive(Schema)]` macro that generates:
//! - `{Name}Store`: a thread-safe store handle with a getter and setter per field
//! - `impl Schema for {Name}`: member table, encode, decode and copy
//! - `impl Convertible for {Name}`: the struct as a whole value
//!
//! # Usage
//!
//! ```ignore
//! use confstore::prelude::*;
//!
//! #[derive(Debug, Clone, Default, Schema)]
//! struct Window {
//!     width: u32,
//!     height: u32,
//!     #[confstore(nested)]
//!     theme: Theme,
//! }
//! ```

use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput};

mod codegen;
mod field_kind;
mod parse;

/// Derive the `Schema` trait for a struct.
///
/// The struct must have named fields, no generic parameters, and implement
/// `Default` and `Clone`. Every serialized field type implements
/// `Convertible` unless it has a typed converter.
///
/// # Attributes
///
/// ## Struct Attributes
///
/// - `#[confstore(notify)]`: Generate `subscribe_property_changed`; observers
///   receive the field name after each committed write
/// - `#[confstore(hooks)]`: Skip the empty `StoreHooks` impl so the struct can
///   implement `changed`, `on_reload` and `copied` itself
///
/// ## Field Attributes
///
/// - `#[confstore(rename = "Key")]`: Use a different key in the tree
/// - `#[confstore(ignore)]`: Keep the field in the store but never serialize
///   or copy it
/// - `#[confstore(non_null)]`: Reject `null` for an `Option` field
/// - `#[confstore(converter = "C")]`: Convert with `C: ValueConverter<FieldTy>`
/// - `#[confstore(dyn_converter = "C")]`: Convert with `C: AnyConverter`; a
///   converter targeting another type is dropped when the schema is described
/// - `#[confstore(nested)]`: Hold a schema field (`T` or `Option<T>`) as a
///   child store sharing the parent's lock
/// - `#[confstore(plain)]`: Write under the lock without a change transaction
///
/// Function-typed fields (`fn(..)`, `Box<dyn Fn(..)>`, `Arc<dyn Fn(..)>`) are
/// never serialized.
///
/// # Examples
///
/// ```ignore
/// #[derive(Debug, Clone, Default, Schema)]
/// #[confstore(notify)]
/// struct Player {
///     #[confstore(rename = "PlayerName")]
///     name: Option<String>,
///     level: u8,
/// }
///
/// let store = PlayerStore::create(None);
/// store.set_level(3);
/// assert_eq!(store.level(), 3);
/// ```
#[proc_macro_derive(Schema, attributes(confstore))]
pub fn derive_schema(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match codegen::expand(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}
