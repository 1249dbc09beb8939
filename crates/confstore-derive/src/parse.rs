//! Parsing logic for the Schema derive macro.

use darling::{ast, FromDeriveInput, FromField};
use syn::{Generics, Ident, Type, Visibility};

/// Parsed struct-level options.
#[derive(Debug, FromDeriveInput)]
#[darling(attributes(confstore), supports(struct_named))]
pub struct SchemaInput {
    /// The struct identifier.
    pub ident: Ident,

    /// The struct visibility.
    pub vis: Visibility,

    /// Generic parameters. Schemas must not have any.
    pub generics: Generics,

    /// Struct data (fields).
    pub data: ast::Data<(), FieldInput>,

    /// Notify property observers on member changes.
    #[darling(default)]
    pub notify: bool,

    /// The author implements `StoreHooks` by hand.
    #[darling(default)]
    pub hooks: bool,
}

impl SchemaInput {
    /// Get the fields as a vector.
    pub fn fields(&self) -> Vec<&FieldInput> {
        self.data
            .as_ref()
            .take_struct()
            .map(|s| s.fields.to_vec())
            .unwrap_or_default()
    }
}

/// Parsed field-level options.
#[derive(Debug, FromField)]
#[darling(attributes(confstore))]
pub struct FieldInput {
    /// Field identifier.
    pub ident: Option<Ident>,

    /// Field type.
    pub ty: Type,

    /// Serialized key.
    #[darling(default)]
    pub rename: Option<String>,

    /// Exclude from serialization and copying.
    #[darling(default)]
    pub ignore: bool,

    /// Reject null nodes.
    #[darling(default)]
    pub non_null: bool,

    /// Typed converter (`ValueConverter<FieldTy>`).
    #[darling(default)]
    pub converter: Option<Type>,

    /// Untyped converter (`AnyConverter`).
    #[darling(default)]
    pub dyn_converter: Option<Type>,

    /// Hold the member as a child store.
    #[darling(default)]
    pub nested: bool,

    /// Write without a change transaction.
    #[darling(default)]
    pub plain: bool,
}

impl FieldInput {
    /// Get the field identifier (panics if None).
    pub fn ident(&self) -> &Ident {
        self.ident.as_ref().expect("named field required")
    }

    /// Get the serialized key for this field.
    pub fn key(&self) -> String {
        self.rename
            .clone()
            .unwrap_or_else(|| self.ident().to_string())
    }

    /// Whether any member-level modifier besides `ignore` is present.
    pub fn has_member_modifiers(&self) -> bool {
        self.rename.is_some()
            || self.non_null
            || self.converter.is_some()
            || self.dyn_converter.is_some()
            || self.nested
    }
}
