//! Schema trait and member descriptors.
//!
//! A schema is a plain struct annotated with `#[derive(Schema)]`. The derive
//! emits the member table ([`Schema::read_members`]) and the store type; the
//! runtime caches the member table per type with [`describe`].

use crate::cache::SingleCreationCache;
use crate::converters::AnyConverter;
use crate::{GeneratedStore, Map, StoreError, StoreLink};
use std::any::{type_name, TypeId};
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Whether a member converter is typed or untyped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConverterKind {
    /// A `ValueConverter<FieldTy>`, checked at compile time.
    Typed,
    /// An `AnyConverter`, checked when the schema is described.
    Untyped,
}

/// The converter declared for a member.
#[derive(Clone)]
pub struct ConverterInfo {
    type_name: &'static str,
    kind: ConverterKind,
    instance: Option<Arc<dyn AnyConverter>>,
}

impl ConverterInfo {
    /// A typed converter of type `C`.
    pub fn typed<C: 'static>() -> Self {
        Self {
            type_name: type_name::<C>(),
            kind: ConverterKind::Typed,
            instance: None,
        }
    }

    /// An untyped converter of type `C`.
    pub fn untyped<C: AnyConverter + Default>() -> Self {
        Self {
            type_name: type_name::<C>(),
            kind: ConverterKind::Untyped,
            instance: Some(Arc::new(C::default()) as Arc<dyn AnyConverter>),
        }
    }

    /// The converter's type name.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Whether it is typed or untyped.
    pub fn kind(&self) -> ConverterKind {
        self.kind
    }

    /// The untyped converter instance.
    pub fn instance(&self) -> Option<&Arc<dyn AnyConverter>> {
        self.instance.as_ref()
    }
}

impl PartialEq for ConverterInfo {
    fn eq(&self, other: &Self) -> bool {
        self.type_name == other.type_name && self.kind == other.kind
    }
}

impl fmt::Debug for ConverterInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConverterInfo")
            .field("type_name", &self.type_name)
            .field("kind", &self.kind)
            .finish()
    }
}

/// Metadata for one serialized member of a schema.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberDescriptor {
    name: &'static str,
    field: &'static str,
    declared_type: &'static str,
    type_id: TypeId,
    is_nullable_wrapper: bool,
    allow_null: bool,
    intercepted: bool,
    nested: bool,
    converter: Option<ConverterInfo>,
}

impl MemberDescriptor {
    /// Describe a member of type `T` stored in `field` and serialized as `name`.
    pub fn new<T: 'static>(name: &'static str, field: &'static str, declared_type: &'static str) -> Self {
        Self {
            name,
            field,
            declared_type,
            type_id: TypeId::of::<T>(),
            is_nullable_wrapper: false,
            allow_null: false,
            intercepted: true,
            nested: false,
            converter: None,
        }
    }

    /// Mark the member type as an `Option` wrapper.
    pub fn nullable_wrapper(mut self, value: bool) -> Self {
        self.is_nullable_wrapper = value;
        self
    }

    /// Set whether a null node is accepted.
    pub fn allow_null(mut self, value: bool) -> Self {
        self.allow_null = value;
        self
    }

    /// Set whether writes open a change transaction.
    pub fn intercepted(mut self, value: bool) -> Self {
        self.intercepted = value;
        self
    }

    /// Mark the member as a nested store.
    pub fn nested(mut self, value: bool) -> Self {
        self.nested = value;
        self
    }

    /// Attach a converter.
    pub fn converter(mut self, converter: ConverterInfo) -> Self {
        self.converter = Some(converter);
        self
    }

    /// The serialized key.
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The Rust field name.
    #[inline]
    pub fn field(&self) -> &'static str {
        self.field
    }

    /// The declared type as written in the schema.
    pub fn declared_type(&self) -> &'static str {
        self.declared_type
    }

    /// The `TypeId` of the declared type.
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Whether the declared type is `Option<_>`.
    pub fn is_nullable_wrapper(&self) -> bool {
        self.is_nullable_wrapper
    }

    /// Whether a null node is accepted for this member.
    pub fn accepts_null(&self) -> bool {
        self.allow_null
    }

    /// Whether writes open a change transaction and notify.
    pub fn is_mutable_via_override(&self) -> bool {
        self.intercepted
    }

    /// Whether the member is a nested store.
    pub fn is_nested(&self) -> bool {
        self.nested
    }

    /// The declared converter, if any.
    pub fn converter_info(&self) -> Option<&ConverterInfo> {
        self.converter.as_ref()
    }

    /// The validated untyped converter, if any.
    pub fn any_converter(&self) -> Option<&Arc<dyn AnyConverter>> {
        self.converter.as_ref().and_then(ConverterInfo::instance)
    }

    fn validate_converter(&mut self, schema: &'static str) {
        let Some(instance) = self.any_converter() else {
            return;
        };
        if instance.target_type() == self.type_id {
            return;
        }
        let err = StoreError::InvalidConverter {
            schema,
            member: self.field,
            converter: self.converter.as_ref().map_or("", ConverterInfo::type_name),
            reason: format!(
                "targets {} but the member is {}",
                instance.target_type_name(),
                self.declared_type
            ),
        };
        tracing::warn!(
            schema,
            member = self.field,
            error = %err,
            "falling back to the default conversion"
        );
        self.converter = None;
    }
}

/// A struct that can be wrapped in a store.
///
/// Implemented by `#[derive(Schema)]`; the associated types are generated
/// companions of the struct.
pub trait Schema: Default + Clone + Send + Sync + 'static {
    /// The generated store handle.
    type Store: GeneratedStore<Schema = Self>;

    /// Member storage held inside a store. Nested members hold child stores.
    type Slots: Clone + Send + Sync + 'static;

    /// Decoded members waiting to be assigned.
    type Decoded: Send + 'static;

    /// Type name, used in diagnostics and in the store graph.
    const NAME: &'static str;

    /// Whether property-change observers are notified.
    const NOTIFY: bool;

    /// Build the member table. Prefer [`Schema::members`], which caches it.
    fn read_members() -> Vec<MemberDescriptor>;

    /// The cached member table.
    fn members() -> Arc<[MemberDescriptor]> {
        describe::<Self>()
    }

    /// Move a value into store slots, creating child stores under `link`.
    fn materialize(value: Self, link: &StoreLink) -> Self::Slots;

    /// Copy the slots out into a plain value.
    fn snapshot(slots: &Self::Slots) -> Self;

    /// Encode every member in descriptor order.
    fn encode(slots: &Self::Slots, members: &[MemberDescriptor]) -> Map;

    /// Decode `map` against the current slots without touching them.
    fn decode(slots: &Self::Slots, map: &Map, members: &[MemberDescriptor]) -> Self::Decoded;

    /// Apply decoded members, returning the names of assigned fields.
    fn assign(slots: &mut Self::Slots, decoded: Self::Decoded, link: &StoreLink) -> Vec<&'static str>;

    /// Copy every serialized member of `source`, returning the field names.
    fn copy_into(slots: &mut Self::Slots, source: &Self, link: &StoreLink) -> Vec<&'static str>;
}

/// Callbacks a schema may run on its store.
///
/// The derive generates an empty implementation unless the schema is marked
/// `#[confstore(hooks)]`.
pub trait StoreHooks: Schema {
    /// Runs after a committed change on the root store of a graph.
    fn changed(_store: &Self::Store) {}

    /// Runs after the store has been reloaded from a provider.
    fn on_reload(_store: &Self::Store) {}

    /// Runs after `copy_from` has copied every member.
    fn copied(_store: &Self::Store) {}
}

fn descriptors() -> &'static SingleCreationCache<TypeId, Arc<[MemberDescriptor]>> {
    static DESCRIPTORS: OnceLock<SingleCreationCache<TypeId, Arc<[MemberDescriptor]>>> =
        OnceLock::new();
    DESCRIPTORS.get_or_init(SingleCreationCache::new)
}

/// The member table of `T`, computed once per process.
///
/// Untyped converters whose target type differs from the member type are
/// logged and dropped here, so the member uses its default conversion.
pub fn describe<T: Schema>() -> Arc<[MemberDescriptor]> {
    descriptors().get_or_create(TypeId::of::<T>(), |_| {
        let mut members = T::read_members();
        for member in &mut members {
            member.validate_converter(T::NAME);
        }
        tracing::debug!(schema = T::NAME, members = members.len(), "described schema");
        Arc::from(members)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converters::{TextConverter, Untyped};

    #[test]
    fn test_descriptor_builder() {
        let d = MemberDescriptor::new::<Option<i32>>("Count", "count", "Option<i32>")
            .nullable_wrapper(true)
            .allow_null(true);
        assert_eq!(d.name(), "Count");
        assert_eq!(d.field(), "count");
        assert!(d.is_nullable_wrapper());
        assert!(d.accepts_null());
        assert!(d.is_mutable_via_override());
        assert!(!d.is_nested());
        assert_eq!(d.type_id(), TypeId::of::<Option<i32>>());
    }

    #[test]
    fn test_converter_equality_ignores_instance() {
        let a = ConverterInfo::untyped::<Untyped<TextConverter<u8>, u8>>();
        let b = ConverterInfo::untyped::<Untyped<TextConverter<u8>, u8>>();
        assert_eq!(a, b);
        assert_ne!(a, ConverterInfo::typed::<TextConverter<u8>>());
    }

    #[test]
    fn test_mismatched_untyped_converter_is_dropped() {
        let mut d = MemberDescriptor::new::<u16>("port", "port", "u16")
            .converter(ConverterInfo::untyped::<Untyped<TextConverter<u8>, u8>>());
        d.validate_converter("Test");
        assert!(d.converter_info().is_none());

        let mut ok = MemberDescriptor::new::<u8>("port", "port", "u8")
            .converter(ConverterInfo::untyped::<Untyped<TextConverter<u8>, u8>>());
        ok.validate_converter("Test");
        assert!(ok.any_converter().is_some());
    }
}
