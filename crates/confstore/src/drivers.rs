//! Per-member encode and decode.
//!
//! Generated schema code calls these once per member. Every failure is
//! logged and absorbed here: encoding failures produce `null`, decoding
//! failures leave the member untouched.

use crate::converters::{converter_instance, ValueConverter};
use crate::{
    Convertible, GeneratedStore, Map, MemberDescriptor, StoreError, StoreLink, StoreResult,
    Value, ValueKind,
};
use std::any::{type_name, Any};

/// Outcome of decoding one member.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded<T> {
    /// Leave the member as it is.
    Keep,
    /// Assign a new value.
    Set(T),
    /// Clear the member to its null representation.
    Clear,
}

impl<T> Decoded<T> {
    /// Whether the member should be left untouched.
    pub fn is_keep(&self) -> bool {
        matches!(self, Decoded::Keep)
    }
}

fn converter_name(member: &MemberDescriptor) -> &'static str {
    member.converter_info().map_or("", |c| c.type_name())
}

/// Look up the node for `member`, logging a missing key or disallowed null.
pub fn lookup<'a>(schema: &'static str, map: &'a Map, member: &MemberDescriptor) -> Option<&'a Value> {
    match map.get(member.name()) {
        None => {
            let err = StoreError::missing_key(member.name());
            tracing::error!(schema, member = member.name(), error = %err, "member left unchanged");
            None
        }
        Some(Value::Null) if !member.accepts_null() => {
            let err = StoreError::null_not_allowed(member.name());
            tracing::error!(schema, member = member.name(), error = %err, "member left unchanged");
            None
        }
        Some(node) => Some(node),
    }
}

/// Encode a member with its untyped converter, or with [`Convertible`].
pub fn encode_value<T: Convertible + 'static>(
    schema: &'static str,
    value: &T,
    member: &MemberDescriptor,
) -> Value {
    let result = match member.any_converter() {
        Some(converter) => converter
            .to_value(value as &dyn Any)
            .map_err(|e| StoreError::converter(converter_name(member), e)),
        None => value.to_value(),
    };
    result.unwrap_or_else(|err| {
        tracing::warn!(schema, member = member.name(), error = %err, "member encoded as null");
        Value::Null
    })
}

/// Encode a member with the typed converter `C`.
pub fn encode_with<T, C: ValueConverter<T>>(
    schema: &'static str,
    value: &T,
    member: &MemberDescriptor,
) -> Value {
    converter_instance::<C>()
        .to_value(value)
        .unwrap_or_else(|e| {
            let err = StoreError::converter(type_name::<C>(), e);
            tracing::warn!(schema, member = member.name(), error = %err, "member encoded as null");
            Value::Null
        })
}

fn settle<T>(schema: &'static str, member: &MemberDescriptor, result: StoreResult<T>) -> Decoded<T> {
    match result {
        Ok(value) => Decoded::Set(value),
        Err(err @ StoreError::Converter { .. }) => {
            tracing::warn!(schema, member = member.name(), error = %err, "member left unchanged");
            Decoded::Keep
        }
        Err(err) => {
            let err = err.for_member(member.name());
            tracing::error!(schema, member = member.name(), error = %err, "member left unchanged");
            Decoded::Keep
        }
    }
}

/// Decode a member with its untyped converter, or by merging into a copy of
/// `current` with [`Convertible::decode_into`].
pub fn decode_value<T: Convertible + Clone + 'static>(
    schema: &'static str,
    current: &T,
    map: &Map,
    member: &MemberDescriptor,
) -> Decoded<T> {
    let Some(node) = lookup(schema, map, member) else {
        return Decoded::Keep;
    };
    let result = match member.any_converter() {
        Some(converter) => converter
            .from_value(node)
            .map_err(|e| StoreError::converter(converter_name(member), e))
            .and_then(|boxed| {
                boxed.downcast::<T>().map(|v| *v).map_err(|_| StoreError::Converter {
                    converter: converter_name(member),
                    message: format!("produced a value that is not {}", type_name::<T>()),
                })
            }),
        None => {
            let mut value = current.clone();
            value.decode_into(node).map(|()| value)
        }
    };
    settle(schema, member, result)
}

/// Decode a member with the typed converter `C`.
pub fn decode_with<T, C: ValueConverter<T>>(
    schema: &'static str,
    map: &Map,
    member: &MemberDescriptor,
) -> Decoded<T> {
    let Some(node) = lookup(schema, map, member) else {
        return Decoded::Keep;
    };
    let result = converter_instance::<C>()
        .from_value(node)
        .map_err(|e| StoreError::converter(type_name::<C>(), e));
    settle(schema, member, result)
}

/// Decode the node of a nested store member without touching the child.
pub fn decode_nested(schema: &'static str, map: &Map, member: &MemberDescriptor) -> Decoded<Value> {
    match lookup(schema, map, member) {
        None => Decoded::Keep,
        Some(Value::Null) => Decoded::Clear,
        Some(node @ Value::Map(_)) => Decoded::Set(node.clone()),
        Some(node) => {
            let err = StoreError::type_mismatch(ValueKind::Map, node.kind()).for_member(member.name());
            tracing::error!(schema, member = member.name(), error = %err, "member left unchanged");
            Decoded::Keep
        }
    }
}

/// Encode a child store.
pub fn encode_child<S: GeneratedStore>(child: &S) -> Value {
    Value::Map(child.serialize())
}

/// Encode an optional child store, `null` when absent.
pub fn encode_optional_child<S: GeneratedStore>(child: Option<&S>) -> Value {
    child.map_or(Value::Null, encode_child)
}

/// Apply a decoded node to a child store, reusing it in place.
///
/// Returns whether the member was assigned.
pub fn assign_child<S: GeneratedStore>(child: &S, update: Decoded<Value>) -> bool {
    match update {
        Decoded::Set(node) => {
            child.deserialize(&node);
            true
        }
        Decoded::Keep | Decoded::Clear => false,
    }
}

/// Apply a decoded node to an optional child store.
///
/// An existing child is reused in place. A missing child is created under
/// `link`, starting from the schema default. `null` clears the member.
pub fn assign_optional_child<S: GeneratedStore>(
    slot: &mut Option<S>,
    update: Decoded<Value>,
    link: &StoreLink,
) -> bool {
    match update {
        Decoded::Keep => false,
        Decoded::Clear => {
            *slot = None;
            true
        }
        Decoded::Set(node) => {
            match slot {
                Some(child) => child.deserialize(&node),
                None => {
                    let child = S::create(Some(link));
                    child.deserialize(&node);
                    *slot = Some(child);
                }
            }
            true
        }
    }
}

/// Copy a plain value into a child store, in the caller's transaction.
pub fn copy_child<S: GeneratedStore>(child: &S, source: &S::Schema) {
    child.copy_from(source, false);
}

/// Copy an optional plain value into an optional child store.
pub fn copy_optional_child<S>(slot: &mut Option<S>, source: Option<&S::Schema>, link: &StoreLink)
where
    S: GeneratedStore,
{
    let Some(value) = source else {
        *slot = None;
        return;
    };
    match slot {
        Some(child) => copy_child(child, value),
        None => *slot = Some(S::from_value(value.clone(), Some(link))),
    }
}

/// Snapshot an optional child store.
pub fn snapshot_optional_child<S: GeneratedStore>(child: Option<&S>) -> Option<S::Schema> {
    child.map(|c| c.snapshot())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converters::{TextConverter, Untyped};
    use crate::ConverterInfo;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn member<T: 'static>(name: &'static str) -> MemberDescriptor {
        MemberDescriptor::new::<T>(name, name, type_name::<T>())
    }

    #[test]
    fn test_missing_key_keeps() {
        let map = Map::new();
        assert!(decode_value("T", &5i32, &map, &member::<i32>("a")).is_keep());
    }

    #[test]
    fn test_null_rejected_unless_allowed() {
        let map = Map::new().with("a", Value::Null);
        assert!(decode_value("T", &5i32, &map, &member::<i32>("a")).is_keep());

        let nullable = member::<Option<i32>>("a").nullable_wrapper(true).allow_null(true);
        assert_eq!(decode_value("T", &Some(5), &map, &nullable), Decoded::Set(None));
    }

    #[test]
    fn test_numeric_coercion() {
        let map = Map::new()
            .with("i", Value::Float(Decimal::from(4)))
            .with("f", Value::Integer(2))
            .with("bad", Value::Float(Decimal::from_str("0.5").unwrap()));
        assert_eq!(decode_value("T", &0i64, &map, &member::<i64>("i")), Decoded::Set(4));
        assert_eq!(decode_value("T", &0.0f64, &map, &member::<f64>("f")), Decoded::Set(2.0));
        assert!(decode_value("T", &7i64, &map, &member::<i64>("bad")).is_keep());
    }

    #[test]
    fn test_converter_failure_encodes_null() {
        let v = encode_with::<u8, TextConverter<u8>>("T", &3, &member::<u8>("a"));
        assert_eq!(v, Value::text("3"));

        let map = Map::new().with("a", "x");
        assert!(decode_with::<u8, TextConverter<u8>>("T", &map, &member::<u8>("a")).is_keep());
    }

    #[test]
    fn test_untyped_converter_used_when_valid() {
        let m = member::<u8>("a").converter(ConverterInfo::untyped::<Untyped<TextConverter<u8>, u8>>());
        assert_eq!(encode_value("T", &9u8, &m), Value::text("9"));
        let map = Map::new().with("a", "12");
        assert_eq!(decode_value("T", &0u8, &map, &m), Decoded::Set(12));
    }

    #[test]
    fn test_nested_node_kinds() {
        let m = member::<Option<Value>>("n").allow_null(true);
        let map = Map::new().with("n", Value::Null);
        assert_eq!(decode_nested("T", &map, &m), Decoded::Clear);
        let map = Map::new().with("n", 1i64);
        assert!(decode_nested("T", &map, &m).is_keep());
        let map = Map::new().with("n", Map::new());
        assert_eq!(decode_nested("T", &map, &m), Decoded::Set(Value::map()));
    }
}
