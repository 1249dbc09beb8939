//! The value tree used as the serialization boundary.
//!
//! A document is a tree of [`Value`] nodes. Providers turn bytes into a tree
//! and back; stores only ever see trees. Numbers come in two kinds:
//! [`Value::Integer`] (64-bit signed) and [`Value::Float`] (a decimal, so
//! that money-like values survive without binary rounding). Conversions
//! between the two are explicit and refuse to lose information.

use crate::{Map, StoreError, StoreResult};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

/// Map key serde_json uses to carry a number as its exact digits.
const NUMBER_TOKEN: &str = "$serde_json::private::Number";

/// The kind of a [`Value`] node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// The null node.
    Null,
    /// An ordered string-keyed map.
    Map,
    /// An ordered sequence.
    List,
    /// A string.
    Text,
    /// A boolean.
    Boolean,
    /// A 64-bit signed integer.
    Integer,
    /// A decimal number.
    Float,
}

impl ValueKind {
    /// Lower-case name used in diagnostics.
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueKind::Null => "null",
            ValueKind::Map => "map",
            ValueKind::List => "list",
            ValueKind::Text => "text",
            ValueKind::Boolean => "boolean",
            ValueKind::Integer => "integer",
            ValueKind::Float => "float",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A node in the value tree.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Absence of a value.
    #[default]
    Null,
    /// Ordered key/value pairs with unique keys.
    Map(Map),
    /// Ordered sequence of values.
    List(Vec<Value>),
    /// A string.
    Text(String),
    /// A boolean.
    Boolean(bool),
    /// A 64-bit signed integer.
    Integer(i64),
    /// A decimal number.
    Float(Decimal),
}

impl Value {
    /// Create a text node.
    #[inline]
    pub fn text(value: impl Into<String>) -> Self {
        Value::Text(value.into())
    }

    /// Create an empty map node.
    #[inline]
    pub fn map() -> Self {
        Value::Map(Map::new())
    }

    /// Create an empty list node.
    #[inline]
    pub fn list() -> Self {
        Value::List(Vec::new())
    }

    /// The kind of this node.
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Map(_) => ValueKind::Map,
            Value::List(_) => ValueKind::List,
            Value::Text(_) => ValueKind::Text,
            Value::Boolean(_) => ValueKind::Boolean,
            Value::Integer(_) => ValueKind::Integer,
            Value::Float(_) => ValueKind::Float,
        }
    }

    /// Check if this is the null node.
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Borrow the map if this is a map node.
    pub fn as_map(&self) -> Option<&Map> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Borrow the elements if this is a list node.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Borrow the string if this is a text node.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get the boolean if this is a boolean node.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Integer value of a numeric node.
    ///
    /// Float nodes qualify only when they have no fractional part and fit in
    /// an `i64`.
    pub fn int_value(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Float(d) => decimal_to_i64(*d),
            _ => None,
        }
    }

    /// Decimal value of a numeric node. Integer nodes always qualify.
    pub fn float_value(&self) -> Option<Decimal> {
        match self {
            Value::Float(d) => Some(*d),
            Value::Integer(i) => Some(Decimal::from(*i)),
            _ => None,
        }
    }

    /// Convert an integer node into the equivalent float node.
    ///
    /// Returns `None` for any other kind.
    pub fn as_float(&self) -> Option<Value> {
        match self {
            Value::Integer(i) => Some(Value::Float(Decimal::from(*i))),
            _ => None,
        }
    }

    /// Convert a float node into an integer node when that is lossless.
    ///
    /// Returns an error when the decimal has a fractional part or is out of
    /// range, and `None` for non-float nodes.
    pub fn as_integer(&self) -> Option<StoreResult<Value>> {
        match self {
            Value::Float(d) => Some(
                decimal_to_i64(*d)
                    .map(Value::Integer)
                    .ok_or_else(|| StoreError::not_representable(d, "i64")),
            ),
            _ => None,
        }
    }

    /// View this node as `expected`, applying integer/float coercion.
    ///
    /// Nodes that already have the expected kind are borrowed. An integer
    /// node coerces to float; a float node coerces to integer only when it
    /// has no fractional part. Every other mismatch is a type error.
    pub fn coerce(&self, expected: ValueKind) -> StoreResult<Cow<'_, Value>> {
        let found = self.kind();
        if found == expected {
            return Ok(Cow::Borrowed(self));
        }
        match (expected, self) {
            (ValueKind::Float, Value::Integer(_)) => {
                Ok(Cow::Owned(self.as_float().unwrap_or_default()))
            }
            (ValueKind::Integer, Value::Float(_)) => match self.as_integer() {
                Some(result) => result.map(Cow::Owned),
                None => Err(StoreError::type_mismatch(expected, found)),
            },
            _ => Err(StoreError::type_mismatch(expected, found)),
        }
    }
}

fn decimal_to_i64(d: Decimal) -> Option<i64> {
    if d.fract().is_zero() {
        d.to_i64()
    } else {
        None
    }
}

/// The decimal spelled by the shortest text that reads back as `value`.
///
/// `None` when that text does not fit a decimal exactly: NaN, infinities,
/// magnitudes above `Decimal::MAX`, and digits beyond 28 decimal places.
pub(crate) fn decimal_from_float<F>(value: F) -> Option<Decimal>
where
    F: fmt::LowerExp + FromStr + PartialEq + Copy,
{
    let decimal = Decimal::from_scientific(&format!("{value:e}")).ok()?;
    (float_from_decimal::<F>(decimal)? == value).then_some(decimal)
}

/// The float nearest to `decimal`.
pub(crate) fn float_from_decimal<F: FromStr>(decimal: Decimal) -> Option<F> {
    decimal.to_string().parse().ok()
}

/// Parse number digits written by a serde format.
fn number_from_digits(digits: &str) -> Option<Value> {
    if let Ok(i) = digits.parse::<i64>() {
        return Some(Value::Integer(i));
    }
    let decimal = if digits.contains(['e', 'E']) {
        Decimal::from_scientific(digits)
    } else {
        Decimal::from_str_exact(digits)
    };
    decimal.ok().map(Value::Float)
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<Decimal> for Value {
    fn from(value: Decimal) -> Self {
        Value::Float(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<Map> for Value {
    fn from(value: Map) -> Self {
        Value::Map(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::List(value)
    }
}

impl FromIterator<Value> for Value {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Value::List(iter.into_iter().collect())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Map(map) => {
                f.write_str("{")?;
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{key:?}:{value}")?;
                }
                f.write_str("}")
            }
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Text(s) => write!(f, "{s:?}"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Float(d) => write!(f, "{d}"),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Boolean(b) => serializer.serialize_bool(*b),
            Value::Integer(i) => serializer.serialize_i64(*i),
            Value::Float(d) => match float_from_decimal::<f64>(*d) {
                Some(f) if decimal_from_float(f) == Some(*d) => serializer.serialize_f64(f),
                _ => rust_decimal::serde::arbitrary_precision::serialize(d, serializer),
            },
            Value::Text(s) => serializer.serialize_str(s),
            Value::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (key, value) in map.iter() {
                    out.serialize_entry(key, value)?;
                }
                out.end()
            }
        }
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a config value")
    }

    fn visit_unit<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Value, D::Error> {
        Value::deserialize(deserializer)
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Value, E> {
        Ok(Value::Boolean(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Value, E> {
        Ok(Value::Integer(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Value, E> {
        Ok(match i64::try_from(v) {
            Ok(i) => Value::Integer(i),
            Err(_) => Value::Float(Decimal::from(v)),
        })
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Value, E> {
        decimal_from_float(v)
            .map(Value::Float)
            .ok_or_else(|| E::custom(format!("{v} is not representable as a decimal")))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Value, E> {
        Ok(Value::Text(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Value, E> {
        Ok(Value::Text(v))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(Value::List(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Value, A::Error> {
        let mut map = Map::with_capacity(access.size_hint().unwrap_or(0));
        let Some(first) = access.next_key::<String>()? else {
            return Ok(Value::Map(map));
        };
        if first == NUMBER_TOKEN {
            let digits: String = access.next_value()?;
            return number_from_digits(&digits).ok_or_else(|| {
                de::Error::custom(format!("{digits} is not representable as a decimal"))
            });
        }
        map.insert(first, access.next_value()?);
        while let Some((key, value)) = access.next_entry::<String, Value>()? {
            map.insert(key, value);
        }
        Ok(Value::Map(map))
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}

impl TryFrom<serde_json::Value> for Value {
    type Error = StoreError;

    fn try_from(value: serde_json::Value) -> StoreResult<Self> {
        Ok(match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(b),
            serde_json::Value::Number(n) => number_from_digits(n.as_str())
                .ok_or_else(|| StoreError::not_representable(n.as_str(), "Decimal"))?,
            serde_json::Value::String(s) => Value::Text(s),
            serde_json::Value::Array(items) => Value::List(
                items
                    .into_iter()
                    .map(Value::try_from)
                    .collect::<StoreResult<Vec<_>>>()?,
            ),
            serde_json::Value::Object(object) => {
                let mut map = Map::with_capacity(object.len());
                for (key, value) in object {
                    map.insert(key, Value::try_from(value)?);
                }
                Value::Map(map)
            }
        })
    }
}

impl From<&Value> for serde_json::Value {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => serde_json::Value::Null,
            Value::Boolean(b) => serde_json::Value::Bool(*b),
            Value::Integer(i) => serde_json::Value::from(*i),
            Value::Float(d) => d
                .to_string()
                .parse::<serde_json::Number>()
                .map(serde_json::Value::Number)
                .unwrap_or_else(|_| serde_json::Value::String(d.to_string())),
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::List(items) => serde_json::Value::Array(items.iter().map(Into::into).collect()),
            Value::Map(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(k, v)| (k.to_string(), serde_json::Value::from(v)))
                    .collect(),
            ),
        }
    }
}
