//! Default conversions between Rust values and the value tree.
//!
//! [`Convertible`] is the built-in strategy used for every member that does
//! not name a converter. Derived schemas implement it member-wise, which is
//! how schemas embedded by value are encoded.

use crate::value::{decimal_from_float, float_from_decimal};
use crate::{StoreError, StoreResult, Value, ValueKind};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::hash::Hash;

/// Conversion between a Rust type and a [`Value`] node.
pub trait Convertible: Sized {
    /// Encode `self` as a node.
    fn to_value(&self) -> StoreResult<Value>;

    /// Decode a fresh value from a node.
    fn from_value(value: &Value) -> StoreResult<Self>;

    /// Decode a node into an existing value.
    ///
    /// The default replaces `self`. Map-shaped types override this to merge,
    /// leaving entries absent from the node untouched.
    fn decode_into(&mut self, value: &Value) -> StoreResult<()> {
        *self = Self::from_value(value)?;
        Ok(())
    }
}

impl Convertible for Value {
    fn to_value(&self) -> StoreResult<Value> {
        Ok(self.clone())
    }

    fn from_value(value: &Value) -> StoreResult<Self> {
        Ok(value.clone())
    }
}

impl Convertible for bool {
    fn to_value(&self) -> StoreResult<Value> {
        Ok(Value::Boolean(*self))
    }

    fn from_value(value: &Value) -> StoreResult<Self> {
        value
            .as_bool()
            .ok_or_else(|| StoreError::type_mismatch(ValueKind::Boolean, value.kind()))
    }
}

fn integer_of(value: &Value, target: &'static str) -> StoreResult<i128> {
    if let Some(i) = value.int_value() {
        return Ok(i128::from(i));
    }
    match value {
        // Whole decimals past the i64 range, as written for large unsigned values.
        Value::Float(d) if d.fract().is_zero() => d
            .to_i128()
            .ok_or_else(|| StoreError::not_representable(d, target)),
        Value::Float(d) => Err(StoreError::not_representable(d, target)),
        other => Err(StoreError::type_mismatch(ValueKind::Integer, other.kind())),
    }
}

macro_rules! impl_signed {
    ($($t:ty),*) => {$(
        impl Convertible for $t {
            fn to_value(&self) -> StoreResult<Value> {
                i64::try_from(*self)
                    .map(Value::Integer)
                    .map_err(|_| StoreError::not_representable(self, "i64"))
            }

            fn from_value(value: &Value) -> StoreResult<Self> {
                let n = integer_of(value, stringify!($t))?;
                <$t>::try_from(n).map_err(|_| StoreError::not_representable(n, stringify!($t)))
            }
        }
    )*};
}

macro_rules! impl_unsigned {
    ($($t:ty),*) => {$(
        impl Convertible for $t {
            fn to_value(&self) -> StoreResult<Value> {
                Ok(match i64::try_from(*self) {
                    Ok(i) => Value::Integer(i),
                    Err(_) => Value::Float(Decimal::from(*self)),
                })
            }

            fn from_value(value: &Value) -> StoreResult<Self> {
                let n = integer_of(value, stringify!($t))?;
                <$t>::try_from(n).map_err(|_| StoreError::not_representable(n, stringify!($t)))
            }
        }
    )*};
}

impl_signed!(i8, i16, i32, i64, isize);
impl_unsigned!(u8, u16, u32, u64, usize);

fn decimal_of(value: &Value) -> StoreResult<Decimal> {
    match value.coerce(ValueKind::Float)?.as_ref() {
        Value::Float(d) => Ok(*d),
        other => Err(StoreError::type_mismatch(ValueKind::Float, other.kind())),
    }
}

impl Convertible for Decimal {
    fn to_value(&self) -> StoreResult<Value> {
        Ok(Value::Float(*self))
    }

    fn from_value(value: &Value) -> StoreResult<Self> {
        decimal_of(value)
    }
}

/// Floats are stored as the decimal of their shortest round-tripping text,
/// so `0.1` is written as `0.1` and reads back as the same float. Values
/// that have no such decimal cannot be stored.
macro_rules! impl_float {
    ($($t:ty),*) => {$(
        impl Convertible for $t {
            fn to_value(&self) -> StoreResult<Value> {
                decimal_from_float(*self)
                    .map(Value::Float)
                    .ok_or_else(|| StoreError::not_representable(self, "Decimal"))
            }

            fn from_value(value: &Value) -> StoreResult<Self> {
                let d = decimal_of(value)?;
                float_from_decimal(d).ok_or_else(|| StoreError::not_representable(d, stringify!($t)))
            }
        }
    )*};
}

impl_float!(f32, f64);

impl Convertible for String {
    fn to_value(&self) -> StoreResult<Value> {
        Ok(Value::Text(self.clone()))
    }

    fn from_value(value: &Value) -> StoreResult<Self> {
        value
            .as_text()
            .map(str::to_string)
            .ok_or_else(|| StoreError::type_mismatch(ValueKind::Text, value.kind()))
    }
}

impl Convertible for char {
    fn to_value(&self) -> StoreResult<Value> {
        Ok(Value::Text(self.to_string()))
    }

    /// Takes the first code point of a text node.
    fn from_value(value: &Value) -> StoreResult<Self> {
        let text = value
            .as_text()
            .ok_or_else(|| StoreError::type_mismatch(ValueKind::Text, value.kind()))?;
        text.chars()
            .next()
            .ok_or_else(|| StoreError::not_representable("\"\"", "char"))
    }
}

impl<T: Convertible> Convertible for Option<T> {
    fn to_value(&self) -> StoreResult<Value> {
        match self {
            Some(inner) => inner.to_value(),
            None => Ok(Value::Null),
        }
    }

    fn from_value(value: &Value) -> StoreResult<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }

    /// A present value is decoded in place; an absent one is built fresh,
    /// which for schemas means starting from their default.
    fn decode_into(&mut self, value: &Value) -> StoreResult<()> {
        if value.is_null() {
            *self = None;
            return Ok(());
        }
        match self {
            Some(inner) => inner.decode_into(value),
            None => {
                *self = Some(T::from_value(value)?);
                Ok(())
            }
        }
    }
}

fn list_of(value: &Value) -> StoreResult<&[Value]> {
    value
        .as_list()
        .ok_or_else(|| StoreError::type_mismatch(ValueKind::List, value.kind()))
}

fn encode_list<'a, T: Convertible + 'a>(items: impl Iterator<Item = &'a T>) -> StoreResult<Value> {
    items
        .map(Convertible::to_value)
        .collect::<StoreResult<Vec<_>>>()
        .map(Value::List)
}

impl<T: Convertible> Convertible for Vec<T> {
    fn to_value(&self) -> StoreResult<Value> {
        encode_list(self.iter())
    }

    fn from_value(value: &Value) -> StoreResult<Self> {
        list_of(value)?.iter().map(T::from_value).collect()
    }
}

impl<T: Convertible> Convertible for VecDeque<T> {
    fn to_value(&self) -> StoreResult<Value> {
        encode_list(self.iter())
    }

    fn from_value(value: &Value) -> StoreResult<Self> {
        list_of(value)?.iter().map(T::from_value).collect()
    }
}

impl<T: Convertible + Ord> Convertible for BTreeSet<T> {
    fn to_value(&self) -> StoreResult<Value> {
        encode_list(self.iter())
    }

    fn from_value(value: &Value) -> StoreResult<Self> {
        list_of(value)?.iter().map(T::from_value).collect()
    }
}

impl<T: Convertible + Eq + Hash> Convertible for HashSet<T> {
    fn to_value(&self) -> StoreResult<Value> {
        encode_list(self.iter())
    }

    fn from_value(value: &Value) -> StoreResult<Self> {
        list_of(value)?.iter().map(T::from_value).collect()
    }
}

fn map_of(value: &Value) -> StoreResult<&crate::Map> {
    value
        .as_map()
        .ok_or_else(|| StoreError::type_mismatch(ValueKind::Map, value.kind()))
}

impl<T: Convertible> Convertible for BTreeMap<String, T> {
    fn to_value(&self) -> StoreResult<Value> {
        self.iter()
            .map(|(k, v)| Ok::<_, StoreError>((k.clone(), v.to_value()?)))
            .collect::<StoreResult<crate::Map>>()
            .map(Value::Map)
    }

    fn from_value(value: &Value) -> StoreResult<Self> {
        map_of(value)?
            .iter()
            .map(|(k, v)| Ok::<_, StoreError>((k.to_string(), T::from_value(v)?)))
            .collect()
    }
}

impl<T: Convertible> Convertible for HashMap<String, T> {
    /// Entries are written in key order so output is stable.
    fn to_value(&self) -> StoreResult<Value> {
        let mut entries: Vec<_> = self.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
            .into_iter()
            .map(|(k, v)| Ok::<_, StoreError>((k.clone(), v.to_value()?)))
            .collect::<StoreResult<crate::Map>>()
            .map(Value::Map)
    }

    fn from_value(value: &Value) -> StoreResult<Self> {
        map_of(value)?
            .iter()
            .map(|(k, v)| Ok::<_, StoreError>((k.to_string(), T::from_value(v)?)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_integer_from_integral_float() {
        let v = Value::Float(Decimal::from(12));
        assert_eq!(i32::from_value(&v).unwrap(), 12);
    }

    #[test]
    fn test_integer_from_fractional_float_fails() {
        let v = Value::Float(Decimal::from_str("12.5").unwrap());
        assert!(matches!(
            i32::from_value(&v),
            Err(StoreError::NotRepresentable { target: "i32", .. })
        ));
    }

    #[test]
    fn test_integer_overflow_fails() {
        assert!(u8::from_value(&Value::Integer(300)).is_err());
        assert!(u32::from_value(&Value::Integer(-1)).is_err());
    }

    #[test]
    fn test_large_u64_uses_float() {
        let v = u64::MAX.to_value().unwrap();
        assert_eq!(v.kind(), ValueKind::Float);
        assert_eq!(u64::from_value(&v).unwrap(), u64::MAX);
    }

    #[test]
    fn test_float_from_integer_is_exact() {
        assert_eq!(f64::from_value(&Value::Integer(3)).unwrap(), 3.0);
        assert_eq!(
            Decimal::from_value(&Value::Integer(-7)).unwrap(),
            Decimal::from(-7)
        );
    }

    #[test]
    fn test_floats_keep_their_shortest_form() {
        let sum: f64 = 0.1 + 0.2;
        let v = sum.to_value().unwrap();
        assert_eq!(
            v,
            Value::Float(Decimal::from_str("0.30000000000000004").unwrap())
        );
        assert_eq!(f64::from_value(&v).unwrap(), sum);

        let third = 1.0f32 / 3.0;
        assert_eq!(f32::from_value(&third.to_value().unwrap()).unwrap(), third);
        assert_eq!(
            0.1f32.to_value().unwrap(),
            Value::Float(Decimal::from_str("0.1").unwrap())
        );
    }

    #[test]
    fn test_floats_outside_decimal_range_fail() {
        for x in [1e30, 1e-30, f64::MAX, f64::MIN_POSITIVE, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                x.to_value(),
                Err(StoreError::NotRepresentable { target: "Decimal", .. })
            ));
        }
        let edge: f64 = 7.9e28;
        assert_eq!(f64::from_value(&edge.to_value().unwrap()).unwrap(), edge);
        let tiny: f64 = 1e-28;
        assert_eq!(f64::from_value(&tiny.to_value().unwrap()).unwrap(), tiny);
    }

    #[test]
    fn test_char_takes_first_code_point() {
        assert_eq!(char::from_value(&Value::text("éa")).unwrap(), 'é');
        assert!(char::from_value(&Value::text("")).is_err());
    }

    #[test]
    fn test_option_null() {
        assert_eq!(Option::<i32>::from_value(&Value::Null).unwrap(), None);
        assert_eq!(None::<i32>.to_value().unwrap(), Value::Null);
        let mut v = Some(5);
        v.decode_into(&Value::Null).unwrap();
        assert_eq!(v, None);
    }

    #[test]
    fn test_sequence_decode() {
        let node = Value::List(vec![Value::Integer(1), Value::Float(Decimal::from(2))]);
        assert_eq!(Vec::<i64>::from_value(&node).unwrap(), vec![1, 2]);
        assert_eq!(
            Vec::<i64>::from_value(&Value::text("x")).unwrap_err(),
            StoreError::type_mismatch(ValueKind::List, ValueKind::Text)
        );
    }

    #[test]
    fn test_hash_map_is_sorted() {
        let mut m = HashMap::new();
        m.insert("b".to_string(), 2i32);
        m.insert("a".to_string(), 1i32);
        let node = m.to_value().unwrap();
        assert_eq!(node.as_map().unwrap().keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(HashMap::<String, i32>::from_value(&node).unwrap(), m);
    }

    #[test]
    fn test_type_mismatch() {
        assert_eq!(
            bool::from_value(&Value::Integer(1)).unwrap_err(),
            StoreError::type_mismatch(ValueKind::Boolean, ValueKind::Integer)
        );
    }
}
