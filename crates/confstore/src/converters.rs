//! User-selectable conversion strategies.
//!
//! A member may name a converter instead of relying on [`Convertible`]:
//!
//! - `#[confstore(converter = "C")]` with `C: ValueConverter<FieldTy>`. The
//!   compiler checks that the converter targets the member's type.
//! - `#[confstore(dyn_converter = "C")]` with `C: AnyConverter + Default`. The
//!   target type is checked when the schema is first described; a mismatch
//!   is logged and the member falls back to [`Convertible`].
//!
//! Converter instances are created once per converter type and shared.

use crate::cache::SingleCreationCache;
use crate::{ConvertError, Convertible, Map, Value, ValueKind};
use std::any::{type_name, Any, TypeId};
use std::collections::{BTreeMap, HashMap};
use std::fmt::Display;
use std::marker::PhantomData;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

/// Typed conversion strategy for values of type `T`.
pub trait ValueConverter<T>: Default + Send + Sync + 'static {
    /// Encode a value.
    fn to_value(&self, value: &T) -> Result<Value, ConvertError>;

    /// Decode a value.
    fn from_value(&self, value: &Value) -> Result<T, ConvertError>;
}

/// Untyped conversion strategy, resolved against the member type at runtime.
pub trait AnyConverter: Send + Sync + 'static {
    /// The type this converter produces and consumes.
    fn target_type(&self) -> TypeId;

    /// Name of the target type, for diagnostics.
    fn target_type_name(&self) -> &'static str;

    /// Encode a value, which must be of the target type.
    fn to_value(&self, value: &dyn Any) -> Result<Value, ConvertError>;

    /// Decode a value of the target type.
    fn from_value(&self, value: &Value) -> Result<Box<dyn Any + Send>, ConvertError>;
}

/// Adapts a [`ValueConverter<T>`] into an [`AnyConverter`] targeting `T`.
pub struct Untyped<C, T> {
    inner: C,
    _target: PhantomData<fn() -> T>,
}

impl<C: Default, T> Default for Untyped<C, T> {
    fn default() -> Self {
        Self {
            inner: C::default(),
            _target: PhantomData,
        }
    }
}

impl<C, T> AnyConverter for Untyped<C, T>
where
    C: ValueConverter<T>,
    T: Send + 'static,
{
    fn target_type(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn target_type_name(&self) -> &'static str {
        type_name::<T>()
    }

    fn to_value(&self, value: &dyn Any) -> Result<Value, ConvertError> {
        let value = value.downcast_ref::<T>().ok_or_else(|| {
            ConvertError::new(format!("expected a value of type {}", type_name::<T>()))
        })?;
        self.inner.to_value(value)
    }

    fn from_value(&self, value: &Value) -> Result<Box<dyn Any + Send>, ConvertError> {
        Ok(Box::new(self.inner.from_value(value)?))
    }
}

fn instances() -> &'static SingleCreationCache<TypeId, Arc<dyn Any + Send + Sync>> {
    static INSTANCES: OnceLock<SingleCreationCache<TypeId, Arc<dyn Any + Send + Sync>>> =
        OnceLock::new();
    INSTANCES.get_or_init(SingleCreationCache::new)
}

/// The shared instance of converter type `C`.
pub fn converter_instance<C: Default + Send + Sync + 'static>() -> Arc<C> {
    let any = instances().get_or_create(TypeId::of::<C>(), |_| {
        Arc::new(C::default()) as Arc<dyn Any + Send + Sync>
    });
    Arc::downcast::<C>(any).unwrap_or_else(|_| Arc::new(C::default()))
}

/// Encodes each element of a list with `C`.
#[derive(Debug, Default)]
pub struct ListConverter<C> {
    element: C,
}

impl<T, C: ValueConverter<T>> ValueConverter<Vec<T>> for ListConverter<C> {
    fn to_value(&self, value: &Vec<T>) -> Result<Value, ConvertError> {
        value
            .iter()
            .map(|item| self.element.to_value(item))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List)
    }

    fn from_value(&self, value: &Value) -> Result<Vec<T>, ConvertError> {
        value
            .as_list()
            .ok_or_else(|| ConvertError::unexpected(ValueKind::List, value.kind()))?
            .iter()
            .map(|item| self.element.from_value(item))
            .collect()
    }
}

/// Wraps `C` so that `None` and `null` map onto each other.
#[derive(Debug, Default)]
pub struct NullableConverter<C> {
    inner: C,
}

impl<T, C: ValueConverter<T>> ValueConverter<Option<T>> for NullableConverter<C> {
    fn to_value(&self, value: &Option<T>) -> Result<Value, ConvertError> {
        match value {
            Some(inner) => self.inner.to_value(inner),
            None => Ok(Value::Null),
        }
    }

    fn from_value(&self, value: &Value) -> Result<Option<T>, ConvertError> {
        match value {
            Value::Null => Ok(None),
            other => self.inner.from_value(other).map(Some),
        }
    }
}

/// Encodes each value of a string-keyed map with `C`.
#[derive(Debug, Default)]
pub struct MapConverter<C> {
    value: C,
}

impl<C> MapConverter<C> {
    fn encode<'a, T: 'a>(
        &self,
        entries: impl Iterator<Item = (&'a String, &'a T)>,
    ) -> Result<Value, ConvertError>
    where
        C: ValueConverter<T>,
    {
        let mut map = Map::new();
        for (key, value) in entries {
            map.insert(key.clone(), self.value.to_value(value)?);
        }
        Ok(Value::Map(map))
    }

    fn decode<T, M>(&self, value: &Value) -> Result<M, ConvertError>
    where
        C: ValueConverter<T>,
        M: FromIterator<(String, T)>,
    {
        value
            .as_map()
            .ok_or_else(|| ConvertError::unexpected(ValueKind::Map, value.kind()))?
            .iter()
            .map(|(k, v)| Ok::<_, ConvertError>((k.to_string(), self.value.from_value(v)?)))
            .collect()
    }
}

impl<T, C: ValueConverter<T>> ValueConverter<BTreeMap<String, T>> for MapConverter<C> {
    fn to_value(&self, value: &BTreeMap<String, T>) -> Result<Value, ConvertError> {
        self.encode(value.iter())
    }

    fn from_value(&self, value: &Value) -> Result<BTreeMap<String, T>, ConvertError> {
        self.decode(value)
    }
}

impl<T, C: ValueConverter<T>> ValueConverter<HashMap<String, T>> for MapConverter<C> {
    fn to_value(&self, value: &HashMap<String, T>) -> Result<Value, ConvertError> {
        let mut entries: Vec<_> = value.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        self.encode(entries.into_iter())
    }

    fn from_value(&self, value: &Value) -> Result<HashMap<String, T>, ConvertError> {
        self.decode(value)
    }
}

/// Stores a value as its `Display` text and reads it back with `FromStr`.
pub struct TextConverter<T>(PhantomData<fn() -> T>);

impl<T> Default for TextConverter<T> {
    fn default() -> Self {
        Self(PhantomData)
    }
}

impl<T> ValueConverter<T> for TextConverter<T>
where
    T: Display + FromStr + 'static,
    T::Err: Display,
{
    fn to_value(&self, value: &T) -> Result<Value, ConvertError> {
        Ok(Value::Text(value.to_string()))
    }

    fn from_value(&self, value: &Value) -> Result<T, ConvertError> {
        let text = value
            .as_text()
            .ok_or_else(|| ConvertError::unexpected(ValueKind::Text, value.kind()))?;
        text.parse().map_err(|e: T::Err| ConvertError::new(e.to_string()))
    }
}

/// A closed set of values, used for case-insensitive text matching.
pub trait TextVariants: Sized + 'static {
    /// Every value of the type.
    fn variants() -> &'static [Self];
}

/// Like [`TextConverter`], but matches text against the `Display` form of
/// every variant ignoring ASCII case.
pub struct CaseInsensitiveTextConverter<T>(PhantomData<fn() -> T>);

impl<T> Default for CaseInsensitiveTextConverter<T> {
    fn default() -> Self {
        Self(PhantomData)
    }
}

impl<T> ValueConverter<T> for CaseInsensitiveTextConverter<T>
where
    T: Display + Clone + TextVariants,
{
    fn to_value(&self, value: &T) -> Result<Value, ConvertError> {
        Ok(Value::Text(value.to_string()))
    }

    fn from_value(&self, value: &Value) -> Result<T, ConvertError> {
        let text = value
            .as_text()
            .ok_or_else(|| ConvertError::unexpected(ValueKind::Text, value.kind()))?;
        T::variants()
            .iter()
            .find(|v| v.to_string().eq_ignore_ascii_case(text))
            .cloned()
            .ok_or_else(|| {
                ConvertError::new(format!("{text:?} is not a variant of {}", type_name::<T>()))
            })
    }
}

/// Stores a value as its integer representation.
pub struct NumericConverter<T>(PhantomData<fn() -> T>);

impl<T> Default for NumericConverter<T> {
    fn default() -> Self {
        Self(PhantomData)
    }
}

impl<T> ValueConverter<T> for NumericConverter<T>
where
    T: Copy + Into<i64> + TryFrom<i64> + 'static,
{
    fn to_value(&self, value: &T) -> Result<Value, ConvertError> {
        Ok(Value::Integer((*value).into()))
    }

    fn from_value(&self, value: &Value) -> Result<T, ConvertError> {
        let n = i64::from_value(value)?;
        T::try_from(n)
            .map_err(|_| ConvertError::new(format!("{n} is not a valid {}", type_name::<T>())))
    }
}
