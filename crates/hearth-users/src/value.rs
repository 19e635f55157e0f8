//! Typed values stored in a user's `data` map.
//!
//! [`DataValue`] is what the document holds. Callers move between it and
//! their own types with [`FromDataValue`] and [`IntoDataValue`]:
//!
//! 1. an exact variant match (`Int` → `i64`, `String` → `String`, ...)
//! 2. a checked numeric conversion (`Int(3)` → `u8`, `Float(2.0)` → `i32`)
//! 3. a structural remap through serde with [`Structured`]
//!
//! Anything else is a [`ConversionError`].

use std::any::type_name;
use std::collections::{BTreeMap, HashMap};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A dynamically typed value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DataValue {
    /// No value.
    #[default]
    Null,
    /// A boolean.
    Bool(bool),
    /// A signed integer.
    Int(i64),
    /// A floating point number.
    Float(f64),
    /// A string.
    String(String),
    /// An ordered list.
    List(Vec<DataValue>),
    /// A string-keyed map.
    Map(BTreeMap<String, DataValue>),
}

impl DataValue {
    /// Short name of the variant, used in conversion errors.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Map(_) => "map",
        }
    }

    /// Whether this is [`DataValue::Null`].
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<serde_json::Value> for DataValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => n.as_f64().map_or(Self::Null, Self::Float),
            },
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => {
                Self::List(items.into_iter().map(Self::from).collect())
            },
            serde_json::Value::Object(map) => {
                Self::Map(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            },
        }
    }
}

/// A value could not be converted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot convert {from} to {to}")]
pub struct ConversionError {
    /// The source: a [`DataValue::kind`] or a Rust type name.
    pub from: &'static str,
    /// The target: a Rust type name or `"data value"`.
    pub to: &'static str,
}

impl ConversionError {
    /// `value` cannot become a `T`.
    #[must_use]
    pub fn to_type<T: ?Sized>(value: &DataValue) -> Self {
        Self {
            from: value.kind(),
            to: type_name::<T>(),
        }
    }

    /// A `T` cannot be represented as a [`DataValue`].
    #[must_use]
    pub fn from_type<T: ?Sized>() -> Self {
        Self {
            from: type_name::<T>(),
            to: "data value",
        }
    }
}

/// Conversion out of a [`DataValue`].
pub trait FromDataValue: Sized {
    /// Convert `value`, or explain why not.
    ///
    /// # Errors
    ///
    /// Returns [`ConversionError`] if no exact, numeric or structural
    /// conversion applies.
    fn from_data_value(value: &DataValue) -> Result<Self, ConversionError>;
}

/// Conversion into a [`DataValue`].
pub trait IntoDataValue {
    /// Convert `self`.
    ///
    /// # Errors
    ///
    /// Returns [`ConversionError`] if the value has no data representation
    /// (for example a [`Structured`] map with non-string keys).
    fn into_data_value(self) -> Result<DataValue, ConversionError>;
}

// ---------------------------------------------------------------------------
// Identity and primitives
// ---------------------------------------------------------------------------

impl FromDataValue for DataValue {
    fn from_data_value(value: &DataValue) -> Result<Self, ConversionError> {
        Ok(value.clone())
    }
}

impl IntoDataValue for DataValue {
    fn into_data_value(self) -> Result<DataValue, ConversionError> {
        Ok(self)
    }
}

impl FromDataValue for bool {
    fn from_data_value(value: &DataValue) -> Result<Self, ConversionError> {
        match value {
            DataValue::Bool(b) => Ok(*b),
            other => Err(ConversionError::to_type::<Self>(other)),
        }
    }
}

impl IntoDataValue for bool {
    fn into_data_value(self) -> Result<DataValue, ConversionError> {
        Ok(DataValue::Bool(self))
    }
}

impl FromDataValue for String {
    fn from_data_value(value: &DataValue) -> Result<Self, ConversionError> {
        match value {
            DataValue::String(s) => Ok(s.clone()),
            other => Err(ConversionError::to_type::<Self>(other)),
        }
    }
}

impl IntoDataValue for String {
    fn into_data_value(self) -> Result<DataValue, ConversionError> {
        Ok(DataValue::String(self))
    }
}

impl IntoDataValue for &str {
    fn into_data_value(self) -> Result<DataValue, ConversionError> {
        Ok(DataValue::String(self.to_owned()))
    }
}

// ---------------------------------------------------------------------------
// Numbers
// ---------------------------------------------------------------------------

/// An integral, in-range float as `i64`.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::float_cmp
)]
fn float_to_i64(f: f64) -> Option<i64> {
    // i64::MAX rounds up to 2^63 as f64, which is already out of range.
    let in_range = f >= i64::MIN as f64 && f < i64::MAX as f64;
    (f.is_finite() && f.fract() == 0.0 && in_range).then_some(f as i64)
}

/// `i` as `f64`, if no precision is lost.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn i64_to_float(i: i64) -> Option<f64> {
    let f = i as f64;
    (float_to_i64(f) == Some(i)).then_some(f)
}

fn integer_of(value: &DataValue) -> Option<i64> {
    match value {
        DataValue::Int(i) => Some(*i),
        DataValue::Float(f) => float_to_i64(*f),
        _ => None,
    }
}

impl FromDataValue for i64 {
    fn from_data_value(value: &DataValue) -> Result<Self, ConversionError> {
        integer_of(value).ok_or_else(|| ConversionError::to_type::<Self>(value))
    }
}

impl IntoDataValue for i64 {
    fn into_data_value(self) -> Result<DataValue, ConversionError> {
        Ok(DataValue::Int(self))
    }
}

macro_rules! narrow_integer {
    ($($t:ty),* $(,)?) => {
        $(
            impl FromDataValue for $t {
                fn from_data_value(value: &DataValue) -> Result<Self, ConversionError> {
                    integer_of(value)
                        .and_then(|i| <$t>::try_from(i).ok())
                        .ok_or_else(|| ConversionError::to_type::<Self>(value))
                }
            }

            impl IntoDataValue for $t {
                fn into_data_value(self) -> Result<DataValue, ConversionError> {
                    Ok(DataValue::Int(i64::from(self)))
                }
            }
        )*
    };
}

narrow_integer!(i8, i16, i32, u8, u16, u32);

macro_rules! wide_unsigned {
    ($($t:ty),* $(,)?) => {
        $(
            impl FromDataValue for $t {
                fn from_data_value(value: &DataValue) -> Result<Self, ConversionError> {
                    integer_of(value)
                        .and_then(|i| <$t>::try_from(i).ok())
                        .ok_or_else(|| ConversionError::to_type::<Self>(value))
                }
            }

            impl IntoDataValue for $t {
                fn into_data_value(self) -> Result<DataValue, ConversionError> {
                    i64::try_from(self)
                        .map(DataValue::Int)
                        .map_err(|_| ConversionError::from_type::<Self>())
                }
            }
        )*
    };
}

wide_unsigned!(u64, usize);

impl FromDataValue for f64 {
    fn from_data_value(value: &DataValue) -> Result<Self, ConversionError> {
        match value {
            DataValue::Float(f) => Ok(*f),
            DataValue::Int(i) => {
                i64_to_float(*i).ok_or_else(|| ConversionError::to_type::<Self>(value))
            },
            other => Err(ConversionError::to_type::<Self>(other)),
        }
    }
}

impl IntoDataValue for f64 {
    fn into_data_value(self) -> Result<DataValue, ConversionError> {
        Ok(DataValue::Float(self))
    }
}

// ---------------------------------------------------------------------------
// Collections
// ---------------------------------------------------------------------------

impl<T: FromDataValue> FromDataValue for Vec<T> {
    fn from_data_value(value: &DataValue) -> Result<Self, ConversionError> {
        match value {
            DataValue::List(items) => items.iter().map(T::from_data_value).collect(),
            other => Err(ConversionError::to_type::<Self>(other)),
        }
    }
}

impl<T: IntoDataValue> IntoDataValue for Vec<T> {
    fn into_data_value(self) -> Result<DataValue, ConversionError> {
        self.into_iter()
            .map(IntoDataValue::into_data_value)
            .collect::<Result<_, _>>()
            .map(DataValue::List)
    }
}

impl<T: FromDataValue> FromDataValue for BTreeMap<String, T> {
    fn from_data_value(value: &DataValue) -> Result<Self, ConversionError> {
        match value {
            DataValue::Map(map) => map
                .iter()
                .map(|(k, v)| Ok((k.clone(), T::from_data_value(v)?)))
                .collect(),
            other => Err(ConversionError::to_type::<Self>(other)),
        }
    }
}

impl<T: IntoDataValue> IntoDataValue for BTreeMap<String, T> {
    fn into_data_value(self) -> Result<DataValue, ConversionError> {
        self.into_iter()
            .map(|(k, v)| Ok((k, v.into_data_value()?)))
            .collect::<Result<_, _>>()
            .map(DataValue::Map)
    }
}

impl<T: FromDataValue> FromDataValue for HashMap<String, T> {
    fn from_data_value(value: &DataValue) -> Result<Self, ConversionError> {
        match value {
            DataValue::Map(map) => map
                .iter()
                .map(|(k, v)| Ok((k.clone(), T::from_data_value(v)?)))
                .collect(),
            other => Err(ConversionError::to_type::<Self>(other)),
        }
    }
}

impl<T: IntoDataValue> IntoDataValue for HashMap<String, T> {
    fn into_data_value(self) -> Result<DataValue, ConversionError> {
        self.into_iter()
            .map(|(k, v)| Ok((k, v.into_data_value()?)))
            .collect::<Result<_, _>>()
            .map(DataValue::Map)
    }
}

// ---------------------------------------------------------------------------
// Structural remap
// ---------------------------------------------------------------------------

/// Any serde type, stored as its structural [`DataValue`] form.
///
/// ```
/// use hearth_users::{DataValue, FromDataValue, IntoDataValue, Structured};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, PartialEq, Serialize, Deserialize)]
/// struct Home { world: String, x: i32 }
///
/// let stored = Structured(Home { world: "overworld".into(), x: 12 })
///     .into_data_value()
///     .unwrap();
/// assert!(matches!(stored, DataValue::Map(_)));
///
/// let Structured(home) = Structured::<Home>::from_data_value(&stored).unwrap();
/// assert_eq!(home.x, 12);
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Structured<T>(pub T);

impl<T> Structured<T> {
    /// Unwrap the inner value.
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T: DeserializeOwned> FromDataValue for Structured<T> {
    fn from_data_value(value: &DataValue) -> Result<Self, ConversionError> {
        serde_json::to_value(value)
            .and_then(serde_json::from_value)
            .map(Structured)
            .map_err(|_| ConversionError::to_type::<T>(value))
    }
}

impl<T: Serialize> IntoDataValue for Structured<T> {
    fn into_data_value(self) -> Result<DataValue, ConversionError> {
        serde_json::to_value(&self.0)
            .map(DataValue::from)
            .map_err(|_| ConversionError::from_type::<T>())
    }
}
