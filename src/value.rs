//! Dynamic SQL values and the static types destinations ask for.

use crate::error::{Error, Result};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::fmt;

/// A value travelling between the caller, the driver and a destination.
///
/// Arguments are converted into `Value`s before binding, and every scanned
/// column is held as a `Value` until the dialect coerces it into the type the
/// destination asked for.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL NULL
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
}

impl Value {
    /// The natural type of this value, `None` for NULL.
    pub fn value_type(&self) -> Option<ValueType> {
        match self {
            Value::Null => None,
            Value::Bool(_) => Some(ValueType::Bool),
            Value::Int(_) => Some(ValueType::I64),
            Value::UInt(_) => Some(ValueType::U64),
            Value::Float(_) => Some(ValueType::F64),
            Value::Text(_) => Some(ValueType::Text),
            Value::Bytes(_) => Some(ValueType::Bytes),
            Value::Date(_) => Some(ValueType::Date),
            Value::Time(_) => Some(ValueType::Time),
            Value::DateTime(_) => Some(ValueType::DateTime),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short name used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self.value_type() {
            Some(ty) => ty.name(),
            None => "null",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::UInt(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Text(v) => write!(f, "{v:?}"),
            Value::Bytes(v) => write!(f, "<{} bytes>", v.len()),
            Value::Date(v) => write!(f, "{v}"),
            Value::Time(v) => write!(f, "{v}"),
            Value::DateTime(v) => write!(f, "{v}"),
        }
    }
}

/// The type a destination slot requests from coercion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// Untyped destination, accepts whatever the dialect produces
    Any,
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Text,
    Bytes,
    Date,
    Time,
    DateTime,
}

impl ValueType {
    pub fn name(self) -> &'static str {
        match self {
            ValueType::Any => "any",
            ValueType::Bool => "bool",
            ValueType::I8 => "i8",
            ValueType::I16 => "i16",
            ValueType::I32 => "i32",
            ValueType::I64 => "i64",
            ValueType::U8 => "u8",
            ValueType::U16 => "u16",
            ValueType::U32 => "u32",
            ValueType::U64 => "u64",
            ValueType::F32 => "f32",
            ValueType::F64 => "f64",
            ValueType::Text => "text",
            ValueType::Bytes => "bytes",
            ValueType::Date => "date",
            ValueType::Time => "time",
            ValueType::DateTime => "datetime",
        }
    }

    pub fn is_signed_int(self) -> bool {
        matches!(
            self,
            ValueType::I8 | ValueType::I16 | ValueType::I32 | ValueType::I64
        )
    }

    pub fn is_unsigned_int(self) -> bool {
        matches!(
            self,
            ValueType::U8 | ValueType::U16 | ValueType::U32 | ValueType::U64
        )
    }

    pub fn is_float(self) -> bool {
        matches!(self, ValueType::F32 | ValueType::F64)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Extraction of a Rust value from an already coerced [`Value`].
///
/// `value_type` is what the destination asks the dialect for; `from_value`
/// then only has to unwrap the matching variant.
pub trait FromValue: Sized + Send {
    fn value_type() -> ValueType;

    fn from_value(value: Value) -> Result<Self>;
}

fn mismatch(expected: ValueType, value: &Value) -> Error {
    Error::coerce(
        "",
        format!("expected {expected}, got {}", value.kind_name()),
    )
}

macro_rules! impl_from_value_int {
    ($($t:ty => $vt:ident),* $(,)?) => {
        $(
            impl FromValue for $t {
                fn value_type() -> ValueType {
                    ValueType::$vt
                }

                fn from_value(value: Value) -> Result<Self> {
                    let out = match &value {
                        Value::Int(n) => <$t>::try_from(*n).ok(),
                        Value::UInt(n) => <$t>::try_from(*n).ok(),
                        _ => None,
                    };
                    out.ok_or_else(|| mismatch(ValueType::$vt, &value))
                }
            }
        )*
    };
}

impl_from_value_int!(
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
);

macro_rules! impl_from_value_variant {
    ($($t:ty => $vt:ident, $variant:ident),* $(,)?) => {
        $(
            impl FromValue for $t {
                fn value_type() -> ValueType {
                    ValueType::$vt
                }

                fn from_value(value: Value) -> Result<Self> {
                    match value {
                        Value::$variant(v) => Ok(v),
                        other => Err(mismatch(ValueType::$vt, &other)),
                    }
                }
            }
        )*
    };
}

impl_from_value_variant!(
    bool => Bool, Bool,
    f64 => F64, Float,
    String => Text, Text,
    Vec<u8> => Bytes, Bytes,
    NaiveDate => Date, Date,
    NaiveTime => Time, Time,
    NaiveDateTime => DateTime, DateTime,
);

impl FromValue for f32 {
    fn value_type() -> ValueType {
        ValueType::F32
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Float(v) if v.is_nan() || f64::from(v as f32) == v => Ok(v as f32),
            Value::Float(v) => Err(Error::coerce("", format!("{v} does not fit in f32"))),
            other => Err(mismatch(ValueType::F32, &other)),
        }
    }
}

impl FromValue for Value {
    fn value_type() -> ValueType {
        ValueType::Any
    }

    fn from_value(value: Value) -> Result<Self> {
        Ok(value)
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn value_type() -> ValueType {
        T::value_type()
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

macro_rules! impl_value_from {
    ($($t:ty => |$v:ident| $e:expr),* $(,)?) => {
        $(
            impl From<$t> for Value {
                fn from($v: $t) -> Self {
                    $e
                }
            }
        )*
    };
}

impl_value_from!(
    bool => |v| Value::Bool(v),
    i8 => |v| Value::Int(v.into()),
    i16 => |v| Value::Int(v.into()),
    i32 => |v| Value::Int(v.into()),
    i64 => |v| Value::Int(v),
    u8 => |v| Value::UInt(v.into()),
    u16 => |v| Value::UInt(v.into()),
    u32 => |v| Value::UInt(v.into()),
    u64 => |v| Value::UInt(v),
    f32 => |v| Value::Float(v.into()),
    f64 => |v| Value::Float(v),
    String => |v| Value::Text(v),
    &str => |v| Value::Text(v.to_owned()),
    Vec<u8> => |v| Value::Bytes(v),
    &[u8] => |v| Value::Bytes(v.to_vec()),
    NaiveDate => |v| Value::Date(v),
    NaiveTime => |v| Value::Time(v),
    NaiveDateTime => |v| Value::DateTime(v),
);

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}
