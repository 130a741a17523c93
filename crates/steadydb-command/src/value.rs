//! Parameter and result values.

use uuid::Uuid;

use crate::error::TypeError;

/// A driver-agnostic scalar value.
///
/// Used both for command parameters and for column values in result rows.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL NULL.
    Null,
    /// Boolean.
    Bool(bool),
    /// 64-bit signed integer (driver-native integer width, never truncated).
    Int(i64),
    /// 64-bit floating point.
    Float(f64),
    /// UTF-8 text.
    Text(String),
    /// Raw binary data.
    Bytes(Vec<u8>),
    /// UUID.
    Uuid(Uuid),
}

impl Value {
    /// Name of the contained type, for diagnostics.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "NULL",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Bytes(_) => "bytes",
            Self::Uuid(_) => "uuid",
        }
    }

    /// Whether this value is SQL NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl From<Uuid> for Value {
    fn from(v: Uuid) -> Self {
        Self::Uuid(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// Conversion from a [`Value`] into a concrete Rust type.
pub trait FromValue: Sized {
    /// Convert from a non-NULL value.
    fn from_value(value: &Value) -> Result<Self, TypeError>;

    /// Convert treating NULL as `None`.
    fn from_value_nullable(value: &Value) -> Result<Option<Self>, TypeError> {
        match value {
            Value::Null => Ok(None),
            other => Self::from_value(other).map(Some),
        }
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self, TypeError> {
        match value {
            Value::Bool(v) => Ok(*v),
            Value::Null => Err(TypeError::UnexpectedNull),
            other => Err(TypeError::TypeMismatch {
                expected: "bool",
                actual: other.type_name(),
            }),
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Result<Self, TypeError> {
        match value {
            Value::Int(v) => Ok(*v),
            Value::Null => Err(TypeError::UnexpectedNull),
            other => Err(TypeError::TypeMismatch {
                expected: "int",
                actual: other.type_name(),
            }),
        }
    }
}

impl FromValue for i32 {
    fn from_value(value: &Value) -> Result<Self, TypeError> {
        let wide = i64::from_value(value)?;
        i32::try_from(wide).map_err(|_| TypeError::OutOfRange {
            target: "i32",
            value: wide,
        })
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self, TypeError> {
        match value {
            Value::Float(v) => Ok(*v),
            Value::Null => Err(TypeError::UnexpectedNull),
            other => Err(TypeError::TypeMismatch {
                expected: "float",
                actual: other.type_name(),
            }),
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self, TypeError> {
        match value {
            Value::Text(v) => Ok(v.clone()),
            Value::Null => Err(TypeError::UnexpectedNull),
            other => Err(TypeError::TypeMismatch {
                expected: "text",
                actual: other.type_name(),
            }),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: &Value) -> Result<Self, TypeError> {
        match value {
            Value::Bytes(v) => Ok(v.clone()),
            Value::Null => Err(TypeError::UnexpectedNull),
            other => Err(TypeError::TypeMismatch {
                expected: "bytes",
                actual: other.type_name(),
            }),
        }
    }
}

impl FromValue for Uuid {
    fn from_value(value: &Value) -> Result<Self, TypeError> {
        match value {
            Value::Uuid(v) => Ok(*v),
            Value::Null => Err(TypeError::UnexpectedNull),
            other => Err(TypeError::TypeMismatch {
                expected: "uuid",
                actual: other.type_name(),
            }),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self, TypeError> {
        T::from_value_nullable(value)
    }
}
