//! Property types and value coercion.

use std::fmt;

use ormsql_proto::Value;

/// Scalar column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    /// Boolean.
    Bool,
    /// 32-bit signed integer.
    Int32,
    /// 64-bit signed integer.
    Int64,
    /// 32-bit float.
    Float32,
    /// 64-bit float.
    Float64,
    /// UTF-8 text.
    String,
    /// Binary blob.
    Bytes,
    /// Enumeration stored as its integral discriminant.
    Enum,
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScalarType::Bool => "bool",
            ScalarType::Int32 => "int32",
            ScalarType::Int64 => "int64",
            ScalarType::Float32 => "float32",
            ScalarType::Float64 => "float64",
            ScalarType::String => "string",
            ScalarType::Bytes => "bytes",
            ScalarType::Enum => "enum",
        };
        f.write_str(name)
    }
}

/// Declared type of a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// Non-nullable scalar.
    Scalar(ScalarType),
    /// Nullable scalar (`Option<T>`).
    OptionalScalar(ScalarType),
}

impl FieldType {
    /// The underlying scalar type.
    pub fn scalar(&self) -> ScalarType {
        match self {
            FieldType::Scalar(s) | FieldType::OptionalScalar(s) => *s,
        }
    }

    /// Check if DB-null is a legal value.
    pub fn is_nullable(&self) -> bool {
        matches!(self, FieldType::OptionalScalar(_))
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Scalar(s) => write!(f, "{s}"),
            FieldType::OptionalScalar(s) => write!(f, "{s}?"),
        }
    }
}

/// A raw value that could not be converted to the requested type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoerceError {
    /// Variant name of the raw value.
    pub from: &'static str,
    /// Requested type.
    pub to: ScalarType,
}

impl CoerceError {
    fn new(from: &Value, to: ScalarType) -> Self {
        Self {
            from: from.type_name(),
            to,
        }
    }
}

/// A Rust type that maps to one column.
pub trait SqlType: Sized {
    /// Declared column type.
    fn field_type() -> FieldType;

    /// Convert to a parameter value.
    fn to_value(&self) -> Value;

    /// Convert from a raw column value, coercing mismatched representations.
    fn from_value(value: Value) -> Result<Self, CoerceError>;
}

/// An enumeration stored by discriminant and parsed by name or discriminant.
pub trait SqlEnum: Sized {
    /// Look up a variant by name.
    fn from_name(name: &str) -> Option<Self>;

    /// Look up a variant by integral discriminant.
    fn from_discriminant(value: i64) -> Option<Self>;

    /// Integral discriminant of this variant.
    fn discriminant(&self) -> i64;
}

/// Parse an enum from a raw value.
pub fn enum_from_value<E: SqlEnum>(value: Value) -> Result<E, CoerceError> {
    let parsed = match &value {
        Value::String(s) => E::from_name(s)
            .or_else(|| s.trim().parse::<i64>().ok().and_then(E::from_discriminant)),
        other => other.as_i64().and_then(E::from_discriminant),
    };
    parsed.ok_or_else(|| CoerceError::new(&value, ScalarType::Enum))
}

/// Coerce a raw value into the representation of `target`.
///
/// Exact matches pass through. Otherwise a numeric or string conversion is
/// attempted: integers widen or narrow when in range, integral floats become
/// integers, numbers and booleans render as text, and text parses into
/// numbers and booleans. DB-null and lists never coerce.
pub fn coerce(value: Value, target: ScalarType) -> Result<Value, CoerceError> {
    let fail = |v: &Value| CoerceError::new(v, target);

    match target {
        ScalarType::Bool => match value {
            Value::Bool(_) => Ok(value),
            Value::Int32(_) | Value::Int64(_) => Ok(Value::Bool(value.as_i64() != Some(0))),
            Value::String(ref s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Ok(Value::Bool(true)),
                "false" | "0" => Ok(Value::Bool(false)),
                _ => Err(fail(&value)),
            },
            _ => Err(fail(&value)),
        },
        ScalarType::Int32 => match value {
            Value::Int32(_) => Ok(value),
            _ => to_i64(&value)
                .and_then(|i| i32::try_from(i).ok())
                .map(Value::Int32)
                .ok_or_else(|| fail(&value)),
        },
        ScalarType::Int64 | ScalarType::Enum => match value {
            Value::Int64(_) => Ok(value),
            _ => to_i64(&value).map(Value::Int64).ok_or_else(|| fail(&value)),
        },
        ScalarType::Float32 => match value {
            Value::Float32(_) => Ok(value),
            _ => to_f64(&value)
                .map(|f| Value::Float32(f as f32))
                .ok_or_else(|| fail(&value)),
        },
        ScalarType::Float64 => match value {
            Value::Float64(_) => Ok(value),
            _ => to_f64(&value).map(Value::Float64).ok_or_else(|| fail(&value)),
        },
        ScalarType::String => match value {
            Value::String(_) => Ok(value),
            Value::Bool(_)
            | Value::Int32(_)
            | Value::Int64(_)
            | Value::Float32(_)
            | Value::Float64(_) => Ok(Value::String(plain_text(&value))),
            Value::Bytes(bytes) => String::from_utf8(bytes)
                .map(Value::String)
                .map_err(|_| CoerceError {
                    from: "bytes",
                    to: target,
                }),
            _ => Err(fail(&value)),
        },
        ScalarType::Bytes => match value {
            Value::Bytes(_) => Ok(value),
            Value::String(s) => Ok(Value::Bytes(s.into_bytes())),
            _ => Err(fail(&value)),
        },
    }
}

fn to_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Int32(i) => Some(*i as i64),
        Value::Int64(i) => Some(*i),
        Value::Float32(_) | Value::Float64(_) => {
            let f = value.as_f64()?;
            (f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64).then_some(f as i64)
        }
        Value::Bool(b) => Some(*b as i64),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn to_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Int32(i) => Some(*i as f64),
        Value::Int64(i) => Some(*i as f64),
        Value::Float32(f) => Some(*f as f64),
        Value::Float64(f) => Some(*f),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn plain_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

macro_rules! scalar_sql_type {
    ($ty:ty, $scalar:ident, $variant:ident) => {
        impl SqlType for $ty {
            fn field_type() -> FieldType {
                FieldType::Scalar(ScalarType::$scalar)
            }

            fn to_value(&self) -> Value {
                Value::$variant(self.clone())
            }

            fn from_value(value: Value) -> Result<Self, CoerceError> {
                match coerce(value, ScalarType::$scalar)? {
                    Value::$variant(v) => Ok(v),
                    other => Err(CoerceError::new(&other, ScalarType::$scalar)),
                }
            }
        }
    };
}

scalar_sql_type!(bool, Bool, Bool);
scalar_sql_type!(i32, Int32, Int32);
scalar_sql_type!(i64, Int64, Int64);
scalar_sql_type!(f32, Float32, Float32);
scalar_sql_type!(f64, Float64, Float64);
scalar_sql_type!(String, String, String);
scalar_sql_type!(Vec<u8>, Bytes, Bytes);

impl<T: SqlType> SqlType for Option<T> {
    fn field_type() -> FieldType {
        FieldType::OptionalScalar(T::field_type().scalar())
    }

    fn to_value(&self) -> Value {
        match self {
            Some(v) => v.to_value(),
            None => Value::Null,
        }
    }

    fn from_value(value: Value) -> Result<Self, CoerceError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Status {
        Active,
        Retired,
    }

    impl SqlEnum for Status {
        fn from_name(name: &str) -> Option<Self> {
            match name {
                "Active" => Some(Status::Active),
                "Retired" => Some(Status::Retired),
                _ => None,
            }
        }

        fn from_discriminant(value: i64) -> Option<Self> {
            match value {
                0 => Some(Status::Active),
                1 => Some(Status::Retired),
                _ => None,
            }
        }

        fn discriminant(&self) -> i64 {
            *self as i64
        }
    }

    #[test]
    fn test_numeric_widening_and_narrowing() {
        assert_eq!(i64::from_value(Value::Int32(7)), Ok(7));
        assert_eq!(i32::from_value(Value::Int64(7)), Ok(7));
        assert!(i32::from_value(Value::Int64(i64::MAX)).is_err());
        assert_eq!(i32::from_value(Value::Float64(3.0)), Ok(3));
        assert!(i32::from_value(Value::Float64(3.5)).is_err());
        assert_eq!(f64::from_value(Value::Int64(2)), Ok(2.0));
    }

    #[test]
    fn test_string_conversions() {
        assert_eq!(i32::from_value(Value::String(" 42 ".into())), Ok(42));
        assert_eq!(String::from_value(Value::Int64(5)), Ok("5".to_string()));
        assert_eq!(bool::from_value(Value::Int64(1)), Ok(true));
        assert_eq!(bool::from_value(Value::String("false".into())), Ok(false));
    }

    #[test]
    fn test_null_handling() {
        assert_eq!(Option::<i32>::from_value(Value::Null), Ok(None));
        assert_eq!(Option::<i32>::from_value(Value::Int64(3)), Ok(Some(3)));
        assert_eq!(
            i32::from_value(Value::Null),
            Err(CoerceError {
                from: "null",
                to: ScalarType::Int32
            })
        );
    }

    #[test]
    fn test_enum_by_name_or_discriminant() {
        assert_eq!(
            enum_from_value::<Status>(Value::String("Retired".into())),
            Ok(Status::Retired)
        );
        assert_eq!(enum_from_value::<Status>(Value::Int64(0)), Ok(Status::Active));
        assert_eq!(
            enum_from_value::<Status>(Value::String("1".into())),
            Ok(Status::Retired)
        );
        assert!(enum_from_value::<Status>(Value::Int32(9)).is_err());
    }

    #[test]
    fn test_field_types() {
        assert_eq!(i32::field_type(), FieldType::Scalar(ScalarType::Int32));
        assert!(Option::<String>::field_type().is_nullable());
        assert_eq!(Option::<String>::field_type().to_string(), "string?");
    }
}
