//! Field declarations for entities.

use std::fmt;
use std::sync::Arc;

use ormsql_proto::Value;

use super::types::{enum_from_value, CoerceError, FieldType, ScalarType, SqlEnum, SqlType};

pub(crate) type Getter<T> = Arc<dyn Fn(&T) -> Value + Send + Sync>;
pub(crate) type Setter<T> = Arc<dyn Fn(&mut T, Value) -> Result<(), CoerceError> + Send + Sync>;

/// One property of an entity together with its compiled accessors.
///
/// Accessors are plain function pointers wrapped once; reading or writing a
/// property never inspects the type at runtime.
pub struct FieldDef<T> {
    /// Property (column) name.
    pub name: String,
    /// Declared type.
    pub field_type: FieldType,
    /// Whether this is the key property.
    pub key: bool,
    /// Whether the store assigns the value on insert.
    pub generated: bool,
    /// Whether the property is stored. Nested relation storage is not.
    pub persisted: bool,
    pub(crate) getter: Option<Getter<T>>,
    pub(crate) setter: Option<Setter<T>>,
}

impl<T: 'static> FieldDef<T> {
    /// Declare a persisted property.
    pub fn new<F>(name: impl Into<String>, get: fn(&T) -> &F, set: fn(&mut T, F)) -> Self
    where
        F: SqlType + 'static,
    {
        Self {
            name: name.into(),
            field_type: F::field_type(),
            key: false,
            generated: false,
            persisted: true,
            getter: Some(Arc::new(move |entity: &T| get(entity).to_value())),
            setter: Some(Arc::new(move |entity: &mut T, value: Value| {
                set(entity, F::from_value(value)?);
                Ok(())
            })),
        }
    }

    /// Declare the key property.
    pub fn key<F>(name: impl Into<String>, get: fn(&T) -> &F, set: fn(&mut T, F)) -> Self
    where
        F: SqlType + 'static,
    {
        Self {
            key: true,
            ..Self::new(name, get, set)
        }
    }

    /// Declare an enum-typed property, stored by discriminant.
    pub fn enumeration<E>(name: impl Into<String>, get: fn(&T) -> &E, set: fn(&mut T, E)) -> Self
    where
        E: SqlEnum + 'static,
    {
        Self {
            name: name.into(),
            field_type: FieldType::Scalar(ScalarType::Enum),
            key: false,
            generated: false,
            persisted: true,
            getter: Some(Arc::new(move |entity: &T| {
                Value::Int64(get(entity).discriminant())
            })),
            setter: Some(Arc::new(move |entity: &mut T, value: Value| {
                set(entity, enum_from_value(value)?);
                Ok(())
            })),
        }
    }

    /// Declare a nullable enum-typed property.
    pub fn optional_enumeration<E>(
        name: impl Into<String>,
        get: fn(&T) -> &Option<E>,
        set: fn(&mut T, Option<E>),
    ) -> Self
    where
        E: SqlEnum + 'static,
    {
        Self {
            name: name.into(),
            field_type: FieldType::OptionalScalar(ScalarType::Enum),
            key: false,
            generated: false,
            persisted: true,
            getter: Some(Arc::new(move |entity: &T| match get(entity) {
                Some(e) => Value::Int64(e.discriminant()),
                None => Value::Null,
            })),
            setter: Some(Arc::new(move |entity: &mut T, value: Value| {
                let parsed = match value {
                    Value::Null => None,
                    other => Some(enum_from_value(other)?),
                };
                set(entity, parsed);
                Ok(())
            })),
        }
    }

    /// Declare a property that holds nested related instances.
    ///
    /// It is never persisted, never selected, and has no accessors; relate
    /// callbacks fill it in.
    pub fn nested(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: FieldType::OptionalScalar(ScalarType::Bytes),
            key: false,
            generated: false,
            persisted: false,
            getter: None,
            setter: None,
        }
    }

    /// Mark the value as assigned by the store (e.g. an auto-increment key).
    pub fn generated(mut self) -> Self {
        self.generated = true;
        self
    }
}

impl<T> Clone for FieldDef<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            field_type: self.field_type,
            key: self.key,
            generated: self.generated,
            persisted: self.persisted,
            getter: self.getter.clone(),
            setter: self.setter.clone(),
        }
    }
}

impl<T> fmt::Debug for FieldDef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDef")
            .field("name", &self.name)
            .field("field_type", &self.field_type)
            .field("key", &self.key)
            .field("generated", &self.generated)
            .field("persisted", &self.persisted)
            .finish()
    }
}
