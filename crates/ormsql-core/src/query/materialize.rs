//! Row to entity materialization.

use ormsql_proto::Value;

use super::reader::DataRow;
use crate::cache::AccessorTable;
use crate::entity::{coerce, column_key, Entity, ScalarType};
use crate::error::{Error, Result};

/// Build one `T` from the columns stored under `alias`.
///
/// Columns missing from the row leave the field at its default, as does a
/// DB-null read into a non-nullable field.
pub fn materialize<T: Entity>(table: &AccessorTable<T>, row: &DataRow, alias: &str) -> Result<T> {
    let mut entity = T::default();
    let keys = table.column_keys_for(alias);

    for (field, key) in table.fields().iter().zip(&keys) {
        let Some(setter) = field.setter.as_ref() else {
            continue;
        };
        let Some(raw) = row.get(key) else {
            continue;
        };
        if raw.is_null() && !field.field_type.is_nullable() {
            continue;
        }

        let value = if raw.is_null() || field.field_type.scalar() == ScalarType::Enum {
            // enums parse by name or discriminant in their setter
            raw.clone()
        } else {
            coerce(raw.clone(), field.field_type.scalar()).map_err(|e| Error::Materialization {
                entity: T::TYPE_NAME.to_string(),
                property: field.name.clone(),
                source_type: e.from.to_string(),
                target_type: field.field_type.to_string(),
            })?
        };

        setter(&mut entity, value).map_err(|e| Error::Materialization {
            entity: T::TYPE_NAME.to_string(),
            property: field.name.clone(),
            source_type: e.from.to_string(),
            target_type: field.field_type.to_string(),
        })?;
    }

    Ok(entity)
}

/// Check whether every column stored under `alias` is null or missing.
///
/// This is how an unmatched outer-join leg shows up in a row.
pub fn is_absent<T: Entity>(table: &AccessorTable<T>, row: &DataRow, alias: &str) -> bool {
    table
        .fields()
        .iter()
        .all(|f| row.get(&column_key(alias, &f.name)).map_or(true, Value::is_null))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::cache::OrdinalTable;
    use crate::entity::{FieldDef, SqlEnum};
    use crate::query::BufferedReader;

    #[derive(Debug, Default, Clone, Copy, PartialEq)]
    enum Status {
        #[default]
        Draft,
        Live,
    }

    impl SqlEnum for Status {
        fn from_name(name: &str) -> Option<Self> {
            match name {
                "Draft" => Some(Status::Draft),
                "Live" => Some(Status::Live),
                _ => None,
            }
        }

        fn from_discriminant(value: i64) -> Option<Self> {
            match value {
                0 => Some(Status::Draft),
                1 => Some(Status::Live),
                _ => None,
            }
        }

        fn discriminant(&self) -> i64 {
            *self as i64
        }
    }

    #[derive(Debug, Default, PartialEq)]
    struct Item {
        id: i32,
        name: String,
        weight: Option<f64>,
        status: Status,
    }

    impl Entity for Item {
        const TYPE_NAME: &'static str = "Item";

        fn fields() -> Vec<FieldDef<Self>> {
            vec![
                FieldDef::key("Id", |i: &Item| &i.id, |i: &mut Item, v| i.id = v),
                FieldDef::new("Name", |i: &Item| &i.name, |i: &mut Item, v| i.name = v),
                FieldDef::new("Weight", |i: &Item| &i.weight, |i: &mut Item, v| i.weight = v),
                FieldDef::enumeration("Status", |i: &Item| &i.status, |i: &mut Item, v| i.status = v),
            ]
        }
    }

    fn make_row(columns: &[&str], values: Vec<Value>) -> DataRow {
        let names: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
        let reader = BufferedReader::new(Some(names.clone()), Vec::new());
        DataRow::new(Arc::new(OrdinalTable::resolve(&names, &reader, false)), values)
    }

    #[test]
    fn test_materialize_with_coercion() {
        let table = AccessorTable::<Item>::build().unwrap();
        let row = make_row(
            &["Item.Id", "Item.Name", "Item.Weight", "Item.Status"],
            vec![
                Value::Int64(3),
                Value::from("bolt"),
                Value::Int64(2),
                Value::from("Live"),
            ],
        );

        let item = materialize(&table, &row, "Item").unwrap();
        assert_eq!(
            item,
            Item {
                id: 3,
                name: "bolt".into(),
                weight: Some(2.0),
                status: Status::Live,
            }
        );
    }

    #[test]
    fn test_missing_and_null_columns_keep_defaults() {
        let table = AccessorTable::<Item>::build().unwrap();
        let row = make_row(&["Item.Id", "Item.Name", "Item.Weight"], vec![
            Value::Int32(1),
            Value::Null,
            Value::Null,
        ]);

        let item = materialize(&table, &row, "Item").unwrap();
        assert_eq!(item.id, 1);
        assert_eq!(item.name, "");
        assert_eq!(item.weight, None);
        assert_eq!(item.status, Status::Draft);
    }

    #[test]
    fn test_materialize_under_alias() {
        let table = AccessorTable::<Item>::build().unwrap();
        let row = make_row(&["Item.Id", "Item_1.Id"], vec![Value::Int64(1), Value::Int64(2)]);

        assert_eq!(materialize(&table, &row, "Item_1").unwrap().id, 2);
    }

    #[test]
    fn test_unconvertible_value_fails() {
        let table = AccessorTable::<Item>::build().unwrap();
        let row = make_row(&["Item.Id", "Item.Weight"], vec![
            Value::Int64(1),
            Value::from("heavy"),
        ]);

        let err = materialize(&table, &row, "Item").unwrap_err();
        match err {
            Error::Materialization {
                entity,
                property,
                source_type,
                target_type,
            } => {
                assert_eq!(entity, "Item");
                assert_eq!(property, "Weight");
                assert_eq!(source_type, "string");
                assert_eq!(target_type, "float64?");
            }
            other => panic!("unexpected error: {other}"),
        }

        let bad_enum = make_row(&["Item.Status"], vec![Value::Int64(7)]);
        assert!(materialize(&table, &bad_enum, "Item").is_err());
    }

    #[test]
    fn test_is_absent() {
        let table = AccessorTable::<Item>::build().unwrap();
        let nulls = make_row(&["Item.Id", "Item.Name"], vec![Value::Null, Value::Null]);
        let present = make_row(&["Item.Id"], vec![Value::Int64(1)]);

        assert!(is_absent(&table, &nulls, "Item"));
        assert!(!is_absent(&table, &present, "Item"));
        assert!(is_absent(&table, &present, "Item_1"));
    }
}
