//! Per-type accessor tables.
//!
//! An accessor table is built from an entity's field declarations the first
//! time the type is used, then shared process-wide. Lookups after that are a
//! single concurrent-map read.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use ormsql_proto::Value;
use tracing::{debug, trace};

use super::CacheStats;
use crate::entity::{column_key, CoerceError, ColumnShape, Entity, FieldDef, TableShape};
use crate::error::{Error, Result};

/// Compiled accessors for one entity type.
pub struct AccessorTable<T> {
    shape: TableShape,
    fields: Vec<FieldDef<T>>,
    index: HashMap<String, usize>,
    key: usize,
    keys: Vec<String>,
}

impl<T: Entity> AccessorTable<T> {
    /// Build the table from `T::fields()`.
    ///
    /// Fails with a configuration error unless exactly one field is a key.
    pub fn build() -> Result<Self> {
        let mut fields = Vec::new();
        let mut index = HashMap::new();
        let mut key = None;

        for field in T::fields().into_iter().filter(|f| f.persisted) {
            if index.contains_key(&field.name) {
                return Err(Error::configuration(
                    T::TYPE_NAME,
                    format!("property {} declared twice", field.name),
                ));
            }
            if field.key {
                if key.is_some() {
                    return Err(Error::configuration(
                        T::TYPE_NAME,
                        "more than one key property",
                    ));
                }
                key = Some(fields.len());
            }
            index.insert(field.name.clone(), fields.len());
            fields.push(field);
        }

        let key = key.ok_or_else(|| Error::configuration(T::TYPE_NAME, "no key property"))?;

        let shape = TableShape {
            entity: T::TYPE_NAME.to_string(),
            table: T::table_name().to_string(),
            columns: fields
                .iter()
                .map(|f| ColumnShape {
                    name: f.name.clone(),
                    field_type: f.field_type,
                    key: f.key,
                    generated: f.generated,
                })
                .collect(),
        };
        let keys = fields
            .iter()
            .map(|f| column_key(T::TYPE_NAME, &f.name))
            .collect();

        Ok(Self {
            shape,
            fields,
            index,
            key,
            keys,
        })
    }

    /// Table metadata.
    pub fn shape(&self) -> &TableShape {
        &self.shape
    }

    /// Persisted fields in declaration order.
    pub fn fields(&self) -> &[FieldDef<T>] {
        &self.fields
    }

    /// The key field.
    pub fn key_field(&self) -> &FieldDef<T> {
        &self.fields[self.key]
    }

    /// Result-set keys for the first occurrence of this type, in field order.
    pub fn column_keys(&self) -> &[String] {
        &self.keys
    }

    /// Result-set keys under an arbitrary alias.
    pub fn column_keys_for(&self, alias: &str) -> Vec<String> {
        if alias == T::TYPE_NAME {
            return self.keys.clone();
        }
        self.fields
            .iter()
            .map(|f| column_key(alias, &f.name))
            .collect()
    }

    /// Read a property.
    pub fn get(&self, entity: &T, name: &str) -> Option<Value> {
        let field = &self.fields[*self.index.get(name)?];
        field.getter.as_ref().map(|get| get(entity))
    }

    /// Write a property. Returns `None` for an unknown property.
    pub fn set(
        &self,
        entity: &mut T,
        name: &str,
        value: Value,
    ) -> Option<std::result::Result<(), CoerceError>> {
        let field = &self.fields[*self.index.get(name)?];
        field.setter.as_ref().map(|set| set(entity, value))
    }

    /// Read the key.
    pub fn key_value(&self, entity: &T) -> Value {
        self.key_field()
            .getter
            .as_ref()
            .map(|get| get(entity))
            .unwrap_or(Value::Null)
    }

    /// All persisted values in field order.
    pub fn values(&self, entity: &T) -> Vec<(String, Value)> {
        self.fields
            .iter()
            .filter_map(|f| f.getter.as_ref().map(|get| (f.name.clone(), get(entity))))
            .collect()
    }
}

/// Process-wide map from entity type to its accessor table.
#[derive(Default)]
pub struct AccessorCache {
    tables: DashMap<TypeId, Arc<dyn Any + Send + Sync>>,
    stats: CacheStats,
}

impl AccessorCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the accessor table for `T`, building it on first use.
    ///
    /// Concurrent first uses may each build a table; the first one stored
    /// wins and every caller receives it.
    pub fn table<T: Entity>(&self) -> Result<Arc<AccessorTable<T>>> {
        let type_id = TypeId::of::<T>();

        if let Some(entry) = self.tables.get(&type_id) {
            self.stats.record_hit();
            trace!(entity = T::TYPE_NAME, "accessor cache hit");
            return downcast::<T>(entry.value().clone());
        }

        self.stats.record_miss();
        let built: Arc<dyn Any + Send + Sync> = Arc::new(AccessorTable::<T>::build()?);
        self.stats.record_build();

        let stored = self
            .tables
            .entry(type_id)
            .or_insert_with(|| built.clone())
            .value()
            .clone();
        if Arc::ptr_eq(&stored, &built) {
            debug!(entity = T::TYPE_NAME, "built accessor table");
        } else {
            debug!(entity = T::TYPE_NAME, "accessor table built concurrently, using stored one");
        }

        downcast::<T>(stored)
    }

    /// Number of cached types.
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Check if no type has been cached yet.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Number of accessor tables built, including ones that lost a race.
    pub fn builds(&self) -> u64 {
        self.stats.builds()
    }

    /// Cache statistics.
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }
}

fn downcast<T: Entity>(entry: Arc<dyn Any + Send + Sync>) -> Result<Arc<AccessorTable<T>>> {
    entry.downcast::<AccessorTable<T>>().map_err(|_| {
        Error::CacheConsistency(format!(
            "accessor entry for {} has a different type",
            T::TYPE_NAME
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Product {
        id: i64,
        name: String,
        price: Option<f64>,
        tags: Option<Vec<String>>,
    }

    impl Entity for Product {
        const TYPE_NAME: &'static str = "Product";

        fn table_name() -> &'static str {
            "Products"
        }

        fn fields() -> Vec<FieldDef<Self>> {
            vec![
                FieldDef::key("Id", |p: &Product| &p.id, |p: &mut Product, v| p.id = v).generated(),
                FieldDef::new("Name", |p: &Product| &p.name, |p: &mut Product, v| p.name = v),
                FieldDef::new("Price", |p: &Product| &p.price, |p: &mut Product, v| p.price = v),
                FieldDef::nested("Tags"),
            ]
        }
    }

    #[derive(Debug, Default)]
    struct Keyless {
        name: String,
    }

    impl Entity for Keyless {
        const TYPE_NAME: &'static str = "Keyless";

        fn fields() -> Vec<FieldDef<Self>> {
            vec![FieldDef::new("Name", |k: &Keyless| &k.name, |k: &mut Keyless, v| k.name = v)]
        }
    }

    #[derive(Debug, Default)]
    struct TwoKeys {
        a: i32,
        b: i32,
    }

    impl Entity for TwoKeys {
        const TYPE_NAME: &'static str = "TwoKeys";

        fn fields() -> Vec<FieldDef<Self>> {
            vec![
                FieldDef::key("A", |t: &TwoKeys| &t.a, |t: &mut TwoKeys, v| t.a = v),
                FieldDef::key("B", |t: &TwoKeys| &t.b, |t: &mut TwoKeys, v| t.b = v),
            ]
        }
    }

    #[test]
    fn test_build_skips_nested_storage() {
        let table = AccessorTable::<Product>::build().unwrap();
        let shape = table.shape();

        assert_eq!(shape.table, "Products");
        assert_eq!(shape.columns.len(), 3);
        assert!(shape.column("Tags").is_none());
        assert_eq!(table.key_field().name, "Id");
        assert!(table.key_field().generated);
        assert_eq!(
            table.column_keys(),
            &["Product.Id", "Product.Name", "Product.Price"]
        );
        assert_eq!(table.column_keys_for("Product_1")[0], "Product_1.Id");
    }

    #[test]
    fn test_get_and_set() {
        let table = AccessorTable::<Product>::build().unwrap();
        let mut product = Product::default();

        table.set(&mut product, "Name", Value::from("Widget")).unwrap().unwrap();
        table.set(&mut product, "Price", Value::Int64(3)).unwrap().unwrap();
        assert_eq!(product.name, "Widget");
        assert_eq!(product.price, Some(3.0));
        assert_eq!(table.get(&product, "Name"), Some(Value::from("Widget")));
        assert_eq!(table.key_value(&product), Value::Int64(0));
        assert!(table.get(&product, "Missing").is_none());
        assert!(table.set(&mut product, "Tags", Value::Null).is_none());

        let err = table
            .set(&mut product, "Name", Value::List(vec![]))
            .unwrap()
            .unwrap_err();
        assert_eq!(err.from, "list");
    }

    #[test]
    fn test_key_validation() {
        let err = AccessorTable::<Keyless>::build().err().unwrap();
        assert!(matches!(err, Error::Configuration { ref entity, .. } if entity == "Keyless"));

        let err = AccessorTable::<TwoKeys>::build().err().unwrap();
        assert!(err.to_string().contains("more than one key"));
    }

    #[test]
    fn test_cache_builds_once() {
        let cache = AccessorCache::new();
        let first = cache.table::<Product>().unwrap();
        let second = cache.table::<Product>().unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.builds(), 1);
        assert_eq!(cache.stats().hits(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cache_concurrent_first_use() {
        let cache = Arc::new(AccessorCache::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                std::thread::spawn(move || cache.table::<Product>().unwrap())
            })
            .collect();
        let tables: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        for table in &tables[1..] {
            assert!(Arc::ptr_eq(&tables[0], table));
        }
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cache_does_not_store_failures() {
        let cache = AccessorCache::new();
        assert!(cache.table::<Keyless>().is_err());
        assert!(cache.is_empty());
    }
}
