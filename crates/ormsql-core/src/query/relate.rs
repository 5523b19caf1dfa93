//! Folding joined rows into object graphs.
//!
//! A joined select returns one physical row per combination of root and
//! child rows. [`fold`] groups those rows by the root key, keeps the first
//! root instance of each group, and hands every child to its relate
//! callbacks.

use std::collections::HashMap;
use std::sync::Arc;

use ormsql_proto::{KeyValue, Value};
use tracing::trace;

use super::materialize::{is_absent, materialize};
use super::reader::DataRow;
use crate::cache::AccessorTable;
use crate::entity::{column_key, Entity};
use crate::error::Result;

type AttachFn<'a, T> = Box<dyn Fn(&mut T, &DataRow, &str) -> Result<bool> + 'a>;

/// A relate declaration: how to attach a joined child to its root.
pub struct Relate<'a, T> {
    target: &'static str,
    attach: AttachFn<'a, T>,
}

impl<'a, T: Entity> Relate<'a, T> {
    /// Attach children of type `C` with `callback`.
    ///
    /// Children whose columns are all null (an unmatched outer join) are
    /// skipped, so the callback only sees real rows.
    pub fn new<C, F>(table: Arc<AccessorTable<C>>, callback: F) -> Self
    where
        C: Entity,
        F: Fn(&mut T, C) + 'a,
    {
        Self {
            target: C::TYPE_NAME,
            attach: Box::new(move |parent, row, alias| {
                if is_absent(&table, row, alias) {
                    return Ok(false);
                }
                let child = materialize(&table, row, alias)?;
                callback(parent, child);
                Ok(true)
            }),
        }
    }

    /// Type name of the child entity.
    pub fn target(&self) -> &'static str {
        self.target
    }

    /// Attach the child stored under `alias` in `row`. Returns whether a
    /// child was attached.
    pub fn attach(&self, parent: &mut T, row: &DataRow, alias: &str) -> Result<bool> {
        (self.attach)(parent, row, alias)
    }
}

/// Group `rows` by root key and run each relate once per row.
///
/// `relates` pairs each declaration with the alias its child is read from.
/// Roots come out in the order their key was first seen.
pub fn fold<T: Entity>(
    root: &AccessorTable<T>,
    root_alias: &str,
    rows: &[DataRow],
    relates: &[(&Relate<'_, T>, String)],
) -> Result<Vec<T>> {
    let key_column = column_key(root_alias, &root.key_field().name);
    let mut roots: Vec<T> = Vec::new();
    let mut index: HashMap<KeyValue, usize> = HashMap::new();

    for row in rows {
        let key = KeyValue(row.get(&key_column).cloned().unwrap_or(Value::Null));
        let slot = match index.get(&key) {
            Some(&slot) => slot,
            None => {
                roots.push(materialize(root, row, root_alias)?);
                index.insert(key, roots.len() - 1);
                roots.len() - 1
            }
        };

        for (relate, alias) in relates {
            let attached = relate.attach(&mut roots[slot], row, alias)?;
            if !attached {
                trace!(child = relate.target(), "skipped absent child");
            }
        }
    }

    Ok(roots)
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::cache::OrdinalTable;
    use crate::entity::FieldDef;
    use crate::query::BufferedReader;

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Customer {
        id: i64,
        name: String,
        orders: Option<Vec<Order>>,
    }

    impl Entity for Customer {
        const TYPE_NAME: &'static str = "Customer";

        fn fields() -> Vec<FieldDef<Self>> {
            vec![
                FieldDef::key("Id", |c: &Customer| &c.id, |c: &mut Customer, v| c.id = v),
                FieldDef::new("Name", |c: &Customer| &c.name, |c: &mut Customer, v| c.name = v),
                FieldDef::nested("Orders"),
            ]
        }
    }

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Order {
        id: i64,
        customer_id: i64,
    }

    impl Entity for Order {
        const TYPE_NAME: &'static str = "Order";

        fn fields() -> Vec<FieldDef<Self>> {
            vec![
                FieldDef::key("Id", |o: &Order| &o.id, |o: &mut Order, v| o.id = v),
                FieldDef::new("CustomerId", |o: &Order| &o.customer_id, |o: &mut Order, v| {
                    o.customer_id = v
                }),
            ]
        }
    }

    fn rows(data: Vec<[Value; 4]>) -> Vec<DataRow> {
        let columns: Vec<String> = ["Customer.Id", "Customer.Name", "Order.Id", "Order.CustomerId"]
            .iter()
            .map(|c| c.to_string())
            .collect();
        let reader = BufferedReader::new(Some(columns.clone()), Vec::new());
        let ordinals = Arc::new(OrdinalTable::resolve(&columns, &reader, false));
        data.into_iter()
            .map(|r| DataRow::new(ordinals.clone(), r.to_vec()))
            .collect()
    }

    fn push_order(customer: &mut Customer, order: Order) {
        customer.orders.get_or_insert_with(Vec::new).push(order);
    }

    #[test]
    fn test_fan_out_with_unmatched_root() {
        let customers = AccessorTable::<Customer>::build().unwrap();
        let orders = Arc::new(AccessorTable::<Order>::build().unwrap());
        let data = rows(vec![
            [Value::Int64(1), Value::from("ann"), Value::Int64(10), Value::Int64(1)],
            [Value::Int64(1), Value::from("ann"), Value::Int64(11), Value::Int64(1)],
            [Value::Int64(2), Value::from("bob"), Value::Null, Value::Null],
        ]);

        let relate = Relate::new(orders, push_order);
        let result = fold(&customers, "Customer", &data, &[(&relate, "Order".to_string())]).unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(result[0].name, "ann");
        assert_eq!(
            result[0].orders,
            Some(vec![
                Order {
                    id: 10,
                    customer_id: 1
                },
                Order {
                    id: 11,
                    customer_id: 1
                },
            ])
        );
        assert_eq!(result[1].name, "bob");
        assert_eq!(result[1].orders, None);
    }

    #[test]
    fn test_roots_keep_first_seen_order() {
        let customers = AccessorTable::<Customer>::build().unwrap();
        let data = rows(vec![
            [Value::Int64(3), Value::from("c"), Value::Null, Value::Null],
            [Value::Int64(1), Value::from("a"), Value::Null, Value::Null],
            [Value::Int64(3), Value::from("ignored"), Value::Null, Value::Null],
        ]);

        let result = fold(&customers, "Customer", &data, &[]).unwrap();
        let ids: Vec<i64> = result.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![3, 1]);
        assert_eq!(result[0].name, "c");
    }

    #[test]
    fn test_every_relate_runs_per_row() {
        let customers = AccessorTable::<Customer>::build().unwrap();
        let orders = Arc::new(AccessorTable::<Order>::build().unwrap());
        let data = rows(vec![
            [Value::Int64(1), Value::from("a"), Value::Int64(10), Value::Int64(1)],
            [Value::Int64(1), Value::from("a"), Value::Int64(11), Value::Int64(1)],
            [Value::Int64(1), Value::from("a"), Value::Int64(12), Value::Int64(1)],
        ]);

        let calls = Cell::new(0);
        let first = Relate::new(orders.clone(), push_order);
        let second = Relate::new(orders, |_: &mut Customer, _: Order| calls.set(calls.get() + 1));
        let result = fold(
            &customers,
            "Customer",
            &data,
            &[(&first, "Order".to_string()), (&second, "Order".to_string())],
        )
        .unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].orders.as_ref().map(Vec::len), Some(3));
        assert_eq!(calls.get(), 3);
    }
}
