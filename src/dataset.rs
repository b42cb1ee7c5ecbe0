use std::marker::PhantomData;

use rust_decimal::Decimal;
use tracing::debug;

use crate::error::{ConstraintViolation, Error, Result, Rule};
use crate::result::ResultTable;
use crate::schema::{Entity, Product, Record};
use crate::table::Table;
use crate::value::Value;

/// The in-memory store holding every record of the shop.
///
/// Each entity lives in its own columnar [Table]. The store is a plain value
/// owned by the caller: build it once, then hand out shared references to the
/// query engine.
#[derive(Debug, Clone)]
pub struct Dataset {
    customers: Table,
    products: Table,
    orders: Table,
    order_items: Table,
}

impl Default for Dataset {
    fn default() -> Self {
        Self::new()
    }
}

impl Dataset {
    /// Creates a new, empty dataset.
    pub fn new() -> Self {
        let table = |entity: Entity| Table::new(entity.table_name().into(), entity.schema());
        Self {
            customers: table(Entity::Customer),
            products: table(Entity::Product),
            orders: table(Entity::Order),
            order_items: table(Entity::OrderItem),
        }
    }

    pub fn table(&self, entity: Entity) -> &Table {
        match entity {
            Entity::Customer => &self.customers,
            Entity::Product => &self.products,
            Entity::Order => &self.orders,
            Entity::OrderItem => &self.order_items,
        }
    }

    fn table_mut(&mut self, entity: Entity) -> &mut Table {
        match entity {
            Entity::Customer => &mut self.customers,
            Entity::Product => &mut self.products,
            Entity::Order => &mut self.orders,
            Entity::OrderItem => &mut self.order_items,
        }
    }

    /// Inserts a record after checking it against the integrity rules.
    ///
    /// # Errors
    /// Returns [Error::Constraint] naming the entity, the offending id and the
    /// broken rule. The dataset is left unchanged.
    ///
    /// # Example
    /// ```
    /// use shopdb::{Dataset, Customer};
    ///
    /// let mut ds = Dataset::new();
    /// let ann = Customer {
    ///     id: 1,
    ///     first_name: "Ann".into(),
    ///     last_name: "Lee".into(),
    ///     email: None,
    ///     signup_date: None,
    ///     city: Some("Chicago".into()),
    ///     country: Some("USA".into()),
    /// };
    /// ds.insert(ann.clone()).unwrap();
    /// assert!(ds.insert(ann).is_err());
    /// ```
    pub fn insert<R: Record>(&mut self, record: R) -> Result<()> {
        record.check(self)?;
        let row_idx = self.table_mut(R::ENTITY).insert(record.to_row())?;
        debug!(entity = %R::ENTITY, id = record.id(), row_idx, "record inserted");
        Ok(())
    }

    /// Looks a record up by id.
    pub fn get<R: Record>(&self, id: i64) -> Result<R> {
        let table = self.table(R::ENTITY);
        let row = table
            .row_index(id)
            .and_then(|idx| table.get_row(idx))
            .ok_or(Error::NotFound {
                entity: R::ENTITY,
                id,
            })?;
        R::from_row(row)
    }

    pub fn contains(&self, entity: Entity, id: i64) -> bool {
        self.table(entity).row_index(id).is_some()
    }

    pub fn len(&self, entity: Entity) -> usize {
        self.table(entity).row_count
    }

    pub fn is_empty(&self) -> bool {
        Entity::ALL.iter().all(|e| self.len(*e) == 0)
    }

    /// Lazily iterates over every record of a type in insertion order.
    ///
    /// The iterator is cheap to clone, and calling `scan` again starts over.
    pub fn scan<R: Record>(&self) -> Scan<'_, R> {
        Scan {
            table: self.table(R::ENTITY),
            next: 0,
            _record: PhantomData,
        }
    }

    /// Materialises one table as untyped rows for the query engine.
    pub fn rows(&self, entity: Entity) -> ResultTable {
        let table = self.table(entity);
        let rows = (0..table.row_count)
            .filter_map(|idx| table.get_row(idx))
            .collect();
        ResultTable::new(table.column_names(), rows)
    }

    /// Changes the catalogue price of a product.
    ///
    /// Order items keep the unit price they were created with.
    pub fn reprice_product(&mut self, id: i64, price: Decimal) -> Result<()> {
        if price.is_sign_negative() {
            return Err(ConstraintViolation::new(
                Entity::Product,
                id,
                Rule::InvalidField {
                    field: "price",
                    reason: "must not be negative",
                },
            )
            .into());
        }
        let table = self.table_mut(Entity::Product);
        let row_idx = table.row_index(id).ok_or(Error::NotFound {
            entity: Entity::Product,
            id,
        })?;
        table
            .get_col_mut("price")
            .ok_or_else(|| Error::UnknownColumn("price".into()))?
            .set(row_idx, &Value::Decimal(price))?;
        debug!(id, %price, "product repriced");
        Ok(())
    }

    /// Convenience over [Dataset::get] for the record most callers price from.
    pub fn product(&self, id: i64) -> Result<Product> {
        self.get(id)
    }
}

/// Iterator returned by [Dataset::scan].
pub struct Scan<'a, R> {
    table: &'a Table,
    next: usize,
    _record: PhantomData<R>,
}

impl<R> Clone for Scan<'_, R> {
    fn clone(&self) -> Self {
        Self {
            table: self.table,
            next: self.next,
            _record: PhantomData,
        }
    }
}

impl<R: Record> Iterator for Scan<'_, R> {
    type Item = Result<R>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = self.table.get_row(self.next)?;
        self.next += 1;
        Some(R::from_row(row))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.table.row_count.saturating_sub(self.next);
        (left, Some(left))
    }
}
