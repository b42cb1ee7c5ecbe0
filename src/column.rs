use std::sync::Arc;

use bitvec::prelude::*;
use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::data_type::DataType;
use crate::error::{Error, Result};
use crate::value::Value;

/// Physical storage for column data.
/// Each variant wraps a collection of a specific type to ensure contiguous memory
/// allocation (columnar storage).
#[derive(Debug, Clone)]
pub enum ColumnData {
    /// Vector of 64-bit integers.
    Int(Vec<i64>),
    /// Vector of exact decimals.
    Decimal(Vec<Decimal>),
    /// Vector of thread-safe atomic reference-counted strings.
    Text(Vec<Arc<str>>),
    /// Vector of calendar dates.
    Date(Vec<NaiveDate>),
}

/// Represents a column within a table.
/// It combines metadata (name, type) with actual data and a nullability tracker.
#[derive(Debug, Clone)]
pub struct Column {
    /// The name of the column.
    pub name: String,
    /// The logical data type of the column.
    pub data_type: DataType,
    /// The actual values stored in the column.
    pub data: ColumnData,
    /// A bitmap where a `true` bit indicates that the value at that index is `NULL`.
    pub null_bitmap: BitVec,
}

impl Column {
    /// Creates a new, empty column with the specified name and data type.
    /// The underlying data storage is initialized according to the data type.
    pub fn new(name: String, data_type: DataType) -> Self {
        let data = match data_type {
            DataType::Int => ColumnData::Int(vec![]),
            DataType::Decimal => ColumnData::Decimal(vec![]),
            DataType::Text => ColumnData::Text(vec![]),
            DataType::Date => ColumnData::Date(vec![]),
        };
        Self {
            name,
            data_type,
            data,
            null_bitmap: bitvec!(),
        }
    }

    /// Returns `true` if `value` may be stored in this column.
    /// `Null` fits every column; `Undefined` fits none.
    pub fn accepts(&self, value: &Value) -> bool {
        value.is_null() || value.data_type() == Some(self.data_type)
    }

    /// Appends a new value to the end of the column.
    ///
    /// # Errors
    /// Returns an error if the value's type does not match the column's data type.
    ///
    /// # Behavior
    /// - If the value is `Null`, a default "dummy" value is pushed to the data vector
    ///   to maintain index alignment with the `null_bitmap`.
    /// - If the value is not `Null`, it is added to the data vector and the bitmap is updated.
    ///
    /// # Example
    /// ```
    /// # use shopdb::column::Column;
    /// # use shopdb::data_type::DataType;
    /// # use shopdb::value::Value;
    /// let mut col = Column::new("quantity".into(), DataType::Int);
    /// col.push(Value::Int(3)).unwrap();
    /// col.push(Value::Null).unwrap();
    ///
    /// assert_eq!(col.len(), 2);
    /// assert!(col.get(1).unwrap().is_null());
    /// ```
    pub fn push(&mut self, value: Value) -> Result<()> {
        if value.is_null() {
            self.null_bitmap.push(true);
            // Add default value to keep alignment between the data vector and the bitmap
            match &mut self.data {
                ColumnData::Int(v) => v.push(0),
                ColumnData::Decimal(v) => v.push(Decimal::ZERO),
                ColumnData::Text(v) => v.push(Arc::from("")),
                ColumnData::Date(v) => v.push(NaiveDate::MIN),
            }

            return Ok(());
        }

        if !self.accepts(&value) {
            return Err(self.mismatch(&value));
        }

        match (&mut self.data, value) {
            (ColumnData::Int(col), Value::Int(v)) => col.push(v),
            (ColumnData::Decimal(col), Value::Decimal(v)) => col.push(v),
            (ColumnData::Text(col), Value::Text(v)) => col.push(v),
            (ColumnData::Date(col), Value::Date(v)) => col.push(v),

            _ => {
                return Err(Error::Storage("internal error: type mismatch".into()));
            }
        }
        self.null_bitmap.push(false);

        Ok(())
    }

    /// Returns the number of rows currently stored in the column.
    pub fn len(&self) -> usize {
        self.null_bitmap.len()
    }

    /// Returns true if there is no row in the column, else false.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Retrieves the value at the specified row index.
    ///
    /// Returns `Some(Value)` if the index is valid, or `None` if it is out of bounds.
    /// If the `null_bitmap` indicates a null at the index, `Some(Value::Null)` is returned.
    pub fn get(&self, row_idx: usize) -> Option<Value> {
        if row_idx >= self.len() {
            return None;
        }
        if self.null_bitmap[row_idx] {
            return Some(Value::Null);
        }
        match &self.data {
            ColumnData::Int(col) => Some(Value::Int(col[row_idx])),
            ColumnData::Decimal(col) => Some(Value::Decimal(col[row_idx])),
            ColumnData::Text(col) => Some(Value::Text(Arc::clone(&col[row_idx]))),
            ColumnData::Date(col) => Some(Value::Date(col[row_idx])),
        }
    }

    /// Replace a value in the column by a new value.
    ///
    /// # Errors
    /// Returns an error if the row_idx is too high or if the value's type does not match the
    /// column's data type.
    pub fn set(&mut self, row_idx: usize, value: &Value) -> Result<()> {
        if self.len() <= row_idx {
            return Err(Error::Storage(format!(
                "row index {row_idx} is out of bounds for column {:?}",
                self.name
            )));
        }

        if value.is_null() {
            self.null_bitmap.set(row_idx, true);
            // get() checks the bitmap first, the stale value is never read.
            return Ok(());
        }

        if !self.accepts(value) {
            return Err(self.mismatch(value));
        }

        match (&mut self.data, value) {
            (ColumnData::Int(col), Value::Int(v)) => col[row_idx] = *v,
            (ColumnData::Decimal(col), Value::Decimal(v)) => col[row_idx] = *v,
            (ColumnData::Text(col), Value::Text(v)) => col[row_idx] = Arc::clone(v),
            (ColumnData::Date(col), Value::Date(v)) => col[row_idx] = *v,
            _ => {
                return Err(Error::Storage("internal error: type mismatch".into()));
            }
        }
        self.null_bitmap.set(row_idx, false);
        Ok(())
    }

    fn mismatch(&self, value: &Value) -> Error {
        Error::TypeMismatch(format!(
            "value {value:?} has type {:?} while column {:?} has type {:?}",
            value.data_type(),
            self.name,
            self.data_type
        ))
    }
}
