use std::collections::HashMap;
use std::sync::Arc;

use crate::column::Column;
use crate::data_type::DataType;
use crate::error::{Error, Result};
use crate::value::Value;

/// Column definition in the schema
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
    pub unique: bool,
}

impl ColumnDef {
    pub fn required(name: &str, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: false,
            unique: false,
        }
    }

    pub fn optional(name: &str, data_type: DataType) -> Self {
        Self {
            nullable: true,
            ..Self::required(name, data_type)
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

/// Ordered column definitions. The first column is the integer primary key.
#[derive(Debug, Clone)]
pub struct Schema {
    pub columns: Vec<ColumnDef>,
}

/// Columnar storage for one entity, indexed by primary key and by every
/// unique text column.
#[derive(Debug, Clone)]
pub struct Table {
    pub name: String,
    pub schema: Schema,
    pub columns: Vec<Column>,
    pub row_count: usize,
    primary: HashMap<i64, usize>,
    unique: HashMap<usize, HashMap<Arc<str>, usize>>,
}

impl Table {
    pub fn new(name: String, schema: Schema) -> Self {
        let columns = schema
            .columns
            .iter()
            .map(|column| Column::new(column.name.clone(), column.data_type))
            .collect();
        let unique = schema
            .columns
            .iter()
            .enumerate()
            .filter(|(_, def)| def.unique)
            .map(|(idx, _)| (idx, HashMap::new()))
            .collect();
        Self {
            name,
            schema,
            columns,
            row_count: 0,
            primary: HashMap::new(),
            unique,
        }
    }

    /// Inserts a new row and returns its position.
    ///
    /// The whole row is validated before any column is touched, so a rejected
    /// row leaves the table exactly as it was.
    pub fn insert(&mut self, values: Vec<Value>) -> Result<usize> {
        // different sizes
        if values.len() != self.schema.columns.len() {
            return Err(Error::Storage(format!(
                "row has {} values but table {:?} has {} columns",
                values.len(),
                self.name,
                self.schema.columns.len()
            )));
        }
        for (def, value) in self.schema.columns.iter().zip(&values) {
            if value.is_null() && !def.nullable {
                return Err(Error::Storage(format!(
                    "column {:?} of table {:?} is not nullable",
                    def.name, self.name
                )));
            }
            if !value.is_null() && value.data_type() != Some(def.data_type) {
                return Err(Error::TypeMismatch(format!(
                    "value {value:?} does not fit column {:?} of type {:?}",
                    def.name, def.data_type
                )));
            }
        }
        let id = values[0]
            .as_int()
            .ok_or_else(|| Error::Storage(format!("table {:?} needs an integer key", self.name)))?;
        if self.primary.contains_key(&id) {
            return Err(Error::Storage(format!("key {id} already in table {:?}", self.name)));
        }
        for (col_idx, index) in &self.unique {
            if let Some(s) = values[*col_idx].as_str()
                && index.contains_key(s)
            {
                return Err(Error::Storage(format!(
                    "value {s:?} already in unique column {:?}",
                    self.schema.columns[*col_idx].name
                )));
            }
        }

        let row_idx = self.row_count;
        for (col_idx, value) in values.into_iter().enumerate() {
            if let (Some(index), Value::Text(s)) = (self.unique.get_mut(&col_idx), &value) {
                index.insert(Arc::clone(s), row_idx);
            }
            self.columns[col_idx].push(value)?;
        }
        self.primary.insert(id, row_idx);
        self.row_count += 1;
        Ok(row_idx)
    }

    pub fn get_row(&self, row_idx: usize) -> Option<Vec<Value>> {
        if self.row_count <= row_idx {
            return None;
        }
        self.columns
            .iter()
            .map(|col| col.get(row_idx)) // -> Option<Value>
            .collect()
    }

    /// Position of the row holding primary key `id`.
    pub fn row_index(&self, id: i64) -> Option<usize> {
        self.primary.get(&id).copied()
    }

    /// Position of the row whose unique column `column` holds `value`.
    pub fn find_unique(&self, column: &str, value: &str) -> Option<usize> {
        let col_idx = self.column_index(column)?;
        self.unique.get(&col_idx)?.get(value).copied()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.schema.columns.iter().position(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.schema.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn get_col_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|col| col.name == name)
    }
}
