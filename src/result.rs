use serde::Serialize;

use crate::error::{Error, Result};
use crate::value::Value;

/// An ordered set of rows with named columns.
///
/// Every operator consumes and produces one of these. Columns coming from a
/// scan under an alias are named `alias.column`; a bare name resolves to the
/// single column with that suffix.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultTable {
    /// The names of the columns, in row order.
    pub columns: Vec<String>,
    /// The actual data, as a vector of rows, where each row is a vector of [Value].
    pub rows: Vec<Vec<Value>>,
}

impl ResultTable {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Resolves a column name to its position.
    ///
    /// # Errors
    /// [Error::UnknownColumn] when nothing matches, [Error::AmbiguousColumn]
    /// when a bare name matches several qualified columns.
    pub fn column_index(&self, name: &str) -> Result<usize> {
        resolve(&self.columns, name)
    }

    /// All values of one column, top to bottom.
    pub fn column(&self, name: &str) -> Result<Vec<Value>> {
        let idx = self.column_index(name)?;
        Ok(self.rows.iter().map(|row| row[idx].clone()).collect())
    }

    pub fn value(&self, row: usize, name: &str) -> Result<&Value> {
        let idx = self.column_index(name)?;
        self.rows
            .get(row)
            .map(|r| &r[idx])
            .ok_or_else(|| Error::InvalidPipeline(format!("row {row} is out of range")))
    }

    /// Renames every column to `alias.column`, dropping any previous qualifier.
    pub fn qualify(mut self, alias: &str) -> Self {
        for column in &mut self.columns {
            let bare = column.rsplit_once('.').map_or(column.as_str(), |(_, b)| b);
            *column = format!("{alias}.{bare}");
        }
        self
    }

    /// Checks that every row holds one value per column.
    ///
    /// # Errors
    /// [Error::InvalidPipeline] naming the first row of the wrong width.
    pub fn check_shape(&self) -> Result<()> {
        match self.rows.iter().position(|r| r.len() != self.columns.len()) {
            Some(idx) => Err(Error::InvalidPipeline(format!(
                "row {idx} has {} values for {} columns",
                self.rows[idx].len(),
                self.columns.len()
            ))),
            None => Ok(()),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

pub(crate) fn resolve(columns: &[String], name: &str) -> Result<usize> {
    if let Some(idx) = columns.iter().position(|c| c == name) {
        return Ok(idx);
    }
    let mut matches = columns
        .iter()
        .enumerate()
        .filter(|(_, c)| c.rsplit_once('.').is_some_and(|(_, bare)| bare == name));
    match (matches.next(), matches.next()) {
        (Some((idx, _)), None) => Ok(idx),
        (Some(_), Some(_)) => Err(Error::AmbiguousColumn(name.into())),
        (None, _) => Err(Error::UnknownColumn(name.into())),
    }
}
