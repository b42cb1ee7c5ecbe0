use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::error::{Error, Result};
use crate::value::Value;

/// Named values a pipeline reads through [crate::expr::Expr::Param]:
/// date ranges, thresholds, limits.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    values: BTreeMap<String, Value>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.values.insert(name.to_string(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Like [Params::get], failing with [Error::MissingParameter].
    pub fn require(&self, name: &str) -> Result<&Value> {
        self.get(name)
            .ok_or_else(|| Error::MissingParameter(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Reads parameters from a flat JSON object.
    ///
    /// Integers become `Int`, other numbers `Decimal`, `YYYY-MM-DD` strings
    /// `Date`, other strings `Text`.
    ///
    /// ```
    /// use shopdb::{Params, Value};
    ///
    /// let params = Params::from_json(r#"{"min_orders": 3, "start": "2024-01-01"}"#).unwrap();
    /// assert_eq!(params.get("min_orders"), Some(&Value::Int(3)));
    /// assert!(params.get("start").unwrap().as_date().is_some());
    /// ```
    pub fn from_json(json: &str) -> Result<Self> {
        let map: serde_json::Map<String, serde_json::Value> = serde_json::from_str(json)?;
        let mut params = Self::new();
        for (name, raw) in map {
            let value = from_json_value(&name, raw)?;
            params.values.insert(name, value);
        }
        Ok(params)
    }
}

fn from_json_value(name: &str, raw: serde_json::Value) -> Result<Value> {
    use serde_json::Value as Json;

    match raw {
        Json::Null => Ok(Value::Null),
        Json::Bool(b) => Ok(Value::Bool(b)),
        Json::Number(n) => match n.as_i64() {
            Some(i) => Ok(Value::Int(i)),
            None => {
                let repr = n.to_string();
                repr.parse::<Decimal>()
                    .or_else(|_| Decimal::from_scientific(&repr))
                    .map(Value::Decimal)
                    .map_err(|_| Error::TypeMismatch(format!("parameter {name:?}: {repr} is not a decimal")))
            }
        },
        Json::String(s) => Ok(NaiveDate::parse_from_str(&s, "%Y-%m-%d")
            .map(Value::Date)
            .unwrap_or_else(|_| Value::text(&s))),
        Json::Array(_) | Json::Object(_) => Err(Error::TypeMismatch(format!(
            "parameter {name:?} must be a scalar"
        ))),
    }
}
