use std::cmp::Ordering;

use crate::error::{Error, Result};
use crate::expr::{BinaryOp, Expr, arithmetic};
use crate::value::Value;

/// The closed set of aggregate functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFn {
    Count,
    Sum,
    Average,
    Min,
    Max,
}

impl AggregateFn {
    /// Folds a partition's values into one.
    ///
    /// Absent values are ignored. An empty input counts as zero and yields an
    /// absent result for every other function. `Undefined` inputs make
    /// `Sum`, `Average`, `Min` and `Max` undefined.
    pub fn apply<I>(self, values: I) -> Result<Value>
    where
        I: IntoIterator<Item = Value>,
    {
        let present = values.into_iter().filter(|v| !v.is_null());
        match self {
            AggregateFn::Count => Ok(Value::Int(present.count() as i64)),
            AggregateFn::Sum => sum(present).map(|(total, _)| total),
            AggregateFn::Average => {
                let (total, count) = sum(present)?;
                if count == 0 || total.is_undefined() {
                    return Ok(total);
                }
                arithmetic(BinaryOp::Div, &total, &Value::Int(count as i64))
            }
            AggregateFn::Min => extreme(present, Ordering::Less),
            AggregateFn::Max => extreme(present, Ordering::Greater),
        }
    }
}

fn sum(values: impl Iterator<Item = Value>) -> Result<(Value, usize)> {
    let mut total = Value::Null;
    let mut count = 0;
    for value in values {
        if value.as_decimal().is_none() && !value.is_undefined() {
            return Err(Error::TypeMismatch(format!("cannot sum {value:?}")));
        }
        count += 1;
        total = if total.is_null() {
            value
        } else {
            arithmetic(BinaryOp::Add, &total, &value)?
        };
    }
    Ok((total, count))
}

fn extreme(values: impl Iterator<Item = Value>, wanted: Ordering) -> Result<Value> {
    let mut best = Value::Null;
    for value in values {
        if value.is_undefined() {
            return Ok(Value::Undefined);
        }
        if best.is_null() {
            best = value;
            continue;
        }
        let ord = value
            .sql_cmp(&best)
            .ok_or_else(|| Error::TypeMismatch(format!("cannot compare {value:?} with {best:?}")))?;
        if ord == wanted {
            best = value;
        }
    }
    Ok(best)
}

/// One aggregate column of a GROUP BY step. Without an argument, `Count`
/// counts rows.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateExpr {
    pub func: AggregateFn,
    pub arg: Option<Expr>,
    pub alias: String,
}

pub fn count_all(alias: &str) -> AggregateExpr {
    AggregateExpr {
        func: AggregateFn::Count,
        arg: None,
        alias: alias.to_string(),
    }
}

fn over(func: AggregateFn, arg: Expr, alias: &str) -> AggregateExpr {
    AggregateExpr {
        func,
        arg: Some(arg),
        alias: alias.to_string(),
    }
}

pub fn count(arg: Expr, alias: &str) -> AggregateExpr {
    over(AggregateFn::Count, arg, alias)
}

pub fn sum_of(arg: Expr, alias: &str) -> AggregateExpr {
    over(AggregateFn::Sum, arg, alias)
}

pub fn avg(arg: Expr, alias: &str) -> AggregateExpr {
    over(AggregateFn::Average, arg, alias)
}

pub fn min_of(arg: Expr, alias: &str) -> AggregateExpr {
    over(AggregateFn::Min, arg, alias)
}

pub fn max_of(arg: Expr, alias: &str) -> AggregateExpr {
    over(AggregateFn::Max, arg, alias)
}

/// Running total used by the window operator; absent values are skipped.
pub(crate) fn accumulate(total: &Value, next: &Value) -> Result<Value> {
    match (total.is_null(), next.is_null()) {
        (_, true) => Ok(total.clone()),
        (true, false) => Ok(next.clone()),
        (false, false) => arithmetic(BinaryOp::Add, total, next),
    }
}
