//! Scalar expressions and row predicates.
//!
//! Expressions are plain data; [crate::engine::Engine] evaluates them against
//! a row. The value-level arithmetic lives here so it can be shared with the
//! aggregates and window functions.

use rust_decimal::Decimal;

use crate::error::{Error, Result};
use crate::pipeline::Pipeline;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A column of the current row, `alias.column` or a bare name.
    Column(String),
    /// A column of the enclosing row, for correlated sub-queries.
    Outer(String),
    Literal(Value),
    Param(String),
    /// String concatenation; any absent part makes the result absent.
    Concat(Vec<Expr>),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Half away from zero.
    Round { expr: Box<Expr>, scale: u32 },
    /// Truncates a date to its month, rendered `YYYY-MM`.
    Month(Box<Expr>),
    /// Whole days from `from` to `to`.
    DaysBetween { from: Box<Expr>, to: Box<Expr> },
    /// A pipeline that must yield exactly one row and one column.
    Scalar(Box<Pipeline>),
}

pub fn col(name: &str) -> Expr {
    Expr::Column(name.to_string())
}

pub fn outer(name: &str) -> Expr {
    Expr::Outer(name.to_string())
}

pub fn lit(value: impl Into<Value>) -> Expr {
    Expr::Literal(value.into())
}

pub fn param(name: &str) -> Expr {
    Expr::Param(name.to_string())
}

pub fn concat(parts: Vec<Expr>) -> Expr {
    Expr::Concat(parts)
}

pub fn scalar(pipeline: Pipeline) -> Expr {
    Expr::Scalar(Box::new(pipeline))
}

pub fn days_between(from: Expr, to: Expr) -> Expr {
    Expr::DaysBetween {
        from: Box::new(from),
        to: Box::new(to),
    }
}

/// An expression with the name of the column it produces.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedExpr {
    pub expr: Expr,
    pub alias: String,
}

impl Expr {
    fn binary(self, op: BinaryOp, right: Expr) -> Expr {
        Expr::Binary {
            op,
            left: Box::new(self),
            right: Box::new(right),
        }
    }

    pub fn add(self, right: Expr) -> Expr {
        self.binary(BinaryOp::Add, right)
    }

    pub fn sub(self, right: Expr) -> Expr {
        self.binary(BinaryOp::Sub, right)
    }

    pub fn mul(self, right: Expr) -> Expr {
        self.binary(BinaryOp::Mul, right)
    }

    pub fn div(self, right: Expr) -> Expr {
        self.binary(BinaryOp::Div, right)
    }

    pub fn round(self, scale: u32) -> Expr {
        Expr::Round {
            expr: Box::new(self),
            scale,
        }
    }

    pub fn month(self) -> Expr {
        Expr::Month(Box::new(self))
    }

    pub fn alias(self, alias: &str) -> NamedExpr {
        NamedExpr {
            expr: self,
            alias: alias.to_string(),
        }
    }

    fn compare(self, op: CmpOp, right: Expr) -> Predicate {
        Predicate::Compare {
            op,
            left: self,
            right,
        }
    }

    pub fn eq(self, right: Expr) -> Predicate {
        self.compare(CmpOp::Eq, right)
    }

    pub fn ne(self, right: Expr) -> Predicate {
        self.compare(CmpOp::Ne, right)
    }

    pub fn lt(self, right: Expr) -> Predicate {
        self.compare(CmpOp::Lt, right)
    }

    pub fn le(self, right: Expr) -> Predicate {
        self.compare(CmpOp::Le, right)
    }

    pub fn gt(self, right: Expr) -> Predicate {
        self.compare(CmpOp::Gt, right)
    }

    pub fn ge(self, right: Expr) -> Predicate {
        self.compare(CmpOp::Ge, right)
    }

    pub fn between(self, low: Expr, high: Expr) -> Predicate {
        Predicate::Between {
            expr: self,
            low,
            high,
        }
    }

    pub fn is_in(self, list: Vec<Expr>) -> Predicate {
        Predicate::In { expr: self, list }
    }

    pub fn is_null(self) -> Predicate {
        Predicate::IsNull(self)
    }

    pub fn is_not_null(self) -> Predicate {
        Predicate::IsNotNull(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// A boolean condition over a row, evaluated with SQL three-valued logic:
/// comparing an absent or undefined value is unknown, and unknown rows are
/// filtered out.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Compare { op: CmpOp, left: Expr, right: Expr },
    /// Inclusive on both ends.
    Between { expr: Expr, low: Expr, high: Expr },
    In { expr: Expr, list: Vec<Expr> },
    IsNull(Expr),
    IsNotNull(Expr),
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    pub fn and(self, other: Predicate) -> Predicate {
        Predicate::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Predicate) -> Predicate {
        Predicate::Or(Box::new(self), Box::new(other))
    }
}

pub fn not(predicate: Predicate) -> Predicate {
    Predicate::Not(Box::new(predicate))
}

/// Applies `op` to two operands.
///
/// Absent operands give an absent result and `Undefined` operands an
/// `Undefined` one. Dividing by zero gives `Undefined`. `Int` division is
/// exact and returns a `Decimal`.
pub fn arithmetic(op: BinaryOp, left: &Value, right: &Value) -> Result<Value> {
    if left.is_undefined() || right.is_undefined() {
        return Ok(Value::Undefined);
    }
    if left.is_null() || right.is_null() {
        return Ok(Value::Null);
    }
    let overflow = || Error::TypeMismatch(format!("{left} {op:?} {right} overflows"));

    if let (Value::Int(l), Value::Int(r)) = (left, right) {
        let result = match op {
            BinaryOp::Add => l.checked_add(*r),
            BinaryOp::Sub => l.checked_sub(*r),
            BinaryOp::Mul => l.checked_mul(*r),
            BinaryOp::Div => return divide(Decimal::from(*l), Decimal::from(*r)),
        };
        return result.map(Value::Int).ok_or_else(overflow);
    }

    let (Some(l), Some(r)) = (left.as_decimal(), right.as_decimal()) else {
        return Err(Error::TypeMismatch(format!(
            "cannot apply {op:?} to {left:?} and {right:?}"
        )));
    };
    let result = match op {
        BinaryOp::Add => l.checked_add(r),
        BinaryOp::Sub => l.checked_sub(r),
        BinaryOp::Mul => l.checked_mul(r),
        BinaryOp::Div => return divide(l, r),
    };
    result.map(Value::Decimal).ok_or_else(overflow)
}

fn divide(l: Decimal, r: Decimal) -> Result<Value> {
    if r.is_zero() {
        return Ok(Value::Undefined);
    }
    l.checked_div(r)
        .map(Value::Decimal)
        .ok_or_else(|| Error::TypeMismatch(format!("{l} / {r} overflows")))
}
