pub mod aggregate;
pub mod column;
pub mod data_type;
pub mod dataset;
pub mod engine;
pub mod error;
pub mod expr;
pub mod library;
pub mod load;
pub mod params;
pub mod pipeline;
pub mod result;
pub mod schema;
pub mod table;
pub mod value;

#[cfg(test)]
mod test_fixtures;

pub use aggregate::{AggregateExpr, AggregateFn};
pub use column::Column;
pub use data_type::DataType;
pub use dataset::Dataset;
pub use engine::Engine;
pub use error::{ConstraintViolation, Error, Result, Rule};
pub use expr::{Expr, NamedExpr, Predicate};
pub use library::{Library, NamedQuery, ParamSpec};
pub use load::{LoadBatch, LoadPolicy, LoadReport};
pub use params::Params;
pub use pipeline::{JoinKind, Pipeline, SortKey, Step, Window, WindowFn};
pub use result::ResultTable;
pub use schema::{Customer, Entity, Order, OrderItem, OrderStatus, Product, Record};
pub use table::{ColumnDef, Schema, Table};
pub use value::Value;
