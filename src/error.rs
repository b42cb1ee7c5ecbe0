//! Error types for shopdb

use std::fmt;

use thiserror::Error;

use crate::schema::Entity;

/// Result type alias for dataset and query operations
pub type Result<T> = std::result::Result<T, Error>;

/// The integrity rule a candidate record broke.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    /// Another record of the same entity already uses this id.
    DuplicateKey,
    /// A unique column already holds this value.
    DuplicateUniqueField { field: &'static str },
    /// A foreign key does not resolve to an existing record.
    MissingForeignKey {
        field: &'static str,
        references: Entity,
    },
    /// A field value is out of its allowed domain.
    InvalidField {
        field: &'static str,
        reason: &'static str,
    },
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::DuplicateKey => write!(f, "duplicate key"),
            Rule::DuplicateUniqueField { field } => write!(f, "duplicate value for unique field {field}"),
            Rule::MissingForeignKey { field, references } => {
                write!(f, "{field} does not reference an existing {references}")
            }
            Rule::InvalidField { field, reason } => write!(f, "invalid {field}: {reason}"),
        }
    }
}

/// A rejected insert, with enough context to abort the load or skip the record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{entity} {id} rejected: {rule}")]
pub struct ConstraintViolation {
    pub entity: Entity,
    pub id: i64,
    pub rule: Rule,
}

impl ConstraintViolation {
    pub fn new(entity: Entity, id: i64, rule: Rule) -> Self {
        Self { entity, id, rule }
    }
}

/// Main error type for shopdb
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Constraint(#[from] ConstraintViolation),

    #[error("{entity} {id} not found")]
    NotFound { entity: Entity, id: i64 },

    #[error("scalar sub-query returned {rows} row(s) and {columns} column(s), expected exactly one of each")]
    ScalarCardinality { rows: usize, columns: usize },

    #[error("column {0:?} not found")]
    UnknownColumn(String),

    #[error("column {0:?} is ambiguous")]
    AmbiguousColumn(String),

    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    #[error("no result named {0:?} is bound")]
    UnknownBinding(String),

    #[error("no query named {0:?} in the library")]
    UnknownQuery(String),

    #[error("parameter {0:?} is required")]
    MissingParameter(String),

    #[error("invalid pipeline: {0}")]
    InvalidPipeline(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// The violated rule, when this error is a rejected insert.
    pub fn rule(&self) -> Option<&Rule> {
        match self {
            Error::Constraint(violation) => Some(&violation.rule),
            _ => None,
        }
    }
}
