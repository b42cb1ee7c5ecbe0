//! Queries as data.
//!
//! A [Pipeline] names its input, binds any number of named sub-results
//! (CTEs) and lists the operator steps to run, in order. Pipelines nest:
//! the right side of a join and a scalar sub-query are pipelines too.

use crate::aggregate::AggregateExpr;
use crate::expr::{Expr, NamedExpr, Predicate, lit};
use crate::result::ResultTable;
use crate::schema::Entity;

#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    /// Every row of one entity, columns qualified with `alias` if given.
    Scan {
        entity: Entity,
        alias: Option<String>,
    },
    /// A result bound earlier with [Pipeline::with].
    Binding { name: String, alias: Option<String> },
    /// Inline rows.
    Rows(ResultTable),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    /// Left rows without a match are kept, right columns absent.
    Left,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortKey {
    pub column: String,
    pub descending: bool,
}

impl SortKey {
    pub fn asc(column: &str) -> Self {
        Self {
            column: column.to_string(),
            descending: false,
        }
    }

    pub fn desc(column: &str) -> Self {
        Self {
            column: column.to_string(),
            descending: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WindowFn {
    RunningSum(Expr),
    /// Value `offset` rows earlier in the partition.
    Lag { expr: Expr, offset: usize },
    /// Value `offset` rows later in the partition.
    Lead { expr: Expr, offset: usize },
}

impl WindowFn {
    pub fn lag(expr: Expr) -> Self {
        WindowFn::Lag { expr, offset: 1 }
    }

    pub fn lead(expr: Expr) -> Self {
        WindowFn::Lead { expr, offset: 1 }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    pub partition_by: Vec<String>,
    pub order_by: Vec<SortKey>,
    pub function: WindowFn,
    pub alias: String,
}

impl Window {
    pub fn new(function: WindowFn, alias: &str) -> Self {
        Self {
            partition_by: vec![],
            order_by: vec![],
            function,
            alias: alias.to_string(),
        }
    }

    pub fn partition_by(mut self, columns: &[&str]) -> Self {
        self.partition_by = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn order_by(mut self, keys: Vec<SortKey>) -> Self {
        self.order_by = keys;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// WHERE: runs on raw rows.
    Filter(Predicate),
    /// Replaces the columns.
    Project(Vec<NamedExpr>),
    /// Appends computed columns.
    Extend(Vec<NamedExpr>),
    Join {
        kind: JoinKind,
        right: Box<Pipeline>,
        /// `(left column, right column)` pairs that must be equal.
        on: Vec<(String, String)>,
    },
    /// GROUP BY `keys`; output is the key columns then the aggregates.
    Aggregate {
        keys: Vec<String>,
        aggregates: Vec<AggregateExpr>,
    },
    /// HAVING: runs on aggregated rows, only valid after an aggregate.
    Having(Predicate),
    Window(Window),
    Sort(Vec<SortKey>),
    /// Evaluated once, must be a non-negative integer.
    Limit(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    pub ctes: Vec<(String, Pipeline)>,
    pub source: Source,
    pub steps: Vec<Step>,
}

impl Pipeline {
    fn from_source(source: Source) -> Self {
        Self {
            ctes: vec![],
            source,
            steps: vec![],
        }
    }

    pub fn scan(entity: Entity, alias: &str) -> Self {
        Self::from_source(Source::Scan {
            entity,
            alias: Some(alias.to_string()),
        })
    }

    /// Reads a bound result, optionally re-qualified under `alias`.
    pub fn binding(name: &str, alias: Option<&str>) -> Self {
        Self::from_source(Source::Binding {
            name: name.to_string(),
            alias: alias.map(str::to_string),
        })
    }

    pub fn rows(table: ResultTable) -> Self {
        Self::from_source(Source::Rows(table))
    }

    /// Binds `pipeline`'s result to `name` for the rest of this pipeline.
    pub fn with(mut self, name: &str, pipeline: Pipeline) -> Self {
        self.ctes.push((name.to_string(), pipeline));
        self
    }

    fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn filter(self, predicate: Predicate) -> Self {
        self.step(Step::Filter(predicate))
    }

    pub fn project(self, columns: Vec<NamedExpr>) -> Self {
        self.step(Step::Project(columns))
    }

    pub fn extend(self, columns: Vec<NamedExpr>) -> Self {
        self.step(Step::Extend(columns))
    }

    fn join_with(self, kind: JoinKind, right: Pipeline, on: &[(&str, &str)]) -> Self {
        let on = on
            .iter()
            .map(|(l, r)| (l.to_string(), r.to_string()))
            .collect();
        self.step(Step::Join {
            kind,
            right: Box::new(right),
            on,
        })
    }

    pub fn join(self, right: Pipeline, on: &[(&str, &str)]) -> Self {
        self.join_with(JoinKind::Inner, right, on)
    }

    pub fn left_join(self, right: Pipeline, on: &[(&str, &str)]) -> Self {
        self.join_with(JoinKind::Left, right, on)
    }

    pub fn aggregate(self, keys: &[&str], aggregates: Vec<AggregateExpr>) -> Self {
        self.step(Step::Aggregate {
            keys: keys.iter().map(|k| k.to_string()).collect(),
            aggregates,
        })
    }

    pub fn having(self, predicate: Predicate) -> Self {
        self.step(Step::Having(predicate))
    }

    pub fn window(self, window: Window) -> Self {
        self.step(Step::Window(window))
    }

    pub fn sort(self, keys: Vec<SortKey>) -> Self {
        self.step(Step::Sort(keys))
    }

    pub fn limit(self, n: i64) -> Self {
        self.step(Step::Limit(lit(n)))
    }

    pub fn limit_by(self, expr: Expr) -> Self {
        self.step(Step::Limit(expr))
    }
}
