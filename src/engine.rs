//! Executes [Pipeline]s over a [Dataset].
//!
//! Every operator takes a [ResultTable] and returns a new one; nothing here
//! mutates the dataset. Expressions are evaluated row by row against the
//! column names of the table they run on.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use tracing::debug;

use crate::aggregate::{AggregateExpr, accumulate};
use crate::dataset::Dataset;
use crate::error::{Error, Result};
use crate::expr::{CmpOp, Expr, NamedExpr, Predicate, arithmetic};
use crate::params::Params;
use crate::pipeline::{JoinKind, Pipeline, SortKey, Source, Step, Window, WindowFn};
use crate::result::{ResultTable, resolve};
use crate::value::Value;

/// A row of an enclosing pipeline, visible to correlated sub-queries.
#[derive(Clone, Copy)]
struct RowRef<'a> {
    columns: &'a [String],
    values: &'a [Value],
}

/// Evaluation context: the dataset, the parameters, the sub-results bound so
/// far and, inside a sub-query, the enclosing row.
pub struct Engine<'a> {
    dataset: &'a Dataset,
    params: &'a Params,
    bindings: HashMap<String, Rc<ResultTable>>,
    outer: Option<RowRef<'a>>,
}

impl<'a> Engine<'a> {
    pub fn new(dataset: &'a Dataset, params: &'a Params) -> Self {
        Self {
            dataset,
            params,
            bindings: HashMap::new(),
            outer: None,
        }
    }

    /// Makes `table` readable as a [Source::Binding] named `name`.
    pub fn bind(&mut self, name: &str, table: ResultTable) {
        self.bindings.insert(name.to_string(), Rc::new(table));
    }

    fn nested<'b>(&'b self, outer: Option<RowRef<'b>>) -> Engine<'b> {
        Engine {
            dataset: self.dataset,
            params: self.params,
            bindings: self.bindings.clone(),
            outer,
        }
    }

    /// Runs a pipeline: binds its CTEs in order, reads its source, then
    /// applies each step.
    ///
    /// # Errors
    /// Any error raised by a step; a `Having` step with no aggregate before it
    /// is rejected with [Error::InvalidPipeline] before anything runs.
    pub fn run(&self, pipeline: &Pipeline) -> Result<ResultTable> {
        check_steps(&pipeline.steps)?;
        if pipeline.ctes.is_empty() {
            return self.execute(pipeline);
        }
        let mut scope = self.nested(self.outer);
        for (name, cte) in &pipeline.ctes {
            let table = scope.run(cte)?;
            debug!(name = %name, rows = table.len(), "sub-result bound");
            scope.bindings.insert(name.clone(), Rc::new(table));
        }
        scope.execute(pipeline)
    }

    fn execute(&self, pipeline: &Pipeline) -> Result<ResultTable> {
        let mut table = self.source(&pipeline.source)?;
        for step in &pipeline.steps {
            let rows_in = table.len();
            table = self.apply(step, table)?;
            debug!(step = step_name(step), rows_in, rows_out = table.len(), "step applied");
        }
        Ok(table)
    }

    fn source(&self, source: &Source) -> Result<ResultTable> {
        let (table, alias) = match source {
            Source::Scan { entity, alias } => (self.dataset.rows(*entity), alias),
            Source::Binding { name, alias } => {
                let bound = self
                    .bindings
                    .get(name)
                    .ok_or_else(|| Error::UnknownBinding(name.clone()))?;
                bound.check_shape()?;
                (ResultTable::clone(bound), alias)
            }
            Source::Rows(rows) => {
                rows.check_shape()?;
                return Ok(rows.clone());
            }
        };
        Ok(match alias {
            Some(alias) => table.qualify(alias),
            None => table,
        })
    }

    fn apply(&self, step: &Step, table: ResultTable) -> Result<ResultTable> {
        match step {
            Step::Filter(predicate) | Step::Having(predicate) => self.filter(table, predicate),
            Step::Project(columns) => self.project(&table, columns),
            Step::Extend(columns) => self.extend(table, columns),
            Step::Join { kind, right, on } => {
                let right = self.run(right)?;
                self.join(table, right, *kind, on)
            }
            Step::Aggregate { keys, aggregates } => self.aggregate(table, keys, aggregates),
            Step::Window(window) => self.window(table, window),
            Step::Sort(keys) => self.sort(table, keys),
            Step::Limit(n) => self.limit(table, n),
        }
    }

    /// Keeps the rows for which `predicate` is true; unknown counts as false.
    pub fn filter(&self, table: ResultTable, predicate: &Predicate) -> Result<ResultTable> {
        let ResultTable { columns, rows } = table;
        let mut kept = Vec::with_capacity(rows.len());
        for row in rows {
            if self.test(predicate, &columns, &row)? == Some(true) {
                kept.push(row);
            }
        }
        Ok(ResultTable::new(columns, kept))
    }

    pub fn project(&self, table: &ResultTable, columns: &[NamedExpr]) -> Result<ResultTable> {
        let rows = table
            .rows
            .iter()
            .map(|row| {
                columns
                    .iter()
                    .map(|c| self.eval(&c.expr, &table.columns, row))
                    .collect::<Result<Vec<_>>>()
            })
            .collect::<Result<Vec<_>>>()?;
        let names = columns.iter().map(|c| c.alias.clone()).collect();
        Ok(ResultTable::new(names, rows))
    }

    pub fn extend(&self, table: ResultTable, columns: &[NamedExpr]) -> Result<ResultTable> {
        let added = self.project(&table, columns)?;
        let ResultTable {
            columns: mut names,
            mut rows,
        } = table;
        for (row, extra) in rows.iter_mut().zip(added.rows) {
            row.extend(extra);
        }
        names.extend(added.columns);
        Ok(ResultTable::new(names, rows))
    }

    /// Pairs every left row with every right row whose `on` columns are
    /// equal. Absent keys never match.
    pub fn join(
        &self,
        left: ResultTable,
        right: ResultTable,
        kind: JoinKind,
        on: &[(String, String)],
    ) -> Result<ResultTable> {
        let keys = on
            .iter()
            .map(|(l, r)| Ok((left.column_index(l)?, right.column_index(r)?)))
            .collect::<Result<Vec<_>>>()?;
        let width = right.columns.len();

        let mut rows = Vec::new();
        for l in &left.rows {
            let mut matched = false;
            for r in &right.rows {
                if keys.iter().all(|(li, ri)| l[*li].sql_eq(&r[*ri]) == Some(true)) {
                    matched = true;
                    rows.push(l.iter().chain(r).cloned().collect());
                }
            }
            if !matched && kind == JoinKind::Left {
                let mut row = l.clone();
                row.resize(l.len() + width, Value::Null);
                rows.push(row);
            }
        }

        let columns = left.columns.into_iter().chain(right.columns).collect();
        Ok(ResultTable::new(columns, rows))
    }

    /// Groups rows by `keys` (first appearance order) and folds each group.
    /// With no keys the whole input is one group, even when empty.
    pub fn aggregate(
        &self,
        table: ResultTable,
        keys: &[String],
        aggregates: &[AggregateExpr],
    ) -> Result<ResultTable> {
        let key_idx = keys
            .iter()
            .map(|k| table.column_index(k))
            .collect::<Result<Vec<_>>>()?;
        let mut groups = group_rows(&table.rows, &key_idx);
        if keys.is_empty() && groups.is_empty() {
            groups.push((vec![], vec![]));
        }

        let mut rows = Vec::with_capacity(groups.len());
        for (key, members) in groups {
            let mut row = key;
            for agg in aggregates {
                let values = members
                    .iter()
                    .map(|&i| match &agg.arg {
                        Some(arg) => self.eval(arg, &table.columns, &table.rows[i]),
                        None => Ok(Value::Int(1)),
                    })
                    .collect::<Result<Vec<_>>>()?;
                row.push(agg.func.apply(values)?);
            }
            rows.push(row);
        }

        let columns = keys
            .iter()
            .cloned()
            .chain(aggregates.iter().map(|a| a.alias.clone()))
            .collect();
        Ok(ResultTable::new(columns, rows))
    }

    /// Appends the window function's value to every row. Rows keep their
    /// input order.
    pub fn window(&self, table: ResultTable, window: &Window) -> Result<ResultTable> {
        let part_idx = window
            .partition_by
            .iter()
            .map(|k| table.column_index(k))
            .collect::<Result<Vec<_>>>()?;
        let order = sort_columns(&table, &window.order_by)?;

        let mut computed = vec![Value::Null; table.len()];
        for (_, mut members) in group_rows(&table.rows, &part_idx) {
            members.sort_by(|a, b| compare_rows(&table.rows[*a], &table.rows[*b], &order));
            match &window.function {
                WindowFn::RunningSum(expr) => {
                    let mut total = Value::Null;
                    for &i in &members {
                        let value = self.eval(expr, &table.columns, &table.rows[i])?;
                        total = accumulate(&total, &value)?;
                        computed[i] = total.clone();
                    }
                }
                WindowFn::Lag { expr, offset } | WindowFn::Lead { expr, offset } => {
                    let values = members
                        .iter()
                        .map(|&i| self.eval(expr, &table.columns, &table.rows[i]))
                        .collect::<Result<Vec<_>>>()?;
                    let lag = matches!(window.function, WindowFn::Lag { .. });
                    for (pos, &i) in members.iter().enumerate() {
                        let neighbour = if lag {
                            pos.checked_sub(*offset)
                        } else {
                            pos.checked_add(*offset)
                        };
                        computed[i] = neighbour
                            .and_then(|p| values.get(p))
                            .cloned()
                            .unwrap_or(Value::Null);
                    }
                }
            }
        }

        let ResultTable {
            mut columns,
            mut rows,
        } = table;
        for (row, value) in rows.iter_mut().zip(computed) {
            row.push(value);
        }
        columns.push(window.alias.clone());
        Ok(ResultTable::new(columns, rows))
    }

    /// Stable sort; absent values come first in ascending order.
    pub fn sort(&self, table: ResultTable, keys: &[SortKey]) -> Result<ResultTable> {
        let order = sort_columns(&table, keys)?;
        let ResultTable { columns, mut rows } = table;
        rows.sort_by(|a, b| compare_rows(a, b, &order));
        Ok(ResultTable::new(columns, rows))
    }

    pub fn limit(&self, table: ResultTable, n: &Expr) -> Result<ResultTable> {
        let n = match self.eval(n, &[], &[])? {
            Value::Int(n) if n >= 0 => n as usize,
            other => {
                return Err(Error::TypeMismatch(format!(
                    "limit must be a non-negative integer, got {other:?}"
                )));
            }
        };
        let ResultTable { columns, mut rows } = table;
        rows.truncate(n);
        Ok(ResultTable::new(columns, rows))
    }

    /// Runs `pipeline` and returns its single value.
    ///
    /// # Errors
    /// [Error::ScalarCardinality] unless the result is exactly one row of one
    /// column.
    pub fn scalar(&self, pipeline: &Pipeline) -> Result<Value> {
        let table = self.run(pipeline)?;
        if table.rows.len() != 1 || table.columns.len() != 1 {
            return Err(Error::ScalarCardinality {
                rows: table.rows.len(),
                columns: table.columns.len(),
            });
        }
        Ok(table.rows.into_iter().flatten().next().unwrap_or(Value::Null))
    }

    /// Evaluates `expr` against one row described by `columns`.
    pub fn eval(&self, expr: &Expr, columns: &[String], row: &[Value]) -> Result<Value> {
        match expr {
            Expr::Column(name) => cell(columns, row, name),
            Expr::Outer(name) => {
                let outer = self.outer.ok_or_else(|| {
                    Error::InvalidPipeline(format!("outer column {name:?} used outside a sub-query"))
                })?;
                cell(outer.columns, outer.values, name)
            }
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Param(name) => self.params.require(name).cloned(),
            Expr::Concat(parts) => {
                let mut out = String::new();
                for part in parts {
                    match self.eval(part, columns, row)? {
                        Value::Null => return Ok(Value::Null),
                        Value::Undefined => return Ok(Value::Undefined),
                        value => out.push_str(&value.to_string()),
                    }
                }
                Ok(Value::text(out))
            }
            Expr::Binary { op, left, right } => {
                let l = self.eval(left, columns, row)?;
                let r = self.eval(right, columns, row)?;
                arithmetic(*op, &l, &r)
            }
            Expr::Round { expr, scale } => {
                let value = self.eval(expr, columns, row)?;
                value
                    .round(*scale)
                    .ok_or_else(|| Error::TypeMismatch(format!("cannot round {value:?}")))
            }
            Expr::Month(expr) => match self.eval(expr, columns, row)? {
                Value::Date(d) => Ok(Value::text(d.format("%Y-%m").to_string())),
                marker @ (Value::Null | Value::Undefined) => Ok(marker),
                other => Err(Error::TypeMismatch(format!("{other:?} is not a date"))),
            },
            Expr::DaysBetween { from, to } => {
                match (self.eval(from, columns, row)?, self.eval(to, columns, row)?) {
                    (Value::Date(from), Value::Date(to)) => Ok(Value::Int((to - from).num_days())),
                    (Value::Undefined, _) | (_, Value::Undefined) => Ok(Value::Undefined),
                    (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
                    (from, to) => Err(Error::TypeMismatch(format!(
                        "days between {from:?} and {to:?}"
                    ))),
                }
            }
            Expr::Scalar(pipeline) => self
                .nested(Some(RowRef {
                    columns,
                    values: row,
                }))
                .scalar(pipeline),
        }
    }

    /// Evaluates a predicate; `None` is SQL's unknown.
    pub fn test(&self, predicate: &Predicate, columns: &[String], row: &[Value]) -> Result<Option<bool>> {
        match predicate {
            Predicate::Compare { op, left, right } => {
                let l = self.eval(left, columns, row)?;
                let r = self.eval(right, columns, row)?;
                compare(*op, &l, &r)
            }
            Predicate::Between { expr, low, high } => {
                let v = self.eval(expr, columns, row)?;
                let lo = self.eval(low, columns, row)?;
                let hi = self.eval(high, columns, row)?;
                Ok(and3(compare(CmpOp::Ge, &v, &lo)?, compare(CmpOp::Le, &v, &hi)?))
            }
            Predicate::In { expr, list } => {
                let v = self.eval(expr, columns, row)?;
                let mut unknown = false;
                for item in list {
                    let candidate = self.eval(item, columns, row)?;
                    match compare(CmpOp::Eq, &v, &candidate)? {
                        Some(true) => return Ok(Some(true)),
                        Some(false) => {}
                        None => unknown = true,
                    }
                }
                Ok(if unknown { None } else { Some(false) })
            }
            Predicate::IsNull(expr) => Ok(Some(self.eval(expr, columns, row)?.is_null())),
            Predicate::IsNotNull(expr) => Ok(Some(!self.eval(expr, columns, row)?.is_null())),
            Predicate::And(a, b) => {
                let a = self.test(a, columns, row)?;
                if a == Some(false) {
                    return Ok(a);
                }
                Ok(and3(a, self.test(b, columns, row)?))
            }
            Predicate::Or(a, b) => {
                let a = self.test(a, columns, row)?;
                if a == Some(true) {
                    return Ok(a);
                }
                Ok(or3(a, self.test(b, columns, row)?))
            }
            Predicate::Not(p) => Ok(self.test(p, columns, row)?.map(|b| !b)),
        }
    }
}

fn cell(columns: &[String], row: &[Value], name: &str) -> Result<Value> {
    let idx = resolve(columns, name)?;
    row.get(idx).cloned().ok_or_else(|| {
        Error::InvalidPipeline(format!("row has no value for column {name:?}"))
    })
}

fn check_steps(steps: &[Step]) -> Result<()> {
    let mut aggregated = false;
    for step in steps {
        match step {
            Step::Aggregate { .. } => aggregated = true,
            Step::Having(_) if !aggregated => {
                return Err(Error::InvalidPipeline(
                    "HAVING needs a preceding aggregate".into(),
                ));
            }
            _ => {}
        }
    }
    Ok(())
}

fn step_name(step: &Step) -> &'static str {
    match step {
        Step::Filter(_) => "filter",
        Step::Project(_) => "project",
        Step::Extend(_) => "extend",
        Step::Join { kind: JoinKind::Inner, .. } => "join",
        Step::Join { kind: JoinKind::Left, .. } => "left_join",
        Step::Aggregate { .. } => "aggregate",
        Step::Having(_) => "having",
        Step::Window(_) => "window",
        Step::Sort(_) => "sort",
        Step::Limit(_) => "limit",
    }
}

fn compare(op: CmpOp, left: &Value, right: &Value) -> Result<Option<bool>> {
    let marker = |v: &Value| v.is_null() || v.is_undefined();
    if marker(left) || marker(right) {
        return Ok(None);
    }
    let ord = left
        .sql_cmp(right)
        .ok_or_else(|| Error::TypeMismatch(format!("cannot compare {left:?} with {right:?}")))?;
    Ok(Some(match op {
        CmpOp::Eq => ord == Ordering::Equal,
        CmpOp::Ne => ord != Ordering::Equal,
        CmpOp::Lt => ord == Ordering::Less,
        CmpOp::Le => ord != Ordering::Greater,
        CmpOp::Gt => ord == Ordering::Greater,
        CmpOp::Ge => ord != Ordering::Less,
    }))
}

fn and3(a: Option<bool>, b: Option<bool>) -> Option<bool> {
    match (a, b) {
        (Some(false), _) | (_, Some(false)) => Some(false),
        (Some(true), Some(true)) => Some(true),
        _ => None,
    }
}

fn or3(a: Option<bool>, b: Option<bool>) -> Option<bool> {
    match (a, b) {
        (Some(true), _) | (_, Some(true)) => Some(true),
        (Some(false), Some(false)) => Some(false),
        _ => None,
    }
}

/// Grouping key: absent values group together, `Int` and `Decimal` compare
/// by value.
struct GroupKey(Vec<Value>);

impl Ord for GroupKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .iter()
            .zip(&other.0)
            .map(|(a, b)| a.total_cmp(b))
            .find(|o| *o != Ordering::Equal)
            .unwrap_or_else(|| self.0.len().cmp(&other.0.len()))
    }
}

impl PartialOrd for GroupKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for GroupKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for GroupKey {}

/// Partitions row positions by the values at `key_idx`, in order of first
/// appearance.
fn group_rows(rows: &[Vec<Value>], key_idx: &[usize]) -> Vec<(Vec<Value>, Vec<usize>)> {
    let mut index: BTreeMap<GroupKey, usize> = BTreeMap::new();
    let mut groups: Vec<(Vec<Value>, Vec<usize>)> = Vec::new();
    for (i, row) in rows.iter().enumerate() {
        let key: Vec<Value> = key_idx.iter().map(|&k| row[k].clone()).collect();
        let slot = *index.entry(GroupKey(key.clone())).or_insert_with(|| {
            groups.push((key, vec![]));
            groups.len() - 1
        });
        groups[slot].1.push(i);
    }
    groups
}

fn sort_columns(table: &ResultTable, keys: &[SortKey]) -> Result<Vec<(usize, bool)>> {
    keys.iter()
        .map(|key| Ok((table.column_index(&key.column)?, key.descending)))
        .collect()
}

fn compare_rows(a: &[Value], b: &[Value], order: &[(usize, bool)]) -> Ordering {
    for (idx, is_desc) in order {
        let mut ord = a[*idx].total_cmp(&b[*idx]);
        if *is_desc {
            ord = ord.reverse();
        }
        // if it's not equal no need to compare more
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{avg, count, count_all, max_of, min_of, sum_of};
    use crate::expr::{col, concat, days_between, lit, not, outer, param, scalar};
    use crate::schema::Entity;
    use crate::test_fixtures::{dec, shop};

    fn table(columns: &[&str], rows: Vec<Vec<Value>>) -> ResultTable {
        ResultTable::new(columns.iter().map(|c| c.to_string()).collect(), rows)
    }

    fn money(s: &str) -> Value {
        Value::Decimal(dec(s))
    }

    fn run(pipeline: Pipeline) -> Result<ResultTable> {
        let ds = Dataset::new();
        let params = Params::new();
        Engine::new(&ds, &params).run(&pipeline)
    }

    /// Groups "a", "b", "c" of sizes 1, 2 and 4.
    fn sized_groups() -> ResultTable {
        let mut rows = vec![];
        for (g, size) in [("a", 1), ("b", 2), ("c", 4)] {
            for v in 1..=size {
                rows.push(vec![Value::text(g), Value::Int(v)]);
            }
        }
        table(&["g", "v"], rows)
    }

    #[test]
    fn test_having_filters_groups_after_aggregation() {
        let result = run(Pipeline::rows(sized_groups())
            .aggregate(&["g"], vec![count_all("n")])
            .having(col("n").gt(lit(3))))
        .unwrap();

        assert_eq!(result.rows, vec![vec![Value::text("c"), Value::Int(4)]]);
    }

    #[test]
    fn test_where_filters_rows_before_aggregation() {
        let grouped = run(Pipeline::rows(sized_groups())
            .filter(col("v").gt(lit(1)))
            .aggregate(&["g"], vec![count_all("n")]))
        .unwrap();
        assert_eq!(
            grouped.rows,
            vec![
                vec![Value::text("b"), Value::Int(1)],
                vec![Value::text("c"), Value::Int(3)],
            ]
        );

        let having = run(Pipeline::rows(sized_groups())
            .filter(col("v").gt(lit(1)))
            .aggregate(&["g"], vec![count_all("n")])
            .having(col("n").gt(lit(3))))
        .unwrap();
        assert!(having.is_empty());
    }

    #[test]
    fn test_having_without_aggregate_is_rejected() {
        let err = run(Pipeline::rows(sized_groups()).having(col("v").gt(lit(1)))).unwrap_err();
        assert!(matches!(err, Error::InvalidPipeline(_)));
    }

    #[test]
    fn test_global_aggregate_over_empty_input() {
        let result = run(Pipeline::rows(table(&["x"], vec![]))
            .aggregate(&[], vec![count_all("n"), sum_of(col("x"), "total")]))
        .unwrap();
        assert_eq!(result.rows, vec![vec![Value::Int(0), Value::Null]]);
    }

    #[test]
    fn test_lag_and_growth() {
        let monthly = table(
            &["month", "revenue"],
            vec![
                vec![Value::text("2024-01"), money("100")],
                vec![Value::text("2024-02"), money("150")],
                vec![Value::text("2024-03"), money("120")],
            ],
        );
        let result = run(Pipeline::rows(monthly)
            .window(
                Window::new(WindowFn::lag(col("revenue")), "previous")
                    .order_by(vec![SortKey::asc("month")]),
            )
            .extend(vec![
                col("revenue")
                    .sub(col("previous"))
                    .div(col("previous"))
                    .mul(lit(100))
                    .round(2)
                    .alias("growth"),
            ]))
        .unwrap();

        assert_eq!(
            result.column("previous").unwrap(),
            vec![Value::Null, money("100"), money("150")]
        );
        assert_eq!(
            result.column("growth").unwrap(),
            vec![Value::Null, money("50.0"), money("-20.0")]
        );
    }

    #[test]
    fn test_lag_and_lead_with_offset() {
        let monthly = table(
            &["month", "revenue"],
            vec![
                vec![Value::text("2024-01"), money("100")],
                vec![Value::text("2024-02"), money("150")],
                vec![Value::text("2024-03"), money("120")],
            ],
        );
        let by_month = |function: WindowFn, alias: &str| {
            Window::new(function, alias).order_by(vec![SortKey::asc("month")])
        };
        let result = run(Pipeline::rows(monthly)
            .window(by_month(
                WindowFn::Lag {
                    expr: col("revenue"),
                    offset: 2,
                },
                "two_back",
            ))
            .window(by_month(
                WindowFn::Lead {
                    expr: col("revenue"),
                    offset: 2,
                },
                "two_ahead",
            )))
        .unwrap();

        assert_eq!(
            result.column("two_back").unwrap(),
            vec![Value::Null, Value::Null, money("100")]
        );
        assert_eq!(
            result.column("two_ahead").unwrap(),
            vec![money("120"), Value::Null, Value::Null]
        );
    }

    #[test]
    fn test_count_min_max_per_group() {
        let rows = table(
            &["g", "v"],
            vec![
                vec![Value::text("a"), Value::Int(1)],
                vec![Value::text("a"), Value::Null],
                vec![Value::text("b"), Value::Int(5)],
                vec![Value::text("b"), Value::Int(3)],
                vec![Value::text("b"), Value::Null],
            ],
        );
        let result = run(Pipeline::rows(rows).aggregate(
            &["g"],
            vec![
                count_all("n"),
                count(col("v"), "counted"),
                min_of(col("v"), "lo"),
                max_of(col("v"), "hi"),
            ],
        ))
        .unwrap();

        assert_eq!(result.columns, vec!["g", "n", "counted", "lo", "hi"]);
        assert_eq!(
            result.rows,
            vec![
                vec![Value::text("a"), Value::Int(2), Value::Int(1), Value::Int(1), Value::Int(1)],
                vec![Value::text("b"), Value::Int(3), Value::Int(2), Value::Int(3), Value::Int(5)],
            ]
        );
    }

    #[test]
    fn test_rows_narrower_than_columns_are_rejected() {
        let short = ResultTable::new(
            vec!["a".into(), "b".into()],
            vec![vec![Value::Int(1), Value::Int(2)], vec![Value::Int(3)]],
        );
        assert!(matches!(
            run(Pipeline::rows(short.clone()).project(vec![col("b").alias("b")])),
            Err(Error::InvalidPipeline(_))
        ));

        let ds = Dataset::new();
        let params = Params::new();
        let mut engine = Engine::new(&ds, &params);
        engine.bind("short", short);
        assert!(matches!(
            engine.run(&Pipeline::binding("short", None)),
            Err(Error::InvalidPipeline(_))
        ));
    }

    #[test]
    fn test_window_partitions_keep_row_order() {
        let rows = table(
            &["who", "day", "amount"],
            vec![
                vec![Value::text("x"), Value::Int(2), Value::Int(5)],
                vec![Value::text("y"), Value::Int(1), Value::Int(7)],
                vec![Value::text("x"), Value::Int(1), Value::Int(3)],
                vec![Value::text("x"), Value::Int(3), Value::Null],
            ],
        );
        let result = run(Pipeline::rows(rows.clone()).window(
            Window::new(WindowFn::RunningSum(col("amount")), "running")
                .partition_by(&["who"])
                .order_by(vec![SortKey::asc("day")]),
        ))
        .unwrap();
        assert_eq!(
            result.column("running").unwrap(),
            vec![Value::Int(8), Value::Int(7), Value::Int(3), Value::Int(8)]
        );

        let lead = run(Pipeline::rows(rows).window(
            Window::new(WindowFn::lead(col("day")), "next_day")
                .partition_by(&["who"])
                .order_by(vec![SortKey::asc("day")]),
        ))
        .unwrap();
        assert_eq!(
            lead.column("next_day").unwrap(),
            vec![Value::Int(3), Value::Null, Value::Int(2), Value::Null]
        );
    }

    #[test]
    fn test_scalar_subquery_cardinality() {
        let spend = table(
            &["customer", "total"],
            vec![
                vec![Value::Int(1), money("10")],
                vec![Value::Int(1), money("30")],
                vec![Value::Int(2), money("50")],
            ],
        );

        let above_average = Pipeline::rows(spend.clone())
            .filter(col("total").gt(scalar(
                Pipeline::rows(spend.clone()).aggregate(&[], vec![avg(col("total"), "avg")]),
            )));
        let result = run(above_average).unwrap();
        assert_eq!(result.column("total").unwrap(), vec![money("50")]);

        let per_customer = Pipeline::rows(spend.clone())
            .filter(col("total").gt(scalar(
                Pipeline::rows(spend.clone()).aggregate(&["customer"], vec![avg(col("total"), "avg")]),
            )));
        assert!(matches!(
            run(per_customer).unwrap_err(),
            Error::ScalarCardinality { rows: 2, columns: 2 }
        ));

        let nothing = Pipeline::rows(spend.clone()).filter(col("total").gt(scalar(
            Pipeline::rows(spend).filter(col("customer").eq(lit(9))).project(vec![col("total").alias("t")]),
        )));
        assert!(matches!(
            run(nothing).unwrap_err(),
            Error::ScalarCardinality { rows: 0, columns: 1 }
        ));
    }

    #[test]
    fn test_correlated_subquery_sees_outer_row() {
        let spend = table(
            &["city", "total"],
            vec![
                vec![Value::text("Austin"), money("10")],
                vec![Value::text("Austin"), money("30")],
                vec![Value::text("Boise"), money("50")],
                vec![Value::text("Boise"), money("70")],
            ],
        );
        let result = run(Pipeline::rows(spend.clone()).filter(col("total").gt(scalar(
            Pipeline::rows(spend)
                .filter(col("city").eq(outer("city")))
                .aggregate(&[], vec![avg(col("total"), "avg")]),
        ))))
        .unwrap();
        assert_eq!(result.column("total").unwrap(), vec![money("30"), money("70")]);

        assert!(matches!(
            run(Pipeline::rows(table(&["a"], vec![vec![Value::Int(1)]])).project(vec![outer("a").alias("a")])),
            Err(Error::InvalidPipeline(_))
        ));
    }

    #[test]
    fn test_left_join_keeps_unmatched_rows() {
        let products = table(&["id"], vec![vec![Value::Int(1)], vec![Value::Int(2)]]);
        let items = table(
            &["product_id"],
            vec![vec![Value::Int(1)], vec![Value::Int(1)]],
        );
        let joined = run(Pipeline::rows(products.clone()).left_join(Pipeline::rows(items.clone()), &[("id", "product_id")])).unwrap();
        assert_eq!(joined.len(), 3);
        assert_eq!(joined.rows[2], vec![Value::Int(2), Value::Null]);

        let inner = run(Pipeline::rows(products).join(Pipeline::rows(items), &[("id", "product_id")])).unwrap();
        assert_eq!(inner.len(), 2);
    }

    #[test]
    fn test_self_join_over_dataset() {
        let ds = shop();
        let params = Params::new();
        let pairs = Engine::new(&ds, &params)
            .run(
                &Pipeline::scan(Entity::Customer, "a")
                    .join(Pipeline::scan(Entity::Customer, "b"), &[("a.city", "b.city")])
                    .filter(col("a.customer_id").lt(col("b.customer_id")))
                    .project(vec![
                        col("a.customer_id").alias("first"),
                        col("b.customer_id").alias("second"),
                    ]),
            )
            .unwrap();
        assert_eq!(pairs.rows, vec![vec![Value::Int(1), Value::Int(3)]]);
    }

    #[test]
    fn test_predicates() {
        let rows = table(
            &["n", "s"],
            vec![
                vec![Value::Int(1), Value::text("shipped")],
                vec![Value::Int(5), Value::Null],
                vec![Value::Int(9), Value::text("completed")],
            ],
        );
        let pick = |p: Predicate| {
            run(Pipeline::rows(rows.clone()).filter(p))
                .unwrap()
                .column("n")
                .unwrap()
        };

        assert_eq!(pick(col("n").between(lit(1), lit(5))), vec![Value::Int(1), Value::Int(5)]);
        assert_eq!(
            pick(col("s").is_in(vec![lit("shipped"), lit("processing")])),
            vec![Value::Int(1)]
        );
        assert_eq!(pick(col("s").is_null()), vec![Value::Int(5)]);
        assert_eq!(pick(col("s").is_not_null()), vec![Value::Int(1), Value::Int(9)]);
        assert_eq!(pick(not(col("s").eq(lit("shipped")))), vec![Value::Int(9)]);
        assert_eq!(
            pick(col("s").eq(lit("shipped")).or(col("n").ge(lit(9)))),
            vec![Value::Int(1), Value::Int(9)]
        );
        assert!(run(Pipeline::rows(rows).filter(col("s").gt(lit(1)))).is_err());
    }

    #[test]
    fn test_projection_expressions() {
        let rows = table(
            &["first", "last", "price", "cost", "d1", "d2"],
            vec![vec![
                Value::text("Ann"),
                Value::text("Lee"),
                money("0"),
                money("1.005"),
                Value::Date(crate::test_fixtures::date("2024-01-30")),
                Value::Date(crate::test_fixtures::date("2024-03-01")),
            ]],
        );
        let result = run(Pipeline::rows(rows).project(vec![
            concat(vec![col("first"), lit(" "), col("last")]).alias("name"),
            col("cost").round(2).alias("cost"),
            col("price").sub(col("cost")).div(col("price")).alias("margin"),
            col("d1").month().alias("month"),
            days_between(col("d1"), col("d2")).alias("days"),
        ]))
        .unwrap();

        assert_eq!(
            result.rows[0],
            vec![
                Value::text("Ann Lee"),
                money("1.01"),
                Value::Undefined,
                Value::text("2024-01"),
                Value::Int(31),
            ]
        );
    }

    #[test]
    fn test_sort_is_stable_and_limit_reads_params() {
        let rows = table(
            &["k", "tag"],
            vec![
                vec![Value::Int(2), Value::text("a")],
                vec![Value::Null, Value::text("b")],
                vec![Value::Int(1), Value::text("c")],
                vec![Value::Int(2), Value::text("d")],
            ],
        );
        let asc = run(Pipeline::rows(rows.clone()).sort(vec![SortKey::asc("k")])).unwrap();
        assert_eq!(
            asc.column("tag").unwrap(),
            vec![Value::text("b"), Value::text("c"), Value::text("a"), Value::text("d")]
        );

        let ds = Dataset::new();
        let params = Params::new().set("top", 2);
        let engine = Engine::new(&ds, &params);
        let top = engine
            .run(&Pipeline::rows(rows.clone()).sort(vec![SortKey::desc("k")]).limit_by(param("top")))
            .unwrap();
        assert_eq!(top.column("tag").unwrap(), vec![Value::text("a"), Value::text("d")]);

        assert!(engine.run(&Pipeline::rows(rows.clone()).limit(-1)).is_err());
        assert!(matches!(
            engine.run(&Pipeline::rows(rows).limit_by(param("missing"))),
            Err(Error::MissingParameter(_))
        ));
    }

    #[test]
    fn test_ctes_and_bindings() {
        let ds = shop();
        let params = Params::new();
        let mut engine = Engine::new(&ds, &params);
        engine.bind("seed", table(&["x"], vec![vec![Value::Int(4)]]));

        let pipeline = Pipeline::binding("per_city", Some("t"))
            .with(
                "per_city",
                Pipeline::scan(Entity::Customer, "c").aggregate(&["c.city"], vec![count_all("n")]),
            )
            .filter(col("t.n").ge(scalar(Pipeline::binding("seed", None).project(vec![
                col("x").sub(lit(2)).alias("min"),
            ]))))
            .project(vec![col("t.city").alias("city")]);
        let result = engine.run(&pipeline).unwrap();
        assert_eq!(result.column("city").unwrap(), vec![Value::text("Chicago")]);

        assert!(matches!(
            engine.run(&Pipeline::binding("nope", None)),
            Err(Error::UnknownBinding(_))
        ));
    }
}
