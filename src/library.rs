//! The catalogue of named analytical queries.
//!
//! Each entry is a [Pipeline] plus the parameters it reads. Revenue always
//! means `quantity * unit_price` over items of completed orders, so prices
//! are the ones paid at the time of purchase.

use tracing::{info, instrument};

use crate::aggregate::{avg, count_all, sum_of};
use crate::dataset::Dataset;
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::expr::{Expr, col, concat, days_between, lit, outer, param, scalar};
use crate::params::Params;
use crate::pipeline::{Pipeline, SortKey, Window, WindowFn};
use crate::result::ResultTable;
use crate::schema::Entity;
use crate::value::{MONEY_SCALE, Value};

/// A parameter a query reads, with the value used when the caller omits it.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub default: Option<Value>,
}

impl ParamSpec {
    fn required(name: &'static str) -> Self {
        Self { name, default: None }
    }

    fn with_default(name: &'static str, default: impl Into<Value>) -> Self {
        Self {
            name,
            default: Some(default.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NamedQuery {
    pub name: &'static str,
    pub description: &'static str,
    pub params: Vec<ParamSpec>,
    pub pipeline: Pipeline,
}

impl NamedQuery {
    fn new(name: &'static str, description: &'static str, pipeline: Pipeline) -> Self {
        Self {
            name,
            description,
            params: vec![],
            pipeline,
        }
    }

    fn param(mut self, spec: ParamSpec) -> Self {
        self.params.push(spec);
        self
    }

    /// Fills in defaults for the parameters the caller left out.
    fn resolve_params(&self, params: &Params) -> Result<Params> {
        let mut resolved = params.clone();
        for spec in &self.params {
            if resolved.contains(spec.name) {
                continue;
            }
            match &spec.default {
                Some(default) => resolved = resolved.set(spec.name, default.clone()),
                None => return Err(Error::MissingParameter(spec.name.to_string())),
            }
        }
        Ok(resolved)
    }
}

#[derive(Debug, Clone)]
pub struct Library {
    queries: Vec<NamedQuery>,
}

impl Library {
    /// The built-in queries.
    pub fn standard() -> Self {
        let queries = vec![
            NamedQuery::new(
                "customers_per_city",
                "Number of customers per city, most first",
                customers_per_city(),
            ),
            NamedQuery::new(
                "product_profit_margins",
                "Profit and profit percentage per product, best margin first",
                product_profit_margins(),
            ),
            NamedQuery::new(
                "recent_orders",
                "Most recent orders with the customer's name",
                recent_orders(),
            )
            .param(ParamSpec::with_default("limit", 10)),
            NamedQuery::new(
                "total_revenue",
                "Revenue over all completed orders",
                total_revenue(),
            ),
            NamedQuery::new(
                "revenue_between",
                "Completed revenue for orders placed between start and end, inclusive",
                revenue_between(),
            )
            .param(ParamSpec::required("start"))
            .param(ParamSpec::required("end")),
            NamedQuery::new(
                "monthly_revenue",
                "Completed revenue per month",
                monthly_revenue(),
            ),
            NamedQuery::new(
                "cumulative_monthly_revenue",
                "Completed revenue per month with its running total",
                cumulative_monthly_revenue(),
            ),
            NamedQuery::new(
                "monthly_revenue_growth",
                "Month over month revenue growth in percent",
                monthly_revenue_growth(),
            ),
            NamedQuery::new(
                "top_products",
                "Best selling products by revenue",
                top_products(),
            )
            .param(ParamSpec::with_default("limit", 10)),
            NamedQuery::new(
                "category_performance",
                "Completed revenue per product category",
                category_performance(),
            ),
            NamedQuery::new(
                "city_average_order_value",
                "Average order value per city beside the overall average",
                city_average_order_value(),
            ),
            NamedQuery::new(
                "orders_above_city_average",
                "Orders worth more than the average order of their customer's city",
                orders_above_city_average(),
            ),
            NamedQuery::new(
                "orders_above_average_spend",
                "Orders worth more than the average order",
                orders_above_average_spend(),
            ),
            NamedQuery::new(
                "top_customers_by_average_order",
                "Customers with at least min_orders orders, by average order value",
                top_customers_by_average_order(),
            )
            .param(ParamSpec::with_default("min_orders", 2))
            .param(ParamSpec::with_default("limit", 10)),
            NamedQuery::new(
                "never_ordered_products",
                "Products that appear on no order",
                never_ordered_products(),
            ),
            NamedQuery::new(
                "open_orders",
                "Orders still processing or shipped",
                open_orders(),
            ),
            NamedQuery::new(
                "days_between_orders",
                "Days since each customer's previous order",
                days_between_orders(),
            ),
            NamedQuery::new(
                "same_city_customers",
                "Pairs of customers living in the same city",
                same_city_customers(),
            ),
        ];
        Self { queries }
    }

    /// # Errors
    /// [Error::UnknownQuery] when no entry has this name.
    pub fn get(&self, name: &str) -> Result<&NamedQuery> {
        self.queries
            .iter()
            .find(|q| q.name == name)
            .ok_or_else(|| Error::UnknownQuery(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.queries.iter().map(|q| q.name)
    }

    /// Runs the named query over `dataset`.
    ///
    /// Parameters the caller omits take the entry's default; a required one
    /// that is missing fails with [Error::MissingParameter].
    #[instrument(skip(self, dataset, params))]
    pub fn run(&self, name: &str, dataset: &Dataset, params: &Params) -> Result<ResultTable> {
        let query = self.get(name)?;
        let params = query.resolve_params(params)?;
        let result = Engine::new(dataset, &params).run(&query.pipeline)?;
        info!(rows = result.len(), "query finished");
        Ok(result)
    }
}

impl Default for Library {
    fn default() -> Self {
        Self::standard()
    }
}

fn money(expr: Expr) -> Expr {
    expr.round(MONEY_SCALE)
}

/// `(part - base) / base * 100`, rounded for display.
fn percent_change(part: Expr, base: Expr) -> Expr {
    money(part.sub(base.clone()).div(base).mul(lit(100)))
}

fn full_name(alias: &str) -> Expr {
    concat(vec![
        col(&format!("{alias}.first_name")),
        lit(" "),
        col(&format!("{alias}.last_name")),
    ])
}

/// Items of completed orders, each with its `line_total`.
fn completed_lines() -> Pipeline {
    Pipeline::scan(Entity::Order, "o")
        .join(Pipeline::scan(Entity::OrderItem, "oi"), &[("o.order_id", "oi.order_id")])
        .filter(col("o.status").eq(lit("completed")))
        .extend(vec![col("oi.quantity").mul(col("oi.unit_price")).alias("line_total")])
}

/// One row per completed order: its total and the customer's name and city.
fn order_totals() -> Pipeline {
    completed_lines()
        .aggregate(&["o.order_id", "o.customer_id"], vec![sum_of(col("line_total"), "order_total")])
        .join(Pipeline::scan(Entity::Customer, "c"), &[("o.customer_id", "c.customer_id")])
        .project(vec![
            col("o.order_id").alias("order_id"),
            col("o.customer_id").alias("customer_id"),
            full_name("c").alias("customer_name"),
            col("c.city").alias("city"),
            col("order_total").alias("order_total"),
        ])
}

/// Average over every completed order, as a one-cell pipeline.
fn overall_average_order() -> Pipeline {
    Pipeline::binding("order_totals", None)
        .aggregate(&[], vec![avg(col("order_total"), "average")])
}

fn customers_per_city() -> Pipeline {
    Pipeline::scan(Entity::Customer, "c")
        .aggregate(&["c.city"], vec![count_all("customer_count")])
        .project(vec![
            col("c.city").alias("city"),
            col("customer_count").alias("customer_count"),
        ])
        .sort(vec![SortKey::desc("customer_count")])
}

fn product_profit_margins() -> Pipeline {
    let profit = || col("p.price").sub(col("p.cost"));
    Pipeline::scan(Entity::Product, "p")
        .project(vec![
            col("p.product_name").alias("product_name"),
            col("p.category").alias("category"),
            col("p.price").alias("price"),
            col("p.cost").alias("cost"),
            money(profit()).alias("profit"),
            money(profit().div(col("p.price")).mul(lit(100))).alias("profit_percentage"),
        ])
        .sort(vec![SortKey::desc("profit_percentage")])
}

fn recent_orders() -> Pipeline {
    Pipeline::scan(Entity::Order, "o")
        .join(Pipeline::scan(Entity::Customer, "c"), &[("o.customer_id", "c.customer_id")])
        .project(vec![
            col("o.order_id").alias("order_id"),
            col("o.order_date").alias("order_date"),
            full_name("c").alias("customer_name"),
            col("o.status").alias("status"),
        ])
        .sort(vec![SortKey::desc("order_date")])
        .limit_by(param("limit"))
}

fn total_revenue() -> Pipeline {
    completed_lines()
        .aggregate(&[], vec![sum_of(col("line_total"), "revenue")])
        .project(vec![money(col("revenue")).alias("total_revenue")])
}

fn revenue_between() -> Pipeline {
    completed_lines()
        .filter(col("o.order_date").between(param("start"), param("end")))
        .aggregate(&[], vec![sum_of(col("line_total"), "revenue")])
        .project(vec![money(col("revenue")).alias("revenue")])
}

fn monthly_revenue() -> Pipeline {
    completed_lines()
        .extend(vec![col("o.order_date").month().alias("month")])
        .aggregate(&["month"], vec![sum_of(col("line_total"), "revenue")])
        .project(vec![
            col("month").alias("month"),
            money(col("revenue")).alias("monthly_revenue"),
        ])
        .sort(vec![SortKey::asc("month")])
}

fn cumulative_monthly_revenue() -> Pipeline {
    monthly_revenue().window(
        Window::new(WindowFn::RunningSum(col("monthly_revenue")), "cumulative_revenue")
            .order_by(vec![SortKey::asc("month")]),
    )
}

fn monthly_revenue_growth() -> Pipeline {
    Pipeline::binding("monthly", Some("m"))
        .with("monthly", monthly_revenue())
        .window(
            Window::new(WindowFn::lag(col("m.monthly_revenue")), "previous_month_revenue")
                .order_by(vec![SortKey::asc("m.month")]),
        )
        .project(vec![
            col("m.month").alias("month"),
            col("m.monthly_revenue").alias("revenue"),
            col("previous_month_revenue").alias("previous_month_revenue"),
            percent_change(col("m.monthly_revenue"), col("previous_month_revenue"))
                .alias("growth_percentage"),
        ])
}

/// Completed lines joined with their product.
fn product_lines() -> Pipeline {
    completed_lines().join(
        Pipeline::scan(Entity::Product, "p"),
        &[("oi.product_id", "p.product_id")],
    )
}

fn top_products() -> Pipeline {
    product_lines()
        .aggregate(
            &["p.product_id", "p.product_name", "p.category"],
            vec![
                sum_of(col("oi.quantity"), "total_quantity_sold"),
                sum_of(col("line_total"), "revenue"),
            ],
        )
        .project(vec![
            col("p.product_name").alias("product_name"),
            col("p.category").alias("category"),
            col("total_quantity_sold").alias("total_quantity_sold"),
            money(col("revenue")).alias("total_revenue"),
        ])
        .sort(vec![SortKey::desc("total_revenue")])
        .limit_by(param("limit"))
}

fn category_performance() -> Pipeline {
    product_lines()
        .aggregate(&["p.category"], vec![sum_of(col("line_total"), "revenue")])
        .project(vec![
            col("p.category").alias("category"),
            money(col("revenue")).alias("total_revenue"),
        ])
        .sort(vec![SortKey::desc("total_revenue")])
}

fn city_average_order_value() -> Pipeline {
    Pipeline::binding("order_totals", Some("t"))
        .with("order_totals", order_totals())
        .aggregate(
            &["t.city"],
            vec![count_all("order_count"), avg(col("t.order_total"), "average")],
        )
        .project(vec![
            col("t.city").alias("city"),
            col("order_count").alias("order_count"),
            money(col("average")).alias("average_order_value"),
            money(scalar(overall_average_order())).alias("overall_average_order_value"),
        ])
        .sort(vec![SortKey::desc("average_order_value")])
}

fn orders_above_city_average() -> Pipeline {
    let city_average = Pipeline::binding("order_totals", Some("u"))
        .filter(col("u.city").eq(outer("t.city")))
        .aggregate(&[], vec![avg(col("u.order_total"), "average")]);
    Pipeline::binding("order_totals", Some("t"))
        .with("order_totals", order_totals())
        .extend(vec![scalar(city_average).alias("city_average")])
        .filter(col("t.order_total").gt(col("city_average")))
        .project(vec![
            col("t.order_id").alias("order_id"),
            col("t.customer_name").alias("customer_name"),
            col("t.city").alias("city"),
            money(col("t.order_total")).alias("order_total"),
            money(col("city_average")).alias("city_average"),
        ])
        .sort(vec![SortKey::asc("city"), SortKey::desc("order_total")])
}

fn orders_above_average_spend() -> Pipeline {
    Pipeline::binding("order_totals", Some("t"))
        .with("order_totals", order_totals())
        .filter(col("t.order_total").gt(scalar(overall_average_order())))
        .project(vec![
            col("t.order_id").alias("order_id"),
            col("t.customer_name").alias("customer_name"),
            money(col("t.order_total")).alias("order_total"),
        ])
        .sort(vec![SortKey::desc("order_total")])
}

fn top_customers_by_average_order() -> Pipeline {
    Pipeline::binding("order_totals", Some("t"))
        .with("order_totals", order_totals())
        .aggregate(
            &["t.customer_id", "t.customer_name"],
            vec![count_all("order_count"), avg(col("t.order_total"), "average")],
        )
        .having(col("order_count").ge(param("min_orders")))
        .project(vec![
            col("t.customer_id").alias("customer_id"),
            col("t.customer_name").alias("customer_name"),
            col("order_count").alias("order_count"),
            money(col("average")).alias("average_order_value"),
        ])
        .sort(vec![SortKey::desc("average_order_value")])
        .limit_by(param("limit"))
}

fn never_ordered_products() -> Pipeline {
    Pipeline::scan(Entity::Product, "p")
        .left_join(
            Pipeline::scan(Entity::OrderItem, "oi"),
            &[("p.product_id", "oi.product_id")],
        )
        .filter(col("oi.order_item_id").is_null())
        .project(vec![
            col("p.product_id").alias("product_id"),
            col("p.product_name").alias("product_name"),
            col("p.category").alias("category"),
        ])
}

fn open_orders() -> Pipeline {
    Pipeline::scan(Entity::Order, "o")
        .filter(col("o.status").is_in(vec![lit("processing"), lit("shipped")]))
        .join(Pipeline::scan(Entity::Customer, "c"), &[("o.customer_id", "c.customer_id")])
        .project(vec![
            col("o.order_id").alias("order_id"),
            col("o.order_date").alias("order_date"),
            full_name("c").alias("customer_name"),
            col("o.status").alias("status"),
        ])
        .sort(vec![SortKey::asc("order_date")])
}

fn days_between_orders() -> Pipeline {
    Pipeline::scan(Entity::Order, "o")
        .window(
            Window::new(WindowFn::lag(col("o.order_date")), "previous_order_date")
                .partition_by(&["o.customer_id"])
                .order_by(vec![SortKey::asc("o.order_date")]),
        )
        .project(vec![
            col("o.customer_id").alias("customer_id"),
            col("o.order_id").alias("order_id"),
            col("o.order_date").alias("order_date"),
            col("previous_order_date").alias("previous_order_date"),
            days_between(col("previous_order_date"), col("o.order_date")).alias("days_since_previous"),
        ])
        .sort(vec![SortKey::asc("customer_id"), SortKey::asc("order_date")])
}

fn same_city_customers() -> Pipeline {
    Pipeline::scan(Entity::Customer, "a")
        .join(Pipeline::scan(Entity::Customer, "b"), &[("a.city", "b.city")])
        .filter(col("a.customer_id").lt(col("b.customer_id")))
        .project(vec![
            col("a.city").alias("city"),
            full_name("a").alias("customer"),
            full_name("b").alias("neighbour"),
        ])
        .sort(vec![SortKey::asc("city")])
}
