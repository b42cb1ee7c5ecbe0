//! The four entities of the shop, their column layout and their integrity
//! rules.

use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::data_type::DataType;
use crate::dataset::Dataset;
use crate::error::{ConstraintViolation, Error, Result, Rule};
use crate::table::{ColumnDef, Schema};
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Entity {
    Customer,
    Product,
    Order,
    OrderItem,
}

impl Entity {
    pub const ALL: [Entity; 4] = [
        Entity::Customer,
        Entity::Product,
        Entity::Order,
        Entity::OrderItem,
    ];

    pub fn table_name(self) -> &'static str {
        match self {
            Entity::Customer => "customers",
            Entity::Product => "products",
            Entity::Order => "orders",
            Entity::OrderItem => "order_items",
        }
    }

    pub fn schema(self) -> Schema {
        let columns = match self {
            Entity::Customer => vec![
                ColumnDef::required("customer_id", DataType::Int),
                ColumnDef::required("first_name", DataType::Text),
                ColumnDef::required("last_name", DataType::Text),
                ColumnDef::optional("email", DataType::Text).unique(),
                ColumnDef::optional("signup_date", DataType::Date),
                ColumnDef::optional("city", DataType::Text),
                ColumnDef::optional("country", DataType::Text),
            ],
            Entity::Product => vec![
                ColumnDef::required("product_id", DataType::Int),
                ColumnDef::required("product_name", DataType::Text),
                ColumnDef::optional("category", DataType::Text),
                ColumnDef::required("price", DataType::Decimal),
                ColumnDef::required("cost", DataType::Decimal),
            ],
            Entity::Order => vec![
                ColumnDef::required("order_id", DataType::Int),
                ColumnDef::required("customer_id", DataType::Int),
                ColumnDef::required("order_date", DataType::Date),
                ColumnDef::required("status", DataType::Text),
            ],
            Entity::OrderItem => vec![
                ColumnDef::required("order_item_id", DataType::Int),
                ColumnDef::required("order_id", DataType::Int),
                ColumnDef::required("product_id", DataType::Int),
                ColumnDef::required("quantity", DataType::Int),
                ColumnDef::required("unit_price", DataType::Decimal),
            ],
        };
        Schema { columns }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Entity::Customer => "customer",
            Entity::Product => "product",
            Entity::Order => "order",
            Entity::OrderItem => "order item",
        };
        f.write_str(name)
    }
}

/// A typed record of one entity.
pub trait Record: Sized {
    const ENTITY: Entity;

    fn id(&self) -> i64;

    /// Values in the column order of [Entity::schema].
    fn to_row(&self) -> Vec<Value>;

    fn from_row(row: Vec<Value>) -> Result<Self>;

    /// Checks the record against the integrity rules and the current content
    /// of `dataset`. Has no side effects.
    fn check(&self, dataset: &Dataset) -> std::result::Result<(), ConstraintViolation>;
}

/// Order status. Unknown statuses are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OrderStatus {
    Processing,
    Shipped,
    Completed,
    Cancelled,
    Other(String),
}

impl OrderStatus {
    pub fn as_str(&self) -> &str {
        match self {
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Other(s) => s,
        }
    }
}

impl From<&str> for OrderStatus {
    fn from(s: &str) -> Self {
        match s {
            "processing" => OrderStatus::Processing,
            "shipped" => OrderStatus::Shipped,
            "completed" => OrderStatus::Completed,
            "cancelled" => OrderStatus::Cancelled,
            other => OrderStatus::Other(other.to_string()),
        }
    }
}

impl From<String> for OrderStatus {
    fn from(s: String) -> Self {
        OrderStatus::from(s.as_str())
    }
}

impl From<OrderStatus> for String {
    fn from(status: OrderStatus) -> Self {
        status.as_str().to_string()
    }
}

/// Serialised with the table's column names; the short `id`/`name` keys are
/// accepted on input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    #[serde(rename = "customer_id", alias = "id")]
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub signup_date: Option<NaiveDate>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    #[serde(rename = "product_id", alias = "id")]
    pub id: i64,
    #[serde(rename = "product_name", alias = "name")]
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    pub price: Decimal,
    pub cost: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    #[serde(rename = "order_id", alias = "id")]
    pub id: i64,
    pub customer_id: i64,
    pub order_date: NaiveDate,
    pub status: OrderStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    #[serde(rename = "order_item_id", alias = "id")]
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    pub quantity: i64,
    /// Price paid per unit, copied from the product when the order was placed.
    pub unit_price: Decimal,
}

impl OrderItem {
    /// Builds an item that snapshots the product's current price.
    pub fn priced_from(id: i64, order_id: i64, product: &Product, quantity: i64) -> Self {
        Self {
            id,
            order_id,
            product_id: product.id,
            quantity,
            unit_price: product.price,
        }
    }
}

// Row decoding helpers. Rows come out of typed columns, so a mismatch here
// means the table and the record layout disagree.

fn take_int(row: &[Value], idx: usize) -> Result<i64> {
    row.get(idx)
        .and_then(Value::as_int)
        .ok_or_else(|| decode_error(idx))
}

fn take_decimal(row: &[Value], idx: usize) -> Result<Decimal> {
    match row.get(idx) {
        Some(Value::Decimal(d)) => Ok(*d),
        _ => Err(decode_error(idx)),
    }
}

fn take_text(row: &[Value], idx: usize) -> Result<String> {
    row.get(idx)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| decode_error(idx))
}

fn take_opt_text(row: &[Value], idx: usize) -> Result<Option<String>> {
    match row.get(idx) {
        Some(Value::Null) => Ok(None),
        _ => take_text(row, idx).map(Some),
    }
}

fn take_date(row: &[Value], idx: usize) -> Result<NaiveDate> {
    row.get(idx)
        .and_then(Value::as_date)
        .ok_or_else(|| decode_error(idx))
}

fn take_opt_date(row: &[Value], idx: usize) -> Result<Option<NaiveDate>> {
    match row.get(idx) {
        Some(Value::Null) => Ok(None),
        _ => take_date(row, idx).map(Some),
    }
}

fn decode_error(idx: usize) -> Error {
    Error::Storage(format!("cannot decode column {idx} of stored row"))
}

fn ensure_new<R: Record>(record: &R, dataset: &Dataset) -> std::result::Result<(), ConstraintViolation> {
    if dataset.contains(R::ENTITY, record.id()) {
        return Err(ConstraintViolation::new(R::ENTITY, record.id(), Rule::DuplicateKey));
    }
    Ok(())
}

fn ensure_ref<R: Record>(
    record: &R,
    dataset: &Dataset,
    field: &'static str,
    references: Entity,
    id: i64,
) -> std::result::Result<(), ConstraintViolation> {
    if !dataset.contains(references, id) {
        return Err(ConstraintViolation::new(
            R::ENTITY,
            record.id(),
            Rule::MissingForeignKey { field, references },
        ));
    }
    Ok(())
}

fn ensure<R: Record>(
    record: &R,
    ok: bool,
    field: &'static str,
    reason: &'static str,
) -> std::result::Result<(), ConstraintViolation> {
    if ok {
        return Ok(());
    }
    Err(ConstraintViolation::new(
        R::ENTITY,
        record.id(),
        Rule::InvalidField { field, reason },
    ))
}

impl Record for Customer {
    const ENTITY: Entity = Entity::Customer;

    fn id(&self) -> i64 {
        self.id
    }

    fn to_row(&self) -> Vec<Value> {
        vec![
            Value::Int(self.id),
            Value::text(&self.first_name),
            Value::text(&self.last_name),
            self.email.as_deref().into(),
            self.signup_date.into(),
            self.city.as_deref().into(),
            self.country.as_deref().into(),
        ]
    }

    fn from_row(row: Vec<Value>) -> Result<Self> {
        Ok(Self {
            id: take_int(&row, 0)?,
            first_name: take_text(&row, 1)?,
            last_name: take_text(&row, 2)?,
            email: take_opt_text(&row, 3)?,
            signup_date: take_opt_date(&row, 4)?,
            city: take_opt_text(&row, 5)?,
            country: take_opt_text(&row, 6)?,
        })
    }

    fn check(&self, dataset: &Dataset) -> std::result::Result<(), ConstraintViolation> {
        ensure_new(self, dataset)?;
        ensure(self, !self.first_name.trim().is_empty(), "first_name", "must not be empty")?;
        ensure(self, !self.last_name.trim().is_empty(), "last_name", "must not be empty")?;
        if let Some(email) = &self.email
            && dataset
                .table(Entity::Customer)
                .find_unique("email", email)
                .is_some()
        {
            return Err(ConstraintViolation::new(
                Entity::Customer,
                self.id,
                Rule::DuplicateUniqueField { field: "email" },
            ));
        }
        Ok(())
    }
}

impl Record for Product {
    const ENTITY: Entity = Entity::Product;

    fn id(&self) -> i64 {
        self.id
    }

    fn to_row(&self) -> Vec<Value> {
        vec![
            Value::Int(self.id),
            Value::text(&self.name),
            self.category.as_deref().into(),
            Value::Decimal(self.price),
            Value::Decimal(self.cost),
        ]
    }

    fn from_row(row: Vec<Value>) -> Result<Self> {
        Ok(Self {
            id: take_int(&row, 0)?,
            name: take_text(&row, 1)?,
            category: take_opt_text(&row, 2)?,
            price: take_decimal(&row, 3)?,
            cost: take_decimal(&row, 4)?,
        })
    }

    fn check(&self, dataset: &Dataset) -> std::result::Result<(), ConstraintViolation> {
        ensure_new(self, dataset)?;
        ensure(self, !self.name.trim().is_empty(), "product_name", "must not be empty")?;
        ensure(self, !self.price.is_sign_negative(), "price", "must not be negative")?;
        ensure(self, !self.cost.is_sign_negative(), "cost", "must not be negative")
    }
}

impl Record for Order {
    const ENTITY: Entity = Entity::Order;

    fn id(&self) -> i64 {
        self.id
    }

    fn to_row(&self) -> Vec<Value> {
        vec![
            Value::Int(self.id),
            Value::Int(self.customer_id),
            Value::Date(self.order_date),
            Value::text(self.status.as_str()),
        ]
    }

    fn from_row(row: Vec<Value>) -> Result<Self> {
        Ok(Self {
            id: take_int(&row, 0)?,
            customer_id: take_int(&row, 1)?,
            order_date: take_date(&row, 2)?,
            status: OrderStatus::from(take_text(&row, 3)?),
        })
    }

    fn check(&self, dataset: &Dataset) -> std::result::Result<(), ConstraintViolation> {
        ensure_new(self, dataset)?;
        ensure(self, !self.status.as_str().is_empty(), "status", "must not be empty")?;
        ensure_ref(self, dataset, "customer_id", Entity::Customer, self.customer_id)
    }
}

impl Record for OrderItem {
    const ENTITY: Entity = Entity::OrderItem;

    fn id(&self) -> i64 {
        self.id
    }

    fn to_row(&self) -> Vec<Value> {
        vec![
            Value::Int(self.id),
            Value::Int(self.order_id),
            Value::Int(self.product_id),
            Value::Int(self.quantity),
            Value::Decimal(self.unit_price),
        ]
    }

    fn from_row(row: Vec<Value>) -> Result<Self> {
        Ok(Self {
            id: take_int(&row, 0)?,
            order_id: take_int(&row, 1)?,
            product_id: take_int(&row, 2)?,
            quantity: take_int(&row, 3)?,
            unit_price: take_decimal(&row, 4)?,
        })
    }

    fn check(&self, dataset: &Dataset) -> std::result::Result<(), ConstraintViolation> {
        ensure_new(self, dataset)?;
        ensure(self, self.quantity > 0, "quantity", "must be positive")?;
        ensure(self, !self.unit_price.is_sign_negative(), "unit_price", "must not be negative")?;
        ensure_ref(self, dataset, "order_id", Entity::Order, self.order_id)?;
        ensure_ref(self, dataset, "product_id", Entity::Product, self.product_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{customer, date, dec, product};

    #[test]
    fn test_schema_matches_rows() {
        let row = customer(1, "Ann", "ann@x.io", "Chicago").to_row();
        assert_eq!(row.len(), Entity::Customer.schema().columns.len());
        assert_eq!(Entity::OrderItem.schema().columns[4].name, "unit_price");
        assert_eq!(Entity::Order.table_name(), "orders");
    }

    #[test]
    fn test_row_round_trip() {
        let c = Customer {
            email: None,
            signup_date: Some(date("2023-05-02")),
            ..customer(3, "Bo", "", "Dallas")
        };
        assert_eq!(Customer::from_row(c.to_row()).unwrap(), c);

        let p = product(2, "Monitor", "299.99", "180.00");
        assert_eq!(Product::from_row(p.to_row()).unwrap(), p);
        assert!(Product::from_row(vec![Value::Int(1)]).is_err());
    }

    #[test]
    fn test_priced_from_copies_the_price() {
        let p = product(9, "Keyboard", "89.99", "50.00");
        let item = OrderItem::priced_from(1, 1, &p, 2);
        assert_eq!(item.unit_price, dec("89.99"));
        assert_eq!(item.product_id, 9);
    }

    #[test]
    fn test_checks_report_one_rule() {
        let mut ds = Dataset::new();
        ds.insert(customer(1, "Ann", "ann@x.io", "Chicago")).unwrap();

        let dup = customer(1, "Cy", "cy@x.io", "Dallas").check(&ds).unwrap_err();
        assert_eq!(dup.rule, Rule::DuplicateKey);

        let email = customer(2, "Cy", "ann@x.io", "Dallas").check(&ds).unwrap_err();
        assert_eq!(email.rule, Rule::DuplicateUniqueField { field: "email" });

        let nameless = customer(3, " ", "x@x.io", "Dallas").check(&ds).unwrap_err();
        assert!(matches!(nameless.rule, Rule::InvalidField { field: "first_name", .. }));

        let negative = product(1, "Mug", "-1.00", "0.50").check(&ds).unwrap_err();
        assert!(matches!(negative.rule, Rule::InvalidField { field: "price", .. }));

        let orphan = Order {
            id: 1,
            customer_id: 42,
            order_date: date("2024-01-01"),
            status: OrderStatus::Completed,
        };
        let err = orphan.check(&ds).unwrap_err();
        assert_eq!(err.entity, Entity::Order);
        assert_eq!(
            err.rule,
            Rule::MissingForeignKey {
                field: "customer_id",
                references: Entity::Customer
            }
        );
    }

    #[test]
    fn test_status_is_an_open_enum() {
        assert_eq!(OrderStatus::from("completed"), OrderStatus::Completed);
        assert_eq!(OrderStatus::from("returned").as_str(), "returned");
        let json = serde_json::to_string(&OrderStatus::Shipped).unwrap();
        assert_eq!(json, "\"shipped\"");
        let parsed: OrderStatus = serde_json::from_str("\"on_hold\"").unwrap();
        assert_eq!(parsed, OrderStatus::Other("on_hold".into()));
    }

    #[test]
    fn test_records_use_column_names_in_json() {
        let product: Product = serde_json::from_str(
            r#"{"product_id": 7, "product_name": "Lamp", "price": "20.00", "cost": "8.50"}"#,
        )
        .unwrap();
        assert_eq!(product.id, 7);
        assert_eq!(product.name, "Lamp");
        assert_eq!(product.category, None);

        let short: Product =
            serde_json::from_str(r#"{"id": 7, "name": "Lamp", "price": "20.00", "cost": "8.50"}"#)
                .unwrap();
        assert_eq!(short, product);

        let json = serde_json::to_value(&product).unwrap();
        assert_eq!(json["product_id"], 7);
        assert_eq!(json["product_name"], "Lamp");
        assert!(json.get("id").is_none());

        let item: OrderItem = serde_json::from_str(
            r#"{"order_item_id": 3, "order_id": 1, "product_id": 7, "quantity": 2, "unit_price": "20.00"}"#,
        )
        .unwrap();
        assert_eq!((item.id, item.product_id), (3, 7));
    }
}
