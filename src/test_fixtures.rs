//! Record builders and a small shop shared by the unit tests.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::dataset::Dataset;
use crate::schema::{Customer, Order, OrderItem, OrderStatus, Product};

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

pub fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

/// An empty `email` means none.
pub fn customer(id: i64, first_name: &str, email: &str, city: &str) -> Customer {
    Customer {
        id,
        first_name: first_name.to_string(),
        last_name: "Doe".to_string(),
        email: (!email.is_empty()).then(|| email.to_string()),
        signup_date: None,
        city: Some(city.to_string()),
        country: Some("USA".to_string()),
    }
}

pub fn product(id: i64, name: &str, price: &str, cost: &str) -> Product {
    Product {
        id,
        name: name.to_string(),
        category: None,
        price: dec(price),
        cost: dec(cost),
    }
}

pub fn order(id: i64, customer_id: i64, order_date: &str, status: &str) -> Order {
    Order {
        id,
        customer_id,
        order_date: date(order_date),
        status: OrderStatus::from(status),
    }
}

fn in_category(product: Product, category: &str) -> Product {
    Product {
        category: Some(category.to_string()),
        ..product
    }
}

/// Four customers (two in Chicago), four products and six orders.
///
/// Completed revenue is 100.00 in 2024-01, 150.00 in 2024-02 and 120.00 in
/// 2024-03. The Mouse (product 2) is never ordered and the Gift card
/// (product 4) is priced at zero.
pub fn shop() -> Dataset {
    let mut ds = Dataset::new();
    ds.insert(customer(1, "Ann", "ann@x.io", "Chicago")).unwrap();
    ds.insert(customer(2, "Bo", "bo@x.io", "Dallas")).unwrap();
    ds.insert(customer(3, "Cy", "cy@x.io", "Chicago")).unwrap();
    ds.insert(customer(4, "Di", "", "Austin")).unwrap();

    let headphones = in_category(product(1, "Headphones", "50.00", "30.00"), "Audio");
    let mouse = in_category(product(2, "Mouse", "25.00", "10.00"), "Accessories");
    let cable = in_category(product(3, "Cable", "10.00", "4.00"), "Accessories");
    let gift_card = in_category(product(4, "Gift card", "0.00", "0.00"), "Gifts");
    for p in [&headphones, &mouse, &cable, &gift_card] {
        ds.insert(p.clone()).unwrap();
    }

    let orders = [
        order(1, 1, "2024-01-05", "completed"),
        order(2, 1, "2024-02-03", "completed"),
        order(3, 2, "2024-02-20", "completed"),
        order(4, 3, "2024-03-11", "completed"),
        order(5, 4, "2024-03-15", "processing"),
        order(6, 2, "2024-03-28", "cancelled"),
    ];
    for o in orders {
        ds.insert(o).unwrap();
    }

    let items = [
        OrderItem::priced_from(1, 1, &headphones, 2),
        OrderItem::priced_from(2, 2, &headphones, 1),
        OrderItem::priced_from(3, 2, &cable, 5),
        OrderItem::priced_from(4, 3, &headphones, 1),
        OrderItem::priced_from(5, 4, &headphones, 2),
        OrderItem::priced_from(6, 4, &cable, 2),
        OrderItem::priced_from(7, 4, &gift_card, 1),
        OrderItem::priced_from(8, 5, &cable, 1),
        OrderItem::priced_from(9, 6, &headphones, 3),
    ];
    for item in items {
        ds.insert(item).unwrap();
    }
    ds
}
