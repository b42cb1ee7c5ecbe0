use chrono::NaiveDate;
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use rust_decimal::Decimal;
use shopdb::{Customer, Dataset, Library, Order, OrderItem, OrderStatus, Params, Product};
use std::hint::black_box;

const CITIES: [&str; 5] = ["Chicago", "Dallas", "Austin", "Boise", "Denver"];
const STATUSES: [&str; 4] = ["completed", "completed", "shipped", "cancelled"];

/// `n` customers with two orders each, ten products, two items per order.
fn setup_populated_shop(n: usize) -> Dataset {
    let mut ds = Dataset::new();

    let products: Vec<Product> = (1..=10)
        .map(|i| Product {
            id: i,
            name: format!("product{i}"),
            category: Some(format!("category{}", i % 3)),
            price: Decimal::new(1000 + i * 250, 2),
            cost: Decimal::new(600 + i * 100, 2),
        })
        .collect();
    for p in &products {
        ds.insert(p.clone()).unwrap();
    }

    let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
    let mut item_id = 0;
    for i in 0..n as i64 {
        ds.insert(Customer {
            id: i,
            first_name: format!("first{i}"),
            last_name: format!("last{i}"),
            email: Some(format!("user{i}@example.com")),
            signup_date: Some(start),
            city: Some(CITIES[i as usize % CITIES.len()].to_string()),
            country: Some("USA".to_string()),
        })
        .unwrap();

        for k in 0..2 {
            let order_id = i * 2 + k;
            ds.insert(Order {
                id: order_id,
                customer_id: i,
                order_date: start + chrono::Days::new((order_id % 365) as u64),
                status: OrderStatus::from(STATUSES[order_id as usize % STATUSES.len()]),
            })
            .unwrap();

            for j in 0..2 {
                item_id += 1;
                let product = &products[((order_id + j) % 10) as usize];
                ds.insert(OrderItem::priced_from(item_id, order_id, product, j + 1))
                    .unwrap();
            }
        }
    }
    ds
}

fn bench_load(c: &mut Criterion) {
    let mut group = c.benchmark_group("Load");
    for n in [100, 1000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(n), n, |b, &n| {
            b.iter(|| black_box(setup_populated_shop(n)));
        });
    }
    group.finish();
}

fn bench_named_queries(c: &mut Criterion) {
    let library = Library::standard();
    let params = Params::new()
        .set("start", NaiveDate::from_ymd_opt(2023, 3, 1).unwrap())
        .set("end", NaiveDate::from_ymd_opt(2023, 6, 30).unwrap());

    for name in [
        "total_revenue",
        "monthly_revenue_growth",
        "top_products",
        "top_customers_by_average_order",
        "never_ordered_products",
    ] {
        let mut group = c.benchmark_group(name);
        for n in [100, 1000].iter() {
            group.bench_with_input(BenchmarkId::from_parameter(n), n, |b, &n| {
                let ds = setup_populated_shop(n);
                b.iter(|| {
                    let res = library.run(name, &ds, &params).unwrap();
                    black_box(res);
                });
            });
        }
        group.finish();
    }
}

criterion_group!(benches, bench_load, bench_named_queries);
criterion_main!(benches);
