use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{json, Map, Value};

use phaseflow_core::phase::Phase;
use phaseflow_core::registry::{phase, Namespace};
use phaseflow_utils::error::Error;
use phaseflow_utils::PhaseflowResult;

pub fn namespace(output_dir: PathBuf) -> Namespace<Value> {
    let orders_dir = output_dir.clone();
    Namespace::new("multi_source")
        .with(phase(Phase::Extract).apply("extract_customers", |_| Ok(json!({"customers": customers()}))))
        .with(phase(Phase::Extract).apply("extract_orders", |_| Ok(json!({"orders": orders()}))))
        .with(phase(Phase::Extract).apply("extract_products", |_| Ok(json!({"products": products()}))))
        .with(phase(Phase::Transform).apply("join_orders", |ctx: Option<Value>| {
            join_orders(&ctx.ok_or_else(|| Error::MissingInput { task: "join_orders".into() })?)
        }))
        .with(phase(Phase::Load).apply("write_detailed_orders", move |ctx: Option<Value>| {
            let report = ctx.ok_or_else(|| Error::MissingInput { task: "write_detailed_orders".into() })?;
            write_json(&orders_dir, "detailed_orders.json", &report["detailed_orders"])
        }))
        .with(phase(Phase::Load).apply("write_sales_by_country", move |ctx: Option<Value>| {
            let report = ctx.ok_or_else(|| Error::MissingInput { task: "write_sales_by_country".into() })?;
            write_json(&output_dir, "sales_by_country.json", &report["sales_by_country"])
        }))
}

/// Merge the objects produced by each Extract task into one.
///
/// Each source contributes its own keys; a key produced twice is an error.
pub fn merge_sources(parts: Vec<Value>) -> PhaseflowResult<Value> {
    let mut merged = Map::new();
    for part in parts {
        let Value::Object(fields) = part else {
            return Err(Error::task("every extract must produce a JSON object"));
        };
        for (key, value) in fields {
            if merged.contains_key(&key) {
                return Err(Error::task(format!("'{key}' was extracted by more than one source")));
            }
            merged.insert(key, value);
        }
    }
    Ok(Value::Object(merged))
}

fn customers() -> Value {
    json!([
        {"id": 1, "name": "John Smith", "email": "john@example.com", "country": "USA"},
        {"id": 2, "name": "Maria Garcia", "email": "maria@example.com", "country": "Spain"},
        {"id": 3, "name": "Liu Wei", "email": "liu@example.com", "country": "China"}
    ])
}

fn orders() -> Value {
    json!([
        {"order_id": 1001, "customer_id": 1, "products": [101, 102], "total": 129.99, "date": "2023-01-15"},
        {"order_id": 1002, "customer_id": 3, "products": [103], "total": 79.99, "date": "2023-01-16"},
        {"order_id": 1003, "customer_id": 1, "products": [101, 104], "total": 159.98, "date": "2023-01-20"},
        {"order_id": 1004, "customer_id": 2, "products": [102, 105], "total": 94.98, "date": "2023-01-25"}
    ])
}

fn products() -> Value {
    json!([
        {"product_id": 101, "name": "Smartphone", "category": "Electronics", "price": 99.99},
        {"product_id": 102, "name": "Headphones", "category": "Electronics", "price": 29.99},
        {"product_id": 103, "name": "Laptop", "category": "Electronics", "price": 799.99},
        {"product_id": 104, "name": "Tablet", "category": "Electronics", "price": 199.99},
        {"product_id": 105, "name": "External Drive", "category": "Electronics", "price": 64.99}
    ])
}

fn records<'a>(data: &'a Value, key: &str) -> PhaseflowResult<&'a Vec<Value>> {
    data[key]
        .as_array()
        .ok_or_else(|| Error::task(format!("'{key}' is missing from the extracted data")))
}

fn index_by<'a>(items: &'a [Value], key: &str) -> HashMap<i64, &'a Value> {
    items
        .iter()
        .filter_map(|item| item[key].as_i64().map(|id| (id, item)))
        .collect()
}

#[derive(Default)]
struct CountrySales {
    total_sales: f64,
    order_count: usize,
    customers: BTreeSet<String>,
}

/// Join orders with their customer and products, then aggregate per country
/// and per product.
pub fn join_orders(data: &Value) -> PhaseflowResult<Value> {
    let customers = index_by(records(data, "customers")?, "id");
    let products = index_by(records(data, "products")?, "product_id");

    let mut detailed = Vec::new();
    for order in records(data, "orders")? {
        let Some(customer) = order["customer_id"].as_i64().and_then(|id| customers.get(&id)) else {
            tracing::warn!(order = %order["order_id"], "customer not found, skipping order");
            continue;
        };

        let mut items = Vec::new();
        for product_id in order["products"].as_array().into_iter().flatten() {
            match product_id.as_i64().and_then(|id| products.get(&id)) {
                Some(product) => items.push(json!({
                    "product_id": product["product_id"],
                    "product_name": product["name"],
                    "product_category": product["category"],
                    "unit_price": product["price"],
                })),
                None => tracing::warn!(order = %order["order_id"], product = %product_id, "product not found"),
            }
        }

        detailed.push(json!({
            "order_id": order["order_id"],
            "order_date": order["date"],
            "total_amount": order["total"],
            "customer_name": customer["name"],
            "customer_email": customer["email"],
            "customer_country": customer["country"],
            "items": items,
        }));
    }

    let mut by_country: BTreeMap<String, CountrySales> = BTreeMap::new();
    let mut popularity: BTreeMap<i64, (Value, Value, usize, f64)> = BTreeMap::new();
    for order in &detailed {
        let country = order["customer_country"].as_str().unwrap_or_default().to_string();
        let sales = by_country.entry(country).or_default();
        sales.total_sales += order["total_amount"].as_f64().unwrap_or_default();
        sales.order_count += 1;
        sales
            .customers
            .insert(order["customer_name"].as_str().unwrap_or_default().to_string());

        for item in order["items"].as_array().into_iter().flatten() {
            let Some(id) = item["product_id"].as_i64() else { continue };
            let entry = popularity.entry(id).or_insert_with(|| {
                (item["product_name"].clone(), item["product_category"].clone(), 0, 0.0)
            });
            entry.2 += 1;
            entry.3 += item["unit_price"].as_f64().unwrap_or_default();
        }
    }

    let sales_by_country: Map<String, Value> = by_country
        .into_iter()
        .map(|(country, s)| {
            let row = json!({
                "total_sales": (s.total_sales * 100.0).round() / 100.0,
                "order_count": s.order_count,
                "customer_count": s.customers.len(),
            });
            (country, row)
        })
        .collect();
    let product_popularity: Map<String, Value> = popularity
        .into_iter()
        .map(|(id, (name, category, count, revenue))| {
            let row = json!({
                "product_name": name,
                "product_category": category,
                "order_count": count,
                "total_revenue": (revenue * 100.0).round() / 100.0,
            });
            (id.to_string(), row)
        })
        .collect();

    tracing::info!(
        orders = detailed.len(),
        countries = sales_by_country.len(),
        products = product_popularity.len(),
        "joined order data"
    );
    Ok(json!({
        "detailed_orders": detailed,
        "sales_by_country": sales_by_country,
        "product_popularity": product_popularity,
    }))
}

fn write_json(dir: &Path, file: &str, value: &Value) -> PhaseflowResult<Value> {
    if value.is_null() {
        return Err(Error::task(format!("nothing to write to {file}")));
    }
    fs::create_dir_all(dir)?;
    let path = dir.join(file);
    fs::write(&path, serde_json::to_string_pretty(value)?)?;
    let records = match value {
        Value::Array(items) => items.len(),
        Value::Object(fields) => fields.len(),
        _ => 1,
    };
    Ok(json!({"file": path.display().to_string(), "records": records}))
}
