use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde_json::{json, Value};

use phaseflow_core::phase::Phase;
use phaseflow_core::registry::{phase, Namespace};
use phaseflow_utils::error::Error;
use phaseflow_utils::PhaseflowResult;

const USD_TO_EUR: f64 = 0.91;

pub fn namespace(output_dir: PathBuf) -> Namespace<Value> {
    Namespace::new("simple")
        .with(phase(Phase::Extract).apply("extract_catalogue", |_| Ok(catalogue())))
        .with(phase(Phase::Transform).apply("enrich_products", |ctx: Option<Value>| {
            enrich(&ctx.ok_or_else(|| Error::MissingInput { task: "enrich_products".into() })?)
        }))
        .with(phase(Phase::Load).apply("write_category_files", move |ctx: Option<Value>| {
            let products = ctx.ok_or_else(|| Error::MissingInput { task: "write_category_files".into() })?;
            write_by_category(&output_dir, &products)
        }))
}

pub fn catalogue() -> Value {
    json!([
        {"id": 1, "name": "Product A", "category": "Electronics", "price": 199.99, "in_stock": true},
        {"id": 2, "name": "Product B", "category": "Books", "price": 29.99, "in_stock": true},
        {"id": 3, "name": "Product C", "category": "Electronics", "price": 99.50, "in_stock": false},
        {"id": 4, "name": "Product D", "category": "Clothing", "price": 49.99, "in_stock": true},
        {"id": 5, "name": "Product E", "category": "Books", "price": 14.99, "in_stock": false}
    ])
}

fn discount_for(category: &str) -> f64 {
    match category {
        "Electronics" => 0.10,
        "Books" => 0.05,
        _ => 0.0,
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Upper-case names, add EUR prices, availability and the category discount.
pub fn enrich(products: &Value) -> PhaseflowResult<Value> {
    let items = products
        .as_array()
        .ok_or_else(|| Error::task("expected an array of products"))?;
    let processed_at = Utc::now().to_rfc3339();

    let mut out = Vec::with_capacity(items.len());
    for item in items {
        let price = item["price"]
            .as_f64()
            .ok_or_else(|| Error::task(format!("product {} has no numeric price", item["id"])))?;
        let category = item["category"].as_str().unwrap_or_default();
        let name = item["name"].as_str().unwrap_or_default();
        let discount = discount_for(category);
        let in_stock = item["in_stock"].as_bool().unwrap_or(false);

        out.push(json!({
            "product_id": item["id"],
            "product_name": name.to_uppercase(),
            "category": category,
            "price_usd": price,
            "price_eur": round2(price * USD_TO_EUR),
            "availability": if in_stock { "In Stock" } else { "Out of Stock" },
            "discount": discount,
            "discounted_price_usd": round2(price * (1.0 - discount)),
            "processed_at": processed_at,
        }));
    }
    tracing::info!(records = out.len(), "enriched products");
    Ok(Value::Array(out))
}

/// Lower-cased category usable as a single path component.
fn file_stem(category: &str) -> String {
    let stem: String = category
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if stem.trim_matches('_').is_empty() {
        "uncategorised".to_string()
    } else {
        stem
    }
}

/// Write all records to `target_data.json` plus one file per category.
pub fn write_by_category(dir: &Path, products: &Value) -> PhaseflowResult<Value> {
    let items = products
        .as_array()
        .ok_or_else(|| Error::task("expected an array of products"))?;

    let mut by_category: BTreeMap<String, Vec<Value>> = BTreeMap::new();
    for item in items {
        let category = item["category"].as_str().unwrap_or("Uncategorised").to_string();
        by_category.entry(category).or_default().push(item.clone());
    }

    let category_dir = dir.join("target_data");
    fs::create_dir_all(&category_dir)?;
    fs::write(dir.join("target_data.json"), serde_json::to_string_pretty(products)?)?;

    let mut files = Vec::new();
    for (category, records) in &by_category {
        let file = category_dir.join(format!("{}.json", file_stem(category)));
        fs::write(&file, serde_json::to_string_pretty(records)?)?;
        files.push(file.display().to_string());
    }

    let counts: BTreeMap<&str, usize> =
        by_category.iter().map(|(c, r)| (c.as_str(), r.len())).collect();
    Ok(json!({
        "total_records": items.len(),
        "categories": counts,
        "files_created": files,
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enrich_applies_category_rules() {
        let enriched = enrich(&catalogue()).unwrap();
        let first = &enriched[0];
        assert_eq!(first["product_name"], "PRODUCT A");
        assert_eq!(first["price_eur"], json!(181.99));
        assert_eq!(first["discount"], json!(0.10));
        assert_eq!(first["discounted_price_usd"], json!(179.99));
        assert_eq!(enriched[2]["availability"], "Out of Stock");
        assert_eq!(enriched[3]["discount"], json!(0.0));
    }

    #[test]
    fn enrich_rejects_non_array() {
        assert!(enrich(&json!({"id": 1})).is_err());
    }

    #[test]
    fn category_names_cannot_escape_the_output_dir() {
        assert_eq!(file_stem("Electronics"), "electronics");
        assert_eq!(file_stem("../../etc/passwd"), "______etc_passwd");
        assert_eq!(file_stem(".."), "uncategorised");
        assert_eq!(file_stem("Home & Garden"), "home___garden");

        let dir = tempfile::tempdir().unwrap();
        let products = json!([{"category": "../escape", "product_name": "X"}]);
        let summary = write_by_category(dir.path(), &products).unwrap();
        let written = summary["files_created"][0].as_str().unwrap();
        assert!(std::path::Path::new(written).starts_with(dir.path().join("target_data")));
        assert!(dir.path().join("target_data/___escape.json").exists());
    }

    #[test]
    fn writes_one_file_per_category() {
        let dir = tempfile::tempdir().unwrap();
        let summary = write_by_category(dir.path(), &enrich(&catalogue()).unwrap()).unwrap();

        assert_eq!(summary["total_records"], 5);
        assert_eq!(summary["categories"]["Books"], 2);
        assert_eq!(summary["files_created"].as_array().unwrap().len(), 3);
        assert!(dir.path().join("target_data.json").exists());

        let books: Value = serde_json::from_str(
            &fs::read_to_string(dir.path().join("target_data/books.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(books.as_array().unwrap().len(), 2);
    }
}
