use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Map, Value};

use phaseflow_core::config::AppConfig;
use phaseflow_core::phase::Phase;
use phaseflow_core::registry::{phase, Namespace};
use phaseflow_core::store::{Database, WriteMode};
use phaseflow_utils::error::Error;
use phaseflow_utils::{PhaseflowResult, Row, Rows};
use super::validate::{self, ValidationError, COLUMN3_MAX};

pub const SOURCE_TABLE: &str = "source_table";
pub const TARGET_TABLE: &str = "target_table";

/// Source and target connections shared by the tasks of one flow.
pub struct Databases {
    pub source: Arc<Database>,
    pub target: Arc<Database>,
}

impl Databases {
    pub fn connect(config: &AppConfig) -> PhaseflowResult<Self> {
        Ok(Self {
            source: Arc::new(Database::connect(&config.source_db_uri)?),
            target: Arc::new(Database::connect(&config.target_db_uri)?),
        })
    }
}

/// With `strict_validation` (the `data_validation` profile setting),
/// transformed rows that break a rule are removed before loading; otherwise
/// they are only logged.
pub fn namespace(databases: Databases, strict_validation: bool) -> Namespace<Value> {
    let Databases { source, target } = databases;
    Namespace::new("sql")
        .with(phase(Phase::Extract).apply("fetch_source_rows", move |_| {
            let rows = source.fetch(&format!("SELECT * FROM {SOURCE_TABLE}"))?;
            Ok(Value::Array(rows.into_iter().map(Value::Object).collect()))
        }))
        .with(phase(Phase::Transform).apply("clean_and_enrich", move |ctx: Option<Value>| {
            let rows = as_rows(ctx.ok_or_else(|| Error::MissingInput { task: "clean_and_enrich".into() })?)?;
            let rows = check_transformed(transform_rows(rows), strict_validation);
            Ok(Value::Array(rows.into_iter().map(Value::Object).collect()))
        }))
        .with(phase(Phase::Load).apply("save_to_target", move |ctx: Option<Value>| {
            let rows = as_rows(ctx.ok_or_else(|| Error::MissingInput { task: "save_to_target".into() })?)?;
            save(&target, &rows)
        }))
}

/// Not a phase task: creates `source_table` and fills it with demo rows,
/// including a few that need cleaning and two that cannot be saved.
pub fn seed_source(db: &Database) -> PhaseflowResult<usize> {
    db.execute_batch(&format!(
        "DROP TABLE IF EXISTS {SOURCE_TABLE};
         CREATE TABLE {SOURCE_TABLE} (
             id INTEGER PRIMARY KEY,
             column1 TEXT,
             column2 TEXT,
             column3 REAL
         );
         INSERT INTO {SOURCE_TABLE} (id, column1, column2, column3) VALUES
             (1, 'alpha', 'first', 5),
             (2, 'beta', NULL, 25.5),
             (3, 'gamma', 'third', -40),
             (4, NULL, 'orphan', 12),
             (5, 'delta', 'fifth', 2500),
             (6, 'epsilon', 'sixth', NULL),
             (7, 'bad!@#', 'seventh', 3),
             (8, 'omega', 'eighth', -2500);"
    ))?;
    Ok(8)
}

fn as_rows(value: Value) -> PhaseflowResult<Rows> {
    let Value::Array(items) = value else {
        return Err(Error::task("expected an array of rows"));
    };
    items
        .into_iter()
        .map(|item| match item {
            Value::Object(row) => Ok(row),
            other => Err(Error::task(format!("expected a row object, got {other}"))),
        })
        .collect()
}

/// Fix what can be fixed in a row, then check it.
///
/// `column2` defaults to `N/A`. A missing `column3` becomes 0, a negative one
/// becomes positive, and one above 1000 is capped. Only one fix applies, so a
/// large negative value still fails the range check.
pub fn clean_row(mut row: Row) -> Result<Row, ValidationError> {
    if row.get("column2").map_or(true, Value::is_null) {
        row.insert("column2".into(), json!("N/A"));
    }
    let column3 = match row.get("column3").and_then(Value::as_f64) {
        None => 0.0,
        Some(v) if v < 0.0 => v.abs(),
        Some(v) if v > COLUMN3_MAX => COLUMN3_MAX,
        Some(v) => v,
    };
    row.insert("column3".into(), json!(column3));
    validate::source_row(&row)?;
    Ok(row)
}

pub fn category(column3: f64) -> &'static str {
    if column3 < 10.0 {
        "low"
    } else if column3 < 50.0 {
        "medium"
    } else {
        "high"
    }
}

/// Clean every row, drop the ones that cannot be fixed, then derive the
/// target columns.
pub fn transform_rows(rows: Rows) -> Rows {
    let total = rows.len();
    let migrated_at = Utc::now().to_rfc3339();
    let out: Rows = rows
        .into_iter()
        .filter_map(|row| {
            let id = row.get("id").cloned().unwrap_or(Value::Null);
            match clean_row(row) {
                Ok(row) => Some(row),
                Err(e) => {
                    tracing::debug!(id = %id, error = %e, "dropping source row");
                    None
                }
            }
        })
        .map(|row| {
            let column3 = row["column3"].as_f64().unwrap_or_default();
            let column1 = match &row["column1"] {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            let mut target = Map::new();
            target.insert("id".into(), row.get("id").cloned().unwrap_or(Value::Null));
            target.insert("column1_upper".into(), json!(column1.to_uppercase()));
            target.insert("column1".into(), json!(column1));
            target.insert("column2".into(), row["column2"].clone());
            target.insert("column3_transformed".into(), json!(column3 * 2.0));
            target.insert("category".into(), json!(category(column3)));
            target.insert("migrated_at".into(), json!(migrated_at));
            target
        })
        .collect();

    if out.len() < total {
        tracing::warn!(dropped = total - out.len(), "dropped rows that could not be cleaned");
    }
    out
}

/// Check transformed rows; with `strict` the invalid ones are removed.
pub fn check_transformed(rows: Rows, strict: bool) -> Rows {
    let (valid, invalid): (Rows, Rows) = rows
        .into_iter()
        .partition(|row| validate::transformed_row(row).is_empty());
    if invalid.is_empty() {
        tracing::info!(rows = valid.len(), "transformed rows validated");
        return valid;
    }

    tracing::warn!(invalid = invalid.len(), strict, "transformed rows failed validation");
    for row in &invalid {
        tracing::debug!(errors = ?validate::transformed_row(row), "invalid transformed row");
    }
    if strict {
        valid
    } else {
        valid.into_iter().chain(invalid).collect()
    }
}

fn save(target: &Database, rows: &Rows) -> PhaseflowResult<Value> {
    if rows.is_empty() {
        tracing::warn!("no data to save");
        return Ok(json!({"success": false, "reason": "No data to save"}));
    }
    let written = target.store(TARGET_TABLE, rows, WriteMode::Replace)?;
    tracing::info!(table = TARGET_TABLE, rows = written, "saved rows");
    Ok(json!({"success": true, "records_processed": written}))
}
