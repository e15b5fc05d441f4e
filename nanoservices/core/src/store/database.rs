use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection};
use serde_json::{Number, Value};

use phaseflow_utils::error::Error;
use phaseflow_utils::{PhaseflowResult, Row, Rows};
use crate::config::types::DatabaseUri;

/// How [`Database::store`] treats an existing table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Append,
    Replace,
}

/// SQLite-backed persistence used by Extract and Load tasks.
///
/// Rows travel as JSON objects keyed by column name.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Connect using a `sqlite:` URI. Other backends are not bundled.
    pub fn connect(uri: &DatabaseUri) -> PhaseflowResult<Self> {
        if uri.backend() != "sqlite" {
            return Err(Error::UnsupportedDatabase(uri.scheme().to_string()));
        }
        let conn = match sqlite_path(uri) {
            Some(path) => Connection::open(path)?,
            None => Connection::open_in_memory()?,
        };
        tracing::debug!(uri = %uri, "connected to database");
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn in_memory() -> PhaseflowResult<Self> {
        Ok(Self { conn: Mutex::new(Connection::open_in_memory()?) })
    }

    pub fn execute_batch(&self, sql: &str) -> PhaseflowResult<()> {
        self.lock()?.execute_batch(sql)?;
        Ok(())
    }

    /// Run `query` and return every row.
    pub fn fetch(&self, query: &str) -> PhaseflowResult<Rows> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(query)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let rows = stmt.query_map([], |row| {
            let mut out = Row::new();
            for (i, name) in columns.iter().enumerate() {
                out.insert(name.clone(), to_json(row.get_ref(i)?));
            }
            Ok(out)
        })?;
        let rows = rows.collect::<Result<Rows, _>>()?;
        tracing::debug!(rows = rows.len(), "fetched rows");
        Ok(rows)
    }

    /// Write `rows` into `table` in one transaction, creating it if needed.
    ///
    /// Columns are the union of the rows' keys in first-seen order; keys a
    /// row lacks are stored as NULL.
    pub fn store(&self, table: &str, rows: &[Row], mode: WriteMode) -> PhaseflowResult<usize> {
        let mut columns: Vec<&str> = Vec::new();
        for row in rows {
            for key in row.keys() {
                if !columns.contains(&key.as_str()) {
                    columns.push(key.as_str());
                }
            }
        }

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        if mode == WriteMode::Replace {
            tx.execute_batch(&format!("DROP TABLE IF EXISTS {}", quote(table)))?;
        }
        if rows.is_empty() {
            tx.commit()?;
            return Ok(0);
        }

        let column_list = columns.iter().map(|c| quote(c)).collect::<Vec<_>>().join(", ");
        tx.execute_batch(&format!("CREATE TABLE IF NOT EXISTS {} ({column_list})", quote(table)))?;

        let placeholders = (1..=columns.len()).map(|i| format!("?{i}")).collect::<Vec<_>>().join(", ");
        let sql = format!("INSERT INTO {} ({column_list}) VALUES ({placeholders})", quote(table));
        {
            let mut stmt = tx.prepare(&sql)?;
            for row in rows {
                let params = columns.iter().map(|c| to_sql(row.get(*c)));
                stmt.execute(params_from_iter(params))?;
            }
        }
        tx.commit()?;

        tracing::debug!(table, rows = rows.len(), ?mode, "stored rows");
        Ok(rows.len())
    }

    pub fn table_exists(&self, table: &str) -> PhaseflowResult<bool> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn lock(&self) -> PhaseflowResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| Error::task("database connection lock poisoned"))
    }
}

/// `None` means an in-memory database.
fn sqlite_path(uri: &DatabaseUri) -> Option<PathBuf> {
    let url = uri.url();
    let path = url.path();
    match url.host_str() {
        Some(host) if !host.is_empty() => Some(PathBuf::from(format!("{host}{path}"))),
        _ if path.is_empty() || path.trim_start_matches('/') == ":memory:" => None,
        _ => Some(PathBuf::from(path)),
    }
}

fn quote(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::Array(bytes.iter().map(|b| Value::from(*b)).collect()),
    }
}

fn to_sql(value: Option<&Value>) -> SqlValue {
    match value {
        None | Some(Value::Null) => SqlValue::Null,
        Some(Value::Bool(b)) => SqlValue::Integer(i64::from(*b)),
        Some(Value::Number(n)) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or_default()),
        },
        Some(Value::String(s)) => SqlValue::Text(s.clone()),
        Some(other) => SqlValue::Text(other.to_string()),
    }
}
