pub mod error;

use error::Error;

pub type PhaseflowResult<T> = Result<T, Error>;

/// One tabular row, keyed by column name.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Tabular data exchanged with the persistence layer.
pub type Rows = Vec<Row>;
