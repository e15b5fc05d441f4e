use thiserror::Error;
use rusqlite::Error as SqliteError;
use serde_json::Error as JsonError;
use url::ParseError;

/// Error returned by phase tasks and the persistence layer.
#[derive(Debug, Error)]
pub enum Error {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Json Error: {0}")]
    Json(#[from] JsonError),

    #[error("Sqlite Error: {0}")]
    Sqlite(#[from] SqliteError),

    #[error("Url Error: {0}")]
    UrlParse(#[from] ParseError),

    #[error("task '{task}' needs an input but no earlier phase produced one")]
    MissingInput { task: String },

    #[error("unsupported database scheme '{0}'")]
    UnsupportedDatabase(String),

    #[error("{0}")]
    Task(String),
}

impl Error {
    /// Shorthand for a task-level failure with a plain message.
    pub fn task(msg: impl Into<String>) -> Self {
        Error::Task(msg.into())
    }
}
