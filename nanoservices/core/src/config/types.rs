use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use url::Url;

/// Raw contents of an `application-<profile>.yml` file.
#[derive(Debug, Deserialize)]
pub struct ProfileFile {
    pub source_db_uri: Option<String>,
    pub target_db_uri: Option<String>,
    /// Every other key, kept for the migrations to interpret
    #[serde(flatten)]
    pub settings: HashMap<String, serde_yaml::Value>,
}

/// A validated profile.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub profile: String,
    pub source_db_uri: DatabaseUri,
    pub target_db_uri: DatabaseUri,
    pub settings: HashMap<String, serde_yaml::Value>,
}

impl AppConfig {
    pub fn setting_str(&self, key: &str) -> Option<&str> {
        self.settings.get(key).and_then(|v| v.as_str())
    }

    pub fn setting_bool(&self, key: &str) -> Option<bool> {
        self.settings.get(key).and_then(|v| v.as_bool())
    }
}

/// A database connection string such as `mysql+pymysql://user:pw@host/db`
/// or `sqlite:///var/data/app.db`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseUri(Url);

impl DatabaseUri {
    pub fn parse(raw: &str) -> Result<Self, String> {
        let url = Url::parse(raw.trim()).map_err(|e| e.to_string())?;
        if url.host().is_none() && url.path().is_empty() {
            return Err(format!("'{}:' names no host, path or database", url.scheme()));
        }
        Ok(Self(url))
    }

    /// Full scheme, including any driver suffix (`postgresql+psycopg2`).
    pub fn scheme(&self) -> &str {
        self.0.scheme()
    }

    /// Scheme without the driver suffix (`postgresql`).
    pub fn backend(&self) -> &str {
        self.scheme().split('+').next().unwrap_or_default()
    }

    pub fn url(&self) -> &Url {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

/// Displays with the password masked.
impl fmt::Display for DatabaseUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.password().is_some() {
            let mut masked = self.0.clone();
            let _ = masked.set_password(Some("***"));
            write!(f, "{masked}")
        } else {
            write!(f, "{}", self.0)
        }
    }
}
