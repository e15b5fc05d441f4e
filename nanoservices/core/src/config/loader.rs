use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::types::{AppConfig, DatabaseUri, ProfileFile};

/// Environment variable naming the active profile.
pub const PROFILE_ENV: &str = "PROFILE";
pub const DEFAULT_PROFILE: &str = "dev";

static ENV_VAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid env var regex"));

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("configuration file {} not found", .0.display())]
    MissingProfile(PathBuf),
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("missing environment variable(s): {}", .0.join(", "))]
    MissingEnvVars(Vec<String>),
    #[error("missing required key '{0}'")]
    MissingKey(&'static str),
    #[error("invalid {key}: {reason}")]
    InvalidUri { key: &'static str, reason: String },
}

/// The profile named by `PROFILE`, or `dev`.
pub fn active_profile() -> String {
    std::env::var(PROFILE_ENV)
        .ok()
        .filter(|p| !p.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_PROFILE.to_string())
}

pub fn profile_path(dir: impl AsRef<Path>, profile: &str) -> PathBuf {
    dir.as_ref().join(format!("application-{profile}.yml"))
}

/// Load `application-<profile>.yml` from `dir`.
pub fn load_profile(dir: impl AsRef<Path>, profile: &str) -> Result<AppConfig, ConfigError> {
    let path = profile_path(dir, profile);
    if !path.exists() {
        return Err(ConfigError::MissingProfile(path));
    }
    let content = std::fs::read_to_string(&path)?;
    let config = parse_profile(profile, &content)?;
    tracing::info!(
        profile,
        path = %path.display(),
        source = %config.source_db_uri,
        target = %config.target_db_uri,
        "loaded configuration profile"
    );
    Ok(config)
}

/// Load the profile selected by the `PROFILE` environment variable.
pub fn load_active_profile(dir: impl AsRef<Path>) -> Result<AppConfig, ConfigError> {
    load_profile(dir, &active_profile())
}

/// Parse a profile from a YAML string, after `${VAR}` substitution.
pub fn parse_profile(profile: &str, yaml: &str) -> Result<AppConfig, ConfigError> {
    let substituted = substitute_env_vars(yaml)?;
    let raw: ProfileFile = serde_yaml::from_str(&substituted)?;

    let source_db_uri = required_uri("source_db_uri", raw.source_db_uri)?;
    let target_db_uri = required_uri("target_db_uri", raw.target_db_uri)?;

    Ok(AppConfig {
        profile: profile.to_string(),
        source_db_uri,
        target_db_uri,
        settings: raw.settings,
    })
}

/// Substitute `${VAR_NAME}` patterns with environment variable values.
pub fn substitute_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut result = input.to_string();
    let mut missing = Vec::new();

    for cap in ENV_VAR_RE.captures_iter(input) {
        let var_name = &cap[1];
        match std::env::var(var_name) {
            Ok(val) => result = result.replace(&cap[0], &val),
            Err(_) => missing.push(var_name.to_string()),
        }
    }

    if !missing.is_empty() {
        return Err(ConfigError::MissingEnvVars(missing));
    }
    Ok(result)
}

fn required_uri(key: &'static str, value: Option<String>) -> Result<DatabaseUri, ConfigError> {
    let raw = value.ok_or(ConfigError::MissingKey(key))?;
    DatabaseUri::parse(&raw).map_err(|reason| ConfigError::InvalidUri { key, reason })
}
