pub mod loader;
pub mod types;

pub use loader::{load_active_profile, load_profile, parse_profile, ConfigError};
pub use types::{AppConfig, DatabaseUri};
