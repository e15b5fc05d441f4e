//! Migrations bundled with the `phaseflow` binary.
//!
//! Each migration exposes a [`Namespace`](phaseflow_core::registry::Namespace)
//! of tagged tasks over a `serde_json::Value` context.

pub mod multi_source;
pub mod simple;
pub mod sql;
pub mod validate;

use std::path::PathBuf;

use clap::ValueEnum;
use serde_json::Value;

use phaseflow_core::builder::PhaseFlowBuilder;
use phaseflow_core::config::AppConfig;
use phaseflow_core::engine::PhaseFlow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Migration {
    /// In-memory product catalogue written to per-category JSON files
    Simple,
    /// Customers, orders and products joined into order reports
    MultiSource,
    /// Source database table cleaned and copied into the target database
    Sql,
}

impl Migration {
    pub fn name(&self) -> &'static str {
        match self {
            Migration::Simple => "simple",
            Migration::MultiSource => "multi-source",
            Migration::Sql => "sql",
        }
    }

    /// Only the SQL migration talks to the configured databases.
    pub fn needs_config(&self) -> bool {
        matches!(self, Migration::Sql)
    }
}

/// Inputs a migration may draw on while wiring its tasks.
pub struct MigrationEnv {
    pub config: Option<AppConfig>,
    pub output_dir: PathBuf,
    /// Create and fill the demo source table before running.
    pub seed: bool,
}

/// Build the flow for `migration`.
pub fn build(migration: Migration, env: &MigrationEnv) -> anyhow::Result<PhaseFlow<Value>> {
    let builder = PhaseFlowBuilder::new(migration.name());
    let flow = match migration {
        Migration::Simple => builder
            .namespace(simple::namespace(env.output_dir.clone()))
            .build()?,
        Migration::MultiSource => builder
            .namespace(multi_source::namespace(env.output_dir.clone()))
            .combine_with(multi_source::merge_sources)
            .build()?,
        Migration::Sql => {
            let config = env
                .config
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("the sql migration needs a loaded profile"))?;
            let databases = sql::Databases::connect(config)?;
            if env.seed {
                let seeded = sql::seed_source(&databases.source)?;
                tracing::info!(rows = seeded, "seeded source_table");
            }
            let strict = config.setting_bool("data_validation").unwrap_or(false);
            builder.namespace(sql::namespace(databases, strict)).build()?
        }
    };
    Ok(flow)
}
