use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};

use phaseflow::core::config::loader::{active_profile, load_active_profile, load_profile, profile_path};
use phaseflow::core::config::AppConfig;
use phaseflow::core::execution::COMBINER_RECORD;
use phaseflow::core::store::RunHistory;
use phaseflow::core::{logging, metrics};
use phaseflow::migrations::{self, Migration, MigrationEnv};

#[derive(Parser)]
#[command(
    name = "phaseflow",
    version,
    about = "Run a phase-ordered ETL migration"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a bundled migration
    Run {
        /// Migration to run
        #[arg(value_enum)]
        migration: Migration,
        /// Directory holding application-<profile>.yml files
        #[arg(long, default_value = ".")]
        config_dir: PathBuf,
        /// Profile to load instead of $PROFILE
        #[arg(long)]
        profile: Option<String>,
        /// Directory the file-writing migrations write into
        #[arg(long, default_value = "output")]
        output_dir: PathBuf,
        /// Record the run in this SQLite history database
        #[arg(long)]
        history: Option<PathBuf>,
        /// Print Prometheus metrics after the run
        #[arg(long)]
        metrics: bool,
        /// Create demo rows in the source database first (sql migration)
        #[arg(long)]
        seed: bool,
    },
    /// List recorded runs, or the task records of one run
    History {
        /// SQLite history database written by `run --history`
        db: PathBuf,
        /// Number of recent runs to list
        #[arg(long, default_value_t = 10)]
        limit: usize,
        /// Show the task records of this run id
        #[arg(long)]
        run: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    logging::init(&cli.log_level);

    match cli.command {
        Commands::Run { migration, config_dir, profile, output_dir, history, metrics, seed } => {
            let config = load_config(&config_dir, profile.as_deref(), migration.needs_config())?;
            let env = MigrationEnv { config, output_dir, seed };
            run(migration, &env, history.as_deref(), metrics).await
        }
        Commands::History { db, limit, run } => {
            show_history(&db, limit, run.as_deref())?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn run(
    migration: Migration,
    env: &MigrationEnv,
    history: Option<&Path>,
    print_metrics: bool,
) -> anyhow::Result<ExitCode> {
    let flow = migrations::build(migration, env)?;

    tracing::info!(migration = migration.name(), "starting migration");
    let report = flow.run().await;
    println!("{report}");

    if let Some(path) = history {
        let mut history = RunHistory::open(path)
            .with_context(|| format!("opening run history at {}", path.display()))?;
        history.record(&report).context("recording run history")?;
    }
    if print_metrics {
        print!("{}", metrics::gather_text());
    }

    match report.error() {
        None => {
            if let Some(context) = report.final_context() {
                println!("{}", serde_json::to_string_pretty(context)?);
            }
            Ok(ExitCode::SUCCESS)
        }
        Some(err) => {
            eprintln!(
                "migration failed in {} phase, task {}: {}",
                err.phase(),
                err.task().unwrap_or(COMBINER_RECORD),
                std::error::Error::source(err).map_or_else(|| err.to_string(), |s| s.to_string()),
            );
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Load the profile when the migration needs it or when a file exists for it.
///
/// Without `--profile` the profile comes from `$PROFILE`.
fn load_config(dir: &Path, profile: Option<&str>, required: bool) -> anyhow::Result<Option<AppConfig>> {
    let name = profile.map_or_else(active_profile, str::to_string);
    if !required && !profile_path(dir, &name).exists() {
        return Ok(None);
    }
    let config = match profile {
        Some(profile) => load_profile(dir, profile),
        None => load_active_profile(dir),
    }
    .with_context(|| format!("loading profile '{name}' from {}", dir.display()))?;
    Ok(Some(config))
}

fn show_history(db: &Path, limit: usize, run: Option<&str>) -> anyhow::Result<()> {
    let history = RunHistory::open(db)
        .with_context(|| format!("opening run history at {}", db.display()))?;

    match run {
        Some(run_id) => {
            let tasks = history.records_for(run_id).context("reading task records")?;
            if tasks.is_empty() {
                anyhow::bail!("no task records for run {run_id}");
            }
            for task in tasks {
                println!(
                    "{:<9} #{:<2} {:<28} {:<9} {:>6}ms  {}",
                    task.phase, task.position, task.task_name, task.status, task.duration_ms, task.detail
                );
            }
        }
        None => {
            for run in history.recent_runs(limit).context("reading recent runs")? {
                println!(
                    "{}  {:<16} {:<9} {}  {:>6}ms  {}",
                    run.id,
                    run.pipeline,
                    run.status,
                    run.started_at,
                    run.duration_ms,
                    run.error.as_deref().unwrap_or("")
                );
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROFILE_YAML: &str = "source_db_uri: 'sqlite::memory:'\ntarget_db_uri: 'sqlite::memory:'\n";

    #[test]
    fn optional_profile_is_skipped_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(dir.path(), Some("qa"), false).unwrap().is_none());
        assert!(load_config(dir.path(), Some("qa"), true).is_err());
    }

    #[test]
    fn explicit_and_active_profiles_load() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(profile_path(dir.path(), "qa"), PROFILE_YAML).unwrap();
        std::fs::write(profile_path(dir.path(), &active_profile()), PROFILE_YAML).unwrap();

        let explicit = load_config(dir.path(), Some("qa"), true).unwrap().unwrap();
        assert_eq!(explicit.profile, "qa");

        let active = load_config(dir.path(), None, false).unwrap().unwrap();
        assert_eq!(active.profile, active_profile());
    }

    #[tokio::test]
    async fn recorded_runs_can_be_listed() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("history.db");
        let env = MigrationEnv { config: None, output_dir: dir.path().join("out"), seed: false };

        run(Migration::Simple, &env, Some(&db), false).await.unwrap();

        show_history(&db, 5, None).unwrap();
        let runs = RunHistory::open(&db).unwrap().recent_runs(5).unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].status, "completed");
        show_history(&db, 5, Some(&runs[0].id)).unwrap();
        assert!(show_history(&db, 5, Some("missing-run")).is_err());
    }
}
