use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::info;
use yardops_core::config::YardopsConfig;
use yardops_recurrence::{analytics, sweeper, NewJob, RecurrenceEngine, SqliteStore};

/// Yardops - recurring lawn-care job series maintainer
#[derive(Parser, Debug)]
#[command(name = "yardops", version, long_about = None)]
struct Cli {
    /// Config file (default: $YARDOPS_CONFIG or ~/.yardops/yardops.toml)
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the database schema and exit
    Migrate,
    /// Create a job from a JSON file and fill its initial window
    Add { file: PathBuf },
    /// Top up every active series once
    Sweep,
    /// Run the periodic maintenance sweep until Ctrl-C
    Run,
    /// Stop a series from growing
    Pause { series_id: String },
    /// Reactivate a series and backfill its window
    Resume { series_id: String },
    /// Mark a routing record's invoice as sent and complete its job
    Complete { routing_id: String },
    /// Print revenue analytics as JSON
    Report,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "yardops=info,yardops_recurrence=info".into()),
        )
        .init();

    let cli = Cli::parse();

    // load config: --config > YARDOPS_CONFIG env > ~/.yardops/yardops.toml
    let config_path = cli
        .config
        .as_ref()
        .map(|p| p.display().to_string())
        .or_else(|| std::env::var("YARDOPS_CONFIG").ok());
    let config = YardopsConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        YardopsConfig::default()
    });

    let db_path = &config.database.path;
    ensure_parent_dir(db_path);
    info!(path = %db_path, "opening SQLite database");

    let db = rusqlite::Connection::open(db_path)?;
    db.execute_batch("PRAGMA journal_mode=WAL; PRAGMA busy_timeout=3000;")?;
    // SqliteStore::new runs the (idempotent) schema migration
    let store = SqliteStore::new(db)?;
    let engine = RecurrenceEngine::new(store, config.recurrence);

    match cli.command {
        Command::Migrate => info!("database migrations complete"),
        Command::Add { file } => {
            let raw = std::fs::read_to_string(&file)?;
            let input: NewJob = serde_json::from_str(&raw)?;
            let created = engine.create_job(input)?;
            print_json(&serde_json::json!({
                "job": created.job,
                "routing": created.routing,
                "occurrences": created.occurrences,
            }))?;
        }
        Command::Sweep => {
            let report = engine.sweep()?;
            print_json(&serde_json::json!({
                "seriesChecked": report.series_checked,
                "jobsCreated": report.jobs_created,
                "failures": report.failures,
            }))?;
        }
        Command::Run => {
            if !config.sweep.enabled {
                info!("sweep.enabled is false, nothing to run");
                return Ok(());
            }
            let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Ctrl-C received, shutting down");
                }
                let _ = shutdown_tx.send(true);
            });
            let interval = Duration::from_secs(config.sweep.interval_secs.max(1));
            sweeper::run_sweeper(&engine, interval, shutdown_rx).await;
        }
        Command::Pause { series_id } => engine.pause_series(&series_id)?,
        Command::Resume { series_id } => {
            let created = engine.resume_series(&series_id)?;
            print_json(&serde_json::json!({ "occurrences": created }))?;
        }
        Command::Complete { routing_id } => {
            let done = engine.mark_invoice_sent(&routing_id)?;
            print_json(&serde_json::json!({
                "job": done.job,
                "routing": done.routing,
                "spawned": done.spawned,
            }))?;
        }
        Command::Report => {
            let summary = engine.revenue_report()?;
            let jobs = yardops_recurrence::JobStore::list_jobs(engine.store())?;
            print_json(&serde_json::json!({
                "revenue": summary,
                "scheduledJobs": analytics::scheduled_job_count(&jobs),
            }))?;
        }
    }
    Ok(())
}

fn print_json(value: &serde_json::Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Ensure the parent directory for a file path exists.
fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
}
