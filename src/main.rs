//! CycleSense CLI
//!
//! Command-line interface for running analysis sessions over imported or
//! demo health records.

use anyhow::Context;
use clap::{Parser, Subcommand};
use cyclesense::config::{generate_default_config, Config};
use cyclesense::data::{
    generate_demo_data, import_cycles_json, import_daily_logs_csv, import_metrics_csv,
    ImportReport, InMemoryStore,
};
use cyclesense::model::session::{
    AnalysisRequest, AnalysisScope, Granularity, SessionType, Timeframe,
};
use cyclesense::session::{
    AnalysisSessionOrchestrator, InMemorySessionStore, SessionStore, SqliteSessionStore,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "cyclesense", version, about = "Cycle-aware personal health analytics")]
struct Cli {
    /// Path to a config file; defaults to the standard locations
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a full analysis session over imported records
    Run {
        /// User the records belong to
        #[arg(long, default_value = "default")]
        user: String,

        /// Trailing analysis window in days
        #[arg(long, default_value_t = 90)]
        days: i64,

        /// Cycle records as JSON
        #[arg(long)]
        cycles: Option<PathBuf>,

        /// Daily symptom/mood logs as CSV
        #[arg(long)]
        logs: Option<PathBuf>,

        /// Wearable metric points as CSV
        #[arg(long)]
        metrics: Option<PathBuf>,

        /// Emit results as JSON instead of a summary
        #[arg(long)]
        json: bool,
    },

    /// Run a full analysis over a generated demo dataset
    Demo {
        #[arg(long, default_value = "demo")]
        user: String,

        #[arg(long)]
        json: bool,
    },

    /// Forecast the next seven days of mood
    Forecast {
        #[arg(long, default_value = "default")]
        user: String,

        #[arg(long, default_value_t = 90)]
        days: i64,

        #[arg(long)]
        cycles: Option<PathBuf>,

        #[arg(long)]
        logs: Option<PathBuf>,
    },

    /// List stored analysis sessions for a user
    Sessions {
        #[arg(long, default_value = "default")]
        user: String,
    },

    /// Show one stored session with its findings
    Show {
        /// Session id
        id: Uuid,
    },

    /// Print a commented default config file
    InitConfig {
        /// Write to this path instead of stdout
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_with_env(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => Config::load_default(),
    };
    init_logging(&config);

    tracing::info!("CycleSense v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Run {
            user,
            days,
            cycles,
            logs,
            metrics,
            json,
        } => {
            let provider = Arc::new(InMemoryStore::new());
            import_records(
                &provider,
                &user,
                cycles.as_deref(),
                logs.as_deref(),
                metrics.as_deref(),
            )?;

            let store = open_store(&config)?;
            let orchestrator = AnalysisSessionOrchestrator::new(provider, store, config);
            let results = orchestrator
                .run(AnalysisRequest {
                    user_id: user,
                    session_type: SessionType::FullAnalysis,
                    scope: AnalysisScope::default(),
                    timeframe: Timeframe::last_days(days, Granularity::Quarter),
                })
                .await?;

            print_results(&results, json)?;
        }

        Command::Demo { user, json } => {
            let provider = Arc::new(InMemoryStore::new());
            let today = chrono::Utc::now().date_naive();
            generate_demo_data(&provider, &user, today);

            // Demo sessions stay out of the persistent store.
            let orchestrator = AnalysisSessionOrchestrator::new(
                provider,
                Arc::new(InMemorySessionStore::new()),
                config,
            );
            let mut results = orchestrator
                .run(AnalysisRequest {
                    user_id: user,
                    session_type: SessionType::FullAnalysis,
                    scope: AnalysisScope::default(),
                    timeframe: Timeframe::last_days(90, Granularity::Quarter),
                })
                .await?;

            for p in &mut results.patterns {
                p.is_synthetic = true;
            }
            for c in &mut results.correlations {
                c.is_synthetic = true;
            }
            for a in &mut results.anomalies {
                a.is_synthetic = true;
            }

            print_results(&results, json)?;
        }

        Command::Forecast {
            user,
            days,
            cycles,
            logs,
        } => {
            let provider = Arc::new(InMemoryStore::new());
            import_records(&provider, &user, cycles.as_deref(), logs.as_deref(), None)?;

            let orchestrator = AnalysisSessionOrchestrator::new(
                provider,
                Arc::new(InMemorySessionStore::new()),
                config,
            );
            let today = chrono::Utc::now().date_naive();
            let timeframe = Timeframe::last_days(days, Granularity::Quarter);
            let report = orchestrator.forecast(&user, &timeframe, today).await?;

            if !report.sufficient() {
                println!(
                    "Not enough recent mood ratings to forecast ({} of {} needed).",
                    report.rated_recent, report.min_required
                );
                return Ok(());
            }
            for point in &report.points {
                println!(
                    "{}  mood {:>4.1}  confidence {:>3.0}%  ({})",
                    point.date,
                    point.predicted_value,
                    point.confidence,
                    point.contributing_factors.join(", ")
                );
            }
        }

        Command::Sessions { user } => {
            let store = open_store(&config)?;
            let sessions = store.list_sessions(&user)?;
            if sessions.is_empty() {
                println!("No sessions for {user}.");
            }
            for session in sessions {
                println!(
                    "{}  {}  {}  confidence {:.2}  completeness {:.2}",
                    session.id,
                    session.created_at.format("%Y-%m-%d %H:%M"),
                    session.status,
                    session.confidence_score,
                    session.data_completeness
                );
            }
        }

        Command::Show { id } => {
            let store = open_store(&config)?;
            match store.fetch_session(id)? {
                Some(stored) => {
                    println!("{}", serde_json::to_string_pretty(&stored)?);
                }
                None => {
                    println!("No session with id {id}.");
                }
            }
        }

        Command::InitConfig { path } => {
            let content = generate_default_config();
            match path {
                Some(path) => {
                    std::fs::write(&path, content)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    println!("Wrote default config to {}", path.display());
                }
                None => print!("{content}"),
            }
        }
    }

    Ok(())
}

fn init_logging(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| format!("cyclesense={}", config.logging.level)),
    );
    if config.logging.format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

fn open_store(config: &Config) -> anyhow::Result<Arc<SqliteSessionStore>> {
    let path = PathBuf::from(&config.session.store_path);
    let store = SqliteSessionStore::open(&path)
        .with_context(|| format!("failed to open session store at {}", path.display()))?;
    Ok(Arc::new(store))
}

fn import_records(
    store: &InMemoryStore,
    user: &str,
    cycles: Option<&Path>,
    logs: Option<&Path>,
    metrics: Option<&Path>,
) -> anyhow::Result<()> {
    if cycles.is_none() && logs.is_none() && metrics.is_none() {
        anyhow::bail!("no input files; pass --cycles, --logs and/or --metrics (or use `demo`)");
    }
    if let Some(path) = cycles {
        let report = import_cycles_json(store, user, path)
            .with_context(|| format!("failed to import {}", path.display()))?;
        log_import("cycles", path, &report);
    }
    if let Some(path) = logs {
        let report = import_daily_logs_csv(store, user, path)
            .with_context(|| format!("failed to import {}", path.display()))?;
        log_import("daily logs", path, &report);
    }
    if let Some(path) = metrics {
        let report = import_metrics_csv(store, user, path)
            .with_context(|| format!("failed to import {}", path.display()))?;
        log_import("metrics", path, &report);
    }
    Ok(())
}

fn log_import(kind: &str, path: &Path, report: &ImportReport) {
    tracing::info!(
        kind,
        path = %path.display(),
        imported = report.rows_imported,
        failed = report.rows_failed,
        "Import finished"
    );
    for row in &report.errors {
        tracing::warn!(kind, line = row.line, error = %row.error, "Row rejected");
    }
}

fn print_results(
    results: &cyclesense::model::session::AnalysisResults,
    json: bool,
) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(results)?);
        return Ok(());
    }

    println!("Session {}  [{}]", results.session_id, results.status);
    println!(
        "confidence {:.2}  completeness {:.2}  {}ms",
        results.confidence_score, results.data_completeness, results.processing_time_ms
    );

    if !results.key_findings.is_empty() {
        println!("\nKey findings:");
        for finding in &results.key_findings {
            println!("  - {finding}");
        }
    }

    if !results.patterns.is_empty() {
        println!("\nPatterns:");
        for p in &results.patterns {
            println!(
                "  {}  day {:.0}  {:.0}% of days  confidence {:.0}%  next ~{}",
                p.symptom,
                p.mean_cycle_day,
                p.probability,
                p.confidence,
                p.predicted_next
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "unknown".to_string())
            );
        }
    }

    if !results.correlations.is_empty() {
        println!("\nCorrelations:");
        for c in &results.correlations {
            println!("  {}", c.insight);
        }
    }

    if !results.anomalies.is_empty() {
        println!("\nAnomalies:");
        for a in &results.anomalies {
            println!(
                "  {}  {:.1} vs expected {:.1}  {}",
                a.metric, a.detected_value, a.expected_value, a.severity
            );
        }
    }

    if !results.recommendations.is_empty() {
        println!("\nRecommendations:");
        for r in &results.recommendations {
            println!("  - {r}");
        }
    }

    for failure in &results.subsystem_failures {
        println!("\nwarning: {} failed: {}", failure.subsystem, failure.error);
    }

    Ok(())
}
