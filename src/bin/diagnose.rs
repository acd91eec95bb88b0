//! Diagnosis Replay
//!
//! Feeds a site fixture (JSON) through the full diagnosis pipeline and
//! prints the resulting run, anomalies, hypotheses, and tickets as JSON.
//!
//! Usage:
//!   cargo run --bin diagnose -- fixtures/site.json
//!   cargo run --bin diagnose -- fixtures/site.json --as-of 2024-03-17

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

use trafficdx::store::{InMemoryMetricStore, InMemoryRunStore, RunStore};
use trafficdx::types::{Anomaly, Hypothesis, Run, RunType, SiteFixture, Ticket};
use trafficdx::{DiagnosisConfig, RunOrchestrator};

#[derive(Parser, Debug)]
#[command(name = "diagnose", about = "Run a traffic regression diagnosis over a site fixture")]
struct Args {
    /// Path to the site fixture JSON
    fixture: PathBuf,

    /// Diagnosis config TOML (defaults to the standard search order)
    #[arg(long)]
    config: Option<PathBuf>,

    /// As-of date (defaults to the latest date in the fixture)
    #[arg(long)]
    as_of: Option<NaiveDate>,

    /// Run type
    #[arg(long, value_enum, default_value = "full")]
    run_type: RunTypeArg,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum RunTypeArg {
    Full,
    Smoke,
    Scheduled,
}

impl From<RunTypeArg> for RunType {
    fn from(value: RunTypeArg) -> Self {
        match value {
            RunTypeArg::Full => RunType::Full,
            RunTypeArg::Smoke => RunType::Smoke,
            RunTypeArg::Scheduled => RunType::Scheduled,
        }
    }
}

/// Everything the run produced, bundled for output.
#[derive(Serialize)]
struct DiagnosisReport {
    run: Run,
    anomalies: Vec<Anomaly>,
    hypotheses: Vec<Hypothesis>,
    tickets: Vec<Ticket>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => DiagnosisConfig::load_from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => DiagnosisConfig::load(),
    };

    let contents = std::fs::read_to_string(&args.fixture)
        .with_context(|| format!("reading fixture {}", args.fixture.display()))?;
    let fixture: SiteFixture =
        serde_json::from_str(&contents).context("parsing site fixture JSON")?;

    let site_id = fixture.site_id.clone();
    let as_of = args
        .as_of
        .or_else(|| fixture.latest_date())
        .context("fixture has no data and no --as-of was given")?;

    let run_store = Arc::new(InMemoryRunStore::new());
    let orchestrator = RunOrchestrator::new(
        config,
        Arc::new(InMemoryMetricStore::new(fixture)),
        run_store.clone(),
    )?;

    let run = orchestrator
        .execute(&site_id, as_of, args.run_type.into())
        .await?;

    let report = DiagnosisReport {
        anomalies: run_store.get_anomalies(&run.id)?,
        hypotheses: run_store.get_hypotheses(&run.id)?,
        tickets: run_store.get_tickets(&run.id)?,
        run,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
