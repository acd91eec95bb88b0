//! Run Orchestrator - lifecycle state machine for one diagnostic run.
//!
//! States: `running → completed` or `running → failed`. Stages execute in a
//! fixed order; any stage may emit zero results without failing the run.
//! `failed` is reserved for infrastructure errors — and only when no metric
//! family could be fetched at all, or persistence itself breaks. Partial
//! artifacts produced before a failure are preserved.

use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::classify::classify_run;
use crate::cluster::{analyze_cluster_loss, dominant_cluster, ClusterClassifier};
use crate::config::{ConfigError, DiagnosisConfig};
use crate::detector::AnomalyDetector;
use crate::hypothesis::{EvidenceContext, HypothesisGenerator};
use crate::store::{MetricStore, RunStore, StoreError};
use crate::tickets::TicketSynthesizer;
use crate::types::{
    DataSource, FetchState, FetchStatus, Run, RunClassification, RunStatus, RunType,
};
use crate::window::DeltaCalculator;

/// Pipeline-level errors. Everything recoverable is recorded on the run
/// instead; this error means the run record itself could not be handled.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("run store error: {0}")]
    Store(#[from] StoreError),
}

/// Orchestrates diagnosis runs against a metric store and a run store.
///
/// Holds no per-run mutable state: concurrent `execute` calls are
/// independent and write only rows keyed by their own run id.
pub struct RunOrchestrator {
    cfg: DiagnosisConfig,
    classifier: ClusterClassifier,
    metrics: Arc<dyn MetricStore>,
    store: Arc<dyn RunStore>,
}

impl RunOrchestrator {
    /// Build an orchestrator, validating the config and compiling the
    /// cluster rule table up front.
    pub fn new(
        cfg: DiagnosisConfig,
        metrics: Arc<dyn MetricStore>,
        store: Arc<dyn RunStore>,
    ) -> Result<Self, PipelineError> {
        cfg.validate()?;
        let classifier = ClusterClassifier::compile(&cfg.clusters)?;
        Ok(Self {
            cfg,
            classifier,
            metrics,
            store,
        })
    }

    /// Execute one diagnostic run for a site as of a date.
    ///
    /// Returns the finished run record (completed or failed). `Err` is
    /// reserved for the case where even the run record could not be
    /// persisted.
    pub async fn execute(
        &self,
        site_id: &str,
        as_of: NaiveDate,
        run_type: RunType,
    ) -> Result<Run, PipelineError> {
        let mut run = Run::new(site_id, run_type);
        info!(
            run_id = %run.id,
            site_id,
            %as_of,
            run_type = %run_type,
            config_version = %self.cfg.version,
            backend = self.store.backend_name(),
            "Diagnosis run started"
        );
        self.store.store_run(&run)?;

        let calc = DeltaCalculator::new(&self.cfg);
        let bounds = calc.window_bounds(as_of);
        let timeout = Duration::from_secs(self.cfg.fetch.timeout_secs);

        // The three upstream fetches are independent; run them concurrently,
        // each under its own bounded timeout.
        let (search_fetch, analytics_fetch, checks_fetch) = tokio::join!(
            timed(timeout, self.metrics.fetch_search_rollups(
                site_id,
                bounds.baseline_start,
                bounds.current_end,
            )),
            timed(timeout, self.metrics.fetch_analytics_rollups(
                site_id,
                bounds.baseline_start,
                bounds.current_end,
            )),
            timed(timeout, self.metrics.fetch_page_checks(
                site_id,
                bounds.baseline_start,
                bounds.current_end,
            )),
        );

        let (search, search_state) = search_fetch;
        let (analytics, analytics_state) = analytics_fetch;
        let (checks, checks_state) = checks_fetch;

        for (source, state) in [
            (DataSource::SearchConsole, &search_state),
            (DataSource::Analytics, &analytics_state),
            (DataSource::PageChecks, &checks_state),
        ] {
            if let FetchState::Failed { message } = state {
                run.record_error("fetch", format!("{source}: {message}"));
            }
            if matches!(state, FetchState::TimedOut) {
                warn!(%source, "Upstream fetch timed out — treating as unavailable");
            }
        }
        run.fetch_statuses = vec![
            FetchStatus { source: DataSource::SearchConsole, state: search_state },
            FetchStatus { source: DataSource::Analytics, state: analytics_state },
            FetchStatus { source: DataSource::PageChecks, state: checks_state },
        ];

        // Both metric families gone: nothing downstream can run.
        if search.is_none() && analytics.is_none() {
            run.record_error("fetch", "no metric family available");
            run.classification = Some(RunClassification::Inconclusive);
            run.summary = "run failed: no metric family could be fetched".to_string();
            run.finish(RunStatus::Failed);
            error!(run_id = %run.id, "Diagnosis run failed — all upstream sources unavailable");
            self.store.store_run(&run)?;
            return Ok(run);
        }

        // ---- Stage: window & delta calculation (pure from here on) ----
        let deltas = calc.compute(as_of, search.as_deref(), analytics.as_deref());

        // ---- Stage: cluster loss analysis ----
        let cluster_losses = search
            .as_deref()
            .map(|rollups| analyze_cluster_loss(rollups, &bounds, &self.classifier))
            .unwrap_or_default();

        // ---- Stage: anomaly detection ----
        let detector = AnomalyDetector::new(&self.cfg);
        let anomalies = detector.detect(&deltas, &cluster_losses);

        // ---- Stage: hypothesis generation & ranking ----
        let checks = checks.unwrap_or_default();
        let generator = HypothesisGenerator::new(&self.cfg);
        let hypotheses = generator.generate(&EvidenceContext {
            deltas: &deltas,
            anomalies: &anomalies,
            cluster_losses: &cluster_losses,
            checks: &checks,
            classifier: &self.classifier,
        });

        // ---- Stage: classification ----
        let (classification, confidence) =
            classify_run(&self.cfg, &deltas, &anomalies, &cluster_losses);

        // ---- Stage: ticket synthesis ----
        let synthesizer = TicketSynthesizer::new(&self.cfg);
        let tickets = match synthesizer.synthesize(
            &run.id,
            &hypotheses,
            &cluster_losses,
            &checks,
            self.store.as_ref(),
        ) {
            Ok(tickets) => tickets,
            Err(e) => {
                run.record_error("tickets", e.to_string());
                Vec::new()
            }
        };

        // ---- Persist artifacts ----
        let mut persist_failed = false;
        if let Err(e) = self.store.store_anomalies(&run.id, &anomalies) {
            run.record_error("persist", e.to_string());
            persist_failed = true;
        }
        if let Err(e) = self.store.store_hypotheses(&run.id, &hypotheses) {
            run.record_error("persist", e.to_string());
            persist_failed = true;
        }

        run.deltas = Some(deltas);
        run.anomaly_count = anomalies.len();
        run.ticket_count = tickets.len();
        run.classification = Some(classification);
        run.confidence = Some(confidence);
        run.summary = compose_summary(&run, classification, &cluster_losses, &self.cfg);

        if persist_failed {
            run.finish(RunStatus::Failed);
            error!(run_id = %run.id, errors = run.errors.len(), "Diagnosis run failed during persistence");
        } else {
            run.finish(RunStatus::Completed);
            info!(
                run_id = %run.id,
                classification = %classification,
                anomalies = run.anomaly_count,
                hypotheses = hypotheses.len(),
                tickets = run.ticket_count,
                "Diagnosis run completed"
            );
        }
        self.store.store_run(&run)?;
        Ok(run)
    }
}

/// Run a fetch under a timeout and fold the outcome into (rows, state).
async fn timed<T>(
    timeout: Duration,
    fut: impl std::future::Future<Output = Result<Vec<T>, StoreError>>,
) -> (Option<Vec<T>>, FetchState) {
    match tokio::time::timeout(timeout, fut).await {
        Ok(Ok(rows)) if rows.is_empty() => (None, FetchState::Empty),
        Ok(Ok(rows)) => {
            let count = rows.len();
            (Some(rows), FetchState::Fetched { rows: count })
        }
        Ok(Err(e)) => (None, FetchState::Failed { message: e.to_string() }),
        Err(_) => (None, FetchState::TimedOut),
    }
}

/// Operator-facing one-paragraph summary.
fn compose_summary(
    run: &Run,
    classification: RunClassification,
    cluster_losses: &[crate::cluster::ClusterLoss],
    cfg: &DiagnosisConfig,
) -> String {
    let mut parts = vec![format!(
        "{classification}: {} anomaly(ies), {} ticket(s)",
        run.anomaly_count, run.ticket_count
    )];
    if let Some(dominant) = dominant_cluster(cluster_losses, cfg.thresholds.cluster_loss_share) {
        parts.push(format!(
            "dominant cluster {} carries {:.0}% of the click loss",
            dominant.cluster,
            dominant.loss_share * 100.0
        ));
    }
    let unavailable: Vec<String> = run
        .fetch_statuses
        .iter()
        .filter(|s| !s.state.is_usable())
        .map(|s| s.source.to_string())
        .collect();
    if !unavailable.is_empty() {
        parts.push(format!("unavailable sources: {}", unavailable.join(", ")));
    }
    parts.join("; ")
}
