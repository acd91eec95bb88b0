//! Run-level classification.
//!
//! Maps the run's accumulated anomalies, deltas, and cluster losses to
//! exactly one classification label plus an overall confidence. Pure and
//! total; a run is INCONCLUSIVE exactly when no significant anomaly was
//! found or required upstream data was missing.

use tracing::info;

use crate::cluster::{dominant_cluster, ClusterLoss};
use crate::config::DiagnosisConfig;
use crate::types::{
    any_top_scope_drop, Anomaly, AnomalyKind, Confidence, Deltas, Metric, RunClassification,
};

/// Classify one run.
///
/// Decision order (first match wins): tracking gap, dominant cluster, CTR
/// with stable visibility, visibility, residual traffic drop. A detected
/// tracking gap outranks everything — when the instruments disagree, metric
/// conclusions built on them are suspect.
pub fn classify_run(
    cfg: &DiagnosisConfig,
    deltas: &Deltas,
    anomalies: &[Anomaly],
    cluster_losses: &[ClusterLoss],
) -> (RunClassification, Confidence) {
    let (classification, confidence) = decide(cfg, deltas, anomalies, cluster_losses);
    info!(classification = %classification, confidence = %confidence, "Run classified");
    (classification, confidence)
}

fn decide(
    cfg: &DiagnosisConfig,
    deltas: &Deltas,
    anomalies: &[Anomaly],
    cluster_losses: &[ClusterLoss],
) -> (RunClassification, Confidence) {
    // Required upstream data missing entirely.
    if deltas.is_empty() {
        return (RunClassification::Inconclusive, Confidence::Low);
    }

    // No significant anomaly anywhere.
    if anomalies.is_empty() {
        let confidence = if deltas.search.is_some() && deltas.analytics.is_some() {
            Confidence::High
        } else {
            // one family was unavailable; "nothing found" is weaker
            Confidence::Medium
        };
        return (RunClassification::Inconclusive, confidence);
    }

    // Instrumentation disagreement trumps metric conclusions.
    if let Some(gap) = anomalies.iter().find(|a| a.kind == AnomalyKind::TrackingGap) {
        let confidence = if gap.delta_pct.abs() >= cfg.thresholds.drop_pct.abs() * 2.0 {
            Confidence::High
        } else {
            Confidence::Medium
        };
        return (RunClassification::TrackingOrAttributionGap, confidence);
    }

    let top_drop = any_top_scope_drop(anomalies);
    let dominant = dominant_cluster(cluster_losses, cfg.thresholds.cluster_loss_share);

    // A dominant cluster explains the drop structurally.
    if dominant.is_some() {
        let confidence = if top_drop {
            Confidence::High
        } else {
            Confidence::Medium
        };
        return (RunClassification::PageClusterRegression, confidence);
    }

    let ctr_anomaly = anomalies
        .iter()
        .any(|a| a.is_top_scope() && a.kind == AnomalyKind::CtrDrop);
    let impressions_stable = stable(deltas, Metric::Impressions);
    let position_stable = stable(deltas, Metric::Position);

    // CTR-specific drop with stable impressions.
    if ctr_anomaly && impressions_stable == Some(true) {
        let confidence = if position_stable == Some(true) {
            Confidence::High
        } else {
            Confidence::Medium
        };
        return (RunClassification::CtrLoss, confidence);
    }

    // Impressions/position driven.
    let visibility_signals = anomalies
        .iter()
        .filter(|a| a.is_top_scope() && a.kind == AnomalyKind::ImpressionsDrop)
        .count();
    if visibility_signals > 0 {
        let confidence = if visibility_signals > 1 {
            Confidence::High
        } else {
            Confidence::Medium
        };
        return (RunClassification::VisibilityLoss, confidence);
    }

    // A residual traffic drop: clicks/sessions fell without a flagged
    // impressions or CTR anomaly.
    if top_drop {
        return match impressions_stable {
            // stable impressions mean fewer clicks per impression
            Some(true) => (RunClassification::CtrLoss, Confidence::Medium),
            Some(false) => (RunClassification::VisibilityLoss, Confidence::Medium),
            // impressions were not computable; visibility is the best guess
            None => (RunClassification::VisibilityLoss, Confidence::Low),
        };
    }

    // Only cluster-scope anomalies remain, none dominant.
    (RunClassification::PageClusterRegression, Confidence::Low)
}

/// `Some(true)` when the metric was computed and not flagged as a drop;
/// `None` when it was unavailable or insufficient.
fn stable(deltas: &Deltas, metric: Metric) -> Option<bool> {
    let search = deltas.search.as_ref()?;
    let delta = match metric {
        Metric::Impressions => &search.impressions,
        Metric::Position => &search.position,
        Metric::Clicks => &search.clicks,
        Metric::Ctr => &search.ctr,
        Metric::Sessions | Metric::Users => return None,
    };
    delta.as_computed().map(|s| !s.is_drop)
}
