//! Anomaly Detector.
//!
//! Decides significance per metric/scope by OR-ing two independent rules:
//! the percentage-delta rule (effective delta ≤ `drop_pct`) and the
//! statistical rule (z-score ≤ `z_score`). The z rule only participates
//! when the calculator could compute a z-score at all — an insufficient
//! baseline silently reduces detection to the percentage rule, and an
//! `Insufficient` metric never produces an anomaly.

use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::cluster::ClusterLoss;
use crate::config::DiagnosisConfig;
use crate::types::{Anomaly, AnomalyKind, DeltaStats, Deltas, Metric};

/// Stateless detector parameterised by the run's config.
pub struct AnomalyDetector<'a> {
    cfg: &'a DiagnosisConfig,
}

impl<'a> AnomalyDetector<'a> {
    pub fn new(cfg: &'a DiagnosisConfig) -> Self {
        Self { cfg }
    }

    /// Detect all anomalies for a run: overall per-metric, per-cluster, and
    /// the cross-family tracking gap.
    pub fn detect(&self, deltas: &Deltas, cluster_losses: &[ClusterLoss]) -> Vec<Anomaly> {
        let mut anomalies = Vec::new();

        if let Some(search) = &deltas.search {
            for (metric, delta) in search.iter() {
                if let Some(stats) = delta.as_computed() {
                    if self.is_significant(metric, stats) {
                        anomalies.push(self.metric_anomaly(deltas, metric, stats, "search_console"));
                    }
                }
            }
        }

        if let Some(analytics) = &deltas.analytics {
            for (metric, delta) in analytics.iter() {
                if let Some(stats) = delta.as_computed() {
                    if self.is_significant(metric, stats) {
                        anomalies.push(self.metric_anomaly(deltas, metric, stats, "analytics"));
                    }
                }
            }
        }

        anomalies.extend(self.cluster_anomalies(deltas, cluster_losses));

        if let Some(gap) = self.tracking_gap(deltas) {
            anomalies.push(gap);
        }

        info!(anomalies = anomalies.len(), "Anomaly detection complete");
        anomalies
    }

    /// Percentage rule OR z-score rule, both sign-normalised so that
    /// "worse" is negative.
    fn is_significant(&self, metric: Metric, stats: &DeltaStats) -> bool {
        let pct_rule = stats.effective_pct(metric) <= self.cfg.thresholds.drop_pct;
        let z_rule = stats
            .effective_z(metric)
            .map(|z| z <= self.cfg.thresholds.z_score)
            .unwrap_or(false);
        pct_rule || z_rule
    }

    fn metric_anomaly(
        &self,
        deltas: &Deltas,
        metric: Metric,
        stats: &DeltaStats,
        channel: &str,
    ) -> Anomaly {
        let mut scope = BTreeMap::new();
        scope.insert("channel".to_string(), channel.to_string());
        Anomaly {
            kind: kind_for(metric),
            start_date: deltas.window.current_start,
            end_date: deltas.window.current_end,
            metric: metric.name().to_string(),
            baseline_value: stats.baseline.mean,
            observed_value: stats.current.mean,
            delta_pct: stats.pct_delta,
            z_score: stats.z_score,
            scope,
        }
    }

    /// Per-cluster anomalies via the percentage rule. Cluster aggregates
    /// carry no distribution, so the z rule does not apply at this scope.
    fn cluster_anomalies(&self, deltas: &Deltas, losses: &[ClusterLoss]) -> Vec<Anomaly> {
        let mut anomalies = Vec::new();
        for loss in losses {
            if loss.baseline_daily_clicks <= 0.0 {
                continue;
            }
            let pct_delta = -loss.loss / loss.baseline_daily_clicks * 100.0;
            if pct_delta > self.cfg.thresholds.drop_pct {
                continue;
            }
            let mut scope = BTreeMap::new();
            scope.insert("channel".to_string(), "search_console".to_string());
            scope.insert("cluster".to_string(), loss.cluster.clone());
            anomalies.push(Anomaly {
                kind: AnomalyKind::PageClusterDrop,
                start_date: deltas.window.current_start,
                end_date: deltas.window.current_end,
                metric: "clicks".to_string(),
                baseline_value: loss.baseline_daily_clicks,
                observed_value: loss.current_daily_clicks,
                delta_pct: pct_delta,
                z_score: None,
                scope,
            });
        }
        debug!(cluster_anomalies = anomalies.len(), "Cluster scope evaluated");
        anomalies
    }

    /// Sharp analytics-vs-search disagreement: sessions collapse while
    /// search clicks hold steady. Points at instrumentation, not traffic.
    fn tracking_gap(&self, deltas: &Deltas) -> Option<Anomaly> {
        let sessions = deltas
            .analytics
            .as_ref()
            .and_then(|a| a.sessions.as_computed())?;
        let clicks = deltas.search.as_ref().and_then(|s| s.clicks.as_computed())?;

        let sessions_pct = sessions.effective_pct(Metric::Sessions);
        let clicks_pct = clicks.effective_pct(Metric::Clicks);

        let sessions_dropped = self.is_significant(Metric::Sessions, sessions);
        let clicks_stable = !self.is_significant(Metric::Clicks, clicks);
        let disagreement = clicks_pct - sessions_pct
            >= self.cfg.thresholds.drop_pct.abs() * self.cfg.thresholds.tracking_disagreement_factor;

        if !(sessions_dropped && clicks_stable && disagreement) {
            return None;
        }

        let mut scope = BTreeMap::new();
        scope.insert(
            "comparison".to_string(),
            "analytics_vs_search_console".to_string(),
        );
        Some(Anomaly {
            kind: AnomalyKind::TrackingGap,
            start_date: deltas.window.current_start,
            end_date: deltas.window.current_end,
            metric: "sessions".to_string(),
            baseline_value: sessions.baseline.mean,
            observed_value: sessions.current.mean,
            delta_pct: sessions.pct_delta,
            z_score: sessions.z_score,
            scope,
        })
    }
}

fn kind_for(metric: Metric) -> AnomalyKind {
    match metric {
        Metric::Clicks | Metric::Sessions | Metric::Users => AnomalyKind::TrafficDrop,
        Metric::Impressions | Metric::Position => AnomalyKind::ImpressionsDrop,
        Metric::Ctr => AnomalyKind::CtrDrop,
    }
}
