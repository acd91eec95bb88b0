//! Cluster Loss Analyzer - which cluster(s) account for the click loss.
//!
//! Page-level click rollups are grouped through the classifier, normalised
//! to a daily rate per window, and compared. Only clusters with positive
//! loss produce a row, so the loss shares of a run sum to at most 1.0.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use super::ClusterClassifier;
use crate::types::{SearchDailyRollup, WindowBounds};

/// Per-cluster click loss for one run. Derived, never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterLoss {
    pub cluster: String,
    /// Baseline clicks normalised to a daily rate
    pub baseline_daily_clicks: f64,
    /// Current-window clicks normalised to a daily rate
    pub current_daily_clicks: f64,
    /// Daily clicks lost (`baseline - current`, always > 0 here)
    pub loss: f64,
    /// This cluster's share of the total loss (0, 1]
    pub loss_share: f64,
    /// Distinct pages observed in this cluster across both windows
    pub page_count: usize,
}

/// Compute per-cluster loss rows from page-level search rollups.
///
/// Returns rows sorted by loss descending (ties broken by cluster name) so
/// downstream output is deterministic. Clusters with zero or negative loss
/// are omitted.
pub fn analyze_cluster_loss(
    rollups: &[SearchDailyRollup],
    bounds: &WindowBounds,
    classifier: &ClusterClassifier,
) -> Vec<ClusterLoss> {
    let mut baseline_clicks: BTreeMap<String, f64> = BTreeMap::new();
    let mut current_clicks: BTreeMap<String, f64> = BTreeMap::new();
    let mut pages: BTreeMap<String, BTreeSet<&str>> = BTreeMap::new();

    for rollup in rollups {
        let in_baseline = bounds.contains_baseline(rollup.date);
        let in_current = bounds.contains_current(rollup.date);
        if !in_baseline && !in_current {
            continue;
        }

        let cluster = classifier.classify(&rollup.page);
        if in_baseline {
            *baseline_clicks.entry(cluster.clone()).or_default() += rollup.clicks;
        } else {
            *current_clicks.entry(cluster.clone()).or_default() += rollup.clicks;
        }
        pages.entry(cluster).or_default().insert(rollup.page.as_str());
    }

    let baseline_days = f64::from(days_in(bounds.baseline_start, bounds.baseline_end));
    let current_days = f64::from(days_in(bounds.current_start, bounds.current_end));

    let mut rows: Vec<ClusterLoss> = Vec::new();
    let clusters: BTreeSet<&String> = baseline_clicks.keys().chain(current_clicks.keys()).collect();
    for cluster in clusters {
        let baseline_rate = baseline_clicks.get(cluster).copied().unwrap_or(0.0) / baseline_days;
        let current_rate = current_clicks.get(cluster).copied().unwrap_or(0.0) / current_days;
        let loss = baseline_rate - current_rate;
        if loss <= 0.0 {
            continue;
        }
        rows.push(ClusterLoss {
            cluster: cluster.clone(),
            baseline_daily_clicks: baseline_rate,
            current_daily_clicks: current_rate,
            loss,
            loss_share: 0.0,
            page_count: pages.get(cluster).map_or(0, BTreeSet::len),
        });
    }

    let total_loss: f64 = rows.iter().map(|r| r.loss).sum();
    if total_loss > 0.0 {
        for row in &mut rows {
            row.loss_share = row.loss / total_loss;
        }
    }

    rows.sort_by(|a, b| {
        b.loss
            .partial_cmp(&a.loss)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.cluster.cmp(&b.cluster))
    });

    debug!(clusters = rows.len(), total_loss, "Cluster loss analysis complete");
    rows
}

/// The dominant cluster, if any single cluster's loss share reaches the
/// configured threshold.
pub fn dominant_cluster(losses: &[ClusterLoss], share_threshold: f64) -> Option<&ClusterLoss> {
    losses.iter().find(|l| l.loss_share >= share_threshold)
}

fn days_in(start: chrono::NaiveDate, end: chrono::NaiveDate) -> u32 {
    u32::try_from((end - start).num_days() + 1).unwrap_or(1).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClusterConfig;
    use chrono::NaiveDate;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    fn bounds() -> WindowBounds {
        // baseline Mar 1-14, current Mar 15-17
        WindowBounds {
            baseline_start: date(1),
            baseline_end: date(14),
            current_start: date(15),
            current_end: date(17),
        }
    }

    fn rollup(day: u32, page: &str, clicks: f64) -> SearchDailyRollup {
        SearchDailyRollup {
            date: date(day),
            page: page.to_string(),
            query: None,
            clicks,
            impressions: clicks * 20.0,
            ctr: 0.05,
            position: 5.0,
        }
    }

    fn classifier() -> ClusterClassifier {
        ClusterClassifier::compile(&ClusterConfig::default()).unwrap()
    }

    #[test]
    fn loss_shares_sum_to_at_most_one() {
        let mut rollups = Vec::new();
        // /services/ pages: 100 clicks/day baseline, 20/day current
        // /blog/ pages: 50 clicks/day baseline, 40/day current
        for day in 1..=14 {
            rollups.push(rollup(day, "/services/a", 100.0));
            rollups.push(rollup(day, "/blog/b", 50.0));
        }
        for day in 15..=17 {
            rollups.push(rollup(day, "/services/a", 20.0));
            rollups.push(rollup(day, "/blog/b", 40.0));
        }

        let rows = analyze_cluster_loss(&rollups, &bounds(), &classifier());
        let share_sum: f64 = rows.iter().map(|r| r.loss_share).sum();
        assert!(share_sum <= 1.0 + 1e-9, "shares sum to {share_sum}");
        assert!(share_sum > 0.99, "all loss accounted for: {share_sum}");
    }

    #[test]
    fn gaining_clusters_are_omitted() {
        let mut rollups = Vec::new();
        for day in 1..=14 {
            rollups.push(rollup(day, "/services/a", 100.0));
            rollups.push(rollup(day, "/blog/b", 10.0));
        }
        for day in 15..=17 {
            rollups.push(rollup(day, "/services/a", 20.0));
            rollups.push(rollup(day, "/blog/b", 50.0)); // blog is up
        }

        let rows = analyze_cluster_loss(&rollups, &bounds(), &classifier());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].cluster, "/services/*");
        assert!((rows[0].loss_share - 1.0).abs() < 1e-9);
    }

    #[test]
    fn dominant_cluster_requires_share_threshold() {
        let mut rollups = Vec::new();
        // 80% of loss from /services/
        for day in 1..=14 {
            rollups.push(rollup(day, "/services/a", 100.0));
            rollups.push(rollup(day, "/blog/b", 25.0));
        }
        for day in 15..=17 {
            rollups.push(rollup(day, "/services/a", 20.0)); // -80/day
            rollups.push(rollup(day, "/blog/b", 5.0)); // -20/day
        }

        let rows = analyze_cluster_loss(&rollups, &bounds(), &classifier());
        let dominant = dominant_cluster(&rows, 0.6).unwrap();
        assert_eq!(dominant.cluster, "/services/*");
        assert!(dominant.loss_share >= 0.6);

        // With an even split no cluster dominates at 0.6
        assert!(dominant_cluster(&rows, 0.9).is_none());
    }

    #[test]
    fn no_data_yields_no_rows() {
        let rows = analyze_cluster_loss(&[], &bounds(), &classifier());
        assert!(rows.is_empty());
    }

    #[test]
    fn page_counts_are_distinct_pages() {
        let mut rollups = Vec::new();
        for day in 1..=14 {
            rollups.push(rollup(day, "/services/a", 50.0));
            rollups.push(rollup(day, "/services/b", 50.0));
        }
        for day in 15..=17 {
            rollups.push(rollup(day, "/services/a", 10.0));
            rollups.push(rollup(day, "/services/b", 10.0));
        }
        let rows = analyze_cluster_loss(&rollups, &bounds(), &classifier());
        assert_eq!(rows[0].page_count, 2);
    }
}
