//! Anomaly records — significant metric drops detected for a scope.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Category of a detected anomaly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    /// Clicks or sessions dropped
    TrafficDrop,
    /// Impressions dropped or average position regressed (visibility)
    ImpressionsDrop,
    /// CTR dropped
    CtrDrop,
    /// A single page cluster accounts for the drop
    PageClusterDrop,
    /// Analytics and search-console disagree — instrumentation suspect
    TrackingGap,
}

impl std::fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AnomalyKind::TrafficDrop => "traffic_drop",
            AnomalyKind::ImpressionsDrop => "impressions_drop",
            AnomalyKind::CtrDrop => "ctr_drop",
            AnomalyKind::PageClusterDrop => "page_cluster_drop",
            AnomalyKind::TrackingGap => "tracking_gap",
        };
        f.write_str(s)
    }
}

/// One detected significant change. Belongs to exactly one run; append-only.
///
/// `scope` is a free-form key/value map (`channel`, `cluster`, …). An anomaly
/// with no `cluster` key is a top-scope anomaly; at least one of those must
/// exist for the run to count as "a drop occurred". A `BTreeMap` keeps the
/// serialised scope deterministic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Anomaly {
    pub kind: AnomalyKind,
    /// Current-window start
    pub start_date: NaiveDate,
    /// Current-window end
    pub end_date: NaiveDate,
    /// Metric name, e.g. `"clicks"`
    pub metric: String,
    /// Baseline daily mean
    pub baseline_value: f64,
    /// Current daily mean
    pub observed_value: f64,
    /// Signed percentage delta
    pub delta_pct: f64,
    /// Z-score when the baseline supported one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z_score: Option<f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub scope: BTreeMap<String, String>,
}

impl Anomaly {
    /// True when this anomaly is not scoped to a single cluster.
    pub fn is_top_scope(&self) -> bool {
        !self.scope.contains_key("cluster")
    }

    pub fn cluster(&self) -> Option<&str> {
        self.scope.get("cluster").map(String::as_str)
    }
}

/// True when at least one top-scope (non-cluster) anomaly exists.
pub fn any_top_scope_drop(anomalies: &[Anomaly]) -> bool {
    anomalies.iter().any(Anomaly::is_top_scope)
}
