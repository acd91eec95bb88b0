//! Run-level classification labels.

use serde::{Deserialize, Serialize};

/// Exactly one classification per run, derived from the accumulated
/// anomalies and the top hypothesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunClassification {
    /// Impressions/position driven drop
    VisibilityLoss,
    /// CTR-specific drop with stable impressions
    CtrLoss,
    /// A dominant cluster accounts for the loss
    PageClusterRegression,
    /// Analytics and search-console disagree sharply — instrumentation broke
    TrackingOrAttributionGap,
    /// No significant anomaly, or insufficient data across all metrics
    Inconclusive,
}

impl RunClassification {
    pub fn as_str(self) -> &'static str {
        match self {
            RunClassification::VisibilityLoss => "VISIBILITY_LOSS",
            RunClassification::CtrLoss => "CTR_LOSS",
            RunClassification::PageClusterRegression => "PAGE_CLUSTER_REGRESSION",
            RunClassification::TrackingOrAttributionGap => "TRACKING_OR_ATTRIBUTION_GAP",
            RunClassification::Inconclusive => "INCONCLUSIVE",
        }
    }
}

impl std::fmt::Display for RunClassification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
