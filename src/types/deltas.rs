//! Window statistics and current-vs-baseline deltas.
//!
//! The key design decision here is the tri-state `MetricDelta`: a metric is
//! either `Computed` (both windows had enough data) or `Insufficient`
//! (baseline below the configured day floor). A missing baseline never
//! masquerades as a 100% drop.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Tracked metrics across the two upstream families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Clicks,
    Impressions,
    Ctr,
    Position,
    Sessions,
    Users,
}

impl Metric {
    /// Stable metric name used in anomaly records and log fields.
    pub fn name(self) -> &'static str {
        match self {
            Metric::Clicks => "clicks",
            Metric::Impressions => "impressions",
            Metric::Ctr => "ctr",
            Metric::Position => "position",
            Metric::Sessions => "sessions",
            Metric::Users => "users",
        }
    }

    /// Position is the one inverted metric: a *rise* in the position number
    /// is the regression.
    pub fn lower_is_better(self) -> bool {
        matches!(self, Metric::Position)
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Date bounds of the current and baseline windows for one run.
///
/// Both windows are inclusive; the baseline window immediately precedes the
/// current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowBounds {
    pub current_start: NaiveDate,
    pub current_end: NaiveDate,
    pub baseline_start: NaiveDate,
    pub baseline_end: NaiveDate,
}

impl WindowBounds {
    pub fn contains_current(&self, date: NaiveDate) -> bool {
        date >= self.current_start && date <= self.current_end
    }

    pub fn contains_baseline(&self, date: NaiveDate) -> bool {
        date >= self.baseline_start && date <= self.baseline_end
    }
}

/// Aggregate statistics for one metric over one window.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WindowStats {
    pub sum: f64,
    pub mean: f64,
    /// Sample standard deviation of the daily values (0.0 for a single day)
    pub std_dev: f64,
    /// Number of days in the window that actually had data
    pub days: usize,
}

/// Fully computed delta for one metric.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeltaStats {
    pub baseline: WindowStats,
    pub current: WindowStats,
    /// `current.mean - baseline.mean`
    pub abs_delta: f64,
    /// Percentage delta of the daily mean, signed (−40.0 = forty percent down)
    pub pct_delta: f64,
    /// Drop flag at the configured threshold, with position inverted
    pub is_drop: bool,
    /// Z-score of the current mean against the baseline distribution.
    /// `None` when the baseline had too few days or zero variance.
    pub z_score: Option<f64>,
}

impl DeltaStats {
    /// Delta with the sign normalised so that negative always means
    /// "got worse" — position's sign is flipped.
    pub fn effective_pct(&self, metric: Metric) -> f64 {
        if metric.lower_is_better() {
            -self.pct_delta
        } else {
            self.pct_delta
        }
    }

    /// Z-score with the same normalisation as [`Self::effective_pct`].
    pub fn effective_z(&self, metric: Metric) -> Option<f64> {
        self.z_score
            .map(|z| if metric.lower_is_better() { -z } else { z })
    }
}

/// Tri-state delta: computed, or explicitly not computable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum MetricDelta {
    Computed(DeltaStats),
    /// Baseline window had fewer data days than the configured floor,
    /// or a zero baseline made a percentage meaningless.
    Insufficient { baseline_days: usize },
}

impl MetricDelta {
    pub fn as_computed(&self) -> Option<&DeltaStats> {
        match self {
            MetricDelta::Computed(stats) => Some(stats),
            MetricDelta::Insufficient { .. } => None,
        }
    }

    pub fn is_insufficient(&self) -> bool {
        matches!(self, MetricDelta::Insufficient { .. })
    }
}

/// Search-visibility family deltas.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchDeltas {
    pub clicks: MetricDelta,
    pub impressions: MetricDelta,
    pub ctr: MetricDelta,
    pub position: MetricDelta,
}

impl SearchDeltas {
    /// Iterate metrics in a fixed order for deterministic downstream output.
    pub fn iter(&self) -> [(Metric, &MetricDelta); 4] {
        [
            (Metric::Clicks, &self.clicks),
            (Metric::Impressions, &self.impressions),
            (Metric::Ctr, &self.ctr),
            (Metric::Position, &self.position),
        ]
    }
}

/// Analytics family deltas.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsDeltas {
    pub sessions: MetricDelta,
    pub users: MetricDelta,
}

impl AnalyticsDeltas {
    pub fn iter(&self) -> [(Metric, &MetricDelta); 2] {
        [
            (Metric::Sessions, &self.sessions),
            (Metric::Users, &self.users),
        ]
    }
}

/// Snapshot of all current-vs-baseline deltas for one run.
///
/// A `None` family means the upstream fetch for that family was unavailable
/// (timed out, failed, or returned nothing at all) — distinct from a family
/// that was fetched but had an insufficient baseline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deltas {
    pub window: WindowBounds,
    pub search: Option<SearchDeltas>,
    pub analytics: Option<AnalyticsDeltas>,
}

impl Deltas {
    /// True when neither metric family produced any usable deltas.
    pub fn is_empty(&self) -> bool {
        self.search.is_none() && self.analytics.is_none()
    }
}
