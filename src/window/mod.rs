//! Window & Delta Calculator.
//!
//! Computes current-window vs baseline-window aggregates and deltas for each
//! tracked metric. The baseline window immediately precedes the current
//! window; both are sized by configuration. A baseline with fewer data days
//! than the configured floor yields `MetricDelta::Insufficient` — never a
//! percentage against a near-zero denominator.

use chrono::{Duration, NaiveDate};
use statrs::statistics::Statistics;
use std::collections::BTreeMap;
use tracing::debug;

use crate::config::DiagnosisConfig;
use crate::types::{
    AnalyticsDailyRollup, AnalyticsDeltas, DeltaStats, Deltas, Metric, MetricDelta,
    SearchDailyRollup, SearchDeltas, WindowBounds, WindowStats,
};

/// Stateless delta calculator parameterised by the run's config.
pub struct DeltaCalculator<'a> {
    cfg: &'a DiagnosisConfig,
}

impl<'a> DeltaCalculator<'a> {
    pub fn new(cfg: &'a DiagnosisConfig) -> Self {
        Self { cfg }
    }

    /// Window bounds for an as-of date: the current window ends on `as_of`,
    /// the baseline window ends the day before the current window starts.
    pub fn window_bounds(&self, as_of: NaiveDate) -> WindowBounds {
        let current_days = i64::from(self.cfg.windows.current_days);
        let baseline_days = i64::from(self.cfg.windows.baseline_days);
        let current_start = as_of - Duration::days(current_days - 1);
        let baseline_end = current_start - Duration::days(1);
        let baseline_start = baseline_end - Duration::days(baseline_days - 1);
        WindowBounds {
            current_start,
            current_end: as_of,
            baseline_start,
            baseline_end,
        }
    }

    /// Compute all family deltas for a run.
    ///
    /// A `None` family input means that family was unavailable upstream and
    /// stays `None` in the output; the distinction between "family missing"
    /// and "family present with an insufficient baseline" is preserved.
    pub fn compute(
        &self,
        as_of: NaiveDate,
        search: Option<&[SearchDailyRollup]>,
        analytics: Option<&[AnalyticsDailyRollup]>,
    ) -> Deltas {
        let window = self.window_bounds(as_of);

        let search_deltas = search.map(|rollups| self.compute_search(rollups, &window));
        let analytics_deltas = analytics.map(|rollups| self.compute_analytics(rollups, &window));

        debug!(
            current_start = %window.current_start,
            baseline_start = %window.baseline_start,
            search = search_deltas.is_some(),
            analytics = analytics_deltas.is_some(),
            "Deltas computed"
        );

        Deltas {
            window,
            search: search_deltas,
            analytics: analytics_deltas,
        }
    }

    fn compute_search(&self, rollups: &[SearchDailyRollup], window: &WindowBounds) -> SearchDeltas {
        let days = search_daily_series(rollups, window);

        let series = |f: &dyn Fn(&DailySearchTotals) -> Option<f64>| -> (Vec<f64>, Vec<f64>) {
            let mut baseline = Vec::new();
            let mut current = Vec::new();
            for (date, totals) in &days {
                if let Some(value) = f(totals) {
                    if window.contains_baseline(*date) {
                        baseline.push(value);
                    } else {
                        current.push(value);
                    }
                }
            }
            (baseline, current)
        };

        let (b_clicks, c_clicks) = series(&|t| Some(t.clicks));
        let (b_impr, c_impr) = series(&|t| Some(t.impressions));
        let (b_ctr, c_ctr) = series(&|t| t.ctr());
        let (b_pos, c_pos) = series(&|t| t.position());

        SearchDeltas {
            clicks: self.compute_metric(Metric::Clicks, &b_clicks, &c_clicks),
            impressions: self.compute_metric(Metric::Impressions, &b_impr, &c_impr),
            ctr: self.compute_metric(Metric::Ctr, &b_ctr, &c_ctr),
            position: self.compute_metric(Metric::Position, &b_pos, &c_pos),
        }
    }

    fn compute_analytics(
        &self,
        rollups: &[AnalyticsDailyRollup],
        window: &WindowBounds,
    ) -> AnalyticsDeltas {
        let mut daily: BTreeMap<NaiveDate, (f64, f64)> = BTreeMap::new();
        for rollup in rollups {
            if window.contains_baseline(rollup.date) || window.contains_current(rollup.date) {
                let entry = daily.entry(rollup.date).or_insert((0.0, 0.0));
                entry.0 += rollup.sessions;
                entry.1 += rollup.users;
            }
        }

        let mut b_sessions = Vec::new();
        let mut c_sessions = Vec::new();
        let mut b_users = Vec::new();
        let mut c_users = Vec::new();
        for (date, (sessions, users)) in &daily {
            if window.contains_baseline(*date) {
                b_sessions.push(*sessions);
                b_users.push(*users);
            } else {
                c_sessions.push(*sessions);
                c_users.push(*users);
            }
        }

        AnalyticsDeltas {
            sessions: self.compute_metric(Metric::Sessions, &b_sessions, &c_sessions),
            users: self.compute_metric(Metric::Users, &b_users, &c_users),
        }
    }

    /// Compare one metric's daily series across the two windows.
    fn compute_metric(
        &self,
        metric: Metric,
        baseline_values: &[f64],
        current_values: &[f64],
    ) -> MetricDelta {
        let baseline_days = baseline_values.len();
        let floor = self.cfg.windows.min_baseline_days as usize;
        if baseline_days < floor || current_values.is_empty() {
            return MetricDelta::Insufficient { baseline_days };
        }

        let baseline_mean = baseline_values.mean();
        let current_mean = current_values.mean();

        // A (near-)zero baseline mean makes a percentage meaningless; mark
        // the metric unavailable instead of reporting an inflated delta.
        if baseline_mean.abs() < 1e-9 {
            return MetricDelta::Insufficient { baseline_days };
        }

        let baseline_std = if baseline_days > 1 {
            baseline_values.std_dev()
        } else {
            0.0
        };

        let abs_delta = current_mean - baseline_mean;
        let pct_delta = abs_delta / baseline_mean * 100.0;

        let z_score = if baseline_days >= self.cfg.windows.z_score_min_baseline_days as usize
            && baseline_std > self.cfg.thresholds.min_std_floor
        {
            Some(abs_delta / baseline_std)
        } else {
            None
        };

        let stats = DeltaStats {
            baseline: WindowStats {
                sum: baseline_values.iter().sum(),
                mean: baseline_mean,
                std_dev: baseline_std,
                days: baseline_days,
            },
            current: WindowStats {
                sum: current_values.iter().sum(),
                mean: current_mean,
                std_dev: if current_values.len() > 1 {
                    current_values.std_dev()
                } else {
                    0.0
                },
                days: current_values.len(),
            },
            abs_delta,
            pct_delta,
            is_drop: false,
            z_score,
        };

        let is_drop = stats.effective_pct(metric) <= self.cfg.thresholds.drop_pct;
        MetricDelta::Computed(DeltaStats { is_drop, ..stats })
    }
}

// ============================================================================
// Daily series
// ============================================================================

/// One day of site-wide search totals.
#[derive(Debug, Default, Clone, Copy)]
struct DailySearchTotals {
    clicks: f64,
    impressions: f64,
    position_weighted: f64,
}

impl DailySearchTotals {
    /// Site-wide CTR for the day; `None` when there were no impressions.
    fn ctr(&self) -> Option<f64> {
        (self.impressions > 0.0).then(|| self.clicks / self.impressions)
    }

    /// Impressions-weighted average position; `None` without impressions.
    fn position(&self) -> Option<f64> {
        (self.impressions > 0.0).then(|| self.position_weighted / self.impressions)
    }
}

fn search_daily_series(
    rollups: &[SearchDailyRollup],
    window: &WindowBounds,
) -> BTreeMap<NaiveDate, DailySearchTotals> {
    let mut days: BTreeMap<NaiveDate, DailySearchTotals> = BTreeMap::new();
    for rollup in rollups {
        if !window.contains_baseline(rollup.date) && !window.contains_current(rollup.date) {
            continue;
        }
        let totals = days.entry(rollup.date).or_default();
        totals.clicks += rollup.clicks;
        totals.impressions += rollup.impressions;
        totals.position_weighted += rollup.position * rollup.impressions;
    }
    days
}

// ============================================================================
// Tests
// ============================================================================
