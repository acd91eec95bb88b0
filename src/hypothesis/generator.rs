//! Evidence gathering and deterministic ranking for the hypothesis catalog.
//!
//! Each catalog key has its own gather function that inspects the run's
//! anomalies, cluster losses, and page checks and returns tagged evidence
//! blocks. The confidence algorithm itself lives in `evidence.rs`; a key
//! with no supporting evidence is not emitted at all.

use serde_json::json;
use tracing::info;

use super::catalog;
use super::evidence::score_confidence;
use crate::cluster::{dominant_cluster, ClusterClassifier, ClusterLoss};
use crate::config::DiagnosisConfig;
use crate::types::{
    Anomaly, AnomalyKind, DeltaStats, Deltas, EvidenceBlock, EvidenceKind, EvidenceStrength,
    Hypothesis, HypothesisKey, Metric, PageCheck,
};

/// Everything the generator may consult for one run.
pub struct EvidenceContext<'a> {
    pub deltas: &'a Deltas,
    pub anomalies: &'a [Anomaly],
    pub cluster_losses: &'a [ClusterLoss],
    pub checks: &'a [PageCheck],
    pub classifier: &'a ClusterClassifier,
}

impl EvidenceContext<'_> {
    fn search_stats(&self, metric: Metric) -> Option<&DeltaStats> {
        let search = self.deltas.search.as_ref()?;
        let delta = match metric {
            Metric::Clicks => &search.clicks,
            Metric::Impressions => &search.impressions,
            Metric::Ctr => &search.ctr,
            Metric::Position => &search.position,
            Metric::Sessions | Metric::Users => return None,
        };
        delta.as_computed()
    }

    fn top_anomaly(&self, metric: &str) -> Option<&Anomaly> {
        self.anomalies
            .iter()
            .find(|a| a.is_top_scope() && a.metric == metric && a.kind != AnomalyKind::TrackingGap)
    }

    fn tracking_gap(&self) -> Option<&Anomaly> {
        self.anomalies
            .iter()
            .find(|a| a.kind == AnomalyKind::TrackingGap)
    }

    fn dominant(&self, share_threshold: f64) -> Option<&ClusterLoss> {
        dominant_cluster(self.cluster_losses, share_threshold)
    }

    /// True when any page check surfaced a crawl-level fault.
    fn has_technical_findings(&self, min_text_length: u32) -> bool {
        self.checks.iter().any(|c| {
            c.is_robots_blocked()
                || c.is_noindexed()
                || c.has_canonical_mismatch()
                || c.http_status >= 400
                || c.text_length.map(|l| l < min_text_length).unwrap_or(false)
        })
    }
}

/// What one gather function produced for its key.
#[derive(Default)]
struct Gathered {
    support: Vec<EvidenceBlock>,
    disconfirming: Vec<EvidenceBlock>,
    missing: Vec<String>,
    summary: String,
}

/// Stateless generator parameterised by the run's config.
pub struct HypothesisGenerator<'a> {
    cfg: &'a DiagnosisConfig,
}

impl<'a> HypothesisGenerator<'a> {
    pub fn new(cfg: &'a DiagnosisConfig) -> Self {
        Self { cfg }
    }

    /// Evaluate the full catalog and return ranked hypotheses.
    ///
    /// Ranking is a pure function of the inputs: confidence bucket first,
    /// then the static priority tier, then catalog order. Two runs over
    /// identical inputs produce byte-for-byte identical rankings.
    pub fn generate(&self, ctx: &EvidenceContext) -> Vec<Hypothesis> {
        let mut hypotheses: Vec<Hypothesis> = Vec::new();

        for key in HypothesisKey::CATALOG {
            let mut gathered = self.gather(key, ctx);
            let Some(confidence) = score_confidence(&gathered.support, &gathered.disconfirming)
            else {
                continue;
            };
            // strongest evidence first
            gathered.support.sort_by(|a, b| b.strength.cmp(&a.strength));
            hypotheses.push(Hypothesis {
                rank: 0,
                key,
                confidence,
                summary: gathered.summary,
                evidence: gathered.support,
                disconfirming: gathered.disconfirming,
                missing_data: gathered.missing,
            });
        }

        hypotheses.sort_by(|a, b| {
            b.confidence
                .cmp(&a.confidence)
                .then_with(|| catalog::priority(a.key).cmp(&catalog::priority(b.key)))
                .then_with(|| a.key.catalog_index().cmp(&b.key.catalog_index()))
        });
        for (i, hypothesis) in hypotheses.iter_mut().enumerate() {
            hypothesis.rank = u32::try_from(i + 1).unwrap_or(u32::MAX);
        }

        info!(hypotheses = hypotheses.len(), "Hypothesis generation complete");
        hypotheses
    }

    fn gather(&self, key: HypothesisKey, ctx: &EvidenceContext) -> Gathered {
        match key {
            HypothesisKey::RobotsOrNoindex => self.gather_robots(ctx),
            HypothesisKey::CanonicalMismatch => self.gather_canonical(ctx),
            HypothesisKey::RedirectOrHttpChange => self.gather_redirects(ctx),
            HypothesisKey::ThinContentOrSsrRegression => self.gather_thin_content(ctx),
            HypothesisKey::StructuredDataBreakage => self.gather_structured_data(ctx),
            HypothesisKey::InternalLinkingBreakage => self.gather_internal_links(ctx),
            HypothesisKey::ContentIntentMismatch => self.gather_intent(ctx),
            HypothesisKey::SerpLayoutCtrShift => self.gather_serp_layout(ctx),
            HypothesisKey::AlgorithmUpdate => self.gather_algorithm(ctx),
            HypothesisKey::Seasonality => self.gather_seasonality(ctx),
            HypothesisKey::TrackingMisconfiguration => self.gather_tracking(ctx),
        }
    }

    // ------------------------------------------------------------------
    // Technical keys
    // ------------------------------------------------------------------

    fn gather_robots(&self, ctx: &EvidenceContext) -> Gathered {
        let mut g = Gathered::default();
        if ctx.checks.is_empty() {
            g.missing.push("crawl/render checks for affected pages".to_string());
            return g;
        }

        let blocked: Vec<&PageCheck> =
            ctx.checks.iter().filter(|c| c.is_robots_blocked()).collect();
        let noindexed: Vec<&PageCheck> = ctx.checks.iter().filter(|c| c.is_noindexed()).collect();

        if let Some(example) = blocked.first() {
            g.support.push(EvidenceBlock::new(
                EvidenceKind::Check,
                EvidenceStrength::Strong,
                format!(
                    "{} checked page(s) are disallowed by robots.txt (e.g. {} via rule '{}')",
                    blocked.len(),
                    example.url,
                    example.robots_disallow.first().map_or("", String::as_str),
                ),
                json!({
                    "blocked_pages": blocked.len(),
                    "example_url": example.url,
                    "rules": example.robots_disallow,
                }),
            ));
        }
        if let Some(example) = noindexed.first() {
            g.support.push(EvidenceBlock::new(
                EvidenceKind::Check,
                EvidenceStrength::Strong,
                format!(
                    "{} checked page(s) carry a noindex meta directive (e.g. {})",
                    noindexed.len(),
                    example.url
                ),
                json!({ "noindexed_pages": noindexed.len(), "example_url": example.url }),
            ));
        }

        // Structural corroboration: the blocked pages sit in the cluster
        // that owns the loss.
        if let Some(dominant) = ctx.dominant(self.cfg.thresholds.cluster_loss_share) {
            let blocked_in_cluster = blocked
                .iter()
                .filter(|c| ctx.classifier.classify(&c.url) == dominant.cluster)
                .count();
            if blocked_in_cluster > 0 {
                g.support.push(EvidenceBlock::new(
                    EvidenceKind::Comparison,
                    EvidenceStrength::Moderate,
                    format!(
                        "blocked pages concentrate in {} which carries {:.0}% of the click loss",
                        dominant.cluster,
                        dominant.loss_share * 100.0
                    ),
                    json!({
                        "cluster": dominant.cluster,
                        "loss_share": dominant.loss_share,
                        "blocked_in_cluster": blocked_in_cluster,
                    }),
                ));
            }
        }

        if blocked.is_empty() && noindexed.is_empty() {
            g.disconfirming.push(EvidenceBlock::new(
                EvidenceKind::Check,
                EvidenceStrength::Moderate,
                format!(
                    "{} page(s) checked; robots.txt and meta robots are clean",
                    ctx.checks.len()
                ),
                json!({ "checked_pages": ctx.checks.len() }),
            ));
        }

        g.summary = format!(
            "{} page(s) blocked from indexing ({} robots.txt, {} noindex)",
            blocked.len() + noindexed.len(),
            blocked.len(),
            noindexed.len()
        );
        g
    }

    fn gather_canonical(&self, ctx: &EvidenceContext) -> Gathered {
        let mut g = Gathered::default();
        if ctx.checks.is_empty() {
            g.missing.push("canonical tag audit for affected pages".to_string());
            return g;
        }

        let mismatched: Vec<&PageCheck> = ctx
            .checks
            .iter()
            .filter(|c| c.has_canonical_mismatch())
            .collect();
        let absent = ctx
            .checks
            .iter()
            .filter(|c| c.canonical_url.is_none())
            .count();

        if let Some(example) = mismatched.first() {
            g.support.push(EvidenceBlock::new(
                EvidenceKind::Check,
                EvidenceStrength::Strong,
                format!(
                    "{} checked page(s) canonicalise away from themselves (e.g. {} -> {})",
                    mismatched.len(),
                    example.url,
                    example.canonical_url.as_deref().unwrap_or("?"),
                ),
                json!({
                    "mismatched_pages": mismatched.len(),
                    "example_url": example.url,
                    "canonical": example.canonical_url,
                }),
            ));
        } else if absent > 0 && absent == ctx.checks.len() {
            g.support.push(EvidenceBlock::new(
                EvidenceKind::Check,
                EvidenceStrength::Weak,
                format!("all {absent} checked page(s) lack a canonical tag"),
                json!({ "pages_without_canonical": absent }),
            ));
        } else {
            g.disconfirming.push(EvidenceBlock::new(
                EvidenceKind::Check,
                EvidenceStrength::Moderate,
                format!(
                    "{} page(s) checked; canonical tags are self-referential",
                    ctx.checks.len()
                ),
                json!({ "checked_pages": ctx.checks.len() }),
            ));
        }

        g.summary = format!("{} page(s) with canonical mismatch", mismatched.len());
        g
    }

    fn gather_redirects(&self, ctx: &EvidenceContext) -> Gathered {
        let mut g = Gathered::default();
        if ctx.checks.is_empty() {
            g.missing.push("HTTP status and redirect-map history".to_string());
            return g;
        }

        let errored: Vec<&PageCheck> =
            ctx.checks.iter().filter(|c| c.http_status >= 400).collect();
        let redirected: Vec<&PageCheck> = ctx
            .checks
            .iter()
            .filter(|c| (300..400).contains(&c.http_status) && c.redirect_target.is_some())
            .collect();

        if let Some(example) = errored.first() {
            g.support.push(EvidenceBlock::new(
                EvidenceKind::Check,
                EvidenceStrength::Strong,
                format!(
                    "{} checked page(s) return HTTP errors (e.g. {} -> {})",
                    errored.len(),
                    example.url,
                    example.http_status
                ),
                json!({ "error_pages": errored.len(), "example_url": example.url, "status": example.http_status }),
            ));
        }
        if let Some(example) = redirected.first() {
            g.support.push(EvidenceBlock::new(
                EvidenceKind::Check,
                EvidenceStrength::Moderate,
                format!(
                    "{} checked page(s) now redirect (e.g. {} -> {})",
                    redirected.len(),
                    example.url,
                    example.redirect_target.as_deref().unwrap_or("?"),
                ),
                json!({ "redirected_pages": redirected.len(), "example_url": example.url }),
            ));
        }
        if errored.is_empty() && redirected.is_empty() {
            g.disconfirming.push(EvidenceBlock::new(
                EvidenceKind::Check,
                EvidenceStrength::Moderate,
                format!("{} page(s) checked; all respond 200", ctx.checks.len()),
                json!({ "checked_pages": ctx.checks.len() }),
            ));
        }

        g.summary = format!(
            "{} HTTP error page(s), {} unexpected redirect(s)",
            errored.len(),
            redirected.len()
        );
        g
    }

    fn gather_thin_content(&self, ctx: &EvidenceContext) -> Gathered {
        let mut g = Gathered::default();
        let min_len = self.cfg.thresholds.min_text_length;

        let measured: Vec<&PageCheck> = ctx
            .checks
            .iter()
            .filter(|c| c.text_length.is_some())
            .collect();
        if measured.is_empty() {
            g.missing
                .push("rendered text length from the crawl/render worker".to_string());
            return g;
        }

        let thin: Vec<&PageCheck> = measured
            .iter()
            .copied()
            .filter(|c| c.text_length.map(|l| l < min_len).unwrap_or(false))
            .collect();

        if let Some(example) = thin.first() {
            g.support.push(EvidenceBlock::new(
                EvidenceKind::Check,
                EvidenceStrength::Strong,
                format!(
                    "{} checked page(s) render under {} chars of text (e.g. {} at {} chars) — likely SSR/hydration fault",
                    thin.len(),
                    min_len,
                    example.url,
                    example.text_length.unwrap_or(0),
                ),
                json!({
                    "thin_pages": thin.len(),
                    "min_text_length": min_len,
                    "example_url": example.url,
                    "example_length": example.text_length,
                }),
            ));
        } else {
            g.disconfirming.push(EvidenceBlock::new(
                EvidenceKind::Check,
                EvidenceStrength::Moderate,
                format!(
                    "{} page(s) measured; rendered text length is above the {min_len}-char floor",
                    measured.len()
                ),
                json!({ "measured_pages": measured.len() }),
            ));
        }

        g.summary = format!("{} page(s) rendering thin content", thin.len());
        g
    }

    fn gather_structured_data(&self, ctx: &EvidenceContext) -> Gathered {
        let mut g = Gathered::default();
        let validated: Vec<&PageCheck> = ctx
            .checks
            .iter()
            .filter(|c| c.structured_data_valid.is_some())
            .collect();
        if validated.is_empty() {
            g.missing
                .push("structured-data validation results for affected pages".to_string());
            return g;
        }

        let invalid: Vec<&PageCheck> = validated
            .iter()
            .copied()
            .filter(|c| c.structured_data_valid == Some(false))
            .collect();

        if let Some(example) = invalid.first() {
            g.support.push(EvidenceBlock::new(
                EvidenceKind::Check,
                EvidenceStrength::Moderate,
                format!(
                    "{} checked page(s) fail structured-data validation (e.g. {})",
                    invalid.len(),
                    example.url
                ),
                json!({ "invalid_pages": invalid.len(), "example_url": example.url }),
            ));
            if let Some(ctr) = ctx.top_anomaly("ctr") {
                g.support.push(EvidenceBlock::new(
                    EvidenceKind::Metric,
                    EvidenceStrength::Weak,
                    format!(
                        "CTR fell {:.1}% concurrently — consistent with rich-result loss",
                        ctr.delta_pct.abs()
                    ),
                    json!({ "ctr_delta_pct": ctr.delta_pct }),
                ));
            }
        } else {
            g.disconfirming.push(EvidenceBlock::new(
                EvidenceKind::Check,
                EvidenceStrength::Moderate,
                format!("{} page(s) validated; structured data is intact", validated.len()),
                json!({ "validated_pages": validated.len() }),
            ));
        }

        g.summary = format!("{} page(s) failing structured-data validation", invalid.len());
        g
    }

    fn gather_internal_links(&self, ctx: &EvidenceContext) -> Gathered {
        let mut g = Gathered::default();
        let counted: Vec<&PageCheck> = ctx
            .checks
            .iter()
            .filter(|c| c.internal_link_count.is_some())
            .collect();
        if counted.is_empty() {
            g.missing
                .push("internal link graph from the crawl worker".to_string());
            return g;
        }

        let orphaned: Vec<&PageCheck> = counted
            .iter()
            .copied()
            .filter(|c| c.internal_link_count == Some(0))
            .collect();

        if let Some(example) = orphaned.first() {
            g.support.push(EvidenceBlock::new(
                EvidenceKind::Check,
                EvidenceStrength::Moderate,
                format!(
                    "{} checked page(s) receive zero internal links (e.g. {})",
                    orphaned.len(),
                    example.url
                ),
                json!({ "orphaned_pages": orphaned.len(), "example_url": example.url }),
            ));
            if let Some(dominant) = ctx.dominant(self.cfg.thresholds.cluster_loss_share) {
                g.support.push(EvidenceBlock::new(
                    EvidenceKind::Comparison,
                    EvidenceStrength::Weak,
                    format!(
                        "loss concentrates in {} — templated navigation breakage hits a cluster together",
                        dominant.cluster
                    ),
                    json!({ "cluster": dominant.cluster, "loss_share": dominant.loss_share }),
                ));
            }
        } else {
            g.disconfirming.push(EvidenceBlock::new(
                EvidenceKind::Check,
                EvidenceStrength::Moderate,
                format!("{} page(s) counted; internal links present", counted.len()),
                json!({ "counted_pages": counted.len() }),
            ));
        }

        g.summary = format!("{} orphaned page(s)", orphaned.len());
        g
    }

    // ------------------------------------------------------------------
    // Content keys
    // ------------------------------------------------------------------

    fn gather_intent(&self, ctx: &EvidenceContext) -> Gathered {
        let mut g = Gathered::default();
        let Some(position) = ctx.top_anomaly("position") else {
            g.missing
                .push("SERP intent sampling for the affected queries".to_string());
            return g;
        };

        g.support.push(EvidenceBlock::new(
            EvidenceKind::Metric,
            EvidenceStrength::Moderate,
            format!(
                "average position regressed from {:.1} to {:.1} ({:+.1}%)",
                position.baseline_value, position.observed_value, position.delta_pct
            ),
            json!({
                "baseline_position": position.baseline_value,
                "observed_position": position.observed_value,
                "delta_pct": position.delta_pct,
            }),
        ));
        if !ctx.checks.is_empty() && !ctx.has_technical_findings(self.cfg.thresholds.min_text_length)
        {
            g.support.push(EvidenceBlock::new(
                EvidenceKind::Comparison,
                EvidenceStrength::Weak,
                "rankings slid with no technical faults found — competitors may match intent better"
                    .to_string(),
                json!({ "checked_pages": ctx.checks.len() }),
            ));
        }
        g.missing
            .push("SERP intent sampling for the affected queries".to_string());

        g.summary = format!("position regressed {:+.1}%", position.delta_pct);
        g
    }

    fn gather_serp_layout(&self, ctx: &EvidenceContext) -> Gathered {
        let mut g = Gathered::default();
        let Some(ctr_anomaly) = ctx.top_anomaly("ctr") else {
            g.missing
                .push("SERP feature snapshot for the affected queries".to_string());
            return g;
        };

        let impressions_stable = ctx
            .search_stats(Metric::Impressions)
            .map(|s| !s.is_drop)
            .unwrap_or(false);
        let position_stable = ctx
            .search_stats(Metric::Position)
            .map(|s| !s.is_drop)
            .unwrap_or(false);

        if impressions_stable && position_stable {
            g.support.push(EvidenceBlock::new(
                EvidenceKind::Comparison,
                EvidenceStrength::Strong,
                format!(
                    "CTR fell {:.1}% while impressions and position held steady — the SERP around the listing changed, not the ranking",
                    ctr_anomaly.delta_pct.abs()
                ),
                json!({
                    "ctr_delta_pct": ctr_anomaly.delta_pct,
                    "impressions_stable": impressions_stable,
                    "position_stable": position_stable,
                }),
            ));
        } else {
            g.support.push(EvidenceBlock::new(
                EvidenceKind::Metric,
                EvidenceStrength::Weak,
                format!("CTR fell {:.1}%", ctr_anomaly.delta_pct.abs()),
                json!({ "ctr_delta_pct": ctr_anomaly.delta_pct }),
            ));
        }
        if !position_stable {
            g.disconfirming.push(EvidenceBlock::new(
                EvidenceKind::Metric,
                EvidenceStrength::Moderate,
                "position also regressed; the CTR fall is explained by rank loss".to_string(),
                serde_json::Value::Null,
            ));
        }
        g.missing
            .push("SERP feature snapshot for the affected queries".to_string());

        g.summary = format!("CTR down {:.1}% with stable visibility", ctr_anomaly.delta_pct.abs());
        g
    }

    fn gather_algorithm(&self, ctx: &EvidenceContext) -> Gathered {
        let mut g = Gathered::default();
        let has_drop = crate::types::any_top_scope_drop(ctx.anomalies);
        if !has_drop {
            g.missing
                .push("industry volatility index / competitor snapshots".to_string());
            return g;
        }

        let dominant = ctx.dominant(self.cfg.thresholds.cluster_loss_share);
        if dominant.is_none() && !ctx.cluster_losses.is_empty() {
            g.support.push(EvidenceBlock::new(
                EvidenceKind::Comparison,
                EvidenceStrength::Moderate,
                format!(
                    "loss is spread across {} cluster(s) with no dominant one — pattern of a broad ranking shift",
                    ctx.cluster_losses.len()
                ),
                json!({ "clusters_losing": ctx.cluster_losses.len() }),
            ));
            if ctx.top_anomaly("position").is_some() {
                g.support.push(EvidenceBlock::new(
                    EvidenceKind::Metric,
                    EvidenceStrength::Weak,
                    "site-wide position regression accompanies the drop".to_string(),
                    serde_json::Value::Null,
                ));
            }
        } else if let Some(dominant) = dominant {
            g.disconfirming.push(EvidenceBlock::new(
                EvidenceKind::Comparison,
                EvidenceStrength::Moderate,
                format!(
                    "loss concentrates in {} ({:.0}%), unlike a broad core update",
                    dominant.cluster,
                    dominant.loss_share * 100.0
                ),
                json!({ "cluster": dominant.cluster, "loss_share": dominant.loss_share }),
            ));
        }
        g.missing
            .push("industry volatility index / competitor snapshots".to_string());

        g.summary = "drop pattern consistent with an industry-wide shift".to_string();
        g
    }

    fn gather_seasonality(&self, ctx: &EvidenceContext) -> Gathered {
        let mut g = Gathered::default();
        let has_drop = crate::types::any_top_scope_drop(ctx.anomalies);
        if !has_drop {
            g.missing.push("year-over-year rollups".to_string());
            return g;
        }

        let impressions_also_down = ctx.top_anomaly("impressions").is_some();
        let clean_checks = !ctx.checks.is_empty()
            && !ctx.has_technical_findings(self.cfg.thresholds.min_text_length);
        if impressions_also_down && clean_checks {
            g.support.push(EvidenceBlock::new(
                EvidenceKind::Metric,
                EvidenceStrength::Weak,
                "clicks and impressions fell together with no technical changes — demand may simply be down".to_string(),
                serde_json::Value::Null,
            ));
        }
        if ctx.has_technical_findings(self.cfg.thresholds.min_text_length) {
            g.disconfirming.push(EvidenceBlock::new(
                EvidenceKind::Check,
                EvidenceStrength::Moderate,
                "technical faults were found on checked pages; not a pure demand dip".to_string(),
                serde_json::Value::Null,
            ));
        }
        g.missing.push("year-over-year rollups".to_string());

        g.summary = "demand-side dip".to_string();
        g
    }

    // ------------------------------------------------------------------
    // Tracking
    // ------------------------------------------------------------------

    fn gather_tracking(&self, ctx: &EvidenceContext) -> Gathered {
        let mut g = Gathered::default();

        if let Some(gap) = ctx.tracking_gap() {
            g.support.push(EvidenceBlock::new(
                EvidenceKind::Comparison,
                EvidenceStrength::Strong,
                format!(
                    "analytics sessions fell {:.1}% while search clicks held steady — instrumentation, not traffic",
                    gap.delta_pct.abs()
                ),
                json!({
                    "sessions_delta_pct": gap.delta_pct,
                    "baseline_sessions": gap.baseline_value,
                    "observed_sessions": gap.observed_value,
                }),
            ));
        }

        let tagged: Vec<&PageCheck> = ctx
            .checks
            .iter()
            .filter(|c| c.analytics_tag_present.is_some())
            .collect();
        let untagged: Vec<&PageCheck> = tagged
            .iter()
            .copied()
            .filter(|c| c.analytics_tag_present == Some(false))
            .collect();
        if let Some(example) = untagged.first() {
            g.support.push(EvidenceBlock::new(
                EvidenceKind::Check,
                EvidenceStrength::Strong,
                format!(
                    "{} checked page(s) are missing the analytics tag (e.g. {})",
                    untagged.len(),
                    example.url
                ),
                json!({ "untagged_pages": untagged.len(), "example_url": example.url }),
            ));
        } else if !tagged.is_empty() && ctx.tracking_gap().is_some() {
            g.disconfirming.push(EvidenceBlock::new(
                EvidenceKind::Check,
                EvidenceStrength::Moderate,
                format!(
                    "{} page(s) checked; the analytics tag is present on all of them",
                    tagged.len()
                ),
                json!({ "tagged_pages": tagged.len() }),
            ));
        }
        if tagged.is_empty() {
            g.missing.push("analytics tag coverage audit".to_string());
        }

        g.summary = format!("{} page(s) missing the analytics tag", untagged.len());
        g
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::ClusterClassifier;
    use crate::config::ClusterConfig;
    use crate::types::{
        AnalyticsDeltas, Confidence, MetricDelta, SearchDeltas, WindowBounds, WindowStats,
    };
    use chrono::NaiveDate;
    use std::collections::BTreeMap;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    fn window() -> WindowBounds {
        WindowBounds {
            baseline_start: date(1),
            baseline_end: date(14),
            current_start: date(15),
            current_end: date(17),
        }
    }

    fn computed(baseline: f64, current: f64, is_drop: bool) -> MetricDelta {
        MetricDelta::Computed(DeltaStats {
            baseline: WindowStats { sum: baseline * 14.0, mean: baseline, std_dev: 5.0, days: 14 },
            current: WindowStats { sum: current * 3.0, mean: current, std_dev: 0.0, days: 3 },
            abs_delta: current - baseline,
            pct_delta: (current - baseline) / baseline * 100.0,
            is_drop,
            z_score: None,
        })
    }

    fn search_deltas(clicks_drop: bool) -> SearchDeltas {
        SearchDeltas {
            clicks: if clicks_drop {
                computed(500.0, 300.0, true)
            } else {
                computed(500.0, 500.0, false)
            },
            impressions: computed(10000.0, 10000.0, false),
            ctr: computed(0.05, 0.05, false),
            position: computed(5.0, 5.0, false),
        }
    }

    fn traffic_anomaly() -> Anomaly {
        let mut scope = BTreeMap::new();
        scope.insert("channel".to_string(), "search_console".to_string());
        Anomaly {
            kind: AnomalyKind::TrafficDrop,
            start_date: date(15),
            end_date: date(17),
            metric: "clicks".to_string(),
            baseline_value: 500.0,
            observed_value: 300.0,
            delta_pct: -40.0,
            z_score: None,
            scope,
        }
    }

    fn blocked_check(url: &str) -> PageCheck {
        PageCheck {
            url: url.to_string(),
            date: date(16),
            http_status: 200,
            redirect_target: None,
            canonical_url: None,
            meta_robots: None,
            robots_disallow: vec!["/services/".to_string()],
            text_length: Some(1500),
            structured_data_valid: Some(true),
            internal_link_count: Some(4),
            analytics_tag_present: Some(true),
        }
    }

    fn clean_check(url: &str) -> PageCheck {
        PageCheck {
            robots_disallow: Vec::new(),
            ..blocked_check(url)
        }
    }

    fn classifier() -> ClusterClassifier {
        ClusterClassifier::compile(&ClusterConfig::default()).unwrap()
    }

    fn services_loss(share: f64) -> ClusterLoss {
        ClusterLoss {
            cluster: "/services/*".to_string(),
            baseline_daily_clicks: 400.0,
            current_daily_clicks: 80.0,
            loss: 320.0,
            loss_share: share,
            page_count: 12,
        }
    }

    #[test]
    fn robots_block_yields_rank_one_high_confidence() {
        let cfg = DiagnosisConfig::default();
        let generator = HypothesisGenerator::new(&cfg);
        let classifier = classifier();
        let deltas = Deltas {
            window: window(),
            search: Some(search_deltas(true)),
            analytics: None,
        };
        let anomalies = vec![traffic_anomaly()];
        let losses = vec![services_loss(0.8)];
        let checks = vec![
            blocked_check("https://example.com/services/audit"),
            clean_check("https://example.com/blog/post"),
        ];
        let ctx = EvidenceContext {
            deltas: &deltas,
            anomalies: &anomalies,
            cluster_losses: &losses,
            checks: &checks,
            classifier: &classifier,
        };

        let hypotheses = generator.generate(&ctx);
        let top = &hypotheses[0];
        assert_eq!(top.rank, 1);
        assert_eq!(top.key, HypothesisKey::RobotsOrNoindex);
        assert_eq!(top.confidence, Confidence::High);
        assert!(!top.evidence.is_empty());
        // evidence is sorted strongest first
        assert_eq!(top.evidence[0].strength, EvidenceStrength::Strong);
    }

    #[test]
    fn no_applicable_evidence_emits_nothing_for_key() {
        let cfg = DiagnosisConfig::default();
        let generator = HypothesisGenerator::new(&cfg);
        let classifier = classifier();
        // no anomalies, no checks, flat metrics
        let deltas = Deltas {
            window: window(),
            search: Some(search_deltas(false)),
            analytics: None,
        };
        let ctx = EvidenceContext {
            deltas: &deltas,
            anomalies: &[],
            cluster_losses: &[],
            checks: &[],
            classifier: &classifier,
        };

        let hypotheses = generator.generate(&ctx);
        assert!(
            hypotheses.is_empty(),
            "quiet run should produce no hypotheses, got {:?}",
            hypotheses.iter().map(|h| h.key).collect::<Vec<_>>()
        );
    }

    #[test]
    fn ranking_is_deterministic_across_runs() {
        let cfg = DiagnosisConfig::default();
        let generator = HypothesisGenerator::new(&cfg);
        let classifier = classifier();
        let deltas = Deltas {
            window: window(),
            search: Some(search_deltas(true)),
            analytics: None,
        };
        let anomalies = vec![traffic_anomaly()];
        let losses = vec![services_loss(0.8)];
        let checks = vec![blocked_check("https://example.com/services/audit")];
        let ctx = EvidenceContext {
            deltas: &deltas,
            anomalies: &anomalies,
            cluster_losses: &losses,
            checks: &checks,
            classifier: &classifier,
        };

        let first = generator.generate(&ctx);
        let second = generator.generate(&ctx);
        let a = serde_json::to_string(&first).unwrap();
        let b = serde_json::to_string(&second).unwrap();
        assert_eq!(a, b, "identical inputs must rank identically, byte for byte");
    }

    #[test]
    fn ranks_are_unique_and_contiguous() {
        let cfg = DiagnosisConfig::default();
        let generator = HypothesisGenerator::new(&cfg);
        let classifier = classifier();
        let deltas = Deltas {
            window: window(),
            search: Some(search_deltas(true)),
            analytics: None,
        };
        let anomalies = vec![traffic_anomaly()];
        let losses = vec![services_loss(0.8)];
        let checks = vec![blocked_check("https://example.com/services/audit")];
        let ctx = EvidenceContext {
            deltas: &deltas,
            anomalies: &anomalies,
            cluster_losses: &losses,
            checks: &checks,
            classifier: &classifier,
        };

        let hypotheses = generator.generate(&ctx);
        for (i, h) in hypotheses.iter().enumerate() {
            assert_eq!(h.rank as usize, i + 1);
        }
    }

    #[test]
    fn missing_checks_surface_as_missing_data() {
        let cfg = DiagnosisConfig::default();
        let generator = HypothesisGenerator::new(&cfg);
        let classifier = classifier();
        let deltas = Deltas {
            window: window(),
            search: Some(search_deltas(true)),
            analytics: None,
        };
        let anomalies = vec![traffic_anomaly()];
        let losses = vec![services_loss(0.8)];
        let ctx = EvidenceContext {
            deltas: &deltas,
            anomalies: &anomalies,
            cluster_losses: &losses,
            checks: &[],
            classifier: &classifier,
        };

        // with no checks at all, technical keys cannot gather support and
        // are absent rather than low-confidence
        let hypotheses = generator.generate(&ctx);
        assert!(hypotheses
            .iter()
            .all(|h| h.key != HypothesisKey::RobotsOrNoindex));
    }
}
