//! Ticket Synthesizer.
//!
//! Turns the top-ranked hypotheses into actionable, owner-routed tickets.
//! Synthesis is idempotent on (run id, hypothesis key): re-running the
//! diagnosis for the same run never duplicates a ticket.

use tracing::{debug, info};

use crate::cluster::{dominant_cluster, ClusterLoss};
use crate::config::{defaults, DiagnosisConfig};
use crate::hypothesis::{priority, routed_owner, title};
use crate::store::{RunStore, StoreError};
use crate::types::{
    Confidence, Hypothesis, HypothesisKey, ImpactEstimate, ImpactLevel, PageCheck, Ticket,
    TicketStatus,
};

/// Stateless synthesizer parameterised by the run's config.
pub struct TicketSynthesizer<'a> {
    cfg: &'a DiagnosisConfig,
}

/// Concrete values substituted into the static step templates.
struct StepParams {
    cluster: String,
    example_url: String,
    observed: String,
}

impl<'a> TicketSynthesizer<'a> {
    pub fn new(cfg: &'a DiagnosisConfig) -> Self {
        Self { cfg }
    }

    /// Synthesize tickets for the top-ranked hypotheses at or above the
    /// configured confidence floor.
    ///
    /// Returns the tickets backing those hypotheses — newly created ones
    /// plus any that already existed for the same (run id, key), which are
    /// left untouched.
    pub fn synthesize(
        &self,
        run_id: &str,
        hypotheses: &[Hypothesis],
        cluster_losses: &[ClusterLoss],
        checks: &[PageCheck],
        store: &dyn RunStore,
    ) -> Result<Vec<Ticket>, StoreError> {
        let eligible = hypotheses
            .iter()
            .filter(|h| h.confidence >= self.cfg.tickets.min_confidence)
            .take(self.cfg.tickets.max_tickets);

        let analytics_tag_misfired = checks
            .iter()
            .any(|c| c.analytics_tag_present == Some(false));

        let mut tickets = Vec::new();
        for hypothesis in eligible {
            if let Some(existing) = store.find_ticket(run_id, hypothesis.key)? {
                debug!(
                    ticket = %existing.id,
                    key = %hypothesis.key,
                    "Ticket already exists for this run/key — skipping"
                );
                tickets.push(existing);
                continue;
            }

            let ticket = self.build_ticket(
                run_id,
                hypothesis,
                cluster_losses,
                analytics_tag_misfired,
                store.next_ticket_id()?,
            );
            store.store_ticket(&ticket)?;
            info!(
                ticket = %ticket.id,
                key = %ticket.hypothesis_key,
                owner = %ticket.owner,
                priority = %ticket.priority,
                "Ticket synthesized"
            );
            tickets.push(ticket);
        }

        Ok(tickets)
    }

    fn build_ticket(
        &self,
        run_id: &str,
        hypothesis: &Hypothesis,
        cluster_losses: &[ClusterLoss],
        analytics_tag_misfired: bool,
        id: String,
    ) -> Ticket {
        let params = step_params(hypothesis, cluster_losses, self.cfg);
        let impact = impact_estimate(hypothesis.confidence, cluster_losses);
        let expected_impact = impact_level(cluster_losses);

        Ticket {
            id,
            run_id: run_id.to_string(),
            hypothesis_key: hypothesis.key,
            title: title(hypothesis.key).to_string(),
            owner: routed_owner(hypothesis.key, analytics_tag_misfired),
            priority: priority(hypothesis.key),
            status: TicketStatus::Open,
            steps: remediation_steps(hypothesis.key, &params),
            expected_impact,
            impact,
            evidence_refs: hypothesis
                .evidence
                .iter()
                .map(|e| e.statement.clone())
                .collect(),
        }
    }
}

/// Extract concrete parameter values from the hypothesis evidence and the
/// cluster losses.
fn step_params(
    hypothesis: &Hypothesis,
    cluster_losses: &[ClusterLoss],
    cfg: &DiagnosisConfig,
) -> StepParams {
    let cluster = dominant_cluster(cluster_losses, cfg.thresholds.cluster_loss_share)
        .map(|l| l.cluster.clone())
        .or_else(|| cluster_losses.first().map(|l| l.cluster.clone()))
        .unwrap_or_else(|| "the affected pages".to_string());

    let example_url = hypothesis
        .evidence
        .iter()
        .find_map(|e| {
            e.data
                .get("example_url")
                .and_then(|v| v.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| cluster.clone());

    StepParams {
        cluster,
        example_url,
        observed: hypothesis.summary.clone(),
    }
}

/// Static remediation steps per hypothesis key, parameterized with the
/// evidence's concrete values.
fn remediation_steps(key: HypothesisKey, p: &StepParams) -> Vec<String> {
    match key {
        HypothesisKey::RobotsOrNoindex => vec![
            format!("Diff robots.txt against the last known-good version; remove the rule blocking {}", p.cluster),
            format!("Verify {} no longer carries a noindex directive after deploy", p.example_url),
            "Request re-indexing of the affected URLs in Search Console".to_string(),
        ],
        HypothesisKey::CanonicalMismatch => vec![
            format!("Audit canonical tags in {} — observed: {}", p.cluster, p.observed),
            format!("Fix the canonical on {} to be self-referential", p.example_url),
            "Re-crawl the cluster and confirm canonicals resolve to the ranking URL".to_string(),
        ],
        HypothesisKey::RedirectOrHttpChange => vec![
            format!("Trace the redirect/error chain for {}", p.example_url),
            format!("Restore 200 responses for {} or add proper 301s to the new URLs", p.cluster),
            "Update internal links to point at the final URLs".to_string(),
        ],
        HypothesisKey::ThinContentOrSsrRegression => vec![
            format!("Render {} with a crawler user-agent and compare text length to the CMS content", p.example_url),
            "Bisect recent frontend deploys for the SSR/hydration regression".to_string(),
            format!("Confirm restored pages in {} render full content server-side", p.cluster),
        ],
        HypothesisKey::StructuredDataBreakage => vec![
            format!("Run the structured-data validator on {}", p.example_url),
            "Fix the failing schema types and redeploy".to_string(),
            "Monitor rich-result impressions for recovery".to_string(),
        ],
        HypothesisKey::InternalLinkingBreakage => vec![
            format!("Compare the crawl graph before/after the drop for {}", p.cluster),
            "Restore the navigation/sitemap modules that linked the orphaned pages".to_string(),
            format!("Verify {} is reachable within three clicks of the homepage", p.example_url),
        ],
        HypothesisKey::ContentIntentMismatch => vec![
            format!("Review the current top-10 SERP for the head queries of {}", p.cluster),
            "Map content gaps against the pages that displaced ours".to_string(),
            "Refresh the affected pages to match the winning intent/format".to_string(),
        ],
        HypothesisKey::SerpLayoutCtrShift => vec![
            format!("Capture SERP screenshots for the affected queries — observed: {}", p.observed),
            "Identify new SERP features (AI overviews, ads, packs) absorbing clicks".to_string(),
            "Rework titles/descriptions or target featured placements to recover CTR".to_string(),
        ],
        HypothesisKey::AlgorithmUpdate => vec![
            "Check industry volatility trackers for a confirmed update window".to_string(),
            format!("Benchmark {} against competitors that gained", p.cluster),
            "Plan a content-quality review rather than a technical rollback".to_string(),
        ],
        HypothesisKey::Seasonality => vec![
            "Compare against the same weeks last year once YoY rollups are available".to_string(),
            "Annotate the dip in the reporting dashboards".to_string(),
            "Re-evaluate after the seasonal window closes".to_string(),
        ],
        HypothesisKey::TrackingMisconfiguration => vec![
            format!("Verify the analytics tag fires on {}", p.example_url),
            "Audit recent tag-manager/container changes".to_string(),
            "Backfill or annotate the affected date range once the tag is restored".to_string(),
        ],
    }
}

/// Structured impact estimate: affected pages and recoverable daily clicks
/// (baseline − current across losing clusters, scaled by confidence).
fn impact_estimate(confidence: Confidence, cluster_losses: &[ClusterLoss]) -> ImpactEstimate {
    let scale = match confidence {
        Confidence::High => defaults::RECOVERY_SCALE_HIGH,
        Confidence::Medium => defaults::RECOVERY_SCALE_MEDIUM,
        Confidence::Low => defaults::RECOVERY_SCALE_LOW,
    };
    let total_loss: f64 = cluster_losses.iter().map(|l| l.loss).sum();
    ImpactEstimate {
        affected_pages: cluster_losses.iter().map(|l| l.page_count).sum(),
        recoverable_daily_clicks: total_loss * scale,
    }
}

/// Coarse impact bucket from the lost share of baseline traffic.
fn impact_level(cluster_losses: &[ClusterLoss]) -> ImpactLevel {
    let total_loss: f64 = cluster_losses.iter().map(|l| l.loss).sum();
    let total_baseline: f64 = cluster_losses.iter().map(|l| l.baseline_daily_clicks).sum();
    if total_baseline <= 0.0 {
        return ImpactLevel::Low;
    }
    let fraction = total_loss / total_baseline;
    if fraction >= defaults::IMPACT_HIGH_LOSS_FRACTION {
        ImpactLevel::High
    } else if fraction >= defaults::IMPACT_MEDIUM_LOSS_FRACTION {
        ImpactLevel::Medium
    } else {
        ImpactLevel::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryRunStore;
    use crate::types::{EvidenceBlock, EvidenceKind, EvidenceStrength, Owner, Priority};
    use serde_json::json;

    fn hypothesis(key: HypothesisKey, confidence: Confidence, rank: u32) -> Hypothesis {
        Hypothesis {
            rank,
            key,
            confidence,
            summary: "summary".to_string(),
            evidence: vec![EvidenceBlock::new(
                EvidenceKind::Check,
                EvidenceStrength::Strong,
                "3 pages blocked",
                json!({ "example_url": "https://example.com/services/audit" }),
            )],
            disconfirming: Vec::new(),
            missing_data: Vec::new(),
        }
    }

    fn services_loss() -> Vec<ClusterLoss> {
        vec![ClusterLoss {
            cluster: "/services/*".to_string(),
            baseline_daily_clicks: 400.0,
            current_daily_clicks: 80.0,
            loss: 320.0,
            loss_share: 0.8,
            page_count: 12,
        }]
    }

    #[test]
    fn synthesizes_owner_routed_ticket() {
        let cfg = DiagnosisConfig::default();
        let store = InMemoryRunStore::new();
        let synthesizer = TicketSynthesizer::new(&cfg);
        let hypotheses = vec![hypothesis(HypothesisKey::RobotsOrNoindex, Confidence::High, 1)];

        let tickets = synthesizer
            .synthesize("run-1", &hypotheses, &services_loss(), &[], &store)
            .unwrap();

        assert_eq!(tickets.len(), 1);
        let t = &tickets[0];
        assert_eq!(t.owner, Owner::Dev);
        assert_eq!(t.priority, Priority::P0);
        assert_eq!(t.status, TicketStatus::Open);
        assert!(t.id.starts_with("TICK-"));
        assert_eq!(t.impact.affected_pages, 12);
        assert!((t.impact.recoverable_daily_clicks - 320.0 * 0.9).abs() < 1e-9);
        assert_eq!(t.expected_impact, ImpactLevel::High);
        // steps are parameterized with the dominant cluster
        assert!(t.steps[0].contains("/services/*"));
        assert!(t.steps[1].contains("https://example.com/services/audit"));
    }

    #[test]
    fn synthesis_is_idempotent_per_run_and_key() {
        let cfg = DiagnosisConfig::default();
        let store = InMemoryRunStore::new();
        let synthesizer = TicketSynthesizer::new(&cfg);
        let hypotheses = vec![hypothesis(HypothesisKey::RobotsOrNoindex, Confidence::High, 1)];

        let first = synthesizer
            .synthesize("run-1", &hypotheses, &services_loss(), &[], &store)
            .unwrap();
        let second = synthesizer
            .synthesize("run-1", &hypotheses, &services_loss(), &[], &store)
            .unwrap();

        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
        assert_eq!(first[0].id, second[0].id);
        assert_eq!(store.get_tickets("run-1").unwrap().len(), 1);
    }

    #[test]
    fn low_confidence_hypotheses_are_not_ticketed() {
        let cfg = DiagnosisConfig::default();
        let store = InMemoryRunStore::new();
        let synthesizer = TicketSynthesizer::new(&cfg);
        let hypotheses = vec![
            hypothesis(HypothesisKey::RobotsOrNoindex, Confidence::High, 1),
            hypothesis(HypothesisKey::Seasonality, Confidence::Low, 2),
        ];

        let tickets = synthesizer
            .synthesize("run-1", &hypotheses, &services_loss(), &[], &store)
            .unwrap();
        assert_eq!(tickets.len(), 1);
        assert_eq!(tickets[0].hypothesis_key, HypothesisKey::RobotsOrNoindex);
    }

    #[test]
    fn ticket_cap_limits_synthesis() {
        let mut cfg = DiagnosisConfig::default();
        cfg.tickets.max_tickets = 2;
        let store = InMemoryRunStore::new();
        let synthesizer = TicketSynthesizer::new(&cfg);
        let hypotheses = vec![
            hypothesis(HypothesisKey::RobotsOrNoindex, Confidence::High, 1),
            hypothesis(HypothesisKey::CanonicalMismatch, Confidence::High, 2),
            hypothesis(HypothesisKey::RedirectOrHttpChange, Confidence::Medium, 3),
        ];

        let tickets = synthesizer
            .synthesize("run-1", &hypotheses, &services_loss(), &[], &store)
            .unwrap();
        assert_eq!(tickets.len(), 2);
    }

    #[test]
    fn tracking_ticket_routes_to_ads_when_tag_missing() {
        let cfg = DiagnosisConfig::default();
        let store = InMemoryRunStore::new();
        let synthesizer = TicketSynthesizer::new(&cfg);
        let hypotheses = vec![hypothesis(
            HypothesisKey::TrackingMisconfiguration,
            Confidence::High,
            1,
        )];
        let checks = vec![PageCheck {
            url: "https://example.com/".to_string(),
            date: chrono::NaiveDate::from_ymd_opt(2024, 3, 16).unwrap(),
            http_status: 200,
            redirect_target: None,
            canonical_url: None,
            meta_robots: None,
            robots_disallow: Vec::new(),
            text_length: Some(2000),
            structured_data_valid: None,
            internal_link_count: None,
            analytics_tag_present: Some(false),
        }];

        let tickets = synthesizer
            .synthesize("run-1", &hypotheses, &[], &checks, &store)
            .unwrap();
        assert_eq!(tickets[0].owner, Owner::Ads);
        assert_eq!(tickets[0].priority, Priority::P1);
    }
}
