//! Actionable tickets synthesized from ranked hypotheses.

use serde::{Deserialize, Serialize};

use super::HypothesisKey;

/// Team that owns a ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Owner {
    Seo,
    Dev,
    Ads,
}

impl std::fmt::Display for Owner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Owner::Seo => write!(f, "SEO"),
            Owner::Dev => write!(f, "DEV"),
            Owner::Ads => write!(f, "ADS"),
        }
    }
}

/// Priority tier. Ordered so `P0 < P1 < P2 < P3` — a *lower* tier is more
/// urgent and ranks first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Priority {
    P0 = 0,
    P1 = 1,
    P2 = 2,
    P3 = 3,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::P0 => write!(f, "P0"),
            Priority::P1 => write!(f, "P1"),
            Priority::P2 => write!(f, "P2"),
            Priority::P3 => write!(f, "P3"),
        }
    }
}

/// Lifecycle status. The only field an external workflow mutates
/// post-creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    Open,
    Dismissed,
    Done,
}

/// Coarse expected-impact bucket shown to operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImpactLevel {
    High,
    Medium,
    Low,
}

/// Structured impact estimate behind the coarse bucket.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ImpactEstimate {
    /// Pages in the affected cluster(s) / failing checks
    pub affected_pages: usize,
    /// Estimated daily clicks recoverable if the root cause is fixed,
    /// scaled by the hypothesis's confidence
    pub recoverable_daily_clicks: f64,
}

/// An actionable, owner-routed remediation item derived from a hypothesis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    /// Human-readable unique id, e.g. `"TICK-1024"`
    pub id: String,
    pub run_id: String,
    pub hypothesis_key: HypothesisKey,
    pub title: String,
    pub owner: Owner,
    pub priority: Priority,
    pub status: TicketStatus,
    /// Ordered remediation steps, parameterized with concrete evidence values
    pub steps: Vec<String>,
    pub expected_impact: ImpactLevel,
    pub impact: ImpactEstimate,
    /// Statements of the evidence blocks this ticket is based on
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub evidence_refs: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn p0_is_most_urgent() {
        assert!(Priority::P0 < Priority::P1);
        assert!(Priority::P2 < Priority::P3);
    }

    #[test]
    fn owner_display_is_uppercase() {
        assert_eq!(Owner::Seo.to_string(), "SEO");
        assert_eq!(Owner::Dev.to_string(), "DEV");
        assert_eq!(Owner::Ads.to_string(), "ADS");
    }
}
