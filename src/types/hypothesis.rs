//! Hypotheses and their evidence blocks.
//!
//! A hypothesis is a ranked candidate root cause for the run's anomalies.
//! The 11 canonical keys are fixed; evidence gathering and the confidence
//! algorithm live in `crate::hypothesis`.

use serde::{Deserialize, Serialize};

/// Canonical hypothesis keys. Declaration order is the catalog order used
/// as the final ranking tie-break, so reordering variants changes output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HypothesisKey {
    RobotsOrNoindex,
    CanonicalMismatch,
    RedirectOrHttpChange,
    ThinContentOrSsrRegression,
    StructuredDataBreakage,
    InternalLinkingBreakage,
    ContentIntentMismatch,
    SerpLayoutCtrShift,
    AlgorithmUpdate,
    Seasonality,
    TrackingMisconfiguration,
}

impl HypothesisKey {
    /// The full catalog in declaration order.
    pub const CATALOG: [HypothesisKey; 11] = [
        HypothesisKey::RobotsOrNoindex,
        HypothesisKey::CanonicalMismatch,
        HypothesisKey::RedirectOrHttpChange,
        HypothesisKey::ThinContentOrSsrRegression,
        HypothesisKey::StructuredDataBreakage,
        HypothesisKey::InternalLinkingBreakage,
        HypothesisKey::ContentIntentMismatch,
        HypothesisKey::SerpLayoutCtrShift,
        HypothesisKey::AlgorithmUpdate,
        HypothesisKey::Seasonality,
        HypothesisKey::TrackingMisconfiguration,
    ];

    /// Stable identifier, e.g. `"ROBOTS_OR_NOINDEX"`.
    pub fn as_str(self) -> &'static str {
        match self {
            HypothesisKey::RobotsOrNoindex => "ROBOTS_OR_NOINDEX",
            HypothesisKey::CanonicalMismatch => "CANONICAL_MISMATCH",
            HypothesisKey::RedirectOrHttpChange => "REDIRECT_OR_HTTP_CHANGE",
            HypothesisKey::ThinContentOrSsrRegression => "THIN_CONTENT_OR_SSR_REGRESSION",
            HypothesisKey::StructuredDataBreakage => "STRUCTURED_DATA_BREAKAGE",
            HypothesisKey::InternalLinkingBreakage => "INTERNAL_LINKING_BREAKAGE",
            HypothesisKey::ContentIntentMismatch => "CONTENT_INTENT_MISMATCH",
            HypothesisKey::SerpLayoutCtrShift => "SERP_LAYOUT_CTR_SHIFT",
            HypothesisKey::AlgorithmUpdate => "ALGORITHM_UPDATE",
            HypothesisKey::Seasonality => "SEASONALITY",
            HypothesisKey::TrackingMisconfiguration => "TRACKING_MISCONFIGURATION",
        }
    }

    /// Position in [`Self::CATALOG`]; the deterministic ranking tie-break.
    pub fn catalog_index(self) -> usize {
        Self::CATALOG
            .iter()
            .position(|k| *k == self)
            .unwrap_or(Self::CATALOG.len())
    }
}

impl std::fmt::Display for HypothesisKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Confidence bucket for a hypothesis. Ordered so `High > Medium > Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low = 0,
    Medium = 1,
    High = 2,
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Confidence::Low => write!(f, "LOW"),
            Confidence::Medium => write!(f, "MEDIUM"),
            Confidence::High => write!(f, "HIGH"),
        }
    }
}

/// Kind of an evidence block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvidenceKind {
    /// Derived from metric deltas/anomalies
    Metric,
    /// Derived from a page-level technical check
    Check,
    /// Derived from comparing two signals against each other
    Comparison,
    /// Derived from collected log-style observations
    Log,
}

/// Strength of one evidence block. Ordered so `Strong > Moderate > Weak`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvidenceStrength {
    Weak = 0,
    Moderate = 1,
    Strong = 2,
}

/// One unit of support for (or against) a hypothesis. Immutable once attached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceBlock {
    pub kind: EvidenceKind,
    /// Human-readable statement with concrete values
    pub statement: String,
    /// Structured payload backing the statement
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub data: serde_json::Value,
    pub strength: EvidenceStrength,
}

impl EvidenceBlock {
    pub fn new(
        kind: EvidenceKind,
        strength: EvidenceStrength,
        statement: impl Into<String>,
        data: serde_json::Value,
    ) -> Self {
        Self {
            kind,
            statement: statement.into(),
            data,
            strength,
        }
    }
}

/// A ranked candidate root cause. Created once per run, never edited after
/// persistence — a re-run creates new rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hypothesis {
    /// 1-based rank, unique within the run
    pub rank: u32,
    pub key: HypothesisKey,
    pub confidence: Confidence,
    pub summary: String,
    /// Supporting evidence, strongest first
    pub evidence: Vec<EvidenceBlock>,
    /// Disconfirming evidence
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub disconfirming: Vec<EvidenceBlock>,
    /// What additional signal would raise or lower confidence
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_data: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_index_matches_declaration_order() {
        assert_eq!(HypothesisKey::RobotsOrNoindex.catalog_index(), 0);
        assert_eq!(HypothesisKey::TrackingMisconfiguration.catalog_index(), 10);
        // every key appears exactly once
        let mut seen = std::collections::HashSet::new();
        for key in HypothesisKey::CATALOG {
            assert!(seen.insert(key), "duplicate catalog entry {key}");
        }
        assert_eq!(seen.len(), 11);
    }

    #[test]
    fn confidence_orders_high_over_low() {
        assert!(Confidence::High > Confidence::Medium);
        assert!(Confidence::Medium > Confidence::Low);
    }

    #[test]
    fn evidence_strength_orders_strong_over_weak() {
        assert!(EvidenceStrength::Strong > EvidenceStrength::Moderate);
        assert!(EvidenceStrength::Moderate > EvidenceStrength::Weak);
    }
}
