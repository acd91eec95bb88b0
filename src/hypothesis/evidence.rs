//! Confidence scoring over tagged evidence strengths.
//!
//! Kept separate from the per-key evidence gathering so new hypothesis keys
//! can be added without touching the confidence algorithm.

use crate::types::{Confidence, EvidenceBlock, EvidenceStrength};

/// Derive a confidence bucket from the strength mix of supporting and
/// disconfirming evidence.
///
/// | strongest support | strongest disconfirmer | confidence |
/// |-------------------|------------------------|------------|
/// | strong            | none/weak              | High       |
/// | strong            | moderate               | Medium     |
/// | strong            | strong                 | Low        |
/// | moderate          | none/weak/moderate     | Medium     |
/// | moderate          | strong                 | Low        |
/// | weak              | any                    | Low        |
/// | none              | —                      | not emitted|
///
/// Returns `None` when there is no supporting evidence at all: the
/// hypothesis is simply not applicable, which is absence, not a
/// zero-confidence hypothesis.
pub fn score_confidence(
    support: &[EvidenceBlock],
    disconfirming: &[EvidenceBlock],
) -> Option<Confidence> {
    let strongest_support = support.iter().map(|e| e.strength).max()?;
    let strongest_against = disconfirming.iter().map(|e| e.strength).max();

    let confidence = match strongest_support {
        EvidenceStrength::Strong => match strongest_against {
            Some(EvidenceStrength::Strong) => Confidence::Low,
            Some(EvidenceStrength::Moderate) => Confidence::Medium,
            _ => Confidence::High,
        },
        EvidenceStrength::Moderate => match strongest_against {
            Some(EvidenceStrength::Strong) => Confidence::Low,
            _ => Confidence::Medium,
        },
        EvidenceStrength::Weak => Confidence::Low,
    };
    Some(confidence)
}
