//! Static rule tables for the hypothesis catalog.
//!
//! Priority tiers, categories, and owner routing are exhaustive `match`
//! tables over `HypothesisKey` — adding a key without extending a table is
//! a compile error, never a silent default.

use crate::types::{HypothesisKey, Owner, Priority};

/// Broad category used for owner routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    /// Crawlability/rendering/markup faults — engineering owns the fix
    Technical,
    /// Content, intent, SERP dynamics — SEO owns the response
    Content,
    /// Instrumentation faults — ads/analytics or engineering
    Tracking,
}

/// Static priority tier per hypothesis key.
///
/// P0 keys are site-breaking. The tracking key sits at P1: broken
/// measurement blocks every other diagnosis even though traffic itself may
/// be fine.
pub fn priority(key: HypothesisKey) -> Priority {
    match key {
        HypothesisKey::RobotsOrNoindex
        | HypothesisKey::CanonicalMismatch
        | HypothesisKey::ThinContentOrSsrRegression => Priority::P0,
        HypothesisKey::StructuredDataBreakage
        | HypothesisKey::InternalLinkingBreakage
        | HypothesisKey::RedirectOrHttpChange
        | HypothesisKey::TrackingMisconfiguration => Priority::P1,
        HypothesisKey::ContentIntentMismatch | HypothesisKey::SerpLayoutCtrShift => Priority::P2,
        HypothesisKey::AlgorithmUpdate | HypothesisKey::Seasonality => Priority::P3,
    }
}

/// Category per hypothesis key.
pub fn category(key: HypothesisKey) -> Category {
    match key {
        HypothesisKey::RobotsOrNoindex
        | HypothesisKey::CanonicalMismatch
        | HypothesisKey::RedirectOrHttpChange
        | HypothesisKey::ThinContentOrSsrRegression
        | HypothesisKey::StructuredDataBreakage
        | HypothesisKey::InternalLinkingBreakage => Category::Technical,
        HypothesisKey::ContentIntentMismatch
        | HypothesisKey::SerpLayoutCtrShift
        | HypothesisKey::AlgorithmUpdate
        | HypothesisKey::Seasonality => Category::Content,
        HypothesisKey::TrackingMisconfiguration => Category::Tracking,
    }
}

/// Route a hypothesis to its owning team.
///
/// Technical keys go to DEV, content keys to SEO. The tracking key goes to
/// ADS when the analytics tag itself misfired, otherwise to DEV (the gap is
/// then on the collection side).
pub fn routed_owner(key: HypothesisKey, analytics_tag_misfired: bool) -> Owner {
    match category(key) {
        Category::Technical => Owner::Dev,
        Category::Content => Owner::Seo,
        Category::Tracking => {
            if analytics_tag_misfired {
                Owner::Ads
            } else {
                Owner::Dev
            }
        }
    }
}

/// Operator-facing title per hypothesis key.
pub fn title(key: HypothesisKey) -> &'static str {
    match key {
        HypothesisKey::RobotsOrNoindex => "Pages blocked by robots.txt or noindex",
        HypothesisKey::CanonicalMismatch => "Canonical tags point away from ranking pages",
        HypothesisKey::RedirectOrHttpChange => "Redirect chain or HTTP status change",
        HypothesisKey::ThinContentOrSsrRegression => "Thin content or SSR rendering regression",
        HypothesisKey::StructuredDataBreakage => "Structured data broken or invalid",
        HypothesisKey::InternalLinkingBreakage => "Internal linking breakage",
        HypothesisKey::ContentIntentMismatch => "Content no longer matches query intent",
        HypothesisKey::SerpLayoutCtrShift => "SERP layout change suppressing CTR",
        HypothesisKey::AlgorithmUpdate => "Search algorithm update / industry-wide shift",
        HypothesisKey::Seasonality => "Seasonal demand dip",
        HypothesisKey::TrackingMisconfiguration => "Analytics tracking misconfiguration",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_table_matches_tiers() {
        assert_eq!(priority(HypothesisKey::RobotsOrNoindex), Priority::P0);
        assert_eq!(priority(HypothesisKey::CanonicalMismatch), Priority::P0);
        assert_eq!(priority(HypothesisKey::ThinContentOrSsrRegression), Priority::P0);
        assert_eq!(priority(HypothesisKey::StructuredDataBreakage), Priority::P1);
        assert_eq!(priority(HypothesisKey::InternalLinkingBreakage), Priority::P1);
        assert_eq!(priority(HypothesisKey::RedirectOrHttpChange), Priority::P1);
        assert_eq!(priority(HypothesisKey::ContentIntentMismatch), Priority::P2);
        assert_eq!(priority(HypothesisKey::SerpLayoutCtrShift), Priority::P2);
        assert_eq!(priority(HypothesisKey::AlgorithmUpdate), Priority::P3);
        assert_eq!(priority(HypothesisKey::Seasonality), Priority::P3);
    }

    #[test]
    fn every_key_has_priority_and_owner() {
        for key in HypothesisKey::CATALOG {
            // exhaustive matches guarantee this at compile time; the loop
            // documents totality as a runtime property too
            let _ = priority(key);
            let _ = routed_owner(key, false);
            assert!(!title(key).is_empty());
        }
    }

    #[test]
    fn tracking_owner_depends_on_misfired_tag() {
        assert_eq!(
            routed_owner(HypothesisKey::TrackingMisconfiguration, true),
            Owner::Ads
        );
        assert_eq!(
            routed_owner(HypothesisKey::TrackingMisconfiguration, false),
            Owner::Dev
        );
        // non-tracking keys ignore the flag
        assert_eq!(routed_owner(HypothesisKey::RobotsOrNoindex, true), Owner::Dev);
        assert_eq!(routed_owner(HypothesisKey::Seasonality, true), Owner::Seo);
    }
}
