//! Upstream rollup records — the read contract of the Metric Store Adapter.
//!
//! These records are produced by external collectors (search-console export,
//! analytics export, crawl/render workers) and consumed read-only by the
//! diagnosis pipeline. The same shapes double as the JSON fixture format used
//! by the `diagnose` and `simulate` binaries.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One day of search-visibility data for a (page, query) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchDailyRollup {
    pub date: NaiveDate,
    /// Page path, e.g. `/services/seo-audit`
    pub page: String,
    /// Query string; `None` for page-level rollups aggregated over all queries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    pub clicks: f64,
    pub impressions: f64,
    /// Click-through rate (0.0–1.0)
    pub ctr: f64,
    /// Average SERP position (lower is better)
    pub position: f64,
}

/// One day of analytics data for a landing page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsDailyRollup {
    pub date: NaiveDate,
    pub landing_page: String,
    pub sessions: f64,
    pub users: f64,
    #[serde(default)]
    pub engaged_sessions: f64,
    #[serde(default)]
    pub conversions: f64,
}

/// Page-level technical check result from the crawl/render worker.
///
/// Every field beyond `url`/`date`/`http_status` is optional — a partial
/// crawl is normal and the hypothesis generator treats a missing field as
/// "signal not collected", never as a finding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageCheck {
    pub url: String,
    pub date: NaiveDate,
    pub http_status: u16,
    /// Redirect destination when `http_status` is 3xx
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_target: Option<String>,
    /// `<link rel="canonical">` href, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical_url: Option<String>,
    /// Raw `meta robots` content, e.g. `"noindex,nofollow"`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta_robots: Option<String>,
    /// Disallow rules from robots.txt that apply to this URL's user-agent
    #[serde(default)]
    pub robots_disallow: Vec<String>,
    /// Rendered text length in characters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_length: Option<u32>,
    /// Whether structured data on the page validated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_data_valid: Option<bool>,
    /// Count of internal links pointing at this page (from the crawl graph)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal_link_count: Option<u32>,
    /// Whether the analytics tag was detected on the rendered page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analytics_tag_present: Option<bool>,
}

impl PageCheck {
    /// True when any applicable robots.txt rule disallows this URL's path.
    pub fn is_robots_blocked(&self) -> bool {
        let path = path_of(&self.url);
        self.robots_disallow
            .iter()
            .any(|rule| !rule.is_empty() && path.starts_with(rule.as_str()))
    }

    /// True when meta robots contains a `noindex` directive.
    pub fn is_noindexed(&self) -> bool {
        self.meta_robots
            .as_deref()
            .map(|m| m.to_ascii_lowercase().contains("noindex"))
            .unwrap_or(false)
    }

    /// True when the canonical tag points somewhere other than the page itself.
    pub fn has_canonical_mismatch(&self) -> bool {
        match self.canonical_url.as_deref() {
            Some(canonical) => path_of(canonical) != path_of(&self.url),
            None => false,
        }
    }
}

/// Extract the path component from a URL or bare path.
pub fn path_of(url: &str) -> &str {
    let without_scheme = url
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(url);
    match without_scheme.find('/') {
        Some(idx) if url.contains("://") => &without_scheme[idx..],
        _ if url.starts_with('/') => url,
        Some(idx) => &without_scheme[idx..],
        None => "/",
    }
}

/// A complete site dataset: the JSON bundle consumed by `diagnose` and
/// produced by `simulate`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SiteFixture {
    pub site_id: String,
    #[serde(default)]
    pub search: Vec<SearchDailyRollup>,
    #[serde(default)]
    pub analytics: Vec<AnalyticsDailyRollup>,
    #[serde(default)]
    pub checks: Vec<PageCheck>,
}

impl SiteFixture {
    /// Latest date present across both metric families, if any.
    ///
    /// Used by the `diagnose` binary as the default as-of date.
    pub fn latest_date(&self) -> Option<NaiveDate> {
        self.search
            .iter()
            .map(|r| r.date)
            .chain(self.analytics.iter().map(|r| r.date))
            .max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_of_strips_scheme_and_host() {
        assert_eq!(path_of("https://example.com/services/audit"), "/services/audit");
        assert_eq!(path_of("/blog/post"), "/blog/post");
        assert_eq!(path_of("https://example.com"), "/");
    }

    #[test]
    fn robots_blocked_matches_prefix_rules() {
        let check = PageCheck {
            url: "https://example.com/services/audit".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            http_status: 200,
            redirect_target: None,
            canonical_url: None,
            meta_robots: None,
            robots_disallow: vec!["/services/".to_string()],
            text_length: Some(1200),
            structured_data_valid: None,
            internal_link_count: None,
            analytics_tag_present: None,
        };
        assert!(check.is_robots_blocked());
        assert!(!check.is_noindexed());
    }

    #[test]
    fn canonical_mismatch_compares_paths() {
        let mut check = PageCheck {
            url: "https://example.com/services/audit".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            http_status: 200,
            redirect_target: None,
            canonical_url: Some("https://example.com/services/audit".to_string()),
            meta_robots: None,
            robots_disallow: Vec::new(),
            text_length: None,
            structured_data_valid: None,
            internal_link_count: None,
            analytics_tag_present: None,
        };
        assert!(!check.has_canonical_mismatch());

        check.canonical_url = Some("https://example.com/".to_string());
        assert!(check.has_canonical_mismatch());
    }
}
