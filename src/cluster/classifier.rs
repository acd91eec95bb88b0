//! Page Cluster Classifier - ordered pattern rules with deterministic fallback.
//!
//! `classify` is pure, total, and deterministic: it never errors, and the
//! same path always yields the same cluster for a given rule set. The rule
//! set is a versioned configuration input, compiled once per run.

use regex::Regex;
use tracing::debug;

use crate::config::{ClusterConfig, ConfigError};
use crate::types::path_of;

/// Compiled ordered rule set. First match wins.
pub struct ClusterClassifier {
    rules: Vec<(Regex, String)>,
}

impl ClusterClassifier {
    /// Compile the configured pattern table.
    ///
    /// Invalid patterns are a configuration error surfaced at startup, not
    /// at classification time — `classify` itself cannot fail.
    pub fn compile(config: &ClusterConfig) -> Result<Self, ConfigError> {
        let mut rules = Vec::with_capacity(config.rules.len());
        for rule in &config.rules {
            let re = Regex::new(&rule.pattern).map_err(|e| {
                ConfigError::Validation(format!(
                    "cluster pattern '{}' failed to compile: {e}",
                    rule.pattern
                ))
            })?;
            rules.push((re, rule.cluster.clone()));
        }
        debug!(rules = rules.len(), "Cluster classifier compiled");
        Ok(Self { rules })
    }

    /// Map a page path (or full URL) to its cluster id.
    ///
    /// Rules are tested in declaration order; the first match wins. Paths
    /// matching no rule fall back to `/{first-segment}/*`, or `/other` when
    /// the path has no segment.
    pub fn classify(&self, path: &str) -> String {
        let path = path_of(path);
        for (re, cluster) in &self.rules {
            if re.is_match(path) {
                return cluster.clone();
            }
        }
        fallback_cluster(path)
    }
}

/// Deterministic fallback: `/{first-segment}/*`, or `/other` for paths with
/// no usable segment.
fn fallback_cluster(path: &str) -> String {
    let first_segment = path.trim_start_matches('/').split('/').next().unwrap_or("");
    if first_segment.is_empty() {
        "/other".to_string()
    } else {
        format!("/{first_segment}/*")
    }
}
