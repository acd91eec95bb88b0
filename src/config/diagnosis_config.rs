//! Diagnosis Configuration - every tunable the engine reads, as TOML.
//!
//! Each struct implements `Default` with values matching `defaults.rs`, so
//! behavior is unchanged when no config file is present.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::defaults;
use crate::types::Confidence;

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for a diagnosis deployment.
///
/// Load with `DiagnosisConfig::load()` which searches:
/// 1. `$TRAFFICDX_CONFIG` env var
/// 2. `./diagnosis.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosisConfig {
    /// Config version string recorded on every run for reproducibility
    #[serde(default = "default_version")]
    pub version: String,

    /// Current/baseline window sizing
    #[serde(default)]
    pub windows: WindowConfig,

    /// Drop and significance thresholds
    #[serde(default)]
    pub thresholds: ThresholdConfig,

    /// Ordered page-cluster pattern rules
    #[serde(default)]
    pub clusters: ClusterConfig,

    /// Ticket synthesis limits
    #[serde(default)]
    pub tickets: TicketConfig,

    /// Upstream fetch behavior
    #[serde(default)]
    pub fetch: FetchConfig,
}

fn default_version() -> String {
    "v1".to_string()
}

impl Default for DiagnosisConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            windows: WindowConfig::default(),
            thresholds: ThresholdConfig::default(),
            clusters: ClusterConfig::default(),
            tickets: TicketConfig::default(),
            fetch: FetchConfig::default(),
        }
    }
}

impl DiagnosisConfig {
    /// Load configuration using the standard search order.
    pub fn load() -> Self {
        if let Ok(path) = std::env::var("TRAFFICDX_CONFIG") {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), version = %config.version, "Loaded diagnosis config from TRAFFICDX_CONFIG");
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from TRAFFICDX_CONFIG, falling back");
                    }
                }
            } else {
                warn!(path = %path, "TRAFFICDX_CONFIG points to non-existent file, falling back");
            }
        }

        let local = PathBuf::from("diagnosis.toml");
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!(version = %config.version, "Loaded diagnosis config from ./diagnosis.toml");
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./diagnosis.toml, using defaults");
                }
            }
        }

        info!("No diagnosis.toml found — using built-in defaults");
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let config: Self =
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Validate the configuration for internal consistency.
    ///
    /// Rules:
    /// - window sizes must be positive and the z-score floor must fit in the
    ///   baseline window
    /// - drop/z thresholds must be negative (they describe drops)
    /// - cluster loss share must be in (0, 1]
    /// - every cluster pattern must compile as a regex
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        if self.windows.current_days == 0 {
            errors.push("windows.current_days must be >= 1".to_string());
        }
        if self.windows.baseline_days == 0 {
            errors.push("windows.baseline_days must be >= 1".to_string());
        }
        if self.windows.z_score_min_baseline_days > self.windows.baseline_days {
            errors.push(format!(
                "windows.z_score_min_baseline_days ({}) cannot exceed windows.baseline_days ({})",
                self.windows.z_score_min_baseline_days, self.windows.baseline_days
            ));
        }
        if self.windows.min_baseline_days == 0 {
            errors.push("windows.min_baseline_days must be >= 1".to_string());
        }

        if self.thresholds.drop_pct >= 0.0 {
            errors.push(format!(
                "thresholds.drop_pct ({}) must be negative — it describes a drop",
                self.thresholds.drop_pct
            ));
        }
        if self.thresholds.z_score >= 0.0 {
            errors.push(format!(
                "thresholds.z_score ({}) must be negative — it describes a drop",
                self.thresholds.z_score
            ));
        }
        if self.thresholds.cluster_loss_share <= 0.0 || self.thresholds.cluster_loss_share > 1.0 {
            errors.push(format!(
                "thresholds.cluster_loss_share ({}) must be in (0, 1]",
                self.thresholds.cluster_loss_share
            ));
        }

        for rule in &self.clusters.rules {
            if let Err(e) = regex::Regex::new(&rule.pattern) {
                errors.push(format!(
                    "clusters rule '{}' is not a valid pattern: {e}",
                    rule.pattern
                ));
            }
            if rule.cluster.is_empty() {
                errors.push(format!(
                    "clusters rule '{}' maps to an empty cluster label",
                    rule.pattern
                ));
            }
        }

        if self.tickets.max_tickets == 0 {
            errors.push("tickets.max_tickets must be >= 1".to_string());
        }
        if self.fetch.timeout_secs == 0 {
            errors.push("fetch.timeout_secs must be >= 1".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors.join("; ")))
        }
    }
}

// ============================================================================
// Sections
// ============================================================================

/// Current/baseline window sizing and data floors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Current-window length (days)
    #[serde(default = "d_current_days")]
    pub current_days: u32,
    /// Baseline-window length (days)
    #[serde(default = "d_baseline_days")]
    pub baseline_days: u32,
    /// Minimum baseline days with data before a delta is computed at all
    #[serde(default = "d_min_baseline_days")]
    pub min_baseline_days: u32,
    /// Minimum baseline days with data before a z-score is computed
    #[serde(default = "d_z_floor_days")]
    pub z_score_min_baseline_days: u32,
}

fn d_current_days() -> u32 {
    defaults::CURRENT_WINDOW_DAYS
}
fn d_baseline_days() -> u32 {
    defaults::BASELINE_WINDOW_DAYS
}
fn d_min_baseline_days() -> u32 {
    defaults::MIN_BASELINE_DAYS
}
fn d_z_floor_days() -> u32 {
    defaults::Z_SCORE_MIN_BASELINE_DAYS
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            current_days: d_current_days(),
            baseline_days: d_baseline_days(),
            min_baseline_days: d_min_baseline_days(),
            z_score_min_baseline_days: d_z_floor_days(),
        }
    }
}

/// Drop and significance thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdConfig {
    /// Percentage-delta drop threshold (negative)
    #[serde(default = "d_drop_pct")]
    pub drop_pct: f64,
    /// Z-score significance threshold (negative)
    #[serde(default = "d_z_score")]
    pub z_score: f64,
    /// Minimum baseline std-dev below which the z-score is skipped
    #[serde(default = "d_min_std_floor")]
    pub min_std_floor: f64,
    /// Dominant-cluster loss-share threshold
    #[serde(default = "d_cluster_loss_share")]
    pub cluster_loss_share: f64,
    /// Thin-content length floor (chars)
    #[serde(default = "d_min_text_length")]
    pub min_text_length: u32,
    /// Analytics-vs-search disagreement factor for tracking-gap detection
    #[serde(default = "d_tracking_factor")]
    pub tracking_disagreement_factor: f64,
}

fn d_drop_pct() -> f64 {
    defaults::DROP_PCT
}
fn d_z_score() -> f64 {
    defaults::Z_SCORE_THRESHOLD
}
fn d_min_std_floor() -> f64 {
    defaults::MIN_STD_FLOOR
}
fn d_cluster_loss_share() -> f64 {
    defaults::CLUSTER_LOSS_SHARE
}
fn d_min_text_length() -> u32 {
    defaults::MIN_TEXT_LENGTH
}
fn d_tracking_factor() -> f64 {
    defaults::TRACKING_DISAGREEMENT_FACTOR
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            drop_pct: d_drop_pct(),
            z_score: d_z_score(),
            min_std_floor: d_min_std_floor(),
            cluster_loss_share: d_cluster_loss_share(),
            min_text_length: d_min_text_length(),
            tracking_disagreement_factor: d_tracking_factor(),
        }
    }
}

/// One ordered cluster rule: pattern → cluster label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterRule {
    /// Anchored regex tested against the page path
    pub pattern: String,
    /// Cluster label, e.g. `"/services/*"`
    pub cluster: String,
}

/// Ordered cluster pattern table; first match wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    #[serde(default = "default_cluster_rules")]
    pub rules: Vec<ClusterRule>,
}

fn default_cluster_rules() -> Vec<ClusterRule> {
    vec![
        ClusterRule {
            pattern: "^/services/".to_string(),
            cluster: "/services/*".to_string(),
        },
        ClusterRule {
            pattern: "^/blog/".to_string(),
            cluster: "/blog/*".to_string(),
        },
        ClusterRule {
            pattern: "^/$".to_string(),
            cluster: "/".to_string(),
        },
    ]
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            rules: default_cluster_rules(),
        }
    }
}

/// Ticket synthesis limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketConfig {
    /// Maximum tickets per run (top-ranked hypotheses first)
    #[serde(default = "d_max_tickets")]
    pub max_tickets: usize,
    /// Minimum hypothesis confidence for ticketing
    #[serde(default = "d_min_confidence")]
    pub min_confidence: Confidence,
}

fn d_max_tickets() -> usize {
    defaults::MAX_TICKETS
}
fn d_min_confidence() -> Confidence {
    Confidence::Medium
}

impl Default for TicketConfig {
    fn default() -> Self {
        Self {
            max_tickets: d_max_tickets(),
            min_confidence: d_min_confidence(),
        }
    }
}

/// Upstream fetch behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Per-source fetch timeout (seconds)
    #[serde(default = "d_timeout_secs")]
    pub timeout_secs: u64,
}

fn d_timeout_secs() -> u64 {
    defaults::FETCH_TIMEOUT_SECS
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: d_timeout_secs(),
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Configuration loading/validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("failed to parse config file {0}: {1}")]
    Parse(PathBuf, #[source] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[source] toml::ser::Error),

    #[error("invalid configuration: {0}")]
    Validation(String),
}

// ============================================================================
// Tests
// ============================================================================
