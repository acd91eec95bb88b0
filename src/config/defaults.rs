//! System-wide default constants.
//!
//! Centralises the engine's magic numbers. Every value here is the
//! `Default` for the corresponding `DiagnosisConfig` field and can be
//! overridden per deployment via `diagnosis.toml`.

// ============================================================================
// Windows
// ============================================================================

/// Current-window length (days).
pub const CURRENT_WINDOW_DAYS: u32 = 3;

/// Baseline-window length (days), immediately preceding the current window.
pub const BASELINE_WINDOW_DAYS: u32 = 14;

/// Minimum baseline days with data before any percentage delta is computed.
pub const MIN_BASELINE_DAYS: u32 = 1;

/// Minimum baseline days with data before a z-score is computed.
pub const Z_SCORE_MIN_BASELINE_DAYS: u32 = 7;

// ============================================================================
// Detection Thresholds
// ============================================================================

/// Percentage-delta drop threshold. A metric whose effective delta is at or
/// below this is flagged as a drop.
pub const DROP_PCT: f64 = -30.0;

/// Z-score threshold for the statistical significance rule.
pub const Z_SCORE_THRESHOLD: f64 = -2.0;

/// Minimum baseline standard deviation; below this the z-score is skipped
/// rather than divided against a near-zero denominator.
pub const MIN_STD_FLOOR: f64 = 1e-6;

/// A cluster is the dominant cause when its share of total click loss
/// reaches this fraction.
pub const CLUSTER_LOSS_SHARE: f64 = 0.6;

/// Pages with rendered text below this length count as thin content (chars).
pub const MIN_TEXT_LENGTH: u32 = 300;

/// Analytics-vs-search disagreement factor for the tracking-gap rule: an
/// analytics drop at least this many times the search drop (in effective
/// percentage points) while search is stable counts as a sharp disagreement.
pub const TRACKING_DISAGREEMENT_FACTOR: f64 = 2.0;

// ============================================================================
// Tickets
// ============================================================================

/// Maximum tickets synthesized per run (top-ranked hypotheses first).
pub const MAX_TICKETS: usize = 3;

/// First ticket sequence number; ids look like `TICK-1024`.
pub const TICKET_SEQ_START: u64 = 1024;

// ============================================================================
// Fetching
// ============================================================================

/// Per-source fetch timeout (seconds). A timeout marks the family as
/// unavailable for this run; it does not fail the run on its own.
pub const FETCH_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// Impact Estimation
// ============================================================================

/// Recoverable-clicks scale factor per confidence bucket.
pub const RECOVERY_SCALE_HIGH: f64 = 0.9;
pub const RECOVERY_SCALE_MEDIUM: f64 = 0.6;
pub const RECOVERY_SCALE_LOW: f64 = 0.3;

/// Loss fractions of baseline traffic that bound the expected-impact bucket.
pub const IMPACT_HIGH_LOSS_FRACTION: f64 = 0.30;
pub const IMPACT_MEDIUM_LOSS_FRACTION: f64 = 0.10;
