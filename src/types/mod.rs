//! Core data model for the diagnosis engine.
//!
//! Everything a diagnostic run consumes or produces lives here: upstream
//! rollup records, window deltas, anomalies, hypotheses with their evidence,
//! tickets, and the run record itself.

mod anomaly;
mod classification;
mod deltas;
mod hypothesis;
mod rollups;
mod run;
mod ticket;

pub use anomaly::{any_top_scope_drop, Anomaly, AnomalyKind};
pub use classification::RunClassification;
pub use deltas::{
    AnalyticsDeltas, DeltaStats, Deltas, Metric, MetricDelta, SearchDeltas, WindowBounds,
    WindowStats,
};
pub use hypothesis::{
    Confidence, EvidenceBlock, EvidenceKind, EvidenceStrength, Hypothesis, HypothesisKey,
};
pub use rollups::{path_of, AnalyticsDailyRollup, PageCheck, SearchDailyRollup, SiteFixture};
pub use run::{DataSource, FetchState, FetchStatus, Run, RunError, RunStatus, RunType};
pub use ticket::{ImpactEstimate, ImpactLevel, Owner, Priority, Ticket, TicketStatus};
