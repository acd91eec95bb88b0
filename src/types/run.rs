//! Run records and the run lifecycle.
//!
//! A `Run` is created at orchestration start, mutated in place as stages
//! complete, and immutable once its status is terminal. Retries allocate a
//! new run id instead of reviving a finished run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Confidence, Deltas, RunClassification};

/// Kind of diagnostic execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunType {
    Full,
    Smoke,
    Scheduled,
}

impl std::fmt::Display for RunType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunType::Full => write!(f, "full"),
            RunType::Smoke => write!(f, "smoke"),
            RunType::Scheduled => write!(f, "scheduled"),
        }
    }
}

/// Run lifecycle state: `running → completed` or `running → failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Running => write!(f, "running"),
            RunStatus::Completed => write!(f, "completed"),
            RunStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Upstream data sources the orchestrator fetches from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    SearchConsole,
    Analytics,
    PageChecks,
}

impl std::fmt::Display for DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataSource::SearchConsole => write!(f, "search_console"),
            DataSource::Analytics => write!(f, "analytics"),
            DataSource::PageChecks => write!(f, "page_checks"),
        }
    }
}

/// Outcome of one upstream fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FetchState {
    /// Fetch succeeded with at least one row
    Fetched { rows: usize },
    /// Fetch succeeded but returned no rows for the requested range
    Empty,
    /// Fetch exceeded the configured timeout — treated as data-unavailable
    TimedOut,
    /// Fetch raised an infrastructure error
    Failed { message: String },
}

impl FetchState {
    /// True when the source yielded usable rows.
    pub fn is_usable(&self) -> bool {
        matches!(self, FetchState::Fetched { rows } if *rows > 0)
    }
}

/// Per-source fetch status recorded on the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchStatus {
    pub source: DataSource,
    #[serde(flatten)]
    pub state: FetchState,
}

/// An infrastructure error recorded on the run, verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunError {
    /// Stage that raised the error, e.g. `"fetch"`, `"persist"`
    pub stage: String,
    pub message: String,
}

/// One diagnostic execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    /// Unique run id
    pub id: String,
    pub site_id: String,
    pub run_type: RunType,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// Operator-facing one-paragraph summary, composed at completion
    #[serde(default)]
    pub summary: String,
    pub anomaly_count: usize,
    pub ticket_count: usize,
    #[serde(default)]
    pub fetch_statuses: Vec<FetchStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification: Option<RunClassification>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<Confidence>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deltas: Option<Deltas>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<RunError>,
}

impl Run {
    /// Allocate a new run in the `running` state.
    pub fn new(site_id: impl Into<String>, run_type: RunType) -> Self {
        Self {
            id: format!("run-{}", uuid::Uuid::new_v4()),
            site_id: site_id.into(),
            run_type,
            status: RunStatus::Running,
            started_at: Utc::now(),
            finished_at: None,
            summary: String::new(),
            anomaly_count: 0,
            ticket_count: 0,
            fetch_statuses: Vec::new(),
            classification: None,
            confidence: None,
            deltas: None,
            errors: Vec::new(),
        }
    }

    pub fn record_error(&mut self, stage: &str, message: impl Into<String>) {
        self.errors.push(RunError {
            stage: stage.to_string(),
            message: message.into(),
        });
    }

    /// Transition to a terminal state and stamp the finish time.
    pub fn finish(&mut self, status: RunStatus) {
        debug_assert!(status.is_terminal());
        self.status = status;
        self.finished_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_run_starts_running() {
        let run = Run::new("site-1", RunType::Full);
        assert_eq!(run.status, RunStatus::Running);
        assert!(run.finished_at.is_none());
        assert!(run.id.starts_with("run-"));
    }

    #[test]
    fn run_ids_are_unique() {
        let a = Run::new("site-1", RunType::Full);
        let b = Run::new("site-1", RunType::Full);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn finish_stamps_terminal_state() {
        let mut run = Run::new("site-1", RunType::Smoke);
        run.finish(RunStatus::Completed);
        assert!(run.status.is_terminal());
        assert!(run.finished_at.is_some());
    }

    #[test]
    fn fetch_state_usability() {
        assert!(FetchState::Fetched { rows: 3 }.is_usable());
        assert!(!FetchState::Fetched { rows: 0 }.is_usable());
        assert!(!FetchState::Empty.is_usable());
        assert!(!FetchState::TimedOut.is_usable());
    }
}
