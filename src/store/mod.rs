//! Storage seams: the upstream read contract and the run-artifact store.

mod metric_store;
mod run_store;

pub use metric_store::{InMemoryMetricStore, MetricStore};
pub use run_store::{InMemoryRunStore, RunStore};

/// Storage errors shared by both seams.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("upstream source unavailable: {0}")]
    Unavailable(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("run {0} is in a terminal state and cannot be mutated")]
    TerminalRun(String),

    #[error("not found")]
    NotFound,
}
