//! Run Orchestrator - sequences the diagnosis stages per run.

mod orchestrator;

pub use orchestrator::{PipelineError, RunOrchestrator};
