//! TrafficDX: Traffic Regression Diagnosis Engine
//!
//! Consumes daily search/analytics rollups and decides *whether* a
//! meaningful drop occurred, *where* (which page cluster) it is
//! concentrated, *why* it most likely happened (ranked, evidence-backed
//! hypotheses), and *what* to do about it (prioritized tickets).
//!
//! ## Architecture
//!
//! - **Window & Delta Calculator**: current-vs-baseline aggregates per metric
//! - **Anomaly Detector**: percentage and z-score significance rules
//! - **Cluster Classifier + Loss Analyzer**: structural localisation of loss
//! - **Hypothesis Generator & Ranker**: 11-key catalog with evidence scoring
//! - **Classification & Priority Mapper**: one label per run, static tiers
//! - **Ticket Synthesizer**: owner-routed, idempotent remediation tickets
//! - **Run Orchestrator**: fetch, sequence, persist, lifecycle state machine

pub mod classify;
pub mod cluster;
pub mod config;
pub mod detector;
pub mod hypothesis;
pub mod pipeline;
pub mod store;
pub mod tickets;
pub mod types;
pub mod window;

// Re-export configuration
pub use config::DiagnosisConfig;

// Re-export commonly used types
pub use types::{
    Anomaly, AnomalyKind, Confidence, Deltas, EvidenceBlock, EvidenceStrength, Hypothesis,
    HypothesisKey, Owner, Priority, Run, RunClassification, RunStatus, RunType, SiteFixture,
    Ticket,
};

// Re-export stage entry points
pub use classify::classify_run;
pub use cluster::{analyze_cluster_loss, ClusterClassifier, ClusterLoss};
pub use detector::AnomalyDetector;
pub use hypothesis::HypothesisGenerator;
pub use pipeline::{PipelineError, RunOrchestrator};
pub use tickets::TicketSynthesizer;
pub use window::DeltaCalculator;

// Re-export storage seams
pub use store::{InMemoryMetricStore, InMemoryRunStore, MetricStore, RunStore, StoreError};
