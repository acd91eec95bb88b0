//! Hypothesis Generator & Ranker.
//!
//! Evaluates the fixed 11-key catalog against the run's anomalies, cluster
//! losses, and page checks; scores confidence from the evidence mix; and
//! ranks deterministically.

mod catalog;
mod evidence;
mod generator;

pub use catalog::{category, priority, routed_owner, title, Category};
pub use evidence::score_confidence;
pub use generator::{EvidenceContext, HypothesisGenerator};
