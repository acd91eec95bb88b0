//! RunStore trait — pluggable persistence for run artifacts.
//!
//! Abstracts run/anomaly/hypothesis/ticket persistence so different
//! backends can be swapped without touching pipeline code:
//! - `InMemoryRunStore`: in-memory store for testing and minimal deployments
//! - Future: a database-backed store for production fleets
//!
//! Cross-run state lives only here; each run writes only rows keyed by its
//! own run id, so concurrent runs never share mutable state.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use super::StoreError;
use crate::config::defaults;
use crate::types::{Anomaly, Hypothesis, HypothesisKey, Run, Ticket};

/// Trait for pluggable run-artifact persistence backends.
///
/// Implementations must be thread-safe (`Send + Sync`) for shared access
/// across async tasks.
pub trait RunStore: Send + Sync {
    /// Insert or update a run record.
    ///
    /// Returns [`StoreError::TerminalRun`] when the stored run is already
    /// in a terminal state — finished runs are immutable.
    fn store_run(&self, run: &Run) -> Result<(), StoreError>;

    /// Get a run by id.
    fn get_run(&self, run_id: &str) -> Result<Option<Run>, StoreError>;

    /// Append anomalies for a run.
    fn store_anomalies(&self, run_id: &str, anomalies: &[Anomaly]) -> Result<(), StoreError>;

    /// Get the anomalies of a run.
    fn get_anomalies(&self, run_id: &str) -> Result<Vec<Anomaly>, StoreError>;

    /// Store the ranked hypotheses of a run.
    fn store_hypotheses(&self, run_id: &str, hypotheses: &[Hypothesis]) -> Result<(), StoreError>;

    /// Get the hypotheses of a run, in rank order.
    fn get_hypotheses(&self, run_id: &str) -> Result<Vec<Hypothesis>, StoreError>;

    /// Store a ticket.
    fn store_ticket(&self, ticket: &Ticket) -> Result<(), StoreError>;

    /// Find a ticket by its idempotency key (run id, hypothesis key).
    fn find_ticket(
        &self,
        run_id: &str,
        key: HypothesisKey,
    ) -> Result<Option<Ticket>, StoreError>;

    /// Tickets of a run, in creation order.
    fn get_tickets(&self, run_id: &str) -> Result<Vec<Ticket>, StoreError>;

    /// Allocate the next human-readable ticket id, e.g. `"TICK-1024"`.
    fn next_ticket_id(&self) -> Result<String, StoreError>;

    /// Backend name for logging.
    fn backend_name(&self) -> &'static str;
}

/// In-memory run store for testing and minimal deployments.
///
/// Thread-safe via `RwLock`. Not durable — data lost on restart.
pub struct InMemoryRunStore {
    runs: RwLock<HashMap<String, Run>>,
    anomalies: RwLock<HashMap<String, Vec<Anomaly>>>,
    hypotheses: RwLock<HashMap<String, Vec<Hypothesis>>>,
    tickets: RwLock<Vec<Ticket>>,
    ticket_seq: AtomicU64,
}

impl InMemoryRunStore {
    pub fn new() -> Self {
        Self {
            runs: RwLock::new(HashMap::new()),
            anomalies: RwLock::new(HashMap::new()),
            hypotheses: RwLock::new(HashMap::new()),
            tickets: RwLock::new(Vec::new()),
            ticket_seq: AtomicU64::new(defaults::TICKET_SEQ_START),
        }
    }
}

impl Default for InMemoryRunStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned(e: impl std::fmt::Display) -> StoreError {
    StoreError::Storage(e.to_string())
}

impl RunStore for InMemoryRunStore {
    fn store_run(&self, run: &Run) -> Result<(), StoreError> {
        let mut runs = self.runs.write().map_err(poisoned)?;
        if let Some(existing) = runs.get(&run.id) {
            if existing.status.is_terminal() {
                return Err(StoreError::TerminalRun(run.id.clone()));
            }
        }
        runs.insert(run.id.clone(), run.clone());
        Ok(())
    }

    fn get_run(&self, run_id: &str) -> Result<Option<Run>, StoreError> {
        let runs = self.runs.read().map_err(poisoned)?;
        Ok(runs.get(run_id).cloned())
    }

    fn store_anomalies(&self, run_id: &str, anomalies: &[Anomaly]) -> Result<(), StoreError> {
        let mut store = self.anomalies.write().map_err(poisoned)?;
        store
            .entry(run_id.to_string())
            .or_default()
            .extend_from_slice(anomalies);
        Ok(())
    }

    fn get_anomalies(&self, run_id: &str) -> Result<Vec<Anomaly>, StoreError> {
        let store = self.anomalies.read().map_err(poisoned)?;
        Ok(store.get(run_id).cloned().unwrap_or_default())
    }

    fn store_hypotheses(&self, run_id: &str, hypotheses: &[Hypothesis]) -> Result<(), StoreError> {
        let mut store = self.hypotheses.write().map_err(poisoned)?;
        store.insert(run_id.to_string(), hypotheses.to_vec());
        Ok(())
    }

    fn get_hypotheses(&self, run_id: &str) -> Result<Vec<Hypothesis>, StoreError> {
        let store = self.hypotheses.read().map_err(poisoned)?;
        let mut hypotheses = store.get(run_id).cloned().unwrap_or_default();
        hypotheses.sort_by_key(|h| h.rank);
        Ok(hypotheses)
    }

    fn store_ticket(&self, ticket: &Ticket) -> Result<(), StoreError> {
        let mut tickets = self.tickets.write().map_err(poisoned)?;
        tickets.push(ticket.clone());
        Ok(())
    }

    fn find_ticket(
        &self,
        run_id: &str,
        key: HypothesisKey,
    ) -> Result<Option<Ticket>, StoreError> {
        let tickets = self.tickets.read().map_err(poisoned)?;
        Ok(tickets
            .iter()
            .find(|t| t.run_id == run_id && t.hypothesis_key == key)
            .cloned())
    }

    fn get_tickets(&self, run_id: &str) -> Result<Vec<Ticket>, StoreError> {
        let tickets = self.tickets.read().map_err(poisoned)?;
        Ok(tickets
            .iter()
            .filter(|t| t.run_id == run_id)
            .cloned()
            .collect())
    }

    fn next_ticket_id(&self) -> Result<String, StoreError> {
        let seq = self.ticket_seq.fetch_add(1, Ordering::SeqCst);
        Ok(format!("TICK-{seq}"))
    }

    fn backend_name(&self) -> &'static str {
        "InMemory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RunStatus, RunType};

    #[test]
    fn store_and_retrieve_run() {
        let store = InMemoryRunStore::new();
        let run = Run::new("site-1", RunType::Full);
        store.store_run(&run).unwrap();

        let loaded = store.get_run(&run.id).unwrap().unwrap();
        assert_eq!(loaded.id, run.id);
        assert_eq!(loaded.status, RunStatus::Running);
    }

    #[test]
    fn terminal_runs_are_immutable() {
        let store = InMemoryRunStore::new();
        let mut run = Run::new("site-1", RunType::Full);
        store.store_run(&run).unwrap();

        run.finish(RunStatus::Completed);
        store.store_run(&run).unwrap();

        // any further mutation attempt is rejected
        run.summary = "tampered".to_string();
        let err = store.store_run(&run).unwrap_err();
        assert!(matches!(err, StoreError::TerminalRun(_)));
    }

    #[test]
    fn ticket_ids_are_sequential_and_readable() {
        let store = InMemoryRunStore::new();
        let first = store.next_ticket_id().unwrap();
        let second = store.next_ticket_id().unwrap();
        assert_eq!(first, "TICK-1024");
        assert_eq!(second, "TICK-1025");
    }

    #[test]
    fn find_ticket_by_idempotency_key() {
        let store = InMemoryRunStore::new();
        let ticket = Ticket {
            id: "TICK-1024".to_string(),
            run_id: "run-a".to_string(),
            hypothesis_key: HypothesisKey::RobotsOrNoindex,
            title: "t".to_string(),
            owner: crate::types::Owner::Dev,
            priority: crate::types::Priority::P0,
            status: crate::types::TicketStatus::Open,
            steps: Vec::new(),
            expected_impact: crate::types::ImpactLevel::High,
            impact: crate::types::ImpactEstimate::default(),
            evidence_refs: Vec::new(),
        };
        store.store_ticket(&ticket).unwrap();

        assert!(store
            .find_ticket("run-a", HypothesisKey::RobotsOrNoindex)
            .unwrap()
            .is_some());
        assert!(store
            .find_ticket("run-a", HypothesisKey::Seasonality)
            .unwrap()
            .is_none());
        assert!(store
            .find_ticket("run-b", HypothesisKey::RobotsOrNoindex)
            .unwrap()
            .is_none());
    }

    #[test]
    fn trait_object_usable() {
        let store: Box<dyn RunStore> = Box::new(InMemoryRunStore::new());
        assert_eq!(store.backend_name(), "InMemory");
    }
}
