//! Authoritative node state with out-of-order safe ingestion.
//!
//! Reports arrive over an unordered transport, so a report replaces stored fields only
//! when its agent timestamp is strictly newer than the last accepted one. Each identity
//! has its own mutex; the read-compare-write for one node runs under it while other
//! nodes ingest in parallel.

use crate::error::IngestError;
use crate::types::{IngestOutcome, NodeReport, NodeState};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

type Slot = Arc<Mutex<NodeState>>;

#[derive(Default)]
pub struct FleetStore {
    nodes: RwLock<HashMap<String, Slot>>,
    stats: IngestStats,
}

#[derive(Default)]
struct IngestStats {
    created: AtomicU64,
    accepted: AtomicU64,
    stale_discarded: AtomicU64,
    rejected: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestCounters {
    pub created: u64,
    pub accepted: u64,
    pub stale_discarded: u64,
    pub rejected: u64,
}

impl NodeState {
    fn first_seen(report: NodeReport, observed_at: DateTime<Utc>) -> Self {
        Self {
            node_id: report.node_id.clone(),
            created_at: observed_at,
            updated_at: observed_at,
            last_seen: observed_at,
            last_report_at: report.timestamp,
            report,
        }
    }

    /// Ordering rule for an existing node.
    fn apply(&mut self, mut report: NodeReport, observed_at: DateTime<Utc>) -> IngestOutcome {
        self.last_seen = self.last_seen.max(observed_at);
        if report.timestamp <= self.last_report_at {
            return IngestOutcome::StaleDiscarded;
        }
        report.inherit_host_facts(&self.report);
        self.last_report_at = report.timestamp;
        self.updated_at = observed_at;
        self.report = report;
        IngestOutcome::Accepted
    }
}

impl FleetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from persisted records.
    pub fn from_states(states: impl IntoIterator<Item = NodeState>) -> Self {
        let nodes = states
            .into_iter()
            .map(|s| (s.node_id.clone(), Arc::new(Mutex::new(s))))
            .collect();
        Self {
            nodes: RwLock::new(nodes),
            stats: IngestStats::default(),
        }
    }

    pub async fn ingest(
        &self,
        report: NodeReport,
        observed_at: DateTime<Utc>,
    ) -> Result<IngestOutcome, IngestError> {
        if let Err(e) = validate(&report) {
            self.stats.rejected.fetch_add(1, Ordering::Relaxed);
            return Err(e);
        }
        let node_id = report.node_id.clone();

        let existing = self.nodes.read().await.get(&node_id).cloned();
        let slot = match existing {
            Some(slot) => slot,
            None => {
                let mut nodes = self.nodes.write().await;
                match nodes.entry(node_id.clone()) {
                    // lost the race with another first report for this node
                    Entry::Occupied(e) => e.get().clone(),
                    Entry::Vacant(e) => {
                        e.insert(Arc::new(Mutex::new(NodeState::first_seen(report, observed_at))));
                        self.stats.created.fetch_add(1, Ordering::Relaxed);
                        info!(node = %node_id, "new node");
                        return Ok(IngestOutcome::Created);
                    }
                }
            }
        };

        let mut state = slot.lock().await;
        let incoming = report.timestamp;
        let outcome = state.apply(report, observed_at);
        match outcome {
            IngestOutcome::StaleDiscarded => {
                self.stats.stale_discarded.fetch_add(1, Ordering::Relaxed);
                debug!(
                    node = %node_id,
                    report_ts = %incoming,
                    stored_ts = %state.last_report_at,
                    "stale report discarded"
                );
            }
            _ => {
                self.stats.accepted.fetch_add(1, Ordering::Relaxed);
            }
        }
        Ok(outcome)
    }

    /// Point-in-time copy of every node; each entry is cloned under its own lock.
    pub async fn get_all(&self) -> Vec<NodeState> {
        let nodes = self.nodes.read().await;
        let mut out = Vec::with_capacity(nodes.len());
        for slot in nodes.values() {
            out.push(slot.lock().await.clone());
        }
        out
    }

    pub async fn get(&self, node_id: &str) -> Option<NodeState> {
        let slot = self.nodes.read().await.get(node_id).cloned()?;
        let state = slot.lock().await.clone();
        Some(state)
    }

    pub async fn len(&self) -> usize {
        self.nodes.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub fn counters(&self) -> IngestCounters {
        IngestCounters {
            created: self.stats.created.load(Ordering::Relaxed),
            accepted: self.stats.accepted.load(Ordering::Relaxed),
            stale_discarded: self.stats.stale_discarded.load(Ordering::Relaxed),
            rejected: self.stats.rejected.load(Ordering::Relaxed),
        }
    }
}

fn validate(report: &NodeReport) -> Result<(), IngestError> {
    if report.node_id.trim().is_empty() {
        return Err(IngestError::MissingIdentity);
    }
    let rates = [
        ("cpu_steal", report.cpu_steal),
        ("net_up", report.net_up),
        ("net_down", report.net_down),
        ("load_1", report.load_1),
        ("load_5", report.load_5),
        ("load_15", report.load_15),
    ];
    for (field, v) in rates {
        if !v.is_finite() || v < 0.0 {
            return Err(IngestError::InvalidReport { field });
        }
    }
    if report.cpu_steal > 100.0 {
        return Err(IngestError::InvalidReport { field: "cpu_steal" });
    }
    Ok(())
}
