//! Shared state for handlers and background tasks.

use crate::aggregate::{node_view, node_views, FleetSnapshot};
use crate::config::ServerConfig;
use crate::error::IngestError;
use crate::history::{HistoryStore, DEFAULT_RETENTION_HOURS};
use crate::store::FleetStore;
use crate::types::{HistoryPoint, IngestOutcome, NodeReport, NodeView};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<FleetStore>,
    pub history: Arc<HistoryStore>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(store: FleetStore, config: ServerConfig) -> Self {
        let history = HistoryStore::new(
            config.history_throttle,
            Duration::hours(DEFAULT_RETENTION_HOURS),
        );
        Self {
            store: Arc::new(store),
            history: Arc::new(history),
            config: Arc::new(config),
        }
    }

    /// Store the report, then chart it if it changed the node's fields.
    pub async fn ingest(
        &self,
        report: NodeReport,
        observed_at: DateTime<Utc>,
    ) -> Result<IngestOutcome, IngestError> {
        let outcome = self.store.ingest(report.clone(), observed_at).await?;
        if outcome.changed_fields() {
            self.history.record(&report, observed_at).await;
        }
        Ok(outcome)
    }

    pub async fn nodes(&self, now: DateTime<Utc>) -> Vec<NodeView> {
        node_views(self.store.get_all().await, now, self.config.stale_after)
    }

    pub async fn node(&self, node_id: &str, now: DateTime<Utc>) -> Option<NodeView> {
        let state = self.store.get(node_id).await?;
        Some(node_view(state, now, self.config.stale_after))
    }

    /// Points within retention of `now`; None when the node has never reported.
    pub async fn history(&self, node_id: &str, now: DateTime<Utc>) -> Option<Vec<HistoryPoint>> {
        self.store.get(node_id).await?;
        Some(self.history.points(node_id, now).await)
    }

    pub async fn snapshot(&self, now: DateTime<Utc>) -> FleetSnapshot {
        FleetSnapshot::compute(self.store.get_all().await, now, self.config.stale_after)
    }
}
