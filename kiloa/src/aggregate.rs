//! Fleet-wide rollups.
//!
//! Totals include every known node, offline ones too: an offline node keeps
//! contributing its last known values until it is removed from the store.

use crate::status::derive_status;
use crate::types::{percent, NodeState, NodeStatus, NodeView};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct FleetTotals {
    pub total_nodes: usize,
    pub mem_used: u64,
    pub mem_total: u64,
    pub disk_used: u64,
    pub disk_total: u64,
    pub net_up: f64,
    pub net_down: f64,
}

impl FleetTotals {
    fn of(node: &NodeState) -> Self {
        let r = &node.report;
        Self {
            total_nodes: 1,
            mem_used: r.mem_used,
            mem_total: r.mem_total,
            disk_used: r.disk_used,
            disk_total: r.disk_total,
            net_up: r.net_up,
            net_down: r.net_down,
        }
    }

    /// Merge totals of two disjoint node sets.
    pub fn combine(self, other: Self) -> Self {
        Self {
            total_nodes: self.total_nodes + other.total_nodes,
            mem_used: self.mem_used.saturating_add(other.mem_used),
            mem_total: self.mem_total.saturating_add(other.mem_total),
            disk_used: self.disk_used.saturating_add(other.disk_used),
            disk_total: self.disk_total.saturating_add(other.disk_total),
            net_up: self.net_up + other.net_up,
            net_down: self.net_down + other.net_down,
        }
    }
}

pub fn aggregate<'a, I>(nodes: I) -> FleetTotals
where
    I: IntoIterator<Item = &'a NodeState>,
{
    nodes
        .into_iter()
        .map(FleetTotals::of)
        .fold(FleetTotals::default(), FleetTotals::combine)
}

pub fn node_view(state: NodeState, now: DateTime<Utc>, threshold: Duration) -> NodeView {
    let status = derive_status(&state, now, threshold);
    let r = &state.report;
    let mem_percent = percent(r.mem_used, r.mem_total);
    let disk_percent = percent(r.disk_used, r.disk_total);
    let load_percent = if r.cores > 0 {
        r.load_1 / f64::from(r.cores) * 100.0
    } else {
        0.0
    };
    let NodeState {
        created_at,
        updated_at,
        last_seen,
        last_report_at,
        report,
        ..
    } = state;
    NodeView {
        report,
        created_at,
        updated_at,
        last_seen,
        last_report_at,
        status,
        mem_percent,
        disk_percent,
        load_percent,
    }
}

/// Most recently seen first.
pub fn node_views(mut nodes: Vec<NodeState>, now: DateTime<Utc>, threshold: Duration) -> Vec<NodeView> {
    nodes.sort_by(|a, b| b.last_seen.cmp(&a.last_seen).then_with(|| a.node_id.cmp(&b.node_id)));
    nodes
        .into_iter()
        .map(|n| node_view(n, now, threshold))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FleetSnapshot {
    pub generated_at: DateTime<Utc>,
    pub totals: FleetTotals,
    pub online: usize,
    pub offline: usize,
    pub nodes: Vec<NodeView>,
}

impl FleetSnapshot {
    pub fn compute(nodes: Vec<NodeState>, now: DateTime<Utc>, threshold: Duration) -> Self {
        let totals = aggregate(&nodes);
        let nodes = node_views(nodes, now, threshold);
        let online = nodes.iter().filter(|n| n.status == NodeStatus::Online).count();
        Self {
            generated_at: now,
            totals,
            online,
            offline: nodes.len() - online,
            nodes,
        }
    }
}
