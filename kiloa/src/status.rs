//! Liveness from staleness.

use crate::types::{NodeState, NodeStatus};
use chrono::{DateTime, Duration, Utc};

pub const DEFAULT_STALE_AFTER_SECS: i64 = 120;

/// Online iff `now - last_seen <= threshold`; a node seen exactly `threshold` ago is
/// still online. A `last_seen` in the future counts as age zero.
pub fn derive_status(node: &NodeState, now: DateTime<Utc>, threshold: Duration) -> NodeStatus {
    if now - node.last_seen > threshold {
        NodeStatus::Offline
    } else {
        NodeStatus::Online
    }
}
