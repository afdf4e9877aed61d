//! Types that mirror the agent's JSON report, plus the server-side node record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

fn unknown() -> String {
    "Unknown".into()
}

/// One report as posted by an agent. Missing numeric fields read as zero, missing
/// labels as "Unknown"; `timestamp` is required.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeReport {
    #[serde(default)]
    pub node_id: String,
    #[serde(default = "unknown")]
    pub location: String,
    #[serde(default = "unknown")]
    pub isp: String,
    pub timestamp: DateTime<Utc>,

    #[serde(default)]
    pub uptime: u64,
    #[serde(default)]
    pub cores: u32,
    #[serde(default)]
    pub load_1: f64,
    #[serde(default)]
    pub load_5: f64,
    #[serde(default)]
    pub load_15: f64,
    #[serde(default)]
    pub mem_used: u64,
    #[serde(default)]
    pub mem_total: u64,
    #[serde(default)]
    pub disk_used: u64,
    #[serde(default)]
    pub disk_total: u64,

    // derived on the agent: percent and MiB/s
    #[serde(default)]
    pub cpu_steal: f64,
    #[serde(default)]
    pub net_up: f64,
    #[serde(default)]
    pub net_down: f64,

    // static host facts, sent when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_distro: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kernel_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_cores_detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boot_time: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_ip: Option<String>,
}

impl NodeReport {
    /// Keep previously known host facts where this report leaves them out.
    pub fn inherit_host_facts(&mut self, older: &NodeReport) {
        fn keep<T: Clone>(slot: &mut Option<T>, old: &Option<T>) {
            if slot.is_none() {
                slot.clone_from(old);
            }
        }
        keep(&mut self.host_name, &older.host_name);
        keep(&mut self.os_distro, &older.os_distro);
        keep(&mut self.kernel_version, &older.kernel_version);
        keep(&mut self.cpu_model, &older.cpu_model);
        keep(&mut self.cpu_cores_detail, &older.cpu_cores_detail);
        keep(&mut self.boot_time, &older.boot_time);
        keep(&mut self.public_ip, &older.public_ip);
    }
}

/// Authoritative per-node record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeState {
    pub node_id: String,
    /// First observation of this identity; never reassigned.
    pub created_at: DateTime<Utc>,
    /// Server time of the last accepted report.
    pub updated_at: DateTime<Utc>,
    /// Server time of the last delivery, accepted or not.
    pub last_seen: DateTime<Utc>,
    /// Agent timestamp of the last accepted report; never decreases.
    pub last_report_at: DateTime<Utc>,
    pub report: NodeReport,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Online,
    Offline,
}

/// What `FleetStore::ingest` did with a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestOutcome {
    /// First report for this identity.
    Created,
    Accepted,
    /// Not newer than the stored report: payload dropped, `last_seen` refreshed.
    #[serde(rename = "stale")]
    StaleDiscarded,
}

impl IngestOutcome {
    pub fn changed_fields(self) -> bool {
        !matches!(self, IngestOutcome::StaleDiscarded)
    }
}

/// A node as returned by the query API: one flat row of report fields, bookkeeping
/// times and derived fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeView {
    #[serde(flatten)]
    pub report: NodeReport,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub last_report_at: DateTime<Utc>,
    pub status: NodeStatus,
    pub mem_percent: f64,
    pub disk_percent: f64,
    /// 1-minute load relative to core count.
    pub load_percent: f64,
}

/// Downsampled history point for charts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    pub timestamp: DateTime<Utc>,
    pub load_1: f64,
    pub mem_percent: f64,
    pub disk_percent: f64,
    pub net_in: f64,
    pub net_out: f64,
}

pub fn percent(used: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        used as f64 / total as f64 * 100.0
    }
}
