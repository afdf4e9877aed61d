//! Data types produced by the agent.
//! `NodeReport` defines the wire format posted to the dashboard; keep it flat and stable.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Cumulative CPU time since boot, in clock ticks (`/proc/stat` units).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuTimes {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
    pub steal: u64,
}

impl CpuTimes {
    pub fn total(&self) -> u64 {
        self.buckets().iter().fold(0u64, |acc, v| acc.saturating_add(*v))
    }

    pub fn buckets(&self) -> [u64; 8] {
        [
            self.user,
            self.nice,
            self.system,
            self.idle,
            self.iowait,
            self.irq,
            self.softirq,
            self.steal,
        ]
    }

    /// True if any bucket went backwards relative to `earlier`.
    pub fn regressed_from(&self, earlier: &CpuTimes) -> bool {
        self.buckets()
            .iter()
            .zip(earlier.buckets().iter())
            .any(|(now, before)| now < before)
    }
}

/// One instantaneous read of the cumulative OS counters.
#[derive(Debug, Clone, PartialEq)]
pub struct RawCounterSample {
    pub cpu: CpuTimes,
    // cumulative across interfaces since boot
    pub bytes_sent: u64,
    pub bytes_recv: u64,
    pub captured_at: DateTime<Utc>,
}

/// Rates derived from two consecutive counter samples.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RateSample {
    /// Percentage of CPU time stolen by the hypervisor, 0..=100.
    pub cpu_steal: f64,
    /// MiB/s sent.
    pub net_up: f64,
    /// MiB/s received.
    pub net_down: f64,
}

/// Absolute resource levels read on every tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResourceLevels {
    pub cores: usize,
    pub load_1: f64,
    pub load_5: f64,
    pub load_15: f64,
    pub mem_used: u64,
    pub mem_total: u64,
    pub disk_used: u64,
    pub disk_total: u64,
    pub uptime: u64,
}

/// Host facts that do not change while the agent runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HostInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os_distro: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kernel_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_model: Option<String>,
    /// e.g. "8 logical cores".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_cores_detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boot_time: Option<u64>,
    /// Filled from the ISP lookup, not by the probe.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_ip: Option<String>,
}

/// Static identity of this node as configured on the command line.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeIdentity {
    pub node_id: String,
    pub location: String,
    pub isp: String,
}

/// The report posted to the dashboard. `timestamp` is fixed at build time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeReport {
    pub node_id: String,
    pub location: String,
    pub isp: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub levels: ResourceLevels,
    #[serde(flatten)]
    pub rates: RateSample,
    #[serde(flatten)]
    pub host: HostInfo,
}
