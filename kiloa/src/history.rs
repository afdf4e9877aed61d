//! Per-node chart history: one point per throttle window, bounded by retention.

use crate::types::{percent, HistoryPoint, NodeReport};
use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, HashMap, VecDeque};
use tokio::sync::RwLock;

pub const DEFAULT_THROTTLE_SECS: i64 = 60;
pub const DEFAULT_RETENTION_HOURS: i64 = 24;

pub fn push_capped<T>(dq: &mut VecDeque<T>, v: T, cap: usize) {
    if dq.len() == cap {
        dq.pop_front();
    }
    dq.push_back(v);
}

#[derive(Default)]
struct Series {
    points: VecDeque<HistoryPoint>,
    /// Agent timestamp of the newest report offered to this series.
    last_report_at: Option<DateTime<Utc>>,
}

impl Series {
    fn prune(&mut self, cutoff: DateTime<Utc>) {
        while self.points.front().is_some_and(|p| p.timestamp < cutoff) {
            self.points.pop_front();
        }
    }
}

pub struct HistoryStore {
    series: RwLock<HashMap<String, Series>>,
    throttle: Duration,
    retention: Duration,
    cap: usize,
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new(
            Duration::seconds(DEFAULT_THROTTLE_SECS),
            Duration::hours(DEFAULT_RETENTION_HOURS),
        )
    }
}

impl HistoryStore {
    pub fn new(throttle: Duration, retention: Duration) -> Self {
        // hard ceiling in case the throttle is zero
        let per_window = retention.num_seconds() / throttle.num_seconds().max(1);
        let cap = per_window.clamp(1, 100_000) as usize + 1;
        Self {
            series: RwLock::new(HashMap::new()),
            throttle,
            retention,
            cap,
        }
    }

    /// Returns true when a point was appended. Reports older than one already
    /// offered for the node are ignored, so deliveries racing past each other
    /// never chart the older one last.
    pub async fn record(&self, report: &NodeReport, observed_at: DateTime<Utc>) -> bool {
        let mut series = self.series.write().await;
        let s = series.entry(report.node_id.clone()).or_default();

        if s.last_report_at.is_some_and(|ts| report.timestamp <= ts) {
            return false;
        }
        s.last_report_at = Some(report.timestamp);

        s.prune(observed_at - self.retention);
        if let Some(last) = s.points.back() {
            if observed_at - last.timestamp < self.throttle {
                return false;
            }
        }
        let point = HistoryPoint {
            timestamp: observed_at,
            load_1: report.load_1,
            mem_percent: percent(report.mem_used, report.mem_total),
            disk_percent: percent(report.disk_used, report.disk_total),
            net_in: report.net_down,
            net_out: report.net_up,
        };
        push_capped(&mut s.points, point, self.cap);
        true
    }

    /// Points within retention of `now`, oldest first; empty for unknown nodes.
    pub async fn points(&self, node_id: &str, now: DateTime<Utc>) -> Vec<HistoryPoint> {
        let cutoff = now - self.retention;
        self.series
            .read()
            .await
            .get(node_id)
            .map(|s| {
                s.points
                    .iter()
                    .filter(|p| p.timestamp >= cutoff)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every series, for persistence.
    pub async fn export(&self) -> BTreeMap<String, Vec<HistoryPoint>> {
        self.series
            .read()
            .await
            .iter()
            .filter(|(_, s)| !s.points.is_empty())
            .map(|(id, s)| (id.clone(), s.points.iter().cloned().collect()))
            .collect()
    }

    /// Load saved series, replacing what is held for those nodes.
    pub async fn restore(&self, saved: BTreeMap<String, Vec<HistoryPoint>>) {
        let mut series = self.series.write().await;
        for (id, mut points) in saved {
            points.sort_by_key(|p| p.timestamp);
            let skip = points.len().saturating_sub(self.cap);
            series.insert(
                id,
                Series {
                    points: points.into_iter().skip(skip).collect(),
                    last_report_at: None,
                },
            );
        }
    }
}
