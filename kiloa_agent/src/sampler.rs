//! Rate derivation and the periodic sampling loop.
//!
//! The loop is single-threaded: one tick probes counters, derives rates and builds a
//! report before the next tick starts, so `RateSampler` needs no locking. Delivery is
//! handed off to its own task and never awaited here.

use crate::state::AgentState;
use crate::types::{CpuTimes, RateSample, RawCounterSample};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info};

const MIB: f64 = 1024.0 * 1024.0;

/// Holds the previous counter sample of a single stream.
#[derive(Debug, Default)]
pub struct RateSampler {
    previous: Option<RawCounterSample>,
}

impl RateSampler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive rates against the stored sample, then make `current` the new baseline.
    pub fn sample(&mut self, current: RawCounterSample) -> RateSample {
        let rates = derive_rates(self.previous.as_ref(), &current);
        self.previous = Some(current);
        rates
    }

    pub fn baseline(&self) -> Option<&RawCounterSample> {
        self.previous.as_ref()
    }
}

/// Rates between two samples. Never fails: with no baseline, a counter reset or an
/// empty window the affected rates are zero.
pub fn derive_rates(previous: Option<&RawCounterSample>, current: &RawCounterSample) -> RateSample {
    let Some(prev) = previous else {
        return RateSample::default();
    };
    let (net_up, net_down) = throughput(prev, current);
    RateSample {
        cpu_steal: steal_pct(&prev.cpu, &current.cpu),
        net_up,
        net_down,
    }
}

fn steal_pct(prev: &CpuTimes, cur: &CpuTimes) -> f64 {
    if cur.regressed_from(prev) {
        debug!("cpu counters went backwards; rebaselining");
        return 0.0;
    }
    let d_total = cur.total().saturating_sub(prev.total());
    if d_total == 0 {
        return 0.0;
    }
    let d_steal = cur.steal.saturating_sub(prev.steal);
    non_negative((d_steal as f64 / d_total as f64) * 100.0).min(100.0)
}

fn throughput(prev: &RawCounterSample, cur: &RawCounterSample) -> (f64, f64) {
    let secs = (cur.captured_at - prev.captured_at)
        .num_microseconds()
        .map(|us| us as f64 / 1_000_000.0)
        .unwrap_or(0.0);
    if secs <= 0.0 {
        debug!("non-positive sampling window; rebaselining");
        return (0.0, 0.0);
    }
    if cur.bytes_sent < prev.bytes_sent || cur.bytes_recv < prev.bytes_recv {
        debug!("network byte counters went backwards; rebaselining");
        return (0.0, 0.0);
    }
    let up = (cur.bytes_sent - prev.bytes_sent) as f64 / MIB / secs;
    let down = (cur.bytes_recv - prev.bytes_recv) as f64 / MIB / secs;
    (non_negative(up), non_negative(down))
}

fn non_negative(v: f64) -> f64 {
    if v.is_finite() && v > 0.0 {
        v
    } else {
        0.0
    }
}

/// Run the tick loop until `shutdown` flips to true (or its sender is dropped).
/// Reports still in flight when the loop stops finish or time out on their own.
pub fn spawn_sampler(
    mut state: AgentState,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Some(report) = state.tick() {
                        state.deliver(&report);
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("sampler stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn sample(secs: i64, busy: u64, steal: u64, sent: u64, recv: u64) -> RawCounterSample {
        RawCounterSample {
            cpu: CpuTimes {
                user: busy,
                idle: busy,
                steal,
                ..CpuTimes::default()
            },
            bytes_sent: sent,
            bytes_recv: recv,
            captured_at: at(secs),
        }
    }

    #[test]
    fn first_sample_yields_zero_rates() {
        let mut s = RateSampler::new();
        let r = s.sample(sample(0, 500, 20, 10_000, 20_000));
        assert_eq!(r, RateSample::default());
        assert!(s.baseline().is_some());
    }

    #[test]
    fn steal_is_share_of_total_delta() {
        let mut s = RateSampler::new();
        s.sample(sample(0, 100, 0, 0, 0));
        // user +40, idle +40, steal +20 => 20%
        let r = s.sample(sample(2, 140, 20, 0, 0));
        assert!((r.cpu_steal - 20.0).abs() < 1e-9, "got {}", r.cpu_steal);
    }

    #[test]
    fn steal_stays_within_bounds() {
        for (busy, steal) in [(0u64, 0u64), (0, 50), (10, 1), (1000, 999), (3, 7)] {
            let prev = sample(0, 0, 0, 0, 0);
            let cur = sample(1, busy, steal, 0, 0);
            let r = derive_rates(Some(&prev), &cur);
            assert!((0.0..=100.0).contains(&r.cpu_steal), "busy={busy} steal={steal}");
        }
    }

    #[test]
    fn only_steal_moving_is_full_steal() {
        let prev = sample(0, 100, 0, 0, 0);
        let cur = sample(1, 100, 30, 0, 0);
        assert_eq!(derive_rates(Some(&prev), &cur).cpu_steal, 100.0);
    }

    #[test]
    fn throughput_in_mib_per_second() {
        let prev = sample(0, 0, 0, 0, 0);
        let cur = sample(2, 0, 0, 4 * 1024 * 1024, 1024 * 1024);
        let r = derive_rates(Some(&prev), &cur);
        assert!((r.net_up - 2.0).abs() < 1e-9);
        assert!((r.net_down - 0.5).abs() < 1e-9);
    }

    #[test]
    fn counter_reset_zeroes_and_rebaselines() {
        let mut s = RateSampler::new();
        s.sample(sample(0, 1_000, 100, 50 * 1024 * 1024, 50 * 1024 * 1024));
        // reboot: every counter is now lower
        let r = s.sample(sample(2, 10, 1, 1024 * 1024, 1024 * 1024));
        assert_eq!(r, RateSample::default());
        // next delta is computed against the post-reset sample
        let r = s.sample(sample(3, 20, 11, 2 * 1024 * 1024, 3 * 1024 * 1024));
        assert!((r.cpu_steal - 100.0 * 10.0 / 30.0).abs() < 1e-9);
        assert!((r.net_up - 1.0).abs() < 1e-9);
        assert!((r.net_down - 2.0).abs() < 1e-9);
    }

    #[test]
    fn non_positive_window_zeroes_throughput_only() {
        let prev = sample(5, 100, 0, 0, 0);
        let cur = sample(5, 150, 50, 1024, 1024);
        let r = derive_rates(Some(&prev), &cur);
        assert_eq!(r.net_up, 0.0);
        assert_eq!(r.net_down, 0.0);
        assert!(r.cpu_steal > 0.0);

        let earlier = sample(4, 200, 50, 2048, 2048);
        let r = derive_rates(Some(&prev), &earlier);
        assert_eq!(r.net_up, 0.0);
        assert_eq!(r.net_down, 0.0);
    }

    #[test]
    fn single_decreasing_byte_counter_zeroes_both_directions() {
        let prev = sample(0, 0, 0, 4096, 4096);
        let cur = sample(1, 0, 0, 8192, 1024);
        let r = derive_rates(Some(&prev), &cur);
        assert_eq!((r.net_up, r.net_down), (0.0, 0.0));
    }
}
