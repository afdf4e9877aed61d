//! Tick loop behavior with scripted probes and in-memory transports.
use chrono::Utc;
use futures::future::{BoxFuture, FutureExt};
use kiloa_agent::error::{ProbeError, TransportError};
use kiloa_agent::metrics::HostProbe;
use kiloa_agent::report::ReportBuilder;
use kiloa_agent::sampler::spawn_sampler;
use kiloa_agent::state::AgentState;
use kiloa_agent::transport::{dispatch, Transport};
use kiloa_agent::types::{CpuTimes, HostInfo, NodeIdentity, RawCounterSample, ResourceLevels};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;

const MIB: u64 = 1024 * 1024;

#[derive(Default)]
struct ScriptedProbe {
    tick: u64,
    fail_counters_on: Vec<u64>,
    fail_levels_on: Vec<u64>,
}

impl HostProbe for ScriptedProbe {
    fn counters(&mut self) -> Result<RawCounterSample, ProbeError> {
        self.tick += 1;
        if self.fail_counters_on.contains(&self.tick) {
            return Err(ProbeError::Unavailable("counters"));
        }
        let t = self.tick;
        Ok(RawCounterSample {
            cpu: CpuTimes {
                user: 100 * t,
                idle: 100 * t,
                steal: 10 * t,
                ..CpuTimes::default()
            },
            bytes_sent: t * MIB,
            bytes_recv: 2 * t * MIB,
            captured_at: Utc::now(),
        })
    }

    fn levels(&mut self) -> Result<ResourceLevels, ProbeError> {
        if self.fail_levels_on.contains(&self.tick) {
            return Err(ProbeError::Unavailable("memory"));
        }
        Ok(ResourceLevels {
            cores: 4,
            load_1: 0.5,
            load_5: 0.25,
            load_15: 0.125,
            mem_used: 100,
            mem_total: 200,
            disk_used: 10,
            disk_total: 40,
            uptime: 3600,
        })
    }

    fn host_info(&mut self) -> HostInfo {
        HostInfo::default()
    }
}

#[derive(Clone, Default)]
struct Recorder {
    bodies: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl Transport for Recorder {
    fn send(&self, body: Vec<u8>) -> BoxFuture<'static, Result<(), TransportError>> {
        let bodies = self.bodies.clone();
        async move {
            bodies.lock().unwrap().push(body);
            Ok(())
        }
        .boxed()
    }
}

struct Failing;

impl Transport for Failing {
    fn send(&self, _body: Vec<u8>) -> BoxFuture<'static, Result<(), TransportError>> {
        async { Err(TransportError::Status(503)) }.boxed()
    }
}

struct Stalled;

impl Transport for Stalled {
    fn send(&self, _body: Vec<u8>) -> BoxFuture<'static, Result<(), TransportError>> {
        async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }
        .boxed()
    }
}

fn builder() -> ReportBuilder {
    ReportBuilder::new(
        NodeIdentity {
            node_id: "n1".into(),
            location: "Paris".into(),
            isp: "OVH".into(),
        },
        HostInfo {
            host_name: Some("box".into()),
            public_ip: Some("198.51.100.4".into()),
            cpu_cores_detail: Some("4 logical cores".into()),
            ..HostInfo::default()
        },
    )
}

fn state(probe: ScriptedProbe, transport: Arc<dyn Transport>) -> AgentState {
    AgentState::new(Box::new(probe), builder(), transport, Duration::from_millis(200))
}

#[tokio::test]
async fn first_tick_has_zero_rates_then_deltas() {
    let mut st = state(ScriptedProbe::default(), Arc::new(Recorder::default()));
    let first = st.tick().expect("report");
    assert_eq!(first.rates.cpu_steal, 0.0);
    assert_eq!(first.rates.net_up, 0.0);
    assert_eq!(first.node_id, "n1");
    assert_eq!(first.levels.mem_used, 100);

    let second = st.tick().expect("report");
    // +100 user, +100 idle, +10 steal
    assert!((second.rates.cpu_steal - 100.0 * 10.0 / 210.0).abs() < 1e-9);
    assert!(second.rates.net_down >= second.rates.net_up);
    assert!(second.timestamp >= first.timestamp);
}

#[tokio::test]
async fn failed_level_probe_skips_the_tick() {
    let probe = ScriptedProbe {
        fail_levels_on: vec![2],
        ..ScriptedProbe::default()
    };
    let mut st = state(probe, Arc::new(Recorder::default()));
    assert!(st.tick().is_some());
    assert!(st.tick().is_none());
    // counters from the skipped tick still became the baseline
    let third = st.tick().expect("report");
    assert!((third.rates.cpu_steal - 100.0 * 10.0 / 210.0).abs() < 1e-9);
}

#[tokio::test]
async fn failed_counter_probe_skips_the_tick() {
    let probe = ScriptedProbe {
        fail_counters_on: vec![1],
        ..ScriptedProbe::default()
    };
    let mut st = state(probe, Arc::new(Recorder::default()));
    assert!(st.tick().is_none());
    let next = st.tick().expect("report");
    assert_eq!(next.rates.cpu_steal, 0.0, "no baseline yet");
}

#[tokio::test]
async fn delivered_body_is_flat_json() {
    let rec = Recorder::default();
    let mut st = state(ScriptedProbe::default(), Arc::new(rec.clone()));
    let report = st.tick().unwrap();
    st.deliver(&report).expect("dispatched").await.unwrap();

    let bodies = rec.bodies.lock().unwrap();
    assert_eq!(bodies.len(), 1);
    let v: serde_json::Value = serde_json::from_slice(&bodies[0]).unwrap();
    assert_eq!(v["node_id"], "n1");
    assert_eq!(v["location"], "Paris");
    assert_eq!(v["mem_total"], 200);
    assert_eq!(v["load_1"], 0.5);
    assert_eq!(v["cpu_steal"], 0.0);
    assert_eq!(v["host_name"], "box");
    assert_eq!(v["public_ip"], "198.51.100.4");
    assert_eq!(v["cpu_cores_detail"], "4 logical cores");
    assert!(v.get("timestamp").is_some());
    assert!(v.get("levels").is_none());
    assert!(v.get("kernel_version").is_none());
}

#[tokio::test]
async fn stalled_delivery_is_bounded_by_timeout() {
    let handle = dispatch(Arc::new(Stalled), b"{}".to_vec(), Duration::from_millis(50));
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("delivery task gave up after its timeout")
        .unwrap();
}

#[tokio::test]
async fn loop_survives_failures_and_stops_on_signal() {
    let probe = ScriptedProbe {
        fail_levels_on: vec![2, 3],
        ..ScriptedProbe::default()
    };
    let st = state(probe, Arc::new(Failing));
    let (tx, rx) = watch::channel(false);
    let handle = spawn_sampler(st, Duration::from_millis(10), rx);
    tokio::time::sleep(Duration::from_millis(80)).await;
    assert!(!handle.is_finished(), "loop must keep ticking after failures");
    tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("loop stopped")
        .unwrap();
}

#[tokio::test]
async fn loop_delivers_reports() {
    let rec = Recorder::default();
    let st = state(ScriptedProbe::default(), Arc::new(rec.clone()));
    let (tx, rx) = watch::channel(false);
    let handle = spawn_sampler(st, Duration::from_millis(10), rx);
    tokio::time::sleep(Duration::from_millis(100)).await;
    drop(tx);
    handle.await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(rec.bodies.lock().unwrap().len() >= 2);
}
