//! Fleet file save/load and restart behavior.
use chrono::{Duration, TimeZone, Utc};
use kiloa::config::ServerConfig;
use kiloa::error::PersistError;
use kiloa::persist::{load, load_or_empty, save, FILE_VERSION};
use kiloa::state::AppState;
use kiloa::store::FleetStore;
use kiloa::tasks::flush;
use kiloa::types::{IngestOutcome, NodeReport};
use serde_json::json;
use std::collections::BTreeMap;
use std::fs;

fn report(id: &str, secs: i64, mem_used: u64) -> NodeReport {
    let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap() + Duration::seconds(secs);
    serde_json::from_value(json!({
        "node_id": id,
        "timestamp": at,
        "mem_used": mem_used,
        "mem_total": 1000,
        "host_name": "db-1",
    }))
    .unwrap()
}

#[test]
fn missing_file_is_empty_fleet() {
    let dir = tempfile::tempdir().unwrap();
    let file = load(&dir.path().join("nope.json")).unwrap();
    assert!(file.nodes.is_empty());
    assert!(file.history.is_empty());
}

#[test]
fn corrupt_or_future_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fleet.json");

    fs::write(&path, b"{ nope").unwrap();
    assert!(matches!(load(&path), Err(PersistError::Json(_))));
    assert!(load_or_empty(&path).nodes.is_empty());

    fs::write(&path, br#"{"version": 99, "nodes": []}"#).unwrap();
    assert!(matches!(load(&path), Err(PersistError::UnsupportedVersion(99))));
}

#[tokio::test]
async fn restart_keeps_ordering_state() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("fleet.json");
    let now = Utc::now();

    let store = FleetStore::new();
    store.ingest(report("a", 10, 150), now).await.unwrap();
    store.ingest(report("b", 0, 50), now).await.unwrap();
    let before = store.get("a").await.unwrap();
    save(&path, store.get_all().await, BTreeMap::new()).unwrap();
    assert!(!path.with_extension("json.tmp").exists());

    let restored = FleetStore::from_states(load(&path).unwrap().nodes);
    assert_eq!(restored.len().await, 2);
    let after = restored.get("a").await.unwrap();
    assert_eq!(after, before);

    // an old report replayed after restart is still discarded
    let outcome = restored.ingest(report("a", 5, 1), now).await.unwrap();
    assert_eq!(outcome, IngestOutcome::StaleDiscarded);
    assert_eq!(restored.get("a").await.unwrap().report.mem_used, 150);

    let outcome = restored.ingest(report("a", 20, 2), now).await.unwrap();
    assert_eq!(outcome, IngestOutcome::Accepted);
    let a = restored.get("a").await.unwrap();
    assert_eq!(a.created_at, before.created_at);
    assert_eq!(a.report.host_name.as_deref(), Some("db-1"));
}

#[test]
fn version_one_file_loads_without_history() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fleet.json");
    let node = json!({
        "node_id": "a",
        "created_at": "2026-03-01T12:00:00Z",
        "updated_at": "2026-03-01T12:00:00Z",
        "last_seen": "2026-03-01T12:00:00Z",
        "last_report_at": "2026-03-01T12:00:00Z",
        "report": { "node_id": "a", "timestamp": "2026-03-01T12:00:00Z" },
    });
    fs::write(&path, json!({ "version": 1, "nodes": [node] }).to_string()).unwrap();

    let file = load(&path).unwrap();
    assert_eq!(file.version, FILE_VERSION);
    assert_eq!(file.nodes.len(), 1);
    assert!(file.history.is_empty());
}

#[tokio::test]
async fn history_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fleet.json");
    let cfg = ServerConfig {
        data_path: Some(path.clone()),
        ..ServerConfig::default()
    };
    let now = Utc::now();

    let state = AppState::new(FleetStore::new(), cfg.clone());
    let mut r = report("a", 0, 250);
    r.timestamp = now;
    state.ingest(r, now).await.unwrap();
    assert_eq!(flush(&state, path.clone()).await.unwrap(), 1);

    let file = load(&path).unwrap();
    let restarted = AppState::new(FleetStore::from_states(file.nodes), cfg);
    restarted.history.restore(file.history).await;

    let points = restarted.history("a", now).await.unwrap();
    assert_eq!(points.len(), 1);
    assert_eq!(points[0].mem_percent, 25.0);
    assert_eq!(points[0].timestamp, now);
}
