//! Background loops: periodic persistence flush and fleet summary logging.

use crate::aggregate::FleetSnapshot;
use crate::persist;
use crate::state::AppState;
use crate::util::{rate, usage_pair};
use chrono::Utc;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

pub const PERSIST_EVERY: Duration = Duration::from_secs(30);
pub const SUMMARY_EVERY: Duration = Duration::from_secs(60);

/// Snapshot nodes and history, then write them out off the async runtime.
pub async fn flush(state: &AppState, path: PathBuf) -> Result<usize, crate::error::PersistError> {
    let nodes = state.store.get_all().await;
    let history = state.history.export().await;
    let n = nodes.len();
    tokio::task::spawn_blocking(move || persist::save(&path, nodes, history))
        .await
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))??;
    Ok(n)
}

pub fn spawn_persister(
    state: AppState,
    path: PathBuf,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = interval(every);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tick.tick().await;
        loop {
            tokio::select! {
                _ = tick.tick() => {
                    match flush(&state, path.clone()).await {
                        Ok(n) => debug!(nodes = n, path = %path.display(), "fleet saved"),
                        Err(e) => warn!(error = %e, path = %path.display(), "fleet save failed"),
                    }
                }
                res = shutdown.changed() => {
                    if res.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    })
}

pub fn summary_line(snap: &FleetSnapshot) -> String {
    let t = &snap.totals;
    format!(
        "{} nodes ({} online, {} offline), mem {}, disk {}, up {}, down {}",
        t.total_nodes,
        snap.online,
        snap.offline,
        usage_pair(t.mem_used, t.mem_total),
        usage_pair(t.disk_used, t.disk_total),
        rate(t.net_up),
        rate(t.net_down),
    )
}

pub fn spawn_summary(
    state: AppState,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = interval(every);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tick.tick().await;
        loop {
            tokio::select! {
                _ = tick.tick() => {
                    let snap = state.snapshot(Utc::now()).await;
                    let c = state.store.counters();
                    info!(
                        accepted = c.accepted,
                        stale = c.stale_discarded,
                        rejected = c.rejected,
                        "fleet: {}",
                        summary_line(&snap)
                    );
                }
                res = shutdown.changed() => {
                    if res.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    })
}
