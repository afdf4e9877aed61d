//! Entry point for the kiloa server. Loads saved fleet state, serves the API until
//! Ctrl-C, then flushes state back to disk.

use anyhow::Context;
use kiloa::config::{parse_args, ServerConfig};
use kiloa::persist::{load_or_empty, FleetFile};
use kiloa::state::AppState;
use kiloa::store::FleetStore;
use kiloa::tasks::{flush, spawn_persister, spawn_summary, PERSIST_EVERY, SUMMARY_EVERY};
use std::env;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg: ServerConfig = match parse_args(env::args(), |k| env::var(k).ok()) {
        Ok(v) => v,
        Err(msg) if msg.starts_with("Usage:") => {
            println!("{msg}");
            return Ok(());
        }
        Err(msg) => {
            eprintln!("{msg}");
            std::process::exit(2);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let saved = match &cfg.data_path {
        Some(path) => {
            let file = load_or_empty(path);
            info!(
                nodes = file.nodes.len(),
                series = file.history.len(),
                path = %path.display(),
                "fleet loaded"
            );
            file
        }
        None => FleetFile::default(),
    };
    let data_path = cfg.data_path.clone();
    let addr = cfg.addr();
    let state = AppState::new(FleetStore::from_states(saved.nodes), cfg);
    state.history.restore(saved.history).await;

    let (stop_tx, stop_rx) = watch::channel(false);
    let mut background = vec![spawn_summary(state.clone(), SUMMARY_EVERY, stop_rx.clone())];
    if let Some(path) = data_path.clone() {
        background.push(spawn_persister(state.clone(), path, PERSIST_EVERY, stop_rx));
    }

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    info!(%addr, "kiloa server listening");

    kiloa::http::serve(listener, state.clone(), async {
        let _ = tokio::signal::ctrl_c().await;
        info!("shutting down");
    })
    .await
    .context("serve")?;

    let _ = stop_tx.send(true);
    for task in background {
        let _ = task.await;
    }
    if let Some(path) = data_path {
        match flush(&state, path.clone()).await {
            Ok(n) => info!(nodes = n, path = %path.display(), "fleet saved"),
            Err(e) => warn!(error = %e, path = %path.display(), "final fleet save failed"),
        }
    }
    Ok(())
}
