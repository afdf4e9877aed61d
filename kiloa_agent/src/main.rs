//! Entry point for kiloa_agent. Parses args, resolves identity and runs the tick loop
//! until Ctrl-C.

use anyhow::Context;
use kiloa_agent::config::{parse_args, AgentConfig};
use kiloa_agent::isp::{lookup_origin, NetworkOrigin, UNKNOWN};
use kiloa_agent::metrics::{HostProbe, SysinfoProbe};
use kiloa_agent::report::ReportBuilder;
use kiloa_agent::sampler::spawn_sampler;
use kiloa_agent::state::AgentState;
use kiloa_agent::transport::HttpTransport;
use kiloa_agent::types::NodeIdentity;
use std::env;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg: AgentConfig = match parse_args(env::args(), |k| env::var(k).ok()) {
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

    let node_id = match cfg.node_id.clone() {
        Some(id) => id,
        None => hostname::get()
            .ok()
            .and_then(|s| s.into_string().ok())
            .unwrap_or_else(|| "unknown".into()),
    };
    let origin = match cfg.isp {
        Some(_) => NetworkOrigin::default(),
        None => {
            info!("detecting ISP...");
            lookup_origin(cfg.timeout).await
        }
    };
    let isp = cfg
        .isp
        .clone()
        .or(origin.isp)
        .unwrap_or_else(|| UNKNOWN.to_string());

    let mut probe = SysinfoProbe::new();
    let mut host = probe.host_info();
    host.public_ip = origin.public_ip;
    let builder = ReportBuilder::new(
        NodeIdentity {
            node_id: node_id.clone(),
            location: cfg.location.clone(),
            isp,
        },
        host,
    );
    let transport = HttpTransport::new(&cfg.server, cfg.token.clone(), cfg.timeout, cfg.gzip)
        .context("configure transport")?;
    info!(
        node = %node_id,
        endpoint = %transport.endpoint(),
        interval = ?cfg.interval,
        "kiloa agent starting"
    );

    let state = AgentState::new(Box::new(probe), builder, Arc::new(transport), cfg.timeout);
    let (stop_tx, stop_rx) = watch::channel(false);
    let sampler = spawn_sampler(state, cfg.interval, stop_rx);

    tokio::signal::ctrl_c().await.context("install Ctrl-C handler")?;
    info!("shutting down");
    let _ = stop_tx.send(true);
    sampler.await.context("sampler task")?;
    Ok(())
}
