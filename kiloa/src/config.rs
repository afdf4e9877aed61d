//! Command-line and environment configuration for the server.

use crate::history::DEFAULT_THROTTLE_SECS;
use crate::status::DEFAULT_STALE_AFTER_SECS;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_TOKEN: &str = "secret";

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub bind: IpAddr,
    pub port: u16,
    pub token: String,
    pub stale_after: chrono::Duration,
    pub history_throttle: chrono::Duration,
    /// None disables persistence.
    pub data_path: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            token: DEFAULT_TOKEN.into(),
            stale_after: chrono::Duration::seconds(DEFAULT_STALE_AFTER_SECS),
            history_throttle: chrono::Duration::seconds(DEFAULT_THROTTLE_SECS),
            data_path: Some(crate::persist::default_path()),
        }
    }
}

impl ServerConfig {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}

pub fn usage(prog: &str) -> String {
    format!(
        "Usage: {prog} [--port PORT|-p PORT] [--bind ADDR] [--token TOKEN|-t TOKEN] \
         [--stale-secs SECS] [--history-secs SECS] [--data PATH] [--no-persist]"
    )
}

/// Parse argv (program name first). `env` supplies PORT / KILOA_* fallbacks; flags win.
pub fn parse_args<I, F>(args: I, env: F) -> Result<ServerConfig, String>
where
    I: IntoIterator<Item = String>,
    F: Fn(&str) -> Option<String>,
{
    let mut it = args.into_iter();
    let prog = it.next().unwrap_or_else(|| "kiloa".into());
    let mut cfg = ServerConfig::default();

    if let Some(v) = env("PORT") {
        cfg.port = parse_port("PORT", &v)?;
    }
    if let Some(v) = env("KILOA_TOKEN") {
        cfg.token = v;
    }
    if let Some(v) = env("KILOA_STALE_SECS") {
        cfg.stale_after = parse_secs("KILOA_STALE_SECS", &v)?;
    }
    if let Some(v) = env("KILOA_DB_PATH").filter(|v| !v.is_empty()) {
        cfg.data_path = Some(PathBuf::from(v));
    }

    let mut no_persist = false;
    while let Some(arg) = it.next() {
        let (flag, inline) = match arg.split_once('=') {
            Some((f, v)) if f.starts_with("--") => (f.to_string(), Some(v.to_string())),
            _ => (arg.clone(), None),
        };
        let mut value = |name: &str| -> Result<String, String> {
            inline
                .clone()
                .or_else(|| it.next())
                .ok_or_else(|| format!("missing value for {name}\n{}", usage(&prog)))
        };
        match flag.as_str() {
            "-h" | "--help" => return Err(usage(&prog)),
            "--port" | "-p" => cfg.port = parse_port("--port", &value("--port")?)?,
            "--bind" => {
                let v = value("--bind")?;
                cfg.bind = v
                    .parse()
                    .map_err(|_| format!("invalid value for --bind: {v:?}"))?;
            }
            "--token" | "-t" => cfg.token = value("--token")?,
            "--stale-secs" => cfg.stale_after = parse_secs("--stale-secs", &value("--stale-secs")?)?,
            "--history-secs" => {
                cfg.history_throttle = parse_secs("--history-secs", &value("--history-secs")?)?
            }
            "--data" => cfg.data_path = Some(PathBuf::from(value("--data")?)),
            "--no-persist" => no_persist = true,
            _ => return Err(format!("unexpected argument {arg:?}\n{}", usage(&prog))),
        }
    }
    if no_persist {
        cfg.data_path = None;
    }
    Ok(cfg)
}

fn parse_port(name: &str, v: &str) -> Result<u16, String> {
    v.trim()
        .parse::<u16>()
        .map_err(|_| format!("invalid value for {name}: {v:?}"))
}

fn parse_secs(name: &str, v: &str) -> Result<chrono::Duration, String> {
    match v.trim().parse::<i64>() {
        Ok(n) if n > 0 => Ok(chrono::Duration::seconds(n)),
        _ => Err(format!("invalid value for {name}: {v:?} (expected whole seconds > 0)")),
    }
}
