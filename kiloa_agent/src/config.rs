//! Command-line and environment configuration for the agent.

use std::time::Duration;

pub const DEFAULT_SERVER: &str = "http://localhost:8080";
pub const DEFAULT_TOKEN: &str = "secret";
pub const DEFAULT_INTERVAL_SECS: u64 = 2;
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct AgentConfig {
    pub server: String,
    pub token: String,
    /// Falls back to the hostname when unset.
    pub node_id: Option<String>,
    pub location: String,
    /// Detected via ip-api when unset.
    pub isp: Option<String>,
    pub interval: Duration,
    pub timeout: Duration,
    pub gzip: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            server: DEFAULT_SERVER.into(),
            token: DEFAULT_TOKEN.into(),
            node_id: None,
            location: crate::isp::UNKNOWN.into(),
            isp: None,
            interval: Duration::from_secs(DEFAULT_INTERVAL_SECS),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            gzip: false,
        }
    }
}

pub fn usage(prog: &str) -> String {
    format!(
        "Usage: {prog} [--server URL|-s URL] [--token TOKEN|-t TOKEN] [--id NODE_ID] \
         [--location LABEL] [--isp LABEL] [--interval SECS|-i SECS] [--timeout SECS] [--gzip]"
    )
}

/// Parse argv (program name first). `env` supplies KILOA_* fallbacks; flags win.
/// `Err` carries either the usage text (for --help) or a message naming the bad flag.
pub fn parse_args<I, F>(args: I, env: F) -> Result<AgentConfig, String>
where
    I: IntoIterator<Item = String>,
    F: Fn(&str) -> Option<String>,
{
    let mut it = args.into_iter();
    let prog = it.next().unwrap_or_else(|| "kiloa_agent".into());
    let mut cfg = AgentConfig::default();

    if let Some(v) = env("KILOA_SERVER") {
        cfg.server = v;
    }
    if let Some(v) = env("KILOA_TOKEN") {
        cfg.token = v;
    }
    cfg.node_id = env("KILOA_NODE_ID").filter(|v| !v.is_empty());
    if let Some(v) = env("KILOA_INTERVAL") {
        cfg.interval = parse_secs("KILOA_INTERVAL", &v)?;
    }

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
            "--server" | "-s" => cfg.server = value("--server")?,
            "--token" | "-t" => cfg.token = value("--token")?,
            "--id" => cfg.node_id = Some(value("--id")?).filter(|v| !v.is_empty()),
            "--location" => cfg.location = value("--location")?,
            "--isp" => cfg.isp = Some(value("--isp")?),
            "--interval" | "-i" => cfg.interval = parse_secs("--interval", &value("--interval")?)?,
            "--timeout" => cfg.timeout = parse_secs("--timeout", &value("--timeout")?)?,
            "--gzip" => cfg.gzip = true,
            _ => return Err(format!("unexpected argument {arg:?}\n{}", usage(&prog))),
        }
    }

    // "Unknown" asks for detection, same as leaving it out
    if cfg.isp.as_deref() == Some(crate::isp::UNKNOWN) {
        cfg.isp = None;
    }
    Ok(cfg)
}

fn parse_secs(name: &str, v: &str) -> Result<Duration, String> {
    match v.trim().parse::<u64>() {
        Ok(n) if n > 0 => Ok(Duration::from_secs(n)),
        _ => Err(format!("invalid value for {name}: {v:?} (expected whole seconds > 0)")),
    }
}
