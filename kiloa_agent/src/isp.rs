//! ISP label and public address lookup via ip-api.com, used when no `--isp` is given.

use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

pub const UNKNOWN: &str = "Unknown";
const IP_API_URL: &str = "http://ip-api.com/json/";

#[derive(Debug, Deserialize)]
struct IpApiResponse {
    #[serde(default)]
    isp: String,
    /// The address the query came from.
    #[serde(default)]
    query: String,
}

/// What the outside world sees of this node's connection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetworkOrigin {
    pub isp: Option<String>,
    pub public_ip: Option<String>,
}

/// Best-effort lookup; failures leave both fields empty.
pub async fn lookup_origin(timeout: Duration) -> NetworkOrigin {
    match fetch(IP_API_URL, timeout).await {
        Ok(body) => parse_origin(&body),
        Err(e) => {
            warn!("isp lookup failed: {e}");
            NetworkOrigin::default()
        }
    }
}

async fn fetch(url: &str, timeout: Duration) -> Result<bytes::Bytes, reqwest::Error> {
    let client = reqwest::Client::builder().timeout(timeout).build()?;
    client.get(url).send().await?.error_for_status()?.bytes().await
}

pub fn parse_origin(body: &[u8]) -> NetworkOrigin {
    let Ok(resp) = serde_json::from_slice::<IpApiResponse>(body) else {
        return NetworkOrigin::default();
    };
    let non_empty = |s: &str| {
        let s = s.trim();
        (!s.is_empty()).then(|| s.to_string())
    };
    NetworkOrigin {
        isp: non_empty(&resp.isp),
        public_ip: non_empty(&resp.query),
    }
}
