//! Report delivery. Sends are fire-and-forget: each report gets its own task with a
//! bounded timeout, failures are logged and dropped, nothing is retried.

use crate::error::TransportError;
use flate2::{write::GzEncoder, Compression};
use futures::future::{BoxFuture, FutureExt};
use reqwest::header::{AUTHORIZATION, CONTENT_ENCODING, CONTENT_TYPE};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use url::Url;

pub trait Transport: Send + Sync {
    /// Deliver one serialized report.
    fn send(&self, body: Vec<u8>) -> BoxFuture<'static, Result<(), TransportError>>;
}

/// `<server>/api/report`, keeping any path prefix on the server URL
/// (`http://host/kiloa` and `http://host/kiloa/` both post to `/kiloa/api/report`).
pub fn report_endpoint(server: &str) -> Result<Url, TransportError> {
    let mut base = Url::parse(server)?;
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    Ok(base.join("api/report")?)
}

/// POSTs reports to the server's report endpoint.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: Url,
    token: String,
    gzip: bool,
}

impl HttpTransport {
    pub fn new(
        server: &str,
        token: impl Into<String>,
        timeout: Duration,
        gzip: bool,
    ) -> Result<Self, TransportError> {
        let endpoint = report_endpoint(server)?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint,
            token: token.into(),
            gzip,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl Transport for HttpTransport {
    fn send(&self, body: Vec<u8>) -> BoxFuture<'static, Result<(), TransportError>> {
        let client = self.client.clone();
        let endpoint = self.endpoint.clone();
        let token = self.token.clone();
        let gzip = self.gzip;
        async move {
            let mut req = client
                .post(endpoint)
                .header(CONTENT_TYPE, "application/json")
                .header(AUTHORIZATION, token);
            let body = if gzip {
                req = req.header(CONTENT_ENCODING, "gzip");
                gzip_body(&body)?
            } else {
                body
            };
            let resp = req.body(body).send().await?;
            let status = resp.status();
            if !status.is_success() {
                return Err(TransportError::Status(status.as_u16()));
            }
            Ok(())
        }
        .boxed()
    }
}

pub fn gzip_body(body: &[u8]) -> Result<Vec<u8>, TransportError> {
    let mut enc = GzEncoder::new(Vec::with_capacity(body.len() / 2), Compression::fast());
    enc.write_all(body).map_err(TransportError::Compress)?;
    enc.finish().map_err(TransportError::Compress)
}

/// Spawn one delivery. The returned handle is only useful to tests; callers
/// normally drop it.
pub fn dispatch(
    transport: Arc<dyn Transport>,
    body: Vec<u8>,
    timeout: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        match tokio::time::timeout(timeout, transport.send(body)).await {
            Ok(Ok(())) => debug!("report delivered"),
            Ok(Err(e)) => warn!("report dropped: {e}"),
            Err(_) => warn!("report dropped: {}", TransportError::Timeout(timeout)),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::io::Read;

    #[test]
    fn gzip_roundtrips() {
        let body = br#"{"node_id":"n1"}"#;
        let packed = gzip_body(body).unwrap();
        let mut out = Vec::new();
        GzDecoder::new(&packed[..]).read_to_end(&mut out).unwrap();
        assert_eq!(out, body);
    }

    #[test]
    fn endpoint_is_api_report() {
        let t = HttpTransport::new("http://10.0.0.5:8080", "secret", Duration::from_secs(1), false)
            .unwrap();
        assert_eq!(t.endpoint().as_str(), "http://10.0.0.5:8080/api/report");
        assert!(HttpTransport::new("not a url", "x", Duration::from_secs(1), false).is_err());
    }

    #[test]
    fn endpoint_keeps_path_prefix() {
        for server in ["http://host/kiloa", "http://host/kiloa/"] {
            assert_eq!(
                report_endpoint(server).unwrap().as_str(),
                "http://host/kiloa/api/report",
                "{server}"
            );
        }
        assert_eq!(
            report_endpoint("https://dash.example.net/").unwrap().as_str(),
            "https://dash.example.net/api/report"
        );
    }
}
