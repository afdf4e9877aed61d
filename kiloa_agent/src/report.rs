//! Report assembly: derived rates + static identity + absolute levels.

use crate::error::AgentError;
use crate::metrics::HostProbe;
use crate::types::{HostInfo, NodeIdentity, NodeReport, RateSample};
use chrono::Utc;

pub struct ReportBuilder {
    identity: NodeIdentity,
    host: HostInfo,
}

impl ReportBuilder {
    pub fn new(identity: NodeIdentity, host: HostInfo) -> Self {
        Self { identity, host }
    }

    pub fn identity(&self) -> &NodeIdentity {
        &self.identity
    }

    /// Build a report stamped with the current time. If the level probe fails no
    /// report is produced and the caller skips the tick.
    pub fn build(
        &self,
        rates: RateSample,
        probe: &mut dyn HostProbe,
    ) -> Result<NodeReport, AgentError> {
        let levels = probe.levels()?;
        Ok(NodeReport {
            node_id: self.identity.node_id.clone(),
            location: self.identity.location.clone(),
            isp: self.identity.isp.clone(),
            timestamp: Utc::now(),
            levels,
            rates,
            host: self.host.clone(),
        })
    }
}

pub fn encode_report(report: &NodeReport) -> Result<Vec<u8>, AgentError> {
    Ok(serde_json::to_vec(report)?)
}
