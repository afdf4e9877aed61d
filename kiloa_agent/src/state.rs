//! Agent state owned by the sampling loop: probe, sampler, builder and transport.

use crate::metrics::HostProbe;
use crate::report::{encode_report, ReportBuilder};
use crate::sampler::RateSampler;
use crate::transport::{dispatch, Transport};
use crate::types::NodeReport;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub struct AgentState {
    pub probe: Box<dyn HostProbe>,
    pub sampler: RateSampler,
    pub builder: ReportBuilder,
    pub transport: Arc<dyn Transport>,
    pub send_timeout: Duration,
}

impl AgentState {
    pub fn new(
        probe: Box<dyn HostProbe>,
        builder: ReportBuilder,
        transport: Arc<dyn Transport>,
        send_timeout: Duration,
    ) -> Self {
        Self {
            probe,
            sampler: RateSampler::new(),
            builder,
            transport,
            send_timeout,
        }
    }

    /// One sampling cycle. `None` means the tick was skipped; the next one starts fresh.
    pub fn tick(&mut self) -> Option<NodeReport> {
        let counters = match self.probe.counters() {
            Ok(c) => c,
            Err(e) => {
                warn!("counter probe failed, skipping tick: {e}");
                return None;
            }
        };
        let rates = self.sampler.sample(counters);
        match self.builder.build(rates, self.probe.as_mut()) {
            Ok(report) => {
                debug!(
                    steal = report.rates.cpu_steal,
                    up = report.rates.net_up,
                    down = report.rates.net_down,
                    "built report"
                );
                Some(report)
            }
            Err(e) => {
                warn!("skipping tick: {e}");
                None
            }
        }
    }

    /// Hand the report to the transport without waiting for the outcome.
    pub fn deliver(&self, report: &NodeReport) -> Option<JoinHandle<()>> {
        match encode_report(report) {
            Ok(body) => Some(dispatch(self.transport.clone(), body, self.send_timeout)),
            Err(e) => {
                warn!("dropping report: {e}");
                None
            }
        }
    }
}
