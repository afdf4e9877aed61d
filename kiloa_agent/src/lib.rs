//! Kiloa node agent: samples host counters, derives rates and pushes reports to the
//! fleet dashboard.

pub mod config;
pub mod error;
pub mod isp;
pub mod metrics;
pub mod report;
pub mod sampler;
pub mod state;
pub mod transport;
pub mod types;
