//! Kiloa server library: fleet store, status and rollups, history, persistence and the
//! HTTP API. The binary in `main.rs` wires these together.

pub mod aggregate;
pub mod config;
pub mod error;
pub mod history;
pub mod http;
pub mod persist;
pub mod state;
pub mod status;
pub mod store;
pub mod tasks;
pub mod types;
pub mod util;
