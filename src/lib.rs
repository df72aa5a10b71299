//! kubepulse: Kubernetes cluster metrics distribution
//!
//! - `stream`: reconnecting WebSocket client with topic subscriptions
//! - `feeds`: per-resource state adapters over a cluster data source
//! - `producer`: backend that probes the cluster and fans metrics out

pub mod arguments;
pub mod config;
pub mod constants;
pub mod errors;
pub mod feeds;
pub mod logger;
pub mod producer;
pub mod stream;
pub mod types;
