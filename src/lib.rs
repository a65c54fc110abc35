//! Latency-driven HTTP connection recycling.
//!
//! Tracks request latency per remote host and, when a host degrades, asks
//! the transport to close pooled connections to it so fresh ones are
//! opened (useful when DNS load balancing has pinned connections to an
//! unhealthy endpoint). Closing stops once enough connections have been
//! recycled.

pub mod client;
pub mod config;
pub mod error;
pub mod hook;
pub mod latency;
pub mod observability;

pub use client::{RecycleLayer, RecycleService};
pub use config::RecyclerConfig;
pub use error::{Error, Result};
pub use latency::{HostRegistry, LatencyMachine, Machine, MachineConfig, State, Transition};
