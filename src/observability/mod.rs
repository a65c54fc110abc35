//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! hook handler / registry produce:
//!     → tracing events (transitions, forced closes, dropped samples)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → logging.rs subscriber (stderr)
//!     → Prometheus scrape endpoint (optional)
//! ```

pub mod logging;
pub mod metrics;
