//! Request execution hooks.
//!
//! # Data Flow
//! ```text
//! BeforeExecutionStart → execution.rs (fresh attempt bookkeeping)
//! BeforeAttempt        → record start time
//!                      → registry get-or-create → Closing? set close flag
//! AfterAttempt         → latency = now - start
//!                      → machine.next(latency, close flag) → log transition
//! ```
//!
//! # Design Decisions
//! - Events for one execution arrive on one task; only the registry and
//!   machines are shared
//! - Latency is measured in whole milliseconds (truncated)

pub mod execution;
pub mod handler;

pub use execution::{AttemptTimes, Event, Execution};
pub use handler::LatencyHandler;
