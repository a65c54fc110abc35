//! Latency monitoring subsystem.
//!
//! # Data Flow
//! ```text
//! Attempt finished for host H (latency ms, connection closed?)
//!     → registry.rs (look up H's machine)
//!     → machine.rs (clamp, shift into windows, evaluate thresholds)
//!         → window.rs (recent window; evicted sample → historical window)
//!     → state.rs (Watching / Closing / Resting)
//!
//! Attempt about to start for host H
//!     → registry.rs (get or create H's machine)
//!     → Closing? flag the request's connection for closing
//! ```
//!
//! # Design Decisions
//! - Fixed memory per host: two ring buffers and three counters
//! - Per-machine locking; the registry is sharded
//! - Nothing here blocks, sleeps or performs I/O

pub mod machine;
pub mod registry;
pub mod state;
pub mod window;

pub use machine::{LatencyMachine, Machine, MachineConfig};
pub use registry::{HostRegistry, HostStatus};
pub use state::{State, Transition};
pub use window::RollingWindow;
