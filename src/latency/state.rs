//! Connection recycling states.
//!
//! # States
//! - Watching: observing latency, connections are reused normally
//! - Closing: latency degraded, connections are closed after each attempt
//! - Resting: cool-down after Closing, samples accumulate but no closing
//!
//! # State Transitions
//! ```text
//! Watching → Closing: recent average breaches absolute or percent threshold
//! Closing → Resting: closed streak/count reached and resting_samples > 0
//! Closing → Watching: closed streak/count reached and resting_samples == 0
//! Resting → Watching: resting_samples observed (re-evaluated immediately)
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// Current state of a host's latency machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum State {
    #[default]
    Watching,
    Closing,
    Resting,
}

impl State {
    /// Lowercase name, matching the serde form.
    pub fn as_str(self) -> &'static str {
        match self {
            State::Watching => "watching",
            State::Closing => "closing",
            State::Resting => "resting",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of feeding one sample into a machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// Settled state after the sample was processed.
    pub next: State,
    /// State observed when the sample arrived.
    pub prev: State,
}

impl Transition {
    /// True when the sample moved the machine to a different state.
    pub fn changed(&self) -> bool {
        self.next != self.prev
    }
}
