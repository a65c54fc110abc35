//! Per-execution context carried through the hook events.
//!
//! An execution is one logical request, possibly made of several attempts.
//! It is owned by the task driving the request and never shared, so nothing
//! here needs synchronization.

use std::time::Instant;

/// Lifecycle notifications delivered to a [`LatencyHandler`](super::LatencyHandler).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// A new execution is about to begin; resets attempt bookkeeping.
    BeforeExecutionStart,
    /// An attempt is about to be sent.
    BeforeAttempt,
    /// An attempt has completed (successfully or not).
    AfterAttempt,
}

/// Start times of the attempts made so far, indexed by attempt number.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AttemptTimes {
    starts: Vec<Instant>,
}

impl AttemptTimes {
    pub fn len(&self) -> usize {
        self.starts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.starts.is_empty()
    }

    pub fn start_of(&self, attempt: usize) -> Option<Instant> {
        self.starts.get(attempt).copied()
    }

    pub(crate) fn record(&mut self, at: Instant) {
        self.starts.push(at);
    }
}

/// State of one request execution as seen by the hook handler.
#[derive(Debug, Clone)]
pub struct Execution {
    host: Option<String>,
    attempt: usize,
    close: bool,
    times: Option<AttemptTimes>,
}

impl Execution {
    /// New execution targeting `host`; attempt 0, connection kept alive.
    pub fn new(host: Option<String>) -> Self {
        Self {
            host,
            attempt: 0,
            close: false,
            times: None,
        }
    }

    /// Target host, treating an empty name as missing.
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref().filter(|h| !h.is_empty())
    }

    /// Zero-based index of the current attempt.
    pub fn attempt(&self) -> usize {
        self.attempt
    }

    /// Move on to the next attempt. The close flag belongs to a single
    /// outgoing request and is cleared.
    pub fn next_attempt(&mut self) {
        self.attempt += 1;
        self.close = false;
    }

    /// Whether the current attempt's connection is (or will be) closed.
    pub fn close(&self) -> bool {
        self.close
    }

    pub fn set_close(&mut self, close: bool) {
        self.close = close;
    }

    pub fn times(&self) -> Option<&AttemptTimes> {
        self.times.as_ref()
    }

    pub(crate) fn times_mut(&mut self) -> Option<&mut AttemptTimes> {
        self.times.as_mut()
    }

    pub(crate) fn reset_times(&mut self) {
        self.times = Some(AttemptTimes::default());
    }
}
