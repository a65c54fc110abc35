//! Latency hook handler.
//!
//! # Responsibilities
//! - Record when each attempt starts
//! - Flag outgoing requests to hosts in the Closing state
//! - Feed attempt latency and connection outcome into the host's machine
//!
//! # Design Decisions
//! - Bad execution data is logged and the observation dropped; it never
//!   reaches a machine and never fails the request
//! - Machines are created before the first attempt so the matching
//!   AfterAttempt always finds one

use std::sync::Arc;
use std::time::Instant;

use crate::hook::execution::{Event, Execution};
use crate::latency::{HostRegistry, Machine, State, Transition};
use crate::observability::metrics;

/// Drives per-host latency machines from request execution events.
#[derive(Debug, Clone)]
pub struct LatencyHandler {
    registry: Arc<HostRegistry>,
}

impl LatencyHandler {
    pub fn new(registry: Arc<HostRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<HostRegistry> {
        &self.registry
    }

    /// Process `event` using the current time.
    ///
    /// Returns the machine transition when an AfterAttempt observation was
    /// accepted.
    pub fn handle(&self, event: Event, execution: &mut Execution) -> Option<Transition> {
        self.handle_at(event, execution, Instant::now())
    }

    /// Process `event` as if it happened at `now`.
    pub fn handle_at(&self, event: Event, execution: &mut Execution, now: Instant) -> Option<Transition> {
        match event {
            Event::BeforeExecutionStart => {
                execution.reset_times();
                None
            }
            Event::BeforeAttempt => {
                self.before_attempt(execution, now);
                None
            }
            Event::AfterAttempt => self.after_attempt(execution, now),
        }
    }

    fn before_attempt(&self, execution: &mut Execution, now: Instant) {
        let Some(host) = execution.host().map(str::to_owned) else {
            tracing::error!(attempt = execution.attempt(), "Missing execution host");
            metrics::record_dropped_sample("missing_host");
            return;
        };

        let attempt = execution.attempt();
        let Some(times) = execution.times_mut() else {
            tracing::error!(host = %host, attempt, "Missing execution state");
            metrics::record_dropped_sample("missing_state");
            return;
        };
        if times.len() != attempt {
            tracing::error!(host = %host, attempt, recorded = times.len(), "Unexpected attempt start");
            metrics::record_dropped_sample("unexpected_start");
            return;
        }
        times.record(now);

        let machine = match self.registry.get_or_create(&host) {
            Ok(machine) => machine,
            Err(e) => {
                tracing::error!(host = %host, error = %e, "Failed to create latency machine");
                return;
            }
        };

        if machine.state() == State::Closing {
            tracing::info!(host = %host, attempt, "Connection will be closed after attempt ends");
            metrics::record_forced_close(&host);
            execution.set_close(true);
        }
    }

    fn after_attempt(&self, execution: &mut Execution, now: Instant) -> Option<Transition> {
        let Some(host) = execution.host() else {
            tracing::error!(attempt = execution.attempt(), "Missing execution host");
            metrics::record_dropped_sample("missing_host");
            return None;
        };

        let attempt = execution.attempt();
        let Some(times) = execution.times() else {
            tracing::error!(host = %host, attempt, "Missing execution state");
            metrics::record_dropped_sample("missing_state");
            return None;
        };
        let Some(start) = times.start_of(attempt) else {
            tracing::error!(host = %host, attempt, recorded = times.len(), "Unexpected attempt end");
            metrics::record_dropped_sample("unexpected_end");
            return None;
        };
        // Whole milliseconds; the sub-millisecond remainder is dropped.
        let latency_ms = now.saturating_duration_since(start).as_millis() as f64;

        let Some(machine) = self.registry.get(host) else {
            tracing::error!(host = %host, attempt, "Missing latency machine for host");
            metrics::record_dropped_sample("missing_machine");
            return None;
        };

        let transition = machine.next(latency_ms, execution.close());
        if transition.changed() {
            tracing::info!(
                host = %host,
                attempt,
                from = %transition.prev,
                to = %transition.next,
                latency_ms,
                "Host state changed"
            );
            metrics::record_transition(host, transition.prev, transition.next);
        } else {
            tracing::trace!(host = %host, attempt, latency_ms, state = %transition.next, "Latency sample");
        }
        Some(transition)
    }
}
