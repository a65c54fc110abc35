//! Per-host latency state machine.
//!
//! Two rolling windows feed the machine: a short "recent" window and a
//! longer "historical" window that receives whatever the recent window
//! evicts, so it lags the recent window by exactly `recent_samples`
//! observations.
//!
//! # Design Decisions
//! - One lock per machine; hosts never contend with each other
//! - A single sample may cascade through more than one transition
//!   (Watching → Closing → Watching, Resting → Watching → Closing); callers
//!   only ever see the entry state and the settled state
//! - Closing exit uses literal `>=` comparisons, so a zero streak or count
//!   lets the machine pass through Closing within the call that entered it

use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::latency::state::{State, Transition};
use crate::latency::window::RollingWindow;

/// Historical window size used when `historical_samples` is zero.
pub const DEFAULT_HISTORICAL_SAMPLES: usize = 10;

/// Recent window size used when `recent_samples` is zero.
pub const DEFAULT_RECENT_SAMPLES: usize = 3;

/// Tuning for a [`LatencyMachine`]. Latency values are in milliseconds.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MachineConfig {
    /// Samples in the historical average (0 selects the default).
    pub historical_samples: usize,

    /// Samples in the recent average (0 selects the default).
    pub recent_samples: usize,

    /// Recent average at or above this value triggers Closing. Samples are
    /// clamped to it before being averaged. Disabled when zero or negative.
    pub absolute_threshold: f64,

    /// Percentage points the recent average must exceed the historical
    /// average by to trigger Closing (`100.0` means double). Disabled when
    /// zero or negative.
    pub percent_threshold: f64,

    /// Consecutive closed connections that end a Closing period.
    pub closing_streak: u32,

    /// Total closed connections that end a Closing period.
    pub closing_count: u32,

    /// Samples to spend in Resting after Closing; zero skips Resting.
    pub resting_samples: u32,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            historical_samples: DEFAULT_HISTORICAL_SAMPLES,
            recent_samples: DEFAULT_RECENT_SAMPLES,
            absolute_threshold: 0.0,
            percent_threshold: 0.0,
            closing_streak: 0,
            closing_count: 0,
            resting_samples: 0,
        }
    }
}

impl MachineConfig {
    pub fn historical_len(&self) -> usize {
        non_zero_or(self.historical_samples, DEFAULT_HISTORICAL_SAMPLES)
    }

    pub fn recent_len(&self) -> usize {
        non_zero_or(self.recent_samples, DEFAULT_RECENT_SAMPLES)
    }

    /// Value both windows start out filled with.
    pub fn window_default(&self) -> f64 {
        self.absolute_threshold
    }

    fn clamp(&self, value: f64) -> f64 {
        if self.absolute_threshold > 0.0 {
            value.min(self.absolute_threshold)
        } else {
            value
        }
    }
}

fn non_zero_or(value: usize, default: usize) -> usize {
    if value > 0 {
        value
    } else {
        default
    }
}

/// Decides whether connections should be closed based on observed latency.
///
/// Implementations must be safe to drive from many requests at once.
pub trait Machine: Send + Sync {
    /// Current state.
    fn state(&self) -> State;

    /// Feed one observation. `closed` reports whether the connection that
    /// produced `value` was closed after the attempt.
    fn next(&self, value: f64, closed: bool) -> Transition;
}

#[derive(Debug)]
struct Inner {
    state: State,
    recent: RollingWindow,
    historical: RollingWindow,
    closed_streak: u32,
    closed_count: u32,
    rest_count: u32,
}

/// Lock-guarded [`Machine`] backed by two rolling windows.
#[derive(Debug)]
pub struct LatencyMachine {
    inner: RwLock<Inner>,
    config: MachineConfig,
}

impl LatencyMachine {
    /// Build a machine in the Watching state.
    pub fn new(config: MachineConfig) -> Result<Self> {
        let default = config.window_default();
        let recent = RollingWindow::new(config.recent_len(), default)?;
        let historical = RollingWindow::new(config.historical_len(), default)?;

        Ok(Self {
            inner: RwLock::new(Inner {
                state: State::Watching,
                recent,
                historical,
                closed_streak: 0,
                closed_count: 0,
                rest_count: 0,
            }),
            config,
        })
    }

    pub fn config(&self) -> &MachineConfig {
        &self.config
    }
}

impl Machine for LatencyMachine {
    fn state(&self) -> State {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).state
    }

    fn next(&self, value: f64, closed: bool) -> Transition {
        // No code path panics while the lock is held, so a poisoned lock
        // still guards consistent data.
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);

        let prev = inner.state;
        inner.shift(self.config.clamp(value));
        match prev {
            State::Watching => inner.watching(&self.config),
            State::Closing => inner.closing(&self.config, closed),
            State::Resting => inner.resting(&self.config),
        }

        Transition { next: inner.state, prev }
    }
}

impl Inner {
    fn shift(&mut self, value: f64) {
        let evicted = self.recent.push(value);
        self.historical.push(evicted);
    }

    fn watching(&mut self, config: &MachineConfig) {
        let recent = self.recent.average();
        let absolute_breach = config.absolute_threshold > 0.0 && recent >= config.absolute_threshold;
        let percent_breach = config.percent_threshold > 0.0
            && recent >= self.historical.average() * ((100.0 + config.percent_threshold) / 100.0);

        if absolute_breach || percent_breach {
            self.state = State::Closing;
            self.closing(config, false);
        }
    }

    fn closing(&mut self, config: &MachineConfig, closed: bool) {
        if closed {
            self.closed_count += 1;
            self.closed_streak += 1;
        } else {
            self.closed_streak = 0;
        }

        if self.closed_streak >= config.closing_streak || self.closed_count >= config.closing_count {
            self.closed_streak = 0;
            self.closed_count = 0;
            self.state = if config.resting_samples > 0 {
                State::Resting
            } else {
                State::Watching
            };
        }
    }

    fn resting(&mut self, config: &MachineConfig) {
        self.rest_count += 1;
        if self.rest_count >= config.resting_samples {
            self.rest_count = 0;
            self.state = State::Watching;
            self.watching(config);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Step(f64, bool, State);

    fn run_steps(name: &str, config: MachineConfig, steps: &[Step]) {
        let machine = LatencyMachine::new(config).unwrap();
        let mut state = State::Watching;
        for (i, Step(value, closed, expected)) in steps.iter().enumerate() {
            assert_eq!(machine.state(), state, "{name} step {i}: state before");
            let transition = machine.next(*value, *closed);
            assert_eq!(transition.prev, state, "{name} step {i}: prev");
            assert_eq!(transition.next, *expected, "{name} step {i}: next");
            state = transition.next;
        }
    }

    fn inner(machine: &LatencyMachine) -> std::sync::RwLockReadGuard<'_, Inner> {
        machine.inner.read().unwrap()
    }

    #[test]
    fn test_default_window_lengths() {
        let machine = LatencyMachine::new(MachineConfig {
            historical_samples: 0,
            recent_samples: 123,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(inner(&machine).historical.capacity(), DEFAULT_HISTORICAL_SAMPLES);
        assert_eq!(inner(&machine).recent.capacity(), 123);

        let machine = LatencyMachine::new(MachineConfig {
            historical_samples: 456,
            recent_samples: 0,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(inner(&machine).historical.capacity(), 456);
        assert_eq!(inner(&machine).recent.capacity(), DEFAULT_RECENT_SAMPLES);
    }

    #[test]
    fn test_windows_start_at_absolute_threshold() {
        let machine = LatencyMachine::new(MachineConfig {
            absolute_threshold: 250.0,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(inner(&machine).recent.average(), 250.0);
        assert_eq!(inner(&machine).historical.average(), 250.0);
    }

    #[test]
    fn test_starts_watching_and_state_is_stable() {
        let machine = LatencyMachine::new(MachineConfig::default()).unwrap();
        for _ in 0..5 {
            assert_eq!(machine.state(), State::Watching);
        }
    }

    #[test]
    fn test_historical_lags_recent() {
        let machine = LatencyMachine::new(MachineConfig {
            historical_samples: 4,
            recent_samples: 2,
            ..Default::default()
        })
        .unwrap();
        machine.next(1.0, false);
        machine.next(2.0, false);
        assert_eq!(inner(&machine).historical.sum(), 0.0);
        machine.next(3.0, false);
        assert_eq!(inner(&machine).historical.sum(), 1.0);
        machine.next(4.0, false);
        assert_eq!(inner(&machine).historical.sum(), 3.0);
    }

    #[test]
    fn test_negative_values_accepted() {
        let machine = LatencyMachine::new(MachineConfig {
            recent_samples: 1,
            historical_samples: 1,
            absolute_threshold: 10.0,
            ..Default::default()
        })
        .unwrap();
        let transition = machine.next(-5.0, false);
        assert_eq!(transition.next, State::Watching);
        assert!(!transition.changed());
    }

    #[test]
    fn test_absolute_breach_enters_closing() {
        let machine = LatencyMachine::new(MachineConfig {
            absolute_threshold: 10.0,
            recent_samples: 1,
            historical_samples: 1,
            closing_streak: 1,
            closing_count: 100,
            ..Default::default()
        })
        .unwrap();
        let transition = machine.next(20.0, false);
        assert_eq!(transition, Transition { next: State::Closing, prev: State::Watching });
    }

    #[test]
    fn test_closed_streak_of_one_leaves_closing() {
        let config = MachineConfig {
            absolute_threshold: 10.0,
            recent_samples: 1,
            historical_samples: 1,
            closing_streak: 1,
            closing_count: 1000,
            ..Default::default()
        };
        let machine = LatencyMachine::new(config.clone()).unwrap();
        machine.next(20.0, false);
        assert_eq!(machine.next(20.0, true).next, State::Watching);

        let machine = LatencyMachine::new(MachineConfig { resting_samples: 3, ..config }).unwrap();
        machine.next(20.0, false);
        assert_eq!(machine.next(20.0, true).next, State::Resting);
    }

    #[test]
    fn test_resting_requires_full_count() {
        let machine = LatencyMachine::new(MachineConfig {
            absolute_threshold: 10.0,
            recent_samples: 1,
            historical_samples: 1,
            closing_streak: 1,
            closing_count: 1,
            resting_samples: 2,
            ..Default::default()
        })
        .unwrap();
        machine.next(20.0, false);
        assert_eq!(machine.next(1.0, true).next, State::Resting);
        assert_eq!(machine.next(1.0, false).next, State::Resting);
        assert_eq!(inner(&machine).rest_count, 1);
        let transition = machine.next(1.0, false);
        assert_eq!(transition, Transition { next: State::Watching, prev: State::Resting });
        assert_eq!(inner(&machine).rest_count, 0);
    }

    #[test]
    fn test_counters_reset_on_leaving_closing() {
        let machine = LatencyMachine::new(MachineConfig {
            absolute_threshold: 10.0,
            recent_samples: 1,
            historical_samples: 1,
            closing_streak: 3,
            closing_count: 2,
            ..Default::default()
        })
        .unwrap();
        machine.next(20.0, false);
        machine.next(20.0, true);
        assert_eq!(inner(&machine).closed_count, 1);
        assert_eq!(inner(&machine).closed_streak, 1);
        machine.next(20.0, false);
        assert_eq!(inner(&machine).closed_count, 1);
        assert_eq!(inner(&machine).closed_streak, 0);
        assert_eq!(machine.next(1.0, true).next, State::Watching);
        assert_eq!(inner(&machine).closed_count, 0);
        assert_eq!(inner(&machine).closed_streak, 0);
    }

    #[test]
    fn test_resting_cascades_back_into_closing() {
        let machine = LatencyMachine::new(MachineConfig {
            absolute_threshold: 10.0,
            recent_samples: 1,
            historical_samples: 1,
            closing_streak: 1,
            closing_count: 5,
            resting_samples: 1,
            ..Default::default()
        })
        .unwrap();
        machine.next(50.0, false);
        assert_eq!(machine.next(50.0, true).next, State::Resting);
        let transition = machine.next(50.0, false);
        assert_eq!(transition, Transition { next: State::Closing, prev: State::Resting });
    }

    #[test]
    fn test_zero_closing_limits_pass_through_closing() {
        // `>=` against a zero limit is satisfied before any connection is
        // closed, so Closing is never observable from outside.
        let machine = LatencyMachine::new(MachineConfig {
            absolute_threshold: 10.0,
            recent_samples: 1,
            historical_samples: 1,
            closing_streak: 0,
            closing_count: 0,
            ..Default::default()
        })
        .unwrap();
        for _ in 0..3 {
            let transition = machine.next(100.0, false);
            assert_eq!(transition, Transition { next: State::Watching, prev: State::Watching });
        }
    }

    #[test]
    fn test_end_to_end_skip_resting() {
        run_steps(
            "skip_resting",
            MachineConfig {
                historical_samples: 1,
                recent_samples: 1,
                absolute_threshold: 1.0,
                closing_count: 1,
                closing_streak: 1,
                ..Default::default()
            },
            &[
                Step(2.0, false, State::Closing),
                Step(2.0, true, State::Watching),
            ],
        );
    }

    #[test]
    fn test_zero_closing_count() {
        run_steps(
            "zero_count",
            MachineConfig {
                historical_samples: 1,
                recent_samples: 1,
                absolute_threshold: 1.0,
                closing_streak: 1,
                resting_samples: 1,
                ..Default::default()
            },
            &[
                Step(1.0, true, State::Resting),
                Step(0.5, true, State::Watching),
            ],
        );
    }

    #[test]
    fn test_zero_closing_streak() {
        run_steps(
            "zero_streak",
            MachineConfig {
                historical_samples: 1,
                recent_samples: 1,
                absolute_threshold: 3.0,
                percent_threshold: 100.0,
                closing_count: 1,
                resting_samples: 1,
                ..Default::default()
            },
            &[
                Step(1.0, true, State::Watching),
                Step(1.0, true, State::Watching),
                Step(2.0, true, State::Resting),
                Step(2.0, true, State::Watching),
            ],
        );
    }

    #[test]
    fn test_absolute_threshold_sequence() {
        use State::*;
        run_steps(
            "absolute",
            MachineConfig {
                historical_samples: 1,
                recent_samples: 2,
                absolute_threshold: 10.0,
                closing_streak: 2,
                closing_count: 3,
                resting_samples: 2,
                ..Default::default()
            },
            &[
                Step(10.0, false, Closing),
                Step(20.0, false, Closing),
                Step(10.0, true, Closing),
                Step(10.0, false, Closing),
                Step(5.0, false, Closing),
                Step(5.0, true, Closing),
                Step(5.0, false, Closing),
                Step(15.0, true, Resting),
                Step(15.0, false, Resting),
                Step(10.0, false, Closing),
                Step(10.0, true, Closing),
                Step(11.0, true, Resting),
                Step(10.0, false, Resting),
                Step(5.0, false, Watching),
                Step(10.0, false, Watching),
                Step(10.0, false, Closing),
            ],
        );
    }

    #[test]
    fn test_percent_threshold_sequence() {
        use State::*;
        run_steps(
            "percent",
            MachineConfig {
                historical_samples: 1,
                recent_samples: 1,
                percent_threshold: 100.0,
                closing_streak: 1,
                closing_count: 1,
                resting_samples: 2,
                ..Default::default()
            },
            &[
                Step(1.0, false, Closing),
                Step(1.0, true, Resting),
                Step(10.0, false, Resting),
                Step(15.0, false, Watching),
                Step(29.5, false, Watching),
                Step(60.0, false, Closing),
                Step(1.0, true, Resting),
                Step(2.0, false, Resting),
                Step(2.0, false, Watching),
                Step(3.0, false, Watching),
                Step(6.0, false, Closing),
            ],
        );
    }

    #[test]
    fn test_absolute_and_percent_sequence() {
        use State::*;
        run_steps(
            "absolute_and_percent",
            MachineConfig {
                historical_samples: 5,
                recent_samples: 1,
                absolute_threshold: 10.0,
                percent_threshold: 100.0,
                closing_streak: 2,
                closing_count: 3,
                resting_samples: 1,
            },
            &[
                Step(5.0, false, Watching),
                Step(5.0, false, Watching),
                Step(20.0, false, Closing),
                Step(5.0, true, Closing),
                Step(5.0, true, Resting),
                Step(0.0, false, Watching),
                Step(0.0, false, Watching),
                Step(0.0, false, Watching),
                Step(5.0, false, Closing),
                Step(1.0, false, Closing),
                Step(1.0, true, Closing),
                Step(1.0, false, Closing),
                Step(1.0, true, Closing),
                Step(1.0, false, Closing),
                Step(1.0, true, Resting),
                Step(2.0, true, Closing),
                Step(2.0, true, Closing),
                Step(2.0, true, Resting),
                Step(2.0, false, Watching),
                Step(2.0, false, Watching),
                Step(4.0, false, Closing),
                Step(4.0, true, Closing),
                Step(4.0, true, Resting),
                Step(4.0, true, Watching),
                Step(8.0, false, Closing),
                Step(8.0, true, Closing),
                Step(8.0, true, Resting),
                Step(8.0, false, Watching),
                Step(8.0, false, Watching),
                Step(9.0, false, Watching),
                Step(9.25, false, Watching),
                Step(9.5, false, Watching),
                Step(9.75, false, Watching),
                Step(10.0, false, Closing),
            ],
        );
    }
}
