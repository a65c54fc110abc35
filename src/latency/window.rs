//! Fixed-capacity rolling average.
//!
//! # Responsibilities
//! - Hold the last N samples in a ring buffer
//! - Maintain the running sum incrementally (O(1) push and average)
//! - Hand back the evicted sample so windows can be chained
//!
//! # Design Decisions
//! - Buffer is fully populated with a default value at construction, so the
//!   average is always defined and never needs a "warming up" branch
//! - Capacity is fixed; the buffer never grows or shrinks

use crate::error::{Error, Result};

/// Ring buffer of `f64` samples with an incrementally maintained sum.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    values: Vec<f64>,
    sum: f64,
    cursor: usize,
}

impl RollingWindow {
    /// Create a window of `capacity` slots, each set to `default`.
    pub fn new(capacity: usize, default: f64) -> Result<Self> {
        if capacity < 1 {
            return Err(Error::InvalidWindow);
        }

        Ok(Self {
            values: vec![default; capacity],
            sum: default * capacity as f64,
            cursor: 0,
        })
    }

    /// Average of the samples currently held.
    pub fn average(&self) -> f64 {
        self.sum / self.values.len() as f64
    }

    /// Overwrite the oldest sample with `value` and return the evicted one.
    pub fn push(&mut self, value: f64) -> f64 {
        let evicted = std::mem::replace(&mut self.values[self.cursor], value);
        self.sum += value - evicted;
        self.cursor += 1;
        if self.cursor == self.values.len() {
            self.cursor = 0;
        }
        evicted
    }

    /// Number of slots.
    pub fn capacity(&self) -> usize {
        self.values.len()
    }

    /// Running sum of the held samples.
    #[cfg(test)]
    pub(crate) fn sum(&self) -> f64 {
        self.sum
    }

    /// Raw slot contents in storage order (not insertion order).
    #[cfg(test)]
    pub(crate) fn values(&self) -> &[f64] {
        &self.values
    }
}
