//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (finite thresholds, parseable addresses)
//! - Reject configurations that can never close a connection
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Pure function: RecyclerConfig → Result<(), Vec<ValidationError>>

use std::net::SocketAddr;
use std::str::FromStr;

use thiserror::Error;

use crate::config::schema::RecyclerConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    #[error("latency.{field} must be a finite number, got {value}")]
    NonFiniteThreshold { field: &'static str, value: f64 },

    #[error("latency: neither absolute_threshold nor percent_threshold is positive, connections would never be closed")]
    NoThreshold,

    #[error("observability.log_level: unknown level {0:?}")]
    InvalidLogLevel(String),

    #[error("observability.metrics_address: invalid socket address {0:?}")]
    InvalidMetricsAddress(String),
}

/// Validate `config`, collecting every problem found.
pub fn validate_config(config: &RecyclerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let latency = &config.latency;

    let thresholds = [
        ("absolute_threshold", latency.absolute_threshold),
        ("percent_threshold", latency.percent_threshold),
    ];
    for (field, value) in thresholds {
        if !value.is_finite() {
            errors.push(ValidationError::NonFiniteThreshold { field, value });
        }
    }
    if !(latency.absolute_threshold > 0.0) && !(latency.percent_threshold > 0.0) {
        errors.push(ValidationError::NoThreshold);
    }

    let observability = &config.observability;
    if tracing::Level::from_str(&observability.log_level).is_err() {
        errors.push(ValidationError::InvalidLogLevel(observability.log_level.clone()));
    }
    if observability.metrics_enabled && observability.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidMetricsAddress(observability.metrics_address.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
