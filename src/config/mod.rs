//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → RecyclerConfig (validated, immutable)
//!     → latency section handed to the host registry
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; machines never observe a change
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{ObservabilityConfig, RecyclerConfig};
pub use validation::{validate_config, ValidationError};
