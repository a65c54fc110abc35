//! HTTP client integration.
//!
//! # Data Flow
//! ```text
//! Request<B>
//!     → layer.rs (resolve host, BeforeAttempt hook, maybe `Connection: close`)
//!     → inner client service (hyper-util legacy client, connection pool)
//!     → layer.rs (AfterAttempt hook with latency and close outcome)
//!     → Response<R>
//! ```

pub mod layer;

pub use layer::{request_host, wants_close, RecycleLayer, RecycleService};
