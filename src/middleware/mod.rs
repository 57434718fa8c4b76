//! HTTP middleware.
//!
//! Request logging with latency tracking. The auth gate lives with the
//! rest of the auth machinery in `crate::auth::middleware`.

pub mod logging;

pub use logging::request_logging;
