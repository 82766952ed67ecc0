//! fxqs — multi-client TCP currency exchange-rate quote server.
#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Credential store and login-frame authentication.
pub mod auth;
/// CLI argument parsing and server configuration.
pub mod config;
mod connection;
/// Error types for server operations.
pub mod error;
/// Prometheus metrics collection and HTTP endpoint.
pub mod metrics;
/// Currency-pair quote computation.
pub mod quote;
/// Per-user request counting and timed lockout.
pub mod ratelimit;
/// Accept loop and shared server state.
pub mod server;

pub use server::{run, run_with_shutdown, ServerState};
