//! HTTP adapter subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing, timeout)
//!     → rate_limit.rs / auth.rs (per-IP limits, API keys; 429 / 401)
//!     → handlers.rs (dispatch)
//!     → validation.rs (txid, index, profile name)
//!     → pipeline::Orchestrator
//!     → JSON response (status code from the outcome class)
//! ```

pub mod auth;
pub mod handlers;
pub mod rate_limit;
pub mod server;
pub mod validation;

pub use server::{AppState, HttpServer, X_REQUEST_ID};
