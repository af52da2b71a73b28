//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Outbound call (client.rs):
//!     → cache.rs (GET read-through, keyed by URL)
//!     → circuit_breaker.rs (fail fast while the target is open)
//!     → tokio timeout around every attempt
//!     → On failure: retries.rs (check if retryable, retry with backoff.rs delay)
//!     → circuit_breaker.rs (record the call's outcome)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - Cache and breaker registry are owned values injected into the client
//! - One logical call, including its retries, is one breaker outcome

pub mod backoff;
pub mod cache;
pub mod circuit_breaker;
pub mod client;
pub mod retries;

pub use cache::ResponseCache;
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerRegistry, CircuitState};
pub use client::{CacheMode, CallError, ResilientClient, UpstreamError, UpstreamResponse};
