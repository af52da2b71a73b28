//! Flux node start relay library.
//!
//! Validates a collateral output against the block explorer, matches it to a
//! configured signing profile, signs a node start transaction and broadcasts
//! it through the daemon API.

pub mod blockchain;
pub mod collateral;
pub mod config;
pub mod http;
pub mod notifications;
pub mod observability;
pub mod pipeline;
pub mod profiles;
pub mod resilience;

pub use config::schema::StarterConfig;
pub use http::HttpServer;
pub use pipeline::{Orchestrator, StartCommand, StartOutcome};
