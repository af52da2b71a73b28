//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks, every problem reported)
//!     → StarterConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; profiles never change at runtime
//! - All sections have defaults except profiles
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    AuthConfig, CacheConfig, CircuitBreakerConfig, HttpClientConfig, NetworkConfig, NotificationConfig,
    ObservabilityConfig, ProfileConfig, RateLimitConfig, ServerConfig, StarterConfig, UpstreamConfig,
};
