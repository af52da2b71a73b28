//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StarterConfig {
    /// Inbound HTTP server settings.
    pub server: ServerConfig,

    /// API key authentication for `/api` routes.
    pub auth: AuthConfig,

    /// Per-IP request limits for `/api` routes.
    pub rate_limit: RateLimitConfig,

    /// Block explorer used for collateral lookups.
    pub explorer: UpstreamConfig,

    /// Daemon API used for broadcasts.
    pub daemon: UpstreamConfig,

    /// Outbound timeout and retry settings.
    pub http: HttpClientConfig,

    /// Response cache for outbound GETs.
    pub cache: CacheConfig,

    /// Per-target circuit breaker settings.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Outcome notifications.
    pub notifications: NotificationConfig,

    /// Chain parameters.
    pub network: NetworkConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Signing identities. The first one is the default.
    pub profiles: Vec<ProfileConfig>,
}

impl Default for StarterConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            auth: AuthConfig::default(),
            rate_limit: RateLimitConfig::default(),
            explorer: UpstreamConfig::explorer_default(),
            daemon: UpstreamConfig::daemon_default(),
            http: HttpClientConfig::default(),
            cache: CacheConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            notifications: NotificationConfig::default(),
            network: NetworkConfig::default(),
            observability: ObservabilityConfig::default(),
            profiles: Vec::new(),
        }
    }
}

impl StarterConfig {
    pub fn with_profiles(profiles: Vec<ProfileConfig>) -> Self {
        Self {
            profiles,
            ..Self::default()
        }
    }
}

/// Inbound server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:9001").
    pub bind_address: String,

    /// Upper bound on one inbound request in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:9001".to_string(),
            request_timeout_secs: 120,
        }
    }
}

/// API key authentication.
#[derive(Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AuthConfig {
    pub enabled: bool,

    /// Key name to key. Names identify callers in logs.
    pub api_keys: BTreeMap<String, String>,

    /// Callers admitted without a key.
    pub whitelisted_ips: Vec<IpAddr>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("enabled", &self.enabled)
            .field("api_keys", &self.api_keys.keys().collect::<Vec<_>>())
            .field("whitelisted_ips", &self.whitelisted_ips)
            .finish()
    }
}

/// Per-IP rate limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub enabled: bool,

    /// Requests per window across all `/api` routes.
    pub api_max_requests: u32,
    pub api_window_secs: u64,

    /// Requests per window on the start routes.
    pub start_max_requests: u32,
    pub start_window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_max_requests: 100,
            api_window_secs: 900,
            start_max_requests: 10,
            start_window_secs: 300,
        }
    }
}

/// An external HTTP service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamConfig {
    /// Base URL without trailing slash.
    pub base_url: String,
}

impl UpstreamConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    pub fn explorer_default() -> Self {
        Self {
            base_url: "https://explorer.runonflux.io/api".to_string(),
        }
    }

    pub fn daemon_default() -> Self {
        Self {
            base_url: "https://api.runonflux.io".to_string(),
        }
    }
}

/// Outbound request configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpClientConfig {
    /// Deadline for a single attempt in milliseconds.
    pub request_timeout_ms: u64,

    /// Total attempts per call, including the first.
    pub max_retries: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub retry_base_delay_ms: u64,

    /// Upper bound of the random jitter added to each delay.
    pub retry_jitter_ms: u64,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 30_000,
            max_retries: 3,
            retry_base_delay_ms: 1_000,
            retry_jitter_ms: 1_000,
        }
    }
}

/// Response cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,

    /// Entry lifetime in milliseconds.
    pub ttl_ms: u64,

    /// Entries kept after a sweep.
    pub max_entries: usize,

    /// Chance that a write triggers a sweep.
    pub sweep_probability: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_ms: 300_000,
            max_entries: 100,
            sweep_probability: 0.1,
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the circuit opens.
    pub failure_threshold: u32,

    /// Cooldown before a half-open probe, in milliseconds.
    pub reset_timeout_ms: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout_ms: 60_000,
        }
    }
}

/// Outcome notification configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Discord-compatible webhook. Notifications are only logged when unset.
    pub webhook_url: Option<String>,

    pub timeout_secs: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            timeout_secs: 10,
        }
    }
}

/// Chain parameters.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Hex of the two version bytes of P2SH addresses.
    pub p2sh_version_hex: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            p2sh_version_hex: "1cbd".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of the human format.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// One signing identity as written in the config file.
///
/// Fields default to empty so validation can report every missing one.
#[derive(Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProfileConfig {
    pub name: String,
    pub collateral_address: String,
    pub node_operator_private_key: String,
    pub collateral_private_key: String,
    pub redeem_script: String,
}

impl std::fmt::Debug for ProfileConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileConfig")
            .field("name", &self.name)
            .field("collateral_address", &self.collateral_address)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StarterConfig::default();
        assert_eq!(config.http.max_retries, 3);
        assert_eq!(config.cache.ttl_ms, 300_000);
        assert_eq!(config.circuit_breaker.failure_threshold, 5);
        assert!(config.profiles.is_empty());
        assert!(!config.auth.enabled);
        assert_eq!(config.rate_limit.start_max_requests, 10);
        assert_ne!(config.explorer.base_url, config.daemon.base_url);
    }

    #[test]
    fn test_profile_debug_hides_secrets() {
        let profile = ProfileConfig {
            name: "default".into(),
            collateral_address: "t3abc".into(),
            node_operator_private_key: "SECRET_OPERATOR".into(),
            collateral_private_key: "SECRET_COLLATERAL".into(),
            redeem_script: "5221".into(),
        };
        let rendered = format!("{:?}", profile);
        assert!(!rendered.contains("SECRET"));
        assert!(!rendered.contains("5221"));
    }

    #[test]
    fn test_auth_debug_hides_keys() {
        let auth = AuthConfig {
            enabled: true,
            api_keys: BTreeMap::from([("ops".to_string(), "SECRET_KEY".to_string())]),
            whitelisted_ips: Vec::new(),
        };
        let rendered = format!("{:?}", auth);
        assert!(rendered.contains("ops"));
        assert!(!rendered.contains("SECRET"));
    }
}
