//! Outbound HTTP client with caching, retries and circuit breaking.
//!
//! # Call Flow
//! ```text
//! GET with read-through caching → cache hit? return
//!     → circuit breaker for target → open? fail fast, no I/O
//!     → attempt (bounded by timeout)
//!         → failure retryable and budget left? sleep backoff, attempt again
//!     → record outcome on breaker, cache 200 GET payloads
//! ```

use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use serde_json::Value;
use thiserror::Error;
use tokio::time::timeout;

use crate::config::HttpClientConfig;
use crate::observability::metrics;
use crate::resilience::cache::ResponseCache;
use crate::resilience::circuit_breaker::CircuitBreakerRegistry;
use crate::resilience::retries::{is_retryable, RetryPolicy};

/// Longest upstream body kept in error messages.
const ERROR_BODY_LIMIT: usize = 512;

/// Whether a GET may be served from and stored in the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheMode {
    ReadThrough,
    Bypass,
}

/// Failure of a single attempt.
#[derive(Debug, Error)]
pub enum CallError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("no response within {0:?}")]
    Timeout(Duration),

    #[error("upstream returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid JSON payload: {0}")]
    Decode(#[from] serde_json::Error),
}

impl CallError {
    pub fn status(&self) -> Option<u16> {
        match self {
            CallError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        match self {
            CallError::Timeout(_) => true,
            CallError::Transport(e) => e.is_timeout(),
            _ => false,
        }
    }

    /// No response was received.
    pub fn is_network_error(&self) -> bool {
        matches!(self, CallError::Transport(_) | CallError::Timeout(_))
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            CallError::Decode(_) => false,
            other => is_retryable(other.status()),
        }
    }

    /// Whether this outcome should count against the target's breaker.
    fn is_target_failure(&self) -> bool {
        !matches!(self, CallError::Status { .. }) || self.is_retryable()
    }
}

/// A logical call that did not produce a payload.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("circuit breaker for {target} is open")]
    CircuitOpen { target: String },

    #[error("{method} {url} failed after {attempts} attempt(s): {source}")]
    Request {
        target: String,
        method: Method,
        url: String,
        attempts: u32,
        #[source]
        source: CallError,
    },
}

impl UpstreamError {
    pub fn status(&self) -> Option<u16> {
        match self {
            UpstreamError::Request { source, .. } => source.status(),
            UpstreamError::CircuitOpen { .. } => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, UpstreamError::Request { source, .. } if source.is_timeout())
    }

    pub fn is_network_error(&self) -> bool {
        matches!(self, UpstreamError::Request { source, .. } if source.is_network_error())
    }

    pub fn is_circuit_open(&self) -> bool {
        matches!(self, UpstreamError::CircuitOpen { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            UpstreamError::Request { attempts, .. } => *attempts,
            UpstreamError::CircuitOpen { .. } => 0,
        }
    }
}

/// Payload of a successful call plus how it was obtained.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub payload: Value,
    pub status: u16,
    /// Network attempts made; zero when served from cache.
    pub attempts: u32,
    /// Delays slept between attempts, in order.
    pub backoff_delays: Vec<Duration>,
    pub from_cache: bool,
}

/// Shared outbound client.
#[derive(Clone)]
pub struct ResilientClient {
    http: reqwest::Client,
    cache: Arc<ResponseCache>,
    breakers: Arc<CircuitBreakerRegistry>,
    retry: RetryPolicy,
    request_timeout: Duration,
}

impl ResilientClient {
    pub fn new(
        config: &HttpClientConfig,
        cache: Arc<ResponseCache>,
        breakers: Arc<CircuitBreakerRegistry>,
    ) -> Result<Self, reqwest::Error> {
        let request_timeout = Duration::from_millis(config.request_timeout_ms);
        let http = reqwest::Client::builder()
            .connect_timeout(request_timeout)
            .user_agent(concat!("fluxnode-starter/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            cache,
            breakers,
            retry: RetryPolicy::from_config(config),
            request_timeout,
        })
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub fn breakers(&self) -> &CircuitBreakerRegistry {
        &self.breakers
    }

    /// GET a JSON document from `target`.
    pub async fn get(
        &self,
        target: &str,
        url: &str,
        cache_mode: CacheMode,
    ) -> Result<UpstreamResponse, UpstreamError> {
        self.execute(target, Method::GET, url, None, cache_mode).await
    }

    /// POST a JSON body to `target`. Never cached.
    pub async fn post(
        &self,
        target: &str,
        url: &str,
        body: &Value,
    ) -> Result<UpstreamResponse, UpstreamError> {
        self.execute(target, Method::POST, url, Some(body), CacheMode::Bypass)
            .await
    }

    async fn execute(
        &self,
        target: &str,
        method: Method,
        url: &str,
        body: Option<&Value>,
        cache_mode: CacheMode,
    ) -> Result<UpstreamResponse, UpstreamError> {
        let cacheable = method == Method::GET && cache_mode == CacheMode::ReadThrough;

        if cacheable {
            if let Some(payload) = self.cache.get(url) {
                return Ok(UpstreamResponse {
                    payload,
                    status: 200,
                    attempts: 0,
                    backoff_delays: Vec::new(),
                    from_cache: true,
                });
            }
        }

        let breaker = self.breakers.get(target);
        if !breaker.can_attempt() {
            tracing::warn!(target_name = %target, url = %url, "Circuit open, failing fast");
            metrics::record_upstream_request(target, "circuit_open");
            return Err(UpstreamError::CircuitOpen {
                target: target.to_string(),
            });
        }

        let mut backoff_delays = Vec::new();
        let mut attempt = 0u32;
        loop {
            tracing::debug!(
                target_name = %target,
                method = %method,
                url = %url,
                attempt = attempt + 1,
                max_attempts = self.retry.max_attempts,
                "Upstream request"
            );

            match self.send_once(&method, url, body).await {
                Ok((status, payload)) => {
                    breaker.record_success();
                    metrics::record_upstream_request(target, "success");
                    if cacheable && status == 200 {
                        self.cache.insert(url, payload.clone());
                    }
                    return Ok(UpstreamResponse {
                        payload,
                        status,
                        attempts: attempt + 1,
                        backoff_delays,
                        from_cache: false,
                    });
                }
                Err(error) => {
                    if error.is_retryable() && self.retry.can_retry_after(attempt) {
                        let delay = self.retry.delay_after(attempt);
                        tracing::warn!(
                            target_name = %target,
                            url = %url,
                            attempt = attempt + 1,
                            delay = ?delay,
                            error = %error,
                            "Upstream request failed, retrying"
                        );
                        metrics::record_retry(target);
                        tokio::time::sleep(delay).await;
                        backoff_delays.push(delay);
                        attempt += 1;
                        continue;
                    }

                    if error.is_target_failure() {
                        breaker.record_failure();
                    } else {
                        breaker.record_success();
                    }
                    metrics::record_upstream_request(target, "failure");
                    tracing::error!(
                        target_name = %target,
                        url = %url,
                        attempts = attempt + 1,
                        error = %error,
                        "Upstream request failed"
                    );
                    return Err(UpstreamError::Request {
                        target: target.to_string(),
                        method,
                        url: url.to_string(),
                        attempts: attempt + 1,
                        source: error,
                    });
                }
            }
        }
    }

    async fn send_once(
        &self,
        method: &Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<(u16, Value), CallError> {
        let mut request = self.http.request(method.clone(), url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let exchange = async {
            let response = request.send().await?;
            let status = response.status();
            let text = response.text().await?;
            Ok::<_, CallError>((status, text))
        };

        let (status, text) = timeout(self.request_timeout, exchange)
            .await
            .map_err(|_| CallError::Timeout(self.request_timeout))??;

        if !status.is_success() {
            let mut body = text;
            if body.len() > ERROR_BODY_LIMIT {
                let mut cut = ERROR_BODY_LIMIT;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
            }
            return Err(CallError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let payload = serde_json::from_str(&text)?;
        Ok((status.as_u16(), payload))
    }
}

impl std::fmt::Debug for ResilientClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientClient")
            .field("max_attempts", &self.retry.max_attempts)
            .field("base_delay_ms", &self.retry.base_delay_ms)
            .field("timeout", &self.request_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_error_classification() {
        let server_error = CallError::Status {
            status: 503,
            body: String::new(),
        };
        assert!(server_error.is_retryable());
        assert!(server_error.is_target_failure());
        assert!(!server_error.is_network_error());

        let not_found = CallError::Status {
            status: 404,
            body: String::new(),
        };
        assert!(!not_found.is_retryable());
        assert!(!not_found.is_target_failure());

        let timeout = CallError::Timeout(Duration::from_secs(1));
        assert!(timeout.is_retryable());
        assert!(timeout.is_timeout());
        assert!(timeout.is_network_error());

        let decode = CallError::Decode(serde_json::from_str::<Value>("{").unwrap_err());
        assert!(!decode.is_retryable());
        assert!(decode.is_target_failure());
    }

    #[test]
    fn test_upstream_error_accessors() {
        let err = UpstreamError::Request {
            target: "daemon".into(),
            method: Method::GET,
            url: "http://daemon/x".into(),
            attempts: 3,
            source: CallError::Status {
                status: 502,
                body: "bad gateway".into(),
            },
        };
        assert_eq!(err.status(), Some(502));
        assert_eq!(err.attempts(), 3);
        assert!(!err.is_timeout());
        assert!(err.to_string().contains("after 3 attempt(s)"));

        let open = UpstreamError::CircuitOpen {
            target: "daemon".into(),
        };
        assert!(open.is_circuit_open());
        assert_eq!(open.attempts(), 0);
    }
}
