//! API key authentication for `/api` routes.
//!
//! A key is read from `X-API-Key`, or from `Authorization` with an optional
//! `Bearer ` prefix. Whitelisted caller IPs skip the check.

use std::collections::HashSet;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header::AUTHORIZATION, HeaderMap, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use subtle::ConstantTimeEq;

use crate::config::AuthConfig;
use crate::observability::logging::AUDIT_TARGET;
use crate::observability::metrics;

const X_API_KEY: &str = "x-api-key";

/// Why a caller was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthRejection {
    MissingKey,
    InvalidKey,
}

impl AuthRejection {
    fn message(&self) -> &'static str {
        match self {
            AuthRejection::MissingKey => "API key required. Please provide X-API-Key header.",
            AuthRejection::InvalidKey => "Invalid API key",
        }
    }
}

/// Configured keys and whitelist.
#[derive(Debug)]
pub struct ApiKeyAuth {
    keys: Vec<(String, String)>,
    whitelist: HashSet<IpAddr>,
}

impl ApiKeyAuth {
    /// `None` when authentication is disabled.
    pub fn from_config(config: &AuthConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }
        Some(Self {
            keys: config
                .api_keys
                .iter()
                .map(|(name, key)| (name.clone(), key.trim().to_string()))
                .collect(),
            whitelist: config.whitelisted_ips.iter().copied().collect(),
        })
    }

    /// Name of the matching key, or `"whitelisted"` for whitelisted callers.
    pub fn authorize(&self, headers: &HeaderMap, ip: IpAddr) -> Result<&str, AuthRejection> {
        if self.whitelist.contains(&ip) {
            return Ok("whitelisted");
        }

        let presented = presented_key(headers).ok_or(AuthRejection::MissingKey)?;
        // Constant time: every key is compared.
        let mut matched = None;
        for (name, key) in &self.keys {
            if bool::from(presented.as_bytes().ct_eq(key.as_bytes())) {
                matched = Some(name.as_str());
            }
        }
        matched.ok_or(AuthRejection::InvalidKey)
    }
}

fn presented_key(headers: &HeaderMap) -> Option<&str> {
    let raw = headers
        .get(X_API_KEY)
        .or_else(|| headers.get(AUTHORIZATION))
        .and_then(|value| value.to_str().ok())?;
    let key = raw.strip_prefix("Bearer ").unwrap_or(raw).trim();
    (!key.is_empty()).then_some(key)
}

/// Middleware that refuses unauthenticated callers with 401.
pub async fn api_key_middleware(
    State(auth): State<Arc<ApiKeyAuth>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request<Body>,
    next: Next,
) -> Response {
    match auth.authorize(request.headers(), addr.ip()) {
        Ok(key_name) => {
            tracing::debug!(key = key_name, caller_ip = %addr.ip(), path = %request.uri().path(), "API key accepted");
            next.run(request).await
        }
        Err(rejection) => {
            tracing::warn!(
                target: AUDIT_TARGET,
                caller_ip = %addr.ip(),
                path = %request.uri().path(),
                reason = ?rejection,
                "API key rejected"
            );
            metrics::record_refused_request("unauthorized");
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "status": "error", "error": rejection.message() })),
            )
                .into_response()
        }
    }
}
