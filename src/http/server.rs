//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, timeout, request ID)
//! - Guard `/api` with rate limits and optional API key auth
//! - Bind server to listener and serve until shutdown

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{http::HeaderName, middleware, routing::get, Router};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::{RateLimitConfig, StarterConfig};
use crate::http::auth::{api_key_middleware, ApiKeyAuth};
use crate::http::handlers;
use crate::http::rate_limit::{rate_limit_middleware, RateLimiter};
use crate::pipeline::Orchestrator;

/// Header carrying the per-request correlation id.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
}

/// HTTP front end for the start pipeline.
pub struct HttpServer {
    router: Router,
}

/// Request guards in front of the API routes.
#[derive(Debug)]
struct Guards {
    auth: Option<Arc<ApiKeyAuth>>,
    api_limit: Option<Arc<RateLimiter>>,
    start_limit: Option<Arc<RateLimiter>>,
}

impl Guards {
    fn from_config(config: &StarterConfig) -> Self {
        let (api_limit, start_limit) = limiters(&config.rate_limit);
        Self {
            auth: ApiKeyAuth::from_config(&config.auth).map(Arc::new),
            api_limit,
            start_limit,
        }
    }
}

fn limiters(config: &RateLimitConfig) -> (Option<Arc<RateLimiter>>, Option<Arc<RateLimiter>>) {
    if !config.enabled {
        return (None, None);
    }
    let api = RateLimiter::new(
        "api",
        config.api_max_requests,
        Duration::from_secs(config.api_window_secs),
        "Too many requests. Please wait before trying again.",
    );
    let start = RateLimiter::new(
        "start",
        config.start_max_requests,
        Duration::from_secs(config.start_window_secs),
        "Too many transaction requests. Please wait before trying again.",
    );
    (Some(Arc::new(api)), Some(Arc::new(start)))
}

impl HttpServer {
    pub fn new(config: &StarterConfig, orchestrator: Arc<Orchestrator>) -> Self {
        let state = AppState { orchestrator };
        let guards = Guards::from_config(config);
        tracing::info!(
            auth = guards.auth.is_some(),
            rate_limit = config.rate_limit.enabled,
            "API guards configured"
        );
        let router = Self::build_router(
            Duration::from_secs(config.server.request_timeout_secs),
            guards,
            state,
        );
        Self { router }
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// Guards run in order: API rate limit, API key, start rate limit.
    #[allow(deprecated)]
    fn build_router(request_timeout: Duration, guards: Guards, state: AppState) -> Router {
        let request_id = HeaderName::from_static(X_REQUEST_ID);

        let mut start = Router::new()
            .route("/api/start/{txid}/{index}", get(handlers::start))
            .route(
                "/api/start/{txid}/{index}/{profile}",
                get(handlers::start_with_profile),
            );
        if let Some(limiter) = guards.start_limit {
            start = start.route_layer(middleware::from_fn_with_state(limiter, rate_limit_middleware));
        }

        let mut api = Router::new()
            .route("/api/test", get(handlers::get_test))
            .route("/api/status", get(handlers::get_status))
            .route("/api/profiles", get(handlers::get_profiles))
            .route("/api/addresses", get(handlers::get_profiles))
            .merge(start);
        if let Some(auth) = guards.auth {
            api = api.route_layer(middleware::from_fn_with_state(auth, api_key_middleware));
        }
        if let Some(limiter) = guards.api_limit {
            api = api.route_layer(middleware::from_fn_with_state(limiter, rate_limit_middleware));
        }

        api.with_state(state).layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(request_id.clone(), MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(request_timeout))
                .layer(PropagateRequestIdLayer::new(request_id)),
        )
    }

    /// Serve until Ctrl+C.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        self.run_until(listener, shutdown_signal()).await
    }

    /// Serve until `shutdown` resolves.
    pub async fn run_until<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Wait for shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received"),
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C, shutting down");
        }
    }
}
