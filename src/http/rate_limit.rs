//! Per-IP rate limiting.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use dashmap::DashMap;
use serde_json::json;

use crate::observability::metrics;

/// Idle buckets older than this many windows are dropped on sweep.
const IDLE_WINDOWS: u32 = 2;

/// Tracked callers above which a sweep runs.
const SWEEP_THRESHOLD: usize = 10_000;

/// A simple token bucket.
#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(capacity: f64, now: Instant) -> Self {
        Self {
            tokens: capacity,
            last_update: now,
        }
    }

    fn try_acquire(&mut self, capacity: f64, refill_per_sec: f64, now: Instant) -> bool {
        let elapsed = now.duration_since(self.last_update).as_secs_f64();
        self.tokens = (self.tokens + elapsed * refill_per_sec).min(capacity);
        self.last_update = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Allows `max_requests` per `window` for each caller IP, refilled evenly.
#[derive(Debug)]
pub struct RateLimiter {
    name: &'static str,
    buckets: DashMap<IpAddr, TokenBucket>,
    capacity: f64,
    refill_per_sec: f64,
    window: Duration,
    message: &'static str,
}

impl RateLimiter {
    pub fn new(name: &'static str, max_requests: u32, window: Duration, message: &'static str) -> Self {
        let capacity = f64::from(max_requests.max(1));
        Self {
            name,
            buckets: DashMap::new(),
            capacity,
            refill_per_sec: capacity / window.as_secs_f64().max(1.0),
            window,
            message,
        }
    }

    pub fn check(&self, ip: IpAddr) -> bool {
        self.check_at(ip, Instant::now())
    }

    fn check_at(&self, ip: IpAddr, now: Instant) -> bool {
        let allowed = self
            .buckets
            .entry(ip)
            .or_insert_with(|| TokenBucket::new(self.capacity, now))
            .try_acquire(self.capacity, self.refill_per_sec, now);

        if self.buckets.len() > SWEEP_THRESHOLD {
            self.sweep(now);
        }
        allowed
    }

    fn sweep(&self, now: Instant) {
        let idle = self.window * IDLE_WINDOWS;
        self.buckets
            .retain(|_, bucket| now.duration_since(bucket.last_update) < idle);
    }

    pub fn tracked(&self) -> usize {
        self.buckets.len()
    }
}

/// Middleware that answers 429 once the caller's bucket is empty.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if limiter.check(addr.ip()) {
        return next.run(request).await;
    }

    tracing::warn!(
        limiter = limiter.name,
        caller_ip = %addr.ip(),
        path = %request.uri().path(),
        "Rate limit exceeded"
    );
    metrics::record_refused_request("rate_limited");
    (
        StatusCode::TOO_MANY_REQUESTS,
        Json(json!({ "status": "error", "error": limiter.message })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(last: u8) -> IpAddr {
        IpAddr::from([192, 0, 2, last])
    }

    #[test]
    fn test_limits_each_ip_separately() {
        let limiter = RateLimiter::new("start", 2, Duration::from_secs(300), "slow down");
        let now = Instant::now();

        assert!(limiter.check_at(ip(1), now));
        assert!(limiter.check_at(ip(1), now));
        assert!(!limiter.check_at(ip(1), now));
        assert!(limiter.check_at(ip(2), now));
        assert_eq!(limiter.tracked(), 2);
    }

    #[test]
    fn test_refills_over_window() {
        let limiter = RateLimiter::new("api", 10, Duration::from_secs(100), "slow down");
        let now = Instant::now();
        for _ in 0..10 {
            assert!(limiter.check_at(ip(1), now));
        }
        assert!(!limiter.check_at(ip(1), now));

        // One token every ten seconds.
        assert!(!limiter.check_at(ip(1), now + Duration::from_secs(5)));
        assert!(limiter.check_at(ip(1), now + Duration::from_secs(11)));
    }

    #[test]
    fn test_sweep_drops_idle_buckets() {
        let limiter = RateLimiter::new("api", 1, Duration::from_secs(10), "slow down");
        let now = Instant::now();
        limiter.check_at(ip(1), now);
        limiter.check_at(ip(2), now + Duration::from_secs(25));

        limiter.sweep(now + Duration::from_secs(25));
        assert_eq!(limiter.tracked(), 1);
    }
}
