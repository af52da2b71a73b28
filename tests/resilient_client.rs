//! Resilient client behavior against a mock upstream.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use fluxnode_starter::config::{CacheConfig, CircuitBreakerConfig, HttpClientConfig};
use fluxnode_starter::resilience::{
    CacheMode, CircuitBreakerRegistry, CircuitState, ResilientClient, ResponseCache,
};

use common::start_programmable_upstream;

fn client(max_retries: u32, threshold: u32) -> ResilientClient {
    let http = HttpClientConfig {
        request_timeout_ms: 2_000,
        max_retries,
        retry_base_delay_ms: 10,
        retry_jitter_ms: 0,
    };
    let cache = Arc::new(ResponseCache::new(&CacheConfig {
        sweep_probability: 0.0,
        ..CacheConfig::default()
    }));
    let breakers = Arc::new(CircuitBreakerRegistry::new(&CircuitBreakerConfig {
        failure_threshold: threshold,
        reset_timeout_ms: 60_000,
    }));
    ResilientClient::new(&http, cache, breakers).unwrap()
}

#[tokio::test]
async fn test_retries_server_errors_with_growing_backoff() {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let upstream = start_programmable_upstream(move |_| {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        async move {
            if n < 3 {
                (503, r#"{"error":"busy"}"#.to_string())
            } else {
                (200, r#"{"status":"success"}"#.to_string())
            }
        }
    })
    .await;

    let client = client(4, 10);
    let url = format!("{}/daemon/ping", upstream.url());
    let response = client.get("daemon", &url, CacheMode::Bypass).await.unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.payload, json!({"status": "success"}));
    assert_eq!(response.attempts, 4);
    assert_eq!(
        response.backoff_delays,
        vec![
            Duration::from_millis(10),
            Duration::from_millis(20),
            Duration::from_millis(40)
        ]
    );
    assert!(response.backoff_delays.windows(2).all(|w| w[1] >= w[0]));
    assert_eq!(upstream.calls(), 4);
}

#[tokio::test]
async fn test_not_found_is_attempted_once() {
    let upstream =
        start_programmable_upstream(|_| async { (404, r#"{"error":"nope"}"#.to_string()) }).await;

    let client = client(5, 10);
    let url = format!("{}/api/tx/missing", upstream.url());
    let err = client.get("explorer", &url, CacheMode::Bypass).await.unwrap_err();

    assert_eq!(err.status(), Some(404));
    assert_eq!(err.attempts(), 1);
    assert!(!err.is_network_error());
    assert_eq!(upstream.calls(), 1);
    assert_eq!(
        client.breakers().get("explorer").state(),
        CircuitState::Closed
    );
}

#[tokio::test]
async fn test_exhausted_retries_report_attempts() {
    let upstream =
        start_programmable_upstream(|_| async { (500, "oops".to_string()) }).await;

    let client = client(3, 10);
    let url = format!("{}/daemon/x", upstream.url());
    let err = client.get("daemon", &url, CacheMode::Bypass).await.unwrap_err();

    assert_eq!(err.status(), Some(500));
    assert_eq!(err.attempts(), 3);
    assert_eq!(upstream.calls(), 3);
}

#[tokio::test]
async fn test_open_circuit_fails_without_io() {
    let upstream =
        start_programmable_upstream(|_| async { (503, "down".to_string()) }).await;

    let client = client(1, 2);
    let url = format!("{}/daemon/x", upstream.url());
    for _ in 0..2 {
        let err = client.get("daemon", &url, CacheMode::Bypass).await.unwrap_err();
        assert!(!err.is_circuit_open());
    }
    assert_eq!(upstream.calls(), 2);

    let err = client.get("daemon", &url, CacheMode::Bypass).await.unwrap_err();
    assert!(err.is_circuit_open());
    assert_eq!(err.attempts(), 0);
    assert_eq!(upstream.calls(), 2);

    // Other targets are unaffected.
    let other = client.get("explorer", &url, CacheMode::Bypass).await.unwrap_err();
    assert!(!other.is_circuit_open());
}

#[tokio::test]
async fn test_get_served_from_cache() {
    let upstream = start_programmable_upstream(|path| async move {
        (200, json!({ "path": path }).to_string())
    })
    .await;

    let client = client(3, 10);
    let url = format!("{}/api/tx/abc", upstream.url());

    let first = client.get("explorer", &url, CacheMode::ReadThrough).await.unwrap();
    assert!(!first.from_cache);
    let second = client.get("explorer", &url, CacheMode::ReadThrough).await.unwrap();
    assert!(second.from_cache);
    assert_eq!(second.attempts, 0);
    assert_eq!(second.payload, first.payload);
    assert_eq!(upstream.calls(), 1);

    let bypass = client.get("explorer", &url, CacheMode::Bypass).await.unwrap();
    assert!(!bypass.from_cache);
    assert_eq!(upstream.calls(), 2);
}

#[tokio::test]
async fn test_failed_responses_not_cached() {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let upstream = start_programmable_upstream(move |_| {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        async move {
            if n == 0 {
                (404, "{}".to_string())
            } else {
                (200, r#"{"ok":true}"#.to_string())
            }
        }
    })
    .await;

    let client = client(1, 10);
    let url = format!("{}/api/tx/later", upstream.url());
    assert!(client.get("explorer", &url, CacheMode::ReadThrough).await.is_err());
    let ok = client.get("explorer", &url, CacheMode::ReadThrough).await.unwrap();
    assert!(!ok.from_cache);
    assert_eq!(client.cache().len(), 1);
}

#[tokio::test]
async fn test_post_sends_json_body() {
    let upstream =
        start_programmable_upstream(|_| async { (200, r#"{"accepted":true}"#.to_string()) }).await;

    let client = client(1, 10);
    let url = format!("{}/hook", upstream.url());
    let response = client
        .post("webhook", &url, &json!({"content": "hi"}))
        .await
        .unwrap();
    assert_eq!(response.payload["accepted"], true);
    assert!(client.cache().is_empty());
}

#[tokio::test]
async fn test_connection_refused_is_network_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = client(2, 10);
    let url = format!("http://{}/x", addr);
    let err = client.get("daemon", &url, CacheMode::Bypass).await.unwrap_err();
    assert!(err.is_network_error());
    assert_eq!(err.status(), None);
    assert_eq!(err.attempts(), 2);
}
