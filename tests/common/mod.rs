//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use fluxnode_starter::blockchain::{ChainClient, TransactionSigner};
use fluxnode_starter::config::{ProfileConfig, StarterConfig, UpstreamConfig};
use fluxnode_starter::notifications::{NotificationSink, StartNotification};
use fluxnode_starter::profiles::ProfileStore;
use fluxnode_starter::resilience::{CircuitBreakerRegistry, ResilientClient, ResponseCache};
use fluxnode_starter::Orchestrator;

/// Private key 1, compressed WIF.
pub const COLLATERAL_WIF: &str = "KwDiBf89QgGbjEhKnhXJuH7LrciVrZi3qYjgd9M7rFU73sVHnoWn";
/// Private key 1, uncompressed WIF.
pub const OPERATOR_WIF: &str = "5HpHagT65TZzG1PH3CSu63k8DbpvD8s5ip4nEB3kEsreAnchuDf";

pub const COLLATERAL_TXID: &str =
    "4f5b6b0cde0a8b3e1dd1f2f7f0e3b0f7c6f2a0b5e1d7c9a8b6e4f3d2c1b0a9f8";

/// A mock HTTP upstream that answers through a closure.
pub struct MockUpstream {
    pub addr: SocketAddr,
    calls: Arc<AtomicUsize>,
    paths: Arc<Mutex<Vec<String>>>,
}

impl MockUpstream {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Request paths received so far, in order.
    pub fn paths(&self) -> Vec<String> {
        self.paths.lock().unwrap().clone()
    }

    pub fn calls_to(&self, prefix: &str) -> usize {
        self.paths().iter().filter(|p| p.starts_with(prefix)).count()
    }
}

/// Start a programmable mock upstream on an ephemeral port.
///
/// The closure receives the request path and returns status and body.
pub async fn start_programmable_upstream<F, Fut>(f: F) -> MockUpstream
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let paths = Arc::new(Mutex::new(Vec::new()));
    let f = Arc::new(f);

    let (task_calls, task_paths) = (calls.clone(), paths.clone());
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    let calls = task_calls.clone();
                    let paths = task_paths.clone();
                    tokio::spawn(async move {
                        let Some(path) = read_request_path(&mut socket).await else {
                            return;
                        };
                        calls.fetch_add(1, Ordering::SeqCst);
                        paths.lock().unwrap().push(path.clone());

                        let (status, body) = f(path).await;
                        let response = format!(
                            "HTTP/1.1 {} Mock\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    MockUpstream { addr, calls, paths }
}

/// Read the whole request and return its path.
async fn read_request_path(socket: &mut tokio::net::TcpStream) -> Option<String> {
    let mut data = Vec::new();
    let mut buf = [0u8; 4096];
    let head_end = loop {
        if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        let n = socket.read(&mut buf).await.ok()?;
        if n == 0 {
            return None;
        }
        data.extend_from_slice(&buf[..n]);
    };

    let head = String::from_utf8_lossy(&data[..head_end]).to_string();
    let content_length = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);
    while data.len() < head_end + content_length {
        let n = socket.read(&mut buf).await.ok()?;
        if n == 0 {
            break;
        }
        data.extend_from_slice(&buf[..n]);
    }

    head.lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .map(str::to_string)
}

/// Explorer payload with a single output.
pub fn explorer_tx(txid: &str, value: Value, script_type: &str, address: &str) -> String {
    json!({
        "txid": txid,
        "vout": [{
            "value": value,
            "scriptPubKey": { "type": script_type, "addresses": [address] }
        }]
    })
    .to_string()
}

pub fn profile(name: &str, address: &str) -> ProfileConfig {
    ProfileConfig {
        name: name.to_string(),
        collateral_address: address.to_string(),
        node_operator_private_key: OPERATOR_WIF.to_string(),
        collateral_private_key: COLLATERAL_WIF.to_string(),
        redeem_script: "5221".to_string(),
    }
}

/// Configuration pointed at mock upstreams with fast retries.
pub fn test_config(upstream: &str, profiles: Vec<ProfileConfig>) -> StarterConfig {
    let mut config = StarterConfig::with_profiles(profiles);
    config.explorer = UpstreamConfig::new(format!("{}/api", upstream));
    config.daemon = UpstreamConfig::new(upstream);
    config.http.request_timeout_ms = 2_000;
    config.http.retry_base_delay_ms = 5;
    config.http.retry_jitter_ms = 0;
    config.cache.sweep_probability = 0.0;
    config
}

/// Notification sink that keeps everything it receives.
#[derive(Default)]
pub struct RecordingSink {
    received: Mutex<Vec<StartNotification>>,
}

impl RecordingSink {
    pub fn received(&self) -> Vec<StartNotification> {
        self.received.lock().unwrap().clone()
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&self, notification: StartNotification) {
        self.received.lock().unwrap().push(notification);
    }
}

/// Orchestrator built from `config` with the given signer and sink.
pub fn orchestrator_with(
    config: &StarterConfig,
    signer: Arc<dyn TransactionSigner>,
    sink: Arc<dyn NotificationSink>,
) -> Orchestrator {
    let cache = Arc::new(ResponseCache::new(&config.cache));
    let breakers = Arc::new(CircuitBreakerRegistry::new(&config.circuit_breaker));
    let http = ResilientClient::new(&config.http, cache, breakers).unwrap();
    let chain = ChainClient::new(http, &config.explorer, &config.daemon);
    let profiles = Arc::new(ProfileStore::from_config(&config.profiles).unwrap());
    Orchestrator::new(chain, profiles, signer, sink)
}
