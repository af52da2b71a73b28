//! Explorer and daemon API client.
//!
//! # Responsibilities
//! - Fetch a transaction by id from the block explorer (cached)
//! - Broadcast raw transactions through the daemon API (never cached)
//! - Decode explorer payloads into typed outputs
//!
//! Every call goes through the shared `ResilientClient`, so timeouts, retries
//! and circuit breaking apply uniformly.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::config::UpstreamConfig;
use crate::resilience::{CacheMode, ResilientClient, UpstreamError, UpstreamResponse};

/// Breaker/metrics target name of the block explorer.
pub const EXPLORER_TARGET: &str = "explorer";

/// Breaker/metrics target name of the daemon API.
pub const DAEMON_TARGET: &str = "daemon";

/// Errors from explorer or daemon calls.
#[derive(Debug, Error)]
pub enum ChainError {
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error("unexpected explorer payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl ChainError {
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, ChainError::Upstream(e) if e.is_circuit_open())
    }

    /// The upstream answered 404 for the requested resource.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ChainError::Upstream(e) if e.status() == Some(404))
    }
}

/// Output amount as reported by the explorer: a decimal string or a number.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ExplorerAmount {
    Text(String),
    Number(serde_json::Number),
}

impl ExplorerAmount {
    /// Decimal string with eight fractional digits for numbers, verbatim for text.
    pub fn to_decimal_string(&self) -> String {
        match self {
            ExplorerAmount::Text(text) => text.clone(),
            ExplorerAmount::Number(number) => match number.as_f64() {
                Some(value) => format!("{:.8}", value),
                None => number.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ScriptPubKey {
    #[serde(rename = "type", default)]
    pub script_type: Option<String>,
    #[serde(default)]
    pub addresses: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExplorerOutput {
    pub value: Option<ExplorerAmount>,
    #[serde(rename = "scriptPubKey", default)]
    pub script_pub_key: ScriptPubKey,
}

/// The parts of an explorer transaction the validator reads.
#[derive(Debug, Clone, Deserialize)]
pub struct ExplorerTransaction {
    pub txid: String,
    #[serde(default)]
    pub vout: Vec<ExplorerOutput>,
}

/// Daemon reply to a broadcast.
#[derive(Debug, Clone)]
pub struct BroadcastReply {
    pub payload: Value,
    pub attempts: u32,
}

impl BroadcastReply {
    /// Accepted unless the daemon reports `status: "error"`.
    pub fn is_accepted(&self) -> bool {
        self.payload.get("status").and_then(Value::as_str) != Some("error")
    }
}

/// Client for the explorer and daemon APIs.
#[derive(Clone)]
pub struct ChainClient {
    http: ResilientClient,
    explorer_base: String,
    daemon_base: String,
}

impl ChainClient {
    pub fn new(http: ResilientClient, explorer: &UpstreamConfig, daemon: &UpstreamConfig) -> Self {
        Self {
            http,
            explorer_base: explorer.base_url.trim_end_matches('/').to_string(),
            daemon_base: daemon.base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn http(&self) -> &ResilientClient {
        &self.http
    }

    /// Look up a transaction on the explorer.
    pub async fn fetch_transaction(&self, txid: &str) -> Result<ExplorerTransaction, ChainError> {
        let url = format!("{}/tx/{}", self.explorer_base, txid);
        let response = self
            .http
            .get(EXPLORER_TARGET, &url, CacheMode::ReadThrough)
            .await?;
        tracing::debug!(
            txid = %txid,
            attempts = response.attempts,
            from_cache = response.from_cache,
            "Explorer transaction fetched"
        );
        Ok(serde_json::from_value(response.payload)?)
    }

    /// Broadcast a hex-encoded transaction.
    pub async fn send_raw_transaction(&self, raw_hex: &str) -> Result<BroadcastReply, ChainError> {
        let url = format!("{}/daemon/sendrawtransaction/{}", self.daemon_base, raw_hex);
        let UpstreamResponse {
            payload, attempts, ..
        } = self.http.get(DAEMON_TARGET, &url, CacheMode::Bypass).await?;
        Ok(BroadcastReply { payload, attempts })
    }
}

impl std::fmt::Debug for ChainClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainClient")
            .field("explorer", &self.explorer_base)
            .field("daemon", &self.daemon_base)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_explorer_payload_decoding() {
        let payload = json!({
            "txid": "ab",
            "vout": [
                {
                    "value": "40000.00000000",
                    "scriptPubKey": { "type": "scripthash", "addresses": ["t3abc"] }
                },
                { "value": 12500, "scriptPubKey": { "type": "pubkeyhash" } }
            ]
        });
        let tx: ExplorerTransaction = serde_json::from_value(payload).unwrap();
        assert_eq!(tx.vout.len(), 2);
        assert_eq!(
            tx.vout[0].value.as_ref().unwrap().to_decimal_string(),
            "40000.00000000"
        );
        assert_eq!(tx.vout[0].script_pub_key.addresses, vec!["t3abc".to_string()]);
        assert_eq!(
            tx.vout[1].value.as_ref().unwrap().to_decimal_string(),
            "12500.00000000"
        );
        assert!(tx.vout[1].script_pub_key.addresses.is_empty());
    }

    #[test]
    fn test_missing_txid_is_malformed() {
        let result: Result<ExplorerTransaction, _> = serde_json::from_value(json!({"vout": []}));
        assert!(result.is_err());
    }

    #[test]
    fn test_broadcast_acceptance() {
        let ok = BroadcastReply {
            payload: json!({"status": "success", "data": "ff"}),
            attempts: 1,
        };
        assert!(ok.is_accepted());

        let rejected = BroadcastReply {
            payload: json!({"status": "error", "data": {"message": "bad-txns"}}),
            attempts: 1,
        };
        assert!(!rejected.is_accepted());
    }
}
