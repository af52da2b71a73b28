//! Outcome notifications.
//!
//! Sinks are fire-and-forget: `notify` never blocks the pipeline and never
//! reports failure to it. Delivery problems are logged inside the sink.

pub mod webhook;

use std::net::IpAddr;

use serde_json::Value;

pub use webhook::WebhookNotifier;

/// One start attempt's outcome.
#[derive(Debug, Clone)]
pub struct StartNotification {
    pub txid: String,
    pub output_index: u32,
    pub success: bool,
    pub profile_name: Option<String>,
    /// Broadcast response, rejection details or error description.
    pub payload: Value,
    pub caller_ip: Option<IpAddr>,
}

/// Receives start outcomes.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: StartNotification);
}

/// Writes notifications to the log only.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl NotificationSink for LogNotifier {
    fn notify(&self, notification: StartNotification) {
        tracing::info!(
            txid = %notification.txid,
            index = notification.output_index,
            success = notification.success,
            profile = notification.profile_name.as_deref().unwrap_or("-"),
            caller_ip = ?notification.caller_ip,
            payload = %notification.payload,
            "Start notification"
        );
    }
}
