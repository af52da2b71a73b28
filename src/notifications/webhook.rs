//! Discord-compatible webhook sink.

use std::time::Duration;

use serde_json::{json, Value};

use crate::config::NotificationConfig;
use crate::notifications::{NotificationSink, StartNotification};

const SUCCESS_COLOR: u32 = 0x2ecc71;
const FAILURE_COLOR: u32 = 0xe74c3c;

/// Longest payload rendered into an embed field.
const FIELD_LIMIT: usize = 1000;

/// Posts each notification to a webhook URL on a background task.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    http: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            url: url.into(),
        })
    }

    /// Notifier for the configured webhook, if one is set.
    pub fn from_config(config: &NotificationConfig) -> Result<Option<Self>, reqwest::Error> {
        config
            .webhook_url
            .as_ref()
            .map(|url| Self::new(url.clone(), Duration::from_secs(config.timeout_secs)))
            .transpose()
    }
}

impl NotificationSink for WebhookNotifier {
    fn notify(&self, notification: StartNotification) {
        let body = render_message(&notification);
        let http = self.http.clone();
        let url = self.url.clone();

        tokio::spawn(async move {
            let result = http
                .post(&url)
                .json(&body)
                .send()
                .await
                .and_then(|response| response.error_for_status());
            match result {
                Ok(_) => tracing::debug!(txid = %notification.txid, "Webhook delivered"),
                Err(e) => tracing::warn!(
                    txid = %notification.txid,
                    error = %e,
                    "Webhook delivery failed"
                ),
            }
        });
    }
}

/// Webhook body: a one-line summary plus one embed with the details.
pub fn render_message(notification: &StartNotification) -> Value {
    let verdict = if notification.success {
        "started"
    } else {
        "failed to start"
    };

    let mut payload = notification.payload.to_string();
    if payload.len() > FIELD_LIMIT {
        let mut cut = FIELD_LIMIT;
        while !payload.is_char_boundary(cut) {
            cut -= 1;
        }
        payload.truncate(cut);
        payload.push('…');
    }

    let caller = notification
        .caller_ip
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    json!({
        "content": format!(
            "Node {} for collateral {}:{}",
            verdict, notification.txid, notification.output_index
        ),
        "embeds": [{
            "title": if notification.success { "Start succeeded" } else { "Start failed" },
            "color": if notification.success { SUCCESS_COLOR } else { FAILURE_COLOR },
            "fields": [
                { "name": "Collateral", "value": format!("{}:{}", notification.txid, notification.output_index) },
                { "name": "Profile", "value": notification.profile_name.as_deref().unwrap_or("-"), "inline": true },
                { "name": "Caller", "value": caller, "inline": true },
                { "name": "Response", "value": format!("```{}```", payload) }
            ]
        }]
    })
}
