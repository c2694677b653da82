//! Alert email delivery through a managed email-send HTTP API.
//!
//! The webhook policy talks to the `AlertSink` trait; production wires in
//! `MailerClient`, tests and disabled-alert deployments use `NoopAlertSink`.
//! Delivery failures surface as `MailerError` so the call site can log and
//! discard them - an alert that cannot be sent must never fail the webhook.

use async_trait::async_trait;
use rater_core::config::AlertConfig;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum MailerError {
    #[error("mail API rejected send with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("mail transport failure: {0}")]
    Transport(#[from] reqwest::Error),
}

/// A plain-text alert, constructed and dispatched in one motion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Alert {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn send_alert(&self, alert: &Alert) -> Result<(), MailerError>;
}

/// Sink that accepts every alert without sending anything. Used when alerts
/// are disabled and as the default test double.
pub struct NoopAlertSink;

#[async_trait]
impl AlertSink for NoopAlertSink {
    async fn send_alert(&self, _alert: &Alert) -> Result<(), MailerError> {
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct OutboundMessage<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

pub struct MailerClient {
    base_url: String,
    sender: String,
    api_key: SecretString,
    http: Client,
}

impl MailerClient {
    pub fn from_config(config: &AlertConfig) -> Self {
        Self {
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            sender: config.sender.clone(),
            api_key: config.api_key.clone(),
            http: Client::new(),
        }
    }
}

#[async_trait]
impl AlertSink for MailerClient {
    async fn send_alert(&self, alert: &Alert) -> Result<(), MailerError> {
        let url = format!("{}/v1/messages", self.base_url);
        let message = OutboundMessage {
            from: &self.sender,
            to: &alert.to,
            subject: &alert.subject,
            text: &alert.body,
        };

        let response = self
            .http
            .post(&url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&message)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MailerError::Rejected { status: status.as_u16(), body });
        }

        info!(event_name = "mailer.sent", to = %alert.to, subject = %alert.subject, "alert email dispatched");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{Alert, AlertSink, NoopAlertSink, OutboundMessage};

    #[tokio::test]
    async fn noop_sink_accepts_alerts() {
        let alert = Alert {
            to: "alerts@example.com".to_string(),
            subject: "Protosure Alert".to_string(),
            body: "duplicate".to_string(),
        };
        NoopAlertSink.send_alert(&alert).await.expect("noop send should succeed");
    }

    #[test]
    fn outbound_message_carries_fixed_sender_shape() {
        let message = OutboundMessage {
            from: "Protosure Bot <bot@api-demo.protosure.io>",
            to: "alerts@example.com",
            subject: "Protosure Alert",
            text: "body",
        };

        let serialized = serde_json::to_value(&message).expect("serialize");
        assert_eq!(
            serialized,
            json!({
                "from": "Protosure Bot <bot@api-demo.protosure.io>",
                "to": "alerts@example.com",
                "subject": "Protosure Alert",
                "text": "body"
            })
        );
    }
}
