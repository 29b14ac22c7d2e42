//! Mail delivery.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info};

use super::error::NotificationError;

/// Delivers one message to a list of recipients.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(
        &self,
        sender: &str,
        recipients: &[String],
        subject: &str,
        body: &str,
    ) -> Result<(), NotificationError>;
}

/// Writes messages to the log instead of delivering them.
///
/// Used when no mail relay is configured.
#[derive(Debug, Default, Clone)]
pub struct LogMailTransport;

#[async_trait]
impl MailTransport for LogMailTransport {
    async fn send(
        &self,
        sender: &str,
        recipients: &[String],
        subject: &str,
        body: &str,
    ) -> Result<(), NotificationError> {
        info!(
            "[mail] from={} to={} subject={:?}",
            sender,
            recipients.join(","),
            subject
        );
        debug!("[mail] body: {}", body);
        Ok(())
    }
}

#[derive(Serialize)]
struct RelayMessage<'a> {
    from: &'a str,
    to: &'a [String],
    subject: &'a str,
    body: &'a str,
}

/// Posts messages as JSON to an HTTP mail relay.
#[derive(Clone)]
pub struct HttpMailRelay {
    client: Client,
    url: String,
}

impl HttpMailRelay {
    pub fn new(url: impl Into<String>, timeout_sec: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_sec))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl MailTransport for HttpMailRelay {
    async fn send(
        &self,
        sender: &str,
        recipients: &[String],
        subject: &str,
        body: &str,
    ) -> Result<(), NotificationError> {
        let message = RelayMessage {
            from: sender,
            to: recipients,
            subject,
            body,
        };

        let response = self
            .client
            .post(&self.url)
            .json(&message)
            .send()
            .await
            .map_err(|e| NotificationError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(NotificationError::Transport(format!(
                "mail relay returned HTTP {}",
                response.status()
            )));
        }
        debug!("Relayed mail to {} recipients", recipients.len());
        Ok(())
    }
}
