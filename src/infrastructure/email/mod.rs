//! Outbound mail.
//!
//! `LogMailer` writes messages to the log (development default);
//! `HttpMailer` posts them as JSON to a transactional mail API using the
//! `email.api_key` credential.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::EmailSettings;
use crate::domain::{credential_keys, SecretProvider};

/// Mail errors
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("mail provider is not configured: {0}")]
    NotConfigured(String),

    #[error("mail request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("mail provider returned {0}")]
    Rejected(u16),
}

/// One plain-text message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub text: String,
}

/// Sends mail.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError>;
}

/// Logs messages instead of sending them.
#[derive(Debug, Default, Clone)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        tracing::info!(
            to = %message.to,
            subject = %message.subject,
            "Email (log provider): {}",
            message.text
        );
        Ok(())
    }
}

#[derive(Serialize)]
struct OutboundMail<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

/// Posts messages to an HTTP mail API.
pub struct HttpMailer {
    http: reqwest::Client,
    endpoint: String,
    sender: String,
    secrets: Arc<dyn SecretProvider>,
}

impl HttpMailer {
    pub fn new(
        http: reqwest::Client,
        endpoint: impl Into<String>,
        sender: impl Into<String>,
        secrets: Arc<dyn SecretProvider>,
    ) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
            sender: sender.into(),
            secrets,
        }
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        let api_key = self
            .secrets
            .secret(credential_keys::EMAIL_API_KEY)
            .await
            .map_err(|e| MailError::NotConfigured(e.to_string()))?;

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&OutboundMail {
                from: &self.sender,
                to: &message.to,
                subject: &message.subject,
                text: &message.text,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(MailError::Rejected(response.status().as_u16()));
        }

        tracing::debug!(to = %message.to, "Email sent");
        Ok(())
    }
}

/// Build the mailer selected by `email.provider`.
pub fn build_mailer(
    settings: &EmailSettings,
    http: reqwest::Client,
    secrets: Arc<dyn SecretProvider>,
) -> Arc<dyn Mailer> {
    match (settings.provider.as_str(), settings.endpoint.as_deref()) {
        ("http", Some(endpoint)) => Arc::new(HttpMailer::new(
            http,
            endpoint,
            settings.sender.clone(),
            secrets,
        )),
        ("http", None) => {
            tracing::warn!("email.provider is http but email.endpoint is unset; logging mail instead");
            Arc::new(LogMailer)
        }
        _ => Arc::new(LogMailer),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_mailer_accepts_everything() {
        let message = EmailMessage {
            to: "customer@example.com".to_string(),
            subject: "Your order".to_string(),
            text: "Thanks".to_string(),
        };

        assert!(LogMailer.send(&message).await.is_ok());
    }
}
