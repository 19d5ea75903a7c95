use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Fully rendered message ready for the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundEmail {
    pub to: String,
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderReceipt {
    pub message_id: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("provider rejected message with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("provider transport failure: {0}")]
    Transport(String),
    #[error("provider response malformed: {0}")]
    Malformed(String),
}

/// Outbound email transport.
#[async_trait]
pub trait EmailProvider: Send + Sync {
    async fn send(&self, email: OutboundEmail) -> Result<ProviderReceipt, ProviderError>;
}

/// JSON-over-HTTP provider (Resend-compatible `POST /emails`).
#[derive(Debug, Clone)]
pub struct HttpEmailProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    from: String,
}

#[derive(Serialize)]
struct SendEmailBody<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    text: &'a str,
    html: &'a str,
}

#[derive(Deserialize)]
struct SendEmailResponse {
    id: String,
}

impl HttpEmailProvider {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        from: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            from: from.into(),
        }
    }
}

#[async_trait]
impl EmailProvider for HttpEmailProvider {
    async fn send(&self, email: OutboundEmail) -> Result<ProviderReceipt, ProviderError> {
        let body = SendEmailBody {
            from: &self.from,
            to: [email.to.as_str()],
            subject: &email.subject,
            text: &email.text_body,
            html: &email.html_body,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| ProviderError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: SendEmailResponse = response
            .json()
            .await
            .map_err(|err| ProviderError::Malformed(err.to_string()))?;
        Ok(ProviderReceipt {
            message_id: parsed.id,
        })
    }
}

/// Writes messages to the log instead of sending them. Used when no API key is configured.
#[derive(Debug, Clone, Default)]
pub struct LogEmailProvider;

#[async_trait]
impl EmailProvider for LogEmailProvider {
    async fn send(&self, email: OutboundEmail) -> Result<ProviderReceipt, ProviderError> {
        let message_id = format!("log-{}", uuid::Uuid::new_v4());
        info!(
            to = %email.to,
            subject = %email.subject,
            message_id = %message_id,
            "email delivery skipped (log-only provider)"
        );
        Ok(ProviderReceipt { message_id })
    }
}
