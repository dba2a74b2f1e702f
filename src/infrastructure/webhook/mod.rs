use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

pub const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("webhook client error: {0}")]
    Client(String),
    #[error("webhook request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("webhook {url} responded with {status}")]
    Status { url: String, status: u16 },
}

/// Posts job outcomes to caller-supplied URLs.
#[derive(Clone)]
pub struct WebhookNotifier {
    client: Client,
}

impl WebhookNotifier {
    pub fn new() -> Result<Self, NotifyError> {
        Self::with_timeout(WEBHOOK_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotifyError::Client(e.to_string()))?;
        Ok(Self { client })
    }

    pub async fn notify<T: Serialize + ?Sized>(&self, url: &str, payload: &T) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(url)
            .json(payload)
            .send()
            .await
            .map_err(|source| NotifyError::Request {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        info!("📨 Webhook delivered to {} ({})", url, status);
        Ok(())
    }
}
