use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::{info, instrument};

use super::{ChannelError, EmailTransport, error_body, http_client};
use crate::config::EmailConfig;
use crate::storage::schema::Channel;

/// Resend-style email provider
#[derive(Debug, Clone)]
pub struct ResendEmailTransport {
    client: Client,
    api_key: Option<String>,
    from: Option<String>,
    base_url: String,
}

impl ResendEmailTransport {
    pub fn new(config: &EmailConfig) -> Result<Self, ChannelError> {
        Ok(Self {
            client: http_client()?,
            api_key: config.api_key.clone(),
            from: config.from.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl EmailTransport for ResendEmailTransport {
    fn is_configured(&self) -> bool {
        self.api_key.is_some() && self.from.is_some()
    }

    #[instrument(skip(self, text))]
    async fn send(&self, to: &str, subject: &str, text: &str) -> Result<(), ChannelError> {
        let (Some(api_key), Some(from)) = (&self.api_key, &self.from) else {
            return Err(ChannelError::NotConfigured(Channel::Email));
        };

        let response = self
            .client
            .post(format!("{}/emails", self.base_url))
            .bearer_auth(api_key)
            .json(&json!({
                "from": from,
                "to": [to],
                "subject": subject,
                "text": text,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChannelError::Rejected {
                status: status.as_u16(),
                body: error_body(response).await,
            });
        }

        info!("email accepted by provider");
        Ok(())
    }
}
