use async_trait::async_trait;
use reqwest::Client;
use tracing::{info, instrument};

use super::{ChannelError, SmsTransport, error_body, http_client};
use crate::config::SmsConfig;
use crate::storage::schema::Channel;

/// Twilio-style SMS provider
#[derive(Debug, Clone)]
pub struct TwilioSmsTransport {
    client: Client,
    account_sid: Option<String>,
    auth_token: Option<String>,
    from_number: Option<String>,
    base_url: String,
}

impl TwilioSmsTransport {
    pub fn new(config: &SmsConfig) -> Result<Self, ChannelError> {
        Ok(Self {
            client: http_client()?,
            account_sid: config.account_sid.clone(),
            auth_token: config.auth_token.clone(),
            from_number: config.from_number.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl SmsTransport for TwilioSmsTransport {
    fn is_configured(&self) -> bool {
        self.account_sid.is_some() && self.auth_token.is_some() && self.from_number.is_some()
    }

    #[instrument(skip(self, body))]
    async fn send(&self, to: &str, body: &str) -> Result<(), ChannelError> {
        let (Some(sid), Some(token), Some(from)) =
            (&self.account_sid, &self.auth_token, &self.from_number)
        else {
            return Err(ChannelError::NotConfigured(Channel::Sms));
        };

        let response = self
            .client
            .post(format!(
                "{}/2010-04-01/Accounts/{}/Messages.json",
                self.base_url, sid
            ))
            .basic_auth(sid, Some(token))
            .form(&[("From", from.as_str()), ("To", to), ("Body", body)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChannelError::Rejected {
                status: status.as_u16(),
                body: error_body(response).await,
            });
        }

        info!("sms accepted by provider");
        Ok(())
    }
}
