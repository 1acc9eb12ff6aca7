use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::json;
use tracing::{debug, instrument, warn};

use super::{ChannelError, PushError, PushPayload, PushTransport, error_body, http_client};
use crate::config::PushConfig;
use crate::storage::schema::PushSubscription;

/// Hands push messages to a Web Push gateway
///
/// The gateway holds the VAPID private key, encrypts the payload for the
/// subscription and relays it to the browser's push service. The subscription
/// keys only ever travel to the gateway, never to the subscription endpoint.
#[derive(Debug, Clone)]
pub struct HttpPushTransport {
    client: Client,
    gateway_url: Option<String>,
    gateway_token: Option<String>,
    vapid_public_key: Option<String>,
    ttl_secs: u32,
}

impl HttpPushTransport {
    pub fn new(config: &PushConfig) -> Result<Self, ChannelError> {
        Ok(Self {
            client: http_client()?,
            gateway_url: non_blank(&config.gateway_url),
            gateway_token: non_blank(&config.gateway_token),
            vapid_public_key: non_blank(&config.vapid_public_key),
            ttl_secs: config.ttl_secs,
        })
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[async_trait]
impl PushTransport for HttpPushTransport {
    fn is_configured(&self) -> bool {
        self.gateway_url.is_some() && self.vapid_public_key.is_some()
    }

    fn public_key(&self) -> Option<&str> {
        self.vapid_public_key.as_deref()
    }

    #[instrument(skip_all, fields(endpoint = %subscription.endpoint))]
    async fn send(
        &self,
        subscription: &PushSubscription,
        payload: &PushPayload,
    ) -> Result<(), PushError> {
        let (Some(gateway_url), Some(_)) = (&self.gateway_url, &self.vapid_public_key) else {
            return Err(PushError::Failed("push gateway not configured".to_string()));
        };

        let mut request = self.client.post(gateway_url).json(&json!({
            "subscription": {
                "endpoint": subscription.endpoint,
                "keys": {
                    "p256dh": subscription.p256dh,
                    "auth": subscription.auth,
                },
            },
            "payload": payload,
            "ttl": self.ttl_secs,
        }));
        if let Some(token) = &self.gateway_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| PushError::Failed(e.to_string()))?;

        let status = response.status();
        match status {
            s if s.is_success() => {
                debug!("push accepted by gateway");
                Ok(())
            }
            StatusCode::NOT_FOUND | StatusCode::GONE => {
                warn!("push endpoint gone ({})", status);
                Err(PushError::Gone(status.as_u16()))
            }
            _ => Err(PushError::Failed(format!(
                "push gateway returned {status}: {}",
                error_body(response).await
            ))),
        }
    }
}
