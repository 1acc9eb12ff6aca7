//! Delivery channel transports
//!
//! Each channel is an opaque send operation behind a trait so the dispatcher
//! can be driven by HTTP providers in production and by fakes in tests.
//!
//! - **push**: Web Push gateway holding the VAPID keys, one POST per subscription
//! - **email**: Resend-style `POST /emails`
//! - **sms**: Twilio-style `Messages.json` form API

pub mod email;
pub mod push;
pub mod sms;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::config::ChannelsConfig;
use crate::storage::schema::{Channel, PushSubscription};

pub use email::ResendEmailTransport;
pub use push::HttpPushTransport;
pub use sms::TwilioSmsTransport;

/// Errors from a single push delivery
#[derive(Debug, Error)]
pub enum PushError {
    /// The push service no longer knows this endpoint (HTTP 404/410)
    #[error("subscription gone (HTTP {0})")]
    Gone(u16),

    #[error("push delivery failed: {0}")]
    Failed(String),
}

/// Errors from an email or SMS provider
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("{0} provider not configured")]
    NotConfigured(Channel),

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("provider rejected message (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },
}

/// Body delivered to a push endpoint
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PushPayload {
    pub title: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    pub notification_id: i64,
}

#[async_trait]
pub trait PushTransport: Send + Sync {
    fn is_configured(&self) -> bool;

    /// VAPID application server key browsers subscribe with
    fn public_key(&self) -> Option<&str> {
        None
    }

    async fn send(
        &self,
        subscription: &PushSubscription,
        payload: &PushPayload,
    ) -> Result<(), PushError>;
}

#[async_trait]
pub trait EmailTransport: Send + Sync {
    fn is_configured(&self) -> bool;

    async fn send(&self, to: &str, subject: &str, text: &str) -> Result<(), ChannelError>;
}

#[async_trait]
pub trait SmsTransport: Send + Sync {
    fn is_configured(&self) -> bool;

    async fn send(&self, to: &str, body: &str) -> Result<(), ChannelError>;
}

/// The three transports the dispatcher delivers through
#[derive(Clone)]
pub struct Transports {
    pub push: Arc<dyn PushTransport>,
    pub email: Arc<dyn EmailTransport>,
    pub sms: Arc<dyn SmsTransport>,
}

impl Transports {
    /// Build the HTTP-backed transports from configuration
    pub fn from_config(config: &ChannelsConfig) -> Result<Self, ChannelError> {
        Ok(Self {
            push: Arc::new(HttpPushTransport::new(&config.push)?),
            email: Arc::new(ResendEmailTransport::new(&config.email)?),
            sms: Arc::new(TwilioSmsTransport::new(&config.sms)?),
        })
    }

    pub fn is_configured(&self, channel: Channel) -> bool {
        match channel {
            Channel::Push => self.push.is_configured(),
            Channel::Email => self.email.is_configured(),
            Channel::Sms => self.sms.is_configured(),
        }
    }
}

/// Shared HTTP client for provider calls; the per-send deadline is enforced
/// by the dispatcher.
fn http_client() -> Result<reqwest::Client, ChannelError> {
    Ok(reqwest::Client::builder()
        .connect_timeout(std::time::Duration::from_secs(5))
        .build()?)
}

/// Read a provider error body without failing the caller
async fn error_body(response: reqwest::Response) -> String {
    response
        .text()
        .await
        .unwrap_or_else(|e| format!("<unreadable body: {e}>"))
}
