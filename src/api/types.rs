//! Request and response bodies of the HTTP API

use serde::{Deserialize, Serialize};

use crate::dispatcher::DispatchRequest;
use crate::storage::schema::{BreachFilter, Channel};

/// Response for GET /api/v1/health
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub storage: String,
    pub evaluator: bool,
}

/// Body of PUT /api/v1/thresholds/:metric
///
/// Both fields are optional at the parsing level so a missing value is a
/// validation error rather than a body rejection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ThresholdUpdate {
    pub warn: Option<f64>,
    pub critical: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BreachQuery {
    pub status: Option<String>,
}

impl BreachQuery {
    /// `active`, `all` or absent; anything else is `None`
    pub fn filter(&self) -> Option<BreachFilter> {
        match self.status.as_deref().map(str::trim) {
            None | Some("") | Some("all") => Some(BreachFilter::All),
            Some("active") => Some(BreachFilter::Active),
            Some(_) => None,
        }
    }
}

/// Body of POST /api/v1/notifications/notify
#[derive(Debug, Clone, Deserialize)]
pub struct NotifyRequest {
    #[serde(flatten)]
    pub request: DispatchRequest,

    /// Channels to deliver on; all of them when empty
    #[serde(default)]
    pub channels: Vec<Channel>,
}

impl NotifyRequest {
    pub fn channels(&self) -> Vec<Channel> {
        if self.channels.is_empty() {
            return Channel::ALL.to_vec();
        }

        let mut channels = Vec::with_capacity(self.channels.len());
        for channel in &self.channels {
            if !channels.contains(channel) {
                channels.push(*channel);
            }
        }
        channels
    }
}

/// Body of POST /api/v1/notifications/mark-read
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MarkReadRequest {
    #[serde(default)]
    pub ids: Vec<i64>,
}

pub const DEFAULT_LIST_LIMIT: usize = 20;
pub const MAX_LIST_LIMIT: usize = 100;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    pub limit: Option<usize>,
}

impl ListQuery {
    pub fn limit(&self) -> usize {
        self.limit
            .unwrap_or(DEFAULT_LIST_LIMIT)
            .clamp(1, MAX_LIST_LIMIT)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionKeys {
    pub p256dh: String,
    pub auth: String,
}

/// Body of POST /api/v1/subscriptions, as produced by the browser Push API
#[derive(Debug, Clone, Deserialize)]
pub struct SubscribeRequest {
    pub endpoint: String,
    pub keys: SubscriptionKeys,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UnsubscribeRequest {
    pub endpoint: String,
}
