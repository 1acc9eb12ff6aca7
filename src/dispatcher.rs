//! Notification dispatcher
//!
//! Delivers one notification over one channel to every endpoint resolved for
//! it, concurrently, and records a per-endpoint delivery report.
//!
//! ## Message Flow
//!
//! ```text
//! request → channel available? → row queued → resolve endpoints
//!         → join_all(send with timeout) → report → row sent/failed/no_subscribers
//! ```
//!
//! A failing endpoint never fails the dispatch; it shows up as a failed entry
//! in the report. Push endpoints reported gone are deleted as a side effect.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};

use crate::channels::{PushError, PushPayload, Transports};
use crate::storage::AlertStore;
use crate::storage::schema::{
    Channel, DeliveryReport, DeliveryResult, NewNotification, Notification,
    NotificationSeverity, NotificationStatus, OperatorContact, PushSubscription,
};
use crate::{AlertError, AlertResult};

const DEFAULT_SOURCE: &str = "alert";

/// A request to deliver a notification
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DispatchRequest {
    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub body: String,

    #[serde(default)]
    pub channel: Channel,

    /// Re-deliver an existing notification instead of creating one
    #[serde(default)]
    pub notification_id: Option<i64>,

    #[serde(default)]
    pub severity: NotificationSeverity,

    #[serde(default)]
    pub source: Option<String>,

    #[serde(default)]
    pub related_entity_id: Option<i64>,

    /// Narrows push targets to this operator's subscriptions; supplies the
    /// email address or phone number when `to` is absent
    #[serde(default)]
    pub operator_id: Option<i64>,

    /// Explicit email address or phone number
    #[serde(default)]
    pub to: Option<String>,

    #[serde(default)]
    pub url: Option<String>,

    #[serde(default)]
    pub tag: Option<String>,
}

impl DispatchRequest {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            ..Default::default()
        }
    }

    pub fn on(mut self, channel: Channel) -> Self {
        self.channel = channel;
        self
    }
}

/// Final state of one dispatch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeliveryOutcome {
    pub id: i64,
    pub status: NotificationStatus,
    pub sent: usize,
    pub results: Vec<DeliveryResult>,
}

impl DeliveryOutcome {
    fn from_report(id: i64, status: NotificationStatus, report: DeliveryReport) -> Self {
        Self {
            id,
            status,
            sent: report.sent,
            results: report.results,
        }
    }
}

/// Result of one channel within a broadcast
#[derive(Debug, Clone, Serialize)]
pub struct ChannelOutcome {
    pub channel: Channel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<DeliveryOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Clone)]
pub struct Dispatcher {
    store: Arc<dyn AlertStore>,
    transports: Transports,
    send_timeout: Duration,
}

impl Dispatcher {
    pub fn new(store: Arc<dyn AlertStore>, transports: Transports, send_timeout: Duration) -> Self {
        Self {
            store,
            transports,
            send_timeout,
        }
    }

    pub fn is_available(&self, channel: Channel) -> bool {
        self.transports.is_configured(channel)
    }

    /// VAPID public key browsers need to subscribe
    pub fn push_public_key(&self) -> AlertResult<String> {
        match self.transports.push.public_key() {
            Some(key) if self.is_available(Channel::Push) => Ok(key.to_string()),
            _ => Err(AlertError::Unavailable(Channel::Push)),
        }
    }

    /// Deliver `request` on its channel
    ///
    /// Fails only for an unconfigured channel, an empty title, an unknown
    /// `notification_id` or a storage error. Delivery failures are reported
    /// in the outcome. A retry re-delivers the stored title, message and
    /// channel. Once the row exists it always ends in a terminal status.
    #[instrument(skip(self, request), fields(channel = %request.channel, title = %request.title))]
    pub async fn dispatch(&self, request: DispatchRequest) -> AlertResult<DeliveryOutcome> {
        let request = match request.notification_id {
            Some(id) => {
                let stored = self.notification(id).await?;
                DispatchRequest {
                    title: stored.title,
                    body: stored.message,
                    channel: stored.channel,
                    ..request
                }
            }
            None => request,
        };
        let channel = request.channel;

        if !self.is_available(channel) {
            warn!("{} channel is not configured", channel);
            return Err(AlertError::Unavailable(channel));
        }

        if request.title.trim().is_empty() {
            return Err(AlertError::validation("title is required"));
        }

        let notification = self.open_notification(&request).await?;

        let results = match self.deliver(&request, &notification).await {
            Ok(results) => results,
            Err(e) => {
                self.abandon(notification.id, &e).await;
                return Err(e);
            }
        };

        let report = DeliveryReport::from_results(results);
        let status = report.status();

        self.store
            .complete_notification(notification.id, status, &report, Utc::now())
            .await?
            .ok_or_else(|| AlertError::not_found("notification", notification.id))?;

        info!(
            "notification {} {}: {}/{} delivered",
            notification.id,
            status.as_str(),
            report.sent,
            report.results.len()
        );

        Ok(DeliveryOutcome::from_report(notification.id, status, report))
    }

    /// Dispatch the same request on several channels at once
    ///
    /// Every channel gets its own notification row; a failure on one channel
    /// is reported in its entry and does not affect the others.
    #[instrument(skip(self, request, channels), fields(channels = channels.len()))]
    pub async fn broadcast(
        &self,
        request: DispatchRequest,
        channels: &[Channel],
    ) -> Vec<ChannelOutcome> {
        let attempts = channels.iter().map(|&channel| {
            let request = DispatchRequest {
                channel,
                notification_id: None,
                ..request.clone()
            };
            async move {
                match self.dispatch(request).await {
                    Ok(outcome) => ChannelOutcome {
                        channel,
                        outcome: Some(outcome),
                        error: None,
                    },
                    Err(e) => ChannelOutcome {
                        channel,
                        outcome: None,
                        error: Some(e.to_string()),
                    },
                }
            }
        });

        join_all(attempts).await
    }

    /// Register (or re-key) a push subscription for `owner`
    #[instrument(skip(self, p256dh, auth))]
    pub async fn subscribe(
        &self,
        owner: i64,
        endpoint: &str,
        p256dh: &str,
        auth: &str,
    ) -> AlertResult<PushSubscription> {
        if endpoint.trim().is_empty() || p256dh.is_empty() || auth.is_empty() {
            return Err(AlertError::validation("invalid subscription"));
        }

        let subscription = PushSubscription {
            endpoint: endpoint.to_string(),
            owner,
            p256dh: p256dh.to_string(),
            auth: auth.to_string(),
            created_at: Utc::now(),
        };
        self.store.upsert_subscription(&subscription).await?;

        Ok(subscription)
    }

    /// Remove `owner`'s subscription at `endpoint`; `false` if there was none
    #[instrument(skip(self))]
    pub async fn unsubscribe(&self, owner: i64, endpoint: &str) -> AlertResult<bool> {
        if endpoint.trim().is_empty() {
            return Err(AlertError::validation("endpoint is required"));
        }

        Ok(self.store.remove_subscription(endpoint, owner).await?)
    }

    pub async fn notification(&self, id: i64) -> AlertResult<Notification> {
        self.store
            .get_notification(id)
            .await?
            .ok_or_else(|| AlertError::not_found("notification", id))
    }

    pub async fn recent_notifications(&self, limit: usize) -> AlertResult<Vec<Notification>> {
        Ok(self.store.list_notifications(limit).await?)
    }

    /// Flag notifications as read; returns how many were unread before
    pub async fn mark_read(&self, ids: &[i64]) -> AlertResult<u64> {
        if ids.is_empty() {
            return Err(AlertError::validation("ids[] required"));
        }

        Ok(self.store.mark_notifications_read(ids).await?)
    }

    pub async fn unread_count(&self) -> AlertResult<i64> {
        Ok(self.store.count_unread_notifications().await?)
    }

    async fn open_notification(&self, request: &DispatchRequest) -> AlertResult<Notification> {
        match request.notification_id {
            Some(id) => {
                debug!("re-delivering notification {}", id);
                self.store
                    .requeue_notification(id)
                    .await?
                    .ok_or_else(|| AlertError::not_found("notification", id))
            }
            None => {
                let notification = NewNotification {
                    title: request.title.clone(),
                    message: request.body.clone(),
                    severity: request.severity,
                    source: request
                        .source
                        .clone()
                        .filter(|s| !s.trim().is_empty())
                        .unwrap_or_else(|| DEFAULT_SOURCE.to_string()),
                    related_entity_id: request.related_entity_id,
                    channel: request.channel,
                    created_at: Utc::now(),
                };
                Ok(self.store.create_notification(notification).await?)
            }
        }
    }

    async fn deliver(
        &self,
        request: &DispatchRequest,
        notification: &Notification,
    ) -> AlertResult<Vec<DeliveryResult>> {
        match request.channel {
            Channel::Push => self.deliver_push(request, notification).await,
            Channel::Email => self.deliver_email(request).await,
            Channel::Sms => self.deliver_sms(request).await,
        }
    }

    /// Mark a notification failed after its delivery errored out
    async fn abandon(&self, id: i64, cause: &AlertError) {
        error!("notification {} failed before delivery: {}", id, cause);

        let report = DeliveryReport::aborted(cause.to_string());
        if let Err(e) = self
            .store
            .complete_notification(id, NotificationStatus::Failed, &report, Utc::now())
            .await
        {
            error!("failed to record failure of notification {}: {}", id, e);
        }
    }

    async fn deliver_push(
        &self,
        request: &DispatchRequest,
        notification: &Notification,
    ) -> AlertResult<Vec<DeliveryResult>> {
        let subscriptions = self.store.list_subscriptions(request.operator_id).await?;

        if subscriptions.is_empty() {
            debug!("no push subscriptions to deliver to");
            return Ok(Vec::new());
        }

        let payload = PushPayload {
            title: request.title.clone(),
            body: request.body.clone(),
            url: request.url.clone(),
            tag: request.tag.clone(),
            notification_id: notification.id,
        };

        let sends = subscriptions
            .iter()
            .map(|subscription| self.push_one(subscription, &payload));

        Ok(join_all(sends).await)
    }

    async fn push_one(
        &self,
        subscription: &PushSubscription,
        payload: &PushPayload,
    ) -> DeliveryResult {
        let endpoint = subscription.endpoint.as_str();

        match timeout(
            self.send_timeout,
            self.transports.push.send(subscription, payload),
        )
        .await
        {
            Ok(Ok(())) => DeliveryResult::delivered(endpoint),
            Ok(Err(e @ PushError::Gone(_))) => {
                match self.store.delete_subscription(endpoint).await {
                    Ok(_) => info!("removed dead push subscription {}", endpoint),
                    Err(err) => error!("failed to remove dead subscription {}: {}", endpoint, err),
                }
                DeliveryResult::failed(endpoint, e.to_string())
            }
            Ok(Err(e)) => DeliveryResult::failed(endpoint, e.to_string()),
            Err(_) => DeliveryResult::failed(endpoint, self.timeout_message()),
        }
    }

    async fn deliver_email(&self, request: &DispatchRequest) -> AlertResult<Vec<DeliveryResult>> {
        let Some(to) = self.resolve_target(request, |op| op.email).await? else {
            debug!("no email address to deliver to");
            return Ok(Vec::new());
        };

        let result = match timeout(
            self.send_timeout,
            self.transports
                .email
                .send(&to, &request.title, &request.body),
        )
        .await
        {
            Ok(Ok(())) => DeliveryResult::delivered(to),
            Ok(Err(e)) => DeliveryResult::failed(to, e.to_string()),
            Err(_) => DeliveryResult::failed(to, self.timeout_message()),
        };

        Ok(vec![result])
    }

    async fn deliver_sms(&self, request: &DispatchRequest) -> AlertResult<Vec<DeliveryResult>> {
        let Some(to) = self.resolve_target(request, |op| op.phone).await? else {
            debug!("no phone number to deliver to");
            return Ok(Vec::new());
        };

        let body = if request.body.is_empty() {
            request.title.clone()
        } else {
            format!("{}: {}", request.title, request.body)
        };

        let result = match timeout(self.send_timeout, self.transports.sms.send(&to, &body)).await
        {
            Ok(Ok(())) => DeliveryResult::delivered(to),
            Ok(Err(e)) => DeliveryResult::failed(to, e.to_string()),
            Err(_) => DeliveryResult::failed(to, self.timeout_message()),
        };

        Ok(vec![result])
    }

    /// `to` if given, otherwise the field picked from the operator's contact
    async fn resolve_target(
        &self,
        request: &DispatchRequest,
        pick: impl FnOnce(OperatorContact) -> Option<String>,
    ) -> AlertResult<Option<String>> {
        if let Some(to) = request.to.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            return Ok(Some(to.to_string()));
        }

        let Some(operator_id) = request.operator_id else {
            return Ok(None);
        };

        let contact = self.store.get_operator(operator_id).await?;
        if contact.is_none() {
            warn!("operator {} has no stored contact", operator_id);
        }

        Ok(contact
            .and_then(pick)
            .filter(|target| !target.trim().is_empty()))
    }

    fn timeout_message(&self) -> String {
        format!("timed out after {} ms", self.send_timeout.as_millis())
    }
}
