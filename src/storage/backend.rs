//! Alert store trait definition
//!
//! This module defines the `AlertStore` trait that the evaluator, the
//! dispatcher and the HTTP layer are written against.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::error::StorageResult;
use super::schema::{
    AckedBreach, Breach, BreachFilter, DeliveryReport, NewBreach, NewNotification, Notification,
    NotificationStatus, OperatorContact, PushSubscription, Threshold,
};
use crate::Metric;

/// Health status of the storage backend
#[derive(Debug, Clone)]
pub struct HealthStatus {
    /// Is the backend operational?
    pub healthy: bool,

    /// Human-readable status message
    pub message: String,

    /// Additional backend-specific metadata
    pub metadata: HashMap<String, String>,
}

/// Persistent state of the alerting subsystem
///
/// Every mutation that has a race-sensitive precondition (the breach dedup
/// window, acknowledging an active breach) is a single conditional statement
/// in the implementation, so concurrent callers cannot both succeed.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync`; one store is shared by the
/// evaluator actor and every HTTP handler.
#[async_trait]
pub trait AlertStore: Send + Sync {
    /// All thresholds, ordered by metric name
    async fn list_thresholds(&self) -> StorageResult<Vec<Threshold>>;

    async fn get_threshold(&self, metric: Metric) -> StorageResult<Option<Threshold>>;

    /// Insert or replace the bands for `metric`
    ///
    /// Callers validate `warn < critical` first; the schema enforces it again.
    async fn upsert_threshold(
        &self,
        metric: Metric,
        warn: f64,
        critical: f64,
        updated_at: DateTime<Utc>,
    ) -> StorageResult<Threshold>;

    /// Record `breach` unless one with the same metric and severity was
    /// created at or after `window_start`
    ///
    /// Returns `None` when the insert was suppressed. The existence check and
    /// the insert happen in one statement.
    async fn insert_breach_unless_recent(
        &self,
        breach: NewBreach,
        window_start: DateTime<Utc>,
    ) -> StorageResult<Option<Breach>>;

    /// Newest breaches first, at most `limit`
    async fn list_breaches(&self, filter: BreachFilter, limit: usize)
    -> StorageResult<Vec<Breach>>;

    async fn get_breach(&self, id: i64) -> StorageResult<Option<Breach>>;

    /// Mark an active breach acknowledged
    ///
    /// Returns `None` if the breach does not exist or was already acknowledged.
    async fn ack_breach(
        &self,
        id: i64,
        actor: i64,
        acked_at: DateTime<Utc>,
    ) -> StorageResult<Option<AckedBreach>>;

    /// Create a notification row in the `Queued` state
    async fn create_notification(&self, notification: NewNotification)
    -> StorageResult<Notification>;

    /// Put an existing notification back into `Queued`, clearing any
    /// previous delivery report
    async fn requeue_notification(&self, id: i64) -> StorageResult<Option<Notification>>;

    /// Move a notification to its terminal status and attach the report
    async fn complete_notification(
        &self,
        id: i64,
        status: NotificationStatus,
        report: &DeliveryReport,
        sent_at: DateTime<Utc>,
    ) -> StorageResult<Option<Notification>>;

    async fn get_notification(&self, id: i64) -> StorageResult<Option<Notification>>;

    /// Newest notifications first, at most `limit`
    async fn list_notifications(&self, limit: usize) -> StorageResult<Vec<Notification>>;

    /// Flag the given notifications as read; returns how many were unread
    async fn mark_notifications_read(&self, ids: &[i64]) -> StorageResult<u64>;

    async fn count_unread_notifications(&self) -> StorageResult<i64>;

    /// Insert or replace a subscription keyed by endpoint
    async fn upsert_subscription(&self, subscription: &PushSubscription) -> StorageResult<()>;

    /// Remove `endpoint` if it belongs to `owner`
    async fn remove_subscription(&self, endpoint: &str, owner: i64) -> StorageResult<bool>;

    /// Remove `endpoint` regardless of owner (the push service reported it gone)
    async fn delete_subscription(&self, endpoint: &str) -> StorageResult<bool>;

    /// All subscriptions, or only those of `owner`
    async fn list_subscriptions(&self, owner: Option<i64>)
    -> StorageResult<Vec<PushSubscription>>;

    async fn upsert_operator(&self, operator: &OperatorContact) -> StorageResult<()>;

    async fn get_operator(&self, id: i64) -> StorageResult<Option<OperatorContact>>;

    /// Check backend health
    ///
    /// Performs a lightweight operation to verify the backend is operational.
    async fn health_check(&self) -> StorageResult<HealthStatus>;

    /// Human-readable row counts, for the health endpoint and startup logs
    async fn get_stats(&self) -> StorageResult<String>;

    /// Close the backend and release resources
    async fn close(&self) -> StorageResult<()>;
}
