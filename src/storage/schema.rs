//! Stored records for thresholds, breaches, notifications and push subscriptions
//!
//! Enum columns are persisted as their snake_case names; timestamps as unix
//! milliseconds. The delivery report of a notification is kept as a JSON
//! document since it is only ever read back whole.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Metric;

/// Warn and critical bands for one metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    pub metric: Metric,
    pub warn: f64,
    pub critical: f64,
    pub updated_at: DateTime<Utc>,
}

/// Severity of a threshold breach
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreachSeverity {
    Warn,
    Critical,
}

impl BreachSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreachSeverity::Warn => "warn",
            BreachSeverity::Critical => "critical",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "warn" => Some(BreachSeverity::Warn),
            "critical" => Some(BreachSeverity::Critical),
            _ => None,
        }
    }
}

impl std::fmt::Display for BreachSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recorded threshold crossing
///
/// `acked_by` and `acked_at` are either both set or both empty; a breach is
/// active until acknowledged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Breach {
    pub id: i64,
    pub metric: Metric,
    pub value: f64,
    pub severity: BreachSeverity,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub acked_by: Option<i64>,
    pub acked_at: Option<DateTime<Utc>>,
}

impl Breach {
    pub fn is_active(&self) -> bool {
        self.acked_at.is_none()
    }
}

/// A breach about to be recorded
#[derive(Debug, Clone)]
pub struct NewBreach {
    pub metric: Metric,
    pub value: f64,
    pub severity: BreachSeverity,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// Result of a successful acknowledgement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AckedBreach {
    pub id: i64,
    pub metric: Metric,
    pub severity: BreachSeverity,
    pub acked_by: i64,
    pub acked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BreachFilter {
    #[default]
    All,
    Active,
}

/// Severity attached to an operator notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationSeverity {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl NotificationSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationSeverity::Low => "low",
            NotificationSeverity::Medium => "medium",
            NotificationSeverity::High => "high",
            NotificationSeverity::Critical => "critical",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(NotificationSeverity::Low),
            "medium" => Some(NotificationSeverity::Medium),
            "high" => Some(NotificationSeverity::High),
            "critical" => Some(NotificationSeverity::Critical),
            _ => None,
        }
    }
}

impl From<BreachSeverity> for NotificationSeverity {
    fn from(severity: BreachSeverity) -> Self {
        match severity {
            BreachSeverity::Warn => NotificationSeverity::High,
            BreachSeverity::Critical => NotificationSeverity::Critical,
        }
    }
}

/// Delivery channel for a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    #[default]
    Push,
    Email,
    Sms,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Push, Channel::Email, Channel::Sms];

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Push => "push",
            Channel::Email => "email",
            Channel::Sms => "sms",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "push" => Some(Channel::Push),
            "email" => Some(Channel::Email),
            "sms" => Some(Channel::Sms),
            _ => None,
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a notification row
///
/// Rows are created `Queued` and move to exactly one terminal status once
/// every delivery attempt has settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    Queued,
    Sent,
    Failed,
    NoSubscribers,
}

impl NotificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationStatus::Queued => "queued",
            NotificationStatus::Sent => "sent",
            NotificationStatus::Failed => "failed",
            NotificationStatus::NoSubscribers => "no_subscribers",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(NotificationStatus::Queued),
            "sent" => Some(NotificationStatus::Sent),
            "failed" => Some(NotificationStatus::Failed),
            "no_subscribers" => Some(NotificationStatus::NoSubscribers),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, NotificationStatus::Queued)
    }
}

/// Outcome of one delivery attempt to one endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryResult {
    pub endpoint: String,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DeliveryResult {
    pub fn delivered(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ok: true,
            error: None,
        }
    }

    pub fn failed(endpoint: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ok: false,
            error: Some(error.into()),
        }
    }
}

/// Per-endpoint results of one dispatch; `sent` always equals the number of
/// successful results.
///
/// `error` is set when the dispatch stopped before any endpoint was tried.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReport {
    pub sent: usize,
    pub results: Vec<DeliveryResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DeliveryReport {
    pub fn from_results(results: Vec<DeliveryResult>) -> Self {
        let sent = results.iter().filter(|r| r.ok).count();
        Self {
            sent,
            results,
            error: None,
        }
    }

    pub fn aborted(error: impl Into<String>) -> Self {
        Self {
            sent: 0,
            results: Vec::new(),
            error: Some(error.into()),
        }
    }

    /// Terminal status implied by these results
    pub fn status(&self) -> NotificationStatus {
        if self.error.is_some() {
            NotificationStatus::Failed
        } else if self.results.is_empty() {
            NotificationStatus::NoSubscribers
        } else if self.sent > 0 {
            NotificationStatus::Sent
        } else {
            NotificationStatus::Failed
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub title: String,
    pub message: String,
    pub severity: NotificationSeverity,
    pub source: String,
    pub related_entity_id: Option<i64>,
    pub channel: Channel,
    pub status: NotificationStatus,
    pub delivery_report: Option<DeliveryReport>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub title: String,
    pub message: String,
    pub severity: NotificationSeverity,
    pub source: String,
    pub related_entity_id: Option<i64>,
    pub channel: Channel,
    pub created_at: DateTime<Utc>,
}

/// A browser push registration, keyed by its endpoint URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushSubscription {
    pub endpoint: String,
    pub owner: i64,
    pub p256dh: String,
    pub auth: String,
    pub created_at: DateTime<Utc>,
}

/// Contact details used to resolve email and SMS targets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorContact {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}
