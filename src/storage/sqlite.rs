//! SQLite implementation of the `AlertStore` trait
//!
//! ## Features
//!
//! - **Embedded**: No separate database server required
//! - **WAL mode**: Readers never block the evaluator's writes
//! - **Connection pooling**: Shared by the evaluator actor and HTTP handlers
//! - **Migrations**: Schema and default thresholds applied on open
//!
//! ## Atomicity
//!
//! The breach dedup check is an `INSERT ... SELECT ... WHERE NOT EXISTS` and
//! acknowledgement is an `UPDATE ... WHERE acked_at IS NULL`; both use
//! `RETURNING` so the caller learns in the same statement whether it won.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Pool, QueryBuilder, Row, Sqlite};
use tracing::{debug, info, instrument, warn};

use super::backend::{AlertStore, HealthStatus};
use super::error::{StorageError, StorageResult};
use super::schema::{
    AckedBreach, Breach, BreachFilter, BreachSeverity, Channel, DeliveryReport, NewBreach,
    NewNotification, Notification, NotificationSeverity, NotificationStatus, OperatorContact,
    PushSubscription, Threshold,
};
use crate::Metric;

const BREACH_COLUMNS: &str =
    "id, metric, value, severity, message, created_at, acked_by, acked_at";

const NOTIFICATION_COLUMNS: &str = "id, title, message, severity, source, related_entity_id, \
     channel, status, delivery_report, is_read, created_at, sent_at";

/// SQLite alert store
pub struct SqliteStore {
    pool: Pool<Sqlite>,
    db_path: String,
}

impl SqliteStore {
    /// Open (or create) the database at `db_path` and run migrations
    ///
    /// ```no_run
    /// # use citywatch::storage::sqlite::SqliteStore;
    /// # async fn example() -> anyhow::Result<()> {
    /// let store = SqliteStore::new("./citywatch.db").await?;
    /// # Ok(())
    /// # }
    /// ```
    #[instrument(skip_all)]
    pub async fn new(db_path: impl AsRef<Path>) -> StorageResult<Self> {
        let db_path_str = db_path.as_ref().to_string_lossy().to_string();

        info!("initializing SQLite store at: {}", db_path_str);

        let options = SqliteConnectOptions::new()
            .filename(&db_path_str)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        info!("SQLite connection pool created");

        debug!("running database migrations");
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StorageError::MigrationFailed(e.to_string()))?;

        info!("database migrations complete");

        Ok(Self {
            pool,
            db_path: db_path_str,
        })
    }

    fn timestamp_to_millis(dt: &DateTime<Utc>) -> i64 {
        dt.timestamp_millis()
    }

    fn millis_to_timestamp(millis: i64) -> StorageResult<DateTime<Utc>> {
        DateTime::from_timestamp_millis(millis)
            .ok_or_else(|| StorageError::CorruptRow(format!("timestamp out of range: {millis}")))
    }

    fn optional_timestamp(millis: Option<i64>) -> StorageResult<Option<DateTime<Utc>>> {
        millis.map(Self::millis_to_timestamp).transpose()
    }

    fn metric_from_str(s: &str) -> StorageResult<Metric> {
        s.parse()
            .map_err(|_| StorageError::CorruptRow(format!("unknown metric '{s}'")))
    }

    fn threshold_from_row(row: &SqliteRow) -> StorageResult<Threshold> {
        let metric: String = row.try_get("metric")?;
        Ok(Threshold {
            metric: Self::metric_from_str(&metric)?,
            warn: row.try_get("warn")?,
            critical: row.try_get("critical")?,
            updated_at: Self::millis_to_timestamp(row.try_get("updated_at")?)?,
        })
    }

    fn breach_from_row(row: &SqliteRow) -> StorageResult<Breach> {
        let metric: String = row.try_get("metric")?;
        let severity: String = row.try_get("severity")?;
        Ok(Breach {
            id: row.try_get("id")?,
            metric: Self::metric_from_str(&metric)?,
            value: row.try_get("value")?,
            severity: BreachSeverity::parse(&severity)
                .ok_or_else(|| StorageError::CorruptRow(format!("unknown severity '{severity}'")))?,
            message: row.try_get("message")?,
            created_at: Self::millis_to_timestamp(row.try_get("created_at")?)?,
            acked_by: row.try_get("acked_by")?,
            acked_at: Self::optional_timestamp(row.try_get("acked_at")?)?,
        })
    }

    fn notification_from_row(row: &SqliteRow) -> StorageResult<Notification> {
        let severity: String = row.try_get("severity")?;
        let channel: String = row.try_get("channel")?;
        let status: String = row.try_get("status")?;
        let report: Option<String> = row.try_get("delivery_report")?;

        let delivery_report = match report {
            Some(json) => Some(serde_json::from_str::<DeliveryReport>(&json).map_err(|e| {
                StorageError::SerializationError(format!("failed to parse delivery report: {e}"))
            })?),
            None => None,
        };

        Ok(Notification {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            message: row.try_get("message")?,
            severity: NotificationSeverity::parse(&severity).ok_or_else(|| {
                StorageError::CorruptRow(format!("unknown notification severity '{severity}'"))
            })?,
            source: row.try_get("source")?,
            related_entity_id: row.try_get("related_entity_id")?,
            channel: Channel::parse(&channel)
                .ok_or_else(|| StorageError::CorruptRow(format!("unknown channel '{channel}'")))?,
            status: NotificationStatus::parse(&status)
                .ok_or_else(|| StorageError::CorruptRow(format!("unknown status '{status}'")))?,
            delivery_report,
            is_read: row.try_get("is_read")?,
            created_at: Self::millis_to_timestamp(row.try_get("created_at")?)?,
            sent_at: Self::optional_timestamp(row.try_get("sent_at")?)?,
        })
    }

    fn subscription_from_row(row: &SqliteRow) -> StorageResult<PushSubscription> {
        Ok(PushSubscription {
            endpoint: row.try_get("endpoint")?,
            owner: row.try_get("owner")?,
            p256dh: row.try_get("p256dh")?,
            auth: row.try_get("auth")?,
            created_at: Self::millis_to_timestamp(row.try_get("created_at")?)?,
        })
    }
}

#[async_trait]
impl AlertStore for SqliteStore {
    #[instrument(skip(self))]
    async fn list_thresholds(&self) -> StorageResult<Vec<Threshold>> {
        let rows = sqlx::query(
            "SELECT metric, warn, critical, updated_at FROM thresholds ORDER BY metric",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        rows.iter().map(Self::threshold_from_row).collect()
    }

    #[instrument(skip(self))]
    async fn get_threshold(&self, metric: Metric) -> StorageResult<Option<Threshold>> {
        let row = sqlx::query(
            "SELECT metric, warn, critical, updated_at FROM thresholds WHERE metric = ?",
        )
        .bind(metric.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        row.as_ref().map(Self::threshold_from_row).transpose()
    }

    #[instrument(skip(self))]
    async fn upsert_threshold(
        &self,
        metric: Metric,
        warn: f64,
        critical: f64,
        updated_at: DateTime<Utc>,
    ) -> StorageResult<Threshold> {
        let row = sqlx::query(
            r#"
            INSERT INTO thresholds (metric, warn, critical, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (metric) DO UPDATE SET
                warn = excluded.warn,
                critical = excluded.critical,
                updated_at = excluded.updated_at
            RETURNING metric, warn, critical, updated_at
            "#,
        )
        .bind(metric.as_str())
        .bind(warn)
        .bind(critical)
        .bind(Self::timestamp_to_millis(&updated_at))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        Self::threshold_from_row(&row)
    }

    #[instrument(skip(self, breach), fields(metric = %breach.metric, severity = %breach.severity))]
    async fn insert_breach_unless_recent(
        &self,
        breach: NewBreach,
        window_start: DateTime<Utc>,
    ) -> StorageResult<Option<Breach>> {
        let sql = format!(
            r#"
            INSERT INTO breaches (metric, value, severity, message, created_at)
            SELECT ?1, ?2, ?3, ?4, ?5
            WHERE NOT EXISTS (
                SELECT 1 FROM breaches
                WHERE metric = ?1 AND severity = ?3 AND created_at >= ?6
            )
            RETURNING {BREACH_COLUMNS}
            "#
        );

        let row = sqlx::query(&sql)
            .bind(breach.metric.as_str())
            .bind(breach.value)
            .bind(breach.severity.as_str())
            .bind(&breach.message)
            .bind(Self::timestamp_to_millis(&breach.created_at))
            .bind(Self::timestamp_to_millis(&window_start))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        match row {
            Some(row) => {
                let breach = Self::breach_from_row(&row)?;
                debug!("recorded breach {}", breach.id);
                Ok(Some(breach))
            }
            None => {
                debug!("breach suppressed by dedup window");
                Ok(None)
            }
        }
    }

    #[instrument(skip(self))]
    async fn list_breaches(
        &self,
        filter: BreachFilter,
        limit: usize,
    ) -> StorageResult<Vec<Breach>> {
        let where_clause = match filter {
            BreachFilter::Active => "WHERE acked_at IS NULL",
            BreachFilter::All => "",
        };

        let sql = format!(
            "SELECT {BREACH_COLUMNS} FROM breaches {where_clause} \
             ORDER BY created_at DESC, id DESC LIMIT ?"
        );

        let rows = sqlx::query(&sql)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        rows.iter().map(Self::breach_from_row).collect()
    }

    #[instrument(skip(self))]
    async fn get_breach(&self, id: i64) -> StorageResult<Option<Breach>> {
        let sql = format!("SELECT {BREACH_COLUMNS} FROM breaches WHERE id = ?");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        row.as_ref().map(Self::breach_from_row).transpose()
    }

    #[instrument(skip(self))]
    async fn ack_breach(
        &self,
        id: i64,
        actor: i64,
        acked_at: DateTime<Utc>,
    ) -> StorageResult<Option<AckedBreach>> {
        let row = sqlx::query(
            r#"
            UPDATE breaches
            SET acked_by = ?, acked_at = ?
            WHERE id = ? AND acked_at IS NULL
            RETURNING id, metric, severity, acked_by, acked_at
            "#,
        )
        .bind(actor)
        .bind(Self::timestamp_to_millis(&acked_at))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let metric: String = row.try_get("metric")?;
        let severity: String = row.try_get("severity")?;
        Ok(Some(AckedBreach {
            id: row.try_get("id")?,
            metric: Self::metric_from_str(&metric)?,
            severity: BreachSeverity::parse(&severity)
                .ok_or_else(|| StorageError::CorruptRow(format!("unknown severity '{severity}'")))?,
            acked_by: row.try_get("acked_by")?,
            acked_at: Self::millis_to_timestamp(row.try_get("acked_at")?)?,
        }))
    }

    #[instrument(skip(self, notification), fields(channel = %notification.channel))]
    async fn create_notification(
        &self,
        notification: NewNotification,
    ) -> StorageResult<Notification> {
        let sql = format!(
            r#"
            INSERT INTO notifications (
                title, message, severity, source, related_entity_id, channel, status, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, 'queued', ?)
            RETURNING {NOTIFICATION_COLUMNS}
            "#
        );

        let row = sqlx::query(&sql)
            .bind(&notification.title)
            .bind(&notification.message)
            .bind(notification.severity.as_str())
            .bind(&notification.source)
            .bind(notification.related_entity_id)
            .bind(notification.channel.as_str())
            .bind(Self::timestamp_to_millis(&notification.created_at))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        Self::notification_from_row(&row)
    }

    #[instrument(skip(self))]
    async fn requeue_notification(&self, id: i64) -> StorageResult<Option<Notification>> {
        let sql = format!(
            r#"
            UPDATE notifications
            SET status = 'queued', delivery_report = NULL, sent_at = NULL
            WHERE id = ?
            RETURNING {NOTIFICATION_COLUMNS}
            "#
        );

        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        row.as_ref().map(Self::notification_from_row).transpose()
    }

    #[instrument(skip(self, report), fields(sent = report.sent))]
    async fn complete_notification(
        &self,
        id: i64,
        status: NotificationStatus,
        report: &DeliveryReport,
        sent_at: DateTime<Utc>,
    ) -> StorageResult<Option<Notification>> {
        let report_json = serde_json::to_string(report).map_err(|e| {
            StorageError::SerializationError(format!("failed to serialize delivery report: {e}"))
        })?;

        let sql = format!(
            r#"
            UPDATE notifications
            SET status = ?, delivery_report = ?, sent_at = ?
            WHERE id = ?
            RETURNING {NOTIFICATION_COLUMNS}
            "#
        );

        let row = sqlx::query(&sql)
            .bind(status.as_str())
            .bind(report_json)
            .bind(Self::timestamp_to_millis(&sent_at))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        row.as_ref().map(Self::notification_from_row).transpose()
    }

    #[instrument(skip(self))]
    async fn get_notification(&self, id: i64) -> StorageResult<Option<Notification>> {
        let sql = format!("SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE id = ?");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        row.as_ref().map(Self::notification_from_row).transpose()
    }

    #[instrument(skip(self))]
    async fn list_notifications(&self, limit: usize) -> StorageResult<Vec<Notification>> {
        let sql = format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications \
             ORDER BY created_at DESC, id DESC LIMIT ?"
        );

        let rows = sqlx::query(&sql)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        rows.iter().map(Self::notification_from_row).collect()
    }

    #[instrument(skip(self, ids), fields(ids = ids.len()))]
    async fn mark_notifications_read(&self, ids: &[i64]) -> StorageResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut query = QueryBuilder::<Sqlite>::new(
            "UPDATE notifications SET is_read = 1 WHERE is_read = 0 AND id IN (",
        );
        let mut separated = query.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let result = query
            .build()
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        debug!("marked {} notification(s) read", result.rows_affected());
        Ok(result.rows_affected())
    }

    #[instrument(skip(self))]
    async fn count_unread_notifications(&self) -> StorageResult<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE is_read = 0")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))
    }

    #[instrument(skip(self, subscription), fields(owner = subscription.owner))]
    async fn upsert_subscription(&self, subscription: &PushSubscription) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO push_subscriptions (endpoint, owner, p256dh, auth, created_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (endpoint) DO UPDATE SET
                owner = excluded.owner,
                p256dh = excluded.p256dh,
                auth = excluded.auth
            "#,
        )
        .bind(&subscription.endpoint)
        .bind(subscription.owner)
        .bind(&subscription.p256dh)
        .bind(&subscription.auth)
        .bind(Self::timestamp_to_millis(&subscription.created_at))
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn remove_subscription(&self, endpoint: &str, owner: i64) -> StorageResult<bool> {
        let result = sqlx::query("DELETE FROM push_subscriptions WHERE endpoint = ? AND owner = ?")
            .bind(endpoint)
            .bind(owner)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn delete_subscription(&self, endpoint: &str) -> StorageResult<bool> {
        let result = sqlx::query("DELETE FROM push_subscriptions WHERE endpoint = ?")
            .bind(endpoint)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn list_subscriptions(
        &self,
        owner: Option<i64>,
    ) -> StorageResult<Vec<PushSubscription>> {
        let rows = match owner {
            Some(owner) => {
                sqlx::query(
                    "SELECT endpoint, owner, p256dh, auth, created_at FROM push_subscriptions \
                     WHERE owner = ? ORDER BY created_at",
                )
                .bind(owner)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query(
                    "SELECT endpoint, owner, p256dh, auth, created_at FROM push_subscriptions \
                     ORDER BY created_at",
                )
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        rows.iter().map(Self::subscription_from_row).collect()
    }

    #[instrument(skip(self, operator), fields(operator_id = operator.id))]
    async fn upsert_operator(&self, operator: &OperatorContact) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO operators (id, name, email, phone)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (id) DO UPDATE SET
                name = excluded.name,
                email = excluded.email,
                phone = excluded.phone
            "#,
        )
        .bind(operator.id)
        .bind(&operator.name)
        .bind(&operator.email)
        .bind(&operator.phone)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_operator(&self, id: i64) -> StorageResult<Option<OperatorContact>> {
        let row = sqlx::query("SELECT id, name, email, phone FROM operators WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(OperatorContact {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            phone: row.try_get("phone")?,
        }))
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> StorageResult<HealthStatus> {
        match sqlx::query("SELECT 1").fetch_one(&self.pool).await {
            Ok(_) => {
                let mut metadata = HashMap::new();
                metadata.insert("backend".to_string(), "sqlite".to_string());
                metadata.insert("db_path".to_string(), self.db_path.clone());

                Ok(HealthStatus {
                    healthy: true,
                    message: "SQLite store operational".to_string(),
                    metadata,
                })
            }
            Err(e) => {
                warn!("health check failed: {}", e);
                Ok(HealthStatus {
                    healthy: false,
                    message: format!("health check failed: {}", e),
                    metadata: HashMap::new(),
                })
            }
        }
    }

    #[instrument(skip(self))]
    async fn get_stats(&self) -> StorageResult<String> {
        let (breaches, active): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(CASE WHEN acked_at IS NULL THEN 1 ELSE 0 END), 0) \
             FROM breaches",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        let (notifications,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM notifications")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        let (subscriptions,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM push_subscriptions")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        let file_size = std::fs::metadata(&self.db_path)
            .map(|m| m.len())
            .unwrap_or(0);

        Ok(format!(
            "SQLite: {} breaches ({} active), {} notifications, {} push subscriptions, {:.2} MB on disk",
            breaches,
            active,
            notifications,
            subscriptions,
            file_size as f64 / 1_000_000.0
        ))
    }

    async fn close(&self) -> StorageResult<()> {
        info!("closing SQLite store");
        self.pool.close().await;
        Ok(())
    }
}
