use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument};

use crate::monitors::thresholds::validate_bands;
use crate::storage::AlertStore;
use crate::storage::schema::{AckedBreach, Breach, BreachFilter, Threshold};
use crate::{AlertError, AlertResult, Metric};

/// Upper bound on breach listings
pub const MAX_BREACHES: usize = 100;

/// Operator-facing view of thresholds and breaches
#[derive(Clone)]
pub struct AlertManager {
    store: Arc<dyn AlertStore>,
}

impl AlertManager {
    pub fn new(store: Arc<dyn AlertStore>) -> Self {
        Self { store }
    }

    pub async fn thresholds(&self) -> AlertResult<Vec<Threshold>> {
        Ok(self.store.list_thresholds().await?)
    }

    /// Replace the bands of `metric`
    ///
    /// Missing values, non-finite values and `warn >= critical` are rejected
    /// before anything is written.
    #[instrument(skip(self))]
    pub async fn update_threshold(
        &self,
        metric: &str,
        warn: Option<f64>,
        critical: Option<f64>,
    ) -> AlertResult<Threshold> {
        let metric: Metric = metric.parse()?;

        let (Some(warn), Some(critical)) = (warn, critical) else {
            return Err(AlertError::validation("warn and critical are required"));
        };

        validate_bands(warn, critical)?;

        let threshold = self
            .store
            .upsert_threshold(metric, warn, critical, Utc::now())
            .await?;

        info!("threshold for {} set to warn={}, critical={}", metric, warn, critical);
        Ok(threshold)
    }

    /// Newest first, capped at [`MAX_BREACHES`]
    pub async fn breaches(&self, filter: BreachFilter) -> AlertResult<Vec<Breach>> {
        Ok(self.store.list_breaches(filter, MAX_BREACHES).await?)
    }

    /// Acknowledge an active breach on behalf of `actor`
    ///
    /// Only one of several concurrent acknowledgements of the same breach
    /// succeeds; the rest, like acks of unknown ids, get `NotFound`.
    #[instrument(skip(self))]
    pub async fn acknowledge(&self, breach_id: i64, actor: i64) -> AlertResult<AckedBreach> {
        let acked = self
            .store
            .ack_breach(breach_id, actor, Utc::now())
            .await?
            .ok_or_else(|| AlertError::not_found("active breach", breach_id))?;

        info!("breach {} acknowledged by operator {}", acked.id, actor);
        Ok(acked)
    }
}
