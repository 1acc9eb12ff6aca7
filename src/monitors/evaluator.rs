//! Breach evaluation
//!
//! One evaluation reads the threshold table, takes one sample and records a
//! breach for every metric that crossed a band, unless the same
//! (metric, severity) pair was already recorded inside the dedup window.
//!
//! ```text
//! thresholds + sample → classify → insert unless recent → (optional) push notification
//! ```
//!
//! Only a failure to read thresholds or to sample aborts the evaluation; a
//! failed insert for one metric is counted and the others still run.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

use super::sampler::MetricSampler;
use super::thresholds::{breach_message, classify};
use crate::dispatcher::{DispatchRequest, Dispatcher};
use crate::storage::AlertStore;
use crate::storage::schema::{Breach, Channel, NewBreach, NotificationSeverity};

const BREACH_SOURCE: &str = "breach";

/// What one evaluation did
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EvaluationSummary {
    /// Metrics that had both a threshold and a sample
    pub evaluated: usize,

    /// Breaches recorded by this evaluation
    pub created: Vec<Breach>,

    /// Crossings swallowed by the dedup window
    pub suppressed: usize,

    /// Thresholds without a sample this round
    pub skipped: usize,

    /// Crossings that could not be recorded
    pub failed: usize,
}

pub struct BreachEvaluator {
    store: Arc<dyn AlertStore>,
    sampler: Arc<dyn MetricSampler>,
    dedup_window: Duration,
    notifier: Option<Dispatcher>,
}

impl BreachEvaluator {
    pub fn new(
        store: Arc<dyn AlertStore>,
        sampler: Arc<dyn MetricSampler>,
        dedup_window: Duration,
    ) -> Self {
        Self {
            store,
            sampler,
            dedup_window,
            notifier: None,
        }
    }

    /// Push a notification for every breach this evaluator records
    pub fn notify_with(mut self, dispatcher: Dispatcher) -> Self {
        self.notifier = Some(dispatcher);
        self
    }

    pub async fn evaluate(&self) -> Result<EvaluationSummary> {
        self.evaluate_at(Utc::now()).await
    }

    /// Evaluate as if the current time were `now`
    ///
    /// The dedup window is `[now - window, ...]`, inclusive at the lower bound.
    #[instrument(skip(self))]
    pub async fn evaluate_at(&self, now: DateTime<Utc>) -> Result<EvaluationSummary> {
        let thresholds = self
            .store
            .list_thresholds()
            .await
            .context("failed to read thresholds")?;

        let sample = self
            .sampler
            .sample()
            .await
            .context("failed to sample metrics")?;

        let window_start = now - self.dedup_window;
        let mut summary = EvaluationSummary::default();

        for threshold in &thresholds {
            let metric = threshold.metric;

            let Some(value) = sample.get(metric) else {
                debug!("no sample for {metric}, skipping");
                summary.skipped += 1;
                continue;
            };

            summary.evaluated += 1;

            let Some(severity) = classify(value, threshold) else {
                continue;
            };

            let breach = NewBreach {
                metric,
                value,
                severity,
                message: breach_message(metric, severity, value, threshold),
                created_at: now,
            };

            match self
                .store
                .insert_breach_unless_recent(breach, window_start)
                .await
            {
                Ok(Some(breach)) => {
                    warn!("{}", breach.message);
                    summary.created.push(breach);
                }
                Ok(None) => {
                    debug!("{metric} {severity} already recorded within window");
                    summary.suppressed += 1;
                }
                Err(e) => {
                    error!("failed to record {metric} {severity} breach: {}", e);
                    summary.failed += 1;
                }
            }
        }

        if let Some(dispatcher) = &self.notifier {
            for breach in &summary.created {
                Self::notify(dispatcher, breach).await;
            }
        }

        info!(
            "evaluation complete: {} evaluated, {} created, {} suppressed, {} skipped, {} failed",
            summary.evaluated,
            summary.created.len(),
            summary.suppressed,
            summary.skipped,
            summary.failed
        );

        Ok(summary)
    }

    async fn notify(dispatcher: &Dispatcher, breach: &Breach) {
        let request = DispatchRequest {
            severity: NotificationSeverity::from(breach.severity),
            source: Some(BREACH_SOURCE.to_string()),
            related_entity_id: Some(breach.id),
            tag: Some(format!("breach-{}-{}", breach.metric, breach.severity)),
            ..DispatchRequest::new(
                format!(
                    "{} {}",
                    breach.metric.as_str().to_uppercase(),
                    breach.severity.as_str().to_uppercase()
                ),
                breach.message.clone(),
            )
            .on(Channel::Push)
        };

        if let Err(e) = dispatcher.dispatch(request).await {
            error!("failed to notify breach {}: {}", breach.id, e);
        }
    }
}
