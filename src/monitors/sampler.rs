//! Telemetry sampling
//!
//! The evaluator only needs one instantaneous value per metric each tick. The
//! `MetricSampler` trait hides where those values come from; `HttpSampler`
//! reads them from a JSON endpoint of the form
//! `{"traffic": 95, "air_quality": 42.5, "waste": 10, "power": 60}`.
//!
//! Unknown keys and non-numeric values are skipped, so a partially populated
//! document still yields samples for the metrics it does carry.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tracing::{instrument, trace, warn};

use crate::{Metric, MetricSample, config::TelemetryConfig};

#[async_trait]
pub trait MetricSampler: Send + Sync {
    async fn sample(&self) -> Result<MetricSample>;
}

/// Polls a telemetry endpoint over HTTP
pub struct HttpSampler {
    url: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl HttpSampler {
    pub fn new(config: &TelemetryConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build telemetry HTTP client")?;

        Ok(Self {
            url: config.url.clone(),
            token: config.token.clone(),
            client,
        })
    }
}

#[async_trait]
impl MetricSampler for HttpSampler {
    #[instrument(skip(self), fields(url = %self.url))]
    async fn sample(&self) -> Result<MetricSample> {
        trace!("requesting telemetry sample");

        let mut request = self.client.get(&self.url);

        if let Some(token) = &self.token {
            request = request.header("X-MONITORING-SECRET", token);
        }

        let response = request
            .send()
            .await
            .context("failed to send telemetry request")?;

        if !response.status().is_success() {
            bail!("telemetry HTTP error: {}", response.status());
        }

        let body = response
            .text()
            .await
            .context("failed to read telemetry response body")?;

        parse_sample(&body)
    }
}

/// Parse a telemetry document into a sample taken now
pub fn parse_sample(body: &str) -> Result<MetricSample> {
    let document: serde_json::Map<String, Value> =
        serde_json::from_str(body).context("failed to parse telemetry JSON")?;

    let mut sample = MetricSample::new(Utc::now());

    for (key, value) in document {
        let Ok(metric) = key.parse::<Metric>() else {
            trace!("ignoring unknown telemetry key '{key}'");
            continue;
        };

        match value.as_f64() {
            Some(v) if v.is_finite() => {
                sample.values.insert(metric, v);
            }
            _ => warn!("telemetry value for {metric} is not a number: {value}"),
        }
    }

    Ok(sample)
}
