pub mod actors;
pub mod alerts;
pub mod api;
pub mod channels;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod monitors;
pub mod storage;
pub mod util;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use error::{AlertError, AlertResult};

/// A city metric that can be sampled and thresholded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Traffic,
    #[serde(alias = "aqi")]
    AirQuality,
    Waste,
    Power,
}

impl Metric {
    pub const ALL: [Metric; 4] = [
        Metric::Traffic,
        Metric::AirQuality,
        Metric::Waste,
        Metric::Power,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Traffic => "traffic",
            Metric::AirQuality => "air_quality",
            Metric::Waste => "waste",
            Metric::Power => "power",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = AlertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "traffic" => Ok(Metric::Traffic),
            "air_quality" | "aqi" => Ok(Metric::AirQuality),
            "waste" => Ok(Metric::Waste),
            "power" => Ok(Metric::Power),
            other => Err(AlertError::validation(format!("unknown metric: {other}"))),
        }
    }
}

/// One round of instantaneous values from the telemetry source.
///
/// A metric that is absent from `values` simply has no sample this round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSample {
    pub taken_at: DateTime<Utc>,
    pub values: BTreeMap<Metric, f64>,
}

impl MetricSample {
    pub fn new(taken_at: DateTime<Utc>) -> Self {
        Self {
            taken_at,
            values: BTreeMap::new(),
        }
    }

    pub fn with(mut self, metric: Metric, value: f64) -> Self {
        self.values.insert(metric, value);
        self
    }

    pub fn get(&self, metric: Metric) -> Option<f64> {
        self.values.get(&metric).copied()
    }
}
