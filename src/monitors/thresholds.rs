use crate::{
    AlertError, AlertResult, Metric,
    storage::schema::{BreachSeverity, Threshold},
};

/// Classify `value` against `threshold`
///
/// Both bounds are inclusive: a value equal to `critical` is critical, a value
/// equal to `warn` is a warning.
pub fn classify(value: f64, threshold: &Threshold) -> Option<BreachSeverity> {
    if value.is_nan() {
        return None;
    }

    if value >= threshold.critical {
        return Some(BreachSeverity::Critical);
    }

    if value >= threshold.warn {
        return Some(BreachSeverity::Warn);
    }

    None
}

/// Validate a pair of bands before it is stored
pub fn validate_bands(warn: f64, critical: f64) -> AlertResult<()> {
    if !warn.is_finite() || !critical.is_finite() {
        return Err(AlertError::validation("warn and critical must be finite numbers"));
    }

    if warn >= critical {
        return Err(AlertError::validation("warn must be < critical"));
    }

    Ok(())
}

/// Human-readable breach line, e.g.
/// `TRAFFIC CRITICAL: value=95, thresholds warn=70, critical=90`
pub fn breach_message(
    metric: Metric,
    severity: BreachSeverity,
    value: f64,
    threshold: &Threshold,
) -> String {
    format!(
        "{} {}: value={}, thresholds warn={}, critical={}",
        metric.as_str().to_uppercase(),
        severity.as_str().to_uppercase(),
        value,
        threshold.warn,
        threshold.critical
    )
}
