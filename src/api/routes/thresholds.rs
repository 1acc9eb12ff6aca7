//! Threshold endpoints

use axum::{Json, extract::State};
use serde_json::{Value, json};

use crate::api::{
    error::ApiResult,
    extract::{ApiJson, ApiPath},
    state::ApiState,
    types::ThresholdUpdate,
};

/// GET /api/v1/thresholds
///
/// All thresholds, ordered by metric name
pub async fn list_thresholds(State(state): State<ApiState>) -> ApiResult<Json<Value>> {
    let thresholds = state.alerts.thresholds().await?;

    Ok(Json(json!({ "thresholds": thresholds })))
}

/// PUT /api/v1/thresholds/:metric
///
/// 400 on an unknown metric, a missing value or `warn >= critical`
pub async fn update_threshold(
    State(state): State<ApiState>,
    ApiPath(metric): ApiPath<String>,
    ApiJson(body): ApiJson<ThresholdUpdate>,
) -> ApiResult<Json<Value>> {
    let threshold = state
        .alerts
        .update_threshold(&metric, body.warn, body.critical)
        .await?;

    Ok(Json(json!({ "threshold": threshold })))
}
