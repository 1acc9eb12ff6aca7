//! Breach listing and acknowledgement

use axum::{Json, extract::State};
use serde_json::{Value, json};

use crate::api::{
    error::{ApiError, ApiResult},
    extract::{ApiPath, ApiQuery},
    middleware::OperatorId,
    state::ApiState,
    types::BreachQuery,
};

/// GET /api/v1/breaches?status=active|all
///
/// Newest first, at most 100
pub async fn list_breaches(
    State(state): State<ApiState>,
    ApiQuery(query): ApiQuery<BreachQuery>,
) -> ApiResult<Json<Value>> {
    let filter = query
        .filter()
        .ok_or_else(|| ApiError::InvalidRequest("status must be 'active' or 'all'".to_string()))?;

    let breaches = state.alerts.breaches(filter).await?;

    Ok(Json(json!({ "breaches": breaches })))
}

/// POST /api/v1/breaches/:id/ack
///
/// 404 when the breach does not exist or is already acknowledged
pub async fn ack_breach(
    State(state): State<ApiState>,
    ApiPath(id): ApiPath<i64>,
    OperatorId(actor): OperatorId,
) -> ApiResult<Json<Value>> {
    let breach = state
        .alerts
        .acknowledge(id, actor)
        .await
        .map_err(|e| match ApiError::from(e) {
            ApiError::NotFound(_) => ApiError::NotFound("already acked or not found".to_string()),
            other => other,
        })?;

    Ok(Json(json!({ "ok": true, "breach": breach })))
}
