//! On-demand evaluation

use axum::{Json, extract::State};
use serde_json::{Value, json};

use crate::api::{
    error::{ApiError, ApiResult},
    state::ApiState,
};

/// POST /api/v1/evaluator/run
///
/// Runs an evaluation through the evaluator actor, so it is serialized with
/// the scheduled ones, and returns its summary.
pub async fn run_evaluation(State(state): State<ApiState>) -> ApiResult<Json<Value>> {
    let evaluator = state
        .evaluator
        .as_ref()
        .ok_or_else(|| ApiError::Unavailable("evaluator is not running".to_string()))?;

    let summary = evaluator.evaluate_now().await?;

    Ok(Json(json!({ "summary": summary })))
}
