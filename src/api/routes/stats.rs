//! System statistics endpoint

use axum::{Json, extract::State};
use serde_json::{Value, json};

use crate::api::{error::ApiResult, state::ApiState};
use crate::storage::schema::Channel;

/// GET /api/v1/stats
///
/// Store row counts and which delivery channels are configured
pub async fn get_stats(State(state): State<ApiState>) -> ApiResult<Json<Value>> {
    let storage = state
        .store
        .get_stats()
        .await
        .map_err(crate::AlertError::from)?;

    let channels: Vec<&str> = Channel::ALL
        .iter()
        .filter(|c| state.dispatcher.is_available(**c))
        .map(|c| c.as_str())
        .collect();

    Ok(Json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "storage": storage,
        "channels": channels,
        "evaluator": state.evaluator.is_some(),
    })))
}
