//! Push subscription endpoints

use axum::{Json, extract::State};
use serde_json::{Value, json};

use crate::api::{
    error::ApiResult,
    extract::ApiJson,
    middleware::OperatorId,
    state::ApiState,
    types::{SubscribeRequest, UnsubscribeRequest},
};

/// POST /api/v1/subscriptions
///
/// Registers the caller's browser subscription; re-registering an endpoint
/// replaces its owner and keys.
pub async fn subscribe(
    State(state): State<ApiState>,
    OperatorId(owner): OperatorId,
    ApiJson(body): ApiJson<SubscribeRequest>,
) -> ApiResult<Json<Value>> {
    let subscription = state
        .dispatcher
        .subscribe(owner, &body.endpoint, &body.keys.p256dh, &body.keys.auth)
        .await?;

    Ok(Json(json!({
        "ok": true,
        "endpoint": subscription.endpoint,
    })))
}

/// POST /api/v1/subscriptions/unsubscribe
pub async fn unsubscribe(
    State(state): State<ApiState>,
    OperatorId(owner): OperatorId,
    ApiJson(body): ApiJson<UnsubscribeRequest>,
) -> ApiResult<Json<Value>> {
    let removed = state.dispatcher.unsubscribe(owner, &body.endpoint).await?;

    Ok(Json(json!({ "ok": true, "removed": removed })))
}

/// GET /api/v1/push/public-key
///
/// VAPID application server key for `PushManager.subscribe`; 503 when push
/// is not configured
pub async fn public_key(State(state): State<ApiState>) -> ApiResult<Json<Value>> {
    let key = state.dispatcher.push_public_key()?;

    Ok(Json(json!({ "publicKey": key })))
}
