//! Notification dispatch and history

use axum::{Json, extract::State};
use serde_json::{Value, json};

use crate::api::{
    error::ApiResult,
    extract::{ApiJson, ApiPath, ApiQuery},
    state::ApiState,
    types::{ListQuery, MarkReadRequest, NotifyRequest},
};
use crate::dispatcher::DispatchRequest;

/// POST /api/v1/notifications/dispatch
///
/// Deliver on a single channel. 503 when that channel has no provider.
pub async fn dispatch(
    State(state): State<ApiState>,
    ApiJson(request): ApiJson<DispatchRequest>,
) -> ApiResult<Json<Value>> {
    let outcome = state.dispatcher.dispatch(request).await?;

    Ok(Json(json!({
        "ok": true,
        "id": outcome.id,
        "status": outcome.status,
        "sent": outcome.sent,
        "results": outcome.results,
    })))
}

/// POST /api/v1/notifications/notify
///
/// Deliver on several channels (all by default); one entry per channel
pub async fn notify(
    State(state): State<ApiState>,
    ApiJson(body): ApiJson<NotifyRequest>,
) -> ApiResult<Json<Value>> {
    let channels = body.channels();
    let outcomes = state.dispatcher.broadcast(body.request, &channels).await;

    Ok(Json(json!({
        "ok": outcomes.iter().any(|o| o.outcome.is_some()),
        "channels": outcomes,
    })))
}

/// GET /api/v1/notifications?limit=N
///
/// Newest first; default 20, max 100
pub async fn list_notifications(
    State(state): State<ApiState>,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> ApiResult<Json<Value>> {
    let notifications = state
        .dispatcher
        .recent_notifications(query.limit())
        .await?;

    Ok(Json(json!({ "notifications": notifications })))
}

/// GET /api/v1/notifications/:id
pub async fn get_notification(
    State(state): State<ApiState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<Value>> {
    let notification = state.dispatcher.notification(id).await?;

    Ok(Json(json!({ "notification": notification })))
}

/// GET /api/v1/notifications/unread-count
pub async fn unread_count(State(state): State<ApiState>) -> ApiResult<Json<Value>> {
    let count = state.dispatcher.unread_count().await?;

    Ok(Json(json!({ "count": count })))
}

/// POST /api/v1/notifications/mark-read
///
/// 400 when `ids` is missing or empty; `updated` counts rows that were unread
pub async fn mark_read(
    State(state): State<ApiState>,
    ApiJson(body): ApiJson<MarkReadRequest>,
) -> ApiResult<Json<Value>> {
    let updated = state.dispatcher.mark_read(&body.ids).await?;

    Ok(Json(json!({ "ok": true, "updated": updated })))
}
