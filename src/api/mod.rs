//! REST API for thresholds, breaches and notifications
//!
//! ## Architecture
//!
//! - **Axum** web framework with Tower middleware
//! - **Shared state** holding the store, the dispatcher and the evaluator handle
//! - Errors are returned as `{"error": "..."}` with a matching status code
//!
//! ## Endpoints
//!
//! - `GET /api/v1/health` - Health check
//! - `GET /api/v1/stats` - Store statistics and configured channels
//! - `GET /api/v1/thresholds` - List thresholds
//! - `PUT /api/v1/thresholds/{metric}` - Replace a metric's bands
//! - `GET /api/v1/breaches` - List breaches (`?status=active|all`)
//! - `POST /api/v1/breaches/{id}/ack` - Acknowledge a breach
//! - `POST /api/v1/notifications/dispatch` - Deliver on one channel
//! - `POST /api/v1/notifications/notify` - Deliver on several channels
//! - `GET /api/v1/notifications` - Recent notifications
//! - `GET /api/v1/notifications/unread-count` - Number of unread notifications
//! - `POST /api/v1/notifications/mark-read` - Flag notifications as read
//! - `GET /api/v1/notifications/{id}` - One notification with its report
//! - `GET /api/v1/push/public-key` - VAPID public key for subscribing
//! - `POST /api/v1/subscriptions` - Register a push subscription
//! - `POST /api/v1/subscriptions/unsubscribe` - Remove a push subscription
//! - `POST /api/v1/evaluator/run` - Evaluate now

#[cfg(feature = "api")]
pub mod error;
#[cfg(feature = "api")]
pub mod extract;
#[cfg(feature = "api")]
pub mod middleware;
#[cfg(feature = "api")]
pub mod routes;
#[cfg(feature = "api")]
pub mod state;
#[cfg(feature = "api")]
pub mod types;

#[cfg(feature = "api")]
pub use error::{ApiError, ApiResult};
#[cfg(feature = "api")]
pub use state::ApiState;

#[cfg(feature = "api")]
use axum::{
    Router,
    routing::{get, post, put},
};
use std::net::SocketAddr;
#[cfg(feature = "api")]
use tracing::info;

/// API server configuration
#[derive(Debug, Clone, serde::Deserialize)]
pub struct ApiConfig {
    /// Bind address (e.g., "0.0.0.0:8080")
    #[serde(rename = "bind", default = "crate::util::get_default_bind")]
    pub bind_addr: SocketAddr,

    /// Optional bearer token required on every route but health
    #[serde(default)]
    pub auth_token: Option<String>,

    /// Enable CORS for browser clients
    #[serde(default = "default_enable_cors")]
    pub enable_cors: bool,
}

fn default_enable_cors() -> bool {
    true
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: crate::util::get_default_bind(),
            auth_token: None,
            enable_cors: true,
        }
    }
}

/// Build the router with every route and layer applied
#[cfg(feature = "api")]
pub fn router(config: &ApiConfig, state: ApiState) -> Router {
    use tower::ServiceBuilder;
    use tower_http::cors::{Any, CorsLayer};
    use tower_http::trace::TraceLayer;

    let mut app = Router::new()
        .route("/api/v1/health", get(routes::health::health_check))
        .route("/api/v1/stats", get(routes::stats::get_stats))
        .route("/api/v1/thresholds", get(routes::thresholds::list_thresholds))
        .route(
            "/api/v1/thresholds/:metric",
            put(routes::thresholds::update_threshold),
        )
        .route("/api/v1/breaches", get(routes::breaches::list_breaches))
        .route("/api/v1/breaches/:id/ack", post(routes::breaches::ack_breach))
        .route(
            "/api/v1/notifications",
            get(routes::notifications::list_notifications),
        )
        .route(
            "/api/v1/notifications/dispatch",
            post(routes::notifications::dispatch),
        )
        .route(
            "/api/v1/notifications/notify",
            post(routes::notifications::notify),
        )
        .route(
            "/api/v1/notifications/unread-count",
            get(routes::notifications::unread_count),
        )
        .route(
            "/api/v1/notifications/mark-read",
            post(routes::notifications::mark_read),
        )
        .route(
            "/api/v1/notifications/:id",
            get(routes::notifications::get_notification),
        )
        .route(
            "/api/v1/push/public-key",
            get(routes::subscriptions::public_key),
        )
        .route("/api/v1/subscriptions", post(routes::subscriptions::subscribe))
        .route(
            "/api/v1/subscriptions/unsubscribe",
            post(routes::subscriptions::unsubscribe),
        )
        .route(
            "/api/v1/evaluator/run",
            post(routes::evaluator::run_evaluation),
        )
        .with_state(state);

    if let Some(token) = config.auth_token.clone() {
        app = app.layer(axum::middleware::from_fn_with_state(
            token,
            middleware::auth::auth_middleware,
        ));
    }

    if config.enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        app = app.layer(cors);
    }

    app.layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}

/// Spawn the API server
///
/// This starts an Axum HTTP server in a background task.
/// Returns the server's local address.
#[cfg(feature = "api")]
pub async fn spawn_api_server(config: ApiConfig, state: ApiState) -> anyhow::Result<SocketAddr> {
    info!("starting API server on {}", config.bind_addr);

    let app = router(&config, state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    let addr = listener.local_addr()?;

    info!("API server listening on {}", addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("API server error: {}", e);
        }
    });

    Ok(addr)
}
