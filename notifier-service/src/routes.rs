use axum::{routing::get, Router};

use crate::metrics;
use crate::state::AppState;
use crate::websocket::handlers::notifications_ws;

pub fn build_router() -> Router<AppState> {
    Router::new()
        .route("/notifications", get(notifications_ws))
        .route("/health", get(|| async { "OK" }))
        .route("/metrics", get(metrics::serve_metrics))
}
