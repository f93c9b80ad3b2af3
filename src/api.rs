mod admin;
mod classification;
mod error;
mod health;
mod items;
mod metrics;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::app::AppState;

pub(crate) fn router(state: AppState) -> Router {
    Router::new()
        .route("/health/ready", get(health::ready))
        .route("/health/live", get(health::live))
        .route("/metrics", get(metrics::exporter))
        .route("/v1/classification/run", post(classification::run))
        .route("/v1/classification/status", get(classification::status))
        .route("/v1/classification/results", get(classification::latest_results))
        .route("/v1/items", get(items::list).post(items::enqueue))
        .route("/v1/items/{id}/result", get(items::result))
        .route("/admin/items/requeue-errors", post(admin::requeue_errors))
        .route("/admin/items/release-stale", post(admin::release_stale))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
