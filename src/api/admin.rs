use axum::{
    Json,
    extract::{Query, State},
};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use super::classification::LimitQuery;
use super::error::ApiError;
use crate::app::AppState;

#[derive(Debug, Serialize)]
pub(crate) struct ResetResponse {
    count: usize,
    item_ids: Vec<Uuid>,
}

impl ResetResponse {
    fn new(item_ids: Vec<Uuid>) -> Self {
        Self {
            count: item_ids.len(),
            item_ids,
        }
    }
}

pub(crate) async fn requeue_errors(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<ResetResponse>, ApiError> {
    state.telemetry().record_admin_invocation("requeue_errors");
    let limit = state.coordinator().clamp_limit(query.limit);
    let ids = state.dao().requeue_errors(limit).await?;
    info!(count = ids.len(), "errored items requeued");
    Ok(Json(ResetResponse::new(ids)))
}

pub(crate) async fn release_stale(
    State(state): State<AppState>,
) -> Result<Json<ResetResponse>, ApiError> {
    state.telemetry().record_admin_invocation("release_stale");
    let older_than = state.stale_after();
    let ids = state.dao().release_stale(older_than).await?;
    info!(
        count = ids.len(),
        older_than_secs = older_than.as_secs(),
        "stale claims released"
    );
    Ok(Json(ResetResponse::new(ids)))
}
