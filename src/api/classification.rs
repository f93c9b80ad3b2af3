use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;
use uuid::Uuid;

use super::error::ApiError;
use crate::app::AppState;
use crate::pipeline::{BatchOutcome, StatusReport};
use crate::store::{Page, StoredResult};

#[derive(Debug, Default, Deserialize)]
pub(crate) struct LimitQuery {
    pub(crate) limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct PageQuery {
    limit: Option<usize>,
    cursor: Option<Uuid>,
}

pub(crate) async fn run(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<BatchOutcome>, ApiError> {
    let outcome = state.coordinator().run_batch(query.limit).await?;
    Ok(Json(outcome))
}

pub(crate) async fn status(State(state): State<AppState>) -> Result<Json<StatusReport>, ApiError> {
    Ok(Json(state.coordinator().status().await?))
}

pub(crate) async fn latest_results(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page<StoredResult>>, ApiError> {
    let limit = state.coordinator().clamp_limit(query.limit);
    Ok(Json(state.dao().latest_results(limit, query.cursor).await?))
}
