use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use uuid::Uuid;

use super::error::ApiError;
use crate::app::AppState;
use crate::queue::{ItemStatus, QueueItem};
use crate::store::{Page, StoredResult};

/// Most texts accepted by one enqueue request.
pub(crate) const MAX_ENQUEUE_TEXTS: usize = 500;
/// Longest transcript accepted, in characters.
pub(crate) const MAX_TEXT_CHARS: usize = 200_000;

#[derive(Debug, Deserialize)]
pub(crate) struct EnqueueRequest {
    texts: Vec<String>,
}

pub(crate) async fn enqueue(
    State(state): State<AppState>,
    Json(payload): Json<EnqueueRequest>,
) -> Result<(StatusCode, Json<Vec<QueueItem>>), ApiError> {
    if payload.texts.len() > MAX_ENQUEUE_TEXTS {
        return Err(ApiError::bad_request(format!(
            "at most {MAX_ENQUEUE_TEXTS} texts per request, got {}",
            payload.texts.len()
        )));
    }
    if let Some(index) = payload
        .texts
        .iter()
        .position(|text| text.chars().count() > MAX_TEXT_CHARS)
    {
        return Err(ApiError::bad_request(format!(
            "texts[{index}] exceeds {MAX_TEXT_CHARS} characters"
        )));
    }
    if payload.texts.iter().all(|text| text.trim().is_empty()) {
        return Err(ApiError::bad_request(
            "texts must include at least one non-empty value",
        ));
    }
    let created = state.dao().enqueue(&payload.texts).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ListQuery {
    status: Option<ItemStatus>,
    limit: Option<usize>,
    cursor: Option<Uuid>,
}

pub(crate) async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Page<QueueItem>>, ApiError> {
    let limit = state.coordinator().clamp_limit(query.limit);
    let page = state
        .dao()
        .list_items(query.status, limit, query.cursor)
        .await?;
    Ok(Json(page))
}

pub(crate) async fn result(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<StoredResult>, ApiError> {
    state
        .dao()
        .result_for_item(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("no result for item {id}")))
}
