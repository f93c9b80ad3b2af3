mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use classify_worker::app::{ComponentRegistry, build_router};
use classify_worker::observability::Telemetry;
use classify_worker::queue::ItemStatus;
use classify_worker::store::{ClassificationDao, MemoryClassificationDao};
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

use common::{StubLlm, settings, transcripts};

fn router(dao: &Arc<MemoryClassificationDao>) -> Router {
    let registry = ComponentRegistry::from_parts(
        Telemetry::metrics_only().expect("metrics"),
        dao.clone(),
        Arc::new(StubLlm::new()),
        settings(2),
        Duration::from_secs(900),
    );
    build_router(registry)
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).expect("request")
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

fn post(uri: &str) -> Request<Body> {
    Request::post(uri).body(Body::empty()).expect("request")
}

#[tokio::test]
async fn probes_report_healthy() {
    let dao = Arc::new(MemoryClassificationDao::new());
    let router = router(&dao);

    let (status, body) = send(&router, get("/health/live")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "live");

    let (status, body) = send(&router, get("/health/ready")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test(start_paused = true)]
async fn enqueue_run_and_read_back() {
    let dao = Arc::new(MemoryClassificationDao::new());
    let router = router(&dao);

    let (status, created) = send(
        &router,
        post_json("/v1/items", &json!({ "texts": ["first call", "  ", "second call"] })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let created = created.as_array().expect("array").clone();
    assert_eq!(created.len(), 2);
    assert_eq!(created[0]["status"], "pending");
    let first_id = created[0]["id"].as_str().expect("id").to_string();

    let (status, outcome) = send(&router, post("/v1/classification/run?limit=5")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["processed_count"], 2);
    assert_eq!(outcome["ok_count"], 2);
    assert_eq!(outcome["error_count"], 0);
    assert_eq!(outcome["failures"], json!([]));

    let (status, report) = send(&router, get("/v1/classification/status")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["done"], 2);
    assert_eq!(report["total_items"], 2);
    assert_eq!(report["total_results"], 2);
    assert_eq!(report["last_run"]["processed"], 2);

    let (status, stored) = send(&router, get(&format!("/v1/items/{first_id}/result"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stored["result"]["summary"], "classified: first call");
    assert_eq!(stored["result"]["version"], "v1");

    let (status, latest) = send(&router, get("/v1/classification/results?limit=1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(latest["items"].as_array().map(Vec::len), Some(1));
    let cursor = latest["next_cursor"].as_str().expect("second page exists").to_string();

    let (status, rest) = send(
        &router,
        get(&format!("/v1/classification/results?limit=1&cursor={cursor}")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rest["items"].as_array().map(Vec::len), Some(1));
    assert_ne!(rest["items"][0]["item_id"], latest["items"][0]["item_id"]);
    assert_eq!(rest["next_cursor"], Value::Null);
}

#[tokio::test]
async fn status_before_any_run_has_no_last_run() {
    let dao = Arc::new(MemoryClassificationDao::new());
    let router = router(&dao);

    let (status, report) = send(&router, get("/v1/classification/status")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["last_run"], Value::Null);
    assert_eq!(report["total_items"], 0);
}

#[tokio::test]
async fn blank_enqueue_is_rejected() {
    let dao = Arc::new(MemoryClassificationDao::new());
    let router = router(&dao);

    let (status, body) = send(&router, post_json("/v1/items", &json!({ "texts": [" ", ""] }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().is_some_and(|e| e.contains("non-empty")));
}

#[tokio::test]
async fn oversized_enqueue_is_rejected() {
    let dao = Arc::new(MemoryClassificationDao::new());
    let router = router(&dao);

    let too_many: Vec<String> = (0..501).map(|i| format!("call {i}")).collect();
    let (status, body) = send(&router, post_json("/v1/items", &json!({ "texts": too_many }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().is_some_and(|e| e.starts_with("at most 500 texts")));

    let too_long = "a".repeat(200_001);
    let (status, body) = send(
        &router,
        post_json("/v1/items", &json!({ "texts": ["fine", too_long] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().is_some_and(|e| e.starts_with("texts[1]")));
    assert_eq!(dao.status_counts().await.expect("counts").total(), 0);
}

#[tokio::test(start_paused = true)]
async fn failed_items_are_listed_with_their_reason() {
    let dao = Arc::new(MemoryClassificationDao::new());
    let items = dao.enqueue(&transcripts(3)).await.expect("enqueue");
    let router = build_router(ComponentRegistry::from_parts(
        Telemetry::metrics_only().expect("metrics"),
        dao.clone(),
        Arc::new(StubLlm::hanging_on("#2")),
        settings(3),
        Duration::from_secs(900),
    ));
    send(&router, post("/v1/classification/run")).await;

    let (status, page) = send(&router, get("/v1/items?status=error")).await;
    assert_eq!(status, StatusCode::OK);
    let errored = page["items"].as_array().expect("items");
    assert_eq!(errored.len(), 1);
    assert_eq!(errored[0]["id"], items[1].id.to_string());
    assert_eq!(errored[0]["status"], "error");
    assert!(errored[0]["error"].as_str().is_some_and(|e| e.contains("timed out")));

    let (_, first) = send(&router, get("/v1/items?limit=2")).await;
    assert_eq!(first["items"][0]["id"], items[2].id.to_string());
    assert_eq!(first["items"][1]["id"], items[1].id.to_string());
    let cursor = first["next_cursor"].as_str().expect("more items").to_string();

    let (_, second) = send(&router, get(&format!("/v1/items?limit=2&cursor={cursor}"))).await;
    assert_eq!(second["items"].as_array().map(Vec::len), Some(1));
    assert_eq!(second["items"][0]["id"], items[0].id.to_string());
    assert_eq!(second["next_cursor"], Value::Null);

    let (status, _) = send(&router, get("/v1/items?status=bogus")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn missing_result_is_not_found() {
    let dao = Arc::new(MemoryClassificationDao::new());
    let router = router(&dao);

    let (status, body) = send(&router, get(&format!("/v1/items/{}/result", Uuid::new_v4()))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().is_some_and(|e| e.starts_with("no result")));
}

#[tokio::test]
async fn admin_requeue_resets_errored_items() {
    let dao = Arc::new(MemoryClassificationDao::new());
    let items = dao
        .enqueue(&["a".to_string(), "b".to_string()])
        .await
        .expect("enqueue");
    dao.transition_status(&[items[0].id], ItemStatus::Pending, ItemStatus::Processing)
        .await
        .expect("claim");
    let claimed = dao
        .items_with_status(&[items[0].id], ItemStatus::Processing)
        .await
        .expect("claimed");
    assert!(dao.fail_item(&claimed[0], "boom").await.expect("fail"));
    let router = router(&dao);

    let (status, body) = send(&router, post("/admin/items/requeue-errors?limit=10")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert_eq!(body["item_ids"][0], items[0].id.to_string());
    assert_eq!(
        dao.item(items[0].id).await.map(|item| item.status),
        Some(ItemStatus::Pending)
    );
}

#[tokio::test]
async fn admin_release_stale_leaves_fresh_claims() {
    let dao = Arc::new(MemoryClassificationDao::new());
    let items = dao.enqueue(&["a".to_string()]).await.expect("enqueue");
    dao.transition_status(&[items[0].id], ItemStatus::Pending, ItemStatus::Processing)
        .await
        .expect("claim");
    let router = router(&dao);

    let (status, body) = send(&router, post("/admin/items/release-stale")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 0);
}

#[tokio::test(start_paused = true)]
async fn metrics_reflect_batch_activity() {
    let dao = Arc::new(MemoryClassificationDao::new());
    dao.enqueue(&["a".to_string(), "b".to_string(), "c".to_string()])
        .await
        .expect("enqueue");
    let router = router(&dao);

    send(&router, post("/v1/classification/run")).await;
    let (status, body) = send(&router, get("/metrics")).await;

    assert_eq!(status, StatusCode::OK);
    let text = body.as_str().expect("text exposition");
    assert!(text.contains("classify_items_claimed_total 3"));
    assert!(text.contains("classify_items_classified_total 3"));
    assert!(text.contains("classify_last_batch_size 3"));
}
