mod common;

use std::collections::HashSet;
use std::sync::Arc;

use classify_worker::classification::DealStage;
use classify_worker::observability::Telemetry;
use classify_worker::pipeline::RunCoordinator;
use classify_worker::queue::ItemStatus;
use classify_worker::store::{ClassificationDao, MemoryClassificationDao};

use common::{StubLlm, settings, transcripts};

fn coordinator(
    dao: &Arc<MemoryClassificationDao>,
    llm: &Arc<StubLlm>,
    concurrency: usize,
) -> RunCoordinator {
    let metrics = Telemetry::metrics_only().expect("metrics").metrics();
    RunCoordinator::new(dao.clone(), llm.clone(), settings(concurrency), metrics)
}

#[tokio::test(start_paused = true)]
async fn hanging_item_fails_while_the_rest_complete() {
    let dao = Arc::new(MemoryClassificationDao::new());
    let items = dao.enqueue(&transcripts(5)).await.expect("enqueue");
    let llm = Arc::new(StubLlm::hanging_on("#3"));
    let coordinator = coordinator(&dao, &llm, 2);

    let outcome = coordinator.run_batch(Some(10)).await.expect("batch runs");

    assert_eq!(outcome.processed_count, 5);
    assert_eq!(outcome.ok_count, 4);
    assert_eq!(outcome.error_count, 1);
    assert_eq!(outcome.skipped_count, 0);
    assert_eq!(outcome.concurrency, 2);
    assert_eq!(outcome.failures.len(), 1);

    let hung = &items[2];
    let failure = &outcome.failures[0];
    assert_eq!(failure.item_id, hung.id);
    assert!(!failure.reason.is_empty());
    assert!(failure.reason.chars().count() <= 900);
    assert!(failure.reason.contains("timed out"));
    assert_eq!(llm.calls_for("transcript #3"), 2);

    let stored_hung = dao.item(hung.id).await.expect("present");
    assert_eq!(stored_hung.status, ItemStatus::Error);
    assert_eq!(stored_hung.error.as_deref(), Some(failure.reason.as_str()));
    assert!(dao.result_for_item(hung.id).await.expect("read").is_none());

    for item in items.iter().filter(|item| item.id != hung.id) {
        let stored = dao.item(item.id).await.expect("present");
        assert_eq!(stored.status, ItemStatus::Done);
        assert_eq!(stored.error, None);
        let result = dao
            .result_for_item(item.id)
            .await
            .expect("read")
            .expect("result persisted");
        assert_eq!(result.result.summary, format!("classified: {}", item.input_text));
        assert_eq!(result.result.deal_stage, DealStage::Discovery);
        assert_eq!(result.result.fit_score, 65);
    }

    let status = coordinator.status().await.expect("status");
    assert_eq!(status.done, 4);
    assert_eq!(status.error, 1);
    assert_eq!(status.pending, 0);
    assert_eq!(status.total_results, 4);
    assert_eq!(status.last_run.map(|run| run.processed), Some(5));
}

#[tokio::test(start_paused = true)]
async fn done_items_are_not_reprocessed_until_reset() {
    let dao = Arc::new(MemoryClassificationDao::new());
    dao.enqueue(&transcripts(3)).await.expect("enqueue");
    let llm = Arc::new(StubLlm::hanging_on("#2"));
    let coordinator = coordinator(&dao, &llm, 3);

    coordinator.run_batch(None).await.expect("first batch");
    let calls_after_first = llm.total_calls();

    let second = coordinator.run_batch(None).await.expect("second batch");
    assert_eq!(second.processed_count, 0);
    assert_eq!(llm.total_calls(), calls_after_first);

    let requeued = dao.requeue_errors(10).await.expect("requeue");
    assert_eq!(requeued.len(), 1);

    let third = coordinator.run_batch(None).await.expect("third batch");
    assert_eq!(third.processed_count, 1);
    assert_eq!(llm.calls_for("transcript #1"), 1);
    assert_eq!(llm.calls_for("transcript #3"), 1);
    assert_eq!(llm.calls_for("transcript #2"), 4);
}

#[tokio::test(start_paused = true)]
async fn concurrent_batches_split_the_queue_without_duplicates() {
    let dao = Arc::new(MemoryClassificationDao::new());
    let items = dao.enqueue(&transcripts(12)).await.expect("enqueue");
    let llm = Arc::new(StubLlm::new());
    let first = coordinator(&dao, &llm, 3);
    let second = coordinator(&dao, &llm, 2);

    let (a, b) = tokio::join!(first.run_batch(Some(12)), second.run_batch(Some(12)));
    let (a, b) = (a.expect("first batch"), b.expect("second batch"));

    assert_eq!(a.processed_count + b.processed_count, 12);
    assert_eq!(a.error_count + b.error_count, 0);
    for item in &items {
        assert_eq!(llm.calls_for(&item.input_text), 1, "{} classified twice", item.input_text);
    }

    let results = dao.latest_results(100, None).await.expect("results");
    assert_eq!(results.next_cursor, None);
    let unique: HashSet<_> = results.items.iter().map(|stored| stored.item_id).collect();
    assert_eq!(unique.len(), 12);
}

#[tokio::test(start_paused = true)]
async fn batch_limit_is_clamped_to_the_maximum() {
    let dao = Arc::new(MemoryClassificationDao::new());
    dao.enqueue(&transcripts(105)).await.expect("enqueue");
    let llm = Arc::new(StubLlm::new());
    let coordinator = coordinator(&dao, &llm, 8);

    let outcome = coordinator.run_batch(Some(1_000)).await.expect("batch runs");

    assert_eq!(outcome.processed_count, 100);
    assert_eq!(dao.status_counts().await.expect("counts").pending, 5);
}
