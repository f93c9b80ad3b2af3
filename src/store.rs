//! Persistence of queue items and classification results.
mod memory;
mod models;
mod postgres;

use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::classification::ClassificationResult;
use crate::queue::{ItemStatus, QueueItem};

pub use memory::MemoryClassificationDao;
pub use models::{Page, StatusCounts, StoredResult};
pub use postgres::PgClassificationDao;

#[async_trait]
pub trait ClassificationDao: Send + Sync {
    // Claiming
    /// Up to `limit` pending items, oldest first.
    async fn list_pending(&self, limit: usize) -> anyhow::Result<Vec<QueueItem>>;

    /// Moves the items among `ids` whose status is still `from` to `to` and
    /// returns exactly those ids. Moving to `processing` stamps `claimed_at`.
    async fn transition_status(
        &self,
        ids: &[Uuid],
        from: ItemStatus,
        to: ItemStatus,
    ) -> anyhow::Result<Vec<Uuid>>;

    /// Items among `ids` currently in `status`, oldest first.
    async fn items_with_status(
        &self,
        ids: &[Uuid],
        status: ItemStatus,
    ) -> anyhow::Result<Vec<QueueItem>>;

    // Per-item bookkeeping
    /// Stores `result` and marks the item `done` as one atomic write, but
    /// only while the item still holds the claim described by `claimed`
    /// (`processing` with the same claim stamp). Returns `false`, writing
    /// nothing, when the claim was lost.
    async fn complete_item(
        &self,
        claimed: &QueueItem,
        result: &ClassificationResult,
    ) -> anyhow::Result<bool>;

    /// Marks a still-claimed item `error` with `reason`, leaving any stored
    /// result untouched. Returns `false` when the claim was lost.
    async fn fail_item(&self, claimed: &QueueItem, reason: &str) -> anyhow::Result<bool>;

    // Reporting
    async fn status_counts(&self) -> anyhow::Result<StatusCounts>;

    async fn count_results(&self) -> anyhow::Result<u64>;

    async fn result_for_item(&self, item_id: Uuid) -> anyhow::Result<Option<StoredResult>>;

    /// Most recently written results first, resuming after `cursor` (an item id).
    async fn latest_results(
        &self,
        limit: usize,
        cursor: Option<Uuid>,
    ) -> anyhow::Result<Page<StoredResult>>;

    /// Newest items first, optionally filtered by status, resuming after
    /// `cursor` (an item id).
    async fn list_items(
        &self,
        status: Option<ItemStatus>,
        limit: usize,
        cursor: Option<Uuid>,
    ) -> anyhow::Result<Page<QueueItem>>;

    // Administration
    /// Inserts one pending item per non-blank text.
    async fn enqueue(&self, texts: &[String]) -> anyhow::Result<Vec<QueueItem>>;

    /// Resets up to `limit` errored items to `pending`, oldest first.
    async fn requeue_errors(&self, limit: usize) -> anyhow::Result<Vec<Uuid>>;

    /// Resets `processing` items claimed more than `older_than` ago.
    async fn release_stale(&self, older_than: Duration) -> anyhow::Result<Vec<Uuid>>;

    async fn ping(&self) -> anyhow::Result<()>;
}
