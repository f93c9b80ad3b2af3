use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::ClassificationDao;
use super::models::{Page, StatusCounts, StoredResult};
use crate::classification::ClassificationResult;
use crate::queue::{ItemStatus, QueueItem};

#[derive(Default)]
struct State {
    /// Insertion order doubles as creation order.
    items: Vec<QueueItem>,
    results: HashMap<Uuid, (u64, StoredResult)>,
    writes: u64,
}

impl State {
    /// The item when it still holds exactly the claim in `claimed`.
    fn owned_mut(&mut self, claimed: &QueueItem) -> Option<&mut QueueItem> {
        self.items.iter_mut().find(|item| {
            item.id == claimed.id
                && item.status == ItemStatus::Processing
                && item.claimed_at == claimed.claimed_at
        })
    }
}

/// In-process store with the same claim semantics as the Postgres one.
#[derive(Default)]
pub struct MemoryClassificationDao {
    state: Mutex<State>,
    fail_completions: AtomicBool,
}

impl MemoryClassificationDao {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of one item.
    pub async fn item(&self, id: Uuid) -> Option<QueueItem> {
        let state = self.state.lock().await;
        state.items.iter().find(|item| item.id == id).cloned()
    }

    /// Makes every subsequent `complete_item` fail before writing anything.
    pub fn fail_completions(&self, fail: bool) {
        self.fail_completions.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ClassificationDao for MemoryClassificationDao {
    async fn list_pending(&self, limit: usize) -> Result<Vec<QueueItem>> {
        let state = self.state.lock().await;
        Ok(state
            .items
            .iter()
            .filter(|item| item.status == ItemStatus::Pending)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn transition_status(
        &self,
        ids: &[Uuid],
        from: ItemStatus,
        to: ItemStatus,
    ) -> Result<Vec<Uuid>> {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        let mut moved = Vec::new();
        for item in &mut state.items {
            if item.status == from && ids.contains(&item.id) {
                item.status = to;
                if to == ItemStatus::Processing {
                    item.claimed_at = Some(now);
                }
                moved.push(item.id);
            }
        }
        Ok(moved)
    }

    async fn items_with_status(&self, ids: &[Uuid], status: ItemStatus) -> Result<Vec<QueueItem>> {
        let state = self.state.lock().await;
        Ok(state
            .items
            .iter()
            .filter(|item| item.status == status && ids.contains(&item.id))
            .cloned()
            .collect())
    }

    async fn complete_item(
        &self,
        claimed: &QueueItem,
        result: &ClassificationResult,
    ) -> Result<bool> {
        if self.fail_completions.load(Ordering::SeqCst) {
            bail!("result store unavailable");
        }
        let mut state = self.state.lock().await;
        let Some(item) = state.owned_mut(claimed) else {
            return Ok(false);
        };
        item.status = ItemStatus::Done;
        item.error = None;

        state.writes += 1;
        let seq = state.writes;
        state.results.insert(
            claimed.id,
            (
                seq,
                StoredResult {
                    item_id: claimed.id,
                    result: result.clone(),
                    updated_at: Utc::now(),
                },
            ),
        );
        Ok(true)
    }

    async fn fail_item(&self, claimed: &QueueItem, reason: &str) -> Result<bool> {
        let mut state = self.state.lock().await;
        let Some(item) = state.owned_mut(claimed) else {
            return Ok(false);
        };
        item.status = ItemStatus::Error;
        item.error = Some(reason.to_string());
        Ok(true)
    }

    async fn status_counts(&self) -> Result<StatusCounts> {
        let state = self.state.lock().await;
        let mut counts = StatusCounts::default();
        for item in &state.items {
            counts.add(item.status, 1);
        }
        Ok(counts)
    }

    async fn count_results(&self) -> Result<u64> {
        let state = self.state.lock().await;
        Ok(u64::try_from(state.results.len()).unwrap_or(u64::MAX))
    }

    async fn result_for_item(&self, item_id: Uuid) -> Result<Option<StoredResult>> {
        let state = self.state.lock().await;
        Ok(state.results.get(&item_id).map(|(_, stored)| stored.clone()))
    }

    async fn latest_results(&self, limit: usize, cursor: Option<Uuid>) -> Result<Page<StoredResult>> {
        let state = self.state.lock().await;
        let mut rows: Vec<&(u64, StoredResult)> = state.results.values().collect();
        rows.sort_by(|a, b| b.0.cmp(&a.0));

        let after = match cursor {
            Some(id) => match state.results.get(&id) {
                Some((seq, _)) => Some(*seq),
                None => {
                    return Ok(Page {
                        items: Vec::new(),
                        next_cursor: None,
                    });
                }
            },
            None => None,
        };
        let page: Vec<StoredResult> = rows
            .into_iter()
            .filter(|(seq, _)| after.is_none_or(|cursor_seq| *seq < cursor_seq))
            .take(limit.saturating_add(1))
            .map(|(_, stored)| stored.clone())
            .collect();
        Ok(Page::from_overfetch(page, limit, |stored| stored.item_id))
    }

    async fn list_items(
        &self,
        status: Option<ItemStatus>,
        limit: usize,
        cursor: Option<Uuid>,
    ) -> Result<Page<QueueItem>> {
        let state = self.state.lock().await;
        let mut newest_first = state.items.iter().rev();
        if let Some(id) = cursor {
            // unknown cursors yield an empty page
            if !newest_first.by_ref().any(|item| item.id == id) {
                return Ok(Page {
                    items: Vec::new(),
                    next_cursor: None,
                });
            }
        }
        let rows: Vec<QueueItem> = newest_first
            .filter(|item| status.is_none_or(|wanted| item.status == wanted))
            .take(limit.saturating_add(1))
            .cloned()
            .collect();
        Ok(Page::from_overfetch(rows, limit, |item| item.id))
    }

    async fn enqueue(&self, texts: &[String]) -> Result<Vec<QueueItem>> {
        let mut state = self.state.lock().await;
        let created: Vec<QueueItem> = texts
            .iter()
            .map(|text| text.trim())
            .filter(|text| !text.is_empty())
            .map(QueueItem::pending)
            .collect();
        state.items.extend(created.iter().cloned());
        Ok(created)
    }

    async fn requeue_errors(&self, limit: usize) -> Result<Vec<Uuid>> {
        let mut state = self.state.lock().await;
        let mut reset = Vec::new();
        for item in state
            .items
            .iter_mut()
            .filter(|item| item.status == ItemStatus::Error)
            .take(limit)
        {
            item.status = ItemStatus::Pending;
            item.error = None;
            item.claimed_at = None;
            reset.push(item.id);
        }
        Ok(reset)
    }

    async fn release_stale(&self, older_than: Duration) -> Result<Vec<Uuid>> {
        let age = chrono::Duration::from_std(older_than).context("stale threshold out of range")?;
        let cutoff = Utc::now() - age;
        let mut state = self.state.lock().await;
        let mut released = Vec::new();
        for item in &mut state.items {
            let stale = item.status == ItemStatus::Processing
                && item.claimed_at.is_none_or(|claimed| claimed <= cutoff);
            if stale {
                item.status = ItemStatus::Pending;
                item.claimed_at = None;
                released.push(item.id);
            }
        }
        Ok(released)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
