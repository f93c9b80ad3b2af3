use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::classification::ClassificationResult;
use crate::queue::ItemStatus;

/// Number of items per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub pending: u64,
    pub processing: u64,
    pub done: u64,
    pub error: u64,
}

impl StatusCounts {
    #[must_use]
    pub fn total(&self) -> u64 {
        self.pending + self.processing + self.done + self.error
    }

    pub fn add(&mut self, status: ItemStatus, count: u64) {
        let slot = match status {
            ItemStatus::Pending => &mut self.pending,
            ItemStatus::Processing => &mut self.processing,
            ItemStatus::Done => &mut self.done,
            ItemStatus::Error => &mut self.error,
        };
        *slot += count;
    }
}

/// A persisted classification together with its owning item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredResult {
    pub item_id: Uuid,
    pub result: ClassificationResult,
    pub updated_at: DateTime<Utc>,
}

/// One newest-first page; pass `next_cursor` back to resume after its last entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<Uuid>,
}

impl<T> Page<T> {
    /// Builds a page from rows fetched with `limit + 1` as the row limit.
    pub(crate) fn from_overfetch(mut rows: Vec<T>, limit: usize, key: impl Fn(&T) -> Uuid) -> Self {
        let has_more = rows.len() > limit;
        rows.truncate(limit);
        let next_cursor = if has_more { rows.last().map(key) } else { None };
        Self {
            items: rows,
            next_cursor,
        }
    }
}
