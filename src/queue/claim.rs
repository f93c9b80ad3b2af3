use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info};
use uuid::Uuid;

use super::types::{ItemStatus, QueueItem};
use crate::store::ClassificationDao;

/// Result of one claim round.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClaimOutcome {
    /// Items now owned by this runner, oldest first.
    pub items: Vec<QueueItem>,
    /// Items that were pending when selected but were taken by a concurrent runner.
    pub skipped: usize,
}

/// Moves pending items to `processing` so that each one has a single owner.
#[derive(Clone)]
pub struct ClaimManager {
    dao: Arc<dyn ClassificationDao>,
}

impl ClaimManager {
    #[must_use]
    pub fn new(dao: Arc<dyn ClassificationDao>) -> Self {
        Self { dao }
    }

    /// Claims up to `limit` of the oldest pending items.
    ///
    /// The conditional `pending → processing` transition is the only
    /// concurrency guard: only ids it reports back are re-read and returned.
    ///
    /// # Errors
    /// Propagates storage failures.
    pub async fn claim(&self, limit: usize) -> Result<ClaimOutcome> {
        if limit == 0 {
            return Ok(ClaimOutcome::default());
        }

        let candidates = self
            .dao
            .list_pending(limit)
            .await
            .context("failed to list pending items")?;
        if candidates.is_empty() {
            debug!("no pending items to claim");
            return Ok(ClaimOutcome::default());
        }

        let ids: Vec<Uuid> = candidates.iter().map(|item| item.id).collect();
        let claimed_ids = self
            .dao
            .transition_status(&ids, ItemStatus::Pending, ItemStatus::Processing)
            .await
            .context("failed to claim pending items")?;

        let items = if claimed_ids.is_empty() {
            Vec::new()
        } else {
            self.dao
                .items_with_status(&claimed_ids, ItemStatus::Processing)
                .await
                .context("failed to load claimed items")?
        };
        let skipped = ids.len().saturating_sub(claimed_ids.len());

        info!(
            selected = ids.len(),
            claimed = items.len(),
            skipped,
            "claimed pending items"
        );

        Ok(ClaimOutcome { items, skipped })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryClassificationDao;
    use std::collections::HashSet;

    async fn seeded(count: usize) -> (Arc<MemoryClassificationDao>, Vec<Uuid>) {
        let dao = Arc::new(MemoryClassificationDao::new());
        let texts: Vec<String> = (0..count).map(|i| format!("transcript {i}")).collect();
        let items = dao.enqueue(&texts).await.expect("enqueue succeeds");
        (dao, items.into_iter().map(|item| item.id).collect())
    }

    #[tokio::test]
    async fn claims_oldest_items_first() {
        let (dao, ids) = seeded(5).await;
        let manager = ClaimManager::new(dao.clone());

        let outcome = manager.claim(3).await.expect("claim succeeds");

        let claimed: Vec<Uuid> = outcome.items.iter().map(|item| item.id).collect();
        assert_eq!(claimed, ids[..3].to_vec());
        assert!(outcome.items.iter().all(|item| item.status == ItemStatus::Processing));
        assert!(outcome.items.iter().all(|item| item.claimed_at.is_some()));
        assert_eq!(outcome.skipped, 0);
    }

    #[tokio::test]
    async fn empty_queue_is_not_an_error() {
        let (dao, _) = seeded(0).await;
        let outcome = ClaimManager::new(dao).claim(10).await.expect("claim succeeds");
        assert_eq!(outcome, ClaimOutcome::default());
    }

    #[tokio::test]
    async fn concurrent_claims_never_overlap() {
        let (dao, ids) = seeded(20).await;
        let first = ClaimManager::new(dao.clone());
        let second = ClaimManager::new(dao.clone());

        let (a, b) = tokio::join!(first.claim(20), second.claim(20));
        let (a, b) = (a.expect("first claim"), b.expect("second claim"));

        let mut seen = HashSet::new();
        for item in a.items.iter().chain(b.items.iter()) {
            assert!(seen.insert(item.id), "item {} claimed twice", item.id);
        }
        assert_eq!(seen, ids.into_iter().collect::<HashSet<_>>());
        assert_eq!(a.items.len() + b.items.len(), 20);
    }

    #[tokio::test]
    async fn processing_items_are_not_reclaimed() {
        let (dao, _) = seeded(2).await;
        let manager = ClaimManager::new(dao);

        assert_eq!(manager.claim(10).await.expect("first claim").items.len(), 2);
        let again = manager.claim(10).await.expect("second claim");
        assert!(again.items.is_empty());
        assert_eq!(again.skipped, 0);
    }
}
