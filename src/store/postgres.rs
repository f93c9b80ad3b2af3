use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{Executor, PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use super::ClassificationDao;
use super::models::{Page, StatusCounts, StoredResult};
use crate::classification::ClassificationResult;
use crate::queue::{ItemStatus, QueueItem};

const SCHEMA_DDL: &str = r"
CREATE TABLE IF NOT EXISTS classification_items (
    id UUID PRIMARY KEY,
    input_text TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending'
        CHECK (status IN ('pending', 'processing', 'done', 'error')),
    error TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    claimed_at TIMESTAMPTZ,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS classification_items_status_created_idx
    ON classification_items (status, created_at);

CREATE TABLE IF NOT EXISTS classification_results (
    item_id UUID PRIMARY KEY REFERENCES classification_items(id) ON DELETE CASCADE,
    version TEXT NOT NULL,
    deal_stage TEXT NOT NULL,
    intent_level TEXT NOT NULL,
    risk_level TEXT NOT NULL,
    fit_score SMALLINT NOT NULL,
    confidence DOUBLE PRECISION NOT NULL,
    document JSONB NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);
";

const ITEM_COLUMNS: &str = "id, input_text, status, error, created_at, claimed_at";

fn to_i64(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn to_u64(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

/// Postgres-backed store.
#[derive(Debug, Clone)]
pub struct PgClassificationDao {
    pool: PgPool,
}

impl PgClassificationDao {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Creates the queue and result tables when they do not exist yet.
    ///
    /// # Errors
    /// Fails when the DDL cannot be executed.
    pub async fn ensure_schema(&self) -> Result<()> {
        self.pool
            .execute(SCHEMA_DDL)
            .await
            .context("failed to create classification schema")?;
        Ok(())
    }

    fn row_to_item(row: &PgRow) -> Result<QueueItem> {
        let status_str: String = row.try_get("status").context("failed to get status")?;
        let status = ItemStatus::parse(&status_str)
            .with_context(|| format!("invalid item status: {status_str}"))?;

        Ok(QueueItem {
            id: row.try_get("id").context("failed to get id")?,
            input_text: row
                .try_get("input_text")
                .context("failed to get input_text")?,
            status,
            error: row.try_get("error").context("failed to get error")?,
            created_at: row
                .try_get("created_at")
                .context("failed to get created_at")?,
            claimed_at: row
                .try_get("claimed_at")
                .context("failed to get claimed_at")?,
        })
    }

    fn row_to_result(row: &PgRow) -> Result<StoredResult> {
        let item_id: Uuid = row.try_get("item_id").context("failed to get item_id")?;
        let document: Value = row.try_get("document").context("failed to get document")?;
        let updated_at: DateTime<Utc> = row
            .try_get("updated_at")
            .context("failed to get updated_at")?;
        let result: ClassificationResult = serde_json::from_value(document)
            .with_context(|| format!("failed to decode stored result for item {item_id}"))?;

        Ok(StoredResult {
            item_id,
            result,
            updated_at,
        })
    }

    fn rows_to_items(rows: &[PgRow]) -> Result<Vec<QueueItem>> {
        rows.iter().map(Self::row_to_item).collect()
    }

    fn rows_to_ids(rows: &[PgRow]) -> Result<Vec<Uuid>> {
        rows.iter()
            .map(|row| row.try_get("id").context("failed to get id"))
            .collect()
    }
}

#[async_trait]
impl ClassificationDao for PgClassificationDao {
    async fn list_pending(&self, limit: usize) -> Result<Vec<QueueItem>> {
        let rows = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM classification_items \
             WHERE status = 'pending' ORDER BY created_at ASC, id ASC LIMIT $1"
        ))
        .bind(to_i64(limit))
        .fetch_all(&self.pool)
        .await
        .context("failed to list pending items")?;

        Self::rows_to_items(&rows)
    }

    async fn transition_status(
        &self,
        ids: &[Uuid],
        from: ItemStatus,
        to: ItemStatus,
    ) -> Result<Vec<Uuid>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            r"
            UPDATE classification_items
            SET status = $3,
                claimed_at = CASE WHEN $3 = 'processing' THEN NOW() ELSE claimed_at END,
                updated_at = NOW()
            WHERE id = ANY($1) AND status = $2
            RETURNING id
            ",
        )
        .bind(ids)
        .bind(from.as_str())
        .bind(to.as_str())
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("failed to move items from {from} to {to}"))?;

        Self::rows_to_ids(&rows)
    }

    async fn items_with_status(&self, ids: &[Uuid], status: ItemStatus) -> Result<Vec<QueueItem>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM classification_items \
             WHERE id = ANY($1) AND status = $2 ORDER BY created_at ASC, id ASC"
        ))
        .bind(ids)
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await
        .context("failed to load items by status")?;

        Self::rows_to_items(&rows)
    }

    async fn complete_item(
        &self,
        claimed: &QueueItem,
        result: &ClassificationResult,
    ) -> Result<bool> {
        let document = serde_json::to_value(result).context("failed to encode result")?;
        let mut tx = self
            .pool
            .begin()
            .await
            .context("failed to begin completion transaction")?;

        let finished = sqlx::query(
            r"
            UPDATE classification_items
            SET status = 'done',
                error = NULL,
                updated_at = NOW()
            WHERE id = $1
              AND status = 'processing'
              AND claimed_at IS NOT DISTINCT FROM $2
            ",
        )
        .bind(claimed.id)
        .bind(claimed.claimed_at)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("failed to mark item {} done", claimed.id))?;

        if finished.rows_affected() == 0 {
            tx.rollback()
                .await
                .context("failed to roll back lost completion")?;
            return Ok(false);
        }

        sqlx::query(
            r"
            INSERT INTO classification_results
                (item_id, version, deal_stage, intent_level, risk_level,
                 fit_score, confidence, document)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (item_id) DO UPDATE
            SET version = EXCLUDED.version,
                deal_stage = EXCLUDED.deal_stage,
                intent_level = EXCLUDED.intent_level,
                risk_level = EXCLUDED.risk_level,
                fit_score = EXCLUDED.fit_score,
                confidence = EXCLUDED.confidence,
                document = EXCLUDED.document,
                updated_at = NOW()
            ",
        )
        .bind(claimed.id)
        .bind(&result.version)
        .bind(result.deal_stage.to_string())
        .bind(result.intent_level.to_string())
        .bind(result.risk_level.to_string())
        .bind(i16::from(result.fit_score))
        .bind(result.confidence)
        .bind(document)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("failed to upsert result for item {}", claimed.id))?;

        tx.commit()
            .await
            .with_context(|| format!("failed to commit completion of item {}", claimed.id))?;
        Ok(true)
    }

    async fn fail_item(&self, claimed: &QueueItem, reason: &str) -> Result<bool> {
        let failed = sqlx::query(
            r"
            UPDATE classification_items
            SET status = 'error',
                error = $3,
                updated_at = NOW()
            WHERE id = $1
              AND status = 'processing'
              AND claimed_at IS NOT DISTINCT FROM $2
            ",
        )
        .bind(claimed.id)
        .bind(claimed.claimed_at)
        .bind(reason)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to mark item {} errored", claimed.id))?;

        Ok(failed.rows_affected() > 0)
    }

    async fn status_counts(&self) -> Result<StatusCounts> {
        let rows = sqlx::query(
            "SELECT status, COUNT(*) AS n FROM classification_items GROUP BY status",
        )
        .fetch_all(&self.pool)
        .await
        .context("failed to count items by status")?;

        let mut counts = StatusCounts::default();
        for row in rows {
            let status_str: String = row.try_get("status").context("failed to get status")?;
            let n: i64 = row.try_get("n").context("failed to get count")?;
            if let Some(status) = ItemStatus::parse(&status_str) {
                counts.add(status, to_u64(n));
            }
        }
        Ok(counts)
    }

    async fn count_results(&self) -> Result<u64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM classification_results")
            .fetch_one(&self.pool)
            .await
            .context("failed to count results")?;
        let n: i64 = row.try_get("n").context("failed to get count")?;
        Ok(to_u64(n))
    }

    async fn result_for_item(&self, item_id: Uuid) -> Result<Option<StoredResult>> {
        let row = sqlx::query(
            "SELECT item_id, document, updated_at FROM classification_results WHERE item_id = $1",
        )
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("failed to load result for item {item_id}"))?;

        row.as_ref().map(Self::row_to_result).transpose()
    }

    async fn latest_results(&self, limit: usize, cursor: Option<Uuid>) -> Result<Page<StoredResult>> {
        let rows = sqlx::query(
            r"
            SELECT item_id, document, updated_at
            FROM classification_results
            WHERE $1::uuid IS NULL
               OR (updated_at, item_id) < (
                    SELECT updated_at, item_id FROM classification_results WHERE item_id = $1
               )
            ORDER BY updated_at DESC, item_id DESC
            LIMIT $2
            ",
        )
        .bind(cursor)
        .bind(to_i64(limit.saturating_add(1)))
        .fetch_all(&self.pool)
        .await
        .context("failed to load latest results")?;

        let results = rows
            .iter()
            .map(Self::row_to_result)
            .collect::<Result<Vec<_>>>()?;
        Ok(Page::from_overfetch(results, limit, |stored| stored.item_id))
    }

    async fn list_items(
        &self,
        status: Option<ItemStatus>,
        limit: usize,
        cursor: Option<Uuid>,
    ) -> Result<Page<QueueItem>> {
        let rows = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM classification_items \
             WHERE ($1::text IS NULL OR status = $1) \
               AND ($2::uuid IS NULL OR (created_at, id) < ( \
                    SELECT created_at, id FROM classification_items WHERE id = $2)) \
             ORDER BY created_at DESC, id DESC \
             LIMIT $3"
        ))
        .bind(status.map(ItemStatus::as_str))
        .bind(cursor)
        .bind(to_i64(limit.saturating_add(1)))
        .fetch_all(&self.pool)
        .await
        .context("failed to list items")?;

        let items = Self::rows_to_items(&rows)?;
        Ok(Page::from_overfetch(items, limit, |item| item.id))
    }

    async fn enqueue(&self, texts: &[String]) -> Result<Vec<QueueItem>> {
        let items: Vec<QueueItem> = texts
            .iter()
            .map(|text| text.trim())
            .filter(|text| !text.is_empty())
            .map(QueueItem::pending)
            .collect();
        if items.is_empty() {
            return Ok(items);
        }

        let ids: Vec<Uuid> = items.iter().map(|item| item.id).collect();
        let bodies: Vec<String> = items.iter().map(|item| item.input_text.clone()).collect();

        // clock_timestamp() keeps created_at strictly increasing within the batch
        let rows = sqlx::query(&format!(
            "INSERT INTO classification_items (id, input_text, status, created_at) \
             SELECT id, input_text, 'pending', clock_timestamp() \
             FROM UNNEST($1::uuid[], $2::text[]) WITH ORDINALITY AS t(id, input_text, ord) \
             ORDER BY ord \
             RETURNING {ITEM_COLUMNS}"
        ))
        .bind(&ids)
        .bind(&bodies)
        .fetch_all(&self.pool)
        .await
        .context("failed to enqueue items")?;

        let mut inserted = Self::rows_to_items(&rows)?;
        inserted.sort_by_key(|item| item.created_at);
        Ok(inserted)
    }

    async fn requeue_errors(&self, limit: usize) -> Result<Vec<Uuid>> {
        let rows = sqlx::query(
            r"
            UPDATE classification_items
            SET status = 'pending',
                error = NULL,
                claimed_at = NULL,
                updated_at = NOW()
            WHERE id IN (
                SELECT id FROM classification_items
                WHERE status = 'error'
                ORDER BY created_at ASC
                LIMIT $1
            )
            AND status = 'error'
            RETURNING id
            ",
        )
        .bind(to_i64(limit))
        .fetch_all(&self.pool)
        .await
        .context("failed to requeue errored items")?;

        Self::rows_to_ids(&rows)
    }

    async fn release_stale(&self, older_than: Duration) -> Result<Vec<Uuid>> {
        let rows = sqlx::query(
            r"
            UPDATE classification_items
            SET status = 'pending',
                claimed_at = NULL,
                updated_at = NOW()
            WHERE status = 'processing'
              AND (claimed_at IS NULL OR claimed_at <= NOW() - make_interval(secs => $1))
            RETURNING id
            ",
        )
        .bind(older_than.as_secs_f64())
        .fetch_all(&self.pool)
        .await
        .context("failed to release stale claims")?;

        Self::rows_to_ids(&rows)
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .context("database ping failed")?;
        Ok(())
    }
}
