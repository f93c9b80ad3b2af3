use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of a queue item.
///
/// `pending → processing → {done | error}`; only an operator moves an item
/// back to `pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Pending,
    Processing,
    Done,
    Error,
}

impl ItemStatus {
    pub const ALL: [Self; 4] = [Self::Pending, Self::Processing, Self::Done, Self::Error];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ItemStatus::Pending => "pending",
            ItemStatus::Processing => "processing",
            ItemStatus::Done => "done",
            ItemStatus::Error => "error",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ItemStatus::Pending),
            "processing" => Some(ItemStatus::Processing),
            "done" => Some(ItemStatus::Done),
            "error" => Some(ItemStatus::Error),
            _ => None,
        }
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One transcript in the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: Uuid,
    pub input_text: String,
    pub status: ItemStatus,
    /// Last failure reason, already truncated.
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Set on the transition to `processing`.
    pub claimed_at: Option<DateTime<Utc>>,
}

impl QueueItem {
    #[must_use]
    pub fn pending(input_text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            input_text: input_text.into(),
            status: ItemStatus::Pending,
            error: None,
            created_at: Utc::now(),
            claimed_at: None,
        }
    }
}
