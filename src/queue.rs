use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entity::EntityType;
use crate::error::{Result, SyncError};
use crate::store::{LocalStore, NewQueueRow, QueueCounts, QueueRow};

pub use crate::store::FATAL_MARKER;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Update,
    Delete,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }

    fn parse(value: &str) -> Result<Self> {
        match value {
            "create" => Ok(Action::Create),
            "update" => Ok(Action::Update),
            "delete" => Ok(Action::Delete),
            other => Err(SyncError::InvalidInput(format!(
                "Unknown queue action: {other}"
            ))),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpStatus {
    Pending,
    InFlight,
    Failed,
}

impl OpStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OpStatus::Pending => "pending",
            OpStatus::InFlight => "in_flight",
            OpStatus::Failed => "failed",
        }
    }

    fn parse(value: &str) -> Result<Self> {
        match value {
            "pending" => Ok(OpStatus::Pending),
            "in_flight" => Ok(OpStatus::InFlight),
            "failed" => Ok(OpStatus::Failed),
            other => Err(SyncError::InvalidInput(format!(
                "Unknown queue status: {other}"
            ))),
        }
    }
}

/// A durable, ordered intent to mutate the remote state.
#[derive(Debug, Clone)]
pub struct QueuedOperation {
    pub id: i64,
    pub entity_type: EntityType,
    pub action: Action,
    /// Full entity for create/update, `{"id": ...}` for delete.
    pub payload: Value,
    /// Set when the operation created an entity under a temporary id.
    pub temporary_id: Option<String>,
    /// Microseconds since the Unix epoch; the sole ordering key.
    pub enqueued_at: i64,
    pub attempt_count: u32,
    pub last_error: Option<String>,
    pub status: OpStatus,
}

impl QueuedOperation {
    fn from_row(row: QueueRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            entity_type: EntityType::new(row.entity_type).map_err(SyncError::InvalidInput)?,
            action: Action::parse(&row.action)?,
            payload: serde_json::from_str(&row.payload)?,
            temporary_id: row.temp_id,
            enqueued_at: row.enqueued_at,
            attempt_count: row.attempt_count.max(0) as u32,
            last_error: row.last_error,
            status: OpStatus::parse(&row.status)?,
        })
    }

    /// True when the last replay attempt was rejected for good and the
    /// entry is excluded from automatic retry.
    pub fn is_fatal(&self) -> bool {
        self.last_error
            .as_deref()
            .is_some_and(|e| e.starts_with(FATAL_MARKER))
    }
}

/// Durable FIFO log of pending mutations over the `sync_queue` table.
///
/// One entry models exactly one gateway-level mutation; entries are never
/// merged or collapsed, even for the same entity. Dependencies between
/// entries are resolved at replay time through identifier rewriting, not
/// through queue compaction.
#[derive(Clone)]
pub struct MutationQueue {
    store: Arc<LocalStore>,
}

impl MutationQueue {
    pub fn new(store: Arc<LocalStore>) -> Self {
        Self { store }
    }

    /// Appends a pending entry and returns its queue id. The write is
    /// durable before this returns.
    pub async fn enqueue(
        &self,
        entity: &EntityType,
        action: Action,
        payload: &Value,
        temporary_id: Option<String>,
    ) -> Result<i64> {
        let row = NewQueueRow {
            entity_type: entity.as_str().to_string(),
            action: action.as_str().to_string(),
            payload: serde_json::to_string(payload)?,
            temp_id: temporary_id,
            enqueued_at: Utc::now().timestamp_micros(),
        };
        let id = self.store.insert_queue_entry(&row).await?;
        tracing::debug!(queue_id = id, entity = %entity, %action, "enqueued mutation");
        Ok(id)
    }

    pub async fn get(&self, id: i64) -> Result<Option<QueuedOperation>> {
        match self.store.get_queue_entry(id).await? {
            Some(row) => Ok(Some(QueuedOperation::from_row(row)?)),
            None => Ok(None),
        }
    }

    /// Pending entries, oldest first.
    pub async fn list_pending(&self) -> Result<Vec<QueuedOperation>> {
        let rows = self.store.queue_by_status(OpStatus::Pending.as_str()).await?;
        rows.into_iter().map(QueuedOperation::from_row).collect()
    }

    pub async fn list_failed(&self) -> Result<Vec<QueuedOperation>> {
        let rows = self.store.queue_by_status(OpStatus::Failed.as_str()).await?;
        rows.into_iter().map(QueuedOperation::from_row).collect()
    }

    pub async fn list_for_entity(&self, entity: &EntityType) -> Result<Vec<QueuedOperation>> {
        let rows = self.store.queue_by_entity(entity).await?;
        rows.into_iter().map(QueuedOperation::from_row).collect()
    }

    pub async fn mark_in_flight(&self, id: i64) -> Result<()> {
        self.store
            .set_queue_status(id, OpStatus::InFlight.as_str())
            .await
    }

    /// Deletes the entry outright; there is no "succeeded" state.
    pub async fn mark_succeeded(&self, id: i64) -> Result<()> {
        self.store.delete_queue_entry(id).await
    }

    pub async fn mark_failed(&self, id: i64, message: &str) -> Result<()> {
        self.store.mark_queue_failed(id, message).await
    }

    /// Manual retry of one failed entry; works on fatal entries too.
    pub async fn reset_to_pending(&self, id: i64) -> Result<bool> {
        self.store.reset_queue_entry(id).await
    }

    /// Automatic-retry set: every failed entry except those marked fatal.
    pub async fn reset_all_failed_to_pending(&self) -> Result<u64> {
        self.store.reset_failed_entries(false).await
    }

    /// Returns entries left `in_flight` by an interrupted pass to pending
    /// so the next pass picks them up again.
    pub async fn recover_in_flight(&self) -> Result<u64> {
        self.store.reset_in_flight_entries().await
    }

    pub async fn stats(&self) -> Result<QueueCounts> {
        self.store.queue_counts().await
    }
}
