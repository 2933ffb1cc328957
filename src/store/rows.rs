use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One cached entity snapshot as persisted in its record table.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RecordRow {
    pub id: String,
    /// Full entity field set as JSON text.
    pub payload: String,
    /// Microseconds since the Unix epoch of the last local write.
    pub last_modified_at: i64,
    /// True while this record (or its latest edit) has not been confirmed
    /// by the remote service.
    pub origin_local: bool,
    /// Tombstone flag for offline deletes pending confirmation.
    pub deleted: bool,
}

/// One durable queue entry as persisted in `sync_queue`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct QueueRow {
    pub id: i64,
    pub entity_type: String,
    pub action: String,
    pub payload: String,
    pub temp_id: Option<String>,
    /// Microseconds since the Unix epoch; the queue's ordering key.
    pub enqueued_at: i64,
    pub attempt_count: i64,
    pub last_error: Option<String>,
    pub status: String,
}

/// Insert shape for a queue entry; the store assigns the row id.
#[derive(Debug, Clone)]
pub struct NewQueueRow {
    pub entity_type: String,
    pub action: String,
    pub payload: String,
    pub temp_id: Option<String>,
    pub enqueued_at: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueCounts {
    pub pending: i64,
    pub in_flight: i64,
    pub failed: i64,
    pub total: i64,
}
