use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Row, Sqlite};

use crate::entity::EntityType;
use crate::error::{Result, SyncError};

use super::rows::{NewQueueRow, QueueCounts, QueueRow, RecordRow};

pub const FATAL_MARKER: &str = "FATAL: ";

/// Durable storage surviving process restarts: one record table per
/// registered entity type plus the `sync_queue` and `metadata` tables.
///
/// Every write is committed before the call returns; no transaction is ever
/// held open across an awaited network call. Storage errors propagate
/// uncaught — this layer does not retry.
pub struct LocalStore {
    pool: Pool<Sqlite>,
    entities: Vec<EntityType>,
}

impl LocalStore {
    pub async fn open(url: &str, entities: &[EntityType]) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(url)
            .await?;
        let store = Self {
            pool,
            entities: entities.to_vec(),
        };
        store.init_schema().await?;
        Ok(store)
    }

    pub async fn open_in_memory(entities: &[EntityType]) -> Result<Self> {
        Self::open("sqlite::memory:", entities).await
    }

    pub fn entities(&self) -> &[EntityType] {
        &self.entities
    }

    fn require_registered(&self, entity: &EntityType) -> Result<()> {
        if self.entities.contains(entity) {
            Ok(())
        } else {
            Err(SyncError::InvalidInput(format!(
                "Entity type is not registered with this store: {entity}"
            )))
        }
    }

    async fn init_schema(&self) -> Result<()> {
        for entity in &self.entities {
            let table = entity.as_str();
            sqlx::query(&format!(
                r#"
                CREATE TABLE IF NOT EXISTS {table} (
                    id TEXT PRIMARY KEY,
                    payload TEXT NOT NULL,
                    last_modified_at INTEGER NOT NULL,
                    origin_local INTEGER NOT NULL DEFAULT 0,
                    deleted INTEGER NOT NULL DEFAULT 0
                )
                "#
            ))
            .execute(&self.pool)
            .await?;

            sqlx::query(&format!(
                "CREATE INDEX IF NOT EXISTS idx_{table}_last_modified ON {table}(last_modified_at)"
            ))
            .execute(&self.pool)
            .await?;
            sqlx::query(&format!(
                "CREATE INDEX IF NOT EXISTS idx_{table}_origin ON {table}(origin_local)"
            ))
            .execute(&self.pool)
            .await?;
        }

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sync_queue (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                entity_type TEXT NOT NULL,
                action TEXT NOT NULL,
                payload TEXT NOT NULL,
                temp_id TEXT,
                enqueued_at INTEGER NOT NULL,
                attempt_count INTEGER NOT NULL DEFAULT 0,
                last_error TEXT,
                status TEXT NOT NULL DEFAULT 'pending'
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        for (name, column) in [
            ("idx_sync_queue_status", "status"),
            ("idx_sync_queue_enqueued", "enqueued_at"),
            ("idx_sync_queue_entity", "entity_type"),
        ] {
            sqlx::query(&format!(
                "CREATE INDEX IF NOT EXISTS {name} ON sync_queue({column})"
            ))
            .execute(&self.pool)
            .await?;
        }

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS metadata (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // Record tables

    pub async fn put_record(&self, entity: &EntityType, row: &RecordRow) -> Result<()> {
        self.require_registered(entity)?;
        sqlx::query(&format!(
            r#"
            INSERT INTO {} (id, payload, last_modified_at, origin_local, deleted)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(id) DO UPDATE SET
                payload = excluded.payload,
                last_modified_at = excluded.last_modified_at,
                origin_local = excluded.origin_local,
                deleted = excluded.deleted
            "#,
            entity.as_str()
        ))
        .bind(&row.id)
        .bind(&row.payload)
        .bind(row.last_modified_at)
        .bind(row.origin_local)
        .bind(row.deleted)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_record(&self, entity: &EntityType, id: &str) -> Result<Option<RecordRow>> {
        self.require_registered(entity)?;
        let row = sqlx::query_as::<_, RecordRow>(&format!(
            "SELECT * FROM {} WHERE id = ?1",
            entity.as_str()
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// All records of one entity type, oldest write first (id as tiebreak
    /// so the order is total).
    pub async fn all_records(&self, entity: &EntityType) -> Result<Vec<RecordRow>> {
        self.require_registered(entity)?;
        let rows = sqlx::query_as::<_, RecordRow>(&format!(
            "SELECT * FROM {} ORDER BY last_modified_at ASC, id ASC",
            entity.as_str()
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn records_by_origin(
        &self,
        entity: &EntityType,
        origin_local: bool,
    ) -> Result<Vec<RecordRow>> {
        self.require_registered(entity)?;
        let rows = sqlx::query_as::<_, RecordRow>(&format!(
            "SELECT * FROM {} WHERE origin_local = ?1 ORDER BY last_modified_at ASC, id ASC",
            entity.as_str()
        ))
        .bind(origin_local)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn delete_record(&self, entity: &EntityType, id: &str) -> Result<()> {
        self.require_registered(entity)?;
        sqlx::query(&format!("DELETE FROM {} WHERE id = ?1", entity.as_str()))
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn clear_records(&self, entity: &EntityType) -> Result<()> {
        self.require_registered(entity)?;
        sqlx::query(&format!("DELETE FROM {}", entity.as_str()))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // Queue table

    pub async fn insert_queue_entry(&self, row: &NewQueueRow) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO sync_queue (entity_type, action, payload, temp_id, enqueued_at, status)
            VALUES (?1, ?2, ?3, ?4, ?5, 'pending')
            "#,
        )
        .bind(&row.entity_type)
        .bind(&row.action)
        .bind(&row.payload)
        .bind(&row.temp_id)
        .bind(row.enqueued_at)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn get_queue_entry(&self, id: i64) -> Result<Option<QueueRow>> {
        let row = sqlx::query_as::<_, QueueRow>("SELECT * FROM sync_queue WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn queue_by_status(&self, status: &str) -> Result<Vec<QueueRow>> {
        let rows = sqlx::query_as::<_, QueueRow>(
            r#"
            SELECT * FROM sync_queue
            WHERE status = ?1
            ORDER BY enqueued_at ASC, id ASC
            "#,
        )
        .bind(status)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn queue_by_entity(&self, entity: &EntityType) -> Result<Vec<QueueRow>> {
        let rows = sqlx::query_as::<_, QueueRow>(
            r#"
            SELECT * FROM sync_queue
            WHERE entity_type = ?1
            ORDER BY enqueued_at ASC, id ASC
            "#,
        )
        .bind(entity.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn set_queue_status(&self, id: i64, status: &str) -> Result<()> {
        sqlx::query("UPDATE sync_queue SET status = ?1 WHERE id = ?2")
            .bind(status)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Records a failed replay attempt: bumps the attempt counter, stores
    /// the error message and moves the entry to `failed`.
    pub async fn mark_queue_failed(&self, id: i64, message: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE sync_queue
            SET status = 'failed',
                attempt_count = attempt_count + 1,
                last_error = ?1
            WHERE id = ?2
            "#,
        )
        .bind(message)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn delete_queue_entry(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM sync_queue WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn reset_queue_entry(&self, id: i64) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE sync_queue SET status = 'pending' WHERE id = ?1 AND status = 'failed'",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Moves entries stranded `in_flight` back to pending. Only a crash
    /// between dispatch bookkeeping and its success/failure transition
    /// leaves such rows behind; re-running them is the at-least-once cost
    /// already accepted for replay.
    pub async fn reset_in_flight_entries(&self) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE sync_queue SET status = 'pending' WHERE status = 'in_flight'",
        )
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Moves failed entries back to pending. Entries whose `last_error`
    /// carries the fatal marker are skipped unless `include_fatal` is set;
    /// they would only repeat the same rejected request.
    pub async fn reset_failed_entries(&self, include_fatal: bool) -> Result<u64> {
        let result = if include_fatal {
            sqlx::query("UPDATE sync_queue SET status = 'pending' WHERE status = 'failed'")
                .execute(&self.pool)
                .await?
        } else {
            sqlx::query(
                r#"
                UPDATE sync_queue SET status = 'pending'
                WHERE status = 'failed'
                  AND (last_error IS NULL OR last_error NOT LIKE ?1)
                "#,
            )
            .bind(format!("{FATAL_MARKER}%"))
            .execute(&self.pool)
            .await?
        };
        Ok(result.rows_affected())
    }

    pub async fn queue_counts(&self) -> Result<QueueCounts> {
        let row = sqlx::query(
            r#"
            SELECT
                COALESCE(SUM(status = 'pending'), 0) AS pending,
                COALESCE(SUM(status = 'in_flight'), 0) AS in_flight,
                COALESCE(SUM(status = 'failed'), 0) AS failed,
                COUNT(*) AS total
            FROM sync_queue
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(QueueCounts {
            pending: row.try_get("pending").unwrap_or(0),
            in_flight: row.try_get("in_flight").unwrap_or(0),
            failed: row.try_get("failed").unwrap_or(0),
            total: row.try_get("total").unwrap_or(0),
        })
    }

    // Metadata table

    pub async fn get_meta(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM metadata WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get::<String, _>("value")))
    }

    pub async fn put_meta(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO metadata (key, value) VALUES (?1, ?2)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
