use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::entity::{extract_id, EntityType};
use crate::error::{Result, SyncError};
use crate::store::{LocalStore, RecordRow};

/// Read-through hydration policy for `getAll`/`getById`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergePolicy {
    /// Server wins: every returned record overwrites the cache entry,
    /// last-write-wins per record. Matches the historical behavior.
    #[default]
    ServerAuthoritative,
    /// Records still flagged as locally originated keep their pending edit
    /// instead of being clobbered by the read-through.
    PreserveLocalEdits,
}

/// One entity snapshot as known to the client.
#[derive(Debug, Clone)]
pub struct CachedRecord {
    pub id: String,
    pub payload: Value,
    pub last_modified_at: DateTime<Utc>,
    /// True until the remote service has confirmed this record or its
    /// latest edit.
    pub originates_locally: bool,
    /// Deleted offline, eviction pending confirmation.
    pub deleted: bool,
}

impl CachedRecord {
    fn from_row(row: RecordRow) -> Result<Self> {
        let payload: Value = serde_json::from_str(&row.payload)?;
        let last_modified_at = Utc
            .timestamp_micros(row.last_modified_at)
            .single()
            .unwrap_or_else(Utc::now);
        Ok(Self {
            id: row.id,
            payload,
            last_modified_at,
            originates_locally: row.origin_local,
            deleted: row.deleted,
        })
    }
}

/// Cached records of one entity type, keyed by identifier (temporary or
/// durable), backed by that entity's record table in the local store.
#[derive(Clone)]
pub struct EntityCache {
    store: Arc<LocalStore>,
    entity: EntityType,
}

impl EntityCache {
    pub fn new(store: Arc<LocalStore>, entity: EntityType) -> Self {
        Self { store, entity }
    }

    pub fn entity(&self) -> &EntityType {
        &self.entity
    }

    fn row(payload: &Value, id: &str, origin_local: bool, deleted: bool) -> Result<RecordRow> {
        Ok(RecordRow {
            id: id.to_string(),
            payload: serde_json::to_string(payload)?,
            last_modified_at: Utc::now().timestamp_micros(),
            origin_local,
            deleted,
        })
    }

    fn payload_id(payload: &Value) -> Result<String> {
        extract_id(payload).ok_or_else(|| {
            SyncError::InvalidInput("Entity payload is missing an id field".to_string())
        })
    }

    /// Overwrites the cache from a server result set, one record at a time.
    /// Under `PreserveLocalEdits`, entries still flagged as locally
    /// originated are left untouched.
    pub async fn hydrate(&self, records: &[Value], policy: MergePolicy) -> Result<()> {
        for payload in records {
            let id = Self::payload_id(payload)?;
            if policy == MergePolicy::PreserveLocalEdits {
                if let Some(existing) = self.store.get_record(&self.entity, &id).await? {
                    if existing.origin_local {
                        tracing::debug!(entity = %self.entity, %id, "keeping pending local edit");
                        continue;
                    }
                }
            }
            self.store
                .put_record(&self.entity, &Self::row(payload, &id, false, false)?)
                .await?;
        }
        Ok(())
    }

    /// Caches a record the remote service has confirmed.
    pub async fn upsert_from_server(&self, payload: &Value) -> Result<CachedRecord> {
        let id = Self::payload_id(payload)?;
        let row = Self::row(payload, &id, false, false)?;
        self.store.put_record(&self.entity, &row).await?;
        CachedRecord::from_row(row)
    }

    /// Caches a record written locally and not yet confirmed.
    pub async fn upsert_local(&self, payload: &Value) -> Result<CachedRecord> {
        let id = Self::payload_id(payload)?;
        let row = Self::row(payload, &id, true, false)?;
        self.store.put_record(&self.entity, &row).await?;
        CachedRecord::from_row(row)
    }

    /// Returns the record even when tombstoned; callers decide whether a
    /// pending delete counts as present.
    pub async fn get(&self, id: &str) -> Result<Option<CachedRecord>> {
        match self.store.get_record(&self.entity, id).await? {
            Some(row) => Ok(Some(CachedRecord::from_row(row)?)),
            None => Ok(None),
        }
    }

    /// All live records in stored (last-modified) order; tombstones are
    /// excluded.
    pub async fn list(&self) -> Result<Vec<CachedRecord>> {
        let rows = self.store.all_records(&self.entity).await?;
        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            if row.deleted {
                continue;
            }
            records.push(CachedRecord::from_row(row)?);
        }
        Ok(records)
    }

    pub async fn pending_local(&self) -> Result<Vec<CachedRecord>> {
        let rows = self.store.records_by_origin(&self.entity, true).await?;
        rows.into_iter().map(CachedRecord::from_row).collect()
    }

    /// Marks the record deleted without evicting it, so reads can observe
    /// "deleted but not yet confirmed".
    pub async fn tombstone(&self, id: &str) -> Result<()> {
        if let Some(mut row) = self.store.get_record(&self.entity, id).await? {
            row.deleted = true;
            row.origin_local = true;
            row.last_modified_at = Utc::now().timestamp_micros();
            self.store.put_record(&self.entity, &row).await?;
        }
        Ok(())
    }

    pub async fn evict(&self, id: &str) -> Result<()> {
        self.store.delete_record(&self.entity, id).await
    }

    /// Replaces a temporary-id entry with its server-confirmed form keyed by
    /// the durable id.
    pub async fn rekey(&self, temp_id: &str, server_payload: &Value) -> Result<CachedRecord> {
        let record = self.upsert_from_server(server_payload).await?;
        if record.id != temp_id {
            self.store.delete_record(&self.entity, temp_id).await?;
        }
        Ok(record)
    }

    pub async fn clear(&self) -> Result<()> {
        self.store.clear_records(&self.entity).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn setup_cache() -> EntityCache {
        let entity = EntityType::new("clients").unwrap();
        let store = Arc::new(LocalStore::open_in_memory(&[entity.clone()]).await.unwrap());
        EntityCache::new(store, entity)
    }

    #[tokio::test]
    async fn local_and_server_origin_flags() {
        let cache = setup_cache().await;

        let local = cache
            .upsert_local(&json!({"id": "temp_1", "nom": "Acme"}))
            .await
            .unwrap();
        assert!(local.originates_locally);

        let confirmed = cache
            .upsert_from_server(&json!({"id": "42", "nom": "Acme"}))
            .await
            .unwrap();
        assert!(!confirmed.originates_locally);

        assert_eq!(cache.pending_local().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn tombstone_hides_from_list_but_not_get() {
        let cache = setup_cache().await;
        cache
            .upsert_from_server(&json!({"id": "7", "nom": "Dupont"}))
            .await
            .unwrap();

        cache.tombstone("7").await.unwrap();

        assert!(cache.list().await.unwrap().is_empty());
        let record = cache.get("7").await.unwrap().unwrap();
        assert!(record.deleted);
        assert!(record.originates_locally);
    }

    #[tokio::test]
    async fn tombstone_of_absent_record_is_a_no_op() {
        let cache = setup_cache().await;
        cache.tombstone("missing").await.unwrap();
        assert!(cache.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn hydrate_preserves_local_edits_when_asked() {
        let cache = setup_cache().await;
        cache
            .upsert_local(&json!({"id": "1", "nom": "edited offline"}))
            .await
            .unwrap();
        cache
            .upsert_from_server(&json!({"id": "2", "nom": "stale"}))
            .await
            .unwrap();

        let server = vec![
            json!({"id": "1", "nom": "server version"}),
            json!({"id": "2", "nom": "fresh"}),
        ];

        cache
            .hydrate(&server, MergePolicy::PreserveLocalEdits)
            .await
            .unwrap();
        assert_eq!(
            cache.get("1").await.unwrap().unwrap().payload["nom"],
            "edited offline"
        );
        assert_eq!(cache.get("2").await.unwrap().unwrap().payload["nom"], "fresh");

        cache
            .hydrate(&server, MergePolicy::ServerAuthoritative)
            .await
            .unwrap();
        assert_eq!(
            cache.get("1").await.unwrap().unwrap().payload["nom"],
            "server version"
        );
    }

    #[tokio::test]
    async fn rekey_moves_temp_entry_to_durable_id() {
        let cache = setup_cache().await;
        cache
            .upsert_local(&json!({"id": "temp_9", "nom": "Acme"}))
            .await
            .unwrap();

        let record = cache
            .rekey("temp_9", &json!({"id": "42", "nom": "Acme"}))
            .await
            .unwrap();

        assert_eq!(record.id, "42");
        assert!(!record.originates_locally);
        assert!(cache.get("temp_9").await.unwrap().is_none());
        assert!(cache.get("42").await.unwrap().is_some());
    }
}
