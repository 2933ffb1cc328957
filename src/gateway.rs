use std::sync::Arc;

use serde_json::{json, Map, Value};

use crate::cache::{EntityCache, MergePolicy};
use crate::connectivity::ConnectivityMonitor;
use crate::entity::{new_temporary_id, EntityType};
use crate::error::{Result, SyncError};
use crate::queue::{Action, MutationQueue};
use crate::remote::{RemoteError, RemoteService};
use crate::store::LocalStore;

/// The per-entity-type access point the rest of the application calls.
///
/// Hides whether data came from network or cache: reads fall back to the
/// cache on any remote failure, writes fall back to the durable offline
/// path (cache + mutation queue) on connectivity loss. Genuine application
/// errors from the remote service propagate unchanged; a caller never sees
/// a connectivity error.
pub struct EntityGateway {
    entity: EntityType,
    cache: EntityCache,
    queue: MutationQueue,
    remote: Arc<dyn RemoteService>,
    connectivity: Arc<ConnectivityMonitor>,
    merge_policy: MergePolicy,
}

impl EntityGateway {
    pub fn new(
        store: Arc<LocalStore>,
        remote: Arc<dyn RemoteService>,
        connectivity: Arc<ConnectivityMonitor>,
        entity: EntityType,
        merge_policy: MergePolicy,
    ) -> Self {
        Self {
            cache: EntityCache::new(store.clone(), entity.clone()),
            queue: MutationQueue::new(store),
            entity,
            remote,
            connectivity,
            merge_policy,
        }
    }

    pub fn entity(&self) -> &EntityType {
        &self.entity
    }

    pub fn cache(&self) -> &EntityCache {
        &self.cache
    }

    pub fn queue(&self) -> &MutationQueue {
        &self.queue
    }

    /// Whether a remote write failure diverts to the offline path instead
    /// of surfacing. Connectivity-class failures qualify, as does the
    /// online signal having dropped during the call.
    fn take_offline_path(&self, err: &RemoteError) -> bool {
        err.is_connectivity() || !self.connectivity.is_online()
    }

    pub async fn get_all(&self, filters: &[(String, String)]) -> Result<Vec<Value>> {
        if self.connectivity.is_online() {
            match self.remote.fetch_all(&self.entity, filters).await {
                Ok(records) => {
                    self.cache.hydrate(&records, self.merge_policy).await?;
                    return Ok(records);
                }
                Err(err) => {
                    tracing::warn!(entity = %self.entity, %err, "fetch_all failed, serving cache");
                }
            }
        }
        let cached = self.cache.list().await?;
        Ok(cached.into_iter().map(|r| r.payload).collect())
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Option<Value>> {
        if self.connectivity.is_online() {
            match self.remote.fetch_one(&self.entity, id).await {
                Ok(record) => {
                    self.cache
                        .hydrate(std::slice::from_ref(&record), self.merge_policy)
                        .await?;
                    // Under PreserveLocalEdits the cached version may still
                    // be the pending local edit; serve whatever won.
                    return Ok(self.cache.get(id).await?.map(|r| r.payload));
                }
                Err(err) => {
                    tracing::warn!(entity = %self.entity, id, %err, "fetch_one failed, serving cache");
                }
            }
        }
        match self.cache.get(id).await? {
            Some(record) if !record.deleted => Ok(Some(record.payload)),
            _ => Ok(None),
        }
    }

    pub async fn create(&self, data: Value) -> Result<Value> {
        if self.connectivity.is_online() {
            match self.remote.create(&self.entity, &data).await {
                Ok(record) => {
                    self.cache.upsert_from_server(&record).await?;
                    return Ok(record);
                }
                Err(err) if self.take_offline_path(&err) => {
                    tracing::info!(entity = %self.entity, %err, "create diverted to offline path");
                }
                Err(err) => return Err(Self::application_error(err)),
            }
        }
        self.offline_create(data).await
    }

    pub async fn update(&self, id: &str, data: Value) -> Result<Value> {
        if self.connectivity.is_online() {
            match self.remote.update(&self.entity, id, &data).await {
                Ok(record) => {
                    self.cache.upsert_from_server(&record).await?;
                    return Ok(record);
                }
                Err(err) if self.take_offline_path(&err) => {
                    tracing::info!(entity = %self.entity, id, %err, "update diverted to offline path");
                }
                Err(err) => return Err(Self::application_error(err)),
            }
        }
        self.offline_update(id, data).await
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        if self.connectivity.is_online() {
            match self.remote.delete(&self.entity, id).await {
                Ok(()) => {
                    self.cache.evict(id).await?;
                    return Ok(());
                }
                Err(err) if self.take_offline_path(&err) => {
                    tracing::info!(entity = %self.entity, id, %err, "delete diverted to offline path");
                }
                Err(err) => return Err(Self::application_error(err)),
            }
        }
        self.offline_delete(id).await
    }

    /// Synthesizes a temporary identity, caches the record as locally
    /// originated and queues the create. Indistinguishable from a
    /// successful synchronous create except for the identifier.
    async fn offline_create(&self, data: Value) -> Result<Value> {
        let mut fields = Self::object_fields(data)?;
        let temp_id = new_temporary_id();
        fields.insert("id".to_string(), Value::String(temp_id.clone()));
        let payload = Value::Object(fields);

        self.cache.upsert_local(&payload).await?;
        self.queue
            .enqueue(&self.entity, Action::Create, &payload, Some(temp_id))
            .await?;
        Ok(payload)
    }

    /// Merges the patch over the cached record, tags it locally originated
    /// and queues the update.
    async fn offline_update(&self, id: &str, data: Value) -> Result<Value> {
        let patch = Self::object_fields(data)?;
        let mut fields = match self.cache.get(id).await? {
            Some(record) if !record.deleted => Self::object_fields(record.payload)?,
            _ => Map::new(),
        };
        for (key, value) in patch {
            fields.insert(key, value);
        }
        fields.insert("id".to_string(), Value::String(id.to_string()));
        let merged = Value::Object(fields);

        self.cache.upsert_local(&merged).await?;
        self.queue
            .enqueue(&self.entity, Action::Update, &merged, None)
            .await?;
        Ok(merged)
    }

    /// Tombstones the cached record and queues the delete.
    async fn offline_delete(&self, id: &str) -> Result<()> {
        self.cache.tombstone(id).await?;
        self.queue
            .enqueue(&self.entity, Action::Delete, &json!({ "id": id }), None)
            .await?;
        Ok(())
    }

    fn object_fields(data: Value) -> Result<Map<String, Value>> {
        match data {
            Value::Object(map) => Ok(map),
            _ => Err(SyncError::InvalidInput(
                "Entity payload must be a JSON object".to_string(),
            )),
        }
    }

    fn application_error(err: RemoteError) -> SyncError {
        match err {
            RemoteError::Status { status, message } => SyncError::Remote { status, message },
            RemoteError::Connectivity(msg) => SyncError::Internal(msg),
        }
    }
}
