mod id_map;

pub use id_map::IdMap;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use tokio::time::MissedTickBehavior;

use crate::cache::EntityCache;
use crate::connectivity::ConnectivityMonitor;
use crate::entity::{extract_id, is_temporary_id};
use crate::error::Result;
use crate::queue::{Action, MutationQueue, QueuedOperation, FATAL_MARKER};
use crate::remote::{RemoteError, RemoteService};
use crate::store::LocalStore;

pub const LAST_SYNC_AT_KEY: &str = "last_sync_at";

/// Why one queued operation could not be replayed.
#[derive(Debug)]
enum ReplayError {
    Remote(RemoteError),
    /// The stored payload is unusable (e.g. missing its id); retrying the
    /// same bytes cannot succeed.
    Malformed(String),
}

impl ReplayError {
    fn is_fatal(&self) -> bool {
        match self {
            ReplayError::Remote(err) => err.is_fatal(),
            ReplayError::Malformed(_) => true,
        }
    }
}

impl fmt::Display for ReplayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplayError::Remote(err) => write!(f, "{err}"),
            ReplayError::Malformed(msg) => write!(f, "Malformed queue entry: {msg}"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncFailure {
    pub queue_id: i64,
    pub entity_type: String,
    pub action: Action,
    pub error: String,
    pub fatal: bool,
}

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncSummary {
    pub processed: u32,
    pub failed: u32,
    pub failures: Vec<SyncFailure>,
    /// Temporary-to-durable mappings produced by confirmed creates.
    pub id_mappings: Vec<(String, String)>,
}

/// Drains the mutation queue against the remote service when connectivity
/// is available: oldest first, identifiers rewritten per operation, one
/// entry's failure never blocking the rest.
///
/// Owns its running state explicitly; construct one per process and hand
/// out `Arc`s to whatever needs to trigger or query it.
///
/// Replay is at-least-once: a crash between the remote confirming an
/// operation and the queue entry being deleted replays that operation on
/// the next pass. Creates are not naturally idempotent, so the remote
/// service would need to deduplicate by a client-supplied key to close
/// that gap; this engine does not carry one.
pub struct SyncCoordinator {
    store: Arc<LocalStore>,
    queue: MutationQueue,
    remote: Arc<dyn RemoteService>,
    connectivity: Arc<ConnectivityMonitor>,
    pass_lock: Mutex<()>,
    running: AtomicBool,
    last_summary: RwLock<SyncSummary>,
}

impl SyncCoordinator {
    pub fn new(
        store: Arc<LocalStore>,
        remote: Arc<dyn RemoteService>,
        connectivity: Arc<ConnectivityMonitor>,
    ) -> Self {
        Self {
            queue: MutationQueue::new(store.clone()),
            store,
            remote,
            connectivity,
            pass_lock: Mutex::new(()),
            running: AtomicBool::new(false),
            last_summary: RwLock::new(SyncSummary::default()),
        }
    }

    pub fn queue(&self) -> &MutationQueue {
        &self.queue
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Runs one reconciliation pass, or joins the pass already in progress
    /// and returns its summary (single-flight).
    ///
    /// A joiner always gets `Ok` with the most recently stored summary;
    /// if the pass it waited on failed with a storage error, that error
    /// surfaces only to the caller that ran the pass.
    pub async fn run_once(&self) -> Result<SyncSummary> {
        let guard = match self.pass_lock.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                let _joined = self.pass_lock.lock().await;
                return Ok(self.last_summary.read().await.clone());
            }
        };

        self.running.store(true, Ordering::SeqCst);
        let result = self.drain().await;
        if let Ok(summary) = &result {
            *self.last_summary.write().await = summary.clone();
        }
        self.running.store(false, Ordering::SeqCst);
        drop(guard);
        result
    }

    async fn drain(&self) -> Result<SyncSummary> {
        let mut summary = SyncSummary::default();
        if !self.connectivity.is_online() {
            tracing::debug!("offline, skipping reconciliation pass");
            return Ok(summary);
        }

        let recovered = self.queue.recover_in_flight().await?;
        if recovered > 0 {
            tracing::warn!(recovered, "recovered entries from an interrupted pass");
        }

        let pending = self.queue.list_pending().await?;
        if pending.is_empty() {
            return Ok(summary);
        }
        tracing::info!(count = pending.len(), "reconciling pending mutations");

        let mut id_map = IdMap::new();
        for op in pending {
            self.queue.mark_in_flight(op.id).await?;
            let payload = id_map.rewrite(&op.payload);

            match self.dispatch(&op, &payload, &mut id_map).await? {
                Ok(()) => {
                    self.queue.mark_succeeded(op.id).await?;
                    summary.processed += 1;
                }
                Err(err) => {
                    let fatal = err.is_fatal();
                    let message = if fatal {
                        format!("{FATAL_MARKER}{err}")
                    } else {
                        err.to_string()
                    };
                    self.queue.mark_failed(op.id, &message).await?;
                    tracing::warn!(
                        queue_id = op.id,
                        entity = %op.entity_type,
                        action = %op.action,
                        fatal,
                        "replay failed: {err}"
                    );
                    summary.failed += 1;
                    summary.failures.push(SyncFailure {
                        queue_id: op.id,
                        entity_type: op.entity_type.to_string(),
                        action: op.action,
                        error: message,
                        fatal,
                    });
                }
            }
        }

        summary.id_mappings = id_map.into_pairs();
        self.store
            .put_meta(LAST_SYNC_AT_KEY, &Utc::now().timestamp().to_string())
            .await?;
        tracing::info!(
            processed = summary.processed,
            failed = summary.failed,
            "reconciliation pass complete"
        );
        Ok(summary)
    }

    /// Replays one operation. The outer `Result` carries storage failures,
    /// which abort the pass; the inner one carries per-operation replay
    /// failures, which do not.
    async fn dispatch(
        &self,
        op: &QueuedOperation,
        payload: &Value,
        id_map: &mut IdMap,
    ) -> Result<std::result::Result<(), ReplayError>> {
        let cache = EntityCache::new(self.store.clone(), op.entity_type.clone());
        match op.action {
            Action::Create => {
                let body = strip_temporary_id(payload);
                let server_record = match self.remote.create(&op.entity_type, &body).await {
                    Ok(record) => record,
                    Err(err) => return Ok(Err(ReplayError::Remote(err))),
                };
                match &op.temporary_id {
                    Some(temp_id) => {
                        if let Some(durable) = extract_id(&server_record) {
                            id_map.insert(temp_id.clone(), durable);
                        }
                        cache.rekey(temp_id, &server_record).await?;
                    }
                    None => {
                        cache.upsert_from_server(&server_record).await?;
                    }
                }
                Ok(Ok(()))
            }
            Action::Update => {
                let id = match extract_id(payload) {
                    Some(id) => id,
                    None => {
                        return Ok(Err(ReplayError::Malformed(
                            "queued update has no id".to_string(),
                        )))
                    }
                };
                match self.remote.update(&op.entity_type, &id, payload).await {
                    Ok(server_record) => {
                        let confirmed = if extract_id(&server_record).is_some() {
                            server_record
                        } else {
                            payload.clone()
                        };
                        cache.upsert_from_server(&confirmed).await?;
                        Ok(Ok(()))
                    }
                    Err(err) => Ok(Err(ReplayError::Remote(err))),
                }
            }
            Action::Delete => {
                let id = match extract_id(payload) {
                    Some(id) => id,
                    None => {
                        return Ok(Err(ReplayError::Malformed(
                            "queued delete has no id".to_string(),
                        )))
                    }
                };
                match self.remote.delete(&op.entity_type, &id).await {
                    Ok(()) => {
                        // Removes the tombstone.
                        cache.evict(&id).await?;
                        Ok(Ok(()))
                    }
                    Err(err) => Ok(Err(ReplayError::Remote(err))),
                }
            }
        }
    }

    /// Background trigger loop: a periodic tick while online plus an
    /// immediate pass on the offline-to-online transition. Each firing
    /// moves the retryable failed set back to pending first; fatal entries
    /// stay put until manually reset.
    pub fn spawn_scheduler(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let coordinator = Arc::clone(self);
        let mut online_rx = coordinator.connectivity.subscribe();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if !coordinator.connectivity.is_online() {
                            continue;
                        }
                    }
                    changed = online_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        if !*online_rx.borrow() {
                            continue;
                        }
                        tracing::info!("connectivity restored, triggering reconciliation");
                    }
                }
                if let Err(e) = coordinator.queue.reset_all_failed_to_pending().await {
                    tracing::error!("failed to reset retryable entries: {e}");
                    continue;
                }
                if let Err(e) = coordinator.run_once().await {
                    tracing::error!("reconciliation pass failed: {e}");
                }
            }
        })
    }
}

/// Creates are posted without their client-side temporary identifier; the
/// server assigns the durable one.
fn strip_temporary_id(payload: &Value) -> Value {
    match payload {
        Value::Object(map) => {
            let fields = map
                .iter()
                .filter(|(key, value)| {
                    !(key.as_str() == "id"
                        && value.as_str().is_some_and(is_temporary_id))
                })
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            Value::Object(fields)
        }
        _ => payload.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MergePolicy;
    use crate::entity::EntityType;
    use crate::gateway::EntityGateway;
    use crate::queue::OpStatus;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicU64;
    use std::sync::Mutex as StdMutex;

    /// Scripted REST service: assigns sequential durable ids to creates,
    /// rejects configured records, optionally stalls to let single-flight
    /// tests overlap passes.
    #[derive(Default)]
    struct ScriptedRemote {
        next_id: AtomicU64,
        /// `nom` value -> rejection status.
        reject: StdMutex<HashMap<String, u16>>,
        /// Dispatch log, e.g. `"create a"`, `"update 42"`, `"delete 42"`.
        calls: StdMutex<Vec<String>>,
        delay: StdMutex<Option<Duration>>,
    }

    impl ScriptedRemote {
        fn log(&self, entry: String) {
            self.calls.lock().unwrap().push(entry);
        }

        async fn stall(&self) {
            let delay = *self.delay.lock().unwrap();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
        }

        fn rejection_for(&self, payload: &Value) -> Option<RemoteError> {
            let nom = payload.get("nom")?.as_str()?;
            let status = *self.reject.lock().unwrap().get(nom)?;
            Some(RemoteError::Status {
                status,
                message: format!("rejected {nom}"),
            })
        }
    }

    #[async_trait]
    impl RemoteService for ScriptedRemote {
        async fn fetch_all(
            &self,
            _entity: &EntityType,
            _filters: &[(String, String)],
        ) -> std::result::Result<Vec<Value>, RemoteError> {
            Ok(vec![])
        }

        async fn fetch_one(
            &self,
            _entity: &EntityType,
            _id: &str,
        ) -> std::result::Result<Value, RemoteError> {
            Err(RemoteError::Status {
                status: 404,
                message: "not found".into(),
            })
        }

        async fn create(
            &self,
            _entity: &EntityType,
            payload: &Value,
        ) -> std::result::Result<Value, RemoteError> {
            self.stall().await;
            self.log(format!(
                "create {}",
                payload.get("nom").and_then(Value::as_str).unwrap_or("?")
            ));
            if let Some(err) = self.rejection_for(payload) {
                return Err(err);
            }
            assert!(
                payload.get("id").is_none(),
                "create payload must be temp-id-stripped: {payload}"
            );
            let id = 41 + self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
            let mut record = payload.clone();
            record["id"] = json!(id.to_string());
            Ok(record)
        }

        async fn update(
            &self,
            _entity: &EntityType,
            id: &str,
            payload: &Value,
        ) -> std::result::Result<Value, RemoteError> {
            self.stall().await;
            self.log(format!("update {id}"));
            if let Some(err) = self.rejection_for(payload) {
                return Err(err);
            }
            Ok(payload.clone())
        }

        async fn delete(
            &self,
            _entity: &EntityType,
            id: &str,
        ) -> std::result::Result<(), RemoteError> {
            self.stall().await;
            self.log(format!("delete {id}"));
            Ok(())
        }
    }

    struct Fixture {
        store: Arc<LocalStore>,
        remote: Arc<ScriptedRemote>,
        connectivity: Arc<ConnectivityMonitor>,
        coordinator: Arc<SyncCoordinator>,
    }

    impl Fixture {
        async fn new(entities: &[&str], online: bool) -> Self {
            let entities: Vec<EntityType> = entities
                .iter()
                .map(|e| EntityType::new(*e).unwrap())
                .collect();
            let store = Arc::new(LocalStore::open_in_memory(&entities).await.unwrap());
            let remote = Arc::new(ScriptedRemote::default());
            let connectivity = Arc::new(ConnectivityMonitor::new(online));
            let coordinator = Arc::new(SyncCoordinator::new(
                store.clone(),
                remote.clone(),
                connectivity.clone(),
            ));
            Self {
                store,
                remote,
                connectivity,
                coordinator,
            }
        }

        fn gateway(&self, entity: &str) -> EntityGateway {
            EntityGateway::new(
                self.store.clone(),
                self.remote.clone(),
                self.connectivity.clone(),
                EntityType::new(entity).unwrap(),
                MergePolicy::ServerAuthoritative,
            )
        }

        fn cache(&self, entity: &str) -> EntityCache {
            EntityCache::new(self.store.clone(), EntityType::new(entity).unwrap())
        }
    }

    #[tokio::test]
    async fn offline_pass_returns_zero_immediately() {
        let fixture = Fixture::new(&["clients"], false).await;
        let gateway = fixture.gateway("clients");
        gateway.create(json!({"nom": "Acme"})).await.unwrap();

        let summary = fixture.coordinator.run_once().await.unwrap();
        assert_eq!(summary.processed, 0);
        assert_eq!(summary.failed, 0);
        assert_eq!(fixture.coordinator.queue().stats().await.unwrap().pending, 1);
        assert!(fixture.remote.calls.lock().unwrap().is_empty());
    }

    // An entry stranded in_flight by an interrupted pass is picked up
    // again on the next pass instead of sitting in the queue forever.
    #[tokio::test]
    async fn interrupted_pass_entries_are_replayed() {
        let fixture = Fixture::new(&["clients"], false).await;
        let gateway = fixture.gateway("clients");
        gateway.create(json!({"nom": "Acme"})).await.unwrap();

        let pending = fixture.coordinator.queue().list_pending().await.unwrap();
        fixture
            .coordinator
            .queue()
            .mark_in_flight(pending[0].id)
            .await
            .unwrap();
        assert_eq!(
            fixture.coordinator.queue().stats().await.unwrap().in_flight,
            1
        );

        fixture.connectivity.set_online(true);
        let summary = fixture.coordinator.run_once().await.unwrap();

        assert_eq!(summary.processed, 1);
        assert_eq!(summary.failed, 0);
        assert_eq!(fixture.coordinator.queue().stats().await.unwrap().total, 0);
        assert_eq!(
            fixture.remote.calls.lock().unwrap().clone(),
            vec!["create Acme"]
        );
    }

    // A queued create under a temp id followed by a queued update
    // referencing it; one pass resolves both and rewrites every reference.
    #[tokio::test]
    async fn pass_resolves_temporary_identity_chain() {
        let fixture = Fixture::new(&["clients"], false).await;
        let gateway = fixture.gateway("clients");

        let created = gateway.create(json!({"nom": "Acme"})).await.unwrap();
        let temp_id = created["id"].as_str().unwrap().to_string();
        gateway
            .update(
                &temp_id,
                json!({"nom": "Acme Corp", "parrain": temp_id.clone()}),
            )
            .await
            .unwrap();

        fixture.connectivity.set_online(true);
        let summary = fixture.coordinator.run_once().await.unwrap();

        assert_eq!(summary.processed, 2);
        assert_eq!(summary.failed, 0);
        assert_eq!(
            summary.id_mappings,
            vec![(temp_id.clone(), "42".to_string())]
        );

        // Queue fully drained.
        assert_eq!(fixture.coordinator.queue().stats().await.unwrap().total, 0);

        // Cache keyed by the durable id only, update applied, references
        // rewritten.
        let cache = fixture.cache("clients");
        assert!(cache.get(&temp_id).await.unwrap().is_none());
        let record = cache.get("42").await.unwrap().unwrap();
        assert_eq!(record.payload["nom"], "Acme Corp");
        assert_eq!(record.payload["parrain"], "42");
        assert!(!record.originates_locally);

        // The update was dispatched at the durable id.
        let calls = fixture.remote.calls.lock().unwrap().clone();
        assert_eq!(calls, vec!["create Acme", "update 42"]);
    }

    // Replay strictly in enqueue order regardless of entity type.
    #[tokio::test]
    async fn pass_replays_in_enqueue_order_across_entities() {
        let fixture = Fixture::new(&["clients", "invoices"], false).await;

        fixture
            .gateway("clients")
            .create(json!({"nom": "a"}))
            .await
            .unwrap();
        fixture
            .gateway("invoices")
            .create(json!({"nom": "b"}))
            .await
            .unwrap();
        fixture
            .gateway("clients")
            .create(json!({"nom": "c"}))
            .await
            .unwrap();

        fixture.connectivity.set_online(true);
        fixture.coordinator.run_once().await.unwrap();

        let calls = fixture.remote.calls.lock().unwrap().clone();
        assert_eq!(calls, vec!["create a", "create b", "create c"]);
    }

    // A retryable failure in the middle leaves the rest of the pass
    // untouched.
    #[tokio::test]
    async fn retryable_failure_does_not_block_later_entries() {
        let fixture = Fixture::new(&["clients"], false).await;
        let gateway = fixture.gateway("clients");
        gateway.create(json!({"nom": "a"})).await.unwrap();
        gateway.create(json!({"nom": "b"})).await.unwrap();
        gateway.create(json!({"nom": "c"})).await.unwrap();

        fixture.remote.reject.lock().unwrap().insert("b".into(), 503);
        fixture.connectivity.set_online(true);

        let summary = fixture.coordinator.run_once().await.unwrap();
        assert_eq!(summary.processed, 2);
        assert_eq!(summary.failed, 1);
        assert!(!summary.failures[0].fatal);

        let calls = fixture.remote.calls.lock().unwrap().clone();
        assert_eq!(calls, vec!["create a", "create b", "create c"]);

        let failed = fixture.coordinator.queue().list_failed().await.unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].status, OpStatus::Failed);
        assert_eq!(failed[0].attempt_count, 1);
        assert!(!failed[0].is_fatal());

        // Next pass retries it after the scheduler-style reset.
        fixture.remote.reject.lock().unwrap().clear();
        fixture
            .coordinator
            .queue()
            .reset_all_failed_to_pending()
            .await
            .unwrap();
        let summary = fixture.coordinator.run_once().await.unwrap();
        assert_eq!(summary.processed, 1);
        assert_eq!(fixture.coordinator.queue().stats().await.unwrap().total, 0);
    }

    // Validation rejections are marked fatal and excluded from the
    // automatic retry set; a manual reset still works.
    #[tokio::test]
    async fn validation_rejection_is_fatal() {
        let fixture = Fixture::new(&["clients"], false).await;
        let gateway = fixture.gateway("clients");
        gateway.create(json!({"nom": "bad"})).await.unwrap();

        fixture.remote.reject.lock().unwrap().insert("bad".into(), 422);
        fixture.connectivity.set_online(true);

        let summary = fixture.coordinator.run_once().await.unwrap();
        assert_eq!(summary.failed, 1);
        assert!(summary.failures[0].fatal);

        let failed = fixture.coordinator.queue().list_failed().await.unwrap();
        assert!(failed[0].is_fatal());
        assert!(failed[0]
            .last_error
            .as_deref()
            .unwrap()
            .starts_with(FATAL_MARKER));

        assert_eq!(
            fixture
                .coordinator
                .queue()
                .reset_all_failed_to_pending()
                .await
                .unwrap(),
            0
        );
        assert!(fixture
            .coordinator
            .queue()
            .reset_to_pending(failed[0].id)
            .await
            .unwrap());
    }

    // Two rapid triggers drain the queue exactly once and report the
    // same summary.
    #[tokio::test]
    async fn concurrent_triggers_share_one_pass() {
        let fixture = Fixture::new(&["clients"], false).await;
        let gateway = fixture.gateway("clients");
        gateway.create(json!({"nom": "Acme"})).await.unwrap();

        *fixture.remote.delay.lock().unwrap() = Some(Duration::from_millis(100));
        fixture.connectivity.set_online(true);

        let coordinator = fixture.coordinator.clone();
        let first = tokio::spawn(async move { coordinator.run_once().await.unwrap() });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(fixture.coordinator.is_running());

        let second = fixture.coordinator.run_once().await.unwrap();
        let first = first.await.unwrap();

        assert_eq!(first.processed, 1);
        assert_eq!(second.processed, first.processed);
        assert_eq!(second.failed, first.failed);
        assert_eq!(fixture.remote.calls.lock().unwrap().len(), 1);
        assert!(!fixture.coordinator.is_running());
    }

    #[tokio::test]
    async fn queued_delete_removes_tombstone() {
        let fixture = Fixture::new(&["clients"], false).await;
        let cache = fixture.cache("clients");
        cache
            .upsert_from_server(&json!({"id": "7", "nom": "Acme"}))
            .await
            .unwrap();

        let gateway = fixture.gateway("clients");
        gateway.delete("7").await.unwrap();
        assert!(cache.get("7").await.unwrap().unwrap().deleted);

        fixture.connectivity.set_online(true);
        let summary = fixture.coordinator.run_once().await.unwrap();
        assert_eq!(summary.processed, 1);
        assert!(cache.get("7").await.unwrap().is_none());
        assert_eq!(
            fixture.remote.calls.lock().unwrap().clone(),
            vec!["delete 7"]
        );
    }

    #[tokio::test]
    async fn pass_records_last_sync_timestamp() {
        let fixture = Fixture::new(&["clients"], false).await;
        let gateway = fixture.gateway("clients");
        gateway.create(json!({"nom": "Acme"})).await.unwrap();

        assert!(fixture
            .store
            .get_meta(LAST_SYNC_AT_KEY)
            .await
            .unwrap()
            .is_none());

        fixture.connectivity.set_online(true);
        fixture.coordinator.run_once().await.unwrap();
        assert!(fixture
            .store
            .get_meta(LAST_SYNC_AT_KEY)
            .await
            .unwrap()
            .is_some());
    }

    // Scheduler: the offline-to-online transition triggers a drain.
    #[tokio::test]
    async fn scheduler_drains_on_connectivity_restored() {
        let fixture = Fixture::new(&["clients"], false).await;
        let gateway = fixture.gateway("clients");
        gateway.create(json!({"nom": "Acme"})).await.unwrap();

        let handle = fixture
            .coordinator
            .spawn_scheduler(Duration::from_secs(3600));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(fixture.coordinator.queue().stats().await.unwrap().pending, 1);

        fixture.connectivity.set_online(true);

        let mut drained = false;
        for _ in 0..40 {
            tokio::time::sleep(Duration::from_millis(50)).await;
            if fixture.coordinator.queue().stats().await.unwrap().total == 0 {
                drained = true;
                break;
            }
        }
        handle.abort();
        assert!(drained, "scheduler never drained the queue");
    }

    // End-to-end scenario from the product: offline create of a client,
    // connectivity restored, cache ends up keyed by the server id.
    #[tokio::test]
    async fn acme_scenario() {
        let fixture = Fixture::new(&["clients"], false).await;
        let gateway = fixture.gateway("clients");

        let record = gateway.create(json!({"nom": "Acme"})).await.unwrap();
        let temp_id = record["id"].as_str().unwrap().to_string();
        assert!(is_temporary_id(&temp_id));
        assert_eq!(record["nom"], "Acme");

        fixture.connectivity.set_online(true);
        fixture.coordinator.run_once().await.unwrap();

        let cache = fixture.cache("clients");
        assert!(cache.get(&temp_id).await.unwrap().is_none());
        let confirmed = cache.get("42").await.unwrap().unwrap();
        assert_eq!(confirmed.payload["nom"], "Acme");
        assert_eq!(fixture.coordinator.queue().stats().await.unwrap().total, 0);
    }

    #[test]
    fn strip_temporary_id_only_strips_temp_ids() {
        let stripped = strip_temporary_id(&json!({"id": "temp_x", "nom": "Acme"}));
        assert!(stripped.get("id").is_none());

        let kept = strip_temporary_id(&json!({"id": "42", "nom": "Acme"}));
        assert_eq!(kept["id"], "42");
    }
}
