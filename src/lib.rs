//! Offline-first data layer for the Facturier client.
//!
//! Keeps the application usable without network connectivity: reads are
//! served from a durable SQLite-backed cache when the remote REST service
//! is unreachable, writes are applied to the cache and recorded in a
//! durable mutation queue, and a reconciliation engine later replays the
//! queue against the service in original order, resolving temporary
//! identifiers into server-assigned ones along the way.

pub mod cache;
pub mod config;
pub mod connectivity;
pub mod entity;
pub mod error;
pub mod gateway;
pub mod queue;
pub mod remote;
pub mod store;
pub mod sync;

pub use cache::{CachedRecord, EntityCache, MergePolicy};
pub use config::OfflineConfig;
pub use connectivity::ConnectivityMonitor;
pub use entity::{is_temporary_id, EntityType};
pub use error::{Result, SyncError};
pub use gateway::EntityGateway;
pub use queue::{Action, MutationQueue, OpStatus, QueuedOperation};
pub use remote::{HttpRemote, RemoteError, RemoteService};
pub use store::{LocalStore, QueueCounts};
pub use sync::{SyncCoordinator, SyncFailure, SyncSummary};

/// Initializes tracing for binaries embedding this crate. Library code
/// never installs a subscriber on its own.
pub fn init_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "facturier_sync=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
