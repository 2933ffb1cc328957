use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::watch;

/// Process-wide view of network reachability.
///
/// The gateway queries it synchronously before choosing the online or offline
/// path; the sync scheduler subscribes and fires a reconciliation pass on the
/// offline-to-online transition. The host application feeds it from whatever
/// detector it has (browser events, ping loop, OS callbacks).
pub struct ConnectivityMonitor {
    online: AtomicBool,
    tx: watch::Sender<bool>,
}

impl ConnectivityMonitor {
    pub fn new(initially_online: bool) -> Self {
        let (tx, _rx) = watch::channel(initially_online);
        Self {
            online: AtomicBool::new(initially_online),
            tx,
        }
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Records the new state and notifies subscribers on an actual transition.
    pub fn set_online(&self, online: bool) {
        let previous = self.online.swap(online, Ordering::SeqCst);
        if previous != online {
            tracing::info!(online, "connectivity changed");
            // Send only fails when every receiver is gone, which is fine.
            let _ = self.tx.send(online);
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}
