use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::ConnectivityProbe;

/// Default upper bound on a single connectivity probe.
const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(3);

type Callback = Arc<dyn Fn(bool) + Send + Sync>;

/// Connectivity state shared by every component.
pub struct NetworkMonitor {
    online: AtomicBool,
    probe: Option<Arc<dyn ConnectivityProbe>>,
    probe_timeout: Duration,
    subscribers: Mutex<HashMap<u64, Callback>>,
    next_subscriber: AtomicU64,
    state_tx: watch::Sender<bool>,
}

impl NetworkMonitor {
    /// Monitor driven only by [`set_online`](Self::set_online).
    pub fn manual(initial: bool) -> Self {
        Self::build(None, initial, DEFAULT_PROBE_TIMEOUT)
    }

    /// Monitor that probes on every [`is_online`](Self::is_online) call.
    /// Starts optimistic (online) until the first probe says otherwise.
    pub fn with_probe(probe: Arc<dyn ConnectivityProbe>, probe_timeout: Duration) -> Self {
        Self::build(Some(probe), true, probe_timeout)
    }

    fn build(
        probe: Option<Arc<dyn ConnectivityProbe>>,
        initial: bool,
        probe_timeout: Duration,
    ) -> Self {
        let (state_tx, _) = watch::channel(initial);
        Self {
            online: AtomicBool::new(initial),
            probe,
            probe_timeout,
            subscribers: Mutex::new(HashMap::new()),
            next_subscriber: AtomicU64::new(0),
            state_tx,
        }
    }

    /// Last known state. Never blocks, may be stale.
    pub fn snapshot(&self) -> bool {
        self.online.load(Ordering::Acquire)
    }

    /// Best-effort current state. A failed or timed-out probe counts as
    /// online and leaves the snapshot untouched.
    pub async fn is_online(&self) -> bool {
        let Some(probe) = &self.probe else {
            return self.snapshot();
        };

        match tokio::time::timeout(self.probe_timeout, probe.probe()).await {
            Ok(Ok(online)) => {
                self.set_online(online);
                online
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Connectivity check failed, assuming online");
                true
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.probe_timeout.as_millis() as u64,
                    "Connectivity check timed out, assuming online"
                );
                true
            }
        }
    }

    /// Record a new state from the platform. Subscribers are notified
    /// synchronously, and only when the state actually changes.
    pub fn set_online(&self, online: bool) {
        let previous = self.online.swap(online, Ordering::AcqRel);
        if previous == online {
            return;
        }
        info!(online, "Connectivity changed");
        self.state_tx.send_replace(online);

        // Clone out so callbacks may subscribe or unsubscribe themselves
        let callbacks: Vec<Callback> = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        for callback in callbacks {
            callback(online);
        }
    }

    /// Register a callback for state changes. It stays registered until the
    /// returned [`Subscription`] is unsubscribed or dropped.
    pub fn subscribe<F>(self: &Arc<Self>, callback: F) -> Subscription
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        let id = self.next_subscriber.fetch_add(1, Ordering::Relaxed);
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Arc::new(callback));
        debug!(subscriber = id, "Connectivity subscriber added");
        Subscription {
            monitor: Arc::downgrade(self),
            id,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Change stream as a watch channel; the current value is the snapshot.
    pub fn watch(&self) -> watch::Receiver<bool> {
        self.state_tx.subscribe()
    }

    /// Poll the probe every `interval` until the monitor is dropped.
    pub fn spawn_poller(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let monitor = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let Some(monitor) = monitor.upgrade() else {
                    debug!("Network monitor dropped, stopping poller");
                    return;
                };
                monitor.is_online().await;
            }
        })
    }

    fn unsubscribe(&self, id: u64) -> bool {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
            .is_some()
    }
}

/// Handle to a registered connectivity callback.
pub struct Subscription {
    monitor: Weak<NetworkMonitor>,
    id: u64,
}

impl Subscription {
    pub fn unsubscribe(self) {
        // Drop does the work
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(monitor) = self.monitor.upgrade() {
            monitor.unsubscribe(self.id);
        }
    }
}
