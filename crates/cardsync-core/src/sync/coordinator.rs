use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::access::DataAccess;
use crate::error::Result;
use crate::network::Subscription;

/// Summary of one completed full sync.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncReport {
    pub owner: String,
    pub decks: usize,
    pub cards: usize,
    pub finished_at: DateTime<Utc>,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AlreadyRunning,
    Offline,
    NoOwner,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    Completed(SyncReport),
    Skipped(SkipReason),
}

/// Clears the in-progress flag however the sync ends, including by panic.
struct InProgress<'a> {
    flag: &'a AtomicBool,
    status: &'a watch::Sender<bool>,
}

impl<'a> InProgress<'a> {
    fn acquire(flag: &'a AtomicBool, status: &'a watch::Sender<bool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        status.send_replace(true);
        Some(Self { flag, status })
    }
}

impl Drop for InProgress<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
        self.status.send_replace(false);
    }
}

/// Full-account resynchronization, at most one at a time.
pub struct SyncCoordinator {
    access: DataAccess,
    in_progress: AtomicBool,
    status: watch::Sender<bool>,
    last_report: Mutex<Option<SyncReport>>,
}

impl SyncCoordinator {
    pub fn new(access: DataAccess) -> Self {
        let (status, _) = watch::channel(false);
        Self {
            access,
            in_progress: AtomicBool::new(false),
            status,
            last_report: Mutex::new(None),
        }
    }

    pub fn is_syncing(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }

    /// "Sync in progress" stream for status indicators.
    pub fn subscribe_status(&self) -> watch::Receiver<bool> {
        self.status.subscribe()
    }

    pub fn last_report(&self) -> Option<SyncReport> {
        self.last_report
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Refetch every deck and card of the current owner and replace the
    /// cache with them. A request while a sync is running is dropped.
    pub async fn full_sync(&self) -> Result<SyncOutcome> {
        let Some(_running) = InProgress::acquire(&self.in_progress, &self.status) else {
            debug!("Sync already in progress, dropping request");
            return Ok(SyncOutcome::Skipped(SkipReason::AlreadyRunning));
        };

        if !self.access.network().is_online().await {
            debug!("Offline, skipping sync");
            return Ok(SyncOutcome::Skipped(SkipReason::Offline));
        }
        let Some(owner) = self.access.owner().await else {
            debug!("No owner, skipping sync");
            return Ok(SyncOutcome::Skipped(SkipReason::NoOwner));
        };

        let started = Instant::now();
        info!(owner, "Full sync started");

        let decks = self.access.fetch_decks(&owner).await?;
        let deck_ids: Vec<String> = decks.iter().map(|d| d.id.clone()).collect();
        let cards = if deck_ids.is_empty() {
            Vec::new()
        } else {
            self.access
                .fetch_cards(&owner, &deck_ids, None)
                .await?
                .unwrap_or_default()
        };

        let report = SyncReport {
            owner,
            decks: decks.len(),
            cards: cards.len(),
            finished_at: Utc::now(),
            elapsed: started.elapsed(),
        };
        info!(
            owner = %report.owner,
            decks = report.decks,
            cards = report.cards,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Full sync finished"
        );
        *self.last_report.lock().unwrap_or_else(PoisonError::into_inner) = Some(report.clone());
        Ok(SyncOutcome::Completed(report))
    }

    /// Start a background sync every time connectivity comes back. Stops
    /// when the returned subscription is dropped.
    pub fn watch_connectivity(self: &Arc<Self>) -> Subscription {
        let coordinator = Arc::downgrade(self);
        let supervisor = Arc::clone(self.access.supervisor());
        self.access.network().subscribe(move |online| {
            if !online {
                return;
            }
            let Some(coordinator) = coordinator.upgrade() else {
                return;
            };
            supervisor.spawn("sync-on-reconnect", async move {
                coordinator.full_sync().await?;
                Ok(())
            });
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::harness::{ids, Harness, OWNER};
    use crate::error::Error;
    use crate::test_utils::{card, RemoteFailure};

    fn seeded() -> Harness {
        let h = Harness::new();
        h.remote.seed_deck(OWNER, "p1", 0);
        h.remote.seed_deck(OWNER, "p2", 1);
        h.remote.seed_card("c1", "p1", None);
        h.remote.seed_card("c2", "p1", None);
        h.remote.seed_card("c3", "p2", None);
        h
    }

    #[tokio::test]
    async fn test_full_sync_replaces_cache() {
        let h = seeded();
        h.access.cache().put_items(OWNER, "stale", &[card("x", "stale")]);
        let sync = SyncCoordinator::new(h.access.clone());

        let report = match sync.full_sync().await.unwrap() {
            SyncOutcome::Completed(report) => report,
            other => panic!("expected a completed sync, got {:?}", other),
        };
        assert_eq!((report.decks, report.cards), (2, 3));
        assert_eq!(sync.last_report(), Some(report));

        let cache = h.access.cache();
        assert_eq!(cache.get_items(OWNER, &ids(&["p1", "p2"])).len(), 3);
        assert!(cache.get_items(OWNER, &ids(&["stale"])).is_empty());
        assert_eq!(cache.metadata(OWNER).unwrap().card_count, 3);
    }

    #[tokio::test]
    async fn test_concurrent_syncs_run_once() {
        let h = seeded();
        h.remote.set_latency(Duration::from_millis(100));
        let sync = SyncCoordinator::new(h.access.clone());

        let (a, b) = tokio::join!(sync.full_sync(), sync.full_sync());
        let outcomes = [a.unwrap(), b.unwrap()];
        let completed = outcomes
            .iter()
            .filter(|o| matches!(o, SyncOutcome::Completed(_)))
            .count();
        assert_eq!(completed, 1);
        assert!(outcomes
            .contains(&SyncOutcome::Skipped(SkipReason::AlreadyRunning)));
        assert_eq!(h.remote.list_partitions_calls(), 1);
        assert!(!sync.is_syncing());
    }

    #[tokio::test]
    async fn test_flag_released_after_failure() {
        let h = seeded();
        h.remote.set_failure(Some(RemoteFailure::Unauthorized));
        let sync = SyncCoordinator::new(h.access.clone());

        assert!(matches!(sync.full_sync().await, Err(Error::Remote(_))));
        assert!(!sync.is_syncing());

        h.remote.set_failure(None);
        assert!(matches!(
            sync.full_sync().await.unwrap(),
            SyncOutcome::Completed(_)
        ));
    }

    #[tokio::test]
    async fn test_offline_sync_is_skipped() {
        let h = seeded();
        h.network.set_online(false);
        let sync = SyncCoordinator::new(h.access.clone());
        assert_eq!(
            sync.full_sync().await.unwrap(),
            SyncOutcome::Skipped(SkipReason::Offline)
        );
        assert_eq!(h.remote.read_calls(), 0);
    }

    #[tokio::test]
    async fn test_status_stream_reports_progress() {
        let h = seeded();
        let sync = SyncCoordinator::new(h.access.clone());
        let mut status = sync.subscribe_status();
        assert!(!*status.borrow());

        sync.full_sync().await.unwrap();
        // Final value is idle again, and the channel saw changes
        assert!(status.has_changed().unwrap());
        assert!(!*status.borrow_and_update());
    }

    #[tokio::test]
    async fn test_reconnect_triggers_sync() {
        let h = seeded();
        h.network.set_online(false);
        let sync = Arc::new(SyncCoordinator::new(h.access.clone()));
        let subscription = sync.watch_connectivity();

        h.network.set_online(true);
        h.settle().await;
        assert!(sync.last_report().is_some());

        drop(subscription);
        assert_eq!(h.network.subscriber_count(), 0);
    }
}
