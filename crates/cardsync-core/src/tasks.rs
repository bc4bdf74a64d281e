//! Supervisor for fire-and-forget background work.
//!
//! Cache refreshes and asset batches are spawned here instead of being
//! awaited by the caller. Each task reports its outcome over a channel to a
//! single logging loop, so failures are recorded but never surfaced.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// Buffer size for the task outcome channel.
const CHANNEL_BUFFER_SIZE: usize = 32;

#[derive(Debug)]
struct TaskOutcome {
    name: String,
    elapsed: Duration,
    result: anyhow::Result<()>,
}

#[derive(Debug, Default)]
struct TaskCounters {
    completed: AtomicU64,
    failed: AtomicU64,
}

pub struct Supervisor {
    runtime: Handle,
    outcome_tx: mpsc::Sender<TaskOutcome>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    counters: Arc<TaskCounters>,
}

impl Supervisor {
    /// Start the supervisor on the current Tokio runtime.
    ///
    /// # Panics
    /// Panics if called outside a Tokio runtime.
    pub fn start() -> Arc<Self> {
        let runtime = Handle::current();
        let (outcome_tx, outcome_rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        runtime.spawn(Self::log_outcomes(outcome_rx));

        Arc::new(Self {
            runtime,
            outcome_tx,
            handles: Mutex::new(Vec::new()),
            counters: Arc::new(TaskCounters::default()),
        })
    }

    async fn log_outcomes(mut rx: mpsc::Receiver<TaskOutcome>) {
        while let Some(outcome) = rx.recv().await {
            let elapsed_ms = outcome.elapsed.as_millis() as u64;
            match outcome.result {
                Ok(()) => debug!(task = %outcome.name, elapsed_ms, "Background task finished"),
                Err(e) => warn!(
                    task = %outcome.name,
                    elapsed_ms,
                    error = %format!("{:#}", e),
                    "Background task failed"
                ),
            }
        }
    }

    /// Run `task` in the background. The caller does not wait for it.
    pub fn spawn<F>(&self, name: impl Into<String>, task: F)
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let name = name.into();
        let tx = self.outcome_tx.clone();
        let counters = Arc::clone(&self.counters);

        let handle = self.runtime.spawn(async move {
            let started = Instant::now();
            let result = task.await;
            match result {
                Ok(()) => counters.completed.fetch_add(1, Ordering::Relaxed),
                Err(_) => counters.failed.fetch_add(1, Ordering::Relaxed),
            };
            let outcome = TaskOutcome {
                name,
                elapsed: started.elapsed(),
                result,
            };
            if let Err(e) = tx.send(outcome).await {
                error!(error = %e, "Failed to report task outcome - channel closed");
            }
        });

        let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        handles.retain(|h| !h.is_finished());
        handles.push(handle);
    }

    /// Wait for every task spawned so far, including tasks those tasks spawn.
    pub async fn drain(&self) {
        loop {
            let pending: Vec<JoinHandle<()>> = std::mem::take(
                &mut *self.handles.lock().unwrap_or_else(PoisonError::into_inner),
            );
            if pending.is_empty() {
                return;
            }
            for handle in pending {
                if let Err(e) = handle.await {
                    error!(error = %e, "Background task panicked");
                }
            }
        }
    }

    pub fn in_flight(&self) -> usize {
        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|h| !h.is_finished())
            .count()
    }

    pub fn completed(&self) -> u64 {
        self.counters.completed.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.counters.failed.load(Ordering::Relaxed)
    }
}
