use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::{CleanupTier, TempScope};
use crate::utils::fs::{file_size, list_dir, remove_dir_if_exists};
use crate::utils::remove_file_if_exists;

/// Default processed-image count that triggers a cleanup.
const DEFAULT_MAX_PROCESSED: usize = 10;

/// Default tracked-file count that triggers a cleanup.
const DEFAULT_MAX_TRACKED: usize = 20;

/// Default minimum time between two triggered cleanups.
const DEFAULT_COOLDOWN: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct GuardConfig {
    pub max_processed: usize,
    pub max_tracked: usize,
    pub cooldown: Duration,
    pub temp_dir: PathBuf,
}

impl GuardConfig {
    pub fn new(temp_dir: PathBuf) -> Self {
        Self {
            max_processed: DEFAULT_MAX_PROCESSED,
            max_tracked: DEFAULT_MAX_TRACKED,
            cooldown: DEFAULT_COOLDOWN,
            temp_dir,
        }
    }
}

/// What a cleanup pass did.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanupReport {
    pub tier: CleanupTier,
    pub files_removed: usize,
    pub temp_entries_removed: usize,
    pub bytes_freed: u64,
    pub memory_reclaimed: bool,
    pub failures: usize,
}

impl CleanupReport {
    fn new(tier: CleanupTier) -> Self {
        Self {
            tier,
            files_removed: 0,
            temp_entries_removed: 0,
            bytes_freed: 0,
            memory_reclaimed: false,
            failures: 0,
        }
    }
}

#[derive(Debug, Default)]
struct GuardState {
    tracked: Vec<PathBuf>,
    processed: usize,
    last_cleanup: Option<Instant>,
    original: Option<PathBuf>,
}

type Reclaimer = Box<dyn Fn() + Send + Sync>;

pub struct ResourceGuard {
    config: GuardConfig,
    state: Mutex<GuardState>,
    reclaimers: Mutex<Vec<Reclaimer>>,
}

impl ResourceGuard {
    pub fn new(config: GuardConfig) -> Self {
        Self {
            config,
            state: Mutex::new(GuardState::default()),
            reclaimers: Mutex::new(Vec::new()),
        }
    }

    fn state(&self) -> MutexGuard<'_, GuardState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    // ===== Tracking =====

    pub fn track(&self, path: impl Into<PathBuf>) {
        let path = path.into();
        let mut state = self.state();
        if !state.tracked.contains(&path) {
            state.tracked.push(path);
        }
    }

    pub fn record_processed(&self) {
        self.state().processed += 1;
    }

    /// Mark the image being edited. It survives every cleanup tier.
    pub fn mark_original(&self, path: impl Into<PathBuf>) {
        self.state().original = Some(path.into());
    }

    pub fn original(&self) -> Option<PathBuf> {
        self.state().original.clone()
    }

    pub fn tracked(&self) -> Vec<PathBuf> {
        self.state().tracked.clone()
    }

    pub fn processed(&self) -> usize {
        self.state().processed
    }

    /// Bytes on disk held by tracked files.
    pub fn tracked_bytes(&self) -> u64 {
        self.state().tracked.iter().map(|p| file_size(p)).sum()
    }

    /// Register a callback that drops in-memory caches on every tier above
    /// minimal.
    pub fn on_reclaim(&self, reclaim: impl Fn() + Send + Sync + 'static) {
        self.reclaimers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(reclaim));
    }

    /// True once either threshold is exceeded and the cooldown has elapsed.
    pub fn should_cleanup(&self) -> bool {
        let state = self.state();
        let over = state.processed > self.config.max_processed
            || state.tracked.len() > self.config.max_tracked;
        let cooled = state
            .last_cleanup
            .map_or(true, |at| at.elapsed() >= self.config.cooldown);
        over && cooled
    }

    // ===== Cleanup =====

    pub fn minimal_cleanup(&self, preserve: &[PathBuf]) -> CleanupReport {
        self.cleanup(CleanupTier::Minimal, preserve)
    }

    pub fn gentle_cleanup(&self, preserve: &[PathBuf]) -> CleanupReport {
        self.cleanup(CleanupTier::Gentle, preserve)
    }

    pub fn force_cleanup(&self, preserve: &[PathBuf]) -> CleanupReport {
        self.cleanup(CleanupTier::Force, preserve)
    }

    pub fn emergency_cleanup(&self) -> CleanupReport {
        self.cleanup(CleanupTier::Emergency, &[])
    }

    pub fn cleanup(&self, tier: CleanupTier, preserve: &[PathBuf]) -> CleanupReport {
        let mut report = CleanupReport::new(tier);

        {
            let mut state = self.state();
            let mut keep: HashSet<PathBuf> = HashSet::new();
            if tier.honors_preserve_list() {
                keep.extend(preserve.iter().cloned());
            }
            if let Some(original) = &state.original {
                keep.insert(original.clone());
            }

            let tracked = std::mem::take(&mut state.tracked);
            for path in tracked {
                if keep.contains(&path) {
                    state.tracked.push(path);
                    continue;
                }
                let size = file_size(&path);
                match remove_file_if_exists(&path) {
                    Ok(removed) => {
                        if removed {
                            report.files_removed += 1;
                            report.bytes_freed += size;
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, path = %path.display(), "Failed to delete tracked file");
                        report.failures += 1;
                        state.tracked.push(path);
                    }
                }
            }

            self.clear_temp(tier.temp_scope(), &keep, &mut report);

            state.processed = 0;
            state.last_cleanup = Some(Instant::now());
        }

        if tier.reclaims_memory() {
            let reclaimers = self.reclaimers.lock().unwrap_or_else(PoisonError::into_inner);
            for reclaim in reclaimers.iter() {
                reclaim();
            }
            report.memory_reclaimed = true;
        }

        info!(
            %tier,
            files = report.files_removed,
            temp_entries = report.temp_entries_removed,
            bytes = report.bytes_freed,
            failures = report.failures,
            "Resource cleanup finished"
        );
        report
    }

    fn clear_temp(&self, scope: TempScope, keep: &HashSet<PathBuf>, report: &mut CleanupReport) {
        let files_only = match scope {
            TempScope::Untouched => return,
            TempScope::Files => true,
            TempScope::Everything => false,
        };

        let entries = match list_dir(&self.config.temp_dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, dir = %self.config.temp_dir.display(), "Cannot list temp directory");
                report.failures += 1;
                return;
            }
        };

        for entry in entries {
            if keep.iter().any(|k| k == &entry || k.starts_with(&entry)) {
                continue;
            }
            let is_dir = entry.is_dir();
            if is_dir && files_only {
                continue;
            }
            let (size, removed) = if is_dir {
                (0, remove_dir_if_exists(&entry))
            } else {
                (file_size(&entry), remove_file_if_exists(&entry))
            };
            match removed {
                Ok(true) => {
                    report.temp_entries_removed += 1;
                    report.bytes_freed += size;
                }
                Ok(false) => {}
                Err(e) => {
                    debug!(error = %e, path = %entry.display(), "Temp entry not removed");
                    report.failures += 1;
                }
            }
        }
    }

    /// Forget everything, including the original image. Deletes nothing.
    pub fn reset(&self) {
        *self.state() = GuardState::default();
    }
}
