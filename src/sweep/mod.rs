pub mod cleanup;
pub mod orphans;
pub mod scanner;

pub use cleanup::{CleanupExecutor, PurgeOutcome, PurgeStatus};
pub use orphans::{OrphanCollector, OrphanReport};
pub use scanner::{find_duplicates, DuplicateScanner};

use crate::config::AppConfig;
use crate::error::Error;
use crate::storage::{OccurrenceRepository, PhotoStore};
use std::sync::{Arc, Mutex, TryLockError};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Summary of one completed sweep.
#[derive(Debug, Clone, Default)]
pub struct SweepReport {
    pub duplicates_found: usize,
    pub purged: usize,
    pub purge_failures: usize,
    pub files_removed: usize,
    pub file_failures: usize,
    pub orphans: Option<OrphanReport>,
    pub duration: Duration,
}

#[derive(Debug)]
pub enum SweepOutcome {
    Completed(SweepReport),
    /// Another sweep was still running.
    Skipped,
}

/// One sweep: scan for duplicates, purge them, then collect orphaned photos.
/// At most one sweep runs at a time per `Sweeper`.
pub struct Sweeper {
    scanner: DuplicateScanner,
    executor: CleanupExecutor,
    orphans: Option<OrphanCollector>,
    in_progress: Mutex<()>,
}

impl Sweeper {
    pub fn new(
        scanner: DuplicateScanner,
        executor: CleanupExecutor,
        orphans: Option<OrphanCollector>,
    ) -> Self {
        Sweeper {
            scanner,
            executor,
            orphans,
            in_progress: Mutex::new(()),
        }
    }

    pub fn from_config(
        config: &AppConfig,
        repository: Arc<dyn OccurrenceRepository>,
        photos: PhotoStore,
    ) -> Result<Self, Error> {
        let scanner = DuplicateScanner::new(Arc::clone(&repository), photos.clone(), config.scan_scope);
        let executor = CleanupExecutor::new(Arc::clone(&repository), photos.clone(), config.purge_workers)?;
        let orphans = config
            .orphan_sweep_enabled
            .then(|| OrphanCollector::new(repository, photos, config.orphan_min_age()));
        Ok(Sweeper::new(scanner, executor, orphans))
    }

    pub fn scanner(&self) -> &DuplicateScanner {
        &self.scanner
    }

    pub fn orphan_collector(&self) -> Option<&OrphanCollector> {
        self.orphans.as_ref()
    }

    pub fn run_once(&self) -> Result<SweepOutcome, Error> {
        let _guard = match self.in_progress.try_lock() {
            Ok(guard) => guard,
            // A panicked sweep holds no state worth protecting.
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => {
                debug!("Sweep already in progress, skipping");
                return Ok(SweepOutcome::Skipped);
            }
        };

        let start = Instant::now();
        let duplicates = self.scanner.scan()?;
        let outcomes = self.executor.purge(&duplicates);

        let mut report = SweepReport {
            duplicates_found: duplicates.len(),
            ..SweepReport::default()
        };
        for outcome in &outcomes {
            match outcome.status {
                PurgeStatus::Purged {
                    files_removed,
                    files_failed,
                    ..
                } => {
                    report.purged += 1;
                    report.files_removed += files_removed;
                    report.file_failures += files_failed;
                }
                PurgeStatus::Failed(_) => report.purge_failures += 1,
            }
        }

        if let Some(collector) = &self.orphans {
            match collector.collect() {
                Ok(orphans) => report.orphans = Some(orphans),
                Err(e) => error!("Orphan photo collection failed: {}", e),
            }
        }

        report.duration = start.elapsed();
        info!(
            "Sweep finished in {:.2}s: {} repeated, {} purged, {} failed",
            report.duration.as_secs_f64(),
            report.duplicates_found,
            report.purged,
            report.purge_failures
        );
        Ok(SweepOutcome::Completed(report))
    }
}
