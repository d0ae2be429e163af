use crate::error::Error;
use crate::storage::photo_store::Removal;
use crate::storage::{OccurrenceRecord, OccurrenceRepository, PhotoStore};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Result of purging a single record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PurgeStatus {
    /// Flag set; file counts describe what happened to its photos.
    Purged {
        files_removed: usize,
        files_missing: usize,
        files_failed: usize,
    },
    /// Flag could not be set, files were left alone.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurgeOutcome {
    pub row_id: String,
    pub status: PurgeStatus,
}

impl PurgeOutcome {
    pub fn is_purged(&self) -> bool {
        matches!(self.status, PurgeStatus::Purged { .. })
    }
}

/// Marks records deleted-by-system and removes their photos, a bounded
/// number of records at a time.
pub struct CleanupExecutor {
    repository: Arc<dyn OccurrenceRepository>,
    photos: PhotoStore,
    workers: ThreadPool,
}

impl CleanupExecutor {
    pub fn new(
        repository: Arc<dyn OccurrenceRepository>,
        photos: PhotoStore,
        worker_count: usize,
    ) -> Result<Self, Error> {
        let workers = ThreadPoolBuilder::new()
            .num_threads(worker_count.max(1))
            .thread_name(|i| format!("purge-{}", i))
            .build()
            .map_err(|e| Error::Other(format!("could not start purge workers: {}", e)))?;
        Ok(CleanupExecutor {
            repository,
            photos,
            workers,
        })
    }

    /// Purge every record independently. Outcomes come back in input order.
    pub fn purge(&self, records: &[OccurrenceRecord]) -> Vec<PurgeOutcome> {
        let outcomes: Vec<PurgeOutcome> = self
            .workers
            .install(|| records.par_iter().map(|record| self.purge_one(record)).collect());

        let failed = outcomes.iter().filter(|o| !o.is_purged()).count();
        if failed > 0 {
            warn!("{} of {} entries could not be purged", failed, outcomes.len());
        } else if !outcomes.is_empty() {
            info!("All {} repeated entries purged", outcomes.len());
        }
        outcomes
    }

    pub fn purge_one(&self, record: &OccurrenceRecord) -> PurgeOutcome {
        debug!("Marking {} as deleted by system", record.row_id);

        let status = match self.repository.mark_deleted_by_system(&record.row_id) {
            Ok(0) => {
                warn!("No row matched {}, leaving its photos alone", record.row_id);
                PurgeStatus::Failed("no matching row".to_string())
            }
            Ok(_) => self.remove_photos(record),
            Err(e) => {
                error!("Error marking {} as deleted by system: {}", record.row_id, e);
                PurgeStatus::Failed(e.to_string())
            }
        };

        PurgeOutcome {
            row_id: record.row_id.clone(),
            status,
        }
    }

    fn remove_photos(&self, record: &OccurrenceRecord) -> PurgeStatus {
        let mut files_removed = 0;
        let mut files_missing = 0;
        let mut files_failed = 0;

        for name in record.photo_refs().into_iter().flatten() {
            match self.photos.remove(name) {
                Ok(Removal::Removed) => {
                    debug!("File deleted: {}", name);
                    files_removed += 1;
                }
                Ok(Removal::Missing) => {
                    debug!("File already gone: {}", name);
                    files_missing += 1;
                }
                Err(e) => {
                    error!("Could not delete file of {}: {}", record.row_id, e);
                    files_failed += 1;
                }
            }
        }

        PurgeStatus::Purged {
            files_removed,
            files_missing,
            files_failed,
        }
    }
}
