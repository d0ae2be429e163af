use crate::error::Error;
use crate::storage::photo_store::{Removal, StoredPhoto};
use crate::storage::{OccurrenceRepository, PhotoStore};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{debug, error, info};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrphanReport {
    pub removed: usize,
    pub failed: usize,
}

/// Removes stored photos that no occurrence refers to.
///
/// Photos younger than `min_age` are kept: uploads may reach the store before
/// the submission that references them.
pub struct OrphanCollector {
    repository: Arc<dyn OccurrenceRepository>,
    photos: PhotoStore,
    min_age: Duration,
}

impl OrphanCollector {
    pub fn new(repository: Arc<dyn OccurrenceRepository>, photos: PhotoStore, min_age: Duration) -> Self {
        OrphanCollector {
            repository,
            photos,
            min_age,
        }
    }

    pub fn find_orphans(&self) -> Result<Vec<StoredPhoto>, Error> {
        // List before fetching references so a photo submitted in between is
        // either unlisted or referenced.
        let stored = self.photos.list()?;
        let referenced = self.repository.referenced_photos()?;
        let now = SystemTime::now();

        Ok(stored
            .into_iter()
            .filter(|photo| !referenced.contains(&photo.name))
            .filter(|photo| now.duration_since(photo.modified).unwrap_or(Duration::ZERO) >= self.min_age)
            .collect())
    }

    pub fn collect(&self) -> Result<OrphanReport, Error> {
        let orphans = self.find_orphans()?;
        let mut report = OrphanReport::default();

        for photo in &orphans {
            match self.photos.remove(&photo.name) {
                Ok(Removal::Removed) => {
                    debug!("Orphan photo deleted: {}", photo.name);
                    report.removed += 1;
                }
                Ok(Removal::Missing) => {}
                Err(e) => {
                    error!("{}", e);
                    report.failed += 1;
                }
            }
        }

        if report.removed > 0 || report.failed > 0 {
            info!(
                "Orphan photos: {} removed, {} failed",
                report.removed, report.failed
            );
        }
        Ok(report)
    }
}
