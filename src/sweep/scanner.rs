use crate::config::ScanScope;
use crate::error::Error;
use crate::storage::photo_store::PhotoError;
use crate::storage::{OccurrenceRecord, OccurrenceRepository, PhotoStore};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Finds repeated submissions of the same occurrence.
///
/// Repeats normally land next to each other once records are ordered by
/// device and submission time, so only adjacent pairs are compared.
pub struct DuplicateScanner {
    repository: Arc<dyn OccurrenceRepository>,
    photos: PhotoStore,
    scope: ScanScope,
}

impl DuplicateScanner {
    pub fn new(repository: Arc<dyn OccurrenceRepository>, photos: PhotoStore, scope: ScanScope) -> Self {
        DuplicateScanner {
            repository,
            photos,
            scope,
        }
    }

    /// Returns the records to purge. A failed fetch aborts the whole scan.
    pub fn scan(&self) -> Result<Vec<OccurrenceRecord>, Error> {
        let start = Instant::now();
        let records = self.repository.fetch_for_duplicate_scan(self.scope)?;
        let duplicates = find_duplicates(&records, &self.photos);
        info!(
            "{} of {} occurrences considered repeated ({:.2}s)",
            duplicates.len(),
            records.len(),
            start.elapsed().as_secs_f64()
        );
        Ok(duplicates)
    }
}

/// Walk `records` (already ordered by device, then time) pairwise and collect
/// the earlier record of every matching adjacent pair.
pub fn find_duplicates(records: &[OccurrenceRecord], photos: &PhotoStore) -> Vec<OccurrenceRecord> {
    records
        .windows(2)
        .filter(|pair| is_duplicate_pair(&pair[0], &pair[1], photos))
        .map(|pair| pair[0].clone())
        .collect()
}

/// Metadata must match on time of day, parish, device and anomaly code, and
/// the first photos must be byte-identical. Only the first photo slot is
/// compared.
pub fn is_duplicate_pair(
    previous: &OccurrenceRecord,
    current: &OccurrenceRecord,
    photos: &PhotoStore,
) -> bool {
    if previous.submitted_at != current.submitted_at
        || previous.parish != current.parish
        || previous.device_id != current.device_id
        || previous.anomaly_code != current.anomaly_code
    {
        return false;
    }

    let (Some(previous_photo), Some(current_photo)) = (previous.first_photo(), current.first_photo())
    else {
        return false;
    };

    if !photos.exists(previous_photo) || !photos.exists(current_photo) {
        debug!(
            "Skipping {} / {}: first photo not in store",
            previous.row_id, current.row_id
        );
        return false;
    }

    match photos.same_content(previous_photo, current_photo) {
        Ok(same) => same,
        Err(PhotoError::Missing(name)) => {
            debug!("Photo {} vanished during comparison", name);
            false
        }
        Err(e) => {
            warn!(
                "Could not compare photos of {} and {}: {}",
                previous.row_id, current.row_id, e
            );
            false
        }
    }
}
