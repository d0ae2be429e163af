pub mod memory;
pub mod models;
pub mod pg;
pub mod photo_store;
pub mod schema;

pub use memory::InMemoryRepository;
pub use models::{Authority, NewOccurrence, OccurrenceRecord, PublicOccurrence};
pub use pg::PgRepository;
pub use photo_store::PhotoStore;

use crate::config::ScanScope;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("query failed: {0}")]
    Query(#[from] diesel::result::Error),

    #[error("connection pool: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),

    #[error("migration failed: {0}")]
    Migration(String),

    #[error("{0}")]
    Unavailable(String),
}

pub type RepositoryResult<T> = std::result::Result<T, RepositoryError>;

/// Access to the occurrences table.
///
/// Every update is scoped by the record's unique `row_id` (and, for commands
/// coming from a device, by its `device_id` as well). Soft-delete flags are
/// only ever set, never cleared.
pub trait OccurrenceRepository: Send + Sync {
    fn insert(&self, occurrence: &NewOccurrence) -> RepositoryResult<()>;

    /// Production records ordered by device, then submission date and time,
    /// then insertion order.
    fn fetch_for_duplicate_scan(&self, scope: ScanScope) -> RepositoryResult<Vec<OccurrenceRecord>>;

    fn mark_deleted_by_system(&self, row_id: &str) -> RepositoryResult<usize>;

    fn mark_deleted_by_admin(&self, device_id: &str, row_id: &str) -> RepositoryResult<usize>;

    fn mark_deleted_by_user(&self, device_id: &str, row_id: &str) -> RepositoryResult<usize>;

    /// Sets both the overall resolved flag and the submitter's own flag.
    fn set_resolved_by_user(
        &self,
        device_id: &str,
        row_id: &str,
        resolved: bool,
    ) -> RepositoryResult<usize>;

    fn set_resolved_by_authority(&self, row_id: &str, authority: Authority) -> RepositoryResult<usize>;

    fn find_by_row_id(&self, row_id: &str) -> RepositoryResult<Vec<OccurrenceRecord>>;

    /// Live records of one device ordered by submission date.
    fn history_for_device(&self, device_id: &str) -> RepositoryResult<Vec<OccurrenceRecord>>;

    /// Live, unresolved production records ordered by device and date.
    fn open_production(&self) -> RepositoryResult<Vec<OccurrenceRecord>>;

    /// Every photo name referenced by any record, whatever its state.
    fn referenced_photos(&self) -> RepositoryResult<HashSet<String>>;
}
