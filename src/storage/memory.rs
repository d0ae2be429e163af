use super::models::{Authority, NewOccurrence, OccurrenceRecord};
use super::{OccurrenceRepository, RepositoryError, RepositoryResult};
use crate::config::ScanScope;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Repository kept entirely in memory, with the same ordering and update
/// semantics as the Postgres one. Failures can be injected per operation.
#[derive(Default)]
pub struct InMemoryRepository {
    state: Mutex<MemoryState>,
    fail_fetch: AtomicBool,
}

#[derive(Default)]
struct MemoryState {
    records: Vec<OccurrenceRecord>,
    next_id: i32,
    failing_row_ids: HashSet<String>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<OccurrenceRecord>) -> Self {
        let repo = Self::new();
        if let Ok(mut state) = repo.state.lock() {
            state.next_id = records.iter().map(|r| r.id).max().unwrap_or(0);
            state.records = records;
        }
        repo
    }

    /// Make every scan fetch fail until reset.
    pub fn fail_fetches(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
    }

    /// Make every update targeting `row_id` fail.
    pub fn fail_updates_for(&self, row_id: &str) {
        if let Ok(mut state) = self.state.lock() {
            state.failing_row_ids.insert(row_id.to_string());
        }
    }

    pub fn get(&self, row_id: &str) -> Option<OccurrenceRecord> {
        self.state
            .lock()
            .ok()
            .and_then(|state| state.records.iter().find(|r| r.row_id == row_id).cloned())
    }

    pub fn records(&self) -> Vec<OccurrenceRecord> {
        self.state
            .lock()
            .map(|state| state.records.clone())
            .unwrap_or_default()
    }

    fn state(&self) -> RepositoryResult<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| RepositoryError::Unavailable("in-memory state poisoned".to_string()))
    }

    /// Apply `update` to every record matching `filter`, returning rows touched.
    fn update_where<F, U>(&self, row_id: &str, filter: F, update: U) -> RepositoryResult<usize>
    where
        F: Fn(&OccurrenceRecord) -> bool,
        U: Fn(&mut OccurrenceRecord),
    {
        let mut state = self.state()?;
        if state.failing_row_ids.contains(row_id) {
            return Err(RepositoryError::Unavailable(format!(
                "update rejected for {}",
                row_id
            )));
        }

        let mut rows = 0;
        for record in state.records.iter_mut().filter(|r| filter(r)) {
            update(record);
            rows += 1;
        }
        Ok(rows)
    }
}

impl OccurrenceRepository for InMemoryRepository {
    fn insert(&self, occurrence: &NewOccurrence) -> RepositoryResult<()> {
        let mut state = self.state()?;
        if state.records.iter().any(|r| r.row_id == occurrence.row_id) {
            return Err(RepositoryError::Unavailable(format!(
                "duplicate row id {}",
                occurrence.row_id
            )));
        }
        state.next_id += 1;
        let id = state.next_id;
        state.records.push(occurrence.clone().into_record(id));
        Ok(())
    }

    fn fetch_for_duplicate_scan(&self, scope: ScanScope) -> RepositoryResult<Vec<OccurrenceRecord>> {
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable("fetch rejected".to_string()));
        }

        let state = self.state()?;
        let mut records: Vec<OccurrenceRecord> = state
            .records
            .iter()
            .filter(|r| r.is_production)
            .filter(|r| scope == ScanScope::AllProduction || r.is_live())
            .cloned()
            .collect();

        records.sort_by(|a, b| {
            (&a.device_id, a.submitted_on, a.submitted_at, a.id).cmp(&(
                &b.device_id,
                b.submitted_on,
                b.submitted_at,
                b.id,
            ))
        });
        Ok(records)
    }

    fn mark_deleted_by_system(&self, row_id: &str) -> RepositoryResult<usize> {
        self.update_where(row_id, |r| r.row_id == row_id, |r| r.deleted_by_system = true)
    }

    fn mark_deleted_by_admin(&self, device_id: &str, row_id: &str) -> RepositoryResult<usize> {
        self.update_where(
            row_id,
            |r| r.row_id == row_id && r.device_id == device_id,
            |r| r.deleted_by_admin = true,
        )
    }

    fn mark_deleted_by_user(&self, device_id: &str, row_id: &str) -> RepositoryResult<usize> {
        self.update_where(
            row_id,
            |r| r.row_id == row_id && r.device_id == device_id,
            |r| r.deleted_by_user = true,
        )
    }

    fn set_resolved_by_user(
        &self,
        device_id: &str,
        row_id: &str,
        resolved: bool,
    ) -> RepositoryResult<usize> {
        self.update_where(
            row_id,
            |r| r.row_id == row_id && r.device_id == device_id,
            |r| {
                r.resolved = resolved;
                r.resolved_by_user = resolved;
            },
        )
    }

    fn set_resolved_by_authority(&self, row_id: &str, authority: Authority) -> RepositoryResult<usize> {
        self.update_where(row_id, |r| r.row_id == row_id, |r| match authority {
            Authority::Parish => r.resolved_by_parish = true,
            Authority::Municipality => r.resolved_by_municipality = true,
        })
    }

    fn find_by_row_id(&self, row_id: &str) -> RepositoryResult<Vec<OccurrenceRecord>> {
        let state = self.state()?;
        Ok(state
            .records
            .iter()
            .filter(|r| r.row_id == row_id)
            .cloned()
            .collect())
    }

    fn history_for_device(&self, device_id: &str) -> RepositoryResult<Vec<OccurrenceRecord>> {
        let state = self.state()?;
        let mut records: Vec<OccurrenceRecord> = state
            .records
            .iter()
            .filter(|r| r.device_id == device_id && r.is_live())
            .cloned()
            .collect();
        records.sort_by_key(|r| (r.submitted_on, r.id));
        Ok(records)
    }

    fn open_production(&self) -> RepositoryResult<Vec<OccurrenceRecord>> {
        let state = self.state()?;
        let mut records: Vec<OccurrenceRecord> = state
            .records
            .iter()
            .filter(|r| r.is_production && r.is_live() && !r.resolved)
            .cloned()
            .collect();
        records.sort_by(|a, b| {
            (&a.device_id, a.submitted_on, a.id).cmp(&(&b.device_id, b.submitted_on, b.id))
        });
        Ok(records)
    }

    fn referenced_photos(&self) -> RepositoryResult<HashSet<String>> {
        let state = self.state()?;
        Ok(state
            .records
            .iter()
            .flat_map(|r| r.photo_refs())
            .flatten()
            .map(str::to_string)
            .collect())
    }
}
