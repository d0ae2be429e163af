use super::models::{Authority, NewOccurrence, OccurrenceRecord};
use super::schema::ocorrencias;
use super::{OccurrenceRepository, RepositoryError, RepositoryResult};
use crate::config::ScanScope;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use std::collections::HashSet;
use std::time::Duration;
use tracing::debug;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

type PgPool = Pool<ConnectionManager<PgConnection>>;
type PgPooled = PooledConnection<ConnectionManager<PgConnection>>;

/// Postgres-backed repository. Connections are checked out of the pool for
/// the duration of a single statement and handed back straight after.
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub fn connect(
        database_url: &str,
        max_size: u32,
        connection_timeout: Duration,
    ) -> RepositoryResult<Self> {
        let manager = ConnectionManager::<PgConnection>::new(database_url);
        let pool = Pool::builder()
            .max_size(max_size)
            .connection_timeout(connection_timeout)
            .build(manager)?;
        debug!("Postgres pool ready (max {} connections)", max_size);
        Ok(PgRepository { pool })
    }

    fn connection(&self) -> RepositoryResult<PgPooled> {
        Ok(self.pool.get()?)
    }

    /// Apply pending embedded migrations, returning how many ran.
    pub fn run_migrations(&self) -> RepositoryResult<usize> {
        let mut conn = self.connection()?;
        let applied = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(|e| RepositoryError::Migration(e.to_string()))?;
        for version in &applied {
            debug!("Applied migration {}", version);
        }
        Ok(applied.len())
    }
}

impl OccurrenceRepository for PgRepository {
    fn insert(&self, occurrence: &NewOccurrence) -> RepositoryResult<()> {
        let mut conn = self.connection()?;
        diesel::insert_into(ocorrencias::table)
            .values(occurrence)
            .execute(&mut conn)?;
        debug!("Inserted occurrence {}", occurrence.row_id);
        Ok(())
    }

    fn fetch_for_duplicate_scan(&self, scope: ScanScope) -> RepositoryResult<Vec<OccurrenceRecord>> {
        let mut conn = self.connection()?;

        let mut query = ocorrencias::table
            .select(OccurrenceRecord::as_select())
            .filter(ocorrencias::prod.eq(true))
            .into_boxed();

        if scope == ScanScope::LiveProduction {
            query = query
                .filter(ocorrencias::deleted_by_admin.eq(false))
                .filter(ocorrencias::deleted_by_user.eq(false))
                .filter(ocorrencias::deleted_by_sys.eq(false));
        }

        let records = query
            .order((
                ocorrencias::uuid.asc(),
                ocorrencias::data_data.asc(),
                ocorrencias::data_hora.asc(),
                ocorrencias::id.asc(),
            ))
            .load(&mut conn)?;

        debug!("Fetched {} production occurrences ({:?})", records.len(), scope);
        Ok(records)
    }

    fn mark_deleted_by_system(&self, row_id: &str) -> RepositoryResult<usize> {
        let mut conn = self.connection()?;
        let rows = diesel::update(ocorrencias::table.filter(ocorrencias::table_row_uuid.eq(row_id)))
            .set(ocorrencias::deleted_by_sys.eq(true))
            .execute(&mut conn)?;
        Ok(rows)
    }

    fn mark_deleted_by_admin(&self, device_id: &str, row_id: &str) -> RepositoryResult<usize> {
        let mut conn = self.connection()?;
        let rows = diesel::update(
            ocorrencias::table
                .filter(ocorrencias::uuid.eq(device_id))
                .filter(ocorrencias::table_row_uuid.eq(row_id)),
        )
        .set(ocorrencias::deleted_by_admin.eq(true))
        .execute(&mut conn)?;
        Ok(rows)
    }

    fn mark_deleted_by_user(&self, device_id: &str, row_id: &str) -> RepositoryResult<usize> {
        let mut conn = self.connection()?;
        let rows = diesel::update(
            ocorrencias::table
                .filter(ocorrencias::uuid.eq(device_id))
                .filter(ocorrencias::table_row_uuid.eq(row_id)),
        )
        .set(ocorrencias::deleted_by_user.eq(true))
        .execute(&mut conn)?;
        Ok(rows)
    }

    fn set_resolved_by_user(
        &self,
        device_id: &str,
        row_id: &str,
        resolved: bool,
    ) -> RepositoryResult<usize> {
        let mut conn = self.connection()?;
        let rows = diesel::update(
            ocorrencias::table
                .filter(ocorrencias::uuid.eq(device_id))
                .filter(ocorrencias::table_row_uuid.eq(row_id)),
        )
        .set((
            ocorrencias::ocorrencia_resolvida.eq(resolved),
            ocorrencias::ocorrencia_resolvida_por_op.eq(resolved),
        ))
        .execute(&mut conn)?;
        Ok(rows)
    }

    fn set_resolved_by_authority(&self, row_id: &str, authority: Authority) -> RepositoryResult<usize> {
        let mut conn = self.connection()?;
        let target = ocorrencias::table.filter(ocorrencias::table_row_uuid.eq(row_id));
        let rows = match authority {
            Authority::Parish => diesel::update(target)
                .set(ocorrencias::ocorrencia_resolvida_por_freguesia.eq(true))
                .execute(&mut conn)?,
            Authority::Municipality => diesel::update(target)
                .set(ocorrencias::ocorrencia_resolvida_por_municipio.eq(true))
                .execute(&mut conn)?,
        };
        Ok(rows)
    }

    fn find_by_row_id(&self, row_id: &str) -> RepositoryResult<Vec<OccurrenceRecord>> {
        let mut conn = self.connection()?;
        let records = ocorrencias::table
            .filter(ocorrencias::table_row_uuid.eq(row_id))
            .select(OccurrenceRecord::as_select())
            .load(&mut conn)?;
        Ok(records)
    }

    fn history_for_device(&self, device_id: &str) -> RepositoryResult<Vec<OccurrenceRecord>> {
        let mut conn = self.connection()?;
        let records = ocorrencias::table
            .filter(ocorrencias::uuid.eq(device_id))
            .filter(ocorrencias::deleted_by_admin.eq(false))
            .filter(ocorrencias::deleted_by_user.eq(false))
            .filter(ocorrencias::deleted_by_sys.eq(false))
            .order((ocorrencias::data_data.asc(), ocorrencias::id.asc()))
            .select(OccurrenceRecord::as_select())
            .load(&mut conn)?;
        Ok(records)
    }

    fn open_production(&self) -> RepositoryResult<Vec<OccurrenceRecord>> {
        let mut conn = self.connection()?;
        let records = ocorrencias::table
            .filter(ocorrencias::prod.eq(true))
            .filter(ocorrencias::deleted_by_admin.eq(false))
            .filter(ocorrencias::deleted_by_user.eq(false))
            .filter(ocorrencias::deleted_by_sys.eq(false))
            .filter(ocorrencias::ocorrencia_resolvida.eq(false))
            .order((
                ocorrencias::uuid.asc(),
                ocorrencias::data_data.asc(),
                ocorrencias::id.asc(),
            ))
            .select(OccurrenceRecord::as_select())
            .load(&mut conn)?;
        Ok(records)
    }

    fn referenced_photos(&self) -> RepositoryResult<HashSet<String>> {
        let mut conn = self.connection()?;
        let slots: Vec<(Option<String>, Option<String>, Option<String>, Option<String>)> =
            ocorrencias::table
                .select((
                    ocorrencias::foto1,
                    ocorrencias::foto2,
                    ocorrencias::foto3,
                    ocorrencias::foto4,
                ))
                .load(&mut conn)?;

        Ok(slots
            .into_iter()
            .flat_map(|(a, b, c, d)| [a, b, c, d])
            .flatten()
            .filter(|name| !name.is_empty())
            .collect())
    }
}
