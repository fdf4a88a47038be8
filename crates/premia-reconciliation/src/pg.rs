//! Postgres store implementations.
//!
//! Thin adapters from the store traits onto the `premia-db` models. The
//! models carry the SQL; these types carry the pool and translate
//! `sqlx::Error` and missing-row outcomes into [`StoreError`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use uuid::Uuid;

use premia_db::{
    CheckFilter, CheckWatermark, CreateReconciliationCheck, CreateReconciliationDiscrepancy,
    CreateReconciliationJob, DiscrepancyFilter, JobFilter, ReconciliationCheck,
    ReconciliationDiscrepancy, ReconciliationJob, ResolvedBy, UpdateReconciliationCheck,
    UpdateReconciliationJob,
};

use crate::store::{CheckStore, DiscrepancyStore, JobStore, StoreError, StoreResult, WatermarkStore};

fn db_error(err: sqlx::Error) -> StoreError {
    StoreError::Database(err.to_string())
}

/// Postgres-backed [`JobStore`].
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn create(&self, input: CreateReconciliationJob) -> StoreResult<ReconciliationJob> {
        ReconciliationJob::create(&self.pool, &input)
            .await
            .map_err(db_error)
    }

    async fn update(
        &self,
        id: Uuid,
        patch: UpdateReconciliationJob,
    ) -> StoreResult<ReconciliationJob> {
        match ReconciliationJob::update(&self.pool, id, &patch)
            .await
            .map_err(db_error)?
        {
            Some(job) => Ok(job),
            // The guarded update matched nothing: either the row is gone or
            // a status change hit a terminal job.
            None => match ReconciliationJob::find_by_id(&self.pool, id)
                .await
                .map_err(db_error)?
            {
                Some(_) => Err(StoreError::TerminalJob { id }),
                None => Err(StoreError::NotFound {
                    resource: "Job",
                    id: id.to_string(),
                }),
            },
        }
    }

    async fn find_many(&self, filter: &JobFilter) -> StoreResult<Vec<ReconciliationJob>> {
        ReconciliationJob::find_many(&self.pool, filter)
            .await
            .map_err(db_error)
    }

    async fn find_first(&self, filter: &JobFilter) -> StoreResult<Option<ReconciliationJob>> {
        ReconciliationJob::find_first(&self.pool, filter)
            .await
            .map_err(db_error)
    }
}

/// Postgres-backed [`CheckStore`].
pub struct PgCheckStore {
    pool: PgPool,
}

impl PgCheckStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CheckStore for PgCheckStore {
    async fn create(&self, input: CreateReconciliationCheck) -> StoreResult<ReconciliationCheck> {
        ReconciliationCheck::create(&self.pool, &input)
            .await
            .map_err(db_error)
    }

    async fn update(
        &self,
        id: Uuid,
        patch: UpdateReconciliationCheck,
    ) -> StoreResult<ReconciliationCheck> {
        ReconciliationCheck::update(&self.pool, id, &patch)
            .await
            .map_err(db_error)?
            .ok_or(StoreError::NotFound {
                resource: "Check",
                id: id.to_string(),
            })
    }

    async fn find_many(&self, filter: &CheckFilter) -> StoreResult<Vec<ReconciliationCheck>> {
        ReconciliationCheck::find_many(&self.pool, filter)
            .await
            .map_err(db_error)
    }
}

/// Postgres-backed [`DiscrepancyStore`].
pub struct PgDiscrepancyStore {
    pool: PgPool,
}

impl PgDiscrepancyStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DiscrepancyStore for PgDiscrepancyStore {
    async fn create(
        &self,
        input: CreateReconciliationDiscrepancy,
    ) -> StoreResult<ReconciliationDiscrepancy> {
        ReconciliationDiscrepancy::create(&self.pool, &input)
            .await
            .map_err(db_error)
    }

    async fn find_unique(&self, id: Uuid) -> StoreResult<Option<ReconciliationDiscrepancy>> {
        ReconciliationDiscrepancy::find_by_id(&self.pool, id)
            .await
            .map_err(db_error)
    }

    async fn find_unresolved(
        &self,
        resource_type: &str,
        resource_id: &str,
        field: &str,
    ) -> StoreResult<Option<ReconciliationDiscrepancy>> {
        ReconciliationDiscrepancy::find_unresolved(&self.pool, resource_type, resource_id, field)
            .await
            .map_err(db_error)
    }

    async fn find_many(
        &self,
        filter: &DiscrepancyFilter,
    ) -> StoreResult<Vec<ReconciliationDiscrepancy>> {
        ReconciliationDiscrepancy::find_many(&self.pool, filter)
            .await
            .map_err(db_error)
    }

    async fn resolve(
        &self,
        id: Uuid,
        resolved_by: ResolvedBy,
        resolution: JsonValue,
    ) -> StoreResult<ReconciliationDiscrepancy> {
        match ReconciliationDiscrepancy::resolve(&self.pool, id, resolved_by, &resolution)
            .await
            .map_err(db_error)?
        {
            Some(resolved) => Ok(resolved),
            // Conditional update matched nothing: resolved already, or the
            // record does not exist.
            None => match ReconciliationDiscrepancy::find_by_id(&self.pool, id)
                .await
                .map_err(db_error)?
            {
                Some(_) => Err(StoreError::AlreadyResolved { id }),
                None => Err(StoreError::NotFound {
                    resource: "Discrepancy",
                    id: id.to_string(),
                }),
            },
        }
    }
}

/// Postgres-backed [`WatermarkStore`].
pub struct PgWatermarkStore {
    pool: PgPool,
}

impl PgWatermarkStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WatermarkStore for PgWatermarkStore {
    async fn get(&self, check_name: &str) -> StoreResult<Option<CheckWatermark>> {
        CheckWatermark::get(&self.pool, check_name)
            .await
            .map_err(db_error)
    }

    async fn advance(
        &self,
        check_name: &str,
        last_event_at: DateTime<Utc>,
    ) -> StoreResult<CheckWatermark> {
        CheckWatermark::advance(&self.pool, check_name, last_event_at)
            .await
            .map_err(db_error)
    }
}
