//! Store contracts for reconciliation records.
//!
//! The engines and the job manager only see these traits; `memory` provides
//! in-process implementations and `pg` the Postgres ones. Write-time
//! invariants (single active discrepancy per resource field, atomic
//! resolution, terminal jobs staying terminal) are the store's
//! responsibility, not the caller's.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use premia_db::{
    CheckFilter, CheckWatermark, CreateReconciliationCheck, CreateReconciliationDiscrepancy,
    CreateReconciliationJob, DiscrepancyFilter, JobFilter, ReconciliationCheck,
    ReconciliationDiscrepancy, ReconciliationJob, ResolvedBy, UpdateReconciliationCheck,
    UpdateReconciliationJob,
};

/// Errors surfaced by store implementations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Referenced record does not exist.
    #[error("{resource} not found: {id}")]
    NotFound { resource: &'static str, id: String },

    /// The discrepancy was already resolved at write time.
    #[error("Discrepancy already resolved: {id}")]
    AlreadyResolved { id: Uuid },

    /// Status change refused because the job is terminal.
    #[error("Job is terminal and cannot transition: {id}")]
    TerminalJob { id: Uuid },

    /// Backend failure.
    #[error("Database error: {0}")]
    Database(String),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence of reconciliation jobs.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn create(&self, input: CreateReconciliationJob) -> StoreResult<ReconciliationJob>;

    /// Apply a patch. Status changes on a terminal job fail with
    /// [`StoreError::TerminalJob`].
    async fn update(
        &self,
        id: Uuid,
        patch: UpdateReconciliationJob,
    ) -> StoreResult<ReconciliationJob>;

    /// List jobs matching a filter, newest first.
    async fn find_many(&self, filter: &JobFilter) -> StoreResult<Vec<ReconciliationJob>>;

    /// First job matching a filter, newest first.
    async fn find_first(&self, filter: &JobFilter) -> StoreResult<Option<ReconciliationJob>>;
}

/// Persistence of reconciliation checks.
#[async_trait]
pub trait CheckStore: Send + Sync {
    async fn create(&self, input: CreateReconciliationCheck) -> StoreResult<ReconciliationCheck>;

    async fn update(
        &self,
        id: Uuid,
        patch: UpdateReconciliationCheck,
    ) -> StoreResult<ReconciliationCheck>;

    /// List checks matching a filter, newest first.
    async fn find_many(&self, filter: &CheckFilter) -> StoreResult<Vec<ReconciliationCheck>>;
}

/// Persistence of reconciliation discrepancies.
#[async_trait]
pub trait DiscrepancyStore: Send + Sync {
    /// Create a discrepancy unless an unresolved one already exists for the
    /// same (resource type, resource id, field); in that case the existing
    /// record is returned unchanged.
    async fn create(
        &self,
        input: CreateReconciliationDiscrepancy,
    ) -> StoreResult<ReconciliationDiscrepancy>;

    async fn find_unique(&self, id: Uuid) -> StoreResult<Option<ReconciliationDiscrepancy>>;

    /// The active (unresolved) discrepancy for a resource field, if any.
    async fn find_unresolved(
        &self,
        resource_type: &str,
        resource_id: &str,
        field: &str,
    ) -> StoreResult<Option<ReconciliationDiscrepancy>>;

    /// List discrepancies matching a filter, newest first.
    async fn find_many(
        &self,
        filter: &DiscrepancyFilter,
    ) -> StoreResult<Vec<ReconciliationDiscrepancy>>;

    /// Mark a discrepancy resolved. The already-resolved check is
    /// authoritative at write time: concurrent resolutions cannot both
    /// succeed.
    async fn resolve(
        &self,
        id: Uuid,
        resolved_by: ResolvedBy,
        resolution: JsonValue,
    ) -> StoreResult<ReconciliationDiscrepancy>;
}

/// Persistence of per-check watermarks.
#[async_trait]
pub trait WatermarkStore: Send + Sync {
    async fn get(&self, check_name: &str) -> StoreResult<Option<CheckWatermark>>;

    /// Move the watermark forward; never rewinds.
    async fn advance(
        &self,
        check_name: &str,
        last_event_at: DateTime<Utc>,
    ) -> StoreResult<CheckWatermark>;
}
