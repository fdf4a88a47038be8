//! In-memory store and adapter implementations.
//!
//! Backs unit and integration tests, and small deployments that do not need
//! durable reconciliation history. Every write-time invariant the Postgres
//! implementations enforce is enforced here too, under a single mutex per
//! store so concurrent engine tasks cannot race past the checks.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use premia_db::{
    CheckFilter, CheckWatermark, CreateReconciliationCheck, CreateReconciliationDiscrepancy,
    CreateReconciliationJob, DiscrepancyFilter, JobFilter, ReconciliationCheck,
    ReconciliationDiscrepancy, ReconciliationJob, ResolvedBy, UpdateReconciliationCheck,
    UpdateReconciliationJob,
};

use crate::carrier::{CarrierFile, CarrierFileSource, CollectionSource, PremiumTransaction};
use crate::event::{AdapterResult, Event, EventFilter, EventQueue, EventSource, Snapshot, SnapshotStore};
use crate::store::{CheckStore, DiscrepancyStore, JobStore, StoreError, StoreResult, WatermarkStore};
use crate::types::{BillingPeriod, DateRange};

fn lock_poisoned() -> StoreError {
    StoreError::Database("store mutex poisoned".to_string())
}

/// In-memory [`JobStore`].
#[derive(Default)]
pub struct InMemoryJobStore {
    jobs: Mutex<Vec<ReconciliationJob>>,
}

impl InMemoryJobStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a pre-built job record, e.g. history from before this process.
    pub fn insert(&self, job: ReconciliationJob) {
        if let Ok(mut jobs) = self.jobs.lock() {
            jobs.push(job);
        }
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn create(&self, input: CreateReconciliationJob) -> StoreResult<ReconciliationJob> {
        let job = ReconciliationJob {
            id: Uuid::new_v4(),
            job_type: input.job_type.to_string(),
            status: "pending".to_string(),
            config: input.config,
            created_by: input.created_by,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            results: None,
            errors: None,
        };
        let mut jobs = self.jobs.lock().map_err(|_| lock_poisoned())?;
        jobs.push(job.clone());
        Ok(job)
    }

    async fn update(
        &self,
        id: Uuid,
        patch: UpdateReconciliationJob,
    ) -> StoreResult<ReconciliationJob> {
        let mut jobs = self.jobs.lock().map_err(|_| lock_poisoned())?;
        let job = jobs
            .iter_mut()
            .find(|j| j.id == id)
            .ok_or(StoreError::NotFound {
                resource: "Job",
                id: id.to_string(),
            })?;

        if patch.status.is_some() && job.status().is_terminal() {
            return Err(StoreError::TerminalJob { id });
        }

        if let Some(status) = patch.status {
            job.status = status.to_string();
        }
        if let Some(started_at) = patch.started_at {
            job.started_at = Some(started_at);
        }
        if let Some(completed_at) = patch.completed_at {
            job.completed_at = Some(completed_at);
        }
        if let Some(results) = patch.results {
            job.results = Some(results);
        }
        if let Some(errors) = patch.errors {
            job.errors = Some(errors);
        }

        Ok(job.clone())
    }

    async fn find_many(&self, filter: &JobFilter) -> StoreResult<Vec<ReconciliationJob>> {
        let jobs = self.jobs.lock().map_err(|_| lock_poisoned())?;
        let mut matched: Vec<ReconciliationJob> = jobs
            .iter()
            .rev()
            .filter(|j| filter.id.is_none_or(|id| j.id == id))
            .filter(|j| filter.job_type.is_none_or(|t| j.job_type() == t))
            .filter(|j| filter.statuses.is_empty() || filter.statuses.contains(&j.status()))
            .filter(|j| filter.created_after.is_none_or(|cutoff| j.created_at >= cutoff))
            .cloned()
            .collect();

        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matched.truncate(filter.limit.unwrap_or(500).max(0) as usize);
        Ok(matched)
    }

    async fn find_first(&self, filter: &JobFilter) -> StoreResult<Option<ReconciliationJob>> {
        Ok(self.find_many(filter).await?.into_iter().next())
    }
}

/// In-memory [`CheckStore`].
#[derive(Default)]
pub struct InMemoryCheckStore {
    checks: Mutex<Vec<ReconciliationCheck>>,
}

impl InMemoryCheckStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckStore for InMemoryCheckStore {
    async fn create(&self, input: CreateReconciliationCheck) -> StoreResult<ReconciliationCheck> {
        let check = ReconciliationCheck {
            id: Uuid::new_v4(),
            job_id: input.job_id,
            resource_type: input.resource_type,
            resource_id: input.resource_id,
            check_name: input.check_name,
            metadata: input.metadata,
            outcome: input.outcome.to_string(),
            created_at: Utc::now(),
        };
        let mut checks = self.checks.lock().map_err(|_| lock_poisoned())?;
        checks.push(check.clone());
        Ok(check)
    }

    async fn update(
        &self,
        id: Uuid,
        patch: UpdateReconciliationCheck,
    ) -> StoreResult<ReconciliationCheck> {
        let mut checks = self.checks.lock().map_err(|_| lock_poisoned())?;
        let check = checks
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(StoreError::NotFound {
                resource: "Check",
                id: id.to_string(),
            })?;

        if let Some(metadata) = patch.metadata {
            check.metadata = metadata;
        }
        if let Some(outcome) = patch.outcome {
            check.outcome = outcome.to_string();
        }

        Ok(check.clone())
    }

    async fn find_many(&self, filter: &CheckFilter) -> StoreResult<Vec<ReconciliationCheck>> {
        let checks = self.checks.lock().map_err(|_| lock_poisoned())?;
        let mut matched: Vec<ReconciliationCheck> = checks
            .iter()
            .rev()
            .filter(|c| filter.job_id.is_none_or(|id| c.job_id == id))
            .filter(|c| {
                filter
                    .check_name
                    .as_ref()
                    .is_none_or(|name| &c.check_name == name)
            })
            .filter(|c| filter.outcome.is_none_or(|o| c.outcome() == o))
            .cloned()
            .collect();

        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matched.truncate(filter.limit.unwrap_or(10_000).max(0) as usize);
        Ok(matched)
    }
}

/// In-memory [`DiscrepancyStore`].
#[derive(Default)]
pub struct InMemoryDiscrepancyStore {
    discrepancies: Mutex<Vec<ReconciliationDiscrepancy>>,
}

impl InMemoryDiscrepancyStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DiscrepancyStore for InMemoryDiscrepancyStore {
    async fn create(
        &self,
        input: CreateReconciliationDiscrepancy,
    ) -> StoreResult<ReconciliationDiscrepancy> {
        let mut discrepancies = self.discrepancies.lock().map_err(|_| lock_poisoned())?;

        // Check-and-insert under one lock: the single-active invariant
        // cannot be raced past.
        if let Some(existing) = discrepancies.iter().find(|d| {
            !d.resolved
                && d.resource_type == input.resource_type
                && d.resource_id == input.resource_id
                && d.field == input.field
        }) {
            return Ok(existing.clone());
        }

        let discrepancy = ReconciliationDiscrepancy {
            id: Uuid::new_v4(),
            check_id: input.check_id,
            resource_type: input.resource_type,
            resource_id: input.resource_id,
            field: input.field,
            authoritative_value: input.authoritative_value,
            local_value: input.local_value,
            resolved: false,
            resolved_at: None,
            resolved_by: None,
            resolution: None,
            created_at: Utc::now(),
        };
        discrepancies.push(discrepancy.clone());
        Ok(discrepancy)
    }

    async fn find_unique(&self, id: Uuid) -> StoreResult<Option<ReconciliationDiscrepancy>> {
        let discrepancies = self.discrepancies.lock().map_err(|_| lock_poisoned())?;
        Ok(discrepancies.iter().find(|d| d.id == id).cloned())
    }

    async fn find_unresolved(
        &self,
        resource_type: &str,
        resource_id: &str,
        field: &str,
    ) -> StoreResult<Option<ReconciliationDiscrepancy>> {
        let discrepancies = self.discrepancies.lock().map_err(|_| lock_poisoned())?;
        Ok(discrepancies
            .iter()
            .find(|d| {
                !d.resolved
                    && d.resource_type == resource_type
                    && d.resource_id == resource_id
                    && d.field == field
            })
            .cloned())
    }

    async fn find_many(
        &self,
        filter: &DiscrepancyFilter,
    ) -> StoreResult<Vec<ReconciliationDiscrepancy>> {
        let discrepancies = self.discrepancies.lock().map_err(|_| lock_poisoned())?;
        let mut matched: Vec<ReconciliationDiscrepancy> = discrepancies
            .iter()
            .rev()
            .filter(|d| {
                filter
                    .check_ids
                    .as_ref()
                    .is_none_or(|ids| ids.contains(&d.check_id))
            })
            .filter(|d| {
                filter
                    .resource_type
                    .as_ref()
                    .is_none_or(|t| &d.resource_type == t)
            })
            .filter(|d| {
                filter
                    .resource_id
                    .as_ref()
                    .is_none_or(|id| &d.resource_id == id)
            })
            .filter(|d| filter.field.as_ref().is_none_or(|f| &d.field == f))
            .filter(|d| filter.resolved.is_none_or(|r| d.resolved == r))
            .cloned()
            .collect();

        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matched.truncate(filter.limit.unwrap_or(10_000).max(0) as usize);
        Ok(matched)
    }

    async fn resolve(
        &self,
        id: Uuid,
        resolved_by: ResolvedBy,
        resolution: JsonValue,
    ) -> StoreResult<ReconciliationDiscrepancy> {
        let mut discrepancies = self.discrepancies.lock().map_err(|_| lock_poisoned())?;
        let discrepancy = discrepancies
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or(StoreError::NotFound {
                resource: "Discrepancy",
                id: id.to_string(),
            })?;

        if discrepancy.resolved {
            return Err(StoreError::AlreadyResolved { id });
        }

        discrepancy.resolved = true;
        discrepancy.resolved_at = Some(Utc::now());
        discrepancy.resolved_by = Some(resolved_by.to_string());
        discrepancy.resolution = Some(resolution);
        Ok(discrepancy.clone())
    }
}

/// In-memory [`WatermarkStore`].
#[derive(Default)]
pub struct InMemoryWatermarkStore {
    watermarks: Mutex<HashMap<String, CheckWatermark>>,
}

impl InMemoryWatermarkStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WatermarkStore for InMemoryWatermarkStore {
    async fn get(&self, check_name: &str) -> StoreResult<Option<CheckWatermark>> {
        let watermarks = self.watermarks.lock().map_err(|_| lock_poisoned())?;
        Ok(watermarks.get(check_name).cloned())
    }

    async fn advance(
        &self,
        check_name: &str,
        last_event_at: DateTime<Utc>,
    ) -> StoreResult<CheckWatermark> {
        let mut watermarks = self.watermarks.lock().map_err(|_| lock_poisoned())?;
        let entry = watermarks
            .entry(check_name.to_string())
            .and_modify(|w| {
                if last_event_at > w.last_event_at {
                    w.last_event_at = last_event_at;
                    w.updated_at = Utc::now();
                }
            })
            .or_insert_with(|| CheckWatermark {
                check_name: check_name.to_string(),
                last_event_at,
                updated_at: Utc::now(),
            });
        Ok(entry.clone())
    }
}

/// In-memory [`EventSource`] seeded with a fixed set of events.
#[derive(Default)]
pub struct InMemoryEventSource {
    events: Mutex<Vec<Event>>,
}

impl InMemoryEventSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_events(events: Vec<Event>) -> Self {
        Self {
            events: Mutex::new(events),
        }
    }

    /// Append an event to the source.
    pub fn push(&self, event: Event) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

#[async_trait]
impl EventSource for InMemoryEventSource {
    async fn get_events(&self, filter: &EventFilter) -> AdapterResult<Vec<Event>> {
        let events = self.events.lock().map_or_else(|_| Vec::new(), |e| e.clone());
        let mut matched: Vec<Event> = events
            .into_iter()
            .filter(|e| {
                filter
                    .resource_type
                    .as_ref()
                    .is_none_or(|t| &e.resource_type == t)
            })
            .filter(|e| filter.since.is_none_or(|since| e.timestamp > since))
            .collect();

        matched.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        if let Some(limit) = filter.limit {
            matched.truncate(limit);
        }
        Ok(matched)
    }
}

/// In-memory [`EventQueue`] that records enqueued events.
#[derive(Default)]
pub struct InMemoryEventQueue {
    queued: Mutex<Vec<Event>>,
}

impl InMemoryEventQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Events enqueued so far, oldest first.
    #[must_use]
    pub fn events(&self) -> Vec<Event> {
        self.queued.lock().map_or_else(|_| Vec::new(), |q| q.clone())
    }
}

#[async_trait]
impl EventQueue for InMemoryEventQueue {
    async fn enqueue(&self, event: Event) -> AdapterResult<()> {
        if let Ok(mut queued) = self.queued.lock() {
            queued.push(event);
        }
        Ok(())
    }
}

/// In-memory [`SnapshotStore`] keyed by external ID.
#[derive(Default)]
pub struct InMemorySnapshotStore {
    snapshots: Mutex<HashMap<String, Snapshot>>,
}

impl InMemorySnapshotStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a snapshot.
    pub fn insert(&self, snapshot: Snapshot) {
        if let Ok(mut snapshots) = self.snapshots.lock() {
            snapshots.insert(snapshot.external_id.clone(), snapshot);
        }
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn get_by_external_id(&self, external_id: &str) -> AdapterResult<Option<Snapshot>> {
        let snapshots = self
            .snapshots
            .lock()
            .map_or_else(|_| HashMap::new(), |s| s.clone());
        Ok(snapshots.get(external_id).cloned())
    }
}

/// In-memory [`CollectionSource`] seeded with transactions.
#[derive(Default)]
pub struct InMemoryCollectionSource {
    transactions: Mutex<Vec<PremiumTransaction>>,
}

impl InMemoryCollectionSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_transactions(transactions: Vec<PremiumTransaction>) -> Self {
        Self {
            transactions: Mutex::new(transactions),
        }
    }

    /// Append a transaction.
    pub fn push(&self, transaction: PremiumTransaction) {
        if let Ok(mut transactions) = self.transactions.lock() {
            transactions.push(transaction);
        }
    }
}

#[async_trait]
impl CollectionSource for InMemoryCollectionSource {
    async fn collected_transactions(
        &self,
        range: &DateRange,
        include_pending: bool,
    ) -> AdapterResult<Vec<PremiumTransaction>> {
        let transactions = self
            .transactions
            .lock()
            .map_or_else(|_| Vec::new(), |t| t.clone());
        Ok(transactions
            .into_iter()
            .filter(|t| range.contains(t.collected_at))
            .filter(|t| include_pending || t.status.is_final())
            .collect())
    }
}

/// In-memory [`CarrierFileSource`] keyed by billing period.
#[derive(Default)]
pub struct InMemoryCarrierFileSource {
    files: Mutex<HashMap<BillingPeriod, Vec<CarrierFile>>>,
}

impl InMemoryCarrierFileSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register remittance files for a billing period.
    pub fn insert(&self, period: BillingPeriod, files: Vec<CarrierFile>) {
        if let Ok(mut map) = self.files.lock() {
            map.insert(period, files);
        }
    }
}

#[async_trait]
impl CarrierFileSource for InMemoryCarrierFileSource {
    async fn carrier_files(&self, period: &BillingPeriod) -> AdapterResult<Vec<CarrierFile>> {
        let files = self
            .files
            .lock()
            .map_or_else(|_| HashMap::new(), |f| f.clone());
        Ok(files.get(period).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use premia_db::{CheckOutcome, JobStatus, JobType};
    use serde_json::json;

    fn sample_job_input() -> CreateReconciliationJob {
        CreateReconciliationJob {
            job_type: JobType::TransferStatusReconciliation,
            config: json!({"type": "transfer_status_reconciliation"}),
            created_by: "system".to_string(),
        }
    }

    fn sample_discrepancy_input(check_id: Uuid) -> CreateReconciliationDiscrepancy {
        CreateReconciliationDiscrepancy {
            check_id,
            resource_type: "transfer".to_string(),
            resource_id: "transfer-123".to_string(),
            field: "status".to_string(),
            authoritative_value: "\"completed\"".to_string(),
            local_value: "\"pending\"".to_string(),
        }
    }

    #[tokio::test]
    async fn test_job_store_create_and_update() {
        let store = InMemoryJobStore::new();
        let job = store.create(sample_job_input()).await.unwrap();
        assert_eq!(job.status(), JobStatus::Pending);

        let updated = store
            .update(job.id, UpdateReconciliationJob::started(Utc::now()))
            .await
            .unwrap();
        assert_eq!(updated.status(), JobStatus::Running);
        assert!(updated.started_at.is_some());
    }

    #[tokio::test]
    async fn test_job_store_terminal_is_immutable() {
        let store = InMemoryJobStore::new();
        let job = store.create(sample_job_input()).await.unwrap();
        store
            .update(job.id, UpdateReconciliationJob::completed(Utc::now(), json!({})))
            .await
            .unwrap();

        let err = store
            .update(job.id, UpdateReconciliationJob::started(Utc::now()))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::TerminalJob { .. }));
    }

    #[tokio::test]
    async fn test_job_store_active_filter() {
        let store = InMemoryJobStore::new();
        let first = store.create(sample_job_input()).await.unwrap();
        let _second = store.create(sample_job_input()).await.unwrap();
        store
            .update(first.id, UpdateReconciliationJob::completed(Utc::now(), json!({})))
            .await
            .unwrap();

        let active = store
            .find_many(
                &JobFilter::new()
                    .with_type(JobType::TransferStatusReconciliation)
                    .active_only(),
            )
            .await
            .unwrap();
        assert_eq!(active.len(), 1);
        assert!(active[0].status().is_active());
    }

    #[tokio::test]
    async fn test_job_store_update_missing() {
        let store = InMemoryJobStore::new();
        let err = store
            .update(Uuid::new_v4(), UpdateReconciliationJob::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_discrepancy_store_single_active_invariant() {
        let store = InMemoryDiscrepancyStore::new();
        let first = store
            .create(sample_discrepancy_input(Uuid::new_v4()))
            .await
            .unwrap();
        let second = store
            .create(sample_discrepancy_input(Uuid::new_v4()))
            .await
            .unwrap();
        assert_eq!(first.id, second.id);

        // Once resolved, a new active discrepancy may be created.
        store
            .resolve(first.id, ResolvedBy::Manual, json!({"type": "ignore"}))
            .await
            .unwrap();
        let third = store
            .create(sample_discrepancy_input(Uuid::new_v4()))
            .await
            .unwrap();
        assert_ne!(first.id, third.id);
    }

    #[tokio::test]
    async fn test_discrepancy_store_find_unique() {
        let store = InMemoryDiscrepancyStore::new();
        let created = store
            .create(sample_discrepancy_input(Uuid::new_v4()))
            .await
            .unwrap();

        let found = store.find_unique(created.id).await.unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert!(store.find_unique(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_discrepancy_store_resolve_twice_fails() {
        let store = InMemoryDiscrepancyStore::new();
        let discrepancy = store
            .create(sample_discrepancy_input(Uuid::new_v4()))
            .await
            .unwrap();

        store
            .resolve(discrepancy.id, ResolvedBy::System, json!({}))
            .await
            .unwrap();
        let err = store
            .resolve(discrepancy.id, ResolvedBy::Manual, json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyResolved { .. }));
    }

    #[tokio::test]
    async fn test_watermark_store_never_rewinds() {
        let store = InMemoryWatermarkStore::new();
        let later = Utc::now();
        let earlier = later - chrono::Duration::hours(1);

        store.advance("transfer_status", later).await.unwrap();
        let watermark = store.advance("transfer_status", earlier).await.unwrap();
        assert_eq!(watermark.last_event_at, later);
    }

    #[tokio::test]
    async fn test_event_source_filtering() {
        let now = Utc::now();
        let source = InMemoryEventSource::with_events(vec![
            Event {
                id: "evt-1".to_string(),
                event_type: "transfer.updated".to_string(),
                resource_id: "transfer-1".to_string(),
                resource_type: "transfer".to_string(),
                payload: json!({"status": "completed"}),
                timestamp: now - chrono::Duration::hours(2),
            },
            Event {
                id: "evt-2".to_string(),
                event_type: "transfer.updated".to_string(),
                resource_id: "transfer-2".to_string(),
                resource_type: "transfer".to_string(),
                payload: json!({"status": "completed"}),
                timestamp: now,
            },
            Event {
                id: "evt-3".to_string(),
                event_type: "customer.updated".to_string(),
                resource_id: "cust-1".to_string(),
                resource_type: "customer".to_string(),
                payload: json!({}),
                timestamp: now,
            },
        ]);

        let filter = EventFilter::new()
            .for_resource_type("transfer")
            .since(now - chrono::Duration::hours(1));
        let events = source.get_events(&filter).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, "evt-2");
    }

    #[tokio::test]
    async fn test_check_store_find_by_job() {
        let store = InMemoryCheckStore::new();
        let job_id = Uuid::new_v4();
        store
            .create(CreateReconciliationCheck {
                job_id,
                resource_type: "transfer".to_string(),
                resource_id: "transfer-1".to_string(),
                check_name: "transfer_status".to_string(),
                metadata: json!({"job_id": job_id}),
                outcome: CheckOutcome::Mismatch,
            })
            .await
            .unwrap();
        store
            .create(CreateReconciliationCheck {
                job_id: Uuid::new_v4(),
                resource_type: "transfer".to_string(),
                resource_id: "transfer-2".to_string(),
                check_name: "transfer_status".to_string(),
                metadata: json!({}),
                outcome: CheckOutcome::Match,
            })
            .await
            .unwrap();

        let checks = store
            .find_many(&CheckFilter::new().for_job(job_id))
            .await
            .unwrap();
        assert_eq!(checks.len(), 1);
        assert_eq!(checks[0].outcome(), CheckOutcome::Mismatch);
    }

    #[tokio::test]
    async fn test_check_store_update_metadata() {
        let store = InMemoryCheckStore::new();
        let check = store
            .create(CreateReconciliationCheck {
                job_id: Uuid::new_v4(),
                resource_type: "transfer".to_string(),
                resource_id: "transfer-1".to_string(),
                check_name: "transfer_status".to_string(),
                metadata: json!({}),
                outcome: CheckOutcome::Error,
            })
            .await
            .unwrap();

        let updated = store
            .update(
                check.id,
                UpdateReconciliationCheck {
                    metadata: Some(json!({"error": "timeout"})),
                    outcome: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.metadata["error"], "timeout");
        assert_eq!(updated.outcome(), CheckOutcome::Error);
    }
}
