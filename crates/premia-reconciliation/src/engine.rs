//! Transfer reconciliation engine.
//!
//! Walks authoritative provider events since each check's watermark,
//! compares monitored fields against local snapshots, and records checks and
//! discrepancies. A failure scoped to one resource is recorded as an
//! error-outcome check and the run continues; only setup failures abort.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use premia_db::{
    CheckOutcome, CreateReconciliationCheck, CreateReconciliationDiscrepancy, ResolvedBy,
};

use crate::check::{CheckDefinition, CheckRegistry};
use crate::compare::{amounts_match, parse_amount, values_match};
use crate::error::ReconciliationResult;
use crate::event::{AdapterError, AdapterResult, Event, EventFilter, EventQueue, EventSource, SnapshotStore};
use crate::statistics::{RunStatistics, StatisticsTracker};
use crate::store::{CheckStore, DiscrepancyStore, StoreError, WatermarkStore};
use crate::types::Resolution;

/// Configuration for the reconciliation engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Events fetched per batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Delay between batches, to respect provider rate limits.
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,
    /// Timeout per external adapter call.
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
}

fn default_batch_size() -> usize {
    100
}

fn default_batch_delay_ms() -> u64 {
    200
}

fn default_call_timeout_secs() -> u64 {
    30
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            batch_delay_ms: default_batch_delay_ms(),
            call_timeout_secs: default_call_timeout_secs(),
        }
    }
}

/// Result of one engine run, stored in the job's results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub job_id: Uuid,
    pub checks_run: Vec<String>,
    pub statistics: RunStatistics,
}

/// Engine comparing authoritative events against local snapshots.
pub struct ReconciliationEngine {
    events: Arc<dyn EventSource>,
    snapshots: Arc<dyn SnapshotStore>,
    queue: Arc<dyn EventQueue>,
    checks: Arc<dyn CheckStore>,
    discrepancies: Arc<dyn DiscrepancyStore>,
    watermarks: Arc<dyn WatermarkStore>,
    registry: CheckRegistry,
    config: EngineConfig,
}

impl ReconciliationEngine {
    /// Create an engine with the default configuration.
    #[must_use]
    pub fn new(
        events: Arc<dyn EventSource>,
        snapshots: Arc<dyn SnapshotStore>,
        queue: Arc<dyn EventQueue>,
        checks: Arc<dyn CheckStore>,
        discrepancies: Arc<dyn DiscrepancyStore>,
        watermarks: Arc<dyn WatermarkStore>,
        registry: CheckRegistry,
    ) -> Self {
        Self {
            events,
            snapshots,
            queue,
            checks,
            discrepancies,
            watermarks,
            registry,
            config: EngineConfig::default(),
        }
    }

    /// Override the engine configuration.
    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// The configured check registry.
    #[must_use]
    pub fn registry(&self) -> &CheckRegistry {
        &self.registry
    }

    /// Run the selected checks for a job. `None` runs every registered
    /// check.
    pub async fn run(
        &self,
        job_id: Uuid,
        check_names: Option<&[String]>,
    ) -> ReconciliationResult<RunReport> {
        let selected = self.registry.select(check_names);
        let tracker = StatisticsTracker::new();
        let mut checks_run = Vec::with_capacity(selected.len());

        for definition in selected {
            self.run_check(job_id, definition, &tracker).await;
            checks_run.push(definition.name.clone());
        }

        let statistics = tracker.snapshot();
        tracing::info!(
            job_id = %job_id,
            events = statistics.events_processed,
            mismatches = statistics.mismatches,
            errors = statistics.errors,
            "Reconciliation run finished"
        );

        Ok(RunReport {
            job_id,
            checks_run,
            statistics,
        })
    }

    /// Execute one named check, batching through events since its watermark.
    async fn run_check(&self, job_id: Uuid, definition: &CheckDefinition, tracker: &StatisticsTracker) {
        let since = match self.watermarks.get(&definition.name).await {
            Ok(Some(watermark)) => watermark.last_event_at,
            Ok(None) => Utc::now() - ChronoDuration::hours(definition.lookback_hours),
            Err(err) => {
                tracing::warn!(check = %definition.name, error = %err, "Failed to read watermark");
                tracker.record_error(&definition.name);
                return;
            }
        };

        let mut cursor = since;
        let mut newest: Option<DateTime<Utc>> = None;

        loop {
            let filter = EventFilter::new()
                .for_resource_type(&definition.resource_type)
                .since(cursor)
                .with_limit(self.config.batch_size);

            let events = match self.timed(self.events.get_events(&filter)).await {
                Ok(events) => events,
                Err(err) => {
                    tracing::warn!(check = %definition.name, error = %err, "Event fetch failed");
                    tracker.record_error(&definition.name);
                    break;
                }
            };

            if events.is_empty() {
                break;
            }

            tracker.record_events(events.len() as u32);
            let full_batch = events.len() == self.config.batch_size;

            for event in &events {
                if event.timestamp > cursor {
                    cursor = event.timestamp;
                }
                newest = Some(newest.map_or(event.timestamp, |n| n.max(event.timestamp)));
                self.process_event(job_id, definition, event, tracker).await;
            }

            if !full_batch {
                break;
            }
            tokio::time::sleep(Duration::from_millis(self.config.batch_delay_ms)).await;
        }

        // Advance past everything actually examined, even if a later batch
        // fetch failed; those events were already compared.
        if let Some(newest) = newest {
            if let Err(err) = self.watermarks.advance(&definition.name, newest).await {
                tracing::warn!(check = %definition.name, error = %err, "Failed to advance watermark");
            }
        }
    }

    /// Compare one event against its snapshot.
    async fn process_event(
        &self,
        job_id: Uuid,
        definition: &CheckDefinition,
        event: &Event,
        tracker: &StatisticsTracker,
    ) {
        let snapshot = match self
            .timed(self.snapshots.get_by_external_id(&event.resource_id))
            .await
        {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                self.record_error_check(job_id, definition, event, "snapshot not found", tracker)
                    .await;
                return;
            }
            Err(err) => {
                self.record_error_check(job_id, definition, event, &err.to_string(), tracker)
                    .await;
                return;
            }
        };

        let mut mismatched = false;
        for field in &definition.fields {
            let Some(authoritative) = event.payload.get(field) else {
                continue;
            };
            let local = snapshot.field_value(field).unwrap_or(JsonValue::Null);

            let agree = if field == "amount" {
                match (parse_amount(authoritative), parse_amount(&local)) {
                    (Some(a), Some(b)) => amounts_match(a, b),
                    _ => values_match(authoritative, &local),
                }
            } else {
                values_match(authoritative, &local)
            };

            if !agree {
                mismatched = true;
                self.record_mismatch(job_id, definition, event, field, authoritative, &local, tracker)
                    .await;
            }
        }

        if !mismatched {
            tracker.record_match(&definition.name);
            let input = CreateReconciliationCheck {
                job_id,
                resource_type: definition.resource_type.clone(),
                resource_id: event.resource_id.clone(),
                check_name: definition.name.clone(),
                metadata: check_metadata(job_id, event, None),
                outcome: CheckOutcome::Match,
            };
            match self.checks.create(input).await {
                Ok(_) => tracker.record_check_written(),
                Err(err) => {
                    tracing::warn!(resource_id = %event.resource_id, error = %err, "Failed to record match check");
                }
            }
        }
    }

    /// Record a field mismatch: a mismatch check, its discrepancy, and the
    /// auto-resolution follow-up when the check is configured for it.
    async fn record_mismatch(
        &self,
        job_id: Uuid,
        definition: &CheckDefinition,
        event: &Event,
        field: &str,
        authoritative: &JsonValue,
        local: &JsonValue,
        tracker: &StatisticsTracker,
    ) {
        tracker.record_mismatch(&definition.name);

        let check = match self
            .checks
            .create(CreateReconciliationCheck {
                job_id,
                resource_type: definition.resource_type.clone(),
                resource_id: event.resource_id.clone(),
                check_name: definition.name.clone(),
                metadata: check_metadata(job_id, event, Some(field)),
                outcome: CheckOutcome::Mismatch,
            })
            .await
        {
            Ok(check) => {
                tracker.record_check_written();
                check
            }
            Err(err) => {
                tracing::warn!(resource_id = %event.resource_id, error = %err, "Failed to record mismatch check");
                return;
            }
        };

        let authoritative_json = authoritative.to_string();
        let local_json = local.to_string();

        let discrepancy = match self
            .discrepancies
            .create(CreateReconciliationDiscrepancy {
                check_id: check.id,
                resource_type: definition.resource_type.clone(),
                resource_id: event.resource_id.clone(),
                field: field.to_string(),
                authoritative_value: authoritative_json.clone(),
                local_value: local_json,
            })
            .await
        {
            Ok(discrepancy) => discrepancy,
            Err(err) => {
                tracing::warn!(resource_id = %event.resource_id, error = %err, "Failed to record discrepancy");
                return;
            }
        };

        tracing::info!(
            resource_id = %event.resource_id,
            field = %field,
            authoritative = %authoritative_json,
            "Detected reconciliation discrepancy"
        );

        if definition.auto_resolve && !discrepancy.resolved {
            self.auto_resolve(definition, event, field, authoritative, &discrepancy.id, tracker)
                .await;
        }
    }

    /// Accept the authoritative value and queue a reconciled follow-up
    /// event so downstream state propagates through normal processing.
    async fn auto_resolve(
        &self,
        definition: &CheckDefinition,
        event: &Event,
        field: &str,
        authoritative: &JsonValue,
        discrepancy_id: &Uuid,
        tracker: &StatisticsTracker,
    ) {
        let resolution = Resolution::accept_authoritative(&authoritative.to_string());
        let resolution_json = match serde_json::to_value(&resolution) {
            Ok(json) => json,
            Err(err) => {
                tracing::warn!(error = %err, "Failed to serialize resolution");
                return;
            }
        };

        match self
            .discrepancies
            .resolve(*discrepancy_id, ResolvedBy::System, resolution_json)
            .await
        {
            Ok(_) => {
                tracker.record_auto_resolved();

                let mut payload = serde_json::Map::new();
                payload.insert(field.to_string(), authoritative.clone());
                let synthetic = Event {
                    id: Uuid::new_v4().to_string(),
                    event_type: format!("{}.reconciled", definition.resource_type),
                    resource_id: event.resource_id.clone(),
                    resource_type: definition.resource_type.clone(),
                    payload: JsonValue::Object(payload),
                    timestamp: Utc::now(),
                };

                if let Err(err) = self.queue.enqueue(synthetic).await {
                    tracing::warn!(resource_id = %event.resource_id, error = %err, "Failed to queue reconciled event");
                }
            }
            // Another path settled it first; nothing left to do.
            Err(StoreError::AlreadyResolved { .. }) => {}
            Err(err) => {
                tracing::warn!(discrepancy_id = %discrepancy_id, error = %err, "Auto-resolution failed");
            }
        }
    }

    /// Record an isolated per-resource failure.
    async fn record_error_check(
        &self,
        job_id: Uuid,
        definition: &CheckDefinition,
        event: &Event,
        message: &str,
        tracker: &StatisticsTracker,
    ) {
        tracing::warn!(
            check = %definition.name,
            resource_id = %event.resource_id,
            error = %message,
            "Isolated reconciliation failure"
        );
        tracker.record_error(&definition.name);

        let mut metadata = check_metadata(job_id, event, None);
        if let Some(map) = metadata.as_object_mut() {
            map.insert("error".to_string(), JsonValue::String(message.to_string()));
        }

        let input = CreateReconciliationCheck {
            job_id,
            resource_type: definition.resource_type.clone(),
            resource_id: event.resource_id.clone(),
            check_name: definition.name.clone(),
            metadata,
            outcome: CheckOutcome::Error,
        };
        match self.checks.create(input).await {
            Ok(_) => tracker.record_check_written(),
            Err(err) => {
                tracing::warn!(resource_id = %event.resource_id, error = %err, "Failed to record error check");
            }
        }
    }

    /// Bound an adapter call by the configured timeout.
    async fn timed<T>(&self, call: impl Future<Output = AdapterResult<T>>) -> AdapterResult<T> {
        let timeout = Duration::from_secs(self.config.call_timeout_secs);
        match tokio::time::timeout(timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(AdapterError::Timeout(timeout)),
        }
    }
}

fn check_metadata(job_id: Uuid, event: &Event, field: Option<&str>) -> JsonValue {
    let mut map = serde_json::Map::new();
    map.insert("job_id".to_string(), JsonValue::String(job_id.to_string()));
    map.insert("event_id".to_string(), JsonValue::String(event.id.clone()));
    map.insert(
        "event_type".to_string(),
        JsonValue::String(event.event_type.clone()),
    );
    if let Some(field) = field {
        map.insert("field".to_string(), JsonValue::String(field.to_string()));
    }
    JsonValue::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_config_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.batch_delay_ms, 200);
        assert_eq!(config.call_timeout_secs, 30);
    }

    #[test]
    fn test_engine_config_serde_defaults() {
        let config: EngineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.batch_size, 100);

        let config: EngineConfig = serde_json::from_str(r#"{"batch_size": 25}"#).unwrap();
        assert_eq!(config.batch_size, 25);
        assert_eq!(config.call_timeout_secs, 30);
    }

    #[test]
    fn test_check_metadata_shape() {
        let job_id = Uuid::new_v4();
        let event = Event {
            id: "evt-1".to_string(),
            event_type: "transfer.updated".to_string(),
            resource_id: "transfer-1".to_string(),
            resource_type: "transfer".to_string(),
            payload: serde_json::json!({}),
            timestamp: Utc::now(),
        };

        let metadata = check_metadata(job_id, &event, Some("status"));
        assert_eq!(metadata["job_id"], job_id.to_string());
        assert_eq!(metadata["event_id"], "evt-1");
        assert_eq!(metadata["field"], "status");

        let metadata = check_metadata(job_id, &event, None);
        assert!(metadata.get("field").is_none());
    }
}
