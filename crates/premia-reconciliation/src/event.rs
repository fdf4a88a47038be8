//! Event and snapshot adapter contracts.
//!
//! The payments provider is the authoritative source of state changes; local
//! snapshots are the persisted view that may have drifted. Both sides are
//! reached through these traits so the engines stay independent of the
//! actual transport.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::time::Duration;

/// An authoritative provider notification describing a state change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Provider-assigned event ID.
    pub id: String,
    /// Event kind, e.g. `transfer.updated`.
    pub event_type: String,
    /// ID of the resource the event describes.
    pub resource_id: String,
    /// Kind of resource, e.g. `transfer`.
    pub resource_type: String,
    /// Authoritative field values (status, amount, ...).
    pub payload: JsonValue,
    pub timestamp: DateTime<Utc>,
}

/// Filter for fetching events.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub resource_type: Option<String>,
    /// Only events strictly after this instant.
    pub since: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl EventFilter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn for_resource_type(mut self, resource_type: &str) -> Self {
        self.resource_type = Some(resource_type.to_string());
        self
    }

    #[must_use]
    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Locally persisted representation of a resource's current state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub external_id: String,
    pub status: String,
    /// Monetary value in whatever shape the ingest path stored it.
    pub amount: JsonValue,
    #[serde(default)]
    pub metadata: JsonValue,
}

impl Snapshot {
    /// Look up a monitored field's local value.
    #[must_use]
    pub fn field_value(&self, field: &str) -> Option<JsonValue> {
        match field {
            "status" => Some(JsonValue::String(self.status.clone())),
            "amount" => Some(self.amount.clone()),
            other => self.metadata.get(other).cloned(),
        }
    }
}

/// Adapter errors, scoped to a single call.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// The call did not finish within the configured timeout.
    #[error("Adapter call timed out after {0:?}")]
    Timeout(Duration),

    /// The collaborator was unreachable or returned a failure.
    #[error("Adapter unavailable: {0}")]
    Unavailable(String),

    /// The collaborator returned data the engine cannot interpret.
    #[error("Malformed adapter payload: {0}")]
    Malformed(String),
}

/// Result type for adapter calls.
pub type AdapterResult<T> = Result<T, AdapterError>;

/// Source of authoritative provider events.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Fetch events matching a filter, oldest first.
    async fn get_events(&self, filter: &EventFilter) -> AdapterResult<Vec<Event>>;
}

/// Queue for synthetic events emitted by auto-resolution, so reconciled
/// state propagates through normal event processing.
#[async_trait]
pub trait EventQueue: Send + Sync {
    async fn enqueue(&self, event: Event) -> AdapterResult<()>;
}

/// Lookup of locally persisted transaction snapshots.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn get_by_external_id(&self, external_id: &str) -> AdapterResult<Option<Snapshot>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_filter_builders() {
        let now = Utc::now();
        let filter = EventFilter::new()
            .for_resource_type("transfer")
            .since(now)
            .with_limit(50);
        assert_eq!(filter.resource_type.as_deref(), Some("transfer"));
        assert_eq!(filter.since, Some(now));
        assert_eq!(filter.limit, Some(50));
    }

    #[test]
    fn test_snapshot_field_value() {
        let snapshot = Snapshot {
            external_id: "transfer-123".to_string(),
            status: "pending".to_string(),
            amount: json!(100.0),
            metadata: json!({"account_id": "acct-9"}),
        };

        assert_eq!(snapshot.field_value("status"), Some(json!("pending")));
        assert_eq!(snapshot.field_value("amount"), Some(json!(100.0)));
        assert_eq!(snapshot.field_value("account_id"), Some(json!("acct-9")));
        assert_eq!(snapshot.field_value("missing"), None);
    }
}
