//! Reconciliation discrepancy model.
//!
//! A discrepancy is a detected field-level mismatch between an event's
//! authoritative value and a snapshot's local value. At most one unresolved
//! discrepancy may exist per (resource type, resource id, field); a partial
//! unique index backs the insert path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use std::fmt;
use uuid::Uuid;

/// Who resolved a discrepancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolvedBy {
    /// Auto-resolution during an engine run.
    System,
    /// Explicit resolution through the API.
    Manual,
}

impl fmt::Display for ResolvedBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::Manual => write!(f, "manual"),
        }
    }
}

impl std::str::FromStr for ResolvedBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "system" => Ok(Self::System),
            "manual" => Ok(Self::Manual),
            _ => Err(format!("Unknown resolver: {s}")),
        }
    }
}

/// A reconciliation discrepancy record.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ReconciliationDiscrepancy {
    pub id: Uuid,
    pub check_id: Uuid,
    pub resource_type: String,
    pub resource_id: String,
    pub field: String,
    /// JSON-serialized authoritative (event) value, kept for audit.
    pub authoritative_value: String,
    /// JSON-serialized local (snapshot) value, kept for audit.
    pub local_value: String,
    pub resolved: bool,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<String>,
    pub resolution: Option<JsonValue>,
    pub created_at: DateTime<Utc>,
}

impl ReconciliationDiscrepancy {
    /// Get the resolver enum, if resolved.
    #[must_use]
    pub fn resolved_by(&self) -> Option<ResolvedBy> {
        self.resolved_by.as_ref().and_then(|s| s.parse().ok())
    }

    /// Create a discrepancy unless an unresolved one already exists for the
    /// same (resource type, resource id, field).
    ///
    /// Returns the existing unresolved record in that case, so repeated runs
    /// against unchanged data never produce duplicates.
    pub async fn create(
        pool: &PgPool,
        input: &CreateReconciliationDiscrepancy,
    ) -> Result<Self, sqlx::Error> {
        if let Some(existing) =
            Self::find_unresolved(pool, &input.resource_type, &input.resource_id, &input.field)
                .await?
        {
            return Ok(existing);
        }

        sqlx::query_as(
            r"
            INSERT INTO reconciliation_discrepancies
                (check_id, resource_type, resource_id, field,
                 authoritative_value, local_value)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            ",
        )
        .bind(input.check_id)
        .bind(&input.resource_type)
        .bind(&input.resource_id)
        .bind(&input.field)
        .bind(&input.authoritative_value)
        .bind(&input.local_value)
        .fetch_one(pool)
        .await
    }

    /// Find a discrepancy by ID.
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(r"SELECT * FROM reconciliation_discrepancies WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find the active (unresolved) discrepancy for a resource field.
    pub async fn find_unresolved(
        pool: &PgPool,
        resource_type: &str,
        resource_id: &str,
        field: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r"
            SELECT * FROM reconciliation_discrepancies
            WHERE resource_type = $1 AND resource_id = $2 AND field = $3
              AND NOT resolved
            LIMIT 1
            ",
        )
        .bind(resource_type)
        .bind(resource_id)
        .bind(field)
        .fetch_optional(pool)
        .await
    }

    /// Mark a discrepancy resolved.
    ///
    /// The predicate `NOT resolved` makes the resolution atomic at write
    /// time: a second resolution attempt matches no row and returns `None`.
    pub async fn resolve(
        pool: &PgPool,
        id: Uuid,
        resolved_by: ResolvedBy,
        resolution: &JsonValue,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r"
            UPDATE reconciliation_discrepancies
            SET resolved = TRUE,
                resolved_at = NOW(),
                resolved_by = $2,
                resolution = $3
            WHERE id = $1 AND NOT resolved
            RETURNING *
            ",
        )
        .bind(id)
        .bind(resolved_by.to_string())
        .bind(resolution)
        .fetch_optional(pool)
        .await
    }

    /// List discrepancies matching a filter, newest first.
    pub async fn find_many(
        pool: &PgPool,
        filter: &DiscrepancyFilter,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let mut query = String::from(r"SELECT * FROM reconciliation_discrepancies WHERE TRUE");
        let mut param_idx = 1;

        if filter.check_ids.is_some() {
            query.push_str(&format!(" AND check_id = ANY(${param_idx})"));
            param_idx += 1;
        }
        if filter.resource_type.is_some() {
            query.push_str(&format!(" AND resource_type = ${param_idx}"));
            param_idx += 1;
        }
        if filter.resource_id.is_some() {
            query.push_str(&format!(" AND resource_id = ${param_idx}"));
            param_idx += 1;
        }
        if filter.field.is_some() {
            query.push_str(&format!(" AND field = ${param_idx}"));
            param_idx += 1;
        }
        if filter.resolved.is_some() {
            query.push_str(&format!(" AND resolved = ${param_idx}"));
            param_idx += 1;
        }

        query.push_str(&format!(" ORDER BY created_at DESC LIMIT ${param_idx}"));

        let mut q = sqlx::query_as::<_, Self>(&query);

        if let Some(ref check_ids) = filter.check_ids {
            q = q.bind(check_ids);
        }
        if let Some(ref resource_type) = filter.resource_type {
            q = q.bind(resource_type);
        }
        if let Some(ref resource_id) = filter.resource_id {
            q = q.bind(resource_id);
        }
        if let Some(ref field) = filter.field {
            q = q.bind(field);
        }
        if let Some(resolved) = filter.resolved {
            q = q.bind(resolved);
        }

        q = q.bind(filter.limit.unwrap_or(10_000));
        q.fetch_all(pool).await
    }
}

/// Input for creating a discrepancy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateReconciliationDiscrepancy {
    pub check_id: Uuid,
    pub resource_type: String,
    pub resource_id: String,
    pub field: String,
    pub authoritative_value: String,
    pub local_value: String,
}

/// Filter for listing discrepancies.
#[derive(Debug, Clone, Default)]
pub struct DiscrepancyFilter {
    pub check_ids: Option<Vec<Uuid>>,
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    pub field: Option<String>,
    pub resolved: Option<bool>,
    pub limit: Option<i64>,
}

impl DiscrepancyFilter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn for_checks(mut self, check_ids: Vec<Uuid>) -> Self {
        self.check_ids = Some(check_ids);
        self
    }

    #[must_use]
    pub fn for_resource(mut self, resource_type: &str, resource_id: &str) -> Self {
        self.resource_type = Some(resource_type.to_string());
        self.resource_id = Some(resource_id.to_string());
        self
    }

    #[must_use]
    pub fn unresolved_only(mut self) -> Self {
        self.resolved = Some(false);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolved_by_roundtrip() {
        for resolver in [ResolvedBy::System, ResolvedBy::Manual] {
            let s = resolver.to_string();
            let parsed: ResolvedBy = s.parse().unwrap();
            assert_eq!(resolver, parsed);
        }
    }

    #[test]
    fn test_discrepancy_filter_builders() {
        let filter = DiscrepancyFilter::new()
            .for_resource("transfer", "transfer-123")
            .unresolved_only();
        assert_eq!(filter.resource_type.as_deref(), Some("transfer"));
        assert_eq!(filter.resource_id.as_deref(), Some("transfer-123"));
        assert_eq!(filter.resolved, Some(false));
        assert!(filter.check_ids.is_none());
    }
}
