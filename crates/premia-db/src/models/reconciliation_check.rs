//! Reconciliation check model.
//!
//! One check record is one execution of a named comparison rule against one
//! resource during a reconciliation run. Checks are immutable after
//! creation; discrepancies attach to them by `check_id`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use std::fmt;
use uuid::Uuid;

/// Outcome of a single comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckOutcome {
    /// Authoritative and local values agree.
    Match,
    /// A monitored field differs.
    Mismatch,
    /// The comparison could not be performed.
    Error,
}

impl fmt::Display for CheckOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Match => write!(f, "match"),
            Self::Mismatch => write!(f, "mismatch"),
            Self::Error => write!(f, "error"),
        }
    }
}

impl std::str::FromStr for CheckOutcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "match" => Ok(Self::Match),
            "mismatch" => Ok(Self::Mismatch),
            "error" => Ok(Self::Error),
            _ => Err(format!("Unknown check outcome: {s}")),
        }
    }
}

/// A reconciliation check record.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ReconciliationCheck {
    pub id: Uuid,
    pub job_id: Uuid,
    pub resource_type: String,
    pub resource_id: String,
    pub check_name: String,
    /// Free-form context; always carries the owning job id for lookup.
    pub metadata: JsonValue,
    pub outcome: String,
    pub created_at: DateTime<Utc>,
}

impl ReconciliationCheck {
    /// Get the outcome enum.
    #[must_use]
    pub fn outcome(&self) -> CheckOutcome {
        self.outcome.parse().unwrap_or(CheckOutcome::Error)
    }

    /// Create a new check record.
    pub async fn create(
        pool: &PgPool,
        input: &CreateReconciliationCheck,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r"
            INSERT INTO reconciliation_checks
                (job_id, resource_type, resource_id, check_name, metadata, outcome)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            ",
        )
        .bind(input.job_id)
        .bind(&input.resource_type)
        .bind(&input.resource_id)
        .bind(&input.check_name)
        .bind(&input.metadata)
        .bind(input.outcome.to_string())
        .fetch_one(pool)
        .await
    }

    /// Apply a patch to a check record.
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        patch: &UpdateReconciliationCheck,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r"
            UPDATE reconciliation_checks
            SET
                metadata = COALESCE($2, metadata),
                outcome = COALESCE($3, outcome)
            WHERE id = $1
            RETURNING *
            ",
        )
        .bind(id)
        .bind(&patch.metadata)
        .bind(patch.outcome.map(|o| o.to_string()))
        .fetch_optional(pool)
        .await
    }

    /// List checks matching a filter, newest first.
    pub async fn find_many(pool: &PgPool, filter: &CheckFilter) -> Result<Vec<Self>, sqlx::Error> {
        let mut query = String::from(r"SELECT * FROM reconciliation_checks WHERE TRUE");
        let mut param_idx = 1;

        if filter.job_id.is_some() {
            query.push_str(&format!(" AND job_id = ${param_idx}"));
            param_idx += 1;
        }
        if filter.check_name.is_some() {
            query.push_str(&format!(" AND check_name = ${param_idx}"));
            param_idx += 1;
        }
        if filter.outcome.is_some() {
            query.push_str(&format!(" AND outcome = ${param_idx}"));
            param_idx += 1;
        }

        query.push_str(&format!(" ORDER BY created_at DESC LIMIT ${param_idx}"));

        let mut q = sqlx::query_as::<_, Self>(&query);

        if let Some(job_id) = filter.job_id {
            q = q.bind(job_id);
        }
        if let Some(ref check_name) = filter.check_name {
            q = q.bind(check_name);
        }
        if let Some(outcome) = filter.outcome {
            q = q.bind(outcome.to_string());
        }

        q = q.bind(filter.limit.unwrap_or(10_000));
        q.fetch_all(pool).await
    }
}

/// Input for creating a check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateReconciliationCheck {
    pub job_id: Uuid,
    pub resource_type: String,
    pub resource_id: String,
    pub check_name: String,
    pub metadata: JsonValue,
    pub outcome: CheckOutcome,
}

/// Patch for updating a check. `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateReconciliationCheck {
    pub metadata: Option<JsonValue>,
    pub outcome: Option<CheckOutcome>,
}

/// Filter for listing checks.
#[derive(Debug, Clone, Default)]
pub struct CheckFilter {
    pub job_id: Option<Uuid>,
    pub check_name: Option<String>,
    pub outcome: Option<CheckOutcome>,
    pub limit: Option<i64>,
}

impl CheckFilter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn for_job(mut self, job_id: Uuid) -> Self {
        self.job_id = Some(job_id);
        self
    }

    #[must_use]
    pub fn with_outcome(mut self, outcome: CheckOutcome) -> Self {
        self.outcome = Some(outcome);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_outcome_roundtrip() {
        for outcome in [CheckOutcome::Match, CheckOutcome::Mismatch, CheckOutcome::Error] {
            let s = outcome.to_string();
            let parsed: CheckOutcome = s.parse().unwrap();
            assert_eq!(outcome, parsed);
        }
    }

    #[test]
    fn test_check_filter_builders() {
        let job_id = Uuid::new_v4();
        let filter = CheckFilter::new()
            .for_job(job_id)
            .with_outcome(CheckOutcome::Mismatch);
        assert_eq!(filter.job_id, Some(job_id));
        assert_eq!(filter.outcome, Some(CheckOutcome::Mismatch));
        assert!(filter.check_name.is_none());
    }
}
