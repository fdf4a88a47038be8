//! Reconciliation job model.
//!
//! A job is one top-level reconciliation run, tracked end-to-end with
//! status, configuration, results, and errors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use std::fmt;
use uuid::Uuid;

/// Kind of reconciliation a job performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    /// Compare transfer events against local transaction snapshots.
    TransferStatusReconciliation,
    /// Validate a billing period's collections against carrier remittances.
    PremiumReconciliation,
    /// Every configured check.
    All,
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TransferStatusReconciliation => write!(f, "transfer_status_reconciliation"),
            Self::PremiumReconciliation => write!(f, "premium_reconciliation"),
            Self::All => write!(f, "all"),
        }
    }
}

impl std::str::FromStr for JobType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "transfer_status_reconciliation" => Ok(Self::TransferStatusReconciliation),
            "premium_reconciliation" => Ok(Self::PremiumReconciliation),
            "all" => Ok(Self::All),
            _ => Err(format!("Unknown job type: {s}")),
        }
    }
}

/// Lifecycle status of a job.
///
/// Transitions: `pending -> running -> {completed, failed}`. Terminal
/// statuses never transition again; the update path enforces this.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Created but not yet started.
    #[default]
    Pending,
    /// Currently executing.
    Running,
    /// Finished successfully.
    Completed,
    /// Finished with an error or failed validation.
    Failed,
}

impl JobStatus {
    /// Whether this status admits no further transitions.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether a job in this status counts as in-flight.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Running)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Unknown job status: {s}")),
        }
    }
}

/// A reconciliation job record.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ReconciliationJob {
    pub id: Uuid,
    pub job_type: String,
    pub status: String,
    /// Run parameters; shape depends on `job_type`.
    pub config: JsonValue,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Structured result payload; shape depends on `job_type`.
    pub results: Option<JsonValue>,
    /// Structured error payload when the run failed.
    pub errors: Option<JsonValue>,
}

impl ReconciliationJob {
    /// Get the job type enum.
    #[must_use]
    pub fn job_type(&self) -> JobType {
        self.job_type.parse().unwrap_or(JobType::All)
    }

    /// Get the status enum.
    #[must_use]
    pub fn status(&self) -> JobStatus {
        self.status.parse().unwrap_or_default()
    }

    /// Create a new job record.
    pub async fn create(
        pool: &PgPool,
        input: &CreateReconciliationJob,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r"
            INSERT INTO reconciliation_jobs (job_type, status, config, created_by)
            VALUES ($1, 'pending', $2, $3)
            RETURNING *
            ",
        )
        .bind(input.job_type.to_string())
        .bind(&input.config)
        .bind(&input.created_by)
        .fetch_one(pool)
        .await
    }

    /// Find a job by ID.
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(r"SELECT * FROM reconciliation_jobs WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Apply a patch to a job.
    ///
    /// Status changes are refused once the job is terminal: the update
    /// matches only non-terminal rows and returns `None` when nothing
    /// matched.
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        patch: &UpdateReconciliationJob,
    ) -> Result<Option<Self>, sqlx::Error> {
        let status_guard = patch.status.is_some();
        sqlx::query_as(
            r"
            UPDATE reconciliation_jobs
            SET
                status = COALESCE($2, status),
                started_at = COALESCE($3, started_at),
                completed_at = COALESCE($4, completed_at),
                results = COALESCE($5, results),
                errors = COALESCE($6, errors)
            WHERE id = $1
              AND (NOT $7 OR status IN ('pending', 'running'))
            RETURNING *
            ",
        )
        .bind(id)
        .bind(patch.status.map(|s| s.to_string()))
        .bind(patch.started_at)
        .bind(patch.completed_at)
        .bind(&patch.results)
        .bind(&patch.errors)
        .bind(status_guard)
        .fetch_optional(pool)
        .await
    }

    /// List jobs matching a filter, newest first.
    pub async fn find_many(pool: &PgPool, filter: &JobFilter) -> Result<Vec<Self>, sqlx::Error> {
        let mut query = String::from(r"SELECT * FROM reconciliation_jobs WHERE TRUE");
        let mut param_idx = 1;

        if filter.id.is_some() {
            query.push_str(&format!(" AND id = ${param_idx}"));
            param_idx += 1;
        }
        if filter.job_type.is_some() {
            query.push_str(&format!(" AND job_type = ${param_idx}"));
            param_idx += 1;
        }
        if !filter.statuses.is_empty() {
            query.push_str(&format!(" AND status = ANY(${param_idx})"));
            param_idx += 1;
        }
        if filter.created_after.is_some() {
            query.push_str(&format!(" AND created_at >= ${param_idx}"));
            param_idx += 1;
        }

        query.push_str(&format!(" ORDER BY created_at DESC LIMIT ${param_idx}"));

        let mut q = sqlx::query_as::<_, Self>(&query);

        if let Some(id) = filter.id {
            q = q.bind(id);
        }
        if let Some(job_type) = filter.job_type {
            q = q.bind(job_type.to_string());
        }
        if !filter.statuses.is_empty() {
            let statuses: Vec<String> = filter.statuses.iter().map(ToString::to_string).collect();
            q = q.bind(statuses);
        }
        if let Some(created_after) = filter.created_after {
            q = q.bind(created_after);
        }

        q = q.bind(filter.limit.unwrap_or(500));
        q.fetch_all(pool).await
    }

    /// Find the first job matching a filter, newest first.
    pub async fn find_first(
        pool: &PgPool,
        filter: &JobFilter,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut narrowed = filter.clone();
        narrowed.limit = Some(1);
        Ok(Self::find_many(pool, &narrowed).await?.into_iter().next())
    }
}

/// Input for creating a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateReconciliationJob {
    pub job_type: JobType,
    pub config: JsonValue,
    pub created_by: String,
}

/// Patch for updating a job. `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateReconciliationJob {
    pub status: Option<JobStatus>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub results: Option<JsonValue>,
    pub errors: Option<JsonValue>,
}

impl UpdateReconciliationJob {
    /// Patch that transitions a job to `running`.
    #[must_use]
    pub fn started(now: DateTime<Utc>) -> Self {
        Self {
            status: Some(JobStatus::Running),
            started_at: Some(now),
            ..Self::default()
        }
    }

    /// Patch that completes a job with results.
    #[must_use]
    pub fn completed(now: DateTime<Utc>, results: JsonValue) -> Self {
        Self {
            status: Some(JobStatus::Completed),
            completed_at: Some(now),
            results: Some(results),
            ..Self::default()
        }
    }

    /// Patch that fails a job with a structured error payload.
    #[must_use]
    pub fn failed(now: DateTime<Utc>, errors: JsonValue) -> Self {
        Self {
            status: Some(JobStatus::Failed),
            completed_at: Some(now),
            errors: Some(errors),
            ..Self::default()
        }
    }
}

/// Filter for listing jobs.
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub id: Option<Uuid>,
    pub job_type: Option<JobType>,
    /// Empty means any status.
    pub statuses: Vec<JobStatus>,
    pub created_after: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
}

impl JobFilter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn by_id(mut self, id: Uuid) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn with_type(mut self, job_type: JobType) -> Self {
        self.job_type = Some(job_type);
        self
    }

    #[must_use]
    pub fn active_only(mut self) -> Self {
        self.statuses = vec![JobStatus::Pending, JobStatus::Running];
        self
    }

    #[must_use]
    pub fn created_after(mut self, cutoff: DateTime<Utc>) -> Self {
        self.created_after = Some(cutoff);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_type_roundtrip() {
        for job_type in [
            JobType::TransferStatusReconciliation,
            JobType::PremiumReconciliation,
            JobType::All,
        ] {
            let s = job_type.to_string();
            let parsed: JobType = s.parse().unwrap();
            assert_eq!(job_type, parsed);
        }
    }

    #[test]
    fn test_job_status_roundtrip() {
        for status in [
            JobStatus::Pending,
            JobStatus::Running,
            JobStatus::Completed,
            JobStatus::Failed,
        ] {
            let s = status.to_string();
            let parsed: JobStatus = s.parse().unwrap();
            assert_eq!(status, parsed);
        }
    }

    #[test]
    fn test_job_status_terminal() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }

    #[test]
    fn test_job_status_active() {
        assert!(JobStatus::Pending.is_active());
        assert!(JobStatus::Running.is_active());
        assert!(!JobStatus::Completed.is_active());
        assert!(!JobStatus::Failed.is_active());
    }

    #[test]
    fn test_update_patch_constructors() {
        let now = Utc::now();

        let started = UpdateReconciliationJob::started(now);
        assert_eq!(started.status, Some(JobStatus::Running));
        assert_eq!(started.started_at, Some(now));
        assert!(started.completed_at.is_none());

        let completed = UpdateReconciliationJob::completed(now, serde_json::json!({"ok": true}));
        assert_eq!(completed.status, Some(JobStatus::Completed));
        assert!(completed.results.is_some());

        let failed = UpdateReconciliationJob::failed(now, serde_json::json!({"message": "boom"}));
        assert_eq!(failed.status, Some(JobStatus::Failed));
        assert!(failed.errors.is_some());
    }
}
