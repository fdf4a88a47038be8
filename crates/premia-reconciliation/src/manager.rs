//! Reconciliation job manager.
//!
//! Owns run lifecycle and serializes runs per scope. The single-flight state
//! is an explicit lock set owned by the manager instance (injected, never a
//! module-level singleton) so tests can instantiate isolated managers. The
//! scope key is taken synchronously before any awaited work and released by
//! an RAII guard on every exit path, including setup failures.
//!
//! Running as multiple replicas weakens the guard to per-process; a shared
//! lock would be needed for cross-replica single-flight.

use chrono::{Duration as ChronoDuration, Utc};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use uuid::Uuid;

use premia_db::{
    CheckFilter, CreateReconciliationJob, DiscrepancyFilter, JobFilter, JobType,
    ReconciliationDiscrepancy, ReconciliationJob, ResolvedBy, UpdateReconciliationJob,
};

use crate::engine::ReconciliationEngine;
use crate::error::{ReconciliationError, ReconciliationResult};
use crate::premium::{PremiumOptions, PremiumReconciliationEngine};
use crate::scheduler::Schedule;
use crate::store::{CheckStore, DiscrepancyStore, JobStore};
use crate::types::{BillingPeriod, JobConfig, JobErrorInfo, JobResults, Resolution};

/// Scope keys currently holding a run.
type ActiveScopes = Arc<Mutex<HashSet<String>>>;

/// RAII guard for one scope key. Dropping it releases the key exactly once,
/// whatever path the run exits through.
struct ScopeGuard {
    scopes: ActiveScopes,
    key: String,
}

impl ScopeGuard {
    /// Take the key, or `None` if a run already holds it.
    fn acquire(scopes: &ActiveScopes, key: &str) -> Option<Self> {
        let mut held = scopes.lock().unwrap_or_else(PoisonError::into_inner);
        if !held.insert(key.to_string()) {
            return None;
        }
        Some(Self {
            scopes: Arc::clone(scopes),
            key: key.to_string(),
        })
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        let mut held = self.scopes.lock().unwrap_or_else(PoisonError::into_inner);
        held.remove(&self.key);
    }
}

/// Manager serializing and tracking reconciliation runs.
pub struct ReconciliationJobManager {
    jobs: Arc<dyn JobStore>,
    checks: Arc<dyn CheckStore>,
    discrepancies: Arc<dyn DiscrepancyStore>,
    engine: Arc<ReconciliationEngine>,
    premium: Arc<PremiumReconciliationEngine>,
    active_scopes: ActiveScopes,
}

impl ReconciliationJobManager {
    #[must_use]
    pub fn new(
        jobs: Arc<dyn JobStore>,
        checks: Arc<dyn CheckStore>,
        discrepancies: Arc<dyn DiscrepancyStore>,
        engine: Arc<ReconciliationEngine>,
        premium: Arc<PremiumReconciliationEngine>,
    ) -> Self {
        Self {
            jobs,
            checks,
            discrepancies,
            engine,
            premium,
            active_scopes: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Run a transfer reconciliation. `check_names` limits the run to the
    /// named checks; `None` runs every registered check.
    ///
    /// Fails with [`ReconciliationError::AlreadyInProgress`] when a run is
    /// in flight for the same scope, unless `force_run` is set. A forced
    /// run bypasses the guard entirely and never disturbs the in-flight
    /// run's entry.
    pub async fn run_reconciliation(
        &self,
        check_names: Option<Vec<String>>,
        force_run: bool,
        created_by: &str,
    ) -> ReconciliationResult<ReconciliationJob> {
        let job_type = match check_names {
            None => JobType::All,
            Some(_) => JobType::TransferStatusReconciliation,
        };
        let scope = job_type.to_string();
        let _guard = self.guard_scope(&scope, force_run)?;

        let config = match &check_names {
            None => JobConfig::All { force_run },
            Some(names) => JobConfig::TransferStatusReconciliation {
                check_names: Some(names.clone()),
                force_run,
            },
        };

        let job = self.create_running_job(job_type, &config, created_by).await?;

        match self.engine.run(job.id, check_names.as_deref()).await {
            Ok(report) => {
                let results =
                    serde_json::to_value(JobResults::TransferStatusReconciliation { report })?;
                let job = self
                    .jobs
                    .update(job.id, UpdateReconciliationJob::completed(Utc::now(), results))
                    .await
                    .map_err(|e| ReconciliationError::Setup(e.to_string()))?;

                tracing::info!(job_id = %job.id, scope = %scope, "Reconciliation run completed");
                Ok(job)
            }
            Err(err) => {
                self.record_job_failure(job.id, &err).await;
                Err(err)
            }
        }
    }

    /// Run a premium reconciliation for one billing period. The job is
    /// marked failed when validation does not reconcile, even though the
    /// engine returned a result.
    pub async fn run_premium_reconciliation(
        &self,
        billing_period: BillingPeriod,
        options: PremiumOptions,
        force_run: bool,
        created_by: &str,
    ) -> ReconciliationResult<ReconciliationJob> {
        let job_type = JobType::PremiumReconciliation;
        let scope = format!("{job_type}:{billing_period}");
        let _guard = self.guard_scope(&scope, force_run)?;

        let config = JobConfig::PremiumReconciliation {
            billing_period,
            date_range: options.date_range,
            include_pending: options.include_pending,
            force_run,
        };

        let job = self.create_running_job(job_type, &config, created_by).await?;

        match self.premium.run(&billing_period, &options).await {
            Ok(outcome) => {
                let is_valid = outcome.validation.is_valid;
                let failure_detail = outcome
                    .validation
                    .errors
                    .iter()
                    .map(|e| e.message.clone())
                    .collect::<Vec<_>>()
                    .join("; ");

                let results = serde_json::to_value(JobResults::PremiumReconciliation {
                    report: outcome.report,
                    validation: outcome.validation,
                    carrier_files: outcome.carrier_files,
                })?;

                let now = Utc::now();
                let patch = if is_valid {
                    UpdateReconciliationJob::completed(now, results)
                } else {
                    let errors = serde_json::to_value(
                        JobErrorInfo::new("Premium reconciliation validation failed")
                            .with_detail(failure_detail),
                    )?;
                    UpdateReconciliationJob {
                        status: Some(premia_db::JobStatus::Failed),
                        completed_at: Some(now),
                        results: Some(results),
                        errors: Some(errors),
                        ..UpdateReconciliationJob::default()
                    }
                };

                let job = self
                    .jobs
                    .update(job.id, patch)
                    .await
                    .map_err(|e| ReconciliationError::Setup(e.to_string()))?;

                tracing::info!(
                    job_id = %job.id,
                    billing_period = %billing_period,
                    is_valid,
                    "Premium reconciliation run finished"
                );
                Ok(job)
            }
            Err(err) => {
                self.record_job_failure(job.id, &err).await;
                Err(err)
            }
        }
    }

    /// Jobs created within the last `hours`, newest first.
    pub async fn get_reconciliation_history(
        &self,
        hours: i64,
    ) -> ReconciliationResult<Vec<ReconciliationJob>> {
        let cutoff = Utc::now() - ChronoDuration::hours(hours);
        Ok(self
            .jobs
            .find_many(&JobFilter::new().created_after(cutoff))
            .await?)
    }

    /// All unresolved discrepancies across a job's checks.
    pub async fn get_job_discrepancies(
        &self,
        job_id: Uuid,
    ) -> ReconciliationResult<Vec<ReconciliationDiscrepancy>> {
        let job = self
            .jobs
            .find_first(&JobFilter::new().by_id(job_id))
            .await?
            .ok_or(ReconciliationError::NotFound {
                resource: "Job",
                id: job_id.to_string(),
            })?;

        let checks = self
            .checks
            .find_many(&CheckFilter::new().for_job(job.id))
            .await?;
        let check_ids: Vec<Uuid> = checks.iter().map(|c| c.id).collect();
        if check_ids.is_empty() {
            return Ok(vec![]);
        }

        Ok(self
            .discrepancies
            .find_many(&DiscrepancyFilter::new().for_checks(check_ids).unresolved_only())
            .await?)
    }

    /// Resolve a discrepancy manually.
    pub async fn resolve_discrepancy(
        &self,
        discrepancy_id: Uuid,
        resolution: Resolution,
    ) -> ReconciliationResult<ReconciliationDiscrepancy> {
        let resolution_json = serde_json::to_value(&resolution)?;
        let resolved = self
            .discrepancies
            .resolve(discrepancy_id, ResolvedBy::Manual, resolution_json)
            .await?;

        tracing::info!(discrepancy_id = %discrepancy_id, "Discrepancy resolved manually");
        Ok(resolved)
    }

    /// Register the periodic triggers: hourly transfer-status runs and a
    /// daily full run. Tasks run detached for the life of the process; an
    /// in-flight run makes the scheduled one a no-op.
    pub fn schedule_reconciliations(self: &Arc<Self>) {
        self.spawn_schedule(
            Schedule::hourly(),
            Some(vec!["transfer_status".to_string()]),
        );
        self.spawn_schedule(Schedule::daily(2), None);
    }

    fn spawn_schedule(self: &Arc<Self>, schedule: Schedule, check_names: Option<Vec<String>>) {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                let now = Utc::now();
                let Some(next) = schedule.next_run(now) else {
                    tracing::error!(frequency = %schedule.frequency, "Schedule produced no next run");
                    break;
                };
                let wait = (next - now).to_std().unwrap_or_default();
                tokio::time::sleep(wait).await;

                match manager
                    .run_reconciliation(check_names.clone(), false, "system")
                    .await
                {
                    Ok(job) => {
                        tracing::info!(
                            job_id = %job.id,
                            frequency = %schedule.frequency,
                            "Scheduled reconciliation finished"
                        );
                    }
                    Err(ReconciliationError::AlreadyInProgress { .. }) => {
                        tracing::debug!(
                            frequency = %schedule.frequency,
                            "Skipped scheduled reconciliation; one is already in flight"
                        );
                    }
                    Err(err) => {
                        tracing::error!(
                            frequency = %schedule.frequency,
                            error = %err,
                            "Scheduled reconciliation failed"
                        );
                    }
                }
            }
        });
    }

    /// Acquire the scope guard, or bypass it for a forced run.
    fn guard_scope(
        &self,
        scope: &str,
        force_run: bool,
    ) -> ReconciliationResult<Option<ScopeGuard>> {
        if force_run {
            tracing::info!(scope = %scope, "Forced reconciliation run; bypassing single-flight guard");
            return Ok(None);
        }
        match ScopeGuard::acquire(&self.active_scopes, scope) {
            Some(guard) => Ok(Some(guard)),
            None => Err(ReconciliationError::AlreadyInProgress {
                scope: scope.to_string(),
            }),
        }
    }

    /// Create the job record and move it to running.
    async fn create_running_job(
        &self,
        job_type: JobType,
        config: &JobConfig,
        created_by: &str,
    ) -> ReconciliationResult<ReconciliationJob> {
        let config_json = serde_json::to_value(config)?;
        let job = self
            .jobs
            .create(CreateReconciliationJob {
                job_type,
                config: config_json,
                created_by: created_by.to_string(),
            })
            .await
            .map_err(|e| ReconciliationError::Setup(e.to_string()))?;

        let job = self
            .jobs
            .update(job.id, UpdateReconciliationJob::started(Utc::now()))
            .await
            .map_err(|e| ReconciliationError::Setup(e.to_string()))?;

        tracing::info!(
            job_id = %job.id,
            job_type = %job_type,
            created_by = %created_by,
            "Started reconciliation job"
        );
        Ok(job)
    }

    /// Best-effort persistence of a run failure onto the job record.
    async fn record_job_failure(&self, job_id: Uuid, err: &ReconciliationError) {
        let info = JobErrorInfo::new(err.to_string()).with_detail(format!("{err:?}"));
        let Ok(errors) = serde_json::to_value(&info) else {
            return;
        };
        if let Err(update_err) = self
            .jobs
            .update(job_id, UpdateReconciliationJob::failed(Utc::now(), errors))
            .await
        {
            tracing::error!(job_id = %job_id, error = %update_err, "Failed to record job failure");
        }
    }
}
