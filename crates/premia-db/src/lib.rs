//! # premia-db
//!
//! Persistence models for the Premia reconciliation platform.
//!
//! Each model maps one Postgres table to a `sqlx::FromRow` struct with
//! associated async CRUD functions. Enum-valued columns are stored as
//! strings and exposed through accessor methods that parse them, so a row
//! with an unexpected value degrades gracefully instead of failing the
//! whole query.

pub mod models;

pub use models::check_watermark::CheckWatermark;
pub use models::reconciliation_check::{
    CheckFilter, CheckOutcome, CreateReconciliationCheck, ReconciliationCheck,
    UpdateReconciliationCheck,
};
pub use models::reconciliation_discrepancy::{
    CreateReconciliationDiscrepancy, DiscrepancyFilter, ReconciliationDiscrepancy, ResolvedBy,
};
pub use models::reconciliation_job::{
    CreateReconciliationJob, JobFilter, JobStatus, JobType, ReconciliationJob, UpdateReconciliationJob,
};
