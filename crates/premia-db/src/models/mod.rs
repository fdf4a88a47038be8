//! Database models.

pub mod check_watermark;
pub mod reconciliation_check;
pub mod reconciliation_discrepancy;
pub mod reconciliation_job;
