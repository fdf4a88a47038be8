//! # Reconciliation Engines
//!
//! Detects and resolves discrepancies between authoritative payment-provider
//! events and locally persisted transaction snapshots, and validates premium
//! billing totals against carrier remittance files.
//!
//! ## Overview
//!
//! The crate provides:
//! - A job manager owning run lifecycle (pending -> running -> completed/failed)
//!   with single-flight execution per scope
//! - A transfer reconciliation engine comparing monitored fields between
//!   events and snapshots, with optional auto-resolution
//! - A premium reconciliation engine validating a billing period's collected
//!   totals against per-carrier remittance files
//! - Persisted per-check watermarks bounding event fetch windows
//! - In-memory and Postgres implementations of every store trait
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                  ReconciliationJobManager                    │
//! │        single-flight guard · history · resolution            │
//! ├──────────────────────────────────────────────────────────────┤
//! │                                                              │
//! │  ┌──────────────────┐        ┌───────────────────────────┐   │
//! │  │ Reconciliation   │        │ PremiumReconciliation     │   │
//! │  │ Engine           │        │ Engine                    │   │
//! │  └────────┬─────────┘        └────────────┬──────────────┘   │
//! │           │                               │                  │
//! │           ▼                               ▼                  │
//! │  EventSource · SnapshotStore     CollectionSource ·          │
//! │  DiscrepancyStore · Watermarks   CarrierFileSource           │
//! │                                                              │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use premia_reconciliation::{ReconciliationJobManager, CheckRegistry};
//!
//! let manager = ReconciliationJobManager::new(jobs, checks, discrepancies, engine, premium);
//!
//! // Trigger a transfer-status run
//! let job = manager.run_reconciliation(None, false, "system").await?;
//!
//! // Review unresolved discrepancies
//! let open = manager.get_job_discrepancies(job.id).await?;
//!
//! // Resolve one manually
//! manager.resolve_discrepancy(open[0].id, resolution).await?;
//! ```

pub mod carrier;
pub mod check;
pub mod compare;
pub mod engine;
pub mod error;
pub mod event;
pub mod manager;
pub mod memory;
pub mod pg;
pub mod premium;
pub mod scheduler;
pub mod statistics;
pub mod store;
pub mod types;

pub use carrier::{CarrierFile, CarrierFileSource, CarrierLineItem, CollectionSource, PremiumTransaction, TransactionStatus};
pub use check::{CheckDefinition, CheckRegistry};
pub use compare::AMOUNT_EPSILON;
pub use engine::{EngineConfig, ReconciliationEngine, RunReport};
pub use error::{ReconciliationError, ReconciliationResult};
pub use event::{AdapterError, AdapterResult, Event, EventFilter, EventQueue, EventSource, Snapshot, SnapshotStore};
pub use manager::ReconciliationJobManager;
pub use premium::{
    CarrierBreakdown, PremiumOptions, PremiumReconciliationEngine, PremiumReconciliationOutcome,
    PremiumReconciliationReport, ValidationIssue, ValidationResult,
};
pub use scheduler::{Schedule, ScheduleFrequency};
pub use statistics::{CheckCounts, RunStatistics, StatisticsTracker};
pub use store::{CheckStore, DiscrepancyStore, JobStore, StoreError, StoreResult, WatermarkStore};
pub use types::{BillingPeriod, DateRange, JobConfig, JobErrorInfo, JobResults, Resolution, ResolutionType};
