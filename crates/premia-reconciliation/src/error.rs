//! Error types for reconciliation operations.

use uuid::Uuid;

use crate::store::StoreError;

/// Result type for reconciliation operations.
pub type ReconciliationResult<T> = Result<T, ReconciliationError>;

/// Errors that can occur during reconciliation.
///
/// Adapter failures scoped to a single resource are not represented here:
/// the engine records them as error-outcome checks and keeps going. This
/// enum covers run-level failures and request-level rejections.
#[derive(Debug, thiserror::Error)]
pub enum ReconciliationError {
    /// A run was requested while one is active for the same scope.
    #[error("Reconciliation already in progress")]
    AlreadyInProgress { scope: String },

    /// Referenced record does not exist.
    #[error("{resource} not found: {id}")]
    NotFound { resource: &'static str, id: String },

    /// Attempted to resolve a discrepancy twice.
    #[error("Discrepancy already resolved: {id}")]
    AlreadyResolved { id: Uuid },

    /// An external collaborator failed at run level.
    #[error("Adapter error: {0}")]
    Adapter(String),

    /// The job record could not be created or updated; aborts the run.
    #[error("Setup error: {0}")]
    Setup(String),

    /// Store error outside the setup path.
    #[error("Store error: {0}")]
    Store(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Job configuration rejected at the manager boundary.
    #[error("Invalid job config: {0}")]
    InvalidConfig(String),
}

impl From<StoreError> for ReconciliationError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { resource, id } => Self::NotFound { resource, id },
            StoreError::AlreadyResolved { id } => Self::AlreadyResolved { id },
            other => Self::Store(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for ReconciliationError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
