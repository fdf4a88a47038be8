//! Premium billing adapter contracts.
//!
//! Collected-premium transactions come from the billing ledger; remittance
//! files come per carrier. Both feed the premium reconciliation engine.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::event::AdapterResult;
use crate::types::{BillingPeriod, DateRange};

/// Settlement state of a collected-premium transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    /// Funds settled.
    Settled,
    /// Initiated but not yet final.
    Pending,
    /// Terminal failure; never counts as collected.
    Failed,
}

impl TransactionStatus {
    /// Whether the transaction has reached a final state.
    #[must_use]
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Settled | Self::Failed)
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Settled => write!(f, "settled"),
            Self::Pending => write!(f, "pending"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// One collected-premium transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PremiumTransaction {
    pub account_id: String,
    pub carrier: String,
    pub amount: Decimal,
    pub status: TransactionStatus,
    pub collected_at: DateTime<Utc>,
}

/// One line of a carrier remittance file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarrierLineItem {
    pub account_id: String,
    pub amount: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A carrier remittance file for one billing period.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarrierFile {
    pub carrier: String,
    pub total_amount: Decimal,
    pub line_items: Vec<CarrierLineItem>,
}

impl CarrierFile {
    /// Sum of the file's line items.
    #[must_use]
    pub fn line_item_total(&self) -> Decimal {
        self.line_items.iter().map(|item| item.amount).sum()
    }
}

/// Source of collected-premium transactions for a time window.
#[async_trait]
pub trait CollectionSource: Send + Sync {
    /// Fetch transactions collected within the window. `include_pending`
    /// decides whether non-final transactions are returned.
    async fn collected_transactions(
        &self,
        range: &DateRange,
        include_pending: bool,
    ) -> AdapterResult<Vec<PremiumTransaction>>;
}

/// Source of per-carrier remittance files.
#[async_trait]
pub trait CarrierFileSource: Send + Sync {
    async fn carrier_files(&self, period: &BillingPeriod) -> AdapterResult<Vec<CarrierFile>>;
}
