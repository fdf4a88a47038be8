//! Premium reconciliation engine.
//!
//! Validates that a billing period's aggregate customer collections
//! reconcile against the sum of per-carrier remittance files. A failed
//! validation is a result, not an error; the job manager marks the owning
//! job failed when `validation.is_valid` is false.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

use crate::carrier::{CarrierFile, CarrierFileSource, CollectionSource, TransactionStatus};
use crate::compare::AMOUNT_EPSILON;
use crate::error::{ReconciliationError, ReconciliationResult};
use crate::types::{BillingPeriod, DateRange};

/// Options for a premium reconciliation run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PremiumOptions {
    /// Explicit window; defaults to the billing period's calendar month.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_range: Option<DateRange>,
    /// Whether non-final transactions count toward collected totals.
    #[serde(default)]
    pub include_pending: bool,
}

/// Per-carrier comparison of collected premium versus remitted totals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarrierBreakdown {
    pub carrier: String,
    pub collected: Decimal,
    pub remitted: Decimal,
    pub delta: Decimal,
}

/// Immutable report for one premium reconciliation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PremiumReconciliationReport {
    pub report_id: Uuid,
    pub billing_period: BillingPeriod,
    pub total_collected: Decimal,
    pub total_accounts_processed: u32,
    pub carriers: Vec<CarrierBreakdown>,
}

/// A single validation failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub carriers: Vec<String>,
}

/// Outcome of validating collected totals against remittance files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<String>,
}

/// Full result triple of a premium run; becomes the job's results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PremiumReconciliationOutcome {
    pub report: PremiumReconciliationReport,
    pub validation: ValidationResult,
    pub carrier_files: Vec<CarrierFile>,
}

/// Engine validating premium collections against carrier remittances.
pub struct PremiumReconciliationEngine {
    collections: Arc<dyn CollectionSource>,
    carrier_files: Arc<dyn CarrierFileSource>,
}

impl PremiumReconciliationEngine {
    #[must_use]
    pub fn new(
        collections: Arc<dyn CollectionSource>,
        carrier_files: Arc<dyn CarrierFileSource>,
    ) -> Self {
        Self {
            collections,
            carrier_files,
        }
    }

    /// Run premium reconciliation for a billing period.
    ///
    /// Aggregation failures propagate; the engine does not retry.
    pub async fn run(
        &self,
        billing_period: &BillingPeriod,
        options: &PremiumOptions,
    ) -> ReconciliationResult<PremiumReconciliationOutcome> {
        let window = match options.date_range {
            Some(range) => range,
            None => billing_period.range().ok_or_else(|| {
                ReconciliationError::InvalidConfig(format!(
                    "billing period out of range: {billing_period}"
                ))
            })?,
        };

        let transactions = self
            .collections
            .collected_transactions(&window, options.include_pending)
            .await
            .map_err(|e| ReconciliationError::Adapter(e.to_string()))?;

        let mut total_collected = Decimal::ZERO;
        let mut accounts: HashSet<String> = HashSet::new();
        let mut collected_by_carrier: BTreeMap<String, Decimal> = BTreeMap::new();

        for transaction in &transactions {
            match transaction.status {
                TransactionStatus::Failed => continue,
                TransactionStatus::Pending if !options.include_pending => continue,
                _ => {}
            }
            total_collected += transaction.amount;
            accounts.insert(transaction.account_id.clone());
            *collected_by_carrier
                .entry(transaction.carrier.clone())
                .or_insert(Decimal::ZERO) += transaction.amount;
        }

        let files = self
            .carrier_files
            .carrier_files(billing_period)
            .await
            .map_err(|e| ReconciliationError::Adapter(e.to_string()))?;

        let mut warnings = Vec::new();
        let mut remitted_by_carrier: BTreeMap<String, Decimal> = BTreeMap::new();
        let mut total_remitted = Decimal::ZERO;

        for file in &files {
            if file.carrier.trim().is_empty() {
                warnings.push("Carrier file with empty carrier name".to_string());
            }
            if file.total_amount < Decimal::ZERO {
                warnings.push(format!(
                    "Carrier file for {} has negative total {}",
                    file.carrier, file.total_amount
                ));
            }
            if file.line_items.iter().any(|item| item.amount < Decimal::ZERO) {
                warnings.push(format!(
                    "Carrier file for {} contains negative line items",
                    file.carrier
                ));
            }
            if !file.line_items.is_empty() {
                let line_total = file.line_item_total();
                if (line_total - file.total_amount).abs() > AMOUNT_EPSILON {
                    warnings.push(format!(
                        "Carrier file for {} line items sum to {} but declare total {}",
                        file.carrier, line_total, file.total_amount
                    ));
                }
            }

            total_remitted += file.total_amount;
            *remitted_by_carrier
                .entry(file.carrier.clone())
                .or_insert(Decimal::ZERO) += file.total_amount;
        }

        let mut carrier_names: Vec<String> = collected_by_carrier
            .keys()
            .chain(remitted_by_carrier.keys())
            .cloned()
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        carrier_names.sort();

        let carriers: Vec<CarrierBreakdown> = carrier_names
            .into_iter()
            .map(|carrier| {
                let collected = collected_by_carrier
                    .get(&carrier)
                    .copied()
                    .unwrap_or(Decimal::ZERO);
                let remitted = remitted_by_carrier
                    .get(&carrier)
                    .copied()
                    .unwrap_or(Decimal::ZERO);
                CarrierBreakdown {
                    carrier,
                    collected,
                    remitted,
                    delta: collected - remitted,
                }
            })
            .collect();

        let mut errors = Vec::new();
        let gap = total_collected - total_remitted;
        if gap.abs() > AMOUNT_EPSILON {
            let affected: Vec<String> = carriers
                .iter()
                .filter(|c| c.delta.abs() > AMOUNT_EPSILON)
                .map(|c| c.carrier.clone())
                .collect();
            errors.push(ValidationIssue {
                message: format!(
                    "Carrier remittance totals ({total_remitted}) do not reconcile against \
                     collected premium ({total_collected}); delta {gap}"
                ),
                delta: Some(gap),
                carriers: affected,
            });
        }

        let validation = ValidationResult {
            is_valid: errors.is_empty(),
            errors,
            warnings,
        };

        let report = PremiumReconciliationReport {
            report_id: Uuid::new_v4(),
            billing_period: *billing_period,
            total_collected,
            total_accounts_processed: accounts.len() as u32,
            carriers,
        };

        tracing::info!(
            billing_period = %billing_period,
            total_collected = %report.total_collected,
            accounts = report.total_accounts_processed,
            is_valid = validation.is_valid,
            "Premium reconciliation finished"
        );

        Ok(PremiumReconciliationOutcome {
            report,
            validation,
            carrier_files: files,
        })
    }
}
