//! Shared reconciliation types.
//!
//! Job configuration and results are tagged unions keyed by the job type, so
//! a `reconciliation_jobs.config` blob is validated into a concrete shape at
//! the manager boundary instead of being consumed as loose JSON downstream.

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value as JsonValue;
use std::fmt;

use crate::carrier::CarrierFile;
use crate::engine::RunReport;
use crate::premium::{PremiumReconciliationReport, ValidationResult};

/// A calendar billing period (`YYYY-MM`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BillingPeriod {
    year: i32,
    month: u32,
}

impl BillingPeriod {
    /// Create a billing period, validating the month.
    pub fn new(year: i32, month: u32) -> Result<Self, String> {
        if !(1..=12).contains(&month) {
            return Err(format!("Invalid billing month: {month}"));
        }
        if !(1970..=9998).contains(&year) {
            return Err(format!("Invalid billing year: {year}"));
        }
        Ok(Self { year, month })
    }

    #[must_use]
    pub fn year(&self) -> i32 {
        self.year
    }

    #[must_use]
    pub fn month(&self) -> u32 {
        self.month
    }

    /// The period's calendar window: first day of the month (inclusive) to
    /// the first day of the next month (exclusive).
    #[must_use]
    pub fn range(&self) -> Option<DateRange> {
        let start = NaiveDate::from_ymd_opt(self.year, self.month, 1)?;
        let end = if self.month == 12 {
            NaiveDate::from_ymd_opt(self.year + 1, 1, 1)?
        } else {
            NaiveDate::from_ymd_opt(self.year, self.month + 1, 1)?
        };
        Some(DateRange {
            start: start.and_time(NaiveTime::MIN).and_utc(),
            end: end.and_time(NaiveTime::MIN).and_utc(),
        })
    }

    /// The billing period containing a timestamp.
    #[must_use]
    pub fn containing(at: DateTime<Utc>) -> Self {
        Self {
            year: at.year(),
            month: at.month(),
        }
    }
}

impl fmt::Display for BillingPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl std::str::FromStr for BillingPeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year, month) = s
            .split_once('-')
            .ok_or_else(|| format!("Invalid billing period: {s}"))?;
        let year: i32 = year
            .parse()
            .map_err(|_| format!("Invalid billing year: {year}"))?;
        let month: u32 = month
            .parse()
            .map_err(|_| format!("Invalid billing month: {month}"))?;
        Self::new(year, month)
    }
}

impl Serialize for BillingPeriod {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for BillingPeriod {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A half-open UTC time window: `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    /// Whether a timestamp falls inside the window.
    #[must_use]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at < self.end
    }
}

/// Typed job configuration, tagged by job type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobConfig {
    /// Transfer-status run over a subset of named checks.
    TransferStatusReconciliation {
        /// Checks to run; `None` means every registered check.
        #[serde(skip_serializing_if = "Option::is_none")]
        check_names: Option<Vec<String>>,
        #[serde(default)]
        force_run: bool,
    },
    /// Premium billing validation for one period.
    PremiumReconciliation {
        billing_period: BillingPeriod,
        #[serde(skip_serializing_if = "Option::is_none")]
        date_range: Option<DateRange>,
        #[serde(default)]
        include_pending: bool,
        #[serde(default)]
        force_run: bool,
    },
    /// Full run across every registered check.
    All {
        #[serde(default)]
        force_run: bool,
    },
}

/// Typed job results, tagged by job type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobResults {
    TransferStatusReconciliation { report: RunReport },
    PremiumReconciliation {
        report: PremiumReconciliationReport,
        validation: ValidationResult,
        carrier_files: Vec<CarrierFile>,
    },
}

/// Structured error payload stored on a failed job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobErrorInfo {
    /// Human-readable error message.
    pub message: String,
    /// Error chain or additional context for system faults.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl JobErrorInfo {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            detail: None,
        }
    }

    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// How a discrepancy was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionType {
    /// The authoritative (event) value is accepted as ground truth.
    AcceptAuthoritative,
    /// The local value is kept; the event is treated as stale.
    AcceptLocal,
    /// The discrepancy is dismissed without picking a side.
    Ignore,
}

/// Structured resolution attached to a resolved discrepancy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resolution {
    #[serde(rename = "type")]
    pub resolution_type: ResolutionType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<JsonValue>,
}

impl Resolution {
    /// The default auto-resolution policy: accept the event value.
    #[must_use]
    pub fn accept_authoritative(value: &str) -> Self {
        Self {
            resolution_type: ResolutionType::AcceptAuthoritative,
            details: Some(serde_json::json!({ "accepted_value": value })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_billing_period_parse_display() {
        let period: BillingPeriod = "2026-03".parse().unwrap();
        assert_eq!(period.year(), 2026);
        assert_eq!(period.month(), 3);
        assert_eq!(period.to_string(), "2026-03");
    }

    #[test]
    fn test_billing_period_rejects_bad_input() {
        assert!("2026-13".parse::<BillingPeriod>().is_err());
        assert!("2026-00".parse::<BillingPeriod>().is_err());
        assert!("march".parse::<BillingPeriod>().is_err());
    }

    #[test]
    fn test_billing_period_range() {
        let period: BillingPeriod = "2026-02".parse().unwrap();
        let range = period.range().unwrap();
        assert_eq!(range.start.to_rfc3339(), "2026-02-01T00:00:00+00:00");
        assert_eq!(range.end.to_rfc3339(), "2026-03-01T00:00:00+00:00");

        let december: BillingPeriod = "2025-12".parse().unwrap();
        let range = december.range().unwrap();
        assert_eq!(range.end.to_rfc3339(), "2026-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_billing_period_containing() {
        let at = chrono::TimeZone::with_ymd_and_hms(&Utc, 2026, 7, 15, 12, 0, 0).unwrap();
        let period = BillingPeriod::containing(at);
        assert_eq!(period.to_string(), "2026-07");
        assert!(period.range().unwrap().contains(at));
    }

    #[test]
    fn test_date_range_contains() {
        let range = "2026-02".parse::<BillingPeriod>().unwrap().range().unwrap();
        assert!(range.contains(range.start));
        assert!(!range.contains(range.end));
    }

    #[test]
    fn test_billing_period_serde_as_string() {
        let period: BillingPeriod = "2026-07".parse().unwrap();
        let json = serde_json::to_string(&period).unwrap();
        assert_eq!(json, "\"2026-07\"");
        let back: BillingPeriod = serde_json::from_str(&json).unwrap();
        assert_eq!(back, period);
    }

    #[test]
    fn test_job_config_tagged_serde() {
        let config = JobConfig::PremiumReconciliation {
            billing_period: "2026-05".parse().unwrap(),
            date_range: None,
            include_pending: true,
            force_run: false,
        };
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["type"], "premium_reconciliation");
        assert_eq!(json["billing_period"], "2026-05");

        let back: JobConfig = serde_json::from_value(json).unwrap();
        assert!(matches!(
            back,
            JobConfig::PremiumReconciliation { include_pending: true, .. }
        ));
    }

    #[test]
    fn test_resolution_accept_authoritative() {
        let resolution = Resolution::accept_authoritative("\"completed\"");
        assert_eq!(
            resolution.resolution_type,
            ResolutionType::AcceptAuthoritative
        );
        let details = resolution.details.unwrap();
        assert_eq!(details["accepted_value"], "\"completed\"");
    }
}
