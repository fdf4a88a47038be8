//! Check definitions and registry.
//!
//! A check is a named comparison rule: which resource type it watches, which
//! fields it compares, whether mismatches auto-resolve, and how far back the
//! first run may look when no watermark exists yet.

use serde::{Deserialize, Serialize};

/// Definition of a named reconciliation check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckDefinition {
    /// Unique check name, e.g. `transfer_status`.
    pub name: String,
    /// Resource type whose events this check consumes.
    pub resource_type: String,
    /// Monitored fields compared between event payload and snapshot.
    pub fields: Vec<String>,
    /// Whether detected mismatches resolve automatically by accepting the
    /// authoritative value.
    #[serde(default)]
    pub auto_resolve: bool,
    /// Lookback window for the first run, before a watermark exists.
    #[serde(default = "default_lookback_hours")]
    pub lookback_hours: i64,
}

fn default_lookback_hours() -> i64 {
    24
}

impl CheckDefinition {
    #[must_use]
    pub fn new(name: &str, resource_type: &str) -> Self {
        Self {
            name: name.to_string(),
            resource_type: resource_type.to_string(),
            fields: vec![],
            auto_resolve: false,
            lookback_hours: default_lookback_hours(),
        }
    }

    #[must_use]
    pub fn with_fields(mut self, fields: &[&str]) -> Self {
        self.fields = fields.iter().map(ToString::to_string).collect();
        self
    }

    #[must_use]
    pub fn with_auto_resolve(mut self, auto_resolve: bool) -> Self {
        self.auto_resolve = auto_resolve;
        self
    }

    #[must_use]
    pub fn with_lookback_hours(mut self, hours: i64) -> Self {
        self.lookback_hours = hours;
        self
    }
}

/// The default transfer-status check: transfer events against local
/// transaction snapshots, comparing status and amount.
#[must_use]
pub fn transfer_status_check() -> CheckDefinition {
    CheckDefinition::new("transfer_status", "transfer").with_fields(&["status", "amount"])
}

/// Registry of configured checks.
#[derive(Debug, Clone)]
pub struct CheckRegistry {
    checks: Vec<CheckDefinition>,
}

impl CheckRegistry {
    /// Empty registry.
    #[must_use]
    pub fn empty() -> Self {
        Self { checks: vec![] }
    }

    /// Registry seeded with the checks passed in.
    #[must_use]
    pub fn with_checks(checks: Vec<CheckDefinition>) -> Self {
        Self { checks }
    }

    /// Register a check, replacing any existing one with the same name.
    pub fn register(&mut self, check: CheckDefinition) {
        self.checks.retain(|c| c.name != check.name);
        self.checks.push(check);
    }

    /// Look up a check by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&CheckDefinition> {
        self.checks.iter().find(|c| c.name == name)
    }

    /// Select checks to run: `None` means every registered check; names
    /// without a registered check are ignored.
    #[must_use]
    pub fn select(&self, names: Option<&[String]>) -> Vec<&CheckDefinition> {
        match names {
            None => self.checks.iter().collect(),
            Some(names) => names.iter().filter_map(|n| self.get(n)).collect(),
        }
    }

    /// All registered check names.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.checks.iter().map(|c| c.name.clone()).collect()
    }
}

impl Default for CheckRegistry {
    fn default() -> Self {
        Self {
            checks: vec![transfer_status_check()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry_has_transfer_status() {
        let registry = CheckRegistry::default();
        let check = registry.get("transfer_status").unwrap();
        assert_eq!(check.resource_type, "transfer");
        assert_eq!(check.fields, vec!["status", "amount"]);
        assert!(!check.auto_resolve);
        assert_eq!(check.lookback_hours, 24);
    }

    #[test]
    fn test_register_replaces_by_name() {
        let mut registry = CheckRegistry::default();
        registry.register(transfer_status_check().with_auto_resolve(true));

        assert_eq!(registry.names().len(), 1);
        assert!(registry.get("transfer_status").unwrap().auto_resolve);
    }

    #[test]
    fn test_select_all_and_subset() {
        let mut registry = CheckRegistry::default();
        registry.register(
            CheckDefinition::new("customer_profile", "customer").with_fields(&["status"]),
        );

        assert_eq!(registry.select(None).len(), 2);

        let subset = registry.select(Some(&["transfer_status".to_string()]));
        assert_eq!(subset.len(), 1);
        assert_eq!(subset[0].name, "transfer_status");

        let unknown = registry.select(Some(&["nope".to_string()]));
        assert!(unknown.is_empty());
    }
}
