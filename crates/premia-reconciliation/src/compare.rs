//! Field comparison primitives.
//!
//! Status values compare by normalized string equality. Monetary values are
//! parsed into `Decimal` before comparison so `100`, `"100.00"`, and
//! `{"value": 100, "currency": "USD"}` all agree with each other.

use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use std::str::FromStr;

/// Tolerance for monetary comparison: 0.005 (half a cent).
///
/// A genuine one-cent difference (0.01) exceeds it and is flagged; float
/// noise well below a cent (e.g. 0.001) is not.
pub const AMOUNT_EPSILON: Decimal = Decimal::from_parts(5, 0, 0, false, 3);

/// Parse a monetary value out of a JSON payload field.
///
/// Accepts plain numbers, numeric strings, and `{value, currency}` objects.
/// Currency is treated as constant (USD) and ignored for comparison.
#[must_use]
pub fn parse_amount(value: &JsonValue) -> Option<Decimal> {
    match value {
        JsonValue::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        JsonValue::String(s) => Decimal::from_str(s.trim()).ok(),
        JsonValue::Object(map) => map.get("value").and_then(parse_amount),
        _ => None,
    }
}

/// Whether two monetary values agree within [`AMOUNT_EPSILON`].
#[must_use]
pub fn amounts_match(a: Decimal, b: Decimal) -> bool {
    (a - b).abs() <= AMOUNT_EPSILON
}

/// Normalize a status value for comparison.
#[must_use]
pub fn normalize_status(status: &str) -> String {
    status.trim().to_ascii_lowercase()
}

/// Whether two JSON field values agree, treating both as statuses when they
/// are strings and falling back to structural equality otherwise.
#[must_use]
pub fn values_match(a: &JsonValue, b: &JsonValue) -> bool {
    match (a, b) {
        (JsonValue::String(a), JsonValue::String(b)) => {
            normalize_status(a) == normalize_status(b)
        }
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_amount_number() {
        assert_eq!(parse_amount(&json!(100)), Some(Decimal::from(100)));
        assert_eq!(
            parse_amount(&json!(99.5)),
            Some(Decimal::from_str("99.5").unwrap())
        );
    }

    #[test]
    fn test_parse_amount_string() {
        assert_eq!(
            parse_amount(&json!(" 100.25 ")),
            Some(Decimal::from_str("100.25").unwrap())
        );
        assert_eq!(parse_amount(&json!("not money")), None);
    }

    #[test]
    fn test_parse_amount_object() {
        assert_eq!(
            parse_amount(&json!({"value": 100.00, "currency": "USD"})),
            Some(Decimal::from(100))
        );
        assert_eq!(
            parse_amount(&json!({"value": "42.42", "currency": "USD"})),
            Some(Decimal::from_str("42.42").unwrap())
        );
        assert_eq!(parse_amount(&json!({"currency": "USD"})), None);
    }

    #[test]
    fn test_parse_amount_rejects_other_shapes() {
        assert_eq!(parse_amount(&json!(null)), None);
        assert_eq!(parse_amount(&json!([100])), None);
        assert_eq!(parse_amount(&json!(true)), None);
    }

    #[test]
    fn test_amounts_match_within_epsilon() {
        let a = Decimal::from_str("100.00").unwrap();
        let b = Decimal::from_str("100.001").unwrap();
        assert!(amounts_match(a, b));
    }

    #[test]
    fn test_amounts_mismatch_cent_level() {
        let a = Decimal::from_str("100.00").unwrap();
        let b = Decimal::from_str("99.99").unwrap();
        assert!(!amounts_match(a, b));
    }

    #[test]
    fn test_amounts_mismatch_large_gap() {
        let a = Decimal::from_str("100.00").unwrap();
        let b = Decimal::from_str("99.50").unwrap();
        assert!(!amounts_match(a, b));
    }

    #[test]
    fn test_normalize_status() {
        assert_eq!(normalize_status("  Completed "), "completed");
        assert_eq!(normalize_status("PENDING"), "pending");
    }

    #[test]
    fn test_values_match_strings_normalized() {
        assert!(values_match(&json!("Completed"), &json!("completed ")));
        assert!(!values_match(&json!("completed"), &json!("pending")));
    }

    #[test]
    fn test_values_match_structural() {
        assert!(values_match(&json!(5), &json!(5)));
        assert!(!values_match(&json!(5), &json!(6)));
    }
}
