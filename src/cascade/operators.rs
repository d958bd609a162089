//! Trigger Operators
//!
//! Pure predicates comparing a resolved field value against a rule's
//! comparison value. Type mismatches are "not matched", never errors.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PatternError;
use crate::value::{is_blank, loose_eq, loose_eq_opt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Lt,
    Gte,
    Lte,
    In,
    NotIn,
    Empty,
    NotEmpty,
    Contains,
    StartsWith,
    EndsWith,
    Matches,
}

impl Operator {
    /// Operator whose result is the logical complement for the reverse rules
    /// generated from `showWhen` / `hideWhen`. Operators without a clean
    /// inverse fall back to `Ne`.
    pub fn inverse(self) -> Operator {
        match self {
            Operator::Eq => Operator::Ne,
            Operator::Ne => Operator::Eq,
            Operator::Empty => Operator::NotEmpty,
            Operator::NotEmpty => Operator::Empty,
            _ => Operator::Ne,
        }
    }

    /// Apply the operator. `field` is `None` when the trigger path did not resolve.
    pub fn evaluate(self, field: Option<&Value>, expected: Option<&Value>) -> bool {
        match self {
            Operator::Eq => loose_eq_opt(field, expected),
            Operator::Ne => !loose_eq_opt(field, expected),
            Operator::Gt => compare_numbers(field, expected, |a, b| a > b),
            Operator::Lt => compare_numbers(field, expected, |a, b| a < b),
            Operator::Gte => compare_numbers(field, expected, |a, b| a >= b),
            Operator::Lte => compare_numbers(field, expected, |a, b| a <= b),
            Operator::In => match expected {
                Some(Value::Array(candidates)) => includes(candidates, field),
                _ => false,
            },
            Operator::NotIn => match expected {
                Some(Value::Array(candidates)) => !includes(candidates, field),
                _ => false,
            },
            Operator::Empty => is_blank(field),
            Operator::NotEmpty => !is_blank(field),
            Operator::Contains => compare_strings(field, expected, |s, needle| s.contains(needle)),
            Operator::StartsWith => {
                compare_strings(field, expected, |s, prefix| s.starts_with(prefix))
            }
            Operator::EndsWith => compare_strings(field, expected, |s, suffix| s.ends_with(suffix)),
            Operator::Matches => match (field, expected) {
                (Some(Value::String(s)), Some(Value::String(pattern))) => {
                    match matches_pattern(s, pattern) {
                        Ok(matched) => matched,
                        Err(e) => {
                            tracing::debug!("Treating trigger as not matched: {}", e);
                            false
                        }
                    }
                }
                _ => false,
            },
        }
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Operator::Eq => "eq",
            Operator::Ne => "ne",
            Operator::Gt => "gt",
            Operator::Lt => "lt",
            Operator::Gte => "gte",
            Operator::Lte => "lte",
            Operator::In => "in",
            Operator::NotIn => "notIn",
            Operator::Empty => "empty",
            Operator::NotEmpty => "notEmpty",
            Operator::Contains => "contains",
            Operator::StartsWith => "startsWith",
            Operator::EndsWith => "endsWith",
            Operator::Matches => "matches",
        };
        write!(f, "{}", name)
    }
}

/// Unanchored regular-expression search of `pattern` in `haystack`.
pub fn matches_pattern(haystack: &str, pattern: &str) -> Result<bool, PatternError> {
    let re = Regex::new(pattern).map_err(|e| PatternError {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })?;
    Ok(re.is_match(haystack))
}

fn includes(candidates: &[Value], field: Option<&Value>) -> bool {
    match field {
        Some(value) => candidates.iter().any(|c| loose_eq(c, value)),
        None => false,
    }
}

fn compare_numbers(
    field: Option<&Value>,
    expected: Option<&Value>,
    cmp: impl Fn(f64, f64) -> bool,
) -> bool {
    match (field.and_then(Value::as_f64), expected.and_then(Value::as_f64)) {
        (Some(a), Some(b)) => cmp(a, b),
        _ => false,
    }
}

fn compare_strings(
    field: Option<&Value>,
    expected: Option<&Value>,
    cmp: impl Fn(&str, &str) -> bool,
) -> bool {
    match (field, expected) {
        (Some(Value::String(s)), Some(Value::String(other))) => cmp(s, other),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn eval(op: Operator, field: Value, expected: Value) -> bool {
        op.evaluate(Some(&field), Some(&expected))
    }

    #[test]
    fn test_equality() {
        assert!(eval(Operator::Eq, json!(true), json!(true)));
        assert!(eval(Operator::Eq, json!(2), json!(2.0)));
        assert!(!eval(Operator::Eq, json!("2"), json!(2)));
        assert!(eval(Operator::Ne, json!("a"), json!("b")));
        // missing field against a present value
        assert!(Operator::Ne.evaluate(None, Some(&json!("x"))));
        assert!(!Operator::Eq.evaluate(None, Some(&json!("x"))));
    }

    #[test]
    fn test_numeric_operators_reject_non_numbers() {
        assert!(eval(Operator::Gt, json!(5), json!(3)));
        assert!(eval(Operator::Lte, json!(3), json!(3)));
        assert!(!eval(Operator::Gt, json!("5"), json!(3)));
        assert!(!eval(Operator::Lt, json!(1), json!(null)));
        assert!(!Operator::Gte.evaluate(None, Some(&json!(0))));
    }

    #[test]
    fn test_membership() {
        assert!(eval(Operator::In, json!("b"), json!(["a", "b"])));
        assert!(!eval(Operator::In, json!("c"), json!(["a", "b"])));
        assert!(eval(Operator::NotIn, json!("c"), json!(["a", "b"])));
        // comparison value must be a list for both directions
        assert!(!eval(Operator::NotIn, json!("c"), json!("abc")));
        assert!(!Operator::In.evaluate(None, Some(&json!(["a"]))));
    }

    #[test]
    fn test_empty_operators() {
        assert!(Operator::Empty.evaluate(Some(&json!([])), None));
        assert!(!Operator::NotEmpty.evaluate(Some(&json!([])), None));
        assert!(Operator::Empty.evaluate(Some(&json!("  ")), None));
        assert!(Operator::Empty.evaluate(None, None));
        assert!(Operator::NotEmpty.evaluate(Some(&json!(0)), None));
    }

    #[test]
    fn test_string_operators() {
        assert!(eval(Operator::Contains, json!("t3.micro"), json!("micro")));
        assert!(eval(Operator::StartsWith, json!("t3.micro"), json!("t3")));
        assert!(eval(Operator::EndsWith, json!("t3.micro"), json!("micro")));
        assert!(!eval(Operator::Contains, json!(["micro"]), json!("micro")));
    }

    #[test]
    fn test_matches_invalid_pattern_is_not_matched() {
        assert!(eval(Operator::Matches, json!("ami-123"), json!("^ami-\\d+$")));
        assert!(!eval(Operator::Matches, json!("ami-123"), json!("(unclosed")));
        let err = matches_pattern("x", "(unclosed").unwrap_err();
        assert_eq!(err.pattern, "(unclosed");
    }

    #[test]
    fn test_inverse() {
        assert_eq!(Operator::Eq.inverse(), Operator::Ne);
        assert_eq!(Operator::NotEmpty.inverse(), Operator::Empty);
        assert_eq!(Operator::Gt.inverse(), Operator::Ne);
    }

    #[test]
    fn test_serde_names() {
        let op: Operator = serde_json::from_value(json!("notIn")).unwrap();
        assert_eq!(op, Operator::NotIn);
        assert_eq!(Operator::StartsWith.to_string(), "startsWith");
        assert!(serde_json::from_value::<Operator>(json!("between")).is_err());
    }
}
