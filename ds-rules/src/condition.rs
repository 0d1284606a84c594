//! Types to specify conditions on traces and transactions.
//!
//! The root type is [`RuleCondition`]. Conditions are only built and serialized here, matching
//! happens at the edge.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::utils;

/// Options for [`EqCondition`].
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EqCondOptions {
    /// If `true`, string values are compared in case-insensitive mode.
    #[serde(default)]
    pub ignore_case: bool,
}

/// A condition that compares values for equality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EqCondition {
    /// Path of the field that should match the value.
    pub name: String,

    /// The value to check against.
    ///
    /// When comparing with a string field, this value can be an array. The condition matches if any
    /// of the provided values matches the field. `null` matches a missing field.
    pub value: Value,

    /// Configuration options for the condition.
    #[serde(default, skip_serializing_if = "utils::is_default")]
    pub options: EqCondOptions,
}

/// A condition that uses glob matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobCondition {
    /// Path of the field that should match the value.
    pub name: String,
    /// A list of glob patterns to check.
    ///
    /// Note that this cannot be a single value, it must be a list of values.
    pub value: Vec<String>,
}

/// Combines multiple conditions using logical OR.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrCondition {
    /// Inner rules to combine.
    pub inner: Vec<RuleCondition>,
}

/// Combines multiple conditions using logical AND.
///
/// An empty `and` matches everything.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AndCondition {
    /// Inner rules to combine.
    pub inner: Vec<RuleCondition>,
}

/// Applies logical NOT to a condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotCondition {
    /// An inner rule to negate.
    pub inner: Box<RuleCondition>,
}

/// A condition from a sampling rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "op")]
pub enum RuleCondition {
    /// A condition that compares values for equality.
    Eq(EqCondition),
    /// A condition that uses glob matching.
    Glob(GlobCondition),
    /// Combines multiple conditions using logical OR.
    Or(OrCondition),
    /// Combines multiple conditions using logical AND.
    And(AndCondition),
    /// Applies logical NOT to a condition.
    Not(NotCondition),
}

impl RuleCondition {
    /// Returns a condition that matches everything.
    pub fn all() -> Self {
        Self::And(AndCondition { inner: Vec::new() })
    }

    /// Combines the given conditions with logical AND.
    pub fn and(inner: Vec<RuleCondition>) -> Self {
        Self::And(AndCondition { inner })
    }

    /// Combines the given conditions with logical OR.
    pub fn or(inner: Vec<RuleCondition>) -> Self {
        Self::Or(OrCondition { inner })
    }

    /// Negates the given condition.
    #[allow(clippy::should_implement_trait)]
    pub fn not(inner: RuleCondition) -> Self {
        Self::Not(NotCondition {
            inner: Box::new(inner),
        })
    }

    /// Creates a case-sensitive equality condition.
    pub fn eq(name: &str, value: impl Into<Value>) -> Self {
        Self::Eq(EqCondition {
            name: name.to_owned(),
            value: value.into(),
            options: EqCondOptions::default(),
        })
    }

    /// Creates a case-insensitive equality condition.
    pub fn eq_ignore_case(name: &str, value: impl Into<Value>) -> Self {
        Self::Eq(EqCondition {
            name: name.to_owned(),
            value: value.into(),
            options: EqCondOptions { ignore_case: true },
        })
    }

    /// Creates a glob condition matching any of the given patterns.
    pub fn glob<I, S>(name: &str, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Glob(GlobCondition {
            name: name.to_owned(),
            value: patterns.into_iter().map(Into::into).collect(),
        })
    }

    /// Returns `true` if this condition matches everything, i.e. it is an empty `and`.
    pub fn is_match_all(&self) -> bool {
        matches!(self, Self::And(AndCondition { inner }) if inner.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_serialize_nested() {
        let condition = RuleCondition::or(vec![
            RuleCondition::eq_ignore_case("event.transaction", vec!["/foo", "/bar"]),
            RuleCondition::not(RuleCondition::eq("trace.replay_id", Value::Null)),
        ]);

        assert_eq!(
            serde_json::to_value(&condition).unwrap(),
            json!({
                "op": "or",
                "inner": [
                    {
                        "op": "eq",
                        "name": "event.transaction",
                        "value": ["/foo", "/bar"],
                        "options": {"ignoreCase": true}
                    },
                    {
                        "op": "not",
                        "inner": {"op": "eq", "name": "trace.replay_id", "value": null}
                    }
                ]
            })
        );
    }

    #[test]
    fn test_case_sensitive_eq_omits_options() {
        let condition = RuleCondition::eq("trace.release", vec!["1.0"]);
        assert_eq!(
            serde_json::to_value(&condition).unwrap(),
            json!({"op": "eq", "name": "trace.release", "value": ["1.0"]})
        );
    }

    #[test]
    fn test_glob_roundtrip() {
        let json = r#"{"op":"glob","name":"trace.environment","value":["*dev*","*qa*"]}"#;
        let condition: RuleCondition = serde_json::from_str(json).unwrap();
        assert_eq!(
            condition,
            RuleCondition::glob("trace.environment", ["*dev*", "*qa*"])
        );
        assert_eq!(serde_json::to_string(&condition).unwrap(), json);
    }

    #[test]
    fn test_match_all() {
        assert!(RuleCondition::all().is_match_all());
        assert!(!RuleCondition::or(vec![]).is_match_all());
        assert_eq!(
            serde_json::to_value(RuleCondition::all()).unwrap(),
            json!({"op": "and", "inner": []})
        );
    }
}
