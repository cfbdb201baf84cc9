//! # Condition Evaluation
//!
//! Pure comparison of one tag value against one expected value. Every
//! comparison is case-insensitive and an absent value reads as `""`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Comparison operator of a match clause
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Contains,
    NotContains,
    Equals,
    NotEquals,
}

impl Operator {
    pub const ALL: [Operator; 4] = [
        Operator::Contains,
        Operator::NotContains,
        Operator::Equals,
        Operator::NotEquals,
    ];

    /// Suffix matching order for `<field>_<operator>` keys; negated forms first
    /// so `_not_contains` is never read as `_contains`.
    pub const PARSE_ORDER: [Operator; 4] = [
        Operator::NotContains,
        Operator::NotEquals,
        Operator::Contains,
        Operator::Equals,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Contains => "contains",
            Self::NotContains => "not_contains",
            Self::Equals => "equals",
            Self::NotEquals => "not_equals",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Operator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "contains" => Ok(Self::Contains),
            "not_contains" => Ok(Self::NotContains),
            "equals" => Ok(Self::Equals),
            "not_equals" => Ok(Self::NotEquals),
            _ => Err(format!("Invalid match operator: {s}")),
        }
    }
}

/// Evaluate one clause
pub fn evaluate(operator: Operator, actual: Option<&str>, expected: &str) -> bool {
    let actual = actual.unwrap_or("").to_lowercase();
    let expected = expected.to_lowercase();

    match operator {
        Operator::Equals => actual == expected,
        Operator::NotEquals => actual != expected,
        Operator::Contains => actual.contains(&expected),
        Operator::NotContains => !actual.contains(&expected),
    }
}

/// Evaluate with an operator name; unknown names never match
pub fn evaluate_named(operator: &str, actual: Option<&str>, expected: &str) -> bool {
    match operator.parse::<Operator>() {
        Ok(op) => evaluate(op, actual, expected),
        Err(_) => false,
    }
}
