use std::fmt;

use serde::{Deserialize, Serialize};

use crate::decision::applicant::FieldValue;

const NUMERIC_TOLERANCE: f64 = 1e-9;

/// Comparison operator attached to a rule or condition.
///
/// Operators the kernel does not recognise are kept verbatim and evaluate as a pass-through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Operator {
    Gte,
    Lte,
    Gt,
    Lt,
    Eq,
    Neq,
    In,
    NotIn,
    Between,
    Unknown(String),
}

impl Operator {
    pub fn label(&self) -> &str {
        match self {
            Operator::Gte => "gte",
            Operator::Lte => "lte",
            Operator::Gt => "gt",
            Operator::Lt => "lt",
            Operator::Eq => "eq",
            Operator::Neq => "neq",
            Operator::In => "in",
            Operator::NotIn => "not_in",
            Operator::Between => "between",
            Operator::Unknown(raw) => raw,
        }
    }
}

impl From<String> for Operator {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "gte" | ">=" => Operator::Gte,
            "lte" | "<=" => Operator::Lte,
            "gt" | ">" => Operator::Gt,
            "lt" | "<" => Operator::Lt,
            "eq" | "==" | "=" => Operator::Eq,
            "neq" | "!=" | "<>" => Operator::Neq,
            "in" => Operator::In,
            "not_in" | "nin" => Operator::NotIn,
            "between" => Operator::Between,
            _ => Operator::Unknown(value),
        }
    }
}

impl From<&str> for Operator {
    fn from(value: &str) -> Self {
        Operator::from(value.to_string())
    }
}

impl From<Operator> for String {
    fn from(value: Operator) -> Self {
        value.label().to_string()
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Score band used by band-map thresholds (e.g. credit score to suggested rate).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateBand {
    pub min: f64,
    pub max: f64,
    pub rate: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<String>,
}

impl RateBand {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value < self.max
    }
}

/// Threshold operand. The variant decides which operators can use it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Threshold {
    Flag(bool),
    Number(f64),
    Text(String),
    List(Vec<FieldValue>),
    Bands(Vec<RateBand>),
}

impl Threshold {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Threshold::Number(value) => Some(*value),
            Threshold::Text(raw) => raw.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn bands(&self) -> Option<&[RateBand]> {
        match self {
            Threshold::Bands(bands) => Some(bands),
            _ => None,
        }
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Threshold::Flag(flag) => write!(f, "{flag}"),
            Threshold::Number(value) => write!(f, "{value}"),
            Threshold::Text(raw) => f.write_str(raw),
            Threshold::List(items) => {
                let rendered: Vec<String> = items.iter().map(ToString::to_string).collect();
                write!(f, "[{}]", rendered.join(", "))
            }
            Threshold::Bands(bands) => write!(f, "{} band(s)", bands.len()),
        }
    }
}

impl From<f64> for Threshold {
    fn from(value: f64) -> Self {
        Threshold::Number(value)
    }
}

impl From<bool> for Threshold {
    fn from(value: bool) -> Self {
        Threshold::Flag(value)
    }
}

impl From<&str> for Threshold {
    fn from(value: &str) -> Self {
        Threshold::Text(value.to_string())
    }
}

/// Evaluate `actual <op> threshold`.
///
/// Returns `None` when the operands cannot be compared (wrong type, malformed list); the
/// caller decides how to treat the gap. Unknown operators always hold.
pub fn compare(actual: &FieldValue, operator: &Operator, threshold: &Threshold) -> Option<bool> {
    match operator {
        Operator::Gte => ordered(actual, threshold, |a, b| a >= b - NUMERIC_TOLERANCE),
        Operator::Lte => ordered(actual, threshold, |a, b| a <= b + NUMERIC_TOLERANCE),
        Operator::Gt => ordered(actual, threshold, |a, b| a > b + NUMERIC_TOLERANCE),
        Operator::Lt => ordered(actual, threshold, |a, b| a < b - NUMERIC_TOLERANCE),
        Operator::Eq => equals(actual, threshold),
        Operator::Neq => equals(actual, threshold).map(|eq| !eq),
        Operator::In => member_of(actual, threshold),
        Operator::NotIn => member_of(actual, threshold).map(|found| !found),
        Operator::Between => between(actual, threshold),
        Operator::Unknown(_) => Some(true),
    }
}

fn ordered(actual: &FieldValue, threshold: &Threshold, cmp: fn(f64, f64) -> bool) -> Option<bool> {
    let value = actual.as_number()?;
    let bound = threshold.as_number()?;
    Some(cmp(value, bound))
}

fn equals(actual: &FieldValue, threshold: &Threshold) -> Option<bool> {
    match threshold {
        Threshold::Number(expected) => actual
            .as_number()
            .map(|value| (value - expected).abs() < NUMERIC_TOLERANCE),
        Threshold::Flag(expected) => actual.as_bool().map(|value| value == *expected),
        Threshold::Text(expected) => Some(scalar_equals(actual, &FieldValue::Text(expected.clone()))),
        Threshold::List(_) | Threshold::Bands(_) => None,
    }
}

/// Loose scalar equality: numbers numerically, booleans logically, everything else as
/// case-insensitive text.
fn scalar_equals(actual: &FieldValue, expected: &FieldValue) -> bool {
    if let (Some(a), Some(b)) = (actual.as_number(), expected.as_number()) {
        return (a - b).abs() < NUMERIC_TOLERANCE;
    }
    let typed_flag = matches!(actual, FieldValue::Bool(_)) || matches!(expected, FieldValue::Bool(_));
    if let (true, Some(a), Some(b)) = (typed_flag, actual.as_bool(), expected.as_bool()) {
        return a == b;
    }
    actual
        .to_string()
        .trim()
        .eq_ignore_ascii_case(expected.to_string().trim())
}

fn member_of(actual: &FieldValue, threshold: &Threshold) -> Option<bool> {
    match threshold {
        Threshold::List(items) => Some(items.iter().any(|item| scalar_equals(actual, item))),
        Threshold::Text(raw) => Some(
            raw.split(',')
                .map(|item| FieldValue::Text(item.trim().to_string()))
                .any(|item| scalar_equals(actual, &item)),
        ),
        _ => None,
    }
}

fn between(actual: &FieldValue, threshold: &Threshold) -> Option<bool> {
    let value = actual.as_number()?;
    let Threshold::List(items) = threshold else {
        return None;
    };
    let [low, high] = items.as_slice() else {
        return None;
    };
    let low = low.as_number()?;
    let high = high.as_number()?;
    Some(value >= low - NUMERIC_TOLERANCE && value <= high + NUMERIC_TOLERANCE)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(values: &[&str]) -> Threshold {
        Threshold::List(values.iter().map(|v| FieldValue::from(*v)).collect())
    }

    #[test]
    fn numeric_operators_compare_numbers() {
        let age = FieldValue::Number(30.0);
        assert_eq!(compare(&age, &Operator::Gte, &30.0.into()), Some(true));
        assert_eq!(compare(&age, &Operator::Gt, &30.0.into()), Some(false));
        assert_eq!(compare(&age, &Operator::Lt, &31.0.into()), Some(true));
        assert_eq!(compare(&age, &Operator::Lte, &29.0.into()), Some(false));
    }

    #[test]
    fn strings_compare_case_insensitively() {
        let occupation = FieldValue::from("PROFESSIONAL");
        assert_eq!(
            compare(&occupation, &Operator::Eq, &"professional".into()),
            Some(true)
        );
        assert_eq!(
            compare(&occupation, &Operator::In, &list(&["Clerk", "professional"])),
            Some(true)
        );
        assert_eq!(
            compare(&occupation, &Operator::NotIn, &list(&["Clerk"])),
            Some(true)
        );
    }

    #[test]
    fn booleans_match_flags_and_text() {
        let flag = FieldValue::Bool(false);
        assert_eq!(compare(&flag, &Operator::Eq, &false.into()), Some(true));
        assert_eq!(compare(&flag, &Operator::Eq, &"false".into()), Some(true));
        assert_eq!(compare(&flag, &Operator::Neq, &true.into()), Some(true));
    }

    #[test]
    fn between_is_inclusive() {
        let bounds = Threshold::List(vec![FieldValue::Number(3.0), FieldValue::Number(60.0)]);
        assert_eq!(compare(&FieldValue::Number(3.0), &Operator::Between, &bounds), Some(true));
        assert_eq!(compare(&FieldValue::Number(60.0), &Operator::Between, &bounds), Some(true));
        assert_eq!(compare(&FieldValue::Number(61.0), &Operator::Between, &bounds), Some(false));
    }

    #[test]
    fn incomparable_operands_yield_none() {
        let text = FieldValue::from("unknown");
        assert_eq!(compare(&text, &Operator::Gte, &10.0.into()), None);
        assert_eq!(
            compare(&FieldValue::Number(5.0), &Operator::Between, &10.0.into()),
            None
        );
    }

    #[test]
    fn unknown_operators_pass_through() {
        let operator = Operator::from("matches_regex");
        assert_eq!(operator, Operator::Unknown("matches_regex".to_string()));
        assert_eq!(
            compare(&FieldValue::Null, &operator, &Threshold::Number(1.0)),
            Some(true)
        );
    }

    #[test]
    fn thresholds_deserialize_into_variants() {
        let bands: Threshold =
            serde_json::from_str(r#"[{"min": 700, "max": 851, "rate": 12.5}]"#).expect("bands");
        assert!(bands.bands().is_some());

        let items: Threshold = serde_json::from_str(r#"["regular", "contractual"]"#).expect("list");
        assert!(matches!(items, Threshold::List(ref values) if values.len() == 2));

        let number: Threshold = serde_json::from_str("40").expect("number");
        assert_eq!(number, Threshold::Number(40.0));
    }
}
