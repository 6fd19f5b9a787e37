use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Scalar value captured for one applicant field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Number(f64),
    Text(String),
    Null,
}

impl FieldValue {
    /// Numeric view of the value. Text is accepted when it parses cleanly.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(value) if value.is_finite() => Some(*value),
            FieldValue::Text(raw) => raw.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(flag) => Some(*flag),
            FieldValue::Text(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "y" => Some(true),
                "false" | "no" | "n" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Bool(flag) => write!(f, "{flag}"),
            FieldValue::Number(value) => write!(f, "{value}"),
            FieldValue::Text(raw) => f.write_str(raw),
            FieldValue::Null => f.write_str("null"),
        }
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Number(value as f64)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

/// Flat applicant snapshot assembled by the profile extraction step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicantData(BTreeMap<String, FieldValue>);

impl ApplicantData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: &str, value: impl Into<FieldValue>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn insert(&mut self, field: &str, value: impl Into<FieldValue>) {
        self.0.insert(field.to_string(), value.into());
    }

    /// Raw lookup. `Null` counts as absent.
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.0.get(field).filter(|value| !value.is_null())
    }

    pub fn number(&self, field: &str) -> Option<f64> {
        self.resolve(field).and_then(|value| value.as_number())
    }

    pub fn text(&self, field: &str) -> Option<String> {
        self.get(field).map(|value| value.to_string())
    }

    /// Lookup that falls back to the derived fields when the raw value is absent.
    pub fn resolve(&self, field: &str) -> Option<FieldValue> {
        if let Some(value) = self.get(field) {
            return Some(value.clone());
        }

        self.derive(field).map(FieldValue::Number)
    }

    fn derive(&self, field: &str) -> Option<f64> {
        let raw = |name: &str| self.get(name).and_then(FieldValue::as_number);
        match field {
            "employment_months" => raw("years_employed").map(|years| years * 12.0),
            "maturity_age" => {
                let age = raw("age")?;
                let term = raw("term_months")?;
                Some(age + term / 12.0)
            }
            "dsr" => {
                let income = raw("monthly_income").filter(|income| *income > 0.0)?;
                let obligations = raw("monthly_obligations").unwrap_or(0.0);
                let installment = raw("proposed_installment").unwrap_or(0.0);
                Some((obligations + installment) / income * 100.0)
            }
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.0.iter()
    }
}

impl FromIterator<(String, FieldValue)> for ApplicantData {
    fn from_iter<T: IntoIterator<Item = (String, FieldValue)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
