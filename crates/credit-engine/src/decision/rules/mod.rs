//! Rule registry, comparison kernel and the rule evaluator.

mod compare;
mod evaluator;
mod registry;

pub use compare::{compare, Operator, RateBand, Threshold};
pub use evaluator::{RuleEvaluator, RuleInput, RulesConfig, RulesOutcome, RulesOutput};
pub use registry::{RuleOverride, RuleRegistry};

pub(crate) use evaluator::evaluate_rule;

use std::fmt;

use serde::{Deserialize, Serialize};

use super::applicant::FieldValue;

/// Action a rule recommends when it fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleOutcome {
    Decline,
    Refer,
    Pass,
    Disable,
}

/// How heavily a failure weighs in the aggregated outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Soft,
    Refer,
    Hard,
}

/// Kind of check a rule performs. Built-in rules may carry bespoke checks; custom rules are
/// always plain comparisons.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RuleCheck {
    #[default]
    Comparison,
    /// Find the band containing the field value; the band's rate becomes the suggested rate.
    ScoreBand,
    /// `loan_amount <= monthly_income * threshold`; the product is the max eligible amount.
    IncomeMultiple,
    Unsupported(String),
}

impl RuleCheck {
    pub fn label(&self) -> &str {
        match self {
            RuleCheck::Comparison => "comparison",
            RuleCheck::ScoreBand => "score_band",
            RuleCheck::IncomeMultiple => "income_multiple",
            RuleCheck::Unsupported(raw) => raw,
        }
    }
}

impl From<String> for RuleCheck {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "comparison" | "threshold" => RuleCheck::Comparison,
            "score_band" => RuleCheck::ScoreBand,
            "income_multiple" => RuleCheck::IncomeMultiple,
            _ => RuleCheck::Unsupported(value),
        }
    }
}

impl From<RuleCheck> for String {
    fn from(value: RuleCheck) -> Self {
        value.label().to_string()
    }
}

/// A single named rule resolved against applicant data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub name: String,
    pub field: String,
    pub operator: Operator,
    pub threshold: Threshold,
    pub outcome: RuleOutcome,
    pub severity: Severity,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Custom rules describe a blocking condition: a match fails the applicant.
    #[serde(default)]
    pub is_custom: bool,
    #[serde(default)]
    pub check: RuleCheck,
}

fn default_enabled() -> bool {
    true
}

impl Rule {
    pub fn is_active(&self) -> bool {
        self.enabled && self.outcome != RuleOutcome::Disable
    }
}

/// Verdict recorded for one rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleStatus {
    Passed,
    Failed,
    /// The field was unavailable; recorded as a soft pass.
    Skipped,
    /// The rule kind is not understood by this engine version.
    NotEvaluated,
}

impl RuleStatus {
    pub const fn label(self) -> &'static str {
        match self {
            RuleStatus::Passed => "passed",
            RuleStatus::Failed => "failed",
            RuleStatus::Skipped => "skipped",
            RuleStatus::NotEvaluated => "not_evaluated",
        }
    }
}

impl fmt::Display for RuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Audit entry for a single rule evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleResult {
    pub rule_id: String,
    pub rule_name: String,
    pub field: String,
    pub status: RuleStatus,
    pub severity: Severity,
    pub outcome: RuleOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual: Option<FieldValue>,
    pub message: String,
}

impl RuleResult {
    pub fn failed(&self) -> bool {
        self.status == RuleStatus::Failed
    }
}
