use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{Operator, RateBand, Rule, RuleCheck, RuleOutcome, Severity, Threshold};
use crate::decision::applicant::FieldValue;

/// Persisted admin edit for a rule. Fields left as `None` keep the default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<Operator>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<Threshold>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<RuleOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

impl RuleOverride {
    fn apply_to(&self, rule: &mut Rule) {
        if let Some(name) = &self.name {
            rule.name = name.clone();
        }
        if let Some(field) = &self.field {
            rule.field = field.clone();
        }
        if let Some(operator) = &self.operator {
            rule.operator = operator.clone();
        }
        if let Some(threshold) = &self.threshold {
            rule.threshold = threshold.clone();
        }
        if let Some(outcome) = self.outcome {
            rule.outcome = outcome;
        }
        if let Some(severity) = self.severity {
            rule.severity = severity;
        }
        if let Some(enabled) = self.enabled {
            rule.enabled = enabled;
        }
    }

    /// Build an admin-added rule. Requires field, operator and threshold.
    fn into_custom(self, id: &str) -> Option<Rule> {
        Some(Rule {
            id: id.to_string(),
            name: self.name.unwrap_or_else(|| id.to_string()),
            field: self.field?,
            operator: self.operator?,
            threshold: self.threshold?,
            outcome: self.outcome.unwrap_or(RuleOutcome::Refer),
            severity: self.severity.unwrap_or(Severity::Refer),
            enabled: self.enabled.unwrap_or(true),
            is_custom: true,
            check: RuleCheck::Comparison,
        })
    }
}

/// Immutable snapshot of the rules used for one evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleRegistry {
    rules: Vec<Rule>,
}

impl RuleRegistry {
    pub fn from_rules(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// The built-in lending policy table (R01-R21).
    pub fn builtin() -> Self {
        Self::from_rules(builtin_rules())
    }

    /// Overlay persisted overrides onto this registry, producing a new snapshot.
    ///
    /// Known ids are patched in place; unknown ids with a complete definition are appended as
    /// custom rules in id order. Incomplete definitions for unknown ids are dropped.
    pub fn with_overrides(&self, overrides: &BTreeMap<String, RuleOverride>) -> Self {
        let mut rules = self.rules.clone();

        for (id, patch) in overrides {
            if let Some(rule) = rules.iter_mut().find(|rule| &rule.id == id) {
                patch.apply_to(rule);
                continue;
            }

            match patch.clone().into_custom(id) {
                Some(rule) => rules.push(rule),
                None => warn!(rule_id = %id, "ignoring custom rule without field/operator/threshold"),
            }
        }

        Self { rules }
    }

    pub fn get(&self, id: &str) -> Option<&Rule> {
        self.rules.iter().find(|rule| rule.id == id)
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Default for RuleRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn builtin(
    id: &str,
    name: &str,
    field: &str,
    operator: Operator,
    threshold: Threshold,
    outcome: RuleOutcome,
    severity: Severity,
) -> Rule {
    Rule {
        id: id.to_string(),
        name: name.to_string(),
        field: field.to_string(),
        operator,
        threshold,
        outcome,
        severity,
        enabled: true,
        is_custom: false,
        check: RuleCheck::Comparison,
    }
}

fn texts(values: &[&str]) -> Threshold {
    Threshold::List(values.iter().map(|value| FieldValue::from(*value)).collect())
}

fn range(low: f64, high: f64) -> Threshold {
    Threshold::List(vec![FieldValue::Number(low), FieldValue::Number(high)])
}

fn band(min: f64, max: f64, rate: f64, tier: &str) -> RateBand {
    RateBand {
        min,
        max,
        rate,
        tier: Some(tier.to_string()),
    }
}

fn builtin_rules() -> Vec<Rule> {
    use Operator::*;
    use RuleOutcome::{Decline, Pass, Refer as ReferOutcome};
    use Severity::{Hard, Refer, Soft};

    let mut pricing = builtin(
        "R09",
        "Credit score pricing band",
        "credit_score",
        Between,
        Threshold::Bands(vec![
            band(550.0, 650.0, 24.0, "C"),
            band(650.0, 750.0, 18.0, "B"),
            band(750.0, 851.0, 12.0, "A"),
        ]),
        Pass,
        Soft,
    );
    pricing.check = RuleCheck::ScoreBand;

    let mut income_multiple = builtin(
        "R21",
        "Loan amount within income multiple",
        "loan_amount",
        Lte,
        Threshold::Number(12.0),
        ReferOutcome,
        Refer,
    );
    income_multiple.check = RuleCheck::IncomeMultiple;

    vec![
        builtin("R01", "Minimum age", "age", Gte, 21.0.into(), Decline, Hard),
        builtin("R02", "Maximum age", "age", Lte, 65.0.into(), Decline, Hard),
        builtin("R03", "Age at loan maturity", "maturity_age", Lte, 70.0.into(), Decline, Hard),
        builtin("R04", "Minimum monthly income", "monthly_income", Gte, 15_000.0.into(), Decline, Hard),
        builtin("R05", "Employment tenure", "employment_months", Gte, 12.0.into(), ReferOutcome, Refer),
        builtin("R06", "Debt service ratio ceiling", "dsr", Lte, 50.0.into(), Decline, Hard),
        builtin("R07", "Debt service ratio review band", "dsr", Lte, 40.0.into(), ReferOutcome, Refer),
        builtin("R08", "Minimum credit score", "credit_score", Gte, 550.0.into(), Decline, Hard),
        pricing,
        builtin("R10", "Bureau days past due", "max_dpd", Lte, 30.0.into(), Decline, Hard),
        builtin("R11", "Written-off accounts", "has_written_off_accounts", Eq, false.into(), Decline, Hard),
        builtin("R12", "Bankruptcy on file", "bankruptcy_flag", Eq, false.into(), Decline, Hard),
        builtin("R13", "Internal blacklist", "is_blacklisted", Eq, false.into(), Decline, Hard),
        builtin("R14", "Watchlist match", "watchlist_hit", Eq, false.into(), ReferOutcome, Refer),
        builtin("R15", "Loan amount range", "loan_amount", Between, range(5_000.0, 2_000_000.0), Decline, Hard),
        builtin("R16", "Loan term range", "term_months", Between, range(3.0, 60.0), Decline, Hard),
        builtin(
            "R17",
            "Eligible employment type",
            "employment_type",
            In,
            texts(&["regular", "self_employed", "contractual"]),
            ReferOutcome,
            Refer,
        ),
        builtin(
            "R18",
            "Residency status",
            "residency_status",
            In,
            texts(&["citizen", "permanent_resident"]),
            Decline,
            Hard,
        ),
        builtin("R19", "Active loan count", "active_loans", Lte, 3.0.into(), ReferOutcome, Refer),
        builtin("R20", "Recent credit inquiries", "inquiries_6m", Lte, 6.0.into(), Pass, Soft),
        income_multiple,
    ]
}
