use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::compare::compare;
use super::{Rule, RuleCheck, RuleRegistry, RuleResult, RuleStatus, Severity};
use crate::decision::applicant::ApplicantData;

/// Aggregated verdict of a registry evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RulesOutcome {
    AutoApprove,
    ManualReview,
    AutoDecline,
}

impl RulesOutcome {
    pub const fn label(self) -> &'static str {
        match self {
            RulesOutcome::AutoApprove => "auto_approve",
            RulesOutcome::ManualReview => "manual_review",
            RulesOutcome::AutoDecline => "auto_decline",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RulesConfig {
    /// Minimum score for an automatic approval once no rule objects.
    pub auto_approve_score: f64,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            auto_approve_score: 700.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleInput {
    pub applicant: ApplicantData,
    /// Score used for the approval gate. Falls back to the applicant's `credit_score`.
    #[serde(default)]
    pub score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RulesOutput {
    pub outcome: RulesOutcome,
    pub results: Vec<RuleResult>,
    pub reasons: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_eligible_amount: Option<f64>,
}

/// Stateless evaluator applying a registry snapshot to one applicant.
#[derive(Debug, Clone, Default)]
pub struct RuleEvaluator {
    config: RulesConfig,
}

impl RuleEvaluator {
    pub fn new(config: RulesConfig) -> Self {
        Self { config }
    }

    /// Evaluate every active rule. All rules are recorded even after a hard failure; the
    /// outcome is decided by the worst failing severity. Disabled rules are recorded as
    /// skipped.
    pub fn evaluate(&self, input: &RuleInput, registry: &RuleRegistry) -> RulesOutput {
        let mut results = Vec::with_capacity(registry.len());
        let mut suggested_rate = None;
        let mut max_eligible_amount = None;

        for rule in registry.rules() {
            if !rule.is_active() {
                results.push(disabled(rule));
                continue;
            }
            let verdict = evaluate_rule(rule, &input.applicant);
            debug!(rule_id = %rule.id, status = %verdict.result.status, "rule evaluated");
            suggested_rate = suggested_rate.or(verdict.suggested_rate);
            max_eligible_amount = max_eligible_amount.or(verdict.max_eligible_amount);
            results.push(verdict.result);
        }

        let reasons = results
            .iter()
            .filter(|result| result.failed())
            .map(|result| result.message.clone())
            .collect();

        let worst = results
            .iter()
            .filter(|result| result.failed())
            .map(|result| result.severity)
            .max();

        let score = input
            .score
            .or_else(|| input.applicant.number("credit_score"));

        let outcome = match worst {
            Some(Severity::Hard) => RulesOutcome::AutoDecline,
            Some(Severity::Refer) => RulesOutcome::ManualReview,
            Some(Severity::Soft) => RulesOutcome::ManualReview,
            None => match score {
                Some(score) if score >= self.config.auto_approve_score => RulesOutcome::AutoApprove,
                _ => RulesOutcome::ManualReview,
            },
        };

        RulesOutput {
            outcome,
            results,
            reasons,
            suggested_rate,
            max_eligible_amount,
        }
    }
}

fn disabled(rule: &Rule) -> RuleResult {
    RuleResult {
        rule_id: rule.id.clone(),
        rule_name: rule.name.clone(),
        field: rule.field.clone(),
        status: RuleStatus::Skipped,
        severity: rule.severity,
        outcome: rule.outcome,
        actual: None,
        message: format!("{}: disabled, skipped", rule.name),
    }
}

pub(crate) struct RuleVerdict {
    pub(crate) result: RuleResult,
    pub(crate) suggested_rate: Option<f64>,
    pub(crate) max_eligible_amount: Option<f64>,
}

/// Evaluate a single rule against the applicant.
pub(crate) fn evaluate_rule(rule: &Rule, applicant: &ApplicantData) -> RuleVerdict {
    let actual = applicant.resolve(&rule.field);
    let mut verdict = RuleVerdict {
        result: RuleResult {
            rule_id: rule.id.clone(),
            rule_name: rule.name.clone(),
            field: rule.field.clone(),
            status: RuleStatus::Skipped,
            severity: rule.severity,
            outcome: rule.outcome,
            actual: actual.clone(),
            message: format!("{}: {} not available, skipped", rule.name, rule.field),
        },
        suggested_rate: None,
        max_eligible_amount: None,
    };

    let Some(actual) = actual else {
        return verdict;
    };

    match &rule.check {
        RuleCheck::Comparison => {
            let Some(matched) = compare(&actual, &rule.operator, &rule.threshold) else {
                verdict.result.message = format!(
                    "{}: {} value '{}' not comparable with {}, skipped",
                    rule.name, rule.field, actual, rule.threshold
                );
                return verdict;
            };
            // Built-in rules state what is acceptable; custom rules state what blocks.
            let passed = if rule.is_custom { !matched } else { matched };
            verdict.result.status = status_of(passed);
            verdict.result.message = if passed {
                format!("{}: {} {} passed", rule.name, rule.field, actual)
            } else if rule.is_custom {
                format!(
                    "{}: {} {} triggered ({} {})",
                    rule.name, rule.field, actual, rule.operator, rule.threshold
                )
            } else {
                format!(
                    "{}: {} {} fails requirement {} {}",
                    rule.name, rule.field, actual, rule.operator, rule.threshold
                )
            };
        }
        RuleCheck::ScoreBand => {
            let (Some(value), Some(bands)) = (actual.as_number(), rule.threshold.bands()) else {
                verdict.result.message = format!("{}: no usable score bands, skipped", rule.name);
                return verdict;
            };
            match bands.iter().find(|band| band.contains(value)) {
                Some(band) => {
                    verdict.result.status = RuleStatus::Passed;
                    verdict.result.message = format!(
                        "{}: {} {} priced at {:.2}%",
                        rule.name, rule.field, value, band.rate
                    );
                    verdict.suggested_rate = Some(band.rate);
                }
                None => {
                    verdict.result.status = RuleStatus::Failed;
                    verdict.result.message =
                        format!("{}: {} {} outside all pricing bands", rule.name, rule.field, value);
                }
            }
        }
        RuleCheck::IncomeMultiple => {
            let (Some(amount), Some(income), Some(multiple)) = (
                actual.as_number(),
                applicant.number("monthly_income"),
                rule.threshold.as_number(),
            ) else {
                verdict.result.message =
                    format!("{}: loan amount or monthly income unavailable, skipped", rule.name);
                return verdict;
            };
            let max_eligible = income * multiple;
            let passed = amount <= max_eligible;
            verdict.max_eligible_amount = Some(max_eligible);
            verdict.result.status = status_of(passed);
            verdict.result.message = if passed {
                format!("{}: {} within eligible {:.2}", rule.name, amount, max_eligible)
            } else {
                format!("{}: {} exceeds eligible {:.2}", rule.name, amount, max_eligible)
            };
        }
        RuleCheck::Unsupported(kind) => {
            verdict.result.status = RuleStatus::NotEvaluated;
            verdict.result.message = format!("{}: rule kind '{}' not evaluated", rule.name, kind);
            warn!(rule_id = %rule.id, kind = %kind, "unsupported rule kind");
        }
    }

    verdict
}

fn status_of(passed: bool) -> RuleStatus {
    if passed {
        RuleStatus::Passed
    } else {
        RuleStatus::Failed
    }
}
