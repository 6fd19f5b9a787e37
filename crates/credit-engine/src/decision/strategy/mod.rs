//! Strategy configuration and the traced decision pipeline built on top of it.

mod executor;
mod terms;

pub use executor::{
    StrategyExecutor, STEP_CONCENTRATION, STEP_DATA_SUFFICIENCY, STEP_KNOCKOUT, STEP_MODE,
    STEP_OUTPUT, STEP_OVERLAYS, STEP_RULES, STEP_SCORECARD, STEP_SCORE_DECISION, STEP_TERMS,
    STEP_WEIGHTED,
};

use std::fmt;

use serde::{Deserialize, Serialize};

use super::applicant::{ApplicantData, FieldValue};
use super::rules::{compare, Operator, RuleRegistry, RulesConfig, Threshold};
use super::scorecard::Scorecard;

/// Pipeline shape a strategy runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EvaluationMode {
    /// Registry evaluation only.
    Sequential,
    /// Knock-outs, scorecard, overlays, concentration and terms.
    #[default]
    DualPath,
    /// Weighted sum over every strategy rule.
    Scoring,
    /// Knock-outs as a hard stop, then weighted overlays plus a scorecard bonus.
    Hybrid,
    Unknown(String),
}

impl EvaluationMode {
    pub fn label(&self) -> &str {
        match self {
            EvaluationMode::Sequential => "sequential",
            EvaluationMode::DualPath => "dual_path",
            EvaluationMode::Scoring => "scoring",
            EvaluationMode::Hybrid => "hybrid",
            EvaluationMode::Unknown(raw) => raw,
        }
    }
}

impl From<String> for EvaluationMode {
    fn from(raw: String) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "sequential" => EvaluationMode::Sequential,
            "dual_path" | "dual-path" => EvaluationMode::DualPath,
            "scoring" => EvaluationMode::Scoring,
            "hybrid" => EvaluationMode::Hybrid,
            _ => EvaluationMode::Unknown(raw),
        }
    }
}

impl From<EvaluationMode> for String {
    fn from(mode: EvaluationMode) -> Self {
        mode.label().to_string()
    }
}

/// What an overlay rule does when it fires.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlayAction {
    Decline,
    #[default]
    Refer,
    /// Restores a referred application to approve when the condition holds.
    Upgrade,
}

/// Rule attached to a strategy. The condition states what is acceptable: a knock-out or
/// decline/refer overlay fails when it does not hold, an upgrade overlay fires when it does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyRule {
    pub id: String,
    pub name: String,
    pub field: String,
    pub operator: Operator,
    pub threshold: Threshold,
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default)]
    pub action: OverlayAction,
}

fn default_weight() -> f64 {
    1.0
}

impl StrategyRule {
    pub fn new(id: &str, name: &str, field: &str, operator: Operator, threshold: Threshold) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            field: field.to_string(),
            operator,
            threshold,
            weight: 1.0,
            action: OverlayAction::Refer,
        }
    }

    pub fn with_action(mut self, action: OverlayAction) -> Self {
        self.action = action;
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    /// `None` when the field is missing or not comparable.
    pub fn holds(&self, applicant: &ApplicantData) -> Option<bool> {
        let actual = applicant.resolve(&self.field)?;
        compare(&actual, &self.operator, &self.threshold)
    }
}

/// Term-sheet condition attached to a score band, e.g. a guarantor above some amount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandCondition {
    pub field: String,
    pub operator: Operator,
    pub threshold: Threshold,
    pub requirement: String,
}

/// Pricing tier selected by scorecard score, half-open `[min_score, max_score)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBand {
    pub tier: String,
    pub min_score: f64,
    pub max_score: f64,
    pub interest_rate: f64,
    #[serde(default)]
    pub down_payment_pct: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tenure_months: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_amount: Option<f64>,
    #[serde(default)]
    pub conditions: Vec<BandCondition>,
}

impl ScoreBand {
    pub fn contains(&self, score: f64) -> bool {
        score >= self.min_score && score < self.max_score
    }
}

/// Portfolio exposure cap for one dimension, keyed by the applicant field naming the segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConcentrationLimit {
    pub dimension: String,
    pub field: String,
    pub limit: f64,
}

/// Current outstanding exposure for one segment of a dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExposureSnapshot {
    pub dimension: String,
    pub segment: String,
    pub current_exposure: f64,
}

/// Classification cut-offs for the weighted modes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cutoffs {
    pub approve: f64,
    pub refer: f64,
}

impl Default for Cutoffs {
    fn default() -> Self {
        Self {
            approve: 1.0,
            refer: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub mode: EvaluationMode,
    #[serde(default)]
    pub knockout_rules: Vec<StrategyRule>,
    #[serde(default)]
    pub overlay_rules: Vec<StrategyRule>,
    /// Fields that must be present before the scorecard runs.
    #[serde(default)]
    pub data_requirements: Vec<String>,
    #[serde(default)]
    pub score_bands: Vec<ScoreBand>,
    #[serde(default)]
    pub concentration_limits: Vec<ConcentrationLimit>,
    #[serde(default)]
    pub cutoffs: Cutoffs,
    /// Overrides the engine-wide rule evaluator settings for sequential mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules_config: Option<RulesConfig>,
}

impl StrategyConfig {
    pub fn new(id: &str, name: &str, mode: EvaluationMode) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            mode,
            knockout_rules: Vec::new(),
            overlay_rules: Vec::new(),
            data_requirements: Vec::new(),
            score_bands: Vec::new(),
            concentration_limits: Vec::new(),
            cutoffs: Cutoffs::default(),
            rules_config: None,
        }
    }
}

/// Caller-supplied routing overrides applied at terms assignment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoutingParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_approved_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force_tier: Option<String>,
    #[serde(default)]
    pub block_auto_approve: bool,
}

/// Everything one evaluation reads. All of it is resolved before the call.
#[derive(Debug, Clone, Copy)]
pub struct DecisionContext<'a> {
    pub applicant: &'a ApplicantData,
    pub registry: &'a RuleRegistry,
    pub scorecard: Option<&'a Scorecard>,
    pub routing: &'a RoutingParams,
    pub exposures: &'a [ExposureSnapshot],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyOutcome {
    Approve,
    Decline,
    Refer,
}

impl StrategyOutcome {
    pub const fn label(self) -> &'static str {
        match self {
            StrategyOutcome::Approve => "approve",
            StrategyOutcome::Decline => "decline",
            StrategyOutcome::Refer => "refer",
        }
    }
}

impl fmt::Display for StrategyOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeDetail {
    ApprovedStandard,
    ApprovedReduced,
    ApprovedWithConditions,
    Referred,
    Declined,
    NotEvaluated,
}

/// Outcome recorded on a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    Pass,
    Approve,
    Refer,
    Decline,
    Skipped,
    NotEvaluated,
}

impl StepOutcome {
    pub const fn label(self) -> &'static str {
        match self {
            StepOutcome::Pass => "pass",
            StepOutcome::Approve => "approve",
            StepOutcome::Refer => "refer",
            StepOutcome::Decline => "decline",
            StepOutcome::Skipped => "skipped",
            StepOutcome::NotEvaluated => "not_evaluated",
        }
    }
}

impl From<StrategyOutcome> for StepOutcome {
    fn from(outcome: StrategyOutcome) -> Self {
        match outcome {
            StrategyOutcome::Approve => StepOutcome::Approve,
            StrategyOutcome::Decline => StepOutcome::Decline,
            StrategyOutcome::Refer => StepOutcome::Refer,
        }
    }
}

/// Append-only audit record of one pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationStep {
    pub step_number: u32,
    pub name: String,
    pub outcome: StepOutcome,
    pub detail: String,
    #[serde(default)]
    pub rules_fired: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermsAssignment {
    pub requested_amount: f64,
    pub approved_amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interest_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub down_payment_pct: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tenure_months: Option<u32>,
    #[serde(default)]
    pub conditions: Vec<String>,
}

impl TermsAssignment {
    /// Conditions win over a reduced amount.
    pub fn detail(&self) -> OutcomeDetail {
        if !self.conditions.is_empty() {
            OutcomeDetail::ApprovedWithConditions
        } else if self.approved_amount < self.requested_amount {
            OutcomeDetail::ApprovedReduced
        } else {
            OutcomeDetail::ApprovedStandard
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyResult {
    pub strategy_id: String,
    pub mode: EvaluationMode,
    pub outcome: StrategyOutcome,
    pub outcome_detail: OutcomeDetail,
    pub reason_codes: Vec<String>,
    pub reasons: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terms: Option<TermsAssignment>,
    pub steps: Vec<EvaluationStep>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scorecard_score: Option<f64>,
    /// Weighted total in scoring and hybrid modes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weighted_score: Option<f64>,
}

impl StrategyResult {
    pub fn step(&self, name: &str) -> Option<&EvaluationStep> {
        self.steps.iter().find(|step| step.name == name)
    }

    pub fn summary(&self) -> String {
        match (&self.terms, self.reasons.is_empty()) {
            (Some(terms), _) => format!(
                "{} ({:?}) for {:.2}",
                self.outcome, self.outcome_detail, terms.approved_amount
            ),
            (None, true) => self.outcome.label().to_string(),
            (None, false) => format!("{}: {}", self.outcome, self.reasons.join("; ")),
        }
    }
}

pub(crate) fn requested_amount(applicant: &ApplicantData) -> f64 {
    applicant
        .get("loan_amount")
        .and_then(FieldValue::as_number)
        .unwrap_or(0.0)
}
