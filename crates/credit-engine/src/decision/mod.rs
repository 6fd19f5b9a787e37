//! Credit decisioning: applicant data in, traced approve/decline/refer out.
//!
//! Every evaluation works on snapshots handed in by the caller (rule registry, scorecards,
//! exposures) and owns its output. The only randomness is the champion/challenger draw,
//! which always comes from a generator supplied by the caller.

pub mod applicant;
pub mod champion;
pub mod performance;
pub mod repository;
pub mod router;
pub mod rules;
pub mod scorecard;
pub mod service;
pub mod strategy;

#[cfg(test)]
mod tests;

pub use applicant::{ApplicantData, FieldValue};
pub use champion::{route, select, ModelScore, RoutingOutcome};
pub use performance::{
    band_distribution, gini, iv, ks, psi, BandStats, DriftStatus, PerformanceError,
    PerformanceReport, PredictiveStrength,
};
pub use repository::{
    DecisionConfigStore, DecisionJournal, DecisionRecord, DecisionStatusView, RepositoryError,
};
pub use router::decision_router;
pub use rules::{
    Operator, Rule, RuleEvaluator, RuleInput, RuleOverride, RuleRegistry, RuleResult,
    RuleStatus, RulesConfig, RulesOutcome, RulesOutput, Severity, Threshold,
};
pub use scorecard::{
    generate_script, parse_script, Bin, Characteristic, ScoreDecision, ScoreResult, Scorecard,
    ScorecardStatus, ScoringEngine, TabularScorecardImporter,
};
pub use service::{CreditDecisionService, DecisionRequest, DecisionServiceError};
pub use strategy::{
    DecisionContext, EvaluationMode, EvaluationStep, OutcomeDetail, RoutingParams,
    StrategyConfig, StrategyExecutor, StrategyOutcome, StrategyResult, TermsAssignment,
};
