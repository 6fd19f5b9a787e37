use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::champion::ModelScore;
use super::rules::RuleOverride;
use super::scorecard::Scorecard;
use super::strategy::{ExposureSnapshot, StrategyConfig, StrategyResult};

/// Journal entry persisted for every decided application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub application_id: String,
    pub strategy_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decisioning_scorecard: Option<String>,
    pub result: StrategyResult,
    /// Scores from every live scorecard, decisioning or not.
    pub model_scores: Vec<ModelScore>,
}

impl DecisionRecord {
    pub fn status_view(&self) -> DecisionStatusView {
        DecisionStatusView {
            application_id: self.application_id.clone(),
            outcome: self.result.outcome.label(),
            summary: self.result.summary(),
            scorecard_score: self.result.scorecard_score,
        }
    }
}

/// Configuration the engine reads for one decision. Implementations return snapshots.
pub trait DecisionConfigStore: Send + Sync {
    fn strategy(&self, strategy_id: &str) -> Result<Option<StrategyConfig>, RepositoryError>;
    fn rule_overrides(&self) -> Result<BTreeMap<String, RuleOverride>, RepositoryError>;
    /// Scorecards in router order; non-live statuses are filtered by the router.
    fn scorecards(&self) -> Result<Vec<Scorecard>, RepositoryError>;
    fn exposures(&self) -> Result<Vec<ExposureSnapshot>, RepositoryError>;
}

/// Append-only decision storage.
pub trait DecisionJournal: Send + Sync {
    fn append(&self, record: DecisionRecord) -> Result<DecisionRecord, RepositoryError>;
    fn fetch(&self, application_id: &str) -> Result<Option<DecisionRecord>, RepositoryError>;
}

/// Error enumeration for storage failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Outward view of a stored decision.
#[derive(Debug, Clone, Serialize)]
pub struct DecisionStatusView {
    pub application_id: String,
    pub outcome: &'static str,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scorecard_score: Option<f64>,
}
