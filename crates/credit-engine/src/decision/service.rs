use std::sync::Arc;

use axum::http::StatusCode;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::applicant::ApplicantData;
use super::champion::route;
use super::repository::{DecisionConfigStore, DecisionJournal, DecisionRecord, RepositoryError};
use super::rules::RuleRegistry;
use super::scorecard::ScoringEngine;
use super::strategy::{DecisionContext, RoutingParams, StrategyExecutor};
use crate::config::EngineConfig;

/// One application submitted for a decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRequest {
    pub application_id: String,
    pub strategy_id: String,
    pub applicant: ApplicantData,
    #[serde(default)]
    pub routing: RoutingParams,
}

/// Service composing the config store, the journal and the engine.
pub struct CreditDecisionService<S, J> {
    store: Arc<S>,
    journal: Arc<J>,
    executor: StrategyExecutor,
    scoring: ScoringEngine,
    router_seed: Option<u64>,
}

impl<S, J> CreditDecisionService<S, J>
where
    S: DecisionConfigStore + 'static,
    J: DecisionJournal + 'static,
{
    pub fn new(store: Arc<S>, journal: Arc<J>, config: &EngineConfig) -> Self {
        let scoring = ScoringEngine::new(config.max_reason_codes);
        Self {
            store,
            journal,
            executor: StrategyExecutor::new(config.rules_config(), scoring.clone()),
            scoring,
            router_seed: config.router_seed,
        }
    }

    /// Decide an application and journal the outcome.
    ///
    /// Configuration is read once up front; the evaluation itself works on that snapshot.
    pub fn decide(&self, request: DecisionRequest) -> Result<DecisionRecord, DecisionServiceError> {
        let strategy = self
            .store
            .strategy(&request.strategy_id)?
            .ok_or_else(|| DecisionServiceError::UnknownStrategy(request.strategy_id.clone()))?;
        let registry = RuleRegistry::builtin().with_overrides(&self.store.rule_overrides()?);
        let scorecards = self.store.scorecards()?;
        let exposures = self.store.exposures()?;

        let mut rng = self.rng_for(&request.application_id);
        let routing = route(&scorecards, &request.applicant, &self.scoring, &mut rng);
        let decisioning = routing
            .decisioning_id
            .as_deref()
            .and_then(|id| scorecards.iter().find(|scorecard| scorecard.id == id));

        let result = self.executor.execute(
            &strategy,
            &DecisionContext {
                applicant: &request.applicant,
                registry: &registry,
                scorecard: decisioning,
                routing: &request.routing,
                exposures: &exposures,
            },
        );

        info!(
            application_id = %request.application_id,
            strategy_id = %strategy.id,
            outcome = result.outcome.label(),
            "application decided"
        );

        let record = DecisionRecord {
            application_id: request.application_id,
            strategy_id: strategy.id,
            decisioning_scorecard: routing.decisioning_id,
            result,
            model_scores: routing.model_scores,
        };
        Ok(self.journal.append(record)?)
    }

    pub fn get(&self, application_id: &str) -> Result<DecisionRecord, DecisionServiceError> {
        self.journal
            .fetch(application_id)?
            .ok_or(DecisionServiceError::Repository(RepositoryError::NotFound))
    }

    /// Call-scoped generator: seeded per application when a router seed is configured.
    fn rng_for(&self, application_id: &str) -> StdRng {
        match self.router_seed {
            Some(seed) => StdRng::seed_from_u64(seed ^ fnv1a(application_id)),
            None => StdRng::from_entropy(),
        }
    }
}

/// Stable across builds, unlike `DefaultHasher`.
fn fnv1a(value: &str) -> u64 {
    value.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(0x0100_0000_01b3)
    })
}

/// Error raised by the decision service.
#[derive(Debug, thiserror::Error)]
pub enum DecisionServiceError {
    #[error("unknown strategy '{0}'")]
    UnknownStrategy(String),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl DecisionServiceError {
    /// HTTP status shared by the decision routes and `AppError`.
    pub fn status_code(&self) -> StatusCode {
        match self {
            DecisionServiceError::UnknownStrategy(_)
            | DecisionServiceError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
            DecisionServiceError::Repository(RepositoryError::Conflict) => StatusCode::CONFLICT,
            DecisionServiceError::Repository(RepositoryError::Unavailable(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}
