use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use axum::response::Response;
use serde_json::Value;

use crate::config::EngineConfig;
use crate::decision::applicant::ApplicantData;
use crate::decision::repository::{
    DecisionConfigStore, DecisionJournal, DecisionRecord, RepositoryError,
};
use crate::decision::rules::{Operator, RuleOverride, RuleRegistry, Threshold};
use crate::decision::scorecard::{Bin, Characteristic, Scorecard, ScorecardStatus};
use crate::decision::service::{CreditDecisionService, DecisionRequest};
use crate::decision::strategy::{
    BandCondition, DecisionContext, EvaluationMode, ExposureSnapshot, OverlayAction,
    RoutingParams, ScoreBand, StrategyConfig, StrategyRule,
};

/// Base 536 retail card: age, occupation and payment channel.
pub(super) fn canonical_scorecard() -> Scorecard {
    Scorecard {
        id: "retail-v1".to_string(),
        name: "Retail Personal Loan".to_string(),
        version: 1,
        base_score: 536.0,
        min_score: 300.0,
        max_score: 850.0,
        auto_approve_threshold: Some(650.0),
        manual_review_threshold: Some(480.0),
        auto_decline_threshold: None,
        traffic_pct: 80.0,
        status: ScorecardStatus::Champion,
        characteristics: vec![
            Characteristic::new("AGE", "Age", "age")
                .with_bin(Bin::range("18-34", Some(18.0), Some(35.0), -16.0))
                .with_bin(Bin::range("35+", Some(35.0), None, 12.0))
                .with_bin(Bin::fallback("Missing", 0.0)),
            Characteristic::new("OCC", "Occupation", "occupation")
                .with_bin(Bin::category("Professional", "Professional", 47.0))
                .with_bin(Bin::category("Self-Employed", "Self-Employed", 20.0))
                .with_bin(Bin::fallback("Other", -10.0)),
            Characteristic::new("PAY", "Payment Channel", "payment_channel")
                .with_bin(Bin::category("Payroll", "Payroll", 39.0))
                .with_bin(Bin::category("Over the Counter", "Over the Counter", 5.0))
                .with_bin(Bin::fallback("Unknown", 0.0)),
        ],
    }
}

pub(super) fn canonical_applicant() -> ApplicantData {
    ApplicantData::new()
        .with("age", 30.0)
        .with("occupation", "Professional")
        .with("payment_channel", "Payroll")
}

/// Applicant that passes every built-in rule.
pub(super) fn clean_applicant() -> ApplicantData {
    ApplicantData::new()
        .with("age", 35.0)
        .with("term_months", 24.0)
        .with("monthly_income", 60_000.0)
        .with("years_employed", 5.0)
        .with("monthly_obligations", 5_000.0)
        .with("proposed_installment", 6_000.0)
        .with("credit_score", 720.0)
        .with("max_dpd", 0.0)
        .with("has_written_off_accounts", false)
        .with("bankruptcy_flag", false)
        .with("is_blacklisted", false)
        .with("watchlist_hit", false)
        .with("loan_amount", 200_000.0)
        .with("employment_type", "regular")
        .with("residency_status", "citizen")
        .with("active_loans", 1.0)
        .with("inquiries_6m", 2.0)
        .with("occupation", "Professional")
        .with("payment_channel", "Payroll")
        .with("region", "NCR")
}

pub(super) fn dual_path_strategy() -> StrategyConfig {
    let mut strategy = StrategyConfig::new("retail-dual", "Retail dual path", EvaluationMode::DualPath);
    strategy.knockout_rules = vec![StrategyRule::new(
        "K01",
        "Adult applicant",
        "age",
        Operator::Gte,
        Threshold::Number(18.0),
    )];
    strategy.overlay_rules = vec![
        StrategyRule::new(
            "O01",
            "Recent inquiries",
            "inquiries_6m",
            Operator::Lte,
            Threshold::Number(4.0),
        ),
        StrategyRule::new(
            "O02",
            "Long tenure upgrade",
            "years_employed",
            Operator::Gte,
            Threshold::Number(10.0),
        )
        .with_action(OverlayAction::Upgrade),
    ];
    strategy.data_requirements = vec!["occupation".to_string(), "payment_channel".to_string()];
    strategy.score_bands = vec![
        ScoreBand {
            tier: "B".to_string(),
            min_score: 600.0,
            max_score: 700.0,
            interest_rate: 18.0,
            down_payment_pct: 10.0,
            max_tenure_months: Some(36),
            max_amount: Some(150_000.0),
            conditions: Vec::new(),
        },
        ScoreBand {
            tier: "A".to_string(),
            min_score: 700.0,
            max_score: 851.0,
            interest_rate: 12.0,
            down_payment_pct: 0.0,
            max_tenure_months: Some(60),
            max_amount: None,
            conditions: vec![BandCondition {
                field: "loan_amount".to_string(),
                operator: Operator::Gt,
                threshold: Threshold::Number(500_000.0),
                requirement: "co-maker required".to_string(),
            }],
        },
    ];
    strategy
}

/// Canonical card with a higher base so clean applicants auto-approve.
pub(super) fn approving_scorecard() -> Scorecard {
    let mut scorecard = canonical_scorecard();
    scorecard.base_score = 600.0;
    scorecard
}

pub(super) fn context<'a>(
    applicant: &'a ApplicantData,
    registry: &'a RuleRegistry,
    scorecard: Option<&'a Scorecard>,
    routing: &'a RoutingParams,
    exposures: &'a [ExposureSnapshot],
) -> DecisionContext<'a> {
    DecisionContext {
        applicant,
        registry,
        scorecard,
        routing,
        exposures,
    }
}

#[derive(Default)]
pub(super) struct MemoryStore {
    pub(super) strategies: Vec<StrategyConfig>,
    pub(super) overrides: BTreeMap<String, RuleOverride>,
    pub(super) scorecards: Vec<Scorecard>,
    pub(super) exposures: Vec<ExposureSnapshot>,
}

impl DecisionConfigStore for MemoryStore {
    fn strategy(&self, strategy_id: &str) -> Result<Option<StrategyConfig>, RepositoryError> {
        Ok(self
            .strategies
            .iter()
            .find(|strategy| strategy.id == strategy_id)
            .cloned())
    }

    fn rule_overrides(&self) -> Result<BTreeMap<String, RuleOverride>, RepositoryError> {
        Ok(self.overrides.clone())
    }

    fn scorecards(&self) -> Result<Vec<Scorecard>, RepositoryError> {
        Ok(self.scorecards.clone())
    }

    fn exposures(&self) -> Result<Vec<ExposureSnapshot>, RepositoryError> {
        Ok(self.exposures.clone())
    }
}

#[derive(Default)]
pub(super) struct MemoryJournal {
    records: Mutex<BTreeMap<String, DecisionRecord>>,
}

impl MemoryJournal {
    pub(super) fn len(&self) -> usize {
        self.records.lock().expect("journal mutex poisoned").len()
    }
}

impl DecisionJournal for MemoryJournal {
    fn append(&self, record: DecisionRecord) -> Result<DecisionRecord, RepositoryError> {
        let mut records = self.records.lock().expect("journal mutex poisoned");
        if records.contains_key(&record.application_id) {
            return Err(RepositoryError::Conflict);
        }
        records.insert(record.application_id.clone(), record.clone());
        Ok(record)
    }

    fn fetch(&self, application_id: &str) -> Result<Option<DecisionRecord>, RepositoryError> {
        Ok(self
            .records
            .lock()
            .expect("journal mutex poisoned")
            .get(application_id)
            .cloned())
    }
}

pub(super) struct UnavailableJournal;

impl DecisionJournal for UnavailableJournal {
    fn append(&self, _record: DecisionRecord) -> Result<DecisionRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("journal offline".to_string()))
    }

    fn fetch(&self, _application_id: &str) -> Result<Option<DecisionRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("journal offline".to_string()))
    }
}

pub(super) fn store() -> MemoryStore {
    MemoryStore {
        strategies: vec![dual_path_strategy()],
        scorecards: vec![approving_scorecard()],
        ..MemoryStore::default()
    }
}

pub(super) fn seeded_config() -> EngineConfig {
    EngineConfig {
        router_seed: Some(99),
        ..EngineConfig::default()
    }
}

pub(super) fn build_service() -> (
    CreditDecisionService<MemoryStore, MemoryJournal>,
    Arc<MemoryJournal>,
) {
    let journal = Arc::new(MemoryJournal::default());
    let service = CreditDecisionService::new(Arc::new(store()), journal.clone(), &seeded_config());
    (service, journal)
}

pub(super) fn request(application_id: &str) -> DecisionRequest {
    DecisionRequest {
        application_id: application_id.to_string(),
        strategy_id: "retail-dual".to_string(),
        applicant: clean_applicant(),
        routing: RoutingParams::default(),
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
