use credit_engine::decision::rules::{Operator, RuleOverride, Threshold};
use credit_engine::decision::scorecard::{Bin, Characteristic};
use credit_engine::decision::strategy::{
    ConcentrationLimit, ExposureSnapshot, OverlayAction, ScoreBand, StrategyRule,
};
use credit_engine::decision::{
    DecisionConfigStore, DecisionJournal, DecisionRecord, EvaluationMode, RepositoryError,
    Scorecard, ScorecardStatus, StrategyConfig,
};
use credit_engine::error::AppError;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Configuration snapshot served to the decision service.
#[derive(Default, Clone)]
pub(crate) struct InMemoryConfigStore {
    pub(crate) strategies: Vec<StrategyConfig>,
    pub(crate) overrides: BTreeMap<String, RuleOverride>,
    pub(crate) scorecards: Vec<Scorecard>,
    pub(crate) exposures: Vec<ExposureSnapshot>,
}

impl InMemoryConfigStore {
    pub(crate) fn sample() -> Self {
        Self {
            strategies: vec![sample_strategy()],
            overrides: BTreeMap::new(),
            scorecards: vec![sample_scorecard(), sample_challenger()],
            exposures: sample_exposures(),
        }
    }
}

impl DecisionConfigStore for InMemoryConfigStore {
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

#[derive(Default, Clone)]
pub(crate) struct InMemoryDecisionJournal {
    records: Arc<Mutex<HashMap<String, DecisionRecord>>>,
}

impl DecisionJournal for InMemoryDecisionJournal {
    fn append(&self, record: DecisionRecord) -> Result<DecisionRecord, RepositoryError> {
        let mut guard = self.records.lock().expect("journal mutex poisoned");
        if guard.contains_key(&record.application_id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(record.application_id.clone(), record.clone());
        Ok(record)
    }

    fn fetch(&self, application_id: &str) -> Result<Option<DecisionRecord>, RepositoryError> {
        let guard = self.records.lock().expect("journal mutex poisoned");
        Ok(guard.get(application_id).cloned())
    }
}

pub(crate) const SAMPLE_STRATEGY_ID: &str = "retail-dual-path";

pub(crate) fn sample_scorecard() -> Scorecard {
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

/// Income-aware challenger taking the remaining 20% of traffic.
pub(crate) fn sample_challenger() -> Scorecard {
    let mut challenger = sample_scorecard();
    challenger.id = "retail-v2".to_string();
    challenger.version = 2;
    challenger.status = ScorecardStatus::Challenger;
    challenger.traffic_pct = 20.0;
    challenger.characteristics.push(
        Characteristic::new("INC", "Monthly Income", "monthly_income")
            .with_bin(Bin::range("< 25000", None, Some(25_000.0), -12.0))
            .with_bin(Bin::range("25000-59999", Some(25_000.0), Some(60_000.0), 8.0))
            .with_bin(Bin::range("60000+", Some(60_000.0), None, 24.0))
            .with_bin(Bin::fallback("Missing", -5.0)),
    );
    challenger
}

pub(crate) fn sample_strategy() -> StrategyConfig {
    let mut strategy = StrategyConfig::new(
        SAMPLE_STRATEGY_ID,
        "Retail dual path",
        EvaluationMode::DualPath,
    );
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
            tier: "C".to_string(),
            min_score: 480.0,
            max_score: 600.0,
            interest_rate: 24.0,
            down_payment_pct: 20.0,
            max_tenure_months: Some(24),
            max_amount: Some(100_000.0),
            conditions: Vec::new(),
        },
        ScoreBand {
            tier: "B".to_string(),
            min_score: 600.0,
            max_score: 700.0,
            interest_rate: 18.0,
            down_payment_pct: 10.0,
            max_tenure_months: Some(36),
            max_amount: Some(300_000.0),
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
            conditions: Vec::new(),
        },
    ];
    strategy.concentration_limits = vec![ConcentrationLimit {
        dimension: "region".to_string(),
        field: "region".to_string(),
        limit: 50_000_000.0,
    }];
    strategy
}

fn sample_exposures() -> Vec<ExposureSnapshot> {
    vec![
        ExposureSnapshot {
            dimension: "region".to_string(),
            segment: "NCR".to_string(),
            current_exposure: 42_500_000.0,
        },
        ExposureSnapshot {
            dimension: "region".to_string(),
            segment: "Visayas".to_string(),
            current_exposure: 49_900_000.0,
        },
    ]
}

/// Read a JSON document from disk into `T`.
pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, AppError> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

/// Comma-separated numbers given on the command line, e.g. `500,600,700`.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct NumberList(pub(crate) Vec<f64>);

pub(crate) fn parse_number_list(raw: &str) -> Result<NumberList, String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            item.parse::<f64>()
                .map_err(|err| format!("failed to parse '{item}' as a number ({err})"))
        })
        .collect::<Result<Vec<_>, _>>()
        .map(NumberList)
}
