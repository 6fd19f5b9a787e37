//! End-to-end decisioning through the public service facade and HTTP router: strategy
//! lookup, champion/challenger routing, the traced pipeline and the decision journal.

mod common {
    use std::collections::{BTreeMap, HashMap};
    use std::sync::{Arc, Mutex};

    use credit_engine::config::EngineConfig;
    use credit_engine::decision::rules::{Operator, RuleOverride, Threshold};
    use credit_engine::decision::scorecard::{Bin, Characteristic};
    use credit_engine::decision::strategy::{ExposureSnapshot, ScoreBand, StrategyRule};
    use credit_engine::decision::{
        ApplicantData, CreditDecisionService, DecisionConfigStore, DecisionJournal,
        DecisionRecord, DecisionRequest, EvaluationMode, RepositoryError, RoutingParams,
        Scorecard, ScorecardStatus, StrategyConfig,
    };

    pub(super) fn champion() -> Scorecard {
        Scorecard {
            id: "auto-v4".to_string(),
            name: "Auto Loan".to_string(),
            version: 4,
            base_score: 600.0,
            min_score: 300.0,
            max_score: 850.0,
            auto_approve_threshold: Some(660.0),
            manual_review_threshold: Some(560.0),
            auto_decline_threshold: None,
            traffic_pct: 90.0,
            status: ScorecardStatus::Champion,
            characteristics: vec![
                Characteristic::new("INC", "Monthly income", "monthly_income")
                    .with_bin(Bin::range("< 30000", None, Some(30_000.0), -40.0))
                    .with_bin(Bin::range("30000+", Some(30_000.0), None, 45.0))
                    .with_bin(Bin::fallback("Missing", -20.0)),
                Characteristic::new("EMP", "Employment type", "employment_type")
                    .with_bin(Bin::category("Regular", "regular", 30.0))
                    .with_bin(Bin::fallback("Other", -15.0)),
            ],
        }
    }

    pub(super) fn shadow() -> Scorecard {
        Scorecard {
            id: "auto-v5".to_string(),
            status: ScorecardStatus::Shadow,
            traffic_pct: 0.0,
            base_score: 610.0,
            ..champion()
        }
    }

    pub(super) fn strategy() -> StrategyConfig {
        let mut strategy = StrategyConfig::new("auto-dual", "Auto dual path", EvaluationMode::DualPath);
        strategy.knockout_rules = vec![StrategyRule::new(
            "K01",
            "Adult applicant",
            "age",
            Operator::Gte,
            Threshold::Number(18.0),
        )];
        strategy.data_requirements = vec!["monthly_income".to_string()];
        strategy.score_bands = vec![ScoreBand {
            tier: "PRIME".to_string(),
            min_score: 600.0,
            max_score: 851.0,
            interest_rate: 9.5,
            down_payment_pct: 20.0,
            max_tenure_months: Some(60),
            max_amount: Some(1_000_000.0),
            conditions: Vec::new(),
        }];
        strategy
    }

    pub(super) fn applicant() -> ApplicantData {
        ApplicantData::new()
            .with("age", 42.0)
            .with("term_months", 36.0)
            .with("monthly_income", 85_000.0)
            .with("years_employed", 8.0)
            .with("monthly_obligations", 10_000.0)
            .with("proposed_installment", 15_000.0)
            .with("credit_score", 740.0)
            .with("max_dpd", 0.0)
            .with("has_written_off_accounts", false)
            .with("bankruptcy_flag", false)
            .with("is_blacklisted", false)
            .with("watchlist_hit", false)
            .with("loan_amount", 650_000.0)
            .with("employment_type", "regular")
            .with("residency_status", "citizen")
            .with("active_loans", 0.0)
            .with("inquiries_6m", 1.0)
    }

    #[derive(Default)]
    pub(super) struct Store {
        pub(super) overrides: BTreeMap<String, RuleOverride>,
        pub(super) exposures: Vec<ExposureSnapshot>,
    }

    impl DecisionConfigStore for Store {
        fn strategy(&self, strategy_id: &str) -> Result<Option<StrategyConfig>, RepositoryError> {
            Ok((strategy_id == "auto-dual").then(strategy))
        }

        fn rule_overrides(&self) -> Result<BTreeMap<String, RuleOverride>, RepositoryError> {
            Ok(self.overrides.clone())
        }

        fn scorecards(&self) -> Result<Vec<Scorecard>, RepositoryError> {
            Ok(vec![champion(), shadow()])
        }

        fn exposures(&self) -> Result<Vec<ExposureSnapshot>, RepositoryError> {
            Ok(self.exposures.clone())
        }
    }

    #[derive(Default, Clone)]
    pub(super) struct Journal {
        records: Arc<Mutex<HashMap<String, DecisionRecord>>>,
    }

    impl DecisionJournal for Journal {
        fn append(&self, record: DecisionRecord) -> Result<DecisionRecord, RepositoryError> {
            let mut guard = self.records.lock().expect("lock");
            if guard.contains_key(&record.application_id) {
                return Err(RepositoryError::Conflict);
            }
            guard.insert(record.application_id.clone(), record.clone());
            Ok(record)
        }

        fn fetch(&self, application_id: &str) -> Result<Option<DecisionRecord>, RepositoryError> {
            Ok(self.records.lock().expect("lock").get(application_id).cloned())
        }
    }

    pub(super) fn build_service(store: Store) -> CreditDecisionService<Store, Journal> {
        let config = EngineConfig {
            router_seed: Some(7),
            ..EngineConfig::default()
        };
        CreditDecisionService::new(Arc::new(store), Arc::new(Journal::default()), &config)
    }

    pub(super) fn request(application_id: &str) -> DecisionRequest {
        DecisionRequest {
            application_id: application_id.to_string(),
            strategy_id: "auto-dual".to_string(),
            applicant: applicant(),
            routing: RoutingParams::default(),
        }
    }
}

mod pipeline {
    use std::collections::BTreeMap;

    use super::common::*;
    use credit_engine::decision::rules::{RuleOutcome, RuleOverride};
    use credit_engine::decision::{OutcomeDetail, RoutingParams, StrategyOutcome};

    #[test]
    fn prime_applicant_is_approved_with_band_pricing() {
        let service = build_service(Store::default());

        let record = service.decide(request("AUTO-1")).expect("decided");

        assert_eq!(record.result.outcome, StrategyOutcome::Approve);
        assert_eq!(record.result.outcome_detail, OutcomeDetail::ApprovedStandard);
        assert_eq!(record.result.scorecard_score, Some(675.0));
        let terms = record.result.terms.as_ref().expect("terms");
        assert_eq!(terms.tier.as_deref(), Some("PRIME"));
        assert_eq!(terms.interest_rate, Some(9.5));
        assert_eq!(terms.approved_amount, 650_000.0);
        assert_eq!(record.decisioning_scorecard.as_deref(), Some("auto-v4"));
        assert_eq!(record.model_scores.len(), 2);
    }

    #[test]
    fn routing_cap_reduces_the_approved_amount() {
        let service = build_service(Store::default());
        let mut request = request("AUTO-2");
        request.routing = RoutingParams {
            max_approved_amount: Some(500_000.0),
            ..RoutingParams::default()
        };

        let record = service.decide(request).expect("decided");

        assert_eq!(record.result.outcome_detail, OutcomeDetail::ApprovedReduced);
        assert_eq!(
            record.result.terms.map(|terms| terms.approved_amount),
            Some(500_000.0)
        );
    }

    #[test]
    fn disabled_rule_no_longer_knocks_out() {
        let blacklisted = |service: &credit_engine::decision::CreditDecisionService<Store, Journal>,
                           id: &str| {
            let mut request = request(id);
            request.applicant.insert("is_blacklisted", true);
            service.decide(request).expect("decided").result.outcome
        };

        assert_eq!(
            blacklisted(&build_service(Store::default()), "AUTO-3"),
            StrategyOutcome::Decline
        );

        let mut overrides = BTreeMap::new();
        overrides.insert(
            "R13".to_string(),
            RuleOverride {
                outcome: Some(RuleOutcome::Disable),
                ..RuleOverride::default()
            },
        );
        let relaxed = build_service(Store {
            overrides,
            ..Store::default()
        });
        assert_eq!(blacklisted(&relaxed, "AUTO-4"), StrategyOutcome::Approve);
    }

    #[test]
    fn status_view_summarizes_the_outcome() {
        let service = build_service(Store::default());
        service.decide(request("AUTO-5")).expect("decided");

        let view = service.get("AUTO-5").expect("stored").status_view();

        assert_eq!(view.outcome, "approve");
        assert_eq!(view.scorecard_score, Some(675.0));
        assert!(view.summary.starts_with("approve"));
    }
}

mod http {
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::common::*;
    use credit_engine::decision::decision_router;

    async fn read_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), 64 * 1024)
            .await
            .expect("body");
        serde_json::from_slice(&bytes).expect("json")
    }

    #[tokio::test]
    async fn decision_round_trips_over_http() {
        let app = decision_router(Arc::new(build_service(Store::default())));
        let payload = json!({
            "application_id": "AUTO-HTTP",
            "strategy_id": "auto-dual",
            "applicant": applicant(),
            "routing": { "force_tier": "prime" }
        });

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/decisions")
                    .header("content-type", "application/json")
                    .body(Body::from(payload.to_string()))
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/decisions/AUTO-HTTP")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body["result"]["terms"]["tier"], "PRIME");
        assert_eq!(body["model_scores"].as_array().map(Vec::len), Some(2));
    }

    #[tokio::test]
    async fn malformed_payload_is_rejected_by_the_extractor() {
        let app = decision_router(Arc::new(build_service(Store::default())));

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/decisions")
                    .header("content-type", "application/json")
                    .body(Body::from("{\"application_id\": 5}"))
                    .expect("request"),
            )
            .await
            .expect("response");

        assert!(response.status().is_client_error());
    }
}
