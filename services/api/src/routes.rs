use crate::infra::{sample_scorecard, AppState};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use chrono::{DateTime, Utc};
use credit_engine::decision::scorecard::{ConfigurationIssue, ScoreResult};
use credit_engine::decision::{
    decision_router, generate_script, parse_script, ApplicantData, CreditDecisionService,
    DecisionConfigStore, DecisionJournal, PerformanceReport, Scorecard, ScoringEngine,
    TabularScorecardImporter,
};
use credit_engine::error::AppError;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::io::Cursor;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub(crate) struct ScoreRequest {
    /// Scorecard to evaluate; the bundled retail card when omitted.
    #[serde(default)]
    pub(crate) scorecard: Option<Scorecard>,
    pub(crate) applicant: ApplicantData,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ScriptRequest {
    #[serde(default)]
    pub(crate) scorecard: Option<Scorecard>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ScriptResponse {
    pub(crate) scorecard_id: String,
    pub(crate) script: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ParseScriptRequest {
    pub(crate) script: String,
    /// Scorecard the parsed script is applied to.
    #[serde(default)]
    pub(crate) scorecard: Option<Scorecard>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ParseScriptResponse {
    pub(crate) valid: bool,
    pub(crate) errors: Vec<ConfigurationIssue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) scorecard: Option<Scorecard>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ImportRequest {
    pub(crate) csv: String,
    #[serde(default)]
    pub(crate) scorecard: Option<Scorecard>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ImportResponse {
    pub(crate) scorecard: Scorecard,
    pub(crate) warnings: Vec<ConfigurationIssue>,
    /// Validation findings for the merged scorecard.
    pub(crate) issues: Vec<ConfigurationIssue>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PerformanceRequest {
    pub(crate) scores: Vec<f64>,
    /// `true` marks an account that went bad.
    pub(crate) outcomes: Vec<bool>,
    #[serde(default)]
    pub(crate) band_edges: Vec<f64>,
    /// Baseline band distribution in percent, for drift.
    #[serde(default)]
    pub(crate) expected_band_pct: Vec<f64>,
}

#[derive(Debug, Serialize)]
pub(crate) struct PerformanceResponse {
    pub(crate) computed_at: DateTime<Utc>,
    pub(crate) report: PerformanceReport,
}

pub(crate) fn with_decision_routes<S, J>(
    service: Arc<CreditDecisionService<S, J>>,
) -> axum::Router
where
    S: DecisionConfigStore + 'static,
    J: DecisionJournal + 'static,
{
    decision_router(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route(
            "/api/v1/scorecards/score",
            axum::routing::post(score_endpoint),
        )
        .route(
            "/api/v1/scorecards/script",
            axum::routing::post(script_endpoint),
        )
        .route(
            "/api/v1/scorecards/script/parse",
            axum::routing::post(parse_script_endpoint),
        )
        .route(
            "/api/v1/scorecards/import",
            axum::routing::post(import_endpoint),
        )
        .route(
            "/api/v1/analytics/performance",
            axum::routing::post(performance_endpoint),
        )
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

pub(crate) async fn score_endpoint(Json(payload): Json<ScoreRequest>) -> Json<ScoreResult> {
    let scorecard = payload.scorecard.unwrap_or_else(sample_scorecard);
    Json(ScoringEngine::default().score(&scorecard, &payload.applicant))
}

pub(crate) async fn script_endpoint(Json(payload): Json<ScriptRequest>) -> Json<ScriptResponse> {
    let scorecard = payload.scorecard.unwrap_or_else(sample_scorecard);
    Json(ScriptResponse {
        script: generate_script(&scorecard),
        scorecard_id: scorecard.id,
    })
}

pub(crate) async fn parse_script_endpoint(
    Json(payload): Json<ParseScriptRequest>,
) -> impl IntoResponse {
    let base = payload.scorecard.unwrap_or_else(sample_scorecard);
    let parsed = parse_script(&payload.script);

    let (status, body) = match parsed.apply_to(&base) {
        Ok(scorecard) => (
            StatusCode::OK,
            ParseScriptResponse {
                valid: true,
                errors: Vec::new(),
                scorecard: Some(scorecard),
            },
        ),
        Err(errors) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            ParseScriptResponse {
                valid: false,
                errors,
                scorecard: None,
            },
        ),
    };
    (status, Json(body))
}

pub(crate) async fn import_endpoint(
    Json(payload): Json<ImportRequest>,
) -> Result<Json<ImportResponse>, AppError> {
    let imported = TabularScorecardImporter::from_reader(Cursor::new(payload.csv.into_bytes()))?;
    let base = payload.scorecard.unwrap_or_else(sample_scorecard);
    let scorecard = imported.apply_to(&base);
    let issues = scorecard.validate();

    Ok(Json(ImportResponse {
        scorecard,
        warnings: imported.warnings,
        issues,
    }))
}

pub(crate) async fn performance_endpoint(
    Json(payload): Json<PerformanceRequest>,
) -> Result<Json<PerformanceResponse>, AppError> {
    let report = PerformanceReport::build(
        &payload.scores,
        &payload.outcomes,
        &payload.band_edges,
        &payload.expected_band_pct,
    )?;
    Ok(Json(PerformanceResponse {
        computed_at: Utc::now(),
        report,
    }))
}
