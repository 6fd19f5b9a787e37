use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{Request, StatusCode},
};
use serde_json::{json, Value};
use tower::ServiceExt;

use super::common::*;
use crate::config::EngineConfig;
use crate::decision::router::{decision_router, decide_handler, lookup_handler};
use crate::decision::service::CreditDecisionService;

fn post_decision(payload: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/v1/decisions")
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .expect("request")
}

fn payload(application_id: &str, strategy_id: &str) -> Value {
    json!({
        "application_id": application_id,
        "strategy_id": strategy_id,
        "applicant": serde_json::to_value(clean_applicant()).expect("applicant json"),
    })
}

#[tokio::test]
async fn decision_is_created_and_retrievable() {
    let (service, _) = build_service();
    let app = decision_router(Arc::new(service));

    let response = app
        .clone()
        .oneshot(post_decision(&payload("APP-10", "retail-dual")))
        .await
        .expect("router response");
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = read_json_body(response).await;
    assert_eq!(created["result"]["outcome"], "approve");
    assert_eq!(created["result"]["outcome_detail"], "approved_reduced");
    assert_eq!(created["decisioning_scorecard"], "retail-v1");

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/decisions/APP-10")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("router response");
    assert_eq!(response.status(), StatusCode::OK);
    let fetched = read_json_body(response).await;
    assert_eq!(fetched, created);
}

#[tokio::test]
async fn unknown_strategy_is_not_found() {
    let (service, _) = build_service();

    let response = decision_router(Arc::new(service))
        .oneshot(post_decision(&payload("APP-11", "nope")))
        .await
        .expect("router response");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = read_json_body(response).await;
    assert_eq!(body["error"], "unknown strategy 'nope'");
}

#[tokio::test]
async fn duplicate_submission_conflicts() {
    let (service, _) = build_service();
    let app = decision_router(Arc::new(service));

    let first = app
        .clone()
        .oneshot(post_decision(&payload("APP-12", "retail-dual")))
        .await
        .expect("router response");
    assert_eq!(first.status(), StatusCode::CREATED);

    let second = app
        .oneshot(post_decision(&payload("APP-12", "retail-dual")))
        .await
        .expect("router response");
    assert_eq!(second.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn journal_outage_maps_to_internal_error() {
    let service = CreditDecisionService::new(
        Arc::new(store()),
        Arc::new(UnavailableJournal),
        &EngineConfig::default(),
    );

    let response = decision_router(Arc::new(service))
        .oneshot(post_decision(&payload("APP-13", "retail-dual")))
        .await
        .expect("router response");

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn lookup_handler_reports_missing_records() {
    let (service, _) = build_service();

    let response = lookup_handler(State(Arc::new(service)), Path("APP-404".to_string())).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = read_json_body(response).await;
    assert_eq!(body["application_id"], "APP-404");
    assert_eq!(body["error"], "no decision recorded");
}

#[tokio::test]
async fn decide_handler_returns_created_record() {
    let (service, journal) = build_service();

    let response = decide_handler(State(Arc::new(service)), axum::Json(request("APP-14"))).await;

    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(journal.len(), 1);
    let body = read_json_body(response).await;
    assert_eq!(body["application_id"], "APP-14");
    assert_eq!(body["result"]["steps"].as_array().map(Vec::len), Some(8));
}
