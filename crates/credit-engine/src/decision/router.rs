use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde_json::json;

use super::repository::{DecisionConfigStore, DecisionJournal, RepositoryError};
use super::service::{CreditDecisionService, DecisionRequest, DecisionServiceError};

/// Router builder exposing decision intake and lookup.
pub fn decision_router<S, J>(service: Arc<CreditDecisionService<S, J>>) -> Router
where
    S: DecisionConfigStore + 'static,
    J: DecisionJournal + 'static,
{
    Router::new()
        .route("/api/v1/decisions", post(decide_handler::<S, J>))
        .route(
            "/api/v1/decisions/:application_id",
            get(lookup_handler::<S, J>),
        )
        .with_state(service)
}

pub(crate) async fn decide_handler<S, J>(
    State(service): State<Arc<CreditDecisionService<S, J>>>,
    axum::Json(request): axum::Json<DecisionRequest>,
) -> Response
where
    S: DecisionConfigStore + 'static,
    J: DecisionJournal + 'static,
{
    match service.decide(request) {
        Ok(record) => (StatusCode::CREATED, axum::Json(record)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn lookup_handler<S, J>(
    State(service): State<Arc<CreditDecisionService<S, J>>>,
    Path(application_id): Path<String>,
) -> Response
where
    S: DecisionConfigStore + 'static,
    J: DecisionJournal + 'static,
{
    match service.get(&application_id) {
        Ok(record) => (StatusCode::OK, axum::Json(record)).into_response(),
        Err(DecisionServiceError::Repository(RepositoryError::NotFound)) => {
            let payload = json!({
                "application_id": application_id,
                "error": "no decision recorded",
            });
            (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

fn error_response(error: DecisionServiceError) -> Response {
    let status = error.status_code();
    let payload = json!({
        "error": error.to_string(),
    });
    (status, axum::Json(payload)).into_response()
}
