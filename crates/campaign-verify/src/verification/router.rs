use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde_json::json;

use super::domain::{SubmissionId, VerificationId};
use super::engine::{VerificationError, WorkflowEngine};
use super::repository::{ProgressStore, ReportStore, SubmissionStore};

/// Router builder exposing the verification status API.
pub fn verification_router<P, S, R>(engine: Arc<WorkflowEngine<P, S, R>>) -> Router
where
    P: ProgressStore + 'static,
    S: SubmissionStore + 'static,
    R: ReportStore + 'static,
{
    Router::new()
        .route(
            "/api/v1/submissions/:submission_id/verifications",
            post(start_handler::<P, S, R>),
        )
        .route(
            "/api/v1/submissions/:submission_id/report",
            get(report_handler::<P, S, R>),
        )
        .route(
            "/api/v1/verifications/:verification_id",
            get(status_handler::<P, S, R>),
        )
        .route(
            "/api/v1/verifications/:verification_id/cancel",
            post(cancel_handler::<P, S, R>),
        )
        .with_state(engine)
}

pub(crate) async fn start_handler<P, S, R>(
    State(engine): State<Arc<WorkflowEngine<P, S, R>>>,
    Path(submission_id): Path<String>,
) -> Response
where
    P: ProgressStore + 'static,
    S: SubmissionStore + 'static,
    R: ReportStore + 'static,
{
    match engine.start(&SubmissionId(submission_id)).await {
        Ok(verification) => (StatusCode::ACCEPTED, axum::Json(verification)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn status_handler<P, S, R>(
    State(engine): State<Arc<WorkflowEngine<P, S, R>>>,
    Path(verification_id): Path<String>,
) -> Response
where
    P: ProgressStore + 'static,
    S: SubmissionStore + 'static,
    R: ReportStore + 'static,
{
    match engine.status(&VerificationId(verification_id)).await {
        Ok(verification) => (StatusCode::OK, axum::Json(verification)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn cancel_handler<P, S, R>(
    State(engine): State<Arc<WorkflowEngine<P, S, R>>>,
    Path(verification_id): Path<String>,
) -> Response
where
    P: ProgressStore + 'static,
    S: SubmissionStore + 'static,
    R: ReportStore + 'static,
{
    match engine.cancel(&VerificationId(verification_id)).await {
        Ok(verification) => (StatusCode::OK, axum::Json(verification)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn report_handler<P, S, R>(
    State(engine): State<Arc<WorkflowEngine<P, S, R>>>,
    Path(submission_id): Path<String>,
) -> Response
where
    P: ProgressStore + 'static,
    S: SubmissionStore + 'static,
    R: ReportStore + 'static,
{
    match engine.report(&SubmissionId(submission_id)).await {
        Ok(report) => (StatusCode::OK, axum::Json(report)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) fn error_status(error: &VerificationError) -> StatusCode {
    match error {
        VerificationError::NotFound(_) => StatusCode::NOT_FOUND,
        VerificationError::InvalidState(_) => StatusCode::CONFLICT,
        VerificationError::Planning(_) | VerificationError::Persistence(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn error_response(error: VerificationError) -> Response {
    let payload = json!({
        "error": error.to_string(),
    });
    (error_status(&error), axum::Json(payload)).into_response()
}
