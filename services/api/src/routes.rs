use crate::infra::{AppState, VerificationStack};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use campaign_verify::error::AppError;
use campaign_verify::verification::{
    verification_router, InMemorySubmissionStore, Submission, SubmissionStatus, SubmissionStore,
};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

pub(crate) fn with_verification_routes(stack: &VerificationStack) -> axum::Router {
    verification_router(Arc::clone(&stack.engine))
        .route("/api/v1/submissions", axum::routing::post(register_submission))
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .layer(Extension(Arc::clone(&stack.submissions)))
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

/// Register a campaign submission so it can be verified. New submissions always
/// enter as `submitted`.
pub(crate) async fn register_submission(
    Extension(store): Extension<Arc<InMemorySubmissionStore>>,
    Json(mut submission): Json<Submission>,
) -> Result<(StatusCode, Json<Submission>), AppError> {
    submission.status = SubmissionStatus::Submitted;
    submission.compliance_score = None;

    let stored = store.insert(submission).await?;
    info!(submission_id = %stored.id, "submission registered");

    Ok((StatusCode::CREATED, Json(stored)))
}
