use super::dto::{JobRequest, JobResult};
use super::error::JobError;
use super::service::RenderService;
use crate::common::response::{ApiError, ApiSuccess};
use crate::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::Value;

/// Render an animation into an MP4
///
/// Runs the whole job before responding; the same result is also posted to `webhookUrl`.
#[utoipa::path(
    post,
    path = "/",
    request_body = JobRequest,
    responses(
        (status = 200, description = "Video rendered and uploaded", body = JobResult),
        (status = 500, description = "Render failed", body = JobResult)
    ),
    tag = "Render"
)]
pub async fn render_job(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> impl IntoResponse {
    let outcome = match body {
        Ok(Json(body)) => RenderService::submit(state, body).await,
        Err(rejection) => Err(JobError::Validation(rejection.body_text())),
    };

    match outcome {
        Ok(result) => ApiSuccess(result, StatusCode::OK).into_response(),
        Err(e) => ApiError(e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}
