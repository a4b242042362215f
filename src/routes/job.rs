use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::job_dto::{AssignUsersPayload, CreateJobPayload, JobDetails},
    error::Result,
    middleware::auth::AuthUser,
    models::{feedback::TemplateWithQuestions, job::Job},
    AppState,
};

#[utoipa::path(
    post,
    path = "/api/jobs",
    request_body = CreateJobPayload,
    responses(
        (status = 201, description = "Job created", body = JobDetails),
        (status = 400, description = "Invalid payload or feedback templates"),
        (status = 404, description = "Assignee not found")
    )
)]
#[axum::debug_handler]
pub async fn create_job(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateJobPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let job = state
        .job_service
        .create(user.tenant_id, user.user_id, user.role, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(job)))
}

#[axum::debug_handler]
pub async fn list_jobs(State(state): State<AppState>, user: AuthUser) -> Result<Json<Vec<Job>>> {
    let jobs = state
        .job_service
        .list(user.tenant_id, user.user_id, user.role)
        .await?;
    Ok(Json(jobs))
}

#[axum::debug_handler]
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    user: AuthUser,
) -> Result<Json<JobDetails>> {
    let job = state.job_service.get(user.tenant_id, job_id).await?;
    Ok(Json(job))
}

#[utoipa::path(
    post,
    path = "/api/jobs/{job_id}/close",
    params(("job_id" = Uuid, Path, description = "Job ID")),
    responses(
        (status = 200, description = "Job closed", body = Job),
        (status = 400, description = "Job is already closed"),
        (status = 403, description = "Not the job owner")
    )
)]
#[axum::debug_handler]
pub async fn close_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    user: AuthUser,
) -> Result<Json<Job>> {
    let job = state.job_service.close(user.tenant_id, job_id).await?;
    Ok(Json(job))
}

#[axum::debug_handler]
pub async fn assign_users(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    user: AuthUser,
    Json(payload): Json<AssignUsersPayload>,
) -> Result<Json<JobDetails>> {
    let job = state
        .job_service
        .assign(user.tenant_id, job_id, payload.user_ids)
        .await?;
    Ok(Json(job))
}

#[axum::debug_handler]
pub async fn job_feedback_templates(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    user: AuthUser,
) -> Result<Json<Vec<TemplateWithQuestions>>> {
    let templates = state
        .job_service
        .feedback_templates(user.tenant_id, job_id)
        .await?;
    Ok(Json(templates))
}
