use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::pipeline_dto::{CreatePipelineStatusPayload, ReorderPipelineStatusesPayload, UpdatePipelineStatusPayload},
    error::Result,
    middleware::auth::AuthUser,
    models::pipeline::PipelineStatus,
    AppState,
};

#[axum::debug_handler]
pub async fn list_statuses(State(state): State<AppState>, user: AuthUser) -> Result<Json<Vec<PipelineStatus>>> {
    let statuses = state.pipeline_status_service.list(user.tenant_id).await?;
    Ok(Json(statuses))
}

#[utoipa::path(
    post,
    path = "/api/pipeline-statuses",
    request_body = CreatePipelineStatusPayload,
    responses(
        (status = 201, description = "Pipeline status created", body = PipelineStatus),
        (status = 400, description = "Pipeline status already exists")
    )
)]
#[axum::debug_handler]
pub async fn create_status(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreatePipelineStatusPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let status = state
        .pipeline_status_service
        .create(user.tenant_id, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(status)))
}

#[axum::debug_handler]
pub async fn update_status(
    State(state): State<AppState>,
    Path(status_id): Path<Uuid>,
    user: AuthUser,
    Json(payload): Json<UpdatePipelineStatusPayload>,
) -> Result<Json<PipelineStatus>> {
    payload.validate()?;
    let status = state
        .pipeline_status_service
        .update(user.tenant_id, status_id, payload)
        .await?;
    Ok(Json(status))
}

#[axum::debug_handler]
pub async fn reorder_statuses(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<ReorderPipelineStatusesPayload>,
) -> Result<Json<Vec<PipelineStatus>>> {
    payload.validate()?;
    let statuses = state
        .pipeline_status_service
        .reorder(user.tenant_id, payload)
        .await?;
    Ok(Json(statuses))
}

#[axum::debug_handler]
pub async fn delete_status(
    State(state): State<AppState>,
    Path(status_id): Path<Uuid>,
    user: AuthUser,
) -> Result<StatusCode> {
    state
        .pipeline_status_service
        .delete(user.tenant_id, status_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
