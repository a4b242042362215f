use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::feedback_dto::{CreateTemplatePayload, TemplateListQuery, UpdateTemplatePayload},
    error::Result,
    middleware::auth::AuthUser,
    models::feedback::TemplateWithQuestions,
    AppState,
};

#[utoipa::path(
    get,
    path = "/api/feedback-templates",
    params(TemplateListQuery),
    responses((status = 200, description = "Templates with their questions", body = [TemplateWithQuestions]))
)]
#[axum::debug_handler]
pub async fn list_templates(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<TemplateListQuery>,
) -> Result<Json<Vec<TemplateWithQuestions>>> {
    let templates = state
        .feedback_service
        .list_templates(user.tenant_id, query.active_only.unwrap_or(false))
        .await?;
    Ok(Json(templates))
}

#[axum::debug_handler]
pub async fn get_template(
    State(state): State<AppState>,
    Path(template_id): Path<Uuid>,
    user: AuthUser,
) -> Result<Json<TemplateWithQuestions>> {
    let template = state
        .feedback_service
        .get_template(user.tenant_id, template_id)
        .await?;
    Ok(Json(template))
}

#[utoipa::path(
    post,
    path = "/api/feedback-templates",
    request_body = CreateTemplatePayload,
    responses(
        (status = 201, description = "Template created", body = TemplateWithQuestions),
        (status = 400, description = "Invalid payload")
    )
)]
#[axum::debug_handler]
pub async fn create_template(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateTemplatePayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let template = state
        .feedback_service
        .create_template(user.tenant_id, user.user_id, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(template)))
}

#[axum::debug_handler]
pub async fn update_template(
    State(state): State<AppState>,
    Path(template_id): Path<Uuid>,
    user: AuthUser,
    Json(payload): Json<UpdateTemplatePayload>,
) -> Result<Json<TemplateWithQuestions>> {
    payload.validate()?;
    let template = state
        .feedback_service
        .update_template(user.tenant_id, template_id, payload)
        .await?;
    Ok(Json(template))
}

#[axum::debug_handler]
pub async fn delete_template(
    State(state): State<AppState>,
    Path(template_id): Path<Uuid>,
    user: AuthUser,
) -> Result<StatusCode> {
    state
        .feedback_service
        .delete_template(user.tenant_id, template_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
