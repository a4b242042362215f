use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::feedback_dto::{AttachTemplatePayload, AutoAttachResponse, CompleteFeedbackPayload, SaveResponsePayload},
    error::Result,
    middleware::auth::AuthUser,
    models::feedback::{FeedbackDetails, FeedbackResponse, FeedbackStats},
    AppState,
};

#[axum::debug_handler]
pub async fn list_candidate_feedback(
    State(state): State<AppState>,
    Path(candidate_id): Path<Uuid>,
    user: AuthUser,
) -> Result<Json<Vec<FeedbackDetails>>> {
    let feedback = state
        .feedback_service
        .list_for_candidate(user.tenant_id, candidate_id)
        .await?;
    Ok(Json(feedback))
}

#[utoipa::path(
    post,
    path = "/api/candidates/{candidate_id}/feedback/attach",
    params(("candidate_id" = Uuid, Path, description = "Candidate ID")),
    request_body = AttachTemplatePayload,
    responses(
        (status = 201, description = "Template attached", body = FeedbackDetails),
        (status = 400, description = "Template is already attached to this candidate"),
        (status = 404, description = "Candidate or active template not found")
    )
)]
#[axum::debug_handler]
pub async fn attach_template(
    State(state): State<AppState>,
    Path(candidate_id): Path<Uuid>,
    user: AuthUser,
    Json(payload): Json<AttachTemplatePayload>,
) -> Result<impl IntoResponse> {
    let attached = state
        .feedback_service
        .attach_template(user.tenant_id, candidate_id, payload.template_id, user.user_id)
        .await?;
    Ok((StatusCode::CREATED, Json(attached)))
}

#[utoipa::path(
    post,
    path = "/api/candidates/{candidate_id}/feedback/auto-attach",
    params(("candidate_id" = Uuid, Path, description = "Candidate ID")),
    responses(
        (status = 200, description = "Matching templates attached", body = AutoAttachResponse),
        (status = 404, description = "Candidate not found")
    )
)]
#[axum::debug_handler]
pub async fn auto_attach(
    State(state): State<AppState>,
    Path(candidate_id): Path<Uuid>,
    user: AuthUser,
) -> Result<Json<AutoAttachResponse>> {
    let attached = state
        .feedback_service
        .auto_attach_by_rules(user.tenant_id, candidate_id, Some(user.user_id))
        .await?;
    Ok(Json(AutoAttachResponse {
        message: format!("{} templates auto-attached", attached.len()),
        attached_templates: attached,
    }))
}

#[axum::debug_handler]
pub async fn get_feedback(
    State(state): State<AppState>,
    Path(feedback_id): Path<Uuid>,
    user: AuthUser,
) -> Result<Json<FeedbackDetails>> {
    let details = state.feedback_service.details(user.tenant_id, feedback_id).await?;
    Ok(Json(details))
}

#[axum::debug_handler]
pub async fn remove_feedback(
    State(state): State<AppState>,
    Path(feedback_id): Path<Uuid>,
    user: AuthUser,
) -> Result<impl IntoResponse> {
    state
        .feedback_service
        .remove_template(user.tenant_id, feedback_id)
        .await?;
    Ok(Json(json!({ "message": "Template removed successfully" })))
}

#[utoipa::path(
    post,
    path = "/api/feedback/{feedback_id}/responses",
    params(("feedback_id" = Uuid, Path, description = "Candidate feedback ID")),
    request_body = SaveResponsePayload,
    responses(
        (status = 200, description = "Response saved", body = FeedbackResponse),
        (status = 400, description = "Foreign question or completed feedback"),
        (status = 404, description = "Feedback not found")
    )
)]
#[axum::debug_handler]
pub async fn save_response(
    State(state): State<AppState>,
    Path(feedback_id): Path<Uuid>,
    user: AuthUser,
    Json(payload): Json<SaveResponsePayload>,
) -> Result<Json<FeedbackResponse>> {
    payload.validate()?;
    let saved = state
        .feedback_service
        .save_response(user.tenant_id, feedback_id, user.user_id, payload)
        .await?;
    Ok(Json(saved))
}

#[axum::debug_handler]
pub async fn complete_feedback(
    State(state): State<AppState>,
    Path(feedback_id): Path<Uuid>,
    user: AuthUser,
    payload: Option<Json<CompleteFeedbackPayload>>,
) -> Result<Json<FeedbackDetails>> {
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    let details = state
        .feedback_service
        .complete_feedback(user.tenant_id, feedback_id, user.user_id, payload)
        .await?;
    Ok(Json(details))
}

#[axum::debug_handler]
pub async fn feedback_stats(State(state): State<AppState>, user: AuthUser) -> Result<Json<FeedbackStats>> {
    let stats = state.feedback_service.stats(user.tenant_id).await?;
    Ok(Json(stats))
}
