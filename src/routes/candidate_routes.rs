use axum::{
    body::Body,
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::candidate_dto::{
        BulkActionPayload, BulkActionResponse, CandidateForm, CandidateList, CandidateListQuery, NotesPayload,
        UpdateStatusPayload, UploadedFile,
    },
    error::{Error, Result},
    middleware::auth::AuthUser,
    models::{candidate::Candidate, pipeline::PipelineHistory},
    AppState,
};

async fn read_candidate_form(mut multipart: Multipart) -> Result<CandidateForm> {
    let mut form = CandidateForm::default();

    while let Some(field) = multipart.next_field().await? {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "cv" | "coverLetter" | "cover_letter" => {
                let filename = field.file_name().unwrap_or("upload.bin").to_string();
                let data = field.bytes().await?;
                if data.is_empty() {
                    continue;
                }
                let file = UploadedFile { filename, data };
                if field_name == "cv" {
                    form.cv = Some(file);
                } else {
                    form.cover_letter = Some(file);
                }
            }
            "name" => form.name = field.text().await?.trim().to_string(),
            "firstName" | "first_name" => form.first_name = non_empty(field.text().await?),
            "lastName" | "last_name" => form.last_name = non_empty(field.text().await?),
            "email" => form.email = non_empty(field.text().await?),
            "phone" => form.phone = non_empty(field.text().await?),
            other => tracing::debug!(field = %other, "ignoring unknown form field"),
        }
    }

    if form.name.is_empty() {
        let joined = [form.first_name.as_deref(), form.last_name.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");
        form.name = joined;
    }

    Ok(form)
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[utoipa::path(
    post,
    path = "/api/jobs/{job_id}/candidates",
    params(("job_id" = Uuid, Path, description = "Job ID")),
    responses(
        (status = 201, description = "Candidate created", body = Candidate),
        (status = 400, description = "Missing CV, invalid file or closed job"),
        (status = 404, description = "Job not found")
    )
)]
#[axum::debug_handler]
pub async fn create_candidate(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    user: AuthUser,
    multipart: Multipart,
) -> Result<impl IntoResponse> {
    let form = read_candidate_form(multipart).await?;
    form.validate()?;
    let candidate = state
        .pipeline_service
        .create_candidate(user.tenant_id, job_id, user.user_id, form)
        .await?;
    Ok((StatusCode::CREATED, Json(candidate)))
}

#[axum::debug_handler]
pub async fn list_job_candidates(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    user: AuthUser,
) -> Result<Json<Vec<Candidate>>> {
    let candidates = state.pipeline_service.list_for_job(user.tenant_id, job_id).await?;
    Ok(Json(candidates))
}

#[utoipa::path(
    get,
    path = "/api/candidates",
    params(CandidateListQuery),
    responses((status = 200, description = "Paged candidates", body = CandidateList))
)]
#[axum::debug_handler]
pub async fn list_candidates(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<CandidateListQuery>,
) -> Result<Json<CandidateList>> {
    let list = state.pipeline_service.list(user.tenant_id, query).await?;
    Ok(Json(list))
}

#[axum::debug_handler]
pub async fn get_candidate(
    State(state): State<AppState>,
    Path(candidate_id): Path<Uuid>,
    user: AuthUser,
) -> Result<Json<Candidate>> {
    let candidate = state.pipeline_service.get(user.tenant_id, candidate_id).await?;
    Ok(Json(candidate))
}

#[axum::debug_handler]
pub async fn delete_candidate(
    State(state): State<AppState>,
    Path(candidate_id): Path<Uuid>,
    user: AuthUser,
) -> Result<StatusCode> {
    state.pipeline_service.delete(user.tenant_id, candidate_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    patch,
    path = "/api/candidates/{candidate_id}/status",
    params(("candidate_id" = Uuid, Path, description = "Candidate ID")),
    request_body = UpdateStatusPayload,
    responses(
        (status = 200, description = "Status updated", body = Candidate),
        (status = 400, description = "Unknown status or closed job"),
        (status = 404, description = "Candidate or job not found")
    )
)]
#[axum::debug_handler]
pub async fn update_candidate_status(
    State(state): State<AppState>,
    Path(candidate_id): Path<Uuid>,
    user: AuthUser,
    Json(payload): Json<UpdateStatusPayload>,
) -> Result<Json<Candidate>> {
    payload.validate()?;
    let candidate = state
        .pipeline_service
        .update_status(user.tenant_id, candidate_id, user.user_id, payload)
        .await?;
    Ok(Json(candidate))
}

#[utoipa::path(
    post,
    path = "/api/candidates/{candidate_id}/reject",
    params(("candidate_id" = Uuid, Path, description = "Candidate ID")),
    responses(
        (status = 200, description = "Candidate rejected", body = Candidate),
        (status = 400, description = "Closed job"),
        (status = 404, description = "Candidate not found")
    )
)]
#[axum::debug_handler]
pub async fn reject_candidate(
    State(state): State<AppState>,
    Path(candidate_id): Path<Uuid>,
    user: AuthUser,
) -> Result<Json<Candidate>> {
    let candidate = state
        .pipeline_service
        .reject(user.tenant_id, candidate_id, user.user_id)
        .await?;
    Ok(Json(candidate))
}

#[utoipa::path(
    post,
    path = "/api/candidates/bulk-action",
    request_body = BulkActionPayload,
    responses(
        (status = 200, description = "All candidates updated", body = BulkActionResponse),
        (status = 400, description = "Unsupported action, missing stage or closed job"),
        (status = 404, description = "No candidates found")
    )
)]
#[axum::debug_handler]
pub async fn bulk_action(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<BulkActionPayload>,
) -> Result<Json<BulkActionResponse>> {
    payload.validate()?;
    let response = state
        .pipeline_service
        .bulk_action(user.tenant_id, user.user_id, payload)
        .await?;
    Ok(Json(response))
}

#[axum::debug_handler]
pub async fn update_notes(
    State(state): State<AppState>,
    Path(candidate_id): Path<Uuid>,
    user: AuthUser,
    Json(payload): Json<NotesPayload>,
) -> Result<Json<Candidate>> {
    payload.validate()?;
    let candidate = state
        .pipeline_service
        .set_notes(user.tenant_id, candidate_id, payload)
        .await?;
    Ok(Json(candidate))
}

#[axum::debug_handler]
pub async fn get_candidate_cv(
    State(state): State<AppState>,
    Path(candidate_id): Path<Uuid>,
    user: AuthUser,
) -> Result<Response> {
    let cv = state.pipeline_service.cv(user.tenant_id, candidate_id).await?;
    let disposition = format!("inline; filename=\"{}\"", cv.filename);
    Ok((
        [
            (header::CONTENT_TYPE, cv.content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Body::from_stream(cv.stream),
    )
        .into_response())
}

#[axum::debug_handler]
pub async fn update_candidate_cv(
    State(state): State<AppState>,
    Path(candidate_id): Path<Uuid>,
    user: AuthUser,
    mut multipart: Multipart,
) -> Result<Json<Candidate>> {
    let mut cv = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("cv") {
            let filename = field.file_name().unwrap_or("cv.bin").to_string();
            let data = field.bytes().await?;
            if !data.is_empty() {
                cv = Some(UploadedFile { filename, data });
                break;
            }
        }
    }

    let file = cv.ok_or_else(|| Error::BadRequest("CV file is required".to_string()))?;
    let candidate = state
        .pipeline_service
        .replace_cv(user.tenant_id, candidate_id, file)
        .await?;
    Ok(Json(candidate))
}

#[utoipa::path(
    get,
    path = "/api/candidates/{candidate_id}/pipeline-history",
    params(("candidate_id" = Uuid, Path, description = "Candidate ID")),
    responses(
        (status = 200, description = "History, newest first", body = [PipelineHistory]),
        (status = 404, description = "Candidate not found")
    )
)]
#[axum::debug_handler]
pub async fn get_pipeline_history(
    State(state): State<AppState>,
    Path(candidate_id): Path<Uuid>,
    user: AuthUser,
) -> Result<Json<Vec<PipelineHistory>>> {
    let history = state.pipeline_service.history(user.tenant_id, candidate_id).await?;
    Ok(Json(history))
}
