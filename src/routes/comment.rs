use axum::{
    body::Body,
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::{
        candidate_dto::UploadedFile,
        comment_dto::{CommentForm, DeleteAttachmentResponse},
    },
    error::Result,
    middleware::auth::AuthUser,
    models::comment::Comment,
    AppState,
};

async fn read_comment_form(mut multipart: Multipart) -> Result<CommentForm> {
    let mut form = CommentForm::default();

    while let Some(field) = multipart.next_field().await? {
        match field.name().unwrap_or_default() {
            "attachment" => {
                let filename = field.file_name().unwrap_or("attachment.bin").to_string();
                let data = field.bytes().await?;
                if !data.is_empty() {
                    form.attachment = Some(UploadedFile { filename, data });
                }
            }
            "text" => form.text = Some(field.text().await?),
            other => tracing::debug!(field = %other, "ignoring unknown form field"),
        }
    }

    Ok(form)
}

#[utoipa::path(
    post,
    path = "/api/candidates/{candidate_id}/comments",
    params(("candidate_id" = Uuid, Path, description = "Candidate ID")),
    responses(
        (status = 201, description = "Comment created", body = Comment),
        (status = 400, description = "Empty comment, oversized or disallowed attachment"),
        (status = 404, description = "Candidate or user not found")
    )
)]
#[axum::debug_handler]
pub async fn create_comment(
    State(state): State<AppState>,
    Path(candidate_id): Path<Uuid>,
    user: AuthUser,
    multipart: Multipart,
) -> Result<impl IntoResponse> {
    let form = read_comment_form(multipart).await?;
    form.validate()?;
    let comment = state
        .comment_service
        .create(user.tenant_id, candidate_id, user.user_id, form)
        .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

#[utoipa::path(
    get,
    path = "/api/candidates/{candidate_id}/comments",
    params(("candidate_id" = Uuid, Path, description = "Candidate ID")),
    responses((status = 200, description = "Comments, oldest first", body = [Comment]))
)]
#[axum::debug_handler]
pub async fn list_comments(
    State(state): State<AppState>,
    Path(candidate_id): Path<Uuid>,
    user: AuthUser,
) -> Result<Json<Vec<Comment>>> {
    let comments = state.comment_service.list(user.tenant_id, candidate_id).await?;
    Ok(Json(comments))
}

#[axum::debug_handler]
pub async fn get_attachment(
    State(state): State<AppState>,
    Path(comment_id): Path<Uuid>,
    user: AuthUser,
) -> Result<Response> {
    let file = state.comment_service.attachment(user.tenant_id, comment_id).await?;
    let disposition = format!("inline; filename=\"{}\"", file.filename.replace('"', ""));
    Ok((
        [
            (header::CONTENT_TYPE, file.content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Body::from_stream(file.stream),
    )
        .into_response())
}

#[utoipa::path(
    delete,
    path = "/api/comments/{comment_id}/attachment",
    params(("comment_id" = Uuid, Path, description = "Comment ID")),
    responses(
        (status = 200, description = "Attachment removed", body = DeleteAttachmentResponse),
        (status = 403, description = "Caller did not write the comment"),
        (status = 404, description = "Comment not found")
    )
)]
#[axum::debug_handler]
pub async fn delete_attachment(
    State(state): State<AppState>,
    Path(comment_id): Path<Uuid>,
    user: AuthUser,
) -> Result<Json<DeleteAttachmentResponse>> {
    let response = state
        .comment_service
        .delete_attachment(user.tenant_id, comment_id, user.user_id)
        .await?;
    Ok(Json(response))
}
