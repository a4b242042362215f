use serde::Serialize;
use utoipa::ToSchema;
use validator::Validate;

use super::candidate_dto::UploadedFile;
use crate::models::comment::Comment;

/// Multipart comment submission after the form has been read.
#[derive(Debug, Clone, Default, Validate)]
pub struct CommentForm {
    #[validate(length(max = 10000))]
    pub text: Option<String>,
    pub attachment: Option<UploadedFile>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DeleteAttachmentResponse {
    pub message: String,
    pub comment: Comment,
}
