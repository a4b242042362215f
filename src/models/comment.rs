use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// A note left on a candidate, optionally carrying one uploaded file.
///
/// The four `attachment_*` fields are set and cleared together.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromRow)]
pub struct Comment {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub candidate_id: Uuid,
    pub text: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub attachment_path: Option<String>,
    pub attachment_original_name: Option<String>,
    pub attachment_type: Option<String>,
    pub attachment_size: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct CommentAttachment {
    pub path: String,
    pub original_name: String,
    pub content_type: String,
    pub size: i32,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub tenant_id: Uuid,
    pub candidate_id: Uuid,
    pub text: Option<String>,
    pub created_by: Uuid,
    pub attachment: Option<CommentAttachment>,
}
