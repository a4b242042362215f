use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::models::candidate::Candidate;

pub const MOVE_STAGE: &str = "MOVE_STAGE";
pub const REJECT: &str = "REJECT";

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateStatusPayload {
    #[validate(length(min = 1, message = "Status is required"))]
    pub status: String,
    pub interview_date: Option<DateTime<Utc>>,
    pub interview_link: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct BulkActionArgs {
    pub stage: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct BulkActionPayload {
    #[serde(rename = "candidateIds")]
    #[validate(length(min = 1, message = "Candidate IDs are required"))]
    pub candidate_ids: Vec<Uuid>,
    #[validate(length(min = 1, message = "Action is required"))]
    pub action: String,
    #[serde(default)]
    pub payload: Option<BulkActionArgs>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BulkActionResponse {
    pub message: String,
    pub data: Vec<Candidate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct NotesPayload {
    #[validate(length(max = 10000))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CandidateListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CandidateList {
    pub items: Vec<Candidate>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub data: Bytes,
}

/// Multipart candidate submission after the form has been read.
#[derive(Debug, Clone, Default, Validate)]
pub struct CandidateForm {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub phone: Option<String>,
    pub cv: Option<UploadedFile>,
    pub cover_letter: Option<UploadedFile>,
}
