use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::models::job::Job;
use crate::models::user::User;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateJobPayload {
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,
    pub department: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub expected_closing_date: NaiveDate,
    #[serde(rename = "assigneeIds", default)]
    pub assignee_ids: Vec<Uuid>,
    #[serde(rename = "feedbackTemplateIds", default)]
    pub feedback_template_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssignUsersPayload {
    pub user_ids: Vec<Uuid>,
}

/// A job with its assignees and curated feedback templates.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct JobDetails {
    #[serde(flatten)]
    pub job: Job,
    pub assignees: Vec<User>,
    #[serde(rename = "feedbackTemplateIds")]
    pub feedback_template_ids: Vec<Uuid>,
}
