use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::models::feedback::{CandidateFeedback, NewQuestion, QuestionType, TemplateType};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttachTemplatePayload {
    pub template_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SaveResponsePayload {
    pub question_id: Uuid,
    pub text_answer: Option<String>,
    pub numeric_answer: Option<i32>,
    pub boolean_answer: Option<bool>,
    pub selected_option: Option<String>,
    #[validate(length(max = 5000))]
    pub comments: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompleteFeedbackPayload {
    pub general_comments: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AutoAttachResponse {
    pub message: String,
    pub attached_templates: Vec<CandidateFeedback>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuestionPayload {
    #[validate(length(min = 1, message = "Question text is required"))]
    pub question: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    #[serde(default)]
    pub required: bool,
    pub help_text: Option<String>,
    #[serde(default)]
    pub options: Vec<String>,
    pub min_rating: Option<i32>,
    pub max_rating: Option<i32>,
}

impl From<QuestionPayload> for NewQuestion {
    fn from(q: QuestionPayload) -> Self {
        NewQuestion {
            question: q.question,
            question_type: q.question_type,
            required: q.required,
            help_text: q.help_text,
            options: q.options,
            min_rating: q.min_rating,
            max_rating: q.max_rating,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateTemplatePayload {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[serde(rename = "type")]
    pub template_type: TemplateType,
    pub description: Option<String>,
    pub instructions: Option<String>,
    pub is_active: Option<bool>,
    #[serde(default)]
    pub stage_mappings: Vec<String>,
    #[serde(default)]
    pub job_type_mappings: Vec<String>,
    #[serde(default)]
    #[validate(nested)]
    pub questions: Vec<QuestionPayload>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTemplatePayload {
    #[validate(length(min = 1))]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub template_type: Option<TemplateType>,
    pub description: Option<String>,
    pub instructions: Option<String>,
    pub is_active: Option<bool>,
    pub stage_mappings: Option<Vec<String>>,
    pub job_type_mappings: Option<Vec<String>>,
    #[validate(nested)]
    pub questions: Option<Vec<QuestionPayload>>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct TemplateListQuery {
    pub active_only: Option<bool>,
}
