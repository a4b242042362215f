use axum::Json;
use utoipa::OpenApi;

use crate::dto::{
    candidate_dto::{BulkActionArgs, BulkActionPayload, BulkActionResponse, CandidateList, UpdateStatusPayload},
    comment_dto::DeleteAttachmentResponse,
    feedback_dto::{AttachTemplatePayload, AutoAttachResponse, CreateTemplatePayload, QuestionPayload, SaveResponsePayload},
    job_dto::{CreateJobPayload, JobDetails},
    pipeline_dto::CreatePipelineStatusPayload,
    tenant_dto::TenantCheckResponse,
};
use crate::models::{
    candidate::Candidate,
    comment::Comment,
    feedback::{
        CandidateFeedback, FeedbackDetails, FeedbackQuestion, FeedbackResponse, FeedbackStatus, FeedbackTemplate,
        QuestionType, TemplateType, TemplateWithQuestions,
    },
    job::{Job, JobStatus},
    pipeline::{PipelineHistory, PipelineStatus},
    user::{Role, User},
};
use crate::routes;

#[derive(OpenApi)]
#[openapi(
    paths(
        routes::tenant::check_tenant,
        routes::job::create_job,
        routes::job::close_job,
        routes::candidate_routes::create_candidate,
        routes::candidate_routes::list_candidates,
        routes::candidate_routes::update_candidate_status,
        routes::candidate_routes::reject_candidate,
        routes::candidate_routes::bulk_action,
        routes::candidate_routes::get_pipeline_history,
        routes::comment::create_comment,
        routes::comment::list_comments,
        routes::comment::delete_attachment,
        routes::feedback::attach_template,
        routes::feedback::auto_attach,
        routes::feedback::save_response,
        routes::feedback_template::list_templates,
        routes::feedback_template::create_template,
        routes::pipeline_status::create_status,
    ),
    components(schemas(
        Candidate,
        CandidateList,
        UpdateStatusPayload,
        BulkActionArgs,
        BulkActionPayload,
        BulkActionResponse,
        PipelineHistory,
        Comment,
        DeleteAttachmentResponse,
        PipelineStatus,
        CreatePipelineStatusPayload,
        Job,
        JobStatus,
        JobDetails,
        CreateJobPayload,
        User,
        Role,
        FeedbackTemplate,
        FeedbackQuestion,
        TemplateWithQuestions,
        TemplateType,
        QuestionType,
        FeedbackStatus,
        CandidateFeedback,
        FeedbackDetails,
        FeedbackResponse,
        AttachTemplatePayload,
        AutoAttachResponse,
        SaveResponsePayload,
        CreateTemplatePayload,
        QuestionPayload,
        TenantCheckResponse,
    )),
    tags((name = "ats", description = "Multi-tenant applicant tracking API"))
)]
pub struct ApiDoc;

pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
