//! Persistence seams.
//!
//! Every method takes the caller's `tenant_id` and must never return or touch a
//! row belonging to another tenant. Two adapters exist: [`postgres::PgStore`]
//! for production and [`memory::MemoryStore`] for tests and local tooling.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    candidate::{Candidate, NewCandidate, Page, StatusWrite},
    comment::{Comment, NewComment},
    feedback::{
        CandidateFeedback, FeedbackCounts, FeedbackQuestion, FeedbackResponse, FeedbackTemplate,
        NewCandidateFeedback, NewFeedbackTemplate, ResponseUpsert, TemplateChanges,
    },
    job::{Job, NewJob},
    notification::{NewNotification, Notification},
    pipeline::{NewPipelineStatus, PipelineHistory, PipelineStatus},
    tenant::Tenant,
    user::User,
};

/// One candidate's share of a bulk action, committed with all the others or not at all.
///
/// The history row and `notifications` are written only when the status read
/// under the row lock differs from `new_status`.
#[derive(Debug, Clone)]
pub struct BulkTransition {
    pub candidate_id: Uuid,
    pub new_status: String,
    pub changed_by: Option<Uuid>,
    pub notifications: Vec<NewNotification>,
}

/// A committed status write and the status it replaced.
#[derive(Debug, Clone)]
pub struct StatusChange {
    pub candidate: Candidate,
    pub previous_status: String,
}

impl StatusChange {
    pub fn changed(&self) -> bool {
        self.candidate.status != self.previous_status
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TenantStore: Send + Sync {
    async fn find_tenant_by_name(&self, name: &str) -> Result<Option<Tenant>>;

    async fn set_tenant_active(&self, name: &str, is_active: bool) -> Result<Option<Tenant>>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_user(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<User>>;

    /// Unknown ids are skipped.
    async fn find_users(&self, tenant_id: Uuid, ids: &[Uuid]) -> Result<Vec<User>>;
}

#[async_trait]
pub trait JobStore: Send + Sync {
    async fn insert_job(&self, job: NewJob) -> Result<Job>;

    async fn find_job(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Job>>;

    /// `visible_to = Some(user)` limits the list to jobs the user created or is assigned to.
    async fn list_jobs(&self, tenant_id: Uuid, visible_to: Option<Uuid>) -> Result<Vec<Job>>;

    async fn close_job(&self, tenant_id: Uuid, id: Uuid, closed_on: NaiveDate) -> Result<Job>;

    async fn job_assignees(&self, tenant_id: Uuid, job_id: Uuid) -> Result<Vec<User>>;

    async fn replace_job_assignees(&self, tenant_id: Uuid, job_id: Uuid, user_ids: &[Uuid]) -> Result<()>;

    async fn job_template_ids(&self, tenant_id: Uuid, job_id: Uuid) -> Result<Vec<Uuid>>;
}

#[async_trait]
pub trait CandidateStore: Send + Sync {
    /// Writes the candidate and its initial history row (`old_status = None`) atomically.
    async fn insert_candidate(&self, candidate: NewCandidate) -> Result<Candidate>;

    async fn find_candidate(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Candidate>>;

    /// Unknown ids and ids from other tenants are skipped.
    async fn find_candidates(&self, tenant_id: Uuid, ids: &[Uuid]) -> Result<Vec<Candidate>>;

    async fn list_candidates(&self, tenant_id: Uuid, page: Page) -> Result<(Vec<Candidate>, i64)>;

    async fn list_job_candidates(&self, tenant_id: Uuid, job_id: Uuid) -> Result<Vec<Candidate>>;

    /// Locks the row, writes the status fields and, when the locked status
    /// differs from the new one, a history row. One unit of work.
    async fn write_status(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        write: StatusWrite,
        changed_by: Option<Uuid>,
    ) -> Result<StatusChange>;

    /// All-or-nothing: status, history and notification rows for every transition.
    async fn apply_bulk_transitions(
        &self,
        tenant_id: Uuid,
        transitions: Vec<BulkTransition>,
    ) -> Result<Vec<StatusChange>>;

    async fn count_candidates_in_status(&self, tenant_id: Uuid, status: &str) -> Result<i64>;

    async fn set_cv_path(&self, tenant_id: Uuid, id: Uuid, cv_file_path: &str) -> Result<Candidate>;

    async fn set_notes(&self, tenant_id: Uuid, id: Uuid, notes: Option<String>) -> Result<Candidate>;

    async fn delete_candidate(&self, tenant_id: Uuid, id: Uuid) -> Result<bool>;

    /// Newest first.
    async fn candidate_history(&self, tenant_id: Uuid, candidate_id: Uuid) -> Result<Vec<PipelineHistory>>;
}

#[async_trait]
pub trait PipelineStore: Send + Sync {
    /// Ordered by `order`, then `value`.
    async fn list_pipeline_statuses(&self, tenant_id: Uuid) -> Result<Vec<PipelineStatus>>;

    /// `None` when the value already exists for the tenant.
    async fn insert_pipeline_status(&self, status: NewPipelineStatus) -> Result<Option<PipelineStatus>>;

    async fn update_pipeline_status(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        label: Option<String>,
        order: Option<i32>,
    ) -> Result<Option<PipelineStatus>>;

    async fn reorder_pipeline_statuses(&self, tenant_id: Uuid, orders: &[(Uuid, i32)]) -> Result<()>;

    async fn delete_pipeline_status(&self, tenant_id: Uuid, id: Uuid) -> Result<bool>;
}

#[async_trait]
pub trait FeedbackStore: Send + Sync {
    async fn list_templates(&self, tenant_id: Uuid, active_only: bool) -> Result<Vec<FeedbackTemplate>>;

    async fn find_template(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<FeedbackTemplate>>;

    async fn find_templates(&self, tenant_id: Uuid, ids: &[Uuid]) -> Result<Vec<FeedbackTemplate>>;

    /// Ordered by `order`.
    async fn template_questions(&self, tenant_id: Uuid, template_id: Uuid) -> Result<Vec<FeedbackQuestion>>;

    async fn insert_template(&self, template: NewFeedbackTemplate) -> Result<FeedbackTemplate>;

    async fn update_template(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        changes: TemplateChanges,
    ) -> Result<Option<FeedbackTemplate>>;

    async fn delete_template(&self, tenant_id: Uuid, id: Uuid) -> Result<bool>;

    async fn find_candidate_feedback(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<CandidateFeedback>>;

    async fn find_candidate_feedback_by_pair(
        &self,
        tenant_id: Uuid,
        candidate_id: Uuid,
        template_id: Uuid,
    ) -> Result<Option<CandidateFeedback>>;

    /// Newest first.
    async fn list_candidate_feedback(&self, tenant_id: Uuid, candidate_id: Uuid) -> Result<Vec<CandidateFeedback>>;

    /// `None` when the (candidate, template) pair is already attached.
    async fn insert_candidate_feedback(&self, row: NewCandidateFeedback) -> Result<Option<CandidateFeedback>>;

    async fn update_candidate_feedback(&self, row: &CandidateFeedback) -> Result<CandidateFeedback>;

    /// Responses recorded against the row go with it.
    async fn delete_candidate_feedback(&self, tenant_id: Uuid, id: Uuid) -> Result<bool>;

    async fn upsert_response(&self, response: ResponseUpsert) -> Result<FeedbackResponse>;

    async fn list_responses(&self, tenant_id: Uuid, candidate_feedback_id: Uuid) -> Result<Vec<FeedbackResponse>>;

    async fn feedback_counts(&self, tenant_id: Uuid) -> Result<FeedbackCounts>;
}

#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn insert_notification(&self, notification: NewNotification) -> Result<Notification>;

    /// Newest first.
    async fn list_notifications(&self, tenant_id: Uuid, user_id: Uuid) -> Result<Vec<Notification>>;

    /// Marks one notification (or all of the user's when `id` is `None`) as read.
    async fn mark_notifications_read(&self, tenant_id: Uuid, user_id: Uuid, id: Option<Uuid>) -> Result<u64>;
}

#[async_trait]
pub trait CommentStore: Send + Sync {
    async fn insert_comment(&self, comment: NewComment) -> Result<Comment>;

    /// Oldest first.
    async fn list_comments(&self, tenant_id: Uuid, candidate_id: Uuid) -> Result<Vec<Comment>>;

    async fn find_comment(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Comment>>;

    /// Nulls the attachment columns and returns the updated row, `None` when the comment is gone.
    async fn clear_comment_attachment(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Comment>>;
}

pub trait Store:
    TenantStore
    + UserStore
    + JobStore
    + CandidateStore
    + PipelineStore
    + FeedbackStore
    + NotificationStore
    + CommentStore
{
}

impl<T> Store for T where
    T: TenantStore
        + UserStore
        + JobStore
        + CandidateStore
        + PipelineStore
        + FeedbackStore
        + NotificationStore
        + CommentStore
{
}
