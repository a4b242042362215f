use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    BulkTransition, CandidateStore, CommentStore, FeedbackStore, JobStore, NotificationStore, PipelineStore,
    StatusChange, TenantStore, UserStore,
};
use crate::error::{Error, Result};
use crate::models::{
    candidate::{Candidate, NewCandidate, Page, StatusWrite},
    comment::{Comment, NewComment},
    feedback::{
        CandidateFeedback, FeedbackCounts, FeedbackQuestion, FeedbackResponse, FeedbackStatus, FeedbackTemplate,
        NewCandidateFeedback, NewFeedbackTemplate, NewQuestion, ResponseUpsert, TemplateChanges,
    },
    job::{Job, JobStatus, NewJob},
    notification::{NewNotification, Notification},
    pipeline::{NewHistoryEntry, NewPipelineStatus, PipelineHistory, PipelineStatus},
    tenant::Tenant,
    user::{Role, User},
};

#[derive(Default, Clone)]
struct State {
    tenants: Vec<Tenant>,
    users: Vec<User>,
    jobs: Vec<Job>,
    job_assignees: Vec<(Uuid, Uuid)>,
    job_templates: Vec<(Uuid, Uuid)>,
    candidates: Vec<Candidate>,
    history: Vec<PipelineHistory>,
    pipeline_statuses: Vec<PipelineStatus>,
    templates: Vec<FeedbackTemplate>,
    questions: Vec<FeedbackQuestion>,
    candidate_feedback: Vec<CandidateFeedback>,
    responses: Vec<FeedbackResponse>,
    notifications: Vec<Notification>,
    comments: Vec<Comment>,
}

impl State {
    fn push_history(&mut self, tenant_id: Uuid, entry: NewHistoryEntry) {
        self.history.push(PipelineHistory {
            id: Uuid::new_v4(),
            tenant_id,
            candidate_id: entry.candidate_id,
            old_status: entry.old_status,
            new_status: entry.new_status,
            changed_by: entry.changed_by,
            changed_at: Utc::now(),
        });
    }

    fn push_notification(&mut self, n: NewNotification) -> Notification {
        let notification = Notification {
            id: Uuid::new_v4(),
            tenant_id: n.tenant_id,
            user_id: n.user_id,
            kind: n.kind,
            message: n.message,
            is_read: false,
            related_entity_id: n.related_entity_id,
            created_at: Utc::now(),
        };
        self.notifications.push(notification.clone());
        notification
    }

    fn push_questions(&mut self, template_id: Uuid, questions: Vec<NewQuestion>) {
        for (index, q) in questions.into_iter().enumerate() {
            self.questions.push(FeedbackQuestion {
                id: Uuid::new_v4(),
                template_id,
                question: q.question,
                question_type: q.question_type,
                required: q.required,
                help_text: q.help_text,
                options: q.options,
                min_rating: q.min_rating,
                max_rating: q.max_rating,
                order: index as i32,
            });
        }
    }

    fn candidate_mut(&mut self, tenant_id: Uuid, id: Uuid) -> Result<&mut Candidate> {
        self.candidates
            .iter_mut()
            .find(|c| c.tenant_id == tenant_id && c.id == id)
            .ok_or_else(|| Error::NotFound("Candidate not found".to_string()))
    }
}

/// In-process [`super::Store`] used by the test suites and local tooling.
///
/// A single lock guards every table, so multi-row writes are atomic.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    failing_candidates: Mutex<HashSet<Uuid>>,
    failing_notification_users: Mutex<HashSet<Uuid>>,
    failing_candidate_inserts: AtomicBool,
    failing_comment_inserts: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_tenant(&self, name: &str, is_active: bool) -> Tenant {
        let tenant = Tenant {
            id: Uuid::new_v4(),
            name: name.to_string(),
            is_active,
        };
        self.state.lock().await.tenants.push(tenant.clone());
        tenant
    }

    pub async fn insert_user(&self, tenant_id: Uuid, email: &str, role: Role) -> User {
        let user = User {
            id: Uuid::new_v4(),
            tenant_id,
            email: email.to_string(),
            name: None,
            role,
            is_active: true,
            created_at: Utc::now(),
        };
        self.state.lock().await.users.push(user.clone());
        user
    }

    /// Makes any status write touching `candidate_id` fail, mid-batch for bulk writes.
    pub async fn fail_writes_for_candidate(&self, candidate_id: Uuid) {
        self.failing_candidates.lock().await.insert(candidate_id);
    }

    /// Makes every candidate insert fail.
    pub fn fail_candidate_inserts(&self) {
        self.failing_candidate_inserts.store(true, Ordering::SeqCst);
    }

    pub fn fail_comment_inserts(&self) {
        self.failing_comment_inserts.store(true, Ordering::SeqCst);
    }

    /// Makes notification inserts addressed to `user_id` fail.
    pub async fn fail_notifications_for(&self, user_id: Uuid) {
        self.failing_notification_users.lock().await.insert(user_id);
    }

    pub async fn history_rows(&self) -> Vec<PipelineHistory> {
        self.state.lock().await.history.clone()
    }

    pub async fn notification_rows(&self) -> Vec<Notification> {
        self.state.lock().await.notifications.clone()
    }

    pub async fn candidate_feedback_rows(&self) -> Vec<CandidateFeedback> {
        self.state.lock().await.candidate_feedback.clone()
    }
}

#[async_trait]
impl TenantStore for MemoryStore {
    async fn find_tenant_by_name(&self, name: &str) -> Result<Option<Tenant>> {
        let state = self.state.lock().await;
        Ok(state.tenants.iter().find(|t| t.name == name).cloned())
    }

    async fn set_tenant_active(&self, name: &str, is_active: bool) -> Result<Option<Tenant>> {
        let mut state = self.state.lock().await;
        Ok(state.tenants.iter_mut().find(|t| t.name == name).map(|t| {
            t.is_active = is_active;
            t.clone()
        }))
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_user(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<User>> {
        let state = self.state.lock().await;
        Ok(state
            .users
            .iter()
            .find(|u| u.tenant_id == tenant_id && u.id == id)
            .cloned())
    }

    async fn find_users(&self, tenant_id: Uuid, ids: &[Uuid]) -> Result<Vec<User>> {
        let state = self.state.lock().await;
        Ok(state
            .users
            .iter()
            .filter(|u| u.tenant_id == tenant_id && ids.contains(&u.id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn insert_job(&self, job: NewJob) -> Result<Job> {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        let created = Job {
            id: Uuid::new_v4(),
            tenant_id: job.tenant_id,
            title: job.title,
            description: job.description,
            department: job.department,
            status: JobStatus::Open,
            start_date: job.start_date,
            expected_closing_date: job.expected_closing_date,
            actual_closing_date: None,
            created_by: job.created_by,
            created_at: now,
            updated_at: now,
        };
        for user_id in job.assignee_ids {
            if !state.job_assignees.contains(&(created.id, user_id)) {
                state.job_assignees.push((created.id, user_id));
            }
        }
        for template_id in job.feedback_template_ids {
            if !state.job_templates.contains(&(created.id, template_id)) {
                state.job_templates.push((created.id, template_id));
            }
        }
        state.jobs.push(created.clone());
        Ok(created)
    }

    async fn find_job(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Job>> {
        let state = self.state.lock().await;
        Ok(state
            .jobs
            .iter()
            .find(|j| j.tenant_id == tenant_id && j.id == id)
            .cloned())
    }

    async fn list_jobs(&self, tenant_id: Uuid, visible_to: Option<Uuid>) -> Result<Vec<Job>> {
        let state = self.state.lock().await;
        let mut jobs: Vec<Job> = state
            .jobs
            .iter()
            .filter(|j| j.tenant_id == tenant_id)
            .filter(|j| match visible_to {
                None => true,
                Some(user_id) => j.created_by == user_id || state.job_assignees.contains(&(j.id, user_id)),
            })
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(jobs)
    }

    async fn close_job(&self, tenant_id: Uuid, id: Uuid, closed_on: NaiveDate) -> Result<Job> {
        let mut state = self.state.lock().await;
        let job = state
            .jobs
            .iter_mut()
            .find(|j| j.tenant_id == tenant_id && j.id == id)
            .ok_or_else(|| Error::NotFound("Job not found".to_string()))?;
        job.status = JobStatus::Closed;
        job.actual_closing_date = Some(closed_on);
        job.updated_at = Utc::now();
        Ok(job.clone())
    }

    async fn job_assignees(&self, tenant_id: Uuid, job_id: Uuid) -> Result<Vec<User>> {
        let state = self.state.lock().await;
        if !state.jobs.iter().any(|j| j.tenant_id == tenant_id && j.id == job_id) {
            return Ok(Vec::new());
        }
        Ok(state
            .users
            .iter()
            .filter(|u| state.job_assignees.contains(&(job_id, u.id)))
            .cloned()
            .collect())
    }

    async fn replace_job_assignees(&self, tenant_id: Uuid, job_id: Uuid, user_ids: &[Uuid]) -> Result<()> {
        let mut state = self.state.lock().await;
        if !state.jobs.iter().any(|j| j.tenant_id == tenant_id && j.id == job_id) {
            return Err(Error::NotFound("Job not found".to_string()));
        }
        state.job_assignees.retain(|(j, _)| *j != job_id);
        for user_id in user_ids {
            if !state.job_assignees.contains(&(job_id, *user_id)) {
                state.job_assignees.push((job_id, *user_id));
            }
        }
        Ok(())
    }

    async fn job_template_ids(&self, tenant_id: Uuid, job_id: Uuid) -> Result<Vec<Uuid>> {
        let state = self.state.lock().await;
        if !state.jobs.iter().any(|j| j.tenant_id == tenant_id && j.id == job_id) {
            return Ok(Vec::new());
        }
        Ok(state
            .job_templates
            .iter()
            .filter(|(j, _)| *j == job_id)
            .map(|(_, t)| *t)
            .collect())
    }
}

#[async_trait]
impl CandidateStore for MemoryStore {
    async fn insert_candidate(&self, candidate: NewCandidate) -> Result<Candidate> {
        if self.failing_candidate_inserts.load(Ordering::SeqCst) {
            return Err(Error::Internal("candidate insert failed".to_string()));
        }
        let mut state = self.state.lock().await;
        let now = Utc::now();
        let created = Candidate {
            id: Uuid::new_v4(),
            tenant_id: candidate.tenant_id,
            job_id: candidate.job_id,
            name: candidate.name,
            first_name: candidate.first_name,
            last_name: candidate.last_name,
            email: candidate.email,
            phone: candidate.phone,
            cv_file_path: candidate.cv_file_path,
            cover_letter_path: candidate.cover_letter_path,
            profile_picture: None,
            status: candidate.status,
            interview_date: None,
            interview_link: None,
            notes: None,
            created_by: candidate.created_by,
            created_at: now,
            updated_at: now,
        };
        state.push_history(
            created.tenant_id,
            NewHistoryEntry {
                candidate_id: created.id,
                old_status: None,
                new_status: created.status.clone(),
                changed_by: created.created_by,
            },
        );
        state.candidates.push(created.clone());
        Ok(created)
    }

    async fn find_candidate(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Candidate>> {
        let state = self.state.lock().await;
        Ok(state
            .candidates
            .iter()
            .find(|c| c.tenant_id == tenant_id && c.id == id)
            .cloned())
    }

    async fn find_candidates(&self, tenant_id: Uuid, ids: &[Uuid]) -> Result<Vec<Candidate>> {
        let state = self.state.lock().await;
        Ok(state
            .candidates
            .iter()
            .filter(|c| c.tenant_id == tenant_id && ids.contains(&c.id))
            .cloned()
            .collect())
    }

    async fn list_candidates(&self, tenant_id: Uuid, page: Page) -> Result<(Vec<Candidate>, i64)> {
        let state = self.state.lock().await;
        let mut all: Vec<Candidate> = state
            .candidates
            .iter()
            .filter(|c| c.tenant_id == tenant_id)
            .cloned()
            .collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = all.len() as i64;
        let items = all
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit as usize)
            .collect();
        Ok((items, total))
    }

    async fn list_job_candidates(&self, tenant_id: Uuid, job_id: Uuid) -> Result<Vec<Candidate>> {
        let state = self.state.lock().await;
        let mut candidates: Vec<Candidate> = state
            .candidates
            .iter()
            .filter(|c| c.tenant_id == tenant_id && c.job_id == job_id)
            .cloned()
            .collect();
        candidates.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(candidates)
    }

    async fn write_status(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        write: StatusWrite,
        changed_by: Option<Uuid>,
    ) -> Result<StatusChange> {
        if self.failing_candidates.lock().await.contains(&id) {
            return Err(Error::Internal(format!("write to candidate {} failed", id)));
        }
        let mut state = self.state.lock().await;
        let candidate = state.candidate_mut(tenant_id, id)?;
        let previous_status = std::mem::replace(&mut candidate.status, write.status);
        if write.interview_date.is_some() {
            candidate.interview_date = write.interview_date;
        }
        if write.interview_link.is_some() {
            candidate.interview_link = write.interview_link;
        }
        candidate.updated_at = Utc::now();
        let change = StatusChange {
            candidate: candidate.clone(),
            previous_status,
        };
        if change.changed() {
            state.push_history(
                tenant_id,
                NewHistoryEntry {
                    candidate_id: id,
                    old_status: Some(change.previous_status.clone()),
                    new_status: change.candidate.status.clone(),
                    changed_by,
                },
            );
        }
        Ok(change)
    }

    async fn apply_bulk_transitions(
        &self,
        tenant_id: Uuid,
        transitions: Vec<BulkTransition>,
    ) -> Result<Vec<StatusChange>> {
        let failing = self.failing_candidates.lock().await.clone();
        let mut state = self.state.lock().await;

        // Staged on a copy and swapped in only when every transition applied.
        let mut staged = state.clone();
        let mut changes = Vec::with_capacity(transitions.len());
        for transition in transitions {
            if failing.contains(&transition.candidate_id) {
                return Err(Error::Internal(format!(
                    "write to candidate {} failed",
                    transition.candidate_id
                )));
            }
            let candidate = staged.candidate_mut(tenant_id, transition.candidate_id)?;
            let previous_status = std::mem::replace(&mut candidate.status, transition.new_status);
            candidate.updated_at = Utc::now();
            let change = StatusChange {
                candidate: candidate.clone(),
                previous_status,
            };
            if change.changed() {
                staged.push_history(
                    tenant_id,
                    NewHistoryEntry {
                        candidate_id: transition.candidate_id,
                        old_status: Some(change.previous_status.clone()),
                        new_status: change.candidate.status.clone(),
                        changed_by: transition.changed_by,
                    },
                );
                for n in transition.notifications {
                    staged.push_notification(n);
                }
            }
            changes.push(change);
        }

        *state = staged;
        Ok(changes)
    }

    async fn count_candidates_in_status(&self, tenant_id: Uuid, status: &str) -> Result<i64> {
        let state = self.state.lock().await;
        let count = state
            .candidates
            .iter()
            .filter(|c| c.tenant_id == tenant_id && c.status == status)
            .count();
        Ok(count as i64)
    }

    async fn set_cv_path(&self, tenant_id: Uuid, id: Uuid, cv_file_path: &str) -> Result<Candidate> {
        let mut state = self.state.lock().await;
        let candidate = state.candidate_mut(tenant_id, id)?;
        candidate.cv_file_path = cv_file_path.to_string();
        candidate.updated_at = Utc::now();
        Ok(candidate.clone())
    }

    async fn set_notes(&self, tenant_id: Uuid, id: Uuid, notes: Option<String>) -> Result<Candidate> {
        let mut state = self.state.lock().await;
        let candidate = state.candidate_mut(tenant_id, id)?;
        candidate.notes = notes;
        candidate.updated_at = Utc::now();
        Ok(candidate.clone())
    }

    async fn delete_candidate(&self, tenant_id: Uuid, id: Uuid) -> Result<bool> {
        let mut state = self.state.lock().await;
        let before = state.candidates.len();
        state.candidates.retain(|c| !(c.tenant_id == tenant_id && c.id == id));
        let deleted = state.candidates.len() < before;
        if deleted {
            state.history.retain(|h| h.candidate_id != id);
            state.comments.retain(|c| c.candidate_id != id);
            let feedback_ids: Vec<Uuid> = state
                .candidate_feedback
                .iter()
                .filter(|f| f.candidate_id == id)
                .map(|f| f.id)
                .collect();
            state.candidate_feedback.retain(|f| f.candidate_id != id);
            state
                .responses
                .retain(|r| !feedback_ids.contains(&r.candidate_feedback_id));
        }
        Ok(deleted)
    }

    async fn candidate_history(&self, tenant_id: Uuid, candidate_id: Uuid) -> Result<Vec<PipelineHistory>> {
        let state = self.state.lock().await;
        let mut rows: Vec<PipelineHistory> = state
            .history
            .iter()
            .filter(|h| h.tenant_id == tenant_id && h.candidate_id == candidate_id)
            .cloned()
            .collect();
        rows.reverse();
        Ok(rows)
    }
}

#[async_trait]
impl PipelineStore for MemoryStore {
    async fn list_pipeline_statuses(&self, tenant_id: Uuid) -> Result<Vec<PipelineStatus>> {
        let state = self.state.lock().await;
        let mut statuses: Vec<PipelineStatus> = state
            .pipeline_statuses
            .iter()
            .filter(|s| s.tenant_id == tenant_id)
            .cloned()
            .collect();
        statuses.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.value.cmp(&b.value)));
        Ok(statuses)
    }

    async fn insert_pipeline_status(&self, status: NewPipelineStatus) -> Result<Option<PipelineStatus>> {
        let mut state = self.state.lock().await;
        if state
            .pipeline_statuses
            .iter()
            .any(|s| s.tenant_id == status.tenant_id && s.value == status.value)
        {
            return Ok(None);
        }
        let now = Utc::now();
        let created = PipelineStatus {
            id: Uuid::new_v4(),
            tenant_id: status.tenant_id,
            value: status.value,
            label: status.label,
            order: status.order,
            created_at: now,
            updated_at: now,
        };
        state.pipeline_statuses.push(created.clone());
        Ok(Some(created))
    }

    async fn update_pipeline_status(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        label: Option<String>,
        order: Option<i32>,
    ) -> Result<Option<PipelineStatus>> {
        let mut state = self.state.lock().await;
        Ok(state
            .pipeline_statuses
            .iter_mut()
            .find(|s| s.tenant_id == tenant_id && s.id == id)
            .map(|s| {
                if let Some(label) = label {
                    s.label = label;
                }
                if let Some(order) = order {
                    s.order = order;
                }
                s.updated_at = Utc::now();
                s.clone()
            }))
    }

    async fn reorder_pipeline_statuses(&self, tenant_id: Uuid, orders: &[(Uuid, i32)]) -> Result<()> {
        let mut state = self.state.lock().await;
        for (id, _) in orders {
            if !state
                .pipeline_statuses
                .iter()
                .any(|s| s.tenant_id == tenant_id && s.id == *id)
            {
                return Err(Error::NotFound(format!("Pipeline status {} not found", id)));
            }
        }
        for (id, order) in orders {
            if let Some(s) = state
                .pipeline_statuses
                .iter_mut()
                .find(|s| s.tenant_id == tenant_id && s.id == *id)
            {
                s.order = *order;
                s.updated_at = Utc::now();
            }
        }
        Ok(())
    }

    async fn delete_pipeline_status(&self, tenant_id: Uuid, id: Uuid) -> Result<bool> {
        let mut state = self.state.lock().await;
        let before = state.pipeline_statuses.len();
        state
            .pipeline_statuses
            .retain(|s| !(s.tenant_id == tenant_id && s.id == id));
        Ok(state.pipeline_statuses.len() < before)
    }
}

#[async_trait]
impl FeedbackStore for MemoryStore {
    async fn list_templates(&self, tenant_id: Uuid, active_only: bool) -> Result<Vec<FeedbackTemplate>> {
        let state = self.state.lock().await;
        let mut templates: Vec<FeedbackTemplate> = state
            .templates
            .iter()
            .filter(|t| t.tenant_id == tenant_id && (!active_only || t.is_active))
            .cloned()
            .collect();
        templates.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(templates)
    }

    async fn find_template(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<FeedbackTemplate>> {
        let state = self.state.lock().await;
        Ok(state
            .templates
            .iter()
            .find(|t| t.tenant_id == tenant_id && t.id == id)
            .cloned())
    }

    async fn find_templates(&self, tenant_id: Uuid, ids: &[Uuid]) -> Result<Vec<FeedbackTemplate>> {
        let state = self.state.lock().await;
        Ok(state
            .templates
            .iter()
            .filter(|t| t.tenant_id == tenant_id && ids.contains(&t.id))
            .cloned()
            .collect())
    }

    async fn template_questions(&self, tenant_id: Uuid, template_id: Uuid) -> Result<Vec<FeedbackQuestion>> {
        let state = self.state.lock().await;
        if !state
            .templates
            .iter()
            .any(|t| t.tenant_id == tenant_id && t.id == template_id)
        {
            return Ok(Vec::new());
        }
        let mut questions: Vec<FeedbackQuestion> = state
            .questions
            .iter()
            .filter(|q| q.template_id == template_id)
            .cloned()
            .collect();
        questions.sort_by_key(|q| q.order);
        Ok(questions)
    }

    async fn insert_template(&self, template: NewFeedbackTemplate) -> Result<FeedbackTemplate> {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        let created = FeedbackTemplate {
            id: Uuid::new_v4(),
            tenant_id: template.tenant_id,
            name: template.name,
            template_type: template.template_type,
            description: template.description,
            instructions: template.instructions,
            is_active: template.is_active,
            stage_mappings: template.stage_mappings,
            job_type_mappings: template.job_type_mappings,
            version: 1,
            created_by: template.created_by,
            created_at: now,
            updated_at: now,
        };
        state.push_questions(created.id, template.questions);
        state.templates.push(created.clone());
        Ok(created)
    }

    async fn update_template(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        changes: TemplateChanges,
    ) -> Result<Option<FeedbackTemplate>> {
        let mut state = self.state.lock().await;
        let Some(template) = state
            .templates
            .iter_mut()
            .find(|t| t.tenant_id == tenant_id && t.id == id)
        else {
            return Ok(None);
        };

        if let Some(name) = changes.name {
            template.name = name;
        }
        if let Some(template_type) = changes.template_type {
            template.template_type = template_type;
        }
        if changes.description.is_some() {
            template.description = changes.description;
        }
        if changes.instructions.is_some() {
            template.instructions = changes.instructions;
        }
        if let Some(is_active) = changes.is_active {
            template.is_active = is_active;
        }
        if let Some(stage_mappings) = changes.stage_mappings {
            template.stage_mappings = stage_mappings;
        }
        if let Some(job_type_mappings) = changes.job_type_mappings {
            template.job_type_mappings = job_type_mappings;
        }
        template.version += 1;
        template.updated_at = Utc::now();
        let updated = template.clone();

        if let Some(questions) = changes.questions {
            let removed: Vec<Uuid> = state
                .questions
                .iter()
                .filter(|q| q.template_id == id)
                .map(|q| q.id)
                .collect();
            state.questions.retain(|q| q.template_id != id);
            state.responses.retain(|r| !removed.contains(&r.question_id));
            state.push_questions(id, questions);
        }
        Ok(Some(updated))
    }

    async fn delete_template(&self, tenant_id: Uuid, id: Uuid) -> Result<bool> {
        let mut state = self.state.lock().await;
        let before = state.templates.len();
        state.templates.retain(|t| !(t.tenant_id == tenant_id && t.id == id));
        let deleted = state.templates.len() < before;
        if deleted {
            state.questions.retain(|q| q.template_id != id);
            state.job_templates.retain(|(_, t)| *t != id);
            let feedback_ids: Vec<Uuid> = state
                .candidate_feedback
                .iter()
                .filter(|f| f.template_id == id)
                .map(|f| f.id)
                .collect();
            state.candidate_feedback.retain(|f| f.template_id != id);
            state
                .responses
                .retain(|r| !feedback_ids.contains(&r.candidate_feedback_id));
        }
        Ok(deleted)
    }

    async fn find_candidate_feedback(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<CandidateFeedback>> {
        let state = self.state.lock().await;
        Ok(state
            .candidate_feedback
            .iter()
            .find(|f| f.tenant_id == tenant_id && f.id == id)
            .cloned())
    }

    async fn find_candidate_feedback_by_pair(
        &self,
        tenant_id: Uuid,
        candidate_id: Uuid,
        template_id: Uuid,
    ) -> Result<Option<CandidateFeedback>> {
        let state = self.state.lock().await;
        Ok(state
            .candidate_feedback
            .iter()
            .find(|f| f.tenant_id == tenant_id && f.candidate_id == candidate_id && f.template_id == template_id)
            .cloned())
    }

    async fn list_candidate_feedback(&self, tenant_id: Uuid, candidate_id: Uuid) -> Result<Vec<CandidateFeedback>> {
        let state = self.state.lock().await;
        let mut rows: Vec<CandidateFeedback> = state
            .candidate_feedback
            .iter()
            .filter(|f| f.tenant_id == tenant_id && f.candidate_id == candidate_id)
            .cloned()
            .collect();
        rows.reverse();
        Ok(rows)
    }

    async fn insert_candidate_feedback(&self, row: NewCandidateFeedback) -> Result<Option<CandidateFeedback>> {
        let mut state = self.state.lock().await;
        if state
            .candidate_feedback
            .iter()
            .any(|f| f.candidate_id == row.candidate_id && f.template_id == row.template_id)
        {
            return Ok(None);
        }
        let now = Utc::now();
        let created = CandidateFeedback {
            id: Uuid::new_v4(),
            tenant_id: row.tenant_id,
            candidate_id: row.candidate_id,
            template_id: row.template_id,
            status: FeedbackStatus::NotStarted,
            assigned_by: row.assigned_by,
            assigned_at: now,
            completed_by: None,
            completed_at: None,
            overall_score: None,
            general_comments: None,
            is_manually_assigned: row.is_manually_assigned,
            created_at: now,
            updated_at: now,
        };
        state.candidate_feedback.push(created.clone());
        Ok(Some(created))
    }

    async fn update_candidate_feedback(&self, row: &CandidateFeedback) -> Result<CandidateFeedback> {
        let mut state = self.state.lock().await;
        let existing = state
            .candidate_feedback
            .iter_mut()
            .find(|f| f.tenant_id == row.tenant_id && f.id == row.id)
            .ok_or_else(|| Error::NotFound("Feedback not found".to_string()))?;
        existing.status = row.status;
        existing.completed_by = row.completed_by;
        existing.completed_at = row.completed_at;
        existing.overall_score = row.overall_score;
        existing.general_comments = row.general_comments.clone();
        existing.updated_at = Utc::now();
        Ok(existing.clone())
    }

    async fn delete_candidate_feedback(&self, tenant_id: Uuid, id: Uuid) -> Result<bool> {
        let mut state = self.state.lock().await;
        let before = state.candidate_feedback.len();
        state
            .candidate_feedback
            .retain(|f| !(f.tenant_id == tenant_id && f.id == id));
        let deleted = state.candidate_feedback.len() < before;
        if deleted {
            state.responses.retain(|r| r.candidate_feedback_id != id);
        }
        Ok(deleted)
    }

    async fn upsert_response(&self, response: ResponseUpsert) -> Result<FeedbackResponse> {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        if let Some(existing) = state.responses.iter_mut().find(|r| {
            r.candidate_feedback_id == response.candidate_feedback_id
                && r.question_id == response.question_id
                && r.answered_by == response.answered_by
        }) {
            existing.text_answer = response.text_answer;
            existing.numeric_answer = response.numeric_answer;
            existing.boolean_answer = response.boolean_answer;
            existing.selected_option = response.selected_option;
            existing.comments = response.comments;
            existing.answered_at = now;
            return Ok(existing.clone());
        }
        let saved = FeedbackResponse {
            id: Uuid::new_v4(),
            tenant_id: response.tenant_id,
            candidate_feedback_id: response.candidate_feedback_id,
            question_id: response.question_id,
            answered_by: response.answered_by,
            text_answer: response.text_answer,
            numeric_answer: response.numeric_answer,
            boolean_answer: response.boolean_answer,
            selected_option: response.selected_option,
            comments: response.comments,
            answered_at: now,
        };
        state.responses.push(saved.clone());
        Ok(saved)
    }

    async fn list_responses(&self, tenant_id: Uuid, candidate_feedback_id: Uuid) -> Result<Vec<FeedbackResponse>> {
        let state = self.state.lock().await;
        Ok(state
            .responses
            .iter()
            .filter(|r| r.tenant_id == tenant_id && r.candidate_feedback_id == candidate_feedback_id)
            .cloned()
            .collect())
    }

    async fn feedback_counts(&self, tenant_id: Uuid) -> Result<FeedbackCounts> {
        let state = self.state.lock().await;
        let rows = state.candidate_feedback.iter().filter(|f| f.tenant_id == tenant_id);
        let mut counts = FeedbackCounts::default();
        for row in rows {
            counts.total += 1;
            match row.status {
                FeedbackStatus::Completed => counts.completed += 1,
                FeedbackStatus::InProgress => counts.in_progress += 1,
                FeedbackStatus::NotStarted => {}
            }
        }
        Ok(counts)
    }
}

#[async_trait]
impl NotificationStore for MemoryStore {
    async fn insert_notification(&self, notification: NewNotification) -> Result<Notification> {
        if self
            .failing_notification_users
            .lock()
            .await
            .contains(&notification.user_id)
        {
            return Err(Error::Internal(format!(
                "notification insert for {} failed",
                notification.user_id
            )));
        }
        Ok(self.state.lock().await.push_notification(notification))
    }

    async fn list_notifications(&self, tenant_id: Uuid, user_id: Uuid) -> Result<Vec<Notification>> {
        let state = self.state.lock().await;
        let mut rows: Vec<Notification> = state
            .notifications
            .iter()
            .filter(|n| n.tenant_id == tenant_id && n.user_id == user_id)
            .cloned()
            .collect();
        rows.reverse();
        Ok(rows)
    }

    async fn mark_notifications_read(&self, tenant_id: Uuid, user_id: Uuid, id: Option<Uuid>) -> Result<u64> {
        let mut state = self.state.lock().await;
        let mut marked = 0;
        for n in state
            .notifications
            .iter_mut()
            .filter(|n| n.tenant_id == tenant_id && n.user_id == user_id && !n.is_read)
            .filter(|n| id.map_or(true, |id| n.id == id))
        {
            n.is_read = true;
            marked += 1;
        }
        Ok(marked)
    }
}

#[async_trait]
impl CommentStore for MemoryStore {
    async fn insert_comment(&self, comment: NewComment) -> Result<Comment> {
        if self.failing_comment_inserts.load(Ordering::SeqCst) {
            return Err(Error::Internal("comment insert failed".to_string()));
        }
        let mut state = self.state.lock().await;
        let attachment = comment.attachment;
        let created = Comment {
            id: Uuid::new_v4(),
            tenant_id: comment.tenant_id,
            candidate_id: comment.candidate_id,
            text: comment.text,
            created_by: comment.created_by,
            created_at: Utc::now(),
            attachment_path: attachment.as_ref().map(|a| a.path.clone()),
            attachment_original_name: attachment.as_ref().map(|a| a.original_name.clone()),
            attachment_type: attachment.as_ref().map(|a| a.content_type.clone()),
            attachment_size: attachment.map(|a| a.size),
        };
        state.comments.push(created.clone());
        Ok(created)
    }

    async fn list_comments(&self, tenant_id: Uuid, candidate_id: Uuid) -> Result<Vec<Comment>> {
        let state = self.state.lock().await;
        let mut rows: Vec<Comment> = state
            .comments
            .iter()
            .filter(|c| c.tenant_id == tenant_id && c.candidate_id == candidate_id)
            .cloned()
            .collect();
        rows.sort_by_key(|c| c.created_at);
        Ok(rows)
    }

    async fn find_comment(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Comment>> {
        let state = self.state.lock().await;
        Ok(state
            .comments
            .iter()
            .find(|c| c.tenant_id == tenant_id && c.id == id)
            .cloned())
    }

    async fn clear_comment_attachment(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Comment>> {
        let mut state = self.state.lock().await;
        Ok(state
            .comments
            .iter_mut()
            .find(|c| c.tenant_id == tenant_id && c.id == id)
            .map(|c| {
                c.attachment_path = None;
                c.attachment_original_name = None;
                c.attachment_type = None;
                c.attachment_size = None;
                c.clone()
            }))
    }
}
