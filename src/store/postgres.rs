use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
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
        CandidateFeedback, FeedbackCounts, FeedbackQuestion, FeedbackResponse, FeedbackTemplate,
        NewCandidateFeedback, NewFeedbackTemplate, NewQuestion, ResponseUpsert, TemplateChanges,
    },
    job::{Job, NewJob},
    notification::{NewNotification, Notification},
    pipeline::{NewHistoryEntry, NewPipelineStatus, PipelineHistory, PipelineStatus},
    tenant::Tenant,
    user::User,
};

const CANDIDATE_COLUMNS: &str = "id, tenant_id, job_id, name, first_name, last_name, email, phone, \
     cv_file_path, cover_letter_path, profile_picture, status, interview_date, interview_link, notes, \
     created_by, created_at, updated_at";

const JOB_COLUMNS: &str = "id, tenant_id, title, description, department, status, start_date, \
     expected_closing_date, actual_closing_date, created_by, created_at, updated_at";

const TEMPLATE_COLUMNS: &str = "id, tenant_id, name, template_type, description, instructions, is_active, \
     stage_mappings, job_type_mappings, version, created_by, created_at, updated_at";

const FEEDBACK_COLUMNS: &str = "id, tenant_id, candidate_id, template_id, status, assigned_by, assigned_at, \
     completed_by, completed_at, overall_score, general_comments, is_manually_assigned, created_at, updated_at";

const RESPONSE_COLUMNS: &str = "id, tenant_id, candidate_feedback_id, question_id, answered_by, text_answer, \
     numeric_answer, boolean_answer, selected_option, comments, answered_at";

const COMMENT_COLUMNS: &str = "id, tenant_id, candidate_id, text, created_by, created_at, attachment_path, \
     attachment_original_name, attachment_type, attachment_size";

const NOTIFICATION_COLUMNS: &str =
    "id, tenant_id, user_id, kind, message, is_read, related_entity_id, created_at";

fn column<T: std::str::FromStr<Err = E>, E: std::fmt::Display>(raw: &str) -> Result<T> {
    raw.parse()
        .map_err(|e: E| Error::Internal(format!("corrupt column value: {}", e)))
}

#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    tenant_id: Uuid,
    email: String,
    name: Option<String>,
    role: String,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = Error;

    fn try_from(row: UserRow) -> Result<Self> {
        Ok(User {
            id: row.id,
            tenant_id: row.tenant_id,
            email: row.email,
            name: row.name,
            role: column(&row.role)?,
            is_active: row.is_active,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct JobRow {
    id: Uuid,
    tenant_id: Uuid,
    title: String,
    description: String,
    department: Option<String>,
    status: String,
    start_date: Option<NaiveDate>,
    expected_closing_date: Option<NaiveDate>,
    actual_closing_date: Option<NaiveDate>,
    created_by: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<JobRow> for Job {
    type Error = Error;

    fn try_from(row: JobRow) -> Result<Self> {
        Ok(Job {
            id: row.id,
            tenant_id: row.tenant_id,
            title: row.title,
            description: row.description,
            department: row.department,
            status: column(&row.status)?,
            start_date: row.start_date,
            expected_closing_date: row.expected_closing_date,
            actual_closing_date: row.actual_closing_date,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct TemplateRow {
    id: Uuid,
    tenant_id: Uuid,
    name: String,
    template_type: String,
    description: Option<String>,
    instructions: Option<String>,
    is_active: bool,
    stage_mappings: Json<Vec<String>>,
    job_type_mappings: Json<Vec<String>>,
    version: i32,
    created_by: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TemplateRow> for FeedbackTemplate {
    type Error = Error;

    fn try_from(row: TemplateRow) -> Result<Self> {
        Ok(FeedbackTemplate {
            id: row.id,
            tenant_id: row.tenant_id,
            name: row.name,
            template_type: column(&row.template_type)?,
            description: row.description,
            instructions: row.instructions,
            is_active: row.is_active,
            stage_mappings: row.stage_mappings.0,
            job_type_mappings: row.job_type_mappings.0,
            version: row.version,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct QuestionRow {
    id: Uuid,
    template_id: Uuid,
    question: String,
    question_type: String,
    required: bool,
    help_text: Option<String>,
    options: Json<Vec<String>>,
    min_rating: Option<i32>,
    max_rating: Option<i32>,
    sort_order: i32,
}

impl TryFrom<QuestionRow> for FeedbackQuestion {
    type Error = Error;

    fn try_from(row: QuestionRow) -> Result<Self> {
        Ok(FeedbackQuestion {
            id: row.id,
            template_id: row.template_id,
            question: row.question,
            question_type: column(&row.question_type)?,
            required: row.required,
            help_text: row.help_text,
            options: row.options.0,
            min_rating: row.min_rating,
            max_rating: row.max_rating,
            order: row.sort_order,
        })
    }
}

#[derive(FromRow)]
struct FeedbackRow {
    id: Uuid,
    tenant_id: Uuid,
    candidate_id: Uuid,
    template_id: Uuid,
    status: String,
    assigned_by: Option<Uuid>,
    assigned_at: DateTime<Utc>,
    completed_by: Option<Uuid>,
    completed_at: Option<DateTime<Utc>>,
    overall_score: Option<f64>,
    general_comments: Option<String>,
    is_manually_assigned: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<FeedbackRow> for CandidateFeedback {
    type Error = Error;

    fn try_from(row: FeedbackRow) -> Result<Self> {
        Ok(CandidateFeedback {
            id: row.id,
            tenant_id: row.tenant_id,
            candidate_id: row.candidate_id,
            template_id: row.template_id,
            status: column(&row.status)?,
            assigned_by: row.assigned_by,
            assigned_at: row.assigned_at,
            completed_by: row.completed_by,
            completed_at: row.completed_at,
            overall_score: row.overall_score,
            general_comments: row.general_comments,
            is_manually_assigned: row.is_manually_assigned,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct NotificationRow {
    id: Uuid,
    tenant_id: Uuid,
    user_id: Uuid,
    kind: String,
    message: String,
    is_read: bool,
    related_entity_id: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = Error;

    fn try_from(row: NotificationRow) -> Result<Self> {
        Ok(Notification {
            id: row.id,
            tenant_id: row.tenant_id,
            user_id: row.user_id,
            kind: column(&row.kind)?,
            message: row.message,
            is_read: row.is_read,
            related_entity_id: row.related_entity_id,
            created_at: row.created_at,
        })
    }
}

fn convert_all<R, T>(rows: Vec<R>) -> Result<Vec<T>>
where
    T: TryFrom<R, Error = Error>,
{
    rows.into_iter().map(T::try_from).collect()
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

async fn insert_history(tx: &mut Transaction<'_, Postgres>, tenant_id: Uuid, entry: &NewHistoryEntry) -> Result<()> {
    sqlx::query(
        "INSERT INTO pipeline_history (tenant_id, candidate_id, old_status, new_status, changed_by) \
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(tenant_id)
    .bind(entry.candidate_id)
    .bind(&entry.old_status)
    .bind(&entry.new_status)
    .bind(entry.changed_by)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn insert_questions(tx: &mut Transaction<'_, Postgres>, template_id: Uuid, questions: &[NewQuestion]) -> Result<()> {
    for (index, q) in questions.iter().enumerate() {
        sqlx::query(
            "INSERT INTO feedback_questions \
             (template_id, question, question_type, required, help_text, options, min_rating, max_rating, sort_order) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(template_id)
        .bind(&q.question)
        .bind(q.question_type.as_str())
        .bind(q.required)
        .bind(&q.help_text)
        .bind(Json(&q.options))
        .bind(q.min_rating)
        .bind(q.max_rating)
        .bind(index as i32)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

#[async_trait]
impl TenantStore for PgStore {
    async fn find_tenant_by_name(&self, name: &str) -> Result<Option<Tenant>> {
        let tenant = sqlx::query_as::<_, Tenant>("SELECT id, name, is_active FROM tenants WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(tenant)
    }

    async fn set_tenant_active(&self, name: &str, is_active: bool) -> Result<Option<Tenant>> {
        let tenant = sqlx::query_as::<_, Tenant>(
            "UPDATE tenants SET is_active = $2 WHERE name = $1 RETURNING id, name, is_active",
        )
        .bind(name)
        .bind(is_active)
        .fetch_optional(&self.pool)
        .await?;
        Ok(tenant)
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn find_user(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, tenant_id, email, name, role, is_active, created_at FROM users \
             WHERE tenant_id = $1 AND id = $2",
        )
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(User::try_from).transpose()
    }

    async fn find_users(&self, tenant_id: Uuid, ids: &[Uuid]) -> Result<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(
            "SELECT id, tenant_id, email, name, role, is_active, created_at FROM users \
             WHERE tenant_id = $1 AND id = ANY($2)",
        )
        .bind(tenant_id)
        .bind(ids.to_vec())
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }
}

#[async_trait]
impl JobStore for PgStore {
    async fn insert_job(&self, job: NewJob) -> Result<Job> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, JobRow>(&format!(
            "INSERT INTO jobs (tenant_id, title, description, department, start_date, expected_closing_date, created_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {}",
            JOB_COLUMNS
        ))
        .bind(job.tenant_id)
        .bind(&job.title)
        .bind(&job.description)
        .bind(&job.department)
        .bind(job.start_date)
        .bind(job.expected_closing_date)
        .bind(job.created_by)
        .fetch_one(&mut *tx)
        .await?;

        for user_id in &job.assignee_ids {
            sqlx::query("INSERT INTO job_assignees (job_id, user_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
                .bind(row.id)
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
        }

        for template_id in &job.feedback_template_ids {
            sqlx::query(
                "INSERT INTO job_feedback_templates (job_id, template_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(row.id)
            .bind(template_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Job::try_from(row)
    }

    async fn find_job(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Job>> {
        let row = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {} FROM jobs WHERE tenant_id = $1 AND id = $2",
            JOB_COLUMNS
        ))
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Job::try_from).transpose()
    }

    async fn list_jobs(&self, tenant_id: Uuid, visible_to: Option<Uuid>) -> Result<Vec<Job>> {
        let rows = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {} FROM jobs WHERE tenant_id = $1 AND ($2::uuid IS NULL OR created_by = $2 \
             OR EXISTS (SELECT 1 FROM job_assignees ja WHERE ja.job_id = jobs.id AND ja.user_id = $2)) \
             ORDER BY created_at DESC",
            JOB_COLUMNS
        ))
        .bind(tenant_id)
        .bind(visible_to)
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    async fn close_job(&self, tenant_id: Uuid, id: Uuid, closed_on: NaiveDate) -> Result<Job> {
        let row = sqlx::query_as::<_, JobRow>(&format!(
            "UPDATE jobs SET status = 'closed', actual_closing_date = $3, updated_at = NOW() \
             WHERE tenant_id = $1 AND id = $2 RETURNING {}",
            JOB_COLUMNS
        ))
        .bind(tenant_id)
        .bind(id)
        .bind(closed_on)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound("Job not found".to_string()))?;
        Job::try_from(row)
    }

    async fn job_assignees(&self, tenant_id: Uuid, job_id: Uuid) -> Result<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(
            "SELECT u.id, u.tenant_id, u.email, u.name, u.role, u.is_active, u.created_at \
             FROM users u JOIN job_assignees ja ON ja.user_id = u.id JOIN jobs j ON j.id = ja.job_id \
             WHERE j.tenant_id = $1 AND ja.job_id = $2",
        )
        .bind(tenant_id)
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    async fn replace_job_assignees(&self, tenant_id: Uuid, job_id: Uuid, user_ids: &[Uuid]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let owned = sqlx::query("SELECT 1 FROM jobs WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id)
            .bind(job_id)
            .fetch_optional(&mut *tx)
            .await?;
        if owned.is_none() {
            return Err(Error::NotFound("Job not found".to_string()));
        }

        sqlx::query("DELETE FROM job_assignees WHERE job_id = $1")
            .bind(job_id)
            .execute(&mut *tx)
            .await?;

        for user_id in user_ids {
            sqlx::query("INSERT INTO job_assignees (job_id, user_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
                .bind(job_id)
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn job_template_ids(&self, tenant_id: Uuid, job_id: Uuid) -> Result<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT jft.template_id FROM job_feedback_templates jft JOIN jobs j ON j.id = jft.job_id \
             WHERE j.tenant_id = $1 AND jft.job_id = $2",
        )
        .bind(tenant_id)
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }
}

#[async_trait]
impl CandidateStore for PgStore {
    async fn insert_candidate(&self, candidate: NewCandidate) -> Result<Candidate> {
        let mut tx = self.pool.begin().await?;

        let created = sqlx::query_as::<_, Candidate>(&format!(
            "INSERT INTO candidates \
             (tenant_id, job_id, name, first_name, last_name, email, phone, cv_file_path, cover_letter_path, status, created_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) RETURNING {}",
            CANDIDATE_COLUMNS
        ))
        .bind(candidate.tenant_id)
        .bind(candidate.job_id)
        .bind(&candidate.name)
        .bind(&candidate.first_name)
        .bind(&candidate.last_name)
        .bind(&candidate.email)
        .bind(&candidate.phone)
        .bind(&candidate.cv_file_path)
        .bind(&candidate.cover_letter_path)
        .bind(&candidate.status)
        .bind(candidate.created_by)
        .fetch_one(&mut *tx)
        .await?;

        let entry = NewHistoryEntry {
            candidate_id: created.id,
            old_status: None,
            new_status: created.status.clone(),
            changed_by: candidate.created_by,
        };
        insert_history(&mut tx, candidate.tenant_id, &entry).await?;

        tx.commit().await?;
        Ok(created)
    }

    async fn find_candidate(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Candidate>> {
        let candidate = sqlx::query_as::<_, Candidate>(&format!(
            "SELECT {} FROM candidates WHERE tenant_id = $1 AND id = $2",
            CANDIDATE_COLUMNS
        ))
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(candidate)
    }

    async fn find_candidates(&self, tenant_id: Uuid, ids: &[Uuid]) -> Result<Vec<Candidate>> {
        let candidates = sqlx::query_as::<_, Candidate>(&format!(
            "SELECT {} FROM candidates WHERE tenant_id = $1 AND id = ANY($2)",
            CANDIDATE_COLUMNS
        ))
        .bind(tenant_id)
        .bind(ids.to_vec())
        .fetch_all(&self.pool)
        .await?;
        Ok(candidates)
    }

    async fn list_candidates(&self, tenant_id: Uuid, page: Page) -> Result<(Vec<Candidate>, i64)> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM candidates WHERE tenant_id = $1")
            .bind(tenant_id)
            .fetch_one(&self.pool)
            .await?;

        let candidates = sqlx::query_as::<_, Candidate>(&format!(
            "SELECT {} FROM candidates WHERE tenant_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
            CANDIDATE_COLUMNS
        ))
        .bind(tenant_id)
        .bind(page.limit)
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok((candidates, total))
    }

    async fn list_job_candidates(&self, tenant_id: Uuid, job_id: Uuid) -> Result<Vec<Candidate>> {
        let candidates = sqlx::query_as::<_, Candidate>(&format!(
            "SELECT {} FROM candidates WHERE tenant_id = $1 AND job_id = $2 ORDER BY created_at DESC",
            CANDIDATE_COLUMNS
        ))
        .bind(tenant_id)
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(candidates)
    }

    async fn write_status(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        write: StatusWrite,
        changed_by: Option<Uuid>,
    ) -> Result<StatusChange> {
        let mut tx = self.pool.begin().await?;

        let previous_status = sqlx::query_scalar::<_, String>(
            "SELECT status FROM candidates WHERE tenant_id = $1 AND id = $2 FOR UPDATE",
        )
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| Error::NotFound("Candidate not found".to_string()))?;

        let updated = sqlx::query_as::<_, Candidate>(&format!(
            "UPDATE candidates SET status = $3, interview_date = COALESCE($4, interview_date), \
             interview_link = COALESCE($5, interview_link), updated_at = NOW() \
             WHERE tenant_id = $1 AND id = $2 RETURNING {}",
            CANDIDATE_COLUMNS
        ))
        .bind(tenant_id)
        .bind(id)
        .bind(&write.status)
        .bind(write.interview_date)
        .bind(&write.interview_link)
        .fetch_one(&mut *tx)
        .await?;

        if previous_status != updated.status {
            let entry = NewHistoryEntry {
                candidate_id: id,
                old_status: Some(previous_status.clone()),
                new_status: updated.status.clone(),
                changed_by,
            };
            insert_history(&mut tx, tenant_id, &entry).await?;
        }

        tx.commit().await?;
        Ok(StatusChange {
            candidate: updated,
            previous_status,
        })
    }

    async fn apply_bulk_transitions(
        &self,
        tenant_id: Uuid,
        transitions: Vec<BulkTransition>,
    ) -> Result<Vec<StatusChange>> {
        let mut tx = self.pool.begin().await?;

        // Locked in id order so overlapping batches queue instead of deadlocking.
        let ids: Vec<Uuid> = transitions.iter().map(|t| t.candidate_id).collect();
        let locked: HashMap<Uuid, String> = sqlx::query_as::<_, (Uuid, String)>(
            "SELECT id, status FROM candidates WHERE tenant_id = $1 AND id = ANY($2) ORDER BY id FOR UPDATE",
        )
        .bind(tenant_id)
        .bind(&ids)
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .collect();

        let mut changes = Vec::with_capacity(transitions.len());
        for transition in &transitions {
            let previous_status = locked
                .get(&transition.candidate_id)
                .cloned()
                .ok_or_else(|| Error::NotFound("Candidate not found".to_string()))?;

            let candidate = sqlx::query_as::<_, Candidate>(&format!(
                "UPDATE candidates SET status = $3, updated_at = NOW() \
                 WHERE tenant_id = $1 AND id = $2 RETURNING {}",
                CANDIDATE_COLUMNS
            ))
            .bind(tenant_id)
            .bind(transition.candidate_id)
            .bind(&transition.new_status)
            .fetch_one(&mut *tx)
            .await?;

            if previous_status != transition.new_status {
                let entry = NewHistoryEntry {
                    candidate_id: transition.candidate_id,
                    old_status: Some(previous_status.clone()),
                    new_status: transition.new_status.clone(),
                    changed_by: transition.changed_by,
                };
                insert_history(&mut tx, tenant_id, &entry).await?;

                for n in &transition.notifications {
                    sqlx::query(
                        "INSERT INTO notifications (tenant_id, user_id, kind, message, related_entity_id) \
                         VALUES ($1, $2, $3, $4, $5)",
                    )
                    .bind(tenant_id)
                    .bind(n.user_id)
                    .bind(n.kind.as_str())
                    .bind(&n.message)
                    .bind(n.related_entity_id)
                    .execute(&mut *tx)
                    .await?;
                }
            }

            changes.push(StatusChange {
                candidate,
                previous_status,
            });
        }

        tx.commit().await?;
        Ok(changes)
    }

    async fn count_candidates_in_status(&self, tenant_id: Uuid, status: &str) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM candidates WHERE tenant_id = $1 AND status = $2",
        )
        .bind(tenant_id)
        .bind(status)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn set_cv_path(&self, tenant_id: Uuid, id: Uuid, cv_file_path: &str) -> Result<Candidate> {
        let candidate = sqlx::query_as::<_, Candidate>(&format!(
            "UPDATE candidates SET cv_file_path = $3, updated_at = NOW() \
             WHERE tenant_id = $1 AND id = $2 RETURNING {}",
            CANDIDATE_COLUMNS
        ))
        .bind(tenant_id)
        .bind(id)
        .bind(cv_file_path)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound("Candidate not found".to_string()))?;
        Ok(candidate)
    }

    async fn set_notes(&self, tenant_id: Uuid, id: Uuid, notes: Option<String>) -> Result<Candidate> {
        let candidate = sqlx::query_as::<_, Candidate>(&format!(
            "UPDATE candidates SET notes = $3, updated_at = NOW() \
             WHERE tenant_id = $1 AND id = $2 RETURNING {}",
            CANDIDATE_COLUMNS
        ))
        .bind(tenant_id)
        .bind(id)
        .bind(notes)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound("Candidate not found".to_string()))?;
        Ok(candidate)
    }

    async fn delete_candidate(&self, tenant_id: Uuid, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM candidates WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn candidate_history(&self, tenant_id: Uuid, candidate_id: Uuid) -> Result<Vec<PipelineHistory>> {
        let history = sqlx::query_as::<_, PipelineHistory>(
            "SELECT id, tenant_id, candidate_id, old_status, new_status, changed_by, changed_at \
             FROM pipeline_history WHERE tenant_id = $1 AND candidate_id = $2 \
             ORDER BY changed_at DESC",
        )
        .bind(tenant_id)
        .bind(candidate_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(history)
    }
}

#[async_trait]
impl PipelineStore for PgStore {
    async fn list_pipeline_statuses(&self, tenant_id: Uuid) -> Result<Vec<PipelineStatus>> {
        let statuses = sqlx::query_as::<_, PipelineStatus>(
            "SELECT id, tenant_id, value, label, sort_order, created_at, updated_at \
             FROM pipeline_statuses WHERE tenant_id = $1 ORDER BY sort_order, value",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(statuses)
    }

    async fn insert_pipeline_status(&self, status: NewPipelineStatus) -> Result<Option<PipelineStatus>> {
        let created = sqlx::query_as::<_, PipelineStatus>(
            "INSERT INTO pipeline_statuses (tenant_id, value, label, sort_order) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (tenant_id, value) DO NOTHING \
             RETURNING id, tenant_id, value, label, sort_order, created_at, updated_at",
        )
        .bind(status.tenant_id)
        .bind(&status.value)
        .bind(&status.label)
        .bind(status.order)
        .fetch_optional(&self.pool)
        .await?;
        Ok(created)
    }

    async fn update_pipeline_status(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        label: Option<String>,
        order: Option<i32>,
    ) -> Result<Option<PipelineStatus>> {
        let updated = sqlx::query_as::<_, PipelineStatus>(
            "UPDATE pipeline_statuses SET label = COALESCE($3, label), sort_order = COALESCE($4, sort_order), \
             updated_at = NOW() WHERE tenant_id = $1 AND id = $2 \
             RETURNING id, tenant_id, value, label, sort_order, created_at, updated_at",
        )
        .bind(tenant_id)
        .bind(id)
        .bind(label)
        .bind(order)
        .fetch_optional(&self.pool)
        .await?;
        Ok(updated)
    }

    async fn reorder_pipeline_statuses(&self, tenant_id: Uuid, orders: &[(Uuid, i32)]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for (id, order) in orders {
            let result = sqlx::query(
                "UPDATE pipeline_statuses SET sort_order = $3, updated_at = NOW() WHERE tenant_id = $1 AND id = $2",
            )
            .bind(tenant_id)
            .bind(id)
            .bind(order)
            .execute(&mut *tx)
            .await?;
            if result.rows_affected() == 0 {
                return Err(Error::NotFound(format!("Pipeline status {} not found", id)));
            }
        }
        tx.commit().await?;
        Ok(())
    }

    async fn delete_pipeline_status(&self, tenant_id: Uuid, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM pipeline_statuses WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl FeedbackStore for PgStore {
    async fn list_templates(&self, tenant_id: Uuid, active_only: bool) -> Result<Vec<FeedbackTemplate>> {
        let rows = sqlx::query_as::<_, TemplateRow>(&format!(
            "SELECT {} FROM feedback_templates WHERE tenant_id = $1 AND ($2 = FALSE OR is_active) ORDER BY name",
            TEMPLATE_COLUMNS
        ))
        .bind(tenant_id)
        .bind(active_only)
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    async fn find_template(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<FeedbackTemplate>> {
        let row = sqlx::query_as::<_, TemplateRow>(&format!(
            "SELECT {} FROM feedback_templates WHERE tenant_id = $1 AND id = $2",
            TEMPLATE_COLUMNS
        ))
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(FeedbackTemplate::try_from).transpose()
    }

    async fn find_templates(&self, tenant_id: Uuid, ids: &[Uuid]) -> Result<Vec<FeedbackTemplate>> {
        let rows = sqlx::query_as::<_, TemplateRow>(&format!(
            "SELECT {} FROM feedback_templates WHERE tenant_id = $1 AND id = ANY($2)",
            TEMPLATE_COLUMNS
        ))
        .bind(tenant_id)
        .bind(ids.to_vec())
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    async fn template_questions(&self, tenant_id: Uuid, template_id: Uuid) -> Result<Vec<FeedbackQuestion>> {
        let rows = sqlx::query_as::<_, QuestionRow>(
            "SELECT q.id, q.template_id, q.question, q.question_type, q.required, q.help_text, q.options, \
             q.min_rating, q.max_rating, q.sort_order \
             FROM feedback_questions q JOIN feedback_templates t ON t.id = q.template_id \
             WHERE t.tenant_id = $1 AND q.template_id = $2 ORDER BY q.sort_order",
        )
        .bind(tenant_id)
        .bind(template_id)
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    async fn insert_template(&self, template: NewFeedbackTemplate) -> Result<FeedbackTemplate> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, TemplateRow>(&format!(
            "INSERT INTO feedback_templates \
             (tenant_id, name, template_type, description, instructions, is_active, stage_mappings, job_type_mappings, created_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING {}",
            TEMPLATE_COLUMNS
        ))
        .bind(template.tenant_id)
        .bind(&template.name)
        .bind(template.template_type.as_str())
        .bind(&template.description)
        .bind(&template.instructions)
        .bind(template.is_active)
        .bind(Json(&template.stage_mappings))
        .bind(Json(&template.job_type_mappings))
        .bind(template.created_by)
        .fetch_one(&mut *tx)
        .await?;

        insert_questions(&mut tx, row.id, &template.questions).await?;

        tx.commit().await?;
        FeedbackTemplate::try_from(row)
    }

    async fn update_template(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        changes: TemplateChanges,
    ) -> Result<Option<FeedbackTemplate>> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, TemplateRow>(&format!(
            "UPDATE feedback_templates SET name = COALESCE($3, name), template_type = COALESCE($4, template_type), \
             description = COALESCE($5, description), instructions = COALESCE($6, instructions), \
             is_active = COALESCE($7, is_active), stage_mappings = COALESCE($8, stage_mappings), \
             job_type_mappings = COALESCE($9, job_type_mappings), version = version + 1, updated_at = NOW() \
             WHERE tenant_id = $1 AND id = $2 RETURNING {}",
            TEMPLATE_COLUMNS
        ))
        .bind(tenant_id)
        .bind(id)
        .bind(&changes.name)
        .bind(changes.template_type.map(|t| t.as_str()))
        .bind(&changes.description)
        .bind(&changes.instructions)
        .bind(changes.is_active)
        .bind(changes.stage_mappings.as_ref().map(Json))
        .bind(changes.job_type_mappings.as_ref().map(Json))
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        if let Some(questions) = &changes.questions {
            sqlx::query("DELETE FROM feedback_questions WHERE template_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            insert_questions(&mut tx, id, questions).await?;
        }

        tx.commit().await?;
        FeedbackTemplate::try_from(row).map(Some)
    }

    async fn delete_template(&self, tenant_id: Uuid, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM feedback_templates WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_candidate_feedback(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<CandidateFeedback>> {
        let row = sqlx::query_as::<_, FeedbackRow>(&format!(
            "SELECT {} FROM candidate_feedback WHERE tenant_id = $1 AND id = $2",
            FEEDBACK_COLUMNS
        ))
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(CandidateFeedback::try_from).transpose()
    }

    async fn find_candidate_feedback_by_pair(
        &self,
        tenant_id: Uuid,
        candidate_id: Uuid,
        template_id: Uuid,
    ) -> Result<Option<CandidateFeedback>> {
        let row = sqlx::query_as::<_, FeedbackRow>(&format!(
            "SELECT {} FROM candidate_feedback WHERE tenant_id = $1 AND candidate_id = $2 AND template_id = $3",
            FEEDBACK_COLUMNS
        ))
        .bind(tenant_id)
        .bind(candidate_id)
        .bind(template_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(CandidateFeedback::try_from).transpose()
    }

    async fn list_candidate_feedback(&self, tenant_id: Uuid, candidate_id: Uuid) -> Result<Vec<CandidateFeedback>> {
        let rows = sqlx::query_as::<_, FeedbackRow>(&format!(
            "SELECT {} FROM candidate_feedback WHERE tenant_id = $1 AND candidate_id = $2 ORDER BY assigned_at DESC",
            FEEDBACK_COLUMNS
        ))
        .bind(tenant_id)
        .bind(candidate_id)
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    async fn insert_candidate_feedback(&self, row: NewCandidateFeedback) -> Result<Option<CandidateFeedback>> {
        let created = sqlx::query_as::<_, FeedbackRow>(&format!(
            "INSERT INTO candidate_feedback (tenant_id, candidate_id, template_id, assigned_by, is_manually_assigned) \
             VALUES ($1, $2, $3, $4, $5) ON CONFLICT (candidate_id, template_id) DO NOTHING RETURNING {}",
            FEEDBACK_COLUMNS
        ))
        .bind(row.tenant_id)
        .bind(row.candidate_id)
        .bind(row.template_id)
        .bind(row.assigned_by)
        .bind(row.is_manually_assigned)
        .fetch_optional(&self.pool)
        .await?;
        created.map(CandidateFeedback::try_from).transpose()
    }

    async fn update_candidate_feedback(&self, row: &CandidateFeedback) -> Result<CandidateFeedback> {
        let updated = sqlx::query_as::<_, FeedbackRow>(&format!(
            "UPDATE candidate_feedback SET status = $3, completed_by = $4, completed_at = $5, overall_score = $6, \
             general_comments = $7, updated_at = NOW() WHERE tenant_id = $1 AND id = $2 RETURNING {}",
            FEEDBACK_COLUMNS
        ))
        .bind(row.tenant_id)
        .bind(row.id)
        .bind(row.status.as_str())
        .bind(row.completed_by)
        .bind(row.completed_at)
        .bind(row.overall_score)
        .bind(&row.general_comments)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound("Feedback not found".to_string()))?;
        CandidateFeedback::try_from(updated)
    }

    async fn delete_candidate_feedback(&self, tenant_id: Uuid, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM candidate_feedback WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn upsert_response(&self, response: ResponseUpsert) -> Result<FeedbackResponse> {
        let saved = sqlx::query_as::<_, FeedbackResponse>(&format!(
            "INSERT INTO feedback_responses \
             (tenant_id, candidate_feedback_id, question_id, answered_by, text_answer, numeric_answer, \
              boolean_answer, selected_option, comments) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             ON CONFLICT (candidate_feedback_id, question_id, answered_by) DO UPDATE SET \
             text_answer = EXCLUDED.text_answer, numeric_answer = EXCLUDED.numeric_answer, \
             boolean_answer = EXCLUDED.boolean_answer, selected_option = EXCLUDED.selected_option, \
             comments = EXCLUDED.comments, answered_at = NOW() \
             RETURNING {}",
            RESPONSE_COLUMNS
        ))
        .bind(response.tenant_id)
        .bind(response.candidate_feedback_id)
        .bind(response.question_id)
        .bind(response.answered_by)
        .bind(&response.text_answer)
        .bind(response.numeric_answer)
        .bind(response.boolean_answer)
        .bind(&response.selected_option)
        .bind(&response.comments)
        .fetch_one(&self.pool)
        .await?;
        Ok(saved)
    }

    async fn list_responses(&self, tenant_id: Uuid, candidate_feedback_id: Uuid) -> Result<Vec<FeedbackResponse>> {
        let responses = sqlx::query_as::<_, FeedbackResponse>(&format!(
            "SELECT {} FROM feedback_responses WHERE tenant_id = $1 AND candidate_feedback_id = $2 \
             ORDER BY answered_at",
            RESPONSE_COLUMNS
        ))
        .bind(tenant_id)
        .bind(candidate_feedback_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(responses)
    }

    async fn feedback_counts(&self, tenant_id: Uuid) -> Result<FeedbackCounts> {
        let (total, completed, in_progress) = sqlx::query_as::<_, (i64, i64, i64)>(
            "SELECT COUNT(*), COUNT(*) FILTER (WHERE status = 'completed'), \
             COUNT(*) FILTER (WHERE status = 'in_progress') \
             FROM candidate_feedback WHERE tenant_id = $1",
        )
        .bind(tenant_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(FeedbackCounts {
            total,
            completed,
            in_progress,
        })
    }
}

#[async_trait]
impl NotificationStore for PgStore {
    async fn insert_notification(&self, notification: NewNotification) -> Result<Notification> {
        let row = sqlx::query_as::<_, NotificationRow>(&format!(
            "INSERT INTO notifications (tenant_id, user_id, kind, message, related_entity_id) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            NOTIFICATION_COLUMNS
        ))
        .bind(notification.tenant_id)
        .bind(notification.user_id)
        .bind(notification.kind.as_str())
        .bind(&notification.message)
        .bind(notification.related_entity_id)
        .fetch_one(&self.pool)
        .await?;
        Notification::try_from(row)
    }

    async fn list_notifications(&self, tenant_id: Uuid, user_id: Uuid) -> Result<Vec<Notification>> {
        let rows = sqlx::query_as::<_, NotificationRow>(&format!(
            "SELECT {} FROM notifications WHERE tenant_id = $1 AND user_id = $2 ORDER BY created_at DESC",
            NOTIFICATION_COLUMNS
        ))
        .bind(tenant_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    async fn mark_notifications_read(&self, tenant_id: Uuid, user_id: Uuid, id: Option<Uuid>) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = TRUE \
             WHERE tenant_id = $1 AND user_id = $2 AND ($3::uuid IS NULL OR id = $3) AND is_read = FALSE",
        )
        .bind(tenant_id)
        .bind(user_id)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl CommentStore for PgStore {
    async fn insert_comment(&self, comment: NewComment) -> Result<Comment> {
        let attachment = comment.attachment.as_ref();
        let row = sqlx::query_as::<_, Comment>(&format!(
            "INSERT INTO comments (tenant_id, candidate_id, text, created_by, attachment_path, \
             attachment_original_name, attachment_type, attachment_size) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {}",
            COMMENT_COLUMNS
        ))
        .bind(comment.tenant_id)
        .bind(comment.candidate_id)
        .bind(&comment.text)
        .bind(comment.created_by)
        .bind(attachment.map(|a| a.path.as_str()))
        .bind(attachment.map(|a| a.original_name.as_str()))
        .bind(attachment.map(|a| a.content_type.as_str()))
        .bind(attachment.map(|a| a.size))
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn list_comments(&self, tenant_id: Uuid, candidate_id: Uuid) -> Result<Vec<Comment>> {
        let rows = sqlx::query_as::<_, Comment>(&format!(
            "SELECT {} FROM comments WHERE tenant_id = $1 AND candidate_id = $2 ORDER BY created_at ASC",
            COMMENT_COLUMNS
        ))
        .bind(tenant_id)
        .bind(candidate_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn find_comment(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Comment>> {
        let row = sqlx::query_as::<_, Comment>(&format!(
            "SELECT {} FROM comments WHERE tenant_id = $1 AND id = $2",
            COMMENT_COLUMNS
        ))
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn clear_comment_attachment(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<Comment>> {
        let row = sqlx::query_as::<_, Comment>(&format!(
            "UPDATE comments SET attachment_path = NULL, attachment_original_name = NULL, \
             attachment_type = NULL, attachment_size = NULL \
             WHERE tenant_id = $1 AND id = $2 RETURNING {}",
            COMMENT_COLUMNS
        ))
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}
