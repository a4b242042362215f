use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use super::email_service::EmailMessage;
use super::notification_service::{Announcement, NotificationService};
use crate::dto::job_dto::{CreateJobPayload, JobDetails};
use crate::error::{Error, Result};
use crate::models::feedback::TemplateWithQuestions;
use crate::models::job::{Job, NewJob};
use crate::models::notification::NotificationKind;
use crate::models::user::{Permission, Role, User};
use crate::store::Store;

#[derive(Clone)]
pub struct JobService {
    store: Arc<dyn Store>,
    notifications: NotificationService,
}

impl JobService {
    pub fn new(store: Arc<dyn Store>, notifications: NotificationService) -> Self {
        Self { store, notifications }
    }

    pub async fn create(
        &self,
        tenant_id: Uuid,
        created_by: Uuid,
        role: Role,
        payload: CreateJobPayload,
    ) -> Result<JobDetails> {
        if !role.has_permission(Permission::CreateJobs) {
            return Err(Error::Forbidden("You do not have permission to create jobs".to_string()));
        }
        if payload.title.trim().is_empty() || payload.description.trim().is_empty() {
            return Err(Error::BadRequest(
                "Title, description, and expected closing date are required".to_string(),
            ));
        }

        let start_date = payload.start_date.unwrap_or_else(|| Utc::now().date_naive());
        if payload.expected_closing_date <= start_date {
            return Err(Error::BadRequest(
                "Expected closing date must be after start date".to_string(),
            ));
        }

        let template_ids = dedup(payload.feedback_template_ids);
        if template_ids.is_empty() {
            return Err(Error::BadRequest(
                "At least one feedback template must be selected".to_string(),
            ));
        }
        let templates = self.store.find_templates(tenant_id, &template_ids).await?;
        if templates.len() != template_ids.len() {
            return Err(Error::BadRequest(
                "One or more feedback templates not found or invalid".to_string(),
            ));
        }

        let mut assignee_ids = vec![created_by];
        assignee_ids.extend(payload.assignee_ids);
        let assignee_ids = dedup(assignee_ids);
        let assignees = self.users(tenant_id, &assignee_ids).await?;

        let job = self
            .store
            .insert_job(NewJob {
                tenant_id,
                title: payload.title,
                description: payload.description,
                department: payload.department,
                start_date: Some(start_date),
                expected_closing_date: Some(payload.expected_closing_date),
                created_by,
                assignee_ids,
                feedback_template_ids: template_ids.clone(),
            })
            .await?;
        tracing::info!(tenant_id = %tenant_id, job_id = %job.id, "job created");

        let others: Vec<User> = assignees
            .iter()
            .filter(|u| u.id != created_by)
            .cloned()
            .collect();
        self.announce_assignment(&job, &others).await;

        Ok(JobDetails {
            job,
            assignees,
            feedback_template_ids: template_ids,
        })
    }

    /// Roles that can see every job get the whole tenant; others see what they created or are assigned to.
    pub async fn list(&self, tenant_id: Uuid, user_id: Uuid, role: Role) -> Result<Vec<Job>> {
        let sees_all = role.has_permission(Permission::ViewAllJobs) || role.has_permission(Permission::ManageAllJobs);
        let visible_to = if sees_all { None } else { Some(user_id) };
        self.store.list_jobs(tenant_id, visible_to).await
    }

    pub async fn get(&self, tenant_id: Uuid, job_id: Uuid) -> Result<JobDetails> {
        let job = self.job(tenant_id, job_id).await?;
        let assignees = self.store.job_assignees(tenant_id, job.id).await?;
        let feedback_template_ids = self.store.job_template_ids(tenant_id, job.id).await?;
        Ok(JobDetails {
            job,
            assignees,
            feedback_template_ids,
        })
    }

    pub async fn close(&self, tenant_id: Uuid, job_id: Uuid) -> Result<Job> {
        let job = self.job(tenant_id, job_id).await?;
        if job.is_closed() {
            return Err(Error::BadRequest("Job is already closed".to_string()));
        }
        let closed = self
            .store
            .close_job(tenant_id, job.id, Utc::now().date_naive())
            .await?;
        tracing::info!(tenant_id = %tenant_id, job_id = %job.id, "job closed");
        Ok(closed)
    }

    /// Replaces the assignee list. Only users who were not already assigned are notified.
    pub async fn assign(&self, tenant_id: Uuid, job_id: Uuid, user_ids: Vec<Uuid>) -> Result<JobDetails> {
        let job = self.job(tenant_id, job_id).await?;
        let user_ids = dedup(user_ids);
        let users = self.users(tenant_id, &user_ids).await?;

        let previous: HashSet<Uuid> = self
            .store
            .job_assignees(tenant_id, job.id)
            .await?
            .into_iter()
            .map(|u| u.id)
            .collect();
        self.store
            .replace_job_assignees(tenant_id, job.id, &user_ids)
            .await?;

        let newly_assigned: Vec<User> = users
            .iter()
            .filter(|u| !previous.contains(&u.id))
            .cloned()
            .collect();
        self.announce_assignment(&job, &newly_assigned).await;

        let feedback_template_ids = self.store.job_template_ids(tenant_id, job.id).await?;
        Ok(JobDetails {
            job,
            assignees: users,
            feedback_template_ids,
        })
    }

    pub async fn feedback_templates(&self, tenant_id: Uuid, job_id: Uuid) -> Result<Vec<TemplateWithQuestions>> {
        let job = self.job(tenant_id, job_id).await?;
        let ids = self.store.job_template_ids(tenant_id, job.id).await?;
        let templates = self.store.find_templates(tenant_id, &ids).await?;
        let mut loaded = Vec::with_capacity(templates.len());
        for template in templates {
            let questions = self.store.template_questions(tenant_id, template.id).await?;
            loaded.push(TemplateWithQuestions { template, questions });
        }
        Ok(loaded)
    }

    async fn job(&self, tenant_id: Uuid, job_id: Uuid) -> Result<Job> {
        self.store
            .find_job(tenant_id, job_id)
            .await?
            .ok_or_else(|| Error::NotFound("Job not found".to_string()))
    }

    async fn users(&self, tenant_id: Uuid, ids: &[Uuid]) -> Result<Vec<User>> {
        let users = self.store.find_users(tenant_id, ids).await?;
        if users.len() != ids.len() {
            return Err(Error::NotFound("One or more users not found".to_string()));
        }
        Ok(users)
    }

    async fn announce_assignment(&self, job: &Job, recipients: &[User]) {
        if recipients.is_empty() {
            return;
        }
        let announcement = Announcement {
            tenant_id: job.tenant_id,
            kind: NotificationKind::JobAssigned,
            message: format!("You have been assigned to a new job: {}", job.title),
            related_entity_id: Some(job.id),
        };
        self.notifications
            .fan_out(recipients, &announcement, |user| EmailMessage::job_assignment(&user.email, job))
            .await;
    }
}

fn dedup(ids: Vec<Uuid>) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::NaiveDate;

    use super::*;
    use crate::models::feedback::{NewFeedbackTemplate, TemplateType};
    use crate::services::email_service::LogEmailSender;
    use crate::store::memory::MemoryStore;
    use crate::store::FeedbackStore;

    struct Fixture {
        store: Arc<MemoryStore>,
        service: JobService,
        tenant_id: Uuid,
        hr: User,
        template_id: Uuid,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let tenant = store.insert_tenant("acme", true).await;
        let hr = store.insert_user(tenant.id, "hr@acme.test", Role::Hr).await;
        let template = store
            .insert_template(NewFeedbackTemplate {
                tenant_id: tenant.id,
                name: "Phone screen".into(),
                template_type: TemplateType::PhoneScreening,
                description: None,
                instructions: None,
                is_active: true,
                stage_mappings: vec![],
                job_type_mappings: vec![],
                created_by: Some(hr.id),
                questions: vec![],
            })
            .await
            .unwrap();
        let notifications = NotificationService::new(
            store.clone(),
            Arc::new(LogEmailSender),
            2,
            Duration::from_secs(5),
        );
        Fixture {
            service: JobService::new(store.clone(), notifications),
            store,
            tenant_id: tenant.id,
            hr,
            template_id: template.id,
        }
    }

    fn payload(template_ids: Vec<Uuid>, assignee_ids: Vec<Uuid>) -> CreateJobPayload {
        CreateJobPayload {
            title: "Backend Engineer".into(),
            description: "Rust services".into(),
            department: Some("Engineering".into()),
            start_date: NaiveDate::from_ymd_opt(2030, 1, 1),
            expected_closing_date: NaiveDate::from_ymd_opt(2030, 3, 1).unwrap(),
            assignee_ids,
            feedback_template_ids: template_ids,
        }
    }

    #[tokio::test]
    async fn creator_is_assigned_and_only_others_are_notified() {
        let fx = fixture().await;
        let hm = fx
            .store
            .insert_user(fx.tenant_id, "hm@acme.test", Role::HiringManager)
            .await;

        let details = fx
            .service
            .create(fx.tenant_id, fx.hr.id, Role::Hr, payload(vec![fx.template_id], vec![hm.id]))
            .await
            .unwrap();

        assert_eq!(details.assignees.len(), 2);
        assert_eq!(details.feedback_template_ids, vec![fx.template_id]);
        let notes = fx.store.notification_rows().await;
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].user_id, hm.id);
        assert_eq!(notes[0].message, "You have been assigned to a new job: Backend Engineer");
    }

    #[tokio::test]
    async fn job_needs_a_template_from_the_same_tenant() {
        let fx = fixture().await;
        let err = fx
            .service
            .create(fx.tenant_id, fx.hr.id, Role::Hr, payload(vec![], vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));

        let err = fx
            .service
            .create(fx.tenant_id, fx.hr.id, Role::Hr, payload(vec![Uuid::new_v4()], vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));
    }

    #[tokio::test]
    async fn closing_date_must_follow_start_date() {
        let fx = fixture().await;
        let mut bad = payload(vec![fx.template_id], vec![]);
        bad.expected_closing_date = NaiveDate::from_ymd_opt(2029, 12, 31).unwrap();
        let err = fx
            .service
            .create(fx.tenant_id, fx.hr.id, Role::Hr, bad)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));
    }

    #[tokio::test]
    async fn roles_without_create_jobs_are_forbidden() {
        let fx = fixture().await;
        let err = fx
            .service
            .create(fx.tenant_id, fx.hr.id, Role::Interviewer, payload(vec![fx.template_id], vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));
    }

    #[tokio::test]
    async fn closing_twice_is_bad_request() {
        let fx = fixture().await;
        let job = fx
            .service
            .create(fx.tenant_id, fx.hr.id, Role::Hr, payload(vec![fx.template_id], vec![]))
            .await
            .unwrap()
            .job;

        let closed = fx.service.close(fx.tenant_id, job.id).await.unwrap();
        assert!(closed.is_closed());
        assert!(closed.actual_closing_date.is_some());
        assert!(matches!(
            fx.service.close(fx.tenant_id, job.id).await,
            Err(Error::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn reassignment_notifies_new_users_only() {
        let fx = fixture().await;
        let job = fx
            .service
            .create(fx.tenant_id, fx.hr.id, Role::Hr, payload(vec![fx.template_id], vec![]))
            .await
            .unwrap()
            .job;
        let recruiter = fx
            .store
            .insert_user(fx.tenant_id, "rec@acme.test", Role::Recruiter)
            .await;

        let details = fx
            .service
            .assign(fx.tenant_id, job.id, vec![fx.hr.id, recruiter.id])
            .await
            .unwrap();
        assert_eq!(details.assignees.len(), 2);
        let notes = fx.store.notification_rows().await;
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].user_id, recruiter.id);

        let err = fx
            .service
            .assign(fx.tenant_id, job.id, vec![Uuid::new_v4()])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn non_privileged_users_only_see_their_jobs() {
        let fx = fixture().await;
        fx.service
            .create(fx.tenant_id, fx.hr.id, Role::Hr, payload(vec![fx.template_id], vec![]))
            .await
            .unwrap();
        let outsider = fx
            .store
            .insert_user(fx.tenant_id, "hm2@acme.test", Role::HiringManager)
            .await;

        assert_eq!(fx.service.list(fx.tenant_id, fx.hr.id, Role::Hr).await.unwrap().len(), 1);
        assert!(fx
            .service
            .list(fx.tenant_id, outsider.id, Role::HiringManager)
            .await
            .unwrap()
            .is_empty());
    }
}
