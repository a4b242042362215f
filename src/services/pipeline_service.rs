//! Candidate lifecycle: creation, stage transitions, the history ledger and
//! the side effects that follow a committed transition.
//!
//! Primary writes (status plus history, or a whole bulk batch) either commit
//! or fail the request. Feedback auto-attachment and notification delivery
//! run afterwards and only ever log their failures.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use uuid::Uuid;

use super::email_service::EmailMessage;
use super::feedback_service::FeedbackService;
use super::notification_service::{Announcement, NotificationService};
use super::storage_service::{checked_extension, content_type_for, FileDownload, ObjectStorage};
use crate::dto::candidate_dto::{
    BulkActionPayload, BulkActionResponse, CandidateForm, CandidateList, CandidateListQuery, NotesPayload,
    UpdateStatusPayload, UploadedFile, MOVE_STAGE, REJECT,
};
use crate::error::{Error, Result};
use crate::models::candidate::{Candidate, NewCandidate, Page, StatusWrite};
use crate::models::job::Job;
use crate::models::notification::{NewNotification, NotificationKind};
use crate::models::pipeline::{PipelineHistory, StatusAlphabet, REJECTED_STATUS};
use crate::models::user::User;
use crate::store::{BulkTransition, Store};

#[derive(Clone)]
pub struct PipelineService {
    store: Arc<dyn Store>,
    storage: Arc<dyn ObjectStorage>,
    feedback: FeedbackService,
    notifications: NotificationService,
}

impl PipelineService {
    pub fn new(
        store: Arc<dyn Store>,
        storage: Arc<dyn ObjectStorage>,
        feedback: FeedbackService,
        notifications: NotificationService,
    ) -> Self {
        Self {
            store,
            storage,
            feedback,
            notifications,
        }
    }

    pub async fn create_candidate(
        &self,
        tenant_id: Uuid,
        job_id: Uuid,
        created_by: Uuid,
        form: CandidateForm,
    ) -> Result<Candidate> {
        let job = self.job(tenant_id, job_id).await?;
        if job.is_closed() {
            return Err(Error::BadRequest("Cannot add candidates to a closed job".to_string()));
        }

        let CandidateForm {
            name,
            first_name,
            last_name,
            email,
            phone,
            cv,
            cover_letter,
        } = form;
        let cv = cv.ok_or_else(|| Error::BadRequest("CV file is required".to_string()))?;
        let cv_file_path = self.store_file(tenant_id, "cv", cv).await?;
        let cover_letter_path = match cover_letter {
            Some(file) => match self.store_file(tenant_id, "cover-letters", file).await {
                Ok(path) => Some(path),
                Err(e) => {
                    self.discard_files(&[cv_file_path.as_str()]).await;
                    return Err(e);
                }
            },
            None => None,
        };

        let inserted = async {
            let alphabet = self.alphabet(tenant_id).await?;
            self.store
                .insert_candidate(NewCandidate {
                    tenant_id,
                    job_id: job.id,
                    name,
                    first_name,
                    last_name,
                    email,
                    phone,
                    cv_file_path: cv_file_path.clone(),
                    cover_letter_path: cover_letter_path.clone(),
                    status: alphabet.initial().to_string(),
                    created_by: Some(created_by),
                })
                .await
        }
        .await;
        let candidate = match inserted {
            Ok(candidate) => candidate,
            Err(e) => {
                let stored: Vec<&str> = std::iter::once(cv_file_path.as_str())
                    .chain(cover_letter_path.as_deref())
                    .collect();
                self.discard_files(&stored).await;
                return Err(e);
            }
        };
        tracing::info!(tenant_id = %tenant_id, candidate_id = %candidate.id, job_id = %job.id, "candidate created");

        self.attach_feedback(&candidate, Some(created_by)).await;

        match self.store.job_assignees(tenant_id, job.id).await {
            Ok(assignees) => {
                let announcement = Announcement {
                    tenant_id,
                    kind: NotificationKind::CandidateAdded,
                    message: format!("New candidate {} added to {}", candidate.name, job.title),
                    related_entity_id: Some(candidate.id),
                };
                self.notifications
                    .fan_out(&assignees, &announcement, |user| {
                        EmailMessage::candidate_added(&user.email, &candidate.name, &job.title)
                    })
                    .await;
            }
            Err(e) => {
                tracing::warn!(job_id = %job.id, error = %e, "could not load assignees for candidate notification")
            }
        }

        Ok(candidate)
    }

    pub async fn update_status(
        &self,
        tenant_id: Uuid,
        candidate_id: Uuid,
        changed_by: Uuid,
        payload: UpdateStatusPayload,
    ) -> Result<Candidate> {
        let candidate = self.candidate(tenant_id, candidate_id).await?;
        let job = self.job(tenant_id, candidate.job_id).await?;
        if job.is_closed() {
            return Err(Error::BadRequest("Cannot update candidates of a closed job".to_string()));
        }
        if !self.alphabet(tenant_id).await?.contains(&payload.status) {
            return Err(Error::BadRequest(format!("Invalid status: {}", payload.status)));
        }

        let change = self
            .store
            .write_status(
                tenant_id,
                candidate.id,
                StatusWrite {
                    status: payload.status,
                    interview_date: payload.interview_date,
                    interview_link: payload.interview_link,
                },
                Some(changed_by),
            )
            .await?;

        self.attach_feedback(&change.candidate, Some(changed_by)).await;

        if change.changed() {
            tracing::info!(
                candidate_id = %change.candidate.id,
                from = %change.previous_status,
                to = %change.candidate.status,
                "candidate status changed"
            );
            self.announce_status_change(&job, &change.candidate).await;
        }

        Ok(change.candidate)
    }

    pub async fn reject(&self, tenant_id: Uuid, candidate_id: Uuid, changed_by: Uuid) -> Result<Candidate> {
        self.update_status(
            tenant_id,
            candidate_id,
            changed_by,
            UpdateStatusPayload {
                status: REJECTED_STATUS.to_string(),
                interview_date: None,
                interview_link: None,
            },
        )
        .await
    }

    /// Moves or rejects many candidates in one transaction.
    pub async fn bulk_action(
        &self,
        tenant_id: Uuid,
        changed_by: Uuid,
        payload: BulkActionPayload,
    ) -> Result<BulkActionResponse> {
        let target = match payload.action.as_str() {
            MOVE_STAGE => payload
                .payload
                .and_then(|args| args.stage)
                .filter(|stage| !stage.is_empty())
                .ok_or_else(|| Error::BadRequest("Stage is required for MOVE_STAGE".to_string()))?,
            REJECT => REJECTED_STATUS.to_string(),
            other => return Err(Error::BadRequest(format!("Unsupported bulk action: {}", other))),
        };
        if !self.alphabet(tenant_id).await?.contains(&target) {
            return Err(Error::BadRequest(format!("Invalid status: {}", target)));
        }

        let mut seen = HashSet::new();
        let ids: Vec<Uuid> = payload
            .candidate_ids
            .into_iter()
            .filter(|id| seen.insert(*id))
            .collect();
        let candidates = self.store.find_candidates(tenant_id, &ids).await?;
        if candidates.is_empty() {
            return Err(Error::NotFound("No candidates found".to_string()));
        }

        let mut jobs: HashMap<Uuid, (Job, Vec<User>)> = HashMap::new();
        for candidate in &candidates {
            if jobs.contains_key(&candidate.job_id) {
                continue;
            }
            let job = self.job(tenant_id, candidate.job_id).await?;
            if job.is_closed() {
                return Err(Error::BadRequest(format!(
                    "Cannot update candidates of closed job {}",
                    job.title
                )));
            }
            let assignees = self.store.job_assignees(tenant_id, job.id).await?;
            jobs.insert(job.id, (job, assignees));
        }

        let mut transitions = Vec::with_capacity(candidates.len());
        let mut emails: HashMap<Uuid, Vec<(User, EmailMessage)>> = HashMap::new();
        for candidate in &candidates {
            let mut transition = BulkTransition {
                candidate_id: candidate.id,
                new_status: target.clone(),
                changed_by: Some(changed_by),
                notifications: Vec::new(),
            };
            if let Some((job, assignees)) = jobs.get(&candidate.job_id) {
                for user in assignees {
                    transition.notifications.push(NewNotification {
                        tenant_id,
                        user_id: user.id,
                        kind: NotificationKind::StatusChange,
                        message: status_change_message(&candidate.name, &target, &job.title),
                        related_entity_id: Some(candidate.id),
                    });
                    emails.entry(candidate.id).or_default().push((
                        user.clone(),
                        EmailMessage::status_change(&user.email, &candidate.name, &target, &job.title),
                    ));
                }
            }
            transitions.push(transition);
        }

        let changes = self.store.apply_bulk_transitions(tenant_id, transitions).await?;
        tracing::info!(tenant_id = %tenant_id, action = %payload.action, count = changes.len(), "bulk action committed");

        // Only candidates whose locked status actually moved are announced.
        let outgoing: Vec<(User, EmailMessage)> = changes
            .iter()
            .filter(|change| change.changed())
            .filter_map(|change| emails.remove(&change.candidate.id))
            .flatten()
            .collect();
        if !outgoing.is_empty() {
            self.notifications
                .send_emails(NotificationKind::StatusChange, outgoing)
                .await;
        }

        let updated: Vec<Candidate> = changes.into_iter().map(|change| change.candidate).collect();
        for candidate in &updated {
            self.attach_feedback(candidate, Some(changed_by)).await;
        }

        Ok(BulkActionResponse {
            message: format!("{} candidates updated", updated.len()),
            data: updated,
        })
    }

    /// Newest first.
    pub async fn history(&self, tenant_id: Uuid, candidate_id: Uuid) -> Result<Vec<PipelineHistory>> {
        let candidate = self.candidate(tenant_id, candidate_id).await?;
        self.store.candidate_history(tenant_id, candidate.id).await
    }

    pub async fn list(&self, tenant_id: Uuid, query: CandidateListQuery) -> Result<CandidateList> {
        let page = Page::new(query.page, query.limit);
        let (items, total) = self.store.list_candidates(tenant_id, page).await?;
        Ok(CandidateList {
            items,
            total,
            page: page.page,
            limit: page.limit,
        })
    }

    pub async fn list_for_job(&self, tenant_id: Uuid, job_id: Uuid) -> Result<Vec<Candidate>> {
        let job = self.job(tenant_id, job_id).await?;
        self.store.list_job_candidates(tenant_id, job.id).await
    }

    pub async fn get(&self, tenant_id: Uuid, candidate_id: Uuid) -> Result<Candidate> {
        self.candidate(tenant_id, candidate_id).await
    }

    pub async fn delete(&self, tenant_id: Uuid, candidate_id: Uuid) -> Result<()> {
        if !self.store.delete_candidate(tenant_id, candidate_id).await? {
            return Err(Error::NotFound("Candidate not found".to_string()));
        }
        tracing::info!(tenant_id = %tenant_id, candidate_id = %candidate_id, "candidate deleted");
        Ok(())
    }

    pub async fn set_notes(&self, tenant_id: Uuid, candidate_id: Uuid, payload: NotesPayload) -> Result<Candidate> {
        let candidate = self.candidate(tenant_id, candidate_id).await?;
        self.store.set_notes(tenant_id, candidate.id, payload.notes).await
    }

    pub async fn replace_cv(&self, tenant_id: Uuid, candidate_id: Uuid, file: UploadedFile) -> Result<Candidate> {
        let candidate = self.candidate(tenant_id, candidate_id).await?;
        let path = self.store_file(tenant_id, "cv", file).await?;
        self.store.set_cv_path(tenant_id, candidate.id, &path).await
    }

    pub async fn cv(&self, tenant_id: Uuid, candidate_id: Uuid) -> Result<FileDownload> {
        let candidate = self.candidate(tenant_id, candidate_id).await?;
        let stream = self.storage.get_file_stream(&candidate.cv_file_path).await?;
        let filename = candidate
            .cv_file_path
            .rsplit('/')
            .next()
            .unwrap_or("cv")
            .to_string();
        Ok(FileDownload {
            stream,
            content_type: content_type_for(&candidate.cv_file_path),
            filename,
        })
    }

    async fn store_file(&self, tenant_id: Uuid, folder: &str, file: UploadedFile) -> Result<String> {
        let ext = checked_extension(&file.filename, &file.data)?;
        let path = format!("{}/{}/{}.{}", tenant_id, folder, Uuid::new_v4(), ext);
        let len = file.data.len();
        let stored = self
            .storage
            .upload(file.data, content_type_for(&path), len, &path)
            .await?;
        Ok(stored.url)
    }

    async fn discard_files(&self, paths: &[&str]) {
        for path in paths {
            if let Err(e) = self.storage.delete(path).await {
                tracing::warn!(path = %path, error = %e, "could not remove orphaned upload");
            }
        }
    }

    async fn alphabet(&self, tenant_id: Uuid) -> Result<StatusAlphabet> {
        let statuses = self.store.list_pipeline_statuses(tenant_id).await?;
        Ok(StatusAlphabet::from_statuses(&statuses))
    }

    async fn candidate(&self, tenant_id: Uuid, candidate_id: Uuid) -> Result<Candidate> {
        self.store
            .find_candidate(tenant_id, candidate_id)
            .await?
            .ok_or_else(|| Error::NotFound("Candidate not found".to_string()))
    }

    async fn job(&self, tenant_id: Uuid, job_id: Uuid) -> Result<Job> {
        self.store
            .find_job(tenant_id, job_id)
            .await?
            .ok_or_else(|| Error::NotFound("Job not found".to_string()))
    }

    async fn attach_feedback(&self, candidate: &Candidate, actor: Option<Uuid>) {
        if let Err(e) = self.feedback.auto_attach(candidate, actor).await {
            tracing::warn!(candidate_id = %candidate.id, error = %e, "feedback auto-attach failed");
        }
    }

    async fn announce_status_change(&self, job: &Job, candidate: &Candidate) {
        let assignees = match self.store.job_assignees(candidate.tenant_id, job.id).await {
            Ok(users) => users,
            Err(e) => {
                tracing::warn!(job_id = %job.id, error = %e, "could not load assignees for status notification");
                return;
            }
        };
        let announcement = Announcement {
            tenant_id: candidate.tenant_id,
            kind: NotificationKind::StatusChange,
            message: status_change_message(&candidate.name, &candidate.status, &job.title),
            related_entity_id: Some(candidate.id),
        };
        self.notifications
            .fan_out(&assignees, &announcement, |user| {
                EmailMessage::status_change(&user.email, &candidate.name, &candidate.status, &job.title)
            })
            .await;
    }
}

fn status_change_message(candidate_name: &str, status: &str, job_title: &str) -> String {
    format!(
        "Candidate {} status changed to {} in {}",
        candidate_name, status, job_title
    )
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bytes::Bytes;
    use chrono::Utc;

    use super::*;
    use crate::dto::candidate_dto::BulkActionArgs;
    use crate::models::job::NewJob;
    use crate::models::pipeline::NewPipelineStatus;
    use crate::models::user::Role;
    use crate::services::email_service::LogEmailSender;
    use crate::services::storage_service::LocalStorage;
    use crate::store::memory::MemoryStore;
    use crate::store::{CandidateStore, JobStore, PipelineStore};

    struct Fixture {
        store: Arc<MemoryStore>,
        service: PipelineService,
        uploads: std::path::PathBuf,
        tenant_id: Uuid,
        hr: User,
        job: Job,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let tenant = store.insert_tenant("acme", true).await;
        let hr = store.insert_user(tenant.id, "hr@acme.test", Role::Hr).await;
        let hm = store
            .insert_user(tenant.id, "hm@acme.test", Role::HiringManager)
            .await;
        let job = store
            .insert_job(NewJob {
                tenant_id: tenant.id,
                title: "Engineer".into(),
                description: "Build things".into(),
                department: None,
                start_date: None,
                expected_closing_date: None,
                created_by: hr.id,
                assignee_ids: vec![hr.id, hm.id],
                feedback_template_ids: vec![],
            })
            .await
            .unwrap();

        let uploads = std::env::temp_dir().join(format!("ats-pipeline-{}", Uuid::new_v4()));
        let notifications = NotificationService::new(
            store.clone(),
            Arc::new(LogEmailSender),
            4,
            Duration::from_secs(5),
        );
        let service = PipelineService::new(
            store.clone(),
            Arc::new(LocalStorage::new(uploads.clone())),
            FeedbackService::new(store.clone()),
            notifications,
        );
        Fixture {
            store,
            service,
            uploads,
            tenant_id: tenant.id,
            hr,
            job,
        }
    }

    impl Fixture {
        async fn candidate(&self, name: &str) -> Candidate {
            self.store
                .insert_candidate(NewCandidate {
                    tenant_id: self.tenant_id,
                    job_id: self.job.id,
                    name: name.into(),
                    first_name: None,
                    last_name: None,
                    email: None,
                    phone: None,
                    cv_file_path: "cv.pdf".into(),
                    cover_letter_path: None,
                    status: "new".into(),
                    created_by: Some(self.hr.id),
                })
                .await
                .unwrap()
        }

        async fn move_to(&self, candidate_id: Uuid, status: &str) -> Result<Candidate> {
            self.service
                .update_status(
                    self.tenant_id,
                    candidate_id,
                    self.hr.id,
                    UpdateStatusPayload {
                        status: status.into(),
                        interview_date: None,
                        interview_link: None,
                    },
                )
                .await
        }

        async fn history_for(&self, candidate_id: Uuid) -> usize {
            self.store
                .history_rows()
                .await
                .iter()
                .filter(|h| h.candidate_id == candidate_id)
                .count()
        }
    }

    fn bulk(ids: Vec<Uuid>, action: &str, stage: Option<&str>) -> BulkActionPayload {
        BulkActionPayload {
            candidate_ids: ids,
            action: action.into(),
            payload: Some(BulkActionArgs {
                stage: stage.map(str::to_string),
            }),
        }
    }

    #[tokio::test]
    async fn shortlisting_writes_history_and_notifies_each_assignee_once() {
        let fx = fixture().await;
        let c1 = fx.candidate("Ada").await;

        let moved = fx.move_to(c1.id, "shortlisted").await.unwrap();
        assert_eq!(moved.status, "shortlisted");
        assert_eq!(fx.history_for(c1.id).await, 2);
        let notes = fx.store.notification_rows().await;
        assert_eq!(notes.len(), 2);
        assert!(notes.iter().all(|n| n.kind == NotificationKind::StatusChange));
        assert_eq!(notes[0].message, "Candidate Ada status changed to shortlisted in Engineer");

        // Same status again: nothing new recorded or sent.
        fx.move_to(c1.id, "shortlisted").await.unwrap();
        assert_eq!(fx.history_for(c1.id).await, 2);
        assert_eq!(fx.store.notification_rows().await.len(), 2);
    }

    #[tokio::test]
    async fn history_rows_equal_changes_plus_one() {
        let fx = fixture().await;
        let c = fx.candidate("Grace").await;
        for status in ["shortlisted", "shortlisted", "offer", "rejected", "rejected"] {
            fx.move_to(c.id, status).await.unwrap();
        }
        let history = fx.service.history(fx.tenant_id, c.id).await.unwrap();
        assert_eq!(history.len(), 4);
        assert_eq!(history[0].new_status, "rejected");
        assert_eq!(history.last().and_then(|h| h.old_status.clone()), None);
    }

    #[tokio::test]
    async fn closed_job_blocks_status_writes() {
        let fx = fixture().await;
        let c = fx.candidate("Linus").await;
        fx.store
            .close_job(fx.tenant_id, fx.job.id, Utc::now().date_naive())
            .await
            .unwrap();

        let err = fx.move_to(c.id, "offer").await.unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));
        assert_eq!(fx.history_for(c.id).await, 1);
        assert!(fx.store.notification_rows().await.is_empty());
        let unchanged = fx.service.get(fx.tenant_id, c.id).await.unwrap();
        assert_eq!(unchanged.status, "new");
    }

    #[tokio::test]
    async fn status_outside_the_tenant_pipeline_is_rejected() {
        let fx = fixture().await;
        let c = fx.candidate("Ken").await;
        let err = fx.move_to(c.id, "teleported").await.unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));
        assert!(fx.move_to(c.id, "rejected").await.is_ok());
    }

    #[tokio::test]
    async fn other_tenants_candidates_are_not_found() {
        let fx = fixture().await;
        let c = fx.candidate("Barbara").await;
        let other = fx.store.insert_tenant("globex", true).await;

        let err = fx
            .service
            .update_status(
                other.id,
                c.id,
                fx.hr.id,
                UpdateStatusPayload {
                    status: "offer".into(),
                    interview_date: None,
                    interview_link: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn unsupported_bulk_action_changes_nothing() {
        let fx = fixture().await;
        let a = fx.candidate("A").await;
        let b = fx.candidate("B").await;

        let err = fx
            .service
            .bulk_action(fx.tenant_id, fx.hr.id, bulk(vec![a.id, b.id], "ARCHIVE", None))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));

        let err = fx
            .service
            .bulk_action(fx.tenant_id, fx.hr.id, bulk(vec![a.id], MOVE_STAGE, None))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));

        assert_eq!(fx.store.history_rows().await.len(), 2);
        for c in [a, b] {
            assert_eq!(fx.service.get(fx.tenant_id, c.id).await.unwrap().status, "new");
        }
    }

    #[tokio::test]
    async fn failing_bulk_write_rolls_back_every_candidate() {
        let fx = fixture().await;
        let a = fx.candidate("A").await;
        let b = fx.candidate("B").await;
        fx.store.fail_writes_for_candidate(b.id).await;

        let err = fx
            .service
            .bulk_action(fx.tenant_id, fx.hr.id, bulk(vec![a.id, b.id], REJECT, None))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
        assert_eq!(fx.service.get(fx.tenant_id, a.id).await.unwrap().status, "new");
        assert_eq!(fx.store.history_rows().await.len(), 2);
        assert!(fx.store.notification_rows().await.is_empty());
    }

    #[tokio::test]
    async fn bulk_move_commits_history_and_notifications_together() {
        let fx = fixture().await;
        let a = fx.candidate("A").await;
        let b = fx.candidate("B").await;

        let response = fx
            .service
            .bulk_action(
                fx.tenant_id,
                fx.hr.id,
                bulk(vec![a.id, b.id, a.id, Uuid::new_v4()], MOVE_STAGE, Some("offer")),
            )
            .await
            .unwrap();

        assert_eq!(response.data.len(), 2);
        assert_eq!(response.message, "2 candidates updated");
        assert!(response.data.iter().all(|c| c.status == "offer"));
        assert_eq!(fx.store.history_rows().await.len(), 4);
        assert_eq!(fx.store.notification_rows().await.len(), 4);
    }

    #[tokio::test]
    async fn bulk_with_only_unknown_ids_is_not_found() {
        let fx = fixture().await;
        let err = fx
            .service
            .bulk_action(fx.tenant_id, fx.hr.id, bulk(vec![Uuid::new_v4()], REJECT, None))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn created_candidate_starts_at_lowest_configured_stage() {
        let fx = fixture().await;
        for (value, order) in [("screen", 1), ("applied", 0)] {
            fx.store
                .insert_pipeline_status(NewPipelineStatus {
                    tenant_id: fx.tenant_id,
                    value: value.into(),
                    label: value.into(),
                    order,
                })
                .await
                .unwrap();
        }

        let created = fx
            .service
            .create_candidate(
                fx.tenant_id,
                fx.job.id,
                fx.hr.id,
                CandidateForm {
                    name: "Margaret".into(),
                    cv: Some(UploadedFile {
                        filename: "resume.pdf".into(),
                        data: Bytes::from_static(b"%PDF-1.4 resume"),
                    }),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(created.status, "applied");
        assert!(created.cv_file_path.ends_with(".pdf"));
        assert_eq!(fx.history_for(created.id).await, 1);
        let notes = fx.store.notification_rows().await;
        assert_eq!(notes.len(), 2);
        assert!(notes.iter().all(|n| n.kind == NotificationKind::CandidateAdded));
    }

    #[tokio::test]
    async fn candidate_without_cv_is_rejected() {
        let fx = fixture().await;
        let err = fx
            .service
            .create_candidate(
                fx.tenant_id,
                fx.job.id,
                fx.hr.id,
                CandidateForm {
                    name: "NoCv".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));
    }

    #[tokio::test]
    async fn failed_insert_removes_the_uploaded_files() {
        let fx = fixture().await;
        fx.store.fail_candidate_inserts();

        let err = fx
            .service
            .create_candidate(
                fx.tenant_id,
                fx.job.id,
                fx.hr.id,
                CandidateForm {
                    name: "Orphan".into(),
                    cv: Some(UploadedFile {
                        filename: "resume.pdf".into(),
                        data: Bytes::from_static(b"%PDF-1.4 resume"),
                    }),
                    cover_letter: Some(UploadedFile {
                        filename: "letter.txt".into(),
                        data: Bytes::from_static(b"Dear team"),
                    }),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Internal(_)));

        for folder in ["cv", "cover-letters"] {
            let dir = fx.uploads.join(fx.tenant_id.to_string()).join(folder);
            let left = std::fs::read_dir(&dir).map(|entries| entries.count()).unwrap_or(0);
            assert_eq!(left, 0, "files left in {}", folder);
        }
    }

    #[tokio::test]
    async fn page_far_past_the_end_is_empty() {
        let fx = fixture().await;
        fx.candidate("Ada").await;
        let list = fx
            .service
            .list(
                fx.tenant_id,
                CandidateListQuery {
                    page: Some(i64::MAX),
                    limit: Some(100),
                },
            )
            .await
            .unwrap();
        assert!(list.items.is_empty());
        assert_eq!(list.total, 1);
    }

    #[tokio::test]
    async fn bulk_move_skips_candidates_already_at_the_stage() {
        let fx = fixture().await;
        let a = fx.candidate("A").await;
        let b = fx.candidate("B").await;
        fx.move_to(b.id, "offer").await.unwrap();
        let notes_before = fx.store.notification_rows().await.len();

        let response = fx
            .service
            .bulk_action(fx.tenant_id, fx.hr.id, bulk(vec![a.id, b.id], MOVE_STAGE, Some("offer")))
            .await
            .unwrap();

        assert_eq!(response.data.len(), 2);
        assert_eq!(fx.history_for(a.id).await, 2);
        assert_eq!(fx.history_for(b.id).await, 2);
        // Two assignees are told about A only.
        assert_eq!(fx.store.notification_rows().await.len(), notes_before + 2);
    }
}
