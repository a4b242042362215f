use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::dto::feedback_dto::{
    CompleteFeedbackPayload, CreateTemplatePayload, SaveResponsePayload, UpdateTemplatePayload,
};
use crate::error::{Error, Result};
use crate::models::candidate::Candidate;
use crate::models::feedback::{
    overall_score, CandidateFeedback, FeedbackDetails, FeedbackResponse, FeedbackStats, FeedbackStatus,
    FeedbackTemplate, NewCandidateFeedback, NewFeedbackTemplate, ResponseUpsert, TemplateChanges,
    TemplateWithQuestions,
};
use crate::store::Store;

#[derive(Clone)]
pub struct FeedbackService {
    store: Arc<dyn Store>,
}

impl FeedbackService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Attaches the job's curated active templates the candidate does not have yet.
    /// Running it twice attaches nothing the second time.
    pub async fn auto_attach(&self, candidate: &Candidate, assigned_by: Option<Uuid>) -> Result<Vec<CandidateFeedback>> {
        let template_ids = self
            .store
            .job_template_ids(candidate.tenant_id, candidate.job_id)
            .await?;
        if template_ids.is_empty() {
            return Ok(Vec::new());
        }
        let templates = self
            .store
            .find_templates(candidate.tenant_id, &template_ids)
            .await?;
        self.attach_all(candidate, templates.iter().filter(|t| t.is_active), assigned_by)
            .await
    }

    /// Attaches every active tenant template mapped to the candidate's stage or job title.
    pub async fn auto_attach_by_rules(
        &self,
        tenant_id: Uuid,
        candidate_id: Uuid,
        assigned_by: Option<Uuid>,
    ) -> Result<Vec<CandidateFeedback>> {
        let candidate = self.candidate(tenant_id, candidate_id).await?;
        let job = self
            .store
            .find_job(tenant_id, candidate.job_id)
            .await?
            .ok_or_else(|| Error::NotFound("Job not found".to_string()))?;
        let templates = self.store.list_templates(tenant_id, true).await?;
        self.attach_all(
            &candidate,
            templates
                .iter()
                .filter(|t| t.matches_rules(&candidate.status, &job.title)),
            assigned_by,
        )
        .await
    }

    async fn attach_all<'a>(
        &self,
        candidate: &Candidate,
        templates: impl Iterator<Item = &'a FeedbackTemplate>,
        assigned_by: Option<Uuid>,
    ) -> Result<Vec<CandidateFeedback>> {
        let mut attached = Vec::new();
        for template in templates {
            let row = NewCandidateFeedback {
                tenant_id: candidate.tenant_id,
                candidate_id: candidate.id,
                template_id: template.id,
                assigned_by,
                is_manually_assigned: false,
            };
            // A conflicting insert means the pair is already attached.
            if let Some(created) = self.store.insert_candidate_feedback(row).await? {
                attached.push(created);
            }
        }
        if !attached.is_empty() {
            tracing::info!(candidate_id = %candidate.id, count = attached.len(), "feedback templates auto-attached");
        }
        Ok(attached)
    }

    pub async fn attach_template(
        &self,
        tenant_id: Uuid,
        candidate_id: Uuid,
        template_id: Uuid,
        assigned_by: Uuid,
    ) -> Result<FeedbackDetails> {
        let candidate = self.candidate(tenant_id, candidate_id).await?;

        let template = self
            .store
            .find_template(tenant_id, template_id)
            .await?
            .filter(|t| t.is_active)
            .ok_or_else(|| Error::NotFound("Template not found or inactive".to_string()))?;

        let duplicate = || Error::BadRequest("Template is already attached to this candidate".to_string());
        if self
            .store
            .find_candidate_feedback_by_pair(tenant_id, candidate.id, template.id)
            .await?
            .is_some()
        {
            return Err(duplicate());
        }

        let created = self
            .store
            .insert_candidate_feedback(NewCandidateFeedback {
                tenant_id,
                candidate_id: candidate.id,
                template_id: template.id,
                assigned_by: Some(assigned_by),
                is_manually_assigned: true,
            })
            .await?
            .ok_or_else(duplicate)?;

        self.details_for(created).await
    }

    pub async fn remove_template(&self, tenant_id: Uuid, feedback_id: Uuid) -> Result<()> {
        if !self.store.delete_candidate_feedback(tenant_id, feedback_id).await? {
            return Err(Error::NotFound("Feedback not found".to_string()));
        }
        Ok(())
    }

    pub async fn list_for_candidate(&self, tenant_id: Uuid, candidate_id: Uuid) -> Result<Vec<FeedbackDetails>> {
        let candidate = self.candidate(tenant_id, candidate_id).await?;
        let rows = self
            .store
            .list_candidate_feedback(tenant_id, candidate.id)
            .await?;
        let mut details = Vec::with_capacity(rows.len());
        for row in rows {
            details.push(self.details_for(row).await?);
        }
        Ok(details)
    }

    pub async fn details(&self, tenant_id: Uuid, feedback_id: Uuid) -> Result<FeedbackDetails> {
        let row = self.feedback(tenant_id, feedback_id).await?;
        self.details_for(row).await
    }

    pub async fn save_response(
        &self,
        tenant_id: Uuid,
        feedback_id: Uuid,
        answered_by: Uuid,
        payload: SaveResponsePayload,
    ) -> Result<FeedbackResponse> {
        let mut feedback = self.feedback(tenant_id, feedback_id).await?;
        if feedback.status == FeedbackStatus::Completed {
            return Err(Error::BadRequest("Feedback has already been completed".to_string()));
        }

        let questions = self
            .store
            .template_questions(tenant_id, feedback.template_id)
            .await?;
        if !questions.iter().any(|q| q.id == payload.question_id) {
            return Err(Error::BadRequest(
                "Question does not belong to this feedback template".to_string(),
            ));
        }

        let saved = self
            .store
            .upsert_response(ResponseUpsert {
                tenant_id,
                candidate_feedback_id: feedback.id,
                question_id: payload.question_id,
                answered_by,
                text_answer: payload.text_answer,
                numeric_answer: payload.numeric_answer,
                boolean_answer: payload.boolean_answer,
                selected_option: payload.selected_option,
                comments: payload.comments,
            })
            .await?;

        if feedback.status == FeedbackStatus::NotStarted {
            feedback.status = FeedbackStatus::InProgress;
            self.store.update_candidate_feedback(&feedback).await?;
        }

        Ok(saved)
    }

    /// Required questions are not enforced on completion.
    pub async fn complete_feedback(
        &self,
        tenant_id: Uuid,
        feedback_id: Uuid,
        completed_by: Uuid,
        payload: CompleteFeedbackPayload,
    ) -> Result<FeedbackDetails> {
        let mut feedback = self.feedback(tenant_id, feedback_id).await?;

        let questions = self
            .store
            .template_questions(tenant_id, feedback.template_id)
            .await?;
        let responses = self.store.list_responses(tenant_id, feedback.id).await?;

        feedback.status = FeedbackStatus::Completed;
        feedback.completed_by = Some(completed_by);
        feedback.completed_at = Some(Utc::now());
        feedback.overall_score = overall_score(&questions, &responses);
        if let Some(comments) = payload.general_comments.filter(|c| !c.is_empty()) {
            feedback.general_comments = Some(comments);
        }

        let saved = self.store.update_candidate_feedback(&feedback).await?;
        self.details_for(saved).await
    }

    pub async fn stats(&self, tenant_id: Uuid) -> Result<FeedbackStats> {
        Ok(self.store.feedback_counts(tenant_id).await?.into())
    }

    pub async fn list_templates(&self, tenant_id: Uuid, active_only: bool) -> Result<Vec<TemplateWithQuestions>> {
        let templates = self.store.list_templates(tenant_id, active_only).await?;
        let mut loaded = Vec::with_capacity(templates.len());
        for template in templates {
            loaded.push(self.with_questions(template).await?);
        }
        Ok(loaded)
    }

    pub async fn get_template(&self, tenant_id: Uuid, template_id: Uuid) -> Result<TemplateWithQuestions> {
        let template = self
            .store
            .find_template(tenant_id, template_id)
            .await?
            .ok_or_else(|| Error::NotFound("Template not found".to_string()))?;
        self.with_questions(template).await
    }

    pub async fn create_template(
        &self,
        tenant_id: Uuid,
        created_by: Uuid,
        payload: CreateTemplatePayload,
    ) -> Result<TemplateWithQuestions> {
        let template = self
            .store
            .insert_template(NewFeedbackTemplate {
                tenant_id,
                name: payload.name,
                template_type: payload.template_type,
                description: payload.description,
                instructions: payload.instructions,
                is_active: payload.is_active.unwrap_or(true),
                stage_mappings: payload.stage_mappings,
                job_type_mappings: payload.job_type_mappings,
                created_by: Some(created_by),
                questions: payload.questions.into_iter().map(Into::into).collect(),
            })
            .await?;
        tracing::info!(template_id = %template.id, tenant_id = %tenant_id, "feedback template created");
        self.with_questions(template).await
    }

    pub async fn update_template(
        &self,
        tenant_id: Uuid,
        template_id: Uuid,
        payload: UpdateTemplatePayload,
    ) -> Result<TemplateWithQuestions> {
        let changes = TemplateChanges {
            name: payload.name,
            template_type: payload.template_type,
            description: payload.description,
            instructions: payload.instructions,
            is_active: payload.is_active,
            stage_mappings: payload.stage_mappings,
            job_type_mappings: payload.job_type_mappings,
            questions: payload
                .questions
                .map(|qs| qs.into_iter().map(Into::into).collect()),
        };
        let template = self
            .store
            .update_template(tenant_id, template_id, changes)
            .await?
            .ok_or_else(|| Error::NotFound("Template not found".to_string()))?;
        self.with_questions(template).await
    }

    pub async fn delete_template(&self, tenant_id: Uuid, template_id: Uuid) -> Result<()> {
        if !self.store.delete_template(tenant_id, template_id).await? {
            return Err(Error::NotFound("Template not found".to_string()));
        }
        Ok(())
    }

    async fn candidate(&self, tenant_id: Uuid, candidate_id: Uuid) -> Result<Candidate> {
        self.store
            .find_candidate(tenant_id, candidate_id)
            .await?
            .ok_or_else(|| Error::NotFound("Candidate not found".to_string()))
    }

    async fn feedback(&self, tenant_id: Uuid, feedback_id: Uuid) -> Result<CandidateFeedback> {
        self.store
            .find_candidate_feedback(tenant_id, feedback_id)
            .await?
            .ok_or_else(|| Error::NotFound("Feedback not found".to_string()))
    }

    async fn with_questions(&self, template: FeedbackTemplate) -> Result<TemplateWithQuestions> {
        let questions = self
            .store
            .template_questions(template.tenant_id, template.id)
            .await?;
        Ok(TemplateWithQuestions { template, questions })
    }

    async fn details_for(&self, feedback: CandidateFeedback) -> Result<FeedbackDetails> {
        let template = match self
            .store
            .find_template(feedback.tenant_id, feedback.template_id)
            .await?
        {
            Some(t) => Some(self.with_questions(t).await?),
            None => None,
        };
        let responses = self
            .store
            .list_responses(feedback.tenant_id, feedback.id)
            .await?;
        Ok(FeedbackDetails {
            feedback,
            template,
            responses,
        })
    }
}
