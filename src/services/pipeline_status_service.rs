use std::sync::Arc;

use uuid::Uuid;

use crate::dto::pipeline_dto::{
    CreatePipelineStatusPayload, ReorderPipelineStatusesPayload, UpdatePipelineStatusPayload,
};
use crate::error::{Error, Result};
use crate::models::pipeline::{NewPipelineStatus, PipelineStatus};
use crate::store::Store;

/// Per-tenant configuration of the pipeline stages.
#[derive(Clone)]
pub struct PipelineStatusService {
    store: Arc<dyn Store>,
}

impl PipelineStatusService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn list(&self, tenant_id: Uuid) -> Result<Vec<PipelineStatus>> {
        self.store.list_pipeline_statuses(tenant_id).await
    }

    /// Without an explicit `order` the stage is appended after the last one.
    pub async fn create(&self, tenant_id: Uuid, payload: CreatePipelineStatusPayload) -> Result<PipelineStatus> {
        let order = match payload.order {
            Some(order) => order,
            None => {
                let last = self
                    .store
                    .list_pipeline_statuses(tenant_id)
                    .await?
                    .iter()
                    .map(|s| s.order)
                    .max();
                match last {
                    Some(last) => last.checked_add(1).ok_or_else(|| {
                        Error::BadRequest("No position left after the last pipeline status".to_string())
                    })?,
                    None => 0,
                }
            }
        };
        let created = self
            .store
            .insert_pipeline_status(NewPipelineStatus {
                tenant_id,
                value: payload.value.trim().to_string(),
                label: payload.label,
                order,
            })
            .await?
            .ok_or_else(|| Error::BadRequest("Pipeline status already exists".to_string()))?;
        tracing::info!(tenant_id = %tenant_id, value = %created.value, "pipeline status created");
        Ok(created)
    }

    pub async fn update(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        payload: UpdatePipelineStatusPayload,
    ) -> Result<PipelineStatus> {
        self.store
            .update_pipeline_status(tenant_id, id, payload.label, payload.order)
            .await?
            .ok_or_else(|| Error::NotFound("Pipeline status not found".to_string()))
    }

    pub async fn reorder(
        &self,
        tenant_id: Uuid,
        payload: ReorderPipelineStatusesPayload,
    ) -> Result<Vec<PipelineStatus>> {
        let orders: Vec<(Uuid, i32)> = payload.statuses.iter().map(|s| (s.id, s.order)).collect();
        self.store.reorder_pipeline_statuses(tenant_id, &orders).await?;
        self.store.list_pipeline_statuses(tenant_id).await
    }

    /// A stage that still holds candidates cannot be removed.
    pub async fn delete(&self, tenant_id: Uuid, id: Uuid) -> Result<()> {
        let status = self
            .store
            .list_pipeline_statuses(tenant_id)
            .await?
            .into_iter()
            .find(|s| s.id == id)
            .ok_or_else(|| Error::NotFound("Pipeline status not found".to_string()))?;
        let in_stage = self.store.count_candidates_in_status(tenant_id, &status.value).await?;
        if in_stage > 0 {
            return Err(Error::BadRequest(format!(
                "Cannot delete pipeline status while {} candidate(s) are in it",
                in_stage
            )));
        }
        if !self.store.delete_pipeline_status(tenant_id, id).await? {
            return Err(Error::NotFound("Pipeline status not found".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dto::pipeline_dto::StatusOrder;
    use crate::models::candidate::{NewCandidate, StatusWrite};
    use crate::store::memory::MemoryStore;
    use crate::store::{CandidateStore, PipelineStore};

    fn create(value: &str, order: Option<i32>) -> CreatePipelineStatusPayload {
        CreatePipelineStatusPayload {
            value: value.into(),
            label: value.to_uppercase(),
            order,
        }
    }

    #[tokio::test]
    async fn duplicate_value_is_bad_request() {
        let store = Arc::new(MemoryStore::new());
        let service = PipelineStatusService::new(store);
        let tenant = Uuid::new_v4();

        service.create(tenant, create("applied", None)).await.unwrap();
        let err = service.create(tenant, create("applied", None)).await.unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));
        // Same value in another tenant is fine.
        assert!(service.create(Uuid::new_v4(), create("applied", None)).await.is_ok());
    }

    #[tokio::test]
    async fn new_stages_append_and_reorder_rewrites_positions() {
        let store = Arc::new(MemoryStore::new());
        let service = PipelineStatusService::new(store);
        let tenant = Uuid::new_v4();

        let applied = service.create(tenant, create("applied", None)).await.unwrap();
        let onsite = service.create(tenant, create("onsite", None)).await.unwrap();
        assert_eq!((applied.order, onsite.order), (0, 1));

        let reordered = service
            .reorder(
                tenant,
                ReorderPipelineStatusesPayload {
                    statuses: vec![
                        StatusOrder { id: applied.id, order: 5 },
                        StatusOrder { id: onsite.id, order: 2 },
                    ],
                },
            )
            .await
            .unwrap();
        let values: Vec<&str> = reordered.iter().map(|s| s.value.as_str()).collect();
        assert_eq!(values, ["onsite", "applied"]);
    }

    #[tokio::test]
    async fn deleting_unknown_stage_is_not_found() {
        let service = PipelineStatusService::new(Arc::new(MemoryStore::new()));
        assert!(matches!(
            service.delete(Uuid::new_v4(), Uuid::new_v4()).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn appending_after_the_last_possible_position_is_bad_request() {
        let service = PipelineStatusService::new(Arc::new(MemoryStore::new()));
        let tenant = Uuid::new_v4();

        service.create(tenant, create("final", Some(i32::MAX))).await.unwrap();
        let err = service.create(tenant, create("beyond", None)).await.unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));
        assert_eq!(service.list(tenant).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn occupied_stage_cannot_be_deleted() {
        let store = Arc::new(MemoryStore::new());
        let service = PipelineStatusService::new(store.clone());
        let tenant = Uuid::new_v4();
        let onsite = service.create(tenant, create("onsite", None)).await.unwrap();

        let candidate = store
            .insert_candidate(NewCandidate {
                tenant_id: tenant,
                job_id: Uuid::new_v4(),
                name: "Ada".into(),
                first_name: None,
                last_name: None,
                email: None,
                phone: None,
                cv_file_path: "cv.pdf".into(),
                cover_letter_path: None,
                status: "onsite".into(),
                created_by: None,
            })
            .await
            .unwrap();

        let err = service.delete(tenant, onsite.id).await.unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));
        assert_eq!(store.list_pipeline_statuses(tenant).await.unwrap().len(), 1);

        store
            .write_status(
                tenant,
                candidate.id,
                StatusWrite {
                    status: "new".into(),
                    interview_date: None,
                    interview_link: None,
                },
                None,
            )
            .await
            .unwrap();
        service.delete(tenant, onsite.id).await.unwrap();
        assert!(store.list_pipeline_statuses(tenant).await.unwrap().is_empty());
    }
}
