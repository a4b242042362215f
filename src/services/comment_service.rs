//! Candidate comments and their optional file attachment.

use std::sync::Arc;

use uuid::Uuid;

use super::storage_service::{checked_extension_in, content_type_for, FileDownload, ObjectStorage};
use crate::dto::candidate_dto::UploadedFile;
use crate::dto::comment_dto::{CommentForm, DeleteAttachmentResponse};
use crate::error::{Error, Result};
use crate::models::candidate::Candidate;
use crate::models::comment::{Comment, CommentAttachment, NewComment};
use crate::store::Store;

pub const MAX_ATTACHMENT_BYTES: usize = 6 * 1024 * 1024;

pub const ATTACHMENT_EXTENSIONS: [&str; 7] = ["pdf", "doc", "docx", "jpg", "jpeg", "png", "gif"];

#[derive(Clone)]
pub struct CommentService {
    store: Arc<dyn Store>,
    storage: Arc<dyn ObjectStorage>,
}

impl CommentService {
    pub fn new(store: Arc<dyn Store>, storage: Arc<dyn ObjectStorage>) -> Self {
        Self { store, storage }
    }

    /// A comment needs text, an attachment, or both.
    pub async fn create(
        &self,
        tenant_id: Uuid,
        candidate_id: Uuid,
        created_by: Uuid,
        form: CommentForm,
    ) -> Result<Comment> {
        let CommentForm { text, attachment } = form;
        let text = text
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        if text.is_none() && attachment.is_none() {
            return Err(Error::BadRequest("Text or attachment is required".to_string()));
        }
        let ext = match &attachment {
            Some(file) => Some(attachment_extension(file)?),
            None => None,
        };

        let candidate = self.candidate(tenant_id, candidate_id).await?;
        if self.store.find_user(tenant_id, created_by).await?.is_none() {
            return Err(Error::NotFound("User not found".to_string()));
        }

        let attachment = match (attachment, ext) {
            (Some(file), Some(ext)) => Some(self.store_attachment(tenant_id, file, &ext).await?),
            _ => None,
        };
        let stored_path = attachment.as_ref().map(|a| a.path.clone());

        let inserted = self
            .store
            .insert_comment(NewComment {
                tenant_id,
                candidate_id: candidate.id,
                text,
                created_by,
                attachment,
            })
            .await;
        match inserted {
            Ok(comment) => {
                tracing::info!(
                    tenant_id = %tenant_id,
                    candidate_id = %candidate.id,
                    comment_id = %comment.id,
                    with_attachment = comment.attachment_path.is_some(),
                    "comment created"
                );
                Ok(comment)
            }
            Err(e) => {
                if let Some(path) = stored_path {
                    self.discard(&path).await;
                }
                Err(e)
            }
        }
    }

    /// Oldest first.
    pub async fn list(&self, tenant_id: Uuid, candidate_id: Uuid) -> Result<Vec<Comment>> {
        self.store.list_comments(tenant_id, candidate_id).await
    }

    pub async fn attachment(&self, tenant_id: Uuid, comment_id: Uuid) -> Result<FileDownload> {
        let comment = self.store.find_comment(tenant_id, comment_id).await?;
        let (path, filename) = match comment {
            Some(Comment {
                attachment_path: Some(path),
                attachment_original_name,
                ..
            }) => {
                let filename = attachment_original_name
                    .or_else(|| path.rsplit('/').next().map(str::to_string))
                    .unwrap_or_else(|| "attachment".to_string());
                (path, filename)
            }
            _ => return Err(Error::NotFound("Attachment not found".to_string())),
        };
        let stream = self.storage.get_file_stream(&path).await?;
        Ok(FileDownload {
            stream,
            content_type: content_type_for(&path),
            filename,
        })
    }

    /// Only the comment's author may remove its attachment.
    pub async fn delete_attachment(
        &self,
        tenant_id: Uuid,
        comment_id: Uuid,
        user_id: Uuid,
    ) -> Result<DeleteAttachmentResponse> {
        let comment = self
            .store
            .find_comment(tenant_id, comment_id)
            .await?
            .ok_or_else(|| Error::NotFound("Comment not found".to_string()))?;
        if comment.created_by != user_id {
            return Err(Error::Forbidden("Not authorized to delete this attachment".to_string()));
        }

        if let Some(path) = &comment.attachment_path {
            self.storage.delete(path).await?;
        }
        let comment = self
            .store
            .clear_comment_attachment(tenant_id, comment.id)
            .await?
            .ok_or_else(|| Error::NotFound("Comment not found".to_string()))?;
        tracing::info!(tenant_id = %tenant_id, comment_id = %comment.id, "comment attachment deleted");

        Ok(DeleteAttachmentResponse {
            message: "Attachment deleted successfully".to_string(),
            comment,
        })
    }

    async fn store_attachment(&self, tenant_id: Uuid, file: UploadedFile, ext: &str) -> Result<CommentAttachment> {
        let path = format!("{}/comments/{}.{}", tenant_id, Uuid::new_v4(), ext);
        let content_type = content_type_for(&path);
        let len = file.data.len();
        let stored = self.storage.upload(file.data, content_type, len, &path).await?;
        Ok(CommentAttachment {
            path: stored.url,
            original_name: file.filename,
            content_type: content_type.to_string(),
            size: i32::try_from(len)
                .map_err(|_| Error::BadRequest("File size must not exceed 6MB".to_string()))?,
        })
    }

    async fn discard(&self, path: &str) {
        if let Err(e) = self.storage.delete(path).await {
            tracing::warn!(path = %path, error = %e, "could not remove orphaned attachment");
        }
    }

    async fn candidate(&self, tenant_id: Uuid, candidate_id: Uuid) -> Result<Candidate> {
        self.store
            .find_candidate(tenant_id, candidate_id)
            .await?
            .ok_or_else(|| Error::NotFound("Candidate not found".to_string()))
    }
}

fn attachment_extension(file: &UploadedFile) -> Result<String> {
    if file.data.len() > MAX_ATTACHMENT_BYTES {
        return Err(Error::BadRequest("File size must not exceed 6MB".to_string()));
    }
    checked_extension_in(&file.filename, &file.data, &ATTACHMENT_EXTENSIONS)
        .map_err(|_| Error::BadRequest("Only PDF, DOC, DOCX, and Images are allowed".to_string()))
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use futures::TryStreamExt;

    use super::*;
    use crate::models::candidate::NewCandidate;
    use crate::models::job::NewJob;
    use crate::models::user::{Role, User};
    use crate::services::storage_service::LocalStorage;
    use crate::store::memory::MemoryStore;
    use crate::store::{CandidateStore, CommentStore, JobStore};

    struct Fixture {
        store: Arc<MemoryStore>,
        service: CommentService,
        uploads: std::path::PathBuf,
        tenant_id: Uuid,
        hr: User,
        candidate: Candidate,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let tenant = store.insert_tenant("acme", true).await;
        let hr = store.insert_user(tenant.id, "hr@acme.test", Role::Hr).await;
        let job = store
            .insert_job(NewJob {
                tenant_id: tenant.id,
                title: "Engineer".into(),
                description: "Build things".into(),
                department: None,
                start_date: None,
                expected_closing_date: None,
                created_by: hr.id,
                assignee_ids: vec![hr.id],
                feedback_template_ids: vec![],
            })
            .await
            .unwrap();
        let candidate = store
            .insert_candidate(NewCandidate {
                tenant_id: tenant.id,
                job_id: job.id,
                name: "Ada".into(),
                first_name: None,
                last_name: None,
                email: None,
                phone: None,
                cv_file_path: "cv.pdf".into(),
                cover_letter_path: None,
                status: "new".into(),
                created_by: Some(hr.id),
            })
            .await
            .unwrap();

        let uploads = std::env::temp_dir().join(format!("ats-comments-{}", Uuid::new_v4()));
        let service = CommentService::new(store.clone(), Arc::new(LocalStorage::new(uploads.clone())));
        Fixture {
            store,
            service,
            uploads,
            tenant_id: tenant.id,
            hr,
            candidate,
        }
    }

    fn pdf(name: &str) -> UploadedFile {
        UploadedFile {
            filename: name.into(),
            data: Bytes::from_static(b"%PDF-1.4 scorecard"),
        }
    }

    impl Fixture {
        async fn comment(&self, text: Option<&str>, attachment: Option<UploadedFile>) -> Result<Comment> {
            self.service
                .create(
                    self.tenant_id,
                    self.candidate.id,
                    self.hr.id,
                    CommentForm {
                        text: text.map(str::to_string),
                        attachment,
                    },
                )
                .await
        }

        fn stored_attachments(&self) -> usize {
            let dir = self.uploads.join(self.tenant_id.to_string()).join("comments");
            std::fs::read_dir(&dir).map(|entries| entries.count()).unwrap_or(0)
        }
    }

    #[tokio::test]
    async fn empty_comment_is_bad_request() {
        let fx = fixture().await;
        let err = fx.comment(Some("   "), None).await.unwrap_err();
        assert!(matches!(err, Error::BadRequest(ref m) if m == "Text or attachment is required"));
    }

    #[tokio::test]
    async fn attachment_rules_are_enforced() {
        let fx = fixture().await;

        let too_big = UploadedFile {
            filename: "huge.pdf".into(),
            data: Bytes::from(vec![b'%'; MAX_ATTACHMENT_BYTES + 1]),
        };
        let err = fx.comment(None, Some(too_big)).await.unwrap_err();
        assert!(matches!(err, Error::BadRequest(ref m) if m == "File size must not exceed 6MB"));

        let script = UploadedFile {
            filename: "run.sh".into(),
            data: Bytes::from_static(b"#!/bin/sh"),
        };
        let err = fx.comment(Some("see attached"), Some(script)).await.unwrap_err();
        assert!(matches!(err, Error::BadRequest(ref m) if m == "Only PDF, DOC, DOCX, and Images are allowed"));

        assert!(fx.store.list_comments(fx.tenant_id, fx.candidate.id).await.unwrap().is_empty());
        assert_eq!(fx.stored_attachments(), 0);
    }

    #[tokio::test]
    async fn unknown_candidate_or_author_is_not_found() {
        let fx = fixture().await;
        let form = || CommentForm {
            text: Some("hello".into()),
            attachment: None,
        };

        let err = fx
            .service
            .create(fx.tenant_id, Uuid::new_v4(), fx.hr.id, form())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(ref m) if m == "Candidate not found"));

        let err = fx
            .service
            .create(fx.tenant_id, fx.candidate.id, Uuid::new_v4(), form())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(ref m) if m == "User not found"));
    }

    #[tokio::test]
    async fn comments_list_oldest_first_and_attachment_streams_back() {
        let fx = fixture().await;
        let first = fx.comment(Some("Strong CV"), None).await.unwrap();
        let second = fx.comment(None, Some(pdf("scorecard.pdf"))).await.unwrap();
        assert_eq!(second.attachment_original_name.as_deref(), Some("scorecard.pdf"));
        assert_eq!(second.attachment_type.as_deref(), Some("application/pdf"));
        assert_eq!(second.attachment_size, Some(18));

        let listed = fx.service.list(fx.tenant_id, fx.candidate.id).await.unwrap();
        let ids: Vec<Uuid> = listed.iter().map(|c| c.id).collect();
        assert_eq!(ids, [first.id, second.id]);

        let download = fx.service.attachment(fx.tenant_id, second.id).await.unwrap();
        assert_eq!(download.filename, "scorecard.pdf");
        assert_eq!(download.content_type, "application/pdf");
        let chunks: Vec<Bytes> = download.stream.try_collect().await.unwrap();
        assert_eq!(chunks.concat(), b"%PDF-1.4 scorecard");

        let err = fx.service.attachment(fx.tenant_id, first.id).await.err().unwrap();
        assert!(matches!(err, Error::NotFound(ref m) if m == "Attachment not found"));
    }

    #[tokio::test]
    async fn only_the_author_can_delete_an_attachment() {
        let fx = fixture().await;
        let other = fx
            .store
            .insert_user(fx.tenant_id, "int@acme.test", Role::Interviewer)
            .await;
        let comment = fx.comment(Some("notes"), Some(pdf("notes.pdf"))).await.unwrap();

        let err = fx
            .service
            .delete_attachment(fx.tenant_id, comment.id, other.id)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));
        assert_eq!(fx.stored_attachments(), 1);

        let deleted = fx
            .service
            .delete_attachment(fx.tenant_id, comment.id, fx.hr.id)
            .await
            .unwrap();
        assert_eq!(deleted.message, "Attachment deleted successfully");
        assert!(deleted.comment.attachment_path.is_none());
        assert!(deleted.comment.attachment_size.is_none());
        assert_eq!(deleted.comment.text.as_deref(), Some("notes"));
        assert_eq!(fx.stored_attachments(), 0);

        let err = fx
            .service
            .delete_attachment(fx.tenant_id, Uuid::new_v4(), fx.hr.id)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(ref m) if m == "Comment not found"));
    }

    #[tokio::test]
    async fn failed_insert_removes_the_uploaded_attachment() {
        let fx = fixture().await;
        fx.store.fail_comment_inserts();

        let err = fx.comment(None, Some(pdf("lost.pdf"))).await.unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
        assert_eq!(fx.stored_attachments(), 0);
    }
}
