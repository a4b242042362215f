use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use uuid::Uuid;

use super::email_service::{EmailMessage, EmailSender};
use crate::error::{Error, Result};
use crate::models::notification::{NewNotification, Notification, NotificationKind};
use crate::models::user::User;
use crate::store::Store;

/// One event addressed to a set of users.
#[derive(Debug, Clone)]
pub struct Announcement {
    pub tenant_id: Uuid,
    pub kind: NotificationKind,
    pub message: String,
    pub related_entity_id: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanOutReport {
    pub delivered: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct NotificationService {
    store: Arc<dyn Store>,
    email: Arc<dyn EmailSender>,
    concurrency: usize,
    timeout: Duration,
}

impl NotificationService {
    pub fn new(store: Arc<dyn Store>, email: Arc<dyn EmailSender>, concurrency: usize, timeout: Duration) -> Self {
        Self {
            store,
            email,
            concurrency: concurrency.max(1),
            timeout,
        }
    }

    /// Writes an in-app notification and sends an email to every recipient.
    ///
    /// Recipients are handled independently: one failing insert or send is
    /// logged and counted, never propagated, and never stops the others.
    pub async fn fan_out<F>(&self, recipients: &[User], announcement: &Announcement, email_for: F) -> FanOutReport
    where
        F: Fn(&User) -> EmailMessage,
    {
        let jobs: Vec<(User, EmailMessage)> = recipients
            .iter()
            .map(|user| (user.clone(), email_for(user)))
            .collect();

        let outcomes: Vec<bool> = stream::iter(jobs)
            .map(|(user, email)| async move {
                let row = NewNotification {
                    tenant_id: announcement.tenant_id,
                    user_id: user.id,
                    kind: announcement.kind,
                    message: announcement.message.clone(),
                    related_entity_id: announcement.related_entity_id,
                };
                let stored = self
                    .bounded(self.store.insert_notification(row))
                    .await
                    .map(|_| ());
                let sent = self.bounded(self.email.send(email)).await;
                self.record(&user, announcement.kind, stored, sent)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        Self::report(announcement.kind, &outcomes)
    }

    /// Email-only delivery, for events whose in-app rows were already committed.
    pub async fn send_emails(&self, kind: NotificationKind, messages: Vec<(User, EmailMessage)>) -> FanOutReport {
        let outcomes: Vec<bool> = stream::iter(messages)
            .map(|(user, email)| async move {
                let sent = self.bounded(self.email.send(email)).await;
                self.record(&user, kind, Ok(()), sent)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        Self::report(kind, &outcomes)
    }

    pub async fn list(&self, tenant_id: Uuid, user_id: Uuid) -> Result<Vec<Notification>> {
        self.store.list_notifications(tenant_id, user_id).await
    }

    pub async fn mark_read(&self, tenant_id: Uuid, user_id: Uuid, id: Option<Uuid>) -> Result<u64> {
        let marked = self.store.mark_notifications_read(tenant_id, user_id, id).await?;
        if id.is_some() && marked == 0 {
            return Err(Error::NotFound("Notification not found".to_string()));
        }
        Ok(marked)
    }

    async fn bounded<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(Error::Internal(format!(
                "notification delivery timed out after {:?}",
                self.timeout
            ))),
        }
    }

    fn record(&self, user: &User, kind: NotificationKind, stored: Result<()>, sent: Result<()>) -> bool {
        let mut ok = true;
        if let Err(e) = stored {
            tracing::warn!(user_id = %user.id, kind = %kind, error = %e, "failed to store notification");
            ok = false;
        }
        if let Err(e) = sent {
            tracing::warn!(user_id = %user.id, to = %user.email, kind = %kind, error = %e, "failed to send notification email");
            ok = false;
        }
        ok
    }

    fn report(kind: NotificationKind, outcomes: &[bool]) -> FanOutReport {
        let delivered = outcomes.iter().filter(|ok| **ok).count();
        let report = FanOutReport {
            delivered,
            failed: outcomes.len() - delivered,
        };
        if report.failed > 0 {
            tracing::warn!(kind = %kind, delivered = report.delivered, failed = report.failed, "notification fan-out incomplete");
        } else {
            tracing::debug!(kind = %kind, delivered = report.delivered, "notification fan-out complete");
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::Role;
    use crate::services::email_service::MockEmailSender;
    use crate::store::memory::MemoryStore;

    fn announcement(tenant_id: Uuid) -> Announcement {
        Announcement {
            tenant_id,
            kind: NotificationKind::CandidateAdded,
            message: "New candidate Ada added to Engineer".to_string(),
            related_entity_id: None,
        }
    }

    #[tokio::test]
    async fn one_failed_email_does_not_stop_the_rest() {
        let store = Arc::new(MemoryStore::new());
        let tenant = store.insert_tenant("acme", true).await;
        let ok_user = store.insert_user(tenant.id, "ok@acme.test", Role::Hr).await;
        let bad_user = store.insert_user(tenant.id, "bad@acme.test", Role::Hr).await;

        let mut email = MockEmailSender::new();
        email.expect_send().times(2).returning(|msg| {
            if msg.to == "bad@acme.test" {
                Err(Error::Internal("smtp down".to_string()))
            } else {
                Ok(())
            }
        });

        let service = NotificationService::new(store.clone(), Arc::new(email), 4, Duration::from_secs(5));
        let report = service
            .fan_out(&[bad_user.clone(), ok_user.clone()], &announcement(tenant.id), |u| {
                EmailMessage::candidate_added(&u.email, "Ada", "Engineer")
            })
            .await;

        assert_eq!(report, FanOutReport { delivered: 1, failed: 1 });
        // The in-app row is written even when the email fails.
        assert_eq!(store.notification_rows().await.len(), 2);
    }

    #[tokio::test]
    async fn failed_insert_still_sends_other_recipients() {
        let store = Arc::new(MemoryStore::new());
        let tenant = store.insert_tenant("acme", true).await;
        let a = store.insert_user(tenant.id, "a@acme.test", Role::Hr).await;
        let b = store.insert_user(tenant.id, "b@acme.test", Role::Hr).await;
        store.fail_notifications_for(a.id).await;

        let mut email = MockEmailSender::new();
        email.expect_send().times(2).returning(|_| Ok(()));

        let service = NotificationService::new(store.clone(), Arc::new(email), 1, Duration::from_secs(5));
        let report = service
            .fan_out(&[a, b.clone()], &announcement(tenant.id), |u| {
                EmailMessage::candidate_added(&u.email, "Ada", "Engineer")
            })
            .await;

        assert_eq!(report, FanOutReport { delivered: 1, failed: 1 });
        let rows = store.notification_rows().await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].user_id, b.id);
    }

    #[tokio::test]
    async fn mark_read_of_unknown_notification_is_not_found() {
        let store = Arc::new(MemoryStore::new());
        let service = NotificationService::new(
            store,
            Arc::new(MockEmailSender::new()),
            1,
            Duration::from_secs(1),
        );
        let err = service
            .mark_read(Uuid::new_v4(), Uuid::new_v4(), Some(Uuid::new_v4()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
