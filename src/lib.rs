pub mod config;
pub mod database;
pub mod docs;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod store;

use std::sync::Arc;

use reqwest::Client;
use sqlx::PgPool;

use crate::config::Config;
use crate::error::Result;
use crate::services::{
    comment_service::CommentService,
    email_service::{EmailSender, LogEmailSender, RelayEmailSender},
    feedback_service::FeedbackService,
    job_service::JobService,
    notification_service::NotificationService,
    pipeline_service::PipelineService,
    pipeline_status_service::PipelineStatusService,
    storage_service::{LocalStorage, ObjectStorage},
    tenant_cache::TenantCache,
};
use crate::store::{postgres::PgStore, Store, TenantStore};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub jwt_secret: Arc<str>,
    pub tenant_cache: TenantCache,
    pub job_service: JobService,
    pub pipeline_service: PipelineService,
    pub pipeline_status_service: PipelineStatusService,
    pub feedback_service: FeedbackService,
    pub notification_service: NotificationService,
    pub comment_service: CommentService,
}

impl AppState {
    pub fn new(pool: PgPool, config: &Config) -> Result<Self> {
        let http_client = Client::builder().timeout(config.notification_timeout).build()?;

        let email: Arc<dyn EmailSender> = match &config.email_relay_url {
            Some(url) => Arc::new(RelayEmailSender::new(http_client, url.clone())),
            None => {
                tracing::warn!("EMAIL_RELAY_URL is not set; notification emails will only be logged");
                Arc::new(LogEmailSender)
            }
        };
        let storage: Arc<dyn ObjectStorage> = Arc::new(LocalStorage::new(&config.uploads_dir));

        Ok(Self::with_backends(Arc::new(PgStore::new(pool)), email, storage, config))
    }

    /// Wires every service over the given adapters.
    pub fn with_backends<S>(
        store: Arc<S>,
        email: Arc<dyn EmailSender>,
        storage: Arc<dyn ObjectStorage>,
        config: &Config,
    ) -> Self
    where
        S: Store + 'static,
    {
        let tenant_store: Arc<dyn TenantStore> = store.clone();
        let store: Arc<dyn Store> = store;

        let notification_service = NotificationService::new(
            store.clone(),
            email,
            config.notification_concurrency,
            config.notification_timeout,
        );
        let feedback_service = FeedbackService::new(store.clone());
        let comment_service = CommentService::new(store.clone(), storage.clone());
        let pipeline_service = PipelineService::new(
            store.clone(),
            storage,
            feedback_service.clone(),
            notification_service.clone(),
        );
        let job_service = JobService::new(store.clone(), notification_service.clone());
        let pipeline_status_service = PipelineStatusService::new(store.clone());

        Self {
            tenant_cache: TenantCache::new(tenant_store, config.tenant_cache_ttl),
            jwt_secret: Arc::from(config.jwt_secret.as_str()),
            store,
            job_service,
            pipeline_service,
            pipeline_status_service,
            feedback_service,
            notification_service,
            comment_service,
        }
    }
}
