pub mod comment_service;
pub mod email_service;
pub mod feedback_service;
pub mod job_service;
pub mod notification_service;
pub mod pipeline_service;
pub mod pipeline_status_service;
pub mod storage_service;
pub mod tenant_cache;
