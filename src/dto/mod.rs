pub mod candidate_dto;
pub mod comment_dto;
pub mod feedback_dto;
pub mod job_dto;
pub mod notification_dto;
pub mod pipeline_dto;
pub mod tenant_dto;
