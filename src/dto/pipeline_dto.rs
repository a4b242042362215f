use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreatePipelineStatusPayload {
    #[validate(length(min = 1, max = 64, message = "Value is required"))]
    pub value: String,
    #[validate(length(min = 1, message = "Label is required"))]
    pub label: String,
    pub order: Option<i32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdatePipelineStatusPayload {
    #[validate(length(min = 1))]
    pub label: Option<String>,
    pub order: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StatusOrder {
    pub id: Uuid,
    pub order: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct ReorderPipelineStatusesPayload {
    #[validate(length(min = 1))]
    pub statuses: Vec<StatusOrder>,
}
