use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Terminal status every tenant pipeline accepts, configured or not.
pub const REJECTED_STATUS: &str = "rejected";

/// Initial status for tenants without a configured pipeline.
pub const DEFAULT_INITIAL_STATUS: &str = "new";

/// Stages used when a tenant has not configured its own pipeline.
pub const DEFAULT_PIPELINE: [&str; 5] = ["new", "shortlisted", "interview_scheduled", "offer", "hired"];

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromRow)]
pub struct PipelineStatus {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub value: String,
    pub label: String,
    #[sqlx(rename = "sort_order")]
    pub order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPipelineStatus {
    pub tenant_id: Uuid,
    pub value: String,
    pub label: String,
    pub order: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromRow)]
pub struct PipelineHistory {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub candidate_id: Uuid,
    pub old_status: Option<String>,
    pub new_status: String,
    pub changed_by: Option<Uuid>,
    pub changed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewHistoryEntry {
    pub candidate_id: Uuid,
    pub old_status: Option<String>,
    pub new_status: String,
    pub changed_by: Option<Uuid>,
}

/// The legal status alphabet of one tenant.
#[derive(Debug, Clone)]
pub struct StatusAlphabet {
    values: Vec<String>,
}

impl StatusAlphabet {
    /// `statuses` must already be sorted by `order`.
    pub fn from_statuses(statuses: &[PipelineStatus]) -> Self {
        let values = if statuses.is_empty() {
            DEFAULT_PIPELINE.iter().map(|s| s.to_string()).collect()
        } else {
            statuses.iter().map(|s| s.value.clone()).collect()
        };
        Self { values }
    }

    pub fn initial(&self) -> &str {
        self.values
            .first()
            .map(String::as_str)
            .unwrap_or(DEFAULT_INITIAL_STATUS)
    }

    pub fn contains(&self, status: &str) -> bool {
        status == REJECTED_STATUS || self.values.iter().any(|v| v == status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(value: &str, order: i32) -> PipelineStatus {
        PipelineStatus {
            id: Uuid::new_v4(),
            tenant_id: Uuid::nil(),
            value: value.to_string(),
            label: value.to_string(),
            order,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn unconfigured_tenant_uses_default_pipeline() {
        let alphabet = StatusAlphabet::from_statuses(&[]);
        assert_eq!(alphabet.initial(), "new");
        assert!(alphabet.contains("offer"));
        assert!(!alphabet.contains("phone_screen"));
    }

    #[test]
    fn rejected_is_always_accepted() {
        let alphabet = StatusAlphabet::from_statuses(&[status("applied", 0), status("onsite", 1)]);
        assert_eq!(alphabet.initial(), "applied");
        assert!(alphabet.contains(REJECTED_STATUS));
        assert!(!alphabet.contains("new"));
    }
}
