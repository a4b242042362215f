use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromRow)]
pub struct Candidate {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub job_id: Uuid,
    pub name: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub cv_file_path: String,
    pub cover_letter_path: Option<String>,
    pub profile_picture: Option<String>,
    pub status: String,
    pub interview_date: Option<DateTime<Utc>>,
    pub interview_link: Option<String>,
    pub notes: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewCandidate {
    pub tenant_id: Uuid,
    pub job_id: Uuid,
    pub name: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub cv_file_path: String,
    pub cover_letter_path: Option<String>,
    pub status: String,
    pub created_by: Option<Uuid>,
}

/// Fields written together with a status change.
#[derive(Debug, Clone)]
pub struct StatusWrite {
    pub status: String,
    pub interview_date: Option<DateTime<Utc>>,
    pub interview_link: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: i64,
    pub limit: i64,
}

impl Page {
    pub fn new(page: Option<i64>, limit: Option<i64>) -> Self {
        Self {
            page: page.filter(|p| *p > 0).unwrap_or(1),
            limit: limit.filter(|l| *l > 0).unwrap_or(25).min(100),
        }
    }

    /// Saturates for page numbers past any real result set.
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}
