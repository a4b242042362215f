use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

macro_rules! string_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(format!("unknown {}: {}", stringify!($name), other)),
                }
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TemplateType {
    PhoneScreening,
    TechnicalInterview,
    ManagerFeedback,
    HrFeedback,
    BehavioralInterview,
}

string_enum!(TemplateType {
    PhoneScreening => "phone_screening",
    TechnicalInterview => "technical_interview",
    ManagerFeedback => "manager_feedback",
    HrFeedback => "hr_feedback",
    BehavioralInterview => "behavioral_interview",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    FreeText,
    Rating,
    YesNo,
    MultipleChoice,
}

string_enum!(QuestionType {
    FreeText => "free_text",
    Rating => "rating",
    YesNo => "yes_no",
    MultipleChoice => "multiple_choice",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackStatus {
    NotStarted,
    InProgress,
    Completed,
}

string_enum!(FeedbackStatus {
    NotStarted => "not_started",
    InProgress => "in_progress",
    Completed => "completed",
});

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackTemplate {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub template_type: TemplateType,
    pub description: Option<String>,
    pub instructions: Option<String>,
    pub is_active: bool,
    pub stage_mappings: Vec<String>,
    pub job_type_mappings: Vec<String>,
    pub version: i32,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FeedbackTemplate {
    /// Rule-driven attachment: the candidate's stage or the job's title is mapped.
    pub fn matches_rules(&self, candidate_status: &str, job_title: &str) -> bool {
        self.is_active
            && (self.stage_mappings.iter().any(|s| s == candidate_status)
                || self.job_type_mappings.iter().any(|t| t == job_title))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackQuestion {
    pub id: Uuid,
    pub template_id: Uuid,
    pub question: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub required: bool,
    pub help_text: Option<String>,
    pub options: Vec<String>,
    pub min_rating: Option<i32>,
    pub max_rating: Option<i32>,
    pub order: i32,
}

/// A template loaded together with its ordered questions.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TemplateWithQuestions {
    #[serde(flatten)]
    pub template: FeedbackTemplate,
    pub questions: Vec<FeedbackQuestion>,
}

#[derive(Debug, Clone)]
pub struct NewQuestion {
    pub question: String,
    pub question_type: QuestionType,
    pub required: bool,
    pub help_text: Option<String>,
    pub options: Vec<String>,
    pub min_rating: Option<i32>,
    pub max_rating: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct NewFeedbackTemplate {
    pub tenant_id: Uuid,
    pub name: String,
    pub template_type: TemplateType,
    pub description: Option<String>,
    pub instructions: Option<String>,
    pub is_active: bool,
    pub stage_mappings: Vec<String>,
    pub job_type_mappings: Vec<String>,
    pub created_by: Option<Uuid>,
    pub questions: Vec<NewQuestion>,
}

/// Partial update; `questions`, when present, replaces the whole list.
#[derive(Debug, Clone, Default)]
pub struct TemplateChanges {
    pub name: Option<String>,
    pub template_type: Option<TemplateType>,
    pub description: Option<String>,
    pub instructions: Option<String>,
    pub is_active: Option<bool>,
    pub stage_mappings: Option<Vec<String>>,
    pub job_type_mappings: Option<Vec<String>>,
    pub questions: Option<Vec<NewQuestion>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CandidateFeedback {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub candidate_id: Uuid,
    pub template_id: Uuid,
    pub status: FeedbackStatus,
    pub assigned_by: Option<Uuid>,
    pub assigned_at: DateTime<Utc>,
    pub completed_by: Option<Uuid>,
    pub completed_at: Option<DateTime<Utc>>,
    pub overall_score: Option<f64>,
    pub general_comments: Option<String>,
    pub is_manually_assigned: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewCandidateFeedback {
    pub tenant_id: Uuid,
    pub candidate_id: Uuid,
    pub template_id: Uuid,
    pub assigned_by: Option<Uuid>,
    pub is_manually_assigned: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackResponse {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub candidate_feedback_id: Uuid,
    pub question_id: Uuid,
    pub answered_by: Uuid,
    pub text_answer: Option<String>,
    pub numeric_answer: Option<i32>,
    pub boolean_answer: Option<bool>,
    pub selected_option: Option<String>,
    pub comments: Option<String>,
    pub answered_at: DateTime<Utc>,
}

/// Keyed by `(candidate_feedback_id, question_id, answered_by)`.
#[derive(Debug, Clone)]
pub struct ResponseUpsert {
    pub tenant_id: Uuid,
    pub candidate_feedback_id: Uuid,
    pub question_id: Uuid,
    pub answered_by: Uuid,
    pub text_answer: Option<String>,
    pub numeric_answer: Option<i32>,
    pub boolean_answer: Option<bool>,
    pub selected_option: Option<String>,
    pub comments: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedbackCounts {
    pub total: i64,
    pub completed: i64,
    pub in_progress: i64,
}

/// A candidate's feedback row with its template, questions and answers loaded.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackDetails {
    #[serde(flatten)]
    pub feedback: CandidateFeedback,
    pub template: Option<TemplateWithQuestions>,
    pub responses: Vec<FeedbackResponse>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackStats {
    pub total: i64,
    pub completed: i64,
    pub in_progress: i64,
    pub not_started: i64,
    pub completion_rate: f64,
}

impl From<FeedbackCounts> for FeedbackStats {
    fn from(counts: FeedbackCounts) -> Self {
        let completion_rate = if counts.total > 0 {
            counts.completed as f64 / counts.total as f64 * 100.0
        } else {
            0.0
        };
        Self {
            total: counts.total,
            completed: counts.completed,
            in_progress: counts.in_progress,
            not_started: counts.total - counts.completed - counts.in_progress,
            completion_rate,
        }
    }
}

/// Mean of the numeric answers given to rating questions, rounded to two decimals.
pub fn overall_score(questions: &[FeedbackQuestion], responses: &[FeedbackResponse]) -> Option<f64> {
    let ratings: Vec<f64> = responses
        .iter()
        .filter(|r| {
            questions
                .iter()
                .any(|q| q.id == r.question_id && q.question_type == QuestionType::Rating)
        })
        .filter_map(|r| r.numeric_answer.map(f64::from))
        .collect();
    if ratings.is_empty() {
        return None;
    }
    let mean = ratings.iter().sum::<f64>() / ratings.len() as f64;
    Some((mean * 100.0).round() / 100.0)
}
