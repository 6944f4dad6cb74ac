use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Where a tracked job application sits in the user's pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "application_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationStatus {
    Draft,
    Applied,
    Interviewing,
    Rejected,
    Accepted,
}

/// One optimization run: a resume tailored against a specific job posting.
///
/// Rows in this table are the unit of usage metering. The free-tier quota
/// counts them by `created_at` over a sliding window, so creation time is
/// stamped by the database and never updated.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobApplication {
    pub id: Uuid,
    pub user_id: String,
    pub resume_id: Uuid,
    pub job_title: String,
    pub company_name: String,
    pub job_description_text: String,
    pub job_description_url: Option<String>,
    pub optimized_resume_content: String,
    pub status: ApplicationStatus,
    /// Stamped the first time the application transitions to APPLIED.
    pub applied_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}
