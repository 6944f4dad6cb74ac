use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Generated cover letter, at most one per job application.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CoverLetter {
    pub id: Uuid,
    pub job_application_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
}
