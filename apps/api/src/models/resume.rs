use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Source format of an uploaded resume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "file_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileType {
    Pdf,
    Markdown,
}

/// An uploaded resume with its extracted text content.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Resume {
    pub id: Uuid,
    pub user_id: String,
    pub original_file_name: String,
    /// Object-storage URL of the raw upload.
    pub original_file_url: String,
    pub file_type: FileType,
    /// Plain text extracted at upload time; the input to every optimization.
    pub original_content: String,
    pub created_at: DateTime<Utc>,
}
