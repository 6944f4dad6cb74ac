use axum::extract::{Multipart, Path, State};
use axum::Json;
use bytes::Bytes;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::resume::{FileType, Resume};
use crate::resumes::{parse, storage};
use crate::state::AppState;

/// Hard cap on uploaded file size. Mirrored by the body limit on the route.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Deserialize)]
pub struct PasteResumeRequest {
    pub content: String,
    pub file_name: String,
}

/// POST /api/v1/resumes
///
/// Multipart upload of an original resume file (PDF or Markdown).
pub async fn handle_upload_resume(
    auth: AuthUser,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<Resume>, AppError> {
    let mut upload: Option<(String, FileType, Bytes)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart payload: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().unwrap_or("resume").to_string();
        let content_type = field.content_type().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Failed to read uploaded file: {e}")))?;

        let file_type = detect_file_type(content_type.as_deref(), &file_name)?;
        upload = Some((file_name, file_type, data));
        break;
    }

    let (file_name, file_type, data) =
        upload.ok_or_else(|| AppError::Validation("No file provided".to_string()))?;

    if data.len() > MAX_UPLOAD_BYTES {
        return Err(AppError::Validation(
            "File too large. Maximum size is 10MB.".to_string(),
        ));
    }

    let resume = create_resume(&state, &auth.user_id, file_name, file_type, data).await?;
    Ok(Json(resume))
}

/// POST /api/v1/resumes/paste
///
/// JSON alternative to file upload: raw resume text, stored as Markdown.
pub async fn handle_paste_resume(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(req): Json<PasteResumeRequest>,
) -> Result<Json<Resume>, AppError> {
    if req.content.trim().is_empty() {
        return Err(AppError::Validation(
            "Resume content cannot be empty".to_string(),
        ));
    }
    if req.content.len() > MAX_UPLOAD_BYTES {
        return Err(AppError::Validation(
            "File too large. Maximum size is 10MB.".to_string(),
        ));
    }

    let file_name = if req.file_name.trim().is_empty() {
        "resume.md".to_string()
    } else {
        req.file_name
    };

    let data = Bytes::from(req.content.into_bytes());
    let resume =
        create_resume(&state, &auth.user_id, file_name, FileType::Markdown, data).await?;
    Ok(Json(resume))
}

/// GET /api/v1/resumes
pub async fn handle_list_resumes(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Resume>>, AppError> {
    let resumes = sqlx::query_as::<_, Resume>(
        "SELECT * FROM resumes WHERE user_id = $1 ORDER BY created_at DESC",
    )
    .bind(&auth.user_id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(resumes))
}

/// GET /api/v1/resumes/:id
pub async fn handle_get_resume(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Resume>, AppError> {
    let resume = sqlx::query_as::<_, Resume>("SELECT * FROM resumes WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(&auth.user_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Resume {id} not found")))?;

    Ok(Json(resume))
}

/// Shared tail of both intake paths: extract text, upload the original,
/// persist the row.
async fn create_resume(
    state: &AppState,
    user_id: &str,
    file_name: String,
    file_type: FileType,
    data: Bytes,
) -> Result<Resume, AppError> {
    let resume_id = Uuid::new_v4();
    let content = parse::extract_resume_text(file_type, data.clone()).await;

    let file_url =
        storage::store_original_file(state, user_id, resume_id, &file_name, file_type, data)
            .await?;

    let resume = sqlx::query_as::<_, Resume>(
        r#"
        INSERT INTO resumes
            (id, user_id, original_file_name, original_file_url, file_type, original_content)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(resume_id)
    .bind(user_id)
    .bind(&file_name)
    .bind(&file_url)
    .bind(file_type)
    .bind(&content)
    .fetch_one(&state.db)
    .await?;

    Ok(resume)
}

fn detect_file_type(content_type: Option<&str>, file_name: &str) -> Result<FileType, AppError> {
    match content_type {
        Some("application/pdf") => Ok(FileType::Pdf),
        Some("text/markdown") => Ok(FileType::Markdown),
        _ if file_name.ends_with(".pdf") => Ok(FileType::Pdf),
        _ if file_name.ends_with(".md") || file_name.ends_with(".markdown") => {
            Ok(FileType::Markdown)
        }
        _ => Err(AppError::Validation(
            "Unsupported file type. Please upload a PDF or Markdown file.".to_string(),
        )),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_by_content_type() {
        assert_eq!(
            detect_file_type(Some("application/pdf"), "resume").ok(),
            Some(FileType::Pdf)
        );
        assert_eq!(
            detect_file_type(Some("text/markdown"), "resume").ok(),
            Some(FileType::Markdown)
        );
    }

    #[test]
    fn test_detect_by_extension_when_content_type_is_generic() {
        assert_eq!(
            detect_file_type(Some("application/octet-stream"), "cv.pdf").ok(),
            Some(FileType::Pdf)
        );
        assert_eq!(
            detect_file_type(None, "cv.md").ok(),
            Some(FileType::Markdown)
        );
    }

    #[test]
    fn test_unsupported_type_rejected() {
        let err = detect_file_type(Some("application/msword"), "cv.doc");
        assert!(matches!(err, Err(AppError::Validation(_))));
    }
}
