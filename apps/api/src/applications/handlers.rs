use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::application::{ApplicationStatus, JobApplication};
use crate::models::cover_letter::CoverLetter;
use crate::state::AppState;

/// An application row joined with the file name of the resume it was
/// optimized from.
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct ApplicationWithResume {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub application: JobApplication,
    pub resume_file_name: String,
}

#[derive(Debug, Serialize)]
pub struct ApplicationDetail {
    #[serde(flatten)]
    pub application: ApplicationWithResume,
    pub cover_letters: Vec<CoverLetter>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateApplicationRequest {
    pub status: Option<ApplicationStatus>,
    pub notes: Option<String>,
}

/// GET /api/v1/applications
pub async fn handle_list_applications(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<ApplicationWithResume>>, AppError> {
    let applications = sqlx::query_as::<_, ApplicationWithResume>(
        r#"
        SELECT a.*, r.original_file_name AS resume_file_name
        FROM job_applications a
        JOIN resumes r ON r.id = a.resume_id
        WHERE a.user_id = $1
        ORDER BY a.created_at DESC
        "#,
    )
    .bind(&auth.user_id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(applications))
}

/// GET /api/v1/applications/:id
pub async fn handle_get_application(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApplicationDetail>, AppError> {
    let application = sqlx::query_as::<_, ApplicationWithResume>(
        r#"
        SELECT a.*, r.original_file_name AS resume_file_name
        FROM job_applications a
        JOIN resumes r ON r.id = a.resume_id
        WHERE a.id = $1 AND a.user_id = $2
        "#,
    )
    .bind(id)
    .bind(&auth.user_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Application {id} not found")))?;

    let cover_letters = sqlx::query_as::<_, CoverLetter>(
        "SELECT * FROM cover_letters WHERE job_application_id = $1 ORDER BY created_at DESC",
    )
    .bind(id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(ApplicationDetail {
        application,
        cover_letters,
    }))
}

/// PATCH /api/v1/applications/:id
///
/// Partial update of status and notes. The first transition into APPLIED
/// stamps `applied_at`; later status changes leave the stamp alone.
pub async fn handle_update_application(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateApplicationRequest>,
) -> Result<Json<JobApplication>, AppError> {
    let application = sqlx::query_as::<_, JobApplication>(
        r#"
        UPDATE job_applications
        SET status = COALESCE($3, status),
            notes = COALESCE($4, notes),
            applied_at = CASE
                WHEN $3 = 'APPLIED'::application_status AND applied_at IS NULL THEN now()
                ELSE applied_at
            END
        WHERE id = $1 AND user_id = $2
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(&auth.user_id)
    .bind(req.status)
    .bind(req.notes)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Application {id} not found")))?;

    Ok(Json(application))
}
