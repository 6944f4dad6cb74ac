use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::entitlement::{ActionKind, Decision, DenyReason};
use crate::errors::AppError;
use crate::generation::scrape;
use crate::llm_client::prompts;
use crate::models::application::JobApplication;
use crate::models::cover_letter::CoverLetter;
use crate::models::resume::Resume;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct OptimizeResumeRequest {
    pub resume_id: Uuid,
    pub job_title: String,
    pub company_name: String,
    pub job_description_text: Option<String>,
    pub job_description_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CoverLetterRequest {
    pub job_application_id: Uuid,
}

/// POST /api/v1/optimize-resume
///
/// Optimizes an uploaded resume against a job description and records the
/// result as a new DRAFT application. The job description comes from the
/// request body, or is scraped from the given URL when the text is absent.
pub async fn handle_optimize_resume(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(req): Json<OptimizeResumeRequest>,
) -> Result<Json<JobApplication>, AppError> {
    let decision = state
        .gate
        .can_perform(&auth.user_id, ActionKind::Optimize, Utc::now())
        .await;
    if let Decision::Deny(reason) = decision {
        return Err(AppError::UpgradeRequired(deny_message(
            ActionKind::Optimize,
            &reason,
        )));
    }

    if req.job_title.trim().is_empty() {
        return Err(AppError::Validation("job_title is required".to_string()));
    }
    if req.company_name.trim().is_empty() {
        return Err(AppError::Validation("company_name is required".to_string()));
    }
    let has_text = req
        .job_description_text
        .as_deref()
        .map(|t| !t.trim().is_empty())
        .unwrap_or(false);
    if !has_text && req.job_description_url.is_none() {
        return Err(AppError::Validation(
            "Either job_description_text or job_description_url must be provided".to_string(),
        ));
    }

    let resume = sqlx::query_as::<_, Resume>("SELECT * FROM resumes WHERE id = $1 AND user_id = $2")
        .bind(req.resume_id)
        .bind(&auth.user_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Resume {} not found", req.resume_id)))?;

    let job_description = if has_text {
        req.job_description_text.clone().unwrap_or_default()
    } else {
        let url = req.job_description_url.as_deref().unwrap_or_default();
        scrape::fetch_job_description(&state.http, url)
            .await
            .map_err(|_| {
                AppError::Validation(
                    "Failed to fetch job description from URL. Please paste the job description instead."
                        .to_string(),
                )
            })?
    };

    let prompt = prompts::build_optimize_prompt(
        &resume.original_content,
        &req.job_title,
        &req.company_name,
        &job_description,
    );
    let optimized = state
        .llm
        .call_text(&prompt, prompts::OPTIMIZE_SYSTEM)
        .await
        .map_err(|e| AppError::Llm(e.to_string()))?;

    let application = sqlx::query_as::<_, JobApplication>(
        r#"
        INSERT INTO job_applications
            (id, user_id, resume_id, job_title, company_name,
             job_description_text, job_description_url, optimized_resume_content)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&auth.user_id)
    .bind(resume.id)
    .bind(&req.job_title)
    .bind(&req.company_name)
    .bind(&job_description)
    .bind(&req.job_description_url)
    .bind(&optimized)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(application))
}

/// POST /api/v1/cover-letters
///
/// Generates a cover letter for an application. Idempotent per application:
/// if a letter already exists, it is returned without another LLM call.
pub async fn handle_generate_cover_letter(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(req): Json<CoverLetterRequest>,
) -> Result<Json<CoverLetter>, AppError> {
    let decision = state
        .gate
        .can_perform(&auth.user_id, ActionKind::CoverLetter, Utc::now())
        .await;
    if let Decision::Deny(reason) = decision {
        return Err(AppError::UpgradeRequired(deny_message(
            ActionKind::CoverLetter,
            &reason,
        )));
    }

    let application = sqlx::query_as::<_, ApplicationForLetter>(
        r#"
        SELECT a.id, a.job_title, a.company_name, a.job_description_text,
               r.original_content AS resume_content
        FROM job_applications a
        JOIN resumes r ON r.id = a.resume_id
        WHERE a.id = $1 AND a.user_id = $2
        "#,
    )
    .bind(req.job_application_id)
    .bind(&auth.user_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| {
        AppError::NotFound(format!(
            "Job application {} not found",
            req.job_application_id
        ))
    })?;

    let existing = sqlx::query_as::<_, CoverLetter>(
        "SELECT * FROM cover_letters WHERE job_application_id = $1 ORDER BY created_at DESC LIMIT 1",
    )
    .bind(application.id)
    .fetch_optional(&state.db)
    .await?;
    if let Some(letter) = existing {
        return Ok(Json(letter));
    }

    let prompt = prompts::build_cover_letter_prompt(
        &application.resume_content,
        &application.job_title,
        &application.company_name,
        &application.job_description_text,
    );
    let content = state
        .llm
        .call_text(&prompt, prompts::COVER_LETTER_SYSTEM)
        .await
        .map_err(|e| AppError::Llm(e.to_string()))?;

    let letter = sqlx::query_as::<_, CoverLetter>(
        "INSERT INTO cover_letters (id, job_application_id, content) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(application.id)
    .bind(&content)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(letter))
}

#[derive(Debug, sqlx::FromRow)]
struct ApplicationForLetter {
    id: Uuid,
    job_title: String,
    company_name: String,
    job_description_text: String,
    resume_content: String,
}

fn deny_message(action: ActionKind, reason: &DenyReason) -> String {
    match (action, reason) {
        (_, DenyReason::StoreUnavailable) => {
            "Unable to verify your plan right now. Please try again.".to_string()
        }
        (ActionKind::Optimize, _) => {
            "You have reached your free optimization limit. Please upgrade to continue.".to_string()
        }
        (ActionKind::CoverLetter, _) => {
            "You have reached your free limit. Please upgrade to generate cover letters."
                .to_string()
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
