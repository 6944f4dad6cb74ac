use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use tracing::info;

use crate::errors::AppError;
use crate::models::resume::FileType;
use crate::state::AppState;

/// Uploads the original resume file to object storage and returns its URL.
///
/// The key is namespaced per user so listing a bucket prefix yields one
/// user's uploads only.
pub async fn store_original_file(
    state: &AppState,
    user_id: &str,
    resume_id: uuid::Uuid,
    file_name: &str,
    file_type: FileType,
    data: Bytes,
) -> Result<String, AppError> {
    let content_type = match file_type {
        FileType::Pdf => "application/pdf",
        FileType::Markdown => "text/markdown",
    };

    let s3_key = format!("resumes/{user_id}/{resume_id}/{file_name}");
    let s3_bucket = &state.config.s3_bucket;

    state
        .s3
        .put_object()
        .bucket(s3_bucket)
        .key(&s3_key)
        .body(ByteStream::from(data))
        .content_type(content_type)
        .send()
        .await
        .map_err(|e| AppError::S3(format!("upload failed: {e}")))?;

    info!("Uploaded resume {resume_id} to s3://{s3_bucket}/{s3_key}");

    Ok(format!(
        "{}/{}/{}",
        state.config.s3_endpoint, s3_bucket, s3_key
    ))
}
