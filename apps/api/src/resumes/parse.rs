use bytes::Bytes;
use tracing::warn;

use crate::models::resume::FileType;

/// Stored in place of extracted text when a PDF cannot be read.
pub const PDF_EXTRACTION_PLACEHOLDER: &str =
    "[Could not extract text from this PDF. Please paste your resume content manually.]";

/// Extracts plain text from an uploaded resume file.
///
/// Markdown uploads are taken as-is (lossy UTF-8). PDF extraction runs on a
/// blocking thread since `pdf-extract` is CPU-bound; any failure there,
/// including a panic inside the extraction library, degrades to the
/// placeholder instead of failing the upload.
pub async fn extract_resume_text(file_type: FileType, data: Bytes) -> String {
    match file_type {
        FileType::Markdown => String::from_utf8_lossy(&data).into_owned(),
        FileType::Pdf => {
            let result =
                tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&data))
                    .await;

            match result {
                Ok(Ok(text)) if !text.trim().is_empty() => text,
                Ok(Ok(_)) => {
                    warn!("PDF contained no extractable text");
                    PDF_EXTRACTION_PLACEHOLDER.to_string()
                }
                Ok(Err(e)) => {
                    warn!("PDF text extraction failed: {e}");
                    PDF_EXTRACTION_PLACEHOLDER.to_string()
                }
                Err(e) => {
                    warn!("PDF extraction task panicked: {e}");
                    PDF_EXTRACTION_PLACEHOLDER.to_string()
                }
            }
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_markdown_passes_through_unchanged() {
        let text = "# Jane Doe\n\nSenior engineer with 8 years of experience.";
        let extracted =
            extract_resume_text(FileType::Markdown, Bytes::from_static(text.as_bytes())).await;
        assert_eq!(extracted, text);
    }

    #[tokio::test]
    async fn test_invalid_utf8_markdown_is_lossy_not_fatal() {
        let bytes = Bytes::from_static(&[0x23, 0x20, 0xff, 0xfe, 0x41]);
        let extracted = extract_resume_text(FileType::Markdown, bytes).await;
        assert!(extracted.starts_with("# "));
        assert!(extracted.ends_with('A'));
    }

    #[tokio::test]
    async fn test_garbage_pdf_falls_back_to_placeholder() {
        let bytes = Bytes::from_static(b"this is not a pdf at all");
        let extracted = extract_resume_text(FileType::Pdf, bytes).await;
        assert_eq!(extracted, PDF_EXTRACTION_PLACEHOLDER);
    }
}
