// Prompt constants and prompt-building utilities for resume optimization
// and cover letter generation. All text returned by the model is stored
// verbatim; nothing here asks for structured output.

/// System prompt for resume optimization calls.
pub const OPTIMIZE_SYSTEM: &str = "You are an expert resume writer and career coach. \
    You rewrite resumes to target a specific job posting. \
    You never invent experience, employers, titles, dates, or credentials: \
    every claim in your output must already be present in the source resume. \
    Respond with the optimized resume in Markdown and nothing else.";

/// System prompt for cover letter generation calls.
pub const COVER_LETTER_SYSTEM: &str = "You are an expert cover letter writer. \
    You write concise, specific cover letters grounded in the candidate's \
    actual resume. You never invent experience or credentials. \
    Respond with the cover letter text and nothing else.";

/// Builds the user prompt for a resume optimization run.
pub fn build_optimize_prompt(
    resume_content: &str,
    job_title: &str,
    company_name: &str,
    job_description: &str,
) -> String {
    format!(
        "Rewrite the resume below so it targets the role of {job_title} at {company_name}.\n\
         \n\
         Guidelines:\n\
         - Reorder and emphasize the experience most relevant to the job description.\n\
         - Work the job description's key terms in naturally where the resume supports them.\n\
         - Quantify achievements where the source resume provides numbers.\n\
         - Keep every statement truthful to the source resume. Do not add new experience.\n\
         - Keep the candidate's name and contact details exactly as given.\n\
         \n\
         JOB DESCRIPTION:\n\
         {job_description}\n\
         \n\
         RESUME:\n\
         {resume_content}"
    )
}

/// Builds the user prompt for a cover letter.
pub fn build_cover_letter_prompt(
    resume_content: &str,
    job_title: &str,
    company_name: &str,
    job_description: &str,
) -> String {
    format!(
        "Write a cover letter for the role of {job_title} at {company_name}.\n\
         \n\
         Guidelines:\n\
         - Three to four paragraphs, professional but personable.\n\
         - Open with why the candidate fits this specific role, not a generic greeting.\n\
         - Draw on concrete items from the resume that match the job description.\n\
         - Close with a direct, confident call to action.\n\
         \n\
         JOB DESCRIPTION:\n\
         {job_description}\n\
         \n\
         RESUME:\n\
         {resume_content}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optimize_prompt_embeds_all_inputs() {
        let prompt = build_optimize_prompt(
            "## Jane Doe\nRust engineer",
            "Staff Engineer",
            "Acme",
            "We need Rust expertise",
        );
        assert!(prompt.contains("Staff Engineer"));
        assert!(prompt.contains("Acme"));
        assert!(prompt.contains("We need Rust expertise"));
        assert!(prompt.contains("Jane Doe"));
    }

    #[test]
    fn test_cover_letter_prompt_embeds_all_inputs() {
        let prompt = build_cover_letter_prompt(
            "## Jane Doe\nRust engineer",
            "Staff Engineer",
            "Acme",
            "We need Rust expertise",
        );
        assert!(prompt.contains("Staff Engineer"));
        assert!(prompt.contains("Acme"));
        assert!(prompt.contains("Jane Doe"));
    }
}
