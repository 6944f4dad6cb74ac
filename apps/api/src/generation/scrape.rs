use thiserror::Error;
use tracing::warn;

/// Scraped text is capped so a bloated listing page cannot blow up the
/// prompt.
const MAX_SCRAPED_CHARS: usize = 10_000;

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// Fetches a job posting URL and reduces the HTML to plain text.
///
/// Script and style blocks are dropped wholesale, remaining tags become
/// whitespace, runs of whitespace collapse to one space, and the result is
/// truncated to [`MAX_SCRAPED_CHARS`].
pub async fn fetch_job_description(client: &reqwest::Client, url: &str) -> Result<String, ScrapeError> {
    let html = client
        .get(url)
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(|e| {
            warn!("Job description fetch failed for {url}: {e}");
            e
        })?
        .text()
        .await?;

    Ok(html_to_text(&html))
}

fn html_to_text(html: &str) -> String {
    let without_blocks = strip_element(&strip_element(html, "script"), "style");

    let mut text = String::with_capacity(without_blocks.len());
    let mut in_tag = false;
    for ch in without_blocks.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => {
                in_tag = false;
                text.push(' ');
            }
            _ if !in_tag => text.push(ch),
            _ => {}
        }
    }

    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    truncate_chars(&collapsed, MAX_SCRAPED_CHARS)
}

/// Removes `<tag ...>...</tag>` blocks including their content,
/// case-insensitively. Unclosed blocks are dropped to the end of input.
fn strip_element(html: &str, tag: &str) -> String {
    let open = format!("<{tag}");
    let close = format!("</{tag}>");
    let lower = html.to_lowercase();

    let mut out = String::with_capacity(html.len());
    let mut pos = 0;
    while let Some(start) = lower[pos..].find(&open) {
        let start = pos + start;
        out.push_str(&html[pos..start]);
        match lower[start..].find(&close) {
            Some(end) => pos = start + end + close.len(),
            None => return out,
        }
    }
    out.push_str(&html[pos..]);
    out
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_script_and_style_blocks() {
        let html = r#"<html><head><style>body { color: red; }</style>
            <script type="text/javascript">alert("hi");</script></head>
            <body><h1>Senior Rust Engineer</h1><p>Build APIs.</p></body></html>"#;
        let text = html_to_text(html);
        assert_eq!(text, "Senior Rust Engineer Build APIs.");
    }

    #[test]
    fn test_case_insensitive_block_stripping() {
        let html = "<SCRIPT>var x = 1;</SCRIPT>Hiring now<STYLE>.a{}</STYLE>";
        assert_eq!(html_to_text(html), "Hiring now");
    }

    #[test]
    fn test_unclosed_script_drops_trailing_content() {
        let html = "Apply today<script>var x = '";
        assert_eq!(html_to_text(html), "Apply today");
    }

    #[test]
    fn test_collapses_whitespace_between_tags() {
        let html = "<div>\n  <span>Remote</span>\n  <span>Full-time</span>\n</div>";
        assert_eq!(html_to_text(html), "Remote Full-time");
    }

    #[test]
    fn test_truncates_long_pages() {
        let html = format!("<p>{}</p>", "a".repeat(20_000));
        assert_eq!(html_to_text(&html).len(), MAX_SCRAPED_CHARS);
    }
}
