//! Markup stripping: HTML page body to plain text the extractors can scan.
//!
//! Conversion goes through Markdown (`htmd`), then cleanup passes drop the
//! Markdown syntax so labels like `**Location:**` read as `Location:`.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use tracing::{debug, instrument};

use conftrack_shared::{ConfTrackError, Result};

/// Convert a fetched body to plain text. Bodies without markup pass through.
#[instrument(skip_all, fields(len = body.len()))]
pub fn page_text(body: &str) -> Result<String> {
    if !looks_like_html(body) {
        return Ok(run_cleanup(body));
    }

    let converter = htmd::HtmlToMarkdown::builder()
        .skip_tags(vec![
            "script", "style", "nav", "iframe", "noscript", "svg", "header", "footer",
        ])
        .build();

    let markdown = converter
        .convert(body)
        .map_err(|e| ConfTrackError::Conversion(format!("htmd conversion failed: {e}")))?;

    debug!(markdown_len = markdown.len(), "htmd conversion complete");
    Ok(run_cleanup(&markdown))
}

/// `<title>` of an HTML document, if any.
pub fn page_title(body: &str) -> Option<String> {
    static TITLE_SEL: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("title").expect("valid selector"));

    let doc = Html::parse_document(body);
    let title = doc
        .select(&TITLE_SEL)
        .next()?
        .text()
        .collect::<String>()
        .trim()
        .to_string();
    (!title.is_empty()).then_some(title)
}

fn looks_like_html(body: &str) -> bool {
    static TAG_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?i)<(?:html|body|div|p|br|span|a|li|h\d)\b").expect("valid regex"));
    TAG_RE.is_match(body)
}

// ---------------------------------------------------------------------------
// Cleanup passes
// ---------------------------------------------------------------------------

fn run_cleanup(text: &str) -> String {
    let mut result = strip_images(text);
    result = unwrap_links(&result);
    result = strip_emphasis(&result);
    result = strip_line_markers(&result);
    collapse_blank_lines(&result)
}

/// Drop `![alt](src)` entirely.
fn strip_images(md: &str) -> String {
    static IMG_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"!\[[^\]]*\]\([^)]*\)").expect("valid regex"));
    IMG_RE.replace_all(md, "").to_string()
}

/// `[text](url)` becomes `text`.
fn unwrap_links(md: &str) -> String {
    static LINK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\[([^\]]*)\]\([^)]*\)").expect("valid regex"));
    LINK_RE.replace_all(md, "$1").to_string()
}

fn strip_emphasis(md: &str) -> String {
    static EMPH_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\*{1,3}|(?:^|\s)_{1,3}|_{1,3}(?:\s|$)|`").expect("valid regex"));
    EMPH_RE
        .replace_all(md, |caps: &regex::Captures| {
            // keep the whitespace the underscore alternatives consumed
            caps[0].chars().filter(|c| c.is_whitespace()).collect::<String>()
        })
        .to_string()
}

/// Heading hashes, quote markers, bullets and table pipes at line starts.
fn strip_line_markers(md: &str) -> String {
    static MARKER_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^\s*(?:#{1,6}|>|[-+]|\d+\.)\s+").expect("valid regex"));

    md.lines()
        .map(|line| {
            let line = MARKER_RE.replace(line, "");
            let line = line.trim_matches('|').replace(" | ", "  ");
            line.trim().to_string()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn collapse_blank_lines(text: &str) -> String {
    static MULTI_BLANK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));
    MULTI_BLANK_RE.replace_all(text.trim(), "\n\n").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_becomes_plain_text() {
        let html = r#"<html><head><title>AAA Midyear</title><script>var x = 1;</script></head>
            <body><nav><a href="/">Home</a></nav>
            <h1>AAA ATA Midyear Meeting 2026</h1>
            <p><strong>Location:</strong> Orlando, FL</p>
            <p>See <a href="/cfp">the call</a> for details.</p>
            </body></html>"#;

        let text = page_text(html).unwrap();
        assert!(text.contains("AAA ATA Midyear Meeting 2026"));
        assert!(text.contains("Location: Orlando, FL"));
        assert!(text.contains("See the call for details."));
        assert!(!text.contains("var x"));
        assert!(!text.contains('#'));
        assert!(!text.contains("Home"));
    }

    #[test]
    fn plain_text_passes_through() {
        let body = "Submission Deadline: February 1, 2026\n\n\n\nheld February 19-21, 2026";
        let text = page_text(body).unwrap();
        assert_eq!(
            text,
            "Submission Deadline: February 1, 2026\n\nheld February 19-21, 2026"
        );
    }

    #[test]
    fn underscores_inside_words_survive() {
        assert_eq!(strip_emphasis("file_name and _em_"), "file_name and em");
    }

    #[test]
    fn title_is_read() {
        let html = "<html><head><title> Finance Forum </title></head><body></body></html>";
        assert_eq!(page_title(html).as_deref(), Some("Finance Forum"));
        assert_eq!(page_title("<p>none</p>"), None);
    }
}
