//! HTML to Markdown conversion for post bodies.

use std::sync::LazyLock;

use feedstr_core::MarkupConverter;
use regex::Regex;

static TAG_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("tag regex should compile"));

/// Converts HTML bodies to Markdown with `htmd`.
///
/// If conversion fails the body is reduced to its text: tags stripped,
/// entities decoded.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlToMarkdown;

impl MarkupConverter for HtmlToMarkdown {
    fn convert(&self, html: Option<&str>) -> String {
        let Some(html) = html else {
            return String::new();
        };

        match htmd::convert(html) {
            Ok(markdown) => markdown.trim().to_string(),
            Err(e) => {
                tracing::warn!(error = %e, "markdown conversion failed, stripping tags");
                strip_tags(html)
            }
        }
    }
}

/// Remove markup and decode entities, leaving plain text.
pub fn strip_tags(html: &str) -> String {
    let text = TAG_REGEX.replace_all(html, "");
    html_escape::decode_html_entities(&text).trim().to_string()
}
