//! HTML to Markdown conversion for notification bodies.

use crate::error::{Error, Result};
use htmd::HtmlToMarkdown;

/// Elements whose content never belongs in a notification.
const SKIPPED_TAGS: [&str; 3] = ["head", "style", "script"];

/// Converts an HTML document to Markdown.
///
/// `<head>`, `<style>` and `<script>` elements are dropped with their
/// content.
///
/// # Errors
///
/// Returns [`Error::HtmlConversion`] if the converter fails.
pub fn html_to_markdown(html: &str) -> Result<String> {
    let converter = HtmlToMarkdown::builder()
        .skip_tags(SKIPPED_TAGS.to_vec())
        .build();
    converter
        .convert(html)
        .map_err(|e| Error::HtmlConversion(e.to_string()))
}

/// Removes every `<style>…</style>` block, tags included (case-insensitive).
///
/// An unclosed `<style>` drops the rest of the input.
#[must_use]
pub fn strip_style_blocks(html: &str) -> String {
    // ASCII lowercasing keeps byte offsets aligned with `html`.
    let lower = html.to_ascii_lowercase();
    let mut out = String::with_capacity(html.len());
    let mut pos = 0;

    while let Some(offset) = lower[pos..].find("<style") {
        let start = pos + offset;
        out.push_str(&html[pos..start]);
        match lower[start..].find("</style") {
            Some(close) => {
                let close = start + close;
                pos = lower[close..].find('>').map_or(html.len(), |gt| close + gt + 1);
            }
            None => {
                pos = html.len();
            }
        }
    }

    out.push_str(&html[pos..]);
    out
}
