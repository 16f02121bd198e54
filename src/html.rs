//! Storage-format HTML to plain text extraction.

use std::sync::LazyLock;

use regex::Regex;
use scraper::Html;

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

/// Flattens a wiki page body into plain text suitable for chunking.
///
/// Tags are dropped, text nodes are joined with single spaces, and runs of
/// whitespace are collapsed so sentence boundaries stay detectable.
pub fn extract_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut out = String::new();
    for piece in document.root_element().text() {
        let trimmed = piece.trim();
        if trimmed.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(trimmed);
    }
    WHITESPACE.replace_all(&out, " ").into_owned()
}
