use std::borrow::Cow;

use regex::Regex;

use super::DEFAULT_TOP_LEVEL_TAG;

// ── Strip tagged spans ───────────────────────────────────────────────────────

/// Build the span pattern for `tag`: shortest match, `.` matching newlines.
fn span_pattern(tag: &str) -> Regex {
    let tag = regex::escape(tag);
    Regex::new(&format!("(?s)<{tag}>.*?</{tag}>")).expect("escaped tag name is a valid pattern")
}

/// Remove every `<tag>…</tag>` span from `text`, leaving the rest untouched.
///
/// Spans are matched left to right, each ending at the first closing tag
/// after its opening tag. Returns the input borrowed when nothing matched.
pub fn strip_tags<'a>(text: &'a str, tag: &str) -> Cow<'a, str> {
    span_pattern(tag).replace_all(text, "")
}

/// Remove the default `<response>` envelope.
pub fn strip_response(text: &str) -> Cow<'_, str> {
    strip_tags(text, DEFAULT_TOP_LEVEL_TAG)
}
