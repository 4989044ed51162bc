//! Markup escaping for user-supplied text.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::borrow::Cow;

static MARKUP_CHARS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[&<>"']"#).expect("valid markup char regex"));

/// Escapes `& < > " '` so `value` renders as literal text in element bodies
/// and quoted attributes.
///
/// Borrows the input unchanged when nothing needs escaping.
pub fn escape_html(value: &str) -> Cow<'_, str> {
    MARKUP_CHARS_RE.replace_all(value, |caps: &Captures<'_>| match &caps[0] {
        "&" => "&amp;",
        "<" => "&lt;",
        ">" => "&gt;",
        "\"" => "&quot;",
        _ => "&#39;",
    })
}
