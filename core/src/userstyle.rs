//! `@-moz-document` section parser for user styles
//!
//! Each section starts with `@-moz-document`, followed by a comma-separated
//! list of selector functions and a brace-delimited CSS body:
//!
//! ```text
//! @-moz-document domain("example.com"), url-prefix("https://docs.rs/") {
//!     body { color: red; }
//! }
//! ```
//!
//! Functions translate into match patterns. Arbitrary `regexp()` bodies have
//! no match-pattern equivalent and are ignored, except the catch-all bodies
//! `.*` and `https:.*`.

use std::sync::LazyLock;

use regex::Regex;

use crate::descriptor::{dedupe, StyleSegment};

const SECTION: &str = "@-moz-document";
const CATCH_ALL: &str = "*://*/*";

static FUNCTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(url-prefix|domain|url|regexp)\(\s*(?:"([^"]*)"|'([^']*)'|([^)'"]*?))\s*\)"#,
    )
    .expect("section function regex is valid")
});

/// Translate one selector function into a match pattern.
fn to_pattern(function: &str, value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    match function {
        "domain" => Some(format!("*://*.{value}/*")),
        "url" => Some(value.to_owned()),
        "url-prefix" => Some(url_prefix(value)),
        "regexp" => matches!(value, ".*" | "https:.*").then(|| CATCH_ALL.to_owned()),
        _ => None,
    }
}

/// `url-prefix()` becomes a wildcard pattern.
///
/// Without a path, `/*` is appended; with a path, only `*`.
fn url_prefix(value: &str) -> String {
    let has_path = value
        .find("://")
        .map(|i| &value[i + 3..])
        .is_some_and(|rest| rest.contains('/'));
    if !has_path {
        format!("{value}/*")
    } else if value.ends_with('*') {
        value.to_owned()
    } else {
        format!("{value}*")
    }
}

/// Return the body between the brace at `open` and its matching close.
fn braced_body(text: &str, open: usize) -> &str {
    let mut depth = 0usize;
    for (i, c) in text[open..].char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return &text[open + 1..open + i];
                }
            }
            _ => {}
        }
    }
    &text[open + 1..]
}

/// Split a user style into its `@-moz-document` sections.
///
/// Sections whose function list yields no match pattern are dropped.
/// Returns an empty list if the text has no sections.
#[must_use]
pub fn parse_sections(text: &str) -> Vec<StyleSegment> {
    text.split(SECTION)
        .skip(1)
        .filter_map(|section| {
            let open = section.find('{')?;
            let mut matches: Vec<String> = FUNCTION
                .captures_iter(&section[..open])
                .filter_map(|cap| {
                    let function = cap.get(1)?.as_str();
                    let value = cap.get(2).or(cap.get(3)).or(cap.get(4))?.as_str();
                    to_pattern(function, value)
                })
                .collect();
            dedupe(&mut matches);
            if matches.is_empty() {
                tracing::debug!(section = %section[..open].trim(), "dropping style section without usable matches");
                return None;
            }
            Some(StyleSegment {
                matches,
                css: braced_body(section, open).trim().to_owned(),
            })
        })
        .collect()
}
