//! Metadata fence detection
//!
//! A source carries its directives between an opener `==Kind==` and a
//! matching closer `==/Kind==`, where Kind is `UserScript`, `UserCSS` or
//! `UserStyle`, compared case-insensitively.

use std::sync::LazyLock;

use regex::Regex;

static OPENER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)==(userscript|usercss|userstyle)==").expect("fence opener regex is valid")
});

/// The keyword of a metadata fence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceKind {
    UserScript,
    UserCss,
    UserStyle,
}

impl FenceKind {
    fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword.to_ascii_lowercase().as_str() {
            "userscript" => Some(Self::UserScript),
            "usercss" => Some(Self::UserCss),
            "userstyle" => Some(Self::UserStyle),
            _ => None,
        }
    }

    /// Returns `true` for `==UserScript==`.
    #[must_use]
    pub fn is_script(self) -> bool {
        self == Self::UserScript
    }
}

/// Location of a metadata block inside a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fence {
    pub kind: FenceKind,
    /// Byte offset of the opener's first `=`.
    pub start: usize,
    /// Byte offset just past the closer's last `=`.
    pub end: usize,
    /// Byte range of the text between opener and closer.
    pub body: (usize, usize),
}

impl Fence {
    /// The directive text between opener and closer.
    #[must_use]
    pub fn body<'a>(&self, text: &'a str) -> &'a str {
        &text[self.body.0..self.body.1]
    }
}

/// Find the first opener that has a matching closer.
#[must_use]
pub fn find_fence(text: &str) -> Option<Fence> {
    for opener in OPENER.captures_iter(text) {
        let (Some(all), Some(keyword)) = (opener.get(0), opener.get(1)) else {
            continue;
        };
        let Some(kind) = FenceKind::from_keyword(keyword.as_str()) else {
            continue;
        };
        let closer = format!("==/{}==", keyword.as_str().to_ascii_lowercase());
        // ASCII lowering keeps byte offsets stable.
        let rest = text[all.end()..].to_ascii_lowercase();
        if let Some(offset) = rest.find(&closer) {
            let body_end = all.end() + offset;
            return Some(Fence {
                kind,
                start: all.start(),
                end: body_end + closer.len(),
                body: (all.end(), body_end),
            });
        }
    }
    None
}

/// Rewrite `*/` inside the metadata fence to `* /`.
///
/// The execution environment wraps sources in a block comment; a stray
/// comment terminator inside the header would cut that wrapper short.
/// Text outside the fence is left untouched.
#[must_use]
pub fn defang(text: &str) -> String {
    let Some(fence) = find_fence(text) else {
        return text.to_owned();
    };
    let mut out = String::with_capacity(text.len() + 8);
    out.push_str(&text[..fence.start]);
    out.push_str(&text[fence.start..fence.end].replace("*/", "* /"));
    out.push_str(&text[fence.end..]);
    out
}
