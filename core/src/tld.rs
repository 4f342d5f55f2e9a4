//! `PatternNormalizer` — `.tld` macro expansion for match patterns
//!
//! A pattern whose host ends in the macro `.tld` (for example
//! `*://*.amazon.tld/*`) fans out to one pattern per top-level domain of a
//! site-specific list. Every other pattern passes through unchanged.
//!
//! The list contents are a compatibility contract: installed scripts rely on
//! exactly these expansions, so changes show up in the conformance fixtures.

const AMAZON: &[&str] = &[
    ".com", ".ae", ".ca", ".cn", ".co.jp", ".co.uk", ".com.au", ".com.br", ".com.mx", ".com.tr",
    ".de", ".es", ".fr", ".in", ".it", ".nl",
];

const EBAY: &[&str] = &[
    ".com", ".at", ".be", ".ca", ".ch", ".co.uk", ".com.au", ".com.hk", ".com.my", ".com.sg",
    ".de", ".es", ".fr", ".ie", ".it", ".nl", ".ph", ".pl",
];

const GOOGLE: &[&str] = &[
    ".com", ".ad", ".ae", ".at", ".be", ".bg", ".ca", ".ch", ".cl", ".cn", ".co.id", ".co.in",
    ".co.jp", ".co.kr", ".co.nz", ".co.uk", ".co.za", ".com.ar", ".com.au", ".com.br", ".com.hk",
    ".com.mx", ".com.sg", ".com.tr", ".com.tw", ".cz", ".de", ".dk", ".es", ".fi", ".fr", ".gr",
    ".hu", ".ie", ".it", ".nl", ".no", ".pl", ".pt", ".ro", ".ru", ".se", ".sk",
];

const COMMON: &[&str] = &[
    ".com", ".au", ".br", ".ca", ".ch", ".cn", ".co.uk", ".de", ".es", ".fr", ".in", ".it", ".jp",
    ".mx", ".nl", ".no", ".pl", ".ru", ".se", ".uk", ".us",
];

const MACRO: &str = ".tld";

/// Result of normalizing one pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Normalized {
    /// The pattern, unchanged.
    One(String),
    /// The `.tld` fan-out, one pattern per list entry.
    Many(Vec<String>),
}

impl Normalized {
    /// Flatten into a list of patterns.
    #[must_use]
    pub fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(p) => vec![p],
            Self::Many(ps) => ps,
        }
    }
}

/// The TLD list used for a host that ends in `.tld`.
#[must_use]
pub fn tld_list(host: &str) -> &'static [&'static str] {
    let host = format!(".{}", host.to_ascii_lowercase());
    if host.contains(".amazon.") {
        AMAZON
    } else if host.contains(".ebay.") {
        EBAY
    } else if host.contains(".google.") {
        GOOGLE
    } else {
        COMMON
    }
}

/// Expand the `.tld` macro in a match pattern.
///
/// The macro is only recognized at the end of the host, i.e. immediately
/// before the `/` that starts the path, in any letter case.
///
/// ```
/// use usm::{normalize, Normalized};
///
/// assert_eq!(
///     normalize("*://example.com/*"),
///     Normalized::One("*://example.com/*".into())
/// );
///
/// let expanded = normalize("https://www.google.tld/search*").into_vec();
/// assert!(expanded.contains(&"https://www.google.co.uk/search*".to_string()));
/// ```
#[must_use]
pub fn normalize(pattern: &str) -> Normalized {
    let Some(host_start) = pattern.find("://").map(|i| i + 3) else {
        return Normalized::One(pattern.to_owned());
    };
    let Some(host_end) = pattern[host_start..].find('/').map(|i| host_start + i) else {
        return Normalized::One(pattern.to_owned());
    };
    let host = &pattern[host_start..host_end];
    let Some(stem_len) = host.len().checked_sub(MACRO.len()) else {
        return Normalized::One(pattern.to_owned());
    };
    if !host.is_char_boundary(stem_len) || !host[stem_len..].eq_ignore_ascii_case(MACRO) {
        return Normalized::One(pattern.to_owned());
    }

    let head = &pattern[..host_start + stem_len];
    let tail = &pattern[host_end..];
    let expanded = tld_list(host)
        .iter()
        .map(|tld| format!("{head}{tld}{tail}"))
        .collect();
    Normalized::Many(expanded)
}

/// Normalize every pattern and flatten the results, preserving order.
#[must_use]
pub fn normalize_all<S: AsRef<str>>(patterns: &[S]) -> Vec<String> {
    patterns
        .iter()
        .flat_map(|p| normalize(p.as_ref()).into_vec())
        .collect()
}
