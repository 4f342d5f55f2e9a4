//! Pattern dialects — match patterns, globs and raw regexes
//!
//! Every URL list on a descriptor is compiled into one [`PatternSet`] by
//! [`compile_dialect`]. The three dialects share the translation pipeline and
//! differ only in how `?` is treated, whether the host wildcard is loosened,
//! and whether entries are escaped at all.
//!
//! | Dialect | `*` | `?` | `://*.` | anchored | case |
//! |---------|-----|-----|---------|----------|------|
//! | [`Dialect::MatchPattern`] | `.*` | literal | optional subdomain | yes | insensitive |
//! | [`Dialect::Glob`] | `.*` | any char | literal | yes | insensitive |
//! | [`Dialect::RawRegex`] | verbatim | verbatim | verbatim | no | sensitive |
//!
//! # Never fails
//!
//! Compilation never errors. An entry that does not compile is dropped (and
//! logged), the remaining entries still match. Use [`check_pattern`] to
//! validate entries ahead of time.

use std::fmt;

use regex::Regex;

use crate::{UsmError, MAX_REGEX_PATTERN_LENGTH};

/// Matches every URL.
pub const ALL_URLS: &str = "<all_urls>";
/// Matches any URL whose scheme starts with `http`.
pub const ANY_HTTP: &str = "*://*/*";
/// Matches any `file:///` URL.
pub const ANY_FILE: &str = "file:///*";

/// Characters escaped in match patterns and globs.
const META: &[char] = &[
    '\\', '.', '+', '?', '^', '$', '{', '}', '(', ')', '|', '[', ']',
];

/// How the entries of a URL list are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    /// `scheme://host/path` with `*` wildcards (`matches`, `exclude_matches`).
    MatchPattern,
    /// `*` and `?` wildcards over the whole URL (`include_globs`, `exclude_globs`).
    Glob,
    /// Caller-trusted regular expressions (`includes`, `excludes`).
    ///
    /// Compiled with the `regex` crate, which has no lookaround and no
    /// backreferences. Entries using them (`(?!…)`, `(?<=…)`, `\1`) fail to
    /// compile and are dropped with a warning; an `includes` list left with
    /// no usable entry then rejects every page.
    RawRegex,
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::MatchPattern => "match",
            Self::Glob => "glob",
            Self::RawRegex => "regex",
        })
    }
}

/// Translate one entry into regex source.
///
/// Returns `None` for the match-pattern catch-alls, which are evaluated
/// without a regex.
#[must_use]
pub fn translate(entry: &str, dialect: Dialect) -> Option<String> {
    match dialect {
        Dialect::MatchPattern if matches!(entry, ALL_URLS | ANY_HTTP | ANY_FILE) => None,
        Dialect::MatchPattern | Dialect::Glob => {
            let mut out = String::with_capacity(entry.len() + 8);
            out.push('^');
            for c in entry.chars() {
                match c {
                    '*' => out.push_str(".*"),
                    '?' if dialect == Dialect::Glob => out.push('.'),
                    c if META.contains(&c) => {
                        out.push('\\');
                        out.push(c);
                    }
                    c => out.push(c),
                }
            }
            out.push('$');
            if dialect == Dialect::MatchPattern {
                out = out.replace(r"://.*\.", r"://(.*\.)?");
            }
            Some(out)
        }
        Dialect::RawRegex => Some(strip_slashes(entry).to_owned()),
    }
}

/// `/body/` → `body`; anything else unchanged.
fn strip_slashes(entry: &str) -> &str {
    entry
        .strip_prefix('/')
        .and_then(|e| e.strip_suffix('/'))
        .unwrap_or(entry)
}

fn join(sources: &[String], dialect: Dialect) -> String {
    let body = sources
        .iter()
        .map(|s| format!("(?:{s})"))
        .collect::<Vec<_>>()
        .join("|");
    match dialect {
        Dialect::RawRegex => body,
        Dialect::MatchPattern | Dialect::Glob => format!("(?i){body}"),
    }
}

/// A compiled URL list.
#[derive(Debug, Clone)]
pub struct PatternSet {
    dialect: Dialect,
    entries: Vec<String>,
    all_urls: bool,
    any_http: bool,
    any_file: bool,
    regex: Option<Regex>,
}

impl PatternSet {
    /// A set with no entries; matches nothing.
    #[must_use]
    pub fn empty(dialect: Dialect) -> Self {
        Self {
            dialect,
            entries: Vec::new(),
            all_urls: false,
            any_http: false,
            any_file: false,
            regex: None,
        }
    }

    /// Returns the dialect the entries were compiled in.
    #[must_use]
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// The entries as given, including any that failed to compile.
    #[must_use]
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Returns `true` if no entries were given.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check a single URL.
    #[must_use]
    pub fn matches(&self, url: &str) -> bool {
        if self.all_urls {
            return true;
        }
        if self.any_http && url.get(..4).is_some_and(|s| s.eq_ignore_ascii_case("http")) {
            return true;
        }
        if self.any_file && url.starts_with("file:///") {
            return true;
        }
        self.regex.as_ref().is_some_and(|re| re.is_match(url))
    }

    /// The first URL that matches, if any.
    pub fn first_match<'a, S: AsRef<str>>(&self, urls: &'a [S]) -> Option<&'a str> {
        urls.iter().map(AsRef::as_ref).find(|u| self.matches(u))
    }

    /// Returns `true` if any URL matches.
    pub fn matches_any<S: AsRef<str>>(&self, urls: &[S]) -> bool {
        self.first_match(urls).is_some()
    }
}

/// Compile a URL list in the given dialect.
///
/// The entries are OR-joined into one regex. If the joined regex does not
/// compile, each entry is compiled on its own and the broken ones dropped.
#[must_use]
pub fn compile_dialect<S: AsRef<str>>(entries: &[S], dialect: Dialect) -> PatternSet {
    let mut set = PatternSet::empty(dialect);
    let mut sources = Vec::with_capacity(entries.len());

    for entry in entries.iter().map(AsRef::as_ref) {
        set.entries.push(entry.to_owned());
        if entry.len() > MAX_REGEX_PATTERN_LENGTH {
            tracing::debug!(%dialect, len = entry.len(), "dropping oversized pattern");
            continue;
        }
        match translate(entry, dialect) {
            Some(source) => sources.push(source),
            None => match entry {
                ALL_URLS => set.all_urls = true,
                ANY_HTTP => set.any_http = true,
                _ => set.any_file = true,
            },
        }
    }

    if sources.is_empty() {
        return set;
    }

    set.regex = match Regex::new(&join(&sources, dialect)) {
        Ok(re) => Some(re),
        Err(_) => {
            let valid: Vec<String> = sources
                .into_iter()
                .filter(|s| match Regex::new(&join(std::slice::from_ref(s), dialect)) {
                    Ok(_) => true,
                    Err(e) => {
                        tracing::warn!(%dialect, pattern = %s, error = %e, "dropping invalid pattern");
                        false
                    }
                })
                .collect();
            if valid.is_empty() {
                None
            } else {
                Regex::new(&join(&valid, dialect)).ok()
            }
        }
    };
    set
}

/// Validate one entry without compiling a set.
///
/// # Errors
///
/// - [`UsmError::PatternTooLong`] if the entry exceeds [`MAX_REGEX_PATTERN_LENGTH`].
/// - [`UsmError::InvalidPattern`] if a match pattern lacks `://`, or the
///   translated regex does not compile.
pub fn check_pattern(entry: &str, dialect: Dialect) -> Result<(), UsmError> {
    if entry.len() > MAX_REGEX_PATTERN_LENGTH {
        return Err(UsmError::PatternTooLong {
            len: entry.len(),
            max: MAX_REGEX_PATTERN_LENGTH,
        });
    }
    if dialect == Dialect::MatchPattern && entry != ALL_URLS && !entry.contains("://") {
        return Err(UsmError::InvalidPattern {
            pattern: entry.to_owned(),
            reason: "expected <scheme>://<host>/<path>".into(),
        });
    }
    let Some(source) = translate(entry, dialect) else {
        return Ok(());
    };
    Regex::new(&join(&[source], dialect))
        .map(|_| ())
        .map_err(|e| UsmError::InvalidPattern {
            pattern: entry.to_owned(),
            reason: e.to_string(),
        })
}
