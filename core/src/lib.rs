//! usm - user-script and user-style manager core
//!
//! Turns the metadata block of a user script or user style into a structured
//! [`ScriptDescriptor`], and decides whether a descriptor applies to a page.
//!
//! # Architecture
//!
//! - [`parse`] — metadata fence → [`ScriptDescriptor`], driven by the static
//!   [`DIRECTIVES`] table
//! - [`normalize`] — `.tld` macro fan-out for match patterns
//! - [`compile_dialect`] — URL lists → [`PatternSet`] (match pattern, glob, raw regex)
//! - [`Predicate`] — boolean conditions over a page's frame URLs
//! - [`Evaluator`] — ordered decision chain with first-match-wins semantics
//!
//! # Key Design Insights
//!
//! 1. **Parsing never fails loudly**: unknown directives and empty values are
//!    skipped; only a missing fence makes [`parse`] return `None`.
//!
//! 2. **Matching never fails loudly**: a pattern that does not compile simply
//!    matches nothing. [`check_pattern`] exists for callers that want to
//!    validate up front.
//!
//! 3. **Pure given its inputs**: shared preferences such as global excludes
//!    are passed in explicitly, never read from ambient state.
//!
//! # Example
//!
//! ```
//! use usm::prelude::*;
//!
//! let source = "// ==UserScript==\n\
//!               // @name     Shop helper\n\
//!               // @match    *://*.example.com/*\n\
//!               // @exclude-match *://shop.example.com/checkout*\n\
//!               // ==/UserScript==\n\
//!               document.title += ' *';";
//!
//! let descriptor = parse(source, "", "").unwrap();
//! let evaluator = Evaluator::compile(&descriptor, &["*://*.bank.com/*"]);
//!
//! assert!(evaluator.evaluate(&["https://www.example.com/"]));
//! assert!(!evaluator.evaluate(&["https://shop.example.com/checkout/1"]));
//! ```
//!
//! # Extensions
//!
//! - [`usm-sync`](https://docs.rs/usm-sync) — registration synchronizer, store and remote update
//! - [`usm-test`](https://docs.rs/usm-test) — conformance fixtures (internal)

// ═══════════════════════════════════════════════════════════════════════════════
// Modules
// ═══════════════════════════════════════════════════════════════════════════════

mod descriptor;
mod dialect;
mod directive;
mod evaluator;
mod fence;
mod predicate;
mod require;
mod tld;
mod trace;
mod userstyle;

// ═══════════════════════════════════════════════════════════════════════════════
// Public API
// ═══════════════════════════════════════════════════════════════════════════════

// Descriptor model
pub use descriptor::{I18n, Kind, RunAt, ScriptDescriptor, StyleSegment};

// Parsing
pub use directive::{lookup, parse, Directive, Field, Transform, CATCH_ALL_MATCHES, DIRECTIVES};
pub use fence::{defang, find_fence, Fence, FenceKind};
pub use require::{normalize_scheme, resolve as resolve_require, Require, LOCAL_LIBRARY_PREFIX};
pub use tld::{normalize, normalize_all, tld_list, Normalized};
pub use userstyle::parse_sections;

// Matching
pub use dialect::{
    check_pattern, compile_dialect, translate, Dialect, PatternSet, ALL_URLS, ANY_FILE, ANY_HTTP,
};
pub use evaluator::{applies, Evaluator, Rule, Step};
pub use predicate::{Predicate, ABOUT_BLANK};

// Trace types
pub use trace::{EvalStep, EvalTrace, PredicateTrace};

// ═══════════════════════════════════════════════════════════════════════════════
// Prelude
// ═══════════════════════════════════════════════════════════════════════════════

/// Prelude module for convenient imports.
///
/// ```
/// use usm::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        // Operations
        applies,
        check_pattern,
        compile_dialect,
        normalize,
        parse,
        // Types
        Dialect,
        EvalTrace,
        Evaluator,
        Kind,
        Normalized,
        PatternSet,
        Predicate,
        RunAt,
        ScriptDescriptor,
        Step,
        StyleSegment,
        // Errors
        UsmError,
    };
}

// ═══════════════════════════════════════════════════════════════════════════════
// Constants
// ═══════════════════════════════════════════════════════════════════════════════

/// Maximum length for a single URL-list entry.
///
/// Longer entries are dropped at compile time and rejected by
/// [`check_pattern`]. Regex compilation cost grows with pattern length, even
/// with the linear-time `regex` crate.
pub const MAX_REGEX_PATTERN_LENGTH: usize = 4096;

// ═══════════════════════════════════════════════════════════════════════════════
// Errors
// ═══════════════════════════════════════════════════════════════════════════════

/// Errors from explicit validation.
///
/// [`parse`] and the matcher never return these; they degrade silently.
/// Validation entry points ([`check_pattern`]) surface them for tooling.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UsmError {
    /// A URL-list entry is malformed or its regex does not compile.
    #[error("invalid pattern \"{pattern}\": {reason}")]
    InvalidPattern {
        /// The entry as written.
        pattern: String,
        /// The underlying error message.
        reason: String,
    },
    /// An entry exceeds [`MAX_REGEX_PATTERN_LENGTH`].
    #[error("pattern length is {len}, but maximum allowed is {max}")]
    PatternTooLong {
        /// Actual length of the entry.
        len: usize,
        /// Maximum allowed length.
        max: usize,
    },
    /// The text has no `==UserScript==` / `==UserCSS==` / `==UserStyle==` fence.
    #[error("no metadata block found (expected ==UserScript==, ==UserCSS== or ==UserStyle==)")]
    Unfenced,
}

/// [`parse`], lifting a missing fence into [`UsmError::Unfenced`].
///
/// # Errors
///
/// Returns [`UsmError::Unfenced`] when the text has no metadata fence.
pub fn try_parse(
    text: &str,
    user_matches: &str,
    user_exclude_matches: &str,
) -> Result<ScriptDescriptor, UsmError> {
    parse(text, user_matches, user_exclude_matches).ok_or(UsmError::Unfenced)
}

/// Validate every URL-list entry of a descriptor.
///
/// Returns one error per offending entry, in field order.
#[must_use]
pub fn check_descriptor(descriptor: &ScriptDescriptor) -> Vec<UsmError> {
    let d = descriptor;
    let lists: [(&[String], Dialect); 6] = [
        (&d.matches, Dialect::MatchPattern),
        (&d.exclude_matches, Dialect::MatchPattern),
        (&d.include_globs, Dialect::Glob),
        (&d.exclude_globs, Dialect::Glob),
        (&d.includes, Dialect::RawRegex),
        (&d.excludes, Dialect::RawRegex),
    ];
    let segment_matches = d.segments().iter().flat_map(|s| s.matches.iter());
    let user = d.user_match_list().chain(d.user_exclude_list());

    lists
        .iter()
        .flat_map(|(entries, dialect)| entries.iter().map(move |e| (e.as_str(), *dialect)))
        .chain(segment_matches.map(|e| (e.as_str(), Dialect::MatchPattern)))
        .chain(user.map(|e| (e, Dialect::MatchPattern)))
        .filter_map(|(entry, dialect)| check_pattern(entry, dialect).err())
        .collect()
}
