//! `DirectiveParser` — metadata fence → [`ScriptDescriptor`]
//!
//! Parsing is table-driven: every recognized `@key` spelling maps to a
//! canonical [`Field`] plus a [`Transform`] describing how the raw value is
//! turned into an assignment. Legacy spellings (`@downloadURL`, `@run-at`,
//! `@exclude-match`, ...) are just more rows in [`DIRECTIVES`].
//!
//! # Assignment rules
//!
//! - Unknown directives and empty values are ignored, never errors.
//! - Booleans take `value == "true"`.
//! - Arrays append in source order; scalars overwrite (last wins).
//!
//! # Post-pass
//!
//! 1. `auto_update` is forced off unless both `update_url` and `version` are set.
//! 2. `matches`/`exclude_matches` go through [`normalize_all`] (`.tld` fan-out).
//! 3. Include/exclude regexes or globs add the catch-alls `*://*/*` and
//!    `file:///*` to `matches`, because registration requires non-empty
//!    `matches` even when selection is driven by those lists.
//! 4. Every array field is de-duplicated.

use std::sync::LazyLock;

use regex::Regex;

use crate::descriptor::{dedupe, Kind, RunAt, ScriptDescriptor};
use crate::fence::{find_fence, FenceKind};
use crate::require::{self, Require};
use crate::tld::normalize_all;
use crate::userstyle::parse_sections;

/// Catch-all patterns appended when selection is driven by includes/globs.
pub const CATCH_ALL_MATCHES: [&str; 2] = ["*://*/*", "file:///*"];

static LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?://)?\s*@([\w:.-]+)(?:\s+(.*?))?\s*$").expect("directive line regex is valid")
});

/// Characters stripped from style bodies: zero-width space/joiners and BOM.
const INVISIBLE: [char; 4] = ['\u{200B}', '\u{200C}', '\u{200D}', '\u{FEFF}'];

/// Canonical descriptor fields a directive can assign.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Name,
    Namespace,
    Author,
    Description,
    Version,
    License,
    Homepage,
    SupportUrl,
    Icon,
    UpdateUrl,
    InjectInto,
    RunAt,
    Matches,
    ExcludeMatches,
    IncludeGlobs,
    ExcludeGlobs,
    Includes,
    Excludes,
    Grant,
    Antifeatures,
    Require,
    Resource,
    MatchAboutBlank,
    AllFrames,
}

/// How a raw directive value becomes an assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    /// Value assigned as written.
    Verbatim,
    /// `/regex/` → `Includes`/`Excludes`, anything else → the glob field.
    RegexOrGlob { regex: Field, glob: Field },
    /// `document-start` → `document_start`; unknown → `document_idle`.
    RunAt,
    /// Flag directive that clears `all_frames`.
    NoFrames,
    /// `name url` pair.
    Resource,
    /// Library alias / remote split.
    Require,
    /// Dropped when it points at a `.meta.js` file.
    UpdateUrl,
    /// `"true"` → `true`, anything else → `false`.
    Flag,
}

/// One row of the directive table.
#[derive(Debug, Clone, Copy)]
pub struct Directive {
    pub key: &'static str,
    pub field: Field,
    pub transform: Transform,
}

const fn row(key: &'static str, field: Field, transform: Transform) -> Directive {
    Directive {
        key,
        field,
        transform,
    }
}

/// Every recognized directive spelling.
pub const DIRECTIVES: &[Directive] = &[
    row("name", Field::Name, Transform::Verbatim),
    row("namespace", Field::Namespace, Transform::Verbatim),
    row("author", Field::Author, Transform::Verbatim),
    row("description", Field::Description, Transform::Verbatim),
    row("version", Field::Version, Transform::Verbatim),
    row("license", Field::License, Transform::Verbatim),
    row("homepage", Field::Homepage, Transform::Verbatim),
    row("homepageURL", Field::Homepage, Transform::Verbatim),
    row("website", Field::Homepage, Transform::Verbatim),
    row("source", Field::Homepage, Transform::Verbatim),
    row("supportURL", Field::SupportUrl, Transform::Verbatim),
    row("icon", Field::Icon, Transform::Verbatim),
    row("iconURL", Field::Icon, Transform::Verbatim),
    row("defaulticon", Field::Icon, Transform::Verbatim),
    row("updateURL", Field::UpdateUrl, Transform::UpdateUrl),
    row("downloadURL", Field::UpdateUrl, Transform::UpdateUrl),
    row("installURL", Field::UpdateUrl, Transform::UpdateUrl),
    row("inject-into", Field::InjectInto, Transform::Verbatim),
    row("injectInto", Field::InjectInto, Transform::Verbatim),
    row("run-at", Field::RunAt, Transform::RunAt),
    row("runAt", Field::RunAt, Transform::RunAt),
    row("match", Field::Matches, Transform::Verbatim),
    row("exclude-match", Field::ExcludeMatches, Transform::Verbatim),
    row("excludeMatch", Field::ExcludeMatches, Transform::Verbatim),
    row("includeGlob", Field::IncludeGlobs, Transform::Verbatim),
    row("excludeGlob", Field::ExcludeGlobs, Transform::Verbatim),
    row(
        "include",
        Field::IncludeGlobs,
        Transform::RegexOrGlob {
            regex: Field::Includes,
            glob: Field::IncludeGlobs,
        },
    ),
    row(
        "exclude",
        Field::ExcludeGlobs,
        Transform::RegexOrGlob {
            regex: Field::Excludes,
            glob: Field::ExcludeGlobs,
        },
    ),
    row("grant", Field::Grant, Transform::Verbatim),
    row("antifeature", Field::Antifeatures, Transform::Verbatim),
    row("require", Field::Require, Transform::Require),
    row("resource", Field::Resource, Transform::Resource),
    row("noframes", Field::AllFrames, Transform::NoFrames),
    row("match-about-blank", Field::MatchAboutBlank, Transform::Flag),
    row("matchAboutBlank", Field::MatchAboutBlank, Transform::Flag),
    row("all-frames", Field::AllFrames, Transform::Flag),
    row("allFrames", Field::AllFrames, Transform::Flag),
];

/// Look up a directive spelling.
#[must_use]
pub fn lookup(key: &str) -> Option<&'static Directive> {
    DIRECTIVES.iter().find(|d| d.key == key)
}

/// A typed value ready to be written into a descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Value {
    Text(String),
    Flag(bool),
    RunAt(RunAt),
    Pair(String, String),
    RemoteRequire(String),
}

/// Returns the body of a `/.../` regex literal.
fn regex_literal(value: &str) -> Option<&str> {
    value
        .strip_prefix('/')
        .and_then(|v| v.strip_suffix('/'))
        .filter(|body| !body.is_empty())
}

/// Apply a directive's transform. `None` means "do not assign".
fn resolve(directive: &Directive, value: &str, is_script: bool) -> Option<(Field, Value)> {
    let field = directive.field;
    match directive.transform {
        Transform::NoFrames => Some((field, Value::Flag(false))),
        _ if value.is_empty() => None,
        Transform::Verbatim => Some((field, Value::Text(value.to_owned()))),
        Transform::Flag => Some((field, Value::Flag(value == "true"))),
        Transform::RunAt => Some((field, Value::RunAt(RunAt::from_directive(value)))),
        Transform::RegexOrGlob { regex, glob } => Some(match regex_literal(value) {
            Some(body) => (regex, Value::Text(body.to_owned())),
            None => (glob, Value::Text(value.to_owned())),
        }),
        Transform::UpdateUrl => {
            (!value.ends_with(".meta.js")).then(|| (field, Value::Text(value.to_owned())))
        }
        Transform::Resource => {
            let mut parts = value.split_whitespace();
            match (parts.next(), parts.next()) {
                (Some(name), Some(url)) => Some((field, Value::Pair(name.into(), url.into()))),
                _ => None,
            }
        }
        Transform::Require => match require::resolve(value, is_script) {
            Require::Local(v) => Some((field, Value::Text(v))),
            Require::Remote(url) => Some((field, Value::RemoteRequire(url))),
            Require::Rejected => None,
        },
    }
}

fn assign(d: &mut ScriptDescriptor, field: Field, value: Value) {
    match value {
        Value::Text(text) => match field {
            Field::Name => d.name = text,
            Field::Namespace => d.namespace = Some(text),
            Field::Author => d.author = Some(text),
            Field::Description => d.description = Some(text),
            Field::Version => d.version = Some(text),
            Field::License => d.license = Some(text),
            Field::Homepage => d.homepage = Some(text),
            Field::SupportUrl => d.support_url = Some(text),
            Field::Icon => d.icon = Some(text),
            Field::UpdateUrl => d.update_url = Some(text),
            Field::InjectInto => d.inject_into = Some(text),
            Field::Matches => d.matches.push(text),
            Field::ExcludeMatches => d.exclude_matches.push(text),
            Field::IncludeGlobs => d.include_globs.push(text),
            Field::ExcludeGlobs => d.exclude_globs.push(text),
            Field::Includes => d.includes.push(text),
            Field::Excludes => d.excludes.push(text),
            Field::Grant => d.grant.push(text),
            Field::Antifeatures => d.antifeatures.push(text),
            Field::Require => d.require.push(text),
            Field::RunAt | Field::Resource | Field::MatchAboutBlank | Field::AllFrames => {}
        },
        Value::Flag(flag) => match field {
            Field::MatchAboutBlank => d.match_about_blank = flag,
            Field::AllFrames => d.all_frames = flag,
            _ => {}
        },
        Value::RunAt(run_at) => d.run_at = run_at,
        Value::Pair(name, url) => {
            d.resource.insert(name, url);
        }
        Value::RemoteRequire(url) => d.require_remote.push(url),
    }
}

/// Handle `@name:<locale>` / `@description:<locale>`.
///
/// Returns `true` if the key was a localized directive (assigned or not).
fn assign_localized(d: &mut ScriptDescriptor, key: &str, value: &str) -> bool {
    let Some((base, locale)) = key.split_once(':') else {
        return false;
    };
    if value.is_empty() || locale.is_empty() {
        return true;
    }
    let map = match base {
        "name" => &mut d.i18n.name,
        "description" => &mut d.i18n.description,
        _ => return true,
    };
    map.insert(locale.to_owned(), value.to_owned());
    true
}

/// Parse a raw source into a descriptor.
///
/// Returns `None` when the text has no `==Kind==…==/Kind==` fence pair. The
/// user overrides are stored verbatim so a re-parse (edit, update) keeps them.
///
/// ```
/// let text = "// ==UserScript==\n\
///             // @name  Hello\n\
///             // @match *://*.example.com/*\n\
///             // @run-at document-start\n\
///             // ==/UserScript==\n\
///             console.log('hi');";
///
/// let d = usm::parse(text, "", "").unwrap();
/// assert_eq!(d.name, "Hello");
/// assert_eq!(d.matches, vec!["*://*.example.com/*"]);
/// assert_eq!(d.run_at, usm::RunAt::DocumentStart);
/// assert!(usm::parse("console.log('no header');", "", "").is_none());
/// ```
#[must_use]
pub fn parse(text: &str, user_matches: &str, user_exclude_matches: &str) -> Option<ScriptDescriptor> {
    let fence = find_fence(text)?;
    let is_script = fence.kind.is_script();

    let mut d = if is_script {
        ScriptDescriptor::new(Kind::Script, text)
    } else {
        let clean: String = text.chars().filter(|c| !INVISIBLE.contains(c)).collect();
        ScriptDescriptor::new(Kind::style(), clean)
    };
    d.user_matches = user_matches.to_owned();
    d.user_exclude_matches = user_exclude_matches.to_owned();

    for line in fence.body(text).lines() {
        let Some(cap) = LINE.captures(line) else {
            continue;
        };
        let Some(key) = cap.get(1).map(|m| m.as_str()) else {
            continue;
        };
        let value = cap.get(2).map_or("", |m| m.as_str().trim());

        if assign_localized(&mut d, key, value) {
            continue;
        }
        let Some(directive) = lookup(key) else {
            tracing::trace!(key, "ignoring unknown directive");
            continue;
        };
        if let Some((field, value)) = resolve(directive, value, is_script) {
            assign(&mut d, field, value);
        }
    }

    finish(&mut d, fence.kind);
    Some(d)
}

fn finish(d: &mut ScriptDescriptor, kind: FenceKind) {
    if d.update_url.is_none() || d.version.is_none() {
        d.auto_update = false;
    }

    d.matches = normalize_all(&d.matches);
    d.exclude_matches = normalize_all(&d.exclude_matches);

    let driven_by_lists = !d.includes.is_empty()
        || !d.excludes.is_empty()
        || !d.include_globs.is_empty()
        || !d.exclude_globs.is_empty();
    if driven_by_lists {
        d.matches
            .extend(CATCH_ALL_MATCHES.iter().map(|m| (*m).to_owned()));
    }

    if !kind.is_script() {
        let segments = parse_sections(&d.source_text);
        if !segments.is_empty() {
            d.kind = Kind::Style { segments };
        }
    }

    for list in [
        &mut d.matches,
        &mut d.exclude_matches,
        &mut d.include_globs,
        &mut d.exclude_globs,
        &mut d.includes,
        &mut d.excludes,
        &mut d.grant,
        &mut d.antifeatures,
        &mut d.require,
        &mut d.require_remote,
    ] {
        dedupe(list);
    }
}
