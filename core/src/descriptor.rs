//! `ScriptDescriptor` — the parsed, persisted form of one installed source
//!
//! A descriptor is produced by [`parse`](crate::parse) and consumed by the
//! [`Evaluator`](crate::Evaluator) (per page visit) and by the registration
//! synchronizer (per change). Scripts and styles share one struct; the
//! style-only per-section data lives on the [`Kind::Style`] variant.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Which kind of source a descriptor holds, derived from the fence keyword.
///
/// `==UserScript==` produces [`Kind::Script`]; `==UserCSS==` and
/// `==UserStyle==` produce [`Kind::Style`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Kind {
    /// JavaScript user script.
    Script,
    /// CSS user style.
    Style {
        /// Per-`@-moz-document` sections. Empty for single-block styles.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        segments: Vec<StyleSegment>,
    },
}

impl Kind {
    /// A style with no `@-moz-document` sections.
    #[must_use]
    pub fn style() -> Self {
        Self::Style {
            segments: Vec::new(),
        }
    }
}

/// One `@-moz-document` section of a user style.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleSegment {
    /// Match patterns derived from the section's `domain()`/`url()`/... list.
    pub matches: Vec<String>,
    /// The CSS inside the section braces.
    pub css: String,
}

/// When an injected source runs relative to document load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunAt {
    DocumentStart,
    DocumentEnd,
    DocumentIdle,
}

impl RunAt {
    /// Interpret a `@run-at` value.
    ///
    /// Hyphens are read as underscores. Anything other than `document_start`
    /// or `document_end` becomes [`RunAt::DocumentIdle`].
    #[must_use]
    pub fn from_directive(value: &str) -> Self {
        match value.trim().replace('-', "_").as_str() {
            "document_start" => Self::DocumentStart,
            "document_end" => Self::DocumentEnd,
            _ => Self::DocumentIdle,
        }
    }

    /// The wire spelling (`document_start`, ...).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DocumentStart => "document_start",
            Self::DocumentEnd => "document_end",
            Self::DocumentIdle => "document_idle",
        }
    }
}

impl fmt::Display for RunAt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Localized names and descriptions from `@name:<locale>` style directives.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct I18n {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub name: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub description: BTreeMap<String, String>,
}

impl I18n {
    /// Returns `true` if no localized value is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_empty() && self.description.is_empty()
    }
}

/// Structured representation of one installed script or style.
///
/// Keyed by [`name`](Self::name), which is the identity used for storage and
/// registration. Array fields never hold duplicates once produced by
/// [`parse`](crate::parse).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptDescriptor {
    pub name: String,
    pub kind: Kind,
    /// Raw source, metadata fence still embedded.
    pub source_text: String,
    pub enabled: bool,
    pub auto_update: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub support_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inject_into: Option<String>,
    #[serde(default)]
    pub grant: Vec<String>,
    #[serde(default)]
    pub antifeatures: Vec<String>,

    // Selection
    #[serde(default)]
    pub matches: Vec<String>,
    #[serde(default)]
    pub exclude_matches: Vec<String>,
    #[serde(default)]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    /// Raw regex bodies from `@include /.../`.
    #[serde(default)]
    pub includes: Vec<String>,
    /// Raw regex bodies from `@exclude /.../`.
    #[serde(default)]
    pub excludes: Vec<String>,
    pub match_about_blank: bool,
    pub all_frames: bool,
    pub run_at: RunAt,

    // User overrides, set from the UI rather than metadata
    #[serde(default)]
    pub user_matches: String,
    #[serde(default)]
    pub user_exclude_matches: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_run_at: Option<RunAt>,

    // Dependencies
    #[serde(default)]
    pub require: Vec<String>,
    #[serde(default)]
    pub require_remote: Vec<String>,
    #[serde(default)]
    pub resource: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "I18n::is_empty")]
    pub i18n: I18n,
    /// Last registration failure. Cleared on save.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScriptDescriptor {
    /// An empty descriptor of the given kind, with per-kind defaults applied.
    #[must_use]
    pub fn new(kind: Kind, source_text: impl Into<String>) -> Self {
        let is_script = matches!(kind, Kind::Script);
        Self {
            name: String::new(),
            kind,
            source_text: source_text.into(),
            enabled: true,
            auto_update: true,
            version: None,
            update_url: None,
            namespace: None,
            author: None,
            description: None,
            license: None,
            homepage: None,
            support_url: None,
            icon: None,
            inject_into: None,
            grant: Vec::new(),
            antifeatures: Vec::new(),
            matches: Vec::new(),
            exclude_matches: Vec::new(),
            include_globs: Vec::new(),
            exclude_globs: Vec::new(),
            includes: Vec::new(),
            excludes: Vec::new(),
            match_about_blank: false,
            all_frames: is_script,
            run_at: if is_script {
                RunAt::DocumentIdle
            } else {
                RunAt::DocumentStart
            },
            user_matches: String::new(),
            user_exclude_matches: String::new(),
            user_run_at: None,
            require: Vec::new(),
            require_remote: Vec::new(),
            resource: BTreeMap::new(),
            i18n: I18n::default(),
            error: None,
        }
    }

    /// Returns `true` for [`Kind::Script`].
    #[must_use]
    pub fn is_script(&self) -> bool {
        matches!(self.kind, Kind::Script)
    }

    /// Style sections; empty for scripts and single-block styles.
    #[must_use]
    pub fn segments(&self) -> &[StyleSegment] {
        match &self.kind {
            Kind::Style { segments } => segments,
            Kind::Script => &[],
        }
    }

    /// `user_matches` split on whitespace.
    pub fn user_match_list(&self) -> impl Iterator<Item = &str> {
        self.user_matches.split_whitespace()
    }

    /// `user_exclude_matches` split on whitespace.
    pub fn user_exclude_list(&self) -> impl Iterator<Item = &str> {
        self.user_exclude_matches.split_whitespace()
    }

    /// The run-at that registration uses: the user override wins.
    #[must_use]
    pub fn effective_run_at(&self) -> RunAt {
        self.user_run_at.unwrap_or(self.run_at)
    }

    /// Whether anything selects pages for this descriptor.
    ///
    /// A descriptor without `matches`, `include_globs` and style-section
    /// matches never applies and never registers.
    #[must_use]
    pub fn has_selection(&self) -> bool {
        !self.matches.is_empty()
            || !self.include_globs.is_empty()
            || self.segments().iter().any(|s| !s.matches.is_empty())
    }

    /// Registration keys owned by this descriptor.
    ///
    /// A sectioned style registers each section under `name + "style" + i`;
    /// everything else registers under `name`.
    #[must_use]
    pub fn registration_keys(&self) -> Vec<String> {
        let segments = self.segments();
        if segments.is_empty() {
            vec![self.name.clone()]
        } else {
            (0..segments.len())
                .map(|i| format!("{}style{i}", self.name))
                .collect()
        }
    }

    /// Compare only the fields that affect what gets registered.
    ///
    /// Informational fields (description, version, error, ...) are ignored so
    /// that editing them does not churn live registrations.
    #[must_use]
    pub fn registration_eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.enabled == other.enabled
            && self.inject_into == other.inject_into
            && self.require == other.require
            && self.require_remote == other.require_remote
            && self.resource == other.resource
            && self.user_matches == other.user_matches
            && self.user_exclude_matches == other.user_exclude_matches
            && self.user_run_at == other.user_run_at
            && self.all_frames == other.all_frames
            && self.source_text == other.source_text
            && self.kind == other.kind
            && self.matches == other.matches
            && self.exclude_matches == other.exclude_matches
            && self.include_globs == other.include_globs
            && self.exclude_globs == other.exclude_globs
            && self.includes == other.includes
            && self.excludes == other.excludes
            && self.match_about_blank == other.match_about_blank
            && self.run_at == other.run_at
    }
}

/// Remove later duplicates, keeping first-occurrence order.
pub(crate) fn dedupe(values: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::with_capacity(values.len());
    values.retain(|v| seen.insert(v.clone()));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_at_coerces_unknown_values() {
        assert_eq!(RunAt::from_directive("document-start"), RunAt::DocumentStart);
        assert_eq!(RunAt::from_directive("document_end"), RunAt::DocumentEnd);
        assert_eq!(RunAt::from_directive("document-body"), RunAt::DocumentIdle);
        assert_eq!(RunAt::from_directive(""), RunAt::DocumentIdle);
    }

    #[test]
    fn defaults_depend_on_kind() {
        let script = ScriptDescriptor::new(Kind::Script, "");
        assert_eq!(script.run_at, RunAt::DocumentIdle);
        assert!(script.all_frames);

        let style = ScriptDescriptor::new(Kind::style(), "");
        assert_eq!(style.run_at, RunAt::DocumentStart);
        assert!(!style.all_frames);
    }

    #[test]
    fn user_run_at_overrides() {
        let mut d = ScriptDescriptor::new(Kind::Script, "");
        d.user_run_at = Some(RunAt::DocumentStart);
        assert_eq!(d.effective_run_at(), RunAt::DocumentStart);
    }

    #[test]
    fn registration_keys_for_sections() {
        let mut d = ScriptDescriptor::new(
            Kind::Style {
                segments: vec![
                    StyleSegment {
                        matches: vec!["*://*.a.com/*".into()],
                        css: "a{}".into(),
                    },
                    StyleSegment {
                        matches: vec!["*://*.b.com/*".into()],
                        css: "b{}".into(),
                    },
                ],
            },
            "",
        );
        d.name = "Dark".into();
        assert_eq!(d.registration_keys(), vec!["Darkstyle0", "Darkstyle1"]);
        assert!(d.has_selection());
    }

    #[test]
    fn registration_eq_ignores_informational_fields() {
        let mut a = ScriptDescriptor::new(Kind::Script, "x");
        a.matches = vec!["*://*/*".into()];
        let mut b = a.clone();
        b.description = Some("changed".into());
        b.error = Some("boom".into());
        b.version = Some("2".into());
        assert!(a.registration_eq(&b));

        b.exclude_matches.push("*://example.com/*".into());
        assert!(!a.registration_eq(&b));
    }

    #[test]
    fn dedupe_keeps_first_occurrence() {
        let mut v = vec!["b".to_string(), "a".into(), "b".into(), "c".into(), "a".into()];
        dedupe(&mut v);
        assert_eq!(v, vec!["b", "a", "c"]);
    }

    #[test]
    fn serde_uses_camel_case_and_tagged_kind() {
        let d = ScriptDescriptor::new(Kind::style(), "body{}");
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["kind"]["type"], "style");
        assert_eq!(json["runAt"], "document_start");
        assert!(json.get("sourceText").is_some());

        let back: ScriptDescriptor = serde_json::from_value(json).unwrap();
        assert_eq!(back, d);
    }
}
