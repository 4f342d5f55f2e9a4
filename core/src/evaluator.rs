//! `Evaluator` — does a descriptor apply to a page?
//!
//! The decision is an ordered rule list with first-match-wins semantics and a
//! `true` fallback. Each rule pairs a [`Step`] with a [`Predicate`] over the
//! page's frame URLs and the verdict returned when the predicate fires.
//!
//! Compile once per descriptor (and global-exclude list), evaluate per page.

use std::fmt;

use crate::{
    compile_dialect, Dialect, EvalStep, EvalTrace, PatternSet, Predicate, ScriptDescriptor,
};

/// The decision steps, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    /// A frame URL matches the global exclude list.
    GlobalExclude,
    /// The descriptor selects nothing.
    NoSelection,
    /// `about:blank` frame with `match_about_blank` set.
    AboutBlank,
    /// A frame URL matches the user exclude overrides.
    UserExclude,
    /// No frame URL matches `matches`, user matches or style sections.
    NotMatched,
    /// `include_globs` given but none matches.
    IncludeGlobs,
    /// `includes` given but none matches.
    Includes,
    /// A frame URL matches `exclude_matches`.
    ExcludeMatches,
    /// A frame URL matches `exclude_globs`.
    ExcludeGlobs,
    /// A frame URL matches `excludes`.
    Excludes,
}

impl Step {
    /// Stable kebab-case name, used in traces and fixtures.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::GlobalExclude => "global-exclude",
            Self::NoSelection => "no-selection",
            Self::AboutBlank => "about-blank",
            Self::UserExclude => "user-exclude",
            Self::NotMatched => "not-matched",
            Self::IncludeGlobs => "include-globs",
            Self::Includes => "includes",
            Self::ExcludeMatches => "exclude-matches",
            Self::ExcludeGlobs => "exclude-globs",
            Self::Excludes => "excludes",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the decision chain.
#[derive(Debug, Clone)]
pub struct Rule {
    pub step: Step,
    pub predicate: Predicate,
    /// Returned when the predicate fires.
    pub verdict: bool,
}

impl Rule {
    fn new(step: Step, predicate: Predicate, verdict: bool) -> Self {
        Self {
            step,
            predicate,
            verdict,
        }
    }
}

/// Compiled applicability check for one descriptor.
///
/// # INV: First-match-wins
///
/// Rules are evaluated in [`Step`] order. The first rule whose predicate
/// fires decides; later rules are not consulted.
#[derive(Debug, Clone)]
pub struct Evaluator {
    rules: Vec<Rule>,
}

impl Evaluator {
    /// Compile the decision chain for `descriptor`.
    ///
    /// `global_excludes` are match patterns shared by every descriptor.
    #[must_use]
    pub fn compile<S: AsRef<str>>(descriptor: &ScriptDescriptor, global_excludes: &[S]) -> Self {
        let d = descriptor;
        let match_set = |entries: &[String]| compile_dialect(entries, Dialect::MatchPattern);

        let mut selected: Vec<String> = d.matches.clone();
        selected.extend(d.user_match_list().map(str::to_owned));
        for segment in d.segments() {
            selected.extend(segment.matches.iter().cloned());
        }
        let user_excludes: Vec<String> = d.user_exclude_list().map(str::to_owned).collect();

        let rules = vec![
            Rule::new(
                Step::GlobalExclude,
                Predicate::AnyUrl(compile_dialect(global_excludes, Dialect::MatchPattern)),
                false,
            ),
            Rule::new(Step::NoSelection, Predicate::Const(!d.has_selection()), false),
            Rule::new(
                Step::AboutBlank,
                Predicate::All(vec![
                    Predicate::Const(d.match_about_blank),
                    Predicate::AboutBlank,
                ]),
                true,
            ),
            Rule::new(
                Step::UserExclude,
                Predicate::AnyUrl(match_set(&user_excludes)),
                false,
            ),
            Rule::new(
                Step::NotMatched,
                Predicate::Not(Box::new(Predicate::AnyUrl(match_set(&selected)))),
                false,
            ),
            Rule::new(
                Step::IncludeGlobs,
                Predicate::unmatched(compile_dialect(&d.include_globs, Dialect::Glob)),
                false,
            ),
            Rule::new(
                Step::Includes,
                Predicate::unmatched(compile_dialect(&d.includes, Dialect::RawRegex)),
                false,
            ),
            Rule::new(
                Step::ExcludeMatches,
                Predicate::AnyUrl(match_set(&d.exclude_matches)),
                false,
            ),
            Rule::new(
                Step::ExcludeGlobs,
                Predicate::AnyUrl(compile_dialect(&d.exclude_globs, Dialect::Glob)),
                false,
            ),
            Rule::new(
                Step::Excludes,
                Predicate::AnyUrl(compile_dialect(&d.excludes, Dialect::RawRegex)),
                false,
            ),
        ];

        tracing::debug!(identity = %d.name, rules = rules.len(), "compiled evaluator");
        Self { rules }
    }

    /// The compiled rules, in evaluation order.
    #[must_use]
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// The compiled pattern set for a step, if that step tests one.
    #[must_use]
    pub fn patterns(&self, step: Step) -> Option<&PatternSet> {
        fn find(p: &Predicate) -> Option<&PatternSet> {
            match p {
                Predicate::AnyUrl(set) => Some(set),
                Predicate::Not(inner) => find(inner),
                Predicate::All(children) => children.iter().find_map(find),
                Predicate::Const(_) | Predicate::AboutBlank => None,
            }
        }
        self.rules
            .iter()
            .find(|r| r.step == step)
            .and_then(|r| find(&r.predicate))
    }

    /// Evaluate against the page's frame URLs (top frame first).
    pub fn evaluate<S: AsRef<str>>(&self, urls: &[S]) -> bool {
        self.rules
            .iter()
            .find(|rule| rule.predicate.evaluate(urls))
            .map_or(true, |rule| rule.verdict)
    }

    /// Evaluate with full trace for debugging.
    ///
    /// # INV: `trace.result == self.evaluate(urls)`
    #[must_use]
    pub fn evaluate_with_trace<S: AsRef<str>>(&self, urls: &[S]) -> EvalTrace {
        let mut steps = Vec::new();
        for rule in &self.rules {
            let predicate_trace = rule.predicate.evaluate_with_trace(urls);
            let matched = predicate_trace.matched();
            steps.push(EvalStep {
                step: rule.step,
                matched,
                predicate_trace,
            });
            if matched {
                return EvalTrace {
                    result: rule.verdict,
                    steps,
                    used_fallback: false,
                };
            }
        }
        EvalTrace {
            result: true,
            steps,
            used_fallback: true,
        }
    }
}

/// Does `descriptor` apply to a page with these frame URLs?
///
/// Convenience for one-shot checks; compile an [`Evaluator`] to check many
/// pages.
///
/// ```
/// use usm::{applies, Kind, ScriptDescriptor};
///
/// let mut d = ScriptDescriptor::new(Kind::Script, "");
/// d.matches = vec!["*://*/*".into()];
/// d.exclude_matches = vec!["*://example.com/*".into()];
///
/// assert!(!applies(&d, &["https://example.com/page"], &[] as &[&str]));
/// assert!(applies(&d, &["https://other.com/"], &[] as &[&str]));
/// ```
pub fn applies<U: AsRef<str>, G: AsRef<str>>(
    descriptor: &ScriptDescriptor,
    urls: &[U],
    global_excludes: &[G],
) -> bool {
    Evaluator::compile(descriptor, global_excludes).evaluate(urls)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Kind, StyleSegment};

    const NONE: &[&str] = &[];

    fn script(matches: &[&str]) -> ScriptDescriptor {
        let mut d = ScriptDescriptor::new(Kind::Script, "");
        d.name = "t".into();
        d.matches = matches.iter().map(|m| (*m).to_owned()).collect();
        d
    }

    fn decided(d: &ScriptDescriptor, urls: &[&str], global: &[&str]) -> Option<Step> {
        Evaluator::compile(d, global).evaluate_with_trace(urls).decided_by()
    }

    #[test]
    fn all_urls_applies_to_anything() {
        let d = script(&["<all_urls>"]);
        assert!(applies(&d, &["https://a.com/"], NONE));
        assert!(applies(&d, &["chrome://settings"], NONE));
        assert!(!applies(&d, NONE, NONE), "empty URL list selects nothing");
    }

    #[test]
    fn exclude_precedence() {
        let mut d = script(&["*://*.example.com/*"]);
        d.exclude_matches = vec!["*://shop.example.com/*".into()];
        assert!(!applies(&d, &["https://shop.example.com/"], NONE));
        assert!(applies(&d, &["https://www.example.com/"], NONE));
        assert_eq!(
            decided(&d, &["https://shop.example.com/"], NONE),
            Some(Step::ExcludeMatches)
        );
    }

    #[test]
    fn global_excludes_come_first() {
        let mut d = script(&["<all_urls>"]);
        d.match_about_blank = true;
        assert_eq!(
            decided(&d, &["about:blank", "https://bank.com/"], &["*://bank.com/*"]),
            Some(Step::GlobalExclude)
        );
    }

    #[test]
    fn no_selection() {
        let d = script(&[]);
        assert!(!applies(&d, &["https://a.com/"], NONE));
        assert_eq!(decided(&d, &["https://a.com/"], NONE), Some(Step::NoSelection));
    }

    #[test]
    fn about_blank_short_circuits() {
        let mut d = script(&["*://a.com/*"]);
        d.exclude_matches = vec!["*://a.com/*".into()];
        d.match_about_blank = true;
        assert!(applies(&d, &["https://a.com/", "about:blank"], NONE));
        d.match_about_blank = false;
        assert!(!applies(&d, &["https://a.com/", "about:blank"], NONE));
    }

    #[test]
    fn user_overrides() {
        let mut d = script(&["*://a.com/*"]);
        d.user_matches = "*://b.com/* *://c.com/*".into();
        assert!(applies(&d, &["https://c.com/"], NONE));

        d.user_exclude_matches = "*://a.com/*".into();
        assert_eq!(decided(&d, &["https://a.com/"], NONE), Some(Step::UserExclude));
    }

    #[test]
    fn include_globs_narrow_selection() {
        let mut d = script(&["*://*/*"]);
        d.include_globs = vec!["*://*.wiki.org/*".into()];
        assert!(applies(&d, &["https://en.wiki.org/x"], NONE));
        assert_eq!(
            decided(&d, &["https://other.org/"], NONE),
            Some(Step::IncludeGlobs)
        );
    }

    #[test]
    fn includes_and_excludes_regex() {
        let mut d = script(&["*://*/*", "file:///*"]);
        d.includes = vec![r"^https://foo\.".into()];
        d.excludes = vec!["/private/".into()];
        assert!(applies(&d, &["https://foo.org/"], NONE));
        assert_eq!(decided(&d, &["https://bar.org/"], NONE), Some(Step::Includes));
        assert_eq!(
            decided(&d, &["https://foo.org/private/x"], NONE),
            Some(Step::Excludes)
        );
    }

    #[test]
    fn exclude_globs() {
        let mut d = script(&["*://*/*"]);
        d.exclude_globs = vec!["*/admin/*".into()];
        assert_eq!(
            decided(&d, &["https://a.com/admin/x"], NONE),
            Some(Step::ExcludeGlobs)
        );
    }

    #[test]
    fn style_segments_select() {
        let mut d = ScriptDescriptor::new(
            Kind::Style {
                segments: vec![StyleSegment {
                    matches: vec!["*://*.a.com/*".into()],
                    css: "a{}".into(),
                }],
            },
            "",
        );
        d.name = "s".into();
        assert!(applies(&d, &["https://x.a.com/"], NONE));
        assert!(!applies(&d, &["https://b.com/"], NONE));
    }

    #[test]
    fn scenario_catch_all_with_exclude() {
        let mut d = script(&["*://*/*"]);
        d.exclude_matches = vec!["*://example.com/*".into()];
        assert!(!applies(&d, &["https://example.com/page"], NONE));
        assert!(applies(&d, &["https://other.com/"], NONE));
    }

    #[test]
    fn any_frame_can_exclude() {
        let mut d = script(&["*://*/*"]);
        d.exclude_matches = vec!["*://ads.net/*".into()];
        assert!(!applies(&d, &["https://a.com/", "https://ads.net/frame"], NONE));
    }

    #[test]
    fn trace_result_matches_evaluate() {
        let mut d = script(&["*://*.example.com/*"]);
        d.exclude_globs = vec!["*logout*".into()];
        let ev = Evaluator::compile(&d, &["*://blocked.example.com/*"]);
        for urls in [
            vec!["https://www.example.com/"],
            vec!["https://www.example.com/logout"],
            vec!["https://blocked.example.com/"],
            vec!["https://elsewhere.org/"],
            vec![],
        ] {
            let trace = ev.evaluate_with_trace(&urls);
            assert_eq!(trace.result, ev.evaluate(&urls), "{urls:?}");
            assert_eq!(trace.used_fallback, trace.decided_by().is_none());
        }
    }

    #[test]
    fn patterns_lookup() {
        let d = script(&["*://a.com/*"]);
        let ev = Evaluator::compile(&d, NONE);
        assert_eq!(ev.rules().len(), 10);
        assert_eq!(
            ev.patterns(Step::NotMatched).map(PatternSet::entries),
            Some(&["*://a.com/*".to_string()][..])
        );
        assert!(ev.patterns(Step::NoSelection).is_none());
    }
}
