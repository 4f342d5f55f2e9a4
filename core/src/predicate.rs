//! Predicate — boolean conditions over a page's frame URLs
//!
//! A predicate is evaluated against the list of frame URLs of one page
//! (top frame first). Leaves test a compiled [`PatternSet`] or the presence of
//! `about:blank`; branches compose with AND / NOT.

use crate::{PatternSet, PredicateTrace};

/// URL of an empty frame.
pub const ABOUT_BLANK: &str = "about:blank";

/// Composite predicate over frame URLs.
///
/// # INV: empty URL list
///
/// [`Predicate::AnyUrl`] and [`Predicate::AboutBlank`] are `false` for an
/// empty URL list, so an evaluator built from them selects nothing.
#[derive(Debug, Clone)]
pub enum Predicate {
    /// Fixed at compile time from descriptor flags.
    Const(bool),
    /// Some frame URL matches the set.
    AnyUrl(PatternSet),
    /// Some frame URL is `about:blank`.
    AboutBlank,
    /// All children must match. Short-circuits on the first `false`.
    All(Vec<Predicate>),
    /// Inverts the inner result.
    Not(Box<Predicate>),
}

impl Predicate {
    /// "The list is non-empty and no URL matches it."
    ///
    /// An empty list never fails this check, which is how optional
    /// include lists behave.
    #[must_use]
    pub fn unmatched(set: PatternSet) -> Self {
        if set.is_empty() {
            Self::Const(false)
        } else {
            Self::Not(Box::new(Self::AnyUrl(set)))
        }
    }

    /// Evaluate against the page's frame URLs.
    pub fn evaluate<S: AsRef<str>>(&self, urls: &[S]) -> bool {
        match self {
            Self::Const(value) => *value,
            Self::AnyUrl(set) => set.matches_any(urls),
            Self::AboutBlank => urls.iter().any(|u| u.as_ref() == ABOUT_BLANK),
            Self::All(predicates) => predicates.iter().all(|p| p.evaluate(urls)),
            Self::Not(p) => !p.evaluate(urls),
        }
    }

    /// Evaluate with full trace for debugging.
    ///
    /// Unlike [`evaluate()`](Self::evaluate), `All` does not short-circuit.
    #[must_use]
    pub fn evaluate_with_trace<S: AsRef<str>>(&self, urls: &[S]) -> PredicateTrace {
        match self {
            Self::Const(value) => PredicateTrace::Const { matched: *value },
            Self::AnyUrl(set) => {
                let url = set.first_match(urls).map(str::to_owned);
                PredicateTrace::AnyUrl {
                    matched: url.is_some(),
                    dialect: set.dialect(),
                    patterns: set.entries().to_vec(),
                    url,
                }
            }
            Self::AboutBlank => PredicateTrace::AboutBlank {
                matched: urls.iter().any(|u| u.as_ref() == ABOUT_BLANK),
            },
            Self::All(predicates) => {
                let children: Vec<PredicateTrace> = predicates
                    .iter()
                    .map(|p| p.evaluate_with_trace(urls))
                    .collect();
                let matched = children.iter().all(PredicateTrace::matched);
                PredicateTrace::All { matched, children }
            }
            Self::Not(p) => {
                let inner = p.evaluate_with_trace(urls);
                PredicateTrace::Not {
                    matched: !inner.matched(),
                    inner: Box::new(inner),
                }
            }
        }
    }
}
