//! Evaluation trace types for debugging selection decisions.
//!
//! Trace types mirror the runtime types ([`Predicate`](crate::Predicate),
//! [`Evaluator`](crate::Evaluator)) but capture evaluation results instead of
//! inputs. Use `evaluate_with_trace()` to answer "why did this script (not)
//! run on this page?".
//!
//! # Two Levels of Trace
//!
//! - [`PredicateTrace`] — Per-predicate: which sub-expressions matched, and
//!   which frame URL hit a pattern list?
//! - [`EvalTrace`] — Per-descriptor: which decision steps were checked, and
//!   which one decided?

use std::fmt;

use crate::{Dialect, Step};

/// Trace of a predicate evaluation.
///
/// In `All`, every child is evaluated (no short-circuit) for maximum
/// debugging value. The `matched` result is still correct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PredicateTrace {
    /// A compile-time constant.
    Const { matched: bool },
    /// A pattern list checked against the frame URLs.
    AnyUrl {
        matched: bool,
        dialect: Dialect,
        /// The list entries, as written.
        patterns: Vec<String>,
        /// First frame URL that matched.
        url: Option<String>,
    },
    /// `about:blank` presence.
    AboutBlank { matched: bool },
    /// AND: all children must match.
    All {
        matched: bool,
        children: Vec<PredicateTrace>,
    },
    /// NOT: inverts inner result.
    Not {
        matched: bool,
        inner: Box<PredicateTrace>,
    },
}

impl PredicateTrace {
    /// Get the overall match result of this predicate.
    #[must_use]
    pub fn matched(&self) -> bool {
        match self {
            Self::Const { matched }
            | Self::AnyUrl { matched, .. }
            | Self::AboutBlank { matched }
            | Self::All { matched, .. }
            | Self::Not { matched, .. } => *matched,
        }
    }

    /// The first frame URL that matched a pattern list anywhere in the tree.
    #[must_use]
    pub fn matched_url(&self) -> Option<&str> {
        match self {
            Self::AnyUrl { url, .. } => url.as_deref(),
            Self::All { children, .. } => children.iter().find_map(Self::matched_url),
            Self::Not { inner, .. } => inner.matched_url(),
            Self::Const { .. } | Self::AboutBlank { .. } => None,
        }
    }
}

/// Trace of a full [`Evaluator`](crate::Evaluator) evaluation.
///
/// # INV: `result` == `evaluate()` result
pub struct EvalTrace {
    /// The final result (identical to what `evaluate()` returns).
    pub result: bool,
    /// Every step that was checked, in order. Stops at the first one that
    /// fired (first-match-wins).
    pub steps: Vec<EvalStep>,
    /// Whether no step fired and the `true` fallback was used.
    pub used_fallback: bool,
}

impl EvalTrace {
    /// The step that decided the result, or `None` for the fallback.
    #[must_use]
    pub fn decided_by(&self) -> Option<Step> {
        self.steps.iter().find(|s| s.matched).map(|s| s.step)
    }
}

impl fmt::Debug for EvalTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvalTrace")
            .field("result", &self.result)
            .field("steps", &self.steps)
            .field("used_fallback", &self.used_fallback)
            .finish()
    }
}

impl fmt::Display for EvalTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verdict = if self.result { "applies" } else { "skipped" };
        let Some(step) = self.steps.iter().find(|s| s.matched) else {
            return write!(f, "{verdict}: no rule fired");
        };
        write!(f, "{verdict}: {}", step.step)?;
        if let Some(url) = step.predicate_trace.matched_url() {
            write!(f, " ({url})")?;
        }
        Ok(())
    }
}

/// One decision step in a trace.
#[derive(Debug)]
pub struct EvalStep {
    pub step: Step,
    /// Did the step's predicate fire?
    pub matched: bool,
    pub predicate_trace: PredicateTrace,
}
