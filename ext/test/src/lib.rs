//! usm-test: Page contexts and conformance fixtures for usm
//!
//! Provides a [`Page`] (the frame URLs of one tab plus the shared global
//! exclude list) for driving applicability checks, and YAML fixture runners
//! for the parse, normalize and applies conformance suites.
//!
//! # Example
//!
//! ```
//! use usm_test::prelude::*;
//!
//! let script = parse(
//!     "// ==UserScript==\n// @name t\n// @match *://a.com/*\n// ==/UserScript==",
//!     "",
//!     "",
//! )
//! .unwrap();
//!
//! let page = Page::new("https://a.com/index.html").frame("about:blank");
//! assert!(page.applies(&script));
//! assert!(!page.exclude("*://a.com/*").applies(&script));
//! ```

use usm::prelude::*;

#[cfg(feature = "fixtures")]
pub mod fixture;

/// One page: top-level URL, frame URLs and the global exclude list in force.
#[derive(Debug, Clone, Default)]
pub struct Page {
    urls: Vec<String>,
    global_excludes: Vec<String>,
}

impl Page {
    /// A page with a single top-level URL.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            global_excludes: Vec::new(),
        }
    }

    /// A page from an explicit URL list (possibly empty).
    #[must_use]
    pub fn from_urls<S: Into<String>>(urls: impl IntoIterator<Item = S>) -> Self {
        Self {
            urls: urls.into_iter().map(Into::into).collect(),
            global_excludes: Vec::new(),
        }
    }

    /// Add a frame URL (builder pattern).
    #[must_use]
    pub fn frame(mut self, url: impl Into<String>) -> Self {
        self.urls.push(url.into());
        self
    }

    /// Add a global exclude pattern (builder pattern).
    #[must_use]
    pub fn exclude(mut self, pattern: impl Into<String>) -> Self {
        self.global_excludes.push(pattern.into());
        self
    }

    #[must_use]
    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    #[must_use]
    pub fn global_excludes(&self) -> &[String] {
        &self.global_excludes
    }

    /// Whether `descriptor` applies to this page.
    #[must_use]
    pub fn applies(&self, descriptor: &ScriptDescriptor) -> bool {
        applies(descriptor, &self.urls, &self.global_excludes)
    }

    /// The full decision chain for `descriptor` on this page.
    #[must_use]
    pub fn trace(&self, descriptor: &ScriptDescriptor) -> EvalTrace {
        Evaluator::compile(descriptor, &self.global_excludes).evaluate_with_trace(&self.urls)
    }
}

/// Prelude for convenient imports.
pub mod prelude {
    pub use super::Page;
    pub use usm::prelude::*;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn script(directives: &str) -> ScriptDescriptor {
        parse(
            &format!("// ==UserScript==\n// @name t\n{directives}// ==/UserScript=="),
            "",
            "",
        )
        .unwrap()
    }

    #[test]
    fn page_builder() {
        let page = Page::new("https://a.com/")
            .frame("https://b.com/")
            .exclude("*://c.com/*");
        assert_eq!(page.urls(), ["https://a.com/", "https://b.com/"]);
        assert_eq!(page.global_excludes(), ["*://c.com/*"]);
    }

    #[test]
    fn any_frame_selects() {
        let d = script("// @match *://b.com/*\n");
        assert!(Page::new("https://a.com/").frame("https://b.com/x").applies(&d));
        assert!(!Page::new("https://a.com/").applies(&d));
    }

    #[test]
    fn empty_page_selects_nothing() {
        let d = script("// @match *://*/*\n");
        assert!(!Page::from_urls(Vec::<String>::new()).applies(&d));
    }

    #[test]
    fn trace_names_the_deciding_step() {
        let d = script("// @match *://a.com/*\n// @exclude-match *://a.com/private/*\n");
        let trace = Page::new("https://a.com/private/1").trace(&d);
        assert!(!trace.result);
        assert_eq!(trace.decided_by(), Some(Step::ExcludeMatches));
    }
}
