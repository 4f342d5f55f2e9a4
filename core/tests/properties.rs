//! Property-based tests for usm.
//!
//! - parse is pure: identical input, deep-equal descriptors
//! - parsed array fields never hold duplicates
//! - normalize passes through anything without the `.tld` macro
//! - the evaluator never panics on arbitrary patterns, and its trace agrees
//! - `<all_urls>` applies to every non-empty URL list

use std::collections::HashSet;

use proptest::prelude::*;

use usm::{applies, normalize, parse, Evaluator, Kind, Normalized, ScriptDescriptor};

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

fn arb_key() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        Just("match"),
        Just("exclude-match"),
        Just("include"),
        Just("exclude"),
        Just("includeGlob"),
        Just("grant"),
        Just("require"),
        Just("antifeature"),
        Just("name"),
        Just("version"),
        Just("run-at"),
        Just("noframes"),
        Just("resource"),
        Just("unknown-key"),
    ]
}

fn arb_value() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("*://*.example.com/*".to_string()),
        Just("*://*.amazon.tld/*".to_string()),
        Just("/^https:\\/\\/a\\//".to_string()),
        Just("https://code.jquery.com/jquery-3.6.0.min.js".to_string()),
        Just("http://example.org/lib.js".to_string()),
        Just("document-start".to_string()),
        "[a-z*./:]{0,16}",
    ]
}

fn arb_script() -> impl Strategy<Value = String> {
    prop::collection::vec((arb_key(), arb_value()), 0..24).prop_map(|lines| {
        let mut text = String::from("// ==UserScript==\n");
        for (key, value) in lines {
            text.push_str(&format!("// @{key} {value}\n"));
        }
        text.push_str("// ==/UserScript==\n");
        text
    })
}

fn arb_url() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("about:blank".to_string()),
        Just("file:///tmp/x.html".to_string()),
        "https?://[a-z]{1,8}\\.(com|org|net)/[a-z/]{0,12}",
    ]
}

fn has_duplicates(values: &[String]) -> bool {
    let mut seen = HashSet::new();
    values.iter().any(|v| !seen.insert(v))
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn parse_is_pure(text in arb_script()) {
        prop_assert_eq!(parse(&text, "", ""), parse(&text, "", ""));
    }

    #[test]
    fn parsed_arrays_have_no_duplicates(text in arb_script()) {
        let d = parse(&text, "", "").expect("fenced text parses");
        for list in [
            &d.matches,
            &d.exclude_matches,
            &d.include_globs,
            &d.exclude_globs,
            &d.includes,
            &d.excludes,
            &d.grant,
            &d.antifeatures,
            &d.require,
            &d.require_remote,
        ] {
            prop_assert!(!has_duplicates(list), "duplicates in {:?}", list);
        }
    }

    #[test]
    fn normalize_passes_through_without_macro(pattern in "[a-z*:/.]{0,24}") {
        prop_assume!(!pattern.to_ascii_lowercase().contains(".tld"));
        prop_assert_eq!(normalize(&pattern), Normalized::One(pattern.clone()));
    }

    #[test]
    fn evaluator_trace_agrees(
        matches in prop::collection::vec("[a-z*:/.?()\\[]{0,16}", 0..4),
        excludes in prop::collection::vec("[a-z*:/.?()\\[]{0,16}", 0..3),
        urls in prop::collection::vec(arb_url(), 0..4),
    ) {
        let mut d = ScriptDescriptor::new(Kind::Script, "");
        d.matches = matches;
        d.exclude_globs = excludes.clone();
        d.excludes = excludes;
        let ev = Evaluator::compile(&d, &["*://*.blocked.net/*"]);
        prop_assert_eq!(ev.evaluate_with_trace(&urls).result, ev.evaluate(&urls));
    }

    #[test]
    fn all_urls_applies_to_any_page(urls in prop::collection::vec(arb_url(), 1..5)) {
        let mut d = ScriptDescriptor::new(Kind::Script, "");
        d.matches = vec!["<all_urls>".into()];
        prop_assert!(applies(&d, &urls, &[] as &[&str]));
    }
}
