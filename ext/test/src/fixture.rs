//! Conformance fixture runners
//!
//! Three fixture shapes, one per suite:
//!
//! - [`ParseFixture`]: source text → expected descriptor fields
//! - [`NormalizeFixture`]: pattern → expected `.tld` fan-out
//! - [`AppliesFixture`]: one source, many pages → expected verdicts
//!
//! A YAML file may hold several fixtures separated by `---`.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};

use usm::prelude::*;

use crate::Page;

// ═══════════════════════════════════════════════════════════════════════════════
// Shared runner
// ═══════════════════════════════════════════════════════════════════════════════

/// Result of running a single test case
#[derive(Debug)]
pub struct CaseResult {
    pub case_name: String,
    pub passed: bool,
    pub expected: String,
    pub actual: String,
}

/// A fixture that can be run case by case.
pub trait Conformance: DeserializeOwned {
    fn name(&self) -> &str;

    /// Run all test cases and return results
    fn run(&self) -> Vec<CaseResult>;

    /// Run all test cases and panic on first failure
    fn run_and_assert(&self) {
        for result in self.run() {
            assert!(
                result.passed,
                "Fixture '{}' case '{}' failed: expected {}, got {}",
                self.name(),
                result.case_name,
                result.expected,
                result.actual
            );
        }
    }
}

/// Parse multiple fixtures from a YAML file with `---` separators
pub fn from_yaml_multi<T: Conformance>(yaml: &str) -> Result<Vec<T>, serde_yaml::Error> {
    let mut fixtures = Vec::new();
    for doc in serde_yaml::Deserializer::from_str(yaml) {
        fixtures.push(T::deserialize(doc)?);
    }
    Ok(fixtures)
}

// ═══════════════════════════════════════════════════════════════════════════════
// Parse
// ═══════════════════════════════════════════════════════════════════════════════

/// Source text → descriptor fields.
#[derive(Debug, Deserialize)]
pub struct ParseFixture {
    pub name: String,
    pub description: String,
    pub cases: Vec<ParseCase>,
}

#[derive(Debug, Deserialize)]
pub struct ParseCase {
    pub name: String,
    pub source: String,
    #[serde(default)]
    pub user_matches: String,
    #[serde(default)]
    pub user_exclude_matches: String,
    /// Expected descriptor fields (camelCase, as serialized). Only the listed
    /// fields are compared; `null` also matches an absent field. A `null`
    /// expectation for the whole case means the text must not parse.
    pub expect: Option<Map<String, Value>>,
}

impl ParseCase {
    fn check(&self) -> CaseResult {
        let parsed = parse(&self.source, &self.user_matches, &self.user_exclude_matches);
        let (passed, actual) = match (&self.expect, parsed) {
            (None, None) => (true, "none".to_owned()),
            (None, Some(d)) => (false, format!("descriptor {:?}", d.name)),
            (Some(_), None) => (false, "none".to_owned()),
            (Some(expect), Some(d)) => {
                let actual = serde_json::to_value(&d).unwrap_or(Value::Null);
                let mismatches: Vec<String> = expect
                    .iter()
                    .filter_map(|(key, want)| {
                        let got = actual.get(key).unwrap_or(&Value::Null);
                        (got != want).then(|| format!("{key}={got}"))
                    })
                    .collect();
                (mismatches.is_empty(), mismatches.join(", "))
            }
        };
        CaseResult {
            case_name: self.name.clone(),
            passed,
            expected: self
                .expect
                .as_ref()
                .map_or_else(|| "none".to_owned(), |e| Value::Object(e.clone()).to_string()),
            actual,
        }
    }
}

impl Conformance for ParseFixture {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self) -> Vec<CaseResult> {
        self.cases.iter().map(ParseCase::check).collect()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Normalize
// ═══════════════════════════════════════════════════════════════════════════════

/// Pattern → `.tld` fan-out.
#[derive(Debug, Deserialize)]
pub struct NormalizeFixture {
    pub name: String,
    pub description: String,
    pub cases: Vec<NormalizeCase>,
}

#[derive(Debug, Deserialize)]
pub struct NormalizeCase {
    pub name: String,
    pub input: String,
    pub expect: Vec<String>,
}

impl Conformance for NormalizeFixture {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self) -> Vec<CaseResult> {
        self.cases
            .iter()
            .map(|case| {
                let actual = normalize(&case.input).into_vec();
                CaseResult {
                    case_name: case.name.clone(),
                    passed: actual == case.expect,
                    expected: format!("{:?}", case.expect),
                    actual: format!("{actual:?}"),
                }
            })
            .collect()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Applies
// ═══════════════════════════════════════════════════════════════════════════════

/// One source evaluated against many pages.
#[derive(Debug, Deserialize)]
pub struct AppliesFixture {
    pub name: String,
    pub description: String,
    pub source: String,
    #[serde(default)]
    pub user_matches: String,
    #[serde(default)]
    pub user_exclude_matches: String,
    #[serde(default)]
    pub global_excludes: Vec<String>,
    pub cases: Vec<AppliesCase>,
}

#[derive(Debug, Deserialize)]
pub struct AppliesCase {
    pub name: String,
    pub urls: Vec<String>,
    pub expect: bool,
    /// Kebab-case step expected to decide, or absent for the fallback.
    #[serde(default)]
    pub decided_by: Option<String>,
}

impl Conformance for AppliesFixture {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self) -> Vec<CaseResult> {
        let Some(descriptor) = parse(&self.source, &self.user_matches, &self.user_exclude_matches)
        else {
            return vec![CaseResult {
                case_name: "<parse>".into(),
                passed: false,
                expected: "descriptor".into(),
                actual: "none".into(),
            }];
        };

        self.cases
            .iter()
            .map(|case| {
                let mut page = Page::from_urls(case.urls.iter().cloned());
                for pattern in &self.global_excludes {
                    page = page.exclude(pattern.clone());
                }
                let trace = page.trace(&descriptor);
                let step = trace.decided_by().map(|s| s.as_str().to_owned());
                let step_ok = case.decided_by.is_none() || case.decided_by == step;
                CaseResult {
                    case_name: case.name.clone(),
                    passed: trace.result == case.expect
                        && step_ok
                        && page.applies(&descriptor) == trace.result,
                    expected: format!("{} ({:?})", case.expect, case.decided_by),
                    actual: format!("{} ({step:?})", trace.result),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_fixture_compares_listed_fields_only() {
        let yaml = r#"
name: smoke
description: listed fields only
cases:
  - name: name and matches
    source: "// ==UserScript==\n// @name x\n// @match *://a.com/*\n// ==/UserScript=="
    expect:
      name: x
      matches: ["*://a.com/*"]
      version: null
  - name: unfenced
    source: "no fence"
    expect: null
"#;
        let fixtures: Vec<ParseFixture> = from_yaml_multi(yaml).unwrap();
        assert_eq!(fixtures.len(), 1);
        fixtures[0].run_and_assert();
    }

    #[test]
    fn applies_fixture_checks_deciding_step() {
        let yaml = r#"
name: smoke
description: exclude wins
source: "// ==UserScript==\n// @name x\n// @match *://a.com/*\n// ==/UserScript=="
global_excludes: ["*://a.com/admin/*"]
cases:
  - name: plain
    urls: ["https://a.com/"]
    expect: true
  - name: excluded
    urls: ["https://a.com/admin/"]
    expect: false
    decided_by: global-exclude
"#;
        let fixtures: Vec<AppliesFixture> = from_yaml_multi(yaml).unwrap();
        fixtures[0].run_and_assert();
    }

    #[test]
    fn failing_case_is_reported() {
        let yaml = r#"
name: wrong
description: deliberately wrong
cases:
  - name: fan-out
    input: "*://a.com/*"
    expect: ["*://b.com/*"]
"#;
        let fixtures: Vec<NormalizeFixture> = from_yaml_multi(yaml).unwrap();
        let results = fixtures[0].run();
        assert!(!results[0].passed);
    }
}
