//! Registration payloads built from descriptors.
//!
//! One descriptor yields one payload, except a sectioned style which yields
//! one payload per `@-moz-document` section under `name + "style" + i`.
//!
//! Source order: bundled library files (declared order), fetched remote
//! requires (declared order, failures omitted), then the script or CSS itself.
//! Only `lib/` aliases are injected as files; other pass-through requires are
//! skipped. A style's `https://` requires are fetched like a script's remote
//! requires and precede the CSS of every section.

use futures::future::join_all;
use serde::Serialize;

use usm::{defang, RunAt, ScriptDescriptor, LOCAL_LIBRARY_PREFIX};

use crate::{FetchError, Fetcher};

/// What the registration injects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    Js,
    Css,
}

/// One injected source segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// Bundled file, referenced by path.
    File(String),
    /// Inline code.
    Code(String),
}

/// Everything the registration service needs for one registration.
///
/// List fields that end up empty are `None`, so they are absent on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationPayload {
    pub id: String,
    pub target: Target,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matches: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclude_matches: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_globs: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclude_globs: Option<Vec<String>>,
    pub match_about_blank: bool,
    pub all_frames: bool,
    pub run_at: RunAt,
    pub sources: Vec<Source>,
}

/// Payloads for one descriptor plus the remote fetches that failed.
#[derive(Debug, Default)]
pub struct Built {
    pub payloads: Vec<RegistrationPayload>,
    pub fetch_failures: Vec<FetchError>,
}

fn non_empty(values: Vec<String>) -> Option<Vec<String>> {
    (!values.is_empty()).then_some(values)
}

fn concat<'a>(parts: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for part in parts {
        if !out.iter().any(|p| p == part) {
            out.push(part.to_owned());
        }
    }
    out
}

/// Fetch every remote require concurrently, keeping declared order.
async fn fetch_remote(urls: &[String], fetcher: &dyn Fetcher) -> (Vec<Source>, Vec<FetchError>) {
    let results = join_all(urls.iter().map(|url| fetcher.fetch(url))).await;
    let mut sources = Vec::with_capacity(results.len());
    let mut failures = Vec::new();
    for result in results {
        match result {
            Ok(text) => sources.push(Source::Code(text)),
            Err(e) => {
                tracing::warn!(error = %e, "omitting remote require");
                failures.push(e);
            }
        }
    }
    (sources, failures)
}

/// Resolve the requires of `d` into the sources that precede its own code.
async fn require_sources(
    d: &ScriptDescriptor,
    fetcher: &dyn Fetcher,
) -> (Vec<Source>, Vec<FetchError>) {
    let mut files = Vec::new();
    let mut remote: Vec<String> = Vec::new();
    for value in &d.require {
        if value.starts_with(LOCAL_LIBRARY_PREFIX) {
            files.push(Source::File(value.clone()));
        } else if !d.is_script() && value.starts_with("https://") {
            remote.push(value.clone());
        } else {
            tracing::debug!(name = %d.name, require = %value, "skipping unbundled require");
        }
    }
    remote.extend(d.require_remote.iter().cloned());

    let (fetched, failures) = fetch_remote(&remote, fetcher).await;
    files.extend(fetched);
    (files, failures)
}

/// Build the payloads for `descriptor`.
///
/// `global_excludes` are appended to every payload's `exclude_matches`; the
/// user overrides are appended to `matches` / `exclude_matches`.
pub async fn build(
    descriptor: &ScriptDescriptor,
    global_excludes: &[String],
    fetcher: &dyn Fetcher,
) -> Built {
    let d = descriptor;
    let exclude_matches = non_empty(concat(
        d.exclude_matches
            .iter()
            .map(String::as_str)
            .chain(global_excludes.iter().map(String::as_str))
            .chain(d.user_exclude_list()),
    ));

    let base = |id: String, target: Target, matches: Vec<String>, sources: Vec<Source>| {
        RegistrationPayload {
            id,
            target,
            matches: non_empty(matches),
            exclude_matches: exclude_matches.clone(),
            include_globs: non_empty(d.include_globs.clone()),
            exclude_globs: non_empty(d.exclude_globs.clone()),
            match_about_blank: d.match_about_blank,
            all_frames: d.all_frames,
            run_at: d.effective_run_at(),
            sources,
        }
    };
    let with_user = |matches: &[String]| {
        concat(matches.iter().map(String::as_str).chain(d.user_match_list()))
    };

    let (required, fetch_failures) = require_sources(d, fetcher).await;
    let with_code = |code: String| {
        let mut sources = required.clone();
        sources.push(Source::Code(code));
        sources
    };

    if !d.is_script() {
        let segments = d.segments();
        let payloads = if segments.is_empty() {
            vec![base(
                d.name.clone(),
                Target::Css,
                with_user(&d.matches),
                with_code(defang(&d.source_text)),
            )]
        } else {
            segments
                .iter()
                .zip(d.registration_keys())
                .map(|(segment, id)| {
                    base(
                        id,
                        Target::Css,
                        with_user(&segment.matches),
                        with_code(segment.css.clone()),
                    )
                })
                .collect()
        };
        return Built {
            payloads,
            fetch_failures,
        };
    }

    let sources = with_code(defang(&d.source_text));

    Built {
        payloads: vec![base(d.name.clone(), Target::Js, with_user(&d.matches), sources)],
        fetch_failures,
    }
}
