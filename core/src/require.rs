//! `@require` resolution
//!
//! Script requires that point at a well-known library on a known CDN (or
//! name the library bare, e.g. `jquery-3`) are rewritten to a bundled local
//! copy under [`LOCAL_LIBRARY_PREFIX`]. Other `https://` URLs are kept for
//! fetching at registration time.

use std::sync::LazyLock;

use regex::Regex;

/// Prefix of bundled library aliases, e.g. `lib/jquery-3.min.js`.
pub const LOCAL_LIBRARY_PREFIX: &str = "lib/";

/// CDN hosts whose URLs are eligible for local-library rewriting.
const CDN_HOSTS: &[&str] = &[
    "ajax.googleapis.com",
    "cdnjs.cloudflare.com",
    "cdn.jsdelivr.net",
    "code.jquery.com",
    "unpkg.com",
    "maxcdn.bootstrapcdn.com",
    "stackpath.bootstrapcdn.com",
    "ajax.aspnetcdn.com",
    "greasyfork.org",
];

/// A bundled library and how to recognize it.
struct Library {
    alias: &'static str,
    /// Matched against the URL path, which always starts with `/`. Every
    /// alternative is anchored on a path segment so plugins named after the
    /// library (`jquery.foo.js`, `bootstrap-4-toggle`) are not mistaken for it.
    path: &'static str,
    /// Exact bare names, e.g. `jquery-3`.
    bare: &'static [&'static str],
}

// Order matters: jquery-ui before jquery, and older jquery majors before the
// plain `jquery.min.js` basename that selects jquery-3.
const LIBRARIES: &[Library] = &[
    Library {
        alias: "lib/jquery-ui-1.min.js",
        path: r"/(?:jquery-ui-1\.|jqueryui/1\.|jquery-ui[/@]1\.|ui/1\.[^/]*/jquery-ui(?:\.min)?\.js$)",
        bare: &["jquery-ui-1", "jquery-ui"],
    },
    Library {
        alias: "lib/jquery-1.min.js",
        path: r"/(?:jquery-1\.|jquery[/@]1\.)",
        bare: &["jquery-1"],
    },
    Library {
        alias: "lib/jquery-2.min.js",
        path: r"/(?:jquery-2\.|jquery[/@]2\.)",
        bare: &["jquery-2"],
    },
    Library {
        alias: "lib/jquery-3.min.js",
        path: r"/(?:jquery-3\.|jquery[/@]3\.|jquery(?:\.min)?\.js$)",
        bare: &["jquery-3", "jquery"],
    },
    Library {
        alias: "lib/bootstrap-4.min.js",
        path: r"/bootstrap[/@]4\.",
        bare: &["bootstrap-4"],
    },
    Library {
        alias: "lib/moment-2.min.js",
        path: r"/(?:moment-2\.|moment\.js/2\.|moment@2\.)",
        bare: &["moment-2"],
    },
    Library {
        alias: "lib/underscore-1.min.js",
        path: r"/(?:underscore-1\.|underscore\.js/1\.|underscore@1\.)",
        bare: &["underscore-1"],
    },
    Library {
        alias: "lib/gm4-polyfill.js",
        path: r"/gm4[-_]polyfill\.js$",
        bare: &["gm4-polyfill", "gm4_polyfill", "gm4-polyfill.js"],
    },
];

static LIBRARY_PATHS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    LIBRARIES
        .iter()
        .map(|lib| {
            let re = Regex::new(lib.path).expect("library path regex is valid");
            (lib.alias, re)
        })
        .collect()
});

/// Where a `@require` value ends up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Require {
    /// Bundled library alias (or a pass-through value), goes to `require`.
    Local(String),
    /// Fetched at registration time, goes to `require_remote`.
    Remote(String),
    /// Dropped.
    Rejected,
}

/// Lower-case and upgrade the scheme: `//x` and `http://x` become `https://x`.
#[must_use]
pub fn normalize_scheme(value: &str) -> String {
    let lower = value.trim().to_lowercase();
    if let Some(rest) = lower.strip_prefix("http://") {
        format!("https://{rest}")
    } else if let Some(rest) = lower.strip_prefix("//") {
        format!("https://{rest}")
    } else {
        lower
    }
}

/// Split an `https://` URL into host and path (query and fragment dropped).
fn split_url(url: &str) -> Option<(&str, &str)> {
    let rest = url.strip_prefix("https://")?;
    let rest = rest.split(['?', '#']).next().unwrap_or(rest);
    Some(match rest.find('/') {
        Some(i) => rest.split_at(i),
        None => (rest, "/"),
    })
}

fn library_for_path(path: &str) -> Option<&'static str> {
    LIBRARY_PATHS
        .iter()
        .find(|(_, re)| re.is_match(path))
        .map(|(alias, _)| *alias)
}

fn library_for_name(name: &str) -> Option<&'static str> {
    LIBRARIES
        .iter()
        .find(|lib| lib.bare.contains(&name))
        .map(|lib| lib.alias)
}

/// Resolve one `@require` value.
///
/// Only scripts get library rewriting and remote splitting; style requires
/// pass through after scheme normalization.
#[must_use]
pub fn resolve(value: &str, is_script: bool) -> Require {
    let url = normalize_scheme(value);
    if url.is_empty() {
        return Require::Rejected;
    }
    if !is_script {
        return Require::Local(url);
    }
    if url.starts_with(LOCAL_LIBRARY_PREFIX) {
        return Require::Rejected;
    }

    match split_url(&url) {
        Some((host, path)) => {
            if CDN_HOSTS.contains(&host) {
                if let Some(alias) = library_for_path(path) {
                    return Require::Local(alias.to_owned());
                }
            }
            Require::Remote(url)
        }
        // Bare names such as `jquery-3` or `gm4-polyfill`.
        None => match library_for_name(&url) {
            Some(alias) => Require::Local(alias.to_owned()),
            None => Require::Local(url),
        },
    }
}
