//! Conformance tests that run YAML fixtures against usm
//!
//! Run with: cargo test -p usm-test --test conformance

#![cfg(feature = "fixtures")]

use std::fs;
use std::path::{Path, PathBuf};

use usm_test::fixture::{from_yaml_multi, AppliesFixture, Conformance, NormalizeFixture, ParseFixture};

/// Get the conformance directory relative to the workspace root
fn fixtures_dir() -> PathBuf {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");

    // Go up: ext/test -> ext -> workspace root
    let root = Path::new(manifest_dir)
        .parent()
        .and_then(Path::parent)
        .expect("Could not find workspace root");

    root.join("conformance")
}

/// Load and run all fixtures in a directory
fn run_fixtures_in_dir<T: Conformance>(dir: &Path) {
    assert!(dir.exists(), "Fixtures directory does not exist: {}", dir.display());

    let mut count = 0;
    for entry in fs::read_dir(dir).expect("read dir") {
        let path = entry.expect("dir entry").path();

        if path.extension().is_some_and(|e| e == "yaml" || e == "yml") {
            println!("Running fixture: {}", path.display());

            let yaml = fs::read_to_string(&path).expect("read yaml");
            let fixtures: Vec<T> = from_yaml_multi(&yaml).unwrap_or_else(|e| {
                panic!("Failed to parse {}: {}", path.display(), e);
            });

            for fixture in fixtures {
                println!("  Running: {}", fixture.name());
                fixture.run_and_assert();
                count += 1;
            }
        }
    }
    assert!(count > 0, "no fixtures in {}", dir.display());
}

#[test]
fn test_directives() {
    run_fixtures_in_dir::<ParseFixture>(&fixtures_dir().join("01_directives"));
}

#[test]
fn test_tld() {
    run_fixtures_in_dir::<NormalizeFixture>(&fixtures_dir().join("02_tld"));
}

#[test]
fn test_applies() {
    run_fixtures_in_dir::<AppliesFixture>(&fixtures_dir().join("03_applies"));
}
