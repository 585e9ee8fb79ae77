//! Golden tests for output schema stability.
//!
//! These tests verify that the page map produced for a fixture program
//! matches the expected golden file. Page URLs are the contract between
//! docgraph and the renderers that consume its output.
//!
//! ## Updating Golden Files
//!
//! When making intentional routing changes:
//! ```bash
//! DOCGRAPH_UPDATE_GOLDEN=1 cargo test -p docgraph golden
//! git diff tests/golden/  # Review changes
//! ```

use std::fs;
use std::path::PathBuf;

use serde_json::Value;
use tempfile::TempDir;

use docgraph::cli::{convert_program, list_pages, load_options, load_program, run_route};
use docgraph::serialization::to_json_string;

// ============================================================================
// Test Infrastructure
// ============================================================================

/// Directory containing golden test fixtures.
fn golden_fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("golden")
        .join("fixtures")
}

/// Directory containing expected output files.
fn golden_output_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("golden")
        .join("output")
}

/// Check if golden update mode is enabled.
fn update_mode() -> bool {
    std::env::var("DOCGRAPH_UPDATE_GOLDEN").is_ok()
}

/// Compare two JSON values and return a diff if they don't match.
fn compare_json(expected: &Value, actual: &Value) -> Result<(), String> {
    if expected == actual {
        Ok(())
    } else {
        let expected_str = serde_json::to_string_pretty(expected).unwrap();
        let actual_str = serde_json::to_string_pretty(actual).unwrap();
        Err(format!(
            "JSON mismatch:\n--- expected ---\n{}\n--- actual ---\n{}",
            expected_str, actual_str
        ))
    }
}

/// Compare `actual` against a golden file, or rewrite it in update mode.
fn check_golden(name: &str, actual: &Value) {
    let path = golden_output_dir().join(name);
    if update_mode() {
        fs::create_dir_all(golden_output_dir()).unwrap();
        let mut pretty = serde_json::to_string_pretty(actual).unwrap();
        pretty.push('\n');
        fs::write(&path, pretty).unwrap();
        eprintln!("Updated golden file: {}", path.display());
        return;
    }
    let expected: Value = serde_json::from_str(
        &fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("cannot read golden file {}: {}", path.display(), e)),
    )
    .unwrap();
    if let Err(diff) = compare_json(&expected, actual) {
        panic!(
            "Golden mismatch for {}\n{}\n\nRun with DOCGRAPH_UPDATE_GOLDEN=1 to update.",
            name, diff
        );
    }
}

// ============================================================================
// Golden Tests
// ============================================================================

#[test]
fn golden_pages() {
    let fixtures = golden_fixtures_dir();
    let program = load_program(&fixtures.join("program.json")).unwrap();
    let options = load_options(Some(&fixtures.join("options.json"))).unwrap();

    let result = convert_program(&program, &options).unwrap();
    assert!(result.warnings.is_empty(), "{:?}", result.warnings);
    assert_eq!(result.project.name, "geo");

    let pages = serde_json::to_value(list_pages(&result.project, &options)).unwrap();
    check_golden("pages.json", &pages);
}

#[test]
fn golden_pages_survive_project_reload() {
    let fixtures = golden_fixtures_dir();
    let program = load_program(&fixtures.join("program.json")).unwrap();
    let options = load_options(Some(&fixtures.join("options.json"))).unwrap();
    let result = convert_program(&program, &options).unwrap();

    let temp = TempDir::new().unwrap();
    let project_path = temp.path().join("project.json");
    fs::write(&project_path, to_json_string(&result.project).unwrap()).unwrap();

    let routed = run_route(&project_path, &options).unwrap();
    assert_eq!(routed.pages, list_pages(&result.project, &options));
}
