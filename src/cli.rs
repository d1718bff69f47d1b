//! Command handler functions for the covmap CLI.
//!
//! Each `cmd_*` function returns its output as a `String`, making them easy
//! to test without capturing stdout.

use std::fmt::Write;
use std::path::Path;

use anyhow::{Context, Result};

use crate::aggregate::{AggregateOptions, LinePolicy};
use crate::config::{Scope, Settings};
use crate::model::{CoverageState, TestCoverage};
use crate::{collect, instrument, report, store};

pub fn cmd_instrument(root: &Path, settings_id: &str) -> Result<String> {
    let settings = Settings::load(root)?;
    let provider = settings.provider(settings_id)?;
    let scope = Scope::new(root, settings_id)?;

    let summary = instrument::run(root, provider, &scope)?;
    Ok(format!(
        "Instrumented {} assemblies ({} sources, {} tests) → {} files, {} sequences in {}\n",
        summary.assemblies,
        summary.sources,
        summary.tests,
        summary.instrumented_files,
        summary.sequences,
        scope.probe_map_path().display(),
    ))
}

pub fn cmd_collect(
    root: &Path,
    settings_id: &str,
    line_policy: Option<LinePolicy>,
    path_root: Option<&str>,
) -> Result<String> {
    let settings = Settings::load(root)?;
    let provider = settings.provider(settings_id)?;
    let scope = Scope::new(root, settings_id)?;

    let options = AggregateOptions {
        line_policy: line_policy.unwrap_or(provider.line_policy),
        path_root: path_root.map(str::to_string),
    };
    let summary = collect::run(&scope, &options)?;
    Ok(format!(
        "Collected {} hit records → {} tests across {} files (line policy: {}) in {}\n",
        summary.hit_records,
        summary.tests,
        summary.files,
        options.line_policy,
        summary.state_path.display(),
    ))
}

/// Load the persisted state for a settings id.
pub fn load_state(root: &Path, settings_id: &str) -> Result<CoverageState> {
    let scope = Scope::new(root, settings_id)?;
    let state = store::load(&scope.state_path())?;
    Ok(state)
}

fn find_test<'a>(state: &'a CoverageState, test: &str) -> Result<&'a TestCoverage> {
    state
        .test(test)
        .with_context(|| format!("No coverage recorded for test '{test}'"))
}

pub fn cmd_tests(state: &CoverageState) -> Result<String> {
    if state.tests.is_empty() {
        return Ok("No tests in coverage state.\n".to_string());
    }

    let mut out = String::new();
    writeln!(out, "{:<70} {:>6} {:>8}", "TEST", "FILES", "LINES")?;
    writeln!(out, "{}", "-".repeat(86))?;
    for test in state.tests.values() {
        writeln!(
            out,
            "{:<70} {:>6} {:>8}",
            test.name,
            test.files.len(),
            test.line_count()
        )?;
    }
    writeln!(
        out,
        "{} tests, {} files, line policy: {}",
        state.tests.len(),
        state.file_count(),
        state.line_policy
    )?;
    Ok(out)
}

pub fn cmd_files(state: &CoverageState, test: &str) -> Result<String> {
    let coverage = find_test(state, test)?;

    let mut out = String::new();
    writeln!(out, "{:<70} {:>8}", "FILE", "LINES")?;
    writeln!(out, "{}", "-".repeat(79))?;
    for file in coverage.files.values() {
        writeln!(out, "{:<70} {:>8}", file.path, file.lines.len())?;
    }
    Ok(out)
}

pub fn cmd_lines(state: &CoverageState, test: &str, source_file: &str) -> Result<String> {
    let coverage = find_test(state, test)?;
    let key = crate::paths::normalize(source_file);
    let file = coverage
        .files
        .get(&key)
        .with_context(|| format!("Test '{test}' did not touch '{key}'"))?;

    if file.lines.is_empty() {
        return Ok(format!(
            "Test '{test}' reached '{key}' but executed no lines\n"
        ));
    }

    let lines: Vec<u32> = file.lines.iter().copied().collect();
    let mut out = String::new();
    writeln!(out, "Lines of '{key}' covered by '{test}':")?;
    writeln!(out, "  {}", report::format_line_ranges(&lines))?;
    writeln!(out, "  ({} lines, line policy: {})", lines.len(), state.line_policy)?;
    Ok(out)
}
