#![allow(dead_code)]

use std::path::Path;

use covmap::config::{Scope, SETTINGS_DIR};
use tempfile::TempDir;

pub const PROBE_MAP: &str = include_str!("../fixtures/coverage.json");
pub const WORKER_A_HITS: &str = include_str!("../fixtures/hits/worker-a/run.hits");
pub const WORKER_B_HITS: &str = include_str!("../fixtures/hits/worker-b/run.hits");

/// Create a temporary project root with a `dotnet` provider, returning the
/// dir handle and its scope. The caller must hold onto `TempDir` to keep the
/// temp directory alive.
pub fn setup_scope() -> (TempDir, Scope) {
    let dir = tempfile::tempdir().unwrap();
    let covmap = dir.path().join(SETTINGS_DIR);
    std::fs::create_dir_all(&covmap).unwrap();
    std::fs::write(
        covmap.join("settings.json"),
        r#"{"providers": [{"id": "dotnet", "workingDirectory": "src"}]}"#,
    )
    .unwrap();

    let scope = Scope::new(dir.path(), "dotnet").unwrap();
    std::fs::create_dir_all(scope.dir()).unwrap();
    (dir, scope)
}

/// Same as [`setup_scope`], with the fixture probe map and both worker logs.
pub fn setup_fixture_scope() -> (TempDir, Scope) {
    let (dir, scope) = setup_scope();
    write_probe_map(&scope, PROBE_MAP);
    write_hits(&scope, "worker-a/run.hits", WORKER_A_HITS);
    write_hits(&scope, "worker-b/run.hits", WORKER_B_HITS);
    (dir, scope)
}

pub fn write_probe_map(scope: &Scope, json: &str) {
    std::fs::write(scope.probe_map_path(), json).unwrap();
}

pub fn write_hits(scope: &Scope, relative: &str, contents: &str) {
    let path = scope.hits_dir().join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
}

pub fn lines(state: &covmap::model::CoverageState, test: &str, path: &str) -> Vec<u32> {
    state.tests[test].files[path].lines.iter().copied().collect()
}

pub fn read(path: &Path) -> Vec<u8> {
    std::fs::read(path).unwrap()
}
