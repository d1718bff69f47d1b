//! Glob-based file discovery for the instrumenter request.
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};

use crate::config::FileSet;
use crate::error::Result;
use crate::paths;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Files under `root` matching any include pattern and no exclude pattern.
/// Patterns are relative to `root`; results are sorted absolute-or-joined
/// paths without duplicates.
pub fn discover(root: &Path, set: &FileSet) -> Result<Vec<PathBuf>> {
    let excludes = set
        .exclude
        .iter()
        .map(|p| Pattern::new(p))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let escaped_root = paths::glob_prefix(root)?;
    let mut found = BTreeSet::new();
    for include in &set.include {
        let pattern = format!("{}/{}", escaped_root, include.trim_start_matches("./"));
        for entry in glob::glob_with(&pattern, MATCH_OPTIONS)? {
            let path = entry.map_err(|e| e.into_error())?;
            if !path.is_file() {
                continue;
            }
            let relative = relative_key(root, &path);
            if !excludes.iter().any(|ex| ex.matches_with(&relative, MATCH_OPTIONS)) {
                found.insert(path);
            }
        }
    }
    Ok(found.into_iter().collect())
}

/// Forward-slash path of `path` relative to `root`, for exclude matching.
fn relative_key(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    paths::normalize(&relative.to_string_lossy())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, "").unwrap();
    }

    fn names(root: &Path, found: &[PathBuf]) -> Vec<String> {
        found.iter().map(|p| relative_key(root, p)).collect()
    }

    #[test]
    fn test_include_and_exclude() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(root, "src/App/Foo.cs");
        touch(root, "src/App/obj/Gen.cs");
        touch(root, "tests/FooTests.cs");
        touch(root, "src/App.Tests/BarTests.cs");
        touch(root, "README.md");

        let set = FileSet {
            include: vec!["**/*.cs".to_string()],
            exclude: vec![
                "**/obj/**/*.cs".to_string(),
                "tests/**/*.cs".to_string(),
                "**/*.Tests/**/*.cs".to_string(),
            ],
        };
        let found = discover(root, &set).unwrap();

        assert_eq!(names(root, &found), vec!["src/App/Foo.cs"]);
    }

    #[test]
    fn test_overlapping_includes_do_not_duplicate() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(root, "tests/a.cs");
        touch(root, "tests/unit/b.cs");

        let set = FileSet {
            include: vec!["tests/**/*.cs".to_string(), "./**/*.cs".to_string()],
            exclude: vec![],
        };
        let found = discover(root, &set).unwrap();

        assert_eq!(names(root, &found), vec!["tests/a.cs", "tests/unit/b.cs"]);
    }

    #[test]
    fn test_invalid_pattern() {
        let dir = tempfile::tempdir().unwrap();
        let set = FileSet {
            include: vec!["**/*.cs".to_string()],
            exclude: vec!["[".to_string()],
        };
        assert!(discover(dir.path(), &set).is_err());
    }
}
