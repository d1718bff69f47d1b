//! Canonical path keys.
//!
//! Probe maps may come from a Windows producer while the state is consumed on
//! a Unix machine (or the other way around), so every path key is normalized
//! to forward slashes with `.` and `..` segments folded lexically. Nothing here
//! touches the filesystem.
use std::path::Path;

use glob::Pattern;

use crate::error::{CovmapError, Result};

/// Normalize a producer path to its canonical forward-slash form.
///
/// `a\b\c.ext`, `a/b/c.ext` and `./a//b/../b/c.ext` all become `a/b/c.ext`.
pub fn normalize(path: &str) -> String {
    let unified = path.replace('\\', "/");
    let (prefix, rest) = split_root(&unified);

    let mut segments: Vec<&str> = Vec::new();
    for segment in rest.split('/') {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                Some(&last) if last != ".." => {
                    segments.pop();
                }
                // Cannot climb above an absolute root.
                _ if !prefix.is_empty() => {}
                _ => segments.push(".."),
            },
            other => segments.push(other),
        }
    }

    let joined = segments.join("/");
    if prefix.is_empty() && joined.is_empty() {
        ".".to_string()
    } else {
        format!("{prefix}{joined}")
    }
}

/// Whether a (slash-unified) path is absolute under either convention.
pub fn is_absolute(path: &str) -> bool {
    !split_root(&path.replace('\\', "/")).0.is_empty()
}

/// Resolve a probe-map path against an optional working root, then
/// normalize. Absolute paths ignore the root.
pub fn resolve(root: Option<&str>, path: &str) -> String {
    match root {
        Some(root) if !root.is_empty() && !is_absolute(path) => {
            normalize(&format!("{root}/{path}"))
        }
        _ => normalize(path),
    }
}

/// `dir` escaped for use as the literal prefix of a glob pattern. Lossy
/// conversion would silently match nothing, so non-UTF-8 paths are an error.
pub fn glob_prefix(dir: &Path) -> Result<String> {
    let dir = dir
        .to_str()
        .ok_or_else(|| CovmapError::NonUtf8Path(dir.to_path_buf()))?;
    Ok(Pattern::escape(dir))
}

/// Split a slash-unified path into its root prefix (`/`, `//`, `C:/`, `C:`)
/// and the remainder.
fn split_root(path: &str) -> (&str, &str) {
    let bytes = path.as_bytes();
    if path.starts_with("//") {
        return path.split_at(2);
    }
    if path.starts_with('/') {
        return path.split_at(1);
    }
    if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        if bytes.len() >= 3 && bytes[2] == b'/' {
            return path.split_at(3);
        }
        return path.split_at(2);
    }
    ("", path)
}
