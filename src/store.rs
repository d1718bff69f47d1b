//! Persistence of the coverage state artifact.
//!
//! The artifact is written only once the full state is built, through a
//! temporary file in the target directory that is renamed into place. A
//! failed run therefore leaves the previous artifact untouched.
use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::info;

use crate::error::{CovmapError, Result};
use crate::model::CoverageState;

/// Serialize `state` to its artifact bytes. Tests, files and lines come out
/// sorted, so equal states always produce identical bytes.
pub fn to_vec(state: &CoverageState) -> Result<Vec<u8>> {
    let mut out = serde_json::to_vec(state).map_err(std::io::Error::from)?;
    out.push(b'\n');
    Ok(out)
}

/// Atomically replace the artifact at `path` with `state`.
pub fn save(state: &CoverageState, path: &Path) -> Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let bytes = to_vec(state)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(&bytes)?;
    tmp.as_file().sync_all()?;
    // Dropping the returned temp file removes it.
    tmp.persist(path).map_err(|e| CovmapError::Persist {
        path: path.to_path_buf(),
        source: e.error,
    })?;

    info!(
        path = %path.display(),
        tests = state.tests.len(),
        bytes = bytes.len(),
        "saved coverage state"
    );
    Ok(())
}

/// Load a previously saved artifact.
pub fn load(path: &Path) -> Result<CoverageState> {
    let content = match std::fs::read(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(CovmapError::StateMissing(path.to_path_buf()))
        }
        Err(e) => return Err(e.into()),
    };
    serde_json::from_slice(&content).map_err(|source| CovmapError::State {
        path: path.to_path_buf(),
        source,
    })
}
