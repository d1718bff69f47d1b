//! Loading of the probe map artifact written by the instrumenter.
//!
//! Paths are normalized here, once, so every later lookup sees the same
//! forward-slash keys regardless of the producer's platform.
use std::path::Path;

use tracing::info;

use crate::error::{CovmapError, Result};
use crate::model::ProbeMap;
use crate::paths;

/// Load and validate the probe map at `path`. A missing or unparseable map
/// is fatal: there is no partial coverage without it.
pub fn load(path: &Path) -> Result<ProbeMap> {
    let content = match std::fs::read(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(CovmapError::ProbeMapMissing(path.to_path_buf()))
        }
        Err(e) => return Err(e.into()),
    };

    let map = parse(&content).map_err(|err| match err {
        ParseError::Json(source) => CovmapError::ProbeMap {
            path: path.to_path_buf(),
            source,
        },
        ParseError::Invalid(err) => err,
    })?;

    info!(
        path = %path.display(),
        files = map.source_files.len(),
        sequences = map.sequence_count(),
        "loaded probe map"
    );
    Ok(map)
}

/// Failure modes of [`parse`], kept apart so [`load`] can attach the path.
#[derive(Debug)]
pub enum ParseError {
    Json(serde_json::Error),
    Invalid(CovmapError),
}

/// Parse probe map bytes, normalizing paths and checking line ranges.
pub fn parse(input: &[u8]) -> std::result::Result<ProbeMap, ParseError> {
    let mut map: ProbeMap = serde_json::from_slice(input).map_err(ParseError::Json)?;

    for file in &mut map.source_files {
        file.path = paths::normalize(&file.path);
        if let Some(bad) = file.sequences.iter().find(|s| s.start_line > s.end_line) {
            return Err(ParseError::Invalid(CovmapError::InvalidSequence {
                path: file.path.clone(),
                probe: bad.probe_id.clone(),
                start_line: bad.start_line,
                end_line: bad.end_line,
            }));
        }
    }

    Ok(map)
}
