//! The `instrument` operation.
//!
//! Rewriting binaries is the job of an external instrumenter. This module
//! prepares its input (discovered assemblies, sources and tests), gives it a
//! clean hit directory, runs it, and checks that it left a loadable probe map.
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Serialize;
use tracing::{debug, info};

use crate::config::{Provider, Scope};
use crate::discover::discover;
use crate::error::{CovmapError, Result};
use crate::probe_map;

/// What the external instrumenter is asked to do, written as
/// `instrumentation.json` in the scope directory.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentationRequest {
    pub workdir: PathBuf,
    pub assemblies: Vec<PathBuf>,
    pub sources: Vec<PathBuf>,
    pub tests: Vec<PathBuf>,
    pub hits_path: PathBuf,
    pub probe_map_path: PathBuf,
}

/// Outcome of a successful `instrument` run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentSummary {
    pub assemblies: usize,
    pub sources: usize,
    pub tests: usize,
    pub instrumented_files: usize,
    pub sequences: usize,
}

/// Build the instrumenter request for `provider`, failing when there is
/// nothing to instrument.
pub fn prepare(root: &Path, provider: &Provider, scope: &Scope) -> Result<InstrumentationRequest> {
    let workdir = root.join(&provider.working_directory);

    let assemblies = discover(&workdir, &provider.assemblies)?;
    if assemblies.is_empty() {
        return Err(CovmapError::Validation(format!(
            "No assemblies found from directory {}",
            workdir.display()
        )));
    }

    let sources = discover(&workdir, &provider.sources)?;
    if sources.is_empty() {
        return Err(CovmapError::Validation(format!(
            "No source files found from directory {}",
            workdir.display()
        )));
    }

    let tests = discover(&workdir, &provider.tests)?;

    debug!(files = ?assemblies, "assemblies");
    debug!(files = ?sources, "source files");
    debug!(files = ?tests, "test files");

    Ok(InstrumentationRequest {
        workdir,
        assemblies,
        sources,
        tests,
        hits_path: scope.hits_dir(),
        probe_map_path: scope.probe_map_path(),
    })
}

/// Delete any hit logs from a previous run and recreate the directory.
pub fn reset_hits_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        std::fs::remove_dir_all(dir)?;
    }
    std::fs::create_dir_all(dir)?;
    Ok(())
}

/// Delete the probe map of a previous run so only a freshly written map can
/// satisfy the post-run check.
pub fn remove_probe_map(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Run the full `instrument` operation for `provider`.
pub fn run(root: &Path, provider: &Provider, scope: &Scope) -> Result<InstrumentSummary> {
    let (program, args) = provider.instrument_command.split_first().ok_or_else(|| {
        CovmapError::Validation(format!(
            "Provider {} has no instrumentCommand configured",
            provider.id
        ))
    })?;

    let request = prepare(root, provider, scope)?;
    reset_hits_dir(&request.hits_path)?;
    remove_probe_map(&request.probe_map_path)?;

    let request_path = scope.request_path();
    let json = serde_json::to_vec_pretty(&request).map_err(std::io::Error::from)?;
    std::fs::write(&request_path, json)?;

    info!(
        program = %program,
        workdir = %request.workdir.display(),
        request = %request_path.display(),
        "running instrumenter"
    );
    let output = Command::new(program)
        .args(args)
        .arg(&request_path)
        .current_dir(&request.workdir)
        .env("COVMAP_REQUEST", &request_path)
        .env("COVMAP_PROBE_MAP", &request.probe_map_path)
        .env("COVMAP_HITS_DIR", &request.hits_path)
        .output()
        .map_err(|e| CovmapError::Instrumenter(format!("cannot run {program}: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(CovmapError::Instrumenter(format!(
            "{program} exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }

    let map = probe_map::load(&request.probe_map_path)?;
    info!(path = %request.probe_map_path.display(), "saved probe map");

    Ok(InstrumentSummary {
        assemblies: request.assemblies.len(),
        sources: request.sources.len(),
        tests: request.tests.len(),
        instrumented_files: map.source_files.len(),
        sequences: map.sequence_count(),
    })
}
