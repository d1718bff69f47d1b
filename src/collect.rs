//! The `collect` operation: probe map and hit logs in, coverage state out.
use std::path::PathBuf;

use tracing::info;

use crate::aggregate::{aggregate, AggregateOptions};
use crate::config::Scope;
use crate::error::Result;
use crate::hits::HitIndex;
use crate::model::CoverageState;
use crate::{probe_map, store};

/// Outcome of a successful `collect` run.
#[derive(Debug, Clone)]
pub struct CollectSummary {
    pub state_path: PathBuf,
    pub hit_records: usize,
    pub tests: usize,
    pub files: usize,
}

/// Build the coverage state for a scope without persisting it.
pub fn build(scope: &Scope, options: &AggregateOptions) -> Result<(CoverageState, usize)> {
    let probe_map = probe_map::load(&scope.probe_map_path())?;
    let hits = HitIndex::read_dir(&scope.hits_dir())?;
    Ok((aggregate(&probe_map, &hits, options), hits.len()))
}

/// Collect coverage for a scope and replace its state artifact. Nothing is
/// written unless every input was read successfully.
pub fn run(scope: &Scope, options: &AggregateOptions) -> Result<CollectSummary> {
    info!(scope = %scope.dir().display(), policy = %options.line_policy, "collecting coverage");

    let (state, hit_records) = build(scope, options)?;
    let state_path = scope.state_path();
    store::save(&state, &state_path)?;

    Ok(CollectSummary {
        state_path,
        hit_records,
        tests: state.tests.len(),
        files: state.file_count(),
    })
}
