//! The coverage aggregator: joins the static probe map with the deduplicated
//! hit records into a per-test, per-file line set.
//!
//! For every `(file, sequence)` pair, each hit record that mentions the
//! sequence's probe associates its test with the file. Records with a positive
//! count for the probe also add the sequence's line range; zero-count records
//! only create the association. All insertions are set unions, so the result
//! does not depend on the order of files, sequences or records.

use std::collections::HashSet;
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::hits::HitIndex;
use crate::model::{CoverageState, ProbeMap, Sequence};
use crate::paths;

/// How a sequence's `[start_line, end_line]` maps to covered lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LinePolicy {
    /// One extra line on each side, clamped at zero. Some producers report
    /// probe boundaries one line off from the originating statement.
    #[default]
    Padded,
    /// Exactly the probe's own range.
    Exact,
}

impl LinePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinePolicy::Padded => "padded",
            LinePolicy::Exact => "exact",
        }
    }

    /// Covered line numbers for a sequence under this policy.
    pub fn lines(&self, sequence: &Sequence) -> RangeInclusive<u32> {
        match self {
            LinePolicy::Padded => {
                sequence.start_line.saturating_sub(1)..=sequence.end_line.saturating_add(1)
            }
            LinePolicy::Exact => sequence.start_line..=sequence.end_line,
        }
    }
}

impl std::fmt::Display for LinePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Knobs for one aggregation run.
#[derive(Debug, Clone, Default)]
pub struct AggregateOptions {
    pub line_policy: LinePolicy,
    /// Root to join relative probe-map paths against before normalizing.
    pub path_root: Option<String>,
}

/// Build the coverage state for `probe_map` from `hits`.
///
/// Hit records that only reference probes absent from the map contribute
/// nothing; they are leftovers from an earlier instrumentation.
pub fn aggregate(probe_map: &ProbeMap, hits: &HitIndex, options: &AggregateOptions) -> CoverageState {
    let known: HashSet<_> = probe_map.sequences().map(|(_, seq)| &seq.probe_id).collect();
    let stale = hits.probe_ids().filter(|id| !known.contains(id)).count();
    if stale > 0 {
        debug!(stale, "ignoring hits for probes absent from the probe map");
    }

    probe_map.source_files.iter().fold(
        CoverageState::new(options.line_policy),
        |mut state, file| {
            let path = paths::resolve(options.path_root.as_deref(), &file.path);
            debug!(path = %path, sequences = file.sequences.len(), "collecting coverage");

            for sequence in &file.sequences {
                record_sequence(&mut state, &path, sequence, hits, options.line_policy);
            }
            state
        },
    )
}

/// Fold one sequence into the accumulator.
fn record_sequence(
    state: &mut CoverageState,
    path: &str,
    sequence: &Sequence,
    hits: &HitIndex,
    policy: LinePolicy,
) {
    for record in hits.records_for_probe(&sequence.probe_id) {
        let file = state.test_mut(&record.test_identity).file_mut(path);
        if record.hit_count(&sequence.probe_id) > 0 {
            file.lines.extend(policy.lines(sequence));
        }
    }
}
