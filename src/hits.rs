//! Hit log reader.
//!
//! A hit log is any `*.hits` file below the scope's hit directory. Each file
//! holds zero or more JSON hit records separated by whitespace (one per line in
//! practice). Records are deduplicated by full value, since redundant
//! collectors can write byte-identical observations into different files.
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{CovmapError, Result};
use crate::model::{HitRecord, ProbeId};
use crate::paths;

/// File extension of hit logs.
pub const HIT_LOG_EXTENSION: &str = "hits";

/// Deduplicated hit records, indexed by the probes they mention.
#[derive(Debug, Clone, Default)]
pub struct HitIndex {
    records: Vec<HitRecord>,
    by_probe: HashMap<ProbeId, Vec<usize>>,
}

impl HitIndex {
    /// Build an index from records, collapsing duplicates.
    pub fn from_records(records: impl IntoIterator<Item = HitRecord>) -> Self {
        let unique: BTreeSet<HitRecord> = records.into_iter().collect();
        let records: Vec<HitRecord> = unique.into_iter().collect();

        let mut by_probe: HashMap<ProbeId, Vec<usize>> = HashMap::new();
        for (idx, record) in records.iter().enumerate() {
            for probe in record.hits.keys() {
                by_probe.entry(probe.clone()).or_default().push(idx);
            }
        }

        Self { records, by_probe }
    }

    /// Read every hit log under `dir`, recursively.
    ///
    /// A missing directory means no test has run yet and yields an empty
    /// index. Any unreadable or corrupt file fails the whole read.
    pub fn read_dir(dir: &Path) -> Result<Self> {
        if !dir.exists() {
            info!(dir = %dir.display(), "no hit directory, assuming no tests ran");
            return Ok(Self::default());
        }

        let files = hit_log_files(dir)?;
        let parsed = read_files(&files);

        let mut records = Vec::new();
        for (path, result) in files.iter().zip(parsed) {
            let file_records = result?;
            debug!(path = %path.display(), records = file_records.len(), "read hit log");
            records.extend(file_records);
        }

        let index = Self::from_records(records);
        info!(
            files = files.len(),
            records = index.len(),
            "loaded hit records"
        );
        Ok(index)
    }

    /// Every record mentioning `probe`, whatever its count.
    pub fn records_for_probe<'a>(&'a self, probe: &ProbeId) -> impl Iterator<Item = &'a HitRecord> + 'a {
        self.by_probe
            .get(probe)
            .map(|idxs| idxs.as_slice())
            .unwrap_or_default()
            .iter()
            .map(|&idx| &self.records[idx])
    }

    /// Recorded count for `probe` in `record`, 0 when absent.
    pub fn hit_count(record: &HitRecord, probe: &ProbeId) -> u64 {
        record.hit_count(probe)
    }

    /// Distinct probe ids mentioned by any record.
    pub fn probe_ids(&self) -> impl Iterator<Item = &ProbeId> {
        self.by_probe.keys()
    }

    pub fn records(&self) -> &[HitRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Parse the records in one hit log's contents.
pub fn parse(input: &[u8]) -> std::result::Result<Vec<HitRecord>, serde_json::Error> {
    serde_json::Deserializer::from_slice(input)
        .into_iter::<HitRecord>()
        .collect()
}

/// Read and parse a single hit log file.
pub fn read_file(path: &Path) -> Result<Vec<HitRecord>> {
    let content = std::fs::read(path)?;
    parse(&content).map_err(|source| CovmapError::HitLog {
        path: path.to_path_buf(),
        source,
    })
}

/// All hit log files below `dir`, sorted by path.
fn hit_log_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let pattern = format!(
        "{}/**/*.{}",
        paths::glob_prefix(dir)?,
        HIT_LOG_EXTENSION
    );

    let mut files = Vec::new();
    for entry in glob::glob(&pattern)? {
        let path = entry.map_err(|e| e.into_error())?;
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Parse files on scoped worker threads. Results come back in input order so
/// the caller can merge them and report the first failure deterministically.
fn read_files(files: &[PathBuf]) -> Vec<Result<Vec<HitRecord>>> {
    let workers = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(files.len().max(1));
    if workers <= 1 {
        return files.iter().map(|path| read_file(path)).collect();
    }

    let chunk_size = files.len().div_ceil(workers);
    std::thread::scope(|scope| {
        let handles: Vec<_> = files
            .chunks(chunk_size)
            .map(|chunk| {
                scope.spawn(move || chunk.iter().map(|path| read_file(path)).collect::<Vec<_>>())
            })
            .collect();

        handles
            .into_iter()
            .flat_map(|handle| match handle.join() {
                Ok(results) => results,
                Err(panic) => std::panic::resume_unwind(panic),
            })
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json_lines() {
        let input = br#"{"testIdentity": "A.one", "hits": {"1": 2}}
{"testIdentity": "A.two", "hits": {"1": 0, "2": 5}}
"#;
        let records = parse(input).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].test_identity, "A.two");
        assert_eq!(records[1].hit_count(&ProbeId::from("2")), 5);
    }

    #[test]
    fn test_parse_empty_input() {
        assert!(parse(b"").unwrap().is_empty());
        assert!(parse(b"  \n\n").unwrap().is_empty());
    }

    #[test]
    fn test_parse_truncated_record_fails() {
        let input = br#"{"testIdentity": "A.one", "hits": {"1": 2}}
{"testIdentity": "A.two", "hits": {"1":"#;
        assert!(parse(input).is_err());
    }

    #[test]
    fn test_parse_negative_count_fails() {
        assert!(parse(br#"{"testIdentity": "A.one", "hits": {"1": -1}}"#).is_err());
    }

    #[test]
    fn test_index_deduplicates_identical_records() {
        let records = parse(
            br#"{"testIdentity": "A.one", "hits": {"1": 2}}
{"testIdentity": "A.one", "hits": {"1": 2}}
{"testIdentity": "A.one", "hits": {"1": 3}}"#,
        )
        .unwrap();
        let index = HitIndex::from_records(records);
        assert_eq!(index.len(), 2);
        assert_eq!(index.records_for_probe(&ProbeId::from("1")).count(), 2);
    }

    #[test]
    fn test_records_for_probe_includes_zero_counts() {
        let index = HitIndex::from_records(
            parse(
                br#"{"testIdentity": "A.one", "hits": {"1": 0}}
{"testIdentity": "A.two", "hits": {"2": 4}}"#,
            )
            .unwrap(),
        );

        let one: Vec<_> = index.records_for_probe(&ProbeId::from("1")).collect();
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].test_identity, "A.one");
        assert_eq!(HitIndex::hit_count(one[0], &ProbeId::from("1")), 0);
        assert_eq!(HitIndex::hit_count(one[0], &ProbeId::from("2")), 0);

        assert_eq!(index.records_for_probe(&ProbeId::from("3")).count(), 0);
        assert_eq!(index.probe_ids().count(), 2);
    }

    #[test]
    fn test_read_dir_missing_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let index = HitIndex::read_dir(&dir.path().join("hits")).unwrap();
        assert!(index.is_empty());
    }

    #[test]
    fn test_read_dir_recurses_and_skips_other_files() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(
            dir.path().join("1.hits"),
            r#"{"testIdentity": "A.one", "hits": {"1": 1}}"#,
        )
        .unwrap();
        std::fs::write(
            nested.join("2.hits"),
            r#"{"testIdentity": "A.two", "hits": {"1": 1}}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "not a hit log").unwrap();

        let index = HitIndex::read_dir(dir.path()).unwrap();
        assert_eq!(index.len(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn test_read_dir_non_utf8_path_fails() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempfile::tempdir().unwrap();
        let hits = dir.path().join(OsStr::from_bytes(b"hits-\xff"));
        std::fs::create_dir_all(&hits).unwrap();
        std::fs::write(
            hits.join("1.hits"),
            r#"{"testIdentity": "A.one", "hits": {"1": 1}}"#,
        )
        .unwrap();

        let err = HitIndex::read_dir(&hits).unwrap_err();
        assert!(matches!(err, CovmapError::NonUtf8Path(_)));
    }

    #[test]
    fn test_read_dir_corrupt_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("good.hits"),
            r#"{"testIdentity": "A.one", "hits": {"1": 1}}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("bad.hits"), "{ not json").unwrap();

        let err = HitIndex::read_dir(dir.path()).unwrap_err();
        assert!(matches!(err, CovmapError::HitLog { ref path, .. } if path.ends_with("bad.hits")));
    }
}
