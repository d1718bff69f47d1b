//! In-memory representation of the three artifacts covmap deals with: the
//! static probe map written by the instrumenter, the hit records written at
//! test run time, and the aggregated per-test coverage state.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::aggregate::LinePolicy;

/// Opaque instrumentation probe identifier.
///
/// Compared by exact equality only. Producers that emit numeric ids get their
/// decimal string form, so `7` and `"7"` name the same probe.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ProbeId(String);

impl ProbeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProbeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProbeId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl<'de> Deserialize<'de> for ProbeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Unsigned(u64),
            Signed(i64),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(s) => ProbeId(s),
            Raw::Unsigned(n) => ProbeId(n.to_string()),
            Raw::Signed(n) => ProbeId(n.to_string()),
        })
    }
}

// ---------------------------------------------------------------------------
// Probe map
// ---------------------------------------------------------------------------

/// A contiguous instrumented region of a source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sequence {
    #[serde(alias = "hitId")]
    pub probe_id: ProbeId,
    pub start_line: u32,
    pub end_line: u32,
}

/// One instrumented file and its sequences, in producer order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceFile {
    pub path: String,
    #[serde(default)]
    pub sequences: Vec<Sequence>,
}

/// Static map of source regions to probes, as produced by the instrumenter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeMap {
    #[serde(default)]
    pub source_files: Vec<SourceFile>,
}

impl ProbeMap {
    /// Every `(file, sequence)` pair in map order.
    pub fn sequences(&self) -> impl Iterator<Item = (&SourceFile, &Sequence)> {
        self.source_files
            .iter()
            .flat_map(|file| file.sequences.iter().map(move |seq| (file, seq)))
    }

    pub fn sequence_count(&self) -> usize {
        self.source_files.iter().map(|f| f.sequences.len()).sum()
    }
}

// ---------------------------------------------------------------------------
// Hit records
// ---------------------------------------------------------------------------

/// One runtime observation: the probes a single test fired, with counts.
///
/// Equality and hashing cover the identity and the complete hit map, so two
/// byte-identical records from redundant log files are the same value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawHitRecord")]
pub struct HitRecord {
    pub test_identity: String,
    pub hits: BTreeMap<ProbeId, u64>,
}

impl HitRecord {
    pub fn new(test_identity: impl Into<String>, hits: BTreeMap<ProbeId, u64>) -> Self {
        Self {
            test_identity: test_identity.into(),
            hits,
        }
    }

    /// Recorded hit count for `probe`, or 0 when the record has no entry.
    pub fn hit_count(&self, probe: &ProbeId) -> u64 {
        self.hits.get(probe).copied().unwrap_or(0)
    }
}

/// Wire shape of a hit record. Runtimes either send the identity directly or
/// split it into the containing type and method name.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawHitRecord {
    test_identity: Option<String>,
    class_name: Option<String>,
    method_name: Option<String>,
    #[serde(default)]
    hits: BTreeMap<ProbeId, u64>,
}

impl TryFrom<RawHitRecord> for HitRecord {
    type Error = String;

    fn try_from(raw: RawHitRecord) -> Result<Self, Self::Error> {
        let test_identity = match (raw.test_identity, raw.class_name, raw.method_name) {
            (Some(identity), _, _) => identity,
            (None, Some(class), Some(method)) => format!("{class}.{method}"),
            _ => {
                return Err(
                    "hit record needs `testIdentity` or both `className` and `methodName`"
                        .to_string(),
                )
            }
        };
        if test_identity.trim().is_empty() {
            return Err("hit record has an empty test identity".to_string());
        }
        Ok(HitRecord::new(test_identity, raw.hits))
    }
}

// ---------------------------------------------------------------------------
// Coverage state
// ---------------------------------------------------------------------------

/// Entries of a keyed collection that is serialized as a plain array.
pub trait Keyed {
    fn key(&self) -> &str;

    /// Fold a second entry with the same key into this one.
    fn absorb(&mut self, other: Self);
}

/// Lines of one file covered by one test.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileCoverage {
    pub path: String,
    #[serde(default)]
    pub lines: BTreeSet<u32>,
}

impl FileCoverage {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            lines: BTreeSet::new(),
        }
    }
}

impl Keyed for FileCoverage {
    fn key(&self) -> &str {
        &self.path
    }

    fn absorb(&mut self, other: Self) {
        self.lines.extend(other.lines);
    }
}

/// Everything a single test executed, keyed by normalized file path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCoverage {
    pub name: String,
    #[serde(default, with = "keyed_seq")]
    pub files: BTreeMap<String, FileCoverage>,
}

impl TestCoverage {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            files: BTreeMap::new(),
        }
    }

    /// Look up or create the coverage entry for `path`.
    pub fn file_mut(&mut self, path: &str) -> &mut FileCoverage {
        self.files
            .entry(path.to_string())
            .or_insert_with(|| FileCoverage::new(path))
    }

    pub fn line_count(&self) -> usize {
        self.files.values().map(|f| f.lines.len()).sum()
    }
}

impl Keyed for TestCoverage {
    fn key(&self) -> &str {
        &self.name
    }

    fn absorb(&mut self, other: Self) {
        for (path, file) in other.files {
            match self.files.get_mut(&path) {
                Some(existing) => existing.absorb(file),
                None => {
                    self.files.insert(path, file);
                }
            }
        }
    }
}

/// Aggregated per-test, per-file line coverage for one run scope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageState {
    #[serde(default)]
    pub line_policy: LinePolicy,
    #[serde(default, with = "keyed_seq")]
    pub tests: BTreeMap<String, TestCoverage>,
}

impl CoverageState {
    pub fn new(line_policy: LinePolicy) -> Self {
        Self {
            line_policy,
            tests: BTreeMap::new(),
        }
    }

    /// Look up or create the singular entry for a test identity.
    pub fn test_mut(&mut self, name: &str) -> &mut TestCoverage {
        self.tests
            .entry(name.to_string())
            .or_insert_with(|| TestCoverage::new(name))
    }

    pub fn test(&self, name: &str) -> Option<&TestCoverage> {
        self.tests.get(name)
    }

    /// Number of distinct files touched by any test.
    pub fn file_count(&self) -> usize {
        self.tests
            .values()
            .flat_map(|t| t.files.keys())
            .collect::<BTreeSet<_>>()
            .len()
    }
}

/// Serialize a `BTreeMap<String, T>` as an array of its values, rebuilding the
/// map from each entry's own key on the way back in.
mod keyed_seq {
    use std::collections::BTreeMap;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::Keyed;

    pub fn serialize<S, T>(map: &BTreeMap<String, T>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: Serialize,
    {
        serializer.collect_seq(map.values())
    }

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<BTreeMap<String, T>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de> + Keyed,
    {
        let entries = Vec::<T>::deserialize(deserializer)?;
        let mut map: BTreeMap<String, T> = BTreeMap::new();
        for entry in entries {
            match map.get_mut(entry.key()) {
                Some(existing) => existing.absorb(entry),
                None => {
                    map.insert(entry.key().to_string(), entry);
                }
            }
        }
        Ok(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_id_accepts_numbers_and_strings() {
        let ids: Vec<ProbeId> = serde_json::from_str(r#"[7, "7", "P1", -3]"#).unwrap();
        assert_eq!(ids[0], ids[1]);
        assert_eq!(ids[2].as_str(), "P1");
        assert_eq!(ids[3].as_str(), "-3");
    }

    #[test]
    fn test_sequence_accepts_hit_id_alias() {
        let seq: Sequence =
            serde_json::from_str(r#"{"hitId": 12, "startLine": 3, "endLine": 4}"#).unwrap();
        assert_eq!(seq.probe_id, ProbeId::from("12"));
        assert_eq!(seq.start_line, 3);
        assert_eq!(seq.end_line, 4);
    }

    #[test]
    fn test_hit_record_from_class_and_method() {
        let record: HitRecord = serde_json::from_str(
            r#"{"className": "NS.FooTests", "methodName": "TestBar", "hits": {"1": 2}}"#,
        )
        .unwrap();
        assert_eq!(record.test_identity, "NS.FooTests.TestBar");
        assert_eq!(record.hit_count(&ProbeId::from("1")), 2);
        assert_eq!(record.hit_count(&ProbeId::from("2")), 0);
    }

    #[test]
    fn test_hit_record_without_identity_is_rejected() {
        let result = serde_json::from_str::<HitRecord>(r#"{"hits": {"1": 2}}"#);
        assert!(result.is_err());

        let result = serde_json::from_str::<HitRecord>(r#"{"testIdentity": " ", "hits": {}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_identical_records_are_equal() {
        let a: HitRecord =
            serde_json::from_str(r#"{"testIdentity": "A.b", "hits": {"P1": 1, "P2": 0}}"#)
                .unwrap();
        let b: HitRecord =
            serde_json::from_str(r#"{"hits": {"P2": 0, "P1": 1}, "testIdentity": "A.b"}"#)
                .unwrap();
        assert_eq!(a, b);

        let c: HitRecord =
            serde_json::from_str(r#"{"testIdentity": "A.b", "hits": {"P1": 2, "P2": 0}}"#)
                .unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn test_state_upserts_are_singular() {
        let mut state = CoverageState::default();
        state.test_mut("T.one").file_mut("src/a.cs").lines.insert(3);
        state.test_mut("T.one").file_mut("src/a.cs").lines.insert(3);
        state.test_mut("T.one").file_mut("src/b.cs");

        assert_eq!(state.tests.len(), 1);
        let test = state.test("T.one").unwrap();
        assert_eq!(test.files.len(), 2);
        assert_eq!(test.line_count(), 1);
        assert_eq!(state.file_count(), 2);
    }

    #[test]
    fn test_state_serializes_keyed_maps_as_arrays() {
        let mut state = CoverageState::new(LinePolicy::Exact);
        state
            .test_mut("T.one")
            .file_mut("src/a.cs")
            .lines
            .extend([5, 4]);

        let json = serde_json::to_string(&state).unwrap();
        assert_eq!(
            json,
            r#"{"linePolicy":"exact","tests":[{"name":"T.one","files":[{"path":"src/a.cs","lines":[4,5]}]}]}"#
        );
    }

    #[test]
    fn test_state_merges_duplicate_entries_on_read() {
        let json = r#"{"tests": [
            {"name": "T.one", "files": [{"path": "a", "lines": [1, 2]}]},
            {"name": "T.one", "files": [{"path": "a", "lines": [2, 3]}, {"path": "b", "lines": []}]}
        ]}"#;
        let state: CoverageState = serde_json::from_str(json).unwrap();

        assert_eq!(state.line_policy, LinePolicy::Padded);
        let test = state.test("T.one").unwrap();
        assert_eq!(
            test.files["a"].lines.iter().copied().collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert!(test.files["b"].lines.is_empty());
    }
}
