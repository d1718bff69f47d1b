use std::path::PathBuf;

use thiserror::Error;

use crate::model::ProbeId;

#[derive(Error, Debug)]
pub enum CovmapError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Probe map not found: {}", .0.display())]
    ProbeMapMissing(PathBuf),

    #[error("Probe map parse error in {}: {source}", path.display())]
    ProbeMap {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid sequence for probe {probe} in {path}: start line {start_line} is after end line {end_line}")]
    InvalidSequence {
        path: String,
        probe: ProbeId,
        start_line: u32,
        end_line: u32,
    },

    #[error("Corrupt hit log {}: {source}", path.display())]
    HitLog {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Coverage state not found: {} (run `covmap collect` first)", .0.display())]
    StateMissing(PathBuf),

    #[error("Coverage state parse error in {}: {source}", path.display())]
    State {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("{0}")]
    Validation(String),

    #[error("Path is not valid UTF-8: {}", .0.display())]
    NonUtf8Path(PathBuf),

    #[error("Invalid glob pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("Instrumenter failed: {0}")]
    Instrumenter(String),

    #[error("Failed to write {}: {source}", path.display())]
    Persist {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl CovmapError {
    /// Validation problems are user input mistakes rather than failures.
    pub fn is_validation(&self) -> bool {
        matches!(self, CovmapError::Validation(_))
    }
}

pub type Result<T> = std::result::Result<T, CovmapError>;
