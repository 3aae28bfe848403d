//! Error and warning types.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that abort a dependency run.
#[derive(Debug, Error)]
pub enum DepsError {
    /// A root argument could not be parsed.
    #[error("Invalid root specification: {spec}")]
    InvalidRoot { spec: String },

    /// Root or stamp path is not a directory.
    #[error("Not a directory: {path}")]
    NotADirectory { path: PathBuf },

    /// Path not found.
    #[error("Path not found: {path}")]
    NotFound { path: PathBuf },

    /// Permission denied for a path.
    #[error("Permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    /// Generic I/O error.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// The search process could not be started.
    #[error("Failed to run {program}: {source}")]
    SearchSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The search process exited unsuccessfully.
    #[error("Search in {cwd} failed with status {status:?}: {stderr}")]
    SearchFailed {
        cwd: PathBuf,
        status: Option<i32>,
        stderr: String,
    },

    /// The search process produced a line that is not `path:line:text`.
    #[error("Unparsable search output in {cwd}: {line:?}")]
    Protocol { cwd: PathBuf, line: String },

    /// Two target declarations claim the same directory.
    #[error("Duplicate target in {dir}: {first} and {second}")]
    DuplicateTarget {
        dir: PathBuf,
        first: String,
        second: String,
    },

    /// A file ended up in its own closure.
    #[error("Invariant violated: {path} depends on itself")]
    SelfDependency { path: PathBuf },

    /// A file was handed to the closure engine twice.
    #[error("Invariant violated: {path} was processed twice")]
    AlreadyProcessed { path: PathBuf },

    /// The update action could not be started.
    #[error("Failed to run action {program}: {source}")]
    ActionSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// A search worker disappeared before reporting.
    #[error("Search worker pool shut down unexpectedly")]
    WorkerLost,
}

impl DepsError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            _ => Self::Io { path, source },
        }
    }

    /// Whether the error indicates a defect in the merge algorithm rather than bad input.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            Self::SelfDependency { .. } | Self::AlreadyProcessed { .. } | Self::DuplicateTarget { .. }
        )
    }
}

/// Kind of non-fatal warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarningKind {
    /// A directory or file could not be read.
    ReadError,
    /// A header-like include matched no known file.
    UnresolvedInclude,
    /// A directory was excluded by a marker in its build descriptor.
    ExcludedDirectory,
}

/// Non-fatal condition collected during a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepsWarning {
    /// Path the warning refers to.
    pub path: PathBuf,
    /// Human-readable message.
    pub message: String,
    /// Kind of warning.
    pub kind: WarningKind,
}

impl DepsWarning {
    /// Create a new warning.
    pub fn new(path: impl Into<PathBuf>, message: impl Into<String>, kind: WarningKind) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            kind,
        }
    }

    /// Create an unresolved include warning.
    pub fn unresolved(path: impl Into<PathBuf>, include: &str) -> Self {
        let path = path.into();
        Self {
            message: format!("NOTFOUND {include} in {}", path.display()),
            path,
            kind: WarningKind::UnresolvedInclude,
        }
    }

    /// Create a read error warning.
    pub fn read_error(path: impl Into<PathBuf>, error: impl std::fmt::Display) -> Self {
        let path = path.into();
        Self {
            message: format!("Read error: {error}"),
            path,
            kind: WarningKind::ReadError,
        }
    }
}
