//! Run configuration types.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::SystemTime;

use compact_str::CompactString;
use derive_builder::{Builder, UninitializedFieldError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::DepsError;
use crate::paths::{self, DirAliases};

/// Entry names skipped while walking, as glob patterns matched against the file name.
pub const DEFAULT_EXCLUDES: &[&str] = &[
    ".*", "*~*", "Makefile*", "autoconf", "docs", "images", "test", "tests", "*.cmake", "*.html",
    "*.ml", "*.mli", "*.pl", "*.py", "*.pyc", "*.sh", "*.TXT", "*.txt",
];

/// Alias under which the stamp directory is rendered.
pub const STAMPDIR_ALIAS: &str = "STAMPDIR";

/// Errors raised while building a [`DepsConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required field was not set.
    #[error("Missing configuration field: {0}")]
    MissingField(&'static str),

    /// A field holds an unusable value.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl From<UninitializedFieldError> for ConfigError {
    fn from(err: UninitializedFieldError) -> Self {
        Self::MissingField(err.field_name())
    }
}

/// A scanned root directory, optionally bound to an alias.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootSpec {
    /// Alias rendered as `${ALIAS}` in generated output.
    pub alias: Option<CompactString>,
    /// Directory path.
    pub path: PathBuf,
}

impl RootSpec {
    /// Create an unaliased root.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            alias: None,
            path: path.into(),
        }
    }

    /// Create an aliased root.
    pub fn aliased(alias: impl Into<CompactString>, path: impl Into<PathBuf>) -> Self {
        Self {
            alias: Some(alias.into()),
            path: path.into(),
        }
    }
}

impl FromStr for RootSpec {
    type Err = DepsError;

    /// Parse `PATH` or `ALIAS=PATH`, where `ALIAS` is a word.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(DepsError::InvalidRoot { spec: s.to_string() });
        }
        if let Some((alias, path)) = s.split_once('=') {
            let is_word = !alias.is_empty()
                && alias.chars().all(|c| c.is_alphanumeric() || c == '_');
            if is_word {
                if path.is_empty() {
                    return Err(DepsError::InvalidRoot { spec: s.to_string() });
                }
                return Ok(Self::aliased(alias, paths::normalize(path)));
            }
        }
        Ok(Self::new(paths::normalize(s)))
    }
}

/// Configuration for a dependency run.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(
    setter(into),
    build_fn(validate = "Self::validate", error = "ConfigError")
)]
pub struct DepsConfig {
    /// Root directories to scan. The first roots also seed default include directories.
    pub roots: Vec<RootSpec>,

    /// Include-search directories; empty means derive them from the roots.
    #[builder(default)]
    #[serde(default)]
    pub include_dirs: Vec<PathBuf>,

    /// Entry names to skip (glob syntax).
    #[builder(default = "default_excludes()")]
    #[serde(default = "default_excludes")]
    pub exclude_patterns: Vec<String>,

    /// Only extract files modified after this instant.
    #[builder(default)]
    #[serde(default)]
    pub since: Option<SystemTime>,

    /// Directory holding stamp files.
    #[builder(default)]
    #[serde(default)]
    pub stamp_dir: Option<PathBuf>,

    /// Maximum number of concurrent search invocations.
    #[builder(default = "8")]
    #[serde(default = "default_jobs")]
    pub jobs: usize,

    /// Argument-length ceiling for one search invocation.
    #[builder(default = "32767")]
    #[serde(default = "default_arg_max")]
    pub arg_max: usize,

    /// Group names longer than this are replaced by a hash.
    #[builder(default = "40")]
    #[serde(default = "default_group_name_limit")]
    pub group_name_limit: usize,

    /// Number of threads for directory walking (0 = auto-detect).
    #[builder(default = "0")]
    #[serde(default)]
    pub threads: usize,
}

fn default_excludes() -> Vec<String> {
    DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect()
}

fn default_jobs() -> usize {
    8
}

fn default_arg_max() -> usize {
    32767
}

fn default_group_name_limit() -> usize {
    40
}

impl DepsConfigBuilder {
    fn validate(&self) -> Result<(), ConfigError> {
        match self.roots {
            Some(ref roots) if !roots.is_empty() => {}
            _ => return Err(ConfigError::Invalid("at least one root is required".to_string())),
        }
        if self.jobs == Some(0) {
            return Err(ConfigError::Invalid("jobs must be positive".to_string()));
        }
        if self.arg_max == Some(0) {
            return Err(ConfigError::Invalid("arg_max must be positive".to_string()));
        }
        Ok(())
    }
}

impl DepsConfig {
    /// Create a new config builder.
    pub fn builder() -> DepsConfigBuilder {
        DepsConfigBuilder::default()
    }

    /// Create a config scanning the given roots with default settings.
    pub fn new(roots: Vec<RootSpec>) -> Self {
        Self {
            roots,
            include_dirs: Vec::new(),
            exclude_patterns: default_excludes(),
            since: None,
            stamp_dir: None,
            jobs: default_jobs(),
            arg_max: default_arg_max(),
            group_name_limit: default_group_name_limit(),
            threads: 0,
        }
    }

    /// Verify that every root and the stamp directory exist and are directories.
    pub fn check_roots(&self) -> Result<(), DepsError> {
        let stamp = self.stamp_dir.iter();
        for path in self.roots.iter().map(|r| &r.path).chain(stamp) {
            let metadata = std::fs::metadata(path).map_err(|e| DepsError::io(path, e))?;
            if !metadata.is_dir() {
                return Err(DepsError::NotADirectory { path: path.clone() });
            }
        }
        Ok(())
    }

    /// Make every configured path absolute and lexically normalized.
    pub fn resolve_paths(mut self) -> Result<Self, DepsError> {
        fn absolute(path: &PathBuf) -> Result<PathBuf, DepsError> {
            std::path::absolute(path)
                .map(paths::normalize)
                .map_err(|e| DepsError::io(path, e))
        }

        for root in &mut self.roots {
            root.path = absolute(&root.path)?;
        }
        self.include_dirs = self
            .include_dirs
            .iter()
            .map(absolute)
            .collect::<Result<_, _>>()?;
        if let Some(ref stamp_dir) = self.stamp_dir {
            self.stamp_dir = Some(absolute(stamp_dir)?);
        }
        Ok(self)
    }

    /// Root directory paths in argument order.
    pub fn root_paths(&self) -> Vec<PathBuf> {
        self.roots.iter().map(|r| r.path.clone()).collect()
    }

    /// Include-search directories, falling back to the conventional layout under the roots.
    pub fn effective_include_dirs(&self) -> Vec<PathBuf> {
        if !self.include_dirs.is_empty() {
            return self.include_dirs.iter().map(paths::normalize).collect();
        }
        let mut dirs = Vec::new();
        if let Some(first) = self.roots.first() {
            dirs.push(first.path.join("include"));
            dirs.push(first.path.join("utils/unittest/googletest/include"));
        }
        if let Some(second) = self.roots.get(1) {
            dirs.push(second.path.join("include"));
        }
        dirs
    }

    /// Alias table for rendering paths: aliased roots plus the stamp directory.
    pub fn aliases(&self) -> DirAliases {
        let mut aliases = DirAliases::new();
        if let Some(ref stamp_dir) = self.stamp_dir {
            aliases.insert(STAMPDIR_ALIAS, paths::normalize(stamp_dir));
        }
        for root in &self.roots {
            if let Some(ref alias) = root.alias {
                aliases.insert(alias.as_str(), root.path.clone());
            }
        }
        aliases
    }
}
