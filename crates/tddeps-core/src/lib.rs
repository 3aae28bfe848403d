//! Core types and configuration for tddeps.
//!
//! This crate provides the data model shared by the scanning, analysis and
//! emission stages: classified files, build targets, the scanned source tree,
//! configuration, errors and path helpers.

mod config;
mod error;
mod node;
pub mod paths;
mod tree;

pub use config::{
    ConfigError, DEFAULT_EXCLUDES, DepsConfig, DepsConfigBuilder, RootSpec, STAMPDIR_ALIAS,
};
pub use error::{DepsError, DepsWarning, WarningKind};
pub use node::{BuildTarget, ContentHash, FileId, FileKind, TrackedFile};
pub use paths::DirAliases;
pub use tree::{SourceTree, TreeStats};
