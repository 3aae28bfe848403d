//! Name-based exclusion and include-directory placement.

use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};

use tddeps_core::{DepsError, FileKind};

/// Compiled exclusion patterns, matched against entry names.
///
/// Build descriptors are never excluded, even when a pattern such as `*.txt`
/// matches them.
#[derive(Debug, Clone)]
pub struct Excluder {
    set: GlobSet,
}

impl Excluder {
    /// Compile a list of glob patterns.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, DepsError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let glob = Glob::new(pattern.as_ref()).map_err(|e| DepsError::InvalidConfig {
                message: format!("bad exclude pattern {:?}: {e}", pattern.as_ref()),
            })?;
            builder.add(glob);
        }
        let set = builder.build().map_err(|e| DepsError::InvalidConfig {
            message: e.to_string(),
        })?;
        Ok(Self { set })
    }

    /// Whether an entry with this name is skipped.
    pub fn is_excluded(&self, name: &str) -> bool {
        name != FileKind::DESCRIPTOR_NAME && self.set.is_match(name)
    }
}

/// Path of `dir` relative to the first include directory containing it.
pub fn include_prefix(dir: &Path, include_dirs: &[PathBuf]) -> Option<PathBuf> {
    include_dirs
        .iter()
        .find_map(|inc| dir.strip_prefix(inc).ok().map(Path::to_path_buf))
}

/// Public include name of a file named `name` under `prefix`.
pub fn public_name(prefix: &Path, name: &str) -> String {
    prefix.join(name).to_string_lossy().into_owned()
}
