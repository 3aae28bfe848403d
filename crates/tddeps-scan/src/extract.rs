//! Include extraction and build-descriptor scanning.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use compact_str::CompactString;
use itertools::Itertools;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info};

use tddeps_core::{DepsConfig, DepsError, SourceTree};

use crate::batch::BatchBuilder;
use crate::search::{PatternSearch, SearchHit, SearchPattern};
use crate::stream::{BatchResult, BatchStream};

/// Selects candidate include lines.
pub const INCLUDE_PATTERN: &str = r#"^\s*#?\s*include\s*""#;

/// Selects target declarations and exclusion markers in build descriptors.
pub const DESCRIPTOR_PATTERN: &str = concat!(
    r"^\s*add_(tablegen|(llvm|clang|extra)_(example|executable|library|loadable_module|target|tool|unittest|utility))\s*\(\s*\w+",
    r"|#\s*TDDEPS:\s*exclude",
);

/// A file and the quoted include strings found in it, first occurrence order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractedFile {
    /// Absolute path.
    pub path: PathBuf,
    /// Raw include text, deduplicated.
    pub includes: Vec<CompactString>,
}

/// Target names and exclusion markers found in build descriptors.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DescriptorScan {
    /// Declared target name per descriptor directory.
    pub names: BTreeMap<PathBuf, CompactString>,
    /// Directories whose descriptor carries the exclusion marker.
    pub excluded: BTreeSet<PathBuf>,
}

impl DescriptorScan {
    /// Interpret the hits of one descriptor batch.
    pub fn absorb(&mut self, hits: &[SearchHit]) -> Result<(), DepsError> {
        for hit in hits {
            let dir = hit.file.parent().unwrap_or(&hit.file).to_path_buf();
            if exclude_marker().is_match(&hit.text) {
                debug!(dir = %dir.display(), "exclusion marker");
                self.excluded.insert(dir);
                continue;
            }
            let Some(name) = parse_target_name(&hit.text) else {
                continue;
            };
            if let Some(first) = self.names.get(&dir) {
                return Err(DepsError::DuplicateTarget {
                    dir,
                    first: first.to_string(),
                    second: name.to_string(),
                });
            }
            self.names.insert(dir, name);
        }
        Ok(())
    }

    /// Name the targets of `tree`. Targets in excluded directories stay unnamed.
    pub fn apply(&self, tree: &mut SourceTree) {
        for target in &mut tree.targets {
            if self.excluded.contains(&target.dir) {
                continue;
            }
            target.name = self.names.get(&target.dir).cloned();
        }
    }

    /// Whether `dir` carries the exclusion marker.
    pub fn is_excluded(&self, dir: &Path) -> bool {
        self.excluded.contains(dir)
    }
}

fn exclude_marker() -> &'static Regex {
    static EXCLUDE: OnceLock<Regex> = OnceLock::new();
    EXCLUDE.get_or_init(|| Regex::new(r"#\s*TDDEPS:\s*exclude").expect("Invalid exclusion marker regex"))
}

/// Extract the target name from a declaration line.
///
/// `add_llvm_target(X` names the target `LLVMX`; `-` becomes `_`.
pub fn parse_target_name(text: &str) -> Option<CompactString> {
    static DECL: OnceLock<Regex> = OnceLock::new();
    let decl = DECL.get_or_init(|| {
        Regex::new(concat!(
            r"^\s*(?P<cmd>add_(tablegen|(llvm|clang|extra)_(example|executable|library|loadable_module|target|tool|unittest|utility)))",
            r"\s*\(\s*(?P<name>\w[-\w]*)",
        ))
        .expect("Invalid target declaration regex")
    });

    let caps = decl.captures(text)?;
    let name = caps["name"].replace('-', "_");
    if &caps["cmd"] == "add_llvm_target" {
        Some(CompactString::from(format!("LLVM{name}")))
    } else {
        Some(CompactString::from(name))
    }
}

/// Extract the quoted include text from a matching line.
pub fn parse_include(text: &str) -> Option<&str> {
    static INCLUDE: OnceLock<Regex> = OnceLock::new();
    let include = INCLUDE.get_or_init(|| {
        Regex::new(r#"^\s*#?\s*include\s*"([^"]+)""#).expect("Invalid include regex")
    });
    include.captures(text).and_then(|c| c.get(1)).map(|m| m.as_str())
}

/// Counters for one extraction pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExtractStats {
    /// Batches searched.
    pub batches: usize,
    /// Files reported.
    pub files: usize,
    /// Include strings found.
    pub includes: usize,
}

/// Drives batched searches for includes and descriptor declarations.
pub struct Extractor {
    stream: BatchStream,
    arg_max: usize,
    include: SearchPattern,
    descriptor: SearchPattern,
}

impl Extractor {
    /// Create an extractor with explicit limits.
    pub fn new(searcher: Arc<dyn PatternSearch>, jobs: usize, arg_max: usize) -> Result<Self, DepsError> {
        Ok(Self {
            stream: BatchStream::new(searcher, jobs)?,
            arg_max,
            include: SearchPattern::new(INCLUDE_PATTERN)?,
            descriptor: SearchPattern::new(DESCRIPTOR_PATTERN)?,
        })
    }

    /// Create an extractor using the limits of `config`.
    pub fn from_config(config: &DepsConfig, searcher: Arc<dyn PatternSearch>) -> Result<Self, DepsError> {
        Self::new(searcher, config.jobs, config.arg_max)
    }

    /// Scan build descriptors for target names and exclusion markers.
    pub fn scan_descriptors(&self, descriptors: &[PathBuf]) -> Result<DescriptorScan, DepsError> {
        let batches = BatchBuilder::split(self.arg_max, descriptors.iter().cloned());
        let mut scan = DescriptorScan::default();
        self.stream
            .run(batches, &self.descriptor, |result| scan.absorb(&result.hits))?;
        info!(
            descriptors = descriptors.len(),
            named = scan.names.len(),
            excluded = scan.excluded.len(),
            "descriptor scan done"
        );
        Ok(scan)
    }

    /// Extract includes from `files`, streaming one [`ExtractedFile`] per input
    /// file to `sink` in input order.
    pub fn extract_includes<F>(&self, files: &[PathBuf], mut sink: F) -> Result<ExtractStats, DepsError>
    where
        F: FnMut(ExtractedFile) -> Result<(), DepsError>,
    {
        let batches = BatchBuilder::split(self.arg_max, files.iter().cloned());
        let mut stats = ExtractStats::default();
        self.stream.run(batches, &self.include, |result| {
            stats.batches += 1;
            for file in group_hits(result) {
                stats.files += 1;
                stats.includes += file.includes.len();
                sink(file)?;
            }
            Ok(())
        })?;
        debug!(?stats, "include extraction done");
        Ok(stats)
    }
}

/// Turn one batch result into per-file include lists, one per batch file.
fn group_hits(result: BatchResult) -> Vec<ExtractedFile> {
    let mut by_file: BTreeMap<&Path, Vec<&str>> = BTreeMap::new();
    for hit in &result.hits {
        if let Some(include) = parse_include(&hit.text) {
            by_file.entry(hit.file.as_path()).or_default().push(include);
        }
    }

    result
        .batch
        .files
        .iter()
        .map(|path| ExtractedFile {
            path: path.clone(),
            includes: by_file
                .get(path.as_path())
                .map(|list| list.iter().unique().map(|s| CompactString::from(*s)).collect())
                .unwrap_or_default(),
        })
        .collect()
}
