//! Scanned source tree and statistics.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use crate::error::DepsWarning;
use crate::node::{BuildTarget, FileId, FileKind, TrackedFile};

/// Summary statistics for a scanned tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeStats {
    /// Directories entered.
    pub dirs: u64,
    /// Header files tracked.
    pub headers: u64,
    /// Template headers registered.
    pub template_headers: u64,
    /// Source files tracked.
    pub sources: u64,
    /// Interface-definition files tracked.
    pub interface_definitions: u64,
    /// Build descriptors queued for scanning.
    pub descriptors: u64,
    /// Entries skipped by exclusion patterns.
    pub excluded: u64,
    /// Files queued for include extraction.
    pub queued: u64,
    /// Maximum depth reached below a root.
    pub max_depth: u32,
}

impl TreeStats {
    /// Create new empty stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a tracked file.
    pub fn record_file(&mut self, kind: FileKind, depth: u32) {
        match kind {
            FileKind::Header => self.headers += 1,
            FileKind::TemplateHeader => self.template_headers += 1,
            FileKind::Source => self.sources += 1,
            FileKind::InterfaceDefinition => self.interface_definitions += 1,
            FileKind::BuildDescriptor => self.descriptors += 1,
        }
        self.max_depth = self.max_depth.max(depth);
    }

    /// Record a directory.
    pub fn record_dir(&mut self, depth: u32) {
        self.dirs += 1;
        self.max_depth = self.max_depth.max(depth);
    }

    /// Record an excluded entry.
    pub fn record_excluded(&mut self) {
        self.excluded += 1;
    }

    /// Total tracked files, template headers included.
    pub fn total_files(&self) -> u64 {
        self.headers + self.template_headers + self.sources + self.interface_definitions
    }
}

/// Everything the walker learned about the roots.
///
/// Files are stored densely and addressed by [`FileId`]; lookups by path and
/// by public include name go through side tables.
#[derive(Debug, Clone)]
pub struct SourceTree {
    /// Scanned roots in argument order.
    pub roots: Vec<PathBuf>,

    /// Include-search directories.
    pub include_dirs: Vec<PathBuf>,

    files: Vec<TrackedFile>,
    by_path: HashMap<PathBuf, FileId>,
    public_names: HashMap<String, FileId>,

    /// Build targets, sorted by directory once the walk finishes.
    pub targets: Vec<BuildTarget>,

    /// Build descriptors awaiting the descriptor scan.
    pub descriptors: Vec<PathBuf>,

    /// Files awaiting include extraction, in discovery order.
    pub scan_queue: Vec<FileId>,

    /// When the walk was performed.
    pub scanned_at: SystemTime,

    /// Duration of the walk.
    pub scan_duration: Duration,

    /// Summary statistics.
    pub stats: TreeStats,

    /// Warnings encountered during the walk.
    pub warnings: Vec<DepsWarning>,
}

impl SourceTree {
    /// Create an empty tree for the given roots and include directories.
    pub fn new(roots: Vec<PathBuf>, include_dirs: Vec<PathBuf>) -> Self {
        Self {
            roots,
            include_dirs,
            files: Vec::new(),
            by_path: HashMap::new(),
            public_names: HashMap::new(),
            targets: Vec::new(),
            descriptors: Vec::new(),
            scan_queue: Vec::new(),
            scanned_at: SystemTime::now(),
            scan_duration: Duration::ZERO,
            stats: TreeStats::new(),
            warnings: Vec::new(),
        }
    }

    /// Track a file. Returns the existing id when the path is already known.
    ///
    /// `scan` queues the file for include extraction; it is ignored for kinds
    /// that are never scanned.
    pub fn add_file(
        &mut self,
        path: PathBuf,
        kind: FileKind,
        modified: SystemTime,
        scan: bool,
    ) -> FileId {
        if let Some(&id) = self.by_path.get(&path) {
            return id;
        }
        let id = FileId::new(self.files.len() as u32);
        let scan = scan && kind.is_scanned();
        if scan {
            self.scan_queue.push(id);
            self.stats.queued += 1;
        }
        self.by_path.insert(path.clone(), id);
        self.files.push(TrackedFile {
            id,
            path,
            kind,
            modified,
            scan,
        });
        id
    }

    /// Register a public include name. The first registration wins.
    pub fn register_public(&mut self, name: impl Into<String>, id: FileId) {
        self.public_names.entry(name.into()).or_insert(id);
    }

    /// Look up a public include name.
    pub fn public(&self, name: &str) -> Option<FileId> {
        self.public_names.get(name).copied()
    }

    /// Number of public include names.
    pub fn public_count(&self) -> usize {
        self.public_names.len()
    }

    /// Get a file by id.
    pub fn file(&self, id: FileId) -> &TrackedFile {
        &self.files[id.index()]
    }

    /// All tracked files in discovery order.
    pub fn files(&self) -> &[TrackedFile] {
        &self.files
    }

    /// Look up a file by normalized path.
    pub fn lookup(&self, path: &Path) -> Option<FileId> {
        self.by_path.get(path).copied()
    }

    /// Whether `dir` is a root or an include directory.
    pub fn is_boundary(&self, dir: &Path) -> bool {
        self.roots.iter().any(|r| r == dir) || self.include_dirs.iter().any(|d| d == dir)
    }

    /// Index of the root `path` lives under, preferring the deepest root.
    pub fn root_index(&self, path: &Path) -> Option<usize> {
        self.roots
            .iter()
            .enumerate()
            .filter(|(_, root)| path.starts_with(root))
            .max_by_key(|(_, root)| root.components().count())
            .map(|(idx, _)| idx)
    }

    /// Paths of the queued files, in queue order.
    pub fn queued_paths(&self) -> Vec<PathBuf> {
        self.scan_queue
            .iter()
            .map(|&id| self.file(id).path.clone())
            .collect()
    }

    /// Target owning `dir`, if any.
    pub fn target_at(&self, dir: &Path) -> Option<&BuildTarget> {
        self.targets.iter().find(|t| t.dir == dir)
    }

    /// Sort targets by directory once the walk is complete.
    pub fn finish(&mut self, scan_duration: Duration) {
        self.targets.sort_by(|a, b| a.dir.cmp(&b.dir));
        self.scan_duration = scan_duration;
    }

    /// Check if there were any warnings during the walk.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}
