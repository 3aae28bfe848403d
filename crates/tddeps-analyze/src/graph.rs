//! Dependency graph coordinator.
//!
//! [`DependencyGraph`] owns all mutable analysis state: the node interner,
//! the closure engine, retained direct dependencies of interface-definition
//! files and the diagnostics collected while resolving includes.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use compact_str::CompactString;
use indexmap::IndexSet;
use serde::Serialize;
use tracing::{debug, info};

use tddeps_core::{DepsError, DepsWarning, FileId, FileKind, SourceTree, WarningKind};

use crate::closure::{ClosureEngine, ClosureError};
use crate::resolve::{Resolution, Resolver};

/// A graph node: a tracked file or an unresolved include.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeKey {
    /// Tracked file.
    File(FileId),
    /// Unresolved include text.
    Placeholder(CompactString),
}

impl From<Resolution> for NodeKey {
    fn from(res: Resolution) -> Self {
        match res {
            Resolution::File(id) => Self::File(id),
            Resolution::Placeholder(raw) => Self::Placeholder(raw),
        }
    }
}

/// Counters for one analysis run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GraphStats {
    /// Files processed.
    pub files: usize,
    /// Direct edges recorded.
    pub edges: usize,
    /// Distinct placeholders.
    pub placeholders: usize,
    /// Files skipped because their directory is excluded.
    pub excluded: usize,
}

/// Include graph with incrementally maintained closures.
pub struct DependencyGraph<'t> {
    tree: &'t SourceTree,
    resolver: Resolver<'t>,
    nodes: IndexSet<NodeKey>,
    engine: ClosureEngine,
    direct: HashMap<FileId, Vec<usize>>,
    excluded: BTreeSet<PathBuf>,
    warnings: Vec<DepsWarning>,
    stats: GraphStats,
}

impl<'t> DependencyGraph<'t> {
    /// Create a graph over `tree`. Files directly inside `excluded` directories are skipped.
    ///
    /// Template headers enter the graph as processed files with no dependencies.
    pub fn new(tree: &'t SourceTree, excluded: BTreeSet<PathBuf>) -> Result<Self, DepsError> {
        let warnings = excluded
            .iter()
            .map(|dir| {
                info!(dir = %dir.display(), "excluding directory");
                DepsWarning::new(dir, "excluded by build descriptor marker", WarningKind::ExcludedDirectory)
            })
            .collect();

        let mut graph = Self {
            tree,
            resolver: Resolver::new(tree),
            nodes: IndexSet::new(),
            engine: ClosureEngine::new(),
            direct: HashMap::new(),
            excluded,
            warnings,
            stats: GraphStats::default(),
        };

        for file in tree.files().iter().filter(|f| f.kind == FileKind::TemplateHeader) {
            let node = graph.intern(NodeKey::File(file.id));
            graph
                .engine
                .process(node, &[])
                .map_err(|e| graph.violation(e))?;
        }
        Ok(graph)
    }

    /// Record the includes extracted from the file at `path`.
    ///
    /// Returns `false` when the file was skipped.
    pub fn add_file<S: AsRef<str>>(&mut self, path: &Path, includes: &[S]) -> Result<bool, DepsError> {
        let tree = self.tree;
        let Some(id) = tree.lookup(path) else {
            debug!(path = %path.display(), "untracked file reported by search");
            return Ok(false);
        };
        let file = tree.file(id);
        if self.excluded.contains(file.dir()) {
            debug!(path = %path.display(), "excluded");
            self.stats.excluded += 1;
            return Ok(false);
        }

        let mut deps = Vec::with_capacity(includes.len());
        for include in includes {
            let resolution = self.resolver.resolve(path, include.as_ref(), &mut self.warnings);
            let dep = self.intern(resolution.into());
            if !deps.contains(&dep) {
                deps.push(dep);
            }
        }

        let node = self.intern(NodeKey::File(id));
        self.engine.process(node, &deps).map_err(|e| self.violation(e))?;

        self.stats.files += 1;
        self.stats.edges += deps.len();
        if file.kind.retains_direct() {
            self.direct.insert(id, deps);
        }
        Ok(true)
    }

    /// Warnings collected so far.
    pub fn warnings(&self) -> &[DepsWarning] {
        &self.warnings
    }

    /// Take the collected warnings.
    pub fn take_warnings(&mut self) -> Vec<DepsWarning> {
        std::mem::take(&mut self.warnings)
    }

    /// Run counters.
    pub fn stats(&self) -> GraphStats {
        let placeholders = self
            .nodes
            .iter()
            .filter(|n| matches!(n, NodeKey::Placeholder(_)))
            .count();
        GraphStats {
            placeholders,
            ..self.stats
        }
    }

    /// The scanned tree.
    pub fn tree(&self) -> &'t SourceTree {
        self.tree
    }

    /// Directories excluded by marker.
    pub fn excluded_dirs(&self) -> &BTreeSet<PathBuf> {
        &self.excluded
    }

    /// Whether `dir` is excluded.
    pub fn is_excluded(&self, dir: &Path) -> bool {
        self.excluded.contains(dir)
    }

    /// Whether `id` has been processed.
    pub fn is_processed(&self, id: FileId) -> bool {
        self.node_of(id).is_some_and(|n| self.engine.is_processed(n))
    }

    /// Transitive dependencies of `id`, excluding itself, as sorted labels.
    pub fn closure(&self, id: FileId) -> Vec<PathBuf> {
        self.labels(self.node_of(id).map(|n| self.engine.closure(n)).unwrap_or_default())
    }

    /// Direct dependencies retained for interface-definition files, as sorted labels.
    pub fn direct(&self, id: FileId) -> Vec<PathBuf> {
        self.labels(self.direct.get(&id).cloned().unwrap_or_default())
    }

    /// Grouping key of `id`: its closure, plus itself when it lies on a cycle.
    pub fn group_key(&self, id: FileId) -> Vec<PathBuf> {
        self.labels(self.node_of(id).map(|n| self.engine.component_key(n)).unwrap_or_default())
    }

    /// Processed interface-definition files, sorted by path.
    pub fn interface_definitions(&self) -> Vec<FileId> {
        let mut out: Vec<FileId> = self
            .tree
            .files()
            .iter()
            .filter(|f| f.kind == FileKind::InterfaceDefinition && self.is_processed(f.id))
            .map(|f| f.id)
            .collect();
        out.sort_by(|a, b| self.tree.file(*a).path.cmp(&self.tree.file(*b).path));
        out
    }

    /// Processed files in path order.
    pub fn processed_files(&self) -> Vec<FileId> {
        let mut out: Vec<FileId> = self
            .tree
            .files()
            .iter()
            .filter(|f| self.is_processed(f.id))
            .map(|f| f.id)
            .collect();
        out.sort_by(|a, b| self.tree.file(*a).path.cmp(&self.tree.file(*b).path));
        out
    }

    /// Unresolved-include warnings only.
    pub fn unresolved(&self) -> impl Iterator<Item = &DepsWarning> {
        self.warnings
            .iter()
            .filter(|w| w.kind == WarningKind::UnresolvedInclude)
    }

    fn intern(&mut self, key: NodeKey) -> usize {
        self.nodes.insert_full(key).0
    }

    fn node_of(&self, id: FileId) -> Option<usize> {
        self.nodes.get_index_of(&NodeKey::File(id))
    }

    /// Printable label of a node: the file path or the raw include text.
    fn label(&self, node: usize) -> PathBuf {
        match self.nodes.get_index(node) {
            Some(NodeKey::File(id)) => self.tree.file(*id).path.clone(),
            Some(NodeKey::Placeholder(raw)) => PathBuf::from(raw.as_str()),
            None => PathBuf::new(),
        }
    }

    fn labels(&self, nodes: Vec<usize>) -> Vec<PathBuf> {
        let mut out: Vec<PathBuf> = nodes.into_iter().map(|n| self.label(n)).collect();
        out.sort();
        out.dedup();
        out
    }

    fn violation(&self, err: ClosureError) -> DepsError {
        match err {
            ClosureError::AlreadyProcessed(node) => DepsError::AlreadyProcessed { path: self.label(node) },
            ClosureError::SelfDependency(node) => DepsError::SelfDependency { path: self.label(node) },
        }
    }
}
