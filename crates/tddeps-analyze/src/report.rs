//! Serializable summary of one analysis run.

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

use tddeps_core::{DepsWarning, FileKind, TreeStats};

use crate::graph::{DependencyGraph, GraphStats};
use crate::groups::TargetGroups;
use crate::stamps::StampForest;

/// Closure of one processed file.
#[derive(Debug, Clone, Serialize)]
pub struct FileClosure {
    /// File path.
    pub path: PathBuf,
    /// File classification.
    pub kind: FileKind,
    /// Transitive dependencies, sorted.
    pub closure: Vec<PathBuf>,
    /// Direct dependencies, kept for interface-definition files only.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub direct: Vec<PathBuf>,
}

/// Everything computed for one run.
#[derive(Debug, Clone, Serialize)]
pub struct DependencyReport {
    /// Closures of every processed file, by path.
    pub closures: Vec<FileClosure>,

    /// Groups of every named target.
    pub targets: Vec<TargetGroups>,

    /// Number of directory stamps.
    pub stamp_count: usize,

    /// Non-fatal conditions from the walk and the resolution.
    pub warnings: Vec<DepsWarning>,

    /// Walk counters.
    pub tree_stats: TreeStats,

    /// Graph counters.
    pub graph_stats: GraphStats,

    /// Wall time of the walk.
    pub scan_duration: Duration,
}

impl DependencyReport {
    /// Assemble the report from the finished analysis state.
    pub fn collect(graph: &DependencyGraph<'_>, targets: Vec<TargetGroups>, stamps: &StampForest) -> Self {
        let tree = graph.tree();
        let closures = graph
            .processed_files()
            .into_iter()
            .map(|id| {
                let file = tree.file(id);
                FileClosure {
                    path: file.path.clone(),
                    kind: file.kind,
                    closure: graph.closure(id),
                    direct: graph.direct(id),
                }
            })
            .collect();

        let mut warnings = tree.warnings.clone();
        warnings.extend(graph.warnings().iter().cloned());

        Self {
            closures,
            targets,
            stamp_count: stamps.len(),
            warnings,
            tree_stats: tree.stats.clone(),
            graph_stats: graph.stats(),
            scan_duration: tree.scan_duration,
        }
    }

    /// Total number of groups across targets.
    pub fn group_count(&self) -> usize {
        self.targets.iter().map(|t| t.groups.len()).sum()
    }

    /// Check if any warning was recorded.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}
