//! Dependency analysis for tddeps.
//!
//! This crate turns a scanned [`SourceTree`] and the includes extracted from
//! its files into the data the fragment emitter needs:
//!
//! - **Resolution** - quoted includes map to tracked files or placeholders
//! - **Closures** - transitive dependencies maintained incrementally, with
//!   cycles collapsed into shared records
//! - **Groups** - sources of a target partitioned by identical closure
//! - **Stamps** - a per-directory forest for incremental rebuilds
//!
//! # Closures
//!
//! Files are added one at a time in any order. A dependency seen before it
//! is processed is kept as a provisional member and filled in later:
//!
//! ```rust,ignore
//! use std::collections::BTreeSet;
//! use tddeps_analyze::{DependencyGraph, StampForest, build_groups};
//!
//! let mut graph = DependencyGraph::new(&tree, BTreeSet::new())?;
//! for (path, includes) in extracted {
//!     graph.add_file(&path, &includes)?;
//! }
//!
//! for target in build_groups(&graph, 40) {
//!     println!("{}: {} groups", target.target, target.groups.len());
//! }
//! let stamps = StampForest::build(&tree, graph.excluded_dirs(), &config.aliases());
//! ```

pub mod closure;
mod graph;
mod groups;
mod report;
mod resolve;
mod stamps;

pub use closure::{ClosureEngine, ClosureError};
pub use graph::{DependencyGraph, GraphStats, NodeKey};
pub use groups::{Group, GroupKey, TargetGroups, build_groups, full_group_name, group_name};
pub use report::{DependencyReport, FileClosure};
pub use resolve::{Resolution, Resolver, is_header_like};
pub use stamps::{StampForest, StampNode};

// Re-export core types
pub use tddeps_core::{ContentHash, DepsError, DepsWarning, FileId, SourceTree};
