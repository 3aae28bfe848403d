//! Tree walking and include extraction for tddeps.
//!
//! This crate turns a set of roots into a [`SourceTree`] and streams the
//! quoted includes of its files.
//!
//! # Overview
//!
//! - [`TreeWalker`] walks roots in parallel via jwalk, prunes excluded
//!   entries and classifies files into headers, sources, interface
//!   definitions, template headers and build descriptors.
//! - [`BatchBuilder`] packs file lists into command-line sized batches.
//! - [`PatternSearch`] is the line-search seam, implemented by
//!   [`GrepSearch`] and [`InProcessSearch`].
//! - [`Extractor`] runs batches on a bounded pool and streams results back
//!   in submission order.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tddeps_scan::{DepsConfig, Extractor, GrepSearch, RootSpec, TreeWalker};
//!
//! let config = DepsConfig::new(vec![RootSpec::aliased("LLVM", "/src/llvm")]);
//! let mut tree = TreeWalker::new().walk(&config).unwrap();
//!
//! let extractor = Extractor::from_config(&config, Arc::new(GrepSearch::new())).unwrap();
//! let descriptors = extractor.scan_descriptors(&tree.descriptors).unwrap();
//! descriptors.apply(&mut tree);
//!
//! extractor
//!     .extract_includes(&tree.queued_paths(), |file| {
//!         println!("{}: {:?}", file.path.display(), file.includes);
//!         Ok(())
//!     })
//!     .unwrap();
//! ```

mod batch;
mod classify;
mod extract;
mod scanner;
mod search;
mod stream;

pub use batch::{Batch, BatchBuilder};
pub use classify::{Excluder, include_prefix, public_name};
pub use extract::{
    DESCRIPTOR_PATTERN, DescriptorScan, ExtractStats, ExtractedFile, Extractor, INCLUDE_PATTERN,
    parse_include, parse_target_name,
};
pub use scanner::TreeWalker;
pub use search::{GrepSearch, InProcessSearch, PatternSearch, SearchHit, SearchPattern, parse_output};
pub use stream::{BatchResult, BatchStream};

// Re-export core types for convenience
pub use tddeps_core::{
    BuildTarget, DepsConfig, DepsError, DepsWarning, FileId, FileKind, RootSpec, SourceTree,
    TrackedFile, TreeStats, WarningKind,
};
