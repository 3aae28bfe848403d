//! JWalk-based tree walker and classifier.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Instant, SystemTime};

use compact_str::CompactString;
use jwalk::{Parallelism, WalkDir};
use tracing::{debug, warn};

use tddeps_core::{
    BuildTarget, DepsConfig, DepsError, DepsWarning, FileKind, SourceTree, paths,
};

use crate::classify::{self, Excluder};

/// Walks the configured roots and classifies every file it finds.
#[derive(Debug, Default)]
pub struct TreeWalker;

impl TreeWalker {
    /// Create a new walker.
    pub fn new() -> Self {
        Self
    }

    /// Walk all roots of `config` and build the source tree.
    ///
    /// Roots nested inside an earlier root are not walked twice.
    pub fn walk(&self, config: &DepsConfig) -> Result<SourceTree, DepsError> {
        let start = Instant::now();
        config.check_roots()?;

        let excluder = Arc::new(Excluder::new(&config.exclude_patterns)?);
        let roots: Vec<PathBuf> = config.roots.iter().map(|r| paths::normalize(&r.path)).collect();
        let include_dirs = config.effective_include_dirs();

        let mut tree = SourceTree::new(roots.clone(), include_dirs);
        let excluded = Arc::new(AtomicU64::new(0));

        let mut dirs: BTreeMap<PathBuf, Vec<EntryInfo>> = BTreeMap::new();
        for root in &roots {
            let entries =
                self.collect_entries(config, root, &excluder, &excluded, &mut tree)?;
            for (dir, children) in entries {
                dirs.entry(dir).or_insert(children);
            }
        }
        tree.stats.excluded = excluded.load(Ordering::Relaxed);

        for (dir, children) in dirs {
            self.classify_dir(config, &dir, children, &mut tree);
        }

        tree.finish(start.elapsed());
        debug!(
            files = tree.stats.total_files(),
            queued = tree.stats.queued,
            targets = tree.targets.len(),
            "walk finished"
        );
        Ok(tree)
    }

    /// Collect the files of every directory below `root`, keyed by directory.
    fn collect_entries(
        &self,
        config: &DepsConfig,
        root: &Path,
        excluder: &Arc<Excluder>,
        excluded: &Arc<AtomicU64>,
        tree: &mut SourceTree,
    ) -> Result<HashMap<PathBuf, Vec<EntryInfo>>, DepsError> {
        let parallelism = match config.threads {
            0 => Parallelism::RayonDefaultPool {
                busy_timeout: std::time::Duration::from_millis(100),
            },
            n => Parallelism::RayonNewPool(n),
        };

        let prune = Arc::clone(excluder);
        let counter = Arc::clone(excluded);
        let walker = WalkDir::new(root)
            .parallelism(parallelism)
            .sort(true)
            .skip_hidden(false)
            .follow_links(false)
            .process_read_dir(move |depth, _path, _state, children| {
                // The root itself is never pruned.
                if depth.is_none() {
                    return;
                }
                children.retain(|entry| match entry {
                    Ok(e) => {
                        let keep = !prune.is_excluded(&e.file_name().to_string_lossy());
                        if !keep {
                            counter.fetch_add(1, Ordering::Relaxed);
                        }
                        keep
                    }
                    Err(_) => true,
                });
            });

        let mut entries_by_dir: HashMap<PathBuf, Vec<EntryInfo>> = HashMap::new();
        entries_by_dir.insert(root.to_path_buf(), Vec::new());

        for entry_result in walker {
            let entry = match entry_result {
                Ok(e) => e,
                Err(err) => {
                    let path = err.path().map(Path::to_path_buf).unwrap_or_default();
                    warn!(path = %path.display(), "unreadable entry: {err}");
                    tree.warnings.push(DepsWarning::read_error(path, &err));
                    continue;
                }
            };

            let path = paths::normalize(entry.path());
            let depth = entry.depth() as u32;
            let file_type = entry.file_type();

            if file_type.is_dir() {
                tree.stats.record_dir(depth);
                entries_by_dir.entry(path).or_default();
                continue;
            }
            if !file_type.is_file() {
                continue;
            }

            let name = entry.file_name().to_string_lossy();
            let Some(kind) = FileKind::classify(&name) else {
                continue;
            };
            let modified = match entry.metadata() {
                Ok(m) => m.modified().unwrap_or(std::time::UNIX_EPOCH),
                Err(err) => {
                    tree.warnings.push(DepsWarning::read_error(&path, &err));
                    continue;
                }
            };
            let Some(parent) = path.parent() else {
                continue;
            };

            entries_by_dir
                .entry(parent.to_path_buf())
                .or_default()
                .push(EntryInfo {
                    name: CompactString::new(&name),
                    path: path.clone(),
                    kind,
                    modified,
                    depth,
                });
        }

        Ok(entries_by_dir)
    }

    /// Classify the files directly inside `dir` and register them in `tree`.
    fn classify_dir(
        &self,
        config: &DepsConfig,
        dir: &Path,
        mut children: Vec<EntryInfo>,
        tree: &mut SourceTree,
    ) {
        children.sort_by(|a, b| a.name.cmp(&b.name));

        let prefix = classify::include_prefix(dir, &tree.include_dirs);
        let has_descriptor = children.iter().any(|c| c.kind == FileKind::BuildDescriptor);
        let is_fresh = |modified: SystemTime| config.since.is_none_or(|since| modified > since);

        let mut sources = Vec::new();
        for child in children {
            match child.kind {
                FileKind::BuildDescriptor => {}
                FileKind::TemplateHeader => {
                    let Some(ref prefix) = prefix else { continue };
                    let Some(generated) = paths::strip_template_suffix(&child.name) else {
                        continue;
                    };
                    let public = classify::public_name(prefix, generated);
                    let id = tree.add_file(child.path, child.kind, child.modified, false);
                    tree.register_public(public, id);
                    tree.stats.record_file(child.kind, child.depth);
                }
                FileKind::Source => {
                    if !has_descriptor {
                        continue;
                    }
                    let fresh = is_fresh(child.modified);
                    let id = tree.add_file(child.path, child.kind, child.modified, fresh);
                    if fresh {
                        sources.push(id);
                    }
                    tree.stats.record_file(child.kind, child.depth);
                }
                FileKind::Header | FileKind::InterfaceDefinition => {
                    let fresh = is_fresh(child.modified);
                    let id = tree.add_file(child.path, child.kind, child.modified, fresh);
                    if let Some(ref prefix) = prefix {
                        tree.register_public(classify::public_name(prefix, &child.name), id);
                    }
                    tree.stats.record_file(child.kind, child.depth);
                }
            }
        }

        if !sources.is_empty() {
            let target = BuildTarget::new(dir, sources);
            tree.descriptors.push(target.descriptor.clone());
            tree.stats.descriptors += 1;
            tree.targets.push(target);
        }
    }
}

/// File collected during the walk, before classification into the tree.
struct EntryInfo {
    name: CompactString,
    path: PathBuf,
    kind: FileKind,
    modified: SystemTime,
    depth: u32,
}
