//! Directory stamp forest for incremental rebuilds.
//!
//! Every tracked file hangs off the node of its directory. Each node is
//! linked into its parent up to the nearest root, so a stamp depends on the
//! files directly in its directory and on the stamps of its subdirectories.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use tddeps_core::{ContentHash, DirAliases, FileKind, SourceTree, paths};

/// One directory stamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StampNode {
    /// Directory this stamp covers.
    pub dir: PathBuf,
    /// Directory as rendered through the alias table.
    pub label: String,
    /// Hex digest of `label`.
    pub hash: String,
    /// Component count of `dir`.
    pub depth: usize,
    /// Tracked files directly in `dir`, sorted.
    pub files: Vec<PathBuf>,
    /// Immediate subdirectories with their own stamp.
    pub children: BTreeSet<PathBuf>,
}

impl StampNode {
    fn new(dir: &Path, aliases: &DirAliases) -> Self {
        let label = aliases.render(dir);
        Self {
            dir: dir.to_path_buf(),
            hash: ContentHash::of_str(&label).to_hex(),
            depth: paths::depth(dir),
            label,
            files: Vec::new(),
            children: BTreeSet::new(),
        }
    }

    /// Build-system variable listing this stamp's dependencies.
    pub fn srcs_name(&self) -> String {
        format!("SRCS_{}", self.hash)
    }

    /// Stamp file materialized under `stamp_dir`.
    pub fn stamp_file(&self, stamp_dir: &Path) -> PathBuf {
        stamp_dir.join(format!("stamp-{}.tmp", self.hash))
    }
}

/// All stamps of a run, keyed by directory.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StampForest {
    nodes: BTreeMap<PathBuf, StampNode>,
    /// Top stamp per root, by root index.
    roots: Vec<Option<PathBuf>>,
}

impl StampForest {
    /// Build the forest over the tracked files of `tree`.
    ///
    /// Template headers and build descriptors carry no stamp; files in
    /// `excluded` directories are left out.
    pub fn build(tree: &SourceTree, excluded: &BTreeSet<PathBuf>, aliases: &DirAliases) -> Self {
        let mut forest = Self {
            nodes: BTreeMap::new(),
            roots: vec![None; tree.roots.len()],
        };

        for file in tree.files() {
            if matches!(file.kind, FileKind::TemplateHeader | FileKind::BuildDescriptor) {
                continue;
            }
            let dir = file.dir();
            if excluded.contains(dir) {
                continue;
            }
            forest
                .nodes
                .entry(dir.to_path_buf())
                .or_insert_with(|| StampNode::new(dir, aliases))
                .files
                .push(file.path.clone());
            forest.link_upward(tree, dir, aliases);
        }

        for node in forest.nodes.values_mut() {
            node.files.sort();
        }
        debug!(stamps = forest.nodes.len(), "stamp forest built");
        forest
    }

    fn link_upward(&mut self, tree: &SourceTree, start: &Path, aliases: &DirAliases) {
        let mut dir = start.to_path_buf();
        loop {
            if let Some(idx) = tree.roots.iter().position(|r| *r == dir) {
                self.roots[idx] = Some(dir);
                return;
            }
            let Some(parent) = dir.parent().map(Path::to_path_buf) else {
                return;
            };
            let node = self
                .nodes
                .entry(parent.clone())
                .or_insert_with(|| StampNode::new(&parent, aliases));
            if !node.children.insert(dir) {
                return;
            }
            dir = parent;
        }
    }

    /// Number of stamps.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether there is no stamp.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Stamp covering `dir`.
    pub fn get(&self, dir: &Path) -> Option<&StampNode> {
        self.nodes.get(dir)
    }

    /// Child stamps of `node`, ordered by label.
    pub fn children(&self, node: &StampNode) -> Vec<&StampNode> {
        let mut out: Vec<&StampNode> = node.children.iter().filter_map(|c| self.nodes.get(c)).collect();
        out.sort_by(|a, b| a.label.cmp(&b.label));
        out
    }

    /// Top stamps of the roots that contain tracked files, in root order.
    pub fn root_stamps(&self) -> Vec<&StampNode> {
        self.roots
            .iter()
            .flatten()
            .filter_map(|dir| self.nodes.get(dir))
            .collect()
    }

    /// Stamps bottom-up: deepest first, ties by path.
    pub fn emission_order(&self) -> Vec<&StampNode> {
        let mut out: Vec<&StampNode> = self.nodes.values().collect();
        out.sort_by(|a, b| b.depth.cmp(&a.depth).then_with(|| a.dir.cmp(&b.dir)));
        out
    }

    /// Stamp files of every node under `stamp_dir`, in emission order.
    pub fn stamp_files(&self, stamp_dir: &Path) -> Vec<PathBuf> {
        self.emission_order()
            .into_iter()
            .map(|node| node.stamp_file(stamp_dir))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;

    fn tree() -> SourceTree {
        let mut tree = SourceTree::new(vec![PathBuf::from("/r")], vec![PathBuf::from("/r/include")]);
        let now = SystemTime::now();
        for (path, kind) in [
            ("/r/include/llvm/IR/Value.h", FileKind::Header),
            ("/r/include/llvm/Config/config.h.in", FileKind::TemplateHeader),
            ("/r/lib/IR/Value.cpp", FileKind::Source),
            ("/r/lib/IR/Type.cpp", FileKind::Source),
            ("/r/lib/Old/Old.cpp", FileKind::Source),
            ("/r/Top.h", FileKind::Header),
        ] {
            tree.add_file(path.into(), kind, now, true);
        }
        tree
    }

    fn aliases() -> DirAliases {
        let mut aliases = DirAliases::new();
        aliases.insert("LLVM", "/r");
        aliases
    }

    #[test]
    fn test_forest_mirrors_directories() {
        let tree = tree();
        let forest = StampForest::build(&tree, &BTreeSet::new(), &aliases());

        let ir = forest.get(Path::new("/r/lib/IR")).unwrap();
        assert_eq!(ir.label, "${LLVM}/lib/IR");
        assert_eq!(
            ir.files,
            vec![PathBuf::from("/r/lib/IR/Type.cpp"), PathBuf::from("/r/lib/IR/Value.cpp")]
        );
        assert!(ir.children.is_empty());

        let lib = forest.get(Path::new("/r/lib")).unwrap();
        assert!(lib.files.is_empty());
        assert_eq!(
            lib.children.iter().cloned().collect::<Vec<_>>(),
            vec![PathBuf::from("/r/lib/IR"), PathBuf::from("/r/lib/Old")]
        );

        let root = forest.get(Path::new("/r")).unwrap();
        assert_eq!(root.files, vec![PathBuf::from("/r/Top.h")]);
        assert!(root.children.contains(Path::new("/r/include")));
        assert!(root.children.contains(Path::new("/r/lib")));

        // Template headers carry no stamp of their own.
        assert!(forest.get(Path::new("/r/include/llvm/Config")).is_none());
        assert_eq!(forest.root_stamps().len(), 1);
        assert_eq!(forest.root_stamps()[0].dir, PathBuf::from("/r"));
    }

    #[test]
    fn test_every_child_is_an_immediate_subdirectory() {
        let tree = tree();
        let forest = StampForest::build(&tree, &BTreeSet::new(), &aliases());
        for node in forest.emission_order() {
            for child in &node.children {
                assert_eq!(child.parent(), Some(node.dir.as_path()));
                assert_eq!(forest.get(child).unwrap().depth, node.depth + 1);
            }
        }
    }

    #[test]
    fn test_emission_is_bottom_up() {
        let tree = tree();
        let forest = StampForest::build(&tree, &BTreeSet::new(), &aliases());
        let order = forest.emission_order();
        assert_eq!(order.first().unwrap().dir, PathBuf::from("/r/include/llvm/IR"));
        assert_eq!(order.last().unwrap().dir, PathBuf::from("/r"));
        for pair in order.windows(2) {
            assert!(pair[0].depth >= pair[1].depth);
        }
    }

    #[test]
    fn test_excluded_directory_has_no_stamp() {
        let tree = tree();
        let excluded = BTreeSet::from([PathBuf::from("/r/lib/Old")]);
        let forest = StampForest::build(&tree, &excluded, &aliases());
        assert!(forest.get(Path::new("/r/lib/Old")).is_none());
        let lib = forest.get(Path::new("/r/lib")).unwrap();
        assert_eq!(lib.children.len(), 1);
    }

    #[test]
    fn test_stamp_names() {
        let tree = tree();
        let forest = StampForest::build(&tree, &BTreeSet::new(), &aliases());
        let ir = forest.get(Path::new("/r/lib/IR")).unwrap();
        assert_eq!(ir.hash, ContentHash::of_str("${LLVM}/lib/IR").to_hex());
        assert_eq!(ir.srcs_name(), format!("SRCS_{}", ir.hash));
        assert_eq!(
            ir.stamp_file(Path::new("/b/stamps")),
            PathBuf::from(format!("/b/stamps/stamp-{}.tmp", ir.hash))
        );
    }
}
