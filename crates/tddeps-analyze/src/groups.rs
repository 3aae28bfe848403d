//! Grouping of target sources by identical closure.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use compact_str::CompactString;
use itertools::Itertools;
use serde::Serialize;

use tddeps_core::ContentHash;

use crate::graph::DependencyGraph;

/// Sorted dependency labels shared by every file of a group.
pub type GroupKey = Vec<PathBuf>;

/// Files of one target sharing a closure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Group {
    /// Shared dependency set.
    pub key: GroupKey,
    /// Emitted name, possibly hashed.
    pub name: String,
    /// Readable name derived from the key.
    pub full_name: String,
    /// Member paths relative to the target directory, sorted.
    pub files: Vec<PathBuf>,
}

impl Group {
    /// Whether the emitted name is a hash of the readable one.
    pub fn is_hashed(&self) -> bool {
        self.name != self.full_name
    }
}

/// All groups of one named target.
#[derive(Debug, Clone, Serialize)]
pub struct TargetGroups {
    /// Target name.
    pub target: CompactString,
    /// Target directory.
    pub dir: PathBuf,
    /// Groups sorted by key.
    pub groups: Vec<Group>,
}

/// Readable group name: sorted extension-less basenames joined by `_`.
///
/// An empty key is named `None`.
pub fn full_group_name(key: &[PathBuf]) -> String {
    if key.is_empty() {
        return "None".to_string();
    }
    key.iter()
        .map(|p| {
            p.file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default()
        })
        .join("_")
        .replace('.', "_")
}

/// Emitted group name: the readable name, or its hash above `limit` characters.
pub fn group_name(full: &str, limit: usize) -> String {
    if full.len() > limit {
        ContentHash::of_str(full).to_hex()
    } else {
        full.to_string()
    }
}

/// Hash of the full key paths, used when two keys share a readable name.
fn key_hash(key: &[PathBuf]) -> String {
    let joined = key.iter().map(|p| p.to_string_lossy()).join("\n");
    ContentHash::of_str(&joined).to_hex()
}

/// Emitted names, unique per key across all targets.
#[derive(Debug, Default)]
struct GroupNames {
    by_key: HashMap<GroupKey, String>,
    owner: HashMap<String, GroupKey>,
}

impl GroupNames {
    fn assign(&mut self, key: &GroupKey, full_name: &str, limit: usize) -> String {
        if let Some(name) = self.by_key.get(key) {
            return name.clone();
        }
        let mut name = group_name(full_name, limit);
        if self.owner.get(&name).is_some_and(|other| other != key) {
            name = key_hash(key);
        }
        self.owner.insert(name.clone(), key.clone());
        self.by_key.insert(key.clone(), name.clone());
        name
    }
}

/// Partition the sources of every named, non-excluded target.
///
/// Keys whose readable names collide are named by the hash of their paths.
pub fn build_groups(graph: &DependencyGraph<'_>, name_limit: usize) -> Vec<TargetGroups> {
    let tree = graph.tree();
    let mut names = GroupNames::default();
    let mut out = Vec::new();

    for target in &tree.targets {
        let Some(ref name) = target.name else { continue };
        if graph.is_excluded(&target.dir) {
            continue;
        }

        let mut by_key: BTreeMap<GroupKey, Vec<PathBuf>> = BTreeMap::new();
        for &id in &target.sources {
            let file = tree.file(id);
            by_key
                .entry(graph.group_key(id))
                .or_default()
                .push(relative_to(&file.path, &target.dir));
        }

        let groups = by_key
            .into_iter()
            .map(|(key, mut files)| {
                files.sort();
                let full_name = full_group_name(&key);
                Group {
                    name: names.assign(&key, &full_name, name_limit),
                    full_name,
                    key,
                    files,
                }
            })
            .collect();

        out.push(TargetGroups {
            target: name.clone(),
            dir: target.dir.clone(),
            groups,
        });
    }
    out
}

fn relative_to(path: &Path, dir: &Path) -> PathBuf {
    path.strip_prefix(dir)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| path.to_path_buf())
}
