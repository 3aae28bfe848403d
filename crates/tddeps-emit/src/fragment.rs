//! CMake fragment rendering.
//!
//! The fragment has four sections, always in this order: per-`.td` dependency
//! lists, per-target group lists, the managed `td.*` names and, when a stamp
//! directory is configured, one custom command per directory stamp.

use std::collections::{BTreeSet, HashSet};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use tddeps_analyze::{DependencyGraph, GroupKey, StampForest, StampNode, TargetGroups};
use tddeps_core::DirAliases;

/// Closing token of every list.
const PARENT_SCOPE: &str = "PARENT_SCOPE";

/// Counters for one rendered fragment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FragmentStats {
    /// `.td` dependency lists written.
    pub td_lists: usize,
    /// Targets written.
    pub targets: usize,
    /// Group content lists written, after deduplication across targets.
    pub group_lists: usize,
    /// Names in `TDDEPS_MANAGED_FILES`.
    pub managed_files: usize,
    /// Stamps written.
    pub stamps: usize,
}

/// Variable-safe form of a file name: `.` and `-` become `_`.
pub fn variable_name(name: &str) -> String {
    name.replace(['.', '-'], "_")
}

/// Managed name of a group member: `td.<basename>`.
pub fn managed_name(path: &Path) -> String {
    let base = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned());
    format!("td.{base}")
}

/// Renders analysis results as a CMake fragment.
#[derive(Debug, Clone, Copy)]
pub struct FragmentWriter<'a> {
    aliases: &'a DirAliases,
    stamp_dir: Option<&'a Path>,
}

impl<'a> FragmentWriter<'a> {
    /// Create a writer rendering paths through `aliases`, without stamps.
    pub fn new(aliases: &'a DirAliases) -> Self {
        Self {
            aliases,
            stamp_dir: None,
        }
    }

    /// Emit the stamp section with stamp files under `dir`.
    pub fn with_stamp_dir(mut self, dir: Option<&'a Path>) -> Self {
        self.stamp_dir = dir;
        self
    }

    /// Write the full fragment to `out`.
    pub fn write<W: Write>(
        &self,
        out: &mut W,
        graph: &DependencyGraph<'_>,
        targets: &[TargetGroups],
        stamps: &StampForest,
    ) -> io::Result<FragmentStats> {
        let mut stats = FragmentStats::default();
        self.write_td_lists(out, graph, &mut stats)?;
        let managed = self.write_groups(out, targets, &mut stats)?;

        writeln!(out)?;
        writeln!(out, "set(TDDEPS_MANAGED_FILES")?;
        for name in &managed {
            writeln!(out, "  {name}")?;
        }
        writeln!(out, "  {PARENT_SCOPE})")?;
        stats.managed_files = managed.len();

        writeln!(out)?;
        writeln!(out, "######## Stamps")?;
        if let Some(stamp_dir) = self.stamp_dir {
            self.write_stamps(out, stamps, stamp_dir, &mut stats)?;
        }

        debug!(?stats, "fragment written");
        Ok(stats)
    }

    /// Render the fragment into a string.
    pub fn render(
        &self,
        graph: &DependencyGraph<'_>,
        targets: &[TargetGroups],
        stamps: &StampForest,
    ) -> io::Result<(String, FragmentStats)> {
        let mut buf = Vec::new();
        let stats = self.write(&mut buf, graph, targets, stamps)?;
        let text = String::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        Ok((text, stats))
    }

    fn render_path(&self, path: &Path) -> String {
        self.aliases.render(path)
    }

    fn write_td_lists<W: Write>(
        &self,
        out: &mut W,
        graph: &DependencyGraph<'_>,
        stats: &mut FragmentStats,
    ) -> io::Result<()> {
        writeln!(out, "######## Dependencies of *.td")?;
        let tree = graph.tree();
        for id in graph.interface_definitions() {
            let file = tree.file(id);
            let direct = graph.direct(id);
            let direct_set: HashSet<&PathBuf> = direct.iter().collect();

            writeln!(out, "set(TDDEPS_{}", variable_name(file.name()))?;
            writeln!(out, "  {}", self.render_path(&file.path))?;
            for dep in direct.iter().filter(|d| **d != file.path) {
                writeln!(out, "  {}", self.render_path(dep))?;
            }
            for dep in graph.closure(id).iter().filter(|d| !direct_set.contains(d)) {
                writeln!(out, "  {}", self.render_path(dep))?;
            }
            writeln!(out, "  {PARENT_SCOPE})")?;
            stats.td_lists += 1;
        }
        Ok(())
    }

    /// Write the group section, returning the managed names it used.
    fn write_groups<W: Write>(
        &self,
        out: &mut W,
        targets: &[TargetGroups],
        stats: &mut FragmentStats,
    ) -> io::Result<BTreeSet<String>> {
        writeln!(out)?;
        writeln!(out, "######## Groups")?;

        let mut registry: HashSet<&GroupKey> = HashSet::new();
        let mut managed = BTreeSet::new();

        for target in targets {
            writeln!(
                out,
                "# {}({}) ({}):",
                target.target,
                self.render_path(&target.dir),
                target.groups.len()
            )?;
            writeln!(out, "set(TDDEPSET_{}", target.target)?;
            for group in &target.groups {
                if group.is_hashed() {
                    writeln!(out, "  {} # {}", group.name, group.full_name)?;
                } else {
                    writeln!(out, "  {}", group.name)?;
                }
            }
            writeln!(out, "  {PARENT_SCOPE})")?;

            for group in &target.groups {
                if registry.insert(&group.key) {
                    writeln!(out, "set(TDDEPS_{}", group.name)?;
                    for dep in &group.key {
                        let name = managed_name(dep);
                        writeln!(out, "  {name}")?;
                        managed.insert(name);
                    }
                    writeln!(out, "  {PARENT_SCOPE})")?;
                    stats.group_lists += 1;
                } else if group.is_hashed() {
                    writeln!(out, "# {}", group.full_name)?;
                }

                writeln!(out, "set(TDDEPS_{}_{}", target.target, group.name)?;
                for file in &group.files {
                    writeln!(out, "  {}", file.display())?;
                }
                writeln!(out, "  {PARENT_SCOPE})")?;
            }
            stats.targets += 1;
        }
        Ok(managed)
    }

    fn write_stamps<W: Write>(
        &self,
        out: &mut W,
        stamps: &StampForest,
        stamp_dir: &Path,
        stats: &mut FragmentStats,
    ) -> io::Result<()> {
        let mut stamp_lines = Vec::new();
        for node in stamps.emission_order() {
            let stamp_path = self.render_path(&node.stamp_file(stamp_dir));
            stamp_lines.push(format!("  {stamp_path} # {}", node.label));

            writeln!(out, "# {}", node.label)?;
            writeln!(out, "set({}", node.srcs_name())?;
            for file in &node.files {
                writeln!(out, "    {}", self.render_path(file))?;
            }
            for child in stamps.children(node) {
                writeln!(out, "    {} # {}", stamp_ref(child), child.label)?;
            }
            writeln!(out, "  )")?;
            writeln!(out, "add_custom_command(OUTPUT {stamp_path}")?;
            writeln!(out, "  COMMAND touch {stamp_path}")?;
            writeln!(out, "  DEPENDS {}", stamp_ref(node))?;
            writeln!(out, "  COMMENT \"Touched: \\{}\")", node.label)?;
            writeln!(out)?;
            stats.stamps += 1;
        }

        writeln!(out, "set(STAMPS_DEPENDS")?;
        for root in stamps.root_stamps() {
            writeln!(out, "  {} # {}", stamp_ref(root), root.label)?;
        }
        for line in &stamp_lines {
            writeln!(out, "{line}")?;
        }
        writeln!(out, "  )")?;
        Ok(())
    }
}

/// Reference to a stamp's dependency list: `${SRCS_<hash>}`.
fn stamp_ref(node: &StampNode) -> String {
    format!("${{{}}}", node.srcs_name())
}
