//! Lexical path helpers and alias rendering.
//!
//! Nothing here touches the filesystem: include resolution and batching work
//! on normalized path strings so that `a/../b` and `b` compare equal.

use std::path::{Component, Path, PathBuf};

use compact_str::CompactString;

/// Normalize a path lexically, folding `.` and `..` components.
///
/// `..` at the start of a relative path is preserved; `..` directly under the
/// root is dropped.
pub fn normalize(path: impl AsRef<Path>) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.as_ref().components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let last = out.components().next_back();
                match last {
                    Some(Component::Normal(_)) => {
                        out.pop();
                    }
                    Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                    _ => out.push(".."),
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

/// Lowest common ancestor of two normalized paths.
pub fn common_ancestor(a: &Path, b: &Path) -> PathBuf {
    a.components()
        .zip(b.components())
        .take_while(|(x, y)| x == y)
        .map(|(x, _)| x.as_os_str())
        .collect()
}

/// Number of components in a path.
pub fn depth(path: &Path) -> usize {
    path.components().count()
}

/// Length in bytes of `path` relative to `base`, as passed on a command line.
pub fn relative_len(path: &Path, base: &Path) -> usize {
    path.strip_prefix(base)
        .map(|rel| rel.as_os_str().len())
        .unwrap_or_else(|_| path.as_os_str().len())
}

/// Strip a known-good template suffix (`.in`, `.cmake`) from a file name.
pub fn strip_template_suffix(name: &str) -> Option<&str> {
    name.strip_suffix(".in").or_else(|| name.strip_suffix(".cmake"))
}

/// Maps directories to symbolic names rendered as `${NAME}`.
#[derive(Debug, Clone, Default)]
pub struct DirAliases {
    entries: Vec<(CompactString, PathBuf)>,
}

impl DirAliases {
    /// Create an empty alias table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to `dir`.
    pub fn insert(&mut self, name: impl Into<CompactString>, dir: impl Into<PathBuf>) {
        self.entries.push((name.into(), normalize(dir.into())));
    }

    /// Number of aliases.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no alias is defined.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render a path, replacing the deepest aliased ancestor with `${NAME}`.
    pub fn render(&self, path: &Path) -> String {
        let best = self
            .entries
            .iter()
            .filter_map(|(name, dir)| path.strip_prefix(dir).ok().map(|rest| (name, dir, rest)))
            .max_by_key(|(_, dir, _)| depth(dir));

        match best {
            Some((name, _, rest)) if rest.as_os_str().is_empty() => format!("${{{name}}}"),
            Some((name, _, rest)) => format!("${{{name}}}/{}", rest.display()),
            None => path.display().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("/a/b/../c/./d.h"), PathBuf::from("/a/c/d.h"));
        assert_eq!(normalize("/a/b/"), PathBuf::from("/a/b"));
        assert_eq!(normalize("/../x"), PathBuf::from("/x"));
        assert_eq!(normalize("../x"), PathBuf::from("../x"));
        assert_eq!(normalize("a/.."), PathBuf::from("."));
    }

    #[test]
    fn test_common_ancestor() {
        assert_eq!(
            common_ancestor(Path::new("/r/lib/IR"), Path::new("/r/lib/Support")),
            PathBuf::from("/r/lib")
        );
        assert_eq!(
            common_ancestor(Path::new("/r/llvm/a"), Path::new("/r/clang")),
            PathBuf::from("/r")
        );
        // Component-wise, not string-wise.
        assert_eq!(
            common_ancestor(Path::new("/r/clang"), Path::new("/r/clang-tools")),
            PathBuf::from("/r")
        );
    }

    #[test]
    fn test_relative_len() {
        assert_eq!(relative_len(Path::new("/r/lib/a.cpp"), Path::new("/r")), "lib/a.cpp".len());
        assert_eq!(relative_len(Path::new("/x/a.cpp"), Path::new("/r")), "/x/a.cpp".len());
    }

    #[test]
    fn test_strip_template_suffix() {
        assert_eq!(strip_template_suffix("config.h.cmake"), Some("config.h"));
        assert_eq!(strip_template_suffix("abi.def.in"), Some("abi.def"));
        assert_eq!(strip_template_suffix("a.h"), None);
    }

    #[test]
    fn test_alias_render() {
        let mut aliases = DirAliases::new();
        aliases.insert("LLVM", "/src/llvm");
        aliases.insert("CLANG", "/src/llvm/tools/clang");

        assert_eq!(aliases.render(Path::new("/src/llvm/lib/IR")), "${LLVM}/lib/IR");
        assert_eq!(
            aliases.render(Path::new("/src/llvm/tools/clang/lib")),
            "${CLANG}/lib"
        );
        assert_eq!(aliases.render(Path::new("/src/llvm")), "${LLVM}");
        assert_eq!(aliases.render(Path::new("/elsewhere/x.h")), "/elsewhere/x.h");
        // Sibling with a common string prefix is not aliased.
        assert_eq!(aliases.render(Path::new("/src/llvm2/x.h")), "/src/llvm2/x.h");
    }
}
