//! Include resolution.
//!
//! A quoted include is looked up in the public-name map first, then relative
//! to each ancestor of the including file's directory up to and including the
//! first root or include directory. Anything else becomes a placeholder keyed
//! by the raw text.

use std::path::Path;

use compact_str::CompactString;
use tracing::warn;

use tddeps_core::{DepsWarning, FileId, SourceTree, paths};

/// Outcome of resolving one include string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Resolution {
    /// A tracked file.
    File(FileId),
    /// Unresolved include, kept by its raw text.
    Placeholder(CompactString),
}

/// Resolves include strings against a scanned tree.
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'t> {
    tree: &'t SourceTree,
}

impl<'t> Resolver<'t> {
    /// Create a resolver over `tree`.
    pub fn new(tree: &'t SourceTree) -> Self {
        Self { tree }
    }

    /// Resolve `include` as written in the file at `from`.
    ///
    /// Unresolved header-like includes push a warning onto `warnings`.
    pub fn resolve(&self, from: &Path, include: &str, warnings: &mut Vec<DepsWarning>) -> Resolution {
        if let Some(id) = self.tree.public(include) {
            return Resolution::File(id);
        }

        let mut dir = from.parent();
        while let Some(current) = dir {
            let candidate = paths::normalize(current.join(include));
            if let Some(id) = self.tree.lookup(&candidate) {
                return Resolution::File(id);
            }
            if self.tree.is_boundary(current) {
                break;
            }
            dir = current.parent();
        }

        if is_header_like(include) {
            warn!("NOTFOUND {include} in {}", from.display());
            warnings.push(DepsWarning::unresolved(from, include));
        }
        Resolution::Placeholder(CompactString::from(include))
    }
}

/// Whether an include names a C/C++ header by extension.
pub fn is_header_like(include: &str) -> bool {
    Path::new(include)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| matches!(e, "h" | "hh" | "hpp" | "hxx"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::SystemTime;
    use tddeps_core::{FileKind, WarningKind};

    fn tree() -> SourceTree {
        let mut tree = SourceTree::new(
            vec![PathBuf::from("/r")],
            vec![PathBuf::from("/r/include")],
        );
        let now = SystemTime::now();
        let value = tree.add_file("/r/include/llvm/Value.h".into(), FileKind::Header, now, true);
        tree.register_public("llvm/Value.h", value);
        tree.add_file("/r/lib/IR/Local.h".into(), FileKind::Header, now, true);
        tree.add_file("/r/lib/Shared.h".into(), FileKind::Header, now, true);
        tree.add_file("/r/Top.h".into(), FileKind::Header, now, true);
        tree.add_file("/r/lib/IR/sub/Inner.cpp".into(), FileKind::Source, now, true);
        tree
    }

    #[test]
    fn test_public_name_first() {
        let tree = tree();
        let resolver = Resolver::new(&tree);
        let mut warnings = Vec::new();
        let res = resolver.resolve(Path::new("/r/lib/IR/a.cpp"), "llvm/Value.h", &mut warnings);
        assert_eq!(res, Resolution::File(tree.public("llvm/Value.h").unwrap()));
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_ancestor_walk() {
        let tree = tree();
        let resolver = Resolver::new(&tree);
        let mut warnings = Vec::new();

        let local = tree.lookup(Path::new("/r/lib/IR/Local.h")).unwrap();
        let res = resolver.resolve(Path::new("/r/lib/IR/sub/Inner.cpp"), "Local.h", &mut warnings);
        assert_eq!(res, Resolution::File(local));

        let shared = tree.lookup(Path::new("/r/lib/Shared.h")).unwrap();
        let res = resolver.resolve(Path::new("/r/lib/IR/a.cpp"), "Shared.h", &mut warnings);
        assert_eq!(res, Resolution::File(shared));

        // The root itself is tested before the walk stops.
        let top = tree.lookup(Path::new("/r/Top.h")).unwrap();
        let res = resolver.resolve(Path::new("/r/lib/IR/a.cpp"), "Top.h", &mut warnings);
        assert_eq!(res, Resolution::File(top));

        // Lexical normalization of `..`.
        let res = resolver.resolve(Path::new("/r/lib/IR/a.cpp"), "../Shared.h", &mut warnings);
        assert_eq!(res, Resolution::File(shared));
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_walk_stops_at_include_dir() {
        let tree = tree();
        let resolver = Resolver::new(&tree);
        let mut warnings = Vec::new();
        let res = resolver.resolve(Path::new("/r/include/llvm/Value.h"), "Top.h", &mut warnings);
        assert_eq!(res, Resolution::Placeholder("Top.h".into()));
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_placeholder_and_diagnostics() {
        let tree = tree();
        let resolver = Resolver::new(&tree);
        let mut warnings = Vec::new();

        let res = resolver.resolve(Path::new("/r/lib/a.cpp"), "missing.h", &mut warnings);
        assert_eq!(res, Resolution::Placeholder("missing.h".into()));
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind, WarningKind::UnresolvedInclude);

        // Generated .inc files are expected to be missing and stay quiet.
        let res = resolver.resolve(Path::new("/r/lib/a.cpp"), "Gen.inc", &mut warnings);
        assert_eq!(res, Resolution::Placeholder("Gen.inc".into()));
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_header_like() {
        assert!(is_header_like("a.h"));
        assert!(is_header_like("dir/a.hpp"));
        assert!(is_header_like("a.hh"));
        assert!(is_header_like("a.hxx"));
        assert!(!is_header_like("a.inc"));
        assert!(!is_header_like("a.def"));
        assert!(!is_header_like("a.td"));
    }
}
