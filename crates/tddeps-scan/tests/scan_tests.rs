use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use compact_str::CompactString;
use tddeps_scan::{
    BatchBuilder, DepsConfig, DepsError, Extractor, FileKind, GrepSearch, InProcessSearch,
    RootSpec, TreeWalker,
};
use tempfile::TempDir;

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn create_source_tree() -> TempDir {
    let temp = TempDir::new().unwrap();
    let root = temp.path();

    write(root, "include/llvm/IR/Value.h", "#include \"llvm/IR/Type.h\"\n");
    write(root, "include/llvm/IR/Type.h", "// leaf\n");
    write(root, "include/llvm/Config/config.h.in", "#define X 1\n");
    write(
        root,
        "lib/IR/CMakeLists.txt",
        "add_llvm_library(LLVMCore\n  Value.cpp\n  )\n",
    );
    write(
        root,
        "lib/IR/Value.cpp",
        "#include \"llvm/IR/Value.h\"\n#include \"llvm/Config/config.h\"\n#include <vector>\n",
    );
    write(root, "lib/IR/Local.h", "");
    write(
        root,
        "lib/Old/CMakeLists.txt",
        "# TDDEPS: exclude\nadd_llvm_library(LLVMOld\n  Old.cpp)\n",
    );
    write(root, "lib/Old/Old.cpp", "#include \"Local.h\"\n");
    write(root, "lib/Target/X86/CMakeLists.txt", "add_llvm_target(X86CodeGen\n  X86.cpp)\n");
    write(root, "lib/Target/X86/X86.cpp", "");
    write(root, "lib/Target/X86/X86.td", "include \"llvm/Target/Target.td\"\n");
    write(root, "include/llvm/Target/Target.td", "");

    temp
}

fn walk(temp: &TempDir) -> (DepsConfig, tddeps_scan::SourceTree) {
    let config = DepsConfig::new(vec![RootSpec::aliased("LLVM", temp.path())]);
    let tree = TreeWalker::new().walk(&config).unwrap();
    (config, tree)
}

#[test]
fn test_walk_classifies_tree() {
    let temp = create_source_tree();
    let (_, tree) = walk(&temp);

    assert_eq!(tree.targets.len(), 3);
    assert_eq!(tree.stats.interface_definitions, 2);
    assert_eq!(tree.stats.template_headers, 1);

    let td = tree.public("llvm/Target/Target.td").unwrap();
    assert_eq!(tree.file(td).kind, FileKind::InterfaceDefinition);
    // Headers outside include directories are tracked but have no public name.
    assert!(tree.lookup(&temp.path().join("lib/IR/Local.h")).is_some());
    assert!(tree.public("Local.h").is_none());
}

#[test]
fn test_descriptor_scan_names_targets() {
    let temp = create_source_tree();
    let (config, mut tree) = walk(&temp);

    let extractor = Extractor::from_config(&config, Arc::new(InProcessSearch::new())).unwrap();
    let scan = extractor.scan_descriptors(&tree.descriptors).unwrap();
    scan.apply(&mut tree);

    let names: HashMap<PathBuf, Option<String>> = tree
        .targets
        .iter()
        .map(|t| (t.dir.clone(), t.name.as_ref().map(|n| n.to_string())))
        .collect();
    assert_eq!(names[&temp.path().join("lib/IR")].as_deref(), Some("LLVMCore"));
    assert_eq!(
        names[&temp.path().join("lib/Target/X86")].as_deref(),
        Some("LLVMX86CodeGen")
    );
    assert_eq!(names[&temp.path().join("lib/Old")], None);
    assert!(scan.is_excluded(&temp.path().join("lib/Old")));
}

#[test]
fn test_include_extraction_streams_every_file() {
    let temp = create_source_tree();
    let (_, tree) = walk(&temp);
    let queued = tree.queued_paths();

    let extractor = Extractor::new(Arc::new(InProcessSearch::new()), 2, 64).unwrap();
    let mut seen = Vec::new();
    let stats = extractor
        .extract_includes(&queued, |file| {
            seen.push(file);
            Ok(())
        })
        .unwrap();

    // Every queued file is reported exactly once, in queue order.
    let order: Vec<PathBuf> = seen.iter().map(|f| f.path.clone()).collect();
    assert_eq!(order, queued);
    assert_eq!(stats.files, queued.len());
    assert!(stats.batches > 1);

    let value_cpp = seen
        .iter()
        .find(|f| f.path.ends_with("lib/IR/Value.cpp"))
        .unwrap();
    assert_eq!(
        value_cpp.includes,
        vec![
            CompactString::from("llvm/IR/Value.h"),
            CompactString::from("llvm/Config/config.h"),
        ]
    );
    let type_h = seen.iter().find(|f| f.path.ends_with("Type.h")).unwrap();
    assert!(type_h.includes.is_empty());
}

#[test]
fn test_batches_cover_queue() {
    let temp = create_source_tree();
    let (_, tree) = walk(&temp);
    let queued = tree.queued_paths();

    let batches = BatchBuilder::split(80, queued.clone());
    let flattened: Vec<PathBuf> = batches.iter().flat_map(|b| b.files.clone()).collect();
    assert_eq!(flattened, queued);
    for batch in &batches {
        for file in &batch.files {
            assert!(file.starts_with(&batch.cwd));
        }
    }
}

#[test]
fn test_missing_search_program_is_fatal() {
    let temp = create_source_tree();
    let (_, tree) = walk(&temp);

    let searcher = Arc::new(GrepSearch::with_program("tddeps-no-such-grep"));
    let extractor = Extractor::new(searcher, 1, 32767).unwrap();
    let err = extractor
        .extract_includes(&tree.queued_paths(), |_| Ok(()))
        .unwrap_err();
    assert!(matches!(err, DepsError::SearchSpawn { .. }));
}
