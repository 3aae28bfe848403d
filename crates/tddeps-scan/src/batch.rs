//! Argument-length-bounded batching of file paths.

use std::path::{Path, PathBuf};

use tddeps_core::paths;

/// A group of files searched by one invocation from a common directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    /// Submission sequence number.
    pub seq: usize,
    /// Working directory: lowest common ancestor of the files' directories.
    pub cwd: PathBuf,
    /// Absolute file paths, in input order.
    pub files: Vec<PathBuf>,
}

impl Batch {
    /// File paths relative to `cwd`, as passed on a command line.
    pub fn args(&self) -> Vec<PathBuf> {
        self.files
            .iter()
            .map(|f| f.strip_prefix(&self.cwd).map(Path::to_path_buf).unwrap_or_else(|_| f.clone()))
            .collect()
    }

    /// Total argument length: one separator plus the relative path per file.
    pub fn arg_len(&self) -> usize {
        self.files
            .iter()
            .map(|f| 1 + paths::relative_len(f, &self.cwd))
            .sum()
    }

    /// Number of files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether the batch holds no file.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Splits an ordered path sequence into batches below an argument-length ceiling.
///
/// Widening the working directory of a partial batch lengthens every path
/// already in it, so the running length is adjusted each time the common
/// ancestor moves up.
#[derive(Debug)]
pub struct BatchBuilder {
    arg_max: usize,
    next_seq: usize,
    cwd: PathBuf,
    files: Vec<PathBuf>,
    len: usize,
    done: Vec<Batch>,
}

impl BatchBuilder {
    /// Create a builder with the given ceiling.
    pub fn new(arg_max: usize) -> Self {
        Self {
            arg_max,
            next_seq: 0,
            cwd: PathBuf::new(),
            files: Vec::new(),
            len: 0,
            done: Vec::new(),
        }
    }

    /// Append a file.
    pub fn push(&mut self, file: PathBuf) {
        let dir = file.parent().map(Path::to_path_buf).unwrap_or_default();

        if self.files.is_empty() {
            self.start(dir, file);
            return;
        }

        let cwd = paths::common_ancestor(&self.cwd, &dir);
        let widened = if cwd == self.cwd {
            self.len
        } else {
            let step = 1 + paths::relative_len(&self.cwd, &cwd);
            self.len + self.files.len() * step
        };
        let total = widened + 1 + paths::relative_len(&file, &cwd);

        if total >= self.arg_max {
            self.flush();
            self.start(dir, file);
        } else {
            self.cwd = cwd;
            self.len = total;
            self.files.push(file);
        }
    }

    /// Finish and return all batches in submission order.
    pub fn finish(mut self) -> Vec<Batch> {
        self.flush();
        self.done
    }

    /// Batch a whole sequence.
    pub fn split<I>(arg_max: usize, files: I) -> Vec<Batch>
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let mut builder = Self::new(arg_max);
        for file in files {
            builder.push(file);
        }
        builder.finish()
    }

    fn start(&mut self, dir: PathBuf, file: PathBuf) {
        self.len = 1 + paths::relative_len(&file, &dir);
        self.cwd = dir;
        self.files.push(file);
    }

    fn flush(&mut self) {
        if self.files.is_empty() {
            return;
        }
        self.done.push(Batch {
            seq: self.next_seq,
            cwd: std::mem::take(&mut self.cwd),
            files: std::mem::take(&mut self.files),
        });
        self.next_seq += 1;
        self.len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn to_paths(list: &[&str]) -> Vec<PathBuf> {
        list.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn test_single_dir_batch() {
        let batches = BatchBuilder::split(1000, to_paths(&["/r/lib/a.cpp", "/r/lib/b.cpp"]));
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].cwd, PathBuf::from("/r/lib"));
        assert_eq!(batches[0].args(), to_paths(&["a.cpp", "b.cpp"]));
        assert_eq!(batches[0].arg_len(), 12);
    }

    #[test]
    fn test_cwd_widens_to_common_ancestor() {
        let batches = BatchBuilder::split(
            1000,
            to_paths(&["/r/lib/IR/a.cpp", "/r/lib/Support/b.cpp", "/r/include/c.h"]),
        );
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].cwd, PathBuf::from("/r"));
        assert_eq!(
            batches[0].args(),
            to_paths(&["lib/IR/a.cpp", "lib/Support/b.cpp", "include/c.h"])
        );
    }

    #[test]
    fn test_running_length_matches_actual() {
        let files = to_paths(&[
            "/r/lib/IR/a.cpp",
            "/r/lib/IR/bb.cpp",
            "/r/lib/Support/c.cpp",
            "/r/tools/opt/d.cpp",
        ]);
        let mut builder = BatchBuilder::new(10_000);
        for f in files {
            builder.push(f);
            let actual: usize = builder
                .files
                .iter()
                .map(|f| 1 + paths::relative_len(f, &builder.cwd))
                .sum();
            assert_eq!(builder.len, actual);
        }
    }

    #[test]
    fn test_ceiling_splits_batches() {
        let files: Vec<PathBuf> = (0..50).map(|i| PathBuf::from(format!("/r/d/f{i:03}.h"))).collect();
        // Each arg is 1 + "fNNN.h".len() = 8.
        let batches = BatchBuilder::split(40, files.clone());

        for batch in &batches {
            assert!(batch.arg_len() < 40);
        }
        let flattened: Vec<PathBuf> = batches.iter().flat_map(|b| b.files.clone()).collect();
        assert_eq!(flattened, files);
        let seqs: Vec<usize> = batches.iter().map(|b| b.seq).collect();
        assert_eq!(seqs, (0..batches.len()).collect::<Vec<_>>());
    }

    #[test]
    fn test_oversized_path_gets_own_batch() {
        let long = format!("/r/{}.h", "x".repeat(100));
        let batches = BatchBuilder::split(50, to_paths(&["/r/a.h", long.as_str(), "/r/b.h"]));
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[1].files, vec![PathBuf::from(&long)]);
    }

    #[test]
    fn test_empty_input() {
        assert!(BatchBuilder::split(100, Vec::new()).is_empty());
    }
}
