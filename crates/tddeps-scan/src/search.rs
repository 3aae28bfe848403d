//! Line search over batches of files.
//!
//! Extraction only needs "which lines of these files match this pattern".
//! [`GrepSearch`] delegates that to an external `grep`; [`InProcessSearch`]
//! answers it with the `regex` crate.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use tddeps_core::{DepsError, paths};

use crate::batch::Batch;

/// Extended regular expression understood by both `grep -E` and [`Regex`].
#[derive(Debug, Clone)]
pub struct SearchPattern {
    expr: String,
    regex: Regex,
}

impl SearchPattern {
    /// Compile a pattern.
    pub fn new(expr: impl Into<String>) -> Result<Self, DepsError> {
        let expr = expr.into();
        let regex = Regex::new(&expr).map_err(|e| DepsError::InvalidConfig {
            message: format!("bad search pattern: {e}"),
        })?;
        Ok(Self { expr, regex })
    }

    /// Pattern source text.
    pub fn as_str(&self) -> &str {
        &self.expr
    }

    /// Whether a line matches.
    pub fn is_match(&self, line: &str) -> bool {
        self.regex.is_match(line)
    }
}

/// One matching line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    /// Absolute path of the file.
    pub file: PathBuf,
    /// 1-based line number.
    pub line: u32,
    /// Line text without the trailing newline.
    pub text: String,
}

/// Something that can report the matching lines of a batch of files.
pub trait PatternSearch: Send + Sync {
    /// Search every file of `batch`, returning hits grouped by file in batch order.
    fn search(&self, batch: &Batch, pattern: &SearchPattern) -> Result<Vec<SearchHit>, DepsError>;
}

/// Runs `grep -H -n -Ee <pattern> <files...>` in the batch directory.
#[derive(Debug, Clone)]
pub struct GrepSearch {
    program: String,
}

impl GrepSearch {
    /// Use `grep` from `PATH`.
    pub fn new() -> Self {
        Self::with_program("grep")
    }

    /// Use a specific grep-compatible program.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for GrepSearch {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternSearch for GrepSearch {
    fn search(&self, batch: &Batch, pattern: &SearchPattern) -> Result<Vec<SearchHit>, DepsError> {
        let output = Command::new(&self.program)
            .arg("-H")
            .arg("-n")
            .arg("-Ee")
            .arg(pattern.as_str())
            .args(batch.args())
            .current_dir(&batch.cwd)
            .output()
            .map_err(|source| DepsError::SearchSpawn {
                program: self.program.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        match output.status.code() {
            Some(0) => {}
            // Exit status 1 means no line was selected.
            Some(1) if stdout.trim().is_empty() => return Ok(Vec::new()),
            code => {
                return Err(DepsError::SearchFailed {
                    cwd: batch.cwd.clone(),
                    status: code,
                    stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
                });
            }
        }

        let hits = parse_output(&batch.cwd, &stdout)?;
        debug!(seq = batch.seq, files = batch.len(), hits = hits.len(), "grep batch done");
        Ok(hits)
    }
}

/// Parse `path:line:text` records relative to `cwd`.
pub fn parse_output(cwd: &Path, stdout: &str) -> Result<Vec<SearchHit>, DepsError> {
    static GREP_LINE: OnceLock<Regex> = OnceLock::new();
    let record = GREP_LINE.get_or_init(|| {
        Regex::new(r"^(?P<path>.+?):(?P<line>\d+):(?P<text>.*)$").expect("Invalid grep record regex")
    });

    let mut hits = Vec::new();
    for raw in stdout.lines() {
        let caps = record.captures(raw).ok_or_else(|| DepsError::Protocol {
            cwd: cwd.to_path_buf(),
            line: raw.to_string(),
        })?;
        let line = caps["line"].parse().map_err(|_| DepsError::Protocol {
            cwd: cwd.to_path_buf(),
            line: raw.to_string(),
        })?;
        hits.push(SearchHit {
            file: paths::normalize(cwd.join(&caps["path"])),
            line,
            text: caps["text"].to_string(),
        });
    }
    Ok(hits)
}

/// Reads each file and matches it line by line.
#[derive(Debug, Clone, Copy, Default)]
pub struct InProcessSearch;

impl InProcessSearch {
    /// Create a new in-process searcher.
    pub fn new() -> Self {
        Self
    }
}

impl PatternSearch for InProcessSearch {
    fn search(&self, batch: &Batch, pattern: &SearchPattern) -> Result<Vec<SearchHit>, DepsError> {
        let mut hits = Vec::new();
        for file in &batch.files {
            let bytes = std::fs::read(file).map_err(|e| DepsError::io(file, e))?;
            let content = String::from_utf8_lossy(&bytes);
            for (idx, text) in content.lines().enumerate() {
                if pattern.is_match(text) {
                    hits.push(SearchHit {
                        file: file.clone(),
                        line: idx as u32 + 1,
                        text: text.to_string(),
                    });
                }
            }
        }
        Ok(hits)
    }
}
