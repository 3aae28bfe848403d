//! Classified files and build targets.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use strum::{Display, IntoStaticStr};

use crate::paths;

/// Unique identifier for a classified file within a [`crate::SourceTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FileId(pub u32);

impl FileId {
    /// Create a new FileId.
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Index into dense per-file tables.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// BLAKE3 digest used for stable identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub [u8; 32]);

impl ContentHash {
    /// Create a new ContentHash from raw bytes.
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Hash a string.
    pub fn of_str(text: &str) -> Self {
        Self(*blake3::hash(text.as_bytes()).as_bytes())
    }

    /// Get the hash as a hex string.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

/// Classification of a file by name. Fixed at discovery.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, IntoStaticStr,
)]
#[strum(serialize_all = "kebab-case")]
pub enum FileKind {
    /// `*.h`, `*.def`, `*.inc`.
    Header,
    /// `*.h.in`, `*.def.cmake`, ...: a header produced at configure time.
    TemplateHeader,
    /// `*.c`, `*.cc`, `*.cpp`.
    Source,
    /// `CMakeLists.txt`.
    BuildDescriptor,
    /// `*.td` TableGen input.
    InterfaceDefinition,
}

impl FileKind {
    /// Name of the build descriptor file.
    pub const DESCRIPTOR_NAME: &'static str = "CMakeLists.txt";

    /// Classify a file name. Returns `None` for files that carry no dependencies.
    pub fn classify(name: &str) -> Option<Self> {
        if name == Self::DESCRIPTOR_NAME {
            return Some(Self::BuildDescriptor);
        }
        if let Some(base) = paths::strip_template_suffix(name) {
            return match extension(base) {
                Some("h" | "def" | "inc") if has_stem(base) => Some(Self::TemplateHeader),
                _ => None,
            };
        }
        if !has_stem(name) {
            return None;
        }
        match extension(name)? {
            "h" | "def" | "inc" => Some(Self::Header),
            "td" => Some(Self::InterfaceDefinition),
            "c" | "cc" | "cpp" => Some(Self::Source),
            _ => None,
        }
    }

    /// Whether files of this kind are scanned for includes.
    pub fn is_scanned(self) -> bool {
        matches!(self, Self::Header | Self::Source | Self::InterfaceDefinition)
    }

    /// Whether files of this kind keep their direct dependencies after closure merging.
    pub fn retains_direct(self) -> bool {
        matches!(self, Self::InterfaceDefinition)
    }
}

fn extension(name: &str) -> Option<&str> {
    name.rsplit_once('.').map(|(_, ext)| ext)
}

fn has_stem(name: &str) -> bool {
    name.rsplit_once('.').is_some_and(|(stem, _)| !stem.is_empty())
}

/// A classified file taking part in the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackedFile {
    /// Identifier.
    pub id: FileId,
    /// Normalized absolute path.
    pub path: PathBuf,
    /// Classification.
    pub kind: FileKind,
    /// Last modification time.
    pub modified: SystemTime,
    /// Whether the file is queued for include extraction.
    pub scan: bool,
}

impl TrackedFile {
    /// Containing directory.
    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or(&self.path)
    }

    /// File name.
    pub fn name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
    }
}

/// A directory with a build descriptor and at least one source file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildTarget {
    /// Directory owning the sources.
    pub dir: PathBuf,
    /// Path of the build descriptor.
    pub descriptor: PathBuf,
    /// Sources directly inside `dir` queued for extraction.
    pub sources: Vec<FileId>,
    /// Target name declared in the descriptor.
    pub name: Option<CompactString>,
}

impl BuildTarget {
    /// Create an unnamed target.
    pub fn new(dir: impl Into<PathBuf>, sources: Vec<FileId>) -> Self {
        let dir = dir.into();
        Self {
            descriptor: dir.join(FileKind::DESCRIPTOR_NAME),
            dir,
            sources,
            name: None,
        }
    }
}
