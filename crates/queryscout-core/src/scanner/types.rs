//! Scanner types - Core data structures for source scanning

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// How a root participates in the scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceRootKind {
    /// Scanned for query call sites and entity mappings.
    Source,
    /// Harvested for entity mappings and type information only; call
    /// sites in dependency roots are never reported.
    Dependency,
}

/// Configuration for the source walker
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Root directories containing the project source
    pub source_roots: Vec<PathBuf>,
    /// Extra roots used only to improve symbol resolution
    pub dependency_roots: Vec<PathBuf>,
    /// Additional ignore patterns (beyond defaults)
    pub extra_ignores: Vec<String>,
    /// Maximum file size to process (bytes)
    pub max_file_size: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            source_roots: vec![PathBuf::from(".")],
            dependency_roots: Vec::new(),
            extra_ignores: Vec::new(),
            max_file_size: 10 * 1024 * 1024, // 10MB
        }
    }
}

/// A Java file discovered during the walk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceFile {
    /// Absolute path on disk
    pub path: PathBuf,
    /// Path relative to its scan root, used as the file identity
    pub relative: String,
    /// File size in bytes
    pub size: u64,
    /// xxHash of file contents
    pub hash: String,
    /// Whether the file came from a source root or a dependency root
    pub root_kind: SourceRootKind,
}

/// Statistics about one scan pass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanStats {
    /// Java files collected
    pub total_files: usize,
    /// Files per root
    pub by_root: HashMap<String, usize>,
    /// Total bytes read
    pub total_bytes: u64,
    /// Files skipped (too large, unreadable)
    pub files_skipped: usize,
    /// Scan duration
    #[serde(with = "duration_millis")]
    pub duration: Duration,
}

// Custom serialization for Duration as milliseconds
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_millis().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
