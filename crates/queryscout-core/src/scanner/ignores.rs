//! Ignore patterns for walking Java source trees
//!
//! Keeps the walker out of build output, dependency caches, and
//! version-control metadata so large projects scan quickly.

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::path::Path;

/// Default directories to always ignore
pub const DEFAULT_IGNORE_DIRS: &[&str] = &[
    // JVM build systems
    "target",
    ".gradle",
    ".m2",
    "build",
    "out",
    // Generated sources land next to build output
    "generated-sources",
    "generated-test-sources",
    // Version control
    ".git",
    ".svn",
    ".hg",
    // IDE/Editor
    ".idea",
    ".vscode",
    ".eclipse",
    ".settings",
    // Other ecosystems that show up in mixed repos
    "node_modules",
    "__pycache__",
    ".venv",
    "venv",
    "dist",
    // Caches, logs, temp
    ".cache",
    "logs",
    "tmp",
    "temp",
];

/// File patterns to ignore (never query-bearing source)
pub const DEFAULT_IGNORE_FILES: &[&str] = &[
    "*.class",
    "*.jar",
    "*.war",
    "*.ear",
    "*.log",
    "package-info.java",
];

/// Compiled ignore patterns for one scan root
pub struct IgnorePatterns {
    gitignore: Gitignore,
}

impl IgnorePatterns {
    /// Create ignore patterns from defaults + custom patterns
    pub fn new(root: &Path, extra_patterns: &[String]) -> Self {
        let mut builder = GitignoreBuilder::new(root);

        for pattern in DEFAULT_IGNORE_DIRS {
            let _ = builder.add_line(None, pattern);
        }

        for pattern in DEFAULT_IGNORE_FILES {
            let _ = builder.add_line(None, pattern);
        }

        for pattern in extra_patterns {
            let _ = builder.add_line(None, pattern);
        }

        // Respect the project's own .gitignore if present
        let gitignore = root.join(".gitignore");
        if gitignore.exists() {
            let _ = builder.add(&gitignore);
        }

        Self {
            gitignore: builder
                .build()
                .unwrap_or_else(|_| GitignoreBuilder::new(root).build().unwrap()),
        }
    }

    /// Check if a path should be ignored
    pub fn is_ignored(&self, path: &Path, is_dir: bool) -> bool {
        self.gitignore.matched(path, is_dir).is_ignore()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_ignore_build_dirs() {
        let root = PathBuf::from("/project");
        let patterns = IgnorePatterns::new(&root, &[]);

        assert!(patterns.is_ignored(Path::new("target"), true));
        assert!(patterns.is_ignored(Path::new("module/build"), true));
        assert!(patterns.is_ignored(Path::new(".git"), true));
    }

    #[test]
    fn test_ignore_artifacts() {
        let root = PathBuf::from("/project");
        let patterns = IgnorePatterns::new(&root, &[]);

        assert!(patterns.is_ignored(Path::new("App.class"), false));
        assert!(patterns.is_ignored(Path::new("lib/dep.jar"), false));
    }

    #[test]
    fn test_allow_source_files() {
        let root = PathBuf::from("/project");
        let patterns = IgnorePatterns::new(&root, &[]);

        assert!(!patterns.is_ignored(Path::new("src/main/java/App.java"), false));
    }

    #[test]
    fn test_extra_patterns() {
        let root = PathBuf::from("/project");
        let patterns = IgnorePatterns::new(&root, &["fixtures".to_string()]);

        assert!(patterns.is_ignored(Path::new("fixtures"), true));
    }
}
