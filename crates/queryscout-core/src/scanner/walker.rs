//! File walker for Java source roots
//!
//! Walks each configured root recursively, respecting ignore patterns,
//! and collects `.java` files with a content hash. Source roots and
//! dependency roots share the walk; the root kind tags each file so
//! later stages know dependency files only feed symbol resolution.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use xxhash_rust::xxh3::xxh3_64;

use super::ignores::IgnorePatterns;
use super::types::{ScanConfig, ScanStats, SourceFile, SourceRootKind};
use crate::error::CoreError;

/// Walks source and dependency roots for Java files
pub struct SourceWalker {
    config: ScanConfig,
}

impl SourceWalker {
    pub fn new(config: ScanConfig) -> Self {
        Self { config }
    }

    /// Walk all roots. Fails only if a configured source root does not
    /// exist; unreadable files and directories inside a root are
    /// skipped, not fatal.
    pub fn walk(&self) -> Result<(Vec<SourceFile>, ScanStats), CoreError> {
        let start = Instant::now();

        for root in &self.config.source_roots {
            if !root.exists() {
                return Err(CoreError::SourceRootMissing(root.clone()));
            }
        }

        let mut files = Vec::new();
        let mut stats = ScanStats::default();

        let roots = self
            .config
            .source_roots
            .iter()
            .map(|r| (r, SourceRootKind::Source))
            .chain(
                self.config
                    .dependency_roots
                    .iter()
                    .map(|r| (r, SourceRootKind::Dependency)),
            );

        for (root, kind) in roots {
            if !root.exists() {
                // dependency roots are optional
                log::warn!("skipping missing dependency root {}", root.display());
                continue;
            }
            let ignores = IgnorePatterns::new(root, &self.config.extra_ignores);
            let before = files.len();
            self.walk_dir(root, root, kind, &ignores, &mut files, &mut stats);
            stats
                .by_root
                .insert(root.display().to_string(), files.len() - before);
        }

        stats.total_files = files.len();
        stats.duration = start.elapsed();
        Ok((files, stats))
    }

    fn walk_dir(
        &self,
        root: &Path,
        dir: &Path,
        kind: SourceRootKind,
        ignores: &IgnorePatterns,
        files: &mut Vec<SourceFile>,
        stats: &mut ScanStats,
    ) {
        let entries = match fs::read_dir(dir) {
            Ok(e) => e,
            Err(_) => return,
        };

        for entry in entries.flatten() {
            let path = entry.path();
            let relative = path.strip_prefix(root).unwrap_or(&path);
            // is_dir resolves symlinks, which can cycle back into an
            // ancestor and recurse forever
            let is_symlink = entry.file_type().map_or(false, |t| t.is_symlink());

            if path.is_dir() {
                if !is_symlink && !ignores.is_ignored(relative, true) {
                    self.walk_dir(root, &path, kind, ignores, files, stats);
                }
            } else if path.is_file()
                && path.extension().map_or(false, |e| e == "java")
                && !ignores.is_ignored(relative, false)
            {
                match self.load_file(root, &path, kind) {
                    Ok(Some(file)) => {
                        stats.total_bytes += file.size;
                        files.push(file);
                    }
                    Ok(None) | Err(_) => stats.files_skipped += 1,
                }
            }
        }
    }

    fn load_file(
        &self,
        root: &Path,
        path: &Path,
        kind: SourceRootKind,
    ) -> Result<Option<SourceFile>, std::io::Error> {
        let metadata = fs::metadata(path)?;
        let size = metadata.len();
        if size > self.config.max_file_size {
            return Ok(None);
        }

        let bytes = fs::read(path)?;
        let relative = path
            .strip_prefix(root)
            .unwrap_or(path)
            .to_string_lossy()
            .to_string();

        Ok(Some(SourceFile {
            path: path.to_path_buf(),
            relative,
            size,
            hash: format!("{:016x}", xxh3_64(&bytes)),
            root_kind: kind,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let mut f = File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_walk_collects_java_only() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "src/App.java", "class App {}");
        write_file(dir.path(), "src/notes.txt", "not java");
        write_file(dir.path(), "target/Gen.java", "class Gen {}");

        let walker = SourceWalker::new(ScanConfig {
            source_roots: vec![dir.path().to_path_buf()],
            ..Default::default()
        });
        let (files, stats) = walker.walk().unwrap();

        assert_eq!(files.len(), 1);
        assert_eq!(stats.total_files, 1);
        assert!(files[0].relative.ends_with("App.java"));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_directory_cycle_terminates() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "src/App.java", "class App {}");
        std::os::unix::fs::symlink(dir.path(), dir.path().join("src/loop")).unwrap();

        let walker = SourceWalker::new(ScanConfig {
            source_roots: vec![dir.path().to_path_buf()],
            ..Default::default()
        });
        let (files, _) = walker.walk().unwrap();

        assert_eq!(files.len(), 1);
        assert!(files[0].relative.ends_with("App.java"));
    }

    #[test]
    fn test_missing_source_root_is_fatal() {
        let walker = SourceWalker::new(ScanConfig {
            source_roots: vec![PathBuf::from("/definitely/not/here")],
            ..Default::default()
        });
        assert!(matches!(
            walker.walk(),
            Err(CoreError::SourceRootMissing(_))
        ));
    }

    #[test]
    fn test_missing_dependency_root_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "App.java", "class App {}");

        let walker = SourceWalker::new(ScanConfig {
            source_roots: vec![dir.path().to_path_buf()],
            dependency_roots: vec![PathBuf::from("/definitely/not/here")],
            ..Default::default()
        });
        assert!(walker.walk().is_ok());
    }

    #[test]
    fn test_dependency_root_tagged() {
        let src = tempfile::tempdir().unwrap();
        let dep = tempfile::tempdir().unwrap();
        write_file(src.path(), "App.java", "class App {}");
        write_file(dep.path(), "Entity.java", "class Entity {}");

        let walker = SourceWalker::new(ScanConfig {
            source_roots: vec![src.path().to_path_buf()],
            dependency_roots: vec![dep.path().to_path_buf()],
            ..Default::default()
        });
        let (files, _) = walker.walk().unwrap();

        assert_eq!(files.len(), 2);
        assert!(files
            .iter()
            .any(|f| f.root_kind == SourceRootKind::Dependency));
    }
}
