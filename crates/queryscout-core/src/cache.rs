//! Content-addressed report cache
//!
//! Keys are SHA-256 fingerprints of file text, not paths, so an
//! unmodified file that moved still hits and a one-character edit
//! misses. Entries expire after a period without reads; every hit
//! refreshes the entry's lifetime.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};

use crate::report::FileFullReport;

struct CacheEntry {
    report: Arc<FileFullReport>,
    last_access: Instant,
}

pub struct ResultCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    expiry: Duration,
}

impl ResultCache {
    pub fn new(expiry: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            expiry,
        }
    }

    /// Content fingerprint of a file's current text.
    pub fn fingerprint(text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn get(&self, fingerprint: &str) -> Option<Arc<FileFullReport>> {
        // a poisoned lock only means a panicking reader; the map itself
        // is still consistent
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let entry = entries.get_mut(fingerprint)?;
        if entry.last_access.elapsed() > self.expiry {
            entries.remove(fingerprint);
            return None;
        }
        entry.last_access = Instant::now();
        Some(Arc::clone(&entry.report))
    }

    /// Insert atomically; readers see either the old report or the new
    /// one, never a partial state.
    pub fn put(&self, fingerprint: &str, report: Arc<FileFullReport>) {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        entries.insert(
            fingerprint.to_string(),
            CacheEntry {
                report,
                last_access: Instant::now(),
            },
        );
    }

    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::QueryIndexReport;

    fn report(file: &str, fingerprint: &str) -> Arc<FileFullReport> {
        Arc::new(FileFullReport {
            file: file.to_string(),
            fingerprint: fingerprint.to_string(),
            query_scores: Vec::new(),
            recommended_indexes: Vec::new(),
            index_report: QueryIndexReport::default(),
        })
    }

    #[test]
    fn test_fingerprint_sensitivity() {
        let a = ResultCache::fingerprint("SELECT * FROM users");
        let b = ResultCache::fingerprint("SELECT * FROM users;");
        assert_ne!(a, b);
        assert_eq!(a, ResultCache::fingerprint("SELECT * FROM users"));
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_get_after_put() {
        let cache = ResultCache::new(Duration::from_secs(300));
        let fp = ResultCache::fingerprint("class A {}");
        assert!(cache.get(&fp).is_none());

        cache.put(&fp, report("A.java", &fp));
        let hit = cache.get(&fp).unwrap();
        assert_eq!(hit.file, "A.java");
    }

    #[test]
    fn test_expiry_without_reads() {
        let cache = ResultCache::new(Duration::from_millis(30));
        let fp = ResultCache::fingerprint("class A {}");
        cache.put(&fp, report("A.java", &fp));

        std::thread::sleep(Duration::from_millis(60));
        assert!(cache.get(&fp).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_reads_refresh_lifetime() {
        let cache = ResultCache::new(Duration::from_millis(80));
        let fp = ResultCache::fingerprint("class A {}");
        cache.put(&fp, report("A.java", &fp));

        for _ in 0..4 {
            std::thread::sleep(Duration::from_millis(40));
            assert!(cache.get(&fp).is_some());
        }
    }
}
