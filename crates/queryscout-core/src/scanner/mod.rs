//! Source tree scanner
//!
//! Walks the configured source roots (and dependency roots, which feed
//! symbol resolution only) and collects the Java files to analyze.

mod ignores;
mod types;
mod walker;

pub use ignores::IgnorePatterns;
pub use types::{ScanConfig, ScanStats, SourceFile, SourceRootKind};
pub use walker::SourceWalker;
