//! queryscout-core: Static query discovery and live plan analysis
//!
//! This crate provides the full analysis pipeline:
//! - Scanner: Parallel Java source walking with ignore patterns
//! - Extract: Native tree-sitter call-site and entity extraction
//! - Parse: Entity alias resolution and query normalization
//! - Explain: Multi-dialect execution plan acquisition
//! - Analyze: Plan risk scoring and index recommendation mining
//! - Report: Per-file aggregation of scores, indexes, and failures
//! - Cache: Content-fingerprinted report cache
//! - Session: Single-flight project scan coordination
//! - Engine: The `QueryScout` facade tying it all together

pub mod analyze;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod explain;
pub mod extract;
pub mod parse;
pub mod report;
pub mod scanner;
pub mod session;

// Re-exports for convenience
pub use analyze::{score_plan, RecommendedIndex};
pub use cache::ResultCache;
pub use config::{
    AnalyzerConfig, ConnectionDescriptor, DbEnvironment, Dialect, DEFAULT_CHECKED_TYPES,
    DEFAULT_RECOMMEND_INDEX_THRESHOLD, DEFAULT_SLOW_QUERY_THRESHOLD,
};
pub use engine::{ProjectState, QueryScout};
pub use error::{AdapterError, CoreError};
pub use explain::{
    DatabaseAdapter, ExplainRunner, MysqlAdapter, PlanNode, PlanNodeKind, PlanSession,
    PostgresAdapter,
};
pub use extract::{
    EntityMapping, ExtractionRecord, QueryCallExtractor, QueryKind, SourceExtract, Span,
};
pub use parse::{normalize_query, EntityAliasMap, NormalizedQuery, QueryParser, ResolvedQuery};
pub use report::{FileFullReport, QueryIndexReport, QueryScore};
pub use scanner::{ScanConfig, ScanStats, SourceFile, SourceRootKind, SourceWalker};
pub use session::Session;
