//! Extraction types - call-site records and JPA entity mappings

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Exact text span of a call site. Lines are 1-based, offsets are
/// byte offsets into the file text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start_offset: usize,
    pub end_offset: usize,
    pub begin_line: u32,
    pub end_line: u32,
}

/// What flavor of query a call site executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    /// ORM query language (entity names, `alias.field` predicates)
    Jpql,
    /// Engine-native SQL (createNativeQuery, prepareStatement)
    NativeSql,
}

/// One discovered query call site. Uniqueness is by (file, span); the
/// same literal text may recur at multiple spans.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionRecord {
    /// File identity (path relative to its scan root)
    pub file: String,
    /// Literal query text the call site evaluates to, as far as it
    /// could be folded statically
    pub query_text: String,
    /// Exact span of the call expression
    pub span: Span,
    pub kind: QueryKind,
    /// True when a dynamic fragment could not be folded; the text is
    /// incomplete and downstream stages must report it as a failure
    /// rather than mis-parse it
    pub partial: bool,
}

/// JPA entity mapping harvested from `@Entity`/`@Table`/`@Column`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityMapping {
    /// Entity name (from `@Entity(name=...)` or the class name)
    pub entity: String,
    /// Physical table name (from `@Table(name=...)` or lowercased
    /// class name)
    pub table: String,
    /// Field name -> physical column name, for fields carrying an
    /// explicit `@Column(name=...)`. Unmapped fields default to the
    /// field name itself.
    pub columns: HashMap<String, String>,
}

/// Everything extracted from one source file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceExtract {
    pub file: String,
    pub records: Vec<ExtractionRecord>,
    pub entities: Vec<EntityMapping>,
    /// Non-fatal extraction problems (unparsable file, etc.)
    pub errors: Vec<String>,
}

impl SourceExtract {
    /// Whether any query call site was found in this file.
    pub fn query_found(&self) -> bool {
        !self.records.is_empty()
    }
}
