//! Query call-site extraction
//!
//! Parses Java source with tree-sitter and produces one
//! `ExtractionRecord` per call site whose receiver/expression type
//! belongs to the configured query-executing type set. The same pass
//! harvests JPA entity mappings for the alias map.

mod extractor;
mod types;

pub use extractor::QueryCallExtractor;
pub use types::{EntityMapping, ExtractionRecord, QueryKind, SourceExtract, Span};
