//! Query normalization and entity alias resolution
//!
//! Consumes extraction records project-wide, builds the entity alias
//! map, and maps each distinct query text to either a normalized SQL
//! string or a failure reason precise enough to show a user.

mod alias;
mod normalize;

pub use alias::EntityAliasMap;
pub use normalize::{normalize_query, NormalizedQuery, ResolvedQuery};

use std::collections::HashMap;

use crate::extract::SourceExtract;

/// Reason attached to records whose literal text has a dynamic part.
pub const PARTIAL_LITERAL_REASON: &str = "dynamic query fragment could not be resolved statically";

/// Project-wide query parser. Holds the read-only alias map built from
/// one scan pass; normalization of a query text depends on nothing but
/// that map, so re-running it is idempotent and order-independent.
pub struct QueryParser {
    aliases: EntityAliasMap,
}

impl QueryParser {
    pub fn new(aliases: EntityAliasMap) -> Self {
        Self { aliases }
    }

    pub fn from_extracts(extracts: &[SourceExtract]) -> Self {
        let mut aliases = EntityAliasMap::default();
        for extract in extracts {
            for entity in &extract.entities {
                aliases.add(entity.clone());
            }
        }
        log::debug!("alias map built with {} entities", aliases.len());
        Self::new(aliases)
    }

    /// Normalize every distinct query text in the given extracts.
    pub fn run(&self, extracts: &[SourceExtract]) -> HashMap<String, NormalizedQuery> {
        let mut out: HashMap<String, NormalizedQuery> = HashMap::new();
        for extract in extracts {
            for record in &extract.records {
                if out.contains_key(&record.query_text) {
                    continue;
                }
                let normalized = if record.partial {
                    NormalizedQuery::failed(&record.query_text, PARTIAL_LITERAL_REASON)
                } else {
                    normalize_query(&record.query_text, record.kind, &self.aliases)
                };
                out.insert(record.query_text.clone(), normalized);
            }
        }
        out
    }
}
