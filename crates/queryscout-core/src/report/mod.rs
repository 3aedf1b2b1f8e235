//! Per-file report aggregation
//!
//! One `FileFullReport` per analyzed file, keyed in the cache by the
//! file's content fingerprint. Reports are built wholesale and never
//! partially updated; a file with some resolved and some failed
//! queries still gets a complete report carrying both. A file with no
//! discovered queries gets no report at all.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::analyze::RecommendedIndex;
use crate::extract::{ExtractionRecord, Span};

/// Risk score for one query occurrence. The same query text at two
/// call sites yields two entries sharing the same score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryScore {
    pub original_query: String,
    pub location: Span,
    pub score: u32,
    /// One-line description of the plan node that drove the score
    pub plan_summary: String,
}

impl QueryScore {
    pub fn is_slow(&self, threshold: u32) -> bool {
        self.score >= threshold
    }
}

/// Failures and span lookup for one file's queries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryIndexReport {
    /// Query texts that could not be resolved or executed
    pub failed_query_parse_list: Vec<String>,
    /// Query text to its first extraction record, for span lookup
    pub source_extract_map: HashMap<String, ExtractionRecord>,
    failed_reasons: HashMap<String, String>,
}

impl QueryIndexReport {
    pub fn record_extract(&mut self, record: &ExtractionRecord) {
        self.source_extract_map
            .entry(record.query_text.clone())
            .or_insert_with(|| record.clone());
    }

    pub fn record_failure(&mut self, query_text: &str, reason: &str) {
        if !self.failed_reasons.contains_key(query_text) {
            self.failed_query_parse_list.push(query_text.to_string());
            self.failed_reasons
                .insert(query_text.to_string(), reason.to_string());
        }
    }

    pub fn failed_query_reason(&self, query_text: &str) -> Option<&str> {
        self.failed_reasons.get(query_text).map(String::as_str)
    }

    /// Line the failed query's call site starts on.
    pub fn failure_line(&self, query_text: &str) -> Option<u32> {
        self.source_extract_map
            .get(query_text)
            .map(|r| r.span.begin_line)
    }
}

/// The complete analysis result for one source file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileFullReport {
    pub file: String,
    /// SHA-256 of the file text this report was computed from
    pub fingerprint: String,
    pub query_scores: Vec<QueryScore>,
    pub recommended_indexes: Vec<RecommendedIndex>,
    pub index_report: QueryIndexReport,
}

impl FileFullReport {
    pub fn slow_queries(&self, threshold: u32) -> impl Iterator<Item = &QueryScore> {
        self.query_scores.iter().filter(move |s| s.is_slow(threshold))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::QueryKind;

    fn record(text: &str, line: u32) -> ExtractionRecord {
        ExtractionRecord {
            file: "Test.java".to_string(),
            query_text: text.to_string(),
            span: Span {
                start_offset: 0,
                end_offset: 10,
                begin_line: line,
                end_line: line,
            },
            kind: QueryKind::Jpql,
            partial: false,
        }
    }

    #[test]
    fn test_failure_located_at_call_site() {
        let mut report = QueryIndexReport::default();
        report.record_extract(&record("SELECT o FROM Order o", 42));
        report.record_failure("SELECT o FROM Order o", "unresolved entity alias Order");

        assert_eq!(
            report.failed_query_reason("SELECT o FROM Order o"),
            Some("unresolved entity alias Order")
        );
        assert_eq!(report.failure_line("SELECT o FROM Order o"), Some(42));
    }

    #[test]
    fn test_mixed_report_keeps_both_sides() {
        let mut index_report = QueryIndexReport::default();
        index_report.record_failure("bad query", "non-SELECT statement rejected");

        let report = FileFullReport {
            file: "Test.java".to_string(),
            fingerprint: "abc".to_string(),
            query_scores: vec![QueryScore {
                original_query: "SELECT u FROM User u".to_string(),
                location: record("x", 1).span,
                score: 140,
                plan_summary: "Seq Scan on users (rows=500000 cost=15406.0)".to_string(),
            }],
            recommended_indexes: Vec::new(),
            index_report,
        };

        assert_eq!(report.query_scores.len(), 1);
        assert_eq!(report.index_report.failed_query_parse_list.len(), 1);
        assert_eq!(report.slow_queries(100).count(), 1);
        assert_eq!(report.slow_queries(200).count(), 0);
    }
}
