//! Missing-index recommendation mining
//!
//! Walks a plan for scans that read or filter rows without index
//! support and turns each into a CREATE INDEX suggestion. Priority is
//! proportional to the estimated rows scanned: 25 * log10(rows + 1),
//! rounded. Duplicate table+columns suggestions keep the highest
//! priority.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::explain::PlanNode;
use crate::parse::ResolvedQuery;

/// One suggested index over a table's filtered/joined columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendedIndex {
    pub table: String,
    pub columns: BTreeSet<String>,
    /// Ready-to-run DDL. Never executed by this crate.
    pub create_statement: String,
    pub priority: u32,
}

impl RecommendedIndex {
    fn new(table: &str, columns: BTreeSet<String>, rows: u64) -> Self {
        let column_list: Vec<&str> = columns.iter().map(String::as_str).collect();
        let create_statement = format!(
            "CREATE INDEX idx_{}_{} ON {} ({})",
            table,
            column_list.join("_"),
            table,
            column_list.join(", ")
        );
        let priority = (25.0 * ((rows as f64) + 1.0).log10()).round() as u32;
        Self {
            table: table.to_string(),
            columns,
            create_statement,
            priority,
        }
    }

    /// True only when the query's resolved table/column predicate set
    /// intersects this index's target columns. This membership test is
    /// what attaches a recommendation to a specific query occurrence.
    pub fn is_index_affect(&self, query: &ResolvedQuery) -> bool {
        query.tables.contains(&self.table) && !query.predicate_columns.is_disjoint(&self.columns)
    }
}

/// Mine one plan for unindexed scans worth an index.
pub fn mine_plan(plan: &PlanNode) -> Vec<RecommendedIndex> {
    let mut out = Vec::new();
    for node in plan.iter() {
        if !node.lacks_index_support() {
            continue;
        }
        let Some(relation) = &node.relation else {
            continue;
        };
        if node.columns.is_empty() {
            // nothing to index against (unfiltered full read)
            continue;
        }
        out.push(RecommendedIndex::new(
            relation,
            node.columns.clone(),
            node.rows,
        ));
    }
    out
}

/// De-duplicate per table+columns, keeping the highest priority.
pub fn merge(recommendations: Vec<RecommendedIndex>) -> Vec<RecommendedIndex> {
    let mut merged: Vec<RecommendedIndex> = Vec::new();
    for candidate in recommendations {
        match merged
            .iter_mut()
            .find(|r| r.table == candidate.table && r.columns == candidate.columns)
        {
            Some(existing) => existing.priority = existing.priority.max(candidate.priority),
            None => merged.push(candidate),
        }
    }
    merged.sort_by(|a, b| b.priority.cmp(&a.priority));
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_RECOMMEND_INDEX_THRESHOLD;
    use crate::explain::PlanNodeKind;

    fn seq_scan(table: &str, column: &str, rows: u64) -> PlanNode {
        let mut node = PlanNode::new(PlanNodeKind::SeqScan);
        node.relation = Some(table.to_string());
        node.rows = rows;
        node.filter = Some(format!("({} = $1)", column));
        node.columns.insert(column.to_string());
        node
    }

    fn resolved(table: &str, column: &str) -> ResolvedQuery {
        ResolvedQuery {
            sql: format!("SELECT * FROM {} WHERE {} = $1", table, column),
            tables: BTreeSet::from([table.to_string()]),
            predicate_columns: BTreeSet::from([column.to_string()]),
        }
    }

    #[test]
    fn test_large_scan_beats_recommend_threshold() {
        let recs = mine_plan(&seq_scan("users", "email", 500000));
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].table, "users");
        assert!(recs[0].priority > DEFAULT_RECOMMEND_INDEX_THRESHOLD);
        assert_eq!(
            recs[0].create_statement,
            "CREATE INDEX idx_users_email ON users (email)"
        );
    }

    #[test]
    fn test_index_affect_membership() {
        let recs = mine_plan(&seq_scan("users", "email", 500000));
        assert!(recs[0].is_index_affect(&resolved("users", "email")));
        assert!(!recs[0].is_index_affect(&resolved("orders", "email")));
        assert!(!recs[0].is_index_affect(&resolved("users", "name")));
    }

    #[test]
    fn test_unfiltered_scan_not_recommended() {
        let mut node = PlanNode::new(PlanNodeKind::SeqScan);
        node.relation = Some("users".to_string());
        node.rows = 500000;
        assert!(mine_plan(&node).is_empty());
    }

    #[test]
    fn test_indexed_scan_not_recommended() {
        let mut node = PlanNode::new(PlanNodeKind::IndexScan);
        node.relation = Some("users".to_string());
        node.index_name = Some("users_pkey".to_string());
        node.columns.insert("id".to_string());
        node.rows = 1;
        assert!(mine_plan(&node).is_empty());
    }

    #[test]
    fn test_merge_keeps_highest_priority() {
        let low = mine_plan(&seq_scan("users", "email", 100));
        let high = mine_plan(&seq_scan("users", "email", 500000));
        let expected = high[0].priority;

        let merged = merge(low.into_iter().chain(high).collect());
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].priority, expected);
    }
}
