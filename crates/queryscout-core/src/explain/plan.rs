//! Dialect-independent execution plan model
//!
//! Both adapters parse their engine's JSON plan format into this tree.
//! Node kinds are collapsed to the classes the scorer distinguishes;
//! anything exotic lands in `Other` and scores neutrally.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanNodeKind {
    SeqScan,
    IndexScan,
    IndexOnlyScan,
    BitmapScan,
    Join,
    Sort,
    Aggregate,
    Other,
}

impl PlanNodeKind {
    /// Maps a PostgreSQL `Node Type` string.
    pub fn from_postgres(node_type: &str) -> Self {
        match node_type {
            "Seq Scan" => PlanNodeKind::SeqScan,
            "Index Scan" => PlanNodeKind::IndexScan,
            "Index Only Scan" => PlanNodeKind::IndexOnlyScan,
            "Bitmap Heap Scan" | "Bitmap Index Scan" => PlanNodeKind::BitmapScan,
            "Nested Loop" | "Hash Join" | "Merge Join" => PlanNodeKind::Join,
            "Sort" | "Incremental Sort" => PlanNodeKind::Sort,
            "Aggregate" | "HashAggregate" | "GroupAggregate" | "WindowAgg" => {
                PlanNodeKind::Aggregate
            }
            _ => PlanNodeKind::Other,
        }
    }

    /// Maps a MySQL `access_type` string.
    pub fn from_mysql_access(access_type: &str) -> Self {
        match access_type.to_ascii_lowercase().as_str() {
            "all" => PlanNodeKind::SeqScan,
            "index" | "range" | "ref" | "eq_ref" | "const" | "system" | "ref_or_null"
            | "fulltext" | "unique_subquery" | "index_subquery" => PlanNodeKind::IndexScan,
            "index_merge" => PlanNodeKind::BitmapScan,
            _ => PlanNodeKind::Other,
        }
    }
}

/// One node of a parsed execution plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanNode {
    pub kind: PlanNodeKind,
    /// Physical relation the node reads, for scan nodes
    pub relation: Option<String>,
    /// Estimated rows produced per execution
    pub rows: u64,
    /// Estimated total cost in engine units
    pub total_cost: f64,
    /// Index the node uses, if any
    pub index_name: Option<String>,
    /// Raw filter/attached condition text from the plan
    pub filter: Option<String>,
    /// Columns the node's conditions reference
    pub columns: BTreeSet<String>,
    pub children: Vec<PlanNode>,
}

impl PlanNode {
    pub fn new(kind: PlanNodeKind) -> Self {
        Self {
            kind,
            relation: None,
            rows: 0,
            total_cost: 0.0,
            index_name: None,
            filter: None,
            columns: BTreeSet::new(),
            children: Vec::new(),
        }
    }

    /// True for nodes that read or filter rows without an index:
    /// sequential scans always, otherwise any node filtering rows with
    /// no index behind it.
    pub fn lacks_index_support(&self) -> bool {
        match self.kind {
            PlanNodeKind::SeqScan => true,
            _ => self.filter.is_some() && self.index_name.is_none(),
        }
    }

    /// Depth-first iterator over this node and all descendants.
    pub fn iter(&self) -> PlanIter<'_> {
        PlanIter { stack: vec![self] }
    }
}

pub struct PlanIter<'a> {
    stack: Vec<&'a PlanNode>,
}

impl<'a> Iterator for PlanIter<'a> {
    type Item = &'a PlanNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

/// SQL words that look like identifiers but never name a column.
const CONDITION_NOISE: &[&str] = &[
    "and", "or", "not", "is", "in", "like", "between", "null", "true", "false", "any", "all",
    "text", "varchar", "integer", "bigint", "numeric", "boolean", "timestamp", "date",
];

/// Best-effort extraction of column names from a plan condition string
/// such as `(email = $1)` or `(`app`.`users`.`email` = NULL)`. Dotted
/// and backticked chains keep their last segment; function names and
/// SQL keywords are dropped.
pub(crate) fn columns_from_condition(condition: &str) -> BTreeSet<String> {
    static IDENT: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"[A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)*").unwrap()
    });

    let stripped = condition.replace('`', "");
    let mut out = BTreeSet::new();
    for m in IDENT.find_iter(&stripped) {
        // function call, not a column
        if stripped[m.end()..].trim_start().starts_with('(') {
            continue;
        }
        let chain = m.as_str();
        let last = chain.rsplit('.').next().unwrap_or(chain);
        if CONDITION_NOISE.contains(&last.to_ascii_lowercase().as_str()) {
            continue;
        }
        out.insert(last.to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_postgres_kind_mapping() {
        assert_eq!(PlanNodeKind::from_postgres("Seq Scan"), PlanNodeKind::SeqScan);
        assert_eq!(
            PlanNodeKind::from_postgres("Index Only Scan"),
            PlanNodeKind::IndexOnlyScan
        );
        assert_eq!(PlanNodeKind::from_postgres("Hash Join"), PlanNodeKind::Join);
        assert_eq!(PlanNodeKind::from_postgres("Gather"), PlanNodeKind::Other);
    }

    #[test]
    fn test_mysql_kind_mapping() {
        assert_eq!(PlanNodeKind::from_mysql_access("ALL"), PlanNodeKind::SeqScan);
        assert_eq!(
            PlanNodeKind::from_mysql_access("eq_ref"),
            PlanNodeKind::IndexScan
        );
        assert_eq!(
            PlanNodeKind::from_mysql_access("index_merge"),
            PlanNodeKind::BitmapScan
        );
    }

    #[test]
    fn test_index_support() {
        let mut seq = PlanNode::new(PlanNodeKind::SeqScan);
        assert!(seq.lacks_index_support());
        seq.index_name = Some("users_email_idx".to_string());
        // a seq scan stays unindexed regardless of plan annotations
        assert!(seq.lacks_index_support());

        let mut idx = PlanNode::new(PlanNodeKind::IndexScan);
        idx.index_name = Some("users_pkey".to_string());
        idx.filter = Some("(status = $1)".to_string());
        assert!(!idx.lacks_index_support());
    }

    #[test]
    fn test_dfs_iteration() {
        let mut root = PlanNode::new(PlanNodeKind::Join);
        let mut left = PlanNode::new(PlanNodeKind::SeqScan);
        left.relation = Some("users".to_string());
        let mut right = PlanNode::new(PlanNodeKind::IndexScan);
        right.relation = Some("orders".to_string());
        root.children.push(left);
        root.children.push(right);

        let kinds: Vec<PlanNodeKind> = root.iter().map(|n| n.kind).collect();
        assert_eq!(
            kinds,
            vec![PlanNodeKind::Join, PlanNodeKind::SeqScan, PlanNodeKind::IndexScan]
        );
    }

    #[test]
    fn test_columns_from_postgres_filter() {
        let columns = columns_from_condition("((email)::text = 'x' AND lower(name) = $1)");
        assert!(columns.contains("email"));
        assert!(!columns.contains("lower"));
        assert!(!columns.contains("text"));
    }

    #[test]
    fn test_columns_from_mysql_condition() {
        let columns = columns_from_condition("(`app`.`users`.`email` = NULL)");
        assert_eq!(columns.len(), 1);
        assert!(columns.contains("email"));
    }
}
