//! Plan risk scoring
//!
//! The score is the worst node along the plan's execution path:
//!
//!   node score = (10 * log10(rows + 1) + 5 * log10(cost + 1)) * weight
//!
//! where weight is 4 for a sequential scan, 3 for any other node that
//! filters rows without an index, 2 for a join, 1 otherwise. The
//! formula is deterministic, dialect-agnostic once plans are
//! normalized, and monotone in rows, cost, and missing index support,
//! which is all downstream thresholds rely on. A plan that is entirely
//! index-backed therefore always scores below the same plan with a
//! sequential scan over the same row count.

use crate::explain::{PlanNode, PlanNodeKind};

fn node_weight(node: &PlanNode) -> f64 {
    if node.kind == PlanNodeKind::SeqScan {
        4.0
    } else if node.filter.is_some() && node.index_name.is_none() {
        3.0
    } else if node.kind == PlanNodeKind::Join {
        2.0
    } else {
        1.0
    }
}

fn node_score(node: &PlanNode) -> f64 {
    let rows = (node.rows as f64 + 1.0).log10();
    let cost = (node.total_cost + 1.0).log10();
    (10.0 * rows + 5.0 * cost) * node_weight(node)
}

fn describe(node: &PlanNode) -> String {
    let kind = match node.kind {
        PlanNodeKind::SeqScan => "Seq Scan",
        PlanNodeKind::IndexScan => "Index Scan",
        PlanNodeKind::IndexOnlyScan => "Index Only Scan",
        PlanNodeKind::BitmapScan => "Bitmap Scan",
        PlanNodeKind::Join => "Join",
        PlanNodeKind::Sort => "Sort",
        PlanNodeKind::Aggregate => "Aggregate",
        PlanNodeKind::Other => "Plan Node",
    };
    match &node.relation {
        Some(relation) => format!(
            "{} on {} (rows={} cost={:.1})",
            kind, relation, node.rows, node.total_cost
        ),
        None => format!("{} (rows={} cost={:.1})", kind, node.rows, node.total_cost),
    }
}

/// Score a plan. Returns the numeric score and a one-line summary of
/// the node that contributed it.
pub fn score_plan(plan: &PlanNode) -> (u32, String) {
    let mut worst_score = 0.0f64;
    let mut worst_summary = describe(plan);

    for node in plan.iter() {
        let score = node_score(node);
        if score > worst_score {
            worst_score = score;
            worst_summary = describe(node);
        }
    }

    (worst_score.round() as u32, worst_summary)
}
