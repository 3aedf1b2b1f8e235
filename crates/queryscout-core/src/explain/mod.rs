//! Execution plan acquisition and the dialect-independent plan model

pub mod adapter;
mod plan;
mod runner;

pub use adapter::{DatabaseAdapter, MysqlAdapter, PlanSession, PostgresAdapter};
pub use plan::{PlanNode, PlanNodeKind};
pub use runner::ExplainRunner;
