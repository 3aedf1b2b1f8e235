//! Database adapters - one per supported dialect
//!
//! An adapter knows how to open a connection from a descriptor, ask
//! the engine for a plan, and parse the engine's plan representation
//! into the common `PlanNode` tree. Adapters never see anything but
//! validated SELECT statements.

mod mysql;
mod postgres;

pub use mysql::MysqlAdapter;
pub use postgres::PostgresAdapter;

use std::sync::Arc;
use std::time::Duration;

use crate::config::{ConnectionDescriptor, Dialect};
use crate::error::AdapterError;
use crate::explain::plan::PlanNode;

/// Dialect capability interface. One implementation per engine,
/// selected by the descriptor's dialect field.
pub trait DatabaseAdapter: Send + Sync {
    fn dialect(&self) -> Dialect;

    /// Open a short-lived connection. Connections live for one plan
    /// request and are dropped immediately after.
    fn connect(
        &self,
        descriptor: &ConnectionDescriptor,
        timeout: Duration,
    ) -> Result<Box<dyn PlanSession>, AdapterError>;

    /// Parse the engine's raw plan output into the common tree.
    fn parse_plan(&self, raw: &str) -> Result<PlanNode, AdapterError>;
}

/// An open connection capable of answering plan requests.
pub trait PlanSession {
    fn request_plan(&mut self, sql: &str) -> Result<String, AdapterError>;
}

/// The built-in adapters, one per supported dialect.
pub fn default_adapters() -> Vec<Arc<dyn DatabaseAdapter>> {
    vec![Arc::new(PostgresAdapter), Arc::new(MysqlAdapter)]
}
