//! MySQL adapter
//!
//! Plans come from `EXPLAIN FORMAT=JSON`, a single-row single-column
//! result holding one JSON document. The structure differs from
//! PostgreSQL: the root is a `query_block`, joins arrive as a flat
//! `nested_loop` array, and scan kinds are `access_type` strings on
//! per-table objects.

use std::time::Duration;

use mysql::prelude::Queryable;
use serde_json::Value;

use crate::config::{ConnectionDescriptor, Dialect};
use crate::error::AdapterError;
use crate::explain::plan::{columns_from_condition, PlanNode, PlanNodeKind};

use super::{DatabaseAdapter, PlanSession};

pub struct MysqlAdapter;

impl DatabaseAdapter for MysqlAdapter {
    fn dialect(&self) -> Dialect {
        Dialect::Mysql
    }

    fn connect(
        &self,
        descriptor: &ConnectionDescriptor,
        timeout: Duration,
    ) -> Result<Box<dyn PlanSession>, AdapterError> {
        let opts = session_opts(descriptor, timeout);
        let conn = mysql::Conn::new(opts).map_err(|e| AdapterError::Connection(e.to_string()))?;
        Ok(Box::new(MysqlSession { conn }))
    }

    fn parse_plan(&self, raw: &str) -> Result<PlanNode, AdapterError> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| AdapterError::PlanFormat(e.to_string()))?;
        let block = value
            .get("query_block")
            .ok_or_else(|| AdapterError::PlanFormat("missing query_block".to_string()))?;
        parse_query_block(block)
    }
}

/// Connection options for one plan-request attempt. The socket
/// read/write timeouts bound the EXPLAIN round trip itself, so a
/// server that accepts the connection and then stalls still fails the
/// attempt instead of blocking a worker.
fn session_opts(descriptor: &ConnectionDescriptor, timeout: Duration) -> mysql::OptsBuilder {
    mysql::OptsBuilder::new()
        .ip_or_hostname(Some(descriptor.host.clone()))
        .tcp_port(descriptor.port)
        .db_name(Some(descriptor.database.clone()))
        .user(Some(descriptor.username.clone()))
        .pass(Some(descriptor.password.clone()))
        .tcp_connect_timeout(Some(timeout))
        .read_timeout(Some(timeout))
        .write_timeout(Some(timeout))
}

struct MysqlSession {
    conn: mysql::Conn,
}

impl PlanSession for MysqlSession {
    fn request_plan(&mut self, sql: &str) -> Result<String, AdapterError> {
        let statement = format!("EXPLAIN FORMAT=JSON {}", sql);
        let row: Option<String> = self
            .conn
            .query_first(statement)
            .map_err(|e| AdapterError::Execution(e.to_string()))?;
        row.ok_or_else(|| AdapterError::PlanFormat("empty EXPLAIN output".to_string()))
    }
}

fn parse_query_block(block: &Value) -> Result<PlanNode, AdapterError> {
    // Wrapping operations nest the table access they act on.
    if let Some(ordering) = block.get("ordering_operation") {
        let mut node = PlanNode::new(PlanNodeKind::Sort);
        node.children.push(parse_query_block(ordering)?);
        return Ok(node);
    }
    if let Some(grouping) = block.get("grouping_operation") {
        let mut node = PlanNode::new(PlanNodeKind::Aggregate);
        node.children.push(parse_query_block(grouping)?);
        return Ok(node);
    }

    if let Some(nested) = block.get("nested_loop") {
        return parse_nested_loop(nested);
    }
    if let Some(table) = block.get("table") {
        return parse_table_access(table, block);
    }

    Ok(PlanNode::new(PlanNodeKind::Other))
}

/// MySQL shows joins as a flat table list; fold it into a join node
/// with one child per table.
fn parse_nested_loop(nested: &Value) -> Result<PlanNode, AdapterError> {
    let tables = nested
        .as_array()
        .ok_or_else(|| AdapterError::PlanFormat("nested_loop is not an array".to_string()))?;

    let mut join = PlanNode::new(PlanNodeKind::Join);
    for entry in tables {
        if let Some(table) = entry.get("table") {
            join.children.push(parse_table_access(table, entry)?);
        }
    }
    if join.children.len() == 1 {
        return Ok(join.children.remove(0));
    }
    join.rows = join.children.iter().map(|c| c.rows).max().unwrap_or(0);
    join.total_cost = join.children.iter().map(|c| c.total_cost).sum();
    Ok(join)
}

fn parse_table_access(table: &Value, _parent: &Value) -> Result<PlanNode, AdapterError> {
    let access_type = table
        .get("access_type")
        .and_then(Value::as_str)
        .unwrap_or("ALL");

    let mut node = PlanNode::new(PlanNodeKind::from_mysql_access(access_type));
    node.relation = table
        .get("table_name")
        .and_then(Value::as_str)
        .map(str::to_string);
    node.rows = table
        .get("rows_examined_per_scan")
        .and_then(Value::as_u64)
        .unwrap_or(0);

    // cost_info carries costs as decimal strings
    if let Some(cost_info) = table.get("cost_info") {
        let read = cost_field(cost_info, "read_cost");
        let eval = cost_field(cost_info, "eval_cost");
        node.total_cost = read + eval;
    }

    if let Some(key) = table.get("key").and_then(Value::as_str) {
        if !key.eq_ignore_ascii_case("null") {
            node.index_name = Some(key.to_string());
        }
    }
    if let Some(condition) = table.get("attached_condition").and_then(Value::as_str) {
        node.columns.extend(columns_from_condition(condition));
        node.filter = Some(condition.to_string());
    }

    // covering index reads qualify as index-only
    if node.kind == PlanNodeKind::IndexScan
        && table
            .get("using_index")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    {
        node.kind = PlanNodeKind::IndexOnlyScan;
    }

    Ok(node)
}

fn cost_field(cost_info: &Value, field: &str) -> f64 {
    cost_info
        .get(field)
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_SCAN_PLAN: &str = r#"{
      "query_block": {
        "select_id": 1,
        "cost_info": { "query_cost": "50245.00" },
        "table": {
          "table_name": "users",
          "access_type": "ALL",
          "rows_examined_per_scan": 500000,
          "filtered": "10.00",
          "cost_info": { "read_cost": "45245.00", "eval_cost": "5000.00" },
          "attached_condition": "(`app`.`users`.`email` = NULL)"
        }
      }
    }"#;

    const NESTED_LOOP_PLAN: &str = r#"{
      "query_block": {
        "select_id": 1,
        "nested_loop": [
          {
            "table": {
              "table_name": "orders",
              "access_type": "ALL",
              "rows_examined_per_scan": 50000,
              "cost_info": { "read_cost": "5000.00", "eval_cost": "500.00" }
            }
          },
          {
            "table": {
              "table_name": "users",
              "access_type": "eq_ref",
              "key": "PRIMARY",
              "rows_examined_per_scan": 1,
              "cost_info": { "read_cost": "0.25", "eval_cost": "0.10" }
            }
          }
        ]
      }
    }"#;

    #[test]
    fn test_parse_full_table_scan() {
        let plan = MysqlAdapter.parse_plan(FULL_SCAN_PLAN).unwrap();
        assert_eq!(plan.kind, PlanNodeKind::SeqScan);
        assert_eq!(plan.relation.as_deref(), Some("users"));
        assert_eq!(plan.rows, 500000);
        assert!((plan.total_cost - 50245.0).abs() < 1.0);
        assert!(plan.columns.contains("email"));
        assert!(plan.lacks_index_support());
    }

    #[test]
    fn test_parse_nested_loop_join() {
        let plan = MysqlAdapter.parse_plan(NESTED_LOOP_PLAN).unwrap();
        assert_eq!(plan.kind, PlanNodeKind::Join);
        assert_eq!(plan.children.len(), 2);
        assert_eq!(plan.children[0].kind, PlanNodeKind::SeqScan);
        assert_eq!(plan.children[1].index_name.as_deref(), Some("PRIMARY"));
        assert_eq!(plan.rows, 50000);
    }

    #[test]
    fn test_parse_rejects_missing_block() {
        assert!(MysqlAdapter.parse_plan("{}").is_err());
    }

    #[test]
    fn test_session_opts_bounds_both_phases() {
        let descriptor = ConnectionDescriptor {
            host: "db1.internal".to_string(),
            port: 3306,
            database: "app".to_string(),
            username: "scout".to_string(),
            password: "secret".to_string(),
            dialect: Dialect::Mysql,
        };
        let timeout = Duration::from_secs(10);
        let opts = mysql::Opts::from(session_opts(&descriptor, timeout));

        assert_eq!(opts.get_tcp_connect_timeout(), Some(timeout));
        assert_eq!(opts.get_read_timeout(), Some(&timeout));
        assert_eq!(opts.get_write_timeout(), Some(&timeout));
    }
}
