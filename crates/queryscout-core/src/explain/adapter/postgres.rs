//! PostgreSQL adapter
//!
//! Plans are requested with `EXPLAIN (FORMAT JSON)` over a simple
//! query, which returns the JSON document as plain text rows. The
//! document is an array whose first element wraps the root under
//! `"Plan"`; child nodes nest under `"Plans"`.

use std::time::Duration;

use serde_json::Value;

use crate::config::{ConnectionDescriptor, Dialect};
use crate::error::AdapterError;
use crate::explain::plan::{columns_from_condition, PlanNode, PlanNodeKind};

use super::{DatabaseAdapter, PlanSession};

pub struct PostgresAdapter;

impl DatabaseAdapter for PostgresAdapter {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn connect(
        &self,
        descriptor: &ConnectionDescriptor,
        timeout: Duration,
    ) -> Result<Box<dyn PlanSession>, AdapterError> {
        let client = session_config(descriptor, timeout)
            .connect(postgres::NoTls)
            .map_err(|e| AdapterError::Connection(e.to_string()))?;
        Ok(Box::new(PostgresSession { client }))
    }

    fn parse_plan(&self, raw: &str) -> Result<PlanNode, AdapterError> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| AdapterError::PlanFormat(e.to_string()))?;

        // EXPLAIN (FORMAT JSON) wraps the plan in a one-element array
        let plan = value
            .as_array()
            .and_then(|arr| arr.first())
            .or(Some(&value))
            .and_then(|v| v.get("Plan"))
            .ok_or_else(|| AdapterError::PlanFormat("missing Plan object".to_string()))?;

        parse_node(plan)
    }
}

/// Connection parameters for one plan-request attempt. The statement
/// timeout bounds the EXPLAIN round trip itself, so a server that
/// accepts the connection and then stalls still fails the attempt
/// instead of blocking a worker.
fn session_config(descriptor: &ConnectionDescriptor, timeout: Duration) -> postgres::Config {
    let options = format!("-c statement_timeout={}", timeout.as_millis());
    let mut config = postgres::Config::new();
    config
        .host(&descriptor.host)
        .port(descriptor.port)
        .dbname(&descriptor.database)
        .user(&descriptor.username)
        .password(&descriptor.password)
        .connect_timeout(timeout)
        .options(&options);
    config
}

struct PostgresSession {
    client: postgres::Client,
}

impl PlanSession for PostgresSession {
    fn request_plan(&mut self, sql: &str) -> Result<String, AdapterError> {
        let statement = format!("EXPLAIN (FORMAT JSON) {}", sql);
        let messages = self
            .client
            .simple_query(&statement)
            .map_err(|e| AdapterError::Execution(e.to_string()))?;

        let mut out = String::new();
        for message in messages {
            if let postgres::SimpleQueryMessage::Row(row) = message {
                if let Some(text) = row.get(0) {
                    out.push_str(text);
                    out.push('\n');
                }
            }
        }
        if out.trim().is_empty() {
            return Err(AdapterError::PlanFormat("empty EXPLAIN output".to_string()));
        }
        Ok(out)
    }
}

fn parse_node(value: &Value) -> Result<PlanNode, AdapterError> {
    let node_type = value
        .get("Node Type")
        .and_then(Value::as_str)
        .ok_or_else(|| AdapterError::PlanFormat("missing Node Type".to_string()))?;

    let mut node = PlanNode::new(PlanNodeKind::from_postgres(node_type));
    node.relation = value
        .get("Relation Name")
        .and_then(Value::as_str)
        .map(str::to_string);
    node.rows = value.get("Plan Rows").and_then(Value::as_u64).unwrap_or(0);
    node.total_cost = value
        .get("Total Cost")
        .and_then(Value::as_f64)
        .unwrap_or(0.0);
    node.index_name = value
        .get("Index Name")
        .and_then(Value::as_str)
        .map(str::to_string);

    if let Some(filter) = value.get("Filter").and_then(Value::as_str) {
        node.columns.extend(columns_from_condition(filter));
        node.filter = Some(filter.to_string());
    }
    if let Some(cond) = value.get("Index Cond").and_then(Value::as_str) {
        node.columns.extend(columns_from_condition(cond));
    }

    if let Some(children) = value.get("Plans").and_then(Value::as_array) {
        for child in children {
            node.children.push(parse_node(child)?);
        }
    }

    Ok(node)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEQ_SCAN_PLAN: &str = r#"[
      {
        "Plan": {
          "Node Type": "Seq Scan",
          "Relation Name": "users",
          "Startup Cost": 0.00,
          "Total Cost": 15406.00,
          "Plan Rows": 500000,
          "Plan Width": 36,
          "Filter": "((email)::text = NULL::text)"
        }
      }
    ]"#;

    const JOIN_PLAN: &str = r#"[
      {
        "Plan": {
          "Node Type": "Hash Join",
          "Total Cost": 2000.0,
          "Plan Rows": 1000,
          "Plans": [
            {
              "Node Type": "Seq Scan",
              "Relation Name": "orders",
              "Total Cost": 1500.0,
              "Plan Rows": 50000
            },
            {
              "Node Type": "Index Scan",
              "Relation Name": "users",
              "Index Name": "users_pkey",
              "Index Cond": "(id = $1)",
              "Total Cost": 8.3,
              "Plan Rows": 1
            }
          ]
        }
      }
    ]"#;

    #[test]
    fn test_parse_seq_scan() {
        let plan = PostgresAdapter.parse_plan(SEQ_SCAN_PLAN).unwrap();
        assert_eq!(plan.kind, PlanNodeKind::SeqScan);
        assert_eq!(plan.relation.as_deref(), Some("users"));
        assert_eq!(plan.rows, 500000);
        assert!(plan.total_cost > 15000.0);
        assert!(plan.columns.contains("email"));
        assert!(plan.lacks_index_support());
    }

    #[test]
    fn test_parse_join_tree() {
        let plan = PostgresAdapter.parse_plan(JOIN_PLAN).unwrap();
        assert_eq!(plan.kind, PlanNodeKind::Join);
        assert_eq!(plan.children.len(), 2);

        let index_scan = &plan.children[1];
        assert_eq!(index_scan.kind, PlanNodeKind::IndexScan);
        assert_eq!(index_scan.index_name.as_deref(), Some("users_pkey"));
        assert!(index_scan.columns.contains("id"));
        assert!(!index_scan.lacks_index_support());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(PostgresAdapter.parse_plan("not json").is_err());
        assert!(PostgresAdapter.parse_plan("[{}]").is_err());
    }

    #[test]
    fn test_session_config_bounds_both_phases() {
        let descriptor = ConnectionDescriptor {
            host: "db1.internal".to_string(),
            port: 5432,
            database: "app".to_string(),
            username: "scout".to_string(),
            password: "secret".to_string(),
            dialect: Dialect::Postgres,
        };
        let config = session_config(&descriptor, Duration::from_secs(10));

        assert_eq!(config.get_connect_timeout(), Some(&Duration::from_secs(10)));
        assert_eq!(config.get_options(), Some("-c statement_timeout=10000"));
    }
}
