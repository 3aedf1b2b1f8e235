//! Plan acquisition with redundant-source fallback
//!
//! Environment groups are tried in configuration order; within a
//! group, every descriptor is tried until one yields a plan. A group
//! exhausting all descriptors is recoverable. Only when every
//! environment fails does the query itself fail, carrying the last
//! observed reason.

use std::sync::Arc;
use std::time::Duration;

use crate::config::{AnalyzerConfig, DbEnvironment, Dialect};
use crate::error::AdapterError;
use crate::explain::adapter::{default_adapters, DatabaseAdapter};
use crate::explain::plan::PlanNode;

pub struct ExplainRunner {
    adapters: Vec<Arc<dyn DatabaseAdapter>>,
    environments: Vec<DbEnvironment>,
    connect_timeout: Duration,
}

impl ExplainRunner {
    pub fn new(config: &AnalyzerConfig) -> Self {
        Self::with_adapters(config, default_adapters())
    }

    /// Used by tests and embedders to swap in non-default adapters.
    pub fn with_adapters(config: &AnalyzerConfig, adapters: Vec<Arc<dyn DatabaseAdapter>>) -> Self {
        Self {
            adapters,
            environments: config.environments.clone(),
            connect_timeout: config.connect_timeout(),
        }
    }

    fn adapter_for(&self, dialect: Dialect) -> Option<&Arc<dyn DatabaseAdapter>> {
        self.adapters.iter().find(|a| a.dialect() == dialect)
    }

    /// Obtain a plan for one normalized query. The error side is a
    /// user-displayable reason string, not a fatal error.
    pub fn obtain_plan(&self, sql: &str) -> Result<PlanNode, String> {
        let executable = substitute_parameters(sql);
        let mut last_reason: Option<String> = None;

        for environment in &self.environments {
            for descriptor in &environment.connections {
                let Some(adapter) = self.adapter_for(descriptor.dialect) else {
                    last_reason =
                        Some(AdapterError::UnsupportedDialect(descriptor.dialect).to_string());
                    continue;
                };
                match self.try_descriptor(adapter.as_ref(), descriptor, &executable) {
                    Ok(plan) => return Ok(plan),
                    Err(err) => {
                        log::warn!(
                            "plan request failed on {} ({}): {}",
                            descriptor.label(),
                            environment.name,
                            err
                        );
                        let recoverable = err.is_recoverable();
                        last_reason = Some(err.to_string());
                        if !recoverable {
                            // the statement itself was rejected; a
                            // replica of the same database cannot help
                            break;
                        }
                    }
                }
            }
        }

        Err(last_reason.unwrap_or_else(|| "no database connections configured".to_string()))
    }

    fn try_descriptor(
        &self,
        adapter: &dyn DatabaseAdapter,
        descriptor: &crate::config::ConnectionDescriptor,
        sql: &str,
    ) -> Result<PlanNode, AdapterError> {
        // connection lives for exactly one plan request
        let mut session = adapter.connect(descriptor, self.connect_timeout)?;
        let raw = session.request_plan(sql)?;
        adapter.parse_plan(&raw)
    }
}

/// Replace `$n` placeholders with NULL so the engine will plan the
/// statement without bound parameters. Literal text inside strings is
/// left alone.
pub(crate) fn substitute_parameters(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut chars = sql.chars().peekable();
    let mut in_string = false;

    while let Some(c) = chars.next() {
        if c == '\'' {
            in_string = !in_string;
            out.push(c);
            continue;
        }
        if !in_string && c == '$' {
            let mut saw_digit = false;
            while let Some(&d) = chars.peek() {
                if d.is_ascii_digit() {
                    saw_digit = true;
                    chars.next();
                } else {
                    break;
                }
            }
            if saw_digit {
                out.push_str("NULL");
                continue;
            }
        }
        out.push(c);
    }

    out
}
