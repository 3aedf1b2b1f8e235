//! Connection and analysis configuration
//!
//! The host persists this structure however it likes; the core only
//! requires that it deserializes into the shapes below. Environments
//! group redundant connection descriptors: a query is tried against
//! every descriptor in a group until one yields a plan.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Receiver types whose call sites are treated as query-executing.
pub const DEFAULT_CHECKED_TYPES: &str =
    "javax.persistence.Query;javax.persistence.TypedQuery;java.sql.PreparedStatement";

/// Queries scoring at or above this are flagged as slow.
pub const DEFAULT_SLOW_QUERY_THRESHOLD: u32 = 100;

/// Only index recommendations at or above this priority surface.
pub const DEFAULT_RECOMMEND_INDEX_THRESHOLD: u32 = 50;

/// Supported database dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Postgres,
    Mysql,
}

impl Dialect {
    pub fn default_port(&self) -> u16 {
        match self {
            Dialect::Postgres => 5432,
            Dialect::Mysql => 3306,
        }
    }
}

/// One concrete database connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionDescriptor {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
    pub dialect: Dialect,
}

impl ConnectionDescriptor {
    pub fn label(&self) -> String {
        format!("{}:{}/{}", self.host, self.port, self.database)
    }
}

/// A named group of interchangeable connections (mirrored shards,
/// replicas) providing redundant access to the same logical database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbEnvironment {
    pub name: String,
    pub connections: Vec<ConnectionDescriptor>,
}

impl DbEnvironment {
    /// Build an environment from `;`-delimited parallel arrays, one
    /// descriptor per index. All arrays must have the same length.
    pub fn from_parallel(
        name: &str,
        dialect: Dialect,
        hosts: &str,
        databases: &str,
        usernames: &str,
        passwords: &str,
    ) -> Result<Self, CoreError> {
        let hosts: Vec<&str> = hosts.split(';').collect();
        let databases: Vec<&str> = databases.split(';').collect();
        let usernames: Vec<&str> = usernames.split(';').collect();
        let passwords: Vec<&str> = passwords.split(';').collect();

        if hosts.len() != databases.len()
            || hosts.len() != usernames.len()
            || hosts.len() != passwords.len()
        {
            return Err(CoreError::InvalidConfig(format!(
                "environment '{}': parallel connection arrays have unequal lengths \
                 ({} hosts, {} databases, {} usernames, {} passwords)",
                name,
                hosts.len(),
                databases.len(),
                usernames.len(),
                passwords.len()
            )));
        }

        let mut connections = Vec::with_capacity(hosts.len());
        for (((host, database), username), password) in
            hosts.iter().zip(&databases).zip(&usernames).zip(&passwords)
        {
            // host may carry an explicit port as host:port
            let (host, port) = match host.rsplit_once(':') {
                Some((h, p)) => {
                    let port = p.parse::<u16>().map_err(|_| {
                        CoreError::InvalidConfig(format!(
                            "environment '{}': invalid port in host '{}'",
                            name, host
                        ))
                    })?;
                    (h, port)
                }
                None => (*host, dialect.default_port()),
            };
            connections.push(ConnectionDescriptor {
                host: host.to_string(),
                port,
                database: database.to_string(),
                username: username.to_string(),
                password: password.to_string(),
                dialect,
            });
        }

        Ok(Self {
            name: name.to_string(),
            connections,
        })
    }
}

/// Full analyzer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Ordered list of connection environments.
    pub environments: Vec<DbEnvironment>,
    /// Queries scoring at or above this are flagged as slow.
    pub slow_query_threshold: u32,
    /// Recommendations below this priority are dropped from reports.
    pub recommend_index_threshold: u32,
    /// `;`-delimited fully-qualified receiver types to treat as
    /// query-executing.
    pub checked_types: String,
    /// Per-attempt connection timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Cached file reports expire after this many seconds without a read.
    pub cache_expiry_secs: u64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            environments: Vec::new(),
            slow_query_threshold: DEFAULT_SLOW_QUERY_THRESHOLD,
            recommend_index_threshold: DEFAULT_RECOMMEND_INDEX_THRESHOLD,
            checked_types: DEFAULT_CHECKED_TYPES.to_string(),
            connect_timeout_secs: 10,
            cache_expiry_secs: 300,
        }
    }
}

impl AnalyzerConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn cache_expiry(&self) -> Duration {
        Duration::from_secs(self.cache_expiry_secs)
    }

    /// The configured checked types as individual class names.
    pub fn checked_type_list(&self) -> Vec<&str> {
        self.checked_types
            .split(';')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parallel_arrays() {
        let env = DbEnvironment::from_parallel(
            "staging",
            Dialect::Postgres,
            "db1.internal;db2.internal:6432",
            "app;app",
            "scout;scout",
            "secret;secret",
        )
        .unwrap();

        assert_eq!(env.connections.len(), 2);
        assert_eq!(env.connections[0].host, "db1.internal");
        assert_eq!(env.connections[0].port, 5432);
        assert_eq!(env.connections[1].host, "db2.internal");
        assert_eq!(env.connections[1].port, 6432);
    }

    #[test]
    fn test_parallel_arrays_unequal() {
        let result = DbEnvironment::from_parallel(
            "staging",
            Dialect::Mysql,
            "db1;db2",
            "app",
            "scout;scout",
            "secret;secret",
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_port_rejected() {
        let result = DbEnvironment::from_parallel(
            "staging",
            Dialect::Postgres,
            "db1.internal:notaport",
            "app",
            "scout",
            "secret",
        );
        assert!(matches!(result, Err(CoreError::InvalidConfig(_))));
    }

    #[test]
    fn test_config_roundtrip() {
        let config = AnalyzerConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: AnalyzerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.slow_query_threshold, DEFAULT_SLOW_QUERY_THRESHOLD);
        assert_eq!(
            parsed.recommend_index_threshold,
            DEFAULT_RECOMMEND_INDEX_THRESHOLD
        );
        assert_eq!(parsed.checked_type_list().len(), 3);
    }
}
