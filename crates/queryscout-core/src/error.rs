//! Error types for the analysis pipeline
//!
//! Only conditions that make a whole session unusable surface as
//! `CoreError`. Everything that can be attributed to a single query
//! (unresolved alias, bad SQL, unreachable database) degrades to a
//! per-query failure entry carried in the report instead.

use std::path::PathBuf;

use thiserror::Error;

use crate::config::Dialect;

/// Fatal pipeline errors.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("source root does not exist: {0}")]
    SourceRootMissing(PathBuf),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parser initialization failed: {0}")]
    ParserInit(String),

    #[error("invalid connection configuration: {0}")]
    InvalidConfig(String),
}

/// Errors from a single database adapter attempt.
///
/// Connection failures are kept distinct from plan-execution failures
/// so the analyzer can fall through to the next descriptor in an
/// environment group and report the right reason when the group is
/// exhausted.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("plan request rejected: {0}")]
    Execution(String),

    #[error("unparsable plan output: {0}")]
    PlanFormat(String),

    #[error("no adapter registered for dialect {0:?}")]
    UnsupportedDialect(Dialect),
}

impl AdapterError {
    /// True when trying the next descriptor in the group could help.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, AdapterError::Connection(_))
    }
}
