//! Execution seam between rendered queries and a graph database driver.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::cypher::CypherQuery;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecutorError {
    #[error("Database connection failed: {0}")]
    Connection(String),

    #[error("Query execution failed: {0}")]
    Query(String),

    /// Raised by `apoc.util.validatePredicate` inside the database.
    #[error("Forbidden")]
    Forbidden,
}

/// Runs one rendered query and returns its records as JSON objects.
///
/// Implementations wrap a concrete driver. Errors propagate to the caller
/// unchanged and are never retried.
#[async_trait]
pub trait CypherExecutor: Send + Sync {
    async fn run(&self, query: &CypherQuery) -> Result<Vec<Value>, ExecutorError>;
}
