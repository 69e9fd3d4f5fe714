//! Execution boundary between guarded query text and the graph database.
//!
//! The database adapter implements [`QueryRunner`]; [`execute`] is the only
//! path from user text to a runner, so a rejected query never reaches it.

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::ExecutionError;
use crate::guard::{GuardVerdict, QueryGuard};

/// Prefix of node references in results (`N:<database id>`).
pub const NODE_REF_PREFIX: &str = "N:";
/// Prefix of relationship references in results (`R:<database id>`).
pub const RELATIONSHIP_REF_PREFIX: &str = "R:";

pub fn node_ref(id: impl std::fmt::Display) -> String {
    format!("{NODE_REF_PREFIX}{id}")
}

pub fn relationship_ref(id: impl std::fmt::Display) -> String {
    format!("{RELATIONSHIP_REF_PREFIX}{id}")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeView {
    pub id: String,
    pub labels: Vec<String>,
    pub properties: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewRef {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeView {
    pub id: String,
    pub label: String,
    pub start: ViewRef,
    pub end: ViewRef,
    pub properties: serde_json::Map<String, serde_json::Value>,
}

/// Rows plus every node/relationship reachable from them.
///
/// In `matches`, graph entities are replaced by their `N:`/`R:` references
/// (paths by `[start, [rels...], end]`); the entities themselves are in
/// `nodes` / `edges`, keyed by the same references.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub matches: Vec<serde_json::Map<String, serde_json::Value>>,
    pub nodes: IndexMap<String, NodeView>,
    pub edges: IndexMap<String, EdgeView>,
}

impl QueryResult {
    pub fn add_node(&mut self, node: NodeView) {
        self.nodes.entry(node.id.clone()).or_insert(node);
    }

    pub fn add_edge(&mut self, edge: EdgeView) {
        self.edges.entry(edge.id.clone()).or_insert(edge);
    }
}

/// The single contract with the graph database. Implementations must not
/// retry: a query that passed the guard is not known to be idempotent.
#[async_trait]
pub trait QueryRunner: Send + Sync {
    async fn run_query(&self, query: &str) -> Result<QueryResult, ExecutionError>;
}

/// What a caller renders back to the user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    /// The text sent to the database, after guard rewriting.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(flatten)]
    pub result: QueryResult,
}

impl QueryResponse {
    fn failure(message: String, warning: Option<String>, query: Option<String>) -> Self {
        Self {
            success: false,
            message,
            warning,
            query,
            result: QueryResult::default(),
        }
    }
}

/// Guard `text`, then run it once. Rejections and database failures come
/// back as unsuccessful responses carrying the reason.
pub async fn execute<R>(runner: &R, guard: &QueryGuard, text: &str) -> QueryResponse
where
    R: QueryRunner + ?Sized,
{
    let (query, warning) = match guard.check(text) {
        GuardVerdict::Accepted { query, warning } => (query, warning),
        GuardVerdict::Rejected { message, .. } => {
            tracing::info!(reason = %message, "Query rejected by guard");
            return QueryResponse::failure(message, None, None);
        }
    };

    tracing::debug!(query = %query, "Executing guarded query");
    match runner.run_query(&query).await {
        Ok(result) => QueryResponse {
            success: true,
            message: format!("Query executed successfully. ({} results)", result.matches.len()),
            warning,
            query: Some(query),
            result,
        },
        Err(e) => {
            tracing::error!(error = %e, "Query execution failed");
            QueryResponse::failure(format!("Something went wrong. ({e})"), warning, Some(query))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    struct MockRunner {
        calls: Mutex<Vec<String>>,
        outcome: Result<QueryResult, ExecutionError>,
    }

    impl MockRunner {
        fn new(outcome: Result<QueryResult, ExecutionError>) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                outcome,
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl QueryRunner for MockRunner {
        async fn run_query(&self, query: &str) -> Result<QueryResult, ExecutionError> {
            self.calls.lock().unwrap().push(query.to_string());
            self.outcome.clone()
        }
    }

    fn sample_result() -> QueryResult {
        let mut result = QueryResult::default();
        result.add_node(NodeView {
            id: node_ref(0),
            labels: vec!["SUBSTANCE".to_string()],
            properties: json!({"lemma": "ghee"}).as_object().unwrap().clone(),
        });
        result.add_node(NodeView {
            id: node_ref(1),
            labels: vec!["DOSHA".to_string()],
            properties: serde_json::Map::new(),
        });
        result.add_edge(EdgeView {
            id: relationship_ref(5),
            label: "CURES".to_string(),
            start: ViewRef { id: node_ref(0) },
            end: ViewRef { id: node_ref(1) },
            properties: serde_json::Map::new(),
        });
        result
            .matches
            .push(json!({"a": "N:0", "r": "R:5"}).as_object().unwrap().clone());
        result
    }

    #[tokio::test]
    async fn test_accepted_query_runs_once_with_rewritten_limit() {
        let runner = MockRunner::new(Ok(sample_result()));
        let response = execute(&runner, &QueryGuard::new(250), "MATCH (a)-[r]->(b) RETURN a, r LIMIT 900").await;

        assert!(response.success);
        assert_eq!(response.message, "Query executed successfully. (1 results)");
        assert_eq!(response.warning.as_deref(), Some("LIMIT reset to 250"));
        assert_eq!(runner.calls(), vec!["MATCH (a)-[r]->(b) RETURN a, r LIMIT 250"]);
        assert_eq!(response.result.nodes.len(), 2);
        assert_eq!(response.result.edges["R:5"].start.id, "N:0");
    }

    #[tokio::test]
    async fn test_rejected_query_never_reaches_runner() {
        let runner = MockRunner::new(Ok(sample_result()));
        let response = execute(&runner, &QueryGuard::new(250), "MATCH (a) DETACH DELETE a RETURN a").await;

        assert!(!response.success);
        assert_eq!(response.message, "Query must not contain DETACH.");
        assert!(runner.calls().is_empty());
        assert!(response.result.matches.is_empty());
    }

    #[tokio::test]
    async fn test_runner_failure_is_reported_not_retried() {
        let runner = MockRunner::new(Err(ExecutionError::Failed("connection refused".to_string())));
        let response = execute(&runner, &QueryGuard::default(), "MATCH (a) RETURN a").await;

        assert!(!response.success);
        assert_eq!(
            response.message,
            "Something went wrong. (Query failed: connection refused)"
        );
        assert_eq!(runner.calls().len(), 1);
        assert_eq!(response.query.as_deref(), Some("MATCH (a) RETURN a LIMIT 250"));
    }

    #[tokio::test]
    async fn test_runner_usable_as_trait_object() {
        let runner: Box<dyn QueryRunner> = Box::new(MockRunner::new(Err(ExecutionError::Failed("not connected".to_string()))));
        let response = execute(runner.as_ref(), &QueryGuard::default(), "MATCH (a) RETURN a").await;
        assert!(response.message.contains("not connected"));
    }

    #[test]
    fn test_response_serializes_flat() {
        let response = QueryResponse {
            success: true,
            message: "ok".to_string(),
            warning: None,
            query: Some("MATCH (a) RETURN a LIMIT 250".to_string()),
            result: sample_result(),
        };
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["matches"][0]["a"], "N:0");
        assert_eq!(value["nodes"]["N:0"]["properties"]["lemma"], "ghee");
        assert_eq!(value["edges"]["R:5"]["label"], "CURES");
        assert!(value.get("warning").is_none());
    }
}
