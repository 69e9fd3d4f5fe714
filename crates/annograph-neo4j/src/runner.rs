//! [`QueryRunner`] backed by a live Neo4j connection.

use async_trait::async_trait;

use annograph_query::error::ExecutionError;
use annograph_query::execute::{QueryResult, QueryRunner};

use crate::client::GraphClient;
use crate::convert::{collect_row, row_values};

#[async_trait]
impl QueryRunner for GraphClient {
    async fn run_query(&self, text: &str) -> Result<QueryResult, ExecutionError> {
        let rows = self
            .query_rows(neo4rs::query(text))
            .await
            .map_err(|e| ExecutionError::Failed(e.to_string()))?;

        let mut result = QueryResult::default();
        for row in &rows {
            let columns = row_values(row).map_err(|e| ExecutionError::Failed(e.to_string()))?;
            collect_row(&mut result, columns);
        }
        tracing::debug!(
            rows = rows.len(),
            nodes = result.nodes.len(),
            edges = result.edges.len(),
            "Collected query result"
        );
        Ok(result)
    }
}
