//! Neo4j connection management and bulk-load operations.

use neo4rs::{query, ConfigBuilder, Graph, Query};

use annograph_core::config::Neo4jConfig;

/// Errors from graph operations.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("Neo4j connection error: {0}")]
    Connection(String),

    #[error("Neo4j query error: {0}")]
    Query(#[from] neo4rs::Error),

    #[error("Could not read result row: {0}")]
    Row(String),
}

/// Pooled Neo4j client. Clone is cheap (inner Arc).
#[derive(Clone)]
pub struct GraphClient {
    graph: Graph,
}

impl GraphClient {
    /// Connect to Neo4j with the given configuration.
    pub async fn connect(config: &Neo4jConfig) -> Result<Self, GraphError> {
        let neo_config = ConfigBuilder::default()
            .uri(&config.uri)
            .user(&config.user)
            .password(&config.password)
            .max_connections(config.max_connections as usize)
            .fetch_size(config.fetch_size)
            .build()
            .map_err(|e| GraphError::Connection(e.to_string()))?;

        let graph = Graph::connect(neo_config)
            .await
            .map_err(|e| GraphError::Connection(e.to_string()))?;

        tracing::info!(uri = %config.uri, "Connected to Neo4j");
        Ok(Self { graph })
    }

    /// Get a reference to the underlying neo4rs Graph for direct operations.
    pub fn inner(&self) -> &Graph {
        &self.graph
    }

    /// Execute a query without reading results.
    pub async fn run(&self, query: Query) -> Result<(), GraphError> {
        self.graph.run(query).await?;
        Ok(())
    }

    /// Execute a query and collect all rows.
    pub async fn query_rows(&self, query: Query) -> Result<Vec<neo4rs::Row>, GraphError> {
        let mut stream = self.graph.execute(query).await?;
        let mut rows = Vec::new();
        while let Some(row) = stream.next().await? {
            rows.push(row);
        }
        Ok(rows)
    }

    // ── Bulk Operations ──────────────────────────────────────────
    //
    // Operator actions: these write unconditionally and never pass through
    // the query guard.

    /// Delete every node and relationship.
    pub async fn clear_graph(&self) -> Result<(), GraphError> {
        self.run(query("MATCH (n) DETACH DELETE n")).await?;
        tracing::info!("Cleared graph database");
        Ok(())
    }

    /// Load a CSV export with `apoc.import.csv`.
    ///
    /// `nodes_file` / `edges_file` are resolved by the server (typically
    /// `file:///...` under its import directory), not by this process.
    pub async fn import_csv(&self, nodes_file: &str, edges_file: &str) -> Result<(), GraphError> {
        let q = query(
            "CALL apoc.import.csv(
               [{fileName: $nodes, labels: []}],
               [{fileName: $edges, type: null}],
               {ignoreDuplicateNodes: true, ignoreBlankString: true}
             )",
        )
        .param("nodes", nodes_file.to_string())
        .param("edges", edges_file.to_string());

        self.run(q).await?;
        tracing::info!(nodes = %nodes_file, edges = %edges_file, "Imported CSV into graph database");
        Ok(())
    }
}
