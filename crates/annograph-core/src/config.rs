//! Configuration management for annograph.
//!
//! Configuration is loaded from (in priority order):
//! 1. Environment variables (`ANNOGRAPH__<SECTION>__<KEY>`)
//! 2. Config file (`annograph.toml`, or another prefix)
//! 3. Defaults

use serde::{Deserialize, Serialize};

use crate::error::{AnnographError, Result};
use crate::property::PropertyValue;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnographConfig {
    pub query: QueryConfig,
    pub compiler: CompilerConfig,
    pub merge: MergeConfig,
    pub inference: InferenceConfig,
    pub neo4j: Neo4jConfig,
}

impl AnnographConfig {
    /// Load from `<file_prefix>.toml` (optional) and `ANNOGRAPH__` variables.
    pub fn load(file_prefix: &str) -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::File::with_name(file_prefix).required(false))
            .add_source(
                config::Environment::with_prefix("ANNOGRAPH")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let loaded: Self = cfg.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    pub fn validate(&self) -> Result<()> {
        if self.compiler.node_prefix.is_empty() || self.compiler.relation_prefix.is_empty() {
            return Err(AnnographError::InvalidConfig(
                "compiler.node_prefix and compiler.relation_prefix must not be empty".to_string(),
            ));
        }
        if self.compiler.node_prefix == self.compiler.relation_prefix {
            return Err(AnnographError::InvalidConfig(format!(
                "compiler.node_prefix and compiler.relation_prefix are both '{}'",
                self.compiler.node_prefix
            )));
        }
        if self.merge.relation.is_empty() {
            return Err(AnnographError::InvalidConfig(
                "merge.relation must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

// ── Query Guard ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Result-count ceiling enforced by the guard. Zero or negative disables it.
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    250
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            limit: default_limit(),
        }
    }
}

// ── Query Compiler ───────────────────────────────────────────────

/// Options controlling how a graph is compiled into a MATCH query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompilerConfig {
    /// Emit property constraints as a WHERE clause instead of inline maps.
    #[serde(default)]
    pub use_where: bool,

    /// Emit node labels and relationship types. When false, the pattern
    /// only constrains structure and properties.
    #[serde(default = "default_true")]
    pub use_labels: bool,

    /// Render directed edges. When false, every edge is undirected.
    #[serde(default = "default_true")]
    pub use_directions: bool,

    #[serde(default = "default_node_prefix")]
    pub node_prefix: String,

    #[serde(default = "default_relation_prefix")]
    pub relation_prefix: String,

    /// Explicit return items. Empty means `RETURN *`.
    #[serde(default)]
    pub returns: Vec<String>,

    /// Placeholder values that must not become equality filters.
    #[serde(default = "default_non_conditionals")]
    pub non_conditionals: Vec<NonConditional>,
}

/// A node property and the "don't-care" values it may hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NonConditional {
    pub property: String,
    pub values: Vec<PropertyValue>,
}

impl NonConditional {
    pub fn new(property: impl Into<String>, values: Vec<PropertyValue>) -> Self {
        Self {
            property: property.into(),
            values,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_node_prefix() -> String {
    "n".to_string()
}

fn default_relation_prefix() -> String {
    "r".to_string()
}

fn default_non_conditionals() -> Vec<NonConditional> {
    vec![
        NonConditional::new("lemma", vec!["?".into(), "".into()]),
        NonConditional::new("query", vec![true.into(), false.into()]),
    ]
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            use_where: false,
            use_labels: default_true(),
            use_directions: default_true(),
            node_prefix: default_node_prefix(),
            relation_prefix: default_relation_prefix(),
            returns: Vec::new(),
            non_conditionals: default_non_conditionals(),
        }
    }
}

// ── Merge Pass ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeConfig {
    /// Relation label whose connected components are merged.
    #[serde(default = "default_merge_relation")]
    pub relation: String,

    /// Node property whose maximum value ranks members after degree.
    #[serde(default = "default_rank_property")]
    pub rank_property: String,
}

fn default_merge_relation() -> String {
    "IS_SYNONYM_OF".to_string()
}

fn default_rank_property() -> String {
    "line_id".to_string()
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            relation: default_merge_relation(),
            rank_property: default_rank_property(),
        }
    }
}

// ── Endpoint Inference ───────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    /// Edge property keys copied onto synthesized endpoints.
    #[serde(default = "default_carry")]
    pub carry: Vec<String>,

    /// Per-relation label rules for synthesized endpoints.
    #[serde(default)]
    pub rules: Vec<InferenceRule>,
}

/// Labels given to missing endpoints of a relation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InferenceRule {
    pub relation: String,
    #[serde(default)]
    pub source: Vec<String>,
    #[serde(default)]
    pub target: Vec<String>,
}

fn default_carry() -> Vec<String> {
    vec!["annotator".to_string(), "line_id".to_string()]
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            carry: default_carry(),
            rules: Vec::new(),
        }
    }
}

// ── Neo4j ────────────────────────────────────────────────────────

/// Connection settings for the external graph database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Neo4jConfig {
    #[serde(default = "default_uri")]
    pub uri: String,
    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_fetch_size")]
    pub fetch_size: usize,
}

fn default_uri() -> String {
    "bolt://localhost:7687".to_string()
}

fn default_user() -> String {
    "neo4j".to_string()
}

fn default_max_connections() -> u32 {
    16
}

fn default_fetch_size() -> usize {
    256
}

impl Default for Neo4jConfig {
    fn default() -> Self {
        Self {
            uri: default_uri(),
            user: default_user(),
            password: String::new(),
            max_connections: default_max_connections(),
            fetch_size: default_fetch_size(),
        }
    }
}
