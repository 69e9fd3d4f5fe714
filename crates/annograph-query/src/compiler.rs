//! Graph → Cypher `MATCH` compiler.
//!
//! Every edge becomes one path fragment
//! `(src:Labels {props})-[rel:TYPE]->(dst:Labels {props})`; nodes that appear
//! in no edge are emitted as standalone node patterns. Output is a pure
//! function of the input graph and the [`CompilerConfig`].

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};

use annograph_core::config::{CompilerConfig, NonConditional};
use annograph_core::{merge_labels, NodeId, Property, PropertyMap, PropertyValue};
use annograph_engine::PropertyGraph;

use crate::error::{CompileError, Result};

/// Edge property that makes a pattern undirected when set to `"both"`.
pub const DIRECTION_PROPERTY: &str = "dir";

// ── Input ─────────────────────────────────────────────────────────

/// A subgraph to compile, as built interactively or taken from a graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryGraph {
    #[serde(default)]
    pub nodes: Vec<QueryNode>,
    #[serde(default)]
    pub edges: Vec<QueryEdge>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryNode {
    pub id: NodeId,
    #[serde(default)]
    pub labels: Vec<String>,
    /// Single-label form sent by the graph builder. Empty means none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, deserialize_with = "lenient_properties")]
    pub properties: PropertyMap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryEdge {
    #[serde(alias = "source")]
    pub start: NodeId,
    pub label: String,
    #[serde(alias = "target")]
    pub end: NodeId,
    #[serde(default, deserialize_with = "lenient_properties")]
    pub properties: PropertyMap,
}

/// Accept any JSON object (or null) and keep only storable values.
fn lenient_properties<'de, D>(deserializer: D) -> std::result::Result<PropertyMap, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Map<String, serde_json::Value>>::deserialize(deserializer)?;
    Ok(raw.map(|map| PropertyMap::from_json(&map)).unwrap_or_default())
}

impl QueryNode {
    pub fn new<I, S>(id: impl Into<NodeId>, labels: I, properties: PropertyMap) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: id.into(),
            labels: labels.into_iter().map(Into::into).collect(),
            label: None,
            properties,
        }
    }

    /// `labels` followed by the single `label`, if set and not already listed.
    pub fn all_labels(&self) -> Vec<String> {
        let mut labels = Vec::new();
        merge_labels(&mut labels, &self.labels);
        if let Some(label) = self.label.as_deref().filter(|l| !l.is_empty()) {
            merge_labels(&mut labels, &[label.to_string()]);
        }
        labels
    }
}

impl QueryEdge {
    pub fn new(
        start: impl Into<NodeId>,
        label: impl Into<String>,
        end: impl Into<NodeId>,
        properties: PropertyMap,
    ) -> Self {
        Self {
            start: start.into(),
            label: label.into(),
            end: end.into(),
            properties,
        }
    }

    fn is_undirected(&self) -> bool {
        self.properties
            .get_value(DIRECTION_PROPERTY)
            .and_then(PropertyValue::as_str)
            .is_some_and(|dir| dir.eq_ignore_ascii_case("both"))
    }
}

impl From<&PropertyGraph> for QueryGraph {
    fn from(graph: &PropertyGraph) -> Self {
        Self {
            nodes: graph
                .nodes()
                .map(|n| QueryNode::new(n.id().clone(), n.labels().iter().cloned(), n.properties().clone()))
                .collect(),
            edges: graph
                .edges()
                .map(|e| {
                    QueryEdge::new(
                        e.start().clone(),
                        e.label(),
                        e.end().clone(),
                        e.properties().clone(),
                    )
                })
                .collect(),
        }
    }
}

// ── Compiler ──────────────────────────────────────────────────────

/// Per-node constraints after non-conditional stripping.
struct Constraints {
    /// Unique per node, even when two ids render alike (`1` and `"1"`).
    var: String,
    labels: Vec<String>,
    properties: PropertyMap,
}

/// Compiles [`QueryGraph`]s with a fixed configuration.
#[derive(Debug, Clone, Default)]
pub struct QueryCompiler {
    config: CompilerConfig,
}

impl QueryCompiler {
    pub fn new(config: CompilerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Compile a graph into one `MATCH ... [WHERE ...] RETURN ...` query.
    ///
    /// The input is never modified; non-conditional values are stripped from
    /// a copy of each node's properties.
    pub fn compile(&self, graph: &QueryGraph) -> Result<String> {
        let nodes = self.constraints(graph);
        if nodes.is_empty() {
            return Err(CompileError::EmptyPattern);
        }

        let mut patterns = Vec::with_capacity(graph.edges.len());
        let mut used: Vec<&NodeId> = Vec::new();

        for (index, edge) in graph.edges.iter().enumerate() {
            let src = lookup(&nodes, edge, &edge.start)?;
            let dst = lookup(&nodes, edge, &edge.end)?;
            used.push(&edge.start);
            used.push(&edge.end);

            let rel_var = format!("{}{}", self.config.relation_prefix, index + 1);
            let undirected = !self.config.use_directions || edge.is_undirected();
            let rel_type = self.config.use_labels.then_some(edge.label.as_str());

            patterns.push(format!(
                "{}{}{}",
                self.node_pattern(src),
                relationship_pattern(&rel_var, rel_type, undirected),
                self.node_pattern(dst),
            ));
        }

        for (id, constraints) in &nodes {
            if !used.contains(&id) {
                patterns.push(self.node_pattern(constraints));
            }
        }

        let mut query = format!("MATCH {}", patterns.join(", "));

        if self.config.use_where {
            let conditions: Vec<String> = nodes
                .values()
                .flat_map(|c| {
                    let var = quote_identifier(&c.var);
                    c.properties.iter().map(move |(key, value)| {
                        format!("{var}.{} = {}", quote_identifier(key), render_property(value))
                    })
                })
                .collect();
            if !conditions.is_empty() {
                query.push_str(" WHERE ");
                query.push_str(&conditions.join(" AND "));
            }
        }

        if self.config.returns.is_empty() {
            query.push_str(" RETURN *");
        } else {
            query.push_str(" RETURN ");
            query.push_str(&self.config.returns.join(", "));
        }

        tracing::debug!(query = %query, "Compiled graph query");
        Ok(query)
    }

    /// Compile a [`PropertyGraph`] directly.
    pub fn compile_graph(&self, graph: &PropertyGraph) -> Result<String> {
        self.compile(&QueryGraph::from(graph))
    }

    /// `<prefix><id>`, suffixed with `_2`, `_3`, ... when another id
    /// already rendered to the same name.
    fn assign_vars(&self, nodes: &mut IndexMap<NodeId, Constraints>) {
        let mut taken: HashSet<String> = HashSet::with_capacity(nodes.len());
        for (id, constraints) in nodes.iter_mut() {
            let base = format!("{}{}", self.config.node_prefix, id);
            let mut var = base.clone();
            let mut n = 2;
            while taken.contains(&var) {
                var = format!("{base}_{n}");
                n += 1;
            }
            taken.insert(var.clone());
            constraints.var = var;
        }
    }

    fn constraints(&self, graph: &QueryGraph) -> IndexMap<NodeId, Constraints> {
        let mut nodes: IndexMap<NodeId, Constraints> = IndexMap::new();
        for node in &graph.nodes {
            let mut properties = node.properties.clone();
            for key in node.properties.keys() {
                let stripped = node
                    .properties
                    .get(key)
                    .is_some_and(|p| is_non_conditional(&self.config.non_conditionals, key, p));
                if stripped {
                    properties.remove(key);
                    tracing::debug!(node = %node.id, property = %key, "Dropped non-conditional property");
                }
            }

            let labels = node.all_labels();
            match nodes.get_mut(&node.id) {
                Some(existing) => {
                    merge_labels(&mut existing.labels, &labels);
                    existing.properties.merge(&properties);
                }
                None => {
                    let constraints = Constraints {
                        var: String::new(),
                        labels,
                        properties,
                    };
                    nodes.insert(node.id.clone(), constraints);
                }
            }
        }
        self.assign_vars(&mut nodes);
        nodes
    }

    fn node_pattern(&self, constraints: &Constraints) -> String {
        let mut out = format!("({}", quote_identifier(&constraints.var));
        if self.config.use_labels {
            for label in &constraints.labels {
                out.push(':');
                out.push_str(&quote_identifier(label));
            }
        }
        if !self.config.use_where && !constraints.properties.is_empty() {
            let entries: Vec<String> = constraints
                .properties
                .iter()
                .map(|(key, value)| format!("{}:{}", quote_identifier(key), render_property(value)))
                .collect();
            out.push_str(" {");
            out.push_str(&entries.join(", "));
            out.push('}');
        }
        out.push(')');
        out
    }
}

/// Compile with a one-off configuration.
pub fn compile(graph: &QueryGraph, config: &CompilerConfig) -> Result<String> {
    QueryCompiler::new(config.clone()).compile(graph)
}

fn lookup<'a>(
    nodes: &'a IndexMap<NodeId, Constraints>,
    edge: &QueryEdge,
    id: &NodeId,
) -> Result<&'a Constraints> {
    nodes.get(id).ok_or_else(|| CompileError::DanglingEdgeReference {
        start: edge.start.clone(),
        label: edge.label.clone(),
        end: edge.end.clone(),
        missing: id.clone(),
    })
}

fn is_non_conditional(rules: &[NonConditional], key: &str, property: &Property) -> bool {
    let Some(value) = property.as_single() else {
        return false;
    };
    rules
        .iter()
        .filter(|rule| rule.property == key)
        .any(|rule| rule.values.contains(value))
}

fn relationship_pattern(var: &str, rel_type: Option<&str>, undirected: bool) -> String {
    let inner = match rel_type {
        Some(t) => format!("{}:{}", quote_identifier(var), quote_identifier(t)),
        None => quote_identifier(var),
    };
    if undirected {
        format!("-[{inner}]-")
    } else {
        format!("-[{inner}]->")
    }
}

// ── Literals ──────────────────────────────────────────────────────

fn is_plain_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Backtick-quote names that are not plain identifiers.
pub fn quote_identifier(name: &str) -> String {
    if is_plain_identifier(name) {
        name.to_string()
    } else {
        format!("`{}`", name.replace('`', "``"))
    }
}

/// Render a scalar as a Cypher literal.
pub fn render_value(value: &PropertyValue) -> String {
    match value {
        PropertyValue::Boolean(b) => b.to_string(),
        PropertyValue::Integer(i) => i.to_string(),
        PropertyValue::Float(f) => format!("{f:?}"),
        PropertyValue::String(s) => format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")),
    }
}

/// Multi-valued properties render as list literals.
fn render_property(property: &Property) -> String {
    match property {
        Property::Single(v) => render_value(v),
        Property::Multi(vs) => {
            let items: Vec<String> = vs.iter().map(render_value).collect();
            format!("[{}]", items.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn two_node_graph(edge_props: PropertyMap) -> QueryGraph {
        QueryGraph {
            nodes: vec![
                QueryNode::new(1, ["X"], PropertyMap::new().with("lemma", "a")),
                QueryNode::new(2, ["Y"], PropertyMap::new().with("lemma", "b")),
            ],
            edges: vec![QueryEdge::new(1, "REL", 2, edge_props)],
        }
    }

    fn compiler() -> QueryCompiler {
        QueryCompiler::default()
    }

    #[test]
    fn test_compile_directed_pattern_with_inline_properties() {
        let query = compiler().compile(&two_node_graph(PropertyMap::new())).unwrap();
        assert_eq!(
            query,
            r#"MATCH (n1:X {lemma:"a"})-[r1:REL]->(n2:Y {lemma:"b"}) RETURN *"#
        );
    }

    #[test]
    fn test_compile_with_where_clause() {
        let config = CompilerConfig {
            use_where: true,
            ..CompilerConfig::default()
        };
        let query = compile(&two_node_graph(PropertyMap::new()), &config).unwrap();
        assert_eq!(
            query,
            r#"MATCH (n1:X)-[r1:REL]->(n2:Y) WHERE n1.lemma = "a" AND n2.lemma = "b" RETURN *"#
        );
    }

    #[test]
    fn test_compile_without_labels() {
        let config = CompilerConfig {
            use_labels: false,
            ..CompilerConfig::default()
        };
        let query = compile(&two_node_graph(PropertyMap::new()), &config).unwrap();
        assert_eq!(query, r#"MATCH (n1 {lemma:"a"})-[r1]->(n2 {lemma:"b"}) RETURN *"#);
    }

    #[test]
    fn test_compile_undirected_edges() {
        let both = PropertyMap::new().with(DIRECTION_PROPERTY, "Both");
        let query = compiler().compile(&two_node_graph(both)).unwrap();
        assert!(query.contains("-[r1:REL]-(n2"));
        assert!(!query.contains("->"));

        let config = CompilerConfig {
            use_directions: false,
            ..CompilerConfig::default()
        };
        let query = compile(&two_node_graph(PropertyMap::new()), &config).unwrap();
        assert!(query.contains("-[r1:REL]-(n2"));
    }

    #[test]
    fn test_non_conditionals_are_stripped_from_a_copy() {
        let mut graph = two_node_graph(PropertyMap::new());
        graph.nodes[0].properties.insert("lemma", "?");
        graph.nodes[0].properties.insert("query", true);
        let before = graph.clone();

        let query = compiler().compile(&graph).unwrap();

        assert!(query.starts_with("MATCH (n1:X)-[r1:REL]->"));
        assert_eq!(graph, before);
    }

    #[test]
    fn test_non_conditionals_only_match_listed_values() {
        let mut graph = two_node_graph(PropertyMap::new());
        graph.nodes[1].properties.insert("query", "yes");
        let query = compiler().compile(&graph).unwrap();
        assert!(query.contains(r#"(n2:Y {lemma:"b", query:"yes"})"#));
    }

    #[test]
    fn test_dangling_edge_reference() {
        let mut graph = two_node_graph(PropertyMap::new());
        graph.edges.push(QueryEdge::new(2, "REL", 7, PropertyMap::new()));

        match compiler().compile(&graph) {
            Err(CompileError::DanglingEdgeReference { missing, .. }) => {
                assert_eq!(missing, NodeId::Int(7));
            }
            other => panic!("expected dangling reference, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_graph_is_rejected() {
        assert!(matches!(
            compiler().compile(&QueryGraph::default()),
            Err(CompileError::EmptyPattern)
        ));
    }

    #[test]
    fn test_isolated_nodes_become_standalone_patterns() {
        let mut graph = two_node_graph(PropertyMap::new());
        graph.nodes.push(QueryNode::new(3, ["Z"], PropertyMap::new()));
        let query = compiler().compile(&graph).unwrap();
        assert!(query.contains(r#"(n2:Y {lemma:"b"}), (n3:Z) RETURN *"#));

        let single = QueryGraph {
            nodes: vec![QueryNode::new("x", Vec::<String>::new(), PropertyMap::new())],
            edges: Vec::new(),
        };
        assert_eq!(compiler().compile(&single).unwrap(), "MATCH (nx) RETURN *");
    }

    #[test]
    fn test_int_and_string_ids_get_distinct_variables() {
        let graph = QueryGraph {
            nodes: vec![
                QueryNode::new(1, ["X"], PropertyMap::new().with("lemma", "a")),
                QueryNode::new("1", ["Y"], PropertyMap::new().with("lemma", "b")),
            ],
            edges: vec![QueryEdge::new(1, "REL", "1", PropertyMap::new())],
        };
        assert_eq!(
            compiler().compile(&graph).unwrap(),
            r#"MATCH (n1:X {lemma:"a"})-[r1:REL]->(n1_2:Y {lemma:"b"}) RETURN *"#
        );
    }

    #[test]
    fn test_explicit_returns_and_prefixes() {
        let config = CompilerConfig {
            node_prefix: "node_".to_string(),
            relation_prefix: "rel_".to_string(),
            returns: vec!["node_1".to_string(), "rel_1".to_string()],
            ..CompilerConfig::default()
        };
        let query = compile(&two_node_graph(PropertyMap::new()), &config).unwrap();
        assert!(query.starts_with("MATCH (node_1:X"));
        assert!(query.contains("-[rel_1:REL]->"));
        assert!(query.ends_with("RETURN node_1, rel_1"));
    }

    #[test]
    fn test_quoting_and_escaping() {
        let graph = QueryGraph {
            nodes: vec![
                QueryNode::new("a-b", ["Some Label"], PropertyMap::new().with("text", r#"say "hi" \ bye"#)),
                QueryNode::new(2, ["Y"], PropertyMap::new().with("weight", 1.0).with("n", 3)),
            ],
            edges: vec![QueryEdge::new("a-b", "HAS PART", 2, PropertyMap::new())],
        };
        let query = compiler().compile(&graph).unwrap();
        assert_eq!(
            query,
            r#"MATCH (`na-b`:`Some Label` {text:"say \"hi\" \\ bye"})-[r1:`HAS PART`]->(n2:Y {weight:1.0, n:3}) RETURN *"#
        );
    }

    #[test]
    fn test_builder_payload_shape() {
        let payload = json!({
            "nodes": [
                {"id": 1, "label": "EVENT", "properties": {"lemma": "vadha", "query": null}},
                {"id": 2, "label": "", "properties": {"lemma": ""}}
            ],
            "edges": [
                {"source": 1, "label": "HAPPENS_AFTER", "target": 2, "properties": {}}
            ]
        });
        let graph: QueryGraph = serde_json::from_value(payload).unwrap();
        let query = compiler().compile(&graph).unwrap();
        assert_eq!(
            query,
            r#"MATCH (n1:EVENT {lemma:"vadha"})-[r1:HAPPENS_AFTER]->(n2) RETURN *"#
        );
    }

    #[test]
    fn test_compile_from_property_graph_is_deterministic() {
        let mut graph = PropertyGraph::new();
        graph.add_node(1, ["X"], PropertyMap::new().with("lemma", "a"));
        graph.add_node(2, ["Y"], PropertyMap::new().with("lemma", "b"));
        graph.add_edge(1, "REL", 2, PropertyMap::new());
        graph.add_edge(2, "REL", 1, PropertyMap::new());

        let first = compiler().compile_graph(&graph).unwrap();
        let second = compiler().compile_graph(&graph).unwrap();
        assert_eq!(first, second);
        assert!(first.contains(r#"(n1:X {lemma:"a"})-[r1:REL]->(n2:Y {lemma:"b"})"#));
        assert!(first.contains(r#"(n2:Y {lemma:"b"})-[r2:REL]->(n1:X {lemma:"a"})"#));
        assert_eq!(graph.node(&NodeId::Int(1)).unwrap().properties().len(), 1);
    }

    #[test]
    fn test_multi_valued_property_renders_as_list() {
        let mut graph = two_node_graph(PropertyMap::new());
        graph.nodes.push(QueryNode::new(1, ["X"], PropertyMap::new().with("lemma", "c")));
        let query = compiler().compile(&graph).unwrap();
        assert!(query.starts_with(r#"MATCH (n1:X {lemma:["a", "c"]})"#));
    }
}
