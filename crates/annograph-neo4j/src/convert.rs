//! Conversion of Bolt result rows into [`QueryResult`]s.
//!
//! Rows are first lowered into [`Value`], a small owned tree that keeps
//! graph entities apart from plain data, then folded into the result:
//! entities go to `nodes` / `edges` and are replaced in `matches` by their
//! `N:` / `R:` references.

use indexmap::IndexMap;
use neo4rs::{BoltList, BoltMap, BoltNode, BoltPath, BoltRelation, BoltType, BoltUnboundedRelation};

use annograph_query::execute::{node_ref, relationship_ref, EdgeView, NodeView, QueryResult, ViewRef};

use crate::client::GraphError;

type JsonMap = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, PartialEq)]
pub struct NodeData {
    pub id: i64,
    pub labels: Vec<String>,
    pub properties: JsonMap,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelationData {
    pub id: i64,
    pub start: i64,
    pub end: i64,
    pub label: String,
    pub properties: JsonMap,
}

/// A path with relationship endpoints already resolved to traversal order.
#[derive(Debug, Clone, PartialEq)]
pub struct PathData {
    pub nodes: Vec<NodeData>,
    pub relations: Vec<RelationData>,
}

/// One cell of a result row.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(serde_json::Value),
    List(Vec<Value>),
    Map(IndexMap<String, Value>),
    Node(NodeData),
    Relation(RelationData),
    Path(PathData),
}

// ── Bolt → Value ─────────────────────────────────────────────────

impl From<BoltType> for Value {
    fn from(value: BoltType) -> Self {
        match value {
            BoltType::Node(node) => Value::Node(node_data(node)),
            BoltType::Relation(rel) => Value::Relation(relation_data(rel)),
            BoltType::Path(path) => Value::Path(path_data(path)),
            BoltType::List(list) => Value::List(list.value.into_iter().map(Value::from).collect()),
            BoltType::Map(map) => {
                let mut entries: Vec<(String, Value)> = map
                    .value
                    .into_iter()
                    .map(|(k, v)| (k.value, Value::from(v)))
                    .collect();
                entries.sort_by(|a, b| a.0.cmp(&b.0));
                Value::Map(entries.into_iter().collect())
            }
            other => Value::Scalar(to_json(other)),
        }
    }
}

/// Plain JSON for property values and other non-entity data.
fn to_json(value: BoltType) -> serde_json::Value {
    match value {
        BoltType::Null(_) => serde_json::Value::Null,
        BoltType::Boolean(b) => serde_json::Value::Bool(b.value),
        BoltType::Integer(i) => serde_json::Value::from(i.value),
        BoltType::Float(f) => serde_json::Number::from_f64(f.value)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        BoltType::String(s) => serde_json::Value::String(s.value),
        BoltType::List(list) => serde_json::Value::Array(list.value.into_iter().map(to_json).collect()),
        BoltType::Map(map) => serde_json::Value::Object(properties(map)),
        other => {
            tracing::warn!(value = ?other, "Unsupported Bolt value, rendering as text");
            serde_json::Value::String(format!("{other:?}"))
        }
    }
}

/// Properties sorted by key.
fn properties(map: BoltMap) -> JsonMap {
    let mut entries: Vec<(String, serde_json::Value)> = map
        .value
        .into_iter()
        .map(|(k, v)| (k.value, to_json(v)))
        .collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    entries.into_iter().collect()
}

fn labels(list: BoltList) -> Vec<String> {
    list.value
        .into_iter()
        .filter_map(|label| match label {
            BoltType::String(s) => Some(s.value),
            _ => None,
        })
        .collect()
}

fn node_data(node: BoltNode) -> NodeData {
    NodeData {
        id: node.id.value,
        labels: labels(node.labels),
        properties: properties(node.properties),
    }
}

fn relation_data(rel: BoltRelation) -> RelationData {
    RelationData {
        id: rel.id.value,
        start: rel.start_node_id.value,
        end: rel.end_node_id.value,
        label: rel.typ.value,
        properties: properties(rel.properties),
    }
}

fn path_data(path: BoltPath) -> PathData {
    let nodes: Vec<NodeData> = path
        .nodes
        .value
        .into_iter()
        .filter_map(|n| match n {
            BoltType::Node(node) => Some(node_data(node)),
            _ => None,
        })
        .collect();
    let rels: Vec<BoltUnboundedRelation> = path
        .rels
        .value
        .into_iter()
        .filter_map(|r| match r {
            BoltType::UnboundedRelation(rel) => Some(rel),
            _ => None,
        })
        .collect();
    let indices: Vec<i64> = path
        .indices
        .value
        .into_iter()
        .filter_map(|i| match i {
            BoltType::Integer(i) => Some(i.value),
            _ => None,
        })
        .collect();

    let node_ids: Vec<i64> = nodes.iter().map(|n| n.id).collect();
    let relations = resolve_path(&node_ids, &rels, &indices);
    PathData { nodes, relations }
}

/// Walk the Bolt path index sequence: pairs of (relationship index, node
/// index). Relationship indices are 1-based; negative means the
/// relationship points against the direction of travel.
fn resolve_path(node_ids: &[i64], rels: &[BoltUnboundedRelation], indices: &[i64]) -> Vec<RelationData> {
    let Some(&first) = node_ids.first() else {
        return Vec::new();
    };
    let mut previous = first;
    let mut relations = Vec::with_capacity(indices.len() / 2);

    for pair in indices.chunks_exact(2) {
        let (rel_index, node_index) = (pair[0], pair[1]);
        let Some(rel) = rel_index
            .unsigned_abs()
            .checked_sub(1)
            .and_then(|i| rels.get(i as usize))
        else {
            tracing::warn!(rel_index, "Path references a missing relationship");
            break;
        };
        let Some(&next) = usize::try_from(node_index).ok().and_then(|i| node_ids.get(i)) else {
            tracing::warn!(node_index, "Path references a missing node");
            break;
        };
        let (start, end) = if rel_index > 0 { (previous, next) } else { (next, previous) };
        relations.push(RelationData {
            id: rel.id.value,
            start,
            end,
            label: rel.typ.value.clone(),
            properties: properties(rel.properties.clone()),
        });
        previous = next;
    }
    relations
}

/// Column name → value for one row, in column order.
pub fn row_values(row: &neo4rs::Row) -> Result<IndexMap<String, Value>, GraphError> {
    let columns: IndexMap<String, BoltType> = row.to().map_err(|e| GraphError::Row(e.to_string()))?;
    Ok(columns.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
}

// ── Value → QueryResult ──────────────────────────────────────────

/// Append one row: entities are registered once, `matches` gets references.
pub fn collect_row(result: &mut QueryResult, columns: IndexMap<String, Value>) {
    let row = columns
        .into_iter()
        .map(|(column, value)| (column, render(result, value)))
        .collect();
    result.matches.push(row);
}

fn render(result: &mut QueryResult, value: Value) -> serde_json::Value {
    match value {
        Value::Scalar(v) => v,
        Value::List(items) => items.into_iter().map(|v| render(result, v)).collect(),
        Value::Map(entries) => serde_json::Value::Object(
            entries
                .into_iter()
                .map(|(k, v)| (k, render(result, v)))
                .collect(),
        ),
        Value::Node(node) => serde_json::Value::String(add_node(result, node)),
        Value::Relation(rel) => serde_json::Value::String(add_relation(result, rel)),
        Value::Path(path) => {
            let start = path.nodes.first().map(|n| node_ref(n.id));
            let end = path.nodes.last().map(|n| node_ref(n.id));
            for node in path.nodes {
                add_node(result, node);
            }
            let rels: Vec<serde_json::Value> = path
                .relations
                .into_iter()
                .map(|r| serde_json::Value::String(add_relation(result, r)))
                .collect();
            serde_json::json!([start, rels, end])
        }
    }
}

fn add_node(result: &mut QueryResult, node: NodeData) -> String {
    let id = node_ref(node.id);
    result.add_node(NodeView {
        id: id.clone(),
        labels: node.labels,
        properties: node.properties,
    });
    id
}

fn add_relation(result: &mut QueryResult, rel: RelationData) -> String {
    let id = relationship_ref(rel.id);
    result.add_edge(EdgeView {
        id: id.clone(),
        label: rel.label,
        start: ViewRef { id: node_ref(rel.start) },
        end: ViewRef { id: node_ref(rel.end) },
        properties: rel.properties,
    });
    id
}
