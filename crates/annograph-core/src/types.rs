//! Node and edge containers for the property graph.
//!
//! Nodes carry an ordered, de-duplicated label list, a property map, and
//! multiset adjacency counters (`incoming` / `outgoing`) keyed by neighbour
//! id. Edges are identified by their `(start, label, end)` triple.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::property::{merge_labels, PropertyMap};

// ── Identifiers ───────────────────────────────────────────────────

/// Externally supplied node identifier.
///
/// Upstream records use either integer row ids or string keys; the original
/// JSON form is kept on export.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeId {
    Int(i64),
    Str(String),
}

impl NodeId {
    /// Convert a raw JSON id (integer or string).
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Number(n) => n.as_i64().map(Self::Int),
            serde_json::Value::String(s) => Some(Self::Str(s.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{i}"),
            Self::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for NodeId {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for NodeId {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<&str> for NodeId {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for NodeId {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<&NodeId> for NodeId {
    fn from(v: &NodeId) -> Self {
        v.clone()
    }
}

/// Identity of an edge: unique per graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EdgeKey {
    pub start: NodeId,
    pub label: String,
    pub end: NodeId,
}

impl EdgeKey {
    pub fn new(start: impl Into<NodeId>, label: impl Into<String>, end: impl Into<NodeId>) -> Self {
        Self {
            start: start.into(),
            label: label.into(),
            end: end.into(),
        }
    }

    /// The same triple with start and end swapped.
    pub fn reversed(&self) -> Self {
        Self {
            start: self.end.clone(),
            label: self.label.clone(),
            end: self.start.clone(),
        }
    }

    /// Whether either endpoint is `id`.
    pub fn touches(&self, id: &NodeId) -> bool {
        &self.start == id || &self.end == id
    }
}

impl fmt::Display for EdgeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})-[{}]->({})", self.start, self.label, self.end)
    }
}

// ── Node ──────────────────────────────────────────────────────────

/// A node in the property graph.
#[derive(Debug, Clone)]
pub struct Node {
    id: NodeId,
    labels: Vec<String>,
    properties: PropertyMap,
    incoming: IndexMap<NodeId, u32>,
    outgoing: IndexMap<NodeId, u32>,
}

impl Node {
    pub fn new(id: NodeId, labels: &[String], properties: PropertyMap) -> Self {
        let mut unique = Vec::with_capacity(labels.len());
        merge_labels(&mut unique, labels);
        Self {
            id,
            labels: unique,
            properties,
            incoming: IndexMap::new(),
            outgoing: IndexMap::new(),
        }
    }

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn properties(&self) -> &PropertyMap {
        &self.properties
    }

    /// Neighbour id → number of edges arriving from it.
    pub fn incoming(&self) -> &IndexMap<NodeId, u32> {
        &self.incoming
    }

    /// Neighbour id → number of edges leaving towards it.
    pub fn outgoing(&self) -> &IndexMap<NodeId, u32> {
        &self.outgoing
    }

    /// Merge labels (ordered union) and properties (merge rule).
    /// Returns the property keys that became multi-valued.
    pub fn update(&mut self, labels: &[String], properties: &PropertyMap) -> Vec<String> {
        merge_labels(&mut self.labels, labels);
        self.properties.merge(properties)
    }

    pub fn add_incoming(&mut self, neighbour: &NodeId) {
        *self.incoming.entry(neighbour.clone()).or_insert(0) += 1;
    }

    pub fn add_outgoing(&mut self, neighbour: &NodeId) {
        *self.outgoing.entry(neighbour.clone()).or_insert(0) += 1;
    }

    /// Decrement the incoming counter for `neighbour`.
    /// Returns false if the counter was already zero.
    pub fn remove_incoming(&mut self, neighbour: &NodeId) -> bool {
        decrement(&mut self.incoming, neighbour)
    }

    /// Decrement the outgoing counter for `neighbour`.
    /// Returns false if the counter was already zero.
    pub fn remove_outgoing(&mut self, neighbour: &NodeId) -> bool {
        decrement(&mut self.outgoing, neighbour)
    }

    pub fn in_degree(&self) -> u64 {
        self.incoming.values().map(|&c| u64::from(c)).sum()
    }

    pub fn out_degree(&self) -> u64 {
        self.outgoing.values().map(|&c| u64::from(c)).sum()
    }

    /// Total degree: Σincoming + Σoutgoing.
    pub fn degree(&self) -> u64 {
        self.in_degree() + self.out_degree()
    }

    /// Distinct neighbour ids over both directions.
    pub fn neighbours(&self) -> impl Iterator<Item = &NodeId> {
        self.incoming
            .keys()
            .chain(self.outgoing.keys().filter(|id| !self.incoming.contains_key(*id)))
    }
}

/// Counters drop their entry on reaching zero so `neighbours` only lists
/// live adjacency.
fn decrement(counter: &mut IndexMap<NodeId, u32>, neighbour: &NodeId) -> bool {
    match counter.get_mut(neighbour) {
        Some(count) if *count > 1 => {
            *count -= 1;
            true
        }
        Some(_) => {
            counter.shift_remove(neighbour);
            true
        }
        None => false,
    }
}

// ── Edge ──────────────────────────────────────────────────────────

/// A directed, labelled edge.
#[derive(Debug, Clone)]
pub struct Edge {
    key: EdgeKey,
    properties: PropertyMap,
}

impl Edge {
    pub fn new(key: EdgeKey, properties: PropertyMap) -> Self {
        Self { key, properties }
    }

    pub fn key(&self) -> &EdgeKey {
        &self.key
    }

    pub fn start(&self) -> &NodeId {
        &self.key.start
    }

    pub fn label(&self) -> &str {
        &self.key.label
    }

    pub fn end(&self) -> &NodeId {
        &self.key.end
    }

    pub fn properties(&self) -> &PropertyMap {
        &self.properties
    }

    /// Merge properties (merge rule). Returns keys that became multi-valued.
    pub fn update(&mut self, properties: &PropertyMap) -> Vec<String> {
        self.properties.merge(properties)
    }
}
