//! The mutable property graph.
//!
//! Nodes and edges are owned here and iterated in insertion order. Callers
//! pass ids and property maps; reads hand out shared references only.

use std::fmt;

use indexmap::IndexMap;

use annograph_core::{Edge, EdgeKey, Node, NodeId, PropertyMap};

use crate::infer::{DefaultInference, InferStrategy};

/// An in-memory property graph with merge-on-write semantics.
///
/// Not synchronized: concurrent mutation must be serialized by the caller,
/// or each job builds its own graph.
pub struct PropertyGraph {
    pub(crate) nodes: IndexMap<NodeId, Node>,
    pub(crate) edges: IndexMap<EdgeKey, Edge>,
    inference: Box<dyn InferStrategy>,
}

impl Default for PropertyGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PropertyGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyGraph")
            .field("nodes", &self.nodes.len())
            .field("edges", &self.edges.len())
            .finish()
    }
}

impl PropertyGraph {
    /// Empty graph using [`DefaultInference`] for missing endpoints.
    pub fn new() -> Self {
        Self::with_inference(DefaultInference)
    }

    /// Empty graph with a custom strategy for synthesizing missing endpoints.
    pub fn with_inference(strategy: impl InferStrategy + 'static) -> Self {
        Self {
            nodes: IndexMap::new(),
            edges: IndexMap::new(),
            inference: Box::new(strategy),
        }
    }

    pub fn set_inference(&mut self, strategy: impl InferStrategy + 'static) {
        self.inference = Box::new(strategy);
    }

    // ── Reads ────────────────────────────────────────────────────

    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn edge(&self, key: &EdgeKey) -> Option<&Edge> {
        self.edges.get(key)
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Edges in insertion order.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn contains_node(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn contains_edge(&self, key: &EdgeKey) -> bool {
        self.edges.contains_key(key)
    }

    /// Σincoming + Σoutgoing for `id`.
    pub fn degree(&self, id: &NodeId) -> Option<u64> {
        self.nodes.get(id).map(Node::degree)
    }

    /// Position of `id` in insertion order.
    pub fn position(&self, id: &NodeId) -> Option<usize> {
        self.nodes.get_index_of(id)
    }

    /// Keys of every edge touching `id` whose label differs from `except`.
    pub fn edges_touching(&self, id: &NodeId, except: &str) -> Vec<EdgeKey> {
        self.edges
            .keys()
            .filter(|key| key.touches(id) && key.label != except)
            .cloned()
            .collect()
    }

    // ── Mutations ────────────────────────────────────────────────

    /// Idempotent upsert: creates the node or merges labels (ordered union)
    /// and properties (merge rule) into the existing one.
    pub fn add_node<I, S>(&mut self, id: impl Into<NodeId>, labels: I, properties: PropertyMap)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let id = id.into();
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        match self.nodes.get_mut(&id) {
            Some(node) => {
                let promoted = node.update(&labels, &properties);
                if !promoted.is_empty() {
                    tracing::debug!(node = %id, keys = ?promoted, "Node property became multi-valued");
                }
            }
            None => {
                let node = Node::new(id.clone(), &labels, properties);
                self.nodes.insert(id, node);
            }
        }
    }

    /// Upsert a node from a raw JSON property object, dropping values that
    /// are not scalars (or lists of scalars) with a warning.
    pub fn add_node_json<I, S>(
        &mut self,
        id: impl Into<NodeId>,
        labels: I,
        properties: &serde_json::Map<String, serde_json::Value>,
    ) where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.add_node(id, labels, PropertyMap::from_json(properties));
    }

    /// Add or merge the edge `(start, label, end)`.
    ///
    /// An existing triple only has its properties merged. A new edge whose
    /// endpoints are missing gets them synthesized through the inference
    /// strategy first. Either way both endpoint counters are incremented.
    /// Returns true if a new edge was created.
    pub fn add_edge(
        &mut self,
        start: impl Into<NodeId>,
        label: impl Into<String>,
        end: impl Into<NodeId>,
        properties: PropertyMap,
    ) -> bool {
        self.insert_edge(EdgeKey::new(start, label, end), properties)
    }

    pub(crate) fn insert_edge(&mut self, key: EdgeKey, properties: PropertyMap) -> bool {
        let created = match self.edges.get_mut(&key) {
            Some(edge) => {
                let promoted = edge.update(&properties);
                if !promoted.is_empty() {
                    tracing::debug!(edge = %key, keys = ?promoted, "Edge property became multi-valued");
                }
                false
            }
            None => {
                self.ensure_endpoints(&key, &properties);
                self.edges
                    .insert(key.clone(), Edge::new(key.clone(), properties));
                true
            }
        };

        if let Some(start) = self.nodes.get_mut(&key.start) {
            start.add_outgoing(&key.end);
        }
        if let Some(end) = self.nodes.get_mut(&key.end) {
            end.add_incoming(&key.start);
        }
        created
    }

    fn ensure_endpoints(&mut self, key: &EdgeKey, properties: &PropertyMap) {
        let has_start = self.contains_node(&key.start);
        let has_end = self.contains_node(&key.end);
        if has_start && has_end {
            return;
        }

        let inferred = self
            .inference
            .infer(&key.start, &key.label, &key.end, properties);

        if !has_start {
            tracing::debug!(node = %key.start, edge = %key, "Synthesizing missing start node");
            self.add_node(key.start.clone(), inferred.start_labels, inferred.start_properties);
        }
        if !has_end && !self.contains_node(&key.end) {
            tracing::debug!(node = %key.end, edge = %key, "Synthesizing missing end node");
            self.add_node(key.end.clone(), inferred.end_labels, inferred.end_properties);
        }
    }

    /// Remove the edge `(start, label, end)` and decrement both endpoint
    /// counters. Returns false if no such edge exists.
    pub fn remove_edge(
        &mut self,
        start: impl Into<NodeId>,
        label: impl Into<String>,
        end: impl Into<NodeId>,
    ) -> bool {
        self.remove_edge_key(&EdgeKey::new(start, label, end))
    }

    pub fn remove_edge_key(&mut self, key: &EdgeKey) -> bool {
        if self.edges.shift_remove(key).is_none() {
            return false;
        }

        let outgoing_ok = self
            .nodes
            .get_mut(&key.start)
            .is_some_and(|n| n.remove_outgoing(&key.end));
        let incoming_ok = self
            .nodes
            .get_mut(&key.end)
            .is_some_and(|n| n.remove_incoming(&key.start));

        if !outgoing_ok || !incoming_ok {
            tracing::error!(edge = %key, "Degree counter underflow while removing edge");
        }
        true
    }

    /// Move one endpoint of an existing edge.
    ///
    /// `new_start` wins when both targets are existing nodes; a target that
    /// is not in the graph is ignored. The old edge is removed and re-added
    /// through [`add_edge`](Self::add_edge) with its properties, so it merges
    /// into any edge already present at the destination. Returns false if the
    /// edge is absent or neither target exists.
    pub fn transfer_edge(
        &mut self,
        key: &EdgeKey,
        new_start: Option<&NodeId>,
        new_end: Option<&NodeId>,
    ) -> bool {
        let Some(edge) = self.edges.get(key) else {
            return false;
        };
        let properties = edge.properties().clone();

        let new_start = new_start.filter(|id| self.contains_node(id));
        let new_end = new_end.filter(|id| self.contains_node(id));
        let target = match (new_start, new_end) {
            (Some(start), _) => EdgeKey {
                start: start.clone(),
                ..key.clone()
            },
            (None, Some(end)) => EdgeKey {
                end: end.clone(),
                ..key.clone()
            },
            (None, None) => return false,
        };

        tracing::debug!(from = %key, to = %target, "Transferring edge");
        self.remove_edge_key(key);
        self.insert_edge(target, properties);
        true
    }
}
