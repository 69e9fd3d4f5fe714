//! Connectivity over selected relation labels and cluster ranking.

use std::cmp::Reverse;
use std::collections::{HashSet, VecDeque};

use serde::Serialize;

use annograph_core::{EdgeKey, NodeId};

use crate::graph::PropertyGraph;

/// A cluster member with the keys used to rank it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusterMember {
    pub id: NodeId,
    /// Σincoming + Σoutgoing.
    pub degree: u64,
    /// Maximum integer value of the rank property, if any.
    pub rank: Option<i64>,
    /// Insertion position in the graph, the final tie-break.
    pub position: usize,
}

/// Nodes connected through the chosen relations, best-ranked first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cluster {
    pub members: Vec<ClusterMember>,
}

impl Cluster {
    /// The member that absorbs the rest of the cluster.
    pub fn canonical(&self) -> &ClusterMember {
        &self.members[0]
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl PropertyGraph {
    /// Every node reachable from `id` through edges (either direction)
    /// whose label is in `relations`, including `id` itself.
    ///
    /// Iterative breadth-first search with a visited set, so cycles and deep
    /// chains are safe. Unknown ids yield an empty set.
    pub fn get_connected_nodes(&self, id: &NodeId, relations: &[&str]) -> HashSet<NodeId> {
        let mut visited = HashSet::new();
        if !self.contains_node(id) {
            return visited;
        }

        visited.insert(id.clone());
        let mut queue = VecDeque::from([id.clone()]);

        while let Some(current) = queue.pop_front() {
            let Some(node) = self.node(&current) else {
                continue;
            };
            for neighbour in node.neighbours() {
                if visited.contains(neighbour) {
                    continue;
                }
                if relations
                    .iter()
                    .any(|relation| self.linked_by(&current, relation, neighbour))
                {
                    visited.insert(neighbour.clone());
                    queue.push_back(neighbour.clone());
                }
            }
        }

        visited
    }

    fn linked_by(&self, a: &NodeId, relation: &str, b: &NodeId) -> bool {
        let forward = EdgeKey::new(a, relation, b);
        self.contains_edge(&forward) || self.contains_edge(&forward.reversed())
    }

    /// Partition the graph into clusters connected through `relations`,
    /// keeping only clusters with more than one member.
    ///
    /// Members are ranked by degree (descending), then by the maximum
    /// integer value of `rank_property` (descending, missing last), then by
    /// insertion order.
    pub fn groups(&self, relations: &[&str], rank_property: &str) -> Vec<Cluster> {
        let mut handled: HashSet<NodeId> = HashSet::new();
        let mut clusters = Vec::new();

        for id in self.nodes.keys() {
            if handled.contains(id) {
                continue;
            }
            let connected = self.get_connected_nodes(id, relations);
            if connected.len() <= 1 {
                continue;
            }

            let mut members: Vec<ClusterMember> = connected
                .iter()
                .filter_map(|member| self.rank_member(member, rank_property))
                .collect();
            members.sort_by_key(|m| (Reverse(m.degree), Reverse(m.rank), m.position));

            handled.extend(connected);
            clusters.push(Cluster { members });
        }

        clusters
    }

    fn rank_member(&self, id: &NodeId, rank_property: &str) -> Option<ClusterMember> {
        let (position, _, node) = self.nodes.get_full(id)?;
        let rank = node
            .properties()
            .get(rank_property)
            .and_then(|p| p.values().iter().filter_map(|v| v.as_i64()).max());
        Some(ClusterMember {
            id: id.clone(),
            degree: node.degree(),
            rank,
            position,
        })
    }
}
