//! Synonym merge pass: collapse clusters of duplicate entities onto one
//! canonical node.

use serde::Serialize;

use annograph_core::config::MergeConfig;
use annograph_core::{EdgeKey, NodeId, PropertyMap};

use crate::graph::PropertyGraph;
use crate::infer::AUTO_PROPERTY;

/// Counts of what a merge pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    pub clusters: usize,
    pub merged_nodes: usize,
    pub synonym_edges_added: usize,
    pub synonym_edges_removed: usize,
    pub edges_transferred: usize,
}

impl PropertyGraph {
    /// Run the merge pass over clusters connected by `config.relation`.
    ///
    /// For every non-canonical member of a cluster:
    /// 1. add `canonical -[relation]-> member` if absent,
    /// 2. remove `member -[relation]-> canonical` if present,
    /// 3. move every other-labelled edge touching the member onto the
    ///    canonical node.
    ///
    /// Ranking ties fall back to insertion order (see [`PropertyGraph::groups`]).
    pub fn merge_synonyms(&mut self, config: &MergeConfig) -> MergeReport {
        let relation = config.relation.as_str();
        let clusters = self.groups(&[relation], &config.rank_property);
        let mut report = MergeReport {
            clusters: clusters.len(),
            ..MergeReport::default()
        };

        for cluster in &clusters {
            let canonical = cluster.canonical().id.clone();
            tracing::info!(
                canonical = %canonical,
                members = cluster.len(),
                "Merging synonym cluster"
            );

            for member in cluster.members.iter().skip(1) {
                let member = &member.id;
                report.merged_nodes += 1;

                let forward = EdgeKey::new(&canonical, relation, member);
                if !self.contains_edge(&forward) {
                    self.insert_edge(forward, PropertyMap::new().with(AUTO_PROPERTY, true));
                    report.synonym_edges_added += 1;
                    tracing::info!(from = %canonical, to = %member, "Added synonym edge");
                }

                let reverse = EdgeKey::new(member, relation, &canonical);
                if self.remove_edge_key(&reverse) {
                    report.synonym_edges_removed += 1;
                    tracing::info!(from = %member, to = %canonical, "Removed synonym edge");
                }

                report.edges_transferred += self.redirect_edges(member, &canonical, relation);
            }
        }

        tracing::info!(
            clusters = report.clusters,
            merged = report.merged_nodes,
            transferred = report.edges_transferred,
            "Synonym merge complete"
        );
        report
    }

    /// Move every edge touching `from` (other than `relation` edges) onto
    /// `to`. Self-loops on `from` have both endpoints moved.
    fn redirect_edges(&mut self, from: &NodeId, to: &NodeId, relation: &str) -> usize {
        let mut transferred = 0;
        for key in self.edges_touching(from, relation) {
            let mut current = key;
            if &current.start == from {
                if !self.transfer_edge(&current, Some(to), None) {
                    continue;
                }
                transferred += 1;
                current.start = to.clone();
            }
            if &current.end == from && self.transfer_edge(&current, None, Some(to)) {
                transferred += 1;
            }
        }
        transferred
    }
}
