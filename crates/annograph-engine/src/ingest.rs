//! Build a graph from line-delimited records.
//!
//! Accepts the same record shape the JSONL export produces, so an export can
//! be re-read, and upstream annotation dumps can be streamed in directly.

use std::io::BufRead;

use serde::Serialize;

use annograph_core::PropertyMap;

use crate::error::{EngineError, Result};
use crate::export::GraphRecord;
use crate::graph::PropertyGraph;

/// What an ingestion run did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    pub lines: usize,
    pub nodes: usize,
    pub edges: usize,
    /// Edge records that hit an existing `(start, label, end)` triple.
    pub merged_edges: usize,
}

impl PropertyGraph {
    /// Apply one record through `add_node` / `add_edge`. Returns true when an
    /// edge record created a new edge.
    pub fn ingest_record(&mut self, record: &GraphRecord) -> bool {
        match record {
            GraphRecord::Node(node) => {
                self.add_node(
                    node.id.clone(),
                    node.labels.iter().cloned(),
                    PropertyMap::from_json(&node.properties),
                );
                false
            }
            GraphRecord::Relationship(edge) => self.add_edge(
                edge.start.id.clone(),
                edge.label.clone(),
                edge.end.id.clone(),
                PropertyMap::from_json(&edge.properties),
            ),
        }
    }

    /// Stream JSONL records into this graph. Blank lines are skipped; the
    /// first malformed line aborts with its 1-based line number. Records
    /// applied before the failure stay in the graph.
    pub fn ingest_jsonl<R: BufRead>(&mut self, reader: R) -> Result<IngestSummary> {
        let mut summary = IngestSummary::default();

        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record: GraphRecord = serde_json::from_str(&line).map_err(|source| {
                EngineError::Record {
                    line: index + 1,
                    source,
                }
            })?;

            summary.lines += 1;
            match &record {
                GraphRecord::Node(_) => summary.nodes += 1,
                GraphRecord::Relationship(_) => summary.edges += 1,
            }
            if !self.ingest_record(&record) && matches!(record, GraphRecord::Relationship(_)) {
                summary.merged_edges += 1;
            }
        }

        tracing::info!(
            lines = summary.lines,
            nodes = summary.nodes,
            edges = summary.edges,
            "Ingested JSONL records"
        );
        Ok(summary)
    }

    /// New graph (default inference) from JSONL records.
    pub fn from_jsonl<R: BufRead>(reader: R) -> Result<Self> {
        let mut graph = Self::new();
        graph.ingest_jsonl(reader)?;
        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use annograph_core::{EdgeKey, NodeId, PropertyValue};

    const RECORDS: &str = r#"{"type":"node","id":1,"labels":["SUBSTANCE"],"properties":{"lemma":"ghee"}}
{"type":"node","id":2,"labels":["DOSHA"],"properties":{"lemma":"pitta","line_id":[3,4]}}

{"type":"relationship","label":"CURES","start":{"id":1},"end":{"id":2},"properties":{"annotator":7}}
{"type":"edge","label":"CURES","start":{"id":1},"end":{"id":2},"properties":{"annotator":8}}
{"type":"relationship","label":"IS_PART_OF","start":{"id":2},"end":{"id":"tridosha"}}
"#;

    #[test]
    fn test_ingest_applies_merge_semantics() {
        let mut graph = PropertyGraph::new();
        let summary = graph.ingest_jsonl(RECORDS.as_bytes()).unwrap();

        assert_eq!(
            summary,
            IngestSummary {
                lines: 5,
                nodes: 2,
                edges: 3,
                merged_edges: 1,
            }
        );
        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 2);

        let cures = graph.edge(&EdgeKey::new(1, "CURES", 2)).unwrap();
        assert_eq!(cures.properties().get("annotator").unwrap().values().len(), 2);

        let pitta = graph.node(&NodeId::Int(2)).unwrap();
        assert!(pitta.properties().get("line_id").unwrap().is_multi());

        let synthesized = graph.node(&NodeId::from("tridosha")).unwrap();
        assert_eq!(
            synthesized.properties().get_value("auto"),
            Some(&PropertyValue::Boolean(true))
        );
    }

    #[test]
    fn test_export_reingests_to_same_records() {
        let original = PropertyGraph::from_jsonl(RECORDS.as_bytes()).unwrap();
        let jsonl = original.to_jsonl().unwrap();
        let copy = PropertyGraph::from_jsonl(jsonl.as_bytes()).unwrap();

        assert_eq!(copy.to_jsonl().unwrap(), jsonl);
    }

    #[test]
    fn test_malformed_line_reports_line_number() {
        let input = "{\"type\":\"node\",\"id\":1}\n\n{\"type\":\"node\"}\n";
        let mut graph = PropertyGraph::new();

        match graph.ingest_jsonl(input.as_bytes()) {
            Err(EngineError::Record { line, .. }) => assert_eq!(line, 3),
            other => panic!("expected record error, got {other:?}"),
        }
        // The valid first record was applied.
        assert_eq!(graph.node_count(), 1);
    }

    #[test]
    fn test_non_object_properties_do_not_abort_load() {
        let input = r#"{"type":"node","id":1,"labels":["A"],"properties":null}
{"type":"node","id":2,"labels":["B"],"properties":{"lemma":"vata"}}
{"type":"relationship","label":"R","start":{"id":1},"end":{"id":2},"properties":[1,2]}
"#;
        let mut graph = PropertyGraph::new();
        let summary = graph.ingest_jsonl(input.as_bytes()).unwrap();

        assert_eq!(summary.lines, 3);
        assert_eq!(graph.node_count(), 2);
        assert!(graph.node(&NodeId::Int(1)).unwrap().properties().is_empty());
        assert_eq!(graph.node(&NodeId::Int(1)).unwrap().labels(), &["A".to_string()]);
        assert!(graph.edge(&EdgeKey::new(1, "R", 2)).unwrap().properties().is_empty());
    }

    #[test]
    fn test_unknown_record_type_is_rejected() {
        let input = r#"{"type":"hyperedge","id":1}"#;
        let err = PropertyGraph::from_jsonl(input.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }
}
