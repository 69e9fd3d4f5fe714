//! Bulk export: line-delimited JSON records and import-ready CSV tables.

use std::io::Write;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};

use annograph_core::{Edge, Node, NodeId, PropertyMap};

use crate::error::Result;
use crate::graph::PropertyGraph;

/// Separator for multi-valued CSV cells and multi-label `:LABEL` cells.
pub const CSV_LIST_SEPARATOR: &str = ";";

// ── JSONL Records ─────────────────────────────────────────────────

/// One line of the JSONL export (and of JSONL ingestion).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum GraphRecord {
    Node(NodeRecord),
    #[serde(alias = "edge")]
    Relationship(EdgeRecord),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: NodeId,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default, deserialize_with = "lenient_object")]
    pub properties: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub label: String,
    pub start: EndpointRef,
    pub end: EndpointRef,
    #[serde(default, deserialize_with = "lenient_object")]
    pub properties: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointRef {
    pub id: NodeId,
}

/// A `properties` value that is not an object (null, list, scalar) is
/// replaced by an empty map so one bad field never fails the record.
fn lenient_object<'de, D>(
    deserializer: D,
) -> std::result::Result<serde_json::Map<String, serde_json::Value>, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Object(map) => Ok(map),
        other => {
            tracing::warn!(value = %other, "Dropping non-object record properties");
            Ok(serde_json::Map::new())
        }
    }
}

impl From<&Node> for NodeRecord {
    fn from(node: &Node) -> Self {
        Self {
            id: node.id().clone(),
            labels: node.labels().to_vec(),
            properties: node.properties().to_json(),
        }
    }
}

impl From<&Edge> for EdgeRecord {
    fn from(edge: &Edge) -> Self {
        Self {
            label: edge.label().to_string(),
            start: EndpointRef {
                id: edge.start().clone(),
            },
            end: EndpointRef {
                id: edge.end().clone(),
            },
            properties: edge.properties().to_json(),
        }
    }
}

// ── CSV Tables ────────────────────────────────────────────────────

/// Node and edge tables with the union of property keys as columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvExport {
    pub nodes: String,
    pub edges: String,
}

impl CsvExport {
    /// Write `nodes.csv` and `edges.csv` into `dir`, returning both paths.
    pub fn write_to(&self, dir: &Path) -> Result<(PathBuf, PathBuf)> {
        std::fs::create_dir_all(dir)?;
        let nodes = dir.join("nodes.csv");
        let edges = dir.join("edges.csv");
        std::fs::write(&nodes, &self.nodes)?;
        std::fs::write(&edges, &self.edges)?;
        Ok((nodes, edges))
    }
}

/// One table per distinct property-key set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvTable {
    /// Property columns after the fixed `:ID`/`:START_ID` columns.
    pub keys: Vec<String>,
    pub rows: usize,
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartitionedCsv {
    pub nodes: Vec<CsvTable>,
    pub edges: Vec<CsvTable>,
}

impl PartitionedCsv {
    /// Write `nodes_<n>.csv` / `edges_<n>.csv` into `dir`.
    pub fn write_to(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(dir)?;
        let mut written = Vec::with_capacity(self.nodes.len() + self.edges.len());
        for (kind, tables) in [("nodes", &self.nodes), ("edges", &self.edges)] {
            for (i, table) in tables.iter().enumerate() {
                let path = dir.join(format!("{kind}_{i}.csv"));
                std::fs::write(&path, &table.content)?;
                written.push(path);
            }
        }
        Ok(written)
    }
}

const NODE_COLUMNS: [&str; 2] = [":ID", ":LABEL"];
const EDGE_COLUMNS: [&str; 3] = [":START_ID", ":TYPE", ":END_ID"];

fn node_cells(node: &Node) -> Vec<String> {
    vec![node.id().to_string(), node.labels().join(CSV_LIST_SEPARATOR)]
}

fn edge_cells(edge: &Edge) -> Vec<String> {
    vec![
        edge.start().to_string(),
        edge.label().to_string(),
        edge.end().to_string(),
    ]
}

/// Render rows as CSV. Missing properties are empty cells.
fn render_table<'a, T: 'a>(
    fixed: &[&str],
    keys: &[String],
    items: impl IntoIterator<Item = &'a T>,
    cells: impl Fn(&T) -> Vec<String>,
    properties: impl Fn(&T) -> &PropertyMap,
) -> Result<(String, usize)> {
    let mut writer = csv::Writer::from_writer(vec![]);
    let header: Vec<&str> = fixed
        .iter()
        .copied()
        .chain(keys.iter().map(String::as_str))
        .collect();
    writer.write_record(&header)?;

    let mut rows = 0;
    for item in items {
        let props = properties(item);
        let mut record = cells(item);
        record.extend(keys.iter().map(|key| {
            props
                .get(key)
                .map(|p| p.join(CSV_LIST_SEPARATOR))
                .unwrap_or_default()
        }));
        writer.write_record(&record)?;
        rows += 1;
    }

    let data = writer.into_inner().map_err(|e| e.into_error())?;
    Ok((String::from_utf8(data)?, rows))
}

/// Union of property keys in first-seen order.
fn key_union<'a>(maps: impl IntoIterator<Item = &'a PropertyMap>) -> Vec<String> {
    let mut keys: IndexMap<String, ()> = IndexMap::new();
    for map in maps {
        for key in map.keys() {
            if !keys.contains_key(key) {
                keys.insert(key.clone(), ());
            }
        }
    }
    keys.into_keys().collect()
}

/// Group items by their sorted property-key set, in first-seen order.
fn partition<'a, T>(
    items: impl IntoIterator<Item = &'a T>,
    properties: impl Fn(&T) -> &PropertyMap,
) -> IndexMap<Vec<String>, Vec<&'a T>>
where
    T: 'a,
{
    let mut groups: IndexMap<Vec<String>, Vec<&'a T>> = IndexMap::new();
    for item in items {
        let mut schema: Vec<String> = properties(item).keys().cloned().collect();
        schema.sort();
        groups.entry(schema).or_default().push(item);
    }
    groups
}

// ── PropertyGraph Export ──────────────────────────────────────────

impl PropertyGraph {
    /// Every node record followed by every edge record, in insertion order.
    pub fn records(&self) -> impl Iterator<Item = GraphRecord> + '_ {
        self.nodes()
            .map(|n| GraphRecord::Node(n.into()))
            .chain(self.edges().map(|e| GraphRecord::Relationship(e.into())))
    }

    /// One JSON record per line, nodes first, no trailing newline.
    pub fn to_jsonl(&self) -> Result<String> {
        let lines = self
            .records()
            .map(|record| serde_json::to_string(&record))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(lines.join("\n"))
    }

    /// Stream the JSONL export, one record per line.
    pub fn write_jsonl<W: Write>(&self, mut writer: W) -> Result<usize> {
        let mut written = 0;
        for record in self.records() {
            serde_json::to_writer(&mut writer, &record)?;
            writer.write_all(b"\n")?;
            written += 1;
        }
        writer.flush()?;
        Ok(written)
    }

    /// Node and edge tables for bulk import. Property columns are the union
    /// of keys across all nodes (resp. edges); multi-valued cells and
    /// multi-label cells are `;`-joined.
    pub fn to_csv(&self) -> Result<CsvExport> {
        let node_keys = key_union(self.nodes().map(Node::properties));
        let (nodes, _) = render_table(
            &NODE_COLUMNS,
            &node_keys,
            self.nodes(),
            node_cells,
            Node::properties,
        )?;

        let edge_keys = key_union(self.edges().map(Edge::properties));
        let (edges, _) = render_table(
            &EDGE_COLUMNS,
            &edge_keys,
            self.edges(),
            edge_cells,
            Edge::properties,
        )?;

        Ok(CsvExport { nodes, edges })
    }

    /// Like [`to_csv`](Self::to_csv), but one table per exact property-key
    /// set so heterogeneous records never produce sparse columns.
    pub fn to_csv_partitioned(&self) -> Result<PartitionedCsv> {
        let mut export = PartitionedCsv::default();

        for (keys, nodes) in partition(self.nodes(), Node::properties) {
            let (content, rows) =
                render_table(&NODE_COLUMNS, &keys, nodes, node_cells, Node::properties)?;
            export.nodes.push(CsvTable { keys, rows, content });
        }
        for (keys, edges) in partition(self.edges(), Edge::properties) {
            let (content, rows) =
                render_table(&EDGE_COLUMNS, &keys, edges, edge_cells, Edge::properties)?;
            export.edges.push(CsvTable { keys, rows, content });
        }

        tracing::debug!(
            node_tables = export.nodes.len(),
            edge_tables = export.edges.len(),
            "Partitioned CSV export"
        );
        Ok(export)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> PropertyGraph {
        let mut graph = PropertyGraph::new();
        graph.add_node(1, ["SUBSTANCE"], PropertyMap::new().with("lemma", "ghee").with("line_id", 4));
        graph.add_node(1, ["SUBSTANCE"], PropertyMap::new().with("line_id", 9));
        graph.add_node("vata", ["DOSHA", "CONCEPT"], PropertyMap::new().with("lemma", "vata"));
        graph.add_edge(1, "CURES", "vata", PropertyMap::new().with("annotator", 2));
        graph
    }

    #[test]
    fn test_jsonl_record_shape() {
        let jsonl = sample().to_jsonl().unwrap();
        let lines: Vec<&str> = jsonl.lines().collect();
        assert_eq!(lines.len(), 3);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(
            first,
            json!({
                "type": "node",
                "id": 1,
                "labels": ["SUBSTANCE"],
                "properties": {"lemma": "ghee", "line_id": [4, 9]}
            })
        );
        assert!(lines[0].starts_with(r#"{"type":"node""#));

        let edge: serde_json::Value = serde_json::from_str(lines[2]).unwrap();
        assert_eq!(
            edge,
            json!({
                "type": "relationship",
                "label": "CURES",
                "start": {"id": 1},
                "end": {"id": "vata"},
                "properties": {"annotator": 2}
            })
        );
    }

    #[test]
    fn test_jsonl_round_trip_reconstructs_records() {
        let graph = sample();
        let jsonl = graph.to_jsonl().unwrap();

        let mut parsed: Vec<String> = jsonl
            .lines()
            .map(|line| {
                let record: GraphRecord = serde_json::from_str(line).unwrap();
                serde_json::to_string(&record).unwrap()
            })
            .collect();
        let mut held: Vec<String> = graph
            .records()
            .map(|r| serde_json::to_string(&r).unwrap())
            .collect();
        parsed.sort();
        held.sort();
        assert_eq!(parsed, held);
    }

    #[test]
    fn test_write_jsonl_matches_to_jsonl() {
        let graph = sample();
        let mut buf = Vec::new();
        let written = graph.write_jsonl(&mut buf).unwrap();

        assert_eq!(written, 3);
        let streamed = String::from_utf8(buf).unwrap();
        assert_eq!(streamed.trim_end(), graph.to_jsonl().unwrap());
    }

    #[test]
    fn test_empty_graph_exports() {
        let graph = PropertyGraph::new();
        assert_eq!(graph.to_jsonl().unwrap(), "");
        let csv = graph.to_csv().unwrap();
        assert_eq!(csv.nodes, ":ID,:LABEL\n");
        assert_eq!(csv.edges, ":START_ID,:TYPE,:END_ID\n");
    }

    #[test]
    fn test_csv_headers_and_multi_values() {
        let csv = sample().to_csv().unwrap();
        let nodes: Vec<&str> = csv.nodes.lines().collect();
        assert_eq!(nodes[0], ":ID,:LABEL,lemma,line_id");
        assert_eq!(nodes[1], "1,SUBSTANCE,ghee,4;9");
        assert_eq!(nodes[2], "vata,DOSHA;CONCEPT,vata,");

        let edges: Vec<&str> = csv.edges.lines().collect();
        assert_eq!(edges[0], ":START_ID,:TYPE,:END_ID,annotator");
        assert_eq!(edges[1], "1,CURES,vata,2");
    }

    #[test]
    fn test_csv_quotes_cells_with_commas() {
        let mut graph = PropertyGraph::new();
        graph.add_node(1, ["TEXT"], PropertyMap::new().with("gloss", "milk, clarified"));
        let csv = graph.to_csv().unwrap();
        assert_eq!(csv.nodes.lines().nth(1), Some(r#"1,TEXT,"milk, clarified""#));
    }

    #[test]
    fn test_partitioned_csv_groups_by_key_set() {
        let mut graph = sample();
        graph.add_node(3, ["SUBSTANCE"], PropertyMap::new().with("line_id", 1).with("lemma", "taila"));
        graph.add_node(4, ["VERSE"], PropertyMap::new().with("text", "..."));
        graph.add_edge(3, "CURES", "vata", PropertyMap::new());

        let export = graph.to_csv_partitioned().unwrap();

        assert_eq!(export.nodes.len(), 3);
        assert_eq!(export.nodes[0].keys, vec!["lemma", "line_id"]);
        assert_eq!(export.nodes[0].rows, 2);
        assert_eq!(export.nodes[1].keys, vec!["lemma"]);
        assert_eq!(export.nodes[2].keys, vec!["text"]);
        assert_eq!(export.nodes[2].content, ":ID,:LABEL,text\n4,VERSE,...\n");

        assert_eq!(export.edges.len(), 2);
        assert_eq!(export.edges[1].keys, Vec::<String>::new());
        assert_eq!(export.edges[1].content, ":START_ID,:TYPE,:END_ID\n3,CURES,vata\n");
    }

    #[test]
    fn test_csv_write_to_directory() {
        let dir = tempfile::tempdir().unwrap();
        let (nodes, edges) = sample().to_csv().unwrap().write_to(dir.path()).unwrap();

        assert!(std::fs::read_to_string(nodes).unwrap().starts_with(":ID,:LABEL"));
        assert!(std::fs::read_to_string(edges).unwrap().starts_with(":START_ID"));

        let written = sample().to_csv_partitioned().unwrap().write_to(dir.path()).unwrap();
        assert_eq!(written.len(), 3);
        assert!(dir.path().join("nodes_1.csv").exists());
    }
}
