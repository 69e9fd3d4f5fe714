//! Offline subcommands: everything that does not need a database.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Serialize;

use annograph_core::AnnographConfig;
use annograph_engine::{IngestSummary, MergeReport, PropertyGraph, RuleInference};
use annograph_query::{GuardVerdict, QueryCompiler, QueryGraph, QueryGuard, RenderedTemplate};

/// Where `build` writes its exports.
#[derive(Debug, Clone, Default)]
pub struct BuildOutputs {
    pub merge: bool,
    pub jsonl: Option<PathBuf>,
    pub csv_dir: Option<PathBuf>,
    pub partitioned: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub ingest: IngestSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merge: Option<MergeReport>,
    pub nodes: usize,
    pub edges: usize,
    pub files: Vec<PathBuf>,
}

/// Read JSONL records into a graph, optionally merge synonyms, then export.
pub fn build(config: &AnnographConfig, input: &Path, outputs: &BuildOutputs) -> anyhow::Result<BuildReport> {
    let file = File::open(input).with_context(|| format!("Cannot open {}", input.display()))?;

    let mut graph = PropertyGraph::with_inference(RuleInference::from_config(&config.inference));
    let ingest = graph
        .ingest_jsonl(BufReader::new(file))
        .with_context(|| format!("Cannot read {}", input.display()))?;

    let merge = outputs.merge.then(|| graph.merge_synonyms(&config.merge));

    let mut files = Vec::new();
    if let Some(path) = &outputs.jsonl {
        let out = File::create(path).with_context(|| format!("Cannot create {}", path.display()))?;
        graph.write_jsonl(std::io::BufWriter::new(out))?;
        files.push(path.clone());
    }
    if let Some(dir) = &outputs.csv_dir {
        std::fs::create_dir_all(dir).with_context(|| format!("Cannot create {}", dir.display()))?;
        if outputs.partitioned {
            files.extend(graph.to_csv_partitioned()?.write_to(dir)?);
        } else {
            let (nodes, edges) = graph.to_csv()?.write_to(dir)?;
            files.push(nodes);
            files.push(edges);
        }
    }

    tracing::info!(
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        files = files.len(),
        "Build complete"
    );
    Ok(BuildReport {
        ingest,
        merge,
        nodes: graph.node_count(),
        edges: graph.edge_count(),
        files,
    })
}

/// Compile a JSON-encoded [`QueryGraph`] into a `MATCH` query.
pub fn compile_query(config: &AnnographConfig, graph_json: &str) -> anyhow::Result<String> {
    let graph: QueryGraph = serde_json::from_str(graph_json).context("Invalid query graph")?;
    Ok(QueryCompiler::new(config.compiler.clone()).compile(&graph)?)
}

/// Guard `text` with the configured ceiling, or `limit` if given.
pub fn guard_query(config: &AnnographConfig, limit: Option<i64>, text: &str) -> GuardVerdict {
    let guard = limit.map_or_else(|| QueryGuard::from_config(&config.query), QueryGuard::new);
    guard.check(text)
}

/// Render every template in a file.
pub fn render_templates(
    path: &Path,
    prefix: &str,
    suffix: &str,
    annotated: bool,
) -> anyhow::Result<Vec<RenderedTemplate>> {
    let templates = annograph_query::load_templates(path)?;
    templates
        .iter()
        .map(|t| {
            let rendered = if annotated {
                t.render_annotated(prefix, suffix)
            } else {
                t.render(prefix, suffix)
            };
            rendered.map_err(anyhow::Error::from)
        })
        .collect()
}
