//! annograph-engine: In-memory property graph for annotated corpora.
//!
//! Annotation records stream in through idempotent `add_node` / `add_edge`
//! upserts with a deterministic merge rule. Edges referencing unknown nodes
//! get their endpoints synthesized by a pluggable [`InferStrategy`]. A
//! synonym merge pass collapses duplicate entities onto a canonical node,
//! and the result is exported as JSONL or import-ready CSV.

pub mod closure;
pub mod error;
pub mod export;
pub mod graph;
pub mod infer;
pub mod ingest;
pub mod merge;

pub use closure::{Cluster, ClusterMember};
pub use error::EngineError;
pub use export::{CsvExport, CsvTable, GraphRecord, PartitionedCsv};
pub use graph::PropertyGraph;
pub use infer::{DefaultInference, Inference, InferStrategy, RuleInference, AUTO_PROPERTY};
pub use ingest::IngestSummary;
pub use merge::MergeReport;
