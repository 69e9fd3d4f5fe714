//! annograph-neo4j: graph database adapter.
//!
//! Runs guarded read queries through [`QueryRunner`](annograph_query::QueryRunner)
//! and bulk-loads CSV exports produced by `annograph-engine`.

pub mod client;
pub mod convert;
mod runner;

pub use client::{GraphClient, GraphError};
pub use convert::{collect_row, Value};
