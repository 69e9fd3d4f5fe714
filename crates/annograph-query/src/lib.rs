//! annograph-query: From graphs and free text to safe Cypher.
//!
//! - [`compiler`]: turns a (sub)graph into a single `MATCH` query
//! - [`guard`]: keyword allow/deny filter with a result-count ceiling
//! - [`template`]: canned, parameterised queries loaded from JSON
//! - [`execute`]: the `QueryRunner` boundary to the graph database

pub mod compiler;
pub mod error;
pub mod execute;
pub mod guard;
pub mod template;

pub use compiler::{compile, QueryCompiler, QueryEdge, QueryGraph, QueryNode};
pub use error::{CompileError, ExecutionError, TemplateError};
pub use execute::{execute, EdgeView, NodeView, QueryResponse, QueryResult, QueryRunner, ViewRef};
pub use guard::{GuardVerdict, QueryGuard, Rejection};
pub use template::{load_templates, QueryTemplate, RenderedTemplate};
