//! annograph-core: Property store, shared errors, and configuration.
//!
//! This crate provides the foundational types used by every annograph layer:
//! - Node and edge identifiers
//! - Scalar and multi-valued property values with the merge rule
//! - Node and edge containers owned by the graph engine
//! - Layered configuration
//! - Common error types

pub mod config;
pub mod error;
pub mod property;
pub mod types;

pub use config::AnnographConfig;
pub use error::AnnographError;
pub use property::{merge_labels, Property, PropertyMap, PropertyValue};
pub use types::{Edge, EdgeKey, Node, NodeId};
