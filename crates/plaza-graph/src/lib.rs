//! Plaza Graph: the graph store boundary.
//!
//! All reads and writes are expressed as [`Statement`]s built from schema
//! metadata and executed through the [`GraphStore`] trait. [`GraphClient`]
//! renders them to parameterized Cypher for Neo4j; [`MemoryGraph`] evaluates
//! them in process.

pub mod client;
pub mod memory;
pub mod statements;
pub mod store;

pub use client::{GraphClient, GraphConfig, GraphError};
pub use memory::MemoryGraph;
pub use statements::{DuplicatePolicy, NodeRef, RecommendQuery, Statement, Window};
pub use store::{GraphStore, Record};
