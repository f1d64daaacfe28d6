//! plaza-core: Entity schemas, typed property values, and similarity math.
//!
//! This crate provides the foundational pieces every Plaza component shares:
//! - Attribute kinds and their coercion from raw JSON payload values
//! - The schema registry and the built-in entity declarations
//! - Set similarity and spatial proximity used by recommendation ranking
//! - Schema error types

pub mod error;
pub mod schema;
pub mod schemas;
pub mod similarity;
pub mod types;

pub use error::SchemaError;
pub use schema::{
    AttributeDef, DefaultValue, EntitySchema, Relation, RelationshipDef, SchemaRegistry,
};
pub use types::{
    AttributeKind, Direction, EntityType, Point, Properties, PropertyValue, SortOrder,
};
