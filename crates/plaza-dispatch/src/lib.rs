//! plaza-dispatch: request handling over the Plaza property graph.
//!
//! A [`Dispatcher`] owns a [`GraphStore`] and the schema registry and exposes
//! the typed operations (entity CRUD, relationship management, promotion
//! recommendation). [`Request`] is the JSON envelope the CLI reads from
//! stdin; [`Dispatcher::respond`] turns one into a status code and body.

pub mod config;
pub mod crud;
pub mod error;
pub mod recommend;
pub mod relationships;
pub mod request;
pub mod resolve;
pub mod validate;

use plaza_core::{EntitySchema, EntityType, SchemaRegistry};
use plaza_graph::{GraphError, GraphStore, Record, Statement};

pub use crate::config::{DispatchConfig, LogConfig, PlazaConfig};
pub use crate::crud::{ListQuery, Removal};
pub use crate::error::{DispatchError, FieldError, Result};
pub use crate::recommend::{RankedPromotion, RecommendRequest};
pub use crate::relationships::RelationshipRemoval;
pub use crate::request::{Operation, Request, Response};
pub use crate::resolve::Entity;

/// Executes Plaza operations against a graph store.
pub struct Dispatcher<S> {
    store: S,
    registry: &'static SchemaRegistry,
    config: DispatchConfig,
}

impl<S: GraphStore> Dispatcher<S> {
    /// Create a dispatcher over the built-in schema registry.
    pub fn new(store: S, config: DispatchConfig) -> Self {
        Self {
            store,
            registry: SchemaRegistry::builtin(),
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn registry(&self) -> &'static SchemaRegistry {
        self.registry
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub(crate) fn schema(&self, entity_type: EntityType) -> Result<&'static EntitySchema> {
        Ok(self.registry.schema(entity_type)?)
    }

    /// Execute one statement, logging store failures before they are masked
    /// from the caller.
    pub(crate) async fn run(&self, statement: &Statement) -> Result<Vec<Record>> {
        self.store
            .execute(statement)
            .await
            .map_err(|e| store_failure(statement.name(), e))
    }
}

pub(crate) fn store_failure(statement: &'static str, error: GraphError) -> DispatchError {
    tracing::error!(statement, error = %error, "Graph store failure");
    DispatchError::Store(error)
}
