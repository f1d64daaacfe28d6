//! Entity resolution by primary key.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use plaza_core::{EntitySchema, EntityType};
use plaza_graph::{GraphStore, NodeRef, Record};

use crate::error::{DispatchError, Result};
use crate::{store_failure, Dispatcher};

/// An entity instance as returned to callers: its stored attributes, with
/// unset attributes omitted.
#[derive(Debug, Clone, Serialize)]
pub struct Entity {
    #[serde(skip)]
    pub schema: &'static EntitySchema,
    #[serde(flatten)]
    pub properties: Record,
}

impl Entity {
    pub fn from_record(schema: &'static EntitySchema, record: Record) -> Self {
        Self {
            schema,
            properties: record.into_iter().filter(|(_, v)| !v.is_null()).collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    /// The primary key value.
    pub fn id(&self) -> Option<Uuid> {
        self.get(self.schema.primary_key)
            .and_then(Value::as_str)
            .and_then(|s| Uuid::parse_str(s).ok())
    }

    pub fn timestamp(&self, name: &str) -> Option<DateTime<Utc>> {
        self.get(name)
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|ts| ts.with_timezone(&Utc))
    }

    pub fn into_json(self) -> Value {
        Value::Object(self.properties)
    }
}

impl<S: GraphStore> Dispatcher<S> {
    /// Look up one entity. Absence is [`DispatchError::NotFound`]; store
    /// failures stay [`DispatchError::Store`].
    pub async fn resolve(&self, entity_type: EntityType, id: Uuid) -> Result<Entity> {
        let schema = self.schema(entity_type)?;
        self.resolve_node(NodeRef::new(schema, id)).await
    }

    pub(crate) async fn resolve_node(&self, node: NodeRef) -> Result<Entity> {
        let found = self
            .store()
            .resolve_by_id(node.schema, node.id)
            .await
            .map_err(|e| store_failure("fetch_node", e))?;
        match found {
            Some(record) => Ok(Entity::from_record(node.schema, record)),
            None => {
                tracing::warn!(
                    entity_type = %node.schema.entity_type,
                    uuid = %node.id,
                    "Entity not found"
                );
                Err(DispatchError::not_found(node.schema.entity_type, node.id))
            }
        }
    }

    /// Resolve both endpoints concurrently. The first failure wins and the
    /// other lookup is dropped.
    pub(crate) async fn resolve_pair(&self, a: NodeRef, b: NodeRef) -> Result<(Entity, Entity)> {
        tokio::try_join!(self.resolve_node(a), self.resolve_node(b))
    }
}
