//! Generic entity CRUD over any registered schema.

use chrono::Duration;
use serde::Serialize;
use uuid::Uuid;

use plaza_core::types::now;
use plaza_core::{AttributeKind, EntitySchema, EntityType, Properties, PropertyValue, SortOrder};
use plaza_graph::statements::columns;
use plaza_graph::store::{count_of, take_object};
use plaza_graph::{GraphError, GraphStore, NodeRef, Record, Statement, Window};

use crate::error::{DispatchError, FieldError, Result};
use crate::resolve::Entity;
use crate::validate::{check_properties, fail_on, Mode};
use crate::{store_failure, Dispatcher};

/// Parameters of a listing. `order_by: None` orders by primary key.
#[derive(Debug, Clone)]
pub struct ListQuery {
    pub filter: Properties,
    pub order_by: Option<&'static str>,
    pub sort: SortOrder,
    pub window: Window,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            filter: Properties::new(),
            order_by: None,
            sort: SortOrder::Asc,
            window: Window { skip: 0, limit: 10 },
        }
    }
}

/// Confirmation of a removed entity.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Removal {
    pub message: String,
    pub uuid: Uuid,
}

impl<S: GraphStore> Dispatcher<S> {
    /// One page of entities. A page past the end is empty.
    pub async fn list(&self, entity_type: EntityType, query: ListQuery) -> Result<Vec<Entity>> {
        let schema = self.schema(entity_type)?;
        let order_by = match query.order_by {
            None => schema.primary_key,
            Some(name) => match schema.attribute(name) {
                Some(attr) if attr.kind != AttributeKind::Point => attr.name,
                _ => {
                    return Err(DispatchError::invalid(
                        "order",
                        format!("must name a sortable attribute of {}", schema.label),
                    ))
                }
            },
        };
        let mut errors = check_properties(schema.attributes, &query.filter, Mode::Create);
        errors.extend(
            query
                .filter
                .iter()
                .filter(|(_, v)| v.kind() == AttributeKind::Point)
                .map(|(k, _)| FieldError::new(k, "points cannot be filtered on")),
        );
        fail_on(errors)?;

        let rows = self
            .run(&Statement::ListNodes {
                schema,
                filter: query.filter,
                order_by,
                sort: query.sort,
                window: query.window,
            })
            .await?;
        Ok(entities(schema, rows))
    }

    pub async fn find(&self, entity_type: EntityType, id: Uuid) -> Result<Entity> {
        self.resolve(entity_type, id).await
    }

    /// Store a new entity. Missing defaulted attributes are generated here,
    /// with one instant shared by every timestamp.
    pub async fn create(&self, entity_type: EntityType, mut properties: Properties) -> Result<Entity> {
        let schema = self.schema(entity_type)?;
        fail_on(check_properties(schema.attributes, &properties, Mode::Create))?;

        let stamp = now();
        for attr in schema.attributes {
            if let Some(default) = attr.default {
                properties
                    .entry(attr.name.to_string())
                    .or_insert_with(|| default.produce(stamp));
            }
        }
        fail_on(
            schema
                .attributes
                .iter()
                .filter(|a| a.required && !properties.contains_key(a.name))
                .map(|a| FieldError::new(a.name, "is required"))
                .collect(),
        )?;
        let id = match properties.get(schema.primary_key) {
            Some(PropertyValue::Identifier(id)) => *id,
            _ => return Err(DispatchError::invalid(schema.primary_key, "is required")),
        };

        let statement = Statement::CreateNode { schema, properties };
        let rows = match self.store().execute(&statement).await {
            Err(GraphError::Constraint(reason)) => {
                tracing::warn!(entity_type = %entity_type, uuid = %id, %reason, "Create rejected");
                return Err(DispatchError::invalid(schema.primary_key, "already exists"));
            }
            other => other.map_err(|e| store_failure(statement.name(), e))?,
        };
        let entity = first_entity(schema, rows).ok_or_else(|| {
            store_failure(
                "create_node",
                GraphError::Decode(format!("create of {} returned no node", schema.label)),
            )
        })?;

        tracing::info!(entity_type = %entity_type, uuid = %id, "Created entity");
        Ok(entity)
    }

    /// Apply a partial update. Never creates; `updated_at`-style attributes
    /// are re-stamped strictly later than their previous value.
    pub async fn update(
        &self,
        entity_type: EntityType,
        id: Uuid,
        mut properties: Properties,
    ) -> Result<Entity> {
        let schema = self.schema(entity_type)?;
        fail_on(check_properties(schema.attributes, &properties, Mode::Patch))?;

        let node = NodeRef::new(schema, id);
        let current = self.resolve_node(node).await?;

        let stamp = now();
        for attr in schema.attributes.iter().filter(|a| a.touch_on_update) {
            let next = match current.timestamp(attr.name) {
                Some(previous) if previous >= stamp => previous + Duration::microseconds(1),
                _ => stamp,
            };
            properties.insert(attr.name.to_string(), PropertyValue::Timestamp(next));
        }

        let rows = self.run(&Statement::UpdateNode { node, properties }).await?;
        let entity = first_entity(schema, rows)
            .ok_or_else(|| DispatchError::not_found(entity_type, id))?;

        tracing::info!(entity_type = %entity_type, uuid = %id, "Updated entity");
        Ok(entity)
    }

    /// Delete an entity together with its relationships.
    pub async fn remove(&self, entity_type: EntityType, id: Uuid) -> Result<Removal> {
        let schema = self.schema(entity_type)?;
        let rows = self
            .run(&Statement::DeleteNode {
                node: NodeRef::new(schema, id),
            })
            .await?;
        if count_of(&rows) == 0 {
            tracing::warn!(entity_type = %entity_type, uuid = %id, "Remove of missing entity");
            return Err(DispatchError::not_found(entity_type, id));
        }

        tracing::info!(entity_type = %entity_type, uuid = %id, "Removed entity");
        Ok(Removal {
            message: format!("'{}' with uuid : '{}' was removed", schema.label, id),
            uuid: id,
        })
    }
}

pub(crate) fn entities(schema: &'static EntitySchema, rows: Vec<Record>) -> Vec<Entity> {
    rows.into_iter()
        .filter_map(|mut row| take_object(&mut row, columns::NODE))
        .map(|record| Entity::from_record(schema, record))
        .collect()
}

fn first_entity(schema: &'static EntitySchema, rows: Vec<Record>) -> Option<Entity> {
    entities(schema, rows).into_iter().next()
}
