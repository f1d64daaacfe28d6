//! Typed, directed relationships between registered entity types.
//!
//! Every operation runs the same pipeline: look up the relation, resolve
//! both endpoints concurrently, execute one statement, shape the result.

use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use plaza_core::types::now;
use plaza_core::{Direction, EntityType, Properties, Relation, SortOrder};
use plaza_graph::statements::columns;
use plaza_graph::store::{count_of, take_object};
use plaza_graph::{DuplicatePolicy, GraphError, GraphStore, NodeRef, Record, Statement, Window};

use crate::crud::entities;
use crate::error::{DispatchError, Result};
use crate::resolve::Entity;
use crate::validate::{check_properties, fail_on, Mode};
use crate::{store_failure, Dispatcher};

/// Outcome of `remove_relationship_between`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RelationshipRemoval {
    pub removed: i64,
    pub message: String,
}

/// A caller's view of a relation: which endpoint they named first.
struct Endpoints {
    relation: Relation,
    from: NodeRef,
    to: NodeRef,
}

impl Endpoints {
    /// Source and target in stored edge orientation.
    fn oriented(&self) -> (NodeRef, NodeRef) {
        if self.relation.starts_at(self.from.schema.entity_type) {
            (self.from, self.to)
        } else {
            (self.to, self.from)
        }
    }
}

impl<S: GraphStore> Dispatcher<S> {
    fn endpoints(
        &self,
        from: EntityType,
        to: EntityType,
        name: &str,
        from_id: Uuid,
        to_id: Uuid,
    ) -> Result<Endpoints> {
        let relation = self.registry().relation(from, to, name)?;
        Ok(Endpoints {
            relation,
            from: NodeRef::new(self.schema(from)?, from_id),
            to: NodeRef::new(self.schema(to)?, to_id),
        })
    }

    /// Connect two entities and return the relationship's identifier.
    ///
    /// Under [`DuplicatePolicy::Reject`] an existing edge with the same label
    /// is a [`DispatchError::Conflict`]; under `Merge` its identifier is
    /// returned; under `Force` a parallel edge is created.
    #[allow(clippy::too_many_arguments)]
    pub async fn add_relationship(
        &self,
        from: EntityType,
        to: EntityType,
        name: &str,
        from_id: Uuid,
        to_id: Uuid,
        mut properties: Properties,
        policy: DuplicatePolicy,
    ) -> Result<Uuid> {
        let ends = self.endpoints(from, to, name, from_id, to_id)?;
        fail_on(check_properties(ends.relation.properties, &properties, Mode::Patch))?;
        self.resolve_pair(ends.from, ends.to).await?;

        let stamp = now();
        for attr in ends.relation.properties {
            if let Some(default) = attr.default {
                properties
                    .entry(attr.name.to_string())
                    .or_insert_with(|| default.produce(stamp));
            }
        }

        let label = ends.relation.label;
        let (source, target) = ends.oriented();
        let rows = self
            .run(&Statement::CreateEdge {
                source,
                target,
                label,
                properties,
                policy,
            })
            .await?;

        let Some(edge) = rows
            .into_iter()
            .next()
            .and_then(|mut row| take_object(&mut row, columns::EDGE))
        else {
            // No row also means an endpoint was removed after it resolved.
            self.resolve_pair(ends.from, ends.to).await?;
            if policy == DuplicatePolicy::Reject {
                tracing::warn!(label, from = %from_id, to = %to_id, "Duplicate relationship rejected");
                return Err(DispatchError::Conflict {
                    label,
                    from,
                    from_id: from_id.to_string(),
                    to,
                    to_id: to_id.to_string(),
                });
            }
            return Err(store_failure(
                "create_edge",
                GraphError::Decode(format!("{label} relationship was not created")),
            ));
        };

        let id = edge
            .get("uuid")
            .and_then(Value::as_str)
            .and_then(|s| Uuid::parse_str(s).ok())
            .ok_or_else(|| {
                store_failure(
                    "create_edge",
                    GraphError::Decode(format!("{label} relationship has no uuid")),
                )
            })?;

        tracing::info!(label, uuid = %id, ?policy, "Relationship stored");
        Ok(id)
    }

    /// Relationships with the given label joining the two entities, oldest
    /// first. Empty when there are none.
    pub async fn list_relationship_between(
        &self,
        from: EntityType,
        to: EntityType,
        name: &str,
        from_id: Uuid,
        to_id: Uuid,
    ) -> Result<Vec<Record>> {
        let ends = self.endpoints(from, to, name, from_id, to_id)?;
        self.resolve_pair(ends.from, ends.to).await?;

        let (source, target) = ends.oriented();
        let rows = self
            .run(&Statement::FetchEdges {
                source,
                target,
                label: ends.relation.label,
            })
            .await?;
        Ok(rows
            .into_iter()
            .filter_map(|mut row| take_object(&mut row, columns::EDGE))
            .collect())
    }

    /// Distinct entities of type `to` reachable from `from_id` over the
    /// relation, ordered by identifier. `direction: None` follows the
    /// relation's declared orientation.
    #[allow(clippy::too_many_arguments)]
    pub async fn list_related(
        &self,
        from: EntityType,
        to: EntityType,
        name: &str,
        direction: Option<Direction>,
        from_id: Uuid,
        sort: SortOrder,
        window: Window,
    ) -> Result<Vec<Entity>> {
        let relation = self.registry().relation(from, to, name)?;
        let from_schema = self.schema(from)?;
        let to_schema = self.schema(to)?;
        let direction = direction.unwrap_or(if relation.starts_at(from) {
            Direction::Out
        } else {
            Direction::In
        });

        let node = NodeRef::new(from_schema, from_id);
        self.resolve_node(node).await?;

        let rows = self
            .run(&Statement::ListRelated {
                from: node,
                to: to_schema,
                label: relation.label,
                direction,
                sort,
                window,
            })
            .await?;
        Ok(entities(to_schema, rows))
    }

    /// Delete every relationship with the label between the two entities.
    /// Removing nothing is not an error.
    pub async fn remove_relationship_between(
        &self,
        from: EntityType,
        to: EntityType,
        name: &str,
        from_id: Uuid,
        to_id: Uuid,
    ) -> Result<RelationshipRemoval> {
        let ends = self.endpoints(from, to, name, from_id, to_id)?;
        self.resolve_pair(ends.from, ends.to).await?;

        let label = ends.relation.label;
        let (source, target) = ends.oriented();
        let rows = self
            .run(&Statement::DeleteEdges {
                source,
                target,
                label,
            })
            .await?;
        let removed = count_of(&rows);

        tracing::info!(label, from = %from_id, to = %to_id, removed, "Relationships removed");
        Ok(RelationshipRemoval {
            removed,
            message: format!("Removed {removed} relationships!"),
        })
    }
}
