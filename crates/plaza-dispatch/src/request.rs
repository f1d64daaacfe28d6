//! The request envelope handed in by the routing layer, and its dispatch.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use plaza_core::types::now;
use plaza_core::{Direction, EntityType};
use plaza_graph::{DuplicatePolicy, GraphError, GraphStore};

use crate::crud::ListQuery;
use crate::error::{DispatchError, FieldError, Result};
use crate::recommend::{RecommendRequest, SearchArea};
use crate::validate::{self, fail_on, Mode};
use crate::Dispatcher;

/// Operation and its entity/relationship selectors. Entity names are parsed
/// against the registry when the request is handled.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum Operation {
    List {
        entity: String,
    },
    Find {
        entity: String,
    },
    Create {
        entity: String,
        /// Allow-list of payload fields; every declared attribute when absent.
        #[serde(default)]
        fields: Option<Vec<String>>,
    },
    Update {
        entity: String,
        #[serde(default)]
        fields: Option<Vec<String>>,
    },
    Remove {
        entity: String,
    },
    AddRelationship {
        from: String,
        to: String,
        relationship: String,
        #[serde(default)]
        policy: Option<DuplicatePolicy>,
    },
    ListRelationshipBetween {
        from: String,
        to: String,
        relationship: String,
    },
    ListRelated {
        from: String,
        to: String,
        relationship: String,
        #[serde(default)]
        direction: Option<Direction>,
    },
    RemoveRelationshipBetween {
        from: String,
        to: String,
        relationship: String,
    },
    RecommendedPromotions,
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::List { .. } => "list",
            Operation::Find { .. } => "find",
            Operation::Create { .. } => "create",
            Operation::Update { .. } => "update",
            Operation::Remove { .. } => "remove",
            Operation::AddRelationship { .. } => "add_relationship",
            Operation::ListRelationshipBetween { .. } => "list_relationship_between",
            Operation::ListRelated { .. } => "list_related",
            Operation::RemoveRelationshipBetween { .. } => "remove_relationship_between",
            Operation::RecommendedPromotions => "recommended_promotions",
        }
    }
}

/// `{"operation": ..., <selectors>, "payload": {...}}`
#[derive(Debug, Clone, Deserialize)]
pub struct Request {
    #[serde(flatten)]
    pub operation: Operation,
    #[serde(default)]
    pub payload: Value,
}

/// Status code and JSON body for the routing layer.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Response {
    pub status: u16,
    pub body: Value,
}

impl Response {
    pub fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    pub fn from_error(error: &DispatchError) -> Self {
        Self {
            status: error.status_code(),
            body: error.to_body(),
        }
    }

    /// The graph store could not be reached. The cause is logged, never returned.
    pub fn store_unavailable(error: GraphError) -> Self {
        tracing::error!(error = %error, "Graph store unavailable");
        Self::from_error(&DispatchError::Store(error))
    }

    /// The envelope itself could not be parsed.
    pub fn malformed(reason: impl std::fmt::Display) -> Self {
        Self {
            status: 400,
            body: json!({ "errors": [FieldError::new("request", reason.to_string())] }),
        }
    }
}

fn entity_type(name: &str) -> Result<EntityType> {
    Ok(name.parse()?)
}

fn to_body<T: Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| DispatchError::Serialization(e.to_string()))
}

impl<S: GraphStore> Dispatcher<S> {
    /// Handle one request, mapping every outcome onto a [`Response`].
    pub async fn respond(&self, request: &Request) -> Response {
        let operation = request.operation.name();
        match self.handle(request).await {
            Ok(body) => {
                tracing::info!(operation, status = 200, "Request handled");
                Response::ok(body)
            }
            Err(e) => {
                let response = Response::from_error(&e);
                tracing::info!(operation, status = response.status, error = %e, "Request failed");
                response
            }
        }
    }

    /// Validate the payload for the requested operation and run it.
    pub async fn handle(&self, request: &Request) -> Result<Value> {
        let payload = &request.payload;
        if !(payload.is_object() || payload.is_null()) {
            return Err(DispatchError::invalid("payload", "must be an object"));
        }

        match &request.operation {
            Operation::List { entity } => {
                let schema = self.registry().get_schema(entity)?;
                let mut errors = Vec::new();
                let page = validate::page(payload, self.config(), &mut errors);
                let order_by = validate::order_field(payload, schema, &mut errors);
                let filter = validate::filter(payload, schema, &mut errors);
                fail_on(errors)?;

                let query = ListQuery {
                    filter,
                    order_by: Some(order_by),
                    sort: page.sort,
                    window: page.window,
                };
                to_body(&self.list(schema.entity_type, query).await?)
            }
            Operation::Find { entity } => {
                let schema = self.registry().get_schema(entity)?;
                let id = validate::lookup_id(schema, payload)?;
                Ok(self.find(schema.entity_type, id).await?.into_json())
            }
            Operation::Create { entity, fields } => {
                let schema = self.registry().get_schema(entity)?;
                let rules = validate::rules(schema, fields.as_deref(), Mode::Create);
                let properties = validate::validate(payload, &rules, now()).into_result()?;
                Ok(self.create(schema.entity_type, properties).await?.into_json())
            }
            Operation::Update { entity, fields } => {
                let schema = self.registry().get_schema(entity)?;
                let id = validate::lookup_id(schema, payload)?;
                let rules = validate::rules(schema, fields.as_deref(), Mode::Patch);
                let properties = validate::validate(payload, &rules, now()).into_result()?;
                Ok(self
                    .update(schema.entity_type, id, properties)
                    .await?
                    .into_json())
            }
            Operation::Remove { entity } => {
                let schema = self.registry().get_schema(entity)?;
                let id = validate::lookup_id(schema, payload)?;
                to_body(&self.remove(schema.entity_type, id).await?)
            }
            Operation::AddRelationship {
                from,
                to,
                relationship,
                policy,
            } => {
                let (from, to) = (entity_type(from)?, entity_type(to)?);
                let relation = self.registry().relation(from, to, relationship)?;
                let [from_id, to_id] = validate::identifiers(payload, ["from_uuid", "to_uuid"])?;

                let mut errors = Vec::new();
                let force = validate::flag(payload, "force", &mut errors);
                let properties =
                    validate::edge_properties(payload, relation.properties, &mut errors);
                fail_on(errors)?;

                let policy = if force {
                    DuplicatePolicy::Force
                } else {
                    policy.unwrap_or(self.config().duplicate_policy)
                };
                let id = self
                    .add_relationship(from, to, relationship, from_id, to_id, properties, policy)
                    .await?;
                Ok(json!({ "relationship_uuid": id }))
            }
            Operation::ListRelationshipBetween {
                from,
                to,
                relationship,
            } => {
                let (from, to) = (entity_type(from)?, entity_type(to)?);
                let [from_id, to_id] = validate::identifiers(payload, ["from_uuid", "to_uuid"])?;
                to_body(
                    &self
                        .list_relationship_between(from, to, relationship, from_id, to_id)
                        .await?,
                )
            }
            Operation::ListRelated {
                from,
                to,
                relationship,
                direction,
            } => {
                let (from, to) = (entity_type(from)?, entity_type(to)?);
                let [from_id] = validate::identifiers(payload, ["uuid"])?;
                let mut errors = Vec::new();
                let page = validate::page(payload, self.config(), &mut errors);
                fail_on(errors)?;

                to_body(
                    &self
                        .list_related(
                            from,
                            to,
                            relationship,
                            *direction,
                            from_id,
                            page.sort,
                            page.window,
                        )
                        .await?,
                )
            }
            Operation::RemoveRelationshipBetween {
                from,
                to,
                relationship,
            } => {
                let (from, to) = (entity_type(from)?, entity_type(to)?);
                let [from_id, to_id] = validate::identifiers(payload, ["from_uuid", "to_uuid"])?;
                to_body(
                    &self
                        .remove_relationship_between(from, to, relationship, from_id, to_id)
                        .await?,
                )
            }
            Operation::RecommendedPromotions => {
                let [user] = validate::identifiers(payload, ["uuid"])?;
                self.resolve(EntityType::User, user).await?;
                let area = SearchArea::from_payload(payload, self.config())?;

                let ranked = self
                    .rank(RecommendRequest {
                        user,
                        origin: area.origin,
                        categories: area.categories,
                        window: area.window,
                    })
                    .await?;
                to_body(&ranked)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_parses_operation_and_selectors() {
        let request: Request = serde_json::from_value(json!({
            "operation": "list_related",
            "from": "Mall",
            "to": "Store",
            "relationship": "is_in",
            "direction": "inbound",
            "payload": {"uuid": "x"}
        }))
        .unwrap();
        match request.operation {
            Operation::ListRelated { direction, .. } => assert_eq!(direction, Some(Direction::In)),
            other => panic!("unexpected operation {other:?}"),
        }
        assert_eq!(request.payload["uuid"], "x");
    }

    #[test]
    fn payload_defaults_to_null() {
        let request: Request =
            serde_json::from_value(json!({"operation": "recommended_promotions"})).unwrap();
        assert!(request.payload.is_null());
        assert_eq!(request.operation.name(), "recommended_promotions");
    }

    #[test]
    fn unreachable_store_is_an_opaque_server_error() {
        let response = Response::store_unavailable(GraphError::Connection(
            "connection refused: bolt://db:7687".into(),
        ));
        assert_eq!(response.status, 500);
        assert_eq!(response.body, json!({"error": "internal error"}));
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({"status": 500, "body": {"error": "internal error"}})
        );
    }

    #[test]
    fn unknown_operation_is_rejected() {
        let parsed = serde_json::from_value::<Request>(json!({"operation": "truncate"}));
        assert!(parsed.is_err());
    }

    #[test]
    fn policy_selector_is_lowercase() {
        let request: Request = serde_json::from_value(json!({
            "operation": "add_relationship",
            "from": "Store",
            "to": "Mall",
            "relationship": "is_in",
            "policy": "merge"
        }))
        .unwrap();
        assert!(matches!(
            request.operation,
            Operation::AddRelationship {
                policy: Some(DuplicatePolicy::Merge),
                ..
            }
        ));
    }
}
