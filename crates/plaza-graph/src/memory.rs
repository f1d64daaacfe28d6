//! In-process graph store.
//!
//! Evaluates the same [`Statement`]s the Cypher renderer handles, against
//! nodes and edges held in memory. Results have the same shape as rows
//! decoded from Neo4j, so dispatchers behave identically on either store.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use uuid::Uuid;

use plaza_core::schemas::{self, labels};
use plaza_core::similarity::{jaccard, proximity, Signals};
use plaza_core::types::properties_to_json;
use plaza_core::{Direction, EntitySchema, Point, Properties, SortOrder};

use crate::client::GraphError;
use crate::statements::{columns, DuplicatePolicy, NodeRef, RecommendQuery, Statement, Window};
use crate::store::{GraphStore, Record};

/// `(label, primary key value)`.
type NodeKey = (&'static str, String);

struct Edge {
    label: &'static str,
    source: NodeKey,
    target: NodeKey,
    properties: Record,
}

struct Ranked<'a> {
    score: f64,
    distance: Option<f64>,
    signals: Signals,
    id: &'a String,
    props: &'a Record,
}

#[derive(Default)]
struct State {
    nodes: BTreeMap<NodeKey, Record>,
    edges: Vec<Edge>,
}

/// A graph store backed by in-memory collections.
#[derive(Default)]
pub struct MemoryGraph {
    state: RwLock<State>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn node_count(&self) -> usize {
        self.state.read().await.nodes.len()
    }

    pub async fn edge_count(&self) -> usize {
        self.state.read().await.edges.len()
    }
}

#[async_trait]
impl GraphStore for MemoryGraph {
    async fn execute(&self, statement: &Statement) -> Result<Vec<Record>, GraphError> {
        tracing::debug!(statement = statement.name(), "Evaluating statement in memory");
        match statement {
            Statement::FetchNode { node } => {
                let state = self.state.read().await;
                Ok(state
                    .nodes
                    .get(&key_of(node))
                    .map(|props| node_row(node.schema, props))
                    .into_iter()
                    .collect())
            }
            Statement::ListNodes {
                schema,
                filter,
                order_by,
                sort,
                window,
            } => {
                let state = self.state.read().await;
                let wanted = properties_to_json(filter);
                let mut matches: Vec<&Record> = state
                    .nodes
                    .iter()
                    .filter(|((label, _), props)| {
                        *label == schema.label
                            && wanted.iter().all(|(k, v)| props.get(k) == Some(v))
                    })
                    .map(|(_, props)| props)
                    .collect();
                matches.sort_by(|a, b| compare_nullable(a.get(*order_by), b.get(*order_by), *sort));
                Ok(paginate(matches, window)
                    .map(|props| node_row(schema, props))
                    .collect())
            }
            Statement::CreateNode { schema, properties } => {
                let mut state = self.state.write().await;
                let props = properties_to_json(properties);
                let id = props
                    .get(schema.primary_key)
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        GraphError::Constraint(format!(
                            "{} created without {}",
                            schema.label, schema.primary_key
                        ))
                    })?
                    .to_string();
                let key = (schema.label, id);
                if state.nodes.contains_key(&key) {
                    return Err(GraphError::Constraint(format!(
                        "{} with {} '{}' already exists",
                        schema.label, schema.primary_key, key.1
                    )));
                }
                let row = node_row(schema, &props);
                state.nodes.insert(key, props);
                Ok(vec![row])
            }
            Statement::UpdateNode { node, properties } => {
                let mut state = self.state.write().await;
                Ok(match state.nodes.get_mut(&key_of(node)) {
                    Some(props) => {
                        props.extend(properties_to_json(properties));
                        vec![node_row(node.schema, props)]
                    }
                    None => Vec::new(),
                })
            }
            Statement::DeleteNode { node } => {
                let mut state = self.state.write().await;
                let key = key_of(node);
                let removed = state.nodes.remove(&key).is_some();
                if removed {
                    state.edges.retain(|e| e.source != key && e.target != key);
                }
                Ok(vec![count_row(i64::from(removed))])
            }
            Statement::CreateEdge {
                source,
                target,
                label,
                properties,
                policy,
            } => {
                let mut state = self.state.write().await;
                let (source, target) = (key_of(source), key_of(target));
                if !state.nodes.contains_key(&source) || !state.nodes.contains_key(&target) {
                    return Ok(Vec::new());
                }
                let existing = state
                    .edges
                    .iter()
                    .find(|e| e.label == *label && e.source == source && e.target == target);
                match (policy, existing) {
                    (DuplicatePolicy::Reject, Some(_)) => return Ok(Vec::new()),
                    (DuplicatePolicy::Merge, Some(edge)) => {
                        return Ok(vec![edge_row(&edge.properties)])
                    }
                    _ => {}
                }
                let edge = Edge {
                    label: *label,
                    source,
                    target,
                    properties: properties_to_json(properties),
                };
                let row = edge_row(&edge.properties);
                state.edges.push(edge);
                Ok(vec![row])
            }
            Statement::FetchEdges {
                source,
                target,
                label,
            } => {
                let state = self.state.read().await;
                let (source, target) = (key_of(source), key_of(target));
                let mut found: Vec<&Record> = state
                    .edges
                    .iter()
                    .filter(|e| e.label == *label && e.source == source && e.target == target)
                    .map(|e| &e.properties)
                    .collect();
                found.sort_by(|a, b| {
                    compare_nullable(a.get("created_at"), b.get("created_at"), SortOrder::Asc)
                        .then_with(|| compare_nullable(a.get("uuid"), b.get("uuid"), SortOrder::Asc))
                });
                Ok(found.into_iter().map(edge_row).collect())
            }
            Statement::DeleteEdges {
                source,
                target,
                label,
            } => {
                let mut state = self.state.write().await;
                let (source, target) = (key_of(source), key_of(target));
                let before = state.edges.len();
                state
                    .edges
                    .retain(|e| !(e.label == *label && e.source == source && e.target == target));
                Ok(vec![count_row((before - state.edges.len()) as i64)])
            }
            Statement::ListRelated {
                from,
                to,
                label,
                direction,
                sort,
                window,
            } => {
                let state = self.state.read().await;
                let from = key_of(from);
                let mut targets: Vec<&NodeKey> = state
                    .edges
                    .iter()
                    .filter(|e| e.label == *label)
                    .filter_map(|e| match direction {
                        Direction::Out if e.source == from => Some(&e.target),
                        Direction::In if e.target == from => Some(&e.source),
                        _ => None,
                    })
                    .filter(|key| key.0 == to.label)
                    .collect::<HashSet<_>>()
                    .into_iter()
                    .collect();
                targets.sort_by(|a, b| match sort {
                    SortOrder::Asc => a.1.cmp(&b.1),
                    SortOrder::Desc => b.1.cmp(&a.1),
                });
                Ok(paginate(targets, window)
                    .filter_map(|key| state.nodes.get(key))
                    .map(|props| node_row(to, props))
                    .collect())
            }
            Statement::Recommend(query) => {
                let state = self.state.read().await;
                Ok(state.recommend(query))
            }
        }
    }
}

impl State {
    fn targets_of<'a>(
        &'a self,
        source: &'a NodeKey,
        label: &'a str,
    ) -> impl Iterator<Item = &'a NodeKey> + 'a {
        self.edges
            .iter()
            .filter(move |e| e.label == label && &e.source == source)
            .map(|e| &e.target)
    }

    fn ids_of<'a>(
        &'a self,
        source: &'a NodeKey,
        label: &'a str,
        target_label: Option<&'a str>,
    ) -> HashSet<String> {
        self.targets_of(source, label)
            .filter(|key| target_label.map_or(true, |l| key.0 == l))
            .map(|key| key.1.clone())
            .collect()
    }

    fn recommend(&self, q: &RecommendQuery) -> Vec<Record> {
        let user: NodeKey = (schemas::USER.label, q.user.to_string());
        if !self.nodes.contains_key(&user) {
            return Vec::new();
        }
        let category = Some(schemas::CATEGORY.label);

        let interests = self.ids_of(&user, labels::INTERESTED_IN, category);
        let viewed: HashSet<String> = self
            .targets_of(&user, labels::VIEWED)
            .filter(|key| key.0 == schemas::PROMOTION.label)
            .flat_map(|promotion| self.ids_of(promotion, labels::IN_CATEGORY, category))
            .collect();
        let bookmarked = self.ids_of(&user, labels::BOOKMARKED, None);
        let filter: HashSet<String> = q.categories.iter().map(Uuid::to_string).collect();

        let mut ranked: Vec<Ranked<'_>> = Vec::new();
        for (key, props) in &self.nodes {
            if key.0 != schemas::PROMOTION.label {
                continue;
            }
            let categories = self.ids_of(key, labels::IN_CATEGORY, category);
            if categories.is_empty() || (!filter.is_empty() && categories.is_disjoint(&filter)) {
                continue;
            }
            let promoters: Vec<&NodeKey> = self.targets_of(key, labels::PROMOTED_BY).collect();
            let promoter_ids: HashSet<String> = promoters.iter().map(|k| k.1.clone()).collect();
            let distance = promoters
                .iter()
                .filter_map(|k| self.nodes.get(*k))
                .filter_map(|p| p.get("location"))
                .filter_map(|loc| serde_json::from_value::<Point>(loc.clone()).ok())
                .filter_map(|loc| q.origin.map(|origin| origin.distance(&loc)))
                .min_by(|a, b| a.total_cmp(b));

            let signals = Signals {
                viewed_similarity: jaccard(&viewed, &categories),
                interest_similarity: jaccard(&interests, &categories),
                bookmark_similarity: jaccard(&bookmarked, &promoter_ids),
            };
            ranked.push(Ranked {
                score: signals.score(proximity(distance, q.min_distance)),
                distance,
                signals,
                id: &key.1,
                props,
            });
        }

        ranked.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(b.id)));
        paginate(ranked, &q.window)
            .map(|r| {
                let mut row = Record::new();
                row.insert(
                    columns::PROMOTION.into(),
                    Value::Object(project(&schemas::PROMOTION, r.props)),
                );
                row.insert(columns::SCORE.into(), json!(r.score));
                row.insert(columns::DISTANCE.into(), json!(r.distance));
                row.insert(
                    columns::VIEWED_SIMILARITY.into(),
                    json!(r.signals.viewed_similarity),
                );
                row.insert(
                    columns::INTEREST_SIMILARITY.into(),
                    json!(r.signals.interest_similarity),
                );
                row.insert(
                    columns::BOOKMARK_SIMILARITY.into(),
                    json!(r.signals.bookmark_similarity),
                );
                row
            })
            .collect()
    }
}

// ── Helpers ──────────────────────────────────────────────────────

fn key_of(node: &NodeRef) -> NodeKey {
    (node.schema.label, node.id.to_string())
}

/// Mirror the Cypher map projection: every schema attribute, null when unset.
fn project(schema: &EntitySchema, props: &Record) -> Record {
    schema
        .attributes
        .iter()
        .map(|attr| {
            let value = props.get(attr.name).cloned().unwrap_or(Value::Null);
            (attr.name.to_string(), value)
        })
        .collect()
}

fn node_row(schema: &EntitySchema, props: &Record) -> Record {
    let mut row = Record::new();
    row.insert(columns::NODE.into(), Value::Object(project(schema, props)));
    row
}

fn edge_row(props: &Record) -> Record {
    let mut row = Record::new();
    row.insert(columns::EDGE.into(), Value::Object(props.clone()));
    row
}

fn count_row(count: i64) -> Record {
    let mut row = Record::new();
    row.insert(columns::COUNT.into(), json!(count));
    row
}

fn paginate<T>(items: Vec<T>, window: &Window) -> impl Iterator<Item = T> {
    items
        .into_iter()
        .skip(window.skip.max(0) as usize)
        .take(window.limit.max(0) as usize)
}

/// Nulls sort last ascending and first descending, as in Cypher.
fn compare_nullable(a: Option<&Value>, b: Option<&Value>, sort: SortOrder) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    let ordering = match (a, b) {
        (Some(a), Some(b)) => compare_values(a, b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    match sort {
        SortOrder::Asc => ordering,
        SortOrder::Desc => ordering.reverse(),
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Number(a), Value::Number(b)) => a
            .as_f64()
            .unwrap_or_default()
            .total_cmp(&b.as_f64().unwrap_or_default()),
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::count_of;
    use plaza_core::schemas::{CATEGORY, MALL, PROMOTION, STORE, USER};
    use plaza_core::PropertyValue;

    async fn add_node(
        graph: &MemoryGraph,
        schema: &'static EntitySchema,
        name: &str,
        location: Option<Point>,
    ) -> NodeRef {
        let id = Uuid::new_v4();
        let mut properties = Properties::new();
        properties.insert("uuid".into(), PropertyValue::Identifier(id));
        properties.insert("name".into(), PropertyValue::Text(name.into()));
        if let Some(p) = location {
            properties.insert("location".into(), PropertyValue::Point(p));
        }
        graph
            .execute(&Statement::CreateNode { schema, properties })
            .await
            .unwrap();
        NodeRef::new(schema, id)
    }

    async fn link(graph: &MemoryGraph, source: NodeRef, target: NodeRef, label: &'static str) {
        let rows = graph
            .execute(&Statement::CreateEdge {
                source,
                target,
                label,
                properties: Properties::new(),
                policy: DuplicatePolicy::Force,
            })
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn create_then_fetch_projects_all_attributes() {
        let graph = MemoryGraph::new();
        let mall = add_node(&graph, &MALL, "Center", None).await;
        let row = graph.resolve_by_id(&MALL, mall.id).await.unwrap().unwrap();
        assert_eq!(row["name"], json!("Center"));
        assert_eq!(row["location"], Value::Null);
        assert!(row.contains_key("created_at"));
    }

    #[tokio::test]
    async fn duplicate_primary_key_is_rejected() {
        let graph = MemoryGraph::new();
        let mall = add_node(&graph, &MALL, "Center", None).await;
        let mut properties = Properties::new();
        properties.insert("uuid".into(), PropertyValue::Identifier(mall.id));
        let err = graph
            .execute(&Statement::CreateNode {
                schema: &MALL,
                properties,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::Constraint(_)));
    }

    #[tokio::test]
    async fn delete_node_detaches_edges() {
        let graph = MemoryGraph::new();
        let mall = add_node(&graph, &MALL, "Center", None).await;
        let store = add_node(&graph, &STORE, "Kiosk", None).await;
        link(&graph, store, mall, labels::IS_IN).await;

        let rows = graph
            .execute(&Statement::DeleteNode { node: mall })
            .await
            .unwrap();
        assert_eq!(count_of(&rows), 1);
        assert_eq!(graph.edge_count().await, 0);

        let rows = graph
            .execute(&Statement::DeleteNode { node: mall })
            .await
            .unwrap();
        assert_eq!(count_of(&rows), 0);
    }

    #[tokio::test]
    async fn reject_and_merge_policies() {
        let graph = MemoryGraph::new();
        let mall = add_node(&graph, &MALL, "Center", None).await;
        let store = add_node(&graph, &STORE, "Kiosk", None).await;
        link(&graph, store, mall, labels::IS_IN).await;

        let create = |policy| Statement::CreateEdge {
            source: store,
            target: mall,
            label: labels::IS_IN,
            properties: Properties::new(),
            policy,
        };
        assert!(graph.execute(&create(DuplicatePolicy::Reject)).await.unwrap().is_empty());
        assert_eq!(graph.execute(&create(DuplicatePolicy::Merge)).await.unwrap().len(), 1);
        assert_eq!(graph.edge_count().await, 1);
        graph.execute(&create(DuplicatePolicy::Force)).await.unwrap();
        assert_eq!(graph.edge_count().await, 2);
    }

    #[tokio::test]
    async fn list_related_deduplicates_targets() {
        let graph = MemoryGraph::new();
        let mall = add_node(&graph, &MALL, "Center", None).await;
        let store = add_node(&graph, &STORE, "Kiosk", None).await;
        link(&graph, store, mall, labels::IS_IN).await;
        link(&graph, store, mall, labels::IS_IN).await;

        let rows = graph
            .execute(&Statement::ListRelated {
                from: mall,
                to: &STORE,
                label: labels::IS_IN,
                direction: Direction::In,
                sort: SortOrder::Asc,
                window: Window { skip: 0, limit: 10 },
            })
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn recommend_prefers_interest_then_proximity() {
        let graph = MemoryGraph::new();
        let user = add_node(&graph, &USER, "ana", None).await;
        let food = add_node(&graph, &CATEGORY, "food", None).await;
        let shoes = add_node(&graph, &CATEGORY, "shoes", None).await;
        let near = add_node(&graph, &STORE, "near", Some(Point::new(1.0, 2.0))).await;
        let far = add_node(&graph, &STORE, "far", Some(Point::new(1.0, 5.0))).await;

        let lunch = add_node(&graph, &PROMOTION, "lunch", None).await;
        let sale = add_node(&graph, &PROMOTION, "sale", None).await;
        link(&graph, lunch, food, labels::IN_CATEGORY).await;
        link(&graph, lunch, far, labels::PROMOTED_BY).await;
        link(&graph, sale, shoes, labels::IN_CATEGORY).await;
        link(&graph, sale, near, labels::PROMOTED_BY).await;
        link(&graph, user, food, labels::INTERESTED_IN).await;

        let rows = graph
            .execute(&Statement::Recommend(RecommendQuery {
                user: user.id,
                origin: Some(Point::new(1.0, 1.0)),
                categories: Vec::new(),
                min_distance: 1e-6,
                window: Window { skip: 0, limit: 10 },
            }))
            .await
            .unwrap();

        assert_eq!(rows.len(), 2);
        // lunch: (0 + 1 + 0 + 1/4) / 4; sale: (0 + 0 + 0 + 1/1) / 4
        assert_eq!(rows[0]["promotion"]["name"], json!("lunch"));
        assert!((rows[0]["score"].as_f64().unwrap() - 0.3125).abs() < 1e-12);
        assert_eq!(rows[1]["distance"], json!(1.0));
        assert!((rows[1]["score"].as_f64().unwrap() - 0.25).abs() < 1e-12);
    }
}
