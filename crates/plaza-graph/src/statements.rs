//! Schema-driven graph statements and their Cypher rendering.
//!
//! Labels, relationship types and property keys come from the static schema
//! registry and are written into the query text. Every caller-supplied value
//! is bound as a parameter.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use plaza_core::schemas::{self, labels};
use plaza_core::{AttributeKind, Direction, EntitySchema, Point, Properties, PropertyValue, SortOrder};

/// Result column names.
pub mod columns {
    pub const NODE: &str = "n";
    pub const EDGE: &str = "r";
    pub const COUNT: &str = "count";
    pub const PROMOTION: &str = "promotion";
    pub const SCORE: &str = "score";
    pub const DISTANCE: &str = "distance";
    pub const VIEWED_SIMILARITY: &str = "viewed_similarity";
    pub const INTEREST_SIMILARITY: &str = "interest_similarity";
    pub const BOOKMARK_SIMILARITY: &str = "bookmark_similarity";
}

const NODE_COLUMNS: &[&str] = &[columns::NODE];
const EDGE_COLUMNS: &[&str] = &[columns::EDGE];
const COUNT_COLUMNS: &[&str] = &[columns::COUNT];
const RECOMMEND_COLUMNS: &[&str] = &[
    columns::PROMOTION,
    columns::SCORE,
    columns::DISTANCE,
    columns::VIEWED_SIMILARITY,
    columns::INTEREST_SIMILARITY,
    columns::BOOKMARK_SIMILARITY,
];

// ── Statement Types ───────────────────────────────────────────────

/// An entity instance addressed by its primary key.
#[derive(Debug, Clone, Copy)]
pub struct NodeRef {
    pub schema: &'static EntitySchema,
    pub id: Uuid,
}

impl NodeRef {
    pub fn new(schema: &'static EntitySchema, id: Uuid) -> Self {
        Self { schema, id }
    }
}

/// Offset pagination window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub skip: i64,
    pub limit: i64,
}

/// What happens when an edge with the same label already joins the pair.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Refuse to create a second edge.
    #[default]
    Reject,
    /// Return the existing edge instead of creating one.
    Merge,
    /// Always create a new edge.
    Force,
}

/// Parameters of the promotion ranking query.
#[derive(Debug, Clone)]
pub struct RecommendQuery {
    pub user: Uuid,
    /// Caller position. Without one every promotion has proximity 0.
    pub origin: Option<Point>,
    /// Restrict candidates to promotions in any of these categories. Empty means no restriction.
    pub categories: Vec<Uuid>,
    pub min_distance: f64,
    pub window: Window,
}

#[derive(Debug, Clone)]
pub enum Statement {
    FetchNode {
        node: NodeRef,
    },
    ListNodes {
        schema: &'static EntitySchema,
        filter: Properties,
        order_by: &'static str,
        sort: SortOrder,
        window: Window,
    },
    CreateNode {
        schema: &'static EntitySchema,
        properties: Properties,
    },
    UpdateNode {
        node: NodeRef,
        properties: Properties,
    },
    DeleteNode {
        node: NodeRef,
    },
    CreateEdge {
        source: NodeRef,
        target: NodeRef,
        label: &'static str,
        properties: Properties,
        policy: DuplicatePolicy,
    },
    FetchEdges {
        source: NodeRef,
        target: NodeRef,
        label: &'static str,
    },
    DeleteEdges {
        source: NodeRef,
        target: NodeRef,
        label: &'static str,
    },
    ListRelated {
        from: NodeRef,
        to: &'static EntitySchema,
        label: &'static str,
        direction: Direction,
        sort: SortOrder,
        window: Window,
    },
    Recommend(RecommendQuery),
}

// ── Cypher Rendering ──────────────────────────────────────────────

/// A bound query parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Text(String),
    TextList(Vec<String>),
}

/// Rendered query text, its parameters, and the columns each row carries.
#[derive(Debug, Clone)]
pub struct CypherQuery {
    pub text: String,
    pub params: BTreeMap<String, ParamValue>,
    pub columns: &'static [&'static str],
}

impl Statement {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Statement::FetchNode { .. } => "fetch_node",
            Statement::ListNodes { .. } => "list_nodes",
            Statement::CreateNode { .. } => "create_node",
            Statement::UpdateNode { .. } => "update_node",
            Statement::DeleteNode { .. } => "delete_node",
            Statement::CreateEdge { .. } => "create_edge",
            Statement::FetchEdges { .. } => "fetch_edges",
            Statement::DeleteEdges { .. } => "delete_edges",
            Statement::ListRelated { .. } => "list_related",
            Statement::Recommend(_) => "recommend",
        }
    }

    pub fn to_cypher(&self) -> CypherQuery {
        let mut params = BTreeMap::new();
        let (text, columns) = match self {
            Statement::FetchNode { node } => {
                let text = format!(
                    "MATCH {}\nRETURN {} AS n\nLIMIT 1",
                    node_pattern("node", node, "id", &mut params),
                    projection("node", node.schema),
                );
                (text, NODE_COLUMNS)
            }
            Statement::ListNodes {
                schema,
                filter,
                order_by,
                sort,
                window,
            } => {
                let mut text = format!("MATCH (node:{})", schema.label);
                let conditions: Vec<String> = filter
                    .iter()
                    .map(|(key, value)| {
                        format!("node.{key} = {}", bind("f", key, value, &mut params))
                    })
                    .collect();
                if !conditions.is_empty() {
                    text.push_str(&format!("\nWHERE {}", conditions.join(" AND ")));
                }
                text.push_str(&format!(
                    "\nWITH node\nORDER BY node.{order_by} {}\n{}\nRETURN {} AS n",
                    sort.as_cypher(),
                    paging(window, &mut params),
                    projection("node", schema),
                ));
                (text, NODE_COLUMNS)
            }
            Statement::CreateNode { schema, properties } => {
                // Yields no row when the primary key is already taken.
                let guard = match properties.get(schema.primary_key) {
                    Some(PropertyValue::Identifier(id)) => format!(
                        "OPTIONAL MATCH {}\nWITH existing WHERE existing IS NULL\n",
                        node_pattern("existing", &NodeRef::new(schema, *id), "id", &mut params),
                    ),
                    _ => String::new(),
                };
                let text = format!(
                    "{guard}CREATE (node:{}){}\nRETURN {} AS n",
                    schema.label,
                    set_clause("SET", "node", properties, &mut params),
                    projection("node", schema),
                );
                (text, NODE_COLUMNS)
            }
            Statement::UpdateNode { node, properties } => {
                let text = format!(
                    "MATCH {}{}\nRETURN {} AS n",
                    node_pattern("node", node, "id", &mut params),
                    set_clause("SET", "node", properties, &mut params),
                    projection("node", node.schema),
                );
                (text, NODE_COLUMNS)
            }
            Statement::DeleteNode { node } => {
                let text = format!(
                    "MATCH {}\nDETACH DELETE node\nRETURN count(node) AS count",
                    node_pattern("node", node, "id", &mut params),
                );
                (text, COUNT_COLUMNS)
            }
            Statement::CreateEdge {
                source,
                target,
                label,
                properties,
                policy,
            } => {
                let endpoints = format!(
                    "MATCH {}, {}",
                    node_pattern("a", source, "source_id", &mut params),
                    node_pattern("b", target, "target_id", &mut params),
                );
                let body = match policy {
                    DuplicatePolicy::Reject => format!(
                        "WHERE NOT (a)-[:{label}]->(b)\nCREATE (a)-[r:{label}]->(b){}",
                        set_clause("SET", "r", properties, &mut params)
                    ),
                    DuplicatePolicy::Merge => format!(
                        "MERGE (a)-[r:{label}]->(b){}",
                        set_clause("ON CREATE SET", "r", properties, &mut params)
                    ),
                    DuplicatePolicy::Force => format!(
                        "CREATE (a)-[r:{label}]->(b){}",
                        set_clause("SET", "r", properties, &mut params)
                    ),
                };
                let text = format!("{endpoints}\n{body}\nRETURN properties(r) AS r");
                (text, EDGE_COLUMNS)
            }
            Statement::FetchEdges {
                source,
                target,
                label,
            } => {
                let text = format!(
                    "MATCH {}-[r:{label}]->{}\nWITH r\nORDER BY r.created_at ASC, r.uuid ASC\nRETURN properties(r) AS r",
                    node_pattern("a", source, "source_id", &mut params),
                    node_pattern("b", target, "target_id", &mut params),
                );
                (text, EDGE_COLUMNS)
            }
            Statement::DeleteEdges {
                source,
                target,
                label,
            } => {
                let text = format!(
                    "MATCH {}-[r:{label}]->{}\nDELETE r\nRETURN count(r) AS count",
                    node_pattern("a", source, "source_id", &mut params),
                    node_pattern("b", target, "target_id", &mut params),
                );
                (text, COUNT_COLUMNS)
            }
            Statement::ListRelated {
                from,
                to,
                label,
                direction,
                sort,
                window,
            } => {
                let (left, right) = match direction {
                    Direction::Out => ("-", "->"),
                    Direction::In => ("<-", "-"),
                };
                let text = format!(
                    "MATCH {}{left}[:{label}]{right}(t:{})\nWITH DISTINCT t\nORDER BY t.{} {}\n{}\nRETURN {} AS n",
                    node_pattern("f", from, "from_id", &mut params),
                    to.label,
                    to.primary_key,
                    sort.as_cypher(),
                    paging(window, &mut params),
                    projection("t", to),
                );
                (text, NODE_COLUMNS)
            }
            Statement::Recommend(q) => (recommend_cypher(q, &mut params), RECOMMEND_COLUMNS),
        };
        CypherQuery {
            text,
            params,
            columns,
        }
    }
}

fn recommend_cypher(q: &RecommendQuery, params: &mut BTreeMap<String, ParamValue>) -> String {
    params.insert("user_id".into(), ParamValue::Text(q.user.to_string()));
    let distances = match q.origin {
        Some(origin) => {
            params.insert("x".into(), ParamValue::Float(origin.x));
            params.insert("y".into(), ParamValue::Float(origin.y));
            "collect(point.distance(point({x: $x, y: $y}), promoter.location))"
        }
        None => "[]",
    };
    params.insert(
        "categories".into(),
        ParamValue::TextList(q.categories.iter().map(Uuid::to_string).collect()),
    );
    params.insert("min_distance".into(), ParamValue::Float(q.min_distance));
    let paging = paging(&q.window, params);

    let user = schemas::USER.label;
    let promotion = schemas::PROMOTION.label;
    let category = schemas::CATEGORY.label;
    let (interested_in, viewed, bookmarked, in_category, promoted_by) = (
        labels::INTERESTED_IN,
        labels::VIEWED,
        labels::BOOKMARKED,
        labels::IN_CATEGORY,
        labels::PROMOTED_BY,
    );

    format!(
        "MATCH (user:{user} {{uuid: $user_id}})
OPTIONAL MATCH (user)-[:{interested_in}]->(interest:{category})
WITH user, collect(DISTINCT interest.uuid) AS interests
OPTIONAL MATCH (user)-[:{viewed}]->(:{promotion})-[:{in_category}]->(seen:{category})
WITH user, interests, collect(DISTINCT seen.uuid) AS viewed
OPTIONAL MATCH (user)-[:{bookmarked}]->(saved)
WITH interests, viewed, collect(DISTINCT saved.uuid) AS bookmarked
MATCH (promotion:{promotion})-[:{in_category}]->(category:{category})
WITH interests, viewed, bookmarked, promotion, collect(DISTINCT category.uuid) AS categories
WHERE size($categories) = 0 OR any(c IN categories WHERE c IN $categories)
OPTIONAL MATCH (promotion)-[:{promoted_by}]->(promoter)
WITH interests, viewed, bookmarked, promotion, categories,
     collect(DISTINCT promoter.uuid) AS promoters,
     {distances} AS distances
WITH promotion,
     {viewed_sim} AS viewed_similarity,
     {interest_sim} AS interest_similarity,
     {bookmark_sim} AS bookmark_similarity,
     reduce(m = NULL, d IN distances | CASE WHEN m IS NULL OR d < m THEN d ELSE m END) AS distance
WITH promotion, distance, viewed_similarity, interest_similarity, bookmark_similarity,
     CASE
       WHEN distance IS NULL THEN 0.0
       WHEN distance < $min_distance THEN 1.0 / $min_distance
       ELSE 1.0 / distance
     END AS proximity
WITH promotion, distance, viewed_similarity, interest_similarity, bookmark_similarity,
     (viewed_similarity + interest_similarity + bookmark_similarity + proximity) / 4.0 AS score
ORDER BY score DESC, promotion.uuid ASC
{paging}
RETURN {projection} AS promotion, score, distance,
       viewed_similarity, interest_similarity, bookmark_similarity",
        viewed_sim = jaccard_expr("viewed", "categories"),
        interest_sim = jaccard_expr("interests", "categories"),
        bookmark_sim = jaccard_expr("bookmarked", "promoters"),
        projection = projection("promotion", &schemas::PROMOTION),
    )
}

/// Jaccard similarity of two distinct-valued lists.
fn jaccard_expr(a: &str, b: &str) -> String {
    let union = format!("(size({a}) + size([x IN {b} WHERE NOT x IN {a}]))");
    format!(
        "CASE WHEN {union} = 0 THEN 0.0 ELSE toFloat(size([x IN {a} WHERE x IN {b}])) / {union} END"
    )
}

/// `(var:Label {pk: $key})`, binding the node's identifier.
fn node_pattern(
    var: &str,
    node: &NodeRef,
    key: &str,
    params: &mut BTreeMap<String, ParamValue>,
) -> String {
    params.insert(key.to_string(), ParamValue::Text(node.id.to_string()));
    format!(
        "({var}:{} {{{}: ${key}}})",
        node.schema.label, node.schema.primary_key
    )
}

/// Map projection listing every schema attribute. Points are flattened to
/// `{x, y}` maps so rows decode without driver-specific spatial types.
fn projection(var: &str, schema: &EntitySchema) -> String {
    let entries: Vec<String> = schema
        .attributes
        .iter()
        .map(|attr| match attr.kind {
            AttributeKind::Point => format!(
                "{name}: CASE WHEN {var}.{name} IS NULL THEN NULL ELSE {{x: {var}.{name}.x, y: {var}.{name}.y}} END",
                name = attr.name
            ),
            _ => format!(".{}", attr.name),
        })
        .collect();
    format!("{var} {{{}}}", entries.join(", "))
}

fn set_clause(
    keyword: &str,
    var: &str,
    properties: &Properties,
    params: &mut BTreeMap<String, ParamValue>,
) -> String {
    if properties.is_empty() {
        return String::new();
    }
    let assignments: Vec<String> = properties
        .iter()
        .map(|(key, value)| format!("{var}.{key} = {}", bind("p", key, value, params)))
        .collect();
    format!("\n{keyword} {}", assignments.join(", "))
}

/// Bind a typed value under `{prefix}_{key}` and return the expression referring to it.
fn bind(
    prefix: &str,
    key: &str,
    value: &PropertyValue,
    params: &mut BTreeMap<String, ParamValue>,
) -> String {
    let name = format!("{prefix}_{key}");
    match value {
        PropertyValue::Point(p) => {
            params.insert(format!("{name}_x"), ParamValue::Float(p.x));
            params.insert(format!("{name}_y"), ParamValue::Float(p.y));
            format!("point({{x: ${name}_x, y: ${name}_y}})")
        }
        other => {
            let text = match other.to_json() {
                serde_json::Value::String(s) => s,
                v => v.to_string(),
            };
            params.insert(name.clone(), ParamValue::Text(text));
            format!("${name}")
        }
    }
}

fn paging(window: &Window, params: &mut BTreeMap<String, ParamValue>) -> String {
    params.insert("skip".into(), ParamValue::Int(window.skip));
    params.insert("limit".into(), ParamValue::Int(window.limit));
    "SKIP $skip LIMIT $limit".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use plaza_core::schemas::{MALL, STORE};

    fn props(entries: &[(&str, PropertyValue)]) -> Properties {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn fetch_node_binds_identifier() {
        let id = Uuid::new_v4();
        let q = Statement::FetchNode {
            node: NodeRef::new(&MALL, id),
        }
        .to_cypher();
        assert!(q.text.starts_with("MATCH (node:Mall {uuid: $id})"));
        assert_eq!(q.params.get("id"), Some(&ParamValue::Text(id.to_string())));
        assert!(!q.text.contains(&id.to_string()));
        assert_eq!(q.columns, &["n"]);
    }

    #[test]
    fn projection_flattens_points() {
        let q = Statement::FetchNode {
            node: NodeRef::new(&MALL, Uuid::new_v4()),
        }
        .to_cypher();
        assert!(q.text.contains(".uuid, .name, .created_at, .updated_at"));
        assert!(q.text.contains(
            "location: CASE WHEN node.location IS NULL THEN NULL ELSE {x: node.location.x, y: node.location.y} END"
        ));
    }

    #[test]
    fn create_node_never_interpolates_values() {
        let name = "Center\"}) DETACH DELETE n //";
        let q = Statement::CreateNode {
            schema: &MALL,
            properties: props(&[
                ("name", PropertyValue::Text(name.to_string())),
                ("location", PropertyValue::Point(Point::new(1.5, 2.5))),
            ]),
        }
        .to_cypher();
        assert!(!q.text.contains(name));
        assert!(q.text.contains("SET node.location = point({x: $p_location_x, y: $p_location_y}), node.name = $p_name"));
        assert_eq!(q.params.get("p_location_x"), Some(&ParamValue::Float(1.5)));
        assert_eq!(
            q.params.get("p_name"),
            Some(&ParamValue::Text(name.to_string()))
        );
    }

    #[test]
    fn create_node_guards_primary_key() {
        let id = Uuid::new_v4();
        let q = Statement::CreateNode {
            schema: &MALL,
            properties: props(&[("uuid", PropertyValue::Identifier(id))]),
        }
        .to_cypher();
        assert!(q.text.starts_with(
            "OPTIONAL MATCH (existing:Mall {uuid: $id})\nWITH existing WHERE existing IS NULL\nCREATE (node:Mall)"
        ));
        assert_eq!(q.params.get("id"), Some(&ParamValue::Text(id.to_string())));
        assert_eq!(q.params.get("p_uuid"), Some(&ParamValue::Text(id.to_string())));
    }

    #[test]
    fn list_nodes_filters_orders_and_pages() {
        let q = Statement::ListNodes {
            schema: &STORE,
            filter: props(&[("name", PropertyValue::Text("Kiosk".into()))]),
            order_by: "name",
            sort: SortOrder::Desc,
            window: Window { skip: 20, limit: 10 },
        }
        .to_cypher();
        assert!(q.text.contains("MATCH (node:Store)\nWHERE node.name = $f_name"));
        assert!(q.text.contains("ORDER BY node.name DESC\nSKIP $skip LIMIT $limit"));
        assert_eq!(q.params.get("skip"), Some(&ParamValue::Int(20)));
        assert_eq!(q.params.get("limit"), Some(&ParamValue::Int(10)));
    }

    #[test]
    fn update_without_properties_has_no_set() {
        let q = Statement::UpdateNode {
            node: NodeRef::new(&MALL, Uuid::new_v4()),
            properties: Properties::new(),
        }
        .to_cypher();
        assert!(!q.text.contains("SET"));
    }

    #[test]
    fn create_edge_policies() {
        let source = NodeRef::new(&STORE, Uuid::new_v4());
        let target = NodeRef::new(&MALL, Uuid::new_v4());
        let render = |policy| {
            Statement::CreateEdge {
                source,
                target,
                label: "IS_IN",
                properties: props(&[("uuid", PropertyValue::Identifier(Uuid::new_v4()))]),
                policy,
            }
            .to_cypher()
            .text
        };

        let reject = render(DuplicatePolicy::Reject);
        assert!(reject.contains("WHERE NOT (a)-[:IS_IN]->(b)\nCREATE (a)-[r:IS_IN]->(b)"));

        let merge = render(DuplicatePolicy::Merge);
        assert!(merge.contains("MERGE (a)-[r:IS_IN]->(b)\nON CREATE SET r.uuid = $p_uuid"));

        let force = render(DuplicatePolicy::Force);
        assert!(force.contains("CREATE (a)-[r:IS_IN]->(b)\nSET r.uuid = $p_uuid"));
        assert!(!force.contains("WHERE NOT"));
    }

    #[test]
    fn list_related_respects_direction() {
        let from = NodeRef::new(&MALL, Uuid::new_v4());
        let render = |direction| {
            Statement::ListRelated {
                from,
                to: &STORE,
                label: "IS_IN",
                direction,
                sort: SortOrder::Asc,
                window: Window { skip: 0, limit: 10 },
            }
            .to_cypher()
            .text
        };
        assert!(render(Direction::In).contains("(f:Mall {uuid: $from_id})<-[:IS_IN]-(t:Store)"));
        assert!(render(Direction::Out).contains("(f:Mall {uuid: $from_id})-[:IS_IN]->(t:Store)"));
        assert!(render(Direction::Out).contains("WITH DISTINCT t\nORDER BY t.uuid ASC"));
    }

    #[test]
    fn recommend_binds_every_input() {
        let user = Uuid::new_v4();
        let category = Uuid::new_v4();
        let q = Statement::Recommend(RecommendQuery {
            user,
            origin: Some(Point::new(1.0, 2.0)),
            categories: vec![category],
            min_distance: 1e-6,
            window: Window { skip: 0, limit: 10 },
        })
        .to_cypher();
        assert_eq!(q.params.get("user_id"), Some(&ParamValue::Text(user.to_string())));
        assert_eq!(
            q.params.get("categories"),
            Some(&ParamValue::TextList(vec![category.to_string()]))
        );
        assert_eq!(q.params.get("x"), Some(&ParamValue::Float(1.0)));
        assert!(!q.text.contains(&user.to_string()));
        assert!(q.text.contains("ORDER BY score DESC, promotion.uuid ASC"));
        assert_eq!(q.columns.len(), 6);
    }

    #[test]
    fn recommend_without_origin_skips_distances() {
        let q = Statement::Recommend(RecommendQuery {
            user: Uuid::new_v4(),
            origin: None,
            categories: Vec::new(),
            min_distance: 1e-6,
            window: Window { skip: 0, limit: 10 },
        })
        .to_cypher();
        assert!(q.text.contains("[] AS distances"));
        assert!(!q.text.contains("point.distance"));
        assert!(!q.params.contains_key("x"));
    }
}
