//! Integration tests for plaza-graph against a live Neo4j instance.
//!
//! These tests require a Neo4j 5 server on bolt://localhost:7687.
//! Run with: cargo test --package plaza-graph --test integration -- --ignored
//!
//! Skipped automatically if Neo4j is not available.

use plaza_core::schemas::{labels, CATEGORY, MALL, PROMOTION, STORE, USER};
use plaza_core::{Direction, EntitySchema, Point, Properties, PropertyValue, SortOrder};
use plaza_graph::store::count_of;
use plaza_graph::{
    DuplicatePolicy, GraphClient, GraphConfig, GraphError, GraphStore, NodeRef, RecommendQuery,
    Statement, Window,
};
use uuid::Uuid;

async fn connect_or_skip() -> Option<GraphClient> {
    let config = GraphConfig::default();
    match GraphClient::connect(&config).await {
        Ok(client) => Some(client),
        Err(e) => {
            eprintln!("Skipping integration test (Neo4j not available): {e}");
            None
        }
    }
}

/// Every node a test creates carries a shared `name`, so cleanup is one query.
async fn cleanup(client: &GraphClient, run: &str) {
    let q = neo4rs::query("MATCH (n {name: $name}) DETACH DELETE n").param("name", run.to_string());
    let _ = client.run(q).await;
}

async fn create(
    client: &GraphClient,
    schema: &'static EntitySchema,
    run: &str,
    location: Option<Point>,
) -> NodeRef {
    let id = Uuid::new_v4();
    let now = chrono::Utc::now();
    let mut properties = Properties::new();
    properties.insert("uuid".into(), PropertyValue::Identifier(id));
    properties.insert("name".into(), PropertyValue::Text(run.to_string()));
    properties.insert("created_at".into(), PropertyValue::Timestamp(now));
    properties.insert("updated_at".into(), PropertyValue::Timestamp(now));
    if let Some(p) = location {
        properties.insert("location".into(), PropertyValue::Point(p));
    }
    client
        .execute(&Statement::CreateNode { schema, properties })
        .await
        .unwrap();
    NodeRef::new(schema, id)
}

async fn link(client: &GraphClient, source: NodeRef, target: NodeRef, label: &'static str) {
    let mut properties = Properties::new();
    properties.insert("uuid".into(), PropertyValue::Identifier(Uuid::new_v4()));
    client
        .execute(&Statement::CreateEdge {
            source,
            target,
            label,
            properties,
            policy: DuplicatePolicy::Force,
        })
        .await
        .unwrap();
}

#[tokio::test]
#[ignore = "requires live Neo4j; run with: cargo test --package plaza-graph --test integration -- --ignored"]
async fn test_create_and_resolve_mall() {
    let Some(client) = connect_or_skip().await else {
        return;
    };
    let run = Uuid::new_v4().to_string();

    let mall = create(&client, &MALL, &run, Some(Point::new(1.5, 2.5))).await;

    let record = client.resolve_by_id(&MALL, mall.id).await.unwrap().unwrap();
    assert_eq!(record["uuid"].as_str(), Some(mall.id.to_string().as_str()));
    assert_eq!(record["location"]["x"].as_f64(), Some(1.5));

    let missing = client.resolve_by_id(&MALL, Uuid::new_v4()).await.unwrap();
    assert!(missing.is_none());

    cleanup(&client, &run).await;
}

#[tokio::test]
#[ignore = "requires live Neo4j"]
async fn test_create_rejects_taken_identifier() {
    let Some(client) = connect_or_skip().await else {
        return;
    };
    let run = Uuid::new_v4().to_string();

    let mall = create(&client, &MALL, &run, None).await;
    let mut properties = Properties::new();
    properties.insert("uuid".into(), PropertyValue::Identifier(mall.id));
    properties.insert("name".into(), PropertyValue::Text(run.clone()));
    let err = client
        .execute(&Statement::CreateNode {
            schema: &MALL,
            properties,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, GraphError::Constraint(_)));

    let q = neo4rs::query("MATCH (n:Mall {uuid: $id}) RETURN count(n) AS count")
        .param("id", mall.id.to_string());
    let rows = client.query_rows(q).await.unwrap();
    assert_eq!(rows[0].get::<i64>("count").unwrap(), 1);

    cleanup(&client, &run).await;
}

#[tokio::test]
#[ignore = "requires live Neo4j"]
async fn test_delete_node_reports_count() {
    let Some(client) = connect_or_skip().await else {
        return;
    };
    let run = Uuid::new_v4().to_string();
    let mall = create(&client, &MALL, &run, None).await;

    let rows = client
        .execute(&Statement::DeleteNode { node: mall })
        .await
        .unwrap();
    assert_eq!(count_of(&rows), 1);

    let rows = client
        .execute(&Statement::DeleteNode { node: mall })
        .await
        .unwrap();
    assert_eq!(count_of(&rows), 0);
}

#[tokio::test]
#[ignore = "requires live Neo4j"]
async fn test_edges_between_and_removal() {
    let Some(client) = connect_or_skip().await else {
        return;
    };
    let run = Uuid::new_v4().to_string();
    let mall = create(&client, &MALL, &run, None).await;
    let store = create(&client, &STORE, &run, None).await;

    link(&client, store, mall, labels::IS_IN).await;
    let reject = client
        .execute(&Statement::CreateEdge {
            source: store,
            target: mall,
            label: labels::IS_IN,
            properties: Properties::new(),
            policy: DuplicatePolicy::Reject,
        })
        .await
        .unwrap();
    assert!(reject.is_empty());

    let related = client
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
    assert_eq!(related.len(), 1);

    let removed = client
        .execute(&Statement::DeleteEdges {
            source: store,
            target: mall,
            label: labels::IS_IN,
        })
        .await
        .unwrap();
    assert_eq!(count_of(&removed), 1);

    let removed = client
        .execute(&Statement::DeleteEdges {
            source: store,
            target: mall,
            label: labels::IS_IN,
        })
        .await
        .unwrap();
    assert_eq!(count_of(&removed), 0);

    cleanup(&client, &run).await;
}

#[tokio::test]
#[ignore = "requires live Neo4j"]
async fn test_recommend_orders_by_proximity_without_history() {
    let Some(client) = connect_or_skip().await else {
        return;
    };
    let run = Uuid::new_v4().to_string();
    let user = create(&client, &USER, &run, None).await;
    let category = create(&client, &CATEGORY, &run, None).await;
    let near = create(&client, &STORE, &run, Some(Point::new(1.0, 2.0))).await;
    let far = create(&client, &STORE, &run, Some(Point::new(1.0, 11.0))).await;
    let near_promo = create(&client, &PROMOTION, &run, None).await;
    let far_promo = create(&client, &PROMOTION, &run, None).await;
    link(&client, near_promo, category, labels::IN_CATEGORY).await;
    link(&client, far_promo, category, labels::IN_CATEGORY).await;
    link(&client, near_promo, near, labels::PROMOTED_BY).await;
    link(&client, far_promo, far, labels::PROMOTED_BY).await;

    let rows = client
        .execute(&Statement::Recommend(RecommendQuery {
            user: user.id,
            origin: Some(Point::new(1.0, 1.0)),
            categories: vec![category.id],
            min_distance: 1e-6,
            window: Window { skip: 0, limit: 10 },
        }))
        .await
        .unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!(
        rows[0]["promotion"]["uuid"].as_str(),
        Some(near_promo.id.to_string().as_str())
    );
    assert!((rows[0]["score"].as_f64().unwrap() - 0.25).abs() < 1e-9);
    assert!((rows[1]["distance"].as_f64().unwrap() - 10.0).abs() < 1e-9);

    cleanup(&client, &run).await;
}
