//! Neo4j connection management and the shared graph client.

use async_trait::async_trait;
use neo4rs::{ConfigBuilder, Graph, Query};
use serde::Deserialize;
use serde_json::Value;

use crate::statements::{CypherQuery, ParamValue, Statement};
use crate::store::{GraphStore, Record};

/// Errors from graph operations.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("Neo4j connection error: {0}")]
    Connection(String),

    #[error("Neo4j query error: {0}")]
    Query(#[from] neo4rs::Error),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Decode error: {0}")]
    Decode(String),
}

/// Configuration for connecting to Neo4j. Read from the `[neo4j]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphConfig {
    #[serde(default = "default_uri")]
    pub uri: String,
    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default = "default_password")]
    pub password: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_fetch_size")]
    pub fetch_size: usize,
}

fn default_uri() -> String {
    "bolt://localhost:7687".to_string()
}

fn default_user() -> String {
    "neo4j".to_string()
}

fn default_password() -> String {
    "plaza-dev".to_string()
}

fn default_max_connections() -> u32 {
    16
}

fn default_fetch_size() -> usize {
    256
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            uri: default_uri(),
            user: default_user(),
            password: default_password(),
            max_connections: default_max_connections(),
            fetch_size: default_fetch_size(),
        }
    }
}

/// Thread-safe Neo4j graph client with connection pooling.
///
/// Clone is cheap (inner Arc).
#[derive(Clone)]
pub struct GraphClient {
    graph: Graph,
}

impl GraphClient {
    /// Connect to Neo4j with the given configuration.
    pub async fn connect(config: &GraphConfig) -> Result<Self, GraphError> {
        let neo_config = ConfigBuilder::default()
            .uri(&config.uri)
            .user(&config.user)
            .password(&config.password)
            .max_connections(config.max_connections as usize)
            .fetch_size(config.fetch_size)
            .build()
            .map_err(|e| GraphError::Connection(e.to_string()))?;

        let graph = Graph::connect(neo_config)
            .await
            .map_err(|e| GraphError::Connection(e.to_string()))?;

        tracing::info!(uri = %config.uri, "Connected to Neo4j");
        Ok(Self { graph })
    }

    /// Execute a write-only query.
    pub async fn run(&self, query: Query) -> Result<(), GraphError> {
        self.graph.run(query).await?;
        Ok(())
    }

    /// Execute a read query and collect all rows.
    pub async fn query_rows(&self, query: Query) -> Result<Vec<neo4rs::Row>, GraphError> {
        let mut stream = self.graph.execute(query).await?;
        let mut rows = Vec::new();
        while let Some(row) = stream.next().await? {
            rows.push(row);
        }
        Ok(rows)
    }
}

#[async_trait]
impl GraphStore for GraphClient {
    async fn execute(&self, statement: &Statement) -> Result<Vec<Record>, GraphError> {
        let cypher = statement.to_cypher();
        tracing::debug!(
            statement = statement.name(),
            params = cypher.params.len(),
            "Executing Cypher statement"
        );

        let rows = self.query_rows(to_neo4j_query(&cypher)).await?;
        if rows.is_empty() {
            if let Statement::CreateNode { schema, .. } = statement {
                return Err(GraphError::Constraint(format!(
                    "{} {} already exists",
                    schema.label, schema.primary_key
                )));
            }
        }
        rows.iter()
            .map(|row| decode_row(row, cypher.columns))
            .collect()
    }
}

/// Bind rendered parameters onto a neo4rs query.
fn to_neo4j_query(cypher: &CypherQuery) -> Query {
    cypher
        .params
        .iter()
        .fold(neo4rs::query(&cypher.text), |q, (key, value)| match value {
            ParamValue::Int(i) => q.param(key, *i),
            ParamValue::Float(f) => q.param(key, *f),
            ParamValue::Text(s) => q.param(key, s.clone()),
            ParamValue::TextList(list) => q.param(key, list.clone()),
        })
}

/// Convert a neo4rs row into a JSON record over the statement's columns.
fn decode_row(row: &neo4rs::Row, columns: &[&str]) -> Result<Record, GraphError> {
    let mut record = Record::new();
    for column in columns {
        let value: Value = row.get(column).map_err(|e| {
            GraphError::Decode(format!("Failed to decode column {column}: {e}"))
        })?;
        record.insert((*column).to_string(), value);
    }
    Ok(record)
}
