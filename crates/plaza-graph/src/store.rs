//! The query execution interface the dispatchers depend on.

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use plaza_core::EntitySchema;

use crate::client::GraphError;
use crate::statements::{columns, NodeRef, Statement};

/// One result row, keyed by column name.
pub type Record = serde_json::Map<String, Value>;

/// A graph store that can execute schema-driven statements.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Execute a statement and collect every row.
    async fn execute(&self, statement: &Statement) -> Result<Vec<Record>, GraphError>;

    /// Fetch a single node's properties by primary key. `Ok(None)` when absent.
    async fn resolve_by_id(
        &self,
        schema: &'static EntitySchema,
        id: Uuid,
    ) -> Result<Option<Record>, GraphError> {
        let statement = Statement::FetchNode {
            node: NodeRef::new(schema, id),
        };
        let rows = self.execute(&statement).await?;
        Ok(rows
            .into_iter()
            .next()
            .and_then(|mut row| take_object(&mut row, columns::NODE)))
    }
}

/// Remove a map-valued column from a row.
pub fn take_object(row: &mut Record, column: &str) -> Option<Record> {
    match row.remove(column) {
        Some(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Read an integer count column, treating a missing row or column as zero.
pub fn count_of(rows: &[Record]) -> i64 {
    rows.first()
        .and_then(|row| row.get(columns::COUNT))
        .and_then(Value::as_i64)
        .unwrap_or(0)
}
