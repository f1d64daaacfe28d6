//! Error types for plaza-dispatch and their mapping onto responses.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::{json, Value};
use thiserror::Error;

use plaza_core::{EntityType, SchemaError};
use plaza_graph::GraphError;

/// A single field-level validation failure. Serialized as `{field: message}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl Serialize for FieldError {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.field, &self.message)?;
        map.end()
    }
}

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Validation failed on {} field(s)", .0.len())]
    Validation(Vec<FieldError>),

    #[error("{entity_type} with uuid '{id}' was not found")]
    NotFound { entity_type: EntityType, id: String },

    #[error("{label} relationship already exists from {from} '{from_id}' to {to} '{to_id}'")]
    Conflict {
        label: &'static str,
        from: EntityType,
        from_id: String,
        to: EntityType,
        to_id: String,
    },

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("Graph store error: {0}")]
    Store(#[from] GraphError),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, DispatchError>;

impl DispatchError {
    /// A validation failure on a single field.
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        DispatchError::Validation(vec![FieldError::new(field, message)])
    }

    pub fn not_found(entity_type: EntityType, id: impl ToString) -> Self {
        DispatchError::NotFound {
            entity_type,
            id: id.to_string(),
        }
    }

    /// HTTP-style status for the error category.
    pub fn status_code(&self) -> u16 {
        match self {
            DispatchError::Validation(_) | DispatchError::Schema(_) => 400,
            DispatchError::NotFound { .. } => 404,
            DispatchError::Conflict { .. } => 409,
            DispatchError::Store(_) | DispatchError::Serialization(_) => 500,
        }
    }

    /// The response body. Store failures carry no detail; they are logged
    /// where they occur.
    pub fn to_body(&self) -> Value {
        match self {
            DispatchError::Validation(errors) => json!({ "errors": errors }),
            DispatchError::Schema(e) => json!({ "errors": [FieldError::new("entity", e.to_string())] }),
            DispatchError::NotFound { .. } | DispatchError::Conflict { .. } => {
                json!({ "error": self.to_string() })
            }
            DispatchError::Store(_) | DispatchError::Serialization(_) => {
                json!({ "error": "internal error" })
            }
        }
    }
}
