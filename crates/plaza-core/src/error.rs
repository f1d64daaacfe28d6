use thiserror::Error;

/// Errors raised by schema registry lookups.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Unknown entity type: {0}")]
    UnknownEntityType(String),

    #[error("Unknown relationship '{name}' between {from} and {to}")]
    UnknownRelationship {
        from: String,
        to: String,
        name: String,
    },
}
