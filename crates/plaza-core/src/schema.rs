//! Declarative entity schemas and the process-wide schema registry.
//!
//! Schemas are static data: attribute definitions drive validation and
//! query construction, relationship definitions drive edge orientation.
//! The registry is built once and only read afterwards.

use std::collections::HashMap;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::SchemaError;
use crate::schemas;
use crate::types::{AttributeKind, Direction, EntityType, PropertyValue};

// ── Attributes ────────────────────────────────────────────────────

/// How an attribute is filled when the caller leaves it out on create.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DefaultValue {
    GenerateIdentifier,
    Now,
}

impl DefaultValue {
    pub fn produce(&self, now: DateTime<Utc>) -> PropertyValue {
        match self {
            DefaultValue::GenerateIdentifier => PropertyValue::Identifier(Uuid::new_v4()),
            DefaultValue::Now => PropertyValue::Timestamp(now),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct AttributeDef {
    pub name: &'static str,
    pub kind: AttributeKind,
    pub required: bool,
    pub unique: bool,
    pub indexed: bool,
    pub primary: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<DefaultValue>,
    /// Re-stamped with the modification instant on every update.
    pub touch_on_update: bool,
}

impl AttributeDef {
    const fn plain(name: &'static str, kind: AttributeKind) -> Self {
        Self {
            name,
            kind,
            required: false,
            unique: false,
            indexed: false,
            primary: false,
            default: None,
            touch_on_update: false,
        }
    }

    /// A generated, immutable, unique identifier.
    pub const fn identifier(name: &'static str) -> Self {
        Self {
            required: true,
            unique: true,
            indexed: true,
            primary: true,
            default: Some(DefaultValue::GenerateIdentifier),
            ..Self::plain(name, AttributeKind::Identifier)
        }
    }

    pub const fn text(name: &'static str) -> Self {
        Self::plain(name, AttributeKind::Text)
    }

    /// A timestamp defaulting to the creation instant.
    pub const fn timestamp(name: &'static str) -> Self {
        Self {
            default: Some(DefaultValue::Now),
            ..Self::plain(name, AttributeKind::Timestamp)
        }
    }

    pub const fn point(name: &'static str) -> Self {
        Self::plain(name, AttributeKind::Point)
    }

    pub const fn required(self) -> Self {
        Self {
            required: true,
            ..self
        }
    }

    pub const fn touched(self) -> Self {
        Self {
            touch_on_update: true,
            ..self
        }
    }

    /// Identifiers and stamped timestamps are never set by callers after creation.
    pub fn is_system_managed(&self) -> bool {
        self.primary || matches!(self.default, Some(DefaultValue::Now))
    }
}

// ── Relationships ─────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct RelationshipDef {
    /// Declaration key, e.g. `is_in`.
    pub name: &'static str,
    pub target: EntityType,
    /// Edge label in the store, e.g. `IS_IN`.
    pub label: &'static str,
    pub direction: Direction,
    pub properties: &'static [AttributeDef],
}

impl RelationshipDef {
    fn matches(&self, name: &str, target: EntityType) -> bool {
        self.target == target && (self.name == name || self.label.eq_ignore_ascii_case(name))
    }
}

// ── Entity Schemas ────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct EntitySchema {
    pub entity_type: EntityType,
    pub label: &'static str,
    pub primary_key: &'static str,
    pub attributes: &'static [AttributeDef],
    pub relationships: &'static [RelationshipDef],
}

impl EntitySchema {
    pub fn attribute(&self, name: &str) -> Option<&'static AttributeDef> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn relationship(&self, name: &str, target: EntityType) -> Option<&'static RelationshipDef> {
        self.relationships.iter().find(|r| r.matches(name, target))
    }
}

/// A relationship resolved to its canonical orientation: edges always run
/// from `source` to `target` in the store.
#[derive(Debug, Clone, Copy)]
pub struct Relation {
    pub name: &'static str,
    pub label: &'static str,
    pub source: &'static EntitySchema,
    pub target: &'static EntitySchema,
    pub properties: &'static [AttributeDef],
}

impl Relation {
    /// Whether the caller's `from` entity sits at the edge's tail.
    pub fn starts_at(&self, from: EntityType) -> bool {
        self.source.entity_type == from
    }
}

// ── Registry ──────────────────────────────────────────────────────

/// Lookup table from entity type tag to schema.
pub struct SchemaRegistry {
    schemas: HashMap<EntityType, &'static EntitySchema>,
}

impl SchemaRegistry {
    pub fn new(declared: &[&'static EntitySchema]) -> Self {
        Self {
            schemas: declared.iter().map(|s| (s.entity_type, *s)).collect(),
        }
    }

    /// The built-in registry, initialized on first use.
    pub fn builtin() -> &'static SchemaRegistry {
        static REGISTRY: OnceLock<SchemaRegistry> = OnceLock::new();
        REGISTRY.get_or_init(|| SchemaRegistry::new(schemas::ALL))
    }

    /// Look up a schema by entity type name.
    pub fn get_schema(&self, name: &str) -> Result<&'static EntitySchema, SchemaError> {
        self.schema(name.parse()?)
    }

    pub fn schema(&self, entity_type: EntityType) -> Result<&'static EntitySchema, SchemaError> {
        self.schemas
            .get(&entity_type)
            .copied()
            .ok_or_else(|| SchemaError::UnknownEntityType(entity_type.to_string()))
    }

    pub fn schemas(&self) -> Vec<&'static EntitySchema> {
        let mut all: Vec<_> = self.schemas.values().copied().collect();
        all.sort_by_key(|s| s.entity_type);
        all
    }

    /// Resolve a relationship between two entity types by declaration key or
    /// label. Declarations on `from` win over declarations on `to`.
    pub fn relation(
        &self,
        from: EntityType,
        to: EntityType,
        name: &str,
    ) -> Result<Relation, SchemaError> {
        let from_schema = self.schema(from)?;
        let to_schema = self.schema(to)?;

        let (def, declared_on_from) = match from_schema.relationship(name, to) {
            Some(def) => (def, true),
            None => match to_schema.relationship(name, from) {
                Some(def) => (def, false),
                None => {
                    return Err(SchemaError::UnknownRelationship {
                        from: from.to_string(),
                        to: to.to_string(),
                        name: name.to_string(),
                    })
                }
            },
        };

        let forward = matches!(
            (declared_on_from, def.direction),
            (true, Direction::Out) | (false, Direction::In)
        );
        let (source, target) = if forward {
            (from_schema, to_schema)
        } else {
            (to_schema, from_schema)
        };

        Ok(Relation {
            name: def.name,
            label: def.label,
            source,
            target,
            properties: def.properties,
        })
    }
}
