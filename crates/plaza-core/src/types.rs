//! Core value types for the Plaza property graph.
//!
//! Attribute values arrive as untyped JSON and leave as JSON, but everything
//! in between is carried as a closed set of typed variants so the graph layer
//! can bind them as query parameters instead of interpolating text.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::SchemaError;

// ── Entity Types ──────────────────────────────────────────────────

/// Tag for every entity type the registry knows about.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityType {
    CategoryGroup,
    Category,
    Mall,
    Store,
    Promotion,
    User,
}

impl EntityType {
    pub const ALL: [EntityType; 6] = [
        EntityType::CategoryGroup,
        EntityType::Category,
        EntityType::Mall,
        EntityType::Store,
        EntityType::Promotion,
        EntityType::User,
    ];

    /// The node label used in the graph store.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::CategoryGroup => "CategoryGroup",
            EntityType::Category => "Category",
            EntityType::Mall => "Mall",
            EntityType::Store => "Store",
            EntityType::Promotion => "Promotion",
            EntityType::User => "User",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| SchemaError::UnknownEntityType(s.to_string()))
    }
}

// ── Direction & Ordering ──────────────────────────────────────────

/// Orientation of a relationship relative to the entity it is viewed from.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    #[serde(alias = "OUT", alias = "outbound")]
    Out,
    #[serde(alias = "IN", alias = "inbound")]
    In,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_cypher(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("asc") {
            Ok(SortOrder::Asc)
        } else if s.eq_ignore_ascii_case("desc") {
            Ok(SortOrder::Desc)
        } else {
            Err(format!("sort must be ASC or DESC, got '{s}'"))
        }
    }
}

// ── Points ────────────────────────────────────────────────────────

/// A cartesian point. Input format is `{"x": 1.45, "y": 31.45}`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance, matching the store's distance for cartesian points.
    pub fn distance(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn to_json(&self) -> Value {
        serde_json::json!({ "x": self.x, "y": self.y })
    }
}

// ── Attribute Kinds ───────────────────────────────────────────────

/// The closed set of attribute types a schema may declare.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AttributeKind {
    Identifier,
    Text,
    Timestamp,
    Point,
}

impl AttributeKind {
    /// Coerce a raw payload value into a typed property value.
    ///
    /// The error string is the field-level message reported to the caller.
    pub fn coerce(&self, raw: &Value) -> Result<PropertyValue, String> {
        match self {
            AttributeKind::Identifier => raw
                .as_str()
                .and_then(|s| Uuid::parse_str(s).ok())
                .map(PropertyValue::Identifier)
                .ok_or_else(|| "must be a valid uuid".to_string()),
            AttributeKind::Text => raw
                .as_str()
                .map(|s| PropertyValue::Text(s.to_string()))
                .ok_or_else(|| "must be a string".to_string()),
            AttributeKind::Timestamp => raw
                .as_str()
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|ts| PropertyValue::Timestamp(ts.with_timezone(&Utc).trunc_subsecs(6)))
                .ok_or_else(|| "must be an RFC 3339 datetime".to_string()),
            AttributeKind::Point => {
                let x = raw.get("x").and_then(Value::as_f64);
                let y = raw.get("y").and_then(Value::as_f64);
                match (x, y) {
                    (Some(x), Some(y)) if x.is_finite() && y.is_finite() => {
                        Ok(PropertyValue::Point(Point::new(x, y)))
                    }
                    _ => Err("Location format Invalid must be x,y".to_string()),
                }
            }
        }
    }
}

// ── Property Values ───────────────────────────────────────────────

/// A typed attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Identifier(Uuid),
    Text(String),
    Timestamp(DateTime<Utc>),
    Point(Point),
}

/// Validated properties keyed by attribute name. Ordered so rendered
/// statements are deterministic.
pub type Properties = BTreeMap<String, PropertyValue>;

impl PropertyValue {
    pub fn kind(&self) -> AttributeKind {
        match self {
            PropertyValue::Identifier(_) => AttributeKind::Identifier,
            PropertyValue::Text(_) => AttributeKind::Text,
            PropertyValue::Timestamp(_) => AttributeKind::Timestamp,
            PropertyValue::Point(_) => AttributeKind::Point,
        }
    }

    /// The wire representation, identical to what the store hands back.
    pub fn to_json(&self) -> Value {
        match self {
            PropertyValue::Identifier(id) => Value::String(id.to_string()),
            PropertyValue::Text(s) => Value::String(s.clone()),
            PropertyValue::Timestamp(ts) => Value::String(format_timestamp(ts)),
            PropertyValue::Point(p) => p.to_json(),
        }
    }
}

/// Render properties as a JSON object.
pub fn properties_to_json(properties: &Properties) -> serde_json::Map<String, Value> {
    properties
        .iter()
        .map(|(k, v)| (k.clone(), v.to_json()))
        .collect()
}

/// Timestamps are stored as fixed-width UTC RFC 3339 strings so lexical
/// order matches chronological order.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// The current instant at storage precision.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn entity_type_parses_case_insensitively() {
        assert_eq!("mall".parse::<EntityType>().unwrap(), EntityType::Mall);
        assert_eq!(
            "CategoryGroup".parse::<EntityType>().unwrap(),
            EntityType::CategoryGroup
        );
        assert_eq!(
            "Cinema".parse::<EntityType>(),
            Err(SchemaError::UnknownEntityType("Cinema".to_string()))
        );
    }

    #[test]
    fn coerce_identifier() {
        let id = Uuid::new_v4();
        let v = AttributeKind::Identifier
            .coerce(&json!(id.to_string()))
            .unwrap();
        assert_eq!(v, PropertyValue::Identifier(id));
        assert!(AttributeKind::Identifier.coerce(&json!("nope")).is_err());
        assert!(AttributeKind::Identifier.coerce(&json!(12)).is_err());
    }

    #[test]
    fn coerce_point_requires_both_components() {
        let p = AttributeKind::Point
            .coerce(&json!({"x": 1.45, "y": 31.45}))
            .unwrap();
        assert_eq!(p, PropertyValue::Point(Point::new(1.45, 31.45)));

        let err = AttributeKind::Point.coerce(&json!({"x": 1.0})).unwrap_err();
        assert_eq!(err, "Location format Invalid must be x,y");
        assert!(AttributeKind::Point.coerce(&json!("1,2")).is_err());
    }

    #[test]
    fn coerce_timestamp_normalizes_to_utc() {
        let v = AttributeKind::Timestamp
            .coerce(&json!("2024-03-01T12:00:00+02:00"))
            .unwrap();
        assert_eq!(v.to_json(), json!("2024-03-01T10:00:00.000000Z"));
    }

    #[test]
    fn text_rejects_non_strings() {
        assert!(AttributeKind::Text.coerce(&json!(3)).is_err());
        assert_eq!(
            AttributeKind::Text.coerce(&json!("Center")).unwrap(),
            PropertyValue::Text("Center".to_string())
        );
    }

    #[test]
    fn sort_order_parses() {
        assert_eq!("desc".parse::<SortOrder>().unwrap(), SortOrder::Desc);
        assert_eq!("ASC".parse::<SortOrder>().unwrap(), SortOrder::Asc);
        assert!("sideways".parse::<SortOrder>().is_err());
    }

    #[test]
    fn point_distance_is_euclidean() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert_eq!(a.distance(&b), 5.0);
    }

    #[test]
    fn direction_deserializes_from_legacy_spelling() {
        let d: Direction = serde_json::from_value(json!("IN")).unwrap();
        assert_eq!(d, Direction::In);
    }
}
