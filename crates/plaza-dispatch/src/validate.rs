//! Input validation: raw JSON payloads in, typed properties or field errors out.
//!
//! Validation never fails fast. Every rule is checked and every problem is
//! collected, so callers see all field errors of a payload at once. Fields
//! outside the rule set are dropped without comment.

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use plaza_core::{
    AttributeDef, AttributeKind, DefaultValue, EntitySchema, Properties, PropertyValue, SortOrder,
};
use plaza_graph::Window;

use crate::config::DispatchConfig;
use crate::error::{DispatchError, FieldError, Result};

/// How schema attributes translate into field rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Required attributes must be present or defaulted.
    Create,
    /// Everything optional; identifiers and system timestamps are not settable.
    Patch,
    /// Only the primary identifier, which is required.
    Lookup,
}

/// One field the validator will look for in a payload.
#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub name: &'static str,
    pub kind: AttributeKind,
    pub required: bool,
    pub default: Option<DefaultValue>,
}

impl FieldRule {
    /// A required identifier field with no default, e.g. `from_uuid`.
    pub const fn identifier(name: &'static str) -> Self {
        Self {
            name,
            kind: AttributeKind::Identifier,
            required: true,
            default: None,
        }
    }

    fn for_attribute(attr: &AttributeDef, mode: Mode) -> Option<Self> {
        let rule = Self {
            name: attr.name,
            kind: attr.kind,
            required: false,
            default: None,
        };
        match mode {
            Mode::Create => Some(Self {
                required: attr.required,
                default: attr.default,
                ..rule
            }),
            Mode::Patch if attr.is_system_managed() => None,
            Mode::Patch => Some(rule),
            Mode::Lookup if attr.primary => Some(Self {
                required: true,
                ..rule
            }),
            Mode::Lookup => None,
        }
    }
}

/// Rules for the attributes of `schema` named in `allowed` (all of them when
/// `allowed` is `None`). Names the schema does not declare are skipped.
pub fn rules(schema: &EntitySchema, allowed: Option<&[String]>, mode: Mode) -> Vec<FieldRule> {
    attribute_rules(schema.attributes, allowed, mode)
}

fn attribute_rules(
    attributes: &[AttributeDef],
    allowed: Option<&[String]>,
    mode: Mode,
) -> Vec<FieldRule> {
    attributes
        .iter()
        .filter(|attr| allowed.map_or(true, |names| names.iter().any(|n| n == attr.name)))
        .filter_map(|attr| FieldRule::for_attribute(attr, mode))
        .collect()
}

/// The outcome of validating one payload.
#[derive(Debug, Default)]
pub struct Validated {
    pub properties: Properties,
    pub errors: Vec<FieldError>,
}

impl Validated {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn into_result(self) -> Result<Properties> {
        if self.errors.is_empty() {
            Ok(self.properties)
        } else {
            Err(DispatchError::Validation(self.errors))
        }
    }
}

/// Coerce every ruled field of `payload`. JSON `null` counts as absent.
/// Defaults that depend on the clock all use `now`.
pub fn validate(payload: &Value, rules: &[FieldRule], now: DateTime<Utc>) -> Validated {
    let mut validated = Validated::default();
    for rule in rules {
        match present(payload, rule.name) {
            Some(raw) => match rule.kind.coerce(raw) {
                Ok(value) => {
                    validated.properties.insert(rule.name.to_string(), value);
                }
                Err(message) => validated.errors.push(FieldError::new(rule.name, message)),
            },
            None => {
                if let Some(default) = rule.default {
                    validated
                        .properties
                        .insert(rule.name.to_string(), default.produce(now));
                } else if rule.required {
                    validated
                        .errors
                        .push(FieldError::new(rule.name, "is required"));
                }
            }
        }
    }
    validated
}

/// Check already-typed properties against the schema: every key must be a
/// declared attribute of the matching kind. Patch mode also refuses system
/// managed attributes.
pub fn check_properties(
    attributes: &[AttributeDef],
    properties: &Properties,
    mode: Mode,
) -> Vec<FieldError> {
    let mut errors = Vec::new();
    for (name, value) in properties {
        match attributes.iter().find(|a| a.name == name) {
            None => errors.push(FieldError::new(name, "is not a declared attribute")),
            Some(attr) if attr.kind != value.kind() => errors.push(FieldError::new(
                name,
                format!("must be a {}", kind_name(attr.kind)),
            )),
            Some(attr) if mode == Mode::Patch && attr.is_system_managed() => {
                errors.push(FieldError::new(name, "cannot be updated"))
            }
            Some(_) => {}
        }
    }
    errors
}

fn kind_name(kind: AttributeKind) -> &'static str {
    match kind {
        AttributeKind::Identifier => "uuid",
        AttributeKind::Text => "string",
        AttributeKind::Timestamp => "datetime",
        AttributeKind::Point => "point",
    }
}

fn present<'a>(payload: &'a Value, name: &str) -> Option<&'a Value> {
    payload.get(name).filter(|v| !v.is_null())
}

pub(crate) fn fail_on(errors: Vec<FieldError>) -> Result<()> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(DispatchError::Validation(errors))
    }
}

// ── Identifiers ───────────────────────────────────────────────────

/// The entity identifier of a find/update/remove payload.
pub fn lookup_id(schema: &EntitySchema, payload: &Value) -> Result<Uuid> {
    let properties = validate(payload, &rules(schema, None, Mode::Lookup), Utc::now()).into_result()?;
    take_identifier(&properties, schema.primary_key)
}

/// Required identifier fields, validated together.
pub fn identifiers<const N: usize>(payload: &Value, fields: [&'static str; N]) -> Result<[Uuid; N]> {
    let rules = fields.map(FieldRule::identifier);
    let properties = validate(payload, &rules, Utc::now()).into_result()?;
    let mut ids = [Uuid::nil(); N];
    for (slot, field) in ids.iter_mut().zip(fields) {
        *slot = take_identifier(&properties, field)?;
    }
    Ok(ids)
}

fn take_identifier(properties: &Properties, field: &str) -> Result<Uuid> {
    match properties.get(field) {
        Some(PropertyValue::Identifier(id)) => Ok(*id),
        _ => Err(DispatchError::invalid(field, "is required")),
    }
}

// ── Listing Controls ──────────────────────────────────────────────

/// Sort direction and offset window of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub sort: SortOrder,
    pub window: Window,
}

/// Read `limit`, `page` and `sort`. `skip = (page - 1) * limit`.
pub fn page(payload: &Value, config: &DispatchConfig, errors: &mut Vec<FieldError>) -> Page {
    let max = config.max_page_size;
    let limit = match present(payload, "limit") {
        None => config.default_page_size,
        Some(raw) => match raw.as_i64() {
            Some(n) if (1..=max).contains(&n) => n,
            _ => {
                errors.push(FieldError::new(
                    "limit",
                    format!("must be an integer between 1 and {max}"),
                ));
                config.default_page_size
            }
        },
    };
    let page = match present(payload, "page") {
        None => 1,
        Some(raw) => match raw.as_i64() {
            Some(n) if n >= 1 => n,
            _ => {
                errors.push(FieldError::new("page", "must be a positive integer"));
                1
            }
        },
    };
    let sort = match present(payload, "sort") {
        None => SortOrder::Asc,
        Some(raw) => match raw.as_str().map(str::parse::<SortOrder>) {
            Some(Ok(sort)) => sort,
            Some(Err(message)) => {
                errors.push(FieldError::new("sort", message));
                SortOrder::Asc
            }
            None => {
                errors.push(FieldError::new("sort", "must be ASC or DESC"));
                SortOrder::Asc
            }
        },
    };
    Page {
        sort,
        window: Window {
            skip: (page - 1).saturating_mul(limit),
            limit,
        },
    }
}

/// The attribute to order by; the primary key unless `order` names a
/// sortable attribute.
pub fn order_field(
    payload: &Value,
    schema: &EntitySchema,
    errors: &mut Vec<FieldError>,
) -> &'static str {
    let Some(raw) = present(payload, "order") else {
        return schema.primary_key;
    };
    match raw.as_str().and_then(|name| schema.attribute(name)) {
        Some(attr) if attr.kind != AttributeKind::Point => attr.name,
        _ => {
            errors.push(FieldError::new(
                "order",
                format!("must name a sortable attribute of {}", schema.label),
            ));
            schema.primary_key
        }
    }
}

/// Equality filter over non-point attributes.
pub fn filter(payload: &Value, schema: &EntitySchema, errors: &mut Vec<FieldError>) -> Properties {
    let mut properties = Properties::new();
    let Some(raw) = present(payload, "filter") else {
        return properties;
    };
    let Some(fields) = raw.as_object() else {
        errors.push(FieldError::new("filter", "must be an object"));
        return properties;
    };
    for (name, value) in fields.iter().filter(|(_, v)| !v.is_null()) {
        match schema.attribute(name) {
            Some(attr) if attr.kind != AttributeKind::Point => match attr.kind.coerce(value) {
                Ok(value) => {
                    properties.insert(attr.name.to_string(), value);
                }
                Err(message) => errors.push(FieldError::new(name.as_str(), message)),
            },
            _ => errors.push(FieldError::new(
                name.as_str(),
                format!("is not a filterable attribute of {}", schema.label),
            )),
        }
    }
    properties
}

// ── Relationship Payloads ─────────────────────────────────────────

/// An optional boolean flag such as `force`.
pub fn flag(payload: &Value, name: &'static str, errors: &mut Vec<FieldError>) -> bool {
    match present(payload, name) {
        None => false,
        Some(Value::Bool(b)) => *b,
        Some(_) => {
            errors.push(FieldError::new(name, "must be a boolean"));
            false
        }
    }
}

/// Caller-settable relationship properties from the optional `properties`
/// object. Generated edge properties are not settable.
pub fn edge_properties(
    payload: &Value,
    declared: &[AttributeDef],
    errors: &mut Vec<FieldError>,
) -> Properties {
    match present(payload, "properties") {
        None => Properties::new(),
        Some(raw @ Value::Object(_)) => {
            let validated = validate(raw, &attribute_rules(declared, None, Mode::Patch), Utc::now());
            errors.extend(validated.errors);
            validated.properties
        }
        Some(_) => {
            errors.push(FieldError::new("properties", "must be an object"));
            Properties::new()
        }
    }
}
