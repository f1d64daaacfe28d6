//! Built-in entity declarations.

use crate::schema::{AttributeDef, EntitySchema, RelationshipDef};
use crate::types::{Direction, EntityType};

/// Relationship labels in the graph store.
pub mod labels {
    pub const IN_CATEGORY: &str = "IN_CATEGORY";
    pub const IS_IN: &str = "IS_IN";
    pub const PROMOTED_BY: &str = "PROMOTED_BY";
    pub const INTERESTED_IN: &str = "INTERESTED_IN";
    pub const VIEWED: &str = "VIEWED";
    pub const BOOKMARKED: &str = "BOOKMARKED";
}

const UUID: AttributeDef = AttributeDef::identifier("uuid");
const NAME: AttributeDef = AttributeDef::text("name").required();
const CREATED_AT: AttributeDef = AttributeDef::timestamp("created_at");
const UPDATED_AT: AttributeDef = AttributeDef::timestamp("updated_at").touched();
const LOCATION: AttributeDef = AttributeDef::point("location");

/// Every edge carries its own identifier and creation stamp.
pub const EDGE_PROPERTIES: &[AttributeDef] = &[UUID, CREATED_AT];

const fn outbound(
    name: &'static str,
    target: EntityType,
    label: &'static str,
) -> RelationshipDef {
    RelationshipDef {
        name,
        target,
        label,
        direction: Direction::Out,
        properties: EDGE_PROPERTIES,
    }
}

pub static CATEGORY_GROUP: EntitySchema = EntitySchema {
    entity_type: EntityType::CategoryGroup,
    label: "CategoryGroup",
    primary_key: "uuid",
    attributes: &[UUID, NAME, CREATED_AT, UPDATED_AT],
    relationships: &[],
};

pub static CATEGORY: EntitySchema = EntitySchema {
    entity_type: EntityType::Category,
    label: "Category",
    primary_key: "uuid",
    attributes: &[UUID, NAME, CREATED_AT, UPDATED_AT],
    relationships: &[],
};

pub static MALL: EntitySchema = EntitySchema {
    entity_type: EntityType::Mall,
    label: "Mall",
    primary_key: "uuid",
    attributes: &[UUID, NAME, CREATED_AT, UPDATED_AT, LOCATION],
    relationships: &[outbound(
        "in_category",
        EntityType::Category,
        labels::IN_CATEGORY,
    )],
};

pub static STORE: EntitySchema = EntitySchema {
    entity_type: EntityType::Store,
    label: "Store",
    primary_key: "uuid",
    attributes: &[UUID, NAME, CREATED_AT, UPDATED_AT, LOCATION],
    relationships: &[
        outbound("in_category", EntityType::Category, labels::IN_CATEGORY),
        outbound("is_in", EntityType::Mall, labels::IS_IN),
    ],
};

pub static PROMOTION: EntitySchema = EntitySchema {
    entity_type: EntityType::Promotion,
    label: "Promotion",
    primary_key: "uuid",
    attributes: &[UUID, NAME, CREATED_AT, UPDATED_AT],
    relationships: &[
        outbound("in_category", EntityType::Category, labels::IN_CATEGORY),
        outbound("promoted_by_store", EntityType::Store, labels::PROMOTED_BY),
        outbound("promoted_by_mall", EntityType::Mall, labels::PROMOTED_BY),
    ],
};

pub static USER: EntitySchema = EntitySchema {
    entity_type: EntityType::User,
    label: "User",
    primary_key: "uuid",
    attributes: &[
        UUID,
        AttributeDef::text("name"),
        CREATED_AT,
        UPDATED_AT,
    ],
    relationships: &[
        outbound("interested_in", EntityType::Category, labels::INTERESTED_IN),
        outbound("viewed", EntityType::Promotion, labels::VIEWED),
        outbound("bookmarked_store", EntityType::Store, labels::BOOKMARKED),
        outbound("bookmarked_mall", EntityType::Mall, labels::BOOKMARKED),
    ],
};

pub static ALL: &[&EntitySchema] = &[
    &CATEGORY_GROUP,
    &CATEGORY,
    &MALL,
    &STORE,
    &PROMOTION,
    &USER,
];
