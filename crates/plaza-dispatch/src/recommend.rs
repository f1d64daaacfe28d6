//! Promotion recommendations for a user.

use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use plaza_core::similarity::Signals;
use plaza_core::{AttributeKind, EntitySchema, EntityType, Point, PropertyValue};
use plaza_graph::statements::columns;
use plaza_graph::store::take_object;
use plaza_graph::{GraphError, GraphStore, NodeRef, RecommendQuery, Record, Statement, Window};

use crate::error::{FieldError, Result};
use crate::resolve::Entity;
use crate::validate::{fail_on, page};
use crate::{store_failure, Dispatcher};

#[derive(Debug, Clone)]
pub struct RecommendRequest {
    pub user: Uuid,
    /// Without a location, ranking uses the similarity signals alone.
    pub origin: Option<Point>,
    /// Only promotions in at least one of these categories. Empty means all.
    pub categories: Vec<Uuid>,
    pub window: Window,
}

/// A promotion annotated with its ranking.
#[derive(Debug, Clone, Serialize)]
pub struct RankedPromotion {
    #[serde(flatten)]
    pub promotion: Entity,
    pub score: f64,
    /// Distance to the nearest located promoter; `None` when no promoter has
    /// a location.
    pub distance: Option<f64>,
    pub signals: Signals,
}

/// Search parameters read from a payload once the user has resolved.
pub(crate) struct SearchArea {
    pub origin: Option<Point>,
    pub categories: Vec<Uuid>,
    pub window: Window,
}

impl SearchArea {
    /// `location` is absent or carries both `x` and `y`; `categories` is
    /// absent or an array of identifiers.
    pub(crate) fn from_payload(payload: &Value, config: &crate::DispatchConfig) -> Result<Self> {
        let mut errors = Vec::new();

        let origin = match payload.get("location") {
            None | Some(Value::Null) => None,
            Some(location) => match AttributeKind::Point.coerce(location) {
                Ok(PropertyValue::Point(p)) => Some(p),
                _ => {
                    errors.push(FieldError::new("location", "Location format Invalid must be x,y"));
                    None
                }
            },
        };

        let categories = match payload.get("categories") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => {
                let parsed: Option<Vec<Uuid>> = items
                    .iter()
                    .map(|item| item.as_str().and_then(|s| Uuid::parse_str(s).ok()))
                    .collect();
                parsed.unwrap_or_else(|| {
                    errors.push(FieldError::new("categories", "Categories are invalid"));
                    Vec::new()
                })
            }
            Some(_) => {
                errors.push(FieldError::new("categories", "Categories are invalid"));
                Vec::new()
            }
        };

        let window = page(payload, config, &mut errors).window;
        fail_on(errors)?;
        Ok(Self {
            origin,
            categories,
            window,
        })
    }
}

impl<S: GraphStore> Dispatcher<S> {
    /// Rank promotions for `request.user`, best first.
    ///
    /// Score is the mean of the viewed, interest and bookmark similarities
    /// and the reciprocal distance to the nearest promoter. Ties go to the
    /// lower promotion identifier.
    pub async fn recommended_promotions(
        &self,
        request: RecommendRequest,
    ) -> Result<Vec<RankedPromotion>> {
        let user = self.schema(EntityType::User)?;
        self.resolve_node(NodeRef::new(user, request.user)).await?;
        self.rank(request).await
    }

    pub(crate) async fn rank(&self, request: RecommendRequest) -> Result<Vec<RankedPromotion>> {
        let promotion = self.schema(EntityType::Promotion)?;
        let rows = self
            .run(&Statement::Recommend(RecommendQuery {
                user: request.user,
                origin: request.origin,
                categories: request.categories,
                min_distance: self.config().min_distance,
                window: request.window,
            }))
            .await?;

        let ranked = rows
            .into_iter()
            .map(|row| ranked(promotion, row))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| store_failure("recommend", e))?;
        tracing::debug!(user = %request.user, results = ranked.len(), "Ranked promotions");
        Ok(ranked)
    }
}

fn ranked(schema: &'static EntitySchema, mut row: Record) -> std::result::Result<RankedPromotion, GraphError> {
    let promotion = take_object(&mut row, columns::PROMOTION)
        .ok_or_else(|| GraphError::Decode("recommend row without promotion".into()))?;
    let number = |column: &str| row.get(column).and_then(Value::as_f64);
    let score = number(columns::SCORE)
        .ok_or_else(|| GraphError::Decode("recommend row without score".into()))?;

    Ok(RankedPromotion {
        score,
        distance: number(columns::DISTANCE),
        signals: Signals {
            viewed_similarity: number(columns::VIEWED_SIMILARITY).unwrap_or_default(),
            interest_similarity: number(columns::INTEREST_SIMILARITY).unwrap_or_default(),
            bookmark_similarity: number(columns::BOOKMARK_SIMILARITY).unwrap_or_default(),
        },
        promotion: Entity::from_record(schema, promotion),
    })
}
