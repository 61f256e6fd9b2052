//! Append-only stock movement log.
//!
//! Every applied adjustment writes exactly one row here; rows are never
//! updated or deleted, so stock totals can always be explained afterwards.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{EngineError, ResultEngine, util::parse_column};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Entry,
    Exit,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Entry => "entry",
            Self::Exit => "exit",
        }
    }

    /// Signed stock change for `quantity` units.
    pub fn signed(self, quantity: i64) -> i64 {
        match self {
            Self::Entry => quantity,
            Self::Exit => -quantity,
        }
    }
}

impl TryFrom<&str> for Direction {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "entry" => Ok(Self::Entry),
            "exit" => Ok(Self::Exit),
            other => Err(EngineError::InvalidId(format!("invalid direction: {other}"))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: Uuid,
    pub product_id: Uuid,
    pub actor_id: Uuid,
    pub direction: Direction,
    pub quantity: i64,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "stock_movements")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub product_id: Uuid,
    pub actor_id: Uuid,
    pub direction: String,
    pub quantity: i64,
    pub reason: String,
    pub occurred_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::products::Entity",
        from = "Column::ProductId",
        to = "super::products::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Products,
}

impl Related<super::products::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Products.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for StockMovement {
    type Error = EngineError;

    fn try_from(model: Model) -> ResultEngine<Self> {
        Ok(Self {
            id: model.id,
            product_id: model.product_id,
            actor_id: model.actor_id,
            direction: parse_column(&model.direction, "direction")?,
            quantity: model.quantity,
            reason: model.reason,
            occurred_at: model.occurred_at,
        })
    }
}
