//! The module contains the `Product` struct and its storage model.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{EngineError, ResultEngine, util::parse_column};

/// Default low-stock threshold when a product is created without one.
pub const DEFAULT_MIN_STOCK: i64 = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    Active,
    OutOfStock,
}

impl ProductStatus {
    /// Status derived from a stock level: `out_of_stock` exactly at zero.
    pub fn for_stock(stock: i64) -> Self {
        if stock == 0 {
            Self::OutOfStock
        } else {
            Self::Active
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::OutOfStock => "out_of_stock",
        }
    }
}

impl TryFrom<&str> for ProductStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "active" => Ok(Self::Active),
            "out_of_stock" => Ok(Self::OutOfStock),
            other => Err(EngineError::InvalidId(format!(
                "invalid product status: {other}"
            ))),
        }
    }
}

/// A sellable item held in stock.
///
/// `version` increases on every write, so callers can detect that a product
/// changed since they last read it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub category: Option<String>,
    pub price_minor: i64,
    pub cost_price_minor: i64,
    pub stock: i64,
    pub min_stock: i64,
    pub status: ProductStatus,
    pub version: i64,
    pub created_at: DateTime<Utc>,
}

impl Product {
    pub fn is_low_stock(&self) -> bool {
        self.stock <= self.min_stock
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub category: Option<String>,
    pub price_minor: i64,
    pub cost_price_minor: i64,
    pub stock: i64,
    pub min_stock: i64,
    pub status: String,
    pub version: i64,
    pub deleted: bool,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::stock_movements::Entity")]
    StockMovements,
}

impl Related<super::stock_movements::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StockMovements.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for Product {
    type Error = EngineError;

    fn try_from(model: Model) -> ResultEngine<Self> {
        Ok(Self {
            id: model.id,
            status: parse_column(&model.status, "product status")?,
            name: model.name,
            category: model.category,
            price_minor: model.price_minor,
            cost_price_minor: model.cost_price_minor,
            stock: model.stock,
            min_stock: model.min_stock,
            version: model.version,
            created_at: model.created_at,
        })
    }
}
