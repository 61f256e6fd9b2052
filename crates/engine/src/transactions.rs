//! Financial ledger primitives.
//!
//! A `Transaction` is a single income or expense. Rows created as the side
//! effect of a stock adjustment carry `stock_movement_id`; rows created by a
//! repair order carry `service_order_id`. A paid transaction is settled and
//! can no longer be edited or deleted.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{EngineError, ResultEngine, util::parse_column};

pub const CATEGORY_PRODUCT_SALE: &str = "Product sale";
pub const CATEGORY_STOCK_PURCHASE: &str = "Stock purchase";
pub const CATEGORY_REPAIR_SERVICE: &str = "Repair service";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Income,
    Expense,
}

impl TransactionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }
}

impl TryFrom<&str> for TransactionKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "income" => Ok(Self::Income),
            "expense" => Ok(Self::Expense),
            other => Err(EngineError::InvalidId(format!(
                "invalid transaction kind: {other}"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Paid,
    Pending,
    Overdue,
}

impl TransactionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Paid => "paid",
            Self::Pending => "pending",
            Self::Overdue => "overdue",
        }
    }

    pub fn is_settled(self) -> bool {
        matches!(self, Self::Paid)
    }
}

impl TryFrom<&str> for TransactionStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "paid" => Ok(Self::Paid),
            "pending" => Ok(Self::Pending),
            "overdue" => Ok(Self::Overdue),
            other => Err(EngineError::InvalidId(format!(
                "invalid transaction status: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub kind: TransactionKind,
    pub amount_minor: i64,
    /// Cost of goods sold, only meaningful on sales.
    pub cost_amount_minor: i64,
    pub category: String,
    pub description: String,
    pub status: TransactionStatus,
    pub client_name: Option<String>,
    pub stock_movement_id: Option<Uuid>,
    pub service_order_id: Option<Uuid>,
    pub occurred_at: DateTime<Utc>,
    pub due_at: DateTime<Utc>,
    pub created_by: Uuid,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub kind: String,
    pub amount_minor: i64,
    pub cost_amount_minor: i64,
    pub category: String,
    pub description: String,
    pub status: String,
    pub client_name: Option<String>,
    pub stock_movement_id: Option<Uuid>,
    pub service_order_id: Option<Uuid>,
    pub occurred_at: DateTimeUtc,
    pub due_at: DateTimeUtc,
    pub created_by: Uuid,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::stock_movements::Entity",
        from = "Column::StockMovementId",
        to = "super::stock_movements::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    StockMovements,
}

impl Related<super::stock_movements::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StockMovements.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for Transaction {
    type Error = EngineError;

    fn try_from(model: Model) -> ResultEngine<Self> {
        Ok(Self {
            id: model.id,
            kind: parse_column(&model.kind, "transaction kind")?,
            status: parse_column(&model.status, "transaction status")?,
            amount_minor: model.amount_minor,
            cost_amount_minor: model.cost_amount_minor,
            category: model.category,
            description: model.description,
            client_name: model.client_name,
            stock_movement_id: model.stock_movement_id,
            service_order_id: model.service_order_id,
            occurred_at: model.occurred_at,
            due_at: model.due_at,
            created_by: model.created_by,
        })
    }
}
