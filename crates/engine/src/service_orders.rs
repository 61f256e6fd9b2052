//! Repair service orders.
//!
//! An order consumes parts from stock when it is created and owns a linked
//! income transaction that settles when the device is delivered.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{EngineError, ResultEngine, util::parse_column};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceStatus {
    Pending,
    InProgress,
    Completed,
    Delivered,
    Cancelled,
}

impl ServiceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    /// Delivered and cancelled orders accept no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }
}

impl TryFrom<&str> for ServiceStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(EngineError::InvalidId(format!(
                "invalid service status: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServicePart {
    pub product_id: Uuid,
    pub quantity: i64,
    pub unit_price_minor: i64,
    pub unit_cost_minor: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceOrder {
    pub id: Uuid,
    pub client_name: String,
    pub client_phone: Option<String>,
    pub device_model: String,
    pub description: Option<String>,
    pub status: ServiceStatus,
    pub price_minor: i64,
    pub cost_minor: i64,
    pub parts: Vec<ServicePart>,
    pub created_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
}

impl ServiceOrder {
    /// Description used for the linked income transaction.
    pub(crate) fn ledger_description(&self) -> String {
        format!("Service: {} - {}", self.device_model, self.client_name)
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "service_orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub client_name: String,
    pub client_phone: Option<String>,
    pub device_model: String,
    pub description: Option<String>,
    pub status: String,
    pub price_minor: i64,
    pub cost_minor: i64,
    pub created_at: DateTimeUtc,
    pub delivered_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::service_parts::Entity")]
    Parts,
}

impl Related<super::service_parts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Parts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl ServiceOrder {
    pub(crate) fn from_model(model: Model, parts: Vec<ServicePart>) -> ResultEngine<Self> {
        Ok(Self {
            id: model.id,
            status: parse_column(&model.status, "service status")?,
            client_name: model.client_name,
            client_phone: model.client_phone,
            device_model: model.device_model,
            description: model.description,
            price_minor: model.price_minor,
            cost_minor: model.cost_minor,
            parts,
            created_at: model.created_at,
            delivered_at: model.delivered_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses() {
        assert!(ServiceStatus::Delivered.is_terminal());
        assert!(ServiceStatus::Cancelled.is_terminal());
        assert!(!ServiceStatus::InProgress.is_terminal());
    }

    #[test]
    fn status_round_trips_through_column_text() {
        for status in [
            ServiceStatus::Pending,
            ServiceStatus::InProgress,
            ServiceStatus::Completed,
            ServiceStatus::Delivered,
            ServiceStatus::Cancelled,
        ] {
            assert_eq!(ServiceStatus::try_from(status.as_str()).unwrap(), status);
        }
    }
}
