//! Audit trail of who did what.
//!
//! One row per committed write, written inside the same DB transaction as the
//! write it describes. Rows are never edited.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{EngineError, MutationKind, ResultEngine, util::parse_column};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    ProductCreate,
    ProductUpdate,
    ProductDelete,
    StockAdjust,
    ServiceCreate,
    ServiceUpdate,
    ServiceStatus,
    ServiceDelete,
    PermissionRequest,
    PermissionApproved,
    PermissionRejected,
    PermissionWithdrawn,
    FinanceCreate,
    FinanceUpdate,
    FinanceDelete,
    PettyCashCreate,
}

impl AuditAction {
    pub const ALL: [AuditAction; 16] = [
        Self::ProductCreate,
        Self::ProductUpdate,
        Self::ProductDelete,
        Self::StockAdjust,
        Self::ServiceCreate,
        Self::ServiceUpdate,
        Self::ServiceStatus,
        Self::ServiceDelete,
        Self::PermissionRequest,
        Self::PermissionApproved,
        Self::PermissionRejected,
        Self::PermissionWithdrawn,
        Self::FinanceCreate,
        Self::FinanceUpdate,
        Self::FinanceDelete,
        Self::PettyCashCreate,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ProductCreate => "PRODUCT_CREATE",
            Self::ProductUpdate => "PRODUCT_UPDATE",
            Self::ProductDelete => "PRODUCT_DELETE",
            Self::StockAdjust => "STOCK_ADJUST",
            Self::ServiceCreate => "SERVICE_CREATE",
            Self::ServiceUpdate => "SERVICE_UPDATE",
            Self::ServiceStatus => "SERVICE_STATUS",
            Self::ServiceDelete => "SERVICE_DELETE",
            Self::PermissionRequest => "PERMISSION_REQUEST",
            Self::PermissionApproved => "PERMISSION_APPROVED",
            Self::PermissionRejected => "PERMISSION_REJECTED",
            Self::PermissionWithdrawn => "PERMISSION_WITHDRAWN",
            Self::FinanceCreate => "FINANCE_CREATE",
            Self::FinanceUpdate => "FINANCE_UPDATE",
            Self::FinanceDelete => "FINANCE_DELETE",
            Self::PettyCashCreate => "PETTY_CASH_CREATE",
        }
    }

    pub fn category(self) -> AuditCategory {
        match self {
            Self::ProductCreate | Self::ProductUpdate | Self::ProductDelete | Self::StockAdjust => {
                AuditCategory::Inventory
            }
            Self::ServiceCreate
            | Self::ServiceUpdate
            | Self::ServiceStatus
            | Self::ServiceDelete => AuditCategory::Services,
            Self::PermissionRequest
            | Self::PermissionApproved
            | Self::PermissionRejected
            | Self::PermissionWithdrawn => AuditCategory::System,
            Self::FinanceCreate
            | Self::FinanceUpdate
            | Self::FinanceDelete
            | Self::PettyCashCreate => AuditCategory::Finance,
        }
    }
}

impl From<MutationKind> for AuditAction {
    fn from(kind: MutationKind) -> Self {
        match kind {
            MutationKind::CreateProduct => Self::ProductCreate,
            MutationKind::UpdateProduct => Self::ProductUpdate,
            MutationKind::DeleteProduct => Self::ProductDelete,
            MutationKind::AdjustStock => Self::StockAdjust,
            MutationKind::CreateService => Self::ServiceCreate,
            MutationKind::UpdateService => Self::ServiceUpdate,
            MutationKind::DeleteService => Self::ServiceDelete,
            MutationKind::UpdateServiceStatus => Self::ServiceStatus,
        }
    }
}

impl TryFrom<&str> for AuditAction {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|action| action.as_str() == value)
            .ok_or_else(|| EngineError::InvalidId(format!("invalid audit action: {value}")))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditCategory {
    Inventory,
    Services,
    Finance,
    System,
}

impl AuditCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Inventory => "INVENTORY",
            Self::Services => "SERVICES",
            Self::Finance => "FINANCE",
            Self::System => "SYSTEM",
        }
    }
}

impl TryFrom<&str> for AuditCategory {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "INVENTORY" => Ok(Self::Inventory),
            "SERVICES" => Ok(Self::Services),
            "FINANCE" => Ok(Self::Finance),
            "SYSTEM" => Ok(Self::System),
            other => Err(EngineError::InvalidId(format!(
                "invalid audit category: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub actor_id: Uuid,
    pub action: AuditAction,
    pub category: AuditCategory,
    pub details: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "audit_logs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub actor_id: Uuid,
    pub action: String,
    pub category: String,
    pub details: String,
    pub occurred_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for AuditEntry {
    type Error = EngineError;

    fn try_from(model: Model) -> ResultEngine<Self> {
        Ok(Self {
            id: model.id,
            actor_id: model.actor_id,
            action: parse_column(&model.action, "audit action")?,
            category: parse_column(&model.category, "audit category")?,
            details: model.details,
            occurred_at: model.occurred_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_text_round_trips() {
        for action in AuditAction::ALL {
            assert_eq!(AuditAction::try_from(action.as_str()).unwrap(), action);
        }
    }

    #[test]
    fn approvals_are_system_events() {
        assert_eq!(
            AuditAction::PermissionApproved.category(),
            AuditCategory::System
        );
        assert_eq!(
            AuditAction::from(MutationKind::AdjustStock).category(),
            AuditCategory::Inventory
        );
    }
}
