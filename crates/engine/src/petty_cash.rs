//! Petty cash: an internal cash box kept apart from the main ledger.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{EngineError, ResultEngine, util::parse_column};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PettyCashKind {
    Deposit,
    Withdrawal,
}

impl PettyCashKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Deposit => "deposit",
            Self::Withdrawal => "withdrawal",
        }
    }
}

impl TryFrom<&str> for PettyCashKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "deposit" => Ok(Self::Deposit),
            "withdrawal" => Ok(Self::Withdrawal),
            other => Err(EngineError::InvalidId(format!(
                "invalid petty cash kind: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PettyCashEntry {
    pub id: Uuid,
    pub kind: PettyCashKind,
    pub amount_minor: i64,
    pub description: String,
    pub occurred_at: DateTime<Utc>,
    pub created_by: Uuid,
}

impl PettyCashEntry {
    pub fn signed_amount(&self) -> i64 {
        match self.kind {
            PettyCashKind::Deposit => self.amount_minor,
            PettyCashKind::Withdrawal => -self.amount_minor,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "petty_cash")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub kind: String,
    pub amount_minor: i64,
    pub description: String,
    pub occurred_at: DateTimeUtc,
    pub created_by: Uuid,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for PettyCashEntry {
    type Error = EngineError;

    fn try_from(model: Model) -> ResultEngine<Self> {
        Ok(Self {
            id: model.id,
            kind: parse_column(&model.kind, "petty cash kind")?,
            amount_minor: model.amount_minor,
            description: model.description,
            occurred_at: model.occurred_at,
            created_by: model.created_by,
        })
    }
}
