//! Actors table and the explicit identity passed to every engine call.
//!
//! Identities are issued by the external auth collaborator; the engine keeps a
//! mirror so it can attach actor ids to movements and requests and check roles.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::EngineError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Manager,
    Employee,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Manager => "manager",
            Self::Employee => "employee",
        }
    }

    pub fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl TryFrom<&str> for Role {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "admin" => Ok(Self::Admin),
            "manager" => Ok(Self::Manager),
            "employee" => Ok(Self::Employee),
            other => Err(EngineError::InvalidRole(format!("invalid role: {other}"))),
        }
    }
}

/// A verified actor identity, resolved once per call by the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ActorContext {
    actor_id: Uuid,
    role: Role,
}

impl ActorContext {
    pub fn new(actor_id: Uuid, role: Role) -> Self {
        Self { actor_id, role }
    }

    pub fn actor_id(&self) -> Uuid {
        self.actor_id
    }

    pub fn role(&self) -> Role {
        self.role
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: Uuid,
    pub name: String,
    pub role: Role,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "actors")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub role: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for Actor {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            name: model.name,
            role: Role::try_from(model.role.as_str())?,
        })
    }
}
