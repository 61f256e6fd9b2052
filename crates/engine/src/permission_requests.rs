//! Proposed mutations waiting for an admin decision.
//!
//! A request moves `pending -> approved | rejected | withdrawn` exactly once.
//! The payload is stored as the JSON form of [`Mutation`] and is frozen at
//! proposal time.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{EngineError, Mutation, MutationKind, ResultEngine, util::parse_column};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
    Withdrawn,
}

impl RequestStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Withdrawn => "withdrawn",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Check a status change against the state machine.
    pub fn transition(self, to: RequestStatus) -> ResultEngine<RequestStatus> {
        if self.is_terminal() {
            return Err(EngineError::AlreadyResolved(format!(
                "request is already {}",
                self.as_str()
            )));
        }
        if to == Self::Pending {
            return Err(EngineError::Conflict(
                "a request cannot move back to pending".to_string(),
            ));
        }
        Ok(to)
    }
}

impl TryFrom<&str> for RequestStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "withdrawn" => Ok(Self::Withdrawn),
            other => Err(EngineError::InvalidId(format!(
                "invalid request status: {other}"
            ))),
        }
    }
}

/// An admin's answer to a pending request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approved,
    Rejected,
}

impl From<Decision> for RequestStatus {
    fn from(value: Decision) -> Self {
        match value {
            Decision::Approved => Self::Approved,
            Decision::Rejected => Self::Rejected,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRequest {
    pub id: Uuid,
    pub requester_id: Uuid,
    #[serde(flatten)]
    pub mutation: Mutation,
    pub target_id: Option<Uuid>,
    pub status: RequestStatus,
    /// Rejection or withdrawal message.
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<Uuid>,
}

impl PermissionRequest {
    pub fn kind(&self) -> MutationKind {
        self.mutation.kind()
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "permission_requests")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub requester_id: Uuid,
    pub kind: String,
    pub payload: String,
    pub target_id: Option<Uuid>,
    pub status: String,
    pub note: Option<String>,
    pub created_at: DateTimeUtc,
    pub resolved_at: Option<DateTimeUtc>,
    pub resolved_by: Option<Uuid>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::actors::Entity",
        from = "Column::RequesterId",
        to = "super::actors::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Actors,
}

impl Related<super::actors::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Actors.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for PermissionRequest {
    type Error = EngineError;

    fn try_from(model: Model) -> ResultEngine<Self> {
        let mutation: Mutation = serde_json::from_str(&model.payload)?;
        let kind: MutationKind = parse_column(&model.kind, "mutation kind")?;
        if mutation.kind() != kind {
            return Err(EngineError::InvalidId(format!(
                "request {} stores {} but its payload is {}",
                model.id,
                kind.as_str(),
                mutation.kind().as_str()
            )));
        }
        Ok(Self {
            id: model.id,
            requester_id: model.requester_id,
            mutation,
            target_id: model.target_id,
            status: parse_column(&model.status, "request status")?,
            note: model.note,
            created_at: model.created_at,
            resolved_at: model.resolved_at,
            resolved_by: model.resolved_by,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_moves_to_any_terminal_status() {
        for to in [
            RequestStatus::Approved,
            RequestStatus::Rejected,
            RequestStatus::Withdrawn,
        ] {
            assert_eq!(RequestStatus::Pending.transition(to), Ok(to));
        }
    }

    #[test]
    fn terminal_statuses_do_not_move() {
        for from in [
            RequestStatus::Approved,
            RequestStatus::Rejected,
            RequestStatus::Withdrawn,
        ] {
            let err = from.transition(RequestStatus::Approved).unwrap_err();
            assert!(matches!(err, EngineError::AlreadyResolved(_)));
        }
    }

    #[test]
    fn request_serializes_flat_mutation() {
        let request = PermissionRequest {
            id: Uuid::nil(),
            requester_id: Uuid::nil(),
            mutation: Mutation::DeleteService {
                service_id: Uuid::nil(),
            },
            target_id: Some(Uuid::nil()),
            status: RequestStatus::Pending,
            note: None,
            created_at: Utc::now(),
            resolved_at: None,
            resolved_by: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["type"], "DELETE_SERVICE");
        assert_eq!(json["status"], "pending");

        let back: PermissionRequest = serde_json::from_value(json).unwrap();
        assert_eq!(back, request);
    }
}
