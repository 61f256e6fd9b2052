//! Permission requests: propose, list, resolve, withdraw.
//!
//! This is the only module that writes `permission_requests.status`. A request
//! leaves `pending` through a conditional update, so two resolutions racing
//! on the same id cannot both win.

use chrono::Utc;
use sea_orm::{
    ActiveValue, ConnectionTrait, DatabaseTransaction, QueryFilter, QueryOrder, TransactionTrait,
    prelude::*, sea_query::Expr,
};
use uuid::Uuid;

use crate::{
    ActorContext, AuditAction, ChangeAction, ChangeEvent, Decision, EngineError, EntityKind,
    Mutation, MutationKind, PermissionRequest, RequestStatus, ResultEngine, permission_requests,
    util::normalize_optional_text, validate,
};

use super::{Engine, access::require_admin, audit::record, retry_stale, with_tx};

impl Engine {
    /// Queue `mutation` for an admin decision.
    ///
    /// The payload is checked against current state first, so a request that
    /// could never apply is refused up front. At most one request per
    /// `(kind, target)` may be pending; stock adjustments stack and are exempt.
    pub async fn propose(
        &self,
        ctx: &ActorContext,
        mut mutation: Mutation,
    ) -> ResultEngine<PermissionRequest> {
        let kind = mutation.kind();
        let target_id = mutation.target_id();

        let request = with_tx!(self, |db_tx| {
            let view = self.load_view(&db_tx, &mutation).await?;
            validate(&mutation, &view)?;
            if let Some(product) = target_id.and_then(|id| view.product(id)) {
                mutation.pin_version(product.version);
            }

            if let Some(target_id) = target_id
                && kind != MutationKind::AdjustStock
            {
                let duplicate = permission_requests::Entity::find()
                    .filter(permission_requests::Column::Kind.eq(kind.as_str()))
                    .filter(permission_requests::Column::TargetId.eq(target_id))
                    .filter(
                        permission_requests::Column::Status.eq(RequestStatus::Pending.as_str()),
                    )
                    .one(&db_tx)
                    .await?;
                if duplicate.is_some() {
                    return Err(EngineError::Conflict(format!(
                        "a {} request for {target_id} is already pending",
                        kind.as_str()
                    )));
                }
            }

            let request = PermissionRequest {
                id: Uuid::new_v4(),
                requester_id: ctx.actor_id(),
                mutation,
                target_id,
                status: RequestStatus::Pending,
                note: None,
                created_at: Utc::now(),
                resolved_at: None,
                resolved_by: None,
            };
            permission_requests::Entity::insert(permission_requests::ActiveModel {
                id: ActiveValue::Set(request.id),
                requester_id: ActiveValue::Set(request.requester_id),
                kind: ActiveValue::Set(kind.as_str().to_string()),
                payload: ActiveValue::Set(serde_json::to_string(&request.mutation)?),
                target_id: ActiveValue::Set(request.target_id),
                status: ActiveValue::Set(request.status.as_str().to_string()),
                note: ActiveValue::Set(None),
                created_at: ActiveValue::Set(request.created_at),
                resolved_at: ActiveValue::Set(None),
                resolved_by: ActiveValue::Set(None),
            })
            .exec_without_returning(&db_tx)
            .await?;
            record(
                &db_tx,
                request.requester_id,
                AuditAction::PermissionRequest,
                format!("Requested {}", summary(&request)),
            )
            .await?;
            Ok::<_, EngineError>(request)
        })?;

        tracing::info!(
            request_id = %request.id,
            requester_id = %request.requester_id,
            kind = kind.as_str(),
            "permission request proposed"
        );
        self.broadcaster.publish(ChangeEvent::new(
            EntityKind::PermissionRequests,
            ChangeAction::Create,
        ));
        Ok(request)
    }

    /// Admins see every request; everybody else only their own. Newest first.
    pub async fn list_requests(
        &self,
        ctx: &ActorContext,
        status: Option<RequestStatus>,
    ) -> ResultEngine<Vec<PermissionRequest>> {
        let mut query = permission_requests::Entity::find()
            .order_by_desc(permission_requests::Column::CreatedAt);
        if !ctx.role().is_admin() {
            query = query.filter(permission_requests::Column::RequesterId.eq(ctx.actor_id()));
        }
        if let Some(status) = status {
            query = query.filter(permission_requests::Column::Status.eq(status.as_str()));
        }
        query
            .all(&self.database)
            .await?
            .into_iter()
            .map(PermissionRequest::try_from)
            .collect()
    }

    pub async fn list_pending(&self, ctx: &ActorContext) -> ResultEngine<Vec<PermissionRequest>> {
        self.list_requests(ctx, Some(RequestStatus::Pending)).await
    }

    pub async fn request(
        &self,
        ctx: &ActorContext,
        request_id: Uuid,
    ) -> ResultEngine<PermissionRequest> {
        let request = load_request(&self.database, request_id).await?;
        if !ctx.role().is_admin() && request.requester_id != ctx.actor_id() {
            return Err(EngineError::KeyNotFound(format!("request {request_id}")));
        }
        Ok(request)
    }

    /// Approve or reject a pending request. Admin only.
    ///
    /// Approval applies the stored mutation in the same DB transaction that
    /// flips the status. If the mutation no longer validates or fails to
    /// apply, nothing is written, the request stays pending and the error is
    /// returned.
    pub async fn resolve(
        &self,
        ctx: &ActorContext,
        request_id: Uuid,
        decision: Decision,
        note: Option<String>,
    ) -> ResultEngine<PermissionRequest> {
        require_admin(ctx, "resolve permission requests")?;
        let note = normalize_optional_text(note.as_deref());

        let mut events = Vec::new();
        let outcome = retry_stale!(self, {
            events.clear();
            with_tx!(self, |db_tx| {
                self.resolve_in(&db_tx, ctx, request_id, decision, note.clone(), &mut events)
                    .await
            })
        });
        let request = match outcome {
            Ok(request) => request,
            Err(err) => {
                tracing::warn!(
                    %request_id,
                    decision = RequestStatus::from(decision).as_str(),
                    error = %err,
                    "permission request resolution failed"
                );
                return Err(err);
            }
        };

        tracing::info!(
            %request_id,
            resolved_by = %ctx.actor_id(),
            status = request.status.as_str(),
            kind = request.kind().as_str(),
            "permission request resolved"
        );
        self.broadcaster.publish(ChangeEvent::new(
            EntityKind::PermissionRequests,
            ChangeAction::Update,
        ));
        self.broadcaster.publish_all(events);
        Ok(request)
    }

    /// Pull back a pending request. Only its proposer may do this.
    pub async fn withdraw(
        &self,
        ctx: &ActorContext,
        request_id: Uuid,
        note: Option<String>,
    ) -> ResultEngine<PermissionRequest> {
        let note = normalize_optional_text(note.as_deref());
        let request = with_tx!(self, |db_tx| {
            let current = load_request(&db_tx, request_id).await?;
            if current.requester_id != ctx.actor_id() {
                return Err(EngineError::Unauthorized(
                    "only the proposer can withdraw a request".to_string(),
                ));
            }
            let withdrawn =
                close_request(&db_tx, &current, RequestStatus::Withdrawn, ctx.actor_id(), note)
                    .await?;
            record(
                &db_tx,
                ctx.actor_id(),
                AuditAction::PermissionWithdrawn,
                format!("Withdrew {}", summary(&withdrawn)),
            )
            .await?;
            Ok::<_, EngineError>(withdrawn)
        })?;
        tracing::info!(%request_id, "permission request withdrawn");
        self.broadcaster.publish(ChangeEvent::new(
            EntityKind::PermissionRequests,
            ChangeAction::Update,
        ));
        Ok(request)
    }

    async fn resolve_in(
        &self,
        db_tx: &DatabaseTransaction,
        ctx: &ActorContext,
        request_id: Uuid,
        decision: Decision,
        note: Option<String>,
        events: &mut Vec<ChangeEvent>,
    ) -> ResultEngine<PermissionRequest> {
        let current = load_request(db_tx, request_id).await?;
        let resolved =
            close_request(db_tx, &current, decision.into(), ctx.actor_id(), note).await?;
        let (action, verb) = match decision {
            Decision::Approved => (AuditAction::PermissionApproved, "Approved"),
            Decision::Rejected => (AuditAction::PermissionRejected, "Rejected"),
        };
        if decision == Decision::Approved {
            // Movements and ledger rows are credited to the proposer.
            self.apply_in(db_tx, current.requester_id, &current.mutation, events)
                .await?;
        }
        let mut details = format!("{verb} {}", summary(&resolved));
        if let Some(note) = &resolved.note {
            details.push_str(&format!(": {note}"));
        }
        record(db_tx, ctx.actor_id(), action, details).await?;
        Ok(resolved)
    }
}

/// `KIND on <target> by <requester>`, for the audit log.
fn summary(request: &PermissionRequest) -> String {
    let mut text = request.kind().as_str().to_string();
    if let Some(target_id) = request.target_id {
        text.push_str(&format!(" on {target_id}"));
    }
    text.push_str(&format!(" by {}", request.requester_id));
    text
}

async fn load_request<C: ConnectionTrait>(
    db: &C,
    request_id: Uuid,
) -> ResultEngine<PermissionRequest> {
    permission_requests::Entity::find_by_id(request_id)
        .one(db)
        .await?
        .ok_or_else(|| EngineError::KeyNotFound(format!("request {request_id}")))?
        .try_into()
}

/// Move a request out of `pending`, failing when somebody else already did.
async fn close_request(
    db_tx: &DatabaseTransaction,
    current: &PermissionRequest,
    to: RequestStatus,
    closed_by: Uuid,
    note: Option<String>,
) -> ResultEngine<PermissionRequest> {
    current.status.transition(to)?;
    let resolved_at = Utc::now();
    let result = permission_requests::Entity::update_many()
        .col_expr(
            permission_requests::Column::Status,
            Expr::value(to.as_str()),
        )
        .col_expr(
            permission_requests::Column::ResolvedAt,
            Expr::value(resolved_at),
        )
        .col_expr(
            permission_requests::Column::ResolvedBy,
            Expr::value(closed_by),
        )
        .col_expr(permission_requests::Column::Note, Expr::value(note.clone()))
        .filter(permission_requests::Column::Id.eq(current.id))
        .filter(permission_requests::Column::Status.eq(RequestStatus::Pending.as_str()))
        .exec(db_tx)
        .await?;
    if result.rows_affected == 0 {
        return Err(EngineError::AlreadyResolved(format!(
            "request {} was resolved concurrently",
            current.id
        )));
    }
    Ok(PermissionRequest {
        status: to,
        note,
        resolved_at: Some(resolved_at),
        resolved_by: Some(closed_by),
        ..current.clone()
    })
}
