//! Audit log writes and reads.

use chrono::Utc;
use sea_orm::{ActiveValue, ConnectionTrait, QueryFilter, QueryOrder, QuerySelect, prelude::*};
use uuid::Uuid;

use crate::{ActorContext, AuditAction, AuditEntry, AuditListFilter, ResultEngine, audit_logs};

use super::{Engine, access::require_admin};

impl Engine {
    /// The audit trail, newest first. Admin only.
    pub async fn list_audit_logs(
        &self,
        ctx: &ActorContext,
        filter: AuditListFilter,
    ) -> ResultEngine<Vec<AuditEntry>> {
        require_admin(ctx, "read the audit log")?;
        let mut query = audit_logs::Entity::find().order_by_desc(audit_logs::Column::OccurredAt);
        if let Some(category) = filter.category {
            query = query.filter(audit_logs::Column::Category.eq(category.as_str()));
        }
        if let Some(actor_id) = filter.actor_id {
            query = query.filter(audit_logs::Column::ActorId.eq(actor_id));
        }
        if let Some(limit) = filter.limit {
            query = query.limit(limit);
        }
        query
            .all(&self.database)
            .await?
            .into_iter()
            .map(AuditEntry::try_from)
            .collect()
    }
}

/// Append one entry; callers pass the transaction of the write it describes.
pub(super) async fn record<C: ConnectionTrait>(
    db: &C,
    actor_id: Uuid,
    action: AuditAction,
    details: String,
) -> ResultEngine<AuditEntry> {
    let entry = AuditEntry {
        id: Uuid::new_v4(),
        actor_id,
        action,
        category: action.category(),
        details,
        occurred_at: Utc::now(),
    };
    audit_logs::Entity::insert(audit_logs::ActiveModel {
        id: ActiveValue::Set(entry.id),
        actor_id: ActiveValue::Set(entry.actor_id),
        action: ActiveValue::Set(entry.action.as_str().to_string()),
        category: ActiveValue::Set(entry.category.as_str().to_string()),
        details: ActiveValue::Set(entry.details.clone()),
        occurred_at: ActiveValue::Set(entry.occurred_at),
    })
    .exec_without_returning(db)
    .await?;
    tracing::debug!(
        actor_id = %entry.actor_id,
        action = entry.action.as_str(),
        "audit entry recorded"
    );
    Ok(entry)
}
