//! Audit log API endpoint

use api_types::audit::{AuditEntry, AuditQuery};
use axum::{
    Extension, Json,
    extract::{Query, State},
};
use engine::{ActorContext, AuditListFilter};

use crate::{ServerError, convert, server::ServerState};

/// Newest first. Admin only.
pub async fn list(
    Extension(ctx): Extension<ActorContext>,
    State(state): State<ServerState>,
    Query(query): Query<AuditQuery>,
) -> Result<Json<Vec<AuditEntry>>, ServerError> {
    let filter = AuditListFilter {
        category: query.category.map(convert::audit_category),
        actor_id: query.actor_id,
        limit: query.limit,
    };
    let entries = state.engine.list_audit_logs(&ctx, filter).await?;
    Ok(Json(entries.into_iter().map(convert::audit_entry).collect()))
}
