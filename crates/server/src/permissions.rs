//! Permission request API endpoints

use api_types::permission::{Mutation, PermissionRequest, RequestQuery, Resolve, Withdraw};
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use engine::ActorContext;
use uuid::Uuid;

use crate::{ServerError, convert, server::ServerState};

/// Admins get every request; everybody else their own.
pub async fn list(
    Extension(ctx): Extension<ActorContext>,
    State(state): State<ServerState>,
    Query(query): Query<RequestQuery>,
) -> Result<Json<Vec<PermissionRequest>>, ServerError> {
    let requests = state
        .engine
        .list_requests(&ctx, query.status.map(convert::request_status))
        .await?;
    Ok(Json(requests.into_iter().map(convert::request).collect()))
}

/// Queue a mutation for approval, whatever the caller's authority.
pub async fn propose(
    Extension(ctx): Extension<ActorContext>,
    State(state): State<ServerState>,
    Json(payload): Json<Mutation>,
) -> Result<(StatusCode, Json<PermissionRequest>), ServerError> {
    let request = state
        .engine
        .propose(&ctx, convert::mutation(payload))
        .await?;
    Ok((StatusCode::ACCEPTED, Json(convert::request(request))))
}

pub async fn resolve(
    Extension(ctx): Extension<ActorContext>,
    State(state): State<ServerState>,
    Path(request_id): Path<Uuid>,
    Json(payload): Json<Resolve>,
) -> Result<Json<PermissionRequest>, ServerError> {
    let request = state
        .engine
        .resolve(
            &ctx,
            request_id,
            convert::decision(payload.status),
            payload.note,
        )
        .await?;
    Ok(Json(convert::request(request)))
}

pub async fn withdraw(
    Extension(ctx): Extension<ActorContext>,
    State(state): State<ServerState>,
    Path(request_id): Path<Uuid>,
    Json(payload): Json<Withdraw>,
) -> Result<Json<PermissionRequest>, ServerError> {
    let request = state
        .engine
        .withdraw(&ctx, request_id, payload.note)
        .await?;
    Ok(Json(convert::request(request)))
}
