//! Repair service API endpoints

use api_types::{
    outcome::MutationResponse,
    service::{Service, ServiceNew, ServicePatch, ServiceStatusUpdate},
};
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use engine::{ActorContext, Mutation};
use uuid::Uuid;

use crate::{ServerError, convert, server::ServerState};

pub async fn list(State(state): State<ServerState>) -> Result<Json<Vec<Service>>, ServerError> {
    let services = state.engine.list_services().await?;
    Ok(Json(services.into_iter().map(convert::service).collect()))
}

pub async fn create(
    Extension(ctx): Extension<ActorContext>,
    State(state): State<ServerState>,
    Json(payload): Json<ServiceNew>,
) -> Result<(StatusCode, Json<MutationResponse>), ServerError> {
    let outcome = state
        .engine
        .submit(
            &ctx,
            Mutation::CreateService(convert::service_draft(payload)),
        )
        .await?;
    Ok(convert::outcome(outcome))
}

pub async fn update(
    Extension(ctx): Extension<ActorContext>,
    State(state): State<ServerState>,
    Path(service_id): Path<Uuid>,
    Json(payload): Json<ServicePatch>,
) -> Result<(StatusCode, Json<MutationResponse>), ServerError> {
    let outcome = state
        .engine
        .submit(
            &ctx,
            Mutation::UpdateService {
                service_id,
                changes: convert::service_changes(payload),
            },
        )
        .await?;
    Ok(convert::outcome(outcome))
}

pub async fn update_status(
    Extension(ctx): Extension<ActorContext>,
    State(state): State<ServerState>,
    Path(service_id): Path<Uuid>,
    Json(payload): Json<ServiceStatusUpdate>,
) -> Result<(StatusCode, Json<MutationResponse>), ServerError> {
    let outcome = state
        .engine
        .submit(
            &ctx,
            Mutation::UpdateServiceStatus {
                service_id,
                status: convert::service_status(payload.status),
            },
        )
        .await?;
    Ok(convert::outcome(outcome))
}

pub async fn delete(
    Extension(ctx): Extension<ActorContext>,
    State(state): State<ServerState>,
    Path(service_id): Path<Uuid>,
) -> Result<(StatusCode, Json<MutationResponse>), ServerError> {
    let outcome = state
        .engine
        .submit(&ctx, Mutation::DeleteService { service_id })
        .await?;
    Ok(convert::outcome(outcome))
}
