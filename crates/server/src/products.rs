//! Product and stock API endpoints

use api_types::{
    outcome::MutationResponse,
    product::{Product, ProductDelete, ProductNew, ProductPatch},
    stock::{AdjustStock, MovementQuery, QuickSell, StockMovement},
};
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use engine::{ActorContext, MovementListFilter, Mutation};
use uuid::Uuid;

use crate::{ServerError, convert, server::ServerState};

pub async fn list(State(state): State<ServerState>) -> Result<Json<Vec<Product>>, ServerError> {
    let products = state.engine.list_products().await?;
    Ok(Json(products.into_iter().map(convert::product).collect()))
}

pub async fn create(
    Extension(ctx): Extension<ActorContext>,
    State(state): State<ServerState>,
    Json(payload): Json<ProductNew>,
) -> Result<(StatusCode, Json<MutationResponse>), ServerError> {
    let outcome = state
        .engine
        .submit(
            &ctx,
            Mutation::CreateProduct(convert::product_draft(payload)),
        )
        .await?;
    Ok(convert::outcome(outcome))
}

pub async fn update(
    Extension(ctx): Extension<ActorContext>,
    State(state): State<ServerState>,
    Path(product_id): Path<Uuid>,
    Json(payload): Json<ProductPatch>,
) -> Result<(StatusCode, Json<MutationResponse>), ServerError> {
    let outcome = state
        .engine
        .submit(
            &ctx,
            Mutation::UpdateProduct {
                product_id,
                changes: convert::product_changes(payload),
            },
        )
        .await?;
    Ok(convert::outcome(outcome))
}

/// `DELETE /products/{id}?expected_version=N`
pub async fn delete(
    Extension(ctx): Extension<ActorContext>,
    State(state): State<ServerState>,
    Path(product_id): Path<Uuid>,
    Query(query): Query<ProductDelete>,
) -> Result<(StatusCode, Json<MutationResponse>), ServerError> {
    let outcome = state
        .engine
        .submit(
            &ctx,
            Mutation::DeleteProduct {
                product_id,
                expected_version: query.expected_version,
            },
        )
        .await?;
    Ok(convert::outcome(outcome))
}

pub async fn adjust_stock(
    Extension(ctx): Extension<ActorContext>,
    State(state): State<ServerState>,
    Json(payload): Json<AdjustStock>,
) -> Result<(StatusCode, Json<MutationResponse>), ServerError> {
    let outcome = state
        .engine
        .adjust_stock(&ctx, convert::adjustment(payload))
        .await?;
    Ok(convert::outcome(outcome))
}

pub async fn quick_sell(
    Extension(ctx): Extension<ActorContext>,
    State(state): State<ServerState>,
    Path(product_id): Path<Uuid>,
    Json(payload): Json<QuickSell>,
) -> Result<(StatusCode, Json<MutationResponse>), ServerError> {
    let outcome = state
        .engine
        .quick_sell(&ctx, product_id, payload.reason)
        .await?;
    Ok(convert::outcome(outcome))
}

pub async fn movements(
    State(state): State<ServerState>,
    Query(query): Query<MovementQuery>,
) -> Result<Json<Vec<StockMovement>>, ServerError> {
    let movements = state
        .engine
        .list_stock_movements(MovementListFilter {
            product_id: query.product_id,
            limit: query.limit,
        })
        .await?;
    Ok(Json(movements.into_iter().map(convert::movement).collect()))
}
