//! Transactions and petty cash API endpoints

use api_types::{
    petty_cash::{PettyCashEntry, PettyCashList, PettyCashNew},
    transaction::{Transaction, TransactionList, TransactionNew, TransactionPatch, TransactionQuery},
};
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use engine::{ActorContext, PettyCashCmd, TransactionChanges, TransactionCmd, TransactionListFilter};
use uuid::Uuid;

use crate::{ServerError, convert, server::ServerState};

pub async fn list_transactions(
    State(state): State<ServerState>,
    Query(query): Query<TransactionQuery>,
) -> Result<Json<TransactionList>, ServerError> {
    let engine = &state.engine;
    let filter = TransactionListFilter {
        kind: query.kind.map(convert::transaction_kind),
        status: query.status.map(convert::transaction_status),
        limit: query.limit,
    };
    let transactions = engine.list_transactions(filter).await?;
    let balance_minor = engine.cash_balance().await?;

    Ok(Json(TransactionList {
        transactions: transactions
            .into_iter()
            .map(convert::transaction)
            .collect(),
        balance_minor,
    }))
}

pub async fn create_transaction(
    Extension(ctx): Extension<ActorContext>,
    State(state): State<ServerState>,
    Json(payload): Json<TransactionNew>,
) -> Result<(StatusCode, Json<Transaction>), ServerError> {
    let mut cmd = TransactionCmd::new(
        convert::transaction_kind(payload.kind),
        payload.amount_minor,
        payload.category,
        payload.description,
        payload.occurred_at.unwrap_or_else(Utc::now),
    );
    if let Some(status) = payload.status {
        cmd = cmd.status(convert::transaction_status(status));
    }
    if let Some(client_name) = payload.client_name {
        cmd = cmd.client_name(client_name);
    }
    if let Some(due_at) = payload.due_at {
        cmd = cmd.due_at(due_at);
    }

    let transaction = state.engine.create_transaction(&ctx, cmd).await?;
    Ok((StatusCode::CREATED, Json(convert::transaction(transaction))))
}

pub async fn update_transaction(
    Extension(ctx): Extension<ActorContext>,
    State(state): State<ServerState>,
    Path(transaction_id): Path<Uuid>,
    Json(payload): Json<TransactionPatch>,
) -> Result<Json<Transaction>, ServerError> {
    let changes = TransactionChanges {
        amount_minor: payload.amount_minor,
        category: payload.category,
        description: payload.description,
        status: payload.status.map(convert::transaction_status),
        client_name: payload.client_name,
        due_at: payload.due_at,
    };
    if changes.is_empty() {
        return Err(ServerError::Generic("nothing to update".to_string()));
    }
    let transaction = state
        .engine
        .update_transaction(&ctx, transaction_id, changes)
        .await?;
    Ok(Json(convert::transaction(transaction)))
}

pub async fn delete_transaction(
    Extension(ctx): Extension<ActorContext>,
    State(state): State<ServerState>,
    Path(transaction_id): Path<Uuid>,
) -> Result<StatusCode, ServerError> {
    state
        .engine
        .delete_transaction(&ctx, transaction_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_petty_cash(
    State(state): State<ServerState>,
) -> Result<Json<PettyCashList>, ServerError> {
    let entries = state.engine.list_petty_cash().await?;
    let balance_minor = state.engine.petty_cash_balance().await?;
    Ok(Json(PettyCashList {
        entries: entries.into_iter().map(convert::petty_cash_entry).collect(),
        balance_minor,
    }))
}

pub async fn record_petty_cash(
    Extension(ctx): Extension<ActorContext>,
    State(state): State<ServerState>,
    Json(payload): Json<PettyCashNew>,
) -> Result<(StatusCode, Json<PettyCashEntry>), ServerError> {
    let cmd = PettyCashCmd::new(
        convert::petty_cash_kind(payload.kind),
        payload.amount_minor,
        payload.description,
        payload.occurred_at.unwrap_or_else(Utc::now),
    );
    let entry = state.engine.record_petty_cash(&ctx, cmd).await?;
    Ok((StatusCode::CREATED, Json(convert::petty_cash_entry(entry))))
}
