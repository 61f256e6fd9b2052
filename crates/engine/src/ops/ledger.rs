//! Financial ledger and petty cash.

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveValue, ConnectionTrait, DatabaseTransaction, QueryFilter, QueryOrder, QuerySelect,
    TransactionTrait, prelude::*, sea_query::Expr,
};
use uuid::Uuid;

use crate::{
    ActorContext, AuditAction, ChangeAction, ChangeEvent, EngineError, EntityKind, PettyCashCmd,
    PettyCashEntry, PettyCashKind, ResultEngine, Transaction, TransactionChanges, TransactionCmd,
    TransactionKind, TransactionListFilter, TransactionStatus, ValidationError, petty_cash,
    transactions,
    util::{normalize_name, normalize_optional_text},
};

use super::{Engine, access::require_admin, audit::record, with_tx};

/// A ledger row about to be written.
pub(super) struct LedgerEntry {
    pub kind: TransactionKind,
    pub amount_minor: i64,
    pub cost_amount_minor: i64,
    pub category: String,
    pub description: String,
    pub status: TransactionStatus,
    pub client_name: Option<String>,
    pub stock_movement_id: Option<Uuid>,
    pub service_order_id: Option<Uuid>,
    pub created_by: Uuid,
}

impl Engine {
    /// Ledger rows, newest first.
    pub async fn list_transactions(
        &self,
        filter: TransactionListFilter,
    ) -> ResultEngine<Vec<Transaction>> {
        let mut query =
            transactions::Entity::find().order_by_desc(transactions::Column::OccurredAt);
        if let Some(kind) = filter.kind {
            query = query.filter(transactions::Column::Kind.eq(kind.as_str()));
        }
        if let Some(status) = filter.status {
            query = query.filter(transactions::Column::Status.eq(status.as_str()));
        }
        if let Some(limit) = filter.limit {
            query = query.limit(limit);
        }
        query
            .all(&self.database)
            .await?
            .into_iter()
            .map(Transaction::try_from)
            .collect()
    }

    pub async fn transaction(&self, transaction_id: Uuid) -> ResultEngine<Transaction> {
        transactions::Entity::find_by_id(transaction_id)
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound(format!("transaction {transaction_id}")))?
            .try_into()
    }

    /// Paid income minus paid expense.
    pub async fn cash_balance(&self) -> ResultEngine<i64> {
        cash_balance_on(&self.database).await
    }

    /// Record a manual income or expense. Any known actor may do this.
    pub async fn create_transaction(
        &self,
        ctx: &ActorContext,
        cmd: TransactionCmd,
    ) -> ResultEngine<Transaction> {
        if cmd.amount_minor <= 0 {
            return Err(ValidationError::InvalidAmount(cmd.amount_minor).into());
        }
        let category =
            normalize_name(&cmd.category).ok_or(ValidationError::MissingField("category"))?;
        let description = normalize_name(&cmd.description)
            .ok_or(ValidationError::MissingField("description"))?;

        let transaction = with_tx!(self, |db_tx| {
            if cmd.kind == TransactionKind::Expense && cmd.status.is_settled() {
                self.ensure_funds(&db_tx, cmd.amount_minor).await?;
            }
            let transaction = self
                .insert_transaction_at(
                    &db_tx,
                    LedgerEntry {
                        kind: cmd.kind,
                        amount_minor: cmd.amount_minor,
                        cost_amount_minor: 0,
                        category,
                        description,
                        status: cmd.status,
                        client_name: normalize_optional_text(cmd.client_name.as_deref()),
                        stock_movement_id: None,
                        service_order_id: None,
                        created_by: ctx.actor_id(),
                    },
                    cmd.occurred_at,
                    cmd.due_at.unwrap_or(cmd.occurred_at),
                )
                .await?;
            record(
                &db_tx,
                ctx.actor_id(),
                AuditAction::FinanceCreate,
                format!(
                    "Recorded {} of {}: {}",
                    transaction.kind.as_str(),
                    transaction.amount_minor,
                    transaction.description
                ),
            )
            .await?;
            Ok::<_, EngineError>(transaction)
        })?;

        self.broadcaster.publish(ChangeEvent::new(
            EntityKind::Transactions,
            ChangeAction::Create,
        ));
        Ok(transaction)
    }

    /// Edit a transaction that has not been paid yet. Admin only.
    pub async fn update_transaction(
        &self,
        ctx: &ActorContext,
        transaction_id: Uuid,
        changes: TransactionChanges,
    ) -> ResultEngine<Transaction> {
        require_admin(ctx, "edit transactions")?;
        if let Some(amount_minor) = changes.amount_minor
            && amount_minor <= 0
        {
            return Err(ValidationError::InvalidAmount(amount_minor).into());
        }

        let transaction = with_tx!(self, |db_tx| {
            let current = self.unsettled_transaction(&db_tx, transaction_id).await?;
            let mut updated = current.clone();
            if let Some(amount_minor) = changes.amount_minor {
                updated.amount_minor = amount_minor;
            }
            if let Some(category) = &changes.category {
                updated.category =
                    normalize_name(category).ok_or(ValidationError::MissingField("category"))?;
            }
            if let Some(description) = &changes.description {
                updated.description = normalize_name(description)
                    .ok_or(ValidationError::MissingField("description"))?;
            }
            if let Some(status) = changes.status {
                updated.status = status;
            }
            if let Some(client_name) = &changes.client_name {
                updated.client_name = normalize_optional_text(Some(client_name));
            }
            if let Some(due_at) = changes.due_at {
                updated.due_at = due_at;
            }
            if updated.kind == TransactionKind::Expense && updated.status.is_settled() {
                self.ensure_funds(&db_tx, updated.amount_minor).await?;
            }
            self.store_transaction(&db_tx, &updated).await?;
            record(
                &db_tx,
                ctx.actor_id(),
                AuditAction::FinanceUpdate,
                format!(
                    "Edited {}: {} -> {} ({})",
                    updated.description,
                    current.amount_minor,
                    updated.amount_minor,
                    updated.status.as_str()
                ),
            )
            .await?;
            Ok::<_, EngineError>(updated)
        })?;

        self.broadcaster.publish(ChangeEvent::new(
            EntityKind::Transactions,
            ChangeAction::Update,
        ));
        Ok(transaction)
    }

    /// Delete a transaction that has not been paid yet. Admin only.
    pub async fn delete_transaction(
        &self,
        ctx: &ActorContext,
        transaction_id: Uuid,
    ) -> ResultEngine<()> {
        require_admin(ctx, "delete transactions")?;
        with_tx!(self, |db_tx| {
            let current = self.unsettled_transaction(&db_tx, transaction_id).await?;
            transactions::Entity::delete_by_id(transaction_id)
                .exec(&db_tx)
                .await?;
            record(
                &db_tx,
                ctx.actor_id(),
                AuditAction::FinanceDelete,
                format!(
                    "Removed {} ({})",
                    current.description, current.amount_minor
                ),
            )
            .await?;
            Ok::<_, EngineError>(())
        })?;
        self.broadcaster.publish(ChangeEvent::new(
            EntityKind::Transactions,
            ChangeAction::Delete,
        ));
        Ok(())
    }

    /// Petty cash entries, newest first.
    pub async fn list_petty_cash(&self) -> ResultEngine<Vec<PettyCashEntry>> {
        petty_cash::Entity::find()
            .order_by_desc(petty_cash::Column::OccurredAt)
            .all(&self.database)
            .await?
            .into_iter()
            .map(PettyCashEntry::try_from)
            .collect()
    }

    pub async fn petty_cash_balance(&self) -> ResultEngine<i64> {
        petty_cash_balance_on(&self.database).await
    }

    /// Deposit into or withdraw from the petty cash box. Admin only.
    pub async fn record_petty_cash(
        &self,
        ctx: &ActorContext,
        cmd: PettyCashCmd,
    ) -> ResultEngine<PettyCashEntry> {
        require_admin(ctx, "move petty cash")?;
        if cmd.amount_minor <= 0 {
            return Err(ValidationError::InvalidAmount(cmd.amount_minor).into());
        }
        let description = normalize_name(&cmd.description)
            .ok_or(ValidationError::MissingField("description"))?;

        let entry = with_tx!(self, |db_tx| {
            if cmd.kind == PettyCashKind::Withdrawal {
                let balance = petty_cash_balance_on(&db_tx).await?;
                if balance < cmd.amount_minor {
                    return Err(EngineError::InsufficientFunds(format!(
                        "petty cash holds {balance}, {} requested",
                        cmd.amount_minor
                    )));
                }
            }
            let entry = PettyCashEntry {
                id: Uuid::new_v4(),
                kind: cmd.kind,
                amount_minor: cmd.amount_minor,
                description,
                occurred_at: cmd.occurred_at,
                created_by: ctx.actor_id(),
            };
            petty_cash::Entity::insert(petty_cash::ActiveModel {
                id: ActiveValue::Set(entry.id),
                kind: ActiveValue::Set(entry.kind.as_str().to_string()),
                amount_minor: ActiveValue::Set(entry.amount_minor),
                description: ActiveValue::Set(entry.description.clone()),
                occurred_at: ActiveValue::Set(entry.occurred_at),
                created_by: ActiveValue::Set(entry.created_by),
            })
            .exec_without_returning(&db_tx)
            .await?;
            record(
                &db_tx,
                ctx.actor_id(),
                AuditAction::PettyCashCreate,
                format!(
                    "Petty cash {} of {}: {}",
                    entry.kind.as_str(),
                    entry.amount_minor,
                    entry.description
                ),
            )
            .await?;
            Ok::<_, EngineError>(entry)
        })?;

        self.broadcaster.publish(ChangeEvent::new(
            EntityKind::PettyCash,
            ChangeAction::Create,
        ));
        Ok(entry)
    }

    /// With `require_funds`, refuse to spend more than the paid cash balance.
    pub(super) async fn ensure_funds(
        &self,
        db_tx: &DatabaseTransaction,
        amount_minor: i64,
    ) -> ResultEngine<()> {
        if !self.require_funds {
            return Ok(());
        }
        let balance = cash_balance_on(db_tx).await?;
        if balance < amount_minor {
            return Err(EngineError::InsufficientFunds(format!(
                "balance is {balance}, {amount_minor} needed"
            )));
        }
        Ok(())
    }

    pub(super) async fn insert_transaction(
        &self,
        db_tx: &DatabaseTransaction,
        entry: LedgerEntry,
    ) -> ResultEngine<Transaction> {
        let now = Utc::now();
        self.insert_transaction_at(db_tx, entry, now, now).await
    }

    async fn insert_transaction_at(
        &self,
        db_tx: &DatabaseTransaction,
        entry: LedgerEntry,
        occurred_at: DateTime<Utc>,
        due_at: DateTime<Utc>,
    ) -> ResultEngine<Transaction> {
        let transaction = Transaction {
            id: Uuid::new_v4(),
            kind: entry.kind,
            amount_minor: entry.amount_minor,
            cost_amount_minor: entry.cost_amount_minor,
            category: entry.category,
            description: entry.description,
            status: entry.status,
            client_name: entry.client_name,
            stock_movement_id: entry.stock_movement_id,
            service_order_id: entry.service_order_id,
            occurred_at,
            due_at,
            created_by: entry.created_by,
        };
        transactions::Entity::insert(transactions::ActiveModel {
            id: ActiveValue::Set(transaction.id),
            kind: ActiveValue::Set(transaction.kind.as_str().to_string()),
            amount_minor: ActiveValue::Set(transaction.amount_minor),
            cost_amount_minor: ActiveValue::Set(transaction.cost_amount_minor),
            category: ActiveValue::Set(transaction.category.clone()),
            description: ActiveValue::Set(transaction.description.clone()),
            status: ActiveValue::Set(transaction.status.as_str().to_string()),
            client_name: ActiveValue::Set(transaction.client_name.clone()),
            stock_movement_id: ActiveValue::Set(transaction.stock_movement_id),
            service_order_id: ActiveValue::Set(transaction.service_order_id),
            occurred_at: ActiveValue::Set(transaction.occurred_at),
            due_at: ActiveValue::Set(transaction.due_at),
            created_by: ActiveValue::Set(transaction.created_by),
        })
        .exec_without_returning(db_tx)
        .await?;
        Ok(transaction)
    }

    /// Rewrite the editable columns of an existing row.
    pub(super) async fn store_transaction(
        &self,
        db_tx: &DatabaseTransaction,
        transaction: &Transaction,
    ) -> ResultEngine<()> {
        transactions::Entity::update_many()
            .col_expr(
                transactions::Column::AmountMinor,
                Expr::value(transaction.amount_minor),
            )
            .col_expr(
                transactions::Column::Category,
                Expr::value(transaction.category.clone()),
            )
            .col_expr(
                transactions::Column::Description,
                Expr::value(transaction.description.clone()),
            )
            .col_expr(
                transactions::Column::Status,
                Expr::value(transaction.status.as_str()),
            )
            .col_expr(
                transactions::Column::ClientName,
                Expr::value(transaction.client_name.clone()),
            )
            .col_expr(transactions::Column::DueAt, Expr::value(transaction.due_at))
            .filter(transactions::Column::Id.eq(transaction.id))
            .exec(db_tx)
            .await?;
        Ok(())
    }

    async fn unsettled_transaction(
        &self,
        db_tx: &DatabaseTransaction,
        transaction_id: Uuid,
    ) -> ResultEngine<Transaction> {
        let transaction: Transaction = transactions::Entity::find_by_id(transaction_id)
            .one(db_tx)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound(format!("transaction {transaction_id}")))?
            .try_into()?;
        if transaction.status.is_settled() {
            return Err(EngineError::Conflict(format!(
                "transaction {transaction_id} is paid and can no longer change"
            )));
        }
        Ok(transaction)
    }
}

async fn cash_balance_on<C: ConnectionTrait>(db: &C) -> ResultEngine<i64> {
    let paid = transactions::Entity::find()
        .filter(transactions::Column::Status.eq(TransactionStatus::Paid.as_str()))
        .all(db)
        .await?;
    paid.into_iter().try_fold(0_i64, |balance, model| {
        let amount_minor = model.amount_minor;
        Ok(match Transaction::try_from(model)?.kind {
            TransactionKind::Income => balance.saturating_add(amount_minor),
            TransactionKind::Expense => balance.saturating_sub(amount_minor),
        })
    })
}

async fn petty_cash_balance_on<C: ConnectionTrait>(db: &C) -> ResultEngine<i64> {
    let entries = petty_cash::Entity::find().all(db).await?;
    entries.into_iter().try_fold(0_i64, |balance, model| {
        Ok(balance.saturating_add(PettyCashEntry::try_from(model)?.signed_amount()))
    })
}
