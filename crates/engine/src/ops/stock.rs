//! Products and stock adjustments.
//!
//! Every stock change goes through `store_product`, a compare-and-swap on
//! `products.version`, and writes one movement row in the same DB
//! transaction. Financial adjustments also write one linked ledger row.

use chrono::Utc;
use sea_orm::{
    ActiveValue, DatabaseTransaction, QueryFilter, QueryOrder, QuerySelect, prelude::*,
    sea_query::Expr,
};
use uuid::Uuid;

use crate::{
    ActorContext, CATEGORY_PRODUCT_SALE, CATEGORY_STOCK_PURCHASE, ChangeAction, ChangeEvent,
    DEFAULT_MIN_STOCK, Direction, EngineError, EntityKind, MovementListFilter, Mutation,
    MutationOutcome, Product, ProductChanges, ProductDraft, ProductStatus, ResultEngine,
    StockAdjustment, StockMovement, TransactionKind, TransactionStatus, ValidationError, products,
    stock_movements,
    util::{normalize_name, normalize_optional_text},
    validation::{line_total, stock_after},
};

use super::{Engine, ledger::LedgerEntry};

impl Engine {
    /// Apply a stock adjustment, or propose it when the actor lacks authority.
    pub async fn adjust_stock(
        &self,
        ctx: &ActorContext,
        adjustment: StockAdjustment,
    ) -> ResultEngine<MutationOutcome> {
        self.submit(ctx, Mutation::AdjustStock(adjustment)).await
    }

    /// Sell one unit and book the income.
    pub async fn quick_sell(
        &self,
        ctx: &ActorContext,
        product_id: Uuid,
        reason: Option<String>,
    ) -> ResultEngine<MutationOutcome> {
        self.adjust_stock(ctx, StockAdjustment::quick_sell(product_id, reason))
            .await
    }

    /// Live products, by name.
    pub async fn list_products(&self) -> ResultEngine<Vec<Product>> {
        products::Entity::find()
            .filter(products::Column::Deleted.eq(false))
            .order_by_asc(products::Column::Name)
            .all(&self.database)
            .await?
            .into_iter()
            .map(Product::try_from)
            .collect()
    }

    pub async fn product(&self, product_id: Uuid) -> ResultEngine<Product> {
        products::Entity::find_by_id(product_id)
            .filter(products::Column::Deleted.eq(false))
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound(format!("product {product_id}")))?
            .try_into()
    }

    /// The movement log, newest first.
    pub async fn list_stock_movements(
        &self,
        filter: MovementListFilter,
    ) -> ResultEngine<Vec<StockMovement>> {
        let mut query =
            stock_movements::Entity::find().order_by_desc(stock_movements::Column::OccurredAt);
        if let Some(product_id) = filter.product_id {
            query = query.filter(stock_movements::Column::ProductId.eq(product_id));
        }
        if let Some(limit) = filter.limit {
            query = query.limit(limit);
        }
        query
            .all(&self.database)
            .await?
            .into_iter()
            .map(StockMovement::try_from)
            .collect()
    }

    pub(super) async fn create_product_in(
        &self,
        db_tx: &DatabaseTransaction,
        actor_id: Uuid,
        draft: &ProductDraft,
        events: &mut Vec<ChangeEvent>,
    ) -> ResultEngine<Product> {
        let name = normalize_name(&draft.name).ok_or(ValidationError::MissingField("name"))?;
        let price_minor = draft
            .price_minor
            .ok_or(ValidationError::MissingField("price"))?;
        let investment = line_total(draft.cost_price_minor, draft.stock, "initial investment")?;
        if investment > 0 {
            self.ensure_funds(db_tx, investment).await?;
        }

        let product = Product {
            id: Uuid::new_v4(),
            name,
            category: normalize_optional_text(draft.category.as_deref()),
            price_minor,
            cost_price_minor: draft.cost_price_minor,
            stock: draft.stock,
            min_stock: draft.min_stock.unwrap_or(DEFAULT_MIN_STOCK),
            status: ProductStatus::for_stock(draft.stock),
            version: 0,
            created_at: Utc::now(),
        };
        products::Entity::insert(products::ActiveModel {
            id: ActiveValue::Set(product.id),
            name: ActiveValue::Set(product.name.clone()),
            category: ActiveValue::Set(product.category.clone()),
            price_minor: ActiveValue::Set(product.price_minor),
            cost_price_minor: ActiveValue::Set(product.cost_price_minor),
            stock: ActiveValue::Set(product.stock),
            min_stock: ActiveValue::Set(product.min_stock),
            status: ActiveValue::Set(product.status.as_str().to_string()),
            version: ActiveValue::Set(product.version),
            deleted: ActiveValue::Set(false),
            created_at: ActiveValue::Set(product.created_at),
        })
        .exec_without_returning(db_tx)
        .await?;
        events.push(ChangeEvent::new(EntityKind::Products, ChangeAction::Create));

        if product.stock > 0 {
            let movement = self
                .append_movement(
                    db_tx,
                    product.id,
                    actor_id,
                    Direction::Entry,
                    product.stock,
                    "Initial stock".to_string(),
                )
                .await?;
            events.push(ChangeEvent::new(
                EntityKind::StockMovements,
                ChangeAction::Create,
            ));

            if investment > 0 {
                self.insert_transaction(
                    db_tx,
                    LedgerEntry {
                        kind: TransactionKind::Expense,
                        amount_minor: investment,
                        cost_amount_minor: 0,
                        category: CATEGORY_STOCK_PURCHASE.to_string(),
                        description: format!(
                            "Initial investment: {} ({} un)",
                            product.name, product.stock
                        ),
                        status: TransactionStatus::Paid,
                        client_name: None,
                        stock_movement_id: Some(movement.id),
                        service_order_id: None,
                        created_by: actor_id,
                    },
                )
                .await?;
                events.push(ChangeEvent::new(
                    EntityKind::Transactions,
                    ChangeAction::Create,
                ));
            }
        }

        Ok(product)
    }

    pub(super) async fn update_product_in(
        &self,
        db_tx: &DatabaseTransaction,
        actor_id: Uuid,
        current: Product,
        changes: &ProductChanges,
        events: &mut Vec<ChangeEvent>,
    ) -> ResultEngine<Product> {
        check_version(&current, changes.expected_version)?;

        let mut product = current.clone();
        if let Some(name) = &changes.name {
            product.name = normalize_name(name).ok_or(ValidationError::MissingField("name"))?;
        }
        if let Some(category) = &changes.category {
            product.category = normalize_optional_text(Some(category));
        }
        if let Some(price_minor) = changes.price_minor {
            product.price_minor = price_minor;
        }
        if let Some(cost_price_minor) = changes.cost_price_minor {
            product.cost_price_minor = cost_price_minor;
        }
        if let Some(min_stock) = changes.min_stock {
            product.min_stock = min_stock;
        }
        if let Some(stock) = changes.stock {
            product.stock = stock;
        }
        product.status = ProductStatus::for_stock(product.stock);
        product.version = current.version + 1;

        self.store_product(db_tx, current.version, &product, false)
            .await?;
        events.push(ChangeEvent::new(EntityKind::Products, ChangeAction::Update));

        // Stock edited by hand is still explained by a movement, never by money.
        let delta = product.stock - current.stock;
        if delta != 0 {
            let direction = if delta > 0 {
                Direction::Entry
            } else {
                Direction::Exit
            };
            let reason = normalize_optional_text(changes.reason.as_deref())
                .unwrap_or_else(|| "Product edit".to_string());
            self.append_movement(db_tx, product.id, actor_id, direction, delta.abs(), reason)
                .await?;
            events.push(ChangeEvent::new(
                EntityKind::StockMovements,
                ChangeAction::Create,
            ));
        }

        Ok(product)
    }

    pub(super) async fn delete_product_in(
        &self,
        db_tx: &DatabaseTransaction,
        current: Product,
        expected_version: Option<i64>,
        events: &mut Vec<ChangeEvent>,
    ) -> ResultEngine<()> {
        check_version(&current, expected_version)?;
        let mut product = current.clone();
        product.version = current.version + 1;
        self.store_product(db_tx, current.version, &product, true)
            .await?;
        events.push(ChangeEvent::new(EntityKind::Products, ChangeAction::Delete));
        Ok(())
    }

    pub(super) async fn adjust_stock_in(
        &self,
        db_tx: &DatabaseTransaction,
        actor_id: Uuid,
        current: Product,
        adjustment: &StockAdjustment,
        events: &mut Vec<ChangeEvent>,
    ) -> ResultEngine<Product> {
        check_version(&current, adjustment.expected_version)?;

        let quantity = adjustment.quantity;
        let ledger = match (adjustment.is_financial, adjustment.direction) {
            (false, _) => None,
            (true, Direction::Exit) => Some((
                TransactionKind::Income,
                line_total(current.price_minor, quantity, "sale amount")?,
                line_total(current.cost_price_minor, quantity, "sale cost")?,
                CATEGORY_PRODUCT_SALE,
                format!("Sale: {} ({quantity} un)", current.name),
            )),
            (true, Direction::Entry) => Some((
                TransactionKind::Expense,
                line_total(
                    adjustment
                        .unit_cost_minor
                        .unwrap_or(current.cost_price_minor),
                    quantity,
                    "purchase amount",
                )?,
                0,
                CATEGORY_STOCK_PURCHASE,
                format!("Restock: {} ({quantity} un)", current.name),
            )),
        };
        if let Some((TransactionKind::Expense, amount_minor, ..)) = &ledger
            && *amount_minor > 0
        {
            self.ensure_funds(db_tx, *amount_minor).await?;
        }

        let mut product = current.clone();
        product.stock = stock_after(current.stock, adjustment.direction, quantity)?;
        product.status = ProductStatus::for_stock(product.stock);
        product.version = current.version + 1;
        self.store_product(db_tx, current.version, &product, false)
            .await?;
        events.push(ChangeEvent::new(EntityKind::Products, ChangeAction::Adjust));

        let reason = normalize_optional_text(adjustment.reason.as_deref()).unwrap_or_else(|| {
            match adjustment.direction {
                Direction::Entry => "Manual adjustment (+)".to_string(),
                Direction::Exit => "Manual adjustment (-)".to_string(),
            }
        });
        let movement = self
            .append_movement(
                db_tx,
                product.id,
                actor_id,
                adjustment.direction,
                quantity,
                reason,
            )
            .await?;
        events.push(ChangeEvent::new(
            EntityKind::StockMovements,
            ChangeAction::Create,
        ));

        if let Some((kind, amount_minor, cost_amount_minor, category, description)) = ledger {
            self.insert_transaction(
                db_tx,
                LedgerEntry {
                    kind,
                    amount_minor,
                    cost_amount_minor,
                    category: category.to_string(),
                    description,
                    status: TransactionStatus::Paid,
                    client_name: None,
                    stock_movement_id: Some(movement.id),
                    service_order_id: None,
                    created_by: actor_id,
                },
            )
            .await?;
            events.push(ChangeEvent::new(
                EntityKind::Transactions,
                ChangeAction::Create,
            ));
        }

        tracing::info!(
            product_id = %product.id,
            direction = adjustment.direction.as_str(),
            quantity,
            stock = product.stock,
            financial = adjustment.is_financial,
            "stock adjusted"
        );
        Ok(product)
    }

    /// Compare-and-swap write of every mutable product column.
    ///
    /// Fails with `StaleWrite` when the row is no longer at
    /// `previous_version`, which makes the caller start over from a fresh read.
    pub(super) async fn store_product(
        &self,
        db_tx: &DatabaseTransaction,
        previous_version: i64,
        product: &Product,
        deleted: bool,
    ) -> ResultEngine<()> {
        let result = products::Entity::update_many()
            .col_expr(products::Column::Name, Expr::value(product.name.clone()))
            .col_expr(
                products::Column::Category,
                Expr::value(product.category.clone()),
            )
            .col_expr(products::Column::PriceMinor, Expr::value(product.price_minor))
            .col_expr(
                products::Column::CostPriceMinor,
                Expr::value(product.cost_price_minor),
            )
            .col_expr(products::Column::Stock, Expr::value(product.stock))
            .col_expr(products::Column::MinStock, Expr::value(product.min_stock))
            .col_expr(
                products::Column::Status,
                Expr::value(product.status.as_str()),
            )
            .col_expr(products::Column::Version, Expr::value(product.version))
            .col_expr(products::Column::Deleted, Expr::value(deleted))
            .filter(products::Column::Id.eq(product.id))
            .filter(products::Column::Version.eq(previous_version))
            .filter(products::Column::Deleted.eq(false))
            .exec(db_tx)
            .await?;
        if result.rows_affected == 0 {
            return Err(EngineError::StaleWrite(format!("product {}", product.id)));
        }
        Ok(())
    }

    pub(super) async fn append_movement(
        &self,
        db_tx: &DatabaseTransaction,
        product_id: Uuid,
        actor_id: Uuid,
        direction: Direction,
        quantity: i64,
        reason: String,
    ) -> ResultEngine<StockMovement> {
        let movement = StockMovement {
            id: Uuid::new_v4(),
            product_id,
            actor_id,
            direction,
            quantity,
            reason,
            occurred_at: Utc::now(),
        };
        stock_movements::Entity::insert(stock_movements::ActiveModel {
            id: ActiveValue::Set(movement.id),
            product_id: ActiveValue::Set(movement.product_id),
            actor_id: ActiveValue::Set(movement.actor_id),
            direction: ActiveValue::Set(movement.direction.as_str().to_string()),
            quantity: ActiveValue::Set(movement.quantity),
            reason: ActiveValue::Set(movement.reason.clone()),
            occurred_at: ActiveValue::Set(movement.occurred_at),
        })
        .exec_without_returning(db_tx)
        .await?;
        Ok(movement)
    }
}

/// A caller that read the product at some version may only write over that version.
fn check_version(product: &Product, expected: Option<i64>) -> ResultEngine<()> {
    match expected {
        Some(version) if version != product.version => Err(EngineError::Conflict(format!(
            "product {} changed since it was read (version {version}, now {})",
            product.name, product.version
        ))),
        _ => Ok(()),
    }
}
