//! Repair service orders.

use chrono::Utc;
use sea_orm::{
    ActiveValue, ConnectionTrait, DatabaseTransaction, QueryFilter, QueryOrder, prelude::*,
    sea_query::Expr,
};
use uuid::Uuid;

use crate::{
    CATEGORY_REPAIR_SERVICE, ChangeAction, ChangeEvent, Direction, EngineError, EntityKind,
    ProductStatus, ResultEngine, ServiceChanges, ServiceDraft, ServiceOrder, ServicePart,
    ServiceStatus, StateView, Transaction, TransactionKind, TransactionStatus, ValidationError,
    service_orders, service_parts, transactions,
    util::{normalize_name, normalize_optional_text},
    validation::{line_total, stock_after},
};

use super::{Engine, ledger::LedgerEntry, live_product};

impl Engine {
    /// Service orders, newest first.
    pub async fn list_services(&self) -> ResultEngine<Vec<ServiceOrder>> {
        let orders = service_orders::Entity::find()
            .order_by_desc(service_orders::Column::CreatedAt)
            .find_with_related(service_parts::Entity)
            .all(&self.database)
            .await?;
        orders
            .into_iter()
            .map(|(order, parts)| {
                ServiceOrder::from_model(order, parts.into_iter().map(ServicePart::from).collect())
            })
            .collect()
    }

    pub async fn service(&self, service_id: Uuid) -> ResultEngine<ServiceOrder> {
        load_service(&self.database, service_id).await
    }

    pub(super) async fn create_service_in(
        &self,
        db_tx: &DatabaseTransaction,
        actor_id: Uuid,
        draft: &ServiceDraft,
        view: &StateView,
        events: &mut Vec<ChangeEvent>,
    ) -> ResultEngine<ServiceOrder> {
        let client_name = normalize_name(&draft.client_name)
            .ok_or(ValidationError::MissingField("client name"))?;
        let device_model = normalize_name(&draft.device_model)
            .ok_or(ValidationError::MissingField("device model"))?;
        let status = draft.status.unwrap_or(ServiceStatus::Pending);
        let now = Utc::now();

        // One write per product, even when the draft lists it twice.
        let mut wanted: Vec<(Uuid, i64)> = Vec::new();
        for part in &draft.parts {
            match wanted.iter_mut().find(|(id, _)| *id == part.product_id) {
                Some((_, quantity)) => {
                    *quantity = quantity
                        .checked_add(part.quantity)
                        .ok_or(ValidationError::TooLarge("part quantity"))?;
                }
                None => wanted.push((part.product_id, part.quantity)),
            }
        }

        let mut service = ServiceOrder {
            id: Uuid::new_v4(),
            client_name,
            client_phone: normalize_optional_text(draft.client_phone.as_deref()),
            device_model,
            description: normalize_optional_text(draft.description.as_deref()),
            status,
            price_minor: draft.price_minor,
            cost_minor: 0,
            parts: Vec::with_capacity(wanted.len()),
            created_at: now,
            delivered_at: (status == ServiceStatus::Delivered).then_some(now),
        };

        for (product_id, quantity) in wanted {
            let current = live_product(view, product_id)?;
            let mut product = current.clone();
            product.stock = stock_after(current.stock, Direction::Exit, quantity)?;
            product.status = ProductStatus::for_stock(product.stock);
            product.version = current.version + 1;
            self.store_product(db_tx, current.version, &product, false)
                .await?;
            self.append_movement(
                db_tx,
                product_id,
                actor_id,
                Direction::Exit,
                quantity,
                format!("Used in service: {}", service.ledger_description()),
            )
            .await?;
            service.cost_minor = line_total(current.cost_price_minor, quantity, "parts cost")?
                .checked_add(service.cost_minor)
                .ok_or(ValidationError::TooLarge("parts cost"))?;
            service.parts.push(ServicePart {
                product_id,
                quantity,
                unit_price_minor: current.price_minor,
                unit_cost_minor: current.cost_price_minor,
            });
        }
        if !service.parts.is_empty() {
            events.push(ChangeEvent::new(EntityKind::Products, ChangeAction::Adjust));
            events.push(ChangeEvent::new(
                EntityKind::StockMovements,
                ChangeAction::Create,
            ));
        }

        service_orders::Entity::insert(service_orders::ActiveModel {
            id: ActiveValue::Set(service.id),
            client_name: ActiveValue::Set(service.client_name.clone()),
            client_phone: ActiveValue::Set(service.client_phone.clone()),
            device_model: ActiveValue::Set(service.device_model.clone()),
            description: ActiveValue::Set(service.description.clone()),
            status: ActiveValue::Set(service.status.as_str().to_string()),
            price_minor: ActiveValue::Set(service.price_minor),
            cost_minor: ActiveValue::Set(service.cost_minor),
            created_at: ActiveValue::Set(service.created_at),
            delivered_at: ActiveValue::Set(service.delivered_at),
        })
        .exec_without_returning(db_tx)
        .await?;
        if !service.parts.is_empty() {
            let rows = service.parts.iter().map(|part| service_parts::ActiveModel {
                id: ActiveValue::Set(Uuid::new_v4()),
                service_order_id: ActiveValue::Set(service.id),
                product_id: ActiveValue::Set(part.product_id),
                quantity: ActiveValue::Set(part.quantity),
                unit_price_minor: ActiveValue::Set(part.unit_price_minor),
                unit_cost_minor: ActiveValue::Set(part.unit_cost_minor),
            });
            service_parts::Entity::insert_many(rows)
                .exec_without_returning(db_tx)
                .await?;
        }
        events.push(ChangeEvent::new(EntityKind::Services, ChangeAction::Create));

        if service.price_minor > 0 {
            self.insert_service_income(db_tx, actor_id, &service).await?;
            events.push(ChangeEvent::new(
                EntityKind::Transactions,
                ChangeAction::Create,
            ));
        }

        Ok(service)
    }

    pub(super) async fn update_service_in(
        &self,
        db_tx: &DatabaseTransaction,
        actor_id: Uuid,
        service_id: Uuid,
        changes: &ServiceChanges,
        events: &mut Vec<ChangeEvent>,
    ) -> ResultEngine<ServiceOrder> {
        let mut service = load_service(db_tx, service_id).await?;
        if let Some(client_name) = &changes.client_name {
            service.client_name = normalize_name(client_name)
                .ok_or(ValidationError::MissingField("client name"))?;
        }
        if let Some(client_phone) = &changes.client_phone {
            service.client_phone = normalize_optional_text(Some(client_phone));
        }
        if let Some(device_model) = &changes.device_model {
            service.device_model = normalize_name(device_model)
                .ok_or(ValidationError::MissingField("device model"))?;
        }
        if let Some(description) = &changes.description {
            service.description = normalize_optional_text(Some(description));
        }
        if let Some(price_minor) = changes.price_minor {
            service.price_minor = price_minor;
        }

        service_orders::Entity::update_many()
            .col_expr(
                service_orders::Column::ClientName,
                Expr::value(service.client_name.clone()),
            )
            .col_expr(
                service_orders::Column::ClientPhone,
                Expr::value(service.client_phone.clone()),
            )
            .col_expr(
                service_orders::Column::DeviceModel,
                Expr::value(service.device_model.clone()),
            )
            .col_expr(
                service_orders::Column::Description,
                Expr::value(service.description.clone()),
            )
            .col_expr(
                service_orders::Column::PriceMinor,
                Expr::value(service.price_minor),
            )
            .filter(service_orders::Column::Id.eq(service_id))
            .exec(db_tx)
            .await?;
        events.push(ChangeEvent::new(EntityKind::Services, ChangeAction::Update));

        // Keep the unpaid income in step with the order it bills. A paid
        // income keeps what was charged.
        match self.service_income(db_tx, service_id).await? {
            Some(income) if income.status.is_settled() => {}
            Some(income) if service.price_minor == 0 => {
                transactions::Entity::delete_by_id(income.id)
                    .exec(db_tx)
                    .await?;
                events.push(ChangeEvent::new(
                    EntityKind::Transactions,
                    ChangeAction::Delete,
                ));
            }
            Some(mut income) => {
                income.amount_minor = service.price_minor;
                income.client_name = Some(service.client_name.clone());
                income.description = service.ledger_description();
                self.store_transaction(db_tx, &income).await?;
                events.push(ChangeEvent::new(
                    EntityKind::Transactions,
                    ChangeAction::Update,
                ));
            }
            None if service.price_minor > 0 => {
                self.insert_service_income(db_tx, actor_id, &service).await?;
                events.push(ChangeEvent::new(
                    EntityKind::Transactions,
                    ChangeAction::Create,
                ));
            }
            None => {}
        }

        Ok(service)
    }

    pub(super) async fn update_service_status_in(
        &self,
        db_tx: &DatabaseTransaction,
        service_id: Uuid,
        status: ServiceStatus,
        events: &mut Vec<ChangeEvent>,
    ) -> ResultEngine<ServiceOrder> {
        let mut service = load_service(db_tx, service_id).await?;
        if service.status.is_terminal() {
            return Err(ValidationError::InvalidTransition {
                from: service.status,
                to: status,
            }
            .into());
        }
        service.status = status;
        if status == ServiceStatus::Delivered {
            service.delivered_at = Some(Utc::now());
        }
        service_orders::Entity::update_many()
            .col_expr(
                service_orders::Column::Status,
                Expr::value(service.status.as_str()),
            )
            .col_expr(
                service_orders::Column::DeliveredAt,
                Expr::value(service.delivered_at),
            )
            .filter(service_orders::Column::Id.eq(service_id))
            .exec(db_tx)
            .await?;
        events.push(ChangeEvent::new(EntityKind::Services, ChangeAction::Update));

        // Delivery is when the repair gets paid.
        if status == ServiceStatus::Delivered
            && let Some(income) = self.service_income(db_tx, service_id).await?
            && !income.status.is_settled()
        {
            transactions::Entity::update_many()
                .col_expr(
                    transactions::Column::Status,
                    Expr::value(TransactionStatus::Paid.as_str()),
                )
                .col_expr(transactions::Column::OccurredAt, Expr::value(Utc::now()))
                .filter(transactions::Column::Id.eq(income.id))
                .exec(db_tx)
                .await?;
            events.push(ChangeEvent::new(
                EntityKind::Transactions,
                ChangeAction::Update,
            ));
        }

        Ok(service)
    }

    pub(super) async fn delete_service_in(
        &self,
        db_tx: &DatabaseTransaction,
        service_id: Uuid,
        events: &mut Vec<ChangeEvent>,
    ) -> ResultEngine<ServiceOrder> {
        let service = load_service(db_tx, service_id).await?;
        if let Some(income) = self.service_income(db_tx, service_id).await?
            && !income.status.is_settled()
        {
            transactions::Entity::delete_by_id(income.id)
                .exec(db_tx)
                .await?;
            events.push(ChangeEvent::new(
                EntityKind::Transactions,
                ChangeAction::Delete,
            ));
        }
        service_parts::Entity::delete_many()
            .filter(service_parts::Column::ServiceOrderId.eq(service_id))
            .exec(db_tx)
            .await?;
        let result = service_orders::Entity::delete_by_id(service_id)
            .exec(db_tx)
            .await?;
        if result.rows_affected == 0 {
            return Err(EngineError::KeyNotFound(format!("service {service_id}")));
        }
        events.push(ChangeEvent::new(EntityKind::Services, ChangeAction::Delete));
        Ok(service)
    }

    async fn insert_service_income(
        &self,
        db_tx: &DatabaseTransaction,
        created_by: Uuid,
        service: &ServiceOrder,
    ) -> ResultEngine<Transaction> {
        let status = if service.status == ServiceStatus::Delivered {
            TransactionStatus::Paid
        } else {
            TransactionStatus::Pending
        };
        self.insert_transaction(
            db_tx,
            LedgerEntry {
                kind: TransactionKind::Income,
                amount_minor: service.price_minor,
                cost_amount_minor: service.cost_minor,
                category: CATEGORY_REPAIR_SERVICE.to_string(),
                description: service.ledger_description(),
                status,
                client_name: Some(service.client_name.clone()),
                stock_movement_id: None,
                service_order_id: Some(service.id),
                created_by,
            },
        )
        .await
    }

    async fn service_income(
        &self,
        db_tx: &DatabaseTransaction,
        service_id: Uuid,
    ) -> ResultEngine<Option<Transaction>> {
        transactions::Entity::find()
            .filter(transactions::Column::ServiceOrderId.eq(service_id))
            .one(db_tx)
            .await?
            .map(Transaction::try_from)
            .transpose()
    }
}

async fn load_service<C: ConnectionTrait>(db: &C, service_id: Uuid) -> ResultEngine<ServiceOrder> {
    let order = service_orders::Entity::find_by_id(service_id)
        .one(db)
        .await?
        .ok_or_else(|| EngineError::KeyNotFound(format!("service {service_id}")))?;
    let parts = service_parts::Entity::find()
        .filter(service_parts::Column::ServiceOrderId.eq(service_id))
        .all(db)
        .await?
        .into_iter()
        .map(ServicePart::from)
        .collect();
    ServiceOrder::from_model(order, parts)
}
