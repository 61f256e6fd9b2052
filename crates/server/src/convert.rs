//! Mapping between engine types and their wire form.

use api_types::{
    audit as api_audit, event as api_event,
    outcome::{Applied as ApiApplied, MutationResponse},
    permission as api_permission,
    petty_cash as api_petty_cash,
    product as api_product,
    service as api_service,
    stock as api_stock,
    transaction as api_transaction,
};
use axum::{Json, http::StatusCode};

pub fn product(product: engine::Product) -> api_product::Product {
    api_product::Product {
        low_stock: product.is_low_stock(),
        id: product.id,
        name: product.name,
        category: product.category,
        price_minor: product.price_minor,
        cost_price_minor: product.cost_price_minor,
        stock: product.stock,
        min_stock: product.min_stock,
        status: match product.status {
            engine::ProductStatus::Active => api_product::ProductStatus::Active,
            engine::ProductStatus::OutOfStock => api_product::ProductStatus::OutOfStock,
        },
        version: product.version,
        created_at: product.created_at,
    }
}

fn direction(direction: api_stock::Direction) -> engine::Direction {
    match direction {
        api_stock::Direction::Entry => engine::Direction::Entry,
        api_stock::Direction::Exit => engine::Direction::Exit,
    }
}

fn map_direction(direction: engine::Direction) -> api_stock::Direction {
    match direction {
        engine::Direction::Entry => api_stock::Direction::Entry,
        engine::Direction::Exit => api_stock::Direction::Exit,
    }
}

pub fn movement(movement: engine::StockMovement) -> api_stock::StockMovement {
    api_stock::StockMovement {
        id: movement.id,
        product_id: movement.product_id,
        actor_id: movement.actor_id,
        direction: map_direction(movement.direction),
        quantity: movement.quantity,
        reason: movement.reason,
        occurred_at: movement.occurred_at,
    }
}

pub fn transaction_kind(kind: api_transaction::TransactionKind) -> engine::TransactionKind {
    match kind {
        api_transaction::TransactionKind::Income => engine::TransactionKind::Income,
        api_transaction::TransactionKind::Expense => engine::TransactionKind::Expense,
    }
}

pub fn transaction_status(status: api_transaction::TransactionStatus) -> engine::TransactionStatus {
    match status {
        api_transaction::TransactionStatus::Paid => engine::TransactionStatus::Paid,
        api_transaction::TransactionStatus::Pending => engine::TransactionStatus::Pending,
        api_transaction::TransactionStatus::Overdue => engine::TransactionStatus::Overdue,
    }
}

pub fn transaction(transaction: engine::Transaction) -> api_transaction::Transaction {
    api_transaction::Transaction {
        id: transaction.id,
        kind: match transaction.kind {
            engine::TransactionKind::Income => api_transaction::TransactionKind::Income,
            engine::TransactionKind::Expense => api_transaction::TransactionKind::Expense,
        },
        amount_minor: transaction.amount_minor,
        cost_amount_minor: transaction.cost_amount_minor,
        category: transaction.category,
        description: transaction.description,
        status: match transaction.status {
            engine::TransactionStatus::Paid => api_transaction::TransactionStatus::Paid,
            engine::TransactionStatus::Pending => api_transaction::TransactionStatus::Pending,
            engine::TransactionStatus::Overdue => api_transaction::TransactionStatus::Overdue,
        },
        client_name: transaction.client_name,
        stock_movement_id: transaction.stock_movement_id,
        service_order_id: transaction.service_order_id,
        occurred_at: transaction.occurred_at,
        due_at: transaction.due_at,
        created_by: transaction.created_by,
    }
}

pub fn audit_category(category: api_audit::AuditCategory) -> engine::AuditCategory {
    match category {
        api_audit::AuditCategory::Inventory => engine::AuditCategory::Inventory,
        api_audit::AuditCategory::Services => engine::AuditCategory::Services,
        api_audit::AuditCategory::Finance => engine::AuditCategory::Finance,
        api_audit::AuditCategory::System => engine::AuditCategory::System,
    }
}

pub fn audit_entry(entry: engine::AuditEntry) -> api_audit::AuditEntry {
    use api_audit::AuditAction as W;
    use engine::AuditAction as A;

    api_audit::AuditEntry {
        id: entry.id,
        actor_id: entry.actor_id,
        action: match entry.action {
            A::ProductCreate => W::ProductCreate,
            A::ProductUpdate => W::ProductUpdate,
            A::ProductDelete => W::ProductDelete,
            A::StockAdjust => W::StockAdjust,
            A::ServiceCreate => W::ServiceCreate,
            A::ServiceUpdate => W::ServiceUpdate,
            A::ServiceStatus => W::ServiceStatus,
            A::ServiceDelete => W::ServiceDelete,
            A::PermissionRequest => W::PermissionRequest,
            A::PermissionApproved => W::PermissionApproved,
            A::PermissionRejected => W::PermissionRejected,
            A::PermissionWithdrawn => W::PermissionWithdrawn,
            A::FinanceCreate => W::FinanceCreate,
            A::FinanceUpdate => W::FinanceUpdate,
            A::FinanceDelete => W::FinanceDelete,
            A::PettyCashCreate => W::PettyCashCreate,
        },
        category: match entry.category {
            engine::AuditCategory::Inventory => api_audit::AuditCategory::Inventory,
            engine::AuditCategory::Services => api_audit::AuditCategory::Services,
            engine::AuditCategory::Finance => api_audit::AuditCategory::Finance,
            engine::AuditCategory::System => api_audit::AuditCategory::System,
        },
        details: entry.details,
        occurred_at: entry.occurred_at,
    }
}

pub fn petty_cash_kind(kind: api_petty_cash::PettyCashKind) -> engine::PettyCashKind {
    match kind {
        api_petty_cash::PettyCashKind::Deposit => engine::PettyCashKind::Deposit,
        api_petty_cash::PettyCashKind::Withdrawal => engine::PettyCashKind::Withdrawal,
    }
}

pub fn petty_cash_entry(entry: engine::PettyCashEntry) -> api_petty_cash::PettyCashEntry {
    api_petty_cash::PettyCashEntry {
        id: entry.id,
        kind: match entry.kind {
            engine::PettyCashKind::Deposit => api_petty_cash::PettyCashKind::Deposit,
            engine::PettyCashKind::Withdrawal => api_petty_cash::PettyCashKind::Withdrawal,
        },
        amount_minor: entry.amount_minor,
        description: entry.description,
        occurred_at: entry.occurred_at,
        created_by: entry.created_by,
    }
}

pub fn service_status(status: api_service::ServiceStatus) -> engine::ServiceStatus {
    match status {
        api_service::ServiceStatus::Pending => engine::ServiceStatus::Pending,
        api_service::ServiceStatus::InProgress => engine::ServiceStatus::InProgress,
        api_service::ServiceStatus::Completed => engine::ServiceStatus::Completed,
        api_service::ServiceStatus::Delivered => engine::ServiceStatus::Delivered,
        api_service::ServiceStatus::Cancelled => engine::ServiceStatus::Cancelled,
    }
}

fn map_service_status(status: engine::ServiceStatus) -> api_service::ServiceStatus {
    match status {
        engine::ServiceStatus::Pending => api_service::ServiceStatus::Pending,
        engine::ServiceStatus::InProgress => api_service::ServiceStatus::InProgress,
        engine::ServiceStatus::Completed => api_service::ServiceStatus::Completed,
        engine::ServiceStatus::Delivered => api_service::ServiceStatus::Delivered,
        engine::ServiceStatus::Cancelled => api_service::ServiceStatus::Cancelled,
    }
}

pub fn service(service: engine::ServiceOrder) -> api_service::Service {
    api_service::Service {
        id: service.id,
        client_name: service.client_name,
        client_phone: service.client_phone,
        device_model: service.device_model,
        description: service.description,
        status: map_service_status(service.status),
        price_minor: service.price_minor,
        cost_minor: service.cost_minor,
        parts: service
            .parts
            .into_iter()
            .map(|part| api_service::ServicePart {
                product_id: part.product_id,
                quantity: part.quantity,
                unit_price_minor: part.unit_price_minor,
                unit_cost_minor: part.unit_cost_minor,
            })
            .collect(),
        created_at: service.created_at,
        delivered_at: service.delivered_at,
    }
}

pub fn product_draft(new: api_product::ProductNew) -> engine::ProductDraft {
    engine::ProductDraft {
        name: new.name,
        category: new.category,
        price_minor: new.price_minor,
        cost_price_minor: new.cost_price_minor,
        stock: new.stock,
        min_stock: new.min_stock,
    }
}

pub fn product_changes(patch: api_product::ProductPatch) -> engine::ProductChanges {
    engine::ProductChanges {
        name: patch.name,
        category: patch.category,
        price_minor: patch.price_minor,
        cost_price_minor: patch.cost_price_minor,
        stock: patch.stock,
        min_stock: patch.min_stock,
        reason: patch.reason,
        expected_version: patch.expected_version,
    }
}

pub fn adjustment(adjust: api_stock::AdjustStock) -> engine::StockAdjustment {
    engine::StockAdjustment {
        product_id: adjust.product_id,
        direction: direction(adjust.direction),
        quantity: adjust.quantity,
        reason: adjust.reason,
        is_financial: adjust.is_financial,
        unit_cost_minor: adjust.unit_cost_minor,
        expected_version: adjust.expected_version,
    }
}

fn map_adjustment(adjustment: engine::StockAdjustment) -> api_stock::AdjustStock {
    api_stock::AdjustStock {
        product_id: adjustment.product_id,
        direction: map_direction(adjustment.direction),
        quantity: adjustment.quantity,
        reason: adjustment.reason,
        is_financial: adjustment.is_financial,
        unit_cost_minor: adjustment.unit_cost_minor,
        expected_version: adjustment.expected_version,
    }
}

pub fn service_draft(new: api_service::ServiceNew) -> engine::ServiceDraft {
    engine::ServiceDraft {
        client_name: new.client_name,
        client_phone: new.client_phone,
        device_model: new.device_model,
        description: new.description,
        price_minor: new.price_minor,
        status: new.status.map(service_status),
        parts: new
            .parts
            .into_iter()
            .map(|part| engine::PartRequest {
                product_id: part.product_id,
                quantity: part.quantity,
            })
            .collect(),
    }
}

pub fn service_changes(patch: api_service::ServicePatch) -> engine::ServiceChanges {
    engine::ServiceChanges {
        client_name: patch.client_name,
        client_phone: patch.client_phone,
        device_model: patch.device_model,
        description: patch.description,
        price_minor: patch.price_minor,
    }
}

pub fn mutation(mutation: api_permission::Mutation) -> engine::Mutation {
    use api_permission::Mutation as Api;

    match mutation {
        Api::CreateProduct(new) => engine::Mutation::CreateProduct(product_draft(new)),
        Api::UpdateProduct {
            product_id,
            changes,
        } => engine::Mutation::UpdateProduct {
            product_id,
            changes: product_changes(changes),
        },
        Api::DeleteProduct {
            product_id,
            expected_version,
        } => engine::Mutation::DeleteProduct {
            product_id,
            expected_version,
        },
        Api::AdjustStock(adjust) => engine::Mutation::AdjustStock(adjustment(adjust)),
        Api::CreateService(new) => engine::Mutation::CreateService(service_draft(new)),
        Api::UpdateService {
            service_id,
            changes,
        } => engine::Mutation::UpdateService {
            service_id,
            changes: service_changes(changes),
        },
        Api::DeleteService { service_id } => engine::Mutation::DeleteService { service_id },
        Api::UpdateServiceStatus { service_id, status } => {
            engine::Mutation::UpdateServiceStatus {
                service_id,
                status: service_status(status),
            }
        }
    }
}

fn map_mutation(mutation: engine::Mutation) -> api_permission::Mutation {
    use api_permission::Mutation as Api;

    match mutation {
        engine::Mutation::CreateProduct(draft) => Api::CreateProduct(api_product::ProductNew {
            name: draft.name,
            category: draft.category,
            price_minor: draft.price_minor,
            cost_price_minor: draft.cost_price_minor,
            stock: draft.stock,
            min_stock: draft.min_stock,
        }),
        engine::Mutation::UpdateProduct {
            product_id,
            changes,
        } => Api::UpdateProduct {
            product_id,
            changes: api_product::ProductPatch {
                name: changes.name,
                category: changes.category,
                price_minor: changes.price_minor,
                cost_price_minor: changes.cost_price_minor,
                stock: changes.stock,
                min_stock: changes.min_stock,
                reason: changes.reason,
                expected_version: changes.expected_version,
            },
        },
        engine::Mutation::DeleteProduct {
            product_id,
            expected_version,
        } => Api::DeleteProduct {
            product_id,
            expected_version,
        },
        engine::Mutation::AdjustStock(adjustment) => Api::AdjustStock(map_adjustment(adjustment)),
        engine::Mutation::CreateService(draft) => Api::CreateService(api_service::ServiceNew {
            client_name: draft.client_name,
            client_phone: draft.client_phone,
            device_model: draft.device_model,
            description: draft.description,
            price_minor: draft.price_minor,
            status: draft.status.map(map_service_status),
            parts: draft
                .parts
                .into_iter()
                .map(|part| api_service::PartRequest {
                    product_id: part.product_id,
                    quantity: part.quantity,
                })
                .collect(),
        }),
        engine::Mutation::UpdateService {
            service_id,
            changes,
        } => Api::UpdateService {
            service_id,
            changes: api_service::ServicePatch {
                client_name: changes.client_name,
                client_phone: changes.client_phone,
                device_model: changes.device_model,
                description: changes.description,
                price_minor: changes.price_minor,
            },
        },
        engine::Mutation::DeleteService { service_id } => Api::DeleteService { service_id },
        engine::Mutation::UpdateServiceStatus { service_id, status } => Api::UpdateServiceStatus {
            service_id,
            status: map_service_status(status),
        },
    }
}

pub fn request_status(status: api_permission::RequestStatus) -> engine::RequestStatus {
    match status {
        api_permission::RequestStatus::Pending => engine::RequestStatus::Pending,
        api_permission::RequestStatus::Approved => engine::RequestStatus::Approved,
        api_permission::RequestStatus::Rejected => engine::RequestStatus::Rejected,
        api_permission::RequestStatus::Withdrawn => engine::RequestStatus::Withdrawn,
    }
}

pub fn decision(decision: api_permission::Decision) -> engine::Decision {
    match decision {
        api_permission::Decision::Approved => engine::Decision::Approved,
        api_permission::Decision::Rejected => engine::Decision::Rejected,
    }
}

pub fn request(request: engine::PermissionRequest) -> api_permission::PermissionRequest {
    api_permission::PermissionRequest {
        id: request.id,
        requester_id: request.requester_id,
        mutation: map_mutation(request.mutation),
        target_id: request.target_id,
        status: match request.status {
            engine::RequestStatus::Pending => api_permission::RequestStatus::Pending,
            engine::RequestStatus::Approved => api_permission::RequestStatus::Approved,
            engine::RequestStatus::Rejected => api_permission::RequestStatus::Rejected,
            engine::RequestStatus::Withdrawn => api_permission::RequestStatus::Withdrawn,
        },
        note: request.note,
        created_at: request.created_at,
        resolved_at: request.resolved_at,
        resolved_by: request.resolved_by,
    }
}

pub fn event(event: engine::ChangeEvent) -> api_event::ChangeEvent {
    api_event::ChangeEvent {
        entity: match event.entity {
            engine::EntityKind::Products => api_event::EntityKind::Products,
            engine::EntityKind::StockMovements => api_event::EntityKind::StockMovements,
            engine::EntityKind::Transactions => api_event::EntityKind::Transactions,
            engine::EntityKind::PettyCash => api_event::EntityKind::PettyCash,
            engine::EntityKind::Services => api_event::EntityKind::Services,
            engine::EntityKind::PermissionRequests => api_event::EntityKind::PermissionRequests,
        },
        action: match event.action {
            engine::ChangeAction::Create => api_event::ChangeAction::Create,
            engine::ChangeAction::Update => api_event::ChangeAction::Update,
            engine::ChangeAction::Delete => api_event::ChangeAction::Delete,
            engine::ChangeAction::Adjust => api_event::ChangeAction::Adjust,
        },
    }
}

/// `200` with the applied state, or `202` with the queued request.
pub fn outcome(outcome: engine::MutationOutcome) -> (StatusCode, Json<MutationResponse>) {
    match outcome {
        engine::MutationOutcome::Applied(applied) => {
            let applied = match applied {
                engine::Applied::Product(value) => ApiApplied::Product(product(value)),
                engine::Applied::ProductDeleted(id) => ApiApplied::ProductDeleted(id),
                engine::Applied::Service(value) => ApiApplied::Service(service(value)),
                engine::Applied::ServiceDeleted(id) => ApiApplied::ServiceDeleted(id),
            };
            (StatusCode::OK, Json(MutationResponse::Applied { applied }))
        }
        engine::MutationOutcome::Proposed(value) => (
            StatusCode::ACCEPTED,
            Json(MutationResponse::Proposed {
                request: request(value),
            }),
        ),
    }
}
