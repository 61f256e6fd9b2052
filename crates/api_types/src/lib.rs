use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Header carrying the caller's actor id.
pub const ACTOR_HEADER: &str = "x-user-id";

/// Every error reply has this shape.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

pub mod product {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum ProductStatus {
        Active,
        OutOfStock,
    }

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Product {
        pub id: Uuid,
        pub name: String,
        pub category: Option<String>,
        pub price_minor: i64,
        pub cost_price_minor: i64,
        pub stock: i64,
        pub min_stock: i64,
        pub status: ProductStatus,
        /// Send back as `expected_version` to refuse writes over newer state.
        pub version: i64,
        pub low_stock: bool,
        pub created_at: DateTime<Utc>,
    }

    #[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub struct ProductNew {
        pub name: String,
        #[serde(default)]
        pub category: Option<String>,
        #[serde(default)]
        pub price_minor: Option<i64>,
        #[serde(default)]
        pub cost_price_minor: i64,
        #[serde(default)]
        pub stock: i64,
        #[serde(default)]
        pub min_stock: Option<i64>,
    }

    #[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub struct ProductPatch {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub category: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub price_minor: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub cost_price_minor: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub stock: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub min_stock: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub reason: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub expected_version: Option<i64>,
    }

    /// Optional body of `DELETE /products/{id}`.
    #[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub struct ProductDelete {
        #[serde(default)]
        pub expected_version: Option<i64>,
    }
}

pub mod stock {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum Direction {
        Entry,
        Exit,
    }

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct AdjustStock {
        pub product_id: Uuid,
        pub direction: Direction,
        pub quantity: i64,
        #[serde(default)]
        pub reason: Option<String>,
        #[serde(default)]
        pub is_financial: bool,
        #[serde(default)]
        pub unit_cost_minor: Option<i64>,
        #[serde(default)]
        pub expected_version: Option<i64>,
    }

    #[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub struct QuickSell {
        #[serde(default)]
        pub reason: Option<String>,
    }

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct StockMovement {
        pub id: Uuid,
        pub product_id: Uuid,
        pub actor_id: Uuid,
        pub direction: Direction,
        pub quantity: i64,
        pub reason: String,
        pub occurred_at: DateTime<Utc>,
    }

    #[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub struct MovementQuery {
        #[serde(default)]
        pub product_id: Option<Uuid>,
        #[serde(default)]
        pub limit: Option<u64>,
    }
}

pub mod transaction {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum TransactionKind {
        Income,
        Expense,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum TransactionStatus {
        Paid,
        Pending,
        Overdue,
    }

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Transaction {
        pub id: Uuid,
        pub kind: TransactionKind,
        pub amount_minor: i64,
        pub cost_amount_minor: i64,
        pub category: String,
        pub description: String,
        pub status: TransactionStatus,
        pub client_name: Option<String>,
        pub stock_movement_id: Option<Uuid>,
        pub service_order_id: Option<Uuid>,
        pub occurred_at: DateTime<Utc>,
        pub due_at: DateTime<Utc>,
        pub created_by: Uuid,
    }

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct TransactionNew {
        pub kind: TransactionKind,
        pub amount_minor: i64,
        pub category: String,
        pub description: String,
        /// Defaults to `paid`.
        #[serde(default)]
        pub status: Option<TransactionStatus>,
        #[serde(default)]
        pub client_name: Option<String>,
        /// Defaults to now.
        #[serde(default)]
        pub occurred_at: Option<DateTime<Utc>>,
        #[serde(default)]
        pub due_at: Option<DateTime<Utc>>,
    }

    #[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub struct TransactionPatch {
        #[serde(default)]
        pub amount_minor: Option<i64>,
        #[serde(default)]
        pub category: Option<String>,
        #[serde(default)]
        pub description: Option<String>,
        #[serde(default)]
        pub status: Option<TransactionStatus>,
        #[serde(default)]
        pub client_name: Option<String>,
        #[serde(default)]
        pub due_at: Option<DateTime<Utc>>,
    }

    #[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub struct TransactionQuery {
        #[serde(default)]
        pub kind: Option<TransactionKind>,
        #[serde(default)]
        pub status: Option<TransactionStatus>,
        #[serde(default)]
        pub limit: Option<u64>,
    }

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct TransactionList {
        pub transactions: Vec<Transaction>,
        /// Paid income minus paid expense.
        pub balance_minor: i64,
    }
}

pub mod petty_cash {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum PettyCashKind {
        Deposit,
        Withdrawal,
    }

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct PettyCashEntry {
        pub id: Uuid,
        pub kind: PettyCashKind,
        pub amount_minor: i64,
        pub description: String,
        pub occurred_at: DateTime<Utc>,
        pub created_by: Uuid,
    }

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct PettyCashNew {
        pub kind: PettyCashKind,
        pub amount_minor: i64,
        pub description: String,
        #[serde(default)]
        pub occurred_at: Option<DateTime<Utc>>,
    }

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct PettyCashList {
        pub entries: Vec<PettyCashEntry>,
        pub balance_minor: i64,
    }
}

pub mod service {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum ServiceStatus {
        Pending,
        InProgress,
        Completed,
        Delivered,
        Cancelled,
    }

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct PartRequest {
        pub product_id: Uuid,
        pub quantity: i64,
    }

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct ServicePart {
        pub product_id: Uuid,
        pub quantity: i64,
        pub unit_price_minor: i64,
        pub unit_cost_minor: i64,
    }

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Service {
        pub id: Uuid,
        pub client_name: String,
        pub client_phone: Option<String>,
        pub device_model: String,
        pub description: Option<String>,
        pub status: ServiceStatus,
        pub price_minor: i64,
        pub cost_minor: i64,
        pub parts: Vec<ServicePart>,
        pub created_at: DateTime<Utc>,
        pub delivered_at: Option<DateTime<Utc>>,
    }

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct ServiceNew {
        pub client_name: String,
        #[serde(default)]
        pub client_phone: Option<String>,
        pub device_model: String,
        #[serde(default)]
        pub description: Option<String>,
        pub price_minor: i64,
        #[serde(default)]
        pub status: Option<ServiceStatus>,
        #[serde(default)]
        pub parts: Vec<PartRequest>,
    }

    #[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub struct ServicePatch {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub client_name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub client_phone: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub device_model: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub description: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub price_minor: Option<i64>,
    }

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct ServiceStatusUpdate {
        pub status: ServiceStatus,
    }
}

pub mod permission {
    use super::*;
    use crate::{
        product::{ProductNew, ProductPatch},
        service::{ServiceNew, ServicePatch, ServiceStatus},
        stock::AdjustStock,
    };

    /// A change an actor asks for, as `{"type": "...", "payload": {...}}`.
    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
    pub enum Mutation {
        CreateProduct(ProductNew),
        UpdateProduct {
            product_id: Uuid,
            changes: ProductPatch,
        },
        DeleteProduct {
            product_id: Uuid,
            #[serde(default)]
            expected_version: Option<i64>,
        },
        AdjustStock(AdjustStock),
        CreateService(ServiceNew),
        UpdateService {
            service_id: Uuid,
            changes: ServicePatch,
        },
        DeleteService {
            service_id: Uuid,
        },
        UpdateServiceStatus {
            service_id: Uuid,
            status: ServiceStatus,
        },
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum RequestStatus {
        Pending,
        Approved,
        Rejected,
        Withdrawn,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum Decision {
        Approved,
        Rejected,
    }

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct PermissionRequest {
        pub id: Uuid,
        pub requester_id: Uuid,
        #[serde(flatten)]
        pub mutation: Mutation,
        pub target_id: Option<Uuid>,
        pub status: RequestStatus,
        pub note: Option<String>,
        pub created_at: DateTime<Utc>,
        pub resolved_at: Option<DateTime<Utc>>,
        pub resolved_by: Option<Uuid>,
    }

    #[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub struct RequestQuery {
        #[serde(default)]
        pub status: Option<RequestStatus>,
    }

    /// Body of `PATCH /permission-requests/{id}`.
    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Resolve {
        pub status: Decision,
        #[serde(default)]
        pub note: Option<String>,
    }

    #[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Withdraw {
        #[serde(default)]
        pub note: Option<String>,
    }
}

pub mod outcome {
    use super::*;
    use crate::{permission::PermissionRequest, product::Product, service::Service};

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(tag = "entity", content = "value", rename_all = "snake_case")]
    pub enum Applied {
        Product(Product),
        ProductDeleted(Uuid),
        Service(Service),
        ServiceDeleted(Uuid),
    }

    /// Reply of every mutating inventory or service endpoint.
    ///
    /// `applied` comes with `200 OK`, `proposed` with `202 Accepted`.
    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(tag = "outcome", rename_all = "snake_case")]
    pub enum MutationResponse {
        Applied { applied: Applied },
        Proposed { request: PermissionRequest },
    }
}

pub mod event {
    use super::*;

    /// SSE event name sent to a subscriber that fell behind.
    pub const RESYNC: &str = "resync";
    /// SSE event name of a regular change notification.
    pub const CHANGE: &str = "change";

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(rename_all = "kebab-case")]
    pub enum EntityKind {
        Products,
        StockMovements,
        Transactions,
        PettyCash,
        Services,
        PermissionRequests,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum ChangeAction {
        Create,
        Update,
        Delete,
        Adjust,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct ChangeEvent {
        pub entity: EntityKind,
        pub action: ChangeAction,
    }
}


pub mod audit {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
    pub enum AuditAction {
        ProductCreate,
        ProductUpdate,
        ProductDelete,
        StockAdjust,
        ServiceCreate,
        ServiceUpdate,
        ServiceStatus,
        ServiceDelete,
        PermissionRequest,
        PermissionApproved,
        PermissionRejected,
        PermissionWithdrawn,
        FinanceCreate,
        FinanceUpdate,
        FinanceDelete,
        PettyCashCreate,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
    pub enum AuditCategory {
        Inventory,
        Services,
        Finance,
        System,
    }

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct AuditEntry {
        pub id: Uuid,
        pub actor_id: Uuid,
        pub action: AuditAction,
        pub category: AuditCategory,
        pub details: String,
        pub occurred_at: DateTime<Utc>,
    }

    #[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub struct AuditQuery {
        #[serde(default)]
        pub category: Option<AuditCategory>,
        #[serde(default)]
        pub actor_id: Option<Uuid>,
        #[serde(default)]
        pub limit: Option<u64>,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mutation_response_is_tagged_by_outcome() {
        let response = outcome::MutationResponse::Applied {
            applied: outcome::Applied::ProductDeleted(Uuid::nil()),
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["outcome"], "applied");
        assert_eq!(json["applied"]["entity"], "product_deleted");
    }

    #[test]
    fn permission_request_flattens_its_mutation() {
        let json = serde_json::json!({
            "id": Uuid::nil(),
            "requester_id": Uuid::nil(),
            "type": "DELETE_SERVICE",
            "payload": { "service_id": Uuid::nil() },
            "target_id": Uuid::nil(),
            "status": "pending",
            "note": null,
            "created_at": "2026-01-01T00:00:00Z",
            "resolved_at": null,
            "resolved_by": null,
        });
        let request: permission::PermissionRequest = serde_json::from_value(json).unwrap();
        assert_eq!(
            request.mutation,
            permission::Mutation::DeleteService {
                service_id: Uuid::nil()
            }
        );
    }
}
