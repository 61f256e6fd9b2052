//! Typed mutation payloads.
//!
//! A [`Mutation`] is what an actor asks the engine to do. Authoritative actors
//! get it applied straight away; everybody else gets it frozen into a
//! permission request. The JSON form is `{"type": "CREATE_PRODUCT", "payload": {...}}`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    Direction, EngineError, PermissionRequest, Product, ServiceOrder, ServiceStatus,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MutationKind {
    CreateProduct,
    UpdateProduct,
    DeleteProduct,
    AdjustStock,
    CreateService,
    UpdateService,
    DeleteService,
    UpdateServiceStatus,
}

impl MutationKind {
    pub const ALL: [MutationKind; 8] = [
        Self::CreateProduct,
        Self::UpdateProduct,
        Self::DeleteProduct,
        Self::AdjustStock,
        Self::CreateService,
        Self::UpdateService,
        Self::DeleteService,
        Self::UpdateServiceStatus,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::CreateProduct => "CREATE_PRODUCT",
            Self::UpdateProduct => "UPDATE_PRODUCT",
            Self::DeleteProduct => "DELETE_PRODUCT",
            Self::AdjustStock => "ADJUST_STOCK",
            Self::CreateService => "CREATE_SERVICE",
            Self::UpdateService => "UPDATE_SERVICE",
            Self::DeleteService => "DELETE_SERVICE",
            Self::UpdateServiceStatus => "UPDATE_SERVICE_STATUS",
        }
    }
}

impl TryFrom<&str> for MutationKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == value)
            .ok_or_else(|| EngineError::InvalidId(format!("invalid mutation kind: {value}")))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDraft {
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    /// Required; `None` is rejected by validation.
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
pub struct ProductChanges {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub price_minor: Option<i64>,
    #[serde(default)]
    pub cost_price_minor: Option<i64>,
    #[serde(default)]
    pub stock: Option<i64>,
    #[serde(default)]
    pub min_stock: Option<i64>,
    /// Reason recorded on the movement when `stock` changes.
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub expected_version: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAdjustment {
    pub product_id: Uuid,
    pub direction: Direction,
    pub quantity: i64,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub is_financial: bool,
    /// Unit cost paid on a financial entry; defaults to the product cost.
    #[serde(default)]
    pub unit_cost_minor: Option<i64>,
    #[serde(default)]
    pub expected_version: Option<i64>,
}

impl StockAdjustment {
    /// One unit sold and booked as income.
    pub fn quick_sell(product_id: Uuid, reason: Option<String>) -> Self {
        Self {
            product_id,
            direction: Direction::Exit,
            quantity: 1,
            reason: Some(reason.unwrap_or_else(|| "Quick sale".to_string())),
            is_financial: true,
            unit_cost_minor: None,
            expected_version: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartRequest {
    pub product_id: Uuid,
    pub quantity: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDraft {
    pub client_name: String,
    #[serde(default)]
    pub client_phone: Option<String>,
    pub device_model: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub price_minor: i64,
    #[serde(default)]
    pub status: Option<ServiceStatus>,
    #[serde(default)]
    pub parts: Vec<PartRequest>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceChanges {
    #[serde(default)]
    pub client_name: Option<String>,
    #[serde(default)]
    pub client_phone: Option<String>,
    #[serde(default)]
    pub device_model: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub price_minor: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Mutation {
    CreateProduct(ProductDraft),
    UpdateProduct {
        product_id: Uuid,
        changes: ProductChanges,
    },
    DeleteProduct {
        product_id: Uuid,
        #[serde(default)]
        expected_version: Option<i64>,
    },
    AdjustStock(StockAdjustment),
    CreateService(ServiceDraft),
    UpdateService {
        service_id: Uuid,
        changes: ServiceChanges,
    },
    DeleteService {
        service_id: Uuid,
    },
    UpdateServiceStatus {
        service_id: Uuid,
        status: ServiceStatus,
    },
}

impl Mutation {
    pub fn kind(&self) -> MutationKind {
        match self {
            Self::CreateProduct(_) => MutationKind::CreateProduct,
            Self::UpdateProduct { .. } => MutationKind::UpdateProduct,
            Self::DeleteProduct { .. } => MutationKind::DeleteProduct,
            Self::AdjustStock(_) => MutationKind::AdjustStock,
            Self::CreateService(_) => MutationKind::CreateService,
            Self::UpdateService { .. } => MutationKind::UpdateService,
            Self::DeleteService { .. } => MutationKind::DeleteService,
            Self::UpdateServiceStatus { .. } => MutationKind::UpdateServiceStatus,
        }
    }

    /// The existing entity this mutation edits, if any.
    pub fn target_id(&self) -> Option<Uuid> {
        match self {
            Self::CreateProduct(_) | Self::CreateService(_) => None,
            Self::UpdateProduct { product_id, .. } | Self::DeleteProduct { product_id, .. } => {
                Some(*product_id)
            }
            Self::AdjustStock(adjustment) => Some(adjustment.product_id),
            Self::UpdateService { service_id, .. }
            | Self::DeleteService { service_id }
            | Self::UpdateServiceStatus { service_id, .. } => Some(*service_id),
        }
    }

    /// Records the product version the proposer saw, so a later approval can
    /// tell the product moved on. Adjustments are deltas and stay unpinned.
    pub(crate) fn pin_version(&mut self, version: i64) {
        match self {
            Self::UpdateProduct { changes, .. } => {
                changes.expected_version.get_or_insert(version);
            }
            Self::DeleteProduct {
                expected_version, ..
            } => {
                expected_version.get_or_insert(version);
            }
            _ => {}
        }
    }
}

/// The state a mutation left behind once applied.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "entity", content = "value", rename_all = "snake_case")]
pub enum Applied {
    Product(Product),
    ProductDeleted(Uuid),
    Service(ServiceOrder),
    ServiceDeleted(Uuid),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MutationOutcome {
    Applied(Applied),
    Proposed(PermissionRequest),
}
