//! Pure checks run before any write.
//!
//! [`validate`] never touches the database. Callers load a [`StateView`] with
//! the rows a mutation references, inside the same DB transaction that will
//! perform the write, and pass it in. The same function runs on the direct
//! path and again when an admin approves a request.

use std::collections::HashMap;

use thiserror::Error;
use uuid::Uuid;

use crate::{
    Direction, Mutation, Product, ProductChanges, ProductDraft, ServiceChanges, ServiceDraft,
    ServiceStatus, StockAdjustment, util::normalize_name,
};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("{0} must not be negative")]
    NegativeValue(&'static str),
    #[error("quantity must be a positive integer, got {0}")]
    InvalidQuantity(i64),
    #[error("amount must be positive, got {0}")]
    InvalidAmount(i64),
    #[error("insufficient stock for {product}: {available} available, {requested} requested")]
    InsufficientStock {
        product: String,
        available: i64,
        requested: i64,
    },
    #[error("service status cannot change from {} to {}", .from.as_str(), .to.as_str())]
    InvalidTransition {
        from: ServiceStatus,
        to: ServiceStatus,
    },
    #[error("{0} is too large")]
    TooLarge(&'static str),
    #[error("{0} not found")]
    NotFound(String),
}

/// `unit_minor * quantity`, refused when it does not fit.
pub(crate) fn line_total(
    unit_minor: i64,
    quantity: i64,
    field: &'static str,
) -> Result<i64, ValidationError> {
    unit_minor
        .checked_mul(quantity)
        .ok_or(ValidationError::TooLarge(field))
}

pub(crate) fn stock_after(
    stock: i64,
    direction: Direction,
    quantity: i64,
) -> Result<i64, ValidationError> {
    stock
        .checked_add(direction.signed(quantity))
        .ok_or(ValidationError::TooLarge("stock"))
}

/// Point-in-time view of the rows a mutation references.
#[derive(Clone, Debug, Default)]
pub struct StateView {
    products: HashMap<Uuid, Product>,
    services: HashMap<Uuid, ServiceStatus>,
}

impl StateView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a live (not deleted) product.
    pub fn with_product(mut self, product: Product) -> Self {
        self.products.insert(product.id, product);
        self
    }

    pub fn with_service(mut self, service_id: Uuid, status: ServiceStatus) -> Self {
        self.services.insert(service_id, status);
        self
    }

    pub fn product(&self, product_id: Uuid) -> Option<&Product> {
        self.products.get(&product_id)
    }

    fn require_product(&self, product_id: Uuid) -> Result<&Product, ValidationError> {
        self.product(product_id)
            .ok_or_else(|| ValidationError::NotFound(format!("product {product_id}")))
    }

    fn require_service(&self, service_id: Uuid) -> Result<ServiceStatus, ValidationError> {
        self.services
            .get(&service_id)
            .copied()
            .ok_or_else(|| ValidationError::NotFound(format!("service {service_id}")))
    }
}

pub fn validate(mutation: &Mutation, view: &StateView) -> Result<(), ValidationError> {
    match mutation {
        Mutation::CreateProduct(draft) => validate_product_draft(draft),
        Mutation::UpdateProduct {
            product_id,
            changes,
        } => {
            view.require_product(*product_id)?;
            validate_product_changes(changes)
        }
        Mutation::DeleteProduct { product_id, .. } => view.require_product(*product_id).map(|_| ()),
        Mutation::AdjustStock(adjustment) => validate_adjustment(adjustment, view),
        Mutation::CreateService(draft) => validate_service_draft(draft, view),
        Mutation::UpdateService {
            service_id,
            changes,
        } => {
            view.require_service(*service_id)?;
            validate_service_changes(changes)
        }
        Mutation::DeleteService { service_id } => view.require_service(*service_id).map(|_| ()),
        Mutation::UpdateServiceStatus { service_id, status } => {
            let current = view.require_service(*service_id)?;
            if current.is_terminal() {
                return Err(ValidationError::InvalidTransition {
                    from: current,
                    to: *status,
                });
            }
            Ok(())
        }
    }
}

fn non_negative(value: i64, field: &'static str) -> Result<(), ValidationError> {
    if value < 0 {
        return Err(ValidationError::NegativeValue(field));
    }
    Ok(())
}

fn required_text(value: &str, field: &'static str) -> Result<(), ValidationError> {
    normalize_name(value)
        .map(|_| ())
        .ok_or(ValidationError::MissingField(field))
}

fn validate_product_draft(draft: &ProductDraft) -> Result<(), ValidationError> {
    required_text(&draft.name, "name")?;
    let price = draft
        .price_minor
        .ok_or(ValidationError::MissingField("price"))?;
    non_negative(price, "price")?;
    non_negative(draft.cost_price_minor, "cost price")?;
    non_negative(draft.stock, "stock")?;
    if let Some(min_stock) = draft.min_stock {
        non_negative(min_stock, "minimum stock")?;
    }
    line_total(draft.cost_price_minor, draft.stock, "initial investment")?;
    Ok(())
}

fn validate_product_changes(changes: &ProductChanges) -> Result<(), ValidationError> {
    if let Some(name) = &changes.name {
        required_text(name, "name")?;
    }
    let numbers = [
        (changes.price_minor, "price"),
        (changes.cost_price_minor, "cost price"),
        (changes.stock, "stock"),
        (changes.min_stock, "minimum stock"),
    ];
    for (value, field) in numbers {
        if let Some(value) = value {
            non_negative(value, field)?;
        }
    }
    Ok(())
}

fn validate_adjustment(
    adjustment: &StockAdjustment,
    view: &StateView,
) -> Result<(), ValidationError> {
    if adjustment.quantity <= 0 {
        return Err(ValidationError::InvalidQuantity(adjustment.quantity));
    }
    if let Some(unit_cost) = adjustment.unit_cost_minor {
        non_negative(unit_cost, "unit cost")?;
    }
    let product = view.require_product(adjustment.product_id)?;
    if adjustment.direction == Direction::Exit && product.stock < adjustment.quantity {
        return Err(ValidationError::InsufficientStock {
            product: product.name.clone(),
            available: product.stock,
            requested: adjustment.quantity,
        });
    }
    stock_after(product.stock, adjustment.direction, adjustment.quantity)?;
    if adjustment.is_financial {
        match adjustment.direction {
            Direction::Exit => {
                line_total(product.price_minor, adjustment.quantity, "sale amount")?;
                line_total(product.cost_price_minor, adjustment.quantity, "sale cost")?;
            }
            Direction::Entry => {
                let unit_cost = adjustment.unit_cost_minor.unwrap_or(product.cost_price_minor);
                line_total(unit_cost, adjustment.quantity, "purchase amount")?;
            }
        }
    }
    Ok(())
}

fn validate_service_draft(draft: &ServiceDraft, view: &StateView) -> Result<(), ValidationError> {
    required_text(&draft.client_name, "client name")?;
    required_text(&draft.device_model, "device model")?;
    non_negative(draft.price_minor, "price")?;

    let mut wanted: HashMap<Uuid, i64> = HashMap::new();
    for part in &draft.parts {
        if part.quantity <= 0 {
            return Err(ValidationError::InvalidQuantity(part.quantity));
        }
        let quantity = wanted.entry(part.product_id).or_default();
        *quantity = quantity
            .checked_add(part.quantity)
            .ok_or(ValidationError::TooLarge("part quantity"))?;
    }
    let mut cost_minor: i64 = 0;
    for (product_id, quantity) in wanted {
        let product = view.require_product(product_id)?;
        if product.stock < quantity {
            return Err(ValidationError::InsufficientStock {
                product: product.name.clone(),
                available: product.stock,
                requested: quantity,
            });
        }
        cost_minor = line_total(product.cost_price_minor, quantity, "parts cost")?
            .checked_add(cost_minor)
            .ok_or(ValidationError::TooLarge("parts cost"))?;
    }
    Ok(())
}

fn validate_service_changes(changes: &ServiceChanges) -> Result<(), ValidationError> {
    if let Some(client_name) = &changes.client_name {
        required_text(client_name, "client name")?;
    }
    if let Some(device_model) = &changes.device_model {
        required_text(device_model, "device model")?;
    }
    if let Some(price) = changes.price_minor {
        non_negative(price, "price")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::{PartRequest, ProductStatus};

    fn product(stock: i64) -> Product {
        Product {
            id: Uuid::new_v4(),
            name: "Battery".to_string(),
            category: None,
            price_minor: 4000,
            cost_price_minor: 2500,
            stock,
            min_stock: 2,
            status: ProductStatus::for_stock(stock),
            version: 0,
            created_at: Utc::now(),
        }
    }

    fn exit(product_id: Uuid, quantity: i64) -> Mutation {
        Mutation::AdjustStock(StockAdjustment {
            product_id,
            direction: Direction::Exit,
            quantity,
            reason: None,
            is_financial: false,
            unit_cost_minor: None,
            expected_version: None,
        })
    }

    #[test]
    fn exit_beyond_stock_is_rejected() {
        let product = product(5);
        let view = StateView::new().with_product(product.clone());

        assert_eq!(
            validate(&exit(product.id, 6), &view),
            Err(ValidationError::InsufficientStock {
                product: "Battery".to_string(),
                available: 5,
                requested: 6,
            })
        );
        assert_eq!(validate(&exit(product.id, 5), &view), Ok(()));
    }

    #[test]
    fn quantity_must_be_positive() {
        let product = product(5);
        let view = StateView::new().with_product(product.clone());
        assert_eq!(
            validate(&exit(product.id, 0), &view),
            Err(ValidationError::InvalidQuantity(0))
        );
    }

    #[test]
    fn entry_that_would_overflow_stock_is_rejected() {
        let product = product(5);
        let view = StateView::new().with_product(product.clone());
        let entry = Mutation::AdjustStock(StockAdjustment {
            product_id: product.id,
            direction: Direction::Entry,
            quantity: i64::MAX,
            reason: None,
            is_financial: false,
            unit_cost_minor: None,
            expected_version: None,
        });
        assert_eq!(
            validate(&entry, &view),
            Err(ValidationError::TooLarge("stock"))
        );
    }

    #[test]
    fn sale_amount_must_fit() {
        let mut product = product(10);
        product.price_minor = i64::MAX / 2;
        let view = StateView::new().with_product(product.clone());
        let sale = Mutation::AdjustStock(StockAdjustment {
            product_id: product.id,
            direction: Direction::Exit,
            quantity: 3,
            reason: None,
            is_financial: true,
            unit_cost_minor: None,
            expected_version: None,
        });
        assert_eq!(
            validate(&sale, &view),
            Err(ValidationError::TooLarge("sale amount"))
        );
        // Without money involved the same exit is fine.
        assert_eq!(validate(&exit(product.id, 3), &view), Ok(()));
    }

    #[test]
    fn initial_investment_must_fit() {
        let draft = ProductDraft {
            name: "Screen".to_string(),
            price_minor: Some(100),
            cost_price_minor: i64::MAX,
            stock: 2,
            ..ProductDraft::default()
        };
        assert_eq!(
            validate(&Mutation::CreateProduct(draft), &StateView::new()),
            Err(ValidationError::TooLarge("initial investment"))
        );
    }

    #[test]
    fn unknown_product_is_not_found() {
        let err = validate(&exit(Uuid::nil(), 1), &StateView::new()).unwrap_err();
        assert!(matches!(err, ValidationError::NotFound(_)));
    }

    #[test]
    fn product_draft_requires_name_and_price() {
        let draft = ProductDraft {
            name: "  ".to_string(),
            price_minor: Some(100),
            ..ProductDraft::default()
        };
        assert_eq!(
            validate(&Mutation::CreateProduct(draft), &StateView::new()),
            Err(ValidationError::MissingField("name"))
        );

        let draft = ProductDraft {
            name: "X".to_string(),
            ..ProductDraft::default()
        };
        assert_eq!(
            validate(&Mutation::CreateProduct(draft), &StateView::new()),
            Err(ValidationError::MissingField("price"))
        );
    }

    #[test]
    fn product_update_rejects_negative_stock() {
        let product = product(3);
        let view = StateView::new().with_product(product.clone());
        let mutation = Mutation::UpdateProduct {
            product_id: product.id,
            changes: ProductChanges {
                stock: Some(-1),
                ..ProductChanges::default()
            },
        };
        assert_eq!(
            validate(&mutation, &view),
            Err(ValidationError::NegativeValue("stock"))
        );
    }

    #[test]
    fn service_parts_are_summed_per_product() {
        let product = product(3);
        let view = StateView::new().with_product(product.clone());
        let draft = ServiceDraft {
            client_name: "Ana".to_string(),
            client_phone: None,
            device_model: "Phone".to_string(),
            description: None,
            price_minor: 10_000,
            status: None,
            parts: vec![
                PartRequest {
                    product_id: product.id,
                    quantity: 2,
                },
                PartRequest {
                    product_id: product.id,
                    quantity: 2,
                },
            ],
        };
        let err = validate(&Mutation::CreateService(draft), &view).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::InsufficientStock { requested: 4, .. }
        ));
    }

    #[test]
    fn terminal_service_status_is_final() {
        let service_id = Uuid::new_v4();
        let view = StateView::new().with_service(service_id, ServiceStatus::Delivered);
        let mutation = Mutation::UpdateServiceStatus {
            service_id,
            status: ServiceStatus::InProgress,
        };
        assert_eq!(
            validate(&mutation, &view),
            Err(ValidationError::InvalidTransition {
                from: ServiceStatus::Delivered,
                to: ServiceStatus::InProgress,
            })
        );
    }
}
