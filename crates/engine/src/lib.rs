pub use actors::{Actor, ActorContext, Role};
pub use audit_logs::{AuditAction, AuditCategory, AuditEntry};
pub use broadcast::{Broadcaster, ChangeAction, ChangeEvent, EntityKind};
pub use commands::{
    AuditListFilter, MovementListFilter, PettyCashCmd, TransactionChanges, TransactionCmd,
    TransactionListFilter,
};
pub use error::EngineError;
pub use mutation::{
    Applied, Mutation, MutationKind, MutationOutcome, PartRequest, ProductChanges, ProductDraft,
    ServiceChanges, ServiceDraft, StockAdjustment,
};
pub use ops::{Engine, EngineBuilder};
pub use permission_requests::{Decision, PermissionRequest, RequestStatus};
pub use petty_cash::{PettyCashEntry, PettyCashKind};
pub use policy::AuthorityPolicy;
pub use products::{DEFAULT_MIN_STOCK, Product, ProductStatus};
pub use service_orders::{ServiceOrder, ServicePart, ServiceStatus};
pub use stock_movements::{Direction, StockMovement};
pub use transactions::{
    CATEGORY_PRODUCT_SALE, CATEGORY_REPAIR_SERVICE, CATEGORY_STOCK_PURCHASE, Transaction,
    TransactionKind, TransactionStatus,
};
pub use validation::{StateView, ValidationError, validate};

mod actors;
mod audit_logs;
pub mod broadcast;
mod commands;
mod error;
mod mutation;
mod ops;
mod permission_requests;
mod petty_cash;
mod policy;
mod products;
mod service_orders;
mod service_parts;
mod stock_movements;
mod transactions;
mod util;
mod validation;

pub type ResultEngine<T> = Result<T, EngineError>;
