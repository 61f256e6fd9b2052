use sea_orm::{DatabaseConnection, DatabaseTransaction, QueryFilter, TransactionTrait, prelude::*};
use uuid::Uuid;

use self::audit::record;
use crate::{
    ActorContext, Applied, AuthorityPolicy, Broadcaster, ChangeEvent, EngineError, Mutation,
    MutationOutcome, Product, ResultEngine, StateView, products, service_orders,
    util::parse_column, validate,
};

mod access;
mod approvals;
mod audit;
mod ledger;
mod services;
mod stock;

const DEFAULT_CAS_RETRIES: u32 = 3;

/// Run a block inside a DB transaction, committing on success and rolling back on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

/// Re-run a whole read-validate-write block when it lost a compare-and-swap
/// on `products.version`. Every other outcome is returned as is.
macro_rules! retry_stale {
    ($self:expr, $body:expr) => {{
        let mut attempt: u32 = 0;
        loop {
            match $body {
                Err(EngineError::StaleWrite(what)) if attempt < $self.cas_retries => {
                    attempt += 1;
                    tracing::debug!(attempt, %what, "retrying after concurrent write");
                }
                Err(EngineError::StaleWrite(what)) => {
                    break Err(EngineError::Conflict(format!(
                        "{what} kept changing concurrently, try again"
                    )));
                }
                other => break other,
            }
        }
    }};
}

pub(crate) use retry_stale;
pub(crate) use with_tx;

#[derive(Debug)]
pub struct Engine {
    database: DatabaseConnection,
    broadcaster: Broadcaster,
    policy: AuthorityPolicy,
    require_funds: bool,
    cas_retries: u32,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    pub fn policy(&self) -> &AuthorityPolicy {
        &self.policy
    }

    /// The single entry point for inventory and service mutations.
    ///
    /// Authoritative actors get the mutation validated and applied; everyone
    /// else gets a pending [`crate::PermissionRequest`].
    pub async fn submit(
        &self,
        ctx: &ActorContext,
        mutation: Mutation,
    ) -> ResultEngine<MutationOutcome> {
        if !self.policy.is_authoritative(ctx.role(), mutation.kind()) {
            return self
                .propose(ctx, mutation)
                .await
                .map(MutationOutcome::Proposed);
        }
        let applied = self.apply(ctx, &mutation).await?;
        Ok(MutationOutcome::Applied(applied))
    }

    async fn apply(&self, ctx: &ActorContext, mutation: &Mutation) -> ResultEngine<Applied> {
        let mut events = Vec::new();
        let applied = retry_stale!(self, {
            events.clear();
            with_tx!(self, |db_tx| {
                self.apply_in(&db_tx, ctx.actor_id(), mutation, &mut events)
                    .await
            })
        })?;
        tracing::info!(
            actor_id = %ctx.actor_id(),
            kind = mutation.kind().as_str(),
            "mutation applied"
        );
        self.broadcaster.publish_all(events);
        Ok(applied)
    }

    /// Validate against the current rows and apply, all inside `db_tx`.
    ///
    /// Shared by the direct path and by approval, so an approved request runs
    /// exactly the code an authoritative actor would.
    pub(super) async fn apply_in(
        &self,
        db_tx: &DatabaseTransaction,
        actor_id: Uuid,
        mutation: &Mutation,
        events: &mut Vec<ChangeEvent>,
    ) -> ResultEngine<Applied> {
        let view = self.load_view(db_tx, mutation).await?;
        validate(mutation, &view)?;

        let (applied, details) = match mutation {
            Mutation::CreateProduct(draft) => {
                let product = self
                    .create_product_in(db_tx, actor_id, draft, events)
                    .await?;
                let details = format!(
                    "Created {}: {} un at {}",
                    product.name, product.stock, product.price_minor
                );
                (Applied::Product(product), details)
            }
            Mutation::UpdateProduct {
                product_id,
                changes,
            } => {
                let current = live_product(&view, *product_id)?;
                let before = current.stock;
                let product = self
                    .update_product_in(db_tx, actor_id, current, changes, events)
                    .await?;
                let details = format!(
                    "Edited {}: stock {before} -> {} un",
                    product.name, product.stock
                );
                (Applied::Product(product), details)
            }
            Mutation::DeleteProduct {
                product_id,
                expected_version,
            } => {
                let product = live_product(&view, *product_id)?;
                let details = format!("Deleted {}", product.name);
                self.delete_product_in(db_tx, product, *expected_version, events)
                    .await?;
                (Applied::ProductDeleted(*product_id), details)
            }
            Mutation::AdjustStock(adjustment) => {
                let current = live_product(&view, adjustment.product_id)?;
                let before = current.stock;
                let product = self
                    .adjust_stock_in(db_tx, actor_id, current, adjustment, events)
                    .await?;
                let details = format!(
                    "{}: {before} -> {} un ({:+})",
                    product.name,
                    product.stock,
                    adjustment.direction.signed(adjustment.quantity)
                );
                (Applied::Product(product), details)
            }
            Mutation::CreateService(draft) => {
                let service = self
                    .create_service_in(db_tx, actor_id, draft, &view, events)
                    .await?;
                let details = format!(
                    "Created {} at {}",
                    service.ledger_description(),
                    service.price_minor
                );
                (Applied::Service(service), details)
            }
            Mutation::UpdateService {
                service_id,
                changes,
            } => {
                let service = self
                    .update_service_in(db_tx, actor_id, *service_id, changes, events)
                    .await?;
                let details = format!(
                    "Edited {} at {}",
                    service.ledger_description(),
                    service.price_minor
                );
                (Applied::Service(service), details)
            }
            Mutation::DeleteService { service_id } => {
                let service = self.delete_service_in(db_tx, *service_id, events).await?;
                let details = format!("Deleted {}", service.ledger_description());
                (Applied::ServiceDeleted(*service_id), details)
            }
            Mutation::UpdateServiceStatus { service_id, status } => {
                let service = self
                    .update_service_status_in(db_tx, *service_id, *status, events)
                    .await?;
                let details = format!(
                    "{} is now {}",
                    service.ledger_description(),
                    status.as_str()
                );
                (Applied::Service(service), details)
            }
        };

        record(db_tx, actor_id, mutation.kind().into(), details).await?;
        Ok(applied)
    }

    /// Load every row `mutation` references, as currently committed.
    async fn load_view(
        &self,
        db_tx: &DatabaseTransaction,
        mutation: &Mutation,
    ) -> ResultEngine<StateView> {
        let mut view = StateView::new();

        let product_ids: Vec<Uuid> = match mutation {
            Mutation::UpdateProduct { product_id, .. }
            | Mutation::DeleteProduct { product_id, .. } => vec![*product_id],
            Mutation::AdjustStock(adjustment) => vec![adjustment.product_id],
            Mutation::CreateService(draft) => {
                draft.parts.iter().map(|part| part.product_id).collect()
            }
            _ => Vec::new(),
        };
        if !product_ids.is_empty() {
            let models = products::Entity::find()
                .filter(products::Column::Id.is_in(product_ids))
                .filter(products::Column::Deleted.eq(false))
                .all(db_tx)
                .await?;
            for model in models {
                view = view.with_product(Product::try_from(model)?);
            }
        }

        let service_id = match mutation {
            Mutation::UpdateService { service_id, .. }
            | Mutation::DeleteService { service_id }
            | Mutation::UpdateServiceStatus { service_id, .. } => Some(*service_id),
            _ => None,
        };
        if let Some(service_id) = service_id
            && let Some(model) = service_orders::Entity::find_by_id(service_id)
                .one(db_tx)
                .await?
        {
            view = view.with_service(model.id, parse_column(&model.status, "service status")?);
        }

        Ok(view)
    }
}

fn live_product(view: &StateView, product_id: Uuid) -> ResultEngine<Product> {
    view.product(product_id)
        .cloned()
        .ok_or_else(|| EngineError::KeyNotFound(format!("product {product_id}")))
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
    broadcaster: Option<Broadcaster>,
    policy: AuthorityPolicy,
    require_funds: bool,
    cas_retries: Option<u32>,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Share an existing broadcaster, e.g. one the server already subscribed to.
    pub fn broadcaster(mut self, broadcaster: Broadcaster) -> EngineBuilder {
        self.broadcaster = Some(broadcaster);
        self
    }

    pub fn policy(mut self, policy: AuthorityPolicy) -> EngineBuilder {
        self.policy = policy;
        self
    }

    /// Reject expenses that would exceed the paid cash balance.
    pub fn require_funds(mut self, require_funds: bool) -> EngineBuilder {
        self.require_funds = require_funds;
        self
    }

    /// How many times a write that lost a version race is retried.
    pub fn cas_retries(mut self, retries: u32) -> EngineBuilder {
        self.cas_retries = Some(retries);
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        Ok(Engine {
            database: self.database,
            broadcaster: self.broadcaster.unwrap_or_default(),
            policy: self.policy,
            require_funds: self.require_funds,
            cas_retries: self.cas_retries.unwrap_or(DEFAULT_CAS_RETRIES),
        })
    }
}
