//! Client-side reconciliation.
//!
//! A [`Reconciler`] keeps two layers: the [`Snapshot`] last fetched from the
//! server and an [`Overlay`] of optimistic operations that haven't been
//! confirmed yet. The merged [`View`] is what the operator sees. The snapshot
//! is never patched in place; every refresh replaces it wholesale and drops
//! the overlay entries that no longer make sense.

use std::{collections::HashMap, future::Future, time::Duration};

use api_types::{
    outcome::MutationResponse,
    permission::{PermissionRequest, RequestStatus},
    petty_cash::PettyCashEntry,
    product::{Product, ProductPatch, ProductStatus},
    service::{Service, ServiceStatus},
    stock::StockMovement,
    transaction::Transaction,
};
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use crate::{error::ApiError, feed::FeedItem};

/// Authoritative state, as returned by the full-state reads.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub products: Vec<Product>,
    pub movements: Vec<StockMovement>,
    pub transactions: Vec<Transaction>,
    pub balance_minor: i64,
    pub petty_cash: Vec<PettyCashEntry>,
    pub petty_cash_balance_minor: i64,
    pub services: Vec<Service>,
    /// Every request the actor may see, whatever its status.
    pub requests: Vec<PermissionRequest>,
}

/// Where authoritative state comes from.
pub trait StateSource {
    fn fetch(&self) -> impl Future<Output = Result<Snapshot, ApiError>> + Send;

    /// Whose request outcomes to announce. `None` announces all of them.
    fn actor_id(&self) -> Option<Uuid> {
        None
    }
}

/// A local change shown before the server confirms it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PendingOp {
    AdjustStock { product_id: Uuid, delta: i64 },
    UpdateProduct { product_id: Uuid, patch: ProductPatch },
    DeleteProduct { product_id: Uuid },
    /// Shown under a temporary id until the server assigns the real one.
    CreateProduct { placeholder: Product },
    UpdateServiceStatus { service_id: Uuid, status: ServiceStatus },
    DeleteService { service_id: Uuid },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OpId(u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum OpState {
    InFlight,
    /// Accepted by the server; dropped once a refresh lands.
    Confirmed,
}

#[derive(Clone, Debug)]
struct Entry {
    id: OpId,
    op: PendingOp,
    state: OpState,
}

/// Optimistic operations in submission order.
#[derive(Clone, Debug, Default)]
pub struct Overlay {
    next_id: u64,
    entries: Vec<Entry>,
}

impl Overlay {
    fn push(&mut self, op: PendingOp) -> OpId {
        self.next_id += 1;
        let id = OpId(self.next_id);
        self.entries.push(Entry {
            id,
            op,
            state: OpState::InFlight,
        });
        id
    }

    fn confirm(&mut self, id: OpId) {
        if let Some(entry) = self.entries.iter_mut().find(|entry| entry.id == id) {
            entry.state = OpState::Confirmed;
        }
    }

    fn remove(&mut self, id: OpId) {
        self.entries.retain(|entry| entry.id != id);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop confirmed entries and the ones the new snapshot contradicts.
    fn rebase(&mut self, snapshot: &Snapshot) {
        let mut products = snapshot.products.clone();
        let mut services = snapshot.services.clone();

        self.entries.retain(|entry| {
            if entry.state == OpState::Confirmed {
                return false;
            }
            if conflicts(&entry.op, &products, &services) {
                tracing::debug!(op = ?entry.op, "discarding optimistic op");
                return false;
            }
            apply(&entry.op, &mut products, &mut services);
            true
        });
    }
}

fn conflicts(op: &PendingOp, products: &[Product], services: &[Service]) -> bool {
    let product = |id: Uuid| products.iter().find(|product| product.id == id);
    let service_exists = |id: Uuid| services.iter().any(|service| service.id == id);

    match op {
        PendingOp::AdjustStock { product_id, delta } => match product(*product_id) {
            Some(product) => product.stock + delta < 0,
            None => true,
        },
        PendingOp::UpdateProduct { product_id, patch } => match product(*product_id) {
            Some(product) => patch
                .expected_version
                .is_some_and(|version| version != product.version),
            None => true,
        },
        PendingOp::DeleteProduct { product_id } => product(*product_id).is_none(),
        PendingOp::CreateProduct { .. } => false,
        PendingOp::UpdateServiceStatus { service_id, .. }
        | PendingOp::DeleteService { service_id } => !service_exists(*service_id),
    }
}

fn apply(op: &PendingOp, products: &mut Vec<Product>, services: &mut Vec<Service>) {
    match op {
        PendingOp::AdjustStock { product_id, delta } => {
            if let Some(product) = products.iter_mut().find(|p| p.id == *product_id) {
                product.stock += delta;
                refresh_derived(product);
            }
        }
        PendingOp::UpdateProduct { product_id, patch } => {
            if let Some(product) = products.iter_mut().find(|p| p.id == *product_id) {
                if let Some(name) = &patch.name {
                    product.name = name.clone();
                }
                if let Some(category) = &patch.category {
                    product.category = Some(category.clone());
                }
                if let Some(price) = patch.price_minor {
                    product.price_minor = price;
                }
                if let Some(cost) = patch.cost_price_minor {
                    product.cost_price_minor = cost;
                }
                if let Some(stock) = patch.stock {
                    product.stock = stock;
                }
                if let Some(min_stock) = patch.min_stock {
                    product.min_stock = min_stock;
                }
                refresh_derived(product);
            }
        }
        PendingOp::DeleteProduct { product_id } => products.retain(|p| p.id != *product_id),
        PendingOp::CreateProduct { placeholder } => products.push(placeholder.clone()),
        PendingOp::UpdateServiceStatus { service_id, status } => {
            if let Some(service) = services.iter_mut().find(|s| s.id == *service_id) {
                service.status = *status;
            }
        }
        PendingOp::DeleteService { service_id } => services.retain(|s| s.id != *service_id),
    }
}

fn refresh_derived(product: &mut Product) {
    product.status = if product.stock == 0 {
        ProductStatus::OutOfStock
    } else {
        ProductStatus::Active
    };
    product.low_stock = product.stock <= product.min_stock;
}

/// Snapshot with the overlay applied.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct View {
    pub products: Vec<Product>,
    pub movements: Vec<StockMovement>,
    pub transactions: Vec<Transaction>,
    pub balance_minor: i64,
    pub petty_cash: Vec<PettyCashEntry>,
    pub petty_cash_balance_minor: i64,
    pub services: Vec<Service>,
    pub requests: Vec<PermissionRequest>,
    pub online: bool,
    /// No snapshot has been fetched yet.
    pub loading: bool,
}

impl View {
    pub fn pending_requests(&self) -> impl Iterator<Item = &PermissionRequest> {
        self.requests
            .iter()
            .filter(|request| request.status == RequestStatus::Pending)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// A message for the operator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

pub struct Reconciler<S> {
    source: S,
    snapshot: Option<Snapshot>,
    overlay: Overlay,
    online: bool,
    notices: Vec<Notice>,
}

impl<S: StateSource> Reconciler<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            snapshot: None,
            overlay: Overlay::default(),
            online: true,
            notices: Vec::new(),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn is_online(&self) -> bool {
        self.online
    }

    pub fn overlay(&self) -> &Overlay {
        &self.overlay
    }

    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.snapshot.as_ref()
    }

    pub fn view(&self) -> View {
        let Some(snapshot) = &self.snapshot else {
            return View {
                online: self.online,
                loading: true,
                ..Default::default()
            };
        };

        let mut products = snapshot.products.clone();
        let mut services = snapshot.services.clone();
        for entry in &self.overlay.entries {
            apply(&entry.op, &mut products, &mut services);
        }

        View {
            products,
            movements: snapshot.movements.clone(),
            transactions: snapshot.transactions.clone(),
            balance_minor: snapshot.balance_minor,
            petty_cash: snapshot.petty_cash.clone(),
            petty_cash_balance_minor: snapshot.petty_cash_balance_minor,
            services,
            requests: snapshot.requests.clone(),
            online: self.online,
            loading: false,
        }
    }

    /// Record an optimistic change before issuing the real call.
    pub fn begin(&mut self, op: PendingOp) -> OpId {
        self.overlay.push(op)
    }

    /// Report how the real call went and converge on server state.
    pub async fn settle(&mut self, id: OpId, result: Result<MutationResponse, ApiError>) {
        match result {
            Ok(MutationResponse::Applied { .. }) => self.overlay.confirm(id),
            Ok(MutationResponse::Proposed { request }) => {
                self.overlay.remove(id);
                self.notify(
                    NoticeLevel::Info,
                    format!("sent for approval (request {})", request.id),
                );
            }
            Err(err) => {
                self.overlay.remove(id);
                if err.is_not_found() {
                    tracing::info!("target vanished, refreshing: {err}");
                }
                self.notify(NoticeLevel::Error, err.notice());
            }
        }
        self.refresh().await;
    }

    /// `begin`, run the call, `settle`.
    pub async fn perform<F>(&mut self, op: PendingOp, call: F)
    where
        F: Future<Output = Result<MutationResponse, ApiError>>,
    {
        let id = self.begin(op);
        let result = call.await;
        self.settle(id, result).await;
    }

    /// Replace the snapshot with fresh server state. Returns whether it worked.
    pub async fn refresh(&mut self) -> bool {
        match self.source.fetch().await {
            Ok(snapshot) => {
                self.overlay.rebase(&snapshot);
                if let Some(previous) = &self.snapshot {
                    let notices = resolutions(previous, &snapshot, self.source.actor_id());
                    self.notices.extend(notices);
                }
                self.snapshot = Some(snapshot);
                true
            }
            Err(err) => {
                tracing::warn!("refresh failed: {err}");
                false
            }
        }
    }

    pub async fn handle_feed(&mut self, item: FeedItem) {
        match item {
            FeedItem::Event(event) => {
                tracing::debug!(?event, "change event");
                self.refresh().await;
            }
            FeedItem::Lagged => {
                tracing::debug!("missed events, refreshing");
                self.refresh().await;
            }
            FeedItem::Disconnected => {
                self.online = false;
            }
            FeedItem::Reconnected => {
                self.online = true;
                self.refresh().await;
            }
        }
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    fn notify(&mut self, level: NoticeLevel, message: String) {
        self.notices.push(Notice { level, message });
    }

    /// Refresh on every feed item and every `refresh_every`, publishing the
    /// merged view and forwarding notices. Ends when the feed closes.
    pub async fn run(
        mut self,
        mut feed: mpsc::Receiver<FeedItem>,
        refresh_every: Duration,
        views: watch::Sender<View>,
        notices: mpsc::UnboundedSender<Notice>,
    ) {
        let mut ticker = tokio::time::interval(refresh_every);
        // The first tick fires at once and doubles as the initial load.
        loop {
            tokio::select! {
                item = feed.recv() => {
                    let Some(item) = item else {
                        tracing::debug!("event feed closed");
                        return;
                    };
                    self.handle_feed(item).await;
                }
                _ = ticker.tick() => {
                    self.refresh().await;
                }
            }
            views.send_replace(self.view());
            for notice in self.take_notices() {
                // Nobody is reading them any more.
                let _ = notices.send(notice);
            }
        }
    }
}

/// One notice per request that got decided between two snapshots.
fn resolutions(previous: &Snapshot, next: &Snapshot, actor_id: Option<Uuid>) -> Vec<Notice> {
    let before: HashMap<Uuid, RequestStatus> = previous
        .requests
        .iter()
        .map(|request| (request.id, request.status))
        .collect();

    next.requests
        .iter()
        .filter(|request| actor_id.is_none_or(|actor| request.requester_id == actor))
        .filter(|request| before.get(&request.id) != Some(&request.status))
        .filter_map(|request| match request.status {
            RequestStatus::Approved => Some(Notice {
                level: NoticeLevel::Info,
                message: format!("request {} was approved", request.id),
            }),
            RequestStatus::Rejected => Some(Notice {
                level: NoticeLevel::Error,
                message: match &request.note {
                    Some(note) => format!("request {} was rejected: {note}", request.id),
                    None => format!("request {} was rejected", request.id),
                },
            }),
            RequestStatus::Pending | RequestStatus::Withdrawn => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn product(stock: i64) -> Product {
        Product {
            id: Uuid::new_v4(),
            name: "Cable".to_string(),
            category: None,
            price_minor: 500,
            cost_price_minor: 200,
            stock,
            min_stock: 2,
            status: ProductStatus::Active,
            version: 1,
            low_stock: stock <= 2,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn rebase_drops_confirmed_and_conflicting_ops() {
        let cable = product(3);
        let snapshot = Snapshot {
            products: vec![cable.clone()],
            ..Default::default()
        };

        let mut overlay = Overlay::default();
        let confirmed = overlay.push(PendingOp::AdjustStock {
            product_id: cable.id,
            delta: -1,
        });
        overlay.confirm(confirmed);
        overlay.push(PendingOp::AdjustStock {
            product_id: cable.id,
            delta: -2,
        });
        // Would leave stock at -1 on top of the previous op.
        overlay.push(PendingOp::AdjustStock {
            product_id: cable.id,
            delta: -2,
        });
        overlay.push(PendingOp::DeleteProduct {
            product_id: Uuid::new_v4(),
        });

        overlay.rebase(&snapshot);
        assert_eq!(overlay.len(), 1);
    }

    #[test]
    fn stale_version_edit_conflicts() {
        let cable = product(3);
        let op = PendingOp::UpdateProduct {
            product_id: cable.id,
            patch: ProductPatch {
                price_minor: Some(900),
                expected_version: Some(0),
                ..Default::default()
            },
        };
        assert!(conflicts(&op, &[cable], &[]));
    }

    #[test]
    fn adjust_updates_derived_fields() {
        let cable = product(3);
        let mut products = vec![cable.clone()];
        apply(
            &PendingOp::AdjustStock {
                product_id: cable.id,
                delta: -3,
            },
            &mut products,
            &mut Vec::new(),
        );
        assert_eq!(products[0].stock, 0);
        assert_eq!(products[0].status, ProductStatus::OutOfStock);
        assert!(products[0].low_stock);
    }
}
