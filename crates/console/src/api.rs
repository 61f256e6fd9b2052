use api_types::{
    ACTOR_HEADER, ErrorBody,
    outcome::MutationResponse,
    permission::{Decision, Mutation, PermissionRequest, RequestStatus, Resolve, Withdraw},
    petty_cash::PettyCashList,
    product::{Product, ProductNew, ProductPatch},
    service::{Service, ServiceNew, ServiceStatus, ServiceStatusUpdate},
    stock::{AdjustStock, QuickSell, StockMovement},
    transaction::TransactionList,
};
use reqwest::{Method, StatusCode, Url};
use serde::{Serialize, de::DeserializeOwned};
use uuid::Uuid;

use crate::{
    error::{ApiError, ConsoleError},
    reconciler::{Snapshot, StateSource},
};

/// HTTP client for one actor.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: Url,
    actor_id: Uuid,
    http: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: &str, actor_id: Uuid) -> Result<Self, ConsoleError> {
        let base_url = Url::parse(base_url).map_err(|err| ConsoleError::Url(err.to_string()))?;
        Ok(Self {
            base_url,
            actor_id,
            http: reqwest::Client::new(),
        })
    }

    pub fn actor_id(&self) -> Uuid {
        self.actor_id
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url.join(path).map_err(|err| ApiError::Server {
            status: StatusCode::BAD_REQUEST,
            message: format!("invalid endpoint {path}: {err}"),
        })
    }

    fn request(&self, method: Method, url: Url) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .header(ACTOR_HEADER, self.actor_id.to_string())
    }

    async fn send<T: DeserializeOwned>(
        &self,
        builder: reqwest::RequestBuilder,
        what: &str,
    ) -> Result<T, ApiError> {
        let res = builder.send().await?;
        if res.status().is_success() {
            return Ok(res.json::<T>().await?);
        }

        let status = res.status();
        let message = res
            .json::<ErrorBody>()
            .await
            .map(|body| body.error)
            .unwrap_or_else(|_| "unknown error".to_string());

        if status == StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound(what.to_string()));
        }
        Err(ApiError::Server { status, message })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = self.endpoint(path)?;
        self.send(self.request(Method::GET, url), path).await
    }

    async fn write<B: Serialize, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let url = self.endpoint(path)?;
        self.send(self.request(method, url).json(body), path).await
    }

    pub async fn products(&self) -> Result<Vec<Product>, ApiError> {
        self.get("products").await
    }

    /// Newest first. `None` returns the whole history.
    pub async fn stock_movements(
        &self,
        limit: Option<u64>,
    ) -> Result<Vec<StockMovement>, ApiError> {
        match limit {
            Some(limit) => self.get(&format!("stock-movements?limit={limit}")).await,
            None => self.get("stock-movements").await,
        }
    }

    pub async fn petty_cash(&self) -> Result<PettyCashList, ApiError> {
        self.get("petty-cash").await
    }

    pub async fn transactions(&self) -> Result<TransactionList, ApiError> {
        self.get("transactions").await
    }

    pub async fn services(&self) -> Result<Vec<Service>, ApiError> {
        self.get("services").await
    }

    pub async fn permission_requests(
        &self,
        status: Option<RequestStatus>,
    ) -> Result<Vec<PermissionRequest>, ApiError> {
        match status {
            Some(status) => {
                let status = match status {
                    RequestStatus::Pending => "pending",
                    RequestStatus::Approved => "approved",
                    RequestStatus::Rejected => "rejected",
                    RequestStatus::Withdrawn => "withdrawn",
                };
                self.get(&format!("permission-requests?status={status}"))
                    .await
            }
            None => self.get("permission-requests").await,
        }
    }

    pub async fn create_product(&self, product: &ProductNew) -> Result<MutationResponse, ApiError> {
        self.write(Method::POST, "products", product).await
    }

    pub async fn update_product(
        &self,
        product_id: Uuid,
        patch: &ProductPatch,
    ) -> Result<MutationResponse, ApiError> {
        self.write(Method::PATCH, &format!("products/{product_id}"), patch)
            .await
    }

    pub async fn delete_product(
        &self,
        product_id: Uuid,
        expected_version: Option<i64>,
    ) -> Result<MutationResponse, ApiError> {
        let path = match expected_version {
            Some(version) => format!("products/{product_id}?expected_version={version}"),
            None => format!("products/{product_id}"),
        };
        let url = self.endpoint(&path)?;
        self.send(self.request(Method::DELETE, url), &path).await
    }

    pub async fn adjust_stock(&self, adjust: &AdjustStock) -> Result<MutationResponse, ApiError> {
        self.write(Method::POST, "products/adjust-stock", adjust)
            .await
    }

    pub async fn quick_sell(
        &self,
        product_id: Uuid,
        reason: Option<String>,
    ) -> Result<MutationResponse, ApiError> {
        self.write(
            Method::POST,
            &format!("products/{product_id}/quick-sell"),
            &QuickSell { reason },
        )
        .await
    }

    pub async fn create_service(&self, service: &ServiceNew) -> Result<MutationResponse, ApiError> {
        self.write(Method::POST, "services", service).await
    }

    pub async fn update_service_status(
        &self,
        service_id: Uuid,
        status: ServiceStatus,
    ) -> Result<MutationResponse, ApiError> {
        self.write(
            Method::PATCH,
            &format!("services/{service_id}/status"),
            &ServiceStatusUpdate { status },
        )
        .await
    }

    pub async fn propose(&self, mutation: &Mutation) -> Result<PermissionRequest, ApiError> {
        self.write(Method::POST, "permission-requests", mutation)
            .await
    }

    pub async fn resolve(
        &self,
        request_id: Uuid,
        status: Decision,
        note: Option<String>,
    ) -> Result<PermissionRequest, ApiError> {
        self.write(
            Method::PATCH,
            &format!("permission-requests/{request_id}"),
            &Resolve { status, note },
        )
        .await
    }

    pub async fn withdraw(
        &self,
        request_id: Uuid,
        note: Option<String>,
    ) -> Result<PermissionRequest, ApiError> {
        self.write(
            Method::POST,
            &format!("permission-requests/{request_id}/withdraw"),
            &Withdraw { note },
        )
        .await
    }

    /// Open the change event stream; the caller reads the body.
    pub async fn open_events(&self) -> Result<reqwest::Response, ApiError> {
        let url = self.endpoint("events")?;
        let res = self
            .request(Method::GET, url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await?;
        if res.status().is_success() {
            return Ok(res);
        }
        let status = res.status();
        Err(ApiError::Server {
            status,
            message: format!("event stream refused with {status}"),
        })
    }
}

impl StateSource for ApiClient {
    async fn fetch(&self) -> Result<Snapshot, ApiError> {
        let products = self.products().await?;
        let movements = self.stock_movements(None).await?;
        let TransactionList {
            transactions,
            balance_minor,
        } = self.transactions().await?;
        let PettyCashList {
            entries: petty_cash,
            balance_minor: petty_cash_balance_minor,
        } = self.petty_cash().await?;
        let services = self.services().await?;
        // Employees only see their own; admins see everyone's.
        let requests = self.permission_requests(None).await?;

        Ok(Snapshot {
            products,
            movements,
            transactions,
            balance_minor,
            petty_cash,
            petty_cash_balance_minor,
            services,
            requests,
        })
    }

    fn actor_id(&self) -> Option<Uuid> {
        Some(self.actor_id)
    }
}
