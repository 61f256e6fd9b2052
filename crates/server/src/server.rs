use axum::{
    Router,
    extract::{Request, State},
    middleware::{self, Next},
    response::Response,
    routing::{get, patch, post},
};
use axum_extra::{
    TypedHeader,
    headers::{Error as AxumError, Header},
};
use uuid::Uuid;

use std::{net::SocketAddr, sync::Arc};

use crate::{ServerError, audit, events, ledger, permissions, products, services};
use engine::{Engine, EngineError};

static ACTOR_HEADER: axum::http::HeaderName =
    axum::http::HeaderName::from_static(api_types::ACTOR_HEADER);

#[derive(Clone)]
pub struct ServerState {
    pub engine: Arc<Engine>,
}

/// `TypedHeader` for the caller identity
///
/// Every request must carry the actor id in "x-user-id"; the id comes from the
/// external auth collaborator.
#[derive(Debug)]
struct ActorHeader(Uuid);

impl Header for ActorHeader {
    fn name() -> &'static axum::http::HeaderName {
        &ACTOR_HEADER
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, AxumError>
    where
        Self: Sized,
        I: Iterator<Item = &'i axum::http::HeaderValue>,
    {
        let value = values.next().ok_or_else(AxumError::invalid)?;
        let Ok(value) = value.to_str() else {
            return Err(AxumError::invalid());
        };
        let Ok(value) = Uuid::parse_str(value.trim()) else {
            return Err(AxumError::invalid());
        };

        Ok(ActorHeader(value))
    }

    fn encode<E: Extend<axum::http::HeaderValue>>(&self, values: &mut E) {
        let as_string = self.0.to_string();
        match axum::http::HeaderValue::from_str(&as_string) {
            Ok(value) => values.extend(std::iter::once(value)),
            Err(_) => tracing::error!("failed to encode x-user-id header"),
        }
    }
}

/// Resolve the caller once per request and hand handlers an `ActorContext`.
async fn auth(
    actor_header: Option<TypedHeader<ActorHeader>>,
    State(state): State<ServerState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ServerError> {
    let Some(TypedHeader(ActorHeader(actor_id))) = actor_header else {
        return Err(ServerError::Unauthenticated(
            "missing or malformed x-user-id header".to_string(),
        ));
    };

    let ctx = match state.engine.resolve_actor(actor_id).await {
        Ok(ctx) => ctx,
        Err(EngineError::Unauthorized(message)) => {
            return Err(ServerError::Unauthenticated(message));
        }
        Err(err) => return Err(err.into()),
    };

    request.extensions_mut().insert(ctx);
    Ok(next.run(request).await)
}

pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/products", get(products::list).post(products::create))
        .route(
            "/products/{id}",
            patch(products::update).delete(products::delete),
        )
        .route("/products/adjust-stock", post(products::adjust_stock))
        .route("/products/{id}/quick-sell", post(products::quick_sell))
        .route("/stock-movements", get(products::movements))
        .route(
            "/transactions",
            get(ledger::list_transactions).post(ledger::create_transaction),
        )
        .route(
            "/transactions/{id}",
            patch(ledger::update_transaction).delete(ledger::delete_transaction),
        )
        .route(
            "/petty-cash",
            get(ledger::list_petty_cash).post(ledger::record_petty_cash),
        )
        .route("/services", get(services::list).post(services::create))
        .route(
            "/services/{id}",
            patch(services::update).delete(services::delete),
        )
        .route("/services/{id}/status", patch(services::update_status))
        .route(
            "/permission-requests",
            get(permissions::list).post(permissions::propose),
        )
        .route("/permission-requests/{id}", patch(permissions::resolve))
        .route(
            "/permission-requests/{id}/withdraw",
            post(permissions::withdraw),
        )
        .route("/audit-logs", get(audit::list))
        .route("/events", get(events::subscribe))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth))
        .with_state(state)
}

pub async fn run(engine: Engine, addr: SocketAddr) {
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!("failed to bind server listener: {err}");
            return;
        }
    };
    if let Err(err) = run_with_listener(engine, listener).await {
        tracing::error!("server failed: {err}");
    }
}

pub async fn run_with_listener(
    engine: Engine,
    listener: tokio::net::TcpListener,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!("Server listening on {}", addr);

    let state = ServerState {
        engine: Arc::new(engine),
    };

    axum::serve(listener, router(state)).await
}

pub fn spawn_with_listener(
    engine: Engine,
    listener: tokio::net::TcpListener,
) -> Result<SocketAddr, std::io::Error> {
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        if let Err(err) = run_with_listener(engine, listener).await {
            tracing::error!("server failed: {err}");
        }
    });

    Ok(addr)
}
