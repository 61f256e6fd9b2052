use api_types::ErrorBody;
use axum::{Json, http::StatusCode, response::IntoResponse};
use engine::EngineError;

pub use server::{ServerState, router, run, run_with_listener, spawn_with_listener};

mod audit;
mod convert;
mod events;
mod ledger;
mod permissions;
mod products;
mod server;
mod services;

pub enum ServerError {
    Engine(EngineError),
    Generic(String),
    /// No actor, or one the store doesn't know.
    Unauthenticated(String),
}

fn status_for_engine_error(err: &EngineError) -> StatusCode {
    match err {
        EngineError::Unauthorized(_) => StatusCode::FORBIDDEN,
        EngineError::KeyNotFound(_) => StatusCode::NOT_FOUND,
        EngineError::Conflict(_) | EngineError::AlreadyResolved(_) | EngineError::StaleWrite(_) => {
            StatusCode::CONFLICT
        }
        EngineError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        EngineError::Validation(_)
        | EngineError::InsufficientFunds(_)
        | EngineError::InvalidId(_)
        | EngineError::InvalidRole(_)
        | EngineError::Serialization(_) => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

fn message_for_engine_error(err: EngineError) -> String {
    match err {
        EngineError::Database(db_err) => {
            tracing::error!("database error: {db_err}");
            "internal server error".to_string()
        }
        other => other.to_string(),
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        let (status, error) = match self {
            ServerError::Engine(err) => (status_for_engine_error(&err), message_for_engine_error(err)),
            ServerError::Generic(err) => (StatusCode::BAD_REQUEST, err),
            ServerError::Unauthenticated(err) => (StatusCode::UNAUTHORIZED, err),
        };

        (status, Json(ErrorBody { error })).into_response()
    }
}

impl From<EngineError> for ServerError {
    fn from(value: EngineError) -> Self {
        Self::Engine(value)
    }
}

#[cfg(test)]
mod tests {
    use engine::ValidationError;
    use sea_orm::DbErr;

    use super::*;

    #[test]
    fn engine_unauthorized_maps_to_403() {
        let res =
            ServerError::from(EngineError::Unauthorized("employee".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn engine_not_found_maps_to_404() {
        let res = ServerError::from(EngineError::KeyNotFound("x".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn engine_conflicts_map_to_409() {
        for err in [
            EngineError::Conflict("x".to_string()),
            EngineError::AlreadyResolved("x".to_string()),
            EngineError::StaleWrite("x".to_string()),
        ] {
            let res = ServerError::from(err).into_response();
            assert_eq!(res.status(), StatusCode::CONFLICT);
        }
    }

    #[test]
    fn engine_validation_maps_to_422() {
        let res = ServerError::from(EngineError::Validation(ValidationError::InvalidQuantity(0)))
            .into_response();
        assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let res = ServerError::from(EngineError::InsufficientFunds("x".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn database_errors_hide_details() {
        let res = ServerError::from(EngineError::Database(DbErr::Custom("secret".to_string())))
            .into_response();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn unauthenticated_maps_to_401() {
        let res = ServerError::Unauthenticated("who?".to_string()).into_response();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn generic_maps_to_400() {
        let res = ServerError::Generic("bad".to_string()).into_response();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }
}
