//! The module contains the errors the engine can throw.
//!
//! The errors are:
//!
//! - [`Validation`] thrown when a mutation breaks an invariant before any write.
//! - [`Unauthorized`] thrown when the actor lacks the role for a direct action.
//! - [`KeyNotFound`] thrown when an item is not found.
//! - [`AlreadyResolved`] thrown when a permission request left `pending` already.
//!
//!  [`Validation`]: EngineError::Validation
//!  [`Unauthorized`]: EngineError::Unauthorized
//!  [`KeyNotFound`]: EngineError::KeyNotFound
//!  [`AlreadyResolved`]: EngineError::AlreadyResolved
use sea_orm::DbErr;
use thiserror::Error;

use crate::validation::ValidationError;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Validation(ValidationError),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("\"{0}\" key not found!")]
    KeyNotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Request already resolved: {0}")]
    AlreadyResolved(String),
    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),
    #[error("Invalid id: {0}")]
    InvalidId(String),
    #[error("Invalid role: {0}")]
    InvalidRole(String),
    /// Lost a compare-and-swap on `products.version`; retried by the engine.
    #[error("Stale write: {0}")]
    StaleWrite(String),
    #[error("Invalid payload: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl From<ValidationError> for EngineError {
    fn from(value: ValidationError) -> Self {
        match value {
            ValidationError::NotFound(what) => Self::KeyNotFound(what),
            other => Self::Validation(other),
        }
    }
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Validation(a), Self::Validation(b)) => a == b,
            (Self::Unauthorized(a), Self::Unauthorized(b)) => a == b,
            (Self::KeyNotFound(a), Self::KeyNotFound(b)) => a == b,
            (Self::Conflict(a), Self::Conflict(b)) => a == b,
            (Self::AlreadyResolved(a), Self::AlreadyResolved(b)) => a == b,
            (Self::InsufficientFunds(a), Self::InsufficientFunds(b)) => a == b,
            (Self::InvalidId(a), Self::InvalidId(b)) => a == b,
            (Self::InvalidRole(a), Self::InvalidRole(b)) => a == b,
            (Self::StaleWrite(a), Self::StaleWrite(b)) => a == b,
            (Self::Serialization(a), Self::Serialization(b)) => a.to_string() == b.to_string(),
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
