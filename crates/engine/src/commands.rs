//! Command structs for ledger operations.
//!
//! These types group parameters for manual ledger writes
//! (transactions and petty cash), keeping call sites readable and avoiding
//! long argument lists.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{AuditCategory, PettyCashKind, TransactionKind, TransactionStatus};

/// Create a manual income or expense.
#[derive(Clone, Debug)]
pub struct TransactionCmd {
    pub kind: TransactionKind,
    pub amount_minor: i64,
    pub category: String,
    pub description: String,
    pub status: TransactionStatus,
    pub client_name: Option<String>,
    pub occurred_at: DateTime<Utc>,
    /// Defaults to `occurred_at`.
    pub due_at: Option<DateTime<Utc>>,
}

impl TransactionCmd {
    #[must_use]
    pub fn new(
        kind: TransactionKind,
        amount_minor: i64,
        category: impl Into<String>,
        description: impl Into<String>,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            kind,
            amount_minor,
            category: category.into(),
            description: description.into(),
            status: TransactionStatus::Paid,
            client_name: None,
            occurred_at,
            due_at: None,
        }
    }

    #[must_use]
    pub fn status(mut self, status: TransactionStatus) -> Self {
        self.status = status;
        self
    }

    #[must_use]
    pub fn client_name(mut self, client_name: impl Into<String>) -> Self {
        self.client_name = Some(client_name.into());
        self
    }

    #[must_use]
    pub fn due_at(mut self, due_at: DateTime<Utc>) -> Self {
        self.due_at = Some(due_at);
        self
    }
}

/// Partial edit of an unsettled transaction.
#[derive(Clone, Debug, Default)]
pub struct TransactionChanges {
    pub amount_minor: Option<i64>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub status: Option<TransactionStatus>,
    pub client_name: Option<String>,
    pub due_at: Option<DateTime<Utc>>,
}

impl TransactionChanges {
    pub fn is_empty(&self) -> bool {
        self.amount_minor.is_none()
            && self.category.is_none()
            && self.description.is_none()
            && self.status.is_none()
            && self.client_name.is_none()
            && self.due_at.is_none()
    }
}

/// Filters for listing transactions, newest first.
#[derive(Clone, Debug, Default)]
pub struct TransactionListFilter {
    pub kind: Option<TransactionKind>,
    pub status: Option<TransactionStatus>,
    pub limit: Option<u64>,
}

/// Filters for the stock movement log, newest first.
#[derive(Clone, Debug, Default)]
pub struct MovementListFilter {
    pub product_id: Option<Uuid>,
    pub limit: Option<u64>,
}

/// Filters for the audit log, newest first.
#[derive(Clone, Debug, Default)]
pub struct AuditListFilter {
    pub category: Option<AuditCategory>,
    pub actor_id: Option<Uuid>,
    pub limit: Option<u64>,
}

/// Record a petty cash deposit or withdrawal.
#[derive(Clone, Debug)]
pub struct PettyCashCmd {
    pub kind: PettyCashKind,
    pub amount_minor: i64,
    pub description: String,
    pub occurred_at: DateTime<Utc>,
}

impl PettyCashCmd {
    #[must_use]
    pub fn new(
        kind: PettyCashKind,
        amount_minor: i64,
        description: impl Into<String>,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            kind,
            amount_minor,
            description: description.into(),
            occurred_at,
        }
    }
}
