use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{NewTransaction, Transaction, TransactionId, TransactionPatch};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Transaction not found: {0}")]
    NotFound(TransactionId),

    #[error("Store unreachable: {0}")]
    Unreachable(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Stored record is invalid: {0}")]
    InvalidRecord(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderBy {
    Date,
    CreatedAt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// Persistence boundary for transaction records.
///
/// The store owns the authoritative copy of every transaction and assigns
/// `id` and `created_at` on creation. Implementations are responsible for
/// their own per-record consistency.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Persist a new transaction and return it with its assigned identity.
    async fn create(&self, transaction: NewTransaction) -> Result<Transaction, StoreError>;

    /// Fetch a single transaction by id.
    async fn get(&self, id: &str) -> Result<Option<Transaction>, StoreError>;

    /// All transactions owned by `user_id`, in the requested order.
    /// Records with equal sort keys come back in no guaranteed order.
    async fn query_by_user(
        &self,
        user_id: &str,
        order_by: OrderBy,
        direction: Direction,
    ) -> Result<Vec<Transaction>, StoreError>;

    /// Apply a validated patch. Fails with `NotFound` for unknown ids.
    async fn update(&self, id: &str, patch: &TransactionPatch) -> Result<(), StoreError>;

    /// Permanently delete a transaction. Fails with `NotFound` for unknown ids.
    async fn delete(&self, id: &str) -> Result<(), StoreError>;
}
