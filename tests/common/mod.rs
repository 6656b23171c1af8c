// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use anyhow::Result;
use async_trait::async_trait;
use fintrack::application::LedgerService;
use fintrack::auth::MemoryAuth;
use fintrack::domain::{NewTransaction, Transaction, TransactionPatch};
use fintrack::storage::{Direction, MemoryStore, OrderBy, StoreError, TransactionStore};
use tempfile::TempDir;

/// Cheapest bcrypt cost, to keep password hashing fast in tests.
pub const TEST_COST: u32 = 4;

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(LedgerService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let service = LedgerService::init(db_path.to_str().unwrap(), TEST_COST).await?;
    Ok((service, temp_dir))
}

/// Test fixture: the salary/food/transport ledger used across tests.
pub async fn seed_standard_ledger(service: &LedgerService, user_id: &str) -> Result<()> {
    service
        .add_transaction(user_id, "income", "1000", "salary", "2024-01-01", "January pay")
        .await?;
    service
        .add_transaction(user_id, "expense", "150", "food", "2024-01-05", "groceries")
        .await?;
    service
        .add_transaction(user_id, "expense", "50", "transport", "2024-01-10", "")
        .await?;
    Ok(())
}

/// A memory store that counts how often `create` reaches it.
#[derive(Default)]
pub struct CountingStore {
    inner: MemoryStore,
    creates: Arc<AtomicUsize>,
}

impl CountingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counter(&self) -> Arc<AtomicUsize> {
        self.creates.clone()
    }
}

#[async_trait]
impl TransactionStore for CountingStore {
    async fn create(&self, transaction: NewTransaction) -> Result<Transaction, StoreError> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        self.inner.create(transaction).await
    }

    async fn get(&self, id: &str) -> Result<Option<Transaction>, StoreError> {
        self.inner.get(id).await
    }

    async fn query_by_user(
        &self,
        user_id: &str,
        order_by: OrderBy,
        direction: Direction,
    ) -> Result<Vec<Transaction>, StoreError> {
        self.inner.query_by_user(user_id, order_by, direction).await
    }

    async fn update(&self, id: &str, patch: &TransactionPatch) -> Result<(), StoreError> {
        self.inner.update(id, patch).await
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.inner.delete(id).await
    }
}

/// A service over a [CountingStore], plus the store's create counter.
pub fn counting_service() -> (LedgerService, Arc<AtomicUsize>) {
    let store = CountingStore::new();
    let creates = store.counter();
    let service = LedgerService::new(Arc::new(store), Arc::new(MemoryAuth::new(TEST_COST)));
    (service, creates)
}
