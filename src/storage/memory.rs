use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::domain::{NewTransaction, Transaction, TransactionPatch};

use super::{Direction, OrderBy, StoreError, TransactionStore};

/// In-memory transaction store for tests and throwaway sessions.
/// Ids are assigned sequentially as `tx-1`, `tx-2`, ...
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    next_id: u64,
    transactions: Vec<Transaction>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored transactions across all users.
    ///
    /// Counts through a poisoned lock: a panic elsewhere does not lose records.
    pub fn len(&self) -> usize {
        let state = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        state.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryState>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Unreachable("memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl TransactionStore for MemoryStore {
    async fn create(&self, transaction: NewTransaction) -> Result<Transaction, StoreError> {
        let mut state = self.lock()?;
        state.next_id += 1;
        let created = transaction.into_transaction(format!("tx-{}", state.next_id), Utc::now());
        state.transactions.push(created.clone());
        Ok(created)
    }

    async fn get(&self, id: &str) -> Result<Option<Transaction>, StoreError> {
        let state = self.lock()?;
        Ok(state.transactions.iter().find(|t| t.id == id).cloned())
    }

    async fn query_by_user(
        &self,
        user_id: &str,
        order_by: OrderBy,
        direction: Direction,
    ) -> Result<Vec<Transaction>, StoreError> {
        let state = self.lock()?;
        let mut transactions: Vec<Transaction> = state
            .transactions
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();

        // Stable sort: equal keys keep insertion order
        transactions.sort_by(|a, b| {
            let ordering = match order_by {
                OrderBy::Date => a.date.cmp(&b.date),
                OrderBy::CreatedAt => a.created_at.cmp(&b.created_at),
            };
            match direction {
                Direction::Ascending => ordering,
                Direction::Descending => ordering.reverse(),
            }
        });

        Ok(transactions)
    }

    async fn update(&self, id: &str, patch: &TransactionPatch) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        let slot = state
            .transactions
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        *slot = slot.apply(patch);
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        let position = state
            .transactions
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        state.transactions.remove(position);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{make_transaction, FieldUpdates};

    fn new_tx(user: &str, date: &str, amount: &str) -> NewTransaction {
        make_transaction(user, "expense", amount, "food", date, "").unwrap()
    }

    #[tokio::test]
    async fn test_create_assigns_identity() {
        let store = MemoryStore::new();
        let input = new_tx("u1", "2024-01-01", "10");

        let created = store.create(input.clone()).await.unwrap();

        assert_eq!(created.id, "tx-1");
        assert_eq!(created.amount, input.amount);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("tx-1").await.unwrap(), Some(created));
    }

    #[tokio::test]
    async fn test_query_by_user_orders_and_filters() {
        let store = MemoryStore::new();
        store.create(new_tx("u1", "2024-01-05", "1")).await.unwrap();
        store.create(new_tx("u2", "2024-01-06", "2")).await.unwrap();
        store.create(new_tx("u1", "2024-03-01", "3")).await.unwrap();
        store.create(new_tx("u1", "2023-12-31", "4")).await.unwrap();

        let desc = store
            .query_by_user("u1", OrderBy::Date, Direction::Descending)
            .await
            .unwrap();
        let amounts: Vec<_> = desc.iter().map(|t| t.amount).collect();
        assert_eq!(amounts, vec![300, 100, 400]);

        let asc = store
            .query_by_user("u1", OrderBy::Date, Direction::Ascending)
            .await
            .unwrap();
        assert_eq!(asc.first().map(|t| t.amount), Some(400));

        assert!(store
            .query_by_user("nobody", OrderBy::Date, Direction::Descending)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_update_and_delete_unknown_id() {
        let store = MemoryStore::new();
        let patch = FieldUpdates::new().with_amount("1").validate().unwrap();

        assert_eq!(
            store.update("missing", &patch).await,
            Err(StoreError::NotFound("missing".to_string()))
        );
        assert_eq!(
            store.delete("missing").await,
            Err(StoreError::NotFound("missing".to_string()))
        );
    }

    #[tokio::test]
    async fn test_len_survives_poisoned_lock() {
        let store = std::sync::Arc::new(MemoryStore::new());
        store.create(new_tx("u1", "2024-01-01", "10")).await.unwrap();

        let poisoner = store.clone();
        let result = std::thread::spawn(move || {
            let _guard = poisoner.inner.lock().unwrap();
            panic!("poison the store");
        })
        .join();
        assert!(result.is_err());

        assert_eq!(store.len(), 1);
        assert!(!store.is_empty());
        assert!(matches!(
            store.get("tx-1").await,
            Err(StoreError::Unreachable(_))
        ));
    }

    #[tokio::test]
    async fn test_update_then_delete() {
        let store = MemoryStore::new();
        let created = store.create(new_tx("u1", "2024-01-01", "10")).await.unwrap();
        let patch = FieldUpdates::new().with_amount("99.99").validate().unwrap();

        store.update(&created.id, &patch).await.unwrap();
        let updated = store.get(&created.id).await.unwrap().unwrap();
        assert_eq!(updated.amount, 9999);
        assert_eq!(updated.created_at, created.created_at);

        store.delete(&created.id).await.unwrap();
        assert!(store.is_empty());
        assert_eq!(
            store.delete(&created.id).await,
            Err(StoreError::NotFound(created.id))
        );
    }
}
