use std::sync::Arc;

use crate::auth::{AuthProvider, AuthSession, Claims, LocalAuth, MemoryAuth};
use crate::domain::{
    make_transaction, summarize, FieldUpdates, Summary, Transaction, TransactionId, UserId,
};
use crate::storage::{
    Direction, MemoryStore, OrderBy, Repository, StoreError, TransactionStore,
};

use super::AppError;

/// Application service providing high-level operations for the ledger.
/// This is the primary interface for any client (CLI, shell, export, etc.).
///
/// The service holds no transactions of its own: every call goes to the store.
#[derive(Clone)]
pub struct LedgerService {
    store: Arc<dyn TransactionStore>,
    auth: Arc<dyn AuthProvider>,
}

impl LedgerService {
    /// Create a new ledger service over the given store and identity provider.
    pub fn new(store: Arc<dyn TransactionStore>, auth: Arc<dyn AuthProvider>) -> Self {
        Self { store, auth }
    }

    /// Initialize a new database at the given path.
    pub async fn init(database_path: &str, bcrypt_cost: u32) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let repo = Repository::init(&db_url).await?;
        Ok(Self::with_repository(repo, bcrypt_cost))
    }

    /// Connect to an existing database.
    pub async fn connect(database_path: &str, bcrypt_cost: u32) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = Repository::connect(&db_url).await?;
        Ok(Self::with_repository(repo, bcrypt_cost))
    }

    /// A service that forgets everything when dropped.
    pub fn in_memory(bcrypt_cost: u32) -> Self {
        Self::new(
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryAuth::new(bcrypt_cost)),
        )
    }

    fn with_repository(repo: Repository, bcrypt_cost: u32) -> Self {
        let auth = LocalAuth::new(repo.pool().clone(), bcrypt_cost);
        Self::new(Arc::new(repo), Arc::new(auth))
    }

    // ========================
    // Identity operations
    // ========================

    /// Create an account.
    pub async fn register(&self, email: &str, password: &str) -> Result<UserId, AppError> {
        Ok(self.auth.register(email, password).await?)
    }

    /// Log in and open a session.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthSession, AppError> {
        Ok(self.auth.login(email, password).await?)
    }

    /// Resolve a session token.
    pub async fn verify(&self, token: &str) -> Result<Claims, AppError> {
        Ok(self.auth.verify(token).await?)
    }

    /// Close a session.
    pub async fn logout(&self, token: &str) -> Result<(), AppError> {
        Ok(self.auth.logout(token).await?)
    }

    // ========================
    // Transaction operations
    // ========================

    /// Validate and record a new transaction, returning its store-assigned id.
    ///
    /// Invalid input is rejected before the store is contacted.
    pub async fn add_transaction(
        &self,
        user_id: &str,
        kind: &str,
        amount: &str,
        category: &str,
        date: &str,
        description: &str,
    ) -> Result<TransactionId, AppError> {
        let transaction = make_transaction(user_id, kind, amount, category, date, description)?;
        let created = self.store.create(transaction).await?;

        tracing::info!(id = %created.id, kind = %created.kind, "recorded transaction");
        Ok(created.id)
    }

    /// All transactions of a user, most recent date first.
    pub async fn list_transactions(&self, user_id: &str) -> Result<Vec<Transaction>, AppError> {
        Ok(self
            .store
            .query_by_user(user_id, OrderBy::Date, Direction::Descending)
            .await?)
    }

    /// Apply a partial update to a transaction.
    ///
    /// All present fields are validated first; nothing is written if any is
    /// invalid. Identity fields cannot be changed.
    pub async fn edit_transaction(
        &self,
        transaction_id: &str,
        updates: FieldUpdates,
    ) -> Result<(), AppError> {
        let patch = updates.validate()?;

        let current = self
            .store
            .get(transaction_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(transaction_id.to_string()))?;
        current.apply(&patch).check()?;

        self.store.update(transaction_id, &patch).await?;
        tracing::info!(id = %transaction_id, "updated transaction");
        Ok(())
    }

    /// Permanently delete a transaction.
    pub async fn remove_transaction(&self, transaction_id: &str) -> Result<(), AppError> {
        self.store.delete(transaction_id).await?;
        tracing::info!(id = %transaction_id, "deleted transaction");
        Ok(())
    }

    /// Summary statistics over a user's whole ledger.
    pub async fn summary(&self, user_id: &str) -> Result<Summary, AppError> {
        let transactions = self.list_transactions(user_id).await?;
        Ok(summarize(&transactions))
    }
}
