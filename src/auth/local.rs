use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::domain::UserId;

use super::{
    check_password, hash_password, normalize_email, verify_password, AuthError, AuthProvider,
    AuthSession, Claims, Sessions,
};

/// Identity provider backed by the `users` table of the ledger database.
pub struct LocalAuth {
    pool: SqlitePool,
    cost: u32,
    sessions: Sessions,
}

impl LocalAuth {
    /// An alias for the default bcrypt cost for hashing passwords.
    pub const DEFAULT_COST: u32 = bcrypt::DEFAULT_COST;

    /// Create a provider on an already migrated pool.
    ///
    /// `cost` is the bcrypt work factor; it must be between 4 and 31.
    pub fn new(pool: SqlitePool, cost: u32) -> Self {
        Self {
            pool,
            cost,
            sessions: Sessions::default(),
        }
    }
}

fn unreachable(action: &str, err: sqlx::Error) -> AuthError {
    tracing::error!("Failed to {action}: {err}");
    AuthError::Unreachable(format!("failed to {action}: {err}"))
}

#[async_trait]
impl AuthProvider for LocalAuth {
    async fn register(&self, email: &str, password: &str) -> Result<UserId, AuthError> {
        let email = normalize_email(email)?;
        check_password(password)?;

        let existing = sqlx::query("SELECT id FROM users WHERE email = ?")
            .bind(&email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| unreachable("look up user", e))?;
        if existing.is_some() {
            return Err(AuthError::DuplicateEmail(email));
        }

        let password_hash = hash_password(password, self.cost)?;
        let user_id = Uuid::new_v4().to_string();

        sqlx::query(
            r#"
            INSERT INTO users (id, email, password_hash, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&user_id)
        .bind(&email)
        .bind(&password_hash)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.is_unique_violation() {
                    return AuthError::DuplicateEmail(email.clone());
                }
            }
            unreachable("save user", e)
        })?;

        tracing::info!(%user_id, "registered new user");
        Ok(user_id)
    }

    async fn login(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        let email = email.trim().to_lowercase();

        let row = sqlx::query("SELECT id, email, password_hash FROM users WHERE email = ?")
            .bind(&email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| unreachable("look up user", e))?
            .ok_or(AuthError::InvalidCredentials)?;

        let password_hash: String = row
            .try_get("password_hash")
            .map_err(|e| unreachable("read password hash", e))?;
        if !verify_password(password, &password_hash) {
            return Err(AuthError::InvalidCredentials);
        }

        let user_id: String = row
            .try_get("id")
            .map_err(|e| unreachable("read user id", e))?;
        let email: String = row
            .try_get("email")
            .map_err(|e| unreachable("read email", e))?;

        tracing::debug!(%user_id, "user logged in");
        self.sessions.open(user_id, email)
    }

    async fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        self.sessions.verify(token)
    }

    async fn logout(&self, token: &str) -> Result<(), AuthError> {
        self.sessions.close(token)
    }
}
