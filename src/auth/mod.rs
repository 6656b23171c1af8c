//! Identity boundary: registration, password log in and session tokens.
//!
//! The ledger only depends on the [AuthProvider] trait. [LocalAuth] keeps
//! users in the SQLite database, [MemoryAuth] keeps them in process memory.
//! Both hold session tokens in memory only, so a session ends with the process.

mod local;
mod memory;

use std::{collections::HashMap, str::FromStr, sync::Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use email_address::EmailAddress;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::UserId;

pub use local::LocalAuth;
pub use memory::MemoryAuth;

/// Passwords shorter than this are rejected at registration.
pub const MIN_PASSWORD_LENGTH: usize = 6;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("An account already exists for {0}")]
    DuplicateEmail(String),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Identity provider unreachable: {0}")]
    Unreachable(String),

    #[error("Invalid or expired session token")]
    InvalidToken,

    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    #[error("Password must be at least {MIN_PASSWORD_LENGTH} characters")]
    WeakPassword,
}

/// The result of a successful log in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub token: String,
    pub user_id: UserId,
    pub email: String,
}

/// What a verified session token says about its holder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: UserId,
    pub email: String,
    pub issued_at: DateTime<Utc>,
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Create an account and return its user id.
    async fn register(&self, email: &str, password: &str) -> Result<UserId, AuthError>;

    /// Check the credentials and open a session.
    async fn login(&self, email: &str, password: &str) -> Result<AuthSession, AuthError>;

    /// Resolve a session token to its claims.
    async fn verify(&self, token: &str) -> Result<Claims, AuthError>;

    /// End a session. Unknown tokens fail with `InvalidToken`.
    async fn logout(&self, token: &str) -> Result<(), AuthError>;
}

/// Trim and lowercase an email, rejecting anything that is not a valid address.
pub fn normalize_email(email: &str) -> Result<String, AuthError> {
    let email = email.trim().to_lowercase();
    match EmailAddress::from_str(&email) {
        Ok(address) => Ok(address.to_string()),
        Err(e) => {
            tracing::debug!("rejected email {email:?}: {e}");
            Err(AuthError::InvalidEmail(email))
        }
    }
}

pub fn check_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword);
    }
    Ok(())
}

pub(crate) fn hash_password(password: &str, cost: u32) -> Result<String, AuthError> {
    bcrypt::hash(password, cost).map_err(|e| {
        tracing::error!("an error occurred while hashing a password: {e}");
        AuthError::Unreachable(format!("could not hash password: {e}"))
    })
}

pub(crate) fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or_else(|e| {
        tracing::error!("Unhandled error while verifying credentials: {e}");
        false
    })
}

/// In-memory session tokens shared by the providers.
#[derive(Default)]
pub(crate) struct Sessions {
    tokens: Mutex<HashMap<String, Claims>>,
}

impl Sessions {
    pub(crate) fn open(&self, user_id: UserId, email: String) -> Result<AuthSession, AuthError> {
        let token = Uuid::new_v4().simple().to_string();
        let claims = Claims {
            user_id: user_id.clone(),
            email: email.clone(),
            issued_at: Utc::now(),
        };
        self.tokens
            .lock()
            .map_err(|_| AuthError::Unreachable("session table lock poisoned".to_string()))?
            .insert(token.clone(), claims);

        Ok(AuthSession {
            token,
            user_id,
            email,
        })
    }

    pub(crate) fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        self.tokens
            .lock()
            .map_err(|_| AuthError::Unreachable("session table lock poisoned".to_string()))?
            .get(token)
            .cloned()
            .ok_or(AuthError::InvalidToken)
    }

    pub(crate) fn close(&self, token: &str) -> Result<(), AuthError> {
        self.tokens
            .lock()
            .map_err(|_| AuthError::Unreachable("session table lock poisoned".to_string()))?
            .remove(token)
            .map(|_| ())
            .ok_or(AuthError::InvalidToken)
    }
}
