use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::UserId;

use super::{
    check_password, hash_password, normalize_email, verify_password, AuthError, AuthProvider,
    AuthSession, Claims, Sessions,
};

struct Account {
    user_id: UserId,
    email: String,
    password_hash: String,
}

/// Identity provider that keeps accounts in process memory.
/// User ids are assigned sequentially as `user-1`, `user-2`, ...
pub struct MemoryAuth {
    cost: u32,
    accounts: Mutex<Vec<Account>>,
    sessions: Sessions,
}

impl MemoryAuth {
    pub fn new(cost: u32) -> Self {
        Self {
            cost,
            accounts: Mutex::new(Vec::new()),
            sessions: Sessions::default(),
        }
    }

    fn accounts(&self) -> Result<std::sync::MutexGuard<'_, Vec<Account>>, AuthError> {
        self.accounts
            .lock()
            .map_err(|_| AuthError::Unreachable("account table lock poisoned".to_string()))
    }
}

#[async_trait]
impl AuthProvider for MemoryAuth {
    async fn register(&self, email: &str, password: &str) -> Result<UserId, AuthError> {
        let email = normalize_email(email)?;
        check_password(password)?;
        let password_hash = hash_password(password, self.cost)?;

        let mut accounts = self.accounts()?;
        if accounts.iter().any(|a| a.email == email) {
            return Err(AuthError::DuplicateEmail(email));
        }
        let user_id = format!("user-{}", accounts.len() + 1);
        accounts.push(Account {
            user_id: user_id.clone(),
            email,
            password_hash,
        });
        Ok(user_id)
    }

    async fn login(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        let email = email.trim().to_lowercase();
        let (user_id, email) = {
            let accounts = self.accounts()?;
            let account = accounts
                .iter()
                .find(|a| a.email == email)
                .filter(|a| verify_password(password, &a.password_hash))
                .ok_or(AuthError::InvalidCredentials)?;
            (account.user_id.clone(), account.email.clone())
        };
        self.sessions.open(user_id, email)
    }

    async fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        self.sessions.verify(token)
    }

    async fn logout(&self, token: &str) -> Result<(), AuthError> {
        self.sessions.close(token)
    }
}
