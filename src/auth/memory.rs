//! In-process identity service paired with [`MemoryStore`]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{AuthBackend, Session, User};
use crate::error::AuthError;
use crate::store::MemoryStore;

struct Account {
    user: User,
    password: String,
}

/// Email/password accounts kept in memory. Signing in switches the identity
/// seen by the paired store; signing up fires the store's profile trigger.
pub struct MemoryAuth {
    store: MemoryStore,
    accounts: Mutex<HashMap<String, Account>>,
    min_password_length: usize,
    requests: AtomicUsize,
}

impl MemoryAuth {
    pub fn new(store: MemoryStore) -> Self {
        Self {
            store,
            accounts: Mutex::new(HashMap::new()),
            min_password_length: 6,
            requests: AtomicUsize::new(0),
        }
    }

    /// Number of sign-in, sign-up and sign-out requests received
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    fn issue(user: &User) -> Session {
        Session::new(
            format!("memory-access-{}", Uuid::new_v4()),
            format!("memory-refresh-{}", Uuid::new_v4()),
            user.clone(),
            3600,
        )
    }

    fn rejected(message: &str) -> AuthError {
        AuthError::Api {
            status: 400,
            message: message.to_string(),
        }
    }
}

#[async_trait]
impl AuthBackend for MemoryAuth {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let accounts = self.accounts.lock().await;
        let account = accounts
            .get(&email.to_lowercase())
            .filter(|a| a.password == password)
            .ok_or_else(|| Self::rejected("Invalid login credentials"))?;

        self.store.set_current_user(Some(account.user.id)).await;
        Ok(Self::issue(&account.user))
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
    ) -> Result<Session, AuthError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let key = email.to_lowercase();
        if !key.contains('@') {
            return Err(Self::rejected("Unable to validate email address: invalid format"));
        }
        if password.chars().count() < self.min_password_length {
            return Err(Self::rejected(&format!(
                "Password should be at least {} characters.",
                self.min_password_length
            )));
        }

        let mut accounts = self.accounts.lock().await;
        if accounts.contains_key(&key) {
            return Err(Self::rejected("User already registered"));
        }

        let user = User {
            id: Uuid::new_v4(),
            email: Some(key.clone()),
            user_metadata: serde_json::json!({ "full_name": full_name }),
            created_at: Some(chrono::Utc::now().to_rfc3339()),
        };
        accounts.insert(
            key,
            Account {
                user: user.clone(),
                password: password.to_string(),
            },
        );

        self.store.create_profile_for(user.id, full_name).await;
        self.store.set_current_user(Some(user.id)).await;
        Ok(Self::issue(&user))
    }

    async fn sign_out(&self, _session: &Session) -> Result<(), AuthError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.store.set_current_user(None).await;
        Ok(())
    }
}
