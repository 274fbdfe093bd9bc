//! Shared session state with change notification

use std::sync::Arc;
use tokio::sync::watch;
use uuid::Uuid;

use super::{AuthBackend, Session, User};
use crate::error::AuthError;

/// Snapshot of the session as seen by every consumer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub session: Option<Session>,

    /// True until the provider has been started
    pub loading: bool,
}

impl SessionState {
    pub fn user(&self) -> Option<&User> {
        self.session.as_ref().map(|s| &s.user)
    }
}

/// Session context built once at startup and handed to every component by
/// `Arc`. Dependents call [`SessionProvider::subscribe`] and are woken on each
/// sign-in, sign-up and sign-out.
pub struct SessionProvider {
    backend: Arc<dyn AuthBackend>,
    state: watch::Sender<SessionState>,
    persist_session: bool,
}

impl SessionProvider {
    pub fn new(backend: Arc<dyn AuthBackend>) -> Self {
        let (state, _) = watch::channel(SessionState {
            session: None,
            loading: true,
        });
        Self {
            backend,
            state,
            persist_session: true,
        }
    }

    /// When false, successful sign-ins are returned but not kept as the
    /// current session.
    pub fn with_persist_session(mut self, value: bool) -> Self {
        self.persist_session = value;
        self
    }

    /// Finish the initial load, installing a previously stored session if it
    /// is still valid.
    pub fn start(&self, restored: Option<Session>) {
        let session = restored.filter(|s| !s.is_expired());
        if let Some(session) = &session {
            log::info!("restored session for {}", session.user.id);
        }
        self.publish(session);
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn current(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn user(&self) -> Option<User> {
        self.state.borrow().user().cloned()
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.state.borrow().user().map(|u| u.id)
    }

    pub fn access_token(&self) -> Option<String> {
        self.state
            .borrow()
            .session
            .as_ref()
            .map(|s| s.access_token.clone())
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let session = self.backend.sign_in(email, password).await?;
        log::info!("signed in as {}", session.user.id);
        if self.persist_session {
            self.publish(Some(session.clone()));
        }
        Ok(session)
    }

    /// Create an identity and sign in. The profile row is written by the
    /// database afterwards, so callers must not expect it to exist yet.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
    ) -> Result<Session, AuthError> {
        let session = self.backend.sign_up(email, password, full_name).await?;
        log::info!("signed up {}", session.user.id);
        if self.persist_session {
            self.publish(Some(session.clone()));
        }
        Ok(session)
    }

    /// Sign out. On failure the current session is kept.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        let session = self
            .state
            .borrow()
            .session
            .clone()
            .ok_or(AuthError::MissingSession)?;
        self.backend.sign_out(&session).await?;
        log::info!("signed out {}", session.user.id);
        self.publish(None);
        Ok(())
    }

    fn publish(&self, session: Option<Session>) {
        self.state.send_replace(SessionState {
            session,
            loading: false,
        });
    }
}
