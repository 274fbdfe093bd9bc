//! Turmas: class and assignment management for teachers
//!
//! Teachers sign in with email and password and manage their own classes
//! ("turmas") and the assignments ("atividades") given in each class, backed
//! by a hosted Supabase project whose row policies scope every read and
//! write to the signed-in teacher.

pub mod auth;
pub mod config;
pub mod controller;
pub mod dashboard;
pub mod error;
pub mod fetch;
pub mod models;
pub mod notify;
pub mod schema;
pub mod shell;
pub mod store;

use reqwest::Client;
use std::sync::Arc;

use crate::auth::{Auth, SessionProvider};
use crate::config::Config;
use crate::error::Result;
use crate::notify::Notifier;
use crate::shell::Shell;
use crate::store::{PostgrestStore, ResourceStore};

/// The wired-up application: one session provider and one store shared by
/// every component
pub struct Turmas {
    config: Config,
    session: Arc<SessionProvider>,
    store: Arc<PostgrestStore>,
}

impl Turmas {
    /// Build the clients for a project
    ///
    /// # Example
    ///
    /// ```
    /// use turmas::{config::Config, Turmas};
    ///
    /// let config = Config::new("https://your-project-url.supabase.co", "your-anon-key").unwrap();
    /// let app = Turmas::new(config);
    /// ```
    pub fn new(config: Config) -> Self {
        let http_client = Client::new();

        let auth = Arc::new(Auth::new(&config, http_client.clone()));
        let session = Arc::new(
            SessionProvider::new(auth).with_persist_session(config.options.persist_session),
        );
        let store = Arc::new(PostgrestStore::new(&config, http_client, session.clone()));

        Self {
            config,
            session,
            store,
        }
    }

    /// Build from `SUPABASE_URL` and `SUPABASE_ANON_KEY`
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(Config::from_env()?))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn session(&self) -> Arc<SessionProvider> {
        self.session.clone()
    }

    pub fn store(&self) -> Arc<dyn ResourceStore> {
        self.store.clone()
    }

    /// Entry shell reporting through `notifier`. Call
    /// [`SessionProvider::start`] before showing it.
    pub fn shell(&self, notifier: Arc<dyn Notifier>) -> Shell {
        Shell::new(self.session(), self.store(), notifier)
            .with_min_password_length(self.config.options.min_password_length)
    }
}

/// A convenience module for common imports
pub mod prelude {
    pub use crate::auth::{Session, SessionProvider, SessionState, User};
    pub use crate::config::{ClientOptions, Config};
    pub use crate::controller::{
        AssignmentController, AssignmentForm, ClassController, ClassForm, Mode,
    };
    pub use crate::dashboard::{Counts, Tab};
    pub use crate::error::Error;
    pub use crate::models::{Assignment, AssignmentStatus, Class, Profile};
    pub use crate::notify::{Notification, Notifier};
    pub use crate::shell::{AuthForm, AuthMode, Shell, View};
    pub use crate::store::ResourceStore;
    pub use crate::Turmas;
}
