//! Entry shell: chooses between the auth form and the workspace from the
//! session state, and rebuilds the workspace whenever the identity changes.

use std::sync::Arc;
use tokio::sync::watch;
use uuid::Uuid;

use crate::auth::{SessionProvider, SessionState, User};
use crate::controller::{
    AssignmentController, ClassController, ListFormController, ParentOption,
};
use crate::dashboard::{Dashboard, DashboardHandle, Tab};
use crate::error::{AuthError, Error, ValidationError};
use crate::notify::Notifier;
use crate::store::ResourceStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuthMode {
    #[default]
    SignIn,
    SignUp,
}

/// State of the sign-in / sign-up form
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthForm {
    pub mode: AuthMode,
    pub email: String,
    pub password: String,
    /// Only checked on sign-up
    pub confirm_password: String,
    /// Only sent on sign-up
    pub full_name: String,
}

impl AuthForm {
    pub fn sign_in(email: &str, password: &str) -> Self {
        Self {
            mode: AuthMode::SignIn,
            email: email.to_string(),
            password: password.to_string(),
            ..Default::default()
        }
    }

    pub fn sign_up(email: &str, password: &str, confirm_password: &str, full_name: &str) -> Self {
        Self {
            mode: AuthMode::SignUp,
            email: email.to_string(),
            password: password.to_string(),
            confirm_password: confirm_password.to_string(),
            full_name: full_name.to_string(),
        }
    }

    /// Switch between sign-in and sign-up, keeping what was typed
    pub fn toggle_mode(&mut self) {
        self.mode = match self.mode {
            AuthMode::SignIn => AuthMode::SignUp,
            AuthMode::SignUp => AuthMode::SignIn,
        };
    }

    pub fn validate(&self, min_password_length: usize) -> Result<(), ValidationError> {
        let email = self.email.trim();
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {}
            _ => return Err(ValidationError::InvalidEmail),
        }
        if self.password.is_empty() {
            return Err(ValidationError::MissingField("password"));
        }

        if self.mode == AuthMode::SignUp {
            if self.full_name.trim().is_empty() {
                return Err(ValidationError::MissingField("full_name"));
            }
            if self.password != self.confirm_password {
                return Err(ValidationError::PasswordMismatch);
            }
            if self.password.chars().count() < min_password_length {
                return Err(ValidationError::PasswordTooShort(min_password_length));
            }
        }
        Ok(())
    }
}

/// What the shell should display
#[derive(Debug, Clone, PartialEq)]
pub enum View {
    Loading,
    Anonymous,
    Authenticated(User),
}

impl From<&SessionState> for View {
    fn from(state: &SessionState) -> Self {
        if state.loading {
            return View::Loading;
        }
        match state.user() {
            Some(user) => View::Authenticated(user.clone()),
            None => View::Anonymous,
        }
    }
}

/// Everything shown to a signed-in teacher
pub struct Workspace {
    user_id: Uuid,
    dashboard: DashboardHandle,
    classes: ClassController,
    assignments: AssignmentController,
    classes_seen: u64,
}

impl Workspace {
    pub fn new(
        user_id: Uuid,
        store: Arc<dyn ResourceStore>,
        session: Arc<SessionProvider>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let dashboard = DashboardHandle::new(Dashboard::new(store.clone(), session.clone()));
        let refresh = Arc::new(dashboard.clone());
        let classes = ListFormController::new(store.clone(), session.clone(), notifier.clone())
            .with_refresh(refresh.clone());
        let assignments =
            ListFormController::new(store, session, notifier).with_refresh(refresh);
        Self {
            user_id,
            dashboard,
            classes,
            assignments,
            classes_seen: 0,
        }
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn dashboard(&self) -> &DashboardHandle {
        &self.dashboard
    }

    pub fn classes(&mut self) -> &mut ClassController {
        &mut self.classes
    }

    /// The assignment manager, with its class selector brought up to date
    /// if classes changed since it was last filled
    pub fn assignments(&mut self) -> &mut AssignmentController {
        let revision = self.classes.revision();
        if revision != self.classes_seen {
            let mut options: Vec<_> = self
                .classes
                .rows()
                .iter()
                .map(|class| ParentOption {
                    id: class.id,
                    label: class.name.clone(),
                })
                .collect();
            options.sort_by(|a, b| a.label.cmp(&b.label));
            self.assignments.set_parent_options(options);
            self.classes_seen = revision;
        }
        &mut self.assignments
    }

    /// Initial load: profile, counts, then the selected tab
    pub async fn open(&mut self) {
        {
            let mut dashboard = self.dashboard.lock().await;
            if let Err(err) = dashboard.load_profile().await {
                log::warn!("loading profile failed: {}", err);
            }
            dashboard.refresh().await;
        }
        let tab = self.dashboard.lock().await.tab();
        self.load_tab(tab).await;
    }

    /// Switch tabs and reload the list shown there
    pub async fn select_tab(&mut self, tab: Tab) {
        self.dashboard.lock().await.select_tab(tab);
        self.load_tab(tab).await;
    }

    // Failures are already reported through the notifier
    async fn load_tab(&mut self, tab: Tab) {
        match tab {
            Tab::Classes => {
                let _ = self.classes.load().await;
            }
            Tab::Assignments => {
                if self.assignments.load_parent_options().await.is_ok() {
                    self.classes_seen = self.classes.revision();
                }
                let _ = self.assignments.load().await;
            }
        }
    }
}

pub struct Shell {
    session: Arc<SessionProvider>,
    store: Arc<dyn ResourceStore>,
    notifier: Arc<dyn Notifier>,
    changes: watch::Receiver<SessionState>,
    min_password_length: usize,
    workspace: Option<Workspace>,
}

impl Shell {
    pub fn new(
        session: Arc<SessionProvider>,
        store: Arc<dyn ResourceStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let changes = session.subscribe();
        Self {
            session,
            store,
            notifier,
            changes,
            min_password_length: 6,
            workspace: None,
        }
    }

    pub fn with_min_password_length(mut self, length: usize) -> Self {
        self.min_password_length = length;
        self
    }

    pub fn view(&self) -> View {
        View::from(&*self.changes.borrow())
    }

    pub fn workspace(&mut self) -> Option<&mut Workspace> {
        self.workspace.as_mut()
    }

    /// Validate the form and, if it passes, sign in or sign up. Provider
    /// errors are returned verbatim; the form is left as typed. Fails with
    /// [`AuthError::SessionNotKept`] when the provider does not keep sessions,
    /// since no workspace can open.
    pub async fn submit_auth(&mut self, form: &AuthForm) -> Result<(), Error> {
        form.validate(self.min_password_length)?;

        let email = form.email.trim();
        let session = match form.mode {
            AuthMode::SignIn => self.session.sign_in(email, &form.password).await?,
            AuthMode::SignUp => {
                self.session
                    .sign_up(email, &form.password, form.full_name.trim())
                    .await?
            }
        };
        self.sync().await;

        // Without persistence the identity is verified but never installed
        if self.session.user_id() != Some(session.user.id) {
            return Err(AuthError::SessionNotKept {
                email: email.to_string(),
            }
            .into());
        }
        Ok(())
    }

    pub async fn sign_out(&mut self) -> Result<(), Error> {
        self.session.sign_out().await?;
        self.sync().await;
        Ok(())
    }

    /// Wait for the next session change and apply it. Returns false once the
    /// provider is gone.
    pub async fn next_change(&mut self) -> bool {
        if self.changes.changed().await.is_err() {
            return false;
        }
        self.sync().await;
        true
    }

    /// Bring the workspace in line with the current identity: drop it when
    /// signed out, rebuild it when the user changed.
    pub async fn sync(&mut self) {
        let user = self.changes.borrow_and_update().user().map(|u| u.id);
        match user {
            None => {
                if self.workspace.take().is_some() {
                    log::debug!("workspace closed");
                }
            }
            Some(id) if self.workspace.as_ref().map(Workspace::user_id) == Some(id) => {}
            Some(id) => {
                log::debug!("opening workspace for {}", id);
                let mut workspace = Workspace::new(
                    id,
                    self.store.clone(),
                    self.session.clone(),
                    self.notifier.clone(),
                );
                workspace.open().await;
                self.workspace = Some(workspace);
            }
        }
    }
}
