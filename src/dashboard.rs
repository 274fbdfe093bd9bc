//! Teacher dashboard: profile header, summary counts and the tab selector

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::auth::SessionProvider;
use crate::controller::Refresh;
use crate::error::{ControllerError, ValidationError};
use crate::models::{AssignmentStatus, Profile, ASSIGNMENTS, CLASSES, PROFILES};
use crate::store::{self, decode, Filter, Query, ResourceStore};

/// Summary figures shown above the tabs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    pub classes: u64,
    pub assignments: u64,
    /// Assignments with status `pending`
    pub pending: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Tab {
    #[default]
    Classes,
    Assignments,
}

pub struct Dashboard {
    store: Arc<dyn ResourceStore>,
    session: Arc<SessionProvider>,
    profile: Option<Profile>,
    counts: Counts,
    tab: Tab,
}

impl Dashboard {
    pub fn new(store: Arc<dyn ResourceStore>, session: Arc<SessionProvider>) -> Self {
        Self {
            store,
            session,
            profile: None,
            counts: Counts::default(),
            tab: Tab::default(),
        }
    }

    pub fn profile(&self) -> Option<&Profile> {
        self.profile.as_ref()
    }

    pub fn counts(&self) -> Counts {
        self.counts
    }

    pub fn tab(&self) -> Tab {
        self.tab
    }

    pub fn select_tab(&mut self, tab: Tab) {
        self.tab = tab;
    }

    /// Name for the header, falling back to the sign-up metadata while the
    /// profile row does not exist yet
    pub fn display_name(&self) -> Option<String> {
        match &self.profile {
            Some(profile) => Some(profile.full_name.clone()),
            None => self
                .session
                .user()
                .and_then(|u| u.full_name().map(str::to_string)),
        }
    }

    /// Fetch the caller's profile. A missing row is not an error: the row is
    /// written by a trigger shortly after sign-up.
    pub async fn load_profile(&mut self) -> Result<Option<&Profile>, ControllerError> {
        let user = self
            .session
            .user_id()
            .ok_or(ControllerError::Unauthenticated)?;
        let query = Query::new().eq("user_id", user);

        self.profile = store::fetch_one::<Profile>(self.store.as_ref(), PROFILES, &query).await?;
        if self.profile.is_none() {
            log::warn!("no profile for {} yet", user);
        }
        Ok(self.profile.as_ref())
    }

    /// Change the caller's name and school
    pub async fn update_profile(
        &mut self,
        full_name: &str,
        school_name: &str,
    ) -> Result<&Profile, ControllerError> {
        let full_name = full_name.trim();
        if full_name.is_empty() {
            return Err(ValidationError::MissingField("full_name").into());
        }
        let id = match self.profile.as_ref().map(|p| p.id) {
            Some(id) => id,
            None => self
                .load_profile()
                .await?
                .map(|p| p.id)
                .ok_or(ControllerError::InvalidState("profile not created yet"))?,
        };

        let school_name = match school_name.trim() {
            "" => serde_json::Value::Null,
            text => json!(text),
        };
        let row = self
            .store
            .update(
                PROFILES,
                id,
                json!({ "full_name": full_name, "school_name": school_name }),
            )
            .await?;

        let profile = self.profile.insert(decode(row)?);
        log::info!("profile {} updated", profile.id);
        Ok(profile)
    }

    /// Recompute the counts. Each count is independent; a failing one reads
    /// as zero.
    pub async fn refresh(&mut self) {
        let Some(user) = self.session.user_id() else {
            self.counts = Counts::default();
            return;
        };
        let owned = Filter::new().eq("teacher_id", user);
        let pending_only = owned.clone().eq("status", AssignmentStatus::Pending.as_str());

        let (classes, assignments, pending) = tokio::join!(
            self.count(CLASSES, &owned),
            self.count(ASSIGNMENTS, &owned),
            self.count(ASSIGNMENTS, &pending_only),
        );
        self.counts = Counts {
            classes,
            assignments,
            pending,
        };
        log::debug!("dashboard counts {:?}", self.counts);
    }

    async fn count(&self, collection: &str, filter: &Filter) -> u64 {
        match self.store.count(collection, filter).await {
            Ok(n) => n,
            Err(err) => {
                log::warn!("counting {} failed: {}", collection, err);
                0
            }
        }
    }
}

/// Shared handle given to the controllers so they can refresh the counts
#[derive(Clone)]
pub struct DashboardHandle(Arc<Mutex<Dashboard>>);

impl DashboardHandle {
    pub fn new(dashboard: Dashboard) -> Self {
        Self(Arc::new(Mutex::new(dashboard)))
    }

    pub async fn lock(&self) -> tokio::sync::MutexGuard<'_, Dashboard> {
        self.0.lock().await
    }

    pub async fn counts(&self) -> Counts {
        self.0.lock().await.counts()
    }
}

#[async_trait]
impl Refresh for DashboardHandle {
    async fn refresh(&self) {
        self.0.lock().await.refresh().await;
    }
}
