//! The list-form controller shared by every resource manager.
//!
//! One controller instance owns the rows of one collection, a form, and the
//! dialog state:
//!
//! ```text
//!            open_create            submit ok / cancel
//!   Idle ───────────────► Creating ───────────────────► Idle
//!     │   open_edit(row)            submit ok / cancel
//!     ├─────────────────► Editing ─────────────────────► Idle
//!     │   remove(row)               confirm_remove / cancel
//!     └─────────────────► Confirming ──────────────────► Idle
//! ```
//!
//! A failed submit stays in `Creating`/`Editing` with the form untouched.
//! While a request is in flight further submits are refused with
//! [`ControllerError::Busy`]. Dropping a pending `submit` or `confirm_remove`
//! abandons the request and leaves the controller in the mode it was in.

mod assignment;
mod class;
mod resource;

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::SessionProvider;
use crate::error::{ControllerError, StoreError, ValidationError};
use crate::notify::{Notification, Notifier};
use crate::store::{self, decode, Order, Query, ResourceStore};

pub use assignment::{AssignmentForm, AssignmentResource};
pub use class::{ClassForm, ClassResource};
pub use resource::{FormFields, Messages, ParentRef, Resource, ResourceDescriptor};

/// Called by controllers after every successful mutation so derived
/// aggregates can be recomputed
#[async_trait]
pub trait Refresh: Send + Sync {
    async fn refresh(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Idle,
    Creating,
    Editing(Uuid),
    Confirming(Uuid),
}

/// Entry in the parent selector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentOption {
    pub id: Uuid,
    pub label: String,
}

pub type ClassController = ListFormController<ClassResource>;
pub type AssignmentController = ListFormController<AssignmentResource>;

pub struct ListFormController<R: Resource> {
    store: Arc<dyn ResourceStore>,
    session: Arc<SessionProvider>,
    notifier: Arc<dyn Notifier>,
    refresh: Option<Arc<dyn Refresh>>,
    rows: Vec<R::Row>,
    form: R::Form,
    mode: Mode,
    in_flight: bool,
    revision: u64,
    parent_options: Vec<ParentOption>,
}

/// Marks a request as in flight until dropped, including when the request
/// future itself is dropped mid-await
struct InFlight<'a>(&'a mut bool);

impl<'a> InFlight<'a> {
    fn start(flag: &'a mut bool) -> Self {
        *flag = true;
        Self(flag)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        *self.0 = false;
    }
}

impl<R: Resource> ListFormController<R> {
    pub fn new(
        store: Arc<dyn ResourceStore>,
        session: Arc<SessionProvider>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            session,
            notifier,
            refresh: None,
            rows: Vec::new(),
            form: R::Form::default(),
            mode: Mode::Idle,
            in_flight: false,
            revision: 0,
            parent_options: Vec::new(),
        }
    }

    /// Aggregator to refresh after mutations
    pub fn with_refresh(mut self, refresh: Arc<dyn Refresh>) -> Self {
        self.refresh = Some(refresh);
        self
    }

    pub fn descriptor(&self) -> &'static ResourceDescriptor {
        &R::DESCRIPTOR
    }

    pub fn rows(&self) -> &[R::Row] {
        &self.rows
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn form(&self) -> &R::Form {
        &self.form
    }

    pub fn form_mut(&mut self) -> &mut R::Form {
        &mut self.form
    }

    pub fn is_dialog_open(&self) -> bool {
        matches!(self.mode, Mode::Creating | Mode::Editing(_))
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight
    }

    /// Number of successful mutations so far
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn parent_options(&self) -> &[ParentOption] {
        &self.parent_options
    }

    pub fn set_parent_options(&mut self, options: Vec<ParentOption>) {
        self.parent_options = options;
    }

    /// Whether the create action is offered at all. Resources with a parent
    /// need at least one parent to attach to.
    pub fn can_create(&self) -> bool {
        R::DESCRIPTOR.parent.is_none() || !self.parent_options.is_empty()
    }

    /// Fetch the caller's rows, newest first. On failure the previous rows
    /// stay visible.
    pub async fn load(&mut self) -> Result<(), ControllerError> {
        let d = &R::DESCRIPTOR;
        let user = self
            .session
            .user_id()
            .ok_or(ControllerError::Unauthenticated)?;

        let query = Query::new()
            .select(d.select)
            .eq(d.owner_column, user)
            .order(Order::desc(d.order_column));

        match store::fetch_all::<R::Row>(self.store.as_ref(), d.collection, &query).await {
            Ok(rows) => {
                log::debug!("loaded {} rows from {}", rows.len(), d.collection);
                self.rows = rows;
                Ok(())
            }
            Err(err) => {
                log::warn!("loading {} failed: {}", d.collection, err);
                self.notifier
                    .notify(Notification::error(d.messages.load_failed, &err));
                Err(err.into())
            }
        }
    }

    /// Fetch the options for the parent selector
    pub async fn load_parent_options(&mut self) -> Result<(), ControllerError> {
        let Some(parent) = R::DESCRIPTOR.parent else {
            return Ok(());
        };
        let user = self
            .session
            .user_id()
            .ok_or(ControllerError::Unauthenticated)?;

        let query = Query::new()
            .select(&format!("id,{}", parent.label_column))
            .eq(parent.owner_column, user)
            .order(Order::asc(parent.label_column));

        let result = match self.store.query(parent.collection, &query).await {
            Ok(rows) => rows
                .into_iter()
                .map(|row| parent_option(row, parent.label_column))
                .collect::<Result<Vec<_>, _>>(),
            Err(err) => Err(err),
        };

        match result {
            Ok(options) => {
                self.parent_options = options;
                Ok(())
            }
            Err(err) => {
                log::warn!("loading {} failed: {}", parent.collection, err);
                self.notifier
                    .notify(Notification::error(parent.load_failed, &err));
                Err(err.into())
            }
        }
    }

    pub fn open_create(&mut self) -> Result<(), ControllerError> {
        self.ensure_idle()?;
        if !self.can_create() {
            let missing = R::DESCRIPTOR.parent.map_or("parent", |p| p.label);
            return Err(ControllerError::CreateUnavailable { missing });
        }
        self.form = R::Form::default();
        self.mode = Mode::Creating;
        Ok(())
    }

    pub fn open_edit(&mut self, row: &R::Row) -> Result<(), ControllerError> {
        self.ensure_idle()?;
        self.form = R::form_from_row(row);
        self.mode = Mode::Editing(R::id(row));
        Ok(())
    }

    /// Close the dialog or abandon a pending delete. Nothing is sent.
    pub fn cancel(&mut self) {
        if self.in_flight {
            return;
        }
        self.form = R::Form::default();
        self.mode = Mode::Idle;
    }

    /// Validate and send the form. Creating inserts with the caller stamped as
    /// owner; editing replaces the editable fields of the remembered row.
    pub async fn submit(&mut self) -> Result<(), ControllerError> {
        if self.in_flight {
            return Err(ControllerError::Busy);
        }
        let target = match self.mode {
            Mode::Creating => None,
            Mode::Editing(id) => Some(id),
            Mode::Idle => return Err(ControllerError::InvalidState("no form is open")),
            Mode::Confirming(_) => {
                return Err(ControllerError::InvalidState("a delete awaits confirmation"))
            }
        };

        self.validate()?;
        let mut payload = R::payload(&self.form)?;
        let d = &R::DESCRIPTOR;
        if target.is_none() {
            let user = self
                .session
                .user_id()
                .ok_or(ControllerError::Unauthenticated)?;
            payload.insert(d.owner_column.to_string(), json!(user));
        }

        let result = {
            let _in_flight = InFlight::start(&mut self.in_flight);
            match target {
                Some(id) => {
                    self.store
                        .update(d.collection, id, Value::Object(payload))
                        .await
                }
                None => self.store.insert(d.collection, Value::Object(payload)).await,
            }
        };

        let (done, failed) = match target {
            Some(_) => (d.messages.updated, d.messages.update_failed),
            None => (d.messages.created, d.messages.create_failed),
        };

        match result {
            Ok(_) => {
                log::info!("{} saved in {}", done, d.collection);
                self.form = R::Form::default();
                self.mode = Mode::Idle;
                self.after_mutation().await;
                self.notifier.notify(Notification::success(done));
                Ok(())
            }
            Err(err) => {
                log::warn!("saving to {} failed: {}", d.collection, err);
                self.notifier.notify(Notification::error(failed, &err));
                Err(err.into())
            }
        }
    }

    /// Ask for confirmation before deleting `row`
    pub fn remove(&mut self, row: &R::Row) -> Result<(), ControllerError> {
        self.ensure_idle()?;
        self.mode = Mode::Confirming(R::id(row));
        Ok(())
    }

    /// The row awaiting delete confirmation
    pub fn pending_removal(&self) -> Option<Uuid> {
        match self.mode {
            Mode::Confirming(id) => Some(id),
            _ => None,
        }
    }

    /// Delete the row chosen with [`ListFormController::remove`]. On failure
    /// the row stays listed.
    pub async fn confirm_remove(&mut self) -> Result<(), ControllerError> {
        if self.in_flight {
            return Err(ControllerError::Busy);
        }
        let Mode::Confirming(id) = self.mode else {
            return Err(ControllerError::InvalidState("no delete is pending"));
        };
        let d = &R::DESCRIPTOR;

        let result = {
            let _in_flight = InFlight::start(&mut self.in_flight);
            self.store.delete(d.collection, id).await
        };
        self.mode = Mode::Idle;

        match result {
            Ok(()) => {
                log::info!("deleted {} from {}", id, d.collection);
                self.after_mutation().await;
                self.notifier.notify(Notification::success(d.messages.deleted));
                Ok(())
            }
            Err(err) => {
                log::warn!("deleting {} from {} failed: {}", id, d.collection, err);
                self.notifier
                    .notify(Notification::error(d.messages.delete_failed, &err));
                Err(err.into())
            }
        }
    }

    fn ensure_idle(&self) -> Result<(), ControllerError> {
        if self.in_flight {
            return Err(ControllerError::Busy);
        }
        match self.mode {
            Mode::Idle => Ok(()),
            Mode::Creating | Mode::Editing(_) => {
                Err(ControllerError::InvalidState("a form is open"))
            }
            Mode::Confirming(_) => Err(ControllerError::InvalidState(
                "a delete awaits confirmation",
            )),
        }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        let d = &R::DESCRIPTOR;
        for field in d.required_fields {
            if self.form.field(field).trim().is_empty() {
                return Err(ValidationError::MissingField(*field));
            }
        }
        if let Some(parent) = d.parent {
            if self.form.field(parent.column).trim().is_empty() {
                return Err(ValidationError::MissingParentSelection);
            }
        }
        Ok(())
    }

    async fn after_mutation(&mut self) {
        self.revision += 1;
        // load() has already notified on failure
        let _ = self.load().await;
        if let Some(refresh) = &self.refresh {
            refresh.refresh().await;
        }
    }
}

fn parent_option(row: Value, label_column: &str) -> Result<ParentOption, StoreError> {
    let label = row
        .get(label_column)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let id = decode(row.get("id").cloned().unwrap_or(Value::Null))?;
    Ok(ParentOption { id, label })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemoryAuth;
    use crate::models::{AssignmentStatus, ASSIGNMENTS};
    use crate::notify::{Level, RecordingNotifier};
    use crate::store::{Filter, MemoryStore};
    use std::time::Duration;

    /// Reads go to the wrapped store; writes never complete
    struct StalledWrites(MemoryStore);

    #[async_trait]
    impl ResourceStore for StalledWrites {
        async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Value>, StoreError> {
            self.0.query(collection, query).await
        }

        async fn insert(&self, _: &str, _: Value) -> Result<Value, StoreError> {
            std::future::pending().await
        }

        async fn update(&self, _: &str, _: Uuid, _: Value) -> Result<Value, StoreError> {
            std::future::pending().await
        }

        async fn delete(&self, _: &str, _: Uuid) -> Result<(), StoreError> {
            std::future::pending().await
        }

        async fn count(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
            self.0.count(collection, filter).await
        }
    }

    struct Fixture {
        store: MemoryStore,
        session: Arc<SessionProvider>,
        notifier: Arc<RecordingNotifier>,
    }

    impl Fixture {
        async fn signed_in() -> Self {
            let store = MemoryStore::new();
            let auth = Arc::new(MemoryAuth::new(store.clone()));
            let session = Arc::new(SessionProvider::new(auth));
            session.start(None);
            session
                .sign_up("ana@escola.br", "segredo1", "Ana")
                .await
                .unwrap();
            Self {
                store,
                session,
                notifier: Arc::new(RecordingNotifier::new()),
            }
        }

        fn controller<R: Resource>(&self) -> ListFormController<R> {
            ListFormController::new(
                Arc::new(self.store.clone()),
                self.session.clone(),
                self.notifier.clone(),
            )
        }
    }

    #[tokio::test]
    async fn create_then_load_lists_new_row() {
        let fx = Fixture::signed_in().await;
        let mut classes = fx.controller::<ClassResource>();
        classes.load().await.unwrap();
        assert!(classes.rows().is_empty());

        classes.open_create().unwrap();
        classes.form_mut().name = "5º Ano A".to_string();
        classes.submit().await.unwrap();

        assert_eq!(classes.mode(), Mode::Idle);
        assert_eq!(classes.form(), &ClassForm::default());
        assert_eq!(classes.rows().len(), 1);
        assert_eq!(classes.rows()[0].name, "5º Ano A");
        assert_eq!(
            classes.rows()[0].teacher_id,
            fx.session.user_id().unwrap()
        );
        let last = fx.notifier.last().unwrap();
        assert_eq!(last.level, Level::Success);
        assert_eq!(last.title, "Turma criada com sucesso!");
    }

    #[tokio::test]
    async fn missing_name_sends_nothing() {
        let fx = Fixture::signed_in().await;
        let mut classes = fx.controller::<ClassResource>();
        classes.open_create().unwrap();
        classes.form_mut().name = "   ".to_string();

        let before = fx.store.calls();
        let err = classes.submit().await.unwrap_err();
        assert!(matches!(
            err,
            ControllerError::Validation(ValidationError::MissingField("name"))
        ));
        assert_eq!(fx.store.calls(), before);
        assert_eq!(classes.mode(), Mode::Creating);
    }

    #[tokio::test]
    async fn edit_replaces_fields_and_keeps_id() {
        let fx = Fixture::signed_in().await;
        let mut classes = fx.controller::<ClassResource>();
        classes.open_create().unwrap();
        classes.form_mut().name = "5º Ano A".to_string();
        classes.form_mut().subject = "Ciências".to_string();
        classes.submit().await.unwrap();

        let row = classes.rows()[0].clone();
        classes.open_edit(&row).unwrap();
        assert_eq!(classes.mode(), Mode::Editing(row.id));
        assert_eq!(classes.form().subject, "Ciências");

        classes.form_mut().subject.clear();
        classes.submit().await.unwrap();

        assert_eq!(classes.rows().len(), 1);
        assert_eq!(classes.rows()[0].id, row.id);
        assert_eq!(classes.rows()[0].subject, None);
        assert!(classes.rows()[0].updated_at >= row.updated_at);
    }

    #[tokio::test]
    async fn failed_submit_keeps_form_open() {
        let fx = Fixture::signed_in().await;
        let mut classes = fx.controller::<ClassResource>();
        classes.open_create().unwrap();
        classes.form_mut().name = "5º Ano A".to_string();

        fx.store.set_offline(true).await;
        assert!(classes.submit().await.is_err());

        assert_eq!(classes.mode(), Mode::Creating);
        assert_eq!(classes.form().name, "5º Ano A");
        assert!(!classes.is_busy());
        let last = fx.notifier.last().unwrap();
        assert_eq!(last.level, Level::Error);
        assert_eq!(last.title, "Erro ao criar turma");
    }

    #[tokio::test]
    async fn remove_requires_confirmation() {
        let fx = Fixture::signed_in().await;
        let mut classes = fx.controller::<ClassResource>();
        classes.open_create().unwrap();
        classes.form_mut().name = "5º Ano A".to_string();
        classes.submit().await.unwrap();
        let row = classes.rows()[0].clone();

        classes.remove(&row).unwrap();
        assert_eq!(classes.pending_removal(), Some(row.id));
        classes.cancel();
        assert_eq!(classes.rows().len(), 1);
        assert_eq!(fx.store.calls().delete, 0);

        classes.remove(&row).unwrap();
        classes.confirm_remove().await.unwrap();
        assert!(classes.rows().is_empty());
        assert_eq!(fx.notifier.last().unwrap().title, "Turma excluída com sucesso!");
    }

    #[tokio::test]
    async fn create_unavailable_without_parent() {
        let fx = Fixture::signed_in().await;
        let mut assignments = fx.controller::<AssignmentResource>();
        assignments.load_parent_options().await.unwrap();

        assert!(!assignments.can_create());
        assert!(matches!(
            assignments.open_create(),
            Err(ControllerError::CreateUnavailable { missing: "turma" })
        ));
        assert_eq!(assignments.mode(), Mode::Idle);
    }

    #[tokio::test]
    async fn assignment_requires_class_selection() {
        let fx = Fixture::signed_in().await;
        let mut classes = fx.controller::<ClassResource>();
        classes.open_create().unwrap();
        classes.form_mut().name = "5º Ano A".to_string();
        classes.submit().await.unwrap();

        let mut assignments = fx.controller::<AssignmentResource>();
        assignments.load_parent_options().await.unwrap();
        assert_eq!(assignments.parent_options()[0].label, "5º Ano A");

        assignments.open_create().unwrap();
        assignments.form_mut().title = "Lista 1".to_string();
        assert!(matches!(
            assignments.submit().await,
            Err(ControllerError::Validation(
                ValidationError::MissingParentSelection
            ))
        ));

        assignments.form_mut().turma_id = assignments.parent_options()[0].id.to_string();
        assignments.submit().await.unwrap();

        let row = &assignments.rows()[0];
        assert_eq!(row.status, AssignmentStatus::Pending);
        assert_eq!(row.class_name(), Some("5º Ano A"));
        assert_eq!(fx.store.all_rows(ASSIGNMENTS).await.len(), 1);
    }

    #[tokio::test]
    async fn second_submit_after_success_is_rejected() {
        let fx = Fixture::signed_in().await;
        let mut classes = fx.controller::<ClassResource>();
        classes.open_create().unwrap();
        classes.form_mut().name = "5º Ano A".to_string();
        classes.submit().await.unwrap();

        assert!(matches!(
            classes.submit().await,
            Err(ControllerError::InvalidState(_))
        ));
        assert_eq!(fx.store.calls().insert, 1);
    }

    #[tokio::test]
    async fn abandoned_submit_leaves_controller_usable() {
        let fx = Fixture::signed_in().await;
        let mut classes: ClassController = ListFormController::new(
            Arc::new(StalledWrites(fx.store.clone())),
            fx.session.clone(),
            fx.notifier.clone(),
        );
        classes.open_create().unwrap();
        classes.form_mut().name = "5º Ano A".to_string();

        let abandoned = tokio::time::timeout(Duration::from_millis(50), classes.submit()).await;
        assert!(abandoned.is_err());
        assert!(!classes.is_busy());
        assert_eq!(classes.mode(), Mode::Creating);
        assert_eq!(classes.form().name, "5º Ano A");

        classes.cancel();
        assert_eq!(classes.mode(), Mode::Idle);
        classes.open_create().unwrap();
        assert_eq!(classes.mode(), Mode::Creating);
    }

    #[tokio::test]
    async fn abandoned_delete_can_be_cancelled() {
        let fx = Fixture::signed_in().await;
        let mut seeded = fx.controller::<ClassResource>();
        seeded.open_create().unwrap();
        seeded.form_mut().name = "5º Ano A".to_string();
        seeded.submit().await.unwrap();
        let row = seeded.rows()[0].clone();

        let mut classes: ClassController = ListFormController::new(
            Arc::new(StalledWrites(fx.store.clone())),
            fx.session.clone(),
            fx.notifier.clone(),
        );
        classes.load().await.unwrap();
        classes.remove(&row).unwrap();
        let abandoned =
            tokio::time::timeout(Duration::from_millis(50), classes.confirm_remove()).await;
        assert!(abandoned.is_err());
        assert!(!classes.is_busy());
        assert_eq!(classes.pending_removal(), Some(row.id));

        classes.cancel();
        assert_eq!(classes.mode(), Mode::Idle);
        assert_eq!(classes.rows().len(), 1);
    }

    #[tokio::test]
    async fn failed_delete_keeps_row_listed() {
        let fx = Fixture::signed_in().await;
        let mut classes = fx.controller::<ClassResource>();
        classes.open_create().unwrap();
        classes.form_mut().name = "5º Ano A".to_string();
        classes.submit().await.unwrap();
        let row = classes.rows()[0].clone();
        let revision = classes.revision();

        fx.store.set_offline(true).await;
        classes.remove(&row).unwrap();
        assert!(classes.confirm_remove().await.is_err());

        assert_eq!(classes.mode(), Mode::Idle);
        assert_eq!(classes.rows(), &[row]);
        assert_eq!(classes.revision(), revision);
        let last = fx.notifier.last().unwrap();
        assert_eq!(last.level, Level::Error);
        assert_eq!(last.title, "Erro ao excluir turma");

        fx.store.set_offline(false).await;
        assert_eq!(fx.store.all_rows(crate::models::CLASSES).await.len(), 1);
    }

    #[tokio::test]
    async fn load_failure_keeps_previous_rows() {
        let fx = Fixture::signed_in().await;
        let mut classes = fx.controller::<ClassResource>();
        classes.open_create().unwrap();
        classes.form_mut().name = "5º Ano A".to_string();
        classes.submit().await.unwrap();

        fx.store.set_offline(true).await;
        assert!(classes.load().await.is_err());
        assert_eq!(classes.rows().len(), 1);
        assert_eq!(fx.notifier.last().unwrap().title, "Erro ao carregar turmas");
    }

    #[tokio::test]
    async fn parent_options_can_be_supplied() {
        let fx = Fixture::signed_in().await;
        let mut assignments = fx.controller::<AssignmentResource>();
        assignments.set_parent_options(vec![ParentOption {
            id: Uuid::new_v4(),
            label: "5º Ano A".to_string(),
        }]);

        assert!(assignments.can_create());
        assignments.open_create().unwrap();
        assert!(assignments.is_dialog_open());
        assignments.cancel();
        assert!(!assignments.is_dialog_open());
        assert_eq!(assignments.descriptor().collection, ASSIGNMENTS);
    }
}
