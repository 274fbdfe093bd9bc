use std::sync::Arc;
use turmas::auth::{MemoryAuth, SessionProvider};
use turmas::controller::Mode;
use turmas::dashboard::{Counts, Tab};
use turmas::error::{ControllerError, StoreError};
use turmas::models::{AssignmentStatus, ASSIGNMENTS, CLASSES};
use turmas::notify::{Level, RecordingNotifier};
use turmas::shell::{AuthForm, Shell, View};
use turmas::store::{MemoryStore, ResourceStore};

struct App {
    store: MemoryStore,
    auth: Arc<MemoryAuth>,
    notifier: Arc<RecordingNotifier>,
    shell: Shell,
}

fn app() -> App {
    let _ = pretty_env_logger::try_init();

    let store = MemoryStore::new();
    let auth = Arc::new(MemoryAuth::new(store.clone()));
    let session = Arc::new(SessionProvider::new(auth.clone()));
    session.start(None);
    let notifier = Arc::new(RecordingNotifier::new());
    let shell = Shell::new(session, Arc::new(store.clone()), notifier.clone());
    App {
        store,
        auth,
        notifier,
        shell,
    }
}

async fn sign_up(app: &mut App, email: &str, name: &str) {
    let form = AuthForm::sign_up(email, "segredo1", "segredo1", name);
    app.shell.submit_auth(&form).await.unwrap();
}

async fn add_class(app: &mut App, name: &str) {
    let classes = app.shell.workspace().unwrap().classes();
    classes.open_create().unwrap();
    classes.form_mut().name = name.to_string();
    classes.submit().await.unwrap();
}

async fn add_assignment(app: &mut App, title: &str) {
    let workspace = app.shell.workspace().unwrap();
    workspace.select_tab(Tab::Assignments).await;
    let assignments = workspace.assignments();
    let class = assignments.parent_options()[0].id;
    assignments.open_create().unwrap();
    assignments.form_mut().turma_id = class.to_string();
    assignments.form_mut().title = title.to_string();
    assignments.submit().await.unwrap();
}

async fn counts(app: &mut App) -> Counts {
    app.shell.workspace().unwrap().dashboard().counts().await
}

#[tokio::test]
async fn sign_up_seeds_profile() {
    let mut app = app();
    sign_up(&mut app, "ana@escola.br", "Ana").await;

    assert!(matches!(app.shell.view(), View::Authenticated(_)));
    let workspace = app.shell.workspace().unwrap();
    let dashboard = workspace.dashboard().lock().await;
    assert_eq!(dashboard.profile().map(|p| p.full_name.as_str()), Some("Ana"));
    assert_eq!(dashboard.counts(), Counts::default());
    assert_eq!(dashboard.tab(), Tab::Classes);
}

#[tokio::test]
async fn profile_created_late_is_tolerated() {
    let mut app = app();
    app.store.defer_profile_trigger(true).await;
    sign_up(&mut app, "ana@escola.br", "Ana").await;

    {
        let workspace = app.shell.workspace().unwrap();
        let dashboard = workspace.dashboard().lock().await;
        assert!(dashboard.profile().is_none());
        assert_eq!(dashboard.display_name().as_deref(), Some("Ana"));
    }

    app.store.flush_triggers().await;
    let workspace = app.shell.workspace().unwrap();
    let mut dashboard = workspace.dashboard().lock().await;
    assert!(dashboard.load_profile().await.unwrap().is_some());
}

#[tokio::test]
async fn mismatched_passwords_send_nothing() {
    let mut app = app();
    let form = AuthForm::sign_up("ana@escola.br", "segredo1", "segredo2", "Ana");

    assert!(app.shell.submit_auth(&form).await.is_err());
    assert_eq!(app.auth.requests(), 0);
    assert_eq!(app.shell.view(), View::Anonymous);
}

#[tokio::test]
async fn pending_count_follows_status() {
    let mut app = app();
    sign_up(&mut app, "ana@escola.br", "Ana").await;
    add_class(&mut app, "5º Ano A").await;
    add_assignment(&mut app, "Lista 1").await;

    assert_eq!(
        counts(&mut app).await,
        Counts {
            classes: 1,
            assignments: 1,
            pending: 1
        }
    );

    let assignments = app.shell.workspace().unwrap().assignments();
    let row = assignments.rows()[0].clone();
    assert_eq!(row.class_name(), Some("5º Ano A"));
    assignments.open_edit(&row).unwrap();
    assignments.form_mut().status = AssignmentStatus::Completed;
    assignments.submit().await.unwrap();

    assert_eq!(
        assignments.rows()[0].status,
        AssignmentStatus::Completed
    );
    assert_eq!(counts(&mut app).await.pending, 0);
    assert_eq!(
        app.notifier.last().unwrap().title,
        "Atividade atualizada com sucesso!"
    );
}

#[tokio::test]
async fn deleting_class_removes_its_assignments() {
    let mut app = app();
    sign_up(&mut app, "ana@escola.br", "Ana").await;
    add_class(&mut app, "5º Ano A").await;
    add_assignment(&mut app, "Lista 1").await;
    add_assignment(&mut app, "Lista 2").await;
    assert_eq!(counts(&mut app).await.assignments, 2);

    let workspace = app.shell.workspace().unwrap();
    workspace.select_tab(Tab::Classes).await;
    let classes = workspace.classes();
    let row = classes.rows()[0].clone();
    classes.remove(&row).unwrap();
    classes.confirm_remove().await.unwrap();

    assert!(app.store.all_rows(CLASSES).await.is_empty());
    assert!(app.store.all_rows(ASSIGNMENTS).await.is_empty());
    assert_eq!(counts(&mut app).await, Counts::default());
}

#[tokio::test]
async fn create_assignment_unavailable_without_class() {
    let mut app = app();
    sign_up(&mut app, "ana@escola.br", "Ana").await;

    let workspace = app.shell.workspace().unwrap();
    workspace.select_tab(Tab::Assignments).await;
    let assignments = workspace.assignments();

    assert!(!assignments.can_create());
    assert!(matches!(
        assignments.open_create(),
        Err(ControllerError::CreateUnavailable { .. })
    ));
    assert_eq!(app.store.calls().insert, 0);
}

#[tokio::test]
async fn load_is_idempotent() {
    let mut app = app();
    sign_up(&mut app, "ana@escola.br", "Ana").await;
    add_class(&mut app, "5º Ano A").await;
    add_class(&mut app, "5º Ano B").await;

    let writes = app.store.calls().writes();
    let classes = app.shell.workspace().unwrap().classes();
    classes.load().await.unwrap();
    let first: Vec<_> = classes.rows().iter().map(|c| c.id).collect();
    classes.load().await.unwrap();
    let second: Vec<_> = classes.rows().iter().map(|c| c.id).collect();

    assert_eq!(first, second);
    assert_eq!(classes.rows()[0].name, "5º Ano B");
    assert_eq!(app.store.calls().writes(), writes);
}

#[tokio::test]
async fn teachers_see_only_their_rows() {
    let mut app = app();
    sign_up(&mut app, "ana@escola.br", "Ana").await;
    add_class(&mut app, "5º Ano A").await;
    let ana_class = app.shell.workspace().unwrap().classes().rows()[0].clone();
    app.shell.sign_out().await.unwrap();
    assert!(app.shell.workspace().is_none());

    sign_up(&mut app, "bruno@escola.br", "Bruno").await;
    let workspace = app.shell.workspace().unwrap();
    assert!(workspace.classes().rows().is_empty());
    assert_eq!(workspace.dashboard().counts().await.classes, 0);

    let err = app
        .store
        .update(CLASSES, ana_class.id, serde_json::json!({ "name": "Roubada" }))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));

    let err = app.store.delete(CLASSES, ana_class.id).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));
    assert_eq!(app.store.all_rows(CLASSES).await.len(), 1);
}

#[tokio::test]
async fn offline_submit_keeps_dialog() {
    let mut app = app();
    sign_up(&mut app, "ana@escola.br", "Ana").await;
    add_class(&mut app, "5º Ano A").await;

    app.store.set_offline(true).await;
    let classes = app.shell.workspace().unwrap().classes();
    classes.open_create().unwrap();
    classes.form_mut().name = "5º Ano B".to_string();
    assert!(classes.submit().await.is_err());

    assert_eq!(classes.mode(), Mode::Creating);
    assert_eq!(classes.form().name, "5º Ano B");
    assert_eq!(classes.rows().len(), 1);
    let last = app.notifier.last().unwrap();
    assert_eq!(last.level, Level::Error);
    assert_eq!(last.title, "Erro ao criar turma");

    app.store.set_offline(false).await;
    classes.submit().await.unwrap();
    assert_eq!(classes.rows().len(), 2);
}

#[tokio::test]
async fn create_and_remove_move_counts_by_one() {
    let mut app = app();
    sign_up(&mut app, "ana@escola.br", "Ana").await;
    add_class(&mut app, "5º Ano A").await;
    assert_eq!(counts(&mut app).await.classes, 1);

    add_class(&mut app, "5º Ano B").await;
    assert_eq!(counts(&mut app).await.classes, 2);

    let classes = app.shell.workspace().unwrap().classes();
    let created: Vec<_> = classes
        .rows()
        .iter()
        .filter(|c| c.name == "5º Ano B")
        .collect();
    assert_eq!(created.len(), 1);

    let row = created[0].clone();
    classes.remove(&row).unwrap();
    classes.confirm_remove().await.unwrap();
    assert!(classes.rows().iter().all(|c| c.id != row.id));
    assert_eq!(counts(&mut app).await.classes, 1);
}

#[tokio::test]
async fn removing_assignment_moves_counts_by_one() {
    let mut app = app();
    sign_up(&mut app, "ana@escola.br", "Ana").await;
    add_class(&mut app, "5º Ano A").await;
    add_assignment(&mut app, "Lista 1").await;
    add_assignment(&mut app, "Lista 2").await;
    assert_eq!(
        counts(&mut app).await,
        Counts {
            classes: 1,
            assignments: 2,
            pending: 2
        }
    );

    let assignments = app.shell.workspace().unwrap().assignments();
    let row = assignments
        .rows()
        .iter()
        .find(|a| a.title == "Lista 1")
        .unwrap()
        .clone();
    assignments.remove(&row).unwrap();
    assignments.confirm_remove().await.unwrap();

    assert_eq!(assignments.rows().len(), 1);
    assert!(assignments.rows().iter().all(|a| a.id != row.id));
    assert_eq!(
        counts(&mut app).await,
        Counts {
            classes: 1,
            assignments: 1,
            pending: 1
        }
    );
    assert_eq!(app.store.all_rows(CLASSES).await.len(), 1);
}

#[tokio::test]
async fn failed_class_delete_keeps_everything() {
    let mut app = app();
    sign_up(&mut app, "ana@escola.br", "Ana").await;
    add_class(&mut app, "5º Ano A").await;

    app.store.set_offline(true).await;
    let classes = app.shell.workspace().unwrap().classes();
    let row = classes.rows()[0].clone();
    classes.remove(&row).unwrap();
    assert!(classes.confirm_remove().await.is_err());

    assert_eq!(classes.mode(), Mode::Idle);
    assert_eq!(classes.rows().len(), 1);
    let last = app.notifier.last().unwrap();
    assert_eq!(last.level, Level::Error);
    assert_eq!(last.title, "Erro ao excluir turma");

    app.store.set_offline(false).await;
    assert_eq!(counts(&mut app).await.classes, 1);
}

#[tokio::test]
async fn class_selector_follows_class_changes() {
    let mut app = app();
    sign_up(&mut app, "ana@escola.br", "Ana").await;
    add_class(&mut app, "5º Ano A").await;

    let workspace = app.shell.workspace().unwrap();
    workspace.select_tab(Tab::Assignments).await;
    assert!(workspace.assignments().can_create());

    let classes = workspace.classes();
    let row = classes.rows()[0].clone();
    classes.open_edit(&row).unwrap();
    classes.form_mut().name = "5º Ano B".to_string();
    classes.submit().await.unwrap();
    assert_eq!(workspace.assignments().parent_options()[0].label, "5º Ano B");

    let classes = workspace.classes();
    classes.remove(&row).unwrap();
    classes.confirm_remove().await.unwrap();

    let assignments = workspace.assignments();
    assert!(!assignments.can_create());
    assert!(matches!(
        assignments.open_create(),
        Err(ControllerError::CreateUnavailable { .. })
    ));
    assert_eq!(app.store.calls().insert, 1);
}
