//! End-to-end tests of the admin console against a fake REST backend.
//!
//! Each test starts its own backend on an ephemeral port and drives an
//! `AdminConsole` through login, session handling, room/puzzle/student
//! management and H5P upload and preview.

mod common;

use std::path::PathBuf;

use common::{FakeBackend, PASSWORD, STUDENT_USERNAME, TAKEN_USERNAME};
use escape_admin_core::session::{TOKEN_KEY, USER_KEY};
use escape_admin_core::{
    AdminConsole, AdminError, AuthStatus, Config, FileStorage, LoginForm, MemoryStorage,
    MultipleChoiceForm, NewRoom, PreviewConfig, PreviewState, RegisterForm, RegisterOutcome,
    Screen, StandalonePageViewer, Storage, Tab,
};

type TestConsole = AdminConsole<MemoryStorage, StandalonePageViewer>;

fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("escape_admin_it_{name}"));
    std::fs::remove_dir_all(&dir).ok();
    dir
}

fn config(base_url: &str, preview_dir: &str) -> Config {
    Config {
        api_base: base_url.to_string(),
        preview: PreviewConfig {
            poll_interval_ms: 50,
            max_attempts: 20,
            output_dir: preview_dir.to_string(),
            ..PreviewConfig::default()
        },
        ..Config::default()
    }
}

fn console_for(base_url: &str, name: &str) -> TestConsole {
    let dir = temp_dir(name);
    let config = config(base_url, &dir.to_string_lossy());
    let viewer = StandalonePageViewer::new(base_url, &config.preview);
    AdminConsole::new(config, MemoryStorage::new(), viewer).expect("valid config")
}

async fn logged_in(base_url: &str, name: &str) -> TestConsole {
    let mut console = console_for(base_url, name);
    console
        .login(&LoginForm::new("mueller", PASSWORD))
        .await
        .expect("login should succeed");
    console
}

fn quiz_form() -> MultipleChoiceForm {
    MultipleChoiceForm {
        title: "Periodic table".into(),
        question: "Symbol of gold?".into(),
        options: ["Au".into(), "Ag".into(), "Gd".into(), "Go".into()],
        correct: 0,
        points: 15,
    }
}

// ============================================================================
// Login and session
// ============================================================================

#[tokio::test]
async fn test_teacher_login_stores_session_and_shows_dashboard() {
    let (backend, base_url) = FakeBackend::spawn().await;
    let mut console = console_for(&base_url, "login");

    let user = console
        .login(&LoginForm::new("mueller", PASSWORD))
        .await
        .expect("login should succeed");
    assert_eq!(user.username, "mueller");

    assert_eq!(console.status(), AuthStatus::LoggedIn);
    assert_eq!(console.view().screen(), Screen::Dashboard);
    assert_eq!(console.view().user_name(), Some("Anna Müller"));

    let storage = console.sessions().storage();
    assert_eq!(
        storage.get(TOKEN_KEY).unwrap().as_deref(),
        Some("token-mueller")
    );
    assert!(storage.get(USER_KEY).unwrap().is_some());

    let login = backend.last_request();
    assert_eq!(login.path, "/api/auth/login");
    assert!(login.authorization.is_none());
    assert_eq!(backend.request_count(), 1);
}

#[tokio::test]
async fn test_student_login_is_rejected_even_on_success() {
    let (backend, base_url) = FakeBackend::spawn().await;
    let mut console = console_for(&base_url, "student_login");

    let err = console
        .login(&LoginForm::new(STUDENT_USERNAME, PASSWORD))
        .await
        .unwrap_err();

    assert!(matches!(err, AdminError::NotTeacher { ref role } if role == "student"));
    assert_eq!(backend.request_count(), 1);
    assert_eq!(console.status(), AuthStatus::LoggedOut);
    assert!(console.sessions().storage().is_empty());
    assert_eq!(
        console.view().login_error(),
        Some("Only teachers can sign in here.")
    );
}

#[tokio::test]
async fn test_wrong_password_returns_to_logged_out() {
    let (_backend, base_url) = FakeBackend::spawn().await;
    let mut console = console_for(&base_url, "wrong_password");

    let err = console
        .login(&LoginForm::new("mueller", "nope"))
        .await
        .unwrap_err();

    assert!(matches!(err, AdminError::LoginFailed));
    assert_eq!(console.status(), AuthStatus::LoggedOut);
    assert!(console.view().login_error().is_some());

    // A retry is allowed after a failed attempt.
    console
        .login(&LoginForm::new("mueller", PASSWORD))
        .await
        .expect("second attempt should succeed");
}

#[tokio::test]
async fn test_session_file_restores_without_network() {
    let (backend, base_url) = FakeBackend::spawn().await;
    let dir = temp_dir("restore");
    let session_file = dir.join("session.json");
    let mut config = config(&base_url, &dir.join("preview").to_string_lossy());
    config.session_file = session_file.to_string_lossy().into_owned();

    let mut first = AdminConsole::from_config(config.clone()).expect("valid config");
    first
        .login(&LoginForm::new("mueller", PASSWORD))
        .await
        .expect("login should succeed");
    let requests_after_login = backend.request_count();

    let mut second = AdminConsole::from_config(config).expect("valid config");
    assert!(second.restore().expect("restore"));
    assert_eq!(second.status(), AuthStatus::LoggedIn);
    assert_eq!(second.user().map(|u| u.username.as_str()), Some("mueller"));
    assert_eq!(backend.request_count(), requests_after_login);

    second.logout().await.expect("logout");
    let mut third = AdminConsole::new(
        second.config().clone(),
        FileStorage::new(&session_file),
        StandalonePageViewer::new(&base_url, &second.config().preview),
    )
    .expect("valid config");
    assert!(!third.restore().expect("restore"));

    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test]
async fn test_requests_carry_bearer_token() {
    let (backend, base_url) = FakeBackend::spawn().await;
    let mut console = logged_in(&base_url, "bearer").await;

    console.load_rooms().await.expect("rooms");

    let request = backend.last_request();
    assert_eq!(request.path, "/api/admin/rooms");
    assert_eq!(request.authorization.as_deref(), Some("Bearer token-mueller"));
    assert_eq!(request.content_type.as_deref(), Some("application/json"));
}

#[tokio::test]
async fn test_rejected_token_clears_session() {
    let (backend, base_url) = FakeBackend::spawn().await;
    let mut console = logged_in(&base_url, "expired").await;

    backend.revoke_tokens();
    let err = console.load_rooms().await.unwrap_err();

    assert!(matches!(err, AdminError::SessionExpired));
    assert!(err.is_auth_failure());
    assert_eq!(console.status(), AuthStatus::LoggedOut);
    assert_eq!(console.view().screen(), Screen::Login);
    assert!(console.sessions().storage().is_empty());
    assert!(console.user().is_none());
}

#[tokio::test]
async fn test_logout_clears_token_and_user_together() {
    let (_backend, base_url) = FakeBackend::spawn().await;
    let mut console = logged_in(&base_url, "logout").await;
    console.load_rooms().await.expect("rooms");

    console.logout().await.expect("logout");

    let storage = console.sessions().storage();
    assert!(storage.get(TOKEN_KEY).unwrap().is_none());
    assert!(storage.get(USER_KEY).unwrap().is_none());
    assert!(console.rooms().is_empty());
    assert_eq!(console.view().screen(), Screen::Login);
}

#[tokio::test]
async fn test_torn_session_file_does_not_block_logout_or_login() {
    let (_backend, base_url) = FakeBackend::spawn().await;
    let dir = temp_dir("torn_session");
    std::fs::create_dir_all(&dir).expect("temp dir");
    let session_file = dir.join("session.json");
    std::fs::write(&session_file, r#"{"authToken": "tok", "currentUser": "#).expect("write");
    let mut config = config(&base_url, &dir.join("preview").to_string_lossy());
    config.session_file = session_file.to_string_lossy().into_owned();

    let mut console = AdminConsole::from_config(config).expect("valid config");
    assert!(!console.restore().expect("restore"));
    console.logout().await.expect("logout");

    let storage = console.sessions().storage();
    assert!(storage.get(TOKEN_KEY).expect("readable").is_none());
    assert!(storage.get(USER_KEY).expect("readable").is_none());

    std::fs::write(&session_file, r#"{"authToken": "#).expect("write");
    console
        .login(&LoginForm::new("mueller", PASSWORD))
        .await
        .expect("login should succeed");
    assert_eq!(
        console.sessions().storage().get(TOKEN_KEY).expect("readable").as_deref(),
        Some("token-mueller")
    );

    std::fs::remove_dir_all(&dir).ok();
}

// ============================================================================
// Registration
// ============================================================================

#[tokio::test]
async fn test_register_validation_sends_nothing() {
    let (backend, base_url) = FakeBackend::spawn().await;
    let mut console = console_for(&base_url, "register_validation");

    let cases = [
        ("ab", "12345678", "12345678"),
        ("abc", "1234567", "1234567"),
        ("abc", "12345678", "87654321"),
    ];
    for (username, password, confirm) in cases {
        let form = RegisterForm {
            username: username.into(),
            password: password.into(),
            confirm_password: confirm.into(),
            full_name: None,
        };
        let err = console.register(&form).await.unwrap_err();
        assert!(err.is_validation(), "{username}/{password}/{confirm}: {err}");
    }

    assert_eq!(backend.request_count(), 0);
    assert_eq!(console.status(), AuthStatus::LoggedOut);
}

#[tokio::test]
async fn test_register_outcomes() {
    let (_backend, base_url) = FakeBackend::spawn().await;
    let form = RegisterForm {
        username: "schmidt".into(),
        password: "geheim123".into(),
        confirm_password: "geheim123".into(),
        full_name: Some("Jonas Schmidt".into()),
    };

    let mut console = console_for(&base_url, "register_open");
    assert_eq!(
        console.register(&form).await.expect("register"),
        RegisterOutcome::Registered
    );
    assert_eq!(console.status(), AuthStatus::LoggedOut);

    let dir = temp_dir("register_approval");
    let mut config = config(&base_url, &dir.to_string_lossy());
    config.features.registration_requires_approval = true;
    let viewer = StandalonePageViewer::new(&base_url, &config.preview);
    let mut console = AdminConsole::new(config, MemoryStorage::new(), viewer).expect("valid");
    assert_eq!(
        console.register(&form).await.expect("register"),
        RegisterOutcome::PendingApproval
    );

    let taken = RegisterForm {
        username: TAKEN_USERNAME.into(),
        ..form
    };
    let err = console.register(&taken).await.unwrap_err();
    assert_eq!(err.status(), Some(400));
    assert_eq!(
        console.view().login_error(),
        Some("Username already registered")
    );
}

#[tokio::test]
async fn test_pending_teachers_are_approved_or_rejected() {
    let (backend, base_url) = FakeBackend::spawn().await;
    let dir = temp_dir("approval");
    let mut config = config(&base_url, &dir.to_string_lossy());
    config.features.registration_requires_approval = true;
    let viewer = StandalonePageViewer::new(&base_url, &config.preview);
    let mut console = AdminConsole::new(config, MemoryStorage::new(), viewer).expect("valid");
    console
        .login(&LoginForm::new("mueller", PASSWORD))
        .await
        .expect("login");

    let pending = console.load_pending_teachers().await.expect("pending");
    let names: Vec<&str> = pending.iter().map(|t| t.display_name()).collect();
    assert_eq!(names, vec!["Clara Weber", "koch"]);

    let message = console.approve_teacher(200, true).await.expect("approve");
    assert_eq!(message, "Teacher 200 approved");
    let request = backend.requests_to("/api/admin/approve-teacher/200")[0].clone();
    assert_eq!(request.method, "POST");
    assert_eq!(request.query.as_deref(), Some("approve=true"));

    console.approve_teacher(201, false).await.expect("reject");
    let request = backend.requests_to("/api/admin/approve-teacher/201")[0].clone();
    assert_eq!(request.query.as_deref(), Some("approve=false"));

    assert!(console.pending_teachers().is_empty());
    assert_eq!(backend.lock().approved_teachers, vec![200]);
    assert!(console.load_pending_teachers().await.expect("pending").is_empty());
}

#[tokio::test]
async fn test_teacher_approval_disabled_sends_nothing() {
    let (backend, base_url) = FakeBackend::spawn().await;
    let mut console = logged_in(&base_url, "approval_disabled").await;
    let before = backend.request_count();

    let err = console.load_pending_teachers().await.unwrap_err();

    assert!(matches!(
        err,
        AdminError::FeatureDisabled {
            feature: "registrationRequiresApproval"
        }
    ));
    assert_eq!(backend.request_count(), before);
}

// ============================================================================
// Rooms
// ============================================================================

#[tokio::test]
async fn test_room_lifecycle() {
    let (backend, base_url) = FakeBackend::spawn().await;
    let mut console = logged_in(&base_url, "rooms").await;

    console.switch_tab(Tab::Rooms).await.expect("rooms tab");
    assert!(console.view().rooms_html().contains("No rooms yet"));

    let room = console
        .create_room(&NewRoom::new("Chemistry Lab").with_description("Find the formula"))
        .await
        .expect("create room");
    assert_eq!(console.rooms().len(), 1);
    assert!(console.view().rooms_html().contains("Inactive"));
    assert!(console.rooms()[0].created_at.is_some());

    assert!(console.toggle_room(room.id).await.expect("toggle"));
    assert!(console.view().rooms_html().contains(">Active<"));

    let updated = console
        .update_room(room.id, &NewRoom::new("Chemistry Lab 2").with_time_limit(45))
        .await
        .expect("update");
    assert_eq!(updated.time_limit_minutes, 45);
    assert_eq!(backend.requests_to(&format!("/api/admin/rooms/{}", room.id))[0].method, "PUT");

    console.delete_room(room.id).await.expect("delete");
    assert!(console.rooms().is_empty());
    assert!(console.view().rooms_html().contains("No rooms yet"));
}

#[tokio::test]
async fn test_invalid_room_is_not_sent() {
    let (backend, base_url) = FakeBackend::spawn().await;
    let mut console = logged_in(&base_url, "invalid_room").await;
    let before = backend.request_count();

    let err = console.create_room(&NewRoom::new("  ")).await.unwrap_err();
    assert!(err.is_validation());
    assert_eq!(backend.request_count(), before);
}

// ============================================================================
// Puzzles
// ============================================================================

#[tokio::test]
async fn test_puzzle_without_room_is_refused_without_request() {
    let (backend, base_url) = FakeBackend::spawn().await;
    let mut console = logged_in(&base_url, "puzzle_no_room").await;
    let before = backend.request_count();

    let err = console.create_puzzle(quiz_form()).await.unwrap_err();

    assert!(matches!(err, AdminError::NoRoomSelected));
    assert_eq!(backend.request_count(), before);
}

#[tokio::test]
async fn test_multiple_choice_puzzle_in_selected_room() {
    let (backend, base_url) = FakeBackend::spawn().await;
    let mut console = logged_in(&base_url, "puzzles").await;
    let room = console
        .create_room(&NewRoom::new("Lab"))
        .await
        .expect("create room");

    console.switch_tab(Tab::Puzzles).await.expect("puzzles tab");
    assert!(console
        .view()
        .room_select_html()
        .starts_with(r#"<option value="">Select a room...</option>"#));

    let puzzles = console.select_room(Some(room.id)).await.expect("select");
    assert!(puzzles.is_empty());
    assert!(console.view().puzzles_html().contains("No puzzles yet."));

    let puzzle = console.create_puzzle(quiz_form()).await.expect("create");
    assert_eq!(puzzle.room_id, room.id);
    assert_eq!(console.puzzles().len(), 1);
    assert!(console
        .view()
        .puzzles_html()
        .contains("Type: multiple_choice | Points: 15 | Time: 300s"));

    let body = backend.lock().puzzle_bodies[0].clone();
    assert_eq!(body["h5p_json"]["options"][0], "Au");
    assert_eq!(body["h5p_json"]["correct"], 0);
    assert_eq!(body["order_index"], 0);

    console.delete_puzzle(puzzle.id).await.expect("delete");
    assert!(console.puzzles().is_empty());
}

#[tokio::test]
async fn test_edit_multiple_choice_puzzle() {
    let (backend, base_url) = FakeBackend::spawn().await;
    let mut console = logged_in(&base_url, "edit_puzzle").await;
    let room = console
        .create_room(&NewRoom::new("Lab"))
        .await
        .expect("create room");
    console.select_room(Some(room.id)).await.expect("select");
    let puzzle = console.create_puzzle(quiz_form()).await.expect("create");

    console.show_puzzle_form(Some(puzzle.id)).expect("form");
    let modal = console.view().modal().expect("modal open").clone();
    assert_eq!(modal.title, "Edit puzzle");
    assert!(modal.body.contains(r#"name="option0" value="Au""#));

    let mut edited = quiz_form();
    edited.question = "Symbol of silver?".into();
    edited.correct = 1;
    edited.points = 20;
    let updated = console
        .update_puzzle(puzzle.id, edited)
        .await
        .expect("update");
    assert_eq!(updated.id, puzzle.id);
    assert_eq!(updated.points, 20);

    let request = backend.requests_to(&format!("/api/admin/puzzles/{}", puzzle.id))[0].clone();
    assert_eq!(request.method, "PUT");
    let body = backend.lock().puzzle_bodies[1].clone();
    assert_eq!(body["room_id"], room.id);
    assert_eq!(body["h5p_json"]["question"], "Symbol of silver?");
    assert_eq!(body["h5p_json"]["correct"], 1);
    assert_eq!(body["time_limit_seconds"], 300);

    assert!(console.view().modal().is_none());
    assert_eq!(console.puzzles().len(), 1);
    assert!(console.view().puzzles_html().contains("Points: 20"));
}

#[tokio::test]
async fn test_api_error_carries_status_and_detail() {
    let (_backend, base_url) = FakeBackend::spawn().await;
    let mut console = logged_in(&base_url, "api_error").await;

    let err = console.delete_puzzle(999).await.unwrap_err();

    match err {
        AdminError::Api {
            status, detail, ..
        } => {
            assert_eq!(status, 404);
            assert_eq!(detail.as_deref(), Some("Puzzle not found"));
        }
        other => panic!("expected API error, got {other:?}"),
    }
    assert_eq!(console.status(), AuthStatus::LoggedIn);
}

// ============================================================================
// H5P
// ============================================================================

async fn upload_package(console: &mut TestConsole, dir: &std::path::Path) -> (i64, String) {
    std::fs::create_dir_all(dir).expect("create dir");
    let package = dir.join("drag-words.h5p");
    std::fs::write(&package, b"PK\x03\x04fake h5p package").expect("write package");

    let room = console
        .create_room(&NewRoom::new("Language Lab"))
        .await
        .expect("create room");
    console.select_room(Some(room.id)).await.expect("select");
    let uploaded = console.upload_h5p(&package).await.expect("upload");
    (room.id, uploaded.content_id)
}

#[tokio::test]
async fn test_h5p_upload_is_multipart_with_room_query() {
    let (backend, base_url) = FakeBackend::spawn().await;
    let mut console = logged_in(&base_url, "upload").await;
    let dir = temp_dir("upload_files");

    let (room_id, content_id) = upload_package(&mut console, &dir).await;

    let request = backend.requests_to("/api/admin/h5p/upload")[0].clone();
    assert_eq!(request.query, Some(format!("room_id={room_id}")));
    assert!(request
        .content_type
        .as_deref()
        .is_some_and(|ct| ct.starts_with("multipart/form-data")));

    let upload = backend.lock().uploads[0].clone();
    assert_eq!(upload.file_name.as_deref(), Some("drag-words.h5p"));
    assert_eq!(upload.bytes, 20);
    assert_eq!(upload.room_id, room_id);

    // The puzzle list was reloaded with the new H5P puzzle.
    assert_eq!(console.puzzles().len(), 1);
    assert_eq!(console.puzzles()[0].h5p_content_id.as_deref(), Some(content_id.as_str()));

    let content = console.h5p_content(&content_id).await.expect("content");
    assert_eq!(content.title(), Some("Drag the Words"));

    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test]
async fn test_h5p_upload_rejects_other_extensions_locally() {
    let (backend, base_url) = FakeBackend::spawn().await;
    let mut console = logged_in(&base_url, "upload_zip").await;
    let room = console
        .create_room(&NewRoom::new("Lab"))
        .await
        .expect("create room");
    console.select_room(Some(room.id)).await.expect("select");
    let before = backend.request_count();

    let err = console
        .upload_h5p(std::path::Path::new("quiz.zip"))
        .await
        .unwrap_err();

    assert!(err.is_validation());
    assert_eq!(backend.request_count(), before);
}

#[tokio::test]
async fn test_h5p_preview_writes_page_once_library_loads() {
    let (_backend, base_url) = FakeBackend::spawn().await;
    let mut console = logged_in(&base_url, "preview").await;
    let dir = temp_dir("preview_files");
    let (_, content_id) = upload_package(&mut console, &dir).await;

    let state = console.preview_h5p(&content_id).await.expect("preview");
    assert_eq!(
        state,
        &PreviewState::Ready {
            content_id: content_id.clone()
        }
    );

    let page = console
        .preview()
        .viewer()
        .mounted()
        .expect("page written")
        .to_path_buf();
    let html = std::fs::read_to_string(&page).expect("read page");
    assert!(html.contains(&format!("{base_url}/static/h5p-content/{content_id}")));
    assert!(html.contains("<title>Drag the Words</title>"));

    console.close_preview().await.expect("close");
    assert_eq!(console.preview().state(), &PreviewState::Idle);
    assert!(!page.exists());

    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test]
async fn test_h5p_preview_without_library_shows_error_panel() {
    let (backend, base_url) = FakeBackend::spawn().await;
    let mut console = logged_in(&base_url, "preview_missing").await;
    let dir = temp_dir("preview_missing_files");
    let (_, content_id) = upload_package(&mut console, &dir).await;
    backend.hide_library();

    let err = console.preview_h5p(&content_id).await.unwrap_err();

    assert!(matches!(err, AdminError::PreviewLibraryTimeout { waited_ms: 1000 }));
    assert!(matches!(console.preview().state(), PreviewState::Failed { .. }));
    assert!(console.preview().viewer().error().is_some());
    assert!(console.preview().viewer().mounted().is_none());

    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test]
async fn test_delete_h5p_content_removes_puzzle() {
    let (backend, base_url) = FakeBackend::spawn().await;
    let mut console = logged_in(&base_url, "h5p_delete").await;
    let dir = temp_dir("h5p_delete_files");
    let (_room_id, content_id) = upload_package(&mut console, &dir).await;
    let puzzle_id = console.puzzles()[0].id;

    console.delete_h5p_content(puzzle_id).await.expect("delete");

    let requests = backend.requests_to(&format!("/api/admin/h5p/content/{puzzle_id}"));
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "DELETE");
    assert!(console.puzzles().is_empty());
    let err = console.h5p_content(&content_id).await.unwrap_err();
    assert_eq!(err.status(), Some(404));

    std::fs::remove_dir_all(&dir).ok();
}

// ============================================================================
// Students
// ============================================================================

#[tokio::test]
async fn test_students_tab() {
    let (_backend, base_url) = FakeBackend::spawn().await;
    let mut console = logged_in(&base_url, "students").await;

    console.switch_tab(Tab::Students).await.expect("students tab");
    assert!(console.view().is_tab_active(Tab::Students));
    assert_eq!(console.students().len(), 2);
    assert!(console.view().students_html().contains("<h4>Lena Vogel</h4>"));
    assert!(console.view().students_html().contains("<h4>tom</h4>"));

    console.delete_student(101).await.expect("delete");
    assert_eq!(console.students().len(), 1);
}

#[tokio::test]
async fn test_disabled_students_feature_sends_nothing() {
    let (backend, base_url) = FakeBackend::spawn().await;
    let dir = temp_dir("students_disabled");
    let mut config = config(&base_url, &dir.to_string_lossy());
    config.features.students = false;
    let viewer = StandalonePageViewer::new(&base_url, &config.preview);
    let mut console = AdminConsole::new(config, MemoryStorage::new(), viewer).expect("valid");
    console
        .login(&LoginForm::new("mueller", PASSWORD))
        .await
        .expect("login");
    let before = backend.request_count();

    let err = console.load_students().await.unwrap_err();
    assert!(matches!(err, AdminError::FeatureDisabled { feature: "students" }));
    assert_eq!(backend.request_count(), before);
}
