//! Integration tests for the admin API client.
//!
//! These exercise `ApiClient` directly against the fake backend: header
//! injection, error mapping and the library loader's readiness signal.

mod common;

use std::time::Duration;

use common::{FakeBackend, PASSWORD};
use escape_admin_core::preview::readiness;
use escape_admin_core::{AdminError, ApiClient, Config, LibraryLoader, NewRoom};

async fn authorized_client(base_url: &str) -> ApiClient {
    let mut client = ApiClient::new(base_url).expect("valid base url");
    let token = client
        .login("mueller", PASSWORD)
        .await
        .expect("login should succeed");
    assert_eq!(token.token_type, "bearer");
    client.set_token(Some(token.access_token));
    client
}

#[tokio::test]
async fn test_no_authorization_header_without_token() {
    let (backend, base_url) = FakeBackend::spawn().await;
    let client = ApiClient::new(&base_url).expect("valid base url");

    let err = client.list_rooms().await.unwrap_err();

    assert_eq!(err.status(), Some(401));
    assert!(backend.last_request().authorization.is_none());
}

#[tokio::test]
async fn test_json_body_and_bearer_header() {
    let (backend, base_url) = FakeBackend::spawn().await;
    let client = authorized_client(&base_url).await;

    let room = client
        .create_room(&NewRoom::new("Attic").with_time_limit(25))
        .await
        .expect("create room");
    assert_eq!(room.name, "Attic");
    assert_eq!(room.time_limit_minutes, 25);

    let request = backend.last_request();
    assert_eq!(request.method, "POST");
    assert_eq!(request.authorization.as_deref(), Some("Bearer token-mueller"));
    assert_eq!(request.content_type.as_deref(), Some("application/json"));
}

#[tokio::test]
async fn test_toggle_reports_new_state() {
    let (_backend, base_url) = FakeBackend::spawn().await;
    let client = authorized_client(&base_url).await;
    let room = client.create_room(&NewRoom::new("Cellar")).await.expect("create");

    assert!(client.toggle_room(room.id).await.expect("toggle").is_active);
    assert!(!client.toggle_room(room.id).await.expect("toggle").is_active);
}

#[tokio::test]
async fn test_error_without_detail_still_has_status() {
    let (_backend, base_url) = FakeBackend::spawn().await;
    let client = authorized_client(&base_url).await;

    let err = client
        .fetch_asset("/static/does-not-exist.js")
        .await
        .unwrap_err();

    match err {
        AdminError::Api {
            endpoint,
            status,
            detail,
        } => {
            assert_eq!(endpoint, "/static/does-not-exist.js");
            assert_eq!(status, 404);
            assert!(detail.is_none());
        }
        other => panic!("expected API error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unreachable_server_is_http_error() {
    let client = ApiClient::new("http://127.0.0.1:9").expect("valid base url");
    let err = client.list_students().await.unwrap_err();
    assert!(matches!(err, AdminError::Http(_)));
    assert_eq!(err.status(), None);
}

#[tokio::test]
async fn test_request_timeout_from_config() {
    let (_backend, base_url) = FakeBackend::spawn().await;
    let config = Config {
        api_base: base_url,
        request_timeout_seconds: Some(5),
        ..Config::default()
    };
    let client = ApiClient::from_config(&config).expect("client");
    client.login("mueller", PASSWORD).await.expect("login");
}

#[tokio::test]
async fn test_library_loader_raises_readiness() {
    let (backend, base_url) = FakeBackend::spawn().await;
    let client = authorized_client(&base_url).await;
    let loader = LibraryLoader::new(client, "/static/h5p-standalone/main.bundle.js");

    let (signal, mut ready) = readiness();
    loader.load(signal).await.expect("library loads");

    assert!(ready.is_ready());
    ready
        .wait(Duration::from_millis(10))
        .await
        .expect("already ready");
    assert_eq!(
        backend
            .requests_to("/static/h5p-standalone/main.bundle.js")
            .len(),
        1
    );
}

#[tokio::test]
async fn test_library_loader_failure_keeps_signal_down() {
    let (backend, base_url) = FakeBackend::spawn().await;
    backend.hide_library();
    let loader = LibraryLoader::new(
        ApiClient::new(&base_url).expect("valid base url"),
        "/static/h5p-standalone/main.bundle.js",
    );

    let (signal, ready) = readiness();
    let err = loader.load(signal).await.unwrap_err();

    assert_eq!(err.status(), Some(404));
    assert!(!ready.is_ready());
}
