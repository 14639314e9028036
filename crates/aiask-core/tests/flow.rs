use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use aiask_core::{App, AuthError, Config, DevicePrompt, DeviceSession, Endpoints, PlatformToken};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DEVICE_CODE_PATH: &str = "/login/device/code";
const ACCESS_TOKEN_PATH: &str = "/login/oauth/access_token";
const SERVICE_TOKEN_PATH: &str = "/copilot_internal/v2/token";
const CHAT_PATH: &str = "/chat/completions";

#[derive(Clone, Default)]
struct RecordingPrompt {
    shown: Arc<Mutex<Vec<DeviceSession>>>,
}

impl DevicePrompt for RecordingPrompt {
    fn show_code(&self, session: &DeviceSession) {
        self.shown.lock().expect("lock").push(session.clone());
    }
}

fn app_for(server: &MockServer, data_dir: &Path) -> (App, RecordingPrompt) {
    let uri = server.uri();
    let config = Config::for_data_dir(Some(data_dir.to_path_buf()))
        .with_endpoints(Endpoints::with_bases(&uri, &uri, &uri));
    let prompt = RecordingPrompt::default();
    let app = App::new(config)
        .expect("app builds")
        .with_prompt(prompt.clone());
    (app, prompt)
}

async fn mount_device_code(server: &MockServer, interval: u64, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path(DEVICE_CODE_PATH))
        .and(body_partial_json(json!({ "client_id": "01ab8ac9400c4e429b23", "scope": "repo" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "device_code": "dc-1",
            "user_code": "ABCD-1234",
            "verification_uri": "https://github.com/login/device",
            "expires_in": 900,
            "interval": interval,
        })))
        .expect(expected_calls)
        .mount(server)
        .await;
}

fn poll_error(code: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "error": code,
        "error_description": format!("{code} description"),
    }))
}

fn poll_success(token: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "access_token": token,
        "token_type": "bearer",
        "scope": "repo",
    }))
}

async fn mount_service_token(server: &MockServer, platform: &str, service: &str) {
    Mock::given(method("GET"))
        .and(path(SERVICE_TOKEN_PATH))
        .and(header("authorization", format!("token {platform}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token": service,
            "expires_at": 1_900_000_000,
            "refresh_in": 1500,
        })))
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_chat(server: &MockServer, service: &str, body: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .and(header("authorization", format!("Bearer {service}").as_str()))
        .and(body_partial_json(json!({
            "model": "gpt-4",
            "max_tokens": 1000,
            "messages": [
                { "role": "system", "content": "Answer shortly as an engineer would." },
                { "role": "user", "content": "What is 2+2?" }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_full_run_with_cached_token_logs_answer() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join("token"), "gho_cached").expect("seed token");

    mount_device_code(&server, 0, 0).await;
    mount_service_token(&server, "gho_cached", "svc-token").await;
    mount_chat(
        &server,
        "svc-token",
        json!({ "choices": [{ "index": 0, "message": { "role": "assistant", "content": "4" } }] }),
    )
    .await;

    let (app, prompt) = app_for(&server, dir.path());
    let answer = app.ask("What is 2+2?").await.expect("run succeeds");

    assert_eq!(answer, "4");
    assert!(prompt.shown.lock().expect("lock").is_empty());

    let log = std::fs::read_to_string(app.log().today_path()).expect("log written");
    assert!(log.contains("INPUT: What is 2+2?\nOUTPUT: 4\n---\n"));
}

#[tokio::test]
async fn test_missing_choices_falls_back_to_no_response() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join("token"), "gho_cached").expect("seed token");

    mount_service_token(&server, "gho_cached", "svc-token").await;
    mount_chat(&server, "svc-token", json!({ "id": "cmpl-1", "usage": {} })).await;

    let (app, _) = app_for(&server, dir.path());
    let answer = app.ask("What is 2+2?").await.expect("run succeeds");

    assert_eq!(answer, "No response");
    let log = std::fs::read_to_string(app.log().today_path()).expect("log written");
    assert!(log.contains("OUTPUT: No response"));
}

#[tokio::test]
async fn test_missing_token_runs_device_flow_once_and_persists() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().expect("tempdir");

    mount_device_code(&server, 0, 1).await;
    Mock::given(method("POST"))
        .and(path(ACCESS_TOKEN_PATH))
        .and(body_partial_json(json!({
            "device_code": "dc-1",
            "grant_type": "urn:ietf:params:oauth:grant-type:device_code",
        })))
        .respond_with(poll_error("authorization_pending"))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(ACCESS_TOKEN_PATH))
        .respond_with(poll_success("gho_fresh"))
        .expect(1)
        .mount(&server)
        .await;
    mount_service_token(&server, "gho_fresh", "svc-token").await;
    mount_chat(
        &server,
        "svc-token",
        json!({ "choices": [{ "message": { "content": "4" } }] }),
    )
    .await;

    let (app, prompt) = app_for(&server, dir.path());
    let answer = app.ask("What is 2+2?").await.expect("run succeeds");
    assert_eq!(answer, "4");

    let shown = prompt.shown.lock().expect("lock");
    assert_eq!(shown.len(), 1);
    assert_eq!(shown[0].user_code, "ABCD-1234");
    assert_eq!(shown[0].verification_uri, "https://github.com/login/device");

    let saved = std::fs::read_to_string(dir.path().join("token")).expect("token persisted");
    assert_eq!(saved, "gho_fresh");
}

#[tokio::test]
async fn test_polling_stops_at_ceiling_with_timeout() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().expect("tempdir");

    mount_device_code(&server, 0, 1).await;
    Mock::given(method("POST"))
        .and(path(ACCESS_TOKEN_PATH))
        .respond_with(poll_error("authorization_pending"))
        .expect(30)
        .mount(&server)
        .await;

    let (app, _) = app_for(&server, dir.path());
    let err = app.platform_token().await.expect_err("must time out");

    match err.downcast_ref::<AuthError>() {
        Some(AuthError::Timeout { attempts }) => assert_eq!(*attempts, 30),
        other => panic!("expected timeout, got {other:?}"),
    }
    assert!(!dir.path().join("token").exists());
}

#[tokio::test]
async fn test_terminal_error_code_stops_on_first_occurrence() {
    for code in ["access_denied", "expired_token", "slow_down", "incorrect_client_credentials"] {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().expect("tempdir");

        mount_device_code(&server, 0, 1).await;
        Mock::given(method("POST"))
            .and(path(ACCESS_TOKEN_PATH))
            .respond_with(poll_error(code))
            .expect(1)
            .mount(&server)
            .await;

        let (app, _) = app_for(&server, dir.path());
        let err = app.platform_token().await.expect_err("must fail");
        let auth = err.downcast_ref::<AuthError>().expect("auth error");
        assert_eq!(auth.code(), Some(code));
        assert!(!dir.path().join("token").exists());

        server.verify().await;
    }
}

#[tokio::test]
async fn test_waits_interval_before_each_poll() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().expect("tempdir");

    mount_device_code(&server, 1, 1).await;
    Mock::given(method("POST"))
        .and(path(ACCESS_TOKEN_PATH))
        .respond_with(poll_error("authorization_pending"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(ACCESS_TOKEN_PATH))
        .respond_with(poll_success("gho_slow"))
        .mount(&server)
        .await;

    let (app, _) = app_for(&server, dir.path());
    let started = Instant::now();
    let token = app.platform_token().await.expect("authorized");

    assert_eq!(token, PlatformToken::new("gho_slow"));
    assert!(started.elapsed() >= Duration::from_secs(2));
}

#[tokio::test]
async fn test_second_authentication_overwrites_token() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().expect("tempdir");

    mount_device_code(&server, 0, 2).await;
    Mock::given(method("POST"))
        .and(path(ACCESS_TOKEN_PATH))
        .respond_with(poll_success("gho_first"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(ACCESS_TOKEN_PATH))
        .respond_with(poll_success("gho_second"))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    let (app, _) = app_for(&server, dir.path());
    let flow = app.device_flow();
    flow.authorize(app.store()).await.expect("first login");
    flow.authorize(app.store()).await.expect("second login");

    let saved = std::fs::read_to_string(dir.path().join("token")).expect("token persisted");
    assert_eq!(saved, "gho_second");
    assert_eq!(
        app.store().load().expect("load"),
        Some(PlatformToken::new("gho_second"))
    );
}

#[tokio::test]
async fn test_device_code_failure_is_fatal_without_polling() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().expect("tempdir");

    Mock::given(method("POST"))
        .and(path(DEVICE_CODE_PATH))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(ACCESS_TOKEN_PATH))
        .respond_with(poll_success("gho_never"))
        .expect(0)
        .mount(&server)
        .await;

    let (app, prompt) = app_for(&server, dir.path());
    let err = app.platform_token().await.expect_err("must fail");

    assert!(matches!(err.downcast_ref::<AuthError>(), Some(AuthError::Api(_))));
    assert!(prompt.shown.lock().expect("lock").is_empty());
}

#[tokio::test]
async fn test_exchange_failure_aborts_before_chat() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join("token"), "gho_revoked").expect("seed token");

    Mock::given(method("GET"))
        .and(path(SERVICE_TOKEN_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_string("Bad credentials"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let (app, _) = app_for(&server, dir.path());
    let err = app.ask("What is 2+2?").await.expect_err("must fail");

    assert!(format!("{err:#}").contains("Unauthorized"));
    assert!(!app.log().today_path().exists());
}

#[tokio::test]
async fn test_chat_server_error_is_fatal() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join("token"), "gho_cached").expect("seed token");

    mount_service_token(&server, "gho_cached", "svc-token").await;
    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(1)
        .mount(&server)
        .await;

    let (app, _) = app_for(&server, dir.path());
    let err = app.ask("What is 2+2?").await.expect_err("must fail");
    assert!(format!("{err:#}").contains("Server error: boom"));
}

#[tokio::test]
async fn test_log_failure_does_not_abort_run() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join("token"), "gho_cached").expect("seed token");
    // A plain file where the log directory should be
    std::fs::write(dir.path().join("logs"), "blocked").expect("seed blocker");

    mount_service_token(&server, "gho_cached", "svc-token").await;
    mount_chat(
        &server,
        "svc-token",
        json!({ "choices": [{ "message": { "content": "4" } }] }),
    )
    .await;

    let (app, _) = app_for(&server, dir.path());
    let answer = app.ask("What is 2+2?").await.expect("run still succeeds");
    assert_eq!(answer, "4");
}

#[tokio::test]
async fn test_pending_with_bad_request_status_keeps_polling() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().expect("tempdir");

    mount_device_code(&server, 0, 1).await;
    Mock::given(method("POST"))
        .and(path(ACCESS_TOKEN_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "authorization_pending",
        })))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(ACCESS_TOKEN_PATH))
        .respond_with(poll_success("gho_after_400"))
        .expect(1)
        .mount(&server)
        .await;

    let (app, _) = app_for(&server, dir.path());
    let token = app.platform_token().await.expect("authorized after pending");

    assert_eq!(token, PlatformToken::new("gho_after_400"));
    let saved = std::fs::read_to_string(dir.path().join("token")).expect("token persisted");
    assert_eq!(saved, "gho_after_400");
}

#[tokio::test]
async fn test_error_code_with_bad_request_status_is_surfaced() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().expect("tempdir");

    mount_device_code(&server, 0, 1).await;
    Mock::given(method("POST"))
        .and(path(ACCESS_TOKEN_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "access_denied",
            "error_description": "The user has denied your application access.",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (app, _) = app_for(&server, dir.path());
    let err = app.platform_token().await.expect_err("must fail");

    let auth = err.downcast_ref::<AuthError>().expect("auth error");
    assert_eq!(auth.code(), Some("access_denied"));
    assert!(!dir.path().join("token").exists());
}

#[tokio::test]
async fn test_unparseable_poll_error_maps_status() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().expect("tempdir");

    mount_device_code(&server, 0, 1).await;
    Mock::given(method("POST"))
        .and(path(ACCESS_TOKEN_PATH))
        .respond_with(ResponseTemplate::new(502).set_body_string("<html>bad gateway</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let (app, _) = app_for(&server, dir.path());
    let err = app.platform_token().await.expect_err("must fail");

    match err.downcast_ref::<AuthError>() {
        Some(AuthError::Api(aiask_core::ApiError::ServerError(body))) => {
            assert!(body.contains("bad gateway"))
        }
        other => panic!("expected server error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_codeless_poll_error_is_fatal() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().expect("tempdir");

    mount_device_code(&server, 0, 1).await;
    Mock::given(method("POST"))
        .and(path(ACCESS_TOKEN_PATH))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({ "message": "nope" })))
        .expect(1)
        .mount(&server)
        .await;

    let (app, _) = app_for(&server, dir.path());
    let err = app.platform_token().await.expect_err("must fail");

    assert!(matches!(
        err.downcast_ref::<AuthError>(),
        Some(AuthError::Api(aiask_core::ApiError::AccessDenied(_)))
    ));
}
