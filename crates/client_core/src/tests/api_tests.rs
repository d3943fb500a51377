use super::*;
use crate::error::ErrorKind;
use axum::{
    extract::Query,
    http::{header, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use shared::{domain::EventId, protocol::Credentials};
use tokio::net::TcpListener;

async fn spawn_server(app: Router) -> String {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}/api")
}

fn api(base_url: &str) -> HttpTimeclockApi {
    HttpTimeclockApi::new(base_url, Duration::from_secs(5)).expect("api")
}

fn login_request() -> LoginRequest {
    LoginRequest {
        credentials: Credentials {
            email: "alex@example.com".into(),
            password: "hunter2".into(),
        },
        remember_me: true,
    }
}

#[derive(Deserialize)]
struct WeekOffset {
    week_offset: u32,
}

async fn history(Query(q): Query<WeekOffset>) -> Json<serde_json::Value> {
    Json(json!({
        "history": [
            {"id": 10 + q.week_offset, "time": "2021-01-02 07:36:40.034879", "action": "clock_in"},
        ]
    }))
}

#[derive(Deserialize)]
struct ShiftParams {
    shift_id: i64,
}

async fn clock_in(
    Query(q): Query<ShiftParams>,
    Json(body): Json<ClockInRequest>,
) -> (StatusCode, Json<serde_json::Value>) {
    if body.code != 442 {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"message": "Invalid clock-in code"})),
        );
    }
    (
        StatusCode::OK,
        Json(json!({
            "event": {"id": 77, "time": "2024-01-02T10:00:00", "action": "clock_in", "employee_id": q.shift_id}
        })),
    )
}

#[test]
fn endpoints_map_to_api_routes() {
    assert_eq!(Endpoint::Login.to_string(), "POST /auth/login");
    assert_eq!(Endpoint::CurrentSession.to_string(), "GET /users/me");
    assert_eq!(Endpoint::History.to_string(), "GET /clock/history");
    assert_eq!(Endpoint::ClockStatus.to_string(), "GET /clock");
    assert_eq!(Endpoint::UpdateClockStatus.to_string(), "POST /clock");
    assert!(Endpoint::CurrentSession.is_session_probe());
    assert!(!Endpoint::Login.is_session_probe());
}

#[test]
fn rejects_non_http_base_url() {
    assert!(HttpTimeclockApi::new("ftp://example.com/api", DEFAULT_REQUEST_TIMEOUT).is_err());
    assert!(HttpTimeclockApi::new("not a url", DEFAULT_REQUEST_TIMEOUT).is_err());
    let api = HttpTimeclockApi::new("http://localhost:5000/api/", DEFAULT_REQUEST_TIMEOUT)
        .expect("api");
    assert_eq!(api.base_url(), "http://localhost:5000/api");
}

#[tokio::test]
async fn history_page_sends_week_offset() {
    let base_url = spawn_server(Router::new().route("/api/clock/history", get(history))).await;

    let events = api(&base_url)
        .history_page(HistoryQuery { week_offset: 3 })
        .await
        .expect("history");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].id, EventId(13));
}

#[tokio::test]
async fn clock_status_update_posts_both_flags_to_clock() {
    let app = Router::new().route(
        "/api/clock",
        post(|Json(body): Json<serde_json::Value>| async move {
            assert_eq!(body, json!({"clocked": true, "on_break": true}));
            Json(json!({"clocked": body["clocked"], "on_break": body["on_break"]}))
        }),
    );
    let base_url = spawn_server(app).await;

    let status = api(&base_url)
        .update_clock_status(ClockStatusUpdate {
            clocked: true,
            on_break: true,
        })
        .await
        .expect("update");
    assert_eq!(
        status,
        ClockStatus {
            clocked: true,
            on_break: true
        }
    );
}

#[tokio::test]
async fn clock_in_posts_shift_and_code() {
    let base_url = spawn_server(Router::new().route("/api/clock/clock-in", post(clock_in))).await;
    let api = api(&base_url);

    let event = api
        .clock_in(ShiftId(5), ClockInRequest { code: 442 })
        .await
        .expect("clock in");
    assert_eq!(event.id, EventId(77));
    assert_eq!(event.employee_id.map(|id| id.0), Some(5));

    let err = api
        .clock_in(ShiftId(5), ClockInRequest { code: 1 })
        .await
        .expect_err("bad code");
    assert_eq!(err.kind(), ErrorKind::Remote);
    assert_eq!(err.status(), Some(400));
    assert_eq!(err.user_message().as_deref(), Some("Invalid clock-in code"));
}

#[tokio::test]
async fn rejected_login_is_auth_error_with_body() {
    let app = Router::new().route(
        "/api/auth/login",
        post(|| async {
            (
                StatusCode::BAD_REQUEST,
                Json(json!({"meta": {"code": 400}, "response": {"errors": {"password": ["Invalid password"]}}})),
            )
        }),
    );
    let base_url = spawn_server(app).await;

    let err = api(&base_url)
        .login(&login_request())
        .await
        .expect_err("must fail");
    assert_eq!(err.kind(), ErrorKind::Auth);
    assert_eq!(err.endpoint(), Some(Endpoint::Login));
    assert_eq!(err.user_message().as_deref(), Some("Invalid password"));
}

#[tokio::test]
async fn login_cookie_is_sent_on_later_requests() {
    let app = Router::new()
        .route(
            "/api/auth/login",
            post(|| async {
                (
                    [(header::SET_COOKIE, "session=abc123; Path=/")],
                    Json(json!({"response": {"user": {"id": 1}}})),
                )
            }),
        )
        .route(
            "/api/users/me",
            get(|headers: HeaderMap| async move {
                let has_cookie = headers
                    .get(header::COOKIE)
                    .and_then(|value| value.to_str().ok())
                    .is_some_and(|value| value.contains("session=abc123"));
                if has_cookie {
                    (
                        StatusCode::OK,
                        Json(json!({"authenticated_user": {"id": 1, "email": "alex@example.com"}})),
                    )
                } else {
                    (StatusCode::UNAUTHORIZED, Json(json!({"message": "Unauthorized"})))
                }
            }),
        );
    let base_url = spawn_server(app).await;
    let api = api(&base_url);

    let before = api.current_user().await.expect_err("anonymous");
    assert_eq!(before.kind(), ErrorKind::Auth);

    let payload = api.login(&login_request()).await.expect("login");
    assert_eq!(payload["response"]["user"]["id"], 1);

    let user = api.current_user().await.expect("me").expect("user");
    assert_eq!(user.email.as_deref(), Some("alex@example.com"));
}

#[tokio::test]
async fn null_authenticated_user_is_none() {
    let app = Router::new().route(
        "/api/users/me",
        get(|| async { Json(json!({"authenticated_user": null})) }),
    );
    let base_url = spawn_server(app).await;
    assert_eq!(api(&base_url).current_user().await.expect("me"), None);
}

#[tokio::test]
async fn malformed_success_body_is_decode_error() {
    let app = Router::new().route(
        "/api/clock",
        get(|| async { Json(json!({"clocked": "maybe"})) }),
    );
    let base_url = spawn_server(app).await;

    let err = api(&base_url).clock_status().await.expect_err("decode");
    assert_eq!(err.kind(), ErrorKind::Decode);
}

#[tokio::test]
async fn slow_server_times_out_as_network_error() {
    let app = Router::new().route(
        "/api/clock",
        get(|| async {
            tokio::time::sleep(Duration::from_secs(2)).await;
            Json(json!({"clocked": true, "on_break": false}))
        }),
    );
    let base_url = spawn_server(app).await;
    let api = HttpTimeclockApi::new(&base_url, Duration::from_millis(100)).expect("api");

    let err = api.clock_status().await.expect_err("timeout");
    assert!(
        matches!(err, ClientError::Network { timed_out: true, .. }),
        "unexpected error: {err:?}"
    );
}

#[tokio::test]
async fn unreachable_server_is_network_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let err = api(&format!("http://{addr}/api"))
        .logout()
        .await
        .expect_err("refused");
    assert_eq!(err.kind(), ErrorKind::Network);
    assert_eq!(err.user_message().as_deref(), Some(crate::error::UNREACHABLE_MESSAGE));
}
