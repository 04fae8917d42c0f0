//! JSON HTTP wrapper around a single mailbox session.
//!
//! Every response uses the same envelope: `{"success": true, "data": ...}`
//! on success, `{"success": false, "error": "..."}` otherwise.

use crate::extract;
use crate::history::History;
use crate::wait::{WaitKind, WaitOptions};
use crate::{Client, Credentials, Error, Mailbox, Status};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

const DEFAULT_WAIT: Duration = Duration::from_secs(60);

/// Shared server state: the provider client, the active mailbox, and the
/// session history.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<Inner>,
}

struct Inner {
    client: Client,
    mailbox: Mutex<Option<Mailbox>>,
    history: Mutex<History>,
    poll_interval: Duration,
}

impl AppState {
    pub fn new(client: Client, history: History) -> Self {
        Self::with_poll_interval(client, history, WaitOptions::default().interval)
    }

    /// Like [`AppState::new`] with a custom pause between inbox polls.
    pub fn with_poll_interval(client: Client, history: History, poll_interval: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                client,
                mailbox: Mutex::new(None),
                history: Mutex::new(history),
                poll_interval,
            }),
        }
    }

    async fn activate(&self, mailbox: Mailbox) {
        let mut history = self.inner.history.lock().await;
        if let Err(e) = history.record_session(mailbox.credentials()) {
            tracing::warn!(error = %e, "could not save history");
        }
        *self.inner.mailbox.lock().await = Some(mailbox);
    }

    async fn current(&self) -> Result<Mailbox, ApiError> {
        self.inner
            .mailbox
            .lock()
            .await
            .clone()
            .ok_or_else(ApiError::no_mailbox)
    }
}

/// Failure response with an HTTP status and a message.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn no_mailbox() -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            "No active email. Generate an email first.",
        )
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status = match &err {
            Error::MessageNotFound(_) => StatusCode::NOT_FOUND,
            Error::NoDomains | Error::AccountCreation(_) | Error::History(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Error::Request(_) | Error::ResponseParse(_) | Error::Json(_) => StatusCode::BAD_GATEWAY,
        };
        tracing::warn!(%status, error = %err, "request failed");
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({"success": false, "error": self.message}));
        (self.status, body).into_response()
    }
}

type ApiResult = Result<Json<Value>, ApiError>;

fn ok(data: impl serde::Serialize) -> ApiResult {
    Ok(Json(json!({"success": true, "data": data})))
}

/// Build the router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/generate", get(generate))
        .route("/login", post(login))
        .route("/messages", get(messages))
        .route("/message/:id", get(message))
        .route("/wait-code", post(wait_code))
        .route("/wait-link", post(wait_link))
        .route("/wait-any", post(wait_any))
        .route("/wait-email", post(wait_email))
        .route("/status", get(status))
        .route("/domains", get(domains))
        .route("/history", get(history))
        .with_state(state)
}

/// Bind `addr` and serve until the process is stopped.
pub async fn serve(state: AppState, addr: SocketAddr) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, router(state)).await
}

async fn index() -> Json<Value> {
    Json(json!({
        "service": "TempMail API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "GET /generate": "Generate new temporary email",
            "POST /login": "Log in to an existing email (JSON: {\"email\", \"password\"})",
            "GET /messages": "Get all messages for current email",
            "GET /message/{id}": "Get specific message with full parsing",
            "POST /wait-code": "Wait for verification code (JSON: {\"timeout\": 60})",
            "POST /wait-link": "Wait for verification link (JSON: {\"timeout\": 60})",
            "POST /wait-any": "Wait for any verification (code or link)",
            "POST /wait-email": "Wait for any new email",
            "GET /status": "Get service status",
            "GET /domains": "Get available email domains",
            "GET /history": "List saved sessions"
        }
    }))
}

async fn generate(State(state): State<AppState>) -> ApiResult {
    let mailbox = state.inner.client.generate().await.map_err(|e| {
        tracing::warn!(error = %e, "generate failed");
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Failed to generate email")
    })?;
    let data = json!({
        "email": mailbox.address(),
        "password": mailbox.password(),
        "created_at": chrono::Utc::now(),
    });
    state.activate(mailbox).await;
    ok(data)
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    email: Option<String>,
    password: Option<String>,
}

async fn login(State(state): State<AppState>, Json(req): Json<LoginRequest>) -> ApiResult {
    let (Some(email), Some(password)) = (req.email, req.password) else {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "Email and password required",
        ));
    };

    let mailbox = state
        .inner
        .client
        .login(Credentials::new(email, password))
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, "login failed");
            ApiError::new(StatusCode::UNAUTHORIZED, "Login failed")
        })?;
    let data = json!({"email": mailbox.address()});
    state.activate(mailbox).await;
    ok(data)
}

async fn messages(State(state): State<AppState>) -> ApiResult {
    let mailbox = state.current().await?;
    let messages = mailbox.messages().await?;
    Ok(Json(json!({
        "success": true,
        "email": mailbox.address(),
        "count": messages.len(),
        "data": messages,
    })))
}

async fn message(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult {
    let mailbox = state.current().await?;
    let content = mailbox.message(&id).await?;
    let parsed = extract::parse(&content);
    ok(json!({"raw_content": content, "parsed_content": parsed}))
}

#[derive(Debug, Default, Deserialize)]
struct WaitRequest {
    /// Seconds; fractions allowed, negatives mean "check once".
    timeout: Option<f64>,
}

impl WaitRequest {
    fn timeout(&self) -> Duration {
        match self.timeout {
            Some(secs) => Duration::try_from_secs_f64(secs.max(0.0)).unwrap_or(Duration::MAX),
            None => DEFAULT_WAIT,
        }
    }
}

async fn wait_code(state: State<AppState>, body: Option<Json<WaitRequest>>) -> ApiResult {
    wait(state, WaitKind::Code, body).await
}

async fn wait_link(state: State<AppState>, body: Option<Json<WaitRequest>>) -> ApiResult {
    wait(state, WaitKind::Link, body).await
}

async fn wait_any(state: State<AppState>, body: Option<Json<WaitRequest>>) -> ApiResult {
    wait(state, WaitKind::Any, body).await
}

async fn wait_email(state: State<AppState>, body: Option<Json<WaitRequest>>) -> ApiResult {
    wait(state, WaitKind::Email, body).await
}

async fn wait(
    State(state): State<AppState>,
    kind: WaitKind,
    body: Option<Json<WaitRequest>>,
) -> ApiResult {
    let mailbox = state.current().await?;
    let timeout = body.map_or(DEFAULT_WAIT, |Json(req)| req.timeout());
    let options = WaitOptions {
        timeout,
        interval: state.inner.poll_interval,
    };

    let Some(found) = mailbox.wait_for(kind, options).await? else {
        return Err(ApiError::new(
            StatusCode::REQUEST_TIMEOUT,
            format!("No {kind} received within timeout period"),
        ));
    };

    let mut history = state.inner.history.lock().await;
    let saved = match &found {
        crate::Verification::Code { code, .. } => {
            history.record_codes(mailbox.credentials(), std::slice::from_ref(code))
        }
        crate::Verification::Link { links, .. } => {
            history.record_links(mailbox.credentials(), links)
        }
        crate::Verification::Email { .. } => Ok(()),
    };
    if let Err(e) = saved {
        tracing::warn!(error = %e, "could not save history");
    }
    ok(found)
}

async fn status(State(state): State<AppState>) -> ApiResult {
    let email = state.current().await.ok().map(|m| m.address().to_string());
    ok(Status::new(email.as_deref()))
}

async fn domains(State(state): State<AppState>) -> ApiResult {
    let domains: Vec<String> = state
        .inner
        .client
        .domains()
        .await?
        .into_iter()
        .map(|d| d.domain)
        .collect();
    Ok(Json(json!({
        "success": true,
        "count": domains.len(),
        "data": domains,
    })))
}

async fn history(State(state): State<AppState>) -> ApiResult {
    let history = state.inner.history.lock().await;
    ok(history.sessions())
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use tempfile::TempDir;

    struct Harness {
        provider: MockServer,
        base: String,
        http: reqwest::Client,
        _dir: TempDir,
    }

    async fn start() -> Harness {
        let provider = MockServer::start_async().await;
        let client = Client::builder()
            .base_url(provider.base_url())
            .build()
            .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let history = History::open(dir.path().join("history.json"));
        let state = AppState::with_poll_interval(client, history, Duration::from_millis(20));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(state)).await.unwrap();
        });

        Harness {
            provider,
            base: format!("http://{addr}"),
            http: reqwest::Client::new(),
            _dir: dir,
        }
    }

    async fn mock_signup(provider: &MockServer) {
        provider
            .mock_async(|when, then| {
                when.method(GET).path("/domains");
                then.status(200)
                    .json_body(json!({"hydra:member": [{"id": "d", "domain": "mail.example"}]}));
            })
            .await;
        provider
            .mock_async(|when, then| {
                when.method(POST).path("/accounts");
                then.status(201).json_body(json!({"id": "acc"}));
            })
            .await;
        provider
            .mock_async(|when, then| {
                when.method(POST).path("/token");
                then.status(200).json_body(json!({"token": "jwt"}));
            })
            .await;
    }

    async fn get_json(h: &Harness, path: &str) -> (u16, Value) {
        let resp = h.http.get(format!("{}{path}", h.base)).send().await.unwrap();
        (resp.status().as_u16(), resp.json().await.unwrap())
    }

    #[tokio::test]
    async fn mailbox_routes_require_active_email() {
        let h = start().await;
        let (status, body) = get_json(&h, "/messages").await;
        assert_eq!(status, 400);
        assert_eq!(body["success"], false);

        let resp = h
            .http
            .post(format!("{}/wait-code", h.base))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 400);
    }

    #[tokio::test]
    async fn generate_then_wait_for_code() {
        let h = start().await;
        mock_signup(&h.provider).await;
        h.provider
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/messages")
                    .header("authorization", "Bearer jwt");
                then.status(200).json_body(json!([
                    {"id": "m1", "from": {"address": "x@svc.io"}, "subject": "hi"}
                ]));
            })
            .await;
        h.provider
            .mock_async(|when, then| {
                when.method(GET).path("/messages/m1");
                then.status(200)
                    .json_body(json!({"id": "m1", "text": "Your code is 246810"}));
            })
            .await;

        let (status, body) = get_json(&h, "/generate").await;
        assert_eq!(status, 200);
        assert!(body["data"]["email"]
            .as_str()
            .unwrap()
            .ends_with("@mail.example"));

        let resp = h
            .http
            .post(format!("{}/wait-code", h.base))
            .json(&json!({"timeout": 5}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["data"]["type"], "code");
        assert_eq!(body["data"]["code"], "246810");

        let (_, history) = get_json(&h, "/history").await;
        assert_eq!(history["data"][0]["codes_received"][0], "246810");

        let (_, status) = get_json(&h, "/status").await;
        assert_eq!(status["data"]["authenticated"], true);
    }

    #[tokio::test]
    async fn wait_times_out_with_408() {
        let h = start().await;
        mock_signup(&h.provider).await;
        h.provider
            .mock_async(|when, then| {
                when.method(GET).path("/messages");
                then.status(200).json_body(json!([]));
            })
            .await;

        get_json(&h, "/generate").await;
        let resp = h
            .http
            .post(format!("{}/wait-link", h.base))
            .json(&json!({"timeout": 0}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 408);
    }

    #[test]
    fn wait_timeout_accepts_fractions_and_clamps_negatives() {
        let parse = |body: &str| serde_json::from_str::<WaitRequest>(body).unwrap().timeout();
        assert_eq!(parse("{}"), Duration::from_secs(60));
        assert_eq!(parse(r#"{"timeout": 1.5}"#), Duration::from_millis(1_500));
        assert_eq!(parse(r#"{"timeout": 30}"#), Duration::from_secs(30));
        assert_eq!(parse(r#"{"timeout": -1}"#), Duration::ZERO);
    }

    #[tokio::test]
    async fn fractional_and_negative_timeouts_are_honoured() {
        let h = start().await;
        mock_signup(&h.provider).await;
        h.provider
            .mock_async(|when, then| {
                when.method(GET).path("/messages");
                then.status(200).json_body(json!([]));
            })
            .await;

        get_json(&h, "/generate").await;
        for timeout in [json!(0.05), json!(-1)] {
            let started = std::time::Instant::now();
            let resp = h
                .http
                .post(format!("{}/wait-code", h.base))
                .json(&json!({ "timeout": timeout }))
                .send()
                .await
                .unwrap();
            assert_eq!(resp.status().as_u16(), 408);
            assert!(started.elapsed() < Duration::from_secs(5));
        }
    }

    #[tokio::test]
    async fn message_route_reports_not_found() {
        let h = start().await;
        mock_signup(&h.provider).await;
        h.provider
            .mock_async(|when, then| {
                when.method(GET).path("/messages/gone");
                then.status(404);
            })
            .await;

        get_json(&h, "/generate").await;
        let (status, body) = get_json(&h, "/message/gone").await;
        assert_eq!(status, 404);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn login_requires_both_fields() {
        let h = start().await;
        let resp = h
            .http
            .post(format!("{}/login", h.base))
            .json(&json!({"email": "a@b.io"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 400);
    }

    #[tokio::test]
    async fn domains_lists_names() {
        let h = start().await;
        mock_signup(&h.provider).await;
        let (status, body) = get_json(&h, "/domains").await;
        assert_eq!(status, 200);
        assert_eq!(body["count"], 1);
        assert_eq!(body["data"][0], "mail.example");
    }
}
