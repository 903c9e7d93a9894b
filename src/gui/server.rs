//! Web server for the bug dashboard.
//!
//! Every handler reads the supervisor's cached state; only `POST /reconnect`
//! takes the write lock to probe again. Writes in demo mode answer
//! `403 Forbidden` before any store call is made.

use axum::{
    Form, Json, Router,
    extract::{Path as AxumPath, Query, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tera::{Context, Tera};
use tokio::sync::RwLock;

use super::views::{self, BugPage, Chrome, ErrorPage, IndexPage};
use crate::audit::AuditLog;
use crate::commands::{self, BugSource};
use crate::connection::{Banner, ConnectionSupervisor, Diagnostic, StoreHandle};
use crate::models::{BugFilter, BugSeverity, BugStatus, DEFAULT_PRIORITY, NewBug, NewLogEntry, TestStatus};
use crate::{Error, Result};

/// Default port for the dashboard
pub const DEFAULT_PORT: u16 = 8501;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Connection decision shared by all requests
    pub supervisor: Arc<RwLock<ConnectionSupervisor>>,
    /// Audit trail for writes
    pub audit: AuditLog,
    /// Directory whose git commit is attached to new bugs
    pub repo_path: PathBuf,
    pub tera: Arc<Tera>,
}

impl AppState {
    pub fn new(supervisor: ConnectionSupervisor, audit: AuditLog, repo_path: PathBuf) -> Result<Self> {
        Ok(Self {
            supervisor: Arc::new(RwLock::new(supervisor)),
            audit,
            repo_path,
            tera: Arc::new(views::templates()?),
        })
    }
}

/// Build the dashboard router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/bugs", post(create_bug))
        .route("/bugs/:id", get(show_bug))
        .route("/bugs/:id/status", post(update_status))
        .route("/bugs/:id/logs", post(add_log))
        .route("/reconnect", post(reconnect))
        .route("/api/status", get(api_status))
        .route("/api/bugs", get(api_bugs))
        .route("/export.csv", get(export_csv))
        .with_state(state)
}

/// Start the dashboard and serve until Ctrl+C.
///
/// The supervisor should already have probed; an unprobed supervisor is
/// probed here before the first request is accepted.
pub async fn start_server(
    mut supervisor: ConnectionSupervisor,
    audit: AuditLog,
    repo_path: PathBuf,
    host: &str,
    port: u16,
) -> Result<()> {
    supervisor.start().await;
    let state = AppState::new(supervisor, audit, repo_path)?;
    let app = build_router(state);

    let host_addr: std::net::IpAddr = host
        .parse()
        .map_err(|e| Error::InvalidInput(format!("Invalid host address '{}': {}", host, e)))?;
    let addr = SocketAddr::from((host_addr, port));
    println!("Starting bug dashboard at http://{}", addr);
    println!("Press Ctrl+C to stop");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down dashboard");
}

/// What a request sees of the connection, captured under one read lock.
struct Snapshot {
    chrome: Chrome,
    source: Result<BugSource>,
}

async fn snapshot(state: &AppState) -> Snapshot {
    let supervisor = state.supervisor.read().await;
    Snapshot {
        chrome: chrome_for(&supervisor, None),
        source: BugSource::for_state(&supervisor),
    }
}

fn chrome_for(supervisor: &ConnectionSupervisor, notice: Option<String>) -> Chrome {
    let state = supervisor.current_state();
    Chrome {
        state,
        demo: !state.is_live(),
        banner: supervisor
            .demo_reason()
            .map(|reason| Banner::new(supervisor.config(), &reason.to_string())),
        notice,
    }
}

/// The store handle for a write, or the response to send instead.
async fn writable(state: &AppState) -> std::result::Result<StoreHandle, Response> {
    let supervisor = state.supervisor.read().await;
    commands::writable_handle(&supervisor)
        .map_err(|e| error_page(state, chrome_for(&supervisor, None), &e))
}

fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::ReadOnly => StatusCode::FORBIDDEN,
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::InvalidId(_) | Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
        Error::StoreUnreachable { .. } | Error::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn render<T: Serialize>(tera: &Tera, template: &str, page: &T) -> Response {
    let html = Context::from_serialize(page).and_then(|ctx| tera.render(template, &ctx));
    match html {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            tracing::error!(template, error = %e, "failed to render template");
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to render page").into_response()
        }
    }
}

fn error_page(state: &AppState, chrome: Chrome, err: &Error) -> Response {
    let status = status_for(err);
    if status.is_server_error() {
        tracing::error!(error = %err, "dashboard request failed");
    }
    let diagnostic = Diagnostic::from_error(err);
    let page = ErrorPage {
        chrome,
        heading: status.canonical_reason().unwrap_or("Error").to_string(),
        message: diagnostic.error,
        tip: diagnostic.tip,
    };
    let mut response = render(&state.tera, "error.html", &page);
    *response.status_mut() = status;
    response
}

fn api_error(err: &Error) -> Response {
    let diagnostic = Diagnostic::from_error(err);
    (
        status_for(err),
        Json(serde_json::json!({ "error": diagnostic.error, "tip": diagnostic.tip })),
    )
        .into_response()
}

/// Filter query for list pages. Blank values are ignored.
#[derive(Debug, Default, Deserialize)]
struct ListQuery {
    status: Option<String>,
    module: Option<String>,
    severity: Option<String>,
    priority: Option<String>,
    notice: Option<String>,
}

impl ListQuery {
    fn filter(&self) -> Result<BugFilter> {
        let priority = parse_priority(self.priority.as_deref())?;
        BugFilter::parse(
            self.status.as_deref(),
            self.module.as_deref(),
            self.severity.as_deref(),
            priority,
        )
    }
}

fn parse_priority(raw: Option<&str>) -> Result<Option<u8>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(p) => p
            .trim_start_matches(['P', 'p'])
            .parse()
            .map(Some)
            .map_err(|_| Error::InvalidInput(format!("Invalid priority: {}", p))),
    }
}

/// Bug list with filters and the create form.
async fn index(State(state): State<AppState>, Query(query): Query<ListQuery>) -> Response {
    let Snapshot { mut chrome, source } = snapshot(&state).await;
    chrome.notice = query.notice.clone();
    let result = async {
        let filter = query.filter()?;
        let bugs = source?.list(&filter).await?;
        Ok::<_, Error>(IndexPage::new(chrome.clone(), &bugs, &filter))
    }
    .await;

    match result {
        Ok(page) => render(&state.tera, "index.html", &page),
        Err(e) => error_page(&state, chrome, &e),
    }
}

/// Detail page with logs and the status/log forms.
async fn show_bug(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    Query(query): Query<ListQuery>,
) -> Response {
    let Snapshot { mut chrome, source } = snapshot(&state).await;
    chrome.notice = query.notice;
    let result = async {
        let source = source?;
        commands::show_bug(&source, &id).await
    }
    .await;

    match result {
        Ok(detail) => render(&state.tera, "bug.html", &BugPage::new(chrome, &detail.bug)),
        Err(e) => error_page(&state, chrome, &e),
    }
}

#[derive(Debug, Deserialize)]
struct CreateForm {
    title: String,
    #[serde(default)]
    description: String,
    module: String,
    #[serde(default)]
    severity: String,
    #[serde(default)]
    priority: String,
}

impl CreateForm {
    fn into_new_bug(self) -> Result<NewBug> {
        let severity = match self.severity.trim() {
            "" => BugSeverity::default(),
            s => s.parse()?,
        };
        Ok(NewBug {
            title: self.title,
            description: self.description,
            module: self.module,
            severity,
            priority: parse_priority(Some(&self.priority))?.unwrap_or(DEFAULT_PRIORITY),
        })
    }
}

async fn create_bug(State(state): State<AppState>, Form(form): Form<CreateForm>) -> Response {
    let handle = match writable(&state).await {
        Ok(handle) => handle,
        Err(response) => return response,
    };
    let result = async {
        let new_bug = form.into_new_bug()?;
        commands::create_bug(&handle, &state.audit, &state.repo_path, new_bug).await
    }
    .await;

    match result {
        Ok(created) => Redirect::to(&format!(
            "/bugs/{}?notice=Bug%20created",
            created.id
        ))
        .into_response(),
        Err(e) => write_failed(&state, &e).await,
    }
}

#[derive(Debug, Deserialize)]
struct StatusForm {
    status: String,
}

async fn update_status(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    Form(form): Form<StatusForm>,
) -> Response {
    let handle = match writable(&state).await {
        Ok(handle) => handle,
        Err(response) => return response,
    };
    let result = async {
        let status: BugStatus = form.status.parse()?;
        commands::update_status(&handle, &state.audit, &id, status).await
    }
    .await;

    match result {
        Ok(_) => Redirect::to(&format!("/bugs/{}?notice=Status%20updated", id)).into_response(),
        Err(e) => write_failed(&state, &e).await,
    }
}

#[derive(Debug, Deserialize)]
struct LogForm {
    status: String,
    details: String,
    #[serde(default)]
    author: String,
}

async fn add_log(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    Form(form): Form<LogForm>,
) -> Response {
    let handle = match writable(&state).await {
        Ok(handle) => handle,
        Err(response) => return response,
    };
    let result = async {
        let status: TestStatus = form.status.parse()?;
        let entry = NewLogEntry {
            status,
            details: form.details,
            author: form.author,
        };
        commands::add_log(&handle, &state.audit, &id, entry).await
    }
    .await;

    match result {
        Ok(_) => Redirect::to(&format!("/bugs/{}?notice=Test%20log%20added", id)).into_response(),
        Err(e) => write_failed(&state, &e).await,
    }
}

async fn write_failed(state: &AppState, err: &Error) -> Response {
    let supervisor = state.supervisor.read().await;
    error_page(state, chrome_for(&supervisor, None), err)
}

/// Probe the store again and return to the list.
async fn reconnect(State(state): State<AppState>) -> Response {
    let new_state = state.supervisor.write().await.recheck().await;
    tracing::info!(state = %new_state, "connection re-checked");
    let notice = if new_state.is_live() {
        "Connected"
    } else {
        "Still%20unreachable"
    };
    Redirect::to(&format!("/?notice={}", notice)).into_response()
}

async fn api_status(State(state): State<AppState>) -> Json<commands::ConnectionReport> {
    let supervisor = state.supervisor.read().await;
    Json(commands::connection_report(&supervisor))
}

async fn api_bugs(State(state): State<AppState>, Query(query): Query<ListQuery>) -> Response {
    let Snapshot { source, .. } = snapshot(&state).await;
    let result = async {
        let filter = query.filter()?;
        commands::list_bugs(&source?, &filter).await
    }
    .await;

    match result {
        Ok(list) => Json(list).into_response(),
        Err(e) => api_error(&e),
    }
}

async fn export_csv(State(state): State<AppState>, Query(query): Query<ListQuery>) -> Response {
    let Snapshot { source, .. } = snapshot(&state).await;
    let result = async {
        let filter = query.filter()?;
        let mut buf = Vec::new();
        commands::export_csv(&source?, &filter, &mut buf).await?;
        Ok::<_, Error>(buf)
    }
    .await;

    match result {
        Ok(csv) => (
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
                (header::CONTENT_DISPOSITION, "attachment; filename=\"bugs.csv\""),
            ],
            csv,
        )
            .into_response(),
        Err(e) => api_error(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::sample::sample_bugs;
    use crate::storage::memory::InMemoryBugStore;
    use crate::test_utils::{demo_supervisor, live_supervisor};
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn app(supervisor: ConnectionSupervisor, dir: &TempDir) -> Router {
        let state = AppState::new(
            supervisor,
            AuditLog::at(dir.path().join("audit.log")),
            dir.path().to_path_buf(),
        )
        .unwrap();
        build_router(state)
    }

    async fn live_app(dir: &TempDir) -> (Router, InMemoryBugStore) {
        let (supervisor, store) = live_supervisor().await;
        (app(supervisor, dir), store)
    }

    async fn body_string(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_form(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    // === Demo mode ===

    #[tokio::test]
    async fn test_demo_index_shows_sample_bugs_banner_and_disabled_controls() {
        let dir = TempDir::new().unwrap();
        let app = app(demo_supervisor().await, &dir);

        let response = app.oneshot(get("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let html = body_string(response).await;

        assert!(html.contains("Demo mode: showing sample data"));
        assert!(html.contains("docker run"));
        assert!(html.contains("secrets.toml"));
        assert!(html.contains("disabled"));
        for bug in sample_bugs() {
            assert!(html.contains(&bug.id));
        }
    }

    #[tokio::test]
    async fn test_demo_create_is_forbidden() {
        let dir = TempDir::new().unwrap();
        let app = app(demo_supervisor().await, &dir);

        let response = app
            .oneshot(post_form("/bugs", "title=Crash&module=auth"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let html = body_string(response).await;
        assert!(html.contains("Demo mode: showing sample data"));
        assert!(!dir.path().join("audit.log").exists());
    }

    #[tokio::test]
    async fn test_demo_status_and_log_writes_are_forbidden() {
        let dir = TempDir::new().unwrap();
        let supervisor = demo_supervisor().await;
        let app = app(supervisor, &dir);
        let id = &sample_bugs()[0].id;

        let response = app
            .clone()
            .oneshot(post_form(&format!("/bugs/{}/status", id), "status=closed"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = app
            .oneshot(post_form(
                &format!("/bugs/{}/logs", id),
                "status=passed&details=ok",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_demo_detail_page_renders_sample_bug() {
        let dir = TempDir::new().unwrap();
        let app = app(demo_supervisor().await, &dir);
        let bug = &sample_bugs()[0];

        let response = app.oneshot(get(&format!("/bugs/{}", bug.id))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_string(response).await.contains(&bug.title));
    }

    #[tokio::test]
    async fn test_demo_api_status() {
        let dir = TempDir::new().unwrap();
        let app = app(demo_supervisor().await, &dir);

        let response = app.oneshot(get("/api/status")).await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(value["state"], "demo");
        assert!(value["reason"].is_string());
    }

    #[tokio::test]
    async fn test_demo_export_csv() {
        let dir = TempDir::new().unwrap();
        let app = app(demo_supervisor().await, &dir);

        let response = app.oneshot(get("/export.csv?status=open")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/csv; charset=utf-8"
        );
        let csv = body_string(response).await;
        assert_eq!(csv.lines().count(), 3);
    }

    // === Live mode ===

    #[tokio::test]
    async fn test_live_create_redirects_to_detail() {
        let dir = TempDir::new().unwrap();
        let (app, store) = live_app(&dir).await;

        let response = app
            .clone()
            .oneshot(post_form(
                "/bugs",
                "title=Login+broken&description=nothing+happens&module=auth&severity=high&priority=P1",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let location = response.headers()[header::LOCATION].to_str().unwrap().to_string();
        assert!(location.starts_with("/bugs/"));
        assert_eq!(store.len(), 1);

        let response = app.oneshot(get(&location)).await.unwrap();
        let html = body_string(response).await;
        assert!(html.contains("Login broken"));
        assert!(html.contains("P1"));
        assert!(!html.contains("Demo mode"));
    }

    #[tokio::test]
    async fn test_live_create_with_blank_title_is_bad_request() {
        let dir = TempDir::new().unwrap();
        let (app, store) = live_app(&dir).await;

        let response = app
            .oneshot(post_form("/bugs", "title=+&module=auth"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_live_update_status_and_list_filter() {
        let dir = TempDir::new().unwrap();
        let (app, _store) = live_app(&dir).await;

        let response = app
            .clone()
            .oneshot(post_form("/bugs", "title=A&module=core"))
            .await
            .unwrap();
        let location = response.headers()[header::LOCATION].to_str().unwrap().to_string();
        let id = location
            .trim_start_matches("/bugs/")
            .split('?')
            .next()
            .unwrap()
            .to_string();

        let response = app
            .clone()
            .oneshot(post_form(&format!("/bugs/{}/status", id), "status=resolved"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let response = app
            .oneshot(get("/api/bugs?status=resolved"))
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(value["count"], 1);
        assert_eq!(value["bugs"][0]["id"], id.as_str());
    }

    #[tokio::test]
    async fn test_live_unknown_bug_is_not_found() {
        let dir = TempDir::new().unwrap();
        let (app, _store) = live_app(&dir).await;
        let missing = bson::oid::ObjectId::new().to_hex();

        let response = app.oneshot(get(&format!("/bugs/{}", missing))).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(body_string(response).await.contains("Check Bug ID"));
    }

    #[tokio::test]
    async fn test_invalid_filter_is_bad_request() {
        let dir = TempDir::new().unwrap();
        let (app, _store) = live_app(&dir).await;

        let response = app.oneshot(get("/api/bugs?status=done")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_reconnect_probes_again() {
        let dir = TempDir::new().unwrap();
        let supervisor = demo_supervisor().await;
        let state = AppState::new(supervisor, AuditLog::disabled(), dir.path().to_path_buf()).unwrap();
        let shared = Arc::clone(&state.supervisor);
        let app = build_router(state);

        let response = app.oneshot(post_form("/reconnect", "")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(shared.read().await.probe_count(), 2);
    }

    #[test]
    fn test_parse_priority() {
        assert_eq!(parse_priority(None).unwrap(), None);
        assert_eq!(parse_priority(Some(" ")).unwrap(), None);
        assert_eq!(parse_priority(Some("P3")).unwrap(), Some(3));
        assert_eq!(parse_priority(Some("1")).unwrap(), Some(1));
        assert!(parse_priority(Some("high")).is_err());
    }
}
