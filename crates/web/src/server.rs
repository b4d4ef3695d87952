//! Web server implementation

use crate::static_files::StaticFiles;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};
use uuid::Uuid;

use todo_common::{contract, Error as StoreError, SessionStores, TaskId, TaskItem};

/// Server configuration
#[derive(Debug, Clone)]
pub struct WebServerConfig {
    /// Sessions idle for longer than this are dropped with their tasks
    pub session_ttl: Duration,
    /// Upper bound on live sessions
    pub max_sessions: usize,
}

impl Default for WebServerConfig {
    fn default() -> Self {
        Self {
            session_ttl: Duration::from_secs(60 * 60),
            max_sessions: 10_000,
        }
    }
}

impl WebServerConfig {
    /// Read `TODO_WEB_SESSION_TTL_SECS` and `TODO_WEB_MAX_SESSIONS`
    pub fn from_env() -> anyhow::Result<Self> {
        let mut cfg = Self::default();
        if let Ok(v) = std::env::var("TODO_WEB_SESSION_TTL_SECS") {
            cfg.session_ttl = Duration::from_secs(v.trim().parse()?);
        }
        if let Ok(v) = std::env::var("TODO_WEB_MAX_SESSIONS") {
            cfg.max_sessions = v.trim().parse()?;
        }
        Ok(cfg)
    }
}

/// Web server state
#[derive(Clone)]
pub struct WebServer {
    state: Arc<WebServerState>,
}

struct WebServerState {
    stores: SessionStores,
    static_files: StaticFiles,
    cfg: WebServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskLists {
    pub todo: Vec<TaskItem>,
    pub completed: Vec<TaskItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTaskRequest {
    pub text: String,
}

pub async fn serve(addr: SocketAddr, cfg: WebServerConfig) -> anyhow::Result<()> {
    let server = WebServer::new(cfg);
    server.serve(addr).await
}

impl WebServer {
    /// Create a new web server
    pub fn new(cfg: WebServerConfig) -> Self {
        Self {
            state: Arc::new(WebServerState {
                stores: SessionStores::new(cfg.max_sessions),
                static_files: StaticFiles::new(),
                cfg,
            }),
        }
    }

    /// Number of live storage sessions
    pub fn session_count(&self) -> usize {
        self.state.stores.len()
    }

    /// Create router
    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        Router::new()
            .route("/", get(index_handler))
            .route("/index.html", get(index_handler))
            .route("/assets/*path", get(asset_handler))
            .route("/health", get(health_handler))
            .route("/api/tasks", get(list_tasks_handler).post(create_task_handler))
            .route("/api/tasks/:task_id/complete", post(complete_task_handler))
            .route("/api/tasks/:task_id", axum::routing::delete(delete_task_handler))
            .layer(cors)
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Serve until the process is stopped
    pub async fn serve(self, addr: SocketAddr) -> anyhow::Result<()> {
        self.spawn_session_sweeper();

        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("Listening on http://{}", listener.local_addr()?);
        axum::serve(listener, self.router()).await?;
        Ok(())
    }

    fn spawn_session_sweeper(&self) {
        let state = self.state.clone();
        let ttl = state.cfg.session_ttl;
        let period = (ttl / 4).max(Duration::from_secs(1));

        tokio::spawn(async move {
            let mut tick = tokio::time::interval(period);
            loop {
                tick.tick().await;
                let evicted = state.stores.evict_idle(ttl);
                if evicted > 0 {
                    debug!("Evicted {} idle session(s)", evicted);
                }
            }
        });
    }
}

// ============================================================================
// Sessions
// ============================================================================

/// Session id from the cookie jar, minting a new one when absent
fn session(jar: CookieJar) -> (CookieJar, String) {
    if let Some(cookie) = jar.get(contract::SESSION_COOKIE) {
        let id = cookie.value().to_string();
        return (jar, id);
    }

    let id = Uuid::new_v4().to_string();
    let cookie = Cookie::build((contract::SESSION_COOKIE, id.clone()))
        .path("/")
        .http_only(true);
    (jar.add(cookie), id)
}

struct ApiError(StoreError);

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            StoreError::NotFound(_) => StatusCode::NOT_FOUND,
            StoreError::InvalidStateTransition { .. } => StatusCode::CONFLICT,
            StoreError::BlankText | StoreError::UnknownTab(_) => StatusCode::BAD_REQUEST,
            StoreError::SessionLimit(_) => StatusCode::SERVICE_UNAVAILABLE,
        };
        if status.is_server_error() {
            warn!("{}", self.0);
        }
        (status, Json(serde_json::json!({ "error": self.0.to_string() }))).into_response()
    }
}

// ============================================================================
// Handlers
// ============================================================================

async fn index_handler(
    State(state): State<Arc<WebServerState>>,
    jar: CookieJar,
) -> impl IntoResponse {
    let (jar, _) = session(jar);
    (jar, Html(state.static_files.index()))
}

async fn asset_handler(
    State(state): State<Arc<WebServerState>>,
    Path(path): Path<String>,
) -> Response {
    state.static_files.serve(&path).await
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "todo-web"
    }))
}

async fn list_tasks_handler(
    State(state): State<Arc<WebServerState>>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<TaskLists>), ApiError> {
    let (jar, sid) = session(jar);
    let lists = state.stores.with_session(&sid, |store| TaskLists {
        todo: store.todo().to_vec(),
        completed: store.completed().to_vec(),
    })?;
    Ok((jar, Json(lists)))
}

async fn create_task_handler(
    State(state): State<Arc<WebServerState>>,
    jar: CookieJar,
    Json(req): Json<CreateTaskRequest>,
) -> Result<Response, ApiError> {
    let (jar, sid) = session(jar);
    let created = state.stores.with_session(&sid, |store| store.add(&req.text))?;

    // Blank text is dropped without feedback, the way the original page behaves.
    let response = match created {
        Ok(item) => (jar, (StatusCode::CREATED, Json(item))).into_response(),
        Err(StoreError::BlankText) => (jar, StatusCode::NO_CONTENT).into_response(),
        Err(e) => return Err(e.into()),
    };
    Ok(response)
}

async fn complete_task_handler(
    State(state): State<Arc<WebServerState>>,
    jar: CookieJar,
    Path(task_id): Path<u64>,
) -> Result<(CookieJar, Json<TaskItem>), ApiError> {
    let (jar, sid) = session(jar);
    let item = state
        .stores
        .with_session(&sid, |store| store.complete(TaskId(task_id)))??;
    Ok((jar, Json(item)))
}

async fn delete_task_handler(
    State(state): State<Arc<WebServerState>>,
    jar: CookieJar,
    Path(task_id): Path<u64>,
) -> Result<(CookieJar, StatusCode), ApiError> {
    let (jar, sid) = session(jar);
    state
        .stores
        .with_session(&sid, |store| store.delete(TaskId(task_id)))??;
    Ok((jar, StatusCode::NO_CONTENT))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use tower::ServiceExt;

    const SESSION: &str = "todo_session=test-session";

    fn router() -> Router {
        WebServer::new(WebServerConfig::default()).router()
    }

    fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::COOKIE, SESSION)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn empty_request(method: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::COOKIE, SESSION)
            .body(Body::empty())
            .unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let response = router()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn index_sets_session_cookie() {
        let response = router()
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .unwrap();
        assert!(cookie.starts_with("todo_session="));
    }

    #[tokio::test]
    async fn add_complete_delete_flow() {
        let router = router();

        let response = router
            .clone()
            .oneshot(json_request("POST", "/api/tasks", serde_json::json!({ "text": "Walk dog" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let id = body_json(response).await["id"].as_u64().unwrap();

        let response = router
            .clone()
            .oneshot(empty_request("POST", &format!("/api/tasks/{}/complete", id)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = router
            .clone()
            .oneshot(empty_request("POST", &format!("/api/tasks/{}/complete", id)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let lists = body_json(
            router
                .clone()
                .oneshot(empty_request("GET", "/api/tasks"))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(lists["todo"].as_array().unwrap().len(), 0);
        assert_eq!(lists["completed"][0]["text"], "Walk dog");

        let response = router
            .clone()
            .oneshot(empty_request("DELETE", &format!("/api/tasks/{}", id)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = router
            .oneshot(empty_request("DELETE", &format!("/api/tasks/{}", id)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn blank_text_is_silently_ignored() {
        let router = router();
        let response = router
            .clone()
            .oneshot(json_request("POST", "/api/tasks", serde_json::json!({ "text": "   " })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let lists = body_json(router.oneshot(empty_request("GET", "/api/tasks")).await.unwrap()).await;
        assert!(lists["todo"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn sessions_do_not_share_tasks() {
        let server = WebServer::new(WebServerConfig::default());
        let router = server.router();

        router
            .clone()
            .oneshot(json_request("POST", "/api/tasks", serde_json::json!({ "text": "Mine" })))
            .await
            .unwrap();

        let other = Request::get("/api/tasks")
            .header(header::COOKIE, "todo_session=someone-else")
            .body(Body::empty())
            .unwrap();
        let lists = body_json(router.oneshot(other).await.unwrap()).await;
        assert!(lists["todo"].as_array().unwrap().is_empty());
        assert_eq!(server.session_count(), 2);
    }
}
