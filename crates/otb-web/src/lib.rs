//! JSON API over the replication pipeline: cookie-session auth backed by the
//! sink's `users` table, plus on-demand reads that re-run a sync job and
//! refresh the sink in the background.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use otb_sync::Orchestrator;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tracing::{error, info, warn};
use uuid::Uuid;

pub const CRATE_NAME: &str = "otb-web";

const SESSION_COOKIE: &str = "otb_session";
const SESSION_MAX_AGE_SECS: u32 = 86_400;

#[derive(Debug, Clone, Serialize)]
pub struct SessionUser {
    pub id: i64,
    pub username: String,
    pub display_name: String,
}

#[derive(Clone)]
pub struct AppState {
    orchestrator: Arc<Orchestrator>,
    sessions: Arc<RwLock<HashMap<String, SessionUser>>>,
}

impl AppState {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            orchestrator,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct LoginRequest {
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/api/login", post(login_handler))
        .route("/api/me", get(me_handler))
        .route("/api/logout", get(logout_handler))
        .route("/api/data/{job}", get(data_handler))
        .with_state(state)
}

pub async fn serve(state: AppState, port: u16) -> anyhow::Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, "web api listening");
    axum::serve(listener, app(state)).await?;
    Ok(())
}

async fn login_handler(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Response {
    let (Some(username), Some(password)) = (body.username, body.password) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "username and password are required",
        );
    };
    if username.is_empty() || password.is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            "username and password are required",
        );
    }

    let Some(store) = state.orchestrator.replacer().store() else {
        return error_response(StatusCode::SERVICE_UNAVAILABLE, "sink store not configured");
    };

    let users = match store
        .select("users", "id,username,password_hash,display_name,is_active", 1000)
        .await
    {
        Ok(users) => users,
        Err(err) => {
            error!(error = %err, "login user lookup failed");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "login check failed");
        }
    };

    let user = users.iter().find(|u| {
        u["username"]
            .as_str()
            .is_some_and(|name| name.eq_ignore_ascii_case(&username))
    });
    let Some(user) = user else {
        return error_response(StatusCode::UNAUTHORIZED, "unknown or disabled user");
    };
    if !user["is_active"].as_bool().unwrap_or(false) {
        return error_response(StatusCode::UNAUTHORIZED, "unknown or disabled user");
    }

    let hash = user["password_hash"].as_str().unwrap_or_default();
    match bcrypt::verify(&password, hash) {
        Ok(true) => {}
        Ok(false) => return error_response(StatusCode::UNAUTHORIZED, "wrong password"),
        Err(err) => {
            warn!(error = %err, "stored password hash is unreadable");
            return error_response(StatusCode::UNAUTHORIZED, "wrong password");
        }
    }

    let stored_name = user["username"].as_str().unwrap_or(&username).to_string();
    let session = SessionUser {
        id: user["id"].as_i64().unwrap_or_default(),
        display_name: user["display_name"]
            .as_str()
            .filter(|n| !n.is_empty())
            .unwrap_or(&stored_name)
            .to_string(),
        username: stored_name,
    };
    let display_name = session.display_name.clone();
    let token = Uuid::new_v4().to_string();
    state.sessions.write().await.insert(token.clone(), session);

    let cookie = format!(
        "{SESSION_COOKIE}={token}; HttpOnly; SameSite=Lax; Path=/; Max-Age={SESSION_MAX_AGE_SECS}"
    );
    (
        [(header::SET_COOKIE, cookie)],
        Json(json!({ "success": true, "display_name": display_name })),
    )
        .into_response()
}

async fn me_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let Some(token) = session_token(&headers) else {
        return error_response(StatusCode::UNAUTHORIZED, "no session");
    };
    match state.sessions.read().await.get(&token) {
        Some(user) => Json(json!({ "user": user })).into_response(),
        None => error_response(StatusCode::UNAUTHORIZED, "no session"),
    }
}

async fn logout_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(token) = session_token(&headers) {
        state.sessions.write().await.remove(&token);
    }
    let cookie = format!("{SESSION_COOKIE}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0");
    (
        [(header::SET_COOKIE, cookie)],
        Json(json!({ "success": true })),
    )
        .into_response()
}

/// On-demand read: re-run the named job against the source and answer with
/// its primary record set. The sink refresh rides along in the background so
/// a dashboard read never waits on sink latency.
async fn data_handler(State(state): State<AppState>, Path(job): Path<String>) -> Response {
    let Some(job) = state
        .orchestrator
        .jobs()
        .iter()
        .find(|j| j.name == job)
    else {
        return error_response(StatusCode::NOT_FOUND, "unknown data set");
    };

    let loads = match state.orchestrator.execute(job).await {
        Ok(loads) => loads,
        Err(err) => {
            error!(job = job.name, error = %err, "on-demand read failed");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "source query failed");
        }
    };

    let records = loads
        .first()
        .map(|load| load.records.clone())
        .unwrap_or_default();

    let orchestrator = state.orchestrator.clone();
    tokio::spawn(async move {
        for load in &loads {
            orchestrator.replacer().replace(load.table, &load.records).await;
        }
    });

    Json(records).into_response()
}

fn session_token(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(header::COOKIE)?.to_str().ok()?;
    raw.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE).then(|| value.to_string())
    })
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "success": false, "message": message }))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use otb_core::{Scalar, SourceRow};
    use otb_sink::{SinkError, SinkReplacer, SinkStore};
    use otb_source::{SourceError, SourceStore};
    use otb_sync::{Load, SyncJob, TimeGate};
    use serde_json::Value as JsonValue;
    use tower::ServiceExt;

    struct FixedSource;

    #[async_trait]
    impl SourceStore for FixedSource {
        async fn query(&self, _sql: &str) -> Result<Vec<SourceRow>, SourceError> {
            Ok(vec![SourceRow::from_pairs([
                ("segment", Scalar::Text("Direct".into())),
                ("rn_count", Scalar::Number(4.0)),
            ])])
        }
    }

    struct UsersSink {
        users: Vec<JsonValue>,
    }

    #[async_trait]
    impl SinkStore for UsersSink {
        async fn delete_all(&self, _table: &str) -> Result<(), SinkError> {
            Ok(())
        }

        async fn insert(&self, _table: &str, _records: &[JsonValue]) -> Result<(), SinkError> {
            Ok(())
        }

        async fn select(
            &self,
            table: &str,
            _columns: &str,
            _limit: u32,
        ) -> Result<Vec<JsonValue>, SinkError> {
            if table == "users" {
                Ok(self.users.clone())
            } else {
                Ok(Vec::new())
            }
        }
    }

    fn shape_segments(rows: &[SourceRow]) -> Vec<JsonValue> {
        rows.iter()
            .map(|r| {
                json!({
                    "segment": r.text_or_empty("segment"),
                    "rn_count": r.i64_or_zero("rn_count"),
                })
            })
            .collect()
    }

    static TEST_JOBS: [SyncJob; 1] = [SyncJob {
        name: "today_agent_rn",
        query: "SELECT 1",
        load: Load::Table {
            table: "today_agent_rn",
            shape: shape_segments,
        },
    }];

    fn test_app(users: Vec<JsonValue>) -> Router {
        let sink: Arc<dyn SinkStore> = Arc::new(UsersSink { users });
        let orchestrator = Arc::new(Orchestrator::new(
            Arc::new(FixedSource),
            Arc::new(SinkReplacer::new(Some(sink))),
            TimeGate::new(0, 24),
            &TEST_JOBS,
        ));
        app(AppState::new(orchestrator))
    }

    fn active_user(username: &str, password: &str) -> JsonValue {
        json!({
            "id": 7,
            "username": username,
            "password_hash": bcrypt::hash(password, 4).unwrap(),
            "display_name": "Revenue Desk",
            "is_active": true,
        })
    }

    fn login_request(username: &str, password: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                json!({ "username": username, "password": password }).to_string(),
            ))
            .unwrap()
    }

    async fn body_json(resp: Response) -> JsonValue {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn login_round_trip_sets_and_clears_the_session() {
        let app = test_app(vec![active_user("manager", "secret")]);

        let resp = app
            .clone()
            .oneshot(login_request("manager", "secret"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let set_cookie = resp.headers()[header::SET_COOKIE].to_str().unwrap();
        let cookie = set_cookie.split(';').next().unwrap().to_string();
        let body = body_json(resp).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["display_name"], "Revenue Desk");

        let me = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/me")
                    .header(header::COOKIE, &cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(me.status(), StatusCode::OK);
        assert_eq!(body_json(me).await["user"]["username"], "manager");

        let logout = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/logout")
                    .header(header::COOKIE, &cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(logout.status(), StatusCode::OK);

        let me_after = app
            .oneshot(
                Request::builder()
                    .uri("/api/me")
                    .header(header::COOKIE, &cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(me_after.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn login_matches_usernames_case_insensitively() {
        let app = test_app(vec![active_user("Manager", "secret")]);
        let resp = app.oneshot(login_request("mAnAgEr", "secret")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn login_rejects_bad_credentials() {
        let app = test_app(vec![active_user("manager", "secret")]);

        let wrong = app
            .clone()
            .oneshot(login_request("manager", "nope"))
            .await
            .unwrap();
        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

        let unknown = app
            .clone()
            .oneshot(login_request("nobody", "secret"))
            .await
            .unwrap();
        assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);

        let blank = app.oneshot(login_request("", "")).await.unwrap();
        assert_eq!(blank.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn login_rejects_inactive_users() {
        let mut user = active_user("manager", "secret");
        user["is_active"] = json!(false);
        let app = test_app(vec![user]);
        let resp = app.oneshot(login_request("manager", "secret")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn login_without_a_sink_is_unavailable() {
        let orchestrator = Arc::new(Orchestrator::new(
            Arc::new(FixedSource),
            Arc::new(SinkReplacer::unconfigured()),
            TimeGate::new(0, 24),
            &TEST_JOBS,
        ));
        let app = app(AppState::new(orchestrator));
        let resp = app.oneshot(login_request("manager", "secret")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn data_route_returns_the_shaped_records() {
        let app = test_app(Vec::new());
        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/api/data/today_agent_rn")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body, json!([{ "segment": "Direct", "rn_count": 4 }]));
    }

    #[tokio::test]
    async fn unknown_data_set_is_not_found() {
        let app = test_app(Vec::new());
        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/api/data/no_such_set")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
