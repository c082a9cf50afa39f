//! Minimal NSX manager mock served over HTTP for client tests.

use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

use nsxt_reconciler::{NsxClient, NsxConfig};

pub const USERNAME: &str = "admin";
pub const PASSWORD: &str = "secret";
// base64("admin:secret")
const AUTHORIZATION: &str = "Basic YWRtaW46c2VjcmV0";

#[derive(Default)]
pub struct MockState {
    pub relay_profiles: BTreeMap<String, Value>,
    pub next_id: u64,
    /// Status to answer the next create with instead of 201.
    pub create_status: Option<StatusCode>,
    /// Raw body to answer the next create with, as a broken proxy would.
    pub create_body: Option<String>,
    /// End the NS group listing with a page that has no body.
    pub trailing_empty_page: bool,
}

pub type Shared = Arc<Mutex<MockState>>;

type Reply = (StatusCode, Json<Value>);

fn not_found(id: &str) -> Reply {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error_code": 202,
            "error_message": format!("The requested object : {} could not be found.", id),
        })),
    )
}

fn authorized(headers: &HeaderMap) -> Result<(), Reply> {
    match headers.get("authorization").and_then(|v| v.to_str().ok()) {
        Some(AUTHORIZATION) => Ok(()),
        _ => Err((
            StatusCode::FORBIDDEN,
            Json(json!({"error_code": 403, "error_message": "Access denied"})),
        )),
    }
}

async fn list_relay_profiles(State(state): State<Shared>, headers: HeaderMap) -> Reply {
    if let Err(reply) = authorized(&headers) {
        return reply;
    }
    let state = state.lock().await;
    let results: Vec<Value> = state.relay_profiles.values().cloned().collect();
    (
        StatusCode::OK,
        Json(json!({"result_count": results.len(), "results": results})),
    )
}

async fn create_relay_profile(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(mut body): Json<Value>,
) -> Response {
    if let Err(reply) = authorized(&headers) {
        return reply.into_response();
    }
    let mut state = state.lock().await;
    if body.get("_revision").is_some() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error_message": "_revision must not be set on create"})),
        )
            .into_response();
    }
    state.next_id += 1;
    let id = format!("relay-{}", state.next_id);
    body["id"] = json!(id);
    body["_revision"] = json!(0);
    state.relay_profiles.insert(id, body.clone());
    let status = state.create_status.take().unwrap_or(StatusCode::CREATED);
    match state.create_body.take() {
        Some(raw) => (status, raw).into_response(),
        None => (status, Json(body)).into_response(),
    }
}

async fn read_relay_profile(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Reply {
    if let Err(reply) = authorized(&headers) {
        return reply;
    }
    let state = state.lock().await;
    match state.relay_profiles.get(&id) {
        Some(profile) => (StatusCode::OK, Json(profile.clone())),
        None => not_found(&id),
    }
}

async fn update_relay_profile(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(mut body): Json<Value>,
) -> Reply {
    if let Err(reply) = authorized(&headers) {
        return reply;
    }
    let mut state = state.lock().await;
    let Some(current) = state.relay_profiles.get(&id) else {
        return not_found(&id);
    };
    let revision = current["_revision"].as_i64().unwrap_or(0);
    if body["_revision"].as_i64() != Some(revision) {
        return (
            StatusCode::PRECONDITION_FAILED,
            Json(json!({
                "error_code": 206,
                "error_message": "The object was modified by somebody else. Please retry.",
            })),
        );
    }
    body["id"] = json!(id);
    body["_revision"] = json!(revision + 1);
    state.relay_profiles.insert(id, body.clone());
    (StatusCode::OK, Json(body))
}

async fn delete_relay_profile(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Reply {
    if let Err(reply) = authorized(&headers) {
        return reply;
    }
    let mut state = state.lock().await;
    match state.relay_profiles.remove(&id) {
        Some(_) => (StatusCode::OK, Json(Value::Null)),
        None => not_found(&id),
    }
}

fn ns_groups() -> [Value; 2] {
    [
        json!({"id": "g1", "display_name": "web", "description": "first", "_revision": 3}),
        json!({"id": "g2", "display_name": "web", "description": "second", "_revision": 1}),
    ]
}

async fn read_ns_group(
    Path(id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Reply {
    if query.get("populate_references").map(String::as_str) != Some("true") {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error_message": "populate_references expected"})),
        );
    }
    match ns_groups().into_iter().find(|g| g["id"] == id.as_str()) {
        Some(group) => (StatusCode::OK, Json(group)),
        None => not_found(&id),
    }
}

/// Two pages, each holding a group named "web".
async fn list_ns_groups(
    State(state): State<Shared>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let trailing_empty_page = state.lock().await.trailing_empty_page;
    let [first, second] = ns_groups();
    let page = match query.get("cursor").map(String::as_str) {
        None => json!({"result_count": 2, "cursor": "0002", "results": [first]}),
        Some("0002") if trailing_empty_page => {
            json!({"result_count": 2, "cursor": "0003", "results": [second]})
        }
        Some("0002") => json!({"result_count": 2, "results": [second]}),
        Some("0003") if trailing_empty_page => return StatusCode::OK.into_response(),
        Some(other) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"error_message": format!("bad cursor {}", other)})),
            )
                .into_response();
        }
    };
    (StatusCode::OK, Json(page)).into_response()
}

/// `sg-1` is a SpoofGuard profile, `qos-1` a profile of another type.
async fn read_switching_profile(Path(id): Path<String>) -> Reply {
    let profile = match id.as_str() {
        "sg-1" => json!({
            "id": "sg-1",
            "resource_type": "SpoofGuardSwitchingProfile",
            "display_name": "strict",
            "white_list_providers": ["LPORT_BINDINGS"],
            "_revision": 0,
        }),
        "qos-1" => json!({
            "id": "qos-1",
            "resource_type": "QosSwitchingProfile",
            "display_name": "gold",
            "_revision": 2,
        }),
        _ => return not_found(&id),
    };
    (StatusCode::OK, Json(profile))
}

async fn list_switching_profiles(Query(query): Query<HashMap<String, String>>) -> Reply {
    if query.get("switching_profile_type").map(String::as_str) != Some("SpoofGuardSwitchingProfile")
    {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error_message": "switching_profile_type filter missing"})),
        );
    }
    (
        StatusCode::OK,
        Json(json!({
            "result_count": 1,
            "results": [{
                "id": "sg-1",
                "resource_type": "SpoofGuardSwitchingProfile",
                "display_name": "strict",
                "white_list_providers": ["LPORT_BINDINGS"],
                "_revision": 0,
            }],
        })),
    )
}

pub fn router(state: Shared) -> Router {
    Router::new()
        .route(
            "/api/v1/dhcp/relay-profiles",
            get(list_relay_profiles).post(create_relay_profile),
        )
        .route(
            "/api/v1/dhcp/relay-profiles/{id}",
            get(read_relay_profile)
                .put(update_relay_profile)
                .delete(delete_relay_profile),
        )
        .route("/api/v1/ns-groups", get(list_ns_groups))
        .route("/api/v1/ns-groups/{id}", get(read_ns_group))
        .route("/api/v1/switching-profiles", get(list_switching_profiles))
        .route("/api/v1/switching-profiles/{id}", get(read_switching_profile))
        .with_state(state)
}

/// Mock manager bound to an ephemeral local port.
pub struct MockNsx {
    pub addr: SocketAddr,
    pub state: Shared,
    shutdown_tx: tokio::sync::oneshot::Sender<()>,
}

impl MockNsx {
    pub async fn spawn() -> Self {
        let state: Shared = Arc::new(Mutex::new(MockState::default()));
        let app = router(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().unwrap();
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            state,
            shutdown_tx,
        }
    }

    pub fn config(&self, password: &str) -> NsxConfig {
        NsxConfig {
            host: format!("http://{}", self.addr),
            username: USERNAME.to_string(),
            password: password.to_string(),
            allow_unverified_ssl: false,
            timeout: Duration::from_secs(5),
        }
    }

    pub fn client(&self) -> NsxClient {
        NsxClient::new(&self.config(PASSWORD)).expect("Failed to build client")
    }

    pub fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
    }
}
