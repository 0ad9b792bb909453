//! Read-only HTTP API for inspecting the brain

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use botbrain_core::{BrainError, SharedUser, User};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::runtime::BotRuntime;

/// API state containing the bot runtime
pub type ApiState = Arc<BotRuntime>;

/// API response wrapper
#[derive(Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(error: impl ToString) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.to_string()),
        }
    }
}

/// Node status response
#[derive(Serialize, Deserialize)]
pub struct StatusResponse {
    pub name: String,
    pub user_count: usize,
    pub private_keys: usize,
    pub auto_save: bool,
    pub save_interval_secs: Option<u64>,
    pub storage: Option<String>,
    pub last_saved_at: Option<String>,
    pub uptime_secs: i64,
    pub closed: bool,
}

/// User search parameters
#[derive(Deserialize)]
pub struct SearchParams {
    pub name: String,
    /// Skip the exact-match preference
    #[serde(default)]
    pub raw: bool,
}

/// Create API router
pub fn create_router(state: ApiState) -> Router {
    let router = Router::new()
        // Health
        .route("/health", get(health))
        .route("/status", get(status))
        // Brain
        .route("/brain", get(get_brain))
        .route("/private/:key", get(get_private))
        // Users
        .route("/users/search", get(search_users))
        .route("/users/:id", get(get_user))
        .layer(TraceLayer::new_for_http());

    let router = if state.config().api.enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        router.layer(cors)
    } else {
        router
    };

    router.with_state(state)
}

/// Health check
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

/// Brain status
async fn status(State(runtime): State<ApiState>) -> impl IntoResponse {
    let brain = runtime.brain();
    let snapshot = brain.snapshot();

    let status = StatusResponse {
        name: runtime.config().name.clone(),
        user_count: snapshot.users.len(),
        private_keys: snapshot.private.len(),
        auto_save: brain.auto_save(),
        save_interval_secs: brain.save_interval().map(|d| d.as_secs()),
        storage: runtime.storage_name().map(str::to_string),
        last_saved_at: runtime.last_saved_at().map(|t| t.to_rfc3339()),
        uptime_secs: runtime.uptime_secs(),
        closed: brain.is_closed(),
    };

    Json(ApiResponse::ok(status))
}

/// Full brain snapshot
async fn get_brain(State(runtime): State<ApiState>) -> impl IntoResponse {
    Json(ApiResponse::ok(runtime.brain().snapshot()))
}

/// Private value lookup
async fn get_private(
    State(runtime): State<ApiState>,
    Path(key): Path<String>,
) -> impl IntoResponse {
    match runtime.brain().get(&key) {
        Some(value) => (StatusCode::OK, Json(ApiResponse::ok(value))),
        None => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::<serde_json::Value>::err(format!("No value for '{}'", key))),
        ),
    }
}

/// User by id. Unlike the brain lookup this never creates a user.
async fn get_user(State(runtime): State<ApiState>, Path(id): Path<String>) -> impl IntoResponse {
    let user = runtime.brain().users().get(id.as_str()).map(|u| u.read().clone());
    match user {
        Some(user) => (StatusCode::OK, Json(ApiResponse::ok(user))),
        None => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::<User>::err(format!("Unknown user '{}'", id))),
        ),
    }
}

/// Fuzzy user search
async fn search_users(
    State(runtime): State<ApiState>,
    Query(params): Query<SearchParams>,
) -> impl IntoResponse {
    let brain = runtime.brain();
    let result = if params.raw {
        brain.users_for_raw_fuzzy_name(&params.name)
    } else {
        brain.users_for_fuzzy_name(&params.name)
    };

    match result {
        Ok(users) => (StatusCode::OK, Json(ApiResponse::ok(to_owned_users(&users)))),
        Err(e @ BrainError::MissingUserName(_)) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ApiResponse::<Vec<User>>::err(e)),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::<Vec<User>>::err(e)),
        ),
    }
}

fn to_owned_users(users: &[SharedUser]) -> Vec<User> {
    users.iter().map(|u| u.read().clone()).collect()
}

/// Start API server
pub async fn start_api_server(runtime: Arc<BotRuntime>, listen_addr: &str) -> anyhow::Result<()> {
    let router = create_router(runtime);

    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    info!("API server listening on {}", listen_addr);

    axum::serve(listener, router).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use botbrain_core::{NodeConfig, UserOptions};
    use serde_json::Value;
    use tower::ServiceExt;

    fn test_state() -> ApiState {
        let runtime = Arc::new(BotRuntime::new(NodeConfig::default()));
        let brain = runtime.brain();
        brain.user_for_id("1", UserOptions::new().name("Alice").room("general"));
        brain.user_for_id("2", UserOptions::new().name("Al"));
        brain.user_for_id("3", UserOptions::new().name("Albert"));
        brain.set("motd", "welcome");
        runtime
    }

    async fn get_json(state: ApiState, uri: &str) -> (StatusCode, Value) {
        let response = create_router(state)
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = get_json(test_state(), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_status_counts() {
        let (status, body) = get_json(test_state(), "/status").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["user_count"], 3);
        assert_eq!(body["data"]["private_keys"], 1);
        assert_eq!(body["data"]["closed"], false);
    }

    #[tokio::test]
    async fn test_get_user_does_not_create() {
        let state = test_state();
        let (status, body) = get_json(state.clone(), "/users/1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["name"], "Alice");

        let (status, _) = get_json(state.clone(), "/users/99").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(state.brain().users().len(), 3);
    }

    #[tokio::test]
    async fn test_search_exact_and_raw() {
        let state = test_state();
        let (_, body) = get_json(state.clone(), "/users/search?name=al").await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
        assert_eq!(body["data"][0]["name"], "Al");

        let (_, body) = get_json(state, "/users/search?name=al&raw=true").await;
        assert_eq!(body["data"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_private_lookup() {
        let state = test_state();
        let (status, body) = get_json(state.clone(), "/private/motd").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], "welcome");

        let (status, body) = get_json(state, "/private/missing").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_brain_snapshot() {
        let (_, body) = get_json(test_state(), "/brain").await;
        assert_eq!(body["data"]["_private"]["motd"], "welcome");
        assert_eq!(body["data"]["users"]["1"]["room"], "general");
    }
}
