//! Read-only HTTP surface: liveness, health and leaderboard JSON

use async_trait::async_trait;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};

use super::leaderboard::LeaderBoardAgent;
use crate::coordination::ShutdownToken;
use crate::error::{LeagueError, Result};
use crate::persistence::HealthCheck;
use crate::supervisor::Worker;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub timestamp: DateTime<Utc>,
    pub uptime_seconds: u64,
    pub database_reachable: bool,
}

/// Shared state for the router
pub struct HttpState {
    pub started_at: DateTime<Utc>,
    pub database: Arc<dyn HealthCheck>,
    pub leaderboard: Arc<LeaderBoardAgent>,
}

impl HttpState {
    pub fn new(database: Arc<dyn HealthCheck>, leaderboard: Arc<LeaderBoardAgent>) -> Self {
        Self {
            started_at: Utc::now(),
            database,
            leaderboard,
        }
    }

    pub async fn get_health(&self) -> HealthResponse {
        let database_reachable = self.database.is_reachable().await;
        HealthResponse {
            status: if database_reachable {
                HealthStatus::Healthy
            } else {
                HealthStatus::Degraded
            },
            timestamp: Utc::now(),
            uptime_seconds: (Utc::now() - self.started_at).num_seconds().max(0) as u64,
            database_reachable,
        }
    }
}

/// JSON error body with a status derived from the error kind
struct ApiError(LeagueError);

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            LeagueError::NotFound(_) => StatusCode::NOT_FOUND,
            LeagueError::Validation { .. } => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(error = %self.0, "Request failed");
        }
        (
            status,
            Json(ErrorBody {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

pub fn router(state: Arc<HttpState>) -> Router {
    Router::new()
        .route("/healthz", get(liveness_handler))
        .route("/health", get(health_handler))
        .route(
            "/api/leaderboard/:realm/:season/:round",
            get(leaderboard_handler),
        )
        .with_state(state)
}

/// Liveness probe
async fn liveness_handler() -> impl IntoResponse {
    StatusCode::OK
}

async fn health_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    Json(state.get_health().await)
}

async fn leaderboard_handler(
    State(state): State<Arc<HttpState>>,
    Path((realm, season, round)): Path<(String, String, String)>,
) -> std::result::Result<impl IntoResponse, ApiError> {
    let round: u32 = round
        .parse()
        .map_err(|_| ApiError(LeagueError::validation(format!("invalid round '{}'", round), "round")))?;

    let board = state
        .leaderboard
        .get_leaderboard(&realm, &season, round)
        .await
        .map_err(ApiError)?;
    Ok(Json(board))
}

/// Serves [`router`] until shutdown
pub struct HttpServer {
    state: Arc<HttpState>,
    port: u16,
}

impl HttpServer {
    pub fn new(state: Arc<HttpState>, port: u16) -> Self {
        Self { state, port }
    }
}

#[async_trait]
impl Worker for HttpServer {
    fn name(&self) -> &str {
        "http"
    }

    async fn run(&self, token: ShutdownToken) -> Result<()> {
        let app = router(Arc::clone(&self.state));

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        info!("Starting HTTP server on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { token.cancelled().await })
            .await
            .map_err(|e| LeagueError::Internal(format!("HTTP server error: {}", e)))?;

        info!("HTTP server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{LeagueData, RealmCollection};
    use crate::persistence::MemoryStore;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    fn app() -> Router {
        let store = Arc::new(MemoryStore::new());
        let agent = LeaderBoardAgent::new(
            Arc::new(LeagueData::default()),
            Arc::new(RealmCollection::default()),
            store.clone(),
            store.clone(),
            store.clone(),
        );
        router(Arc::new(HttpState::new(store, Arc::new(agent))))
    }

    async fn get(uri: &str) -> (StatusCode, serde_json::Value) {
        let resp = app()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, body)
    }

    #[tokio::test]
    async fn test_liveness() {
        let (status, _) = get("/healthz").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_reports_database() {
        let (status, body) = get("/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["database_reachable"], true);
    }

    #[tokio::test]
    async fn test_leaderboard_error_mapping() {
        let (status, body) = get("/api/leaderboard/localhost/NOPE/1").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("NOPE"));

        let (status, _) = get("/api/leaderboard/localhost/NOPE/first").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
