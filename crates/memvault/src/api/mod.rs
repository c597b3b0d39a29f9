//! HTTP API for the memory service
//!
//! JSON-over-HTTP realization of the RPC surface. The wire `Record` shape
//! excludes the embedding vector: embeddings enter the service with store
//! and search requests but never leave it.

pub mod handlers;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::ApiConfig;
use crate::error::{MemvaultError, Result};
use crate::memory::MemoryRecord;
use crate::service::MemoryService;

/// Shared application state for all handlers
pub struct AppState {
    pub service: Arc<MemoryService>,
}

/// The API server
pub struct ApiServer {
    config: ApiConfig,
    service: Arc<MemoryService>,
}

impl ApiServer {
    pub fn new(config: ApiConfig, service: Arc<MemoryService>) -> Self {
        Self { config, service }
    }

    /// Bind and serve until ctrl-c / SIGTERM.
    pub async fn serve(&self) -> Result<()> {
        let state = Arc::new(AppState {
            service: self.service.clone(),
        });
        let app = create_router(state)
            .layer(TimeoutLayer::new(Duration::from_secs(self.config.timeout_secs)));

        let addr: SocketAddr = self
            .config
            .listen_addr
            .parse()
            .map_err(|e| MemvaultError::Config(format!("Invalid listen address: {e}")))?;

        tracing::info!("Starting API server on {addr}");

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| MemvaultError::Api(format!("Failed to bind to {addr}: {e}")))?;

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| MemvaultError::Api(format!("Server error: {e}")))?;

        tracing::info!("API server shut down gracefully");
        Ok(())
    }
}

/// Create the router with all routes configured
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/v1/memories", post(handlers::store_memory))
        .route("/v1/memories/search", post(handlers::search_memories))
        .route("/v1/memories/recent", get(handlers::recent_memories))
        .route("/v1/memories/{id}", get(handlers::get_memory))
        .route("/v1/stats", get(handlers::stats))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Wire shape of a stored record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireMemory {
    pub id: String,
    pub content: String,
    pub metadata: HashMap<String, String>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&MemoryRecord> for WireMemory {
    fn from(record: &MemoryRecord) -> Self {
        Self {
            id: record.id.to_string(),
            content: record.content.clone(),
            metadata: record.metadata.clone(),
            tags: record.tags.iter().cloned().collect(),
            created_at: record.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreMemoryRequest {
    pub content: String,
    /// Caller-supplied embedding; must match the service dimension
    pub embedding: Vec<f32>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreMemoryResponse {
    pub success: bool,
    pub memory_id: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchMemoriesRequest {
    pub query_embedding: Vec<f32>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
    /// Metadata equality filters; the reserved key `tag` filters by tag
    /// membership instead
    #[serde(default)]
    pub filters: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryMatch {
    pub memory: WireMemory,
    pub similarity_score: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchMemoriesResponse {
    pub matches: Vec<MemoryMatch>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecentMemoriesQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecentMemoriesResponse {
    pub memories: Vec<WireMemory>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetMemoryResponse {
    pub memory: WireMemory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub retryable: bool,
}

fn default_limit() -> i64 {
    10
}

fn default_similarity_threshold() -> f32 {
    0.7
}
