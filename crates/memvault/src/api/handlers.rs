use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use uuid::Uuid;

use crate::api::{
    AppState, ErrorResponse, GetMemoryResponse, MemoryMatch, RecentMemoriesQuery,
    RecentMemoriesResponse, SearchMemoriesRequest, SearchMemoriesResponse, StoreMemoryRequest,
    StoreMemoryResponse, WireMemory,
};
use crate::error::MemvaultError;
use crate::index::MetadataFilter;
use crate::service::ServiceStats;

/// Error wrapper mapping the service taxonomy onto HTTP statuses
pub struct ApiError(MemvaultError);

impl From<MemvaultError> for ApiError {
    fn from(err: MemvaultError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            MemvaultError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            MemvaultError::NotFound(_) => StatusCode::NOT_FOUND,
            MemvaultError::Durability(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("request failed: {}", self.0);
        }

        let body = Json(ErrorResponse {
            error: self.0.to_string(),
            retryable: self.0.is_retryable(),
        });
        (status, body).into_response()
    }
}

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

pub async fn store_memory(
    State(state): State<Arc<AppState>>,
    Json(req): Json<StoreMemoryRequest>,
) -> Result<Json<StoreMemoryResponse>, ApiError> {
    let id = state
        .service
        .store(req.content, req.embedding, req.metadata, req.tags)
        .await?;

    Ok(Json(StoreMemoryResponse {
        success: true,
        memory_id: id.to_string(),
        message: "Memory stored".to_string(),
    }))
}

pub async fn search_memories(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SearchMemoriesRequest>,
) -> Result<Json<SearchMemoriesResponse>, ApiError> {
    let limit = positive_limit(req.limit)?;
    let filter = MetadataFilter::from_map(req.filters);

    let results = state
        .service
        .search(&req.query_embedding, limit, req.similarity_threshold, &filter)
        .await?;

    Ok(Json(SearchMemoriesResponse {
        matches: results
            .iter()
            .map(|m| MemoryMatch {
                memory: WireMemory::from(&m.record),
                similarity_score: m.similarity_score,
            })
            .collect(),
    }))
}

pub async fn recent_memories(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RecentMemoriesQuery>,
) -> Result<Json<RecentMemoriesResponse>, ApiError> {
    let limit = positive_limit(query.limit)?;
    let records = state.service.recent(limit).await?;

    Ok(Json(RecentMemoriesResponse {
        memories: records.iter().map(WireMemory::from).collect(),
    }))
}

pub async fn get_memory(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<GetMemoryResponse>, ApiError> {
    let id = Uuid::parse_str(&id).map_err(|_| MemvaultError::NotFound(id.clone()))?;
    let record = state.service.get(id).await?;

    Ok(Json(GetMemoryResponse {
        memory: WireMemory::from(&record),
    }))
}

pub async fn stats(State(state): State<Arc<AppState>>) -> Json<ServiceStats> {
    Json(state.service.stats().await)
}

fn positive_limit(limit: i64) -> Result<usize, ApiError> {
    if limit <= 0 {
        return Err(MemvaultError::InvalidInput(format!(
            "limit must be positive, got {limit}"
        ))
        .into());
    }
    Ok(limit as usize)
}
