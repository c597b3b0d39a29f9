//! Typed HTTP client for the memvault daemon
//!
//! Thin glue over the wire DTOs: message construction, error surfacing,
//! nothing else. The daemon owns all semantics.

use memvault_server::api::{
    ErrorResponse, GetMemoryResponse, RecentMemoriesResponse, SearchMemoriesRequest,
    SearchMemoriesResponse, StoreMemoryRequest, StoreMemoryResponse,
};
use memvault_server::service::ServiceStats;
use serde::de::DeserializeOwned;

use crate::error::{CliError, CliResult};

pub struct MemvaultClient {
    base_url: String,
    http: reqwest::Client,
}

impl MemvaultClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    pub async fn store(&self, request: &StoreMemoryRequest) -> CliResult<StoreMemoryResponse> {
        let response = self
            .http
            .post(format!("{}/v1/memories", self.base_url))
            .json(request)
            .send()
            .await?;
        Self::decode(response).await
    }

    pub async fn search(
        &self,
        request: &SearchMemoriesRequest,
    ) -> CliResult<SearchMemoriesResponse> {
        let response = self
            .http
            .post(format!("{}/v1/memories/search", self.base_url))
            .json(request)
            .send()
            .await?;
        Self::decode(response).await
    }

    pub async fn recent(&self, limit: i64) -> CliResult<RecentMemoriesResponse> {
        let response = self
            .http
            .get(format!("{}/v1/memories/recent", self.base_url))
            .query(&[("limit", limit)])
            .send()
            .await?;
        Self::decode(response).await
    }

    pub async fn get(&self, id: &str) -> CliResult<GetMemoryResponse> {
        let response = self
            .http
            .get(format!("{}/v1/memories/{id}", self.base_url))
            .send()
            .await?;
        Self::decode(response).await
    }

    pub async fn stats(&self) -> CliResult<ServiceStats> {
        let response = self
            .http
            .get(format!("{}/v1/stats", self.base_url))
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> CliResult<T> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<T>().await?);
        }

        let message = match response.json::<ErrorResponse>().await {
            Ok(err) if err.retryable => format!("{} (retryable)", err.error),
            Ok(err) => err.error,
            Err(_) => format!("server returned {status}"),
        };
        Err(CliError(message))
    }
}
