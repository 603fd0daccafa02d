//! REST API client for the simulation service.
//!
//! Wraps the service's HTTP endpoints (agent catalog, dataset listing, run
//! creation, status polling, health) using [`reqwest`].

use std::time::Duration;

use battlefield_core::catalog::{AgentCatalog, DataFilesPayload, Dataset};
use battlefield_core::selection::RunRequest;
use battlefield_core::snapshot::StatusSnapshot;
use battlefield_core::types::SimulationId;
use serde::Deserialize;

/// HTTP client for one simulation service.
#[derive(Debug, Clone)]
pub struct ArenaApi {
    client: reqwest::Client,
    api_url: String,
}

/// Response returned by `POST /api/run` after the job was created.
#[derive(Debug, Deserialize)]
pub struct RunResponse {
    /// Server-assigned job handle.
    pub simulation_id: SimulationId,
}

/// Body of every non-2xx response.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Response of `GET /api/health`.
#[derive(Debug, Deserialize)]
struct HealthBody {
    status: String,
}

/// Errors from the REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum ArenaApiError {
    /// The HTTP request itself failed (network, timeout, malformed body).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The service returned a non-2xx status code.
    #[error("Simulation service error ({status}): {message}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// The `error` field of the body, or the raw body if it had none.
        message: String,
    },
}

impl ArenaApiError {
    /// The message the service reported, if the request got that far.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            ArenaApiError::ApiError { message, .. } if !message.is_empty() => Some(message),
            _ => None,
        }
    }
}

impl ArenaApi {
    /// Create an API client for a simulation service.
    ///
    /// * `api_url` - Base HTTP URL, e.g. `http://localhost:5000`.
    /// * `timeout` - Per-request timeout.
    pub fn new(api_url: impl Into<String>, timeout: Duration) -> Result<Self, ArenaApiError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, api_url))
    }

    /// Create an API client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, api_url: impl Into<String>) -> Self {
        let api_url = api_url.into().trim_end_matches('/').to_string();
        Self { client, api_url }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// `GET /api/health`. Returns `true` when the service reports `ok`.
    pub async fn health(&self) -> Result<bool, ArenaApiError> {
        let response = self
            .client
            .get(format!("{}/api/health", self.api_url))
            .send()
            .await?;

        let body: HealthBody = Self::parse_response(response).await?;
        Ok(body.status == "ok")
    }

    /// `GET /api/ai_agents`: provider name -> identifiers.
    pub async fn list_agents(&self) -> Result<AgentCatalog, ArenaApiError> {
        let response = self
            .client
            .get(format!("{}/api/ai_agents", self.api_url))
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// `GET /api/data_files`, normalized into datasets.
    pub async fn list_datasets(&self) -> Result<Vec<Dataset>, ArenaApiError> {
        let response = self
            .client
            .get(format!("{}/api/data_files", self.api_url))
            .send()
            .await?;

        let payload: DataFilesPayload = Self::parse_response(response).await?;
        Ok(payload.into_datasets())
    }

    /// `POST /api/run`. Returns the job handle.
    pub async fn start_run(&self, request: &RunRequest) -> Result<SimulationId, ArenaApiError> {
        let body = serde_json::json!({
            "agents": request.agents,
            "stock": request.stock,
        });

        let response = self
            .client
            .post(format!("{}/api/run", self.api_url))
            .json(&body)
            .send()
            .await?;

        let run: RunResponse = Self::parse_response(response).await?;
        Ok(run.simulation_id)
    }

    /// `GET /api/simulation/{simulation_id}`.
    pub async fn simulation_status(
        &self,
        simulation_id: &str,
    ) -> Result<StatusSnapshot, ArenaApiError> {
        let response = self
            .client
            .get(format!("{}/api/simulation/{}", self.api_url, simulation_id))
            .send()
            .await?;

        Self::parse_response(response).await
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. On failure the
    /// `{"error": ...}` message is extracted when the body carries one.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ArenaApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            let message = serde_json::from_str::<ErrorBody>(&body)
                .map(|b| b.error)
                .unwrap_or(body);
            return Err(ArenaApiError::ApiError {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ArenaApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}
