use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Header carrying the per-request correlation id.
pub const CORRELATION_HEADER: &str = "x-correlation-id";

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("backend returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Endpoints {
    pub health: String,
    pub api: String,
}

/// Body of `GET /`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootInfo {
    pub message: String,
    pub version: String,
    pub endpoints: Endpoints,
}

/// Body of `GET /api/{version}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiInfo {
    pub message: String,
    pub version: String,
    pub environment: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStatuses {
    pub database: String,
    pub redis: String,
}

/// Body of `GET /health`, returned with both 200 and 503.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    pub timestamp: String,
    pub services: ServiceStatuses,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HealthReport {
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub message: String,
    pub status_code: u16,
    pub correlation_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

/// JSON error body rendered by the backend for every failed request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Build on an existing `reqwest` client (custom TLS roots, timeouts).
    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch the service banner from `/`.
    pub async fn info(&self) -> Result<RootInfo, ClientError> {
        let resp = self.get("/", None).await?;
        decode_success(resp).await
    }

    /// Fetch `/api/{version}`.
    pub async fn api_info(&self, version: &str) -> Result<ApiInfo, ClientError> {
        let resp = self.get(&format!("/api/{}", version), None).await?;
        decode_success(resp).await
    }

    /// Fetch the health snapshot. A degraded backend answers 503 with a
    /// regular report, so both statuses decode.
    pub async fn health(&self) -> Result<HealthReport, ClientError> {
        let resp = self.get("/health", None).await?;
        let status = resp.status();
        if status != StatusCode::OK && status != StatusCode::SERVICE_UNAVAILABLE {
            let body = resp.text().await?;
            return Err(ClientError::Status { status, body });
        }
        let text = resp.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Issue a raw GET, optionally forwarding a correlation id.
    pub async fn get(&self, path: &str, correlation_id: Option<&str>) -> Result<Response, ClientError> {
        let mut req = self.client.get(format!("{}{}", self.base_url, path));
        if let Some(id) = correlation_id {
            req = req.header(CORRELATION_HEADER, id);
        }
        Ok(req.send().await?)
    }
}

async fn decode_success<T: DeserializeOwned>(resp: Response) -> Result<T, ClientError> {
    let status = resp.status();
    let text = resp.text().await?;

    if !status.is_success() {
        return Err(ClientError::Status { status, body: text });
    }

    Ok(serde_json::from_str(&text)?)
}
