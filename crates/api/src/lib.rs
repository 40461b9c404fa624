//! Client for the remote script server.
//!
//! The server publishes a catalog of operations at its base URL
//! (`GET /` returning `{"scripts": [url, ...]}`) and runs one operation per
//! `POST /<operation id>` with a JSON [`RequestContext`] body.
//!
//! [`RemoteSource`] is the seam the engine talks through; [`LabClient`] is
//! the reqwest-backed implementation.

use std::env;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, header};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;
use vaultlab_types::{OperationId, RequestContext};
use vaultlab_util::truncate_for_summary;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Failure to reach the remote or to read its reply.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid server url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("unexpected response from {url} (status {status}): {message}")]
    Decode { url: String, status: u16, message: String },
}

impl TransportError {
    pub fn invalid_url(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            reason: reason.into(),
        }
    }

    pub fn request(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Request {
            url: url.into(),
            message: message.into(),
        }
    }
}

/// Result of a catalog fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerStatus {
    /// The remote answered; ids are in the order it reported them.
    Available { ids: Vec<OperationId> },
    Unavailable { reason: String },
}

impl ServerStatus {
    pub fn is_available(&self) -> bool {
        matches!(self, ServerStatus::Available { .. })
    }

    pub fn ids(&self) -> &[OperationId] {
        match self {
            ServerStatus::Available { ids } => ids,
            ServerStatus::Unavailable { .. } => &[],
        }
    }
}

#[derive(Debug, Deserialize)]
struct CatalogBody {
    #[serde(default)]
    scripts: Vec<String>,
}

/// Derive operation ids from the catalog's `scripts` array.
///
/// Entries with an empty trailing segment are skipped.
pub fn parse_catalog(body: &Value) -> Result<Vec<OperationId>, String> {
    let catalog: CatalogBody = serde_json::from_value(body.clone()).map_err(|err| err.to_string())?;
    Ok(catalog.scripts.iter().filter_map(|url| OperationId::from_url(url)).collect())
}

/// Accept only absolute http(s) URLs with a host.
pub fn validate_server_url(server_url: &str) -> Result<Url, TransportError> {
    let parsed = Url::parse(server_url.trim()).map_err(|err| TransportError::invalid_url(server_url, err.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(TransportError::invalid_url(server_url, "scheme must be http or https"));
    }
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(TransportError::invalid_url(server_url, "missing host"));
    }
    Ok(parsed)
}

/// URL an operation is posted to: the server URL joined with the id.
pub fn operation_url(server_url: &str, id: &OperationId) -> String {
    format!("{}/{}", server_url.trim().trim_end_matches('/'), id)
}

/// Remote operations as seen by the engine.
#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// Fetch the catalog. Every failure maps to [`ServerStatus::Unavailable`].
    async fn fetch_status(&self, server_url: &str) -> ServerStatus;

    /// Post a request context and return the parsed JSON body.
    ///
    /// Non-success statuses with a JSON body are returned as-is so the caller
    /// can read the remote's `errors`/`message` fields.
    async fn post(&self, url: &str, payload: &RequestContext) -> Result<Value, TransportError>;
}

/// reqwest-backed [`RemoteSource`].
#[derive(Debug, Clone)]
pub struct LabClient {
    http: Client,
    user_agent: String,
}

impl LabClient {
    pub fn new() -> Result<Self, TransportError> {
        let mut default_headers = header::HeaderMap::new();
        default_headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .default_headers(default_headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| TransportError::request("", format!("build http client: {err}")))?;

        Ok(Self {
            http,
            user_agent: format!("vaultlab/{}; {}", env!("CARGO_PKG_VERSION"), env::consts::OS),
        })
    }

    async fn get_json(&self, url: &str) -> Result<(StatusCode, Value), TransportError> {
        debug!(%url, "fetching catalog");
        let response = self
            .http
            .get(url)
            .header(header::USER_AGENT, &self.user_agent)
            .send()
            .await
            .map_err(|err| TransportError::request(url, err.to_string()))?;
        read_json(url, response).await
    }
}

async fn read_json(url: &str, response: reqwest::Response) -> Result<(StatusCode, Value), TransportError> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|err| TransportError::request(url, err.to_string()))?;
    let value = serde_json::from_str::<Value>(&text).map_err(|err| TransportError::Decode {
        url: url.to_string(),
        status: status.as_u16(),
        message: format!("{err}: {}", truncate_for_summary(&text, 120)),
    })?;
    Ok((status, value))
}

#[async_trait]
impl RemoteSource for LabClient {
    async fn fetch_status(&self, server_url: &str) -> ServerStatus {
        if let Err(err) = validate_server_url(server_url) {
            return ServerStatus::Unavailable { reason: err.to_string() };
        }
        let (status, body) = match self.get_json(server_url.trim()).await {
            Ok(reply) => reply,
            Err(err) => {
                warn!(error = %err, "server status check failed");
                return ServerStatus::Unavailable { reason: err.to_string() };
            }
        };
        if !status.is_success() {
            return ServerStatus::Unavailable {
                reason: format!("server answered with status {status}"),
            };
        }
        match parse_catalog(&body) {
            Ok(ids) => ServerStatus::Available { ids },
            Err(reason) => ServerStatus::Unavailable { reason },
        }
    }

    async fn post(&self, url: &str, payload: &RequestContext) -> Result<Value, TransportError> {
        debug!(%url, "posting operation request");
        let response = self
            .http
            .post(url)
            .header(header::USER_AGENT, &self.user_agent)
            .json(payload)
            .send()
            .await
            .map_err(|err| TransportError::request(url, err.to_string()))?;
        let (status, body) = read_json(url, response).await?;
        if !status.is_success() {
            debug!(%url, status = status.as_u16(), "operation answered with an error status");
        }
        Ok(body)
    }
}
