//! Remote image-generation client.
//!
//! The [`Transport`] trait decouples the engine from HTTP. Tests use scripted
//! transports that return canned exchanges without touching the network.

use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::core::types::{GenerationRequest, RawResponse};

/// Timeout for a generation call.
pub const GENERATE_TIMEOUT: Duration = Duration::from_secs(60);
/// Timeout for the startup health probe.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Failure before a complete response was received.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Connect, timeout, or body-read failure.
    #[error("{context}: {source}")]
    Transport {
        context: String,
        source: reqwest::Error,
    },

    /// The request could not be constructed.
    #[error("build request: {0}")]
    Build(String),
}

/// Endpoint and bearer credential for one call.
///
/// Built from the current configuration snapshot, so an edited key or URL
/// takes effect on the next call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    endpoint: String,
    api_key: String,
}

impl Credentials {
    pub fn new(endpoint: &str, api_key: &str) -> Self {
        Self {
            endpoint: endpoint.trim().trim_end_matches('/').to_string(),
            api_key: api_key.trim().to_string(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }
}

/// Abstraction over the generation backend.
pub trait Transport {
    /// Submit one generation request.
    fn generate(
        &self,
        credentials: &Credentials,
        request: &GenerationRequest,
    ) -> Result<RawResponse, ClientError>;

    /// Authenticated GET against the generation endpoint.
    fn probe(&self, credentials: &Credentials) -> Result<RawResponse, ClientError>;
}

/// Blocking HTTP client for the Venice image API.
#[derive(Debug, Clone)]
pub struct VeniceClient {
    http: Client,
}

impl VeniceClient {
    pub fn new() -> Result<Self, ClientError> {
        let http = Client::builder()
            .build()
            .map_err(|err| ClientError::Build(err.to_string()))?;
        Ok(Self { http })
    }

    fn send(
        &self,
        builder: RequestBuilder,
        credentials: &Credentials,
        context: &str,
    ) -> Result<RawResponse, ClientError> {
        let resp = builder
            .header(AUTHORIZATION, format!("Bearer {}", credentials.api_key))
            .send()
            .map_err(|source| ClientError::Transport {
                context: format!("{context} {}", credentials.endpoint),
                source,
            })?;
        let status = resp.status().as_u16();
        let body = resp.bytes().map_err(|source| ClientError::Transport {
            context: "read response body".to_string(),
            source,
        })?;
        debug!(status, bytes = body.len(), "response received");
        Ok(RawResponse {
            status,
            body: body.to_vec(),
        })
    }
}

impl Transport for VeniceClient {
    #[instrument(skip_all, fields(model = %request.model, seed = request.seed))]
    fn generate(
        &self,
        credentials: &Credentials,
        request: &GenerationRequest,
    ) -> Result<RawResponse, ClientError> {
        let body = serde_json::to_vec(request).map_err(|err| ClientError::Build(err.to_string()))?;
        let builder = self
            .http
            .post(credentials.endpoint())
            .timeout(GENERATE_TIMEOUT)
            .header(CONTENT_TYPE, "application/json")
            .body(body);
        self.send(builder, credentials, "POST")
    }

    #[instrument(skip_all, fields(endpoint = %credentials.endpoint()))]
    fn probe(&self, credentials: &Credentials) -> Result<RawResponse, ClientError> {
        let builder = self.http.get(credentials.endpoint()).timeout(PROBE_TIMEOUT);
        self.send(builder, credentials, "GET")
    }
}
