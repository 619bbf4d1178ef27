//! Outbound HTTP seam.
//!
//! [`HttpTransport`] is the only way the notifier talks to the network. The
//! production implementation wraps a `reqwest::Client`; tests substitute a
//! recording fake.

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, Method, StatusCode, Url};
use tracing::debug;
use zeroize::Zeroizing;

use crate::credentials::Secret;

pub const APPLICATION_JSON: &str = "application/json";

/// A fully built request, ready to be sent.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: String,
}

impl OutboundRequest {
    /// A JSON POST authenticated with a bearer token.
    /// The Authorization value is flagged sensitive so `Debug` output hides it.
    pub fn json_post(url: Url, body: String, token: &Secret) -> Result<Self, TransportError> {
        let bearer = Zeroizing::new(format!("Bearer {}", token.expose()));
        let mut auth = HeaderValue::from_str(&bearer).map_err(|_| {
            TransportError::new("credential contains characters not allowed in an HTTP header")
        })?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON));
        headers.insert(AUTHORIZATION, auth);

        Ok(Self {
            method: Method::POST,
            url,
            headers,
            body,
        })
    }
}

#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: StatusCode,
    pub body: String,
}

/// Transport-level failure: nothing usable came back from the server.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct TransportError(pub String);

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: OutboundRequest) -> Result<TransportResponse, TransportError>;
}

/// reqwest-backed transport with the client's default timeouts.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    http_client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: OutboundRequest) -> Result<TransportResponse, TransportError> {
        debug!("{} {}", request.method, request.url);

        let response = self
            .http_client
            .request(request.method, request.url)
            .headers(request.headers)
            .body(request.body)
            .send()
            .await
            .map_err(|e| TransportError::new(format!("request failed: {}", e)))?;

        let status = response.status();
        // Only read for diagnostics on failure
        let body = if status.is_success() {
            String::new()
        } else {
            response.text().await.unwrap_or_default()
        };

        Ok(TransportResponse { status, body })
    }
}
