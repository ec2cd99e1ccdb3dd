//! HTTP client shared by the remote collaborators.
//!
//! Wraps reqwest with:
//! - A default timeout and user agent
//! - Status checking that maps non-success responses to typed errors
//! - JSON and raw-bytes helpers

use crate::config::NetworkConfig;
use crate::error::{OffgridError, Result};
use bytes::Bytes;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// HTTP client for collaborator endpoints.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    timeout: Duration,
}

impl HttpClient {
    /// Create a client with the default request timeout.
    pub fn new() -> Result<Self> {
        Self::with_timeout(NetworkConfig::REQUEST_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(NetworkConfig::USER_AGENT)
            .build()
            .map_err(|e| OffgridError::Network {
                message: format!("Failed to create HTTP client: {}", e),
                source: Some(e),
            })?;

        Ok(Self { client, timeout })
    }

    pub fn inner(&self) -> &Client {
        &self.client
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// GET `url`, failing on any non-success status.
    pub async fn get(&self, url: &str) -> Result<Response> {
        let response = self.send_get(url).await?;
        check_status(response, url)
    }

    /// GET `url` and decode a JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self.get(url).await?;
        let body = response.bytes().await.map_err(|e| self.map_error(url, e))?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// GET `url` as raw bytes. A 404 or 204 is reported as `None`.
    pub async fn get_bytes(&self, url: &str) -> Result<Option<Bytes>> {
        let response = self.send_get(url).await?;
        if matches!(
            response.status(),
            StatusCode::NOT_FOUND | StatusCode::NO_CONTENT
        ) {
            debug!("No content at {}", url);
            return Ok(None);
        }
        let response = check_status(response, url)?;
        let body = response.bytes().await.map_err(|e| self.map_error(url, e))?;
        Ok(Some(body))
    }

    /// HEAD `url` with a short timeout; true if the network answered.
    ///
    /// Redirects and 403s count as answers.
    pub async fn probe(&self, url: &str, timeout: Duration) -> bool {
        match self.client.head(url).timeout(timeout).send().await {
            Ok(response) => {
                let status = response.status();
                status.is_success() || status.is_redirection() || status == StatusCode::FORBIDDEN
            }
            Err(e) => {
                debug!("Probe of {} failed: {}", url, e);
                false
            }
        }
    }

    /// Check if an HTTP status code indicates a retryable error.
    pub fn is_retryable_status(status: StatusCode) -> bool {
        matches!(status.as_u16(), 408 | 429 | 500 | 502 | 503 | 504)
    }

    async fn send_get(&self, url: &str) -> Result<Response> {
        self.client
            .get(url)
            .send()
            .await
            .map_err(|e| self.map_error(url, e))
    }

    fn map_error(&self, url: &str, err: reqwest::Error) -> OffgridError {
        if err.is_timeout() {
            OffgridError::Timeout(self.timeout)
        } else {
            OffgridError::Network {
                message: format!("GET {} failed: {}", url, err),
                source: Some(err),
            }
        }
    }
}

fn check_status(response: Response, url: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(OffgridError::Network {
            message: format!("GET {} returned {}", url, status),
            source: None,
        })
    }
}

/// Append query parameters to an endpoint URL.
pub fn endpoint_url(base: &str, params: &[(&str, String)]) -> Result<String> {
    let url = url::Url::parse_with_params(base, params).map_err(|e| OffgridError::Config {
        message: format!("Invalid endpoint URL {:?}: {}", base, e),
    })?;
    Ok(url.into())
}
