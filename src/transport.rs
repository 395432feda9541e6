use async_trait::async_trait;
use reqwest::Client;
use std::time::{Duration, Instant};

use crate::error::{AnalystError, Result};

const USER_AGENT: &str = concat!("analyst-chat/", env!("CARGO_PKG_VERSION"));

/// Status and raw body of a completed HTTP exchange.
///
/// Non-200 statuses are not errors at this layer; each client decides how to
/// read the body for its own endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// POST a JSON body to an endpoint path of the account. One attempt only.
    async fn post(&self, endpoint: &str, body: &serde_json::Value) -> Result<RawResponse>;
}

/// Authenticated reqwest transport against the account's REST API.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
    token: String,
    token_type: String,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        token_type: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| AnalystError::Config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            token_type: token_type.into(),
            timeout,
        })
    }

    /// Same connection and credentials with a different request timeout.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        Self {
            timeout,
            ..self.clone()
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn url(&self, endpoint: &str) -> String {
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            endpoint.to_string()
        } else {
            format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(&self, endpoint: &str, body: &serde_json::Value) -> Result<RawResponse> {
        let url = self.url(endpoint);
        let started = Instant::now();

        let mut req = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .json(body);
        if !self.token.is_empty() {
            req = req
                .header("Authorization", format!("Bearer {}", self.token))
                .header("X-Snowflake-Authorization-Token-Type", self.token_type.as_str());
        }

        let response = req.send().await.map_err(|e| {
            tracing::error!("POST {} failed after {:?}: {}", url, started.elapsed(), e);
            AnalystError::from(e)
        })?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        tracing::debug!(
            url = %url,
            status,
            bytes = body.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "POST completed"
        );
        Ok(RawResponse { status, body })
    }
}
