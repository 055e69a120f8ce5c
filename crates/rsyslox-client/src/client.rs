use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::session::SessionProvider;
use rsyslox_types::{HealthStatus, LogsPage, MetaValues, QueryParams};

/// Operations the log engine needs from the query API
#[async_trait]
pub trait LogApi: Send + Sync + 'static {
    /// Fetch one page of log rows
    async fn query_logs(&self, params: &QueryParams) -> Result<LogsPage, ApiError>;

    /// Fetch the distinct values of a column
    async fn column_values(&self, column: &str) -> Result<MetaValues, ApiError>;
}

/// Query API client backed by reqwest
#[derive(Clone)]
pub struct HttpLogApi {
    http: reqwest::Client,
    base_url: String,
    session: Arc<dyn SessionProvider>,
}

impl HttpLogApi {
    /// Create a client for the server at `base_url`
    pub fn new(base_url: impl Into<String>, session: Arc<dyn SessionProvider>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url, session)
    }

    /// Create a client reusing an existing reqwest client
    pub fn with_client(
        http: reqwest::Client,
        base_url: impl Into<String>,
        session: Arc<dyn SessionProvider>,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http,
            base_url,
            session,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Probe the public health endpoint. Sends no credentials.
    pub async fn health(&self) -> Result<HealthStatus, ApiError> {
        let res = self.http.get(format!("{}/health", self.base_url)).send().await?;
        let status = res.status();
        let body = res.text().await?;

        // The server reports an unhealthy database as 503 with a normal body
        match serde_json::from_str(&body) {
            Ok(health) => Ok(health),
            Err(_) if !status.is_success() => Err(ApiError::from_body(status.as_u16(), &body)),
            Err(e) => Err(ApiError::Decode(e)),
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(String, String)],
    ) -> Result<T, ApiError> {
        // An expired session stays expired until someone logs in again
        if self.session.is_expired() {
            return Err(ApiError::Unauthenticated);
        }

        let mut request = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .query(query);
        if let Some(credential) = self.session.credential() {
            request = request.header(credential.header_name(), credential.value());
        }

        debug!(path, params = query.len(), "api request");
        let res = request.send().await?;
        let status = res.status();

        if status == StatusCode::UNAUTHORIZED {
            warn!(path, "api rejected credentials, expiring session");
            self.session.expire();
            return Err(ApiError::Unauthenticated);
        }

        let body = res.text().await?;
        if !status.is_success() {
            return Err(ApiError::from_body(status.as_u16(), &body));
        }

        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl LogApi for HttpLogApi {
    async fn query_logs(&self, params: &QueryParams) -> Result<LogsPage, ApiError> {
        self.get_json("/api/logs", params.pairs()).await
    }

    async fn column_values(&self, column: &str) -> Result<MetaValues, ApiError> {
        self.get_json(&format!("/api/meta/{}", column.trim()), &[])
            .await
    }
}

impl std::fmt::Debug for HttpLogApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpLogApi")
            .field("base_url", &self.base_url)
            .field("session_expired", &self.session.is_expired())
            .finish()
    }
}
