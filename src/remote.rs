use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use crate::config::RemoteConfig;
use crate::entity::EntityType;

/// HTTP statuses the reconciliation engine treats as worth retrying even
/// though they are not 5xx: request timeout, conflict (assumed resolvable
/// once a dependent record exists), rate limiting.
const RETRYABLE_CLIENT_STATUSES: [u16; 3] = [408, 409, 429];

#[derive(Debug, Error)]
pub enum RemoteError {
    /// No response received at all. Always retryable; the gateway folds
    /// this into the offline path.
    #[error("Connection failed: {0}")]
    Connectivity(String),

    /// The server answered with a non-success status.
    #[error("Request failed with status {status}: {message}")]
    Status { status: u16, message: String },
}

impl RemoteError {
    pub fn is_connectivity(&self) -> bool {
        matches!(self, RemoteError::Connectivity(_))
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            RemoteError::Connectivity(_) => true,
            RemoteError::Status { status, .. } => {
                *status >= 500 || RETRYABLE_CLIENT_STATUSES.contains(status)
            }
        }
    }

    /// Fatal errors (validation, authorization, ...) repeat identically on
    /// blind retry and need operator intervention instead.
    pub fn is_fatal(&self) -> bool {
        !self.is_retryable()
    }
}

/// The remote REST service, one CRUD endpoint family per entity type.
///
/// Kept behind a trait so the gateway and the reconciliation engine can be
/// exercised against a scripted fake in tests.
#[async_trait]
pub trait RemoteService: Send + Sync {
    async fn fetch_all(
        &self,
        entity: &EntityType,
        filters: &[(String, String)],
    ) -> Result<Vec<Value>, RemoteError>;

    async fn fetch_one(&self, entity: &EntityType, id: &str) -> Result<Value, RemoteError>;

    /// Creates the entity remotely; the response body carries the durable
    /// entity including its server-assigned identifier.
    async fn create(&self, entity: &EntityType, payload: &Value) -> Result<Value, RemoteError>;

    async fn update(
        &self,
        entity: &EntityType,
        id: &str,
        payload: &Value,
    ) -> Result<Value, RemoteError>;

    async fn delete(&self, entity: &EntityType, id: &str) -> Result<(), RemoteError>;
}

/// reqwest-backed implementation mapping onto
/// `GET/POST/PUT/DELETE {base}/{entity}[/{id}]`.
pub struct HttpRemote {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRemote {
    pub fn new(config: &RemoteConfig) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RemoteError::Connectivity(e.to_string()))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn collection_url(&self, entity: &EntityType) -> String {
        format!("{}/{}", self.base_url, entity)
    }

    fn item_url(&self, entity: &EntityType, id: &str) -> String {
        format!("{}/{}/{}", self.base_url, entity, id)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, RemoteError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(RemoteError::Status {
            status: status.as_u16(),
            message,
        })
    }

    fn transport_error(err: reqwest::Error) -> RemoteError {
        // Timeouts and connection refusals are connectivity-class; anything
        // carrying a status already went through `check`.
        RemoteError::Connectivity(err.to_string())
    }

    async fn read_json(response: reqwest::Response) -> Result<Value, RemoteError> {
        response
            .json::<Value>()
            .await
            .map_err(|e| RemoteError::Connectivity(format!("invalid response body: {e}")))
    }
}

#[async_trait]
impl RemoteService for HttpRemote {
    async fn fetch_all(
        &self,
        entity: &EntityType,
        filters: &[(String, String)],
    ) -> Result<Vec<Value>, RemoteError> {
        let response = self
            .client
            .get(self.collection_url(entity))
            .query(filters)
            .send()
            .await
            .map_err(Self::transport_error)?;
        let body = Self::read_json(Self::check(response).await?).await?;
        match body {
            Value::Array(items) => Ok(items),
            other => Err(RemoteError::Connectivity(format!(
                "expected a JSON array for {entity}, got: {other}"
            ))),
        }
    }

    async fn fetch_one(&self, entity: &EntityType, id: &str) -> Result<Value, RemoteError> {
        let response = self
            .client
            .get(self.item_url(entity, id))
            .send()
            .await
            .map_err(Self::transport_error)?;
        Self::read_json(Self::check(response).await?).await
    }

    async fn create(&self, entity: &EntityType, payload: &Value) -> Result<Value, RemoteError> {
        let response = self
            .client
            .post(self.collection_url(entity))
            .json(payload)
            .send()
            .await
            .map_err(Self::transport_error)?;
        Self::read_json(Self::check(response).await?).await
    }

    async fn update(
        &self,
        entity: &EntityType,
        id: &str,
        payload: &Value,
    ) -> Result<Value, RemoteError> {
        let response = self
            .client
            .put(self.item_url(entity, id))
            .json(payload)
            .send()
            .await
            .map_err(Self::transport_error)?;
        Self::read_json(Self::check(response).await?).await
    }

    async fn delete(&self, entity: &EntityType, id: &str) -> Result<(), RemoteError> {
        let response = self
            .client
            .delete(self.item_url(entity, id))
            .send()
            .await
            .map_err(Self::transport_error)?;
        Self::check(response).await?;
        Ok(())
    }
}
