/// Hosted backend client: database rows, auth sessions and object storage.
///
/// Every persistence call in the service goes through one of the three traits
/// here (`DataStore`, `AuthService`, `ObjectStore`). `AppState` carries them as
/// `Arc<dyn ...>` so handlers never see which backend they talk to.
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

pub mod auth;
#[cfg(test)]
pub mod memory;
pub mod query;
pub mod storage;

pub use auth::{AuthService, Session};
pub use query::{Direction, RowQuery};
pub use storage::ObjectStore;

use crate::config::BackendSettings;

const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Backend rejected request (status {status}): {message}")]
    Query { status: u16, message: String },

    #[error("Unexpected row shape from '{table}': {source}")]
    Decode {
        table: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Backend is not configured: {0}")]
    MissingConfig(String),

    #[error("Unauthorized")]
    Unauthorized,
}

// ────────────────────────────────────────────────────────────────────────────
// DataStore trait
// ────────────────────────────────────────────────────────────────────────────

/// Row-level access to named tables.
/// Rows cross this boundary as raw JSON; callers convert them with `select_as`
/// or their own validation before use.
#[async_trait]
pub trait DataStore: Send + Sync {
    async fn select(&self, table: &str, query: &RowQuery) -> Result<Vec<Value>, BackendError>;

    /// Inserts one row and returns the stored representation.
    async fn insert(&self, table: &str, row: Value) -> Result<Value, BackendError>;

    /// Applies `patch` to every matching row and returns the updated rows.
    async fn update(
        &self,
        table: &str,
        query: &RowQuery,
        patch: Value,
    ) -> Result<Vec<Value>, BackendError>;

    /// Deletes every matching row and returns the deleted rows.
    async fn delete(&self, table: &str, query: &RowQuery) -> Result<Vec<Value>, BackendError>;
}

/// Selects rows and deserializes each into `T`.
pub async fn select_as<T: DeserializeOwned>(
    store: &dyn DataStore,
    table: &str,
    query: &RowQuery,
) -> Result<Vec<T>, BackendError> {
    store
        .select(table, query)
        .await?
        .into_iter()
        .map(|row| decode_row(table, row))
        .collect()
}

pub fn decode_row<T: DeserializeOwned>(table: &str, row: Value) -> Result<T, BackendError> {
    serde_json::from_value(row).map_err(|source| BackendError::Decode {
        table: table.to_string(),
        source,
    })
}

// ────────────────────────────────────────────────────────────────────────────
// HTTP implementation
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RestErrorBody {
    message: Option<String>,
    msg: Option<String>,
    error_description: Option<String>,
    hint: Option<String>,
}

/// Client for the hosted backend's REST endpoints.
/// Constructed once at startup and shared by the data store and auth service.
#[derive(Clone)]
pub struct BackendClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl BackendClient {
    pub fn new(settings: &BackendSettings) -> Result<Self, BackendError> {
        Ok(Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()?,
            base_url: settings.base_url.clone(),
            api_key: settings.api_key.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    pub(crate) fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    /// Attaches the project key. `bearer` overrides the key as the caller identity.
    pub(crate) fn authorize(&self, req: RequestBuilder, bearer: Option<&str>) -> RequestBuilder {
        req.header("apikey", &self.api_key)
            .bearer_auth(bearer.unwrap_or(&self.api_key))
    }

    pub(crate) fn http(&self) -> &Client {
        &self.client
    }

    fn rest(&self, req: RequestBuilder) -> RequestBuilder {
        self.authorize(req, None)
            .header("Prefer", "return=representation")
            .header("Accept", "application/json")
    }
}

/// Turns a non-success response into a typed error, preferring the backend's own message.
pub(crate) async fn check_status(response: Response) -> Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status.as_u16() == 401 || status.as_u16() == 403 {
        return Err(BackendError::Unauthorized);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<RestErrorBody>(&body)
        .ok()
        .and_then(|e| {
            let base = e.message.or(e.msg).or(e.error_description)?;
            Some(match e.hint {
                Some(hint) => format!("{base} ({hint})"),
                None => base,
            })
        })
        .unwrap_or(body);
    Err(BackendError::Query {
        status: status.as_u16(),
        message,
    })
}

async fn rows(response: Response) -> Result<Vec<Value>, BackendError> {
    let response = check_status(response).await?;
    Ok(response.json::<Vec<Value>>().await?)
}

#[async_trait]
impl DataStore for BackendClient {
    async fn select(&self, table: &str, query: &RowQuery) -> Result<Vec<Value>, BackendError> {
        let mut params = vec![("select".to_string(), "*".to_string())];
        params.extend(query.to_params());
        debug!("select {table} {:?}", params);
        let response = self
            .rest(self.client.get(self.rest_url(table)))
            .query(&params)
            .send()
            .await?;
        rows(response).await
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value, BackendError> {
        let response = self
            .rest(self.client.post(self.rest_url(table)))
            .json(&row)
            .send()
            .await?;
        rows(response)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::Query {
                status: 200,
                message: format!("insert into '{table}' returned no row"),
            })
    }

    async fn update(
        &self,
        table: &str,
        query: &RowQuery,
        patch: Value,
    ) -> Result<Vec<Value>, BackendError> {
        if query.is_unfiltered() {
            return Err(BackendError::Query {
                status: 400,
                message: format!("refusing unfiltered update of '{table}'"),
            });
        }
        let response = self
            .rest(self.client.patch(self.rest_url(table)))
            .query(&query.to_params())
            .json(&patch)
            .send()
            .await?;
        rows(response).await
    }

    async fn delete(&self, table: &str, query: &RowQuery) -> Result<Vec<Value>, BackendError> {
        if query.is_unfiltered() {
            return Err(BackendError::Query {
                status: 400,
                message: format!("refusing unfiltered delete from '{table}'"),
            });
        }
        let response = self
            .rest(self.client.delete(self.rest_url(table)))
            .query(&query.to_params())
            .send()
            .await?;
        rows(response).await
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Unconfigured backend
// ────────────────────────────────────────────────────────────────────────────

/// Stands in for every backend trait when credentials are absent.
/// Each call fails with `MissingConfig`, which surfaces as the dashboard's
/// error state and as 503 responses.
#[derive(Debug, Clone)]
pub struct Unconfigured {
    missing: String,
}

impl Unconfigured {
    pub fn new(missing: impl Into<String>) -> Self {
        Self {
            missing: missing.into(),
        }
    }

    fn err(&self) -> BackendError {
        BackendError::MissingConfig(self.missing.clone())
    }
}

#[async_trait]
impl DataStore for Unconfigured {
    async fn select(&self, _table: &str, _query: &RowQuery) -> Result<Vec<Value>, BackendError> {
        Err(self.err())
    }

    async fn insert(&self, _table: &str, _row: Value) -> Result<Value, BackendError> {
        Err(self.err())
    }

    async fn update(
        &self,
        _table: &str,
        _query: &RowQuery,
        _patch: Value,
    ) -> Result<Vec<Value>, BackendError> {
        Err(self.err())
    }

    async fn delete(&self, _table: &str, _query: &RowQuery) -> Result<Vec<Value>, BackendError> {
        Err(self.err())
    }
}
