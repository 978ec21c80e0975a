//! HTTP client for the portal's REST API.
//!
//! Every request carries the current bearer token, read from the token
//! provider at send time. List bodies may be bare arrays or wrapped in a
//! `$values` envelope; both decode the same.

use std::marker::PhantomData;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use workpulse_proto::codec;
use workpulse_proto::task::{StatusUpdate, TaskId, TaskStatus};

use super::{ApiError, StatusUpdater};
use crate::transport::TokenProvider;
use crate::view::Fetch;

/// Default timeout for one request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Client for the portal REST API.
#[derive(Clone)]
pub struct RestClient {
    base_url: String,
    tokens: TokenProvider,
    client: reqwest::Client,
}

impl RestClient {
    /// Create a client rooted at `base_url` (e.g. `https://host/api`).
    /// Every request is bounded by `timeout`.
    ///
    /// # Errors
    ///
    /// [`ApiError::Http`] if the HTTP client cannot be built, for example
    /// when no TLS backend can be initialized.
    pub fn new(base_url: &str, tokens: TokenProvider, timeout: Duration) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            tokens,
            client,
        })
    }

    /// Base URL without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match (self.tokens)() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// GET `path` and decode the body as a list of `T`.
    ///
    /// # Errors
    ///
    /// [`ApiError::Http`] for network failures, [`ApiError::Status`] for
    /// non-success responses, [`ApiError::Decode`] for unexpected bodies.
    pub async fn get_list<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, ApiError> {
        let url = self.url(path);
        let response = self.authorize(self.client.get(&url)).send().await?;
        let response = check(response).await?;
        let body: Value = response.json().await?;
        let records = codec::decode_list(body)?;
        tracing::debug!(%url, count = records.len(), "list fetched");
        Ok(records)
    }

    /// `PUT tasks/{id}/status` with `{"status": ...}`.
    ///
    /// # Errors
    ///
    /// [`ApiError::Http`] for network failures, [`ApiError::Status`] for
    /// non-success responses.
    pub async fn update_task_status(&self, id: TaskId, status: TaskStatus) -> Result<(), ApiError> {
        let url = self.url(&format!("tasks/{id}/status"));
        let request = self.client.put(&url).json(&StatusUpdate { status });
        let response = self.authorize(request).send().await?;
        check(response).await?;
        tracing::info!(task = %id, %status, "task status updated");
        Ok(())
    }

    /// A [`Fetch`] implementation over the list at `path`.
    #[must_use]
    pub fn list<T>(&self, path: &str) -> ListEndpoint<T> {
        ListEndpoint {
            client: self.clone(),
            path: path.to_string(),
            _records: PhantomData,
        }
    }
}

impl StatusUpdater for RestClient {
    async fn update_status(&self, id: TaskId, status: TaskStatus) -> Result<(), ApiError> {
        self.update_task_status(id, status).await
    }
}

/// Turn a non-success response into [`ApiError::Status`].
///
/// The message is the body's `message` field when the body is a JSON
/// object carrying one, otherwise the raw body text.
async fn check(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or(body);
    tracing::warn!(status = status.as_u16(), %message, "API request rejected");
    Err(ApiError::Status {
        status: status.as_u16(),
        message,
    })
}

/// One list endpoint, usable as a data view fetcher.
pub struct ListEndpoint<T> {
    client: RestClient,
    path: String,
    _records: PhantomData<fn() -> T>,
}

impl<T> ListEndpoint<T> {
    /// Path relative to the API base.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl<T> Fetch<T> for ListEndpoint<T>
where
    T: DeserializeOwned + Send + 'static,
{
    async fn fetch(&self) -> Result<Vec<T>, ApiError> {
        self.client.get_list(&self.path).await
    }
}
