//! REST collaborators: list endpoints and the task status update call.

pub mod http;

use std::future::Future;

use workpulse_proto::codec::CodecError;
use workpulse_proto::task::{TaskId, TaskStatus};

pub use http::{ListEndpoint, RestClient};

/// Errors from REST calls.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request could not be sent or the response not read.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("server returned {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Server-provided message, or the raw body.
        message: String,
    },

    /// The response body had an unexpected shape.
    #[error("unexpected response body: {0}")]
    Decode(#[from] CodecError),
}

/// Persists a task's new status. The board reconciler's only server call.
pub trait StatusUpdater: Send + Sync + 'static {
    /// Set task `id` to `status`.
    fn update_status(
        &self,
        id: TaskId,
        status: TaskStatus,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;
}
