//! A2A error types.

use thiserror::Error;

use crate::transport::jsonrpc::codes;

/// Errors that can occur when serving or calling the protocol.
#[derive(Debug, Error)]
pub enum A2AError {
    /// The task was not found.
    #[error("task not found: {0}")]
    TaskNotFound(String),

    /// The task cannot be canceled in its current state.
    #[error("task cannot be canceled: {0}")]
    TaskNotCancelable(String),

    /// Push notifications are not supported by this agent.
    #[error("push notifications are not supported")]
    PushNotificationNotSupported,

    /// The operation is not supported.
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// Requested content types are incompatible with the agent.
    #[error("incompatible content types: {0}")]
    ContentTypeNotSupported(String),

    /// Streaming is not supported by this agent.
    #[error("streaming is not supported")]
    StreamingNotSupported,

    /// The caller must authenticate.
    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    /// The caller is not allowed to perform the operation.
    #[error("authorization failed: {0}")]
    AuthorizationFailed(String),

    /// The operation is not valid for the task's current state.
    #[error("invalid task state: {0}")]
    InvalidTaskState(String),

    /// Too many requests.
    #[error("rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// A resource the agent depends on is unavailable.
    #[error("resource unavailable: {0}")]
    ResourceUnavailable(String),

    /// Request parameters could not be decoded or are invalid.
    #[error("invalid params: {0}")]
    InvalidParams(String),

    /// Internal failure (executor fault, store fault).
    #[error("internal error: {0}")]
    Internal(String),

    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP transport error.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// JSON serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The remote agent returned a JSON-RPC error.
    #[error("JSON-RPC error {code}: {message}")]
    JsonRpc {
        code: i64,
        message: String,
        data: Option<serde_json::Value>,
    },

    /// Streaming error (SSE).
    #[error("streaming error: {0}")]
    StreamingError(String),

    /// URL parsing error.
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl A2AError {
    /// The JSON-RPC error code this error is reported with.
    pub fn code(&self) -> i64 {
        match self {
            A2AError::TaskNotFound(_) => codes::TASK_NOT_FOUND,
            A2AError::TaskNotCancelable(_) => codes::TASK_NOT_CANCELABLE,
            A2AError::PushNotificationNotSupported => codes::PUSH_NOTIFICATION_NOT_SUPPORTED,
            A2AError::UnsupportedOperation(_) => codes::UNSUPPORTED_OPERATION,
            A2AError::ContentTypeNotSupported(_) => codes::CONTENT_TYPE_NOT_SUPPORTED,
            A2AError::StreamingNotSupported => codes::STREAMING_NOT_SUPPORTED,
            A2AError::AuthenticationRequired(_) => codes::AUTHENTICATION_REQUIRED,
            A2AError::AuthorizationFailed(_) => codes::AUTHORIZATION_FAILED,
            A2AError::InvalidTaskState(_) => codes::INVALID_TASK_STATE,
            A2AError::RateLimitExceeded(_) => codes::RATE_LIMIT_EXCEEDED,
            A2AError::ResourceUnavailable(_) => codes::RESOURCE_UNAVAILABLE,
            A2AError::InvalidParams(_) => codes::INVALID_PARAMS,
            A2AError::JsonRpc { code, .. } => *code,
            A2AError::Internal(_)
            | A2AError::Io(_)
            | A2AError::Transport(_)
            | A2AError::Serialization(_)
            | A2AError::StreamingError(_)
            | A2AError::InvalidUrl(_) => codes::INTERNAL_ERROR,
        }
    }
}

/// A2A Result type alias.
pub type A2AResult<T> = Result<T, A2AError>;
