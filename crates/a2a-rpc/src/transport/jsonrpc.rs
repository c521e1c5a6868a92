//! JSON-RPC 2.0 transport binding.
//!
//! Every operation is a JSON-RPC 2.0 request POSTed over HTTP. Streaming
//! methods answer with an SSE body whose frames each carry one response
//! envelope (see [`super::sse`]).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::A2AError;

/// JSON-RPC 2.0 protocol version.
pub const JSONRPC_VERSION: &str = "2.0";

/// Media type of requests and non-streaming responses.
pub const JSON_MEDIA_TYPE: &str = "application/json";

// ── Methods ──────────────────────────────────────────────────

/// JSON-RPC method names.
pub mod methods {
    /// Send a message, creating or continuing a task.
    pub const SEND_TASK: &str = "tasks/send";

    /// Alias of [`SEND_TASK`].
    pub const SEND_MESSAGE: &str = "message/send";

    /// Send a message and subscribe to the task's updates (SSE).
    pub const SEND_TASK_SUBSCRIBE: &str = "tasks/sendSubscribe";

    /// Alias of [`SEND_TASK_SUBSCRIBE`].
    pub const SEND_MESSAGE_STREAM: &str = "message/sendStream";

    /// Get a task by id.
    pub const GET_TASK: &str = "tasks/get";

    /// Cancel a task.
    pub const CANCEL_TASK: &str = "tasks/cancel";

    /// Re-attach to a task's update stream (SSE).
    pub const RESUBSCRIBE_TASK: &str = "tasks/resubscribe";

    /// Register a webhook configuration for a task.
    pub const SET_PUSH_NOTIFICATION_CONFIG: &str = "tasks/pushNotificationConfig/set";

    /// Read a task's webhook configuration.
    pub const GET_PUSH_NOTIFICATION_CONFIG: &str = "tasks/pushNotificationConfig/get";

    /// Legacy alias of [`SET_PUSH_NOTIFICATION_CONFIG`].
    pub const SET_PUSH_NOTIFICATION: &str = "tasks/pushNotification/set";

    /// Legacy alias of [`GET_PUSH_NOTIFICATION_CONFIG`].
    pub const GET_PUSH_NOTIFICATION: &str = "tasks/pushNotification/get";

    /// Whether the method answers with an SSE stream.
    pub fn is_streaming(method: &str) -> bool {
        matches!(
            method,
            SEND_TASK_SUBSCRIBE | SEND_MESSAGE_STREAM | RESUBSCRIBE_TASK
        )
    }
}

// ── Error codes ──────────────────────────────────────────────

/// JSON-RPC error codes, standard and protocol-specific.
pub mod codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;

    pub const TASK_NOT_FOUND: i64 = -32001;
    pub const TASK_NOT_CANCELABLE: i64 = -32002;
    pub const PUSH_NOTIFICATION_NOT_SUPPORTED: i64 = -32003;
    pub const UNSUPPORTED_OPERATION: i64 = -32004;
    pub const CONTENT_TYPE_NOT_SUPPORTED: i64 = -32005;
    pub const STREAMING_NOT_SUPPORTED: i64 = -32006;
    pub const AUTHENTICATION_REQUIRED: i64 = -32007;
    pub const AUTHORIZATION_FAILED: i64 = -32008;
    pub const INVALID_TASK_STATE: i64 = -32009;
    pub const RATE_LIMIT_EXCEEDED: i64 = -32010;
    pub const RESOURCE_UNAVAILABLE: i64 = -32011;
}

// ── JSON-RPC Request ─────────────────────────────────────────

/// A JSON-RPC 2.0 request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// Must be "2.0".
    pub jsonrpc: String,

    /// The method to invoke.
    pub method: String,

    /// Method parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,

    /// Request identifier (used to match responses).
    #[serde(default)]
    pub id: RequestId,
}

impl JsonRpcRequest {
    /// Create a new JSON-RPC request with a fresh id.
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.into(),
            method: method.into(),
            params,
            id: RequestId::String(Uuid::new_v4().to_string()),
        }
    }

    /// Check the envelope before dispatch.
    pub fn validate(&self) -> Result<(), JsonRpcError> {
        if self.jsonrpc != JSONRPC_VERSION {
            return Err(JsonRpcError::invalid_request(format!(
                "unsupported jsonrpc version {:?}, expected \"2.0\"",
                self.jsonrpc
            )));
        }
        if self.method.is_empty() {
            return Err(JsonRpcError::invalid_request("method must not be empty"));
        }
        Ok(())
    }
}

// ── JSON-RPC Response ────────────────────────────────────────

/// A JSON-RPC 2.0 response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// Must be "2.0".
    pub jsonrpc: String,

    /// The request identifier this response corresponds to.
    #[serde(default)]
    pub id: RequestId,

    /// The result (mutually exclusive with error).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    /// The error (mutually exclusive with result).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Create a success response.
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.into(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response.
    pub fn error(id: RequestId, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.into(),
            id,
            result: None,
            error: Some(error),
        }
    }

    /// Serialize `result` into a success response, or an internal error
    /// response if it cannot be serialized.
    pub fn from_result<T: Serialize>(id: RequestId, result: Result<T, A2AError>) -> Self {
        match result.and_then(|value| serde_json::to_value(value).map_err(A2AError::from)) {
            Ok(value) => Self::success(id, value),
            Err(e) => Self::error(id, e.into()),
        }
    }

    /// Check if this is an error response.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Extract the result, returning an error if this is an error response.
    pub fn into_result(self) -> Result<Value, JsonRpcError> {
        if let Some(error) = self.error {
            Err(error)
        } else {
            Ok(self.result.unwrap_or(Value::Null))
        }
    }
}

// ── JSON-RPC Error ───────────────────────────────────────────

/// A JSON-RPC 2.0 error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Error code.
    pub code: i64,

    /// Human-readable error message.
    pub message: String,

    /// Optional additional data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    fn with_detail(code: i64, message: &str, detail: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: Some(Value::String(detail.into())),
        }
    }

    /// Standard JSON-RPC error: Parse error (-32700).
    pub fn parse_error(detail: impl Into<String>) -> Self {
        Self::with_detail(codes::PARSE_ERROR, "Parse error", detail)
    }

    /// Standard JSON-RPC error: Invalid request (-32600).
    pub fn invalid_request(detail: impl Into<String>) -> Self {
        Self::with_detail(codes::INVALID_REQUEST, "Invalid Request", detail)
    }

    /// Standard JSON-RPC error: Method not found (-32601).
    pub fn method_not_found(method: &str) -> Self {
        Self::with_detail(
            codes::METHOD_NOT_FOUND,
            "Method not found",
            format!("Unknown method: {method}"),
        )
    }

    /// Standard JSON-RPC error: Invalid params (-32602).
    pub fn invalid_params(detail: impl Into<String>) -> Self {
        Self::with_detail(codes::INVALID_PARAMS, "Invalid params", detail)
    }

    /// Standard JSON-RPC error: Internal error (-32603).
    pub fn internal_error(detail: impl Into<String>) -> Self {
        Self::with_detail(codes::INTERNAL_ERROR, "Internal error", detail)
    }

    /// Task not found (-32001).
    pub fn task_not_found(task_id: &str) -> Self {
        Self::with_detail(
            codes::TASK_NOT_FOUND,
            "Task not found",
            format!("Task {task_id} not found"),
        )
    }

    /// Task cannot be canceled (-32002).
    pub fn task_not_cancelable(task_id: &str) -> Self {
        Self::with_detail(
            codes::TASK_NOT_CANCELABLE,
            "Task cannot be canceled",
            format!("Task {task_id} is in a terminal state"),
        )
    }
}

impl std::fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "JSON-RPC error {}: {}", self.code, self.message)
    }
}

impl std::error::Error for JsonRpcError {}

impl From<A2AError> for JsonRpcError {
    fn from(err: A2AError) -> Self {
        let code = err.code();
        match err {
            A2AError::JsonRpc {
                code,
                message,
                data,
            } => Self {
                code,
                message,
                data,
            },
            A2AError::TaskNotFound(id) => Self::task_not_found(&id),
            A2AError::TaskNotCancelable(id) => Self::task_not_cancelable(&id),
            A2AError::PushNotificationNotSupported => Self {
                code,
                message: "Push Notification is not supported".into(),
                data: None,
            },
            A2AError::StreamingNotSupported => Self {
                code,
                message: "Streaming is not supported".into(),
                data: None,
            },
            A2AError::UnsupportedOperation(detail) => {
                Self::with_detail(code, "This operation is not supported", detail)
            }
            A2AError::ContentTypeNotSupported(detail) => {
                Self::with_detail(code, "Incompatible content types", detail)
            }
            A2AError::AuthenticationRequired(detail) => {
                Self::with_detail(code, "Authentication required", detail)
            }
            A2AError::AuthorizationFailed(detail) => {
                Self::with_detail(code, "Authorization failed", detail)
            }
            A2AError::InvalidTaskState(detail) => {
                Self::with_detail(code, "Invalid task state", detail)
            }
            A2AError::RateLimitExceeded(detail) => {
                Self::with_detail(code, "Rate limit exceeded", detail)
            }
            A2AError::ResourceUnavailable(detail) => {
                Self::with_detail(code, "Resource unavailable", detail)
            }
            A2AError::InvalidParams(detail) => Self::invalid_params(detail),
            other => Self::internal_error(other.to_string()),
        }
    }
}

impl From<JsonRpcError> for A2AError {
    fn from(err: JsonRpcError) -> Self {
        A2AError::JsonRpc {
            code: err.code,
            message: err.message,
            data: err.data,
        }
    }
}

// ── Request ID ───────────────────────────────────────────────

/// JSON-RPC request identifier (number, string, or null).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(i64),
    String(String),
    #[default]
    Null,
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestId::Number(n) => write!(f, "{n}"),
            RequestId::String(s) => f.write_str(s),
            RequestId::Null => f.write_str("null"),
        }
    }
}
