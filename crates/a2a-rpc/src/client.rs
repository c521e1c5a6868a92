//! A2A Client — high-level client for calling a remote agent.
//!
//! Handles request envelopes, JSON-RPC error mapping, and turning SSE
//! response bodies into typed [`TaskEvent`](crate::task::TaskEvent) streams.

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;

use crate::error::{A2AError, A2AResult};
use crate::message::Message;
use crate::notification::TaskPushNotificationConfig;
use crate::task::{Task, TaskIdParams, TaskQueryParams, TaskSendParams};
use crate::transport::jsonrpc::{methods, JsonRpcRequest, JsonRpcResponse, JSON_MEDIA_TYPE};
use crate::transport::sse::{TaskEventStream, EVENT_STREAM_MEDIA_TYPE};

/// High-level client for a remote agent's JSON-RPC endpoint.
#[derive(Debug, Clone)]
pub struct A2AClient {
    /// JSON-RPC endpoint URL.
    endpoint: Url,

    /// HTTP client.
    http: Client,

    /// Optional bearer token, passed through untouched.
    auth_token: Option<String>,
}

impl A2AClient {
    /// Create a client for the given endpoint URL.
    pub fn new(endpoint: &str) -> A2AResult<Self> {
        Self::with_http_client(endpoint, Client::new())
    }

    /// Create a client with a custom HTTP client.
    pub fn with_http_client(endpoint: &str, http: Client) -> A2AResult<Self> {
        Ok(Self {
            endpoint: Url::parse(endpoint)?,
            http,
            auth_token: None,
        })
    }

    /// Set authentication token.
    pub fn with_auth(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// The endpoint this client talks to.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    // ── Core Operations ──────────────────────────────────────

    /// Send a message, creating or continuing a task (`tasks/send`).
    pub async fn send_task(&self, params: TaskSendParams) -> A2AResult<Task> {
        self.call(methods::SEND_TASK, &params).await
    }

    /// Convenience: send a text message on a new task.
    pub async fn send_task_text(&self, text: &str) -> A2AResult<Task> {
        self.send_task(TaskSendParams::new(Message::user_text(text)))
            .await
    }

    /// Continue an existing task with additional input.
    pub async fn continue_task(&self, task_id: &str, text: &str) -> A2AResult<Task> {
        self.send_task(TaskSendParams::for_task(task_id, Message::user_text(text)))
            .await
    }

    /// Get a task by id, optionally bounding the returned history.
    pub async fn get_task(&self, task_id: &str, history_length: Option<u32>) -> A2AResult<Task> {
        let params = TaskQueryParams {
            history_length,
            ..TaskQueryParams::new(task_id)
        };
        self.call(methods::GET_TASK, &params).await
    }

    /// Ask the agent to cancel a task.
    pub async fn cancel_task(&self, task_id: &str) -> A2AResult<Task> {
        let params = TaskIdParams {
            id: task_id.to_string(),
            metadata: None,
        };
        self.call(methods::CANCEL_TASK, &params).await
    }

    // ── Streaming Operations ─────────────────────────────────

    /// Send a message and stream the task's updates (`tasks/sendSubscribe`).
    ///
    /// The stream ends after the final status event.
    pub async fn send_task_subscribe(&self, params: TaskSendParams) -> A2AResult<TaskEventStream> {
        self.open_stream(methods::SEND_TASK_SUBSCRIBE, &params)
            .await
    }

    /// Convenience: stream a text message on a new task.
    pub async fn send_task_subscribe_text(&self, text: &str) -> A2AResult<TaskEventStream> {
        self.send_task_subscribe(TaskSendParams::new(Message::user_text(text)))
            .await
    }

    /// Re-attach to an existing task's update stream (`tasks/resubscribe`).
    pub async fn resubscribe_task(&self, task_id: &str) -> A2AResult<TaskEventStream> {
        self.open_stream(methods::RESUBSCRIBE_TASK, &TaskQueryParams::new(task_id))
            .await
    }

    // ── Push Notification Operations ─────────────────────────

    /// Register a webhook configuration for a task.
    pub async fn set_push_notification(
        &self,
        config: &TaskPushNotificationConfig,
    ) -> A2AResult<TaskPushNotificationConfig> {
        self.call(methods::SET_PUSH_NOTIFICATION_CONFIG, config)
            .await
    }

    /// Read a task's webhook configuration, if one was registered.
    pub async fn get_push_notification(
        &self,
        task_id: &str,
    ) -> A2AResult<Option<TaskPushNotificationConfig>> {
        let params = TaskIdParams {
            id: task_id.to_string(),
            metadata: None,
        };
        self.call(methods::GET_PUSH_NOTIFICATION_CONFIG, &params)
            .await
    }

    // ── Internal Transport ───────────────────────────────────

    /// Call a method and decode its result.
    async fn call<P, R>(&self, method: &str, params: &P) -> A2AResult<R>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let request = JsonRpcRequest::new(method, Some(serde_json::to_value(params)?));
        let response = self.send_rpc(&request).await?;
        let result = response.into_result()?;
        Ok(serde_json::from_value(result)?)
    }

    /// Send a JSON-RPC request and read a JSON response.
    async fn send_rpc(&self, request: &JsonRpcRequest) -> A2AResult<JsonRpcResponse> {
        tracing::debug!(
            method = %request.method,
            url = %self.endpoint,
            "Sending A2A request"
        );

        let response = self
            .request(request, JSON_MEDIA_TYPE)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    /// Send a streaming request and wrap the SSE body.
    ///
    /// Errors raised before streaming starts come back as a plain JSON
    /// response; those are returned from this call instead of the stream.
    async fn open_stream<P: Serialize + ?Sized>(
        &self,
        method: &str,
        params: &P,
    ) -> A2AResult<TaskEventStream> {
        let request = JsonRpcRequest::new(method, Some(serde_json::to_value(params)?));

        tracing::debug!(
            method = %request.method,
            url = %self.endpoint,
            "Opening A2A event stream"
        );

        let response = self
            .request(&request, EVENT_STREAM_MEDIA_TYPE)
            .send()
            .await?
            .error_for_status()?;

        let is_event_stream = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with(EVENT_STREAM_MEDIA_TYPE));

        if !is_event_stream {
            let rpc: JsonRpcResponse = response.json().await?;
            return match rpc.into_result() {
                Err(error) => Err(error.into()),
                Ok(_) => Err(A2AError::StreamingError(format!(
                    "{method} answered with JSON instead of an event stream"
                ))),
            };
        }

        Ok(TaskEventStream::from_body(response.bytes_stream()))
    }

    fn request(&self, request: &JsonRpcRequest, accept: &str) -> reqwest::RequestBuilder {
        let mut builder = self
            .http
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, JSON_MEDIA_TYPE)
            .header(ACCEPT, accept)
            .json(request);

        if let Some(ref token) = self.auth_token {
            builder = builder.bearer_auth(token);
        }
        builder
    }
}
