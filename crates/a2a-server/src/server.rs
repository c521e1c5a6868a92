//! HTTP transport powered by axum.
//!
//! Serves:
//! - `POST {rpc_path}` — JSON-RPC 2.0 endpoint (JSON or SSE responses)
//! - `GET  /health`    — Health check

use std::convert::Infallible;
use std::net::SocketAddr;

use a2a_rpc::transport::sse::{encode_event, END_FRAME, EVENT_STREAM_MEDIA_TYPE};
use a2a_rpc::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, RequestId};
use anyhow::Context;
use axum::body::Body;
use axum::extract::State;
use axum::http::header::{CACHE_CONTROL, CONNECTION, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use bytes::Bytes;
use futures::{stream, StreamExt};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;
use crate::dispatcher::{DispatchOutcome, Dispatcher, ResponseQueue};

/// An A2A server: a dispatcher bound to an HTTP listener.
#[derive(Debug, Clone)]
pub struct A2AServer {
    dispatcher: Dispatcher,
    config: ServerConfig,
}

impl A2AServer {
    pub fn new(dispatcher: Dispatcher, config: ServerConfig) -> Self {
        Self { dispatcher, config }
    }

    fn rpc_path(&self) -> String {
        if self.config.rpc_path.starts_with('/') {
            self.config.rpc_path.clone()
        } else {
            format!("/{}", self.config.rpc_path)
        }
    }

    /// Build the axum router.
    pub fn router(&self) -> Router {
        Router::new()
            .route(&self.rpc_path(), post(handle_rpc))
            .route("/health", get(health_check))
            .with_state(self.dispatcher.clone())
    }

    /// Bind the configured address and serve in the background.
    pub async fn start(self) -> anyhow::Result<ServerHandle> {
        let addr = self.config.socket_addr()?;
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("binding {addr}"))?;
        let local_addr = listener.local_addr()?;

        let app = self.router();
        let shutdown = CancellationToken::new();
        let signal = shutdown.clone();
        let join = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { signal.cancelled().await })
                .await
        });

        let rpc_path = self.rpc_path();
        tracing::info!("A2A server listening on http://{}{}", local_addr, rpc_path);

        Ok(ServerHandle {
            local_addr,
            rpc_path,
            shutdown,
            join,
        })
    }
}

/// A running server.
#[derive(Debug)]
pub struct ServerHandle {
    local_addr: SocketAddr,
    rpc_path: String,
    shutdown: CancellationToken,
    join: JoinHandle<std::io::Result<()>>,
}

impl ServerHandle {
    /// The bound address (useful with port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The JSON-RPC endpoint URL.
    pub fn url(&self) -> String {
        format!("http://{}{}", self.local_addr, self.rpc_path)
    }

    /// Stop accepting connections. Open streams are allowed to finish.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Wait for the server task to exit.
    pub async fn wait(self) -> anyhow::Result<()> {
        self.join.await.context("server task panicked")??;
        tracing::info!("A2A server on {} stopped", self.local_addr);
        Ok(())
    }
}

/// POST {rpc_path} — JSON-RPC 2.0 endpoint.
///
/// Parses the body itself so malformed input gets a JSON-RPC error rather
/// than axum's plain-text rejection.
async fn handle_rpc(State(dispatcher): State<Dispatcher>, body: Bytes) -> Response {
    let value: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!(error = %e, "Rejecting malformed JSON");
            return rpc_json(JsonRpcResponse::error(
                RequestId::Null,
                JsonRpcError::parse_error(e.to_string()),
            ));
        }
    };

    let request: JsonRpcRequest = match serde_json::from_value(value.clone()) {
        Ok(request) => request,
        Err(e) => {
            let id = value
                .get("id")
                .and_then(|id| serde_json::from_value(id.clone()).ok())
                .unwrap_or_default();
            return rpc_json(JsonRpcResponse::error(
                id,
                JsonRpcError::invalid_request(e.to_string()),
            ));
        }
    };

    match dispatcher.dispatch(request).await {
        DispatchOutcome::Response(response) => rpc_json(response),
        DispatchOutcome::Stream(queue) => event_stream(queue),
    }
}

fn rpc_json(response: JsonRpcResponse) -> Response {
    (StatusCode::OK, Json(response)).into_response()
}

/// One `data:` frame per queued envelope, then the `end` sentinel. If the
/// client disconnects the body is dropped, which closes the queue.
fn event_stream(queue: ResponseQueue) -> Response {
    let frames = queue
        .into_stream()
        .map(|response| Ok::<_, Infallible>(Bytes::from(encode_event(&response))))
        .chain(stream::once(async {
            Ok(Bytes::from_static(END_FRAME.as_bytes()))
        }));

    (
        StatusCode::OK,
        [
            (CONTENT_TYPE, EVENT_STREAM_MEDIA_TYPE),
            (CACHE_CONTROL, "no-cache"),
            (CONNECTION, "keep-alive"),
        ],
        Body::from_stream(frames),
    )
        .into_response()
}

/// GET /health — Health check.
async fn health_check() -> Json<Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "protocol": "A2A",
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use a2a_rpc::transport::jsonrpc::codes;
    use a2a_rpc::transport::sse::SseDecoder;
    use a2a_rpc::TaskEvent;
    use axum::http::Request;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tower::ServiceExt;

    use crate::executor::EchoExecutor;
    use crate::store::InMemoryTaskStore;

    fn test_server() -> A2AServer {
        let dispatcher = Dispatcher::new(Arc::new(InMemoryTaskStore::new()), Arc::new(EchoExecutor));
        A2AServer::new(dispatcher, ServerConfig::default())
    }

    fn post_rpc(body: impl Into<Body>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/")
            .header(CONTENT_TYPE, "application/json")
            .body(body.into())
            .expect("request")
    }

    async fn body_bytes(response: Response) -> Bytes {
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body")
    }

    async fn rpc_response(response: Response) -> JsonRpcResponse {
        serde_json::from_slice(&body_bytes(response).await).expect("json-rpc response")
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .expect("request");

        let resp = test_server().router().oneshot(req).await.expect("response");
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_malformed_json_is_parse_error() {
        let resp = test_server()
            .router()
            .oneshot(post_rpc("{not json"))
            .await
            .expect("response");

        let rpc = rpc_response(resp).await;
        assert_eq!(rpc.id, RequestId::Null);
        assert_eq!(rpc.error.unwrap().code, codes::PARSE_ERROR);
    }

    #[tokio::test]
    async fn test_non_request_shape_is_invalid_request() {
        let resp = test_server()
            .router()
            .oneshot(post_rpc(json!({"id": 4, "hello": "world"}).to_string()))
            .await
            .expect("response");

        let rpc = rpc_response(resp).await;
        assert_eq!(rpc.id, RequestId::Number(4));
        assert_eq!(rpc.error.unwrap().code, codes::INVALID_REQUEST);
    }

    #[tokio::test]
    async fn test_get_unknown_task() {
        let body = json!({
            "jsonrpc": "2.0",
            "id": "r1",
            "method": "tasks/get",
            "params": {"id": "missing"}
        });
        let resp = test_server()
            .router()
            .oneshot(post_rpc(body.to_string()))
            .await
            .expect("response");

        assert_eq!(resp.status(), StatusCode::OK);
        let rpc = rpc_response(resp).await;
        assert_eq!(rpc.id, RequestId::String("r1".into()));
        assert_eq!(rpc.error.unwrap().code, codes::TASK_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_send_subscribe_streams_sse() {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 9,
            "method": "tasks/sendSubscribe",
            "params": {
                "id": "t1",
                "message": {"role": "user", "parts": [{"type": "text", "text": "hi"}]}
            }
        });
        let resp = test_server()
            .router()
            .oneshot(post_rpc(body.to_string()))
            .await
            .expect("response");

        let headers = resp.headers();
        assert_eq!(headers[CONTENT_TYPE], EVENT_STREAM_MEDIA_TYPE);
        assert_eq!(headers[CACHE_CONTROL], "no-cache");
        assert_eq!(headers[CONNECTION], "keep-alive");

        let bytes = body_bytes(resp).await;
        assert!(bytes.ends_with(END_FRAME.as_bytes()));

        let frames = SseDecoder::new().push(&bytes);
        assert_eq!(frames.len(), 2);
        assert!(frames[1].is_end());

        let rpc: JsonRpcResponse = serde_json::from_str(&frames[0].data).unwrap();
        assert_eq!(rpc.id, RequestId::Number(9));
        let event: TaskEvent = serde_json::from_value(rpc.result.unwrap()).unwrap();
        assert!(event.is_final());
    }

    #[tokio::test]
    async fn test_custom_rpc_path() {
        let dispatcher = Dispatcher::new(Arc::new(InMemoryTaskStore::new()), Arc::new(EchoExecutor));
        let server = A2AServer::new(
            dispatcher,
            ServerConfig {
                rpc_path: "a2a".into(),
                ..ServerConfig::default()
            },
        );

        let req = Request::builder()
            .method("POST")
            .uri("/a2a")
            .body(Body::from("{}"))
            .expect("request");
        let resp = server.router().oneshot(req).await.expect("response");

        let rpc = rpc_response(resp).await;
        assert_eq!(rpc.error.unwrap().code, codes::INVALID_REQUEST);
    }
}
