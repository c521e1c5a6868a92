//! # a2a-rpc
//!
//! Agent-to-Agent task protocol over JSON-RPC 2.0, with Server-Sent Events
//! for incremental task updates.
//!
//! ## Layers
//!
//! 1. **Data model** — [`Task`], [`TaskStatus`], [`Message`], [`Part`],
//!    [`Artifact`] and the streaming events.
//! 2. **Wire bindings** — JSON-RPC envelopes and error codes
//!    ([`transport::jsonrpc`]), SSE framing and reassembly ([`transport::sse`]).
//! 3. **Client** — [`A2AClient`] for calling a remote agent.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use a2a_rpc::{A2AClient, TaskEvent};
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = A2AClient::new("http://localhost:41241")?;
//!
//!     let task = client.send_task_text("Summarize Q4 report").await?;
//!     println!("Task {} is {}", task.id, task.status.state);
//!
//!     let mut events = client.send_task_subscribe_text("Now in French").await?;
//!     while let Some(event) = events.next().await {
//!         if let TaskEvent::Artifact(update) = event? {
//!             print!("{}", update.artifact.text_content());
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod artifact;
pub mod client;
pub mod error;
pub mod message;
pub mod notification;
pub mod task;
pub mod transport;

// Re-export primary types
pub use artifact::Artifact;
pub use client::A2AClient;
pub use error::{A2AError, A2AResult};
pub use message::{FileContent, FilePart, Message, Part, Role};
pub use notification::{AuthenticationInfo, PushNotificationConfig, TaskPushNotificationConfig};
pub use task::{
    Task, TaskArtifactUpdateEvent, TaskEvent, TaskIdParams, TaskQueryParams, TaskSendParams,
    TaskState, TaskStatus, TaskStatusUpdateEvent, TaskUpdate,
};
pub use transport::jsonrpc::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, RequestId};
pub use transport::sse::TaskEventStream;
