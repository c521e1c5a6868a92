//! # a2a-server
//!
//! Task lifecycle and streaming engine for the Agent-to-Agent protocol.
//!
//! This crate provides:
//! - Task stores (in-memory and file-backed)
//! - The streaming response queue
//! - The executor contract and a reference echo executor
//! - The request dispatcher / task state machine
//! - An axum HTTP server with an explicit start/shutdown handle
//! - Configuration and telemetry bootstrap
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use a2a_server::{A2AServer, Dispatcher, EchoExecutor, InMemoryTaskStore, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let dispatcher = Dispatcher::new(
//!         Arc::new(InMemoryTaskStore::new()),
//!         Arc::new(EchoExecutor),
//!     );
//!     let handle = A2AServer::new(dispatcher, ServerConfig::default()).start().await?;
//!     println!("serving on {}", handle.url());
//!
//!     tokio::signal::ctrl_c().await?;
//!     handle.shutdown();
//!     handle.wait().await
//! }
//! ```

pub mod config;
pub mod dispatcher;
pub mod executor;
pub mod queue;
pub mod server;
pub mod store;
pub mod telemetry;

// Re-exports
pub use config::{LogFormat, ServerConfig, StoreConfig, TelemetryConfig};
pub use dispatcher::{DispatchOutcome, Dispatcher, ResponseQueue};
pub use executor::{AgentExecutor, EchoExecutor, TaskContext, UpdateSink};
pub use queue::{QueueStream, StreamingQueue};
pub use server::{A2AServer, ServerHandle};
pub use store::{
    FileTaskStore, InMemoryPushNotificationStore, InMemoryTaskStore, PushNotificationStore,
    TaskStore,
};

// Re-export the protocol crate for convenience
pub use a2a_rpc;
