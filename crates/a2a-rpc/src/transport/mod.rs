//! Transport layer — wire-level bindings.
//!
//! - JSON-RPC 2.0 over HTTP for every operation
//! - SSE (Server-Sent Events) framing for streaming responses

pub mod jsonrpc;
pub mod sse;
