//! SSE (Server-Sent Events) transport for streaming task updates.
//!
//! Server side, every response envelope becomes one `data:` frame and the
//! stream ends with an `event: end` sentinel frame. Client side, the
//! response body arrives as arbitrary byte chunks; [`SseDecoder`] buffers
//! them, splits complete frames on the blank-line delimiter and keeps the
//! trailing partial frame for the next read.

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::{Stream, StreamExt};
use pin_project_lite::pin_project;

use crate::error::A2AError;
use crate::task::TaskEvent;
use crate::transport::jsonrpc::JsonRpcResponse;

/// Content type of streaming responses.
pub const EVENT_STREAM_MEDIA_TYPE: &str = "text/event-stream";

/// Event name of the end-of-stream sentinel.
pub const END_EVENT: &str = "end";

/// The sentinel frame written after the last event.
pub const END_FRAME: &str = "event: end\ndata: {}\n\n";

// ── Encoding ─────────────────────────────────────────────────

/// Encode one response envelope as an SSE frame.
pub fn encode_event(response: &JsonRpcResponse) -> String {
    match serde_json::to_string(response) {
        Ok(json) => format!("data: {json}\n\n"),
        Err(e) => {
            tracing::error!(error = %e, "failed to serialize stream envelope");
            let fallback = serde_json::json!({
                "jsonrpc": "2.0",
                "id": response.id,
                "error": {"code": -32603, "message": "Internal error"}
            });
            format!("data: {fallback}\n\n")
        }
    }
}

// ── Decoding ─────────────────────────────────────────────────

/// One complete SSE frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    /// The `event:` field, if present.
    pub event: Option<String>,

    /// The `data:` lines of the frame joined with `\n`.
    pub data: String,
}

impl SseFrame {
    /// Whether this is the end-of-stream sentinel.
    pub fn is_end(&self) -> bool {
        self.event.as_deref() == Some(END_EVENT)
    }

    fn parse(raw: &str) -> Option<Self> {
        let mut event = None;
        let mut data: Vec<&str> = Vec::new();

        for line in raw.split('\n') {
            if line.is_empty() || line.starts_with(':') {
                continue;
            }
            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line, ""),
            };
            match field {
                "data" => data.push(value),
                "event" => event = Some(value.to_string()),
                _ => {}
            }
        }

        if event.is_none() && data.is_empty() {
            return None;
        }
        Some(Self {
            event,
            data: data.join("\n"),
        })
    }
}

/// Incremental SSE frame reassembler.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    // Prefix of `buffer` already searched for a delimiter.
    scanned: usize,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of the body; returns every frame it completed.
    ///
    /// Works on bytes so a multi-byte character split across chunks is
    /// reassembled before it is decoded.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        // CR never occurs inside a UTF-8 sequence, so CRLF endings fold to LF here.
        self.buffer.extend(chunk.iter().copied().filter(|b| *b != b'\r'));

        let mut frames = Vec::new();
        while let Some(pos) = self.find_delimiter() {
            let raw: Vec<u8> = self.buffer.drain(..pos + 2).collect();
            self.scanned = 0;
            let text = String::from_utf8_lossy(&raw[..pos]);
            if let Some(frame) = SseFrame::parse(&text) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Flush a trailing frame the server never terminated.
    pub fn finish(&mut self) -> Option<SseFrame> {
        let raw = std::mem::take(&mut self.buffer);
        self.scanned = 0;
        SseFrame::parse(&String::from_utf8_lossy(&raw))
    }

    /// Bytes held back waiting for a delimiter.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Position of the next blank line, searching only bytes not yet seen.
    /// The last byte is kept unscanned since it may pair with the next chunk.
    fn find_delimiter(&mut self) -> Option<usize> {
        let start = self.scanned;
        match self.buffer[start..].windows(2).position(|w| w == b"\n\n") {
            Some(pos) => Some(start + pos),
            None => {
                self.scanned = self.buffer.len().saturating_sub(1);
                None
            }
        }
    }
}

pin_project! {
    /// Stream of response envelopes decoded from an SSE byte stream.
    ///
    /// Ends cleanly at the `event: end` sentinel or at end of body. Frames
    /// whose data is not a valid envelope are logged and skipped.
    pub struct SseResponseStream<S> {
        #[pin]
        inner: S,
        decoder: SseDecoder,
        pending: VecDeque<SseFrame>,
        done: bool,
    }
}

impl<S> SseResponseStream<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            decoder: SseDecoder::new(),
            pending: VecDeque::new(),
            done: false,
        }
    }
}

impl<S, B, E> Stream for SseResponseStream<S>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<A2AError>,
{
    type Item = Result<JsonRpcResponse, A2AError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();
        loop {
            if let Some(frame) = this.pending.pop_front() {
                if frame.is_end() {
                    *this.done = true;
                    this.pending.clear();
                    return Poll::Ready(None);
                }
                match serde_json::from_str::<JsonRpcResponse>(&frame.data) {
                    Ok(response) => return Poll::Ready(Some(Ok(response))),
                    Err(e) => {
                        tracing::warn!(error = %e, data = %frame.data, "skipping malformed SSE frame");
                        continue;
                    }
                }
            }

            if *this.done {
                return Poll::Ready(None);
            }

            match this.inner.as_mut().poll_next(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(Some(Ok(chunk))) => {
                    this.pending.extend(this.decoder.push(chunk.as_ref()));
                }
                Poll::Ready(Some(Err(e))) => {
                    *this.done = true;
                    return Poll::Ready(Some(Err(e.into())));
                }
                Poll::Ready(None) => {
                    *this.done = true;
                    this.pending.extend(this.decoder.finish());
                }
            }
        }
    }
}

// ── Typed event stream ───────────────────────────────────────

pin_project! {
    /// A stream of task events received via SSE.
    pub struct TaskEventStream {
        #[pin]
        inner: Pin<Box<dyn Stream<Item = Result<TaskEvent, A2AError>> + Send>>,
    }
}

impl TaskEventStream {
    /// Wrap an already-typed event stream.
    pub fn new(inner: Pin<Box<dyn Stream<Item = Result<TaskEvent, A2AError>> + Send>>) -> Self {
        Self { inner }
    }

    /// Decode task events from an SSE response body.
    ///
    /// Error envelopes surface as `Err(A2AError::JsonRpc { .. })` items.
    pub fn from_body<S, B, E>(body: S) -> Self
    where
        S: Stream<Item = Result<B, E>> + Send + 'static,
        B: AsRef<[u8]>,
        E: Into<A2AError>,
    {
        let events = SseResponseStream::new(body).filter_map(|item| async move {
            match item {
                Ok(response) => parse_envelope(response),
                Err(e) => Some(Err(e)),
            }
        });
        Self::new(Box::pin(events))
    }
}

impl Stream for TaskEventStream {
    type Item = Result<TaskEvent, A2AError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.project().inner.poll_next(cx)
    }
}

fn parse_envelope(response: JsonRpcResponse) -> Option<Result<TaskEvent, A2AError>> {
    match response.into_result() {
        Ok(result) => match serde_json::from_value::<TaskEvent>(result) {
            Ok(event) => Some(Ok(event)),
            Err(e) => {
                tracing::warn!(error = %e, "skipping SSE frame with an unrecognized result");
                None
            }
        },
        Err(error) => Some(Err(error.into())),
    }
}
