//! Task — the stateful unit of work tracked across message exchanges.
//!
//! A task is created by the first send for its id and mutated in place by
//! every later send or stream referencing the same id:
//!
//! ```text
//! SUBMITTED → WORKING → { INPUT_REQUIRED → WORKING }* → COMPLETED | CANCELED | FAILED
//! ```
//!
//! `unknown` is a catch-all for states a store could not resolve; normal
//! execution never produces it.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::artifact::{self, Artifact};
use crate::message::Message;
use crate::notification::PushNotificationConfig;

/// A Task — the fundamental unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Stable identifier for this task.
    pub id: String,

    /// Opaque client-side grouping key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    /// Current status.
    pub status: TaskStatus,

    /// Artifacts produced so far, one per slot.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<Artifact>,

    /// Messages exchanged so far, oldest first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<Message>,

    /// Optional metadata attached to the task.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl Task {
    /// Create a submitted task with the given id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            session_id: None,
            status: TaskStatus::new(TaskState::Submitted),
            artifacts: Vec::new(),
            history: Vec::new(),
            metadata: None,
        }
    }

    /// Create a submitted task within a session.
    pub fn with_session(id: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            session_id: Some(session_id.into()),
            ..Self::new(id)
        }
    }

    /// Current state shortcut.
    pub fn state(&self) -> TaskState {
        self.status.state
    }

    /// Check if the task is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.state.is_terminal()
    }

    /// Fold an executor update into this snapshot.
    pub fn apply(&mut self, update: TaskUpdate) {
        match update {
            TaskUpdate::Status(status) => self.apply_status(status),
            TaskUpdate::Artifact(artifact) => self.apply_artifact(artifact),
        }
    }

    /// Replace the status, stamping it if needed. The status message, if
    /// any, is appended to history.
    pub fn apply_status(&mut self, mut status: TaskStatus) {
        if status.timestamp.is_none() {
            status.timestamp = Some(Utc::now());
        }
        if let Some(message) = &status.message {
            self.history.push(message.clone());
        }
        self.status = status;
    }

    /// Merge an artifact chunk into its slot.
    pub fn apply_artifact(&mut self, chunk: Artifact) {
        artifact::merge_into(&mut self.artifacts, chunk);
    }

    /// Add a message to the history.
    pub fn add_message(&mut self, message: Message) {
        self.history.push(message);
    }

    /// Copy of this task with history bounded to the newest `limit` messages.
    /// `None` keeps the full history.
    pub fn with_history_limit(mut self, limit: Option<u32>) -> Self {
        if let Some(limit) = limit {
            let keep = limit as usize;
            if self.history.len() > keep {
                self.history.drain(..self.history.len() - keep);
            }
        }
        self
    }
}

/// Status of a task at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatus {
    /// Lifecycle state.
    pub state: TaskState,

    /// The agent's latest turn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,

    /// When this status was produced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl TaskStatus {
    /// A bare status without message or timestamp.
    pub fn new(state: TaskState) -> Self {
        Self {
            state,
            message: None,
            timestamp: None,
        }
    }

    /// A status carrying an agent message.
    pub fn with_message(state: TaskState, message: Message) -> Self {
        Self {
            state,
            message: Some(message),
            timestamp: None,
        }
    }
}

/// The state of a task in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum TaskState {
    /// Accepted but not yet started.
    Submitted,

    /// Actively being worked on.
    Working,

    /// Paused, waiting for more input from the client.
    InputRequired,

    /// Completed successfully (terminal).
    Completed,

    /// Canceled (terminal).
    Canceled,

    /// Failed (terminal).
    Failed,

    /// State could not be resolved.
    Unknown,
}

impl TaskState {
    /// `completed`, `canceled` and `failed` are terminal.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Canceled | TaskState::Failed
        )
    }

    /// Whether a status update in this state ends a streaming cycle.
    pub fn ends_cycle(self) -> bool {
        self.is_terminal() || self == TaskState::InputRequired
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskState::Submitted => "submitted",
            TaskState::Working => "working",
            TaskState::InputRequired => "input-required",
            TaskState::Completed => "completed",
            TaskState::Canceled => "canceled",
            TaskState::Failed => "failed",
            TaskState::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// One item yielded by an executor while it works on a task.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskUpdate {
    /// New task status.
    Status(TaskStatus),
    /// New artifact chunk.
    Artifact(Artifact),
}

impl TaskUpdate {
    /// Status update without a message.
    pub fn state(state: TaskState) -> Self {
        Self::Status(TaskStatus::new(state))
    }

    /// Status update carrying an agent message.
    pub fn status(state: TaskState, message: Message) -> Self {
        Self::Status(TaskStatus::with_message(state, message))
    }

    /// Artifact update.
    pub fn artifact(artifact: Artifact) -> Self {
        Self::Artifact(artifact)
    }
}

/// Status change delivered over a stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatusUpdateEvent {
    /// Owning task id.
    pub id: String,

    /// The new status.
    pub status: TaskStatus,

    /// True on the last event of a streaming cycle.
    #[serde(rename = "final", default)]
    pub is_final: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// Artifact chunk delivered over a stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TaskArtifactUpdateEvent {
    /// Owning task id.
    pub id: String,

    /// The chunk.
    pub artifact: Artifact,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// A streaming event for a task (the `result` of one SSE frame).
///
/// The wire form has no tag; variants are told apart by their
/// `status` / `artifact` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum TaskEvent {
    /// Status changed.
    Status(TaskStatusUpdateEvent),

    /// Artifact chunk produced.
    Artifact(TaskArtifactUpdateEvent),
}

impl TaskEvent {
    /// Final status event for a task.
    pub fn final_status(task_id: impl Into<String>, status: TaskStatus) -> Self {
        Self::Status(TaskStatusUpdateEvent {
            id: task_id.into(),
            status,
            is_final: true,
            metadata: None,
        })
    }

    /// Id of the task this event belongs to.
    pub fn task_id(&self) -> &str {
        match self {
            TaskEvent::Status(event) => &event.id,
            TaskEvent::Artifact(event) => &event.id,
        }
    }

    /// Whether this event terminates its streaming cycle.
    pub fn is_final(&self) -> bool {
        match self {
            TaskEvent::Status(event) => event.is_final,
            TaskEvent::Artifact(_) => false,
        }
    }
}

// ── Request parameters ───────────────────────────────────────

fn new_task_id() -> String {
    Uuid::new_v4().to_string()
}

/// Parameters of `tasks/send` and `tasks/sendSubscribe`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSendParams {
    /// Task id. Server-assigned when the client omits it.
    #[serde(default = "new_task_id")]
    pub id: String,

    /// Opaque session grouping key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    /// The client's message.
    pub message: Message,

    /// Output modes the client accepts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepted_output_modes: Option<Vec<String>>,

    /// Webhook configuration to register with the task.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push_notification: Option<PushNotificationConfig>,

    /// Bound on history messages in the returned task.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_length: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl TaskSendParams {
    /// Send a message on a fresh task with a generated id.
    pub fn new(message: Message) -> Self {
        Self::for_task(new_task_id(), message)
    }

    /// Send a message on the task with the given id.
    pub fn for_task(id: impl Into<String>, message: Message) -> Self {
        Self {
            id: id.into(),
            session_id: None,
            message,
            accepted_output_modes: None,
            push_notification: None,
            history_length: None,
            metadata: None,
        }
    }

    /// Set the session id.
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

/// Parameters of `tasks/cancel`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskIdParams {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// Parameters of `tasks/get` and `tasks/resubscribe`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskQueryParams {
    pub id: String,

    /// Bound on history messages in the returned task.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_length: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl TaskQueryParams {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            history_length: None,
            metadata: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_task_lifecycle() {
        let mut task = Task::new("t1");
        assert_eq!(task.state(), TaskState::Submitted);
        assert!(!task.is_terminal());

        task.apply(TaskUpdate::state(TaskState::Working));
        assert_eq!(task.state(), TaskState::Working);
        assert!(task.status.timestamp.is_some());

        task.apply(TaskUpdate::status(
            TaskState::InputRequired,
            Message::agent_text("which file?"),
        ));
        assert!(task.state().ends_cycle());
        assert!(!task.is_terminal());
        assert_eq!(task.history.len(), 1);

        task.apply(TaskUpdate::state(TaskState::Completed));
        assert!(task.is_terminal());
    }

    #[test]
    fn test_state_wire_names() {
        let json = serde_json::to_string(&TaskState::InputRequired).unwrap();
        assert_eq!(json, "\"input-required\"");
        let parsed: TaskState = serde_json::from_str("\"canceled\"").unwrap();
        assert_eq!(parsed, TaskState::Canceled);
        assert_eq!(TaskState::InputRequired.to_string(), "input-required");
    }

    #[test]
    fn test_task_serialization() {
        let task = Task::with_session("t1", "s1");
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": "t1",
                "sessionId": "s1",
                "status": {"state": "submitted"}
            })
        );

        let parsed: Task = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, task);
    }

    #[test]
    fn test_history_limit_keeps_newest() {
        let mut task = Task::new("t1");
        for i in 0..5 {
            task.add_message(Message::user_text(format!("m{i}")));
        }

        let bounded = task.clone().with_history_limit(Some(2));
        let texts: Vec<_> = bounded.history.iter().map(Message::text_content).collect();
        assert_eq!(texts, vec!["m3", "m4"]);

        assert_eq!(task.clone().with_history_limit(Some(0)).history.len(), 0);
        assert_eq!(task.with_history_limit(None).history.len(), 5);
    }

    #[test]
    fn test_event_discrimination() {
        let status: TaskEvent = serde_json::from_value(serde_json::json!({
            "id": "t1",
            "status": {"state": "working"},
            "final": false
        }))
        .unwrap();
        assert!(matches!(status, TaskEvent::Status(_)));
        assert!(!status.is_final());

        let artifact: TaskEvent = serde_json::from_value(serde_json::json!({
            "id": "t1",
            "artifact": {"parts": [{"type": "text", "text": "x"}], "index": 0}
        }))
        .unwrap();
        assert!(matches!(artifact, TaskEvent::Artifact(_)));
        assert_eq!(artifact.task_id(), "t1");
    }

    #[test]
    fn test_final_flag_wire_name() {
        let event = TaskEvent::final_status("t1", TaskStatus::new(TaskState::Completed));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["final"], serde_json::json!(true));
        assert!(json.get("isFinal").is_none());
    }

    #[test]
    fn test_send_params_assign_missing_id() {
        let params: TaskSendParams = serde_json::from_value(serde_json::json!({
            "message": {"role": "user", "parts": [{"type": "text", "text": "hi"}]}
        }))
        .unwrap();
        assert!(Uuid::parse_str(&params.id).is_ok());
    }
}
