//! Agent executor contract.
//!
//! An executor is the collaborator that actually works on a task. It never
//! sees HTTP: it receives a [`TaskContext`] and pushes [`TaskUpdate`]s onto
//! an [`UpdateSink`]. The dispatcher drains the sink, folds each update into
//! the stored task, and forwards it to the client.

use a2a_rpc::{A2AError, A2AResult, Message, Task, TaskState, TaskStatus, TaskUpdate};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::queue::StreamingQueue;

/// Where an executor pushes its updates. `push` returns `false` once nobody
/// is listening any more; executors may use that to stop early.
pub type UpdateSink = StreamingQueue<TaskUpdate>;

/// Everything an executor gets for one send cycle.
#[derive(Debug, Clone)]
pub struct TaskContext {
    /// Snapshot of the task as resolved before execution, with the inbound
    /// message already in its history.
    pub task: Task,

    /// The message that started this cycle.
    pub user_message: Message,

    /// Triggered by `tasks/cancel`. Advisory: the executor decides whether
    /// and how to stop.
    pub cancellation: CancellationToken,
}

impl TaskContext {
    pub fn new(task: Task, user_message: Message) -> Self {
        Self {
            task,
            user_message,
            cancellation: CancellationToken::new(),
        }
    }

    pub fn task_id(&self) -> &str {
        &self.task.id
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

/// Computes task results.
#[async_trait]
pub trait AgentExecutor: Send + Sync + 'static {
    /// Work on the task, pushing status and artifact updates as they are
    /// produced. Returning ends the cycle; the caller closes `updates`.
    async fn execute(&self, ctx: TaskContext, updates: UpdateSink) -> A2AResult<()>;

    /// Single-result entry point: run [`execute`](Self::execute) to
    /// completion and return the task with every update applied.
    async fn execute_task(&self, ctx: TaskContext) -> A2AResult<Task> {
        let updates = UpdateSink::new();
        let mut task = ctx.task.clone();

        let producer = updates.clone();
        let run = async move {
            let result = self.execute(ctx, producer.clone()).await;
            producer.close();
            result
        };
        let drain = async {
            while let Some(update) = updates.next().await {
                task.apply(update);
            }
        };

        let (result, ()) = tokio::join!(run, drain);
        result?;
        Ok(task)
    }

    /// Attempt to cancel `task`, returning the task to persist.
    ///
    /// The default accepts any non-terminal task.
    async fn cancel(&self, task: Task) -> A2AResult<Task> {
        if task.is_terminal() {
            return Err(A2AError::TaskNotCancelable(task.id));
        }
        let mut task = task;
        task.apply_status(TaskStatus::new(TaskState::Canceled));
        Ok(task)
    }

    /// Re-attach a client to `task`. Whether earlier updates are replayed is
    /// up to the executor. The default does not support resubscription.
    async fn resubscribe(&self, task: Task, updates: UpdateSink) -> A2AResult<()> {
        let _ = (task, updates);
        Err(A2AError::UnsupportedOperation(
            "tasks/resubscribe is not supported by this agent".into(),
        ))
    }
}

/// Reference executor: answers every message with a single `completed`
/// status echoing the user's text.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoExecutor;

#[async_trait]
impl AgentExecutor for EchoExecutor {
    async fn execute(&self, ctx: TaskContext, updates: UpdateSink) -> A2AResult<()> {
        let text = ctx.user_message.text_content();
        tracing::debug!(task_id = %ctx.task_id(), "Echoing {} bytes", text.len());

        updates.push(TaskUpdate::status(
            TaskState::Completed,
            Message::agent_text(text),
        ));
        Ok(())
    }

    /// Snapshot-only: emits the current status and returns. No backfill,
    /// and later updates are not followed.
    async fn resubscribe(&self, task: Task, updates: UpdateSink) -> A2AResult<()> {
        updates.push(TaskUpdate::Status(task.status));
        Ok(())
    }
}
