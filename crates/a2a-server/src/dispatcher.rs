//! Request Dispatcher — routes JSON-RPC methods and drives the task state
//! machine.
//!
//! ```text
//! submitted → working → { input-required → working }* → completed | canceled | failed
//! ```
//!
//! Non-streaming sends run the executor to completion and answer with the
//! resulting task. Streaming sends spawn a cycle driver that applies each
//! executor update to the task, saves it, and forwards it as a JSON-RPC
//! envelope on a [`StreamingQueue`]. Every streaming cycle ends with exactly
//! one `final` status event, synthesized if the executor never sent one.

use std::collections::HashMap;
use std::sync::Arc;

use a2a_rpc::transport::jsonrpc::methods;
use a2a_rpc::{
    A2AError, A2AResult, JsonRpcError, JsonRpcRequest, JsonRpcResponse, Message, RequestId, Task,
    TaskArtifactUpdateEvent, TaskEvent, TaskIdParams, TaskPushNotificationConfig,
    TaskQueryParams, TaskSendParams, TaskState, TaskStatus, TaskStatusUpdateEvent, TaskUpdate,
};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::executor::{AgentExecutor, TaskContext, UpdateSink};
use crate::queue::StreamingQueue;
use crate::store::{self, PushNotificationStore, TaskStore};

/// Queue of JSON-RPC envelopes making up one SSE response.
pub type ResponseQueue = StreamingQueue<JsonRpcResponse>;

/// What the transport should send back.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// A single JSON body.
    Response(JsonRpcResponse),

    /// An event stream; the queue is closed when the cycle ends.
    Stream(ResponseQueue),
}

/// Tokens of in-flight cycles, keyed by task id and then by cycle.
#[derive(Debug, Clone, Default)]
struct CancellationRegistry {
    tokens: Arc<RwLock<HashMap<String, HashMap<Uuid, CancellationToken>>>>,
}

impl CancellationRegistry {
    async fn register(&self, task_id: &str) -> (Uuid, CancellationToken) {
        let cycle = Uuid::new_v4();
        let token = CancellationToken::new();
        self.tokens
            .write()
            .await
            .entry(task_id.to_string())
            .or_default()
            .insert(cycle, token.clone());
        (cycle, token)
    }

    async fn release(&self, task_id: &str, cycle: Uuid) {
        let mut tokens = self.tokens.write().await;
        if let Some(cycles) = tokens.get_mut(task_id) {
            cycles.remove(&cycle);
            if cycles.is_empty() {
                tokens.remove(task_id);
            }
        }
    }

    /// Trigger every in-flight cycle of the task. Returns how many there were.
    async fn cancel(&self, task_id: &str) -> usize {
        match self.tokens.read().await.get(task_id) {
            Some(cycles) => {
                cycles.values().for_each(CancellationToken::cancel);
                cycles.len()
            }
            None => 0,
        }
    }
}

/// Closes the sink even if the executor panics, so the driver never waits
/// on an abandoned queue.
struct CloseOnDrop(UpdateSink);

impl Drop for CloseOnDrop {
    fn drop(&mut self) {
        self.0.close();
    }
}

/// Routes requests to the store and executor.
#[derive(Clone)]
pub struct Dispatcher {
    store: Arc<dyn TaskStore>,
    executor: Arc<dyn AgentExecutor>,
    push_store: Option<Arc<dyn PushNotificationStore>>,
    cancellations: CancellationRegistry,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("push_notifications", &self.push_store.is_some())
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    pub fn new(store: Arc<dyn TaskStore>, executor: Arc<dyn AgentExecutor>) -> Self {
        Self {
            store,
            executor,
            push_store: None,
            cancellations: CancellationRegistry::default(),
        }
    }

    /// Enable `tasks/pushNotificationConfig/*` backed by `push_store`.
    pub fn with_push_store(mut self, push_store: Arc<dyn PushNotificationStore>) -> Self {
        self.push_store = Some(push_store);
        self
    }

    pub fn store(&self) -> &Arc<dyn TaskStore> {
        &self.store
    }

    /// Route one JSON-RPC request.
    pub async fn dispatch(&self, request: JsonRpcRequest) -> DispatchOutcome {
        let id = request.id.clone();
        if let Err(error) = request.validate() {
            return DispatchOutcome::Response(JsonRpcResponse::error(id, error));
        }

        tracing::debug!(method = %request.method, request_id = %id, "Dispatching");

        let params = request.params;
        let response = match request.method.as_str() {
            methods::SEND_TASK | methods::SEND_MESSAGE => {
                let result = match parse_params(params) {
                    Ok(params) => self.send_task(params).await,
                    Err(e) => Err(e),
                };
                JsonRpcResponse::from_result(id, result)
            }
            methods::SEND_TASK_SUBSCRIBE | methods::SEND_MESSAGE_STREAM => {
                let result = match parse_params(params) {
                    Ok(params) => self.send_task_subscribe(id.clone(), params).await,
                    Err(e) => Err(e),
                };
                return stream_outcome(id, result);
            }
            methods::RESUBSCRIBE_TASK => {
                let result = match parse_params(params) {
                    Ok(params) => self.resubscribe_task(id.clone(), params).await,
                    Err(e) => Err(e),
                };
                return stream_outcome(id, result);
            }
            methods::GET_TASK => {
                let result = match parse_params(params) {
                    Ok(params) => self.get_task(params).await,
                    Err(e) => Err(e),
                };
                JsonRpcResponse::from_result(id, result)
            }
            methods::CANCEL_TASK => {
                let result = match parse_params(params) {
                    Ok(params) => self.cancel_task(params).await,
                    Err(e) => Err(e),
                };
                JsonRpcResponse::from_result(id, result)
            }
            methods::SET_PUSH_NOTIFICATION_CONFIG | methods::SET_PUSH_NOTIFICATION => {
                let result = match parse_params(params) {
                    Ok(params) => self.set_push_notification(params).await,
                    Err(e) => Err(e),
                };
                JsonRpcResponse::from_result(id, result)
            }
            methods::GET_PUSH_NOTIFICATION_CONFIG | methods::GET_PUSH_NOTIFICATION => {
                let result = match parse_params(params) {
                    Ok(params) => self.get_push_notification(params).await,
                    Err(e) => Err(e),
                };
                JsonRpcResponse::from_result(id, result)
            }
            other => {
                tracing::warn!(method = %other, "Unknown method");
                JsonRpcResponse::error(id, JsonRpcError::method_not_found(other))
            }
        };

        DispatchOutcome::Response(response)
    }

    // ── Operations ───────────────────────────────────────────

    /// `tasks/send`: run the executor to completion.
    pub async fn send_task(&self, params: TaskSendParams) -> A2AResult<Task> {
        let history_length = params.history_length;
        let task = self.resolve_task(&params).await?;
        let task_id = task.id.clone();

        let (cycle, cancellation) = self.cancellations.register(&task_id).await;
        let ctx = TaskContext {
            task: task.clone(),
            user_message: params.message,
            cancellation,
        };
        let result = self.executor.execute_task(ctx).await;
        self.cancellations.release(&task_id, cycle).await;

        match result {
            Ok(task) => {
                self.store.save(&task).await?;
                tracing::info!(task_id = %task.id, state = %task.state(), "Task send finished");
                Ok(task.with_history_limit(history_length))
            }
            Err(e) => {
                tracing::error!(task_id = %task_id, error = %e, "Executor failed");
                let mut failed = task;
                failed.apply_status(failure_status(&e));
                if let Err(save_err) = self.store.save(&failed).await {
                    tracing::error!(task_id = %task_id, error = %save_err, "Failed to persist failed task");
                }
                Err(e)
            }
        }
    }

    /// `tasks/sendSubscribe`: start a streaming cycle.
    pub async fn send_task_subscribe(
        &self,
        request_id: RequestId,
        params: TaskSendParams,
    ) -> A2AResult<ResponseQueue> {
        let task = self.resolve_task(&params).await?;
        let task_id = task.id.clone();

        let (cycle, cancellation) = self.cancellations.register(&task_id).await;
        let ctx = TaskContext {
            task: task.clone(),
            user_message: params.message,
            cancellation,
        };

        let updates = UpdateSink::new();
        let executor = Arc::clone(&self.executor);
        let producer = updates.clone();
        let span = tracing::info_span!("a2a_cycle", task_id = %task_id);
        let handle = tokio::spawn(
            async move {
                let _close = CloseOnDrop(producer.clone());
                executor.execute(ctx, producer).await
            }
            .instrument(span.clone()),
        );

        let out = ResponseQueue::new();
        let driver = CycleDriver {
            store: Arc::clone(&self.store),
            task,
            request_id,
            out: out.clone(),
            mode: CycleMode::Send,
        };
        let registry = self.cancellations.clone();
        tokio::spawn(
            async move {
                driver.run(updates, handle).await;
                registry.release(&task_id, cycle).await;
            }
            .instrument(span),
        );

        Ok(out)
    }

    /// `tasks/get`: pure store read.
    pub async fn get_task(&self, params: TaskQueryParams) -> A2AResult<Task> {
        let task = self.load(&params.id).await?;
        Ok(task.with_history_limit(params.history_length))
    }

    /// `tasks/cancel`: delegate to the executor and persist its answer.
    ///
    /// Any in-flight cycle for the task has its cancellation token
    /// triggered; its stream is left open.
    pub async fn cancel_task(&self, params: TaskIdParams) -> A2AResult<Task> {
        let task = self.load(&params.id).await?;
        let canceled = self.executor.cancel(task).await?;
        self.store.save(&canceled).await?;

        let signalled = self.cancellations.cancel(&params.id).await;
        tracing::info!(task_id = %params.id, in_flight = signalled, "Task canceled");
        Ok(canceled)
    }

    /// `tasks/resubscribe`: re-enter the executor's resubscription hook.
    ///
    /// Resubscription is a read-only view: updates are forwarded but not
    /// written back to the store.
    pub async fn resubscribe_task(
        &self,
        request_id: RequestId,
        params: TaskQueryParams,
    ) -> A2AResult<ResponseQueue> {
        let task = self.load(&params.id).await?;
        let task = task.with_history_limit(params.history_length);

        let updates = UpdateSink::new();
        let executor = Arc::clone(&self.executor);
        let producer = updates.clone();
        let snapshot = task.clone();
        let span = tracing::info_span!("a2a_resubscribe", task_id = %task.id);
        let handle = tokio::spawn(
            async move {
                let _close = CloseOnDrop(producer.clone());
                executor.resubscribe(snapshot, producer).await
            }
            .instrument(span.clone()),
        );

        let out = ResponseQueue::new();
        let driver = CycleDriver {
            store: Arc::clone(&self.store),
            task,
            request_id,
            out: out.clone(),
            mode: CycleMode::Resubscribe,
        };
        tokio::spawn(driver.run(updates, handle).instrument(span));

        Ok(out)
    }

    /// `tasks/pushNotificationConfig/set`.
    pub async fn set_push_notification(
        &self,
        config: TaskPushNotificationConfig,
    ) -> A2AResult<TaskPushNotificationConfig> {
        let push_store = self.push_store()?;
        self.load(&config.id).await?;
        push_store
            .set(&config.id, config.push_notification_config.clone())
            .await?;
        tracing::debug!(task_id = %config.id, url = %config.push_notification_config.url, "Push config stored");
        Ok(config)
    }

    /// `tasks/pushNotificationConfig/get`. `None` when nothing was set.
    pub async fn get_push_notification(
        &self,
        params: TaskIdParams,
    ) -> A2AResult<Option<TaskPushNotificationConfig>> {
        let push_store = self.push_store()?;
        Ok(push_store
            .get(&params.id)
            .await?
            .map(|config| store::task_push_config(&params.id, config)))
    }

    // ── Internals ────────────────────────────────────────────

    fn push_store(&self) -> A2AResult<&Arc<dyn PushNotificationStore>> {
        self.push_store.as_ref().ok_or_else(|| {
            A2AError::UnsupportedOperation("push notifications are not configured".into())
        })
    }

    async fn load(&self, task_id: &str) -> A2AResult<Task> {
        self.store
            .get(task_id)
            .await?
            .ok_or_else(|| A2AError::TaskNotFound(task_id.to_string()))
    }

    /// Look up or create the task a send refers to, record the inbound
    /// message, and save it before the executor runs.
    async fn resolve_task(&self, params: &TaskSendParams) -> A2AResult<Task> {
        let task = match self.store.get(&params.id).await? {
            None => {
                let mut task = Task::new(&params.id);
                task.session_id = params.session_id.clone();
                task.metadata = params.metadata.clone();
                task.add_message(params.message.clone());
                tracing::info!(task_id = %task.id, "Task created");
                task
            }
            Some(mut task) => {
                task.add_message(params.message.clone());
                match task.state() {
                    state if state.is_terminal() => {
                        tracing::warn!(task_id = %task.id, %state, "Reopening terminal task");
                        task.apply_status(TaskStatus::new(TaskState::Submitted));
                    }
                    TaskState::InputRequired => {
                        task.apply_status(TaskStatus::new(TaskState::Working));
                    }
                    TaskState::Working => {
                        tracing::warn!(task_id = %task.id, "Message sent to a task that is still working");
                    }
                    _ => {}
                }
                if task.session_id.is_none() {
                    task.session_id = params.session_id.clone();
                }
                task
            }
        };

        if let (Some(config), Some(push_store)) = (&params.push_notification, &self.push_store) {
            push_store.set(&task.id, config.clone()).await?;
        }

        self.store.save(&task).await?;
        Ok(task)
    }
}

fn parse_params<P: DeserializeOwned>(params: Option<Value>) -> A2AResult<P> {
    let params = params.ok_or_else(|| A2AError::InvalidParams("missing params".into()))?;
    serde_json::from_value(params).map_err(|e| A2AError::InvalidParams(e.to_string()))
}

fn stream_outcome(id: RequestId, result: A2AResult<ResponseQueue>) -> DispatchOutcome {
    match result {
        Ok(queue) => DispatchOutcome::Stream(queue),
        Err(e) => DispatchOutcome::Response(JsonRpcResponse::error(id, e.into())),
    }
}

fn failure_status(error: &A2AError) -> TaskStatus {
    TaskStatus::with_message(TaskState::Failed, Message::agent_text(error.to_string()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CycleMode {
    /// Updates are applied to the task and saved.
    Send,
    /// Updates are forwarded as-is.
    Resubscribe,
}

/// Drains one executor's updates into the response queue.
struct CycleDriver {
    store: Arc<dyn TaskStore>,
    task: Task,
    request_id: RequestId,
    out: ResponseQueue,
    mode: CycleMode,
}

impl CycleDriver {
    async fn run(mut self, updates: UpdateSink, handle: JoinHandle<A2AResult<()>>) {
        let mut finished = false;

        while let Some(update) = updates.next().await {
            let event = self.event_for(update);
            finished = event.is_final();

            if self.mode == CycleMode::Send {
                if let Err(e) = self.store.save(&self.task).await {
                    tracing::error!(task_id = %self.task.id, error = %e, "Failed to persist task");
                    updates.close();
                    self.emit_error(e);
                    self.out.close();
                    return;
                }
            }

            if !self.emit(event) {
                tracing::info!(task_id = %self.task.id, "Subscriber went away, stopping cycle");
                updates.close();
                return;
            }

            if finished {
                // The final event ends the response even if the executor keeps running.
                self.out.close();
                updates.close();
                break;
            }
        }

        let mut dropped = 0usize;
        while updates.next().await.is_some() {
            dropped += 1;
        }
        if dropped > 0 {
            tracing::warn!(task_id = %self.task.id, dropped, "Dropping updates after final event");
        }

        let outcome = match handle.await {
            Ok(result) => result,
            Err(join_error) => Err(A2AError::Internal(format!("executor aborted: {join_error}"))),
        };

        match outcome {
            Ok(()) if !finished => self.finish().await,
            Ok(()) => {}
            Err(e) if finished => {
                tracing::warn!(task_id = %self.task.id, error = %e, "Executor failed after final event");
            }
            Err(e) => self.fail(e).await,
        }

        self.out.close();
    }

    /// Turn an executor update into a wire event, applying it to the task
    /// when this cycle owns it.
    fn event_for(&mut self, update: TaskUpdate) -> TaskEvent {
        let id = self.task.id.clone();
        match update {
            TaskUpdate::Status(mut status) => {
                if status.timestamp.is_none() {
                    status.timestamp = Some(Utc::now());
                }
                let is_final = status.state.ends_cycle();
                if self.mode == CycleMode::Send {
                    self.task.apply_status(status.clone());
                }
                TaskEvent::Status(TaskStatusUpdateEvent {
                    id,
                    status,
                    is_final,
                    metadata: None,
                })
            }
            TaskUpdate::Artifact(artifact) => {
                if self.mode == CycleMode::Send {
                    self.task.apply_artifact(artifact.clone());
                }
                TaskEvent::Artifact(TaskArtifactUpdateEvent {
                    id,
                    artifact,
                    metadata: None,
                })
            }
        }
    }

    /// The executor ended without a final status: close the cycle.
    async fn finish(&mut self) {
        let status = match self.mode {
            CycleMode::Send => {
                self.task
                    .apply_status(TaskStatus::new(TaskState::Completed));
                if let Err(e) = self.store.save(&self.task).await {
                    tracing::error!(task_id = %self.task.id, error = %e, "Failed to persist task");
                    self.emit_error(e);
                    return;
                }
                self.task.status.clone()
            }
            CycleMode::Resubscribe => self.task.status.clone(),
        };

        tracing::debug!(task_id = %self.task.id, state = %status.state, "Synthesizing final event");
        self.emit(TaskEvent::final_status(self.task.id.clone(), status));
    }

    /// Executor error: persist `failed`, then report the error as the last
    /// frame of the stream.
    async fn fail(&mut self, error: A2AError) {
        tracing::error!(task_id = %self.task.id, error = %error, "Executor failed during stream");
        if self.mode == CycleMode::Send {
            self.task.apply_status(failure_status(&error));
            if let Err(e) = self.store.save(&self.task).await {
                tracing::error!(task_id = %self.task.id, error = %e, "Failed to persist failed task");
            }
        }
        self.emit_error(error);
    }

    fn emit(&self, event: TaskEvent) -> bool {
        self.out.push(JsonRpcResponse::from_result(
            self.request_id.clone(),
            Ok::<_, A2AError>(event),
        ))
    }

    fn emit_error(&self, error: A2AError) {
        self.out
            .push(JsonRpcResponse::error(self.request_id.clone(), error.into()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::EchoExecutor;
    use crate::store::{InMemoryPushNotificationStore, InMemoryTaskStore};
    use a2a_rpc::transport::jsonrpc::codes;
    use a2a_rpc::Artifact;
    use async_trait::async_trait;
    use futures::StreamExt;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::time::Duration;
    use tokio::sync::{oneshot, Notify};

    /// Emits whatever updates it was built with, then returns `result`.
    struct Scripted {
        updates: Vec<TaskUpdate>,
        fail_with: Option<fn() -> A2AError>,
    }

    impl Scripted {
        fn new(updates: Vec<TaskUpdate>) -> Self {
            Self {
                updates,
                fail_with: None,
            }
        }
    }

    #[async_trait]
    impl AgentExecutor for Scripted {
        async fn execute(&self, _ctx: TaskContext, updates: UpdateSink) -> A2AResult<()> {
            for update in &self.updates {
                updates.push(update.clone());
            }
            match self.fail_with {
                Some(error) => Err(error()),
                None => Ok(()),
            }
        }
    }

    /// Asked to "wait", holds until canceled and then reports it. Anything
    /// else is acknowledged with `working` straight away.
    struct Patient;

    #[async_trait]
    impl AgentExecutor for Patient {
        async fn execute(&self, ctx: TaskContext, updates: UpdateSink) -> A2AResult<()> {
            updates.push(TaskUpdate::state(TaskState::Working));
            if ctx.user_message.text_content() != "wait" {
                return Ok(());
            }
            ctx.cancellation.cancelled().await;
            updates.push(TaskUpdate::state(TaskState::Canceled));
            Ok(())
        }
    }

    fn dispatcher(executor: impl AgentExecutor) -> (Dispatcher, Arc<InMemoryTaskStore>) {
        let store = Arc::new(InMemoryTaskStore::new());
        (Dispatcher::new(store.clone(), Arc::new(executor)), store)
    }

    fn send_params(id: &str, text: &str) -> TaskSendParams {
        TaskSendParams::for_task(id, Message::user_text(text))
    }

    fn request(method: &str, params: Value) -> JsonRpcRequest {
        JsonRpcRequest {
            jsonrpc: "2.0".into(),
            method: method.into(),
            params: Some(params),
            id: RequestId::Number(1),
        }
    }

    async fn collect(queue: ResponseQueue) -> Vec<JsonRpcResponse> {
        let mut out = Vec::new();
        while let Some(response) = queue.next().await {
            out.push(response);
        }
        out
    }

    fn events(responses: &[JsonRpcResponse]) -> Vec<TaskEvent> {
        responses
            .iter()
            .map(|r| serde_json::from_value(r.result.clone().unwrap()).unwrap())
            .collect()
    }

    async fn respond(dispatcher: &Dispatcher, request: JsonRpcRequest) -> JsonRpcResponse {
        match dispatcher.dispatch(request).await {
            DispatchOutcome::Response(response) => response,
            DispatchOutcome::Stream(_) => panic!("expected a JSON response"),
        }
    }

    #[tokio::test]
    async fn test_send_then_get_agree() {
        let (dispatcher, _) = dispatcher(EchoExecutor);

        let sent = dispatcher.send_task(send_params("t1", "hi")).await.unwrap();
        assert_eq!(sent.state(), TaskState::Completed);

        let got = dispatcher
            .get_task(TaskQueryParams::new("t1"))
            .await
            .unwrap();
        assert_eq!(got, sent);
        assert_eq!(got.history.len(), 2);
    }

    #[tokio::test]
    async fn test_history_length_bounds_result() {
        let (dispatcher, _) = dispatcher(EchoExecutor);
        dispatcher.send_task(send_params("t1", "one")).await.unwrap();
        dispatcher.send_task(send_params("t1", "two")).await.unwrap();

        let got = dispatcher
            .get_task(TaskQueryParams {
                history_length: Some(1),
                ..TaskQueryParams::new("t1")
            })
            .await
            .unwrap();
        assert_eq!(got.history.len(), 1);
        assert_eq!(got.history[0].text_content(), "two");

        let full = dispatcher.get_task(TaskQueryParams::new("t1")).await.unwrap();
        assert_eq!(full.history.len(), 4);
    }

    #[tokio::test]
    async fn test_get_unknown_task() {
        let (dispatcher, _) = dispatcher(EchoExecutor);
        let response = respond(&dispatcher, request(methods::GET_TASK, json!({"id": "nope"}))).await;
        assert_eq!(response.error.unwrap().code, codes::TASK_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_send_failure_marks_task_failed() {
        let (dispatcher, store) = dispatcher(Scripted {
            updates: vec![TaskUpdate::state(TaskState::Working)],
            fail_with: Some(|| A2AError::InvalidTaskState("no".into())),
        });

        let err = dispatcher.send_task(send_params("t1", "hi")).await.unwrap_err();
        assert_eq!(err.code(), codes::INVALID_TASK_STATE);

        let stored = store.get("t1").await.unwrap().unwrap();
        assert_eq!(stored.state(), TaskState::Failed);
    }

    #[tokio::test]
    async fn test_send_reopens_terminal_task() {
        let (dispatcher, store) = dispatcher(Scripted::new(vec![]));
        let mut done = Task::new("t1");
        done.apply_status(TaskStatus::new(TaskState::Completed));
        store.save(&done).await.unwrap();

        let task = dispatcher.send_task(send_params("t1", "again")).await.unwrap();
        assert_eq!(task.state(), TaskState::Submitted);
        assert_eq!(task.history.len(), 1);
    }

    #[tokio::test]
    async fn test_send_resumes_input_required_task() {
        let (dispatcher, store) = dispatcher(Scripted::new(vec![]));
        let mut waiting = Task::new("t1");
        waiting.apply_status(TaskStatus::new(TaskState::InputRequired));
        store.save(&waiting).await.unwrap();

        let task = dispatcher.send_task(send_params("t1", "answer")).await.unwrap();
        assert_eq!(task.state(), TaskState::Working);
    }

    #[tokio::test]
    async fn test_stream_single_final_event() {
        let (dispatcher, store) = dispatcher(EchoExecutor);
        let queue = dispatcher
            .send_task_subscribe(RequestId::Number(7), send_params("t1", "hi"))
            .await
            .unwrap();

        let responses = collect(queue).await;
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].id, RequestId::Number(7));

        let events = events(&responses);
        assert!(events[0].is_final());
        assert_eq!(
            store.get("t1").await.unwrap().unwrap().state(),
            TaskState::Completed
        );
    }

    #[tokio::test]
    async fn test_stream_synthesizes_final_for_artifact_only_executor() {
        let (dispatcher, store) = dispatcher(Scripted::new(vec![
            TaskUpdate::artifact(Artifact::chunk(0, "a", false, false)),
            TaskUpdate::artifact(Artifact::chunk(0, "b", true, true)),
        ]));
        let queue = dispatcher
            .send_task_subscribe(RequestId::Null, send_params("t1", "hi"))
            .await
            .unwrap();

        let events = events(&collect(queue).await);
        assert_eq!(events.len(), 3);
        assert_eq!(events.iter().filter(|e| e.is_final()).count(), 1);
        match events.last().unwrap() {
            TaskEvent::Status(event) => {
                assert!(event.is_final);
                assert_eq!(event.status.state, TaskState::Completed);
            }
            other => panic!("expected a status event, got {other:?}"),
        }

        let stored = store.get("t1").await.unwrap().unwrap();
        assert_eq!(stored.state(), TaskState::Completed);
        assert_eq!(stored.artifacts[0].text_content(), "ab");
    }

    #[tokio::test]
    async fn test_stream_input_required_is_final() {
        let (dispatcher, _) = dispatcher(Scripted::new(vec![
            TaskUpdate::state(TaskState::Working),
            TaskUpdate::status(TaskState::InputRequired, Message::agent_text("which one?")),
            TaskUpdate::state(TaskState::Completed),
        ]));
        let queue = dispatcher
            .send_task_subscribe(RequestId::Null, send_params("t1", "hi"))
            .await
            .unwrap();

        let events = events(&collect(queue).await);
        assert_eq!(events.len(), 2);
        assert!(events[1].is_final());
    }

    #[tokio::test]
    async fn test_stream_executor_error_ends_with_error_frame() {
        let (dispatcher, store) = dispatcher(Scripted {
            updates: vec![TaskUpdate::state(TaskState::Working)],
            fail_with: Some(|| A2AError::Internal("boom".into())),
        });
        let queue = dispatcher
            .send_task_subscribe(RequestId::Null, send_params("t1", "hi"))
            .await
            .unwrap();

        let responses = collect(queue).await;
        assert_eq!(responses.len(), 2);
        assert!(!responses[0].is_error());
        assert_eq!(
            responses[1].error.as_ref().unwrap().code,
            codes::INTERNAL_ERROR
        );
        assert_eq!(
            store.get("t1").await.unwrap().unwrap().state(),
            TaskState::Failed
        );
    }

    #[tokio::test]
    async fn test_cancel_completed_task_is_rejected() {
        let (dispatcher, store) = dispatcher(EchoExecutor);
        dispatcher.send_task(send_params("t1", "hi")).await.unwrap();
        let before = store.get("t1").await.unwrap();

        let response = respond(&dispatcher, request(methods::CANCEL_TASK, json!({"id": "t1"}))).await;
        assert_eq!(response.error.unwrap().code, codes::TASK_NOT_CANCELABLE);
        assert_eq!(store.get("t1").await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_cancel_signals_in_flight_cycle() {
        let (dispatcher, store) = dispatcher(Patient);
        let queue = dispatcher
            .send_task_subscribe(RequestId::Null, send_params("t1", "wait"))
            .await
            .unwrap();

        let first = queue.next().await.unwrap();
        assert!(!events(&[first])[0].is_final());

        let canceled = dispatcher
            .cancel_task(TaskIdParams {
                id: "t1".into(),
                metadata: None,
            })
            .await
            .unwrap();
        assert_eq!(canceled.state(), TaskState::Canceled);

        let rest = events(&collect(queue).await);
        assert_eq!(rest.len(), 1);
        assert!(rest[0].is_final());
        assert_eq!(
            store.get("t1").await.unwrap().unwrap().state(),
            TaskState::Canceled
        );
    }

    #[tokio::test]
    async fn test_cancel_reaches_stream_after_overlapping_send() {
        let (dispatcher, store) = dispatcher(Patient);
        let queue = dispatcher
            .send_task_subscribe(RequestId::Null, send_params("t1", "wait"))
            .await
            .unwrap();
        let first = queue.next().await.unwrap();
        assert!(!events(&[first])[0].is_final());

        // Registers and releases its own cycle on the same id.
        let quick = dispatcher.send_task(send_params("t1", "quick")).await.unwrap();
        assert_eq!(quick.state(), TaskState::Working);

        dispatcher
            .cancel_task(TaskIdParams {
                id: "t1".into(),
                metadata: None,
            })
            .await
            .unwrap();

        let rest = tokio::time::timeout(Duration::from_secs(5), collect(queue))
            .await
            .expect("stream should end once canceled");
        let rest = events(&rest);
        assert_eq!(rest.len(), 1);
        match &rest[0] {
            TaskEvent::Status(event) => {
                assert!(event.is_final);
                assert_eq!(event.status.state, TaskState::Canceled);
            }
            other => panic!("expected a status event, got {other:?}"),
        }
        assert_eq!(
            store.get("t1").await.unwrap().unwrap().state(),
            TaskState::Canceled
        );
    }

    /// Asks for input, then keeps running until canceled.
    struct AsksThenWaits;

    #[async_trait]
    impl AgentExecutor for AsksThenWaits {
        async fn execute(&self, ctx: TaskContext, updates: UpdateSink) -> A2AResult<()> {
            updates.push(TaskUpdate::status(
                TaskState::InputRequired,
                Message::agent_text("which?"),
            ));
            ctx.cancellation.cancelled().await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_final_event_closes_stream_while_executor_runs() {
        let (dispatcher, store) = dispatcher(AsksThenWaits);
        let queue = dispatcher
            .send_task_subscribe(RequestId::Null, send_params("t1", "hi"))
            .await
            .unwrap();

        let responses = tokio::time::timeout(Duration::from_secs(2), collect(queue))
            .await
            .expect("stream should end at the final event");
        let events = events(&responses);
        assert_eq!(events.len(), 1);
        assert!(events[0].is_final());
        assert_eq!(
            store.get("t1").await.unwrap().unwrap().state(),
            TaskState::InputRequired
        );
    }

    /// Streams `working` once, then after `resume` keeps pushing until the
    /// sink refuses and reports whether it did.
    struct UntilGone {
        resume: Arc<Notify>,
        report: std::sync::Mutex<Option<oneshot::Sender<bool>>>,
    }

    #[async_trait]
    impl AgentExecutor for UntilGone {
        async fn execute(&self, _ctx: TaskContext, updates: UpdateSink) -> A2AResult<()> {
            updates.push(TaskUpdate::state(TaskState::Working));
            self.resume.notified().await;

            let mut refused = false;
            for _ in 0..1000 {
                if !updates.push(TaskUpdate::state(TaskState::Working)) {
                    refused = true;
                    break;
                }
                tokio::task::yield_now().await;
            }
            let report = self.report.lock().unwrap().take();
            if let Some(report) = report {
                let _ = report.send(refused);
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_disconnect_stops_cycle_and_keeps_snapshot() {
        let resume = Arc::new(Notify::new());
        let (report, refused) = oneshot::channel();
        let (dispatcher, store) = dispatcher(UntilGone {
            resume: resume.clone(),
            report: std::sync::Mutex::new(Some(report)),
        });

        let mut stream = dispatcher
            .send_task_subscribe(RequestId::Null, send_params("t1", "hi"))
            .await
            .unwrap()
            .into_stream();
        let first = stream.next().await.unwrap();
        assert!(!events(&[first])[0].is_final());

        drop(stream);
        resume.notify_one();

        assert!(refused.await.unwrap());
        tokio::time::sleep(Duration::from_millis(20)).await;

        // No synthesized completion, and the saved snapshot stays.
        let stored = store.get("t1").await.unwrap().unwrap();
        assert_eq!(stored.state(), TaskState::Working);
    }

    #[tokio::test]
    async fn test_resubscribe_unknown_task() {
        let (dispatcher, _) = dispatcher(EchoExecutor);
        let response = respond(
            &dispatcher,
            request(methods::RESUBSCRIBE_TASK, json!({"id": "nope"})),
        )
        .await;
        assert_eq!(response.error.unwrap().code, codes::TASK_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_resubscribe_unsupported_is_error_frame() {
        let (dispatcher, store) = dispatcher(Scripted::new(vec![]));
        store.save(&Task::new("t1")).await.unwrap();

        let queue = dispatcher
            .resubscribe_task(RequestId::Null, TaskQueryParams::new("t1"))
            .await
            .unwrap();
        let responses = collect(queue).await;
        assert_eq!(responses.len(), 1);
        assert_eq!(
            responses[0].error.as_ref().unwrap().code,
            codes::UNSUPPORTED_OPERATION
        );
    }

    #[tokio::test]
    async fn test_echo_resubscribe_does_not_write() {
        let (dispatcher, store) = dispatcher(EchoExecutor);
        dispatcher.send_task(send_params("t1", "hi")).await.unwrap();
        let before = store.get("t1").await.unwrap();

        let queue = dispatcher
            .resubscribe_task(RequestId::Null, TaskQueryParams::new("t1"))
            .await
            .unwrap();
        let events = events(&collect(queue).await);

        assert_eq!(events.len(), 1);
        assert!(events[0].is_final());
        assert_eq!(store.get("t1").await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_echo_resubscribe_working_task_is_snapshot_only() {
        let (dispatcher, store) = dispatcher(EchoExecutor);
        let mut working = Task::new("t1");
        working.apply_status(TaskStatus::new(TaskState::Working));
        store.save(&working).await.unwrap();

        let queue = dispatcher
            .resubscribe_task(RequestId::Null, TaskQueryParams::new("t1"))
            .await
            .unwrap();
        let events = events(&collect(queue).await);

        // The snapshot, then the closing event carrying the same status.
        assert_eq!(events.len(), 2);
        assert!(!events[0].is_final());
        match &events[1] {
            TaskEvent::Status(event) => {
                assert!(event.is_final);
                assert_eq!(event.status.state, TaskState::Working);
            }
            other => panic!("expected a status event, got {other:?}"),
        }
        assert_eq!(store.get("t1").await.unwrap(), Some(working));
    }

    #[tokio::test]
    async fn test_push_config_unsupported_without_store() {
        let (dispatcher, _) = dispatcher(EchoExecutor);
        let response = respond(
            &dispatcher,
            request(methods::GET_PUSH_NOTIFICATION_CONFIG, json!({"id": "t1"})),
        )
        .await;
        assert_eq!(response.error.unwrap().code, codes::UNSUPPORTED_OPERATION);
    }

    #[tokio::test]
    async fn test_push_config_roundtrip() {
        let (dispatcher, _) = dispatcher(EchoExecutor);
        let dispatcher = dispatcher.with_push_store(Arc::new(InMemoryPushNotificationStore::new()));
        let config = json!({
            "id": "t1",
            "pushNotificationConfig": {"url": "https://hooks.example.com/a2a"}
        });

        let missing = respond(
            &dispatcher,
            request(methods::SET_PUSH_NOTIFICATION_CONFIG, config.clone()),
        )
        .await;
        assert_eq!(missing.error.unwrap().code, codes::TASK_NOT_FOUND);

        dispatcher.send_task(send_params("t1", "hi")).await.unwrap();
        let set = respond(
            &dispatcher,
            request(methods::SET_PUSH_NOTIFICATION, config.clone()),
        )
        .await;
        assert_eq!(set.result, Some(config.clone()));

        let got = respond(
            &dispatcher,
            request(methods::GET_PUSH_NOTIFICATION_CONFIG, json!({"id": "t1"})),
        )
        .await;
        assert_eq!(got.result, Some(config));

        let none = respond(
            &dispatcher,
            request(methods::GET_PUSH_NOTIFICATION_CONFIG, json!({"id": "t2"})),
        )
        .await;
        assert_eq!(none.result, Some(Value::Null));
    }

    #[tokio::test]
    async fn test_envelope_errors() {
        let (dispatcher, _) = dispatcher(EchoExecutor);

        let mut bad_version = request(methods::GET_TASK, json!({"id": "t1"}));
        bad_version.jsonrpc = "1.0".into();
        assert_eq!(
            respond(&dispatcher, bad_version).await.error.unwrap().code,
            codes::INVALID_REQUEST
        );

        let unknown = respond(&dispatcher, request("tasks/explode", json!({}))).await;
        assert_eq!(unknown.error.unwrap().code, codes::METHOD_NOT_FOUND);

        let bad_params = respond(&dispatcher, request(methods::SEND_TASK, json!({"id": 3}))).await;
        assert_eq!(bad_params.error.unwrap().code, codes::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_message_send_alias_assigns_id() {
        let (dispatcher, store) = dispatcher(EchoExecutor);
        let response = respond(
            &dispatcher,
            request(
                methods::SEND_MESSAGE,
                json!({"message": {"role": "user", "parts": [{"type": "text", "text": "hi"}]}}),
            ),
        )
        .await;

        let task: Task = serde_json::from_value(response.result.unwrap()).unwrap();
        assert!(Uuid::parse_str(&task.id).is_ok());
        assert!(store.get(&task.id).await.unwrap().is_some());
    }

    /// Holds every execution until `n` of them are running.
    struct Gate(Arc<tokio::sync::Barrier>);

    #[async_trait]
    impl AgentExecutor for Gate {
        async fn execute(&self, ctx: TaskContext, updates: UpdateSink) -> A2AResult<()> {
            self.0.wait().await;
            updates.push(TaskUpdate::status(
                TaskState::Completed,
                Message::agent_text(ctx.user_message.text_content()),
            ));
            Ok(())
        }
    }

    /// Concurrent sends for one task id are not serialized: both read the
    /// task before either writes, and whichever save lands last wins. One
    /// reply is lost from the stored history.
    #[tokio::test]
    async fn test_concurrent_sends_last_write_wins() {
        let (dispatcher, store) = dispatcher(Gate(Arc::new(tokio::sync::Barrier::new(2))));

        let (a, b) = tokio::join!(
            dispatcher.send_task(send_params("t1", "from a")),
            dispatcher.send_task(send_params("t1", "from b")),
        );
        let (a, b) = (a.unwrap(), b.unwrap());

        let stored = store.get("t1").await.unwrap().unwrap();
        assert!(stored == a || stored == b);

        let replies = stored
            .history
            .iter()
            .filter(|m| m.role == a2a_rpc::Role::Agent)
            .count();
        assert_eq!(replies, 1);
    }
}
