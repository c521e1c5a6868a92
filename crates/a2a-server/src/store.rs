//! Task snapshot persistence.
//!
//! A store is a plain keyed upsert: `save` overwrites whatever was there,
//! last write wins. The dispatcher serializes writes within one streaming
//! cycle but does not lock a task id across requests.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use a2a_rpc::{A2AError, A2AResult, PushNotificationConfig, Task, TaskPushNotificationConfig};
use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Get/save task snapshots by id.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Look up a task. A miss is `Ok(None)`, not an error.
    async fn get(&self, id: &str) -> A2AResult<Option<Task>>;

    /// Insert or replace the snapshot keyed by `task.id`.
    async fn save(&self, task: &Task) -> A2AResult<()>;
}

/// Volatile in-process store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTaskStore {
    tasks: Arc<RwLock<HashMap<String, Task>>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored tasks.
    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tasks.read().await.is_empty()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn get(&self, id: &str) -> A2AResult<Option<Task>> {
        Ok(self.tasks.read().await.get(id).cloned())
    }

    async fn save(&self, task: &Task) -> A2AResult<()> {
        self.tasks
            .write()
            .await
            .insert(task.id.clone(), task.clone());
        Ok(())
    }
}

/// One pretty-printed JSON file per task under a directory.
///
/// Writes go to a temporary sibling first and are renamed into place, so a
/// concurrent reader sees either the old or the new snapshot.
#[derive(Debug, Clone)]
pub struct FileTaskStore {
    dir: PathBuf,
}

impl FileTaskStore {
    /// Use `dir`, creating it if needed.
    pub fn open(dir: impl Into<PathBuf>) -> A2AResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &str) -> A2AResult<PathBuf> {
        if id.is_empty() || id.contains(['/', '\\']) || id.contains("..") {
            return Err(A2AError::InvalidParams(format!(
                "task id {id:?} cannot be used as a file name"
            )));
        }
        Ok(self.dir.join(format!("{id}.json")))
    }
}

#[async_trait]
impl TaskStore for FileTaskStore {
    async fn get(&self, id: &str) -> A2AResult<Option<Task>> {
        let path = self.path_for(id)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, task: &Task) -> A2AResult<()> {
        let path = self.path_for(&task.id)?;
        let tmp = self
            .dir
            .join(format!(".{}.{}.tmp", task.id, Uuid::new_v4().simple()));

        let bytes = serde_json::to_vec_pretty(task)?;
        tokio::fs::write(&tmp, &bytes).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        tracing::trace!(task_id = %task.id, path = %path.display(), "Task snapshot written");
        Ok(())
    }
}

/// Webhook configuration keyed by task id.
#[async_trait]
pub trait PushNotificationStore: Send + Sync {
    async fn set(&self, task_id: &str, config: PushNotificationConfig) -> A2AResult<()>;

    async fn get(&self, task_id: &str) -> A2AResult<Option<PushNotificationConfig>>;
}

/// Volatile in-process push-config store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPushNotificationStore {
    configs: Arc<RwLock<HashMap<String, PushNotificationConfig>>>,
}

impl InMemoryPushNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PushNotificationStore for InMemoryPushNotificationStore {
    async fn set(&self, task_id: &str, config: PushNotificationConfig) -> A2AResult<()> {
        self.configs
            .write()
            .await
            .insert(task_id.to_string(), config);
        Ok(())
    }

    async fn get(&self, task_id: &str) -> A2AResult<Option<PushNotificationConfig>> {
        Ok(self.configs.read().await.get(task_id).cloned())
    }
}

/// Convenience for building the wire shape returned by `get`.
pub(crate) fn task_push_config(
    task_id: &str,
    config: PushNotificationConfig,
) -> TaskPushNotificationConfig {
    TaskPushNotificationConfig {
        id: task_id.to_string(),
        push_notification_config: config,
    }
}
