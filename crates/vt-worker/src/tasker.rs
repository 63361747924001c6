//! Registry of running tasks.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::watch;
use tracing::{debug, warn};

use vt_models::{Status, TaskId};

use crate::error::{TaskError, TaskResult};
use crate::task::Task;

/// Tracks tasks for exactly as long as they run.
#[derive(Default)]
pub struct Tasker {
    tasks: RwLock<HashMap<TaskId, Arc<dyn Task>>>,
}

/// Removes a task from the registry when dropped.
struct Registration<'a> {
    tasker: &'a Tasker,
    id: TaskId,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        self.tasker
            .tasks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
        debug!(task_id = %self.id, "Task deregistered");
    }
}

impl Tasker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `task`, run it to completion, then deregister it.
    ///
    /// Fails with [`TaskError::DuplicateJob`] without running anything when a
    /// task with the same ID is already registered. Any failure from the run,
    /// including a panic, comes back as [`TaskError::Execution`].
    pub async fn add(&self, cancel: watch::Receiver<bool>, task: Arc<dyn Task>) -> TaskResult<()> {
        let id = task.id().ok_or(TaskError::NotValidated)?;
        let _registration = self.register(&id, Arc::clone(&task))?;

        let result = tokio::spawn(async move { task.start(cancel).await }).await;

        match result {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(TaskError::execution(id, e)),
            Err(join_err) => {
                let reason = if join_err.is_panic() {
                    "task panicked during execution".to_string()
                } else {
                    join_err.to_string()
                };
                warn!(task_id = %id, "{}", reason);
                Err(TaskError::execution(id, TaskError::Panicked(reason)))
            }
        }
    }

    fn register(&self, id: &TaskId, task: Arc<dyn Task>) -> TaskResult<Registration<'_>> {
        let mut tasks = self.tasks.write().unwrap_or_else(PoisonError::into_inner);
        if tasks.contains_key(id) {
            return Err(TaskError::DuplicateJob(id.clone()));
        }
        tasks.insert(id.clone(), task);
        Ok(Registration {
            tasker: self,
            id: id.clone(),
        })
    }

    /// Point-in-time snapshot of the running tasks.
    pub fn tasks(&self) -> Vec<Arc<dyn Task>> {
        self.tasks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    /// Status of every running task.
    pub fn statuses(&self) -> Vec<Status> {
        self.tasks().iter().map(|t| t.status()).collect()
    }

    pub fn contains(&self, id: &TaskId) -> bool {
        self.tasks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.tasks.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::sync::Notify;
    use vt_models::TaskType;

    /// Task that runs until released or cancelled.
    struct BlockingTask {
        id: TaskId,
        release: Arc<Notify>,
        fail: bool,
    }

    impl BlockingTask {
        fn new(id: &TaskId) -> (Arc<Self>, Arc<Notify>) {
            let release = Arc::new(Notify::new());
            let task = Arc::new(Self {
                id: id.clone(),
                release: Arc::clone(&release),
                fail: false,
            });
            (task, release)
        }
    }

    #[async_trait]
    impl Task for BlockingTask {
        fn id(&self) -> Option<TaskId> {
            Some(self.id.clone())
        }

        fn task_type(&self) -> TaskType {
            TaskType::SimpleVideo
        }

        fn validate_request(&mut self) -> TaskResult<TaskId> {
            Ok(self.id.clone())
        }

        async fn start(&self, mut cancel: watch::Receiver<bool>) -> TaskResult<()> {
            tokio::select! {
                _ = self.release.notified() => {}
                _ = cancel.changed() => {
                    return Err(TaskError::Media(vt_media::MediaError::Cancelled));
                }
            }
            if self.fail {
                return Err(TaskError::validation("boom"));
            }
            Ok(())
        }

        fn status(&self) -> Status {
            Status::new(Some(self.id.clone()), TaskType::SimpleVideo)
        }
    }

    struct PanickingTask(TaskId);

    #[async_trait]
    impl Task for PanickingTask {
        fn id(&self) -> Option<TaskId> {
            Some(self.0.clone())
        }

        fn task_type(&self) -> TaskType {
            TaskType::Vod
        }

        fn validate_request(&mut self) -> TaskResult<TaskId> {
            Ok(self.0.clone())
        }

        async fn start(&self, _cancel: watch::Receiver<bool>) -> TaskResult<()> {
            panic!("encoder exploded");
        }

        fn status(&self) -> Status {
            Status::new(Some(self.0.clone()), TaskType::Vod)
        }
    }

    async fn wait_registered(tasker: &Tasker, id: &TaskId) {
        for _ in 0..100 {
            if tasker.contains(id) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("task {} never registered", id);
    }

    #[tokio::test]
    async fn test_duplicate_rejected_while_running() {
        let tasker = Arc::new(Tasker::new());
        let id = TaskId::new();
        let (task, release) = BlockingTask::new(&id);
        let (_tx, rx) = watch::channel(false);

        let first = {
            let tasker = Arc::clone(&tasker);
            let rx = rx.clone();
            let task: Arc<dyn Task> = task.clone();
            tokio::spawn(async move { tasker.add(rx, task).await })
        };
        wait_registered(&tasker, &id).await;

        let (dup, _) = BlockingTask::new(&id);
        let err = tasker.add(rx, dup).await.unwrap_err();
        assert!(matches!(err, TaskError::DuplicateJob(ref d) if *d == id));
        assert_eq!(tasker.len(), 1);

        release.notify_one();
        first.await.unwrap().unwrap();
        assert!(tasker.is_empty());
    }

    #[tokio::test]
    async fn test_failure_deregisters_and_wraps() {
        let tasker = Tasker::new();
        let id = TaskId::new();
        let release = Arc::new(Notify::new());
        let task = Arc::new(BlockingTask {
            id: id.clone(),
            release: Arc::clone(&release),
            fail: true,
        });
        release.notify_one();

        let (_tx, rx) = watch::channel(false);
        let err = tasker.add(rx, task).await.unwrap_err();
        match err {
            TaskError::Execution { task_id, source } => {
                assert_eq!(task_id, id);
                assert!(matches!(*source, TaskError::Validation(_)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!tasker.contains(&id));
    }

    #[tokio::test]
    async fn test_panic_is_contained() {
        let tasker = Tasker::new();
        let id = TaskId::new();
        let (_tx, rx) = watch::channel(false);

        let err = tasker
            .add(rx, Arc::new(PanickingTask(id.clone())))
            .await
            .unwrap_err();
        assert!(matches!(err, TaskError::Execution { .. }));
        assert!(tasker.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_and_snapshot() {
        let tasker = Arc::new(Tasker::new());
        let id = TaskId::new();
        let (task, _release) = BlockingTask::new(&id);
        let (tx, rx) = watch::channel(false);

        let running = {
            let tasker = Arc::clone(&tasker);
            tokio::spawn(async move { tasker.add(rx, task).await })
        };
        wait_registered(&tasker, &id).await;

        let statuses = tasker.statuses();
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[0].task_id, Some(id.clone()));

        tx.send(true).unwrap();
        let err = running.await.unwrap().unwrap_err();
        assert!(err.is_cancelled());
        assert!(tasker.is_empty());
    }

    #[tokio::test]
    async fn test_unvalidated_task_rejected() {
        struct NoId;

        #[async_trait]
        impl Task for NoId {
            fn id(&self) -> Option<TaskId> {
                None
            }
            fn task_type(&self) -> TaskType {
                TaskType::Live
            }
            fn validate_request(&mut self) -> TaskResult<TaskId> {
                Err(TaskError::validation("nothing to validate"))
            }
            async fn start(&self, _cancel: watch::Receiver<bool>) -> TaskResult<()> {
                Ok(())
            }
            fn status(&self) -> Status {
                Status::new(None, TaskType::Live)
            }
        }

        let (_tx, rx) = watch::channel(false);
        let err = Tasker::new().add(rx, Arc::new(NoId)).await.unwrap_err();
        assert!(matches!(err, TaskError::NotValidated));
    }
}
