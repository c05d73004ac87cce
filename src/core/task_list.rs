//! Single-owner task list service.
//!
//! One tokio task owns the [`TaskStore`] and the [`ArchiveScheduler`].
//! Every mutation arrives over an mpsc channel and is applied in order, so
//! list operations are atomic with respect to each other. Archive timers
//! fire into a second channel drained by the same loop, which gives them
//! the same ordering guarantee.
//!
//! After every change the owner publishes a fresh [`TaskSnapshot`] on a
//! `watch` channel for observers.

use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info};

use crate::domain::{Task, TaskId, TaskSnapshot};

use super::scheduler::{ArchiveFire, ArchiveScheduler};
use super::task_store::{TaskError, TaskStore};

/// Errors returned by the task list handle
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskListError {
    #[error(transparent)]
    Task(#[from] TaskError),

    #[error("Task list owner has stopped")]
    Closed,
}

enum Command {
    Add {
        text: String,
        reply: oneshot::Sender<Result<TaskId, TaskError>>,
    },
    AddMany {
        texts: Vec<String>,
        reply: oneshot::Sender<Vec<TaskId>>,
    },
    Toggle {
        id: TaskId,
        reply: oneshot::Sender<Option<bool>>,
    },
    ToggleAt {
        index: usize,
        reply: oneshot::Sender<Option<(TaskId, bool)>>,
    },
    Delete {
        id: TaskId,
        reply: oneshot::Sender<Option<Task>>,
    },
    DeleteAt {
        index: usize,
        reply: oneshot::Sender<Option<Task>>,
    },
    ClearHistory {
        reply: oneshot::Sender<usize>,
    },
    Snapshot {
        reply: oneshot::Sender<TaskSnapshot>,
    },
    PendingArchives {
        reply: oneshot::Sender<usize>,
    },
}

/// Cloneable handle to the task list owner
#[derive(Clone)]
pub struct TaskList {
    commands: mpsc::UnboundedSender<Command>,
    snapshots: watch::Receiver<TaskSnapshot>,
}

impl TaskList {
    /// Spawn the owner task. Must be called inside a tokio runtime.
    ///
    /// The owner stops once every handle has been dropped.
    pub fn spawn(grace_period: Duration) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (fire_tx, fire_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(TaskSnapshot::default());

        let owner = TaskListOwner {
            store: TaskStore::new(),
            scheduler: ArchiveScheduler::new(grace_period, fire_tx),
            commands: command_rx,
            fires: fire_rx,
            snapshots: snapshot_tx,
        };
        tokio::spawn(owner.run());

        Self {
            commands: command_tx,
            snapshots: snapshot_rx,
        }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, TaskListError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(build(reply))
            .map_err(|_| TaskListError::Closed)?;
        rx.await.map_err(|_| TaskListError::Closed)
    }

    /// Append a task. Fails with `InvalidInput` on blank text.
    pub async fn add_task(&self, text: impl Into<String>) -> Result<TaskId, TaskListError> {
        let text = text.into();
        Ok(self.request(|reply| Command::Add { text, reply }).await??)
    }

    /// Append several tasks in order as one operation. Blank entries are skipped.
    pub async fn add_tasks(&self, texts: Vec<String>) -> Result<Vec<TaskId>, TaskListError> {
        self.request(|reply| Command::AddMany { texts, reply }).await
    }

    /// Flip completion. Returns the new state, or `None` if `id` is not active.
    pub async fn toggle_task(&self, id: TaskId) -> Result<Option<bool>, TaskListError> {
        self.request(|reply| Command::Toggle { id, reply }).await
    }

    /// Flip completion of the active task at `index`
    pub async fn toggle_at(&self, index: usize) -> Result<Option<(TaskId, bool)>, TaskListError> {
        self.request(|reply| Command::ToggleAt { index, reply }).await
    }

    /// Remove an active task and cancel any pending archival for it
    pub async fn delete_task(&self, id: TaskId) -> Result<Option<Task>, TaskListError> {
        self.request(|reply| Command::Delete { id, reply }).await
    }

    /// Remove the active task at `index`
    pub async fn delete_at(&self, index: usize) -> Result<Option<Task>, TaskListError> {
        self.request(|reply| Command::DeleteAt { index, reply }).await
    }

    /// Empty the history list. Returns how many entries were removed.
    pub async fn clear_history(&self) -> Result<usize, TaskListError> {
        self.request(|reply| Command::ClearHistory { reply }).await
    }

    /// Current contents of both lists
    pub async fn snapshot(&self) -> Result<TaskSnapshot, TaskListError> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    /// Number of tasks waiting out their grace period
    pub async fn pending_archives(&self) -> Result<usize, TaskListError> {
        self.request(|reply| Command::PendingArchives { reply }).await
    }

    /// Observe published snapshots
    pub fn subscribe(&self) -> watch::Receiver<TaskSnapshot> {
        self.snapshots.clone()
    }
}

struct TaskListOwner {
    store: TaskStore,
    scheduler: ArchiveScheduler,
    commands: mpsc::UnboundedReceiver<Command>,
    fires: mpsc::UnboundedReceiver<ArchiveFire>,
    snapshots: watch::Sender<TaskSnapshot>,
}

impl TaskListOwner {
    async fn run(mut self) {
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },
                Some(fire) = self.fires.recv() => self.handle_fire(fire),
            }
        }

        self.scheduler.cancel_all();
        debug!("Task list owner stopped");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Add { text, reply } => {
                let result = self.store.add_task(&text);
                if let Ok(id) = result {
                    info!(task_id = %id, "Task added");
                    self.publish();
                }
                let _ = reply.send(result);
            }
            Command::AddMany { texts, reply } => {
                let ids: Vec<TaskId> = texts
                    .iter()
                    .filter_map(|text| self.store.add_task(text).ok())
                    .collect();
                if !ids.is_empty() {
                    info!(count = ids.len(), "Tasks added");
                    self.publish();
                }
                let _ = reply.send(ids);
            }
            Command::Toggle { id, reply } => {
                let state = self.toggle(id);
                let _ = reply.send(state);
            }
            Command::ToggleAt { index, reply } => {
                let result = self
                    .store
                    .id_at(index)
                    .and_then(|id| self.toggle(id).map(|completed| (id, completed)));
                let _ = reply.send(result);
            }
            Command::Delete { id, reply } => {
                let (removed, signal) = self.store.delete_task(id);
                self.scheduler.apply(signal);
                if removed.is_some() {
                    info!(task_id = %id, "Task deleted");
                    self.publish();
                }
                let _ = reply.send(removed);
            }
            Command::DeleteAt { index, reply } => {
                let removed = self.store.delete_at(index).map(|(task, signal)| {
                    self.scheduler.apply(signal);
                    task
                });
                if let Some(task) = &removed {
                    info!(task_id = %task.id, "Task deleted");
                    self.publish();
                }
                let _ = reply.send(removed);
            }
            Command::ClearHistory { reply } => {
                let count = self.store.clear_history();
                if count > 0 {
                    info!(count, "History cleared");
                    self.publish();
                }
                let _ = reply.send(count);
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.store.snapshot());
            }
            Command::PendingArchives { reply } => {
                let _ = reply.send(self.scheduler.pending_count());
            }
        }
    }

    fn toggle(&mut self, id: TaskId) -> Option<bool> {
        let signal = self.store.toggle_task(id)?;
        self.scheduler.apply(signal);
        self.publish();
        self.store
            .active()
            .iter()
            .find(|t| t.id == id)
            .map(|t| t.completed)
    }

    fn handle_fire(&mut self, fire: ArchiveFire) {
        if !self.scheduler.take_fired(fire) {
            return;
        }
        if self.store.archive_if_still_completed(fire.task_id) {
            info!(task_id = %fire.task_id, "Task archived");
            self.publish();
        } else {
            debug!(task_id = %fire.task_id, "Archive skipped, task no longer completed");
        }
    }

    fn publish(&self) {
        self.snapshots.send_replace(self.store.snapshot());
    }
}
