//! Client-side cache of the user's tasks.
//!
//! The server is the source of truth. Every mutation is sent first and the
//! local list is patched from the server's response, never from the input.

use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use tokio::sync::watch;
use tracing::debug;

use crate::api::ApiClient;
use crate::api::types::{Message, Task, TaskExecution, TaskId};

/// Observable state of the task list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskCollection {
    /// Tasks in server order; newly created tasks are prepended.
    pub tasks: Vec<Task>,
    /// True while `fetch_tasks` is in flight.
    pub loading: bool,
}

/// Resets `loading` when dropped, whichever way the fetch ended.
struct LoadingGuard<'a> {
    state: &'a watch::Sender<TaskCollection>,
}

impl<'a> LoadingGuard<'a> {
    fn start(state: &'a watch::Sender<TaskCollection>) -> Self {
        state.send_modify(|collection| collection.loading = true);
        Self { state }
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.state
            .send_modify(|collection| collection.loading = false);
    }
}

#[derive(Clone)]
pub struct TaskStore {
    client: ApiClient,
    state: Arc<watch::Sender<TaskCollection>>,
}

impl TaskStore {
    pub fn new(client: ApiClient) -> Self {
        let (state, _rx) = watch::channel(TaskCollection::default());
        Self {
            client,
            state: Arc::new(state),
        }
    }

    pub fn snapshot(&self) -> TaskCollection {
        self.state.borrow().clone()
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.state.borrow().tasks.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    pub fn subscribe(&self) -> watch::Receiver<TaskCollection> {
        self.state.subscribe()
    }

    /// Drops every cached task.
    pub fn reset(&self) {
        self.state.send_replace(TaskCollection::default());
    }

    /// Replaces the local list with the server's.
    ///
    /// # Errors
    /// Propagates any API failure; the local list is left as it was.
    pub async fn fetch_tasks(&self) -> Result<Vec<Task>> {
        let _loading = LoadingGuard::start(&self.state);
        let list = self.client.tasks().list().await?;
        self.state
            .send_modify(|collection| collection.tasks.clone_from(&list.tasks));
        Ok(list.tasks)
    }

    /// Fetches one task without touching the local list.
    ///
    /// # Errors
    /// Propagates any API failure.
    pub async fn get_task(&self, id: TaskId) -> Result<Task> {
        Ok(self.client.tasks().get(id).await?)
    }

    /// Creates a task and puts the server's record first.
    ///
    /// # Errors
    /// Propagates any API failure.
    pub async fn create_task<B>(&self, data: &B) -> Result<Task>
    where
        B: Serialize + ?Sized,
    {
        let task = self.client.tasks().create(data).await?;
        self.state
            .send_modify(|collection| collection.tasks.insert(0, task.clone()));
        Ok(task)
    }

    /// Updates a task and replaces the cached copy.
    ///
    /// A task that is not cached locally is not inserted.
    ///
    /// # Errors
    /// Propagates any API failure.
    pub async fn update_task<B>(&self, id: TaskId, data: &B) -> Result<Task>
    where
        B: Serialize + ?Sized,
    {
        let task = self.client.tasks().update(id, data).await?;
        self.replace_cached(id, &task);
        Ok(task)
    }

    /// Removes every cached entry with this id once the server confirms.
    ///
    /// # Errors
    /// Propagates any API failure.
    pub async fn delete_task(&self, id: TaskId) -> Result<Message> {
        let message = self.client.tasks().delete(id).await?;
        self.state.send_if_modified(|collection| {
            let before = collection.tasks.len();
            collection.tasks.retain(|task| task.id != id);
            collection.tasks.len() != before
        });
        Ok(message)
    }

    /// Flips the enabled flag; same cache rule as `update_task`.
    ///
    /// # Errors
    /// Propagates any API failure.
    pub async fn toggle_task(&self, id: TaskId) -> Result<Task> {
        let task = self.client.tasks().toggle(id).await?;
        self.replace_cached(id, &task);
        Ok(task)
    }

    /// Runs the task now and returns the server's answer. Can take minutes.
    ///
    /// # Errors
    /// Propagates any API failure, including the extended timeout.
    pub async fn test_task(&self, id: TaskId) -> Result<Message> {
        Ok(self.client.tasks().test(id).await?)
    }

    /// Recent execution records, newest first.
    ///
    /// # Errors
    /// Propagates any API failure.
    pub async fn executions(&self, id: TaskId, limit: u32) -> Result<Vec<TaskExecution>> {
        Ok(self.client.tasks().executions(id, limit).await?)
    }

    fn replace_cached(&self, id: TaskId, task: &Task) {
        let replaced = self.state.send_if_modified(|collection| {
            match collection.tasks.iter_mut().find(|cached| cached.id == id) {
                Some(cached) => {
                    cached.clone_from(task);
                    true
                }
                None => false,
            }
        });
        if !replaced {
            debug!(id, "task not cached locally, dropping server result");
        }
    }
}
