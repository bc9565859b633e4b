//! Task endpoints (`/tasks/*`).

use reqwest::Method;
use serde::Serialize;
use serde_json::{Value, json};

use super::types::{Message, Task, TaskExecution, TaskId, TaskList};
use super::{ApiClient, ApiResult, RequestOptions};

/// Typed wrappers over the `/tasks` resource.
pub struct TasksApi<'a> {
    client: &'a ApiClient,
}

impl<'a> TasksApi<'a> {
    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    pub async fn list(&self) -> ApiResult<TaskList> {
        self.client.get("/tasks", &RequestOptions::default()).await
    }

    pub async fn get(&self, id: TaskId) -> ApiResult<Task> {
        self.client
            .get(&format!("/tasks/{id}"), &RequestOptions::default())
            .await
    }

    pub async fn create<B>(&self, data: &B) -> ApiResult<Task>
    where
        B: Serialize + ?Sized,
    {
        self.client.post("/tasks", Some(data)).await
    }

    pub async fn update<B>(&self, id: TaskId, data: &B) -> ApiResult<Task>
    where
        B: Serialize + ?Sized,
    {
        self.client
            .request(
                Method::PUT,
                &format!("/tasks/{id}"),
                Some(data),
                &RequestOptions::default(),
            )
            .await
    }

    pub async fn delete(&self, id: TaskId) -> ApiResult<Message> {
        self.client
            .request(
                Method::DELETE,
                &format!("/tasks/{id}"),
                None::<&Value>,
                &RequestOptions::default(),
            )
            .await
    }

    /// Flips the task's enabled flag and returns the updated record.
    pub async fn toggle(&self, id: TaskId) -> ApiResult<Task> {
        self.client
            .post(&format!("/tasks/{id}/toggle"), None::<&Value>)
            .await
    }

    /// Runs the task now. The server answers only once the run finished,
    /// so this uses the extended test timeout.
    pub async fn test(&self, id: TaskId) -> ApiResult<Message> {
        let options = RequestOptions::with_timeout(self.client.test_timeout());
        self.client
            .request(
                Method::POST,
                &format!("/tasks/{id}/test"),
                Some(&json!({})),
                &options,
            )
            .await
    }

    /// Most recent runs first.
    pub async fn executions(&self, id: TaskId, limit: u32) -> ApiResult<Vec<TaskExecution>> {
        let options = RequestOptions {
            query: vec![("limit".to_string(), limit.to_string())],
            ..RequestOptions::default()
        };
        self.client
            .get(&format!("/tasks/{id}/executions"), &options)
            .await
    }
}
