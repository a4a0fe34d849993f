use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use uuid::Uuid;

use crate::client::error::StoreError;
use crate::models::{NewTaskRequest, Task, TaskStatus, UpdateTaskRequest};

/// Port to the authoritative task collection. The store client only ever
/// talks to this trait, so the backing medium (HTTP API, local file) is
/// swappable without touching the store logic.
#[async_trait]
pub trait RemoteTasks: Send + Sync {
    async fn list(&self) -> Result<Vec<Task>, StoreError>;
    async fn insert(&self, req: NewTaskRequest) -> Result<Task, StoreError>;
    async fn update(&self, id: &str, req: UpdateTaskRequest) -> Result<Task, StoreError>;
    async fn toggle_status(&self, id: &str) -> Result<Task, StoreError>;
    async fn delete(&self, id: &str) -> Result<(), StoreError>;
}

#[derive(Deserialize)]
struct TaskEnvelope {
    task: Task,
}

#[derive(Deserialize)]
struct TasksEnvelope {
    tasks: Vec<Task>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: String,
}

/// Backend talking to the task API over HTTP with a bearer session token.
pub struct HttpTasks {
    client: Client,
    base_url: String,
    token: String,
}

impl HttpTasks {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self, StoreError> {
        let client = Client::builder()
            .build()
            .map_err(|e| StoreError::Remote(format!("failed to build http client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.header("Authorization", format!("Bearer {}", self.token))
    }

    async fn check(&self, response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = match response.json::<ErrorEnvelope>().await {
            Ok(body) => body.error,
            Err(_) => status.to_string(),
        };

        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StoreError::Unauthorized,
            StatusCode::NOT_FOUND => StoreError::NotFound,
            _ => StoreError::Remote(message),
        })
    }

    async fn parse_task(&self, response: reqwest::Response) -> Result<Task, StoreError> {
        let response = self.check(response).await?;
        let envelope = response.json::<TaskEnvelope>().await.map_err(|e| {
            tracing::error!("failed to parse task response: {}", e);
            StoreError::Remote(format!("failed to parse response: {}", e))
        })?;
        Ok(envelope.task)
    }
}

fn send_error(e: reqwest::Error) -> StoreError {
    StoreError::Remote(e.to_string())
}

#[async_trait]
impl RemoteTasks for HttpTasks {
    async fn list(&self) -> Result<Vec<Task>, StoreError> {
        let response = self
            .authorize(self.client.get(self.url("/tasks")))
            .send()
            .await
            .map_err(send_error)?;
        let response = self.check(response).await?;
        let envelope = response
            .json::<TasksEnvelope>()
            .await
            .map_err(|e| StoreError::Remote(format!("failed to parse response: {}", e)))?;
        Ok(envelope.tasks)
    }

    async fn insert(&self, req: NewTaskRequest) -> Result<Task, StoreError> {
        let response = self
            .authorize(self.client.post(self.url("/tasks")))
            .json(&req)
            .send()
            .await
            .map_err(send_error)?;
        self.parse_task(response).await
    }

    async fn update(&self, id: &str, req: UpdateTaskRequest) -> Result<Task, StoreError> {
        let response = self
            .authorize(self.client.put(self.url(&format!("/tasks/{}", id))))
            .json(&req)
            .send()
            .await
            .map_err(send_error)?;
        self.parse_task(response).await
    }

    async fn toggle_status(&self, id: &str) -> Result<Task, StoreError> {
        let response = self
            .authorize(
                self.client
                    .post(self.url(&format!("/tasks/{}/toggle-status", id))),
            )
            .send()
            .await
            .map_err(send_error)?;
        self.parse_task(response).await
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let response = self
            .authorize(self.client.delete(self.url(&format!("/tasks/{}", id))))
            .send()
            .await
            .map_err(send_error)?;
        self.check(response).await?;
        Ok(())
    }
}

/// Local-storage variant: one JSON file per user key holding the ordered
/// task array, newest first.
pub struct JsonFileTasks {
    dir: PathBuf,
    user_key: String,
}

impl JsonFileTasks {
    pub fn new(dir: impl Into<PathBuf>, user_key: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            user_key: user_key.into(),
        }
    }

    fn path(&self) -> PathBuf {
        self.dir.join(format!("tasks_{}.json", self.user_key))
    }

    fn load_all(&self) -> Result<Vec<Task>, StoreError> {
        let path = self.path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let raw = std::fs::read_to_string(&path)
            .map_err(|e| StoreError::Storage(format!("read {}: {}", path.display(), e)))?;
        serde_json::from_str(&raw)
            .map_err(|e| StoreError::Storage(format!("parse {}: {}", path.display(), e)))
    }

    fn save_all(&self, tasks: &[Task]) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| StoreError::Storage(format!("create {}: {}", self.dir.display(), e)))?;
        let path = self.path();
        let raw = serde_json::to_string_pretty(tasks)
            .map_err(|e| StoreError::Storage(format!("serialize tasks: {}", e)))?;
        std::fs::write(&path, raw)
            .map_err(|e| StoreError::Storage(format!("write {}: {}", path.display(), e)))
    }
}

#[async_trait]
impl RemoteTasks for JsonFileTasks {
    async fn list(&self) -> Result<Vec<Task>, StoreError> {
        self.load_all()
    }

    async fn insert(&self, req: NewTaskRequest) -> Result<Task, StoreError> {
        let mut tasks = self.load_all()?;
        let task = Task {
            id: Uuid::new_v4().to_string(),
            owner_id: self.user_key.clone(),
            title: req.title,
            description: req.description.filter(|d| !d.is_empty()),
            status: TaskStatus::Pending,
            priority: req.priority.unwrap_or_default(),
            due_date: req.due_date,
            created_at: Utc::now().to_rfc3339(),
        };
        tasks.insert(0, task.clone());
        self.save_all(&tasks)?;
        Ok(task)
    }

    async fn update(&self, id: &str, req: UpdateTaskRequest) -> Result<Task, StoreError> {
        let mut tasks = self.load_all()?;
        let task = tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(StoreError::NotFound)?;

        if let Some(title) = req.title {
            task.title = title;
        }
        if let Some(description) = req.description {
            task.description = if description.is_empty() { None } else { Some(description) };
        }
        if let Some(status) = req.status {
            task.status = status;
        }
        if let Some(priority) = req.priority {
            task.priority = priority;
        }
        if let Some(due_date) = req.due_date {
            task.due_date = if due_date.is_empty() { None } else { Some(due_date) };
        }

        let updated = task.clone();
        self.save_all(&tasks)?;
        Ok(updated)
    }

    async fn toggle_status(&self, id: &str) -> Result<Task, StoreError> {
        let mut tasks = self.load_all()?;
        let task = tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(StoreError::NotFound)?;
        task.status = task.status.toggled();

        let updated = task.clone();
        self.save_all(&tasks)?;
        Ok(updated)
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let mut tasks = self.load_all()?;
        let before = tasks.len();
        tasks.retain(|t| t.id != id);
        if tasks.len() == before {
            return Err(StoreError::NotFound);
        }
        self.save_all(&tasks)
    }
}
