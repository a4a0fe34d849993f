use chrono::Utc;
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::models::{NewTaskRequest, Session, Task, TaskStatus, UpdateTaskRequest, User};

const TASK_COLUMNS: &str = "id, owner_id, title, description, status, priority, due_date, created_at";

pub async fn fetch_tasks(db: &SqlitePool, owner_id: &str) -> Result<Vec<Task>, sqlx::Error> {
    sqlx::query_as::<_, Task>(&format!(
        "SELECT {TASK_COLUMNS} FROM tasks WHERE owner_id = ? ORDER BY created_at DESC, id DESC"
    ))
    .bind(owner_id)
    .fetch_all(db)
    .await
}

pub async fn find_task_by_id(db: &SqlitePool, id: &str) -> Result<Option<Task>, sqlx::Error> {
    sqlx::query_as::<_, Task>(&format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?"))
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn find_task_for_owner(
    db: &SqlitePool,
    id: &str,
    owner_id: &str,
) -> Result<Option<Task>, sqlx::Error> {
    sqlx::query_as::<_, Task>(&format!(
        "SELECT {TASK_COLUMNS} FROM tasks WHERE id = ? AND owner_id = ?"
    ))
    .bind(id)
    .bind(owner_id)
    .fetch_optional(db)
    .await
}

/// Inserts a task for `owner_id`. Status is always `pending` on creation;
/// priority falls back to `medium` when the request leaves it unset.
pub async fn insert_task(
    db: &SqlitePool,
    owner_id: &str,
    req: NewTaskRequest,
) -> Result<Task, sqlx::Error> {
    let task = Task {
        id: Uuid::new_v4().to_string(),
        owner_id: owner_id.to_string(),
        title: req.title,
        description: req.description.filter(|d| !d.is_empty()),
        status: TaskStatus::Pending,
        priority: req.priority.unwrap_or_default(),
        due_date: req.due_date,
        created_at: Utc::now().to_rfc3339(),
    };

    sqlx::query(
        "INSERT INTO tasks (id, owner_id, title, description, status, priority, due_date, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&task.id)
    .bind(&task.owner_id)
    .bind(&task.title)
    .bind(&task.description)
    .bind(task.status)
    .bind(task.priority)
    .bind(&task.due_date)
    .bind(&task.created_at)
    .execute(db)
    .await?;

    Ok(task)
}

/// Merges the set fields of `req` over the stored row. Unset fields keep
/// their current values; `owner_id` and `created_at` are never touched.
pub async fn update_task(
    db: &SqlitePool,
    id: &str,
    owner_id: &str,
    req: UpdateTaskRequest,
) -> Result<Option<Task>, sqlx::Error> {
    let mut current = match find_task_for_owner(db, id, owner_id).await? {
        Some(t) => t,
        None => return Ok(None),
    };

    if let Some(title) = req.title {
        current.title = title;
    }
    if let Some(description) = req.description {
        current.description = if description.is_empty() { None } else { Some(description) };
    }
    if let Some(status) = req.status {
        current.status = status;
    }
    if let Some(priority) = req.priority {
        current.priority = priority;
    }
    if let Some(due_date) = req.due_date {
        current.due_date = if due_date.is_empty() { None } else { Some(due_date) };
    }

    sqlx::query(
        "UPDATE tasks SET title = ?, description = ?, status = ?, priority = ?, due_date = ? \
         WHERE id = ? AND owner_id = ?",
    )
    .bind(&current.title)
    .bind(&current.description)
    .bind(current.status)
    .bind(current.priority)
    .bind(&current.due_date)
    .bind(id)
    .bind(owner_id)
    .execute(db)
    .await?;

    Ok(Some(current))
}

/// Flips the task between pending and completed and returns the stored row.
pub async fn toggle_task_status(
    db: &SqlitePool,
    id: &str,
    owner_id: &str,
) -> Result<Option<Task>, sqlx::Error> {
    let mut current = match find_task_for_owner(db, id, owner_id).await? {
        Some(t) => t,
        None => return Ok(None),
    };

    current.status = current.status.toggled();

    sqlx::query("UPDATE tasks SET status = ? WHERE id = ? AND owner_id = ?")
        .bind(current.status)
        .bind(id)
        .bind(owner_id)
        .execute(db)
        .await?;

    Ok(Some(current))
}

pub async fn delete_task(db: &SqlitePool, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM tasks WHERE id = ?")
        .bind(id)
        .execute(db)
        .await?
        .rows_affected();

    Ok(result > 0)
}

#[derive(Debug, Clone, FromRow)]
pub struct UserWithDigest {
    pub id: String,
    pub email: String,
    pub username: String,
    pub password_digest: String,
    pub created_at: String,
}

impl UserWithDigest {
    pub fn into_user(self) -> User {
        User {
            id: self.id,
            email: self.email,
            username: self.username,
            created_at: self.created_at,
        }
    }
}

pub async fn insert_user(
    db: &SqlitePool,
    email: &str,
    username: &str,
    password_digest: &str,
) -> Result<User, sqlx::Error> {
    let user = User {
        id: Uuid::new_v4().to_string(),
        email: email.to_string(),
        username: username.to_string(),
        created_at: Utc::now().to_rfc3339(),
    };

    sqlx::query(
        "INSERT INTO users (id, email, username, password_digest, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&user.id)
    .bind(&user.email)
    .bind(&user.username)
    .bind(password_digest)
    .bind(&user.created_at)
    .execute(db)
    .await?;

    Ok(user)
}

pub async fn find_user_by_email(
    db: &SqlitePool,
    email: &str,
) -> Result<Option<UserWithDigest>, sqlx::Error> {
    sqlx::query_as::<_, UserWithDigest>(
        "SELECT id, email, username, password_digest, created_at FROM users WHERE email = ?",
    )
    .bind(email)
    .fetch_optional(db)
    .await
}

pub async fn find_user_by_id(db: &SqlitePool, id: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT id, email, username, created_at FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn insert_session(
    db: &SqlitePool,
    user_id: &str,
    ttl_days: i64,
) -> Result<Session, sqlx::Error> {
    let now = Utc::now();
    let session = Session {
        token: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        created_at: now.to_rfc3339(),
        expires_at: (now + chrono::Duration::days(ttl_days)).to_rfc3339(),
    };

    sqlx::query("INSERT INTO sessions (token, user_id, created_at, expires_at) VALUES (?, ?, ?, ?)")
        .bind(&session.token)
        .bind(&session.user_id)
        .bind(&session.created_at)
        .bind(&session.expires_at)
        .execute(db)
        .await?;

    Ok(session)
}

pub async fn find_session(db: &SqlitePool, token: &str) -> Result<Option<Session>, sqlx::Error> {
    sqlx::query_as::<_, Session>(
        "SELECT token, user_id, created_at, expires_at FROM sessions WHERE token = ?",
    )
    .bind(token)
    .fetch_optional(db)
    .await
}

pub async fn delete_session(db: &SqlitePool, token: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM sessions WHERE token = ?")
        .bind(token)
        .execute(db)
        .await?
        .rows_affected();

    Ok(result > 0)
}
