//! Postgres-backed todo store.
//!
//! Queries are checked at runtime so the crate builds without a reachable
//! database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::{boolean_column, Result, StoreError, TodoRepository};
use crate::identity::UserId;
use crate::model::{NewTodo, Todo, TodoUpdate};

type TodoRow = (i64, i64, String, bool, DateTime<Utc>);

fn from_row((id, owner, title, state, created_at): TodoRow) -> Todo {
    Todo {
        id,
        owner: UserId(owner),
        title,
        state,
        created_at,
    }
}

fn backend(err: sqlx::Error) -> StoreError {
    tracing::error!(error = %err, "todo query failed");
    StoreError::Backend(err.to_string())
}

#[derive(Clone, Debug)]
pub struct PostgresTodoStore {
    pool: PgPool,
}

impl PostgresTodoStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the `todos` table and its listing index if they are missing.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS todos (
                id BIGSERIAL PRIMARY KEY,
                owner_id BIGINT NOT NULL,
                title VARCHAR(200) NOT NULL,
                state BOOLEAN NOT NULL DEFAULT FALSE,
                created_at TIMESTAMPTZ NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS todos_owner_created_at ON todos (owner_id, created_at DESC)",
        )
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }
}

#[async_trait]
impl TodoRepository for PostgresTodoStore {
    async fn create(&self, new: NewTodo) -> Result<Todo> {
        let row: TodoRow = sqlx::query_as(
            "INSERT INTO todos (owner_id, title, state, created_at)
             VALUES ($1, $2, FALSE, $3)
             RETURNING id, owner_id, title, state, created_at",
        )
        .bind(new.owner.0)
        .bind(&new.title)
        .bind(new.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(backend)?;
        Ok(from_row(row))
    }

    async fn get(&self, id: i64, owner: UserId) -> Result<Option<Todo>> {
        let row: Option<TodoRow> = sqlx::query_as(
            "SELECT id, owner_id, title, state, created_at FROM todos WHERE id = $1 AND owner_id = $2",
        )
        .bind(id)
        .bind(owner.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        Ok(row.map(from_row))
    }

    async fn list_by_owner_ordered(&self, owner: UserId, limit: usize) -> Result<Vec<Todo>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows: Vec<TodoRow> = sqlx::query_as(
            "SELECT id, owner_id, title, state, created_at FROM todos
             WHERE owner_id = $1 ORDER BY created_at DESC LIMIT $2",
        )
        .bind(owner.0)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        Ok(rows.into_iter().map(from_row).collect())
    }

    async fn update(&self, id: i64, owner: UserId, update: TodoUpdate) -> Result<Option<Todo>> {
        let state = update
            .state
            .as_ref()
            .map(|raw| boolean_column("state", raw))
            .transpose()?;
        let row: Option<TodoRow> = sqlx::query_as(
            "UPDATE todos SET title = COALESCE($3, title), state = COALESCE($4, state)
             WHERE id = $1 AND owner_id = $2
             RETURNING id, owner_id, title, state, created_at",
        )
        .bind(id)
        .bind(owner.0)
        .bind(update.title)
        .bind(state)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        Ok(row.map(from_row))
    }

    async fn delete(&self, id: i64, owner: UserId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM todos WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner.0)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(result.rows_affected() > 0)
    }
}
