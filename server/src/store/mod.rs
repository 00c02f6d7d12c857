//! Persistence for todo records.
//!
//! # Design
//! Handlers only see the [`TodoRepository`] trait object, so the backend can
//! be swapped without touching request handling. Every read and write is
//! scoped by owner: a record that belongs to somebody else is reported the
//! same way as a record that does not exist.
//!
//! Column typing lives here too. The handler layer hands over raw request
//! values (see [`FieldValue`]) and [`boolean_column`] decides whether they
//! are storable, mirroring how a relational column would reject them.

use async_trait::async_trait;
use thiserror::Error;

use crate::identity::UserId;
use crate::model::{FieldValue, NewTodo, Todo, TodoUpdate};

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::InMemoryTodoStore;
#[cfg(feature = "postgres")]
pub use postgres::PostgresTodoStore;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A raw value could not be converted to the column type.
    #[error("'{value}' value must be either true or false")]
    InvalidValue { field: &'static str, value: String },

    /// The backing database failed.
    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// Owner-scoped repository of todos.
#[async_trait]
pub trait TodoRepository: Send + Sync {
    /// Insert a new todo with `state = false` and a freshly assigned id.
    async fn create(&self, new: NewTodo) -> Result<Todo>;

    /// Fetch a todo by id, only if `owner` owns it.
    async fn get(&self, id: i64, owner: UserId) -> Result<Option<Todo>>;

    /// The newest `limit` todos of `owner`, ordered by `created_at` descending.
    async fn list_by_owner_ordered(&self, owner: UserId, limit: usize) -> Result<Vec<Todo>>;

    /// Apply `update` to the todo and return the stored result.
    ///
    /// Returns `Ok(None)` when the todo does not exist for `owner`. Values
    /// are validated before anything is written, so a failed update leaves
    /// the record untouched.
    async fn update(&self, id: i64, owner: UserId, update: TodoUpdate) -> Result<Option<Todo>>;

    /// Remove the todo. Returns whether a record was deleted.
    async fn delete(&self, id: i64, owner: UserId) -> Result<bool>;
}

/// Convert a raw request value into a boolean column value.
///
/// Accepts JSON booleans, JSON `0`/`1` and the textual spellings
/// `true`/`false`, `True`/`False`, `t`/`f`, `1`/`0`. Nothing else is coerced.
pub fn boolean_column(field: &'static str, raw: &FieldValue) -> Result<bool> {
    let invalid = || StoreError::InvalidValue {
        field,
        value: raw.to_string(),
    };
    match raw {
        FieldValue::Json(serde_json::Value::Bool(b)) => Ok(*b),
        FieldValue::Json(serde_json::Value::Number(n)) => match n.as_i64() {
            Some(1) => Ok(true),
            Some(0) => Ok(false),
            _ => Err(invalid()),
        },
        FieldValue::Json(serde_json::Value::String(s)) | FieldValue::Text(s) => {
            match s.as_str() {
                "true" | "True" | "t" | "1" => Ok(true),
                "false" | "False" | "f" | "0" => Ok(false),
                _ => Err(invalid()),
            }
        }
        FieldValue::Json(_) => Err(invalid()),
    }
}
