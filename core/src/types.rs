//! Wire types of the todo API.
//!
//! # Design
//! These mirror the server's JSON but are defined independently so the
//! client does not depend on axum. The end-to-end test catches any drift
//! between the two crates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single todo as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Todo {
    pub id: i64,
    pub title: String,
    pub state: bool,
    pub created_at: DateTime<Utc>,
}

/// Body of `GET /`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TodoList {
    pub todos: Vec<Todo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTodo {
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetState {
    pub state: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateTitle {
    pub title: String,
}

/// Body of every 4xx answer except redirects and 404s without a payload.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ErrorBody {
    pub error: String,
}

/// Body of a successful delete.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct MessageBody {
    pub message: String,
}

/// Login form fields.
#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}
