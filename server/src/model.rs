//! Todo records and the change sets applied to them.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::identity::UserId;

/// Upper bound on the listing window returned by the collection endpoint.
pub const RECENT_TODOS_LIMIT: usize = 5;

/// A single todo as persisted by a [`TodoRepository`](crate::store::TodoRepository).
///
/// `owner` is kept server-side only and is never part of the JSON shape.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Todo {
    pub id: i64,
    #[serde(skip)]
    pub owner: UserId,
    pub title: String,
    pub state: bool,
    pub created_at: DateTime<Utc>,
}

/// Input for [`TodoRepository::create`](crate::store::TodoRepository::create).
#[derive(Clone, Debug)]
pub struct NewTodo {
    pub owner: UserId,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

/// A field value exactly as it arrived in a request body.
///
/// Forms only ever carry text; JSON bodies carry arbitrary values. The
/// handler layer passes these through untouched and the store decides
/// whether they fit the column.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Json(serde_json::Value),
    Text(String),
}

impl FieldValue {
    /// The value as a string, if it is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Json(serde_json::Value::String(s)) => Some(s),
            FieldValue::Json(_) => None,
            FieldValue::Text(s) => Some(s),
        }
    }

    /// `true` for JSON `null`, which every handler treats as "absent".
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Json(serde_json::Value::Null))
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::Json(serde_json::Value::String(s)) | FieldValue::Text(s) => f.write_str(s),
            FieldValue::Json(other) => write!(f, "{other}"),
        }
    }
}

/// Partial update for an existing todo. Omitted fields stay unchanged.
#[derive(Clone, Debug, Default)]
pub struct TodoUpdate {
    pub title: Option<String>,
    pub state: Option<FieldValue>,
}

impl TodoUpdate {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            state: None,
        }
    }

    pub fn state(raw: FieldValue) -> Self {
        Self {
            title: None,
            state: Some(raw),
        }
    }
}
