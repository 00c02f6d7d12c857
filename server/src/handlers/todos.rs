//! The five todo routes.
//!
//! Item routes resolve the todo by id and owner before looking at the
//! method, so an unknown or foreign id is a 404 whatever the method is.
//! Each handler then picks its encoding with [`wants_json`].

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, Method, StatusCode},
    response::{Html, IntoResponse, Response},
    Extension, Json,
};
use chrono::Utc;
use serde_json::json;
use tracing::info;

use crate::error::AppError;
use crate::identity::Identity;
use crate::model::{NewTodo, Todo, TodoUpdate, RECENT_TODOS_LIMIT};
use crate::negotiate::{found, wants_json, Payload};
use crate::render;
use crate::AppState;

const COLLECTION: &str = "/";

/// Look up `raw_id` for `identity`. Ids that are not integers are unknown ids.
async fn resolve(state: &AppState, raw_id: &str, identity: &Identity) -> Result<Todo, AppError> {
    let id: i64 = raw_id.parse().map_err(|_| AppError::NotFound)?;
    state
        .todos
        .get(id, identity.user_id)
        .await?
        .ok_or(AppError::NotFound)
}

fn is_read(method: &Method) -> bool {
    *method == Method::GET || *method == Method::HEAD
}

/// `GET /` lists the newest todos; `POST /` creates one.
///
/// A POST without a usable title is answered exactly like a GET.
pub async fn index(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let json = wants_json(&headers);

    if method == Method::POST {
        let payload = Payload::parse(&headers, &body)?;
        if let Some(title) = payload.trimmed("title").filter(|t| !t.is_empty()) {
            let todo = state
                .todos
                .create(NewTodo {
                    owner: identity.user_id,
                    title: title.to_string(),
                    created_at: Utc::now(),
                })
                .await?;
            info!(todo_id = todo.id, user_id = %identity.user_id, "todo created");
            return Ok(if json {
                (StatusCode::CREATED, Json(todo)).into_response()
            } else {
                found(COLLECTION)
            });
        }
    }

    let todos = state
        .todos
        .list_by_owner_ordered(identity.user_id, RECENT_TODOS_LIMIT)
        .await?;
    Ok(if json {
        Json(json!({ "todos": todos })).into_response()
    } else {
        Html(render::todo_list(&identity, &todos)).into_response()
    })
}

pub async fn detail(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
    method: Method,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let todo = resolve(&state, &id, &identity).await?;
    if !is_read(&method) {
        return Err(AppError::MethodNotAllowed);
    }
    Ok(if wants_json(&headers) {
        Json(todo).into_response()
    } else {
        format!("You're looking at todo {}.", todo.id).into_response()
    })
}

/// The stored `state` is overwritten with whatever the body carries; the
/// store rejects values that are not booleans.
pub async fn set_state(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let todo = resolve(&state, &id, &identity).await?;
    let json = wants_json(&headers);

    if is_read(&method) {
        return Ok(if json {
            Json(todo).into_response()
        } else {
            format!("You're setting the state for todo {}.", todo.id).into_response()
        });
    }
    if method != Method::POST {
        return Err(AppError::MethodNotAllowed);
    }

    let payload = Payload::parse(&headers, &body)?;
    let raw = payload
        .get("state")
        .cloned()
        .ok_or(AppError::Validation("state value is required"))?;
    let updated = state
        .todos
        .update(todo.id, identity.user_id, TodoUpdate::state(raw))
        .await?
        .ok_or(AppError::NotFound)?;
    info!(todo_id = updated.id, state = updated.state, "todo state set");

    Ok(if json {
        Json(updated).into_response()
    } else {
        found(COLLECTION)
    })
}

pub async fn update_title(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let todo = resolve(&state, &id, &identity).await?;
    let json = wants_json(&headers);

    if is_read(&method) {
        return Ok(if json {
            Json(todo).into_response()
        } else {
            format!("You're updating the title for todo {}.", todo.id).into_response()
        });
    }
    if method != Method::POST && method != Method::PUT {
        return Err(AppError::MethodNotAllowed);
    }

    let payload = Payload::parse(&headers, &body)?;
    let title = payload
        .trimmed("title")
        .filter(|t| !t.is_empty())
        .ok_or(AppError::Validation("title value is required and cannot be empty"))?;
    let updated = state
        .todos
        .update(todo.id, identity.user_id, TodoUpdate::title(title))
        .await?
        .ok_or(AppError::NotFound)?;
    info!(todo_id = updated.id, "todo title updated");

    Ok(if json {
        Json(updated).into_response()
    } else {
        found(COLLECTION)
    })
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
    method: Method,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let todo = resolve(&state, &id, &identity).await?;
    if method != Method::POST && method != Method::DELETE {
        return Err(AppError::MethodNotAllowed);
    }

    if !state.todos.delete(todo.id, identity.user_id).await? {
        return Err(AppError::NotFound);
    }
    info!(todo_id = todo.id, "todo deleted");

    Ok(if wants_json(&headers) {
        Json(json!({ "message": "Todo deleted successfully" })).into_response()
    } else {
        found(COLLECTION)
    })
}
