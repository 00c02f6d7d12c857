use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{boolean_column, Result, TodoRepository};
use crate::identity::UserId;
use crate::model::{NewTodo, Todo, TodoUpdate};

/// Process-local todo store.
///
/// Ids come from a sequence that starts at 1 and never hands out a value
/// twice, even after deletes.
#[derive(Clone, Debug, Default)]
pub struct InMemoryTodoStore {
    todos: Arc<RwLock<BTreeMap<i64, Todo>>>,
    next_id: Arc<AtomicI64>,
}

impl InMemoryTodoStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.todos.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.todos.read().await.is_empty()
    }
}

#[async_trait]
impl TodoRepository for InMemoryTodoStore {
    async fn create(&self, new: NewTodo) -> Result<Todo> {
        let todo = Todo {
            id: self.next_id.fetch_add(1, Ordering::Relaxed) + 1,
            owner: new.owner,
            title: new.title,
            state: false,
            created_at: new.created_at,
        };
        self.todos.write().await.insert(todo.id, todo.clone());
        Ok(todo)
    }

    async fn get(&self, id: i64, owner: UserId) -> Result<Option<Todo>> {
        let todos = self.todos.read().await;
        Ok(todos.get(&id).filter(|t| t.owner == owner).cloned())
    }

    async fn list_by_owner_ordered(&self, owner: UserId, limit: usize) -> Result<Vec<Todo>> {
        let todos = self.todos.read().await;
        let mut mine: Vec<Todo> = todos.values().filter(|t| t.owner == owner).cloned().collect();
        mine.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        mine.truncate(limit);
        Ok(mine)
    }

    async fn update(&self, id: i64, owner: UserId, update: TodoUpdate) -> Result<Option<Todo>> {
        let state = update
            .state
            .as_ref()
            .map(|raw| boolean_column("state", raw))
            .transpose()?;

        let mut todos = self.todos.write().await;
        let Some(todo) = todos.get_mut(&id).filter(|t| t.owner == owner) else {
            return Ok(None);
        };
        if let Some(title) = update.title {
            todo.title = title;
        }
        if let Some(state) = state {
            todo.state = state;
        }
        Ok(Some(todo.clone()))
    }

    async fn delete(&self, id: i64, owner: UserId) -> Result<bool> {
        let mut todos = self.todos.write().await;
        if todos.get(&id).is_some_and(|t| t.owner == owner) {
            todos.remove(&id);
            return Ok(true);
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FieldValue;
    use crate::store::StoreError;
    use chrono::{Duration, TimeZone, Utc};

    const ALICE: UserId = UserId(1);
    const BOB: UserId = UserId(2);

    fn new_todo(owner: UserId, title: &str, minute: i64) -> NewTodo {
        NewTodo {
            owner,
            title: title.to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minute),
        }
    }

    #[tokio::test]
    async fn create_assigns_unique_ids_and_false_state() {
        let store = InMemoryTodoStore::new();
        let a = store.create(new_todo(ALICE, "a", 0)).await.unwrap();
        let b = store.create(new_todo(ALICE, "b", 1)).await.unwrap();
        assert_ne!(a.id, b.id);
        assert!(!a.state);
        assert!(!b.state);
    }

    #[tokio::test]
    async fn ids_are_not_reused_after_delete() {
        let store = InMemoryTodoStore::new();
        let a = store.create(new_todo(ALICE, "a", 0)).await.unwrap();
        assert!(store.delete(a.id, ALICE).await.unwrap());
        let b = store.create(new_todo(ALICE, "b", 1)).await.unwrap();
        assert!(b.id > a.id);
    }

    #[tokio::test]
    async fn get_is_owner_scoped() {
        let store = InMemoryTodoStore::new();
        let a = store.create(new_todo(ALICE, "a", 0)).await.unwrap();
        assert_eq!(store.get(a.id, ALICE).await.unwrap(), Some(a.clone()));
        assert_eq!(store.get(a.id, BOB).await.unwrap(), None);
        assert_eq!(store.get(a.id + 100, ALICE).await.unwrap(), None);
    }

    #[tokio::test]
    async fn list_returns_newest_first_capped_at_limit() {
        let store = InMemoryTodoStore::new();
        for minute in 0..7 {
            store.create(new_todo(ALICE, &format!("t{minute}"), minute)).await.unwrap();
        }
        store.create(new_todo(BOB, "not mine", 100)).await.unwrap();

        let todos = store.list_by_owner_ordered(ALICE, 5).await.unwrap();
        let titles: Vec<&str> = todos.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, ["t6", "t5", "t4", "t3", "t2"]);
    }

    #[tokio::test]
    async fn update_title_preserves_other_fields() {
        let store = InMemoryTodoStore::new();
        let a = store.create(new_todo(ALICE, "a", 0)).await.unwrap();
        store
            .update(a.id, ALICE, TodoUpdate::state(FieldValue::Json(serde_json::json!(true))))
            .await
            .unwrap();
        let updated = store.update(a.id, ALICE, TodoUpdate::title("renamed")).await.unwrap().unwrap();
        assert_eq!(updated.title, "renamed");
        assert!(updated.state);
        assert_eq!(updated.created_at, a.created_at);
    }

    #[tokio::test]
    async fn invalid_state_leaves_record_untouched() {
        let store = InMemoryTodoStore::new();
        let a = store.create(new_todo(ALICE, "a", 0)).await.unwrap();
        let update = TodoUpdate {
            title: Some("should not land".into()),
            state: Some(FieldValue::Text("on".into())),
        };
        let err = store.update(a.id, ALICE, update).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidValue { .. }));
        assert_eq!(store.get(a.id, ALICE).await.unwrap(), Some(a));
    }

    #[tokio::test]
    async fn update_and_delete_other_owner_are_misses() {
        let store = InMemoryTodoStore::new();
        let a = store.create(new_todo(ALICE, "a", 0)).await.unwrap();
        assert!(store.update(a.id, BOB, TodoUpdate::title("x")).await.unwrap().is_none());
        assert!(!store.delete(a.id, BOB).await.unwrap());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn delete_twice() {
        let store = InMemoryTodoStore::new();
        let a = store.create(new_todo(ALICE, "a", 0)).await.unwrap();
        assert!(store.delete(a.id, ALICE).await.unwrap());
        assert!(!store.delete(a.id, ALICE).await.unwrap());
        assert!(store.is_empty().await);
    }
}
