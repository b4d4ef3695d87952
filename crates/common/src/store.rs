//! Session-scoped task storage
//!
//! Every browser session gets its own `TodoStore`. All stores in a process
//! draw ids from one `IdAllocator`, so ids stay unique across sessions and
//! are never handed out twice.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::debug;

use crate::error::{Error, Result};
use crate::types::{ListKind, TaskId, TaskItem};

/// Process-wide, monotonically increasing task id source
#[derive(Debug, Clone)]
pub struct IdAllocator {
    next: Arc<AtomicU64>,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self {
            next: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn next_id(&self) -> TaskId {
        TaskId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Tasks of one session.
///
/// To-do items are kept in creation order, completed items in completion
/// order. An item sits in exactly one of the two vectors.
#[derive(Debug, Clone)]
pub struct TodoStore {
    ids: IdAllocator,
    todo: Vec<TaskItem>,
    completed: Vec<TaskItem>,
}

impl TodoStore {
    pub fn new(ids: IdAllocator) -> Self {
        Self {
            ids,
            todo: Vec::new(),
            completed: Vec::new(),
        }
    }

    /// Add a task. Blank text is rejected; duplicates are allowed.
    pub fn add(&mut self, text: &str) -> Result<TaskItem> {
        if text.trim().is_empty() {
            return Err(Error::BlankText);
        }
        let item = TaskItem::new(self.ids.next_id(), text);
        debug!(id = %item.id, "task added");
        self.todo.push(item.clone());
        Ok(item)
    }

    /// Move a task from the to-do list to the completed list
    pub fn complete(&mut self, id: TaskId) -> Result<TaskItem> {
        let Some(pos) = self.todo.iter().position(|t| t.id == id) else {
            if let Some(done) = self.completed.iter().find(|t| t.id == id) {
                return Err(Error::InvalidStateTransition {
                    id,
                    from: done.completion.to_string(),
                    to: "completed".to_string(),
                });
            }
            return Err(Error::NotFound(id));
        };

        let mut item = self.todo.remove(pos);
        item.complete()?;
        debug!(id = %item.id, "task completed");
        self.completed.push(item.clone());
        Ok(item)
    }

    /// Remove a task from whichever list holds it
    pub fn delete(&mut self, id: TaskId) -> Result<TaskItem> {
        let list = if self.todo.iter().any(|t| t.id == id) {
            &mut self.todo
        } else {
            &mut self.completed
        };
        let pos = list
            .iter()
            .position(|t| t.id == id)
            .ok_or(Error::NotFound(id))?;
        let item = list.remove(pos);
        debug!(id = %item.id, "task deleted");
        Ok(item)
    }

    pub fn todo(&self) -> &[TaskItem] {
        &self.todo
    }

    pub fn completed(&self) -> &[TaskItem] {
        &self.completed
    }

    pub fn list(&self, kind: ListKind) -> &[TaskItem] {
        match kind {
            ListKind::Todo => &self.todo,
            ListKind::Completed => &self.completed,
        }
    }

    pub fn len(&self) -> usize {
        self.todo.len() + self.completed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct SessionEntry {
    store: TodoStore,
    last_seen: Instant,
}

/// Per-session stores sharing one id allocator
pub struct SessionStores {
    ids: IdAllocator,
    max_sessions: usize,
    sessions: Mutex<HashMap<String, SessionEntry>>,
}

impl SessionStores {
    pub fn new(max_sessions: usize) -> Self {
        Self {
            ids: IdAllocator::new(),
            max_sessions,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Run `f` against the store of `session`, creating it on first use
    pub fn with_session<R>(&self, session: &str, f: impl FnOnce(&mut TodoStore) -> R) -> Result<R> {
        let mut sessions = self.sessions.lock();
        if !sessions.contains_key(session) && sessions.len() >= self.max_sessions {
            return Err(Error::SessionLimit(self.max_sessions));
        }
        let entry = sessions
            .entry(session.to_string())
            .or_insert_with(|| SessionEntry {
                store: TodoStore::new(self.ids.clone()),
                last_seen: Instant::now(),
            });
        entry.last_seen = Instant::now();
        Ok(f(&mut entry.store))
    }

    /// Drop sessions idle for longer than `ttl`. Returns how many went.
    pub fn evict_idle(&self, ttl: Duration) -> usize {
        let mut sessions = self.sessions.lock();
        let before = sessions.len();
        sessions.retain(|_, entry| entry.last_seen.elapsed() < ttl);
        before - sessions.len()
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> TodoStore {
        TodoStore::new(IdAllocator::new())
    }

    #[test]
    fn test_add_rejects_blank_text() {
        let mut store = store();
        assert_eq!(store.add("").unwrap_err(), Error::BlankText);
        assert_eq!(store.add("   ").unwrap_err(), Error::BlankText);
        assert!(store.is_empty());
    }

    #[test]
    fn test_duplicates_are_kept() {
        let mut store = store();
        let a = store.add("Duplicate").unwrap();
        let b = store.add("Duplicate").unwrap();
        assert_ne!(a.id, b.id);
        let texts: Vec<_> = store.list(ListKind::Todo).iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["Duplicate", "Duplicate"]);
    }

    #[test]
    fn test_complete_moves_between_lists() {
        let mut store = store();
        let first = store.add("First").unwrap();
        let second = store.add("Second").unwrap();

        store.complete(second.id).unwrap();
        store.complete(first.id).unwrap();

        assert!(store.todo().is_empty());
        let order: Vec<_> = store.completed().iter().map(|t| t.text.as_str()).collect();
        assert_eq!(order, vec!["Second", "First"]);
    }

    #[test]
    fn test_complete_twice_is_rejected() {
        let mut store = store();
        let item = store.add("Once").unwrap();
        store.complete(item.id).unwrap();

        let err = store.complete(item.id).unwrap_err();
        assert!(matches!(err, Error::InvalidStateTransition { .. }));
        assert_eq!(store.completed().len(), 1);
        assert!(store.todo().is_empty());
    }

    #[test]
    fn test_delete_from_either_list() {
        let mut store = store();
        let open = store.add("Open").unwrap();
        let done = store.add("Done").unwrap();
        store.complete(done.id).unwrap();

        store.delete(open.id).unwrap();
        store.delete(done.id).unwrap();
        assert!(store.is_empty());
        assert_eq!(store.delete(done.id).unwrap_err(), Error::NotFound(done.id));
    }

    #[test]
    fn test_ids_never_reused_across_sessions() {
        let stores = SessionStores::new(8);
        let a = stores.with_session("a", |s| s.add("one").unwrap()).unwrap();
        stores
            .with_session("a", |s| s.delete(a.id).unwrap())
            .unwrap();
        let b = stores.with_session("b", |s| s.add("two").unwrap()).unwrap();

        let c = stores.with_session("a", |s| s.add("three").unwrap()).unwrap();

        assert!(b.id > a.id);
        assert!(c.id > b.id);
    }

    #[test]
    fn test_session_limit_and_eviction() {
        let stores = SessionStores::new(1);
        stores.with_session("a", |_| ()).unwrap();
        assert_eq!(
            stores.with_session("b", |_| ()).unwrap_err(),
            Error::SessionLimit(1)
        );

        assert_eq!(stores.evict_idle(Duration::ZERO), 1);
        assert!(stores.is_empty());
        stores.with_session("b", |_| ()).unwrap();
    }
}
