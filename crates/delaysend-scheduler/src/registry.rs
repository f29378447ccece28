//! Task registry — at most one live task per message id.
//!
//! The map is guarded by a std mutex: critical sections are a single
//! insert/remove, and unregistering must work from a drop guard.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Mutex, MutexGuard};

use serde::Serialize;
use tokio::sync::Notify;

use crate::tasks::TaskHandle;

#[derive(Default)]
struct RegistryState {
    tasks: HashMap<i64, TaskHandle>,
    next_generation: u64,
    total_registered: u64,
    duplicates: u64,
}

/// Maps active message ids to their running task.
#[derive(Default)]
pub struct TaskRegistry {
    state: Mutex<RegistryState>,
    idle: Notify,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Claim `message_id`. Returns the handle and whether a task already
    /// existed; when it did, the returned handle is the existing task's and
    /// the caller must not run anything.
    pub fn register(&self, message_id: i64) -> (TaskHandle, bool) {
        let mut state = self.lock();
        let generation = state.next_generation;
        let result = match state.tasks.entry(message_id) {
            Entry::Occupied(existing) => (existing.get().clone(), true),
            Entry::Vacant(slot) => {
                let handle = TaskHandle::new(message_id, generation);
                slot.insert(handle.clone());
                (handle, false)
            }
        };
        if result.1 {
            state.duplicates += 1;
        } else {
            state.next_generation += 1;
            state.total_registered += 1;
        }
        result
    }

    /// Release the entry owned by `handle`. An entry registered later under
    /// the same id is left in place.
    pub fn unregister(&self, handle: &TaskHandle) -> bool {
        let removed = {
            let mut state = self.lock();
            let owned = state
                .tasks
                .get(&handle.message_id())
                .is_some_and(|current| current.same_task(handle));
            if owned {
                state.tasks.remove(&handle.message_id());
            }
            owned
        };
        if removed {
            self.idle.notify_waiters();
        }
        removed
    }

    pub fn get(&self, message_id: i64) -> Option<TaskHandle> {
        self.lock().tasks.get(&message_id).cloned()
    }

    /// Ids of all active tasks, sorted.
    pub fn active_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.lock().tasks.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn handles(&self) -> Vec<TaskHandle> {
        self.lock().tasks.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolve once no task is registered.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            if self.is_empty() {
                return;
            }
            notified.await;
        }
    }

    pub fn stats(&self) -> RegistryStats {
        let state = self.lock();
        RegistryStats {
            active: state.tasks.len(),
            total_registered: state.total_registered,
            duplicate_starts: state.duplicates,
        }
    }
}

/// Registry counters.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RegistryStats {
    pub active: usize,
    pub total_registered: u64,
    pub duplicate_starts: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_register_is_exclusive() {
        let registry = TaskRegistry::new();
        let (first, existed) = registry.register(5);
        assert!(!existed);
        let (second, existed) = registry.register(5);
        assert!(existed);
        assert!(first.same_task(&second));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.stats().duplicate_starts, 1);
    }

    #[test]
    fn test_unregister_only_removes_own_generation() {
        let registry = TaskRegistry::new();
        let (old, _) = registry.register(5);
        assert!(registry.unregister(&old));
        let (new, existed) = registry.register(5);
        assert!(!existed);

        // A stale cleanup from the finished task must not evict the new one.
        assert!(!registry.unregister(&old));
        assert_eq!(registry.active_ids(), vec![5]);
        assert!(registry.unregister(&new));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_concurrent_register_single_winner() {
        let registry = Arc::new(TaskRegistry::new());
        let threads: Vec<_> = (0..16)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || !registry.register(42).1)
            })
            .collect();
        let winners = threads
            .into_iter()
            .map(|t| t.join().unwrap())
            .filter(|fresh| *fresh)
            .count();
        assert_eq!(winners, 1);
        assert_eq!(registry.stats().total_registered, 1);
        assert_eq!(registry.stats().duplicate_starts, 15);
    }

    #[tokio::test]
    async fn test_wait_idle() {
        let registry = Arc::new(TaskRegistry::new());
        registry.wait_idle().await;

        let (handle, _) = registry.register(1);
        let waiter = {
            let registry = registry.clone();
            tokio::spawn(async move { registry.wait_idle().await })
        };
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());
        registry.unregister(&handle);
        waiter.await.unwrap();
    }
}
