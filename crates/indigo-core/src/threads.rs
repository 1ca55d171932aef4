//! In-memory conversation threads
//!
//! Each thread id owns its state behind its own lock, so a thread never
//! runs two turns at once while different threads proceed in parallel.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::graph::SharedState;

#[derive(Debug, thiserror::Error, PartialEq)]
#[error("thread '{0}' is already processing a turn")]
pub struct ThreadBusy(pub String);

#[derive(Clone, Default)]
pub struct ThreadStore {
    threads: Arc<RwLock<HashMap<String, Arc<Mutex<SharedState>>>>>,
}

impl ThreadStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exclusive access to a thread's state, creating the thread on first
    /// use. Fails instead of waiting when a turn is already running.
    pub async fn acquire(&self, id: &str) -> Result<OwnedMutexGuard<SharedState>, ThreadBusy> {
        let slot = {
            let mut threads = self.threads.write().await;
            threads
                .entry(id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(SharedState::default())))
                .clone()
        };
        slot.try_lock_owned().map_err(|_| ThreadBusy(id.to_string()))
    }

    /// Copy of a thread's state once any running turn has finished
    pub async fn snapshot(&self, id: &str) -> Option<SharedState> {
        let slot = self.threads.read().await.get(id).cloned()?;
        let state = slot.lock().await;
        Some(state.clone())
    }

    pub async fn len(&self) -> usize {
        self.threads.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::types::Message;

    #[tokio::test]
    async fn test_busy_thread_is_rejected() {
        let store = ThreadStore::new();
        let guard = store.acquire("1").await.unwrap();
        assert_eq!(store.acquire("1").await.err(), Some(ThreadBusy("1".into())));
        assert!(store.acquire("2").await.is_ok());
        drop(guard);
        assert!(store.acquire("1").await.is_ok());
    }

    #[tokio::test]
    async fn test_state_persists_between_turns() {
        let store = ThreadStore::new();
        {
            let mut state = store.acquire("t").await.unwrap();
            state.messages.push(Message::user("hello"));
        }
        let state = store.snapshot("t").await.unwrap();
        assert_eq!(state.messages.len(), 1);
        assert!(store.snapshot("missing").await.is_none());
        assert_eq!(store.len().await, 1);
    }
}
