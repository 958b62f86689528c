//! In-memory store.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::{PreferenceStore, QueueStore, StoreError};

#[derive(Debug, Default)]
struct MemoryState {
    queue: Vec<Option<String>>,
    preferences: BTreeMap<String, String>,
    queue_saves: usize,
    preference_saves: usize,
    fail_writes: bool,
}

/// A store kept in memory.
///
/// Clones share the same contents, so a test can keep one handle, give
/// another to a client, and later build a second client from the same
/// "disk" to simulate a restart.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the queue with raw entries; `None` models a corrupt record.
    pub fn with_raw_queue(entries: Vec<Option<String>>) -> Self {
        let store = Self::default();
        store.lock().queue = entries;
        store
    }

    /// Seeds the preferences.
    pub fn with_preferences(self, entries: &[(&str, &str)]) -> Self {
        {
            let mut state = self.lock();
            for (key, value) in entries {
                state.preferences.insert((*key).to_string(), (*value).to_string());
            }
        }
        self
    }

    /// Makes every subsequent write fail with [`StoreError::Unavailable`].
    pub fn set_fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    /// The persisted queue, without entries a load would drop.
    pub fn queue(&self) -> Vec<String> {
        self.lock().queue.iter().flatten().cloned().collect()
    }

    pub fn preferences(&self) -> BTreeMap<String, String> {
        self.lock().preferences.clone()
    }

    /// Number of successful queue snapshots written.
    pub fn queue_saves(&self) -> usize {
        self.lock().queue_saves
    }

    /// Number of successful preference writes.
    pub fn preference_saves(&self) -> usize {
        self.lock().preference_saves
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl QueueStore for MemoryStore {
    fn load_queue(&mut self) -> Result<Vec<String>, StoreError> {
        Ok(self
            .lock()
            .queue
            .iter()
            .flatten()
            .filter(|url| !url.is_empty())
            .cloned()
            .collect())
    }

    fn save_queue(&mut self, queue: &[String]) -> Result<(), StoreError> {
        let mut state = self.lock();
        if state.fail_writes {
            return Err(StoreError::Unavailable("writes disabled".to_string()));
        }
        state.queue = queue.iter().cloned().map(Some).collect();
        state.queue_saves += 1;
        Ok(())
    }
}

impl PreferenceStore for MemoryStore {
    fn load_preferences(&mut self) -> Result<BTreeMap<String, String>, StoreError> {
        Ok(self.lock().preferences.clone())
    }

    fn save_preferences(&mut self, entries: &[(&str, &str)]) -> Result<(), StoreError> {
        let mut state = self.lock();
        if state.fail_writes {
            return Err(StoreError::Unavailable("writes disabled".to_string()));
        }
        for (key, value) in entries {
            state.preferences.insert((*key).to_string(), (*value).to_string());
        }
        state.preference_saves += 1;
        Ok(())
    }
}
