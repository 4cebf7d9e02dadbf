//! Conversation Cache - one handle per conversation identifier.
//!
//! Lookups and insertions are serialized behind a single mutex so
//! get-or-create stays atomic even when the driver task and application
//! threads race on a never-seen identifier. No eviction: entries live for the
//! session.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::conversation::Conversation;

/// Map from conversation identifier to shared handle.
#[derive(Default)]
pub struct ConversationCache {
    inner: Mutex<HashMap<String, Arc<Conversation>>>,
}

impl ConversationCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn map(&self) -> MutexGuard<'_, HashMap<String, Arc<Conversation>>> {
        // A poisoned lock only means a holder panicked; the map is still
        // consistent because every mutation is a single insert.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Look up an existing conversation.
    pub fn get(&self, id: &str) -> Option<Arc<Conversation>> {
        self.map().get(id).cloned()
    }

    /// Insert a conversation, replacing any previous entry for the id.
    pub fn insert(&self, id: impl Into<String>, conversation: Conversation) -> Arc<Conversation> {
        let handle = Arc::new(conversation);
        self.map().insert(id.into(), Arc::clone(&handle));
        handle
    }

    /// Return the conversation for `id`, constructing it with `factory` on
    /// first sight. Lookup and insert happen under one lock, so two racing
    /// callers always resolve to the same instance.
    pub fn get_or_create<F>(&self, id: &str, factory: F) -> Arc<Conversation>
    where
        F: FnOnce() -> Conversation,
    {
        let mut map = self.map();
        if let Some(existing) = map.get(id) {
            return Arc::clone(existing);
        }
        let handle = Arc::new(factory());
        map.insert(id.to_string(), Arc::clone(&handle));
        handle
    }

    /// Number of cached conversations.
    pub fn len(&self) -> usize {
        self.map().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map().is_empty()
    }
}

impl std::fmt::Debug for ConversationCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationCache").field("len", &self.len()).finish()
    }
}
