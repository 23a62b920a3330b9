//! Concurrent session map. Each session is wrapped in its own
//! `tokio::sync::Mutex` so the orchestrator can hold a single session's lock
//! across `.await` points (serializing that session's rounds) without
//! blocking unrelated sessions (spec §5, "Per-session serialization").

use crate::types::Session;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

pub struct SessionStore {
    sessions: DashMap<String, Arc<Mutex<Session>>>,
    max_history_length: usize,
}

impl SessionStore {
    pub fn new(max_history_length: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            max_history_length,
        }
    }

    /// Return the existing session for `id`, or create and insert a new one.
    /// The returned handle is cheap to clone; callers lock it for the
    /// duration of one orchestrator round.
    pub fn get_or_create(&self, id: &str) -> Arc<Mutex<Session>> {
        self.sessions
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(Session::new(id, self.max_history_length))))
            .clone()
    }

    pub fn get(&self, id: &str) -> Option<Arc<Mutex<Session>>> {
        self.sessions.get(id).map(|entry| entry.clone())
    }

    pub fn close(&self, id: &str) -> bool {
        self.sessions.remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Remove sessions whose `last_activity` is older than `session_timeout`,
    /// returning the number reaped. Called by [`super::reaper::spawn_reaper`].
    pub async fn reap_expired(&self, session_timeout: chrono::Duration) -> usize {
        let now = chrono::Utc::now();
        let mut expired_ids = Vec::new();
        for entry in self.sessions.iter() {
            let session = entry.value().lock().await;
            if session.is_expired(now, session_timeout) {
                expired_ids.push(entry.key().clone());
            }
        }
        let count = expired_ids.len();
        for id in expired_ids {
            self.sessions.remove(&id);
        }
        count
    }
}
