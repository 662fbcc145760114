//! Session registry for the multiplexed transport
//!
//! Maps origin → session and exposes eviction as a named, generation-checked
//! operation: `evict` removes an entry only when the session id still
//! matches, so a late failure handler cannot remove a replacement session
//! that another request already opened. The map sits behind an async mutex
//! because failure-handler eviction and lookup-on-new-request race under
//! real threads; the lock is held across session open so concurrent first
//! requests to one origin share the session being opened instead of opening
//! duplicates.

use crate::Result;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;

struct SessionEntry<S> {
    id: u64,
    sender: S,
}

/// Origin-keyed session map with idempotent eviction
pub struct SessionRegistry<S> {
    sessions: Mutex<HashMap<String, SessionEntry<S>>>,
    next_id: AtomicU64,
}

impl<S: Clone> SessionRegistry<S> {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Return the session for `origin`, opening one with `open` if absent
    ///
    /// An existing entry is returned as-is, without a liveness probe; the
    /// failure handler installed at open time keeps the registry accurate.
    /// Returns the session id alongside the session so callers can evict
    /// exactly the generation they used.
    pub async fn resolve_with<F, Fut>(&self, origin: &str, open: F) -> Result<(u64, S)>
    where
        F: FnOnce(u64) -> Fut,
        Fut: Future<Output = Result<S>>,
    {
        let mut sessions = self.sessions.lock().await;

        if let Some(entry) = sessions.get(origin) {
            return Ok((entry.id, entry.sender.clone()));
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let sender = open(id).await?;
        sessions.insert(
            origin.to_string(),
            SessionEntry {
                id,
                sender: sender.clone(),
            },
        );
        tracing::debug!("opened session {} for {}", id, origin);
        Ok((id, sender))
    }

    /// Remove the entry for `origin` if it still holds session `id`
    ///
    /// Idempotent: evicting an already-removed or already-replaced session
    /// is a no-op. Returns whether an entry was removed.
    pub async fn evict(&self, origin: &str, id: u64) -> bool {
        let mut sessions = self.sessions.lock().await;
        match sessions.get(origin) {
            Some(entry) if entry.id == id => {
                sessions.remove(origin);
                tracing::debug!("evicted session {} for {}", id, origin);
                crate::metrics::counters::session_evicted();
                true
            }
            _ => false,
        }
    }

    /// Session id currently registered for `origin`, if any
    pub async fn session_id(&self, origin: &str) -> Option<u64> {
        self.sessions.lock().await.get(origin).map(|e| e.id)
    }

    /// Number of live sessions
    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Whether the registry holds no sessions
    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }
}

impl<S: Clone> Default for SessionRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}
