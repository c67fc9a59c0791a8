//! Shared table of authenticated sessions.
//!
//! The registry only indexes sessions. Each session's own task owns the
//! connection and is the one that tears it down; the registry can merely ask
//! it to close.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::{mpsc, Notify};
use tracing::debug;
use uuid::Uuid;

use crate::crypto::PublicKey;

/// Lookup handle for one live session
#[derive(Clone)]
pub struct SessionHandle {
    inner: Arc<HandleInner>,
}

struct HandleInner {
    name: String,
    connection_id: Uuid,
    peer_key: PublicKey,
    outbox: mpsc::UnboundedSender<String>,
    close: Notify,
}

impl SessionHandle {
    pub fn new(
        name: impl Into<String>,
        connection_id: Uuid,
        peer_key: PublicKey,
        outbox: mpsc::UnboundedSender<String>,
    ) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                name: name.into(),
                connection_id,
                peer_key,
                outbox,
                close: Notify::new(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn connection_id(&self) -> Uuid {
        self.inner.connection_id
    }

    pub fn peer_key(&self) -> &PublicKey {
        &self.inner.peer_key
    }

    /// Encrypt `text` under this peer's key and queue it.
    ///
    /// Failures are swallowed; a dead recipient is noticed by its own reader.
    pub fn send(&self, text: &str) -> bool {
        let line = match self.inner.peer_key.encrypt(text) {
            Ok(line) => line,
            Err(e) => {
                debug!(to = %self.inner.name, error = %e, "dropping undeliverable message");
                return false;
            }
        };
        self.inner.outbox.send(line).is_ok()
    }

    /// Ask the owning session to close its connection
    pub fn close(&self) {
        self.inner.close.notify_one();
    }

    /// Resolves once `close` has been requested
    pub async fn closed(&self) {
        self.inner.close.notified().await
    }

    pub fn same_session(&self, other: &SessionHandle) -> bool {
        self.inner.connection_id == other.inner.connection_id
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("name", &self.inner.name)
            .field("connection_id", &self.inner.connection_id)
            .finish()
    }
}

/// Name → live session mapping; names are unique at all times
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<String, SessionHandle>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert unless the name is taken; a collision hands the handle back
    pub fn try_insert(&self, handle: SessionHandle) -> Result<(), SessionHandle> {
        let mut sessions = self.write();
        if sessions.contains_key(handle.name()) {
            return Err(handle);
        }
        sessions.insert(handle.name().to_string(), handle);
        Ok(())
    }

    pub fn remove(&self, name: &str) -> Option<SessionHandle> {
        self.write().remove(name)
    }

    /// Remove `handle`'s entry only if it still belongs to that same session
    pub fn remove_session(&self, handle: &SessionHandle) -> bool {
        let mut sessions = self.write();
        match sessions.get(handle.name()) {
            Some(current) if current.same_session(handle) => {
                sessions.remove(handle.name());
                true
            }
            _ => false,
        }
    }

    pub fn get(&self, name: &str) -> Option<SessionHandle> {
        self.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    /// Sorted names of all live sessions
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Point-in-time copy of every handle
    pub fn snapshot(&self) -> Vec<SessionHandle> {
        self.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Deliver `text` to every session except `except`; returns recipients reached
    pub fn broadcast(&self, text: &str, except: Option<Uuid>) -> usize {
        self.snapshot()
            .iter()
            .filter(|handle| Some(handle.connection_id()) != except)
            .filter(|handle| handle.send(text))
            .count()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, SessionHandle>> {
        self.sessions.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, SessionHandle>> {
        self.sessions.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
