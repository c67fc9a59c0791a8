//! Registry-level effects behind the operator console.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use super::registry::SessionRegistry;
use crate::credentials::CredentialStore;
use crate::error::ChatResult;
use crate::network::messages;

/// Pause between kicks during `kill_all`, letting each disconnect settle
pub const KICK_PACING: Duration = Duration::from_millis(250);

/// Outcome of an operation aimed at one named client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    NoSuchClient,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KillReport {
    pub kicked: Vec<String>,
}

pub struct AdminOperations {
    registry: SessionRegistry,
    store: Arc<CredentialStore>,
    kick_pacing: Duration,
}

impl AdminOperations {
    pub fn new(registry: SessionRegistry, store: Arc<CredentialStore>) -> Self {
        Self {
            registry,
            store,
            kick_pacing: KICK_PACING,
        }
    }

    pub fn with_kick_pacing(mut self, pacing: Duration) -> Self {
        self.kick_pacing = pacing;
        self
    }

    pub fn list_clients(&self) -> Vec<String> {
        self.registry.names()
    }

    /// Send `message` as the server to every session; returns recipients reached
    pub fn broadcast_from_admin(&self, message: &str) -> usize {
        self.registry.broadcast(&messages::server_line(message), None)
    }

    pub fn private_from_admin(&self, name: &str, message: &str) -> Delivery {
        match self.registry.get(name) {
            Some(handle) => {
                handle.send(&messages::server_line(message));
                Delivery::Delivered
            }
            None => Delivery::NoSuchClient,
        }
    }

    /// Notify the session, then ask it to close its connection
    pub fn kick(&self, name: &str) -> Delivery {
        match self.registry.get(name) {
            Some(handle) => {
                handle.send(messages::KICKED);
                handle.close();
                info!(user = name, "kicked");
                Delivery::Delivered
            }
            None => {
                warn!(user = name, "kick requested for unknown client");
                Delivery::NoSuchClient
            }
        }
    }

    /// Kick everyone, then delete the credential store.
    ///
    /// Irreversible: every registered credential is lost. Exiting the process
    /// is left to the caller.
    pub async fn kill_all(&self) -> ChatResult<KillReport> {
        let mut report = KillReport::default();

        for handle in self.registry.snapshot() {
            if self.kick(handle.name()) == Delivery::Delivered {
                report.kicked.push(handle.name().to_string());
            }
            // The session removes itself; this covers one that is slow to wake
            self.registry.remove_session(&handle);
            tokio::time::sleep(self.kick_pacing).await;
        }

        self.store.wipe()?;
        warn!(kicked = report.kicked.len(), "all sessions kicked and credentials wiped");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;
    use crate::server::registry::SessionHandle;
    use tokio::sync::mpsc;
    use uuid::Uuid;

    struct Fixture {
        _tmp: tempfile::TempDir,
        admin: AdminOperations,
        registry: SessionRegistry,
        store: Arc<CredentialStore>,
        key: KeyPair,
    }

    fn fixture() -> Fixture {
        let tmp = tempfile::tempdir().unwrap();
        let store = Arc::new(CredentialStore::open(tmp.path().join("auth.txt")).unwrap());
        let registry = SessionRegistry::new();
        let admin = AdminOperations::new(registry.clone(), store.clone()).with_kick_pacing(Duration::ZERO);
        Fixture {
            _tmp: tmp,
            admin,
            registry,
            store,
            key: KeyPair::generate(128).unwrap(),
        }
    }

    fn join(f: &Fixture, name: &str) -> (SessionHandle, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = SessionHandle::new(name, Uuid::new_v4(), f.key.public_key().clone(), tx);
        f.registry.try_insert(handle.clone()).unwrap();
        (handle, rx)
    }

    fn decrypt_all(f: &Fixture, rx: &mut mpsc::UnboundedReceiver<String>) -> Vec<String> {
        let mut lines = Vec::new();
        while let Ok(line) = rx.try_recv() {
            lines.push(f.key.decrypt(&line).unwrap());
        }
        lines
    }

    #[test]
    fn test_broadcast_reaches_everyone() {
        let f = fixture();
        let (_a, mut a_rx) = join(&f, "alice");
        let (_b, mut b_rx) = join(&f, "bob");

        assert_eq!(f.admin.broadcast_from_admin("maintenance at noon"), 2);
        assert_eq!(decrypt_all(&f, &mut a_rx), vec!["SERVER: maintenance at noon"]);
        assert_eq!(decrypt_all(&f, &mut b_rx), vec!["SERVER: maintenance at noon"]);
    }

    #[test]
    fn test_private_and_missing_client() {
        let f = fixture();
        let (_a, mut a_rx) = join(&f, "alice");

        assert_eq!(f.admin.private_from_admin("alice", "hello"), Delivery::Delivered);
        assert_eq!(f.admin.private_from_admin("carol", "hello"), Delivery::NoSuchClient);
        assert_eq!(decrypt_all(&f, &mut a_rx), vec!["SERVER: hello"]);
    }

    #[tokio::test]
    async fn test_kick_notifies_and_requests_close() {
        let f = fixture();
        let (alice, mut a_rx) = join(&f, "alice");

        assert_eq!(f.admin.kick("alice"), Delivery::Delivered);
        assert_eq!(f.admin.kick("nobody"), Delivery::NoSuchClient);
        assert_eq!(decrypt_all(&f, &mut a_rx), vec![messages::KICKED]);
        tokio::time::timeout(Duration::from_secs(1), alice.closed()).await.unwrap();
    }

    #[tokio::test]
    async fn test_kill_all_empties_registry_and_wipes_store() {
        let f = fixture();
        f.store.register("alice", "pw").unwrap();
        let (_a, mut a_rx) = join(&f, "alice");
        let (_b, mut b_rx) = join(&f, "bob");

        let mut report = f.admin.kill_all().await.unwrap();
        report.kicked.sort();
        assert_eq!(report.kicked, vec!["alice", "bob"]);
        assert!(f.registry.is_empty());
        assert!(!f.store.path().exists());
        assert!(decrypt_all(&f, &mut a_rx).contains(&messages::KICKED.to_string()));
        assert!(decrypt_all(&f, &mut b_rx).contains(&messages::KICKED.to_string()));
    }

    #[test]
    fn test_list_clients() {
        let f = fixture();
        assert!(f.admin.list_clients().is_empty());
        let (_b, _rx1) = join(&f, "bob");
        let (_a, _rx2) = join(&f, "alice");
        assert_eq!(f.admin.list_clients(), vec!["alice", "bob"]);
    }
}
