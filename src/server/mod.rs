//! Server side: shared service state, sessions, registry and admin effects.

pub mod admin;
pub mod console;
pub mod registry;
pub mod session;

use std::sync::Arc;

pub use admin::{AdminOperations, Delivery, KillReport};
pub use console::ConsoleCommand;
pub use registry::{SessionHandle, SessionRegistry};
pub use session::{serve, Session, SessionState};

use crate::credentials::CredentialStore;
use crate::crypto::KeyPair;
use crate::error::{ChatError, ChatResult};

/// State shared by every session and the admin console.
///
/// One long-lived service key pair decrypts all inbound traffic; replies are
/// encrypted per peer with the key learned during that peer's handshake.
#[derive(Clone)]
pub struct ServiceState {
    pub keys: Arc<KeyPair>,
    pub store: Arc<CredentialStore>,
    pub registry: SessionRegistry,
}

impl ServiceState {
    pub fn new(keys: Arc<KeyPair>, store: Arc<CredentialStore>) -> Self {
        Self {
            keys,
            store,
            registry: SessionRegistry::new(),
        }
    }

    pub fn admin(&self) -> AdminOperations {
        AdminOperations::new(self.registry.clone(), self.store.clone())
    }

    /// Run a credential-store write on the blocking pool, off the async workers
    pub async fn write_store<F>(&self, write: F) -> ChatResult<()>
    where
        F: FnOnce(&CredentialStore) -> ChatResult<()> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || write(&store))
            .await
            .map_err(|e| ChatError::StorageIo(format!("store task failed: {}", e)))?
    }
}
