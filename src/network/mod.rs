use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::{error, info, warn};

pub mod connection;
pub mod messages;

pub use connection::{spawn_writer, write_line, LineReader};
pub use messages::{Command, LoginResponse};

use crate::error::{ChatError, ChatResult};
use crate::server::{serve, ServiceState};

const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Accepts connections and runs one session task per peer
pub struct ChatServer {
    listener: TcpListener,
    service: ServiceState,
}

impl ChatServer {
    /// Bind the listener; failure here is fatal to the service
    pub async fn bind(addr: SocketAddr, service: ServiceState) -> ChatResult<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ChatError::Network(format!("bind {}: {}", addr, e)))?;
        Ok(Self { listener, service })
    }

    pub fn local_addr(&self) -> ChatResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept loop; runs until the task is dropped
    pub async fn run(self) {
        if let Ok(addr) = self.listener.local_addr() {
            info!(%addr, "listening for peers");
        }

        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    if let Err(e) = stream.set_nodelay(true) {
                        warn!(%peer, error = %e, "could not disable Nagle");
                    }
                    info!(%peer, "connection accepted");
                    let service = self.service.clone();
                    tokio::spawn(async move {
                        // Outcome already logged by the session
                        let _ = serve(stream, service).await;
                    });
                }
                Err(e) => {
                    error!(error = %e, "error accepting connection");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            }
        }
    }
}
