//! Per-connection state machine: key exchange, authentication, chat dispatch.

use std::fmt;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::registry::SessionHandle;
use super::ServiceState;
use crate::credentials::is_valid_principal_name;
use crate::crypto::PublicKey;
use crate::error::{ChatError, ChatResult};
use crate::network::connection::{spawn_writer, LineReader};
use crate::network::messages::{self, Command, LoginResponse};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    KeyExchange,
    AwaitCredentials,
    Connected,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::KeyExchange => "KEY_EXCHANGE",
            SessionState::AwaitCredentials => "AWAIT_CREDENTIALS",
            SessionState::Connected => "CONNECTED",
            SessionState::Closed => "CLOSED",
        };
        f.write_str(name)
    }
}

/// How long queued lines may take to flush once a session has ended
pub const WRITER_DRAIN: Duration = Duration::from_millis(500);

/// Serve one accepted connection until it closes.
///
/// Errors are confined to this connection; the registry only loses this
/// session's own entry. The connection is released when this returns, even
/// if the peer stopped reading.
pub async fn serve<S>(stream: S, service: ServiceState) -> ChatResult<()>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (read_half, write_half) = tokio::io::split(stream);
    let (outbox, mut writer) = spawn_writer(write_half);
    let mut session = Session::new(LineReader::new(read_half), outbox, service);
    let result = session.run().await;
    let id = session.id();
    // Drops the read half and the last outbox sender
    drop(session);

    if tokio::time::timeout(WRITER_DRAIN, &mut writer).await.is_err() {
        writer.abort();
        // Resolves once the task, and with it the write half, is gone
        let _ = writer.await;
        debug!(session = %id, "writer still blocked, dropped connection");
    }
    result
}

pub struct Session<R> {
    id: Uuid,
    state: SessionState,
    reader: LineReader<R>,
    outbox: mpsc::UnboundedSender<String>,
    service: ServiceState,
    peer_key: Option<PublicKey>,
    handle: Option<SessionHandle>,
}

enum Credentials {
    Accepted(SessionHandle, LoginResponse),
    Rejected(LoginResponse),
}

impl<R: AsyncRead + Unpin> Session<R> {
    pub fn new(reader: LineReader<R>, outbox: mpsc::UnboundedSender<String>, service: ServiceState) -> Self {
        Self {
            id: Uuid::new_v4(),
            state: SessionState::KeyExchange,
            reader,
            outbox,
            service,
            peer_key: None,
            handle: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Drive the session through every state, always ending in `Closed`
    pub async fn run(&mut self) -> ChatResult<()> {
        let result = self.run_states().await;
        match &result {
            Ok(()) => debug!(session = %self.id, "session ended"),
            Err(e) if e.is_session_scoped() => {
                info!(session = %self.id, state = %self.state, error = %e, "session terminated")
            }
            Err(e) => warn!(session = %self.id, state = %self.state, error = %e, "session failed"),
        }
        self.disconnect();
        result
    }

    async fn run_states(&mut self) -> ChatResult<()> {
        let peer_key = self.key_exchange().await?;
        self.state = SessionState::AwaitCredentials;

        let handle = match self.authenticate(&peer_key).await? {
            Some(handle) => handle,
            None => return Ok(()),
        };
        self.state = SessionState::Connected;

        info!(session = %self.id, user = handle.name(), "user joined");
        self.service
            .registry
            .broadcast(&messages::join_notice(handle.name()), Some(self.id));

        self.chat_loop(&handle).await
    }

    async fn key_exchange(&mut self) -> ChatResult<PublicKey> {
        let keys = &self.service.keys;
        self.send_raw(keys.public_exponent().to_string())?;
        self.send_raw(keys.modulus().to_string())?;

        let exponent = self.reader.expect_line().await?;
        let modulus = self.reader.expect_line().await?;
        let peer_key = PublicKey::from_decimal(&exponent, &modulus)?;
        self.peer_key = Some(peer_key.clone());
        debug!(session = %self.id, "received peer public key");
        Ok(peer_key)
    }

    // Loops until a login is accepted; `None` means the peer left first
    async fn authenticate(&mut self, peer_key: &PublicKey) -> ChatResult<Option<SessionHandle>> {
        loop {
            let name_line = match self.reader.read_line().await? {
                Some(line) => line,
                None => return Ok(None),
            };
            let password_line = match self.reader.read_line().await? {
                Some(line) => line,
                None => return Ok(None),
            };

            let name = self.service.keys.decrypt(&name_line)?;
            let password = self.service.keys.decrypt(&password_line)?;

            match self.check_credentials(&name, &password, peer_key).await {
                Credentials::Accepted(handle, response) => {
                    // Registered from here on, so teardown must see the handle
                    self.handle = Some(handle.clone());
                    self.reply(response.as_str())?;
                    return Ok(Some(handle));
                }
                Credentials::Rejected(response) => {
                    debug!(session = %self.id, user = %name, %response, "login rejected");
                    self.reply(response.as_str())?;
                }
            }
        }
    }

    async fn check_credentials(&mut self, name: &str, password: &str, peer_key: &PublicKey) -> Credentials {
        if !is_valid_principal_name(name) {
            return Credentials::Rejected(LoginResponse::InvalidUsername);
        }
        if self.service.registry.contains(name) {
            return Credentials::Rejected(LoginResponse::AlreadyLoggedIn);
        }

        // Two connections may both see an unknown name here and both register;
        // the registry insert below still lets only one of them in.
        let response = if self.service.store.is_registered(name) {
            if !self.service.store.authenticate(name, password) {
                return Credentials::Rejected(LoginResponse::PasswordInvalid);
            }
            LoginResponse::LoginAccepted
        } else {
            let (new_name, new_password) = (name.to_string(), password.to_string());
            let written = self
                .service
                .write_store(move |store| store.register(&new_name, &new_password))
                .await;
            if let Err(e) = written {
                warn!(session = %self.id, user = name, error = %e, "could not persist registration");
            }
            LoginResponse::Registered
        };

        let handle = SessionHandle::new(name, self.id, peer_key.clone(), self.outbox.clone());
        match self.service.registry.try_insert(handle.clone()) {
            Ok(()) => Credentials::Accepted(handle, response),
            Err(_) => Credentials::Rejected(LoginResponse::AlreadyLoggedIn),
        }
    }

    async fn chat_loop(&mut self, handle: &SessionHandle) -> ChatResult<()> {
        loop {
            let line = tokio::select! {
                line = self.reader.read_line() => line?,
                _ = handle.closed() => {
                    info!(session = %self.id, user = handle.name(), "connection closed by server");
                    return Ok(());
                }
            };

            let line = match line {
                Some(line) => line,
                None => return Ok(()),
            };

            let message = self.service.keys.decrypt(&line)?;
            self.dispatch(handle, &message).await?;
        }
    }

    async fn dispatch(&mut self, handle: &SessionHandle, message: &str) -> ChatResult<()> {
        let registry = &self.service.registry;

        match Command::parse(message) {
            Command::ListClients => {
                for name in registry.names() {
                    self.reply(&messages::client_list_entry(&name))?;
                }
            }
            Command::ChangePassword(new_password) => {
                let (name, new_password) = (handle.name().to_string(), new_password.to_string());
                let written = self
                    .service
                    .write_store(move |store| store.change_password(&name, &new_password))
                    .await;
                match written {
                    Ok(()) => self.reply(messages::PASSWORD_CHANGED)?,
                    Err(e) => {
                        warn!(session = %self.id, user = handle.name(), error = %e, "password change failed");
                        self.reply(messages::PASSWORD_CHANGE_FAILED)?;
                    }
                }
            }
            Command::Private { to, message } => match registry.get(to) {
                Some(recipient) => {
                    recipient.send(&messages::private_line(handle.name(), message));
                }
                None => self.reply(messages::WRONG_NICKNAME)?,
            },
            Command::Broadcast(text) => {
                registry.broadcast(&messages::chat_line(handle.name(), text), Some(self.id));
            }
        }
        Ok(())
    }

    // CLOSED: leave the registry, then tell everyone still there
    fn disconnect(&mut self) {
        self.state = SessionState::Closed;
        if let Some(handle) = self.handle.take() {
            let registry = &self.service.registry;
            registry.remove_session(&handle);
            registry.broadcast(&messages::departure_notice(handle.name()), Some(self.id));
            info!(session = %self.id, user = handle.name(), "user left");
        }
    }

    fn reply(&self, text: &str) -> ChatResult<()> {
        let key = self
            .peer_key
            .as_ref()
            .ok_or_else(|| ChatError::Protocol("no peer key before reply".to_string()))?;
        self.send_raw(key.encrypt(text)?)
    }

    fn send_raw(&self, line: String) -> ChatResult<()> {
        self.outbox.send(line)?;
        Ok(())
    }
}
