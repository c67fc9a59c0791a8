//! Peer side of the protocol, usable over any byte stream.

use tokio::io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf};

use crate::crypto::{KeyPair, PublicKey};
use crate::error::{ChatError, ChatResult};
use crate::network::connection::{write_line, LineReader};
use crate::network::messages::{LoginResponse, CHANGE_PASSWORD_PREFIX};

/// A connected peer: owns its own key pair and knows the service's public key
pub struct ChatClient<S> {
    receiver: ClientReceiver<S>,
    sender: ClientSender<S>,
}

/// Reading half: decrypts lines from the service with the peer's private key
pub struct ClientReceiver<S> {
    reader: LineReader<ReadHalf<S>>,
    keys: KeyPair,
}

/// Writing half: encrypts lines for the service
pub struct ClientSender<S> {
    writer: WriteHalf<S>,
    service_key: PublicKey,
}

impl<S: AsyncRead + AsyncWrite> ChatClient<S> {
    /// Generate a key pair of `key_bits` bits and run the cleartext key exchange
    pub async fn connect(stream: S, key_bits: usize) -> ChatResult<Self> {
        let keys = KeyPair::generate(key_bits)?;
        Self::with_keys(stream, keys).await
    }

    pub async fn with_keys(stream: S, keys: KeyPair) -> ChatResult<Self> {
        let (read_half, mut write_half) = tokio::io::split(stream);
        let mut reader = LineReader::new(read_half);

        write_line(&mut write_half, &keys.public_exponent().to_string()).await?;
        write_line(&mut write_half, &keys.modulus().to_string()).await?;

        let exponent = reader.expect_line().await?;
        let modulus = reader.expect_line().await?;
        let service_key = PublicKey::from_decimal(&exponent, &modulus)?;

        Ok(Self {
            receiver: ClientReceiver { reader, keys },
            sender: ClientSender {
                writer: write_half,
                service_key,
            },
        })
    }

    /// Submit one name/password pair and read the service's verdict
    pub async fn login(&mut self, name: &str, password: &str) -> ChatResult<LoginResponse> {
        self.sender.send(name).await?;
        self.sender.send(password).await?;
        let reply = self.receiver.recv().await?.ok_or(ChatError::ConnectionClosed)?;
        reply.parse()
    }

    pub async fn send(&mut self, text: &str) -> ChatResult<()> {
        self.sender.send(text).await
    }

    /// Write a line without encrypting it
    pub async fn send_raw(&mut self, line: &str) -> ChatResult<()> {
        write_line(&mut self.sender.writer, line).await
    }

    pub async fn recv(&mut self) -> ChatResult<Option<String>> {
        self.receiver.recv().await
    }

    pub fn service_key(&self) -> &PublicKey {
        &self.sender.service_key
    }

    /// Split so incoming lines can be printed while the user types
    pub fn into_split(self) -> (ClientReceiver<S>, ClientSender<S>) {
        (self.receiver, self.sender)
    }
}

impl<S: AsyncRead> ClientReceiver<S> {
    /// Next decrypted line, `None` once the service closes the connection
    pub async fn recv(&mut self) -> ChatResult<Option<String>> {
        match self.reader.read_line().await? {
            Some(line) => Ok(Some(self.keys.decrypt(&line)?)),
            None => Ok(None),
        }
    }
}

impl<S: AsyncWrite> ClientSender<S> {
    pub async fn send(&mut self, text: &str) -> ChatResult<()> {
        let line = self.service_key.encrypt(text)?;
        write_line(&mut self.writer, &line).await
    }

    pub async fn change_password(&mut self, new_password: &str) -> ChatResult<()> {
        self.send(&format!("{}{}", CHANGE_PASSWORD_PREFIX, new_password)).await
    }
}
